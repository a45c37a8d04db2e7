use crate::error::{PatternMatchingError, Result};
use crate::problem::{PatternObject, Picture, Problem};
use log::debug;
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

/// Whitespace-delimited token stream with positional error reporting.
struct Tokens<'a> {
    inner: SplitWhitespace<'a>,
    index: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
            index: 0,
        }
    }

    fn next<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let index = self.index;
        let token = self.inner.next().ok_or_else(|| PatternMatchingError::Parse {
            token_index: index,
            reason: format!("unexpected end of input while reading {what}"),
        })?;
        self.index += 1;
        token.parse().map_err(|_| PatternMatchingError::Parse {
            token_index: index,
            reason: format!("invalid {what}: {token:?}"),
        })
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let index = self.index;
        let value: i64 = self.next(what)?;
        usize::try_from(value).map_err(|_| PatternMatchingError::Parse {
            token_index: index,
            reason: format!("{what} must not be negative, got {value}"),
        })
    }

    fn dimension(&mut self, what: &str) -> Result<usize> {
        let index = self.index;
        let dim = self.count(what)?;
        if dim == 0 {
            return Err(PatternMatchingError::Parse {
                token_index: index,
                reason: format!("{what} must be at least 1"),
            });
        }
        if dim.checked_mul(dim).is_none() {
            return Err(PatternMatchingError::Parse {
                token_index: index,
                reason: format!("{what} {dim} is too large"),
            });
        }
        Ok(dim)
    }

    fn grid(&mut self, dim: usize, what: &str) -> Result<Vec<i32>> {
        (0..dim * dim).map(|_| self.next::<i32>(what)).collect()
    }
}

/// Load a problem from a text file.
pub fn load_problem<P: AsRef<Path>>(path: P) -> Result<Problem> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let problem = parse_problem(&text)?;
    debug!(
        "Parsed {}: threshold {}, {} pictures, {} objects",
        path.as_ref().display(),
        problem.threshold(),
        problem.pictures().len(),
        problem.objects().len()
    );
    Ok(problem)
}

/// Parse a problem: threshold, picture count and pictures, object count and
/// objects. Each grid is `id dim` followed by `dim * dim` row-major integers.
pub fn parse_problem(text: &str) -> Result<Problem> {
    let mut tokens = Tokens::new(text);

    let threshold: f64 = tokens.next("threshold")?;
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(PatternMatchingError::InvalidThreshold(threshold));
    }

    let picture_count = tokens.count("picture count")?;
    let mut pictures = Vec::with_capacity(picture_count.min(1024));
    for _ in 0..picture_count {
        let id: i32 = tokens.next("picture id")?;
        let dim = tokens.dimension("picture dimension")?;
        let cells = tokens.grid(dim, "picture cell")?;
        pictures.push(Picture::new(id, dim, cells)?);
    }

    let object_count = tokens.count("object count")?;
    let mut objects = Vec::with_capacity(object_count.min(1024));
    for _ in 0..object_count {
        let id: i32 = tokens.next("object id")?;
        let dim = tokens.dimension("object dimension")?;
        let cells = tokens.grid(dim, "object cell")?;
        objects.push(PatternObject::new(id, dim, cells)?);
    }

    Problem::new(threshold, pictures, objects)
}
