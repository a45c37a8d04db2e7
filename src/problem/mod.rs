//! In-memory problem model: pictures, pattern objects, the shared threshold and
//! the per-picture match results.

pub mod loader;
pub mod report;

use crate::error::{PatternMatchingError, Result};
use std::fmt;

/// Top-left corner of a match inside a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({},{})", self.row, self.col)
    }
}

/// A large square grid searched for pattern occurrences.
///
/// Every cell is a divisor in the match score, so construction rejects zero
/// cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    id: i32,
    dim: usize,
    cells: Vec<i32>,
}

impl Picture {
    pub fn new(id: i32, dim: usize, cells: Vec<i32>) -> Result<Self> {
        check_shape("picture", id, dim, &cells)?;
        if let Some(idx) = cells.iter().position(|&v| v == 0) {
            return Err(PatternMatchingError::ZeroPictureCell {
                picture_id: id,
                row: idx / dim,
                col: idx % dim,
            });
        }
        Ok(Self { id, dim, cells })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Row-major cells.
    pub fn cells(&self) -> &[i32] {
        &self.cells
    }

    pub fn row(&self, row: usize) -> &[i32] {
        &self.cells[row * self.dim..(row + 1) * self.dim]
    }

    /// Number of candidate top-left positions per axis for a pattern of
    /// dimension `pattern_dim`, or `None` when the pattern does not fit.
    pub fn span_for(&self, pattern_dim: usize) -> Option<usize> {
        if pattern_dim > self.dim {
            None
        } else {
            Some(self.dim - pattern_dim + 1)
        }
    }
}

/// A small square pattern whose approximate occurrence is sought.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternObject {
    id: i32,
    dim: usize,
    cells: Vec<i32>,
}

impl PatternObject {
    pub fn new(id: i32, dim: usize, cells: Vec<i32>) -> Result<Self> {
        check_shape("object", id, dim, &cells)?;
        Ok(Self { id, dim, cells })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn cells(&self) -> &[i32] {
        &self.cells
    }

    pub fn row(&self, row: usize) -> &[i32] {
        &self.cells[row * self.dim..(row + 1) * self.dim]
    }
}

fn check_shape(kind: &'static str, id: i32, dim: usize, cells: &[i32]) -> Result<()> {
    if dim == 0 {
        return Err(PatternMatchingError::InvalidGrid {
            kind,
            id,
            reason: "dimension must be at least 1".to_string(),
        });
    }
    let expected = dim.checked_mul(dim).ok_or_else(|| PatternMatchingError::InvalidGrid {
        kind,
        id,
        reason: format!("dimension {dim} overflows"),
    })?;
    if cells.len() != expected {
        return Err(PatternMatchingError::InvalidGrid {
            kind,
            id,
            reason: format!("expected {expected} cells for dimension {dim}, got {}", cells.len()),
        });
    }
    Ok(())
}

/// The whole problem: threshold, pictures and objects.
///
/// Built once by the coordinator and replicated to every other rank.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    threshold: f64,
    pictures: Vec<Picture>,
    objects: Vec<PatternObject>,
}

impl Problem {
    pub fn new(threshold: f64, pictures: Vec<Picture>, objects: Vec<PatternObject>) -> Result<Self> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(PatternMatchingError::InvalidThreshold(threshold));
        }
        Ok(Self {
            threshold,
            pictures,
            objects,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn pictures(&self) -> &[Picture] {
        &self.pictures
    }

    pub fn objects(&self) -> &[PatternObject] {
        &self.objects
    }

    /// Roster index of the first picture carrying `picture_id`.
    pub fn picture_index(&self, picture_id: i32) -> Option<usize> {
        self.pictures.iter().position(|p| p.id == picture_id)
    }
}

/// The object and position that matched a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    pub object_id: i32,
    pub position: Position,
}

/// Outcome of searching one picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub picture_id: i32,
    pub found: Option<Found>,
}

impl MatchResult {
    pub fn not_found(picture_id: i32) -> Self {
        Self {
            picture_id,
            found: None,
        }
    }

    pub fn found(picture_id: i32, object_id: i32, position: Position) -> Self {
        Self {
            picture_id,
            found: Some(Found { object_id, position }),
        }
    }

    pub fn is_found(&self) -> bool {
        self.found.is_some()
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.found {
            Some(Found { object_id, position }) => write!(
                f,
                "Picture {} found Object {} in {}",
                self.picture_id, object_id, position
            ),
            None => write!(f, "Picture {} No Objects were found", self.picture_id),
        }
    }
}
