use crate::error::{PatternMatchingError, Result};
use crate::problem::{MatchResult, Position};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Render one line per result, in the order given.
pub fn render_report(results: &[MatchResult]) -> String {
    let mut out = String::new();
    for result in results {
        out.push_str(&result.to_string());
        out.push('\n');
    }
    out
}

pub fn write_report<P: AsRef<Path>>(path: P, results: &[MatchResult]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    for result in results {
        writeln!(writer, "{result}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse text produced by [`render_report`] back into results.
pub fn parse_report(text: &str) -> Result<Vec<MatchResult>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_line(line.trim()).ok_or_else(|| bad_line(index, line)))
        .collect()
}

fn bad_line(index: usize, line: &str) -> PatternMatchingError {
    PatternMatchingError::Parse {
        token_index: index,
        reason: format!("unrecognised report line {line:?}"),
    }
}

fn parse_line(line: &str) -> Option<MatchResult> {
    let rest = line.strip_prefix("Picture ")?;
    let (id, rest) = rest.split_once(' ')?;
    let picture_id: i32 = id.parse().ok()?;

    if rest == "No Objects were found" {
        return Some(MatchResult::not_found(picture_id));
    }

    let rest = rest.strip_prefix("found Object ")?;
    let (object_id, rest) = rest.split_once(' ')?;
    let object_id: i32 = object_id.parse().ok()?;
    let coords = rest.strip_prefix("in Position(")?.strip_suffix(')')?;
    let (row, col) = coords.split_once(',')?;
    let position = Position::new(row.trim().parse().ok()?, col.trim().parse().ok()?);
    Some(MatchResult::found(picture_id, object_id, position))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format() {
        let results = [
            MatchResult::found(1, 4, Position::new(1, 1)),
            MatchResult::not_found(2),
        ];
        assert_eq!(
            render_report(&results),
            "Picture 1 found Object 4 in Position(1,1)\nPicture 2 No Objects were found\n"
        );
    }

    #[test]
    fn test_report_round_trip() {
        let results = vec![
            MatchResult::found(-3, 12, Position::new(0, 17)),
            MatchResult::not_found(8),
            MatchResult::found(8, -1, Position::new(250, 3)),
        ];
        let parsed = parse_report(&render_report(&results)).unwrap();
        assert_eq!(parsed, results);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_report("Picture 1 found something").is_err());
        assert!(parse_report("Hello").is_err());
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_report(&path, &[MatchResult::not_found(5)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Picture 5 No Objects were found\n");
    }
}
