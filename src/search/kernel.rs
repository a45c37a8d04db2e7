use crate::problem::{PatternObject, Picture, Position};

/// Sum of relative absolute differences between `object` and the picture window
/// whose top-left corner is `position`. Lower is better.
///
/// The window must lie inside the picture. Differences are taken in 64 bits so
/// extreme cell values cannot overflow.
#[inline]
pub fn match_score(picture: &Picture, object: &PatternObject, position: Position) -> f64 {
    let n = object.dim();
    debug_assert!(position.row + n <= picture.dim() && position.col + n <= picture.dim());

    let mut sum = 0.0f64;
    for r in 0..n {
        let window = &picture.row(position.row + r)[position.col..position.col + n];
        for (&pv, &ov) in window.iter().zip(object.row(r)) {
            sum += ((pv as i64 - ov as i64) as f64 / pv as f64).abs();
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picture() -> Picture {
        #[rustfmt::skip]
        let cells = vec![
            100, 100, 100, 100,
            100,  11,  11, 100,
            100,  11,  11, 100,
            100, 100, 100, 100,
        ];
        Picture::new(1, 4, cells).unwrap()
    }

    #[test]
    fn test_exact_window_scores_zero() {
        let object = PatternObject::new(1, 2, vec![11, 11, 11, 11]).unwrap();
        assert_eq!(match_score(&picture(), &object, Position::new(1, 1)), 0.0);
    }

    #[test]
    fn test_relative_difference_uses_picture_as_divisor() {
        let object = PatternObject::new(1, 2, vec![10, 10, 10, 10]).unwrap();
        let score = match_score(&picture(), &object, Position::new(1, 1));
        assert!((score - 4.0 / 11.0).abs() < 1e-12, "score {score}");

        let score = match_score(&picture(), &object, Position::new(0, 0));
        let expected = 3.0 * 0.9 + 1.0 / 11.0;
        assert!((score - expected).abs() < 1e-12, "score {score}");
    }

    #[test]
    fn test_score_is_bit_identical_on_recompute() {
        let object = PatternObject::new(1, 3, vec![7, 13, 99, -4, 100, 12, 1, 1, 55]).unwrap();
        let picture = picture();
        for row in 0..2 {
            for col in 0..2 {
                let a = match_score(&picture, &object, Position::new(row, col));
                let b = match_score(&picture, &object, Position::new(row, col));
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let picture = Picture::new(1, 1, vec![i32::MIN]).unwrap();
        let object = PatternObject::new(1, 1, vec![i32::MAX]).unwrap();
        let score = match_score(&picture, &object, Position::new(0, 0));
        assert!(score.is_finite());
        assert!(score > 1.9 && score < 2.1);
    }
}
