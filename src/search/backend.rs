use crate::config::TieBreak;
use crate::error::Result;
use crate::problem::{MatchResult, PatternObject, Picture};
use crate::search::kernel::match_score;
use crate::search::scan::{PositionScan, scan_for};
use log::debug;

/// One way of searching a picture against the full object list.
///
/// `attempt` returns `Some` only for a definitive found result. `None` covers
/// "unavailable", "failed" and "nothing found" alike, so callers must move on
/// to the next backend rather than treat it as proof of no match.
pub trait MatchBackend {
    fn name(&self) -> &'static str;

    fn attempt(&self, picture: &Picture, objects: &[PatternObject], threshold: f64) -> Option<MatchResult>;
}

/// Shared-memory CPU search. This is the canonical search: its not-found is
/// authoritative.
pub struct CpuBackend {
    scan: Box<dyn PositionScan>,
    pool: Option<rayon::ThreadPool>,
}

impl CpuBackend {
    pub fn new(tie_break: TieBreak, threads: Option<usize>) -> Result<Self> {
        let pool = match threads {
            Some(threads) => Some(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?),
            None => None,
        };
        Ok(Self::with_scan(scan_for(tie_break), pool))
    }

    pub fn with_scan(scan: Box<dyn PositionScan>, pool: Option<rayon::ThreadPool>) -> Self {
        Self { scan, pool }
    }

    /// Objects are tried in order; the first one with a qualifying position
    /// wins and no later object is scored.
    pub fn search(&self, picture: &Picture, objects: &[PatternObject], threshold: f64) -> MatchResult {
        match &self.pool {
            Some(pool) => pool.install(|| self.search_objects(picture, objects, threshold)),
            None => self.search_objects(picture, objects, threshold),
        }
    }

    fn search_objects(&self, picture: &Picture, objects: &[PatternObject], threshold: f64) -> MatchResult {
        for object in objects {
            let Some(span) = picture.span_for(object.dim()) else {
                continue;
            };
            let hit = self
                .scan
                .scan(span, &|position| match_score(picture, object, position) < threshold);
            if let Some(position) = hit {
                debug!(
                    "Picture {}: object {} matched at {}",
                    picture.id(),
                    object.id(),
                    position
                );
                return MatchResult::found(picture.id(), object.id(), position);
            }
        }
        MatchResult::not_found(picture.id())
    }
}

impl MatchBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn attempt(&self, picture: &Picture, objects: &[PatternObject], threshold: f64) -> Option<MatchResult> {
        Some(self.search(picture, objects, threshold)).filter(MatchResult::is_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Position;

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
    fn test_threshold_boundary() {
        let cpu = CpuBackend::new(TieBreak::RowMajor, Some(2)).unwrap();
        let object = PatternObject::new(1, 2, vec![10; 4]).unwrap();
        let objects = [object];

        assert_eq!(cpu.search(&picture(), &objects, 0.3), MatchResult::not_found(1));
        assert_eq!(
            cpu.search(&picture(), &objects, 0.4),
            MatchResult::found(1, 1, Position::new(1, 1))
        );
    }

    #[test]
    fn test_first_object_in_list_order_wins() {
        let cpu = CpuBackend::new(TieBreak::Racing, None).unwrap();
        let objects = [
            PatternObject::new(5, 5, vec![100; 25]).unwrap(), // larger than the picture
            PatternObject::new(6, 1, vec![1]).unwrap(),       // never close enough
            PatternObject::new(7, 1, vec![100]).unwrap(),     // matches many positions
            PatternObject::new(8, 2, vec![11; 4]).unwrap(),   // exact, but later
        ];
        let result = cpu.search(&picture(), &objects, 0.01);
        let found = result.found.unwrap();
        assert_eq!(found.object_id, 7);
        assert!(match_score(&picture(), &objects[2], found.position) < 0.01);
    }

    #[test]
    fn test_oversized_objects_yield_not_found() {
        let cpu = CpuBackend::new(TieBreak::RowMajor, None).unwrap();
        let objects = [PatternObject::new(1, 5, vec![100; 25]).unwrap()];
        assert_eq!(cpu.attempt(&picture(), &objects, 1e9), None);
        assert!(!cpu.search(&picture(), &objects, 1e9).is_found());
    }
}
