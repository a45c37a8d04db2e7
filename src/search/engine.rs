use crate::config::EngineConfig;
use crate::error::Result;
use crate::problem::{MatchResult, PatternObject, Picture};
use crate::search::backend::{CpuBackend, MatchBackend};
use crate::vulkan::VulkanBackend;
use log::debug;

/// Per-picture search over an ordered fallback chain of backends.
///
/// Backends are tried in order until one reports a found result. The CPU
/// backend is always last, so a picture is only reported not-found after the
/// canonical search agreed.
pub struct SearchEngine {
    chain: Vec<Box<dyn MatchBackend>>,
}

impl SearchEngine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut accelerators: Vec<Box<dyn MatchBackend>> = Vec::new();
        if config.use_accelerator {
            accelerators.push(Box::new(VulkanBackend::new(config.vulkan_validation)));
        }
        let cpu = CpuBackend::new(config.tie_break, config.threads)?;
        Ok(Self::with_backends(accelerators, cpu))
    }

    /// Build a chain from explicit accelerators followed by `cpu`.
    pub fn with_backends(accelerators: Vec<Box<dyn MatchBackend>>, cpu: CpuBackend) -> Self {
        let mut chain = accelerators;
        chain.push(Box::new(cpu));
        Self { chain }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|b| b.name()).collect()
    }

    pub fn find_match(&self, picture: &Picture, objects: &[PatternObject], threshold: f64) -> MatchResult {
        for backend in &self.chain {
            if let Some(result) = backend.attempt(picture, objects, threshold) {
                debug!("Picture {} resolved by {} backend", picture.id(), backend.name());
                return result;
            }
        }
        MatchResult::not_found(picture.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TieBreak;
    use crate::problem::Position;
    use std::cell::Cell;
    use std::rc::Rc;

    struct ScriptedBackend {
        answer: Option<MatchResult>,
        calls: Rc<Cell<usize>>,
    }

    impl MatchBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn attempt(&self, _: &Picture, _: &[PatternObject], _: f64) -> Option<MatchResult> {
            self.calls.set(self.calls.get() + 1);
            self.answer
        }
    }

    fn fixture() -> (Picture, Vec<PatternObject>) {
        let picture = Picture::new(3, 3, vec![5, 5, 5, 5, 9, 5, 5, 5, 5]).unwrap();
        let objects = vec![PatternObject::new(4, 1, vec![9]).unwrap()];
        (picture, objects)
    }

    #[test]
    fn test_accelerator_found_result_short_circuits() {
        let (picture, objects) = fixture();
        let calls = Rc::new(Cell::new(0));
        let scripted = MatchResult::found(3, 4, Position::new(1, 1));
        let engine = SearchEngine::with_backends(
            vec![Box::new(ScriptedBackend {
                answer: Some(scripted),
                calls: calls.clone(),
            })],
            CpuBackend::new(TieBreak::RowMajor, None).unwrap(),
        );
        assert_eq!(engine.find_match(&picture, &objects, 0.1), scripted);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_accelerator_miss_falls_back_to_cpu() {
        let (picture, objects) = fixture();
        let calls = Rc::new(Cell::new(0));
        let engine = SearchEngine::with_backends(
            vec![Box::new(ScriptedBackend {
                answer: None,
                calls: calls.clone(),
            })],
            CpuBackend::new(TieBreak::RowMajor, None).unwrap(),
        );
        assert_eq!(
            engine.find_match(&picture, &objects, 0.1),
            MatchResult::found(3, 4, Position::new(1, 1))
        );
        assert_eq!(calls.get(), 1);
        assert_eq!(engine.backend_names(), vec!["scripted", "cpu"]);
    }

    #[test]
    fn test_cpu_only_chain_reports_not_found() {
        let (picture, _) = fixture();
        let engine = SearchEngine::new(&EngineConfig::cpu_only()).unwrap();
        let objects = [PatternObject::new(4, 1, vec![1000]).unwrap()];
        assert_eq!(engine.find_match(&picture, &objects, 0.5), MatchResult::not_found(3));
        assert_eq!(engine.backend_names(), vec!["cpu"]);
    }
}
