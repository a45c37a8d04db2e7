use crate::problem::{MatchResult, PatternObject, Picture};
use crate::search::MatchBackend;
use crate::vulkan::VulkanScoreMatcher;
use log::debug;
use std::cell::OnceCell;

/// Optimistic GPU fast path.
///
/// The device is set up on first use. If that fails the backend stays
/// disabled for the life of the process; any runtime error is logged and
/// reported as "no definitive result" so the CPU search takes over.
pub struct VulkanBackend {
    enable_validation: bool,
    matcher: OnceCell<Option<VulkanScoreMatcher>>,
}

impl VulkanBackend {
    pub fn new(enable_validation: bool) -> Self {
        Self {
            enable_validation,
            matcher: OnceCell::new(),
        }
    }

    fn matcher(&self) -> Option<&VulkanScoreMatcher> {
        self.matcher
            .get_or_init(|| match VulkanScoreMatcher::new(self.enable_validation) {
                Ok(matcher) => Some(matcher),
                Err(e) => {
                    debug!("Vulkan backend disabled: {}", e);
                    None
                }
            })
            .as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.matcher().is_some()
    }
}

impl MatchBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn attempt(&self, picture: &Picture, objects: &[PatternObject], threshold: f64) -> Option<MatchResult> {
        let matcher = self.matcher()?;
        match matcher.find_first(picture, objects, threshold) {
            Ok(result) => result,
            Err(e) => {
                debug!("Vulkan search failed for picture {}: {}", picture.id(), e);
                None
            }
        }
    }
}
