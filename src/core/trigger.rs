//! Near-end-of-list fetch trigger.
//!
//! List views call [`VisibilityTrigger::should_fetch`] whenever the last visible
//! row changes. The decision depends only on the cursor status and the scroll
//! position, so it can be driven by any rendering layer.

use crate::core::cursor::CursorStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityTrigger {
    /// How many rows before the end the next page is requested.
    pub prefetch_distance: usize,
}

impl VisibilityTrigger {
    pub fn new(prefetch_distance: usize) -> Self {
        Self { prefetch_distance }
    }

    /// `last_visible` is the zero-based index of the last row on screen.
    pub fn should_fetch(&self, status: &CursorStatus, last_visible: usize) -> bool {
        if !status.has_next_page || status.is_fetching {
            return false;
        }
        last_visible
            .saturating_add(self.prefetch_distance)
            .saturating_add(1)
            >= status.items
    }
}

impl Default for VisibilityTrigger {
    fn default() -> Self {
        Self::new(0)
    }
}
