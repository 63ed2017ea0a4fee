//! Two-slot sliding window over the decoded file stream.
//!
//! The window holds at most one record, the previous image. Each newly
//! observed record is tested as a mask for it; the result of the
//! transition tells the driver what to emit. A record that has been used
//! as a mask is still held (so it cannot be paired again) but is never
//! emitted on its own.
//!
//! ```text
//!            observe(r)                observe(r)
//!   Empty ──────────────▶ Holding(p) ──────────────▶ Holding(r)
//!     ▲                       │        (emits p, masked by r,
//!     │         flush()       │         or p standalone)
//!     └───────────────────────┘
//! ```

use crate::classify::masked_by;
use crate::types::ImageRecord;

/// What the window currently holds.
#[derive(Debug, Clone, Copy)]
pub enum WindowState<'a> {
    /// Nothing observed yet, or flushed.
    Empty,
    /// The previous record.
    Holding(&'a ImageRecord),
}

/// Result of observing one record.
#[derive(Debug)]
pub enum Step<'a> {
    /// Nothing to emit: the window was empty or held a consumed mask.
    Idle,
    /// The previous image, paired with the record just observed as its
    /// mask. The mask stays in the window, flagged.
    Masked {
        /// The color plate.
        image: ImageRecord,
        /// Its mask.
        mask: &'a ImageRecord,
    },
    /// The previous image had no mask.
    Unmasked(ImageRecord),
}

/// Sliding window state machine.
#[derive(Debug, Default)]
pub struct PairWindow {
    held: Option<ImageRecord>,
}

impl PairWindow {
    /// An empty window.
    #[must_use]
    pub const fn new() -> Self {
        Self { held: None }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WindowState<'_> {
        self.held
            .as_ref()
            .map_or(WindowState::Empty, WindowState::Holding)
    }

    /// Mutable access to the held record, for in-place normalization
    /// before the next observation.
    pub fn previous_mut(&mut self) -> Option<&mut ImageRecord> {
        self.held.as_mut().filter(|record| !record.is_mask)
    }

    /// Advance the window with `record`.
    ///
    /// If the held record is an unconsumed image and `record` is its
    /// mask, `record` is flagged and both are returned as
    /// [`Step::Masked`]. Otherwise the held image, if any, comes back as
    /// [`Step::Unmasked`]. Either way `record` becomes the held record.
    pub fn observe(&mut self, mut record: ImageRecord) -> Step<'_> {
        let Some(previous) = self.held.take().filter(|held| !held.is_mask) else {
            self.held = Some(record);
            return Step::Idle;
        };
        if masked_by(&record.raster, &previous.raster) {
            record.is_mask = true;
            let mask = self.held.insert(record);
            Step::Masked {
                image: previous,
                mask,
            }
        } else {
            self.held = Some(record);
            Step::Unmasked(previous)
        }
    }

    /// End of stream: release the held image, unless it was a mask.
    pub fn flush(&mut self) -> Option<ImageRecord> {
        self.held.take().filter(|held| !held.is_mask)
    }
}
