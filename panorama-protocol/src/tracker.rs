//! Stale-frame tracking for render clients

use crate::messages::{ClickableRegion, RenderPayload};

/// Holds the last applied render frame.
///
/// Frames must arrive with strictly increasing sequence numbers; anything at
/// or below the last applied number is stale and dropped.
#[derive(Debug, Default)]
pub struct FrameTracker {
    last_sequence: Option<u64>,
    current: Option<RenderPayload>,
}

impl FrameTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a frame; returns `false` (and keeps the old frame) when stale
    pub fn apply(&mut self, payload: RenderPayload) -> bool {
        if let Some(last) = self.last_sequence {
            if payload.sequence_number <= last {
                tracing::trace!(
                    sequence = payload.sequence_number,
                    last,
                    "dropping stale frame"
                );
                return false;
            }
        }
        self.last_sequence = Some(payload.sequence_number);
        self.current = Some(payload);
        true
    }

    /// Forget the cached frame after a reconnect.
    ///
    /// The new subscription starts a new sequence, so the high-water mark is
    /// reset together with the regions.
    pub fn invalidate(&mut self) {
        self.last_sequence = None;
        self.current = None;
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn current(&self) -> Option<&RenderPayload> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut RenderPayload> {
        self.current.as_mut()
    }

    pub fn regions(&self) -> &[ClickableRegion] {
        self.current.as_ref().map(|c| c.regions.as_slice()).unwrap_or(&[])
    }

    pub fn pinned_regions(&self) -> &[ClickableRegion] {
        self.current
            .as_ref()
            .map(|c| c.pinned_regions.as_slice())
            .unwrap_or(&[])
    }
}
