//! Shared quota marker.
//!
//! Remote backends (translator, image editor) flip this when they hit a
//! 429/quota rejection; callers read it to degrade the surface (skip the
//! error modal, show a banner) instead of hammering the API again.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct QuotaState {
    exhausted: AtomicBool,
}

impl QuotaState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_exhausted(&self) {
        self.exhausted.store(true, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.exhausted.store(false, Ordering::Relaxed);
    }

    /// Whether the most recent remote failure was a quota rejection.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Relaxed)
    }
}
