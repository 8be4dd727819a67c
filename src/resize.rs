//! Debounced viewport resizing.
//!
//! Bursts of resize events are coalesced: only one value is ever pending and
//! each new event replaces it and pushes the deadline back. The event loop asks
//! [`Debouncer::deadline`] how long it may sleep and calls [`Debouncer::poll`]
//! when it wakes up.

use instant::{Duration, Instant};

/// Viewport size in logical pixels plus the host's device pixel ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32, scale_factor: f64) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }

    pub fn from_physical(size: winit::dpi::PhysicalSize<u32>, scale_factor: f64) -> Self {
        let logical = size.to_logical::<f64>(scale_factor);
        Self::new(
            logical.width.round() as u32,
            logical.height.round() as u32,
            scale_factor,
        )
    }

    /// Surface size in physical pixels with the pixel ratio capped at `max_pixel_ratio`.
    pub fn surface_size(&self, max_pixel_ratio: f64) -> (u32, u32) {
        let ratio = self.scale_factor.min(max_pixel_ratio).max(f64::MIN_POSITIVE);
        let scale = |v: u32| ((v as f64 * ratio).floor() as u32).max(1);
        (scale(self.width), scale(self.height))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replace whatever is pending with `value` and restart the quiet period.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((now + self.delay, value));
    }

    /// Take the pending value once its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if now >= *deadline => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
