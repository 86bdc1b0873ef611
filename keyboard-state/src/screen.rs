//! Screen geometry source
//!
//! Read synchronously whenever a frame is sanitized or projected. It is not
//! a stream: rotation simply changes what the next read returns.

use parking_lot::RwLock;

use crate::geometry::{Rect, Size};

/// Anything that can report the current screen bounds
pub trait ScreenMetrics: Send + Sync {
    /// Current screen bounds, normally with a zero origin
    fn bounds(&self) -> Rect;
}

/// A screen whose bounds are set by the host
#[derive(Debug)]
pub struct Screen {
    bounds: RwLock<Rect>,
}

impl Screen {
    /// Screen of `width` x `height` at the origin
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            bounds: RwLock::new(Rect::from_size(Size::new(width, height))),
        }
    }

    /// Replace the bounds (rotation, window resize)
    pub fn set_bounds(&self, bounds: Rect) {
        *self.bounds.write() = bounds;
    }
}

impl ScreenMetrics for Screen {
    fn bounds(&self) -> Rect {
        *self.bounds.read()
    }
}
