//! Target identifiers for target-action style primitives

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TARGET: AtomicU64 = AtomicU64::new(1);

/// Handle returned when registering an action target
///
/// Pass it back to the primitive to remove the target again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TARGET.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target-{}", self.0)
    }
}
