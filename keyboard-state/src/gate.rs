//! Interactive-dismiss gate
//!
//! Decides whether a drag should drive keyboard frame reporting. A drag
//! qualifies only when it starts inside a scroll surface configured for
//! interactive keyboard dismissal, directly or through any ancestor.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::trace;

use crate::geometry::Point;
use crate::gesture::{GestureDelegate, RecognizerId};
use crate::view::{KeyboardDismissMode, ViewHierarchy};

/// Delegate for the tracker's root pan recognizer
#[derive(Clone)]
pub struct InteractiveDismissGate {
    hierarchy: Arc<dyn ViewHierarchy>,
}

impl InteractiveDismissGate {
    pub fn new(hierarchy: Arc<dyn ViewHierarchy>) -> Self {
        Self { hierarchy }
    }

    /// Whether a touch at `location` lands in an interactive-dismiss surface
    pub fn allows(&self, location: Point) -> bool {
        let mut current = self.hierarchy.hit_test(location);
        let mut visited = HashSet::new();

        while let Some(view) = current {
            if !visited.insert(view) {
                break;
            }
            if self.hierarchy.keyboard_dismiss_mode(view) == Some(KeyboardDismissMode::Interactive) {
                trace!(%view, ?location, "touch is inside an interactive-dismiss surface");
                return true;
            }
            current = self.hierarchy.parent(view);
        }

        false
    }
}

impl GestureDelegate for InteractiveDismissGate {
    fn should_begin_receiving_touch(&self, _recognizer: RecognizerId, location: Point) -> bool {
        self.allows(location)
    }

    /// Only alongside itself
    fn should_run_simultaneously_with(&self, recognizer: RecognizerId, other: RecognizerId) -> bool {
        recognizer == other
    }
}

impl std::fmt::Debug for InteractiveDismissGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveDismissGate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::gesture::{GestureKind, GestureRecognizer};
    use crate::view::ViewTree;

    const SCREEN: Rect = Rect::new(0.0, 0.0, 400.0, 800.0);

    #[test]
    fn test_gate_walks_up_to_interactive_ancestor() {
        let tree = Arc::new(ViewTree::new());
        let root = tree.set_root(SCREEN);
        let container = tree.add_view(root, SCREEN).unwrap();
        let cell = tree.add_view(container, SCREEN).unwrap();
        let label = tree.add_view(cell, SCREEN).unwrap();
        let gate = InteractiveDismissGate::new(tree.clone());

        assert_eq!(tree.hit_test(Point::new(10.0, 10.0)), Some(label));
        assert!(!gate.allows(Point::new(10.0, 10.0)));

        // Interactive scroll surface two levels above the hit view
        let tree = Arc::new(ViewTree::new());
        let root = tree.set_root(SCREEN);
        let list = tree
            .add_scroll_view(root, SCREEN, KeyboardDismissMode::Interactive)
            .unwrap();
        let cell = tree.add_view(list, SCREEN).unwrap();
        tree.add_view(cell, SCREEN).unwrap();
        let gate = InteractiveDismissGate::new(tree.clone());

        assert!(gate.allows(Point::new(10.0, 10.0)));
    }

    #[test]
    fn test_other_dismiss_modes_do_not_qualify() {
        let tree = Arc::new(ViewTree::new());
        let root = tree.set_root(SCREEN);
        let list = tree.add_scroll_view(root, SCREEN, KeyboardDismissMode::OnDrag).unwrap();
        let gate = InteractiveDismissGate::new(tree.clone());

        assert!(!gate.allows(Point::new(10.0, 10.0)));

        tree.set_dismiss_mode(list, KeyboardDismissMode::Interactive).unwrap();
        assert!(gate.allows(Point::new(10.0, 10.0)));
    }

    #[test]
    fn test_touch_outside_every_view() {
        let tree = Arc::new(ViewTree::new());
        tree.set_root(SCREEN);
        let gate = InteractiveDismissGate::new(tree);

        assert!(!gate.allows(Point::new(-5.0, 900.0)));
    }

    #[test]
    fn test_simultaneous_only_with_itself() {
        let tree = Arc::new(ViewTree::new());
        let root = tree.set_root(SCREEN);
        let gate = Arc::new(InteractiveDismissGate::new(tree));

        let pan = GestureRecognizer::new(root, GestureKind::Pan);
        let other = GestureRecognizer::new(root, GestureKind::Tap);
        pan.set_delegate(gate);

        assert!(pan.can_recognize_simultaneously_with(pan.id()));
        assert!(!pan.can_recognize_simultaneously_with(other.id()));
    }
}
