//! View hierarchy
//!
//! The tracker only needs a few questions answered about the host's views:
//! which view is the root surface, which view a touch lands on, who a view's
//! parent is, and whether a view is a scroll surface and how it dismisses the
//! keyboard. [`ViewHierarchy`] captures exactly that; [`ViewTree`] is an
//! in-memory arena hosts can mirror their real hierarchy into.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{KeyboardError, Result};
use crate::geometry::{Point, Rect};

static NEXT_VIEW: AtomicU64 = AtomicU64::new(1);

/// Opaque view identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    fn next() -> Self {
        Self(NEXT_VIEW.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

/// How a scroll surface dismisses the keyboard when dragged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardDismissMode {
    #[default]
    None,
    /// Dismiss as soon as a drag begins
    OnDrag,
    /// The keyboard follows the drag and can be pulled back up
    Interactive,
}

/// Read-only view of the host's hierarchy
pub trait ViewHierarchy: Send + Sync {
    /// The application's root surface, if it exists yet
    fn root(&self) -> Option<ViewId>;

    fn contains(&self, view: ViewId) -> bool;

    /// Deepest view under `location` (screen coordinates)
    fn hit_test(&self, location: Point) -> Option<ViewId>;

    /// `None` for the root or an unknown view
    fn parent(&self, view: ViewId) -> Option<ViewId>;

    /// Dismiss mode if `view` is a scroll surface, `None` otherwise
    fn keyboard_dismiss_mode(&self, view: ViewId) -> Option<KeyboardDismissMode>;
}

#[derive(Debug)]
struct ViewNode {
    frame: Rect,
    parent: Option<ViewId>,
    children: Vec<ViewId>,
    scroll: Option<KeyboardDismissMode>,
}

#[derive(Debug, Default)]
struct TreeInner {
    nodes: HashMap<ViewId, ViewNode>,
    root: Option<ViewId>,
}

impl TreeInner {
    fn insert(&mut self, parent: Option<ViewId>, frame: Rect, scroll: Option<KeyboardDismissMode>) -> Result<ViewId> {
        if let Some(parent) = parent {
            if !self.nodes.contains_key(&parent) {
                return Err(KeyboardError::UnknownView(parent));
            }
        }

        let id = ViewId::next();
        self.nodes.insert(
            id,
            ViewNode {
                frame,
                parent,
                children: Vec::new(),
                scroll,
            },
        );

        if let Some(node) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            node.children.push(id);
        }

        Ok(id)
    }

    fn hit(&self, view: ViewId, location: Point) -> Option<ViewId> {
        let node = self.nodes.get(&view)?;
        if !node.frame.contains(location) {
            return None;
        }

        // Later children sit on top
        node.children
            .iter()
            .rev()
            .find_map(|child| self.hit(*child, location))
            .or(Some(view))
    }
}

/// In-memory view arena
///
/// Frames are in screen coordinates. A view only receives touches inside its
/// own frame, and children added later are hit first.
#[derive(Debug, Default)]
pub struct ViewTree {
    inner: RwLock<TreeInner>,
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the root surface, replacing any previous root
    pub fn set_root(&self, frame: Rect) -> ViewId {
        let mut inner = self.inner.write();
        let previous = inner.root.take();
        if let Some(previous) = previous {
            remove_subtree(&mut inner, previous);
        }

        let id = ViewId::next();
        inner.nodes.insert(
            id,
            ViewNode {
                frame,
                parent: None,
                children: Vec::new(),
                scroll: None,
            },
        );
        inner.root = Some(id);
        id
    }

    /// Add a plain view under `parent`
    pub fn add_view(&self, parent: ViewId, frame: Rect) -> Result<ViewId> {
        self.inner.write().insert(Some(parent), frame, None)
    }

    /// Add a scroll surface under `parent`
    pub fn add_scroll_view(&self, parent: ViewId, frame: Rect, mode: KeyboardDismissMode) -> Result<ViewId> {
        self.inner.write().insert(Some(parent), frame, Some(mode))
    }

    /// Change the dismiss mode of an existing scroll surface
    pub fn set_dismiss_mode(&self, view: ViewId, mode: KeyboardDismissMode) -> Result<()> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get_mut(&view)
            .ok_or(KeyboardError::UnknownView(view))?;

        match node.scroll.as_mut() {
            Some(current) => {
                *current = mode;
                Ok(())
            }
            None => Err(KeyboardError::Configuration(format!(
                "{} is not a scroll view",
                view
            ))),
        }
    }

    /// Remove `view` and everything below it
    pub fn remove_view(&self, view: ViewId) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(&view) {
            return Err(KeyboardError::UnknownView(view));
        }

        if inner.root == Some(view) {
            inner.root = None;
        }
        remove_subtree(&mut inner, view);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }
}

fn remove_subtree(inner: &mut TreeInner, view: ViewId) {
    let Some(node) = inner.nodes.remove(&view) else {
        return;
    };

    if let Some(parent) = node.parent.and_then(|p| inner.nodes.get_mut(&p)) {
        parent.children.retain(|child| *child != view);
    }

    for child in node.children {
        remove_subtree(inner, child);
    }
}

impl ViewHierarchy for ViewTree {
    fn root(&self) -> Option<ViewId> {
        self.inner.read().root
    }

    fn contains(&self, view: ViewId) -> bool {
        self.inner.read().nodes.contains_key(&view)
    }

    fn hit_test(&self, location: Point) -> Option<ViewId> {
        let inner = self.inner.read();
        inner.root.and_then(|root| inner.hit(root, location))
    }

    fn parent(&self, view: ViewId) -> Option<ViewId> {
        self.inner.read().nodes.get(&view).and_then(|node| node.parent)
    }

    fn keyboard_dismiss_mode(&self, view: ViewId) -> Option<KeyboardDismissMode> {
        self.inner.read().nodes.get(&view).and_then(|node| node.scroll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Rect = Rect::new(0.0, 0.0, 400.0, 800.0);

    #[test]
    fn test_hit_test_picks_deepest_topmost_view() {
        let tree = ViewTree::new();
        let root = tree.set_root(SCREEN);
        let list = tree
            .add_scroll_view(root, Rect::new(0.0, 100.0, 400.0, 600.0), KeyboardDismissMode::Interactive)
            .unwrap();
        let cell = tree.add_view(list, Rect::new(0.0, 100.0, 400.0, 50.0)).unwrap();
        let overlay = tree.add_view(list, Rect::new(0.0, 100.0, 200.0, 50.0)).unwrap();

        assert_eq!(tree.hit_test(Point::new(10.0, 120.0)), Some(overlay));
        assert_eq!(tree.hit_test(Point::new(300.0, 120.0)), Some(cell));
        assert_eq!(tree.hit_test(Point::new(10.0, 400.0)), Some(list));
        assert_eq!(tree.hit_test(Point::new(10.0, 50.0)), Some(root));
        assert_eq!(tree.hit_test(Point::new(10.0, 900.0)), None);
    }

    #[test]
    fn test_parent_and_dismiss_mode() {
        let tree = ViewTree::new();
        let root = tree.set_root(SCREEN);
        let list = tree.add_scroll_view(root, SCREEN, KeyboardDismissMode::None).unwrap();
        let cell = tree.add_view(list, SCREEN).unwrap();

        assert_eq!(tree.parent(cell), Some(list));
        assert_eq!(tree.parent(root), None);
        assert_eq!(tree.keyboard_dismiss_mode(cell), None);
        assert_eq!(tree.keyboard_dismiss_mode(list), Some(KeyboardDismissMode::None));

        tree.set_dismiss_mode(list, KeyboardDismissMode::Interactive).unwrap();
        assert_eq!(tree.keyboard_dismiss_mode(list), Some(KeyboardDismissMode::Interactive));
    }

    #[test]
    fn test_errors() {
        let tree = ViewTree::new();
        let root = tree.set_root(SCREEN);
        let plain = tree.add_view(root, SCREEN).unwrap();

        assert!(matches!(
            tree.set_dismiss_mode(plain, KeyboardDismissMode::OnDrag),
            Err(KeyboardError::Configuration(_))
        ));

        tree.remove_view(plain).unwrap();
        assert!(!tree.contains(plain));
        assert!(matches!(tree.add_view(plain, SCREEN), Err(KeyboardError::UnknownView(v)) if v == plain));
    }

    #[test]
    fn test_replacing_root_drops_old_tree() {
        let tree = ViewTree::new();
        let first = tree.set_root(SCREEN);
        tree.add_view(first, SCREEN).unwrap();

        let second = tree.set_root(SCREEN);
        assert_eq!(tree.root(), Some(second));
        assert_eq!(tree.len(), 1);
    }
}
