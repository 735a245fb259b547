// ── Window search ─────────────────────────────────────────────────────────────
//
// Depth-first search of the desktop window tree for one window owned by a
// given process.  Written against `WindowTree` so the traversal is testable
// without a desktop; `platform::win32::DesktopWindows` is the real tree.

use std::{fmt, ops::ControlFlow};

use crate::{
    process::{ProcessRecord, ProcessSystem},
    text::eq_ignore_case,
};

/// Read access to a window hierarchy.
///
/// The enumeration methods call `visit` once per window and stop as soon as
/// it returns `ControlFlow::Break`.
pub trait WindowTree {
    type Window: Copy + PartialEq + fmt::Debug;

    /// Every top-level window, in z-order.
    fn top_level(&self, visit: &mut dyn FnMut(Self::Window) -> ControlFlow<()>);

    /// The direct children of `parent`.
    fn children(
        &self,
        parent: Self::Window,
        visit: &mut dyn FnMut(Self::Window) -> ControlFlow<()>,
    );

    /// Id of the process that created `window`; `None` if the window is gone.
    fn owner_process_id(&self, window: Self::Window) -> Option<u32>;

    /// Replace `out` with the window's class name.  `false` if unreadable.
    fn read_class_name(&self, window: Self::Window, out: &mut String) -> bool;

    /// Replace `out` with the window's title.  `false` if unreadable.
    fn read_text(&self, window: Self::Window, out: &mut String) -> bool;
}

/// State for one search, shared by every visit.
struct SearchContext<'a, W> {
    process_id: u32,
    class_name: &'a str,
    title: Option<&'a str>,
    scratch: String,
    found: Option<W>,
}

impl<'a, W: Copy> SearchContext<'a, W> {
    fn new(process_id: u32, class_name: &'a str, title: Option<&'a str>) -> Self {
        Self {
            process_id,
            class_name,
            title,
            scratch: String::new(),
            found: None,
        }
    }

    /// Class and title predicate; the owner is checked by the caller.
    fn matches<T: WindowTree<Window = W>>(&mut self, tree: &T, window: W) -> bool {
        if !tree.read_class_name(window, &mut self.scratch)
            || !eq_ignore_case(&self.scratch, self.class_name)
        {
            return false;
        }
        match self.title {
            None => true,
            Some(title) => {
                tree.read_text(window, &mut self.scratch) && eq_ignore_case(&self.scratch, title)
            }
        }
    }

    fn stop_if_found(&self) -> ControlFlow<()> {
        if self.found.is_some() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Find a window of `process_id` whose class is `class_name` and, if given,
/// whose title is `title`.  Both comparisons ignore case.
///
/// Only top-level windows owned by `process_id` are considered.  When such a
/// window does not match, its subtree is searched with the class and title
/// predicate alone.  The walk stops at the first match.
pub fn find_window<T: WindowTree>(
    tree: &T,
    process_id: u32,
    class_name: &str,
    title: Option<&str>,
) -> Option<T::Window> {
    let mut ctx = SearchContext::new(process_id, class_name, title);

    tree.top_level(&mut |window| {
        if tree.owner_process_id(window) != Some(ctx.process_id) {
            return ControlFlow::Continue(());
        }
        if ctx.matches(tree, window) {
            ctx.found = Some(window);
            return ControlFlow::Break(());
        }
        search_descendants(tree, window, &mut ctx)
    });

    ctx.found
}

fn search_descendants<T: WindowTree>(
    tree: &T,
    parent: T::Window,
    ctx: &mut SearchContext<'_, T::Window>,
) -> ControlFlow<()> {
    tree.children(parent, &mut |child| {
        if ctx.matches(tree, child) {
            ctx.found = Some(child);
            return ControlFlow::Break(());
        }
        // Recursion sets `found`; re-check before the next sibling.
        let _ = search_descendants(tree, child, ctx);
        ctx.stop_if_found()
    });
    ctx.stop_if_found()
}

/// [`find_window`] for a resolved process.
pub fn find_process_window<S: ProcessSystem, T: WindowTree>(
    tree: &T,
    process: &ProcessRecord<S>,
    class_name: &str,
    title: Option<&str>,
) -> Option<T::Window> {
    find_window(tree, process.id(), class_name, title)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
