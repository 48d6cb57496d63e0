//! Focus chain: tab order and the single focused control.

use tracing::debug;

use crate::core::control::{ControlEvent, ControlId};
use crate::error::{Error, Result};
use crate::runtime::tree::ControlTree;

#[derive(Debug, Default)]
pub struct FocusChain {
    focused: Option<ControlId>,
}

impl FocusChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> Option<ControlId> {
        self.focused
    }

    /// Whether `id` may hold focus: it can focus and is visible and enabled
    /// through its whole ancestor chain.
    pub fn can_take_focus(tree: &ControlTree, id: ControlId) -> bool {
        tree.state(id).is_ok_and(|state| state.can_focus)
            && tree.is_effectively_enabled(id)
            && tree.is_effectively_visible(id)
    }

    /// Controls reachable with Tab, in order.
    ///
    /// Siblings are sorted by `(tab_order, insertion index)`; each control is
    /// visited before its children, and children are searched whether or not
    /// their parent is eligible itself.
    pub fn tab_order(tree: &ControlTree) -> Vec<ControlId> {
        let mut out = Vec::new();
        collect_tab_order(tree, tree.roots(), &mut out);
        out
    }

    /// Moves focus to `target` (or clears it). Returns whether focus changed.
    ///
    /// The previous control loses its `focused` flag before the new one gains
    /// it; both raise `FocusChanged`.
    pub fn set_focus(
        &mut self,
        tree: &mut ControlTree,
        target: Option<ControlId>,
    ) -> Result<bool> {
        if let Some(target) = target {
            let state = tree.state(target)?;
            if !Self::can_take_focus(tree, target) {
                return Err(Error::CannotFocus {
                    name: state.name.clone(),
                });
            }
        }
        if self.focused == target {
            return Ok(false);
        }

        let previous = self.focused.take();
        if let Some(previous) = previous {
            if let Ok(state) = tree.state_mut(previous) {
                state.focused = false;
                tree.emit(previous, &mut ControlEvent::FocusChanged { focused: false });
            }
        }
        if let Some(next) = target {
            tree.state_mut(next)?.focused = true;
            tree.emit(next, &mut ControlEvent::FocusChanged { focused: true });
        }
        debug!(from = ?previous, to = ?target, "focus changed");
        self.focused = target;
        Ok(true)
    }

    pub fn clear(&mut self, tree: &mut ControlTree) -> bool {
        self.set_focus(tree, None).unwrap_or(false)
    }

    pub fn focus_next(&mut self, tree: &mut ControlTree) -> Result<Option<ControlId>> {
        self.step(tree, true)
    }

    pub fn focus_previous(&mut self, tree: &mut ControlTree) -> Result<Option<ControlId>> {
        self.step(tree, false)
    }

    fn step(&mut self, tree: &mut ControlTree, forward: bool) -> Result<Option<ControlId>> {
        let order: Vec<ControlId> = Self::tab_order(tree)
            .into_iter()
            .filter(|id| Self::can_take_focus(tree, *id))
            .collect();
        let position = self
            .focused
            .and_then(|focused| order.iter().position(|id| *id == focused));
        let len = order.len();
        let next = match (position, len) {
            (_, 0) => None,
            (None, _) if forward => order.first().copied(),
            (None, _) => order.last().copied(),
            (Some(idx), _) if forward => Some(order[(idx + 1) % len]),
            (Some(idx), _) => Some(order[(idx + len - 1) % len]),
        };
        self.set_focus(tree, next)?;
        Ok(next)
    }

    /// Drops focus when the focused control can no longer hold it (removed,
    /// hidden or disabled). Returns whether focus was cleared.
    pub fn revalidate(&mut self, tree: &mut ControlTree) -> bool {
        match self.focused {
            Some(id) if !tree.contains(id) => {
                self.focused = None;
                true
            }
            Some(id) if !Self::can_take_focus(tree, id) => self.clear(tree),
            _ => false,
        }
    }

    /// Cursor size for the focused control: its own override, else the
    /// nearest ancestor's, else `default`.
    pub fn cursor_size(&self, tree: &ControlTree, default: u8) -> u8 {
        self.focused
            .and_then(|id| tree.inherited_cursor_size(id))
            .unwrap_or(default)
    }
}

fn collect_tab_order(tree: &ControlTree, siblings: &[ControlId], out: &mut Vec<ControlId>) {
    let mut ordered: Vec<(i32, usize, ControlId)> = siblings
        .iter()
        .enumerate()
        .filter_map(|(index, id)| Some((tree.state(*id).ok()?.tab_order, index, *id)))
        .collect();
    ordered.sort_by_key(|(tab_order, index, _)| (*tab_order, *index));

    for (_, _, id) in ordered {
        let Ok(state) = tree.state(id) else {
            continue;
        };
        if state.enabled && state.can_focus && state.tab_stop {
            out.push(id);
        }
        collect_tab_order(tree, &state.children, out);
    }
}
