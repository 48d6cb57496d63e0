//! Control tree: ownership, ordering and coordinate transforms.

use crate::core::color::{ConsoleColor, ControlColors, EffectiveColors};
use crate::core::control::{Control, ControlEvent, ControlId, ControlState, Widget, WindowId};
use crate::core::geometry::{Point, Rect};
use crate::error::{Error, Result};
use crate::runtime::subscription::{SubscriptionId, Subscribers};

pub(crate) struct Node {
    pub(crate) state: ControlState,
    /// `None` only while the widget's own handler is running.
    pub(crate) widget: Option<Box<dyn Widget>>,
    pub(crate) subscribers: Subscribers<ControlEvent>,
}

#[derive(Default)]
struct Slot {
    /// Bumped every time the slot is vacated.
    generation: u32,
    node: Option<Node>,
}

/// Controls of one window, addressed by never-reused `ControlId`s.
///
/// Nodes live in a slot arena; removing a control frees its slot for the
/// next insert and bumps the slot generation so stale ids stay invalid.
pub struct ControlTree {
    window: WindowId,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    roots: Vec<ControlId>,
}

impl ControlTree {
    pub fn new(window: WindowId) -> Self {
        Self {
            window,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            roots: Vec::new(),
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn len(&self) -> usize {
        self.live
    }

    /// Allocated slots, occupied or free.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.node(id).is_ok()
    }

    /// Attaches `control` (and its children) under `parent`, or as a root.
    ///
    /// Ownership of the whole subtree is checked before anything is attached.
    pub fn insert(&mut self, parent: Option<ControlId>, control: Control) -> Result<ControlId> {
        self.validate(parent, &control)?;
        Ok(self.insert_unchecked(parent, control))
    }

    /// Checks everything `insert` would reject without attaching anything.
    pub fn validate(&self, parent: Option<ControlId>, control: &Control) -> Result<()> {
        control.check_owner(self.window)?;
        check_areas(control)?;
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        Ok(())
    }

    pub(crate) fn insert_unchecked(&mut self, parent: Option<ControlId>, control: Control) -> ControlId {
        let Control {
            mut state,
            widget,
            children,
            ..
        } = control;
        state.parent = parent;
        state.children.clear();
        state.focused = false;
        state.can_focus = widget.can_focus();
        let id = self.occupy(Node {
            state,
            widget: Some(widget),
            subscribers: Subscribers::new(),
        });
        match parent.and_then(|parent| self.node_mut(parent).ok()) {
            Some(parent) => parent.state.children.push(id),
            None => self.roots.push(id),
        }
        for child in children {
            self.insert_unchecked(Some(id), child);
        }
        id
    }

    fn occupy(&mut self, node: Node) -> ControlId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.node = Some(node);
        self.live += 1;
        ControlId::new(self.window, index, slot.generation)
    }

    /// Vacates the slot of a live `id`, retiring the id.
    fn vacate(&mut self, id: ControlId) -> Option<Node> {
        self.slot_of(id)?;
        let slot = self.slots.get_mut(id.index() as usize)?;
        let node = slot.node.take()?;
        self.live -= 1;
        // An exhausted slot is retired instead of wrapping into old ids.
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push(id.index());
        }
        Some(node)
    }

    fn slot_of(&self, id: ControlId) -> Option<&Slot> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation() && slot.node.is_some())
    }

    /// Detaches `id` and its subtree. Subscriptions of every removed control
    /// are dropped before returning.
    pub fn remove(&mut self, id: ControlId) -> Result<Control> {
        let parent = self.node(id)?.state.parent;
        match parent.and_then(|parent| self.node_mut(parent).ok()) {
            Some(parent) => parent.state.children.retain(|child| *child != id),
            None => self.roots.retain(|root| *root != id),
        }
        self.extract(id)
    }

    fn extract(&mut self, id: ControlId) -> Result<Control> {
        let node = self.vacate(id).ok_or(Error::ControlNotFound(id))?;
        let Node {
            mut state,
            widget,
            mut subscribers,
        } = node;
        subscribers.clear();
        let widget = widget.ok_or(Error::ControlNotFound(id))?;

        let mut children = Vec::with_capacity(state.children.len());
        for child in std::mem::take(&mut state.children) {
            children.push(self.extract(child)?);
        }
        state.parent = None;
        state.focused = false;

        let mut control = Control::new(self.window, widget);
        control.state = state;
        control.children = children;
        Ok(control)
    }

    pub(crate) fn node(&self, id: ControlId) -> Result<&Node> {
        if id.window() != self.window {
            return Err(Error::CrossWindowOwnership);
        }
        self.slot_of(id)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(Error::ControlNotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: ControlId) -> Result<&mut Node> {
        if id.window() != self.window {
            return Err(Error::CrossWindowOwnership);
        }
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
            .ok_or(Error::ControlNotFound(id))
    }

    pub fn state(&self, id: ControlId) -> Result<&ControlState> {
        self.node(id).map(|node| &node.state)
    }

    pub fn state_mut(&mut self, id: ControlId) -> Result<&mut ControlState> {
        self.node_mut(id).map(|node| &mut node.state)
    }

    pub(crate) fn take_widget(&mut self, id: ControlId) -> Result<Box<dyn Widget>> {
        self.node_mut(id)?
            .widget
            .take()
            .ok_or(Error::ControlNotFound(id))
    }

    /// Puts a widget back after its handler ran; dropped if the node is gone.
    pub(crate) fn restore_widget(&mut self, id: ControlId, widget: Box<dyn Widget>) {
        if let Ok(node) = self.node_mut(id) {
            node.state.can_focus = widget.can_focus();
            node.widget = Some(widget);
        }
    }

    pub(crate) fn widget(&self, id: ControlId) -> Option<&dyn Widget> {
        self.node(id).ok()?.widget.as_deref()
    }

    /// Direct children of `parent`, or the root controls, in insertion order.
    pub fn children(&self, parent: Option<ControlId>) -> Result<&[ControlId]> {
        match parent {
            Some(parent) => Ok(&self.state(parent)?.children),
            None => Ok(&self.roots),
        }
    }

    pub fn roots(&self) -> &[ControlId] {
        &self.roots
    }

    /// Parent first, root last.
    pub fn ancestors(&self, id: ControlId) -> Vec<ControlId> {
        let mut out = Vec::new();
        let mut current = self.state(id).ok().and_then(|state| state.parent);
        while let Some(parent) = current {
            out.push(parent);
            current = self.state(parent).ok().and_then(|state| state.parent);
        }
        out
    }

    /// Every control, parents before children, siblings in insertion order.
    pub fn pre_order(&self) -> Vec<ControlId> {
        let mut out = Vec::with_capacity(self.live);
        let mut stack: Vec<ControlId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Ok(state) = self.state(id) {
                stack.extend(state.children.iter().rev().copied());
            }
        }
        out
    }

    /// Console position of the origin `id`'s area is relative to.
    fn parent_origin(&self, id: ControlId) -> Result<Point> {
        let mut origin = Point::ZERO;
        for ancestor in self.ancestors(id) {
            origin = origin + self.state(ancestor)?.client_area().location();
        }
        Ok(origin)
    }

    pub fn absolute_area(&self, id: ControlId) -> Result<Rect> {
        let origin = self.parent_origin(id)?;
        Ok(self.state(id)?.area.offset(origin))
    }

    pub fn absolute_client_area(&self, id: ControlId) -> Result<Rect> {
        let origin = self.parent_origin(id)?;
        Ok(self.state(id)?.client_area().offset(origin))
    }

    /// Part of `id`'s area not cut off by an ancestor's client area.
    pub fn visible_area(&self, id: ControlId) -> Result<Rect> {
        let mut area = self.absolute_area(id)?;
        for ancestor in self.ancestors(id) {
            area = area.intersect(self.absolute_client_area(ancestor)?);
        }
        Ok(area)
    }

    /// Converts a point in `id`'s client coordinates to console coordinates.
    pub fn point_to_console(&self, id: ControlId, client_point: Point) -> Result<Point> {
        Ok(client_point + self.absolute_client_area(id)?.location())
    }

    pub fn point_to_client(&self, id: ControlId, console_point: Point) -> Result<Point> {
        Ok(console_point - self.absolute_client_area(id)?.location())
    }

    /// Visible itself and through every ancestor.
    pub fn is_effectively_visible(&self, id: ControlId) -> bool {
        self.state(id).is_ok_and(|state| state.visible)
            && self
                .ancestors(id)
                .iter()
                .all(|a| self.state(*a).is_ok_and(|state| state.visible))
    }

    pub fn is_effectively_enabled(&self, id: ControlId) -> bool {
        self.state(id).is_ok_and(|state| state.enabled)
            && self
                .ancestors(id)
                .iter()
                .all(|a| self.state(*a).is_ok_and(|state| state.enabled))
    }

    /// Resolves the colors `id` is drawn with.
    ///
    /// Normal colors come from the control, else its nearest ancestor that
    /// sets them, else the window defaults. Disabled controls use their
    /// disabled colors, enabled focused controls their focused colors, each
    /// falling back to the normal color.
    pub fn effective_colors(
        &self,
        id: ControlId,
        defaults: EffectiveColors,
    ) -> Result<EffectiveColors> {
        let state = self.state(id)?;
        let mut chain = vec![state.colors];
        for ancestor in self.ancestors(id) {
            chain.push(self.state(ancestor)?.colors);
        }
        let inherit = |pick: fn(&ControlColors) -> Option<ConsoleColor>, default| {
            chain.iter().find_map(pick).unwrap_or(default)
        };
        let normal = EffectiveColors {
            foreground: inherit(|c| c.foreground, defaults.foreground),
            background: inherit(|c| c.background, defaults.background),
            border: inherit(|c| c.border, defaults.border),
        };

        let own = &state.colors;
        Ok(if !state.enabled {
            EffectiveColors {
                foreground: own.disabled_foreground.unwrap_or(normal.foreground),
                background: own.disabled_background.unwrap_or(normal.background),
                border: own.disabled_border.unwrap_or(normal.border),
            }
        } else if state.focused {
            EffectiveColors {
                foreground: own.focused_foreground.unwrap_or(normal.foreground),
                background: own.focused_background.unwrap_or(normal.background),
                border: own.focused_border.unwrap_or(normal.border),
            }
        } else {
            normal
        })
    }

    /// Cursor size override of `id` or its nearest ancestor.
    pub fn inherited_cursor_size(&self, id: ControlId) -> Option<u8> {
        let own = self.state(id).ok()?.cursor_size;
        own.or_else(|| {
            self.ancestors(id)
                .into_iter()
                .find_map(|a| self.state(a).ok().and_then(|state| state.cursor_size))
        })
    }

    pub fn subscribe<F>(&mut self, id: ControlId, callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(&mut ControlEvent) + Send + 'static,
    {
        Ok(self.node_mut(id)?.subscribers.subscribe(callback))
    }

    pub fn unsubscribe(&mut self, id: ControlId, subscription: SubscriptionId) -> Result<bool> {
        Ok(self.node_mut(id)?.subscribers.unsubscribe(subscription))
    }

    pub fn emit(&mut self, id: ControlId, event: &mut ControlEvent) {
        if let Ok(node) = self.node_mut(id) {
            node.subscribers.emit(event);
        }
    }
}

fn check_areas(control: &Control) -> Result<()> {
    let area = control.state.area;
    if area.width < 0 || area.height < 0 {
        return Err(Error::invalid_argument(
            "area",
            format!("negative size {}x{}", area.width, area.height),
        ));
    }
    control.children.iter().try_for_each(check_areas)
}
