//! Draw inhibition: nested defer scopes coalesce into one redraw.

#[derive(Debug, Default)]
pub struct DrawScheduler {
    inhibit: usize,
    dirty: bool,
}

impl DrawScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&mut self) {
        self.inhibit += 1;
    }

    /// Closes one defer scope.
    ///
    /// Returns `true` when this closed the outermost scope and something was
    /// invalidated inside it, i.e. when the caller must redraw now. An
    /// unmatched release is ignored.
    pub fn release(&mut self) -> bool {
        if self.inhibit == 0 {
            return false;
        }
        self.inhibit -= 1;
        self.inhibit == 0 && std::mem::take(&mut self.dirty)
    }

    /// Marks visible state as changed; the next outermost release redraws.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_inhibited(&self) -> bool {
        self.inhibit > 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn depth(&self) -> usize {
        self.inhibit
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
