//! Panel widget: a plain container.

use std::any::Any;

use crate::core::control::Widget;

#[derive(Debug, Default)]
pub struct Panel;

impl Panel {
    pub fn new() -> Self {
        Self
    }
}

impl Widget for Panel {
    fn type_name(&self) -> &'static str {
        "Panel"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
