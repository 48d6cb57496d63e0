//! Crate-wide error type.

use thiserror::Error;

use crate::core::control::ControlId;

#[derive(Debug, Error)]
pub enum Error {
    /// A second window was constructed while another one is still live.
    #[error("only one console window may be live at a time")]
    WindowAlreadyLive,

    /// The window has been disposed; it no longer accepts mutations.
    #[error("console window has been disposed")]
    Disposed,

    /// The control was removed from the tree (or never attached).
    #[error("control {0:?} is not attached to this window")]
    ControlNotFound(ControlId),

    /// A control or id belonging to another window was used here.
    #[error("control belongs to a different window")]
    CrossWindowOwnership,

    #[error("control `{name}` cannot be focused")]
    CannotFocus { name: String },

    /// A native console operation failed. `code` is the OS error code, or -1.
    #[error("console backend operation `{op}` failed (code {code})")]
    Backend { op: &'static str, code: i32 },

    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

impl Error {
    pub fn backend(op: &'static str, err: std::io::Error) -> Self {
        Self::Backend {
            op,
            code: err.raw_os_error().unwrap_or(-1),
        }
    }

    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// Lifecycle errors: second window, disposed window, detached control.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::WindowAlreadyLive | Self::Disposed | Self::ControlNotFound(_)
        )
    }

    /// Ownership errors: cross-window use, focusing an unfocusable control.
    pub fn is_ownership(&self) -> bool {
        matches!(self, Self::CrossWindowOwnership | Self::CannotFocus { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
