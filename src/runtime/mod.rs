//! Runtime: the control tree, focus, draw scheduling, input routing and the
//! window that owns them.

pub mod dispatch;
pub mod focus;
pub mod instance;
pub mod listener;
pub mod scheduler;
pub mod subscription;
pub mod tree;
pub mod window;

pub use focus::FocusChain;
pub use listener::{ConsoleListener, InputQueue};
pub use scheduler::DrawScheduler;
pub use subscription::{SubscriptionId, Subscribers};
pub use tree::ControlTree;
pub use window::{ControlsChanged, DrawDeferral, Window, WindowClosed, WindowEvents, WindowHandle};
