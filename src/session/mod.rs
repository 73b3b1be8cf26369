pub mod context;
pub mod controller;
pub mod state;

pub use context::SessionContext;
pub use controller::{spawn_child_watcher, spawn_controller, SessionController, Trigger};
pub use state::{SessionState, SharedState};
