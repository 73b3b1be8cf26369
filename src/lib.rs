pub mod app;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod pty;
pub mod queue;
pub mod relay;
pub mod session;
pub mod signals;
pub mod telemetry;
pub mod terminal;

pub use app::{run, RunSummary};
pub use config::TattleConfig;
pub use error::{Result, TattleError};
pub use event::{Event, Payload, WindowSize};
pub use queue::EventQueue;
