use crossterm::terminal;
use crossterm::tty::IsTty;

use crate::error::{Result, TattleError};
use crate::event::WindowSize;

use super::LocalTerminal;

/// The local terminal the session runs on.
///
/// crossterm saves the terminal's settings when raw mode is entered and puts
/// them back on [`LocalTerminal::restore`].
pub struct Tty {
    _private: (),
}

impl Tty {
    /// Check that `source` is a terminal before the session takes it over.
    pub fn capture(source: &impl IsTty) -> Result<Self> {
        if !source.is_tty() {
            return Err(TattleError::Terminal(
                "Unable to get terminal settings: input is not a terminal".into(),
            ));
        }
        Ok(Self { _private: () })
    }

    pub fn stdin() -> Result<Self> {
        Self::capture(&std::io::stdin())
    }

    /// Switch to raw mode with echo off. Input then reaches the session
    /// byte for byte.
    pub fn enter_raw(&self) -> Result<()> {
        terminal::enable_raw_mode()
            .map_err(|e| TattleError::Terminal(format!("Unable to enter raw mode: {}", e)))
    }
}

impl LocalTerminal for Tty {
    fn window_size(&self) -> Option<WindowSize> {
        match terminal::size() {
            Ok((cols, rows)) if cols > 0 && rows > 0 => Some(WindowSize::new(cols, rows)),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Failed to read window size: {}", e);
                None
            }
        }
    }

    fn restore(&self) {
        // A no-op when raw mode was never entered or is already left.
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("Failed to restore terminal settings: {}", e);
        }
    }
}
