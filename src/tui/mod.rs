//! Thin terminal renderer over the store. Deliberately shallow: the core
//! design lives in the collector and analysis engine, not here.

mod terminal;

pub use terminal::TerminalRenderer;

use std::time::Duration;

use crate::store::Store;

/// What the event loop needs from whatever is drawing the screen this
/// run: headless mode uses a no-op, interactive mode uses `TerminalRenderer`.
pub trait Renderer {
    fn init(&mut self) {}
    /// Non-blocking: returns promptly even if nothing happened.
    fn poll(&mut self, _timeout: Duration) {}
    fn draw(&mut self, _store: &Store) {}
    fn shutdown(&mut self) {}
    fn wants_quit(&self) -> bool {
        false
    }
}

/// Used in `--headless` mode; does nothing.
#[derive(Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {}
