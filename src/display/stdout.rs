//! Headless [`StatusDisplay`] that prints each new line.

use crate::bridge::AppContext;
use crate::traits::StatusDisplay;
use log::{info, warn};
use std::io::Write;

/// Writes every displayed line to a writer (stdout by default), one per
/// line, flushing after each so pipes see updates immediately.
pub struct StdoutDisplay<W: Write = std::io::Stdout> {
    out: W,
}

impl StdoutDisplay {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl Default for StdoutDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> StdoutDisplay<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StatusDisplay for StdoutDisplay<W> {
    fn set_text(&mut self, text: &str) {
        let res = writeln!(self.out, "{}", text).and_then(|_| self.out.flush());
        if let Err(e) = res {
            warn!("failed to write line: {}", e);
        }
    }
}

/// Block on the context and show every line.
///
/// Headless mode has no quit action, so for a running context this only
/// returns when the process is killed.  A context that is not running
/// returns immediately.
pub fn run_headless<D: StatusDisplay>(ctx: &mut AppContext, display: &mut D) {
    match ctx.local_addr() {
        Some(addr) => info!("running headless, send lines to {}", addr),
        None => info!("running headless"),
    }
    while let Some(text) = ctx.wait() {
        display.set_text(text);
    }
}
