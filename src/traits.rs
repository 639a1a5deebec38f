//! The seam between the line server and whatever shows its output.
//!
//! The [`AppContext`](crate::bridge::AppContext) only ever talks to a
//! [`StatusDisplay`]; the GTK label and the stdout printer are two
//! implementations of it.

/// A surface that shows a single line of text.
///
/// Each call replaces what was shown before.  Implementations do not keep
/// history.
pub trait StatusDisplay {
    /// Show `text`, replacing the previous value.
    fn set_text(&mut self, text: &str);
}
