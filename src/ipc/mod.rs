//! TCP ingestion of text lines.
//!
//! External tools (editor hooks, shell scripts, `linebar-send`) connect to
//! the server socket and send newline-delimited text.

pub mod line;
pub mod listener;
