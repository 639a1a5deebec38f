//! **linebar** — show the latest line pushed over a local TCP socket.
//!
//! Any tool that can open a TCP connection (an editor hook, a shell script,
//! `linebar-send`) writes newline-delimited text to the server; the most
//! recently received line becomes the status label.
//!
//! # Architecture
//!
//! * [`ipc::listener::LineServer`] accepts unbounded concurrent connections,
//!   one thread each, and hands every trimmed line to a single callback.
//!   Callback invocations are serialized.
//! * [`bridge::AppContext`] registers that callback, forwards lines into a
//!   channel and owns the current display value and lifecycle.
//! * [`traits::StatusDisplay`] abstracts the surface that shows the line so
//!   the context is not coupled to GTK.  Concrete surfaces live in
//!   [`display`].

pub mod bridge;
pub mod config;
pub mod display;
pub mod ipc;
pub mod traits;
