//! Surfaces that show the latest line.
//!
//! When the `display-gtk` feature is enabled, [`gtk::run_main_loop`] takes
//! over the main thread and renders the line as a status label.  The
//! [`stdout`] display works everywhere and is used for `--headless`.

#[cfg(feature = "display-gtk")]
pub mod gtk;
pub mod stdout;
