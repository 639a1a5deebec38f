//! Line splitting for the wire protocol.
//!
//! Clients send plain UTF-8 text separated by `\n`.  There is no framing
//! header and no acknowledgment.  Each line is trimmed of its newline and
//! any trailing whitespace before it is handed on; leading whitespace is
//! kept as sent.

use std::io::BufRead;

/// Strip the newline and any trailing whitespace from a raw line.
pub fn trim_line(raw: &str) -> &str {
    raw.trim_end()
}

/// Read `reader` to the end, calling `on_line` with every trimmed line in
/// stream order.
///
/// Only the line currently being read is buffered.  A final chunk with no
/// trailing newline is delivered like any other line.  Returns the number
/// of lines delivered, or the first read error (including invalid UTF-8),
/// at which point reading stops.
pub fn read_lines<R, F>(mut reader: R, mut on_line: F) -> std::io::Result<usize>
where
    R: BufRead,
    F: FnMut(&str),
{
    let mut buf = String::new();
    let mut count = 0;
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            return Ok(count);
        }
        on_line(trim_line(&buf));
        count += 1;
    }
}
