//! Push lines to a running linebar.
//!
//! Run with:
//!     linebar-send [--port N] [TEXT...]
//!
//! With `TEXT`, the words are joined with spaces and sent as one line.
//! Without it, stdin is forwarded line by line until EOF, so the last line
//! piped in is what the label ends up showing:
//!
//!     echo "0:25 Review" | linebar-send

use linebar::config::{config_dir, port_from_arg, Config};
use linebar::ipc::listener::DEFAULT_HOST;
use log::{debug, error};
use std::io::{BufRead, Write};
use std::net::TcpStream;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1).peekable();
    let mut port = Config::load(&config_dir().join("config.json"))
        .map(|c| c.server.port)
        .unwrap_or_else(|_| Config::default().server.port);

    if args.peek().map(String::as_str) == Some("--port") {
        args.next();
        match port_from_arg(args.next().as_deref()) {
            Some(p) => port = p,
            None => {
                error!("--port needs a port number");
                std::process::exit(2);
            }
        }
    }
    let words: Vec<String> = args.collect();

    if let Err(e) = send(port, &words) {
        error!("failed to send to {}:{}: {}", DEFAULT_HOST, port, e);
        std::process::exit(1);
    }
}

fn send(port: u16, words: &[String]) -> std::io::Result<()> {
    let mut stream = TcpStream::connect((DEFAULT_HOST, port))?;
    debug!("connected to {}", stream.peer_addr()?);

    if !words.is_empty() {
        writeln!(stream, "{}", words.join(" "))?;
        return stream.flush();
    }

    for line in std::io::stdin().lock().lines() {
        writeln!(stream, "{}", line?)?;
    }
    stream.flush()
}
