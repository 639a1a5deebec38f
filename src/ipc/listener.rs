//! TCP line server.
//!
//! Binds a TCP socket and accepts any number of concurrent connections.
//! Every connection gets its own thread, which splits the incoming bytes
//! into lines and hands each trimmed line to the single registered
//! callback.
//!
//! # Wire format
//!
//! Plain UTF-8 text, one message per line, fire-and-forget:
//!
//! ```text
//! Writing the report
//! 0:25 Review
//! ```
//!
//! # Callback
//!
//! There is exactly one subscriber.  [`LineServer::on_line`] replaces any
//! earlier registration, and [`LineServer::start`] consumes the server so
//! nothing can be registered once connections are being served.  This is
//! not a publish/subscribe mechanism.
//!
//! Invocations of the callback are serialized behind a mutex: lines from
//! one connection arrive in stream order, lines from different connections
//! race and the last invocation to complete wins.

use crate::ipc::line::read_lines;
use log::{debug, error, info, trace, warn};
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Host used by [`LineServer::new`].
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 65432;

/// Pause after a failed `accept`, so running out of file descriptors does
/// not turn the accept thread into a busy loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The single line subscriber.
pub type LineCallback = Box<dyn FnMut(&str) + Send + 'static>;

type SharedCallback = Arc<Mutex<Option<LineCallback>>>;

/// Errors produced by the line server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound (address in use,
    /// insufficient privilege, ...).  Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bound, not yet started, line server.
pub struct LineServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    callback: Option<LineCallback>,
}

impl LineServer {
    /// Bind on [`DEFAULT_HOST`] at `port`.
    pub fn new(port: u16) -> Result<Self, ServerError> {
        Self::bind(DEFAULT_HOST, port)
    }

    /// Bind a listening socket on `host:port`.
    ///
    /// Port `0` picks a free ephemeral port; see [`local_addr`](Self::local_addr).
    pub fn bind(host: &str, port: u16) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((host, port)).map_err(|source| ServerError::Bind {
            addr: format!("{}:{}", host, port),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        info!("listening on {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            callback: None,
        })
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Register the callback that receives every line.
    ///
    /// Replaces a previous registration.  Without a callback, received
    /// lines are dropped.
    pub fn on_line<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Start accepting connections on a dedicated thread.
    ///
    /// Returns immediately.  The accept loop runs until the process exits.
    pub fn start(self) -> Result<ServerHandle, ServerError> {
        let callback: SharedCallback = Arc::new(Mutex::new(self.callback));
        let listener = self.listener;
        thread::Builder::new()
            .name("linebar-accept".into())
            .spawn(move || accept_loop(listener.incoming(), callback))?;
        Ok(ServerHandle {
            local_addr: self.local_addr,
        })
    }
}

/// A running line server.
///
/// Dropping the handle does not stop the server; the listener and its
/// connections live until the process exits.
pub struct ServerHandle {
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// The address the server accepts connections on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

//  Accept loop and connection handlers

fn accept_loop<I>(incoming: I, callback: SharedCallback)
where
    I: Iterator<Item = std::io::Result<TcpStream>>,
{
    for stream in incoming {
        match stream {
            Ok(stream) => spawn_handler(stream, Arc::clone(&callback)),
            Err(e) => {
                error!("accept error: {}", e);
                thread::sleep(ACCEPT_BACKOFF);
            }
        }
    }
}

fn spawn_handler(stream: TcpStream, callback: SharedCallback) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".into());
    let name = format!("linebar-conn-{}", peer);
    let thread_peer = peer.clone();
    let spawned = thread::Builder::new()
        .name(name)
        .spawn(move || handle_connection(stream, &thread_peer, &callback));
    if let Err(e) = spawned {
        // The closure, and with it the stream, is dropped here.
        error!("failed to spawn handler for {}: {}", peer, e);
    }
}

/// Serve one client until it disconnects or errors.  The stream is owned
/// by this function and closed when it returns.
fn handle_connection(stream: TcpStream, peer: &str, callback: &Mutex<Option<LineCallback>>) {
    debug!("client connected: {}", peer);
    let reader = BufReader::new(stream);
    match read_lines(reader, |line| dispatch(callback, line)) {
        Ok(n) => debug!("client disconnected: {} ({} lines)", peer, n),
        Err(e) => warn!("read error from {}: {}", peer, e),
    }
}

fn dispatch(callback: &Mutex<Option<LineCallback>>, line: &str) {
    // A callback that panicked on another connection must not silence
    // this one.
    let mut guard = callback.lock().unwrap_or_else(PoisonError::into_inner);
    match guard.as_mut() {
        Some(cb) => {
            debug!("received {:?}", line);
            cb(line);
        }
        None => trace!("no callback registered, dropping {:?}", line),
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;
    use std::net::Shutdown;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Helper: start a server on an ephemeral port whose callback forwards
    /// every line into a channel.
    fn start_collecting() -> (ServerHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        let mut server = LineServer::bind(DEFAULT_HOST, 0).expect("bind");
        server.on_line(move |line| {
            let _ = tx.send(line.to_string());
        });
        (server.start().expect("start"), rx)
    }

    fn send(addr: SocketAddr, payload: &[u8]) {
        let mut stream = TcpStream::connect(addr).expect("connect");
        stream.write_all(payload).unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
    }

    fn recv_n(rx: &mpsc::Receiver<String>, n: usize) -> Vec<String> {
        (0..n).map(|_| rx.recv_timeout(TIMEOUT).expect("line")).collect()
    }

    #[test]
    fn single_line_is_trimmed() {
        let (server, rx) = start_collecting();
        send(server.local_addr(), b"hello\n");
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "hello");
    }

    #[test]
    fn lines_on_one_connection_keep_order() {
        let (server, rx) = start_collecting();
        send(server.local_addr(), b"foo\nbar  \r\n");
        assert_eq!(recv_n(&rx, 2), vec!["foo", "bar"]);
    }

    #[test]
    fn concurrent_connections_deliver_every_line() {
        let (server, rx) = start_collecting();
        let addr = server.local_addr();
        let clients: Vec<_> = (0..16)
            .map(|i| std::thread::spawn(move || send(addr, format!("C{}\n", i).as_bytes())))
            .collect();
        for c in clients {
            c.join().unwrap();
        }

        let got: HashSet<String> = recv_n(&rx, 16).into_iter().collect();
        let want: HashSet<String> = (0..16).map(|i| format!("C{}", i)).collect();
        assert_eq!(got, want);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn per_connection_order_survives_interleaving() {
        let (server, rx) = start_collecting();
        let addr = server.local_addr();
        let clients: Vec<_> = ["A", "B", "C"]
            .into_iter()
            .map(|tag| {
                std::thread::spawn(move || {
                    let payload: String = (0..50).map(|n| format!("{}{}\n", tag, n)).collect();
                    send(addr, payload.as_bytes());
                })
            })
            .collect();
        for c in clients {
            c.join().unwrap();
        }

        let got = recv_n(&rx, 150);
        for tag in ["A", "B", "C"] {
            let seq: Vec<u32> = got
                .iter()
                .filter_map(|l| l.strip_prefix(tag))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(seq, (0..50).collect::<Vec<_>>(), "order for {}", tag);
        }
    }

    #[test]
    fn listener_keeps_accepting_after_disconnect() {
        let (server, rx) = start_collecting();
        let addr = server.local_addr();

        // Abrupt close without a newline-terminated line.
        drop(TcpStream::connect(addr).unwrap());
        send(addr, b"first\n");
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "first");

        send(addr, b"second\n");
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "second");
    }

    #[test]
    fn invalid_utf8_only_ends_its_own_connection() {
        let (server, rx) = start_collecting();
        let addr = server.local_addr();

        let mut healthy = TcpStream::connect(addr).unwrap();
        send(addr, b"bad\n\xff\xfe\nlost\n");
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "bad");

        healthy.write_all(b"still here\n").unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "still here");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn lines_without_callback_are_dropped() {
        let server = LineServer::bind(DEFAULT_HOST, 0).unwrap().start().unwrap();
        let addr = server.local_addr();
        send(addr, b"nobody listens\n");
        send(addr, b"still nobody\n");
        std::thread::sleep(Duration::from_millis(100));
        TcpStream::connect(addr).expect("listener still accepts");
    }

    #[test]
    fn last_registration_wins() {
        let (tx, rx) = mpsc::channel();
        let first_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&first_calls);

        let mut server = LineServer::bind(DEFAULT_HOST, 0).unwrap();
        server.on_line(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        server.on_line(move |line| {
            let _ = tx.send(line.to_string());
        });
        let server = server.start().unwrap();

        send(server.local_addr(), b"x\n");
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "x");
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callback_invocations_never_overlap() {
        let busy = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let mut server = LineServer::bind(DEFAULT_HOST, 0).unwrap();
        {
            let busy = Arc::clone(&busy);
            let overlaps = Arc::clone(&overlaps);
            server.on_line(move |line| {
                if busy.swap(true, Ordering::SeqCst) {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_millis(2));
                busy.store(false, Ordering::SeqCst);
                let _ = tx.send(line.to_string());
            });
        }
        let server = server.start().unwrap();
        let addr = server.local_addr();

        let clients: Vec<_> = (0..8)
            .map(|i| std::thread::spawn(move || send(addr, format!("{0}a\n{0}b\n", i).as_bytes())))
            .collect();
        for c in clients {
            c.join().unwrap();
        }
        recv_n(&rx, 16);
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn binding_a_taken_port_fails() {
        let first = LineServer::bind(DEFAULT_HOST, 0).unwrap();
        let port = first.local_addr().port();
        match LineServer::bind(DEFAULT_HOST, port) {
            Err(ServerError::Bind { addr, .. }) => {
                assert_eq!(addr, format!("{}:{}", DEFAULT_HOST, port))
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("second bind on port {} succeeded", port),
        }
    }

    #[test]
    fn accept_errors_back_off_and_loop_recovers() {
        let listener = TcpListener::bind((DEFAULT_HOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        let callback: LineCallback = Box::new(move |line| {
            let _ = tx.send(line.to_string());
        });
        let callback: SharedCallback = Arc::new(Mutex::new(Some(callback)));

        // Three failed accepts (as when out of file descriptors), then a
        // real connection.
        let failures = (0..3).map(|_| {
            Err::<TcpStream, _>(std::io::Error::new(
                std::io::ErrorKind::Other,
                "too many open files",
            ))
        });

        let started = std::time::Instant::now();
        let accept = std::thread::spawn(move || {
            accept_loop(failures.chain(listener.incoming().take(1)), callback)
        });
        send(addr, b"recovered\n");

        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "recovered");
        accept.join().unwrap();
        assert!(started.elapsed() >= ACCEPT_BACKOFF * 3);
    }

    #[test]
    fn new_binds_the_default_host() {
        let (tx, rx) = mpsc::channel();
        let mut server = LineServer::new(0).expect("bind");
        assert_eq!(server.local_addr().ip().to_string(), DEFAULT_HOST);
        server.on_line(move |line| {
            let _ = tx.send(line.to_string());
        });
        let server = server.start().unwrap();

        send(server.local_addr(), b"via new\n");
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "via new");
    }
}
