//! The application context that connects the line server to a display.
//!
//! [`AppContext`] owns everything that used to be ambient state: the
//! current display value, the running server and the lifecycle.  It
//! registers the server's one callback, which forwards every line into a
//! channel.  The display loop is the only consumer of that channel, so
//! concurrent connections never touch display state directly.
//!
//! ```text
//! conn thread ─┐
//! conn thread ─┼─ callback (serialized) ─▶ mpsc ─▶ AppContext::pump ─▶ StatusDisplay
//! conn thread ─┘
//! ```

use crate::config::ServerConfig;
use crate::ipc::listener::{LineServer, ServerError, ServerHandle};
use crate::traits::StatusDisplay;
use log::{debug, info};
use std::net::SocketAddr;
use std::sync::mpsc;

/// Errors from driving the application lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Server(#[from] ServerError),
    /// The requested transition is not valid from the current state.
    #[error("cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: Lifecycle,
    },
}

/// Lifecycle of the application.  `Terminated` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    NotStarted,
    Running,
    Terminated,
}

/// Explicit application state shared between the server and the display.
pub struct AppContext {
    server_config: ServerConfig,
    state: Lifecycle,
    current: Option<String>,
    server: Option<ServerHandle>,
    line_rx: Option<mpsc::Receiver<String>>,
}

impl AppContext {
    /// Create a context that will listen according to `server_config`.
    pub fn new(server_config: ServerConfig) -> Self {
        Self {
            server_config,
            state: Lifecycle::NotStarted,
            current: None,
            server: None,
            line_rx: None,
        }
    }

    /// Bind the server, register the line callback and start accepting.
    ///
    /// Returns the address the server listens on.  A bind failure leaves
    /// the context in [`Lifecycle::NotStarted`].
    pub fn start(&mut self) -> Result<SocketAddr, BridgeError> {
        if self.state != Lifecycle::NotStarted {
            return Err(BridgeError::InvalidState {
                action: "start",
                state: self.state,
            });
        }

        let mut server = LineServer::bind(&self.server_config.host, self.server_config.port)?;
        let (tx, rx) = mpsc::channel::<String>();
        server.on_line(move |line| {
            // The receiver is gone once the context is dropped; lines
            // arriving after that have nowhere to go.
            let _ = tx.send(line.to_string());
        });
        let handle = server.start()?;
        let addr = handle.local_addr();

        self.server = Some(handle);
        self.line_rx = Some(rx);
        self.state = Lifecycle::Running;
        info!("running, accepting lines on {}", addr);
        Ok(addr)
    }

    /// Drain every pending line without blocking and keep only the last.
    ///
    /// Returns the new display value if any line arrived since the last
    /// call.  Always `None` unless the context is running.
    pub fn pump(&mut self) -> Option<&str> {
        if self.state != Lifecycle::Running {
            return None;
        }
        let latest = self.line_rx.as_ref()?.try_iter().last()?;
        Some(self.replace(latest))
    }

    /// Block until the next line arrives and make it the display value.
    ///
    /// Returns `None` when the context is not running or the server side
    /// of the channel has gone away.
    pub fn wait(&mut self) -> Option<&str> {
        if self.state != Lifecycle::Running {
            return None;
        }
        let line = self.line_rx.as_ref()?.recv().ok()?;
        Some(self.replace(line))
    }

    /// Push the latest line, if any, to `display`.  Returns whether the
    /// display was updated.
    pub fn refresh<D: StatusDisplay + ?Sized>(&mut self, display: &mut D) -> bool {
        match self.pump() {
            Some(text) => {
                display.set_text(text);
                true
            }
            None => false,
        }
    }

    /// The text currently shown, if any line has arrived yet.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Address of the running server.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(ServerHandle::local_addr)
    }

    /// Enter the terminal state.  The caller exits the process afterwards,
    /// which closes the listener and every connection.
    pub fn terminate(&mut self) {
        if self.state != Lifecycle::Terminated {
            info!("terminating ({:?} -> Terminated)", self.state);
            self.state = Lifecycle::Terminated;
            self.line_rx = None;
        }
    }

    fn replace(&mut self, text: String) -> &str {
        debug!("display <- {:?}", text);
        self.current.insert(text).as_str()
    }
}
