//! TCP server surface
//!
//! Binds a listener, accepts connections, and spawns one session task
//! per client. The mail store is shared across sessions; the
//! transcript sink may be too.

use crate::connection::{Session, Transcript};
use crate::error::{Error, Result};
use crate::mailstore::MailStore;
use crate::memstore::MemStore;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{error, info};

/// Default listen address: the IMAP port on all interfaces.
pub const DEFAULT_ADDR: &str = "0.0.0.0:143";

/// An IMAP server instance.
///
/// Construction does not start the server: call
/// [`Server::listen_and_serve`], or [`Server::listen`] followed by
/// [`Server::serve`].
pub struct Server {
    addr: String,
    transcript: Transcript,
    store: Arc<dyn MailStore>,
    listener: Option<Arc<TcpListener>>,
    shutdown: Arc<Notify>,
}

impl Server {
    /// A server bound to nothing yet, listening on
    /// [`DEFAULT_ADDR`] once started, with a discarded transcript.
    #[must_use]
    pub fn new(store: Arc<dyn MailStore>) -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            transcript: Transcript::discard(),
            store,
            listener: None,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn set_addr(&mut self, addr: impl Into<String>) {
        self.addr = addr.into();
    }

    pub fn set_transcript(&mut self, transcript: Transcript) {
        self.transcript = transcript;
    }

    /// The bound address, once listening. Useful when the configured
    /// port was 0.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Bind the listener. Non-blocking: no connection is accepted
    /// until [`Server::serve`] runs.
    ///
    /// # Errors
    ///
    /// Fails if already listening or if the bind fails.
    pub async fn listen(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Err(Error::ServerState("listener already exists".to_string()));
        }

        // Fresh shutdown signal per listen cycle; a permit left over
        // from an earlier close must not stop the next serve.
        self.shutdown = Arc::new(Notify::new());
        self.transcript.note(&format!("Listening on {}", self.addr));
        let listener = TcpListener::bind(&self.addr).await?;
        info!("listening on {}", self.addr);
        self.listener = Some(Arc::new(listener));
        Ok(())
    }

    /// Accept connections until [`Server::close`] is called or the
    /// listener fails. Each accepted connection runs as its own task;
    /// a failed session never takes the server down with it.
    ///
    /// # Errors
    ///
    /// Fails if [`Server::listen`] has not been called, or on an
    /// accept error.
    pub async fn serve(&mut self) -> Result<()> {
        let listener = self
            .listener
            .clone()
            .ok_or_else(|| Error::ServerState("server not started".to_string()))?;

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            error!("accept error: {err}");
                            return Err(err.into());
                        }
                    };

                    info!("connection accepted from {addr}");
                    self.transcript.note("Connection accepted");

                    let session = Session::new(self.store.clone(), stream, self.transcript.clone());
                    tokio::spawn(async move {
                        if let Err(err) = session.run().await {
                            error!("session ended with error: {err}");
                        }
                    });
                }
                () = self.shutdown.notified() => {
                    self.listener = None;
                    return Ok(());
                }
            }
        }
    }

    /// Stop listening for new connections. Sessions already running
    /// continue undisturbed.
    ///
    /// # Errors
    ///
    /// Fails if the server was never started.
    pub fn close(&mut self) -> Result<()> {
        if self.listener.is_none() {
            return Err(Error::ServerState("server not started".to_string()));
        }
        self.transcript.note("Closing server listener");
        info!("closing server listener");
        self.shutdown.notify_one();
        self.listener = None;
        Ok(())
    }

    /// Shorthand for [`Server::listen`] followed by [`Server::serve`].
    ///
    /// # Errors
    ///
    /// Propagates bind and accept failures.
    pub async fn listen_and_serve(&mut self) -> Result<()> {
        self.listen().await?;
        self.serve().await
    }
}

/// Ports for [`test_connection`] servers are handed out sequentially
/// from 10143 so concurrently running tests do not collide.
static TEST_PORT: AtomicU16 = AtomicU16::new(10143);

/// Test facilitation: create a server over the demo store, dial it,
/// and accept the server side of the connection *without* starting the
/// session loop. Tests inject whatever state they need and then spawn
/// [`Session::run`] themselves.
///
/// # Errors
///
/// Fails when no local port can be bound or the loopback dial fails.
pub async fn test_connection(
    transcript: Transcript,
) -> Result<(Server, TcpStream, Session<TcpStream>)> {
    let mut server = Server::new(Arc::new(MemStore::demo()));
    server.set_transcript(transcript.clone());

    // Another test binary may hold a port from the same range; keep
    // probing.
    let mut attempts = 0;
    loop {
        let port = TEST_PORT.fetch_add(1, Ordering::SeqCst);
        server.set_addr(format!("127.0.0.1:{port}"));
        match server.listen().await {
            Ok(()) => break,
            Err(_) if attempts < 50 => attempts += 1,
            Err(err) => return Err(err),
        }
    }

    let addr = server
        .local_addr()
        .ok_or_else(|| Error::ServerState("listener has no local address".to_string()))?;
    let client = TcpStream::connect(addr).await?;

    let listener = server
        .listener
        .clone()
        .ok_or_else(|| Error::ServerState("server not started".to_string()))?;
    let (stream, _) = listener.accept().await?;
    transcript.note("Client connected");

    let session = Session::new(server.store.clone(), stream, transcript);
    Ok((server, client, session))
}
