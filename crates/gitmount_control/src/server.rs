//! Control socket server.

use crate::config::ServerConfig;
use crate::error::{ControlError, ControlResult};
use crate::handler::{ConnectionId, RequestHandler};
use gitmount_protocol::{
    ControlRequest, ControlResponse, FrameFormat, FramedChannel, LineCodec, ProtocolError,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

struct Shared {
    config: ServerConfig,
    format: FrameFormat,
    handler: RequestHandler,
    stopping: AtomicBool,
    next_id: AtomicU64,
    active: AtomicUsize,
    // Clones of live streams, so shutdown can unblock their readers.
    streams: Mutex<HashMap<u64, UnixStream>>,
}

/// The control server.
///
/// One listener thread accepts connections; each connection is served on its
/// own thread until the peer closes, the receive timeout passes, or a frame
/// is corrupt. Leases taken by a connection outlive it.
///
/// # Example
///
/// ```no_run
/// use gitmount_control::{ControlServer, RequestHandler, ServerConfig};
/// # fn handler() -> RequestHandler { unimplemented!() }
///
/// let server = ControlServer::bind(ServerConfig::new("/srv/notes/@gitmount/control"), handler())?;
/// // ... serve until done
/// server.shutdown();
/// # Ok::<(), gitmount_control::ControlError>(())
/// ```
pub struct ControlServer {
    shared: Arc<Shared>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl ControlServer {
    /// Binds the socket and starts accepting.
    pub fn bind(config: ServerConfig, handler: RequestHandler) -> ControlResult<Self> {
        let format = FrameFormat::new(config.prefix_width)?;
        let listener = UnixListener::bind(&config.socket_path)?;
        info!(path = %config.socket_path.display(), "control server listening");

        let shared = Arc::new(Shared {
            config,
            format,
            handler,
            stopping: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            active: AtomicUsize::new(0),
            streams: Mutex::new(HashMap::new()),
        });
        let accept_shared = Arc::clone(&shared);
        let acceptor = thread::Builder::new()
            .name("gitmount-control".into())
            .spawn(move || accept_loop(&accept_shared, listener))?;

        Ok(Self {
            shared,
            acceptor: Mutex::new(Some(acceptor)),
        })
    }

    /// Socket path.
    pub fn socket_path(&self) -> &Path {
        &self.shared.config.socket_path
    }

    /// Number of connections being served.
    pub fn active_connections(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// The request handler.
    pub fn handler(&self) -> &RequestHandler {
        &self.shared.handler
    }

    /// Stops accepting, closes live connections and removes the socket.
    pub fn shutdown(&self) {
        let Some(acceptor) = self.acceptor.lock().take() else {
            return;
        };
        self.shared.stopping.store(true, Ordering::SeqCst);

        // Wake the blocking accept.
        if let Err(e) = UnixStream::connect(self.socket_path()) {
            debug!(error = %e, "wake connect failed");
        }
        if acceptor.join().is_err() {
            error!("control acceptor panicked");
        }
        for (_, stream) in self.shared.streams.lock().drain() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Err(e) = std::fs::remove_file(self.socket_path()) {
            debug!(error = %e, "could not remove control socket");
        }
        info!("control server stopped");
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ControlServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlServer")
            .field("socket_path", &self.shared.config.socket_path)
            .field("active", &self.active_connections())
            .finish()
    }
}

fn accept_loop(shared: &Arc<Shared>, listener: UnixListener) {
    for stream in listener.incoming() {
        if shared.stopping.load(Ordering::SeqCst) {
            break;
        }
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let n = shared.next_id.fetch_add(1, Ordering::SeqCst);
        let conn = ConnectionId::new(n);
        if shared.active.fetch_add(1, Ordering::SeqCst) >= shared.config.max_connections {
            shared.active.fetch_sub(1, Ordering::SeqCst);
            warn!(%conn, "connection limit reached");
            refuse(shared, stream);
            continue;
        }

        match stream.try_clone() {
            Ok(clone) => {
                shared.streams.lock().insert(n, clone);
            }
            Err(e) => debug!(%conn, error = %e, "could not clone stream"),
        }

        let worker = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name(conn.to_string())
            .spawn(move || {
                serve_connection(&worker, &conn, stream);
                worker.streams.lock().remove(&n);
                worker.active.fetch_sub(1, Ordering::SeqCst);
            });
        if let Err(e) = spawned {
            error!(error = %e, "could not spawn connection thread");
            shared.streams.lock().remove(&n);
            shared.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
    debug!("control acceptor exiting");
}

fn refuse(shared: &Shared, stream: UnixStream) {
    let mut channel = FramedChannel::with_codec(stream, shared.format, LineCodec);
    let reply = ControlResponse::error("too many connections");
    if let Err(e) = channel.send(reply.as_message()) {
        debug!(error = %e, "could not send refusal");
    }
}

fn serve_connection(shared: &Shared, conn: &ConnectionId, stream: UnixStream) {
    if let Err(e) = stream.set_read_timeout(Some(shared.config.recv_timeout)) {
        warn!(%conn, error = %e, "could not set receive timeout");
    }
    if let Err(e) = stream.set_write_timeout(Some(shared.config.recv_timeout)) {
        warn!(%conn, error = %e, "could not set send timeout");
    }
    debug!(%conn, "connection opened");
    let mut channel = FramedChannel::with_codec(stream, shared.format, LineCodec);

    loop {
        let reply = match channel.recv() {
            Ok(None) => break,
            Ok(Some(message)) => match ControlRequest::from_message(&message) {
                Ok(request) => shared.handler.handle(conn, &request),
                Err(e) => ControlResponse::error(e.to_string()),
            },
            Err(ProtocolError::Timeout) => {
                debug!(%conn, "connection idle; closing");
                break;
            }
            Err(e) if !e.is_fatal() => {
                debug!(%conn, error = %e, "bad request");
                ControlResponse::error(e.to_string())
            }
            Err(e) => {
                if !shared.stopping.load(Ordering::SeqCst) {
                    warn!(%conn, error = %e, "closing connection");
                }
                break;
            }
        };
        if let Err(e) = channel.send(reply.as_message()) {
            debug!(%conn, error = %e, "reply failed");
            break;
        }
    }
    debug!(%conn, "connection closed");
}

/// Returns true if a live server answers at `path`.
pub fn probe(path: &Path) -> bool {
    match crate::client::ControlClient::connect(path) {
        Ok(mut client) => client.ping().is_ok(),
        Err(ControlError::Io(_)) => false,
        Err(e) => {
            debug!(error = %e, "probe failed");
            false
        }
    }
}
