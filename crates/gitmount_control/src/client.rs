//! Blocking client for the control socket.

use crate::error::{ControlError, ControlResult};
use gitmount_protocol::{
    ControlRequest, ControlResponse, FrameFormat, FramedChannel, InfoResponse, LineCodec,
    ProtocolError, DEFAULT_PREFIX_WIDTH,
};
use parking_lot::Mutex;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Default time to wait for a reply.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

/// A connection to a running instance.
#[derive(Debug)]
pub struct ControlClient {
    channel: FramedChannel<UnixStream, LineCodec>,
}

impl ControlClient {
    /// Connects with the default timeout and prefix width.
    pub fn connect(path: &Path) -> ControlResult<Self> {
        Self::connect_with(path, DEFAULT_CLIENT_TIMEOUT, DEFAULT_PREFIX_WIDTH)
    }

    /// Connects with an explicit reply timeout and prefix width.
    pub fn connect_with(path: &Path, timeout: Duration, prefix_width: usize) -> ControlResult<Self> {
        let format = FrameFormat::new(prefix_width)?;
        let stream = UnixStream::connect(path)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(Self {
            channel: FramedChannel::with_codec(stream, format, LineCodec),
        })
    }

    /// Sends a request and returns the reply, whatever its status.
    pub fn request(&mut self, request: &ControlRequest) -> ControlResult<ControlResponse> {
        let reply = self.channel.call(&request.to_message())?;
        Ok(ControlResponse::from_message(reply))
    }

    /// Sends a request and requires an `ok` reply.
    fn expect_ok(&mut self, request: &ControlRequest) -> ControlResult<ControlResponse> {
        let reply = self.request(request)?;
        if reply.is_ok() {
            Ok(reply)
        } else {
            Err(ControlError::Rejected {
                action: request.to_message().get("action").cloned().unwrap_or_default(),
                status: reply.status().to_string(),
            })
        }
    }

    /// Checks that the instance answers.
    pub fn ping(&mut self) -> ControlResult<()> {
        self.expect_ok(&ControlRequest::Ping).map(drop)
    }

    /// Takes or renews this connection's lease. Returns the lease name.
    pub fn lock(&mut self) -> ControlResult<String> {
        let reply = self.expect_ok(&ControlRequest::Lock)?;
        Ok(reply.get("name").unwrap_or_default().to_string())
    }

    /// Renews this connection's lease.
    pub fn renew_lock(&mut self) -> ControlResult<String> {
        self.lock()
    }

    /// Releases this connection's lease.
    ///
    /// Returns `false` when this connection held no lease. Leases belong to
    /// the connection that took them, so a fresh connection cannot release
    /// another's.
    pub fn unlock(&mut self) -> ControlResult<bool> {
        let reply = self.expect_ok(&ControlRequest::Unlock)?;
        Ok(reply.get("released") == Some("true"))
    }

    /// Describes the mount.
    pub fn info(&mut self) -> ControlResult<InfoResponse> {
        let reply = self.expect_ok(&ControlRequest::Info)?;
        InfoResponse::from_response(&reply)
            .ok_or_else(|| ProtocolError::InvalidRequest("malformed info reply".into()).into())
    }

    /// Resolves a configuration key on the instance's host.
    pub fn get_config(&mut self, key: &str) -> ControlResult<Option<String>> {
        let reply = self.expect_ok(&ControlRequest::GetConfig { key: key.into() })?;
        Ok(reply.get(key).map(str::to_string))
    }

    /// Takes the lease and keeps renewing it every `renew_every` until the
    /// returned guard is dropped, which releases it.
    pub fn hold_lock(mut self, renew_every: Duration) -> ControlResult<LockHold> {
        let name = self.lock()?;
        let client = Arc::new(Mutex::new(self));
        let (stop, stopped) = mpsc::channel::<()>();

        let renewer = Arc::clone(&client);
        let worker = thread::Builder::new()
            .name("gitmount-lock-hold".into())
            .spawn(move || loop {
                match stopped.recv_timeout(renew_every) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(e) = renewer.lock().renew_lock() {
                            warn!(error = %e, "lease renewal failed");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(LockHold {
            name,
            client,
            stop: Some(stop),
            worker: Some(worker),
        })
    }
}

/// A held lease; renewed in the background, released on drop.
#[derive(Debug)]
pub struct LockHold {
    name: String,
    client: Arc<Mutex<ControlClient>>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl LockHold {
    /// Lease name assigned by the server.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `f` with the underlying client.
    pub fn with_client<T>(&self, f: impl FnOnce(&mut ControlClient) -> T) -> T {
        f(&mut self.client.lock())
    }

    /// Stops renewing and releases the lease.
    pub fn release(mut self) -> ControlResult<()> {
        self.finish()
    }

    fn finish(&mut self) -> ControlResult<()> {
        let Some(stop) = self.stop.take() else {
            return Ok(());
        };
        drop(stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        let result = self.client.lock().unlock();
        debug!(name = %self.name, ?result, "lease hold ended");
        result.map(drop)
    }
}

impl Drop for LockHold {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!(error = %e, "could not release lease");
        }
    }
}
