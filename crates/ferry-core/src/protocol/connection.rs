//! Bidirectional connection over a pair of byte streams
//!
//! Outbound frames go through a single queue drained by one writer task, so
//! the wire order always equals the order in which `send_*` calls were
//! issued. Inbound frames are read by a receive loop that resolves responses
//! against the pending ledger immediately and hands requests and
//! notifications to a dispatcher, which runs the handler for one message at a
//! time in arrival order. Because responses bypass the dispatcher, a handler
//! may itself await [`Connection::send_request`] without stalling the stream.
//! A panicking handler is answered with an internal error and the stream
//! carries on.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::codec::LineDecoder;
use super::error::{HandlerError, RpcError};
use super::message::{
    DecodeError, RequestId, RpcMessage, RpcNotification, RpcRequest, RpcResponse,
};
use crate::error::{BridgeError, BridgeResult};
use crate::recovery::{catch_panic, spawn_logged};

const READ_CHUNK_SIZE: usize = 8192;

/// Receives inbound requests and notifications
///
/// For requests the returned value (or error) becomes the single response;
/// for notifications it is discarded and errors are only logged.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(&self, method: &str, params: Option<Value>) -> Result<Value, HandlerError>;
}

type PendingSender = oneshot::Sender<Result<Value, RpcError>>;

#[derive(Default)]
struct Ledger {
    entries: HashMap<RequestId, PendingSender>,
    /// Set once the inbound stream ends; no response can arrive after that
    closed: bool,
}

/// Work handed from the receive loop to the dispatcher
enum Inbound {
    Message(RpcMessage),
    /// Error frame owed for a line that could not be decoded
    Reject(RpcResponse),
}

struct OutboundFrame {
    line: String,
    written: oneshot::Sender<std::io::Result<()>>,
}

struct Shared {
    next_id: AtomicU64,
    pending: Mutex<Ledger>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

/// Handle to a live connection; cheap to clone
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Create a connection writing to `writer`
    ///
    /// Spawns the writer task, so this must be called inside a tokio runtime.
    /// Call [`Connection::listen`] to start processing inbound traffic.
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, frames) = mpsc::unbounded_channel();
        spawn_logged("connection writer", write_loop(writer, frames));

        Self {
            shared: Arc::new(Shared {
                next_id: AtomicU64::new(0),
                pending: Mutex::new(Ledger::default()),
                outbound,
            }),
        }
    }

    /// Start the receive loop; the handle completes when `reader` reaches EOF
    /// and every queued inbound message has been handled.
    pub fn listen<R>(&self, reader: R, handler: Arc<dyn MethodHandler>) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let receiving = self.clone().read_loop(reader, dispatch_tx);
        let dispatching = self.clone().dispatch_loop(handler, dispatch_rx);

        tokio::spawn(async move {
            tokio::join!(receiving, dispatching);
            tracing::debug!("Connection receive loop finished");
        })
    }

    /// Send a request and wait for the peer's response
    ///
    /// There is no internal timeout; race your own timer if you need one.
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> BridgeResult<Value> {
        let id = RequestId::Number(self.shared.next_id.fetch_add(1, Ordering::SeqCst) as i64);
        let (tx, rx) = oneshot::channel();

        {
            let mut ledger = self.shared.pending.lock();
            if ledger.closed {
                return Err(BridgeError::transport("connection closed"));
            }
            ledger.entries.insert(id.clone(), tx);
        }

        let mut request = RpcRequest::new(id.clone(), method);
        request.params = params;
        tracing::debug!(method, request_id = %id, "Sending request");

        if let Err(e) = self.write(request.into()).await {
            self.shared.pending.lock().entries.remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(error.into()),
            Err(_) => Err(BridgeError::transport(format!(
                "connection closed before response to {} ({})",
                method, id
            ))),
        }
    }

    /// Send a notification; completes once the frame is written
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> BridgeResult<()> {
        let mut notification = RpcNotification::new(method);
        notification.params = params;
        self.write(notification.into()).await
    }

    /// Requests still awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.lock().entries.len()
    }

    async fn write(&self, message: RpcMessage) -> BridgeResult<()> {
        let line = message.to_line()?;
        let (written, done) = oneshot::channel();

        self.shared
            .outbound
            .send(OutboundFrame { line, written })
            .map_err(|_| BridgeError::transport("outbound stream closed"))?;

        done.await
            .map_err(|_| BridgeError::transport("writer task stopped"))?
            .map_err(|e| BridgeError::transport(format!("write failed: {}", e)))
    }

    async fn read_loop<R>(self, mut reader: R, dispatch: mpsc::UnboundedSender<Inbound>)
    where
        R: AsyncRead + Unpin,
    {
        let mut decoder = LineDecoder::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let read = match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::error!("Receive loop error: {}", e);
                    break;
                }
            };

            for line in decoder.push(&chunk[..read]) {
                self.route_line(&line, &dispatch);
            }
        }

        if let Some(line) = decoder.finish() {
            self.route_line(&line, &dispatch);
        }

        // Dropping the senders fails every caller still waiting
        let abandoned = {
            let mut ledger = self.shared.pending.lock();
            ledger.closed = true;
            std::mem::take(&mut ledger.entries)
        };
        if !abandoned.is_empty() {
            tracing::warn!(count = abandoned.len(), "Inbound stream ended with requests pending");
        }
    }

    fn route_line(&self, line: &str, dispatch: &mpsc::UnboundedSender<Inbound>) {
        let inbound = match RpcMessage::from_line(line) {
            Ok(RpcMessage::Response(response)) => return self.resolve(response),
            Ok(message) => Inbound::Message(message),
            Err(e @ DecodeError::Parse(_)) => {
                tracing::error!(line, "Failed to parse message line: {}", e);
                return;
            }
            Err(e @ DecodeError::Invalid(_)) => {
                tracing::error!(line, "Ignoring message: {}", e);
                return;
            }
            Err(e @ DecodeError::InvalidRequest { .. }) => {
                tracing::warn!(line, "Rejecting message: {}", e);
                match e.reply() {
                    Some(reply) => Inbound::Reject(reply),
                    None => return,
                }
            }
        };

        if dispatch.send(inbound).is_err() {
            tracing::warn!("Dispatcher stopped; dropping inbound message");
        }
    }

    fn resolve(&self, response: RpcResponse) {
        let Some(id) = response.id.clone() else {
            tracing::warn!(error = ?response.error, "Peer reported an error for an unidentified frame");
            return;
        };
        let waiter = self.shared.pending.lock().entries.remove(&id);
        match waiter {
            Some(waiter) => {
                let _ = waiter.send(response.into_result());
            }
            None => {
                tracing::debug!(request_id = %id, "Dropping unmatched response");
            }
        }
    }

    async fn dispatch_loop(
        self,
        handler: Arc<dyn MethodHandler>,
        mut inbound: mpsc::UnboundedReceiver<Inbound>,
    ) {
        while let Some(inbound) = inbound.recv().await {
            match inbound {
                Inbound::Message(RpcMessage::Request(request)) => {
                    self.handle_request(handler.as_ref(), request).await
                }
                Inbound::Message(RpcMessage::Notification(notification)) => {
                    let method = notification.method;
                    tracing::debug!(method = %method, "Handling notification");
                    if let Err(e) = guarded(handler.as_ref(), &method, notification.params).await {
                        tracing::error!(method = %method, "Notification handler failed: {}", e);
                    }
                }
                Inbound::Message(RpcMessage::Response(response)) => self.resolve(response),
                Inbound::Reject(response) => {
                    if let Err(e) = self.write(response.into()).await {
                        tracing::error!("Failed to send rejection: {}", e);
                    }
                }
            }
        }
    }

    async fn handle_request(&self, handler: &dyn MethodHandler, request: RpcRequest) {
        let RpcRequest { id, method, params, .. } = request;
        tracing::debug!(method = %method, request_id = %id, "Handling request");

        let response = match guarded(handler, &method, params).await {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => {
                if matches!(error, HandlerError::Internal(_)) {
                    tracing::error!(method = %method, "Unhandled error: {}", error);
                } else {
                    tracing::debug!(method = %method, "Request failed: {}", error);
                }
                RpcResponse::error(id, error.into_rpc_error())
            }
        };

        if let Err(e) = self.write(response.into()).await {
            tracing::error!(method = %method, "Failed to send response: {}", e);
        }
    }
}

/// Run one handler call, turning a panic into an internal error
async fn guarded(
    handler: &dyn MethodHandler,
    method: &str,
    params: Option<Value>,
) -> Result<Value, HandlerError> {
    catch_panic(handler.handle(method, params))
        .await
        .unwrap_or_else(|message| {
            tracing::error!(method, "Handler panicked: {}", message);
            Err(HandlerError::Internal(format!("handler panicked: {}", message)))
        })
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("pending_requests", &self.pending_requests())
            .finish()
    }
}

async fn write_loop<W>(mut writer: W, mut frames: mpsc::UnboundedReceiver<OutboundFrame>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        let result = match writer.write_all(frame.line.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            tracing::error!("Failed to write frame: {}", e);
        }
        let _ = frame.written.send(result);
    }
}
