//! WebSocket signaling client
//!
//! Maintains one duplex connection to the signaling server. Outbound
//! messages go through a FIFO queue with at most one write in flight;
//! inbound text frames are delivered to the handler in arrival order.

use super::{
    ConnectionState, MessageCallback, MessageStatus, SendStatusCallback, StateChangeCallback,
    TransportError,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Notify};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Send discipline state: at most one message is in flight per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendState {
    Idle,
    Sending,
}

/// One outbound message awaiting transmission.
struct QueuedMessage {
    payload: String,
    status: MessageStatus,
    on_status: Option<SendStatusCallback>,
}

impl QueuedMessage {
    fn new(payload: String, on_status: Option<SendStatusCallback>) -> Self {
        Self {
            payload,
            status: MessageStatus::Queued,
            on_status,
        }
    }

    fn transition(&mut self, status: MessageStatus) {
        self.status = status;
        if let Some(cb) = &self.on_status {
            cb(status);
        }
    }
}

struct SendQueue {
    entries: VecDeque<QueuedMessage>,
    send_state: SendState,
    /// Set under the queue lock when a disconnect starts. A submission
    /// that read Connected before the state change still observes this
    /// flag, so no entry can land after the cancellation drain.
    closed: bool,
}

struct ClientInner {
    state: Mutex<ConnectionState>,
    on_state: Mutex<Option<StateChangeCallback>>,
    queue: Mutex<SendQueue>,
    queue_ready: Notify,
    close_signal: Mutex<Option<oneshot::Sender<()>>>,
}

impl ClientInner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ConnectionState::Disconnected),
            on_state: Mutex::new(None),
            queue: Mutex::new(SendQueue {
                entries: VecDeque::new(),
                send_state: SendState::Idle,
                closed: false,
            }),
            queue_ready: Notify::new(),
            close_signal: Mutex::new(None),
        })
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Update the state, notifying only when it actually changed.
    async fn set_state(&self, next: ConnectionState) {
        let changed = {
            let mut state = self.state.lock();
            if *state == next {
                false
            } else {
                debug!("Connection state {} -> {}", *state, next);
                *state = next;
                true
            }
        };
        if changed {
            let cb = self.on_state.lock().clone();
            if let Some(cb) = cb {
                cb(next).await;
            }
        }
    }

    /// Pop the next message for transmission, entering the Sending state.
    /// Returns None while another send is in flight or the queue is empty.
    fn begin_send(&self) -> Option<QueuedMessage> {
        let mut queue = self.queue.lock();
        if queue.send_state == SendState::Sending {
            return None;
        }
        let entry = queue.entries.pop_front()?;
        queue.send_state = SendState::Sending;
        Some(entry)
    }

    fn finish_send(&self) {
        self.queue.lock().send_state = SendState::Idle;
    }

    /// Close the queue to new submissions and cancel every queued entry.
    /// Callbacks run outside the lock.
    fn close_queue(&self) {
        let drained: Vec<QueuedMessage> = {
            let mut queue = self.queue.lock();
            queue.closed = true;
            queue.entries.drain(..).collect()
        };
        for mut entry in drained {
            entry.transition(MessageStatus::Cancelled);
        }
    }
}

/// WebSocket client for the signaling channel.
///
/// All transport operations for one connection are serialized onto two
/// tasks: a queue pump owning the write half and a receive loop owning the
/// read half.
pub struct WebSocketClient {
    host: String,
    port: u16,
    path: String,
    inner: Arc<ClientInner>,
}

impl WebSocketClient {
    /// Create a client for the given signaling endpoint. No I/O happens
    /// until `connect`.
    pub fn new(host: String, port: u16, path: String) -> Self {
        Self {
            host,
            port,
            path,
            inner: ClientInner::new(),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Establish the connection and start the receive loop.
    ///
    /// Only valid from the Disconnected state; anywhere else it logs and
    /// fails fast without touching the connection. On handshake failure the
    /// state moves to Error and `on_state` fires once.
    pub async fn connect(
        &self,
        on_message: MessageCallback,
        on_state: StateChangeCallback,
    ) -> Result<(), TransportError> {
        {
            let state = self.inner.state.lock();
            if *state != ConnectionState::Disconnected {
                warn!("Connect called in state {}, ignoring", *state);
                return Err(TransportError::InvalidState(format!(
                    "connect requires disconnected state, currently {}",
                    *state
                )));
            }
        }
        *self.inner.on_state.lock() = Some(on_state);
        // Reopen the queue after any previous disconnect.
        self.inner.queue.lock().closed = false;
        self.inner.set_state(ConnectionState::Connecting).await;

        let url = format!("ws://{}:{}{}", self.host, self.port, self.path);
        let ws = match connect_async(&url).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                error!("WebSocket connection to {} failed: {}", url, e);
                self.inner.set_state(ConnectionState::Error).await;
                return Err(TransportError::Handshake(e.to_string()));
            }
        };
        info!("Connected to signaling server at {}", url);
        self.inner.set_state(ConnectionState::Connected).await;

        let (sink, source) = ws.split();
        let (close_tx, close_rx) = oneshot::channel();
        *self.inner.close_signal.lock() = Some(close_tx);

        tokio::spawn(run_send_queue(self.inner.clone(), sink, close_rx));
        tokio::spawn(run_receive_loop(self.inner.clone(), source, on_message));
        Ok(())
    }

    /// Enqueue a text message for transmission.
    ///
    /// When the connection is not Connected, or a disconnect has already
    /// closed the queue, the message is completed with Cancelled
    /// immediately and never enqueued. Messages complete in FIFO
    /// submission order.
    pub fn send(&self, payload: String, on_status: Option<SendStatusCallback>) {
        let state = self.state();
        if state != ConnectionState::Connected {
            debug!("Send while {}, cancelling message", state);
            if let Some(cb) = on_status {
                cb(MessageStatus::Cancelled);
            }
            return;
        }
        let mut entry = QueuedMessage::new(payload, on_status);
        {
            let mut queue = self.inner.queue.lock();
            if !queue.closed {
                queue.entries.push_back(entry);
                self.inner.queue_ready.notify_one();
                return;
            }
        }
        // The state read raced a disconnect; the queue is already closed.
        debug!("Send raced a disconnect, cancelling message");
        entry.transition(MessageStatus::Cancelled);
    }

    /// Close the connection.
    ///
    /// No-op unless Connected. The queue is closed to new submissions and
    /// every queued-but-unsent message is cancelled before the close
    /// handshake starts, so no caller ever observes Sent after Cancelled.
    /// An in-flight write is allowed to complete.
    pub async fn disconnect(&self) {
        if self.state() != ConnectionState::Connected {
            debug!("Disconnect ignored in state {}", self.state());
            return;
        }
        self.inner.close_queue();
        self.inner.set_state(ConnectionState::Closing).await;
        let close_tx = self.inner.close_signal.lock().take();
        if let Some(tx) = close_tx {
            let _ = tx.send(());
        }
    }

    #[cfg(test)]
    fn force_state(&self, state: ConnectionState) {
        *self.inner.state.lock() = state;
    }

    #[cfg(test)]
    fn queued_len(&self) -> usize {
        self.inner.queue.lock().entries.len()
    }
}

/// Queue pump: one write in flight at a time, FIFO completion order.
async fn run_send_queue(
    inner: Arc<ClientInner>,
    mut sink: WsSink,
    mut close_rx: oneshot::Receiver<()>,
) {
    loop {
        if let Some(mut entry) = inner.begin_send() {
            entry.transition(MessageStatus::Sending);
            let result = sink.send(Message::Text(entry.payload.clone().into())).await;
            inner.finish_send();
            match result {
                Ok(()) => {
                    debug!("Message sent ({} bytes)", entry.payload.len());
                    entry.transition(MessageStatus::Sent);
                }
                Err(e) => {
                    error!("WebSocket write failed: {}", e);
                    entry.transition(MessageStatus::Failed);
                    inner.set_state(ConnectionState::Error).await;
                    return;
                }
            }
            continue;
        }

        tokio::select! {
            _ = inner.queue_ready.notified() => {}
            _ = &mut close_rx => {
                match sink.close().await {
                    Ok(()) => {
                        info!("Signaling connection closed");
                        inner.set_state(ConnectionState::Disconnected).await;
                    }
                    Err(e) => {
                        error!("WebSocket close failed: {}", e);
                        inner.set_state(ConnectionState::Error).await;
                    }
                }
                return;
            }
        }
    }
}

/// Receive loop: deliver each text frame, then re-arm the read unless the
/// connection has left the Connected state.
async fn run_receive_loop(inner: Arc<ClientInner>, mut source: WsSource, on_message: MessageCallback) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                on_message(text).await;
                if inner.state() != ConnectionState::Connected {
                    break;
                }
            }
            Ok(Message::Binary(data)) => {
                debug!("Ignoring binary frame ({} bytes)", data.len());
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
            Ok(Message::Close(_)) => {
                debug!("Close frame received");
                break;
            }
            Err(e) => {
                if inner.state() == ConnectionState::Connected {
                    error!("WebSocket read failed: {}", e);
                    inner.set_state(ConnectionState::Error).await;
                }
                return;
            }
        }
    }
    // The stream ended without our own close handshake running.
    if inner.state() == ConnectionState::Connected {
        inner.set_state(ConnectionState::Error).await;
    }
}
