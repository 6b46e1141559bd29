//! Signaling protocol handler
//!
//! Decodes inbound control envelopes, dispatches by message kind, drives
//! the session registry, and issues outbound envelopes via the transport.

use super::observer::NegotiationObserver;
use super::protocol::{IceCandidateFields, InboundMessage, OutboundMessage};
use super::registry::{PeerId, PeerSession, SessionRegistry};
use super::SignalingError;
use crate::transport::{
    ConnectionState, MessageCallback, MessageStatus, SendStatusCallback, StateChangeCallback,
    TransportError, WebSocketClient,
};
use crate::webrtc::engine::NegotiationEngine;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Where outbound envelopes go. Implemented by the WebSocket transport;
/// swapped for a recorder in tests.
pub trait OutboundSink: Send + Sync {
    fn submit(&self, envelope: OutboundMessage);
}

/// `OutboundSink` over the WebSocket transport: serialize and enqueue with
/// a status-logging callback.
pub struct TransportSink {
    transport: Arc<WebSocketClient>,
}

impl TransportSink {
    pub fn new(transport: Arc<WebSocketClient>) -> Self {
        Self { transport }
    }
}

impl OutboundSink for TransportSink {
    fn submit(&self, envelope: OutboundMessage) {
        let target = envelope.target();
        let payload = match envelope.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode outbound envelope: {}", e);
                return;
            }
        };
        let on_status: SendStatusCallback = Arc::new(move |status| match status {
            MessageStatus::Sent => match target {
                Some(peer) => debug!("Envelope delivered to consumer {}", peer),
                None => debug!("Envelope delivered to server"),
            },
            MessageStatus::Failed => error!("Failed to deliver envelope (target {:?})", target),
            MessageStatus::Cancelled => {
                warn!("Envelope cancelled before transmission (target {:?})", target)
            }
            MessageStatus::Queued | MessageStatus::Sending => {}
        });
        self.transport.send(payload, Some(on_status));
    }
}

/// Streamer-side signaling client.
///
/// One instance per process run; owns the session registry and mediates
/// between the signaling server and the media-negotiation engine.
pub struct SignalingClient {
    transport: Arc<WebSocketClient>,
    sink: Arc<dyn OutboundSink>,
    engine: Arc<dyn NegotiationEngine>,
    registry: SessionRegistry,
    local_id: Mutex<Option<PeerId>>,
}

impl SignalingClient {
    pub fn new(transport: Arc<WebSocketClient>, engine: Arc<dyn NegotiationEngine>) -> Arc<Self> {
        let sink = Arc::new(TransportSink::new(transport.clone()));
        Arc::new(Self {
            transport,
            sink,
            engine,
            registry: SessionRegistry::new(),
            local_id: Mutex::new(None),
        })
    }

    #[cfg(test)]
    fn with_sink(engine: Arc<dyn NegotiationEngine>, sink: Arc<dyn OutboundSink>) -> Arc<Self> {
        Arc::new(Self {
            transport: Arc::new(WebSocketClient::new("localhost".to_string(), 0, "/".to_string())),
            sink,
            engine,
            registry: SessionRegistry::new(),
            local_id: Mutex::new(None),
        })
    }

    /// Local identity assigned by the server, once `connect` has been seen.
    pub fn local_peer_id(&self) -> Option<PeerId> {
        *self.local_id.lock()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Connect the signaling transport and start dispatching envelopes.
    pub async fn connect(self: &Arc<Self>) -> Result<(), TransportError> {
        let handler = self.clone();
        let on_message: MessageCallback = Box::new(move |text| {
            let handler = handler.clone();
            Box::pin(async move {
                handler.handle_message(&text).await;
            })
        });

        let watcher = self.clone();
        let on_state: StateChangeCallback = Arc::new(move |state| {
            let watcher = watcher.clone();
            Box::pin(async move {
                watcher.on_connection_state_change(state);
            })
        });

        self.transport.connect(on_message, on_state).await
    }

    pub async fn disconnect(&self) {
        self.transport.disconnect().await;
        // A closed signaling channel invalidates every session record.
        self.registry.clear();
    }

    fn on_connection_state_change(&self, state: ConnectionState) {
        match state {
            ConnectionState::Connected => {
                info!("Connected to signaling server");
                // Announce ourselves so the server lists this peer as a
                // streamer.
                self.sink.submit(OutboundMessage::NewPeer);
            }
            ConnectionState::Disconnected => info!("Disconnected from signaling server"),
            ConnectionState::Error => error!("Signaling server connection error"),
            ConnectionState::Connecting | ConnectionState::Closing => {
                debug!("Signaling connection {}", state)
            }
        }
    }

    /// Single entry point for inbound signaling text.
    ///
    /// Parse failures and envelopes referencing unknown peers are logged
    /// and discarded; nothing here is fatal to the connection.
    pub async fn handle_message(self: &Arc<Self>, text: &str) {
        let envelope = match InboundMessage::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("Discarding malformed signaling message: {}", e);
                return;
            }
        };

        match envelope {
            InboundMessage::Connect { id } => {
                info!("Connected with streamer id {}", id);
                *self.local_id.lock() = Some(id);
            }
            InboundMessage::Subscribe { sender } => self.handle_subscribe(sender).await,
            InboundMessage::Answer { sender, sdp } => {
                if let Err(e) = self.handle_answer(sender, sdp) {
                    warn!("Dropping answer: {}", e);
                }
            }
            InboundMessage::IceCandidate { sender, candidate } => {
                if let Err(e) = self.handle_remote_candidate(sender, candidate).await {
                    warn!("Dropping ICE candidate: {}", e);
                }
            }
            InboundMessage::ConsumerDisconnected { consumer_id } => {
                if self.registry.remove(consumer_id).is_some() {
                    info!("Consumer {} disconnected", consumer_id);
                } else {
                    debug!("Disconnect notice for unknown consumer {}", consumer_id);
                }
            }
            InboundMessage::Unknown => warn!("Ignoring signaling message with unknown type"),
        }
    }

    /// A consumer wants media. Idempotent: a subscribe for a peer that
    /// already has a session does nothing.
    async fn handle_subscribe(self: &Arc<Self>, peer: PeerId) {
        if self.registry.contains(peer) {
            info!("Consumer {} already has a session", peer);
            return;
        }

        info!("Consumer {} wants to subscribe", peer);
        let observer = NegotiationObserver::new(self.clone(), peer);
        let media = match self.engine.create_session(peer, observer).await {
            Ok(media) => media,
            Err(e) => {
                error!("Failed to create session for consumer {}: {}", peer, e);
                return;
            }
        };

        let (session, created) = self.registry.get_or_insert(peer, media);
        if !created {
            // A racing subscribe won; drop the fresh engine handle.
            debug!("Consumer {} session already registered", peer);
            return;
        }
        self.negotiate(peer, &session).await;
    }

    /// One negotiation round: create offer, transmit, set local
    /// description. The offer must reach the transport queue before the
    /// local description is set so candidates discovered by that call never
    /// precede the offer they belong to.
    pub(crate) async fn negotiate(&self, peer: PeerId, session: &Arc<PeerSession>) {
        let sdp = match session.media.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => {
                error!("Failed to create offer for consumer {}: {}", peer, e);
                return;
            }
        };

        self.sink.submit(OutboundMessage::offer(peer, sdp.clone()));

        if let Err(e) = session.media.set_local_description(&sdp).await {
            error!("Failed to set local description for consumer {}: {}", peer, e);
        }
    }

    fn handle_answer(&self, peer: PeerId, sdp: String) -> Result<(), SignalingError> {
        let session = self.require_session(peer)?;
        // Fire and forget; only the outcome gets logged.
        let media = session.media.clone();
        tokio::spawn(async move {
            match media.set_remote_description(&sdp).await {
                Ok(()) => debug!("Remote description applied for consumer {}", peer),
                Err(e) => {
                    error!("Failed to set remote description for consumer {}: {}", peer, e)
                }
            }
        });
        Ok(())
    }

    async fn handle_remote_candidate(
        &self,
        peer: PeerId,
        candidate: IceCandidateFields,
    ) -> Result<(), SignalingError> {
        let session = self.require_session(peer)?;
        if let Err(e) = session.media.add_ice_candidate(candidate).await {
            // Malformed candidates are dropped, not fatal.
            error!("Failed to add ICE candidate from consumer {}: {}", peer, e);
        }
        Ok(())
    }

    /// Observer path: ship a locally discovered candidate to its consumer.
    pub(crate) fn send_candidate(&self, peer: PeerId, candidate: IceCandidateFields) {
        self.sink
            .submit(OutboundMessage::ice_candidate(peer, candidate));
    }

    fn require_session(&self, peer: PeerId) -> Result<Arc<PeerSession>, SignalingError> {
        self.registry
            .get(peer)
            .ok_or(SignalingError::SessionNotFound(peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webrtc::engine::MediaSession;
    use crate::webrtc::WebRTCError;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        CreateSession(PeerId),
        CreateOffer,
        SetLocal(String),
        SetRemote(String),
        AddCandidate(IceCandidateFields),
        Submitted(String),
    }

    #[derive(Clone)]
    struct Recorder {
        tx: mpsc::UnboundedSender<Event>,
    }

    impl Recorder {
        fn record(&self, event: Event) {
            let _ = self.tx.send(event);
        }
    }

    struct MockEngine {
        recorder: Recorder,
        fail_create: bool,
    }

    struct MockSession {
        recorder: Recorder,
    }

    struct MockSink {
        recorder: Recorder,
    }

    #[async_trait]
    impl NegotiationEngine for MockEngine {
        async fn create_session(
            &self,
            peer: PeerId,
            _observer: Arc<NegotiationObserver>,
        ) -> Result<Arc<dyn MediaSession>, WebRTCError> {
            if self.fail_create {
                return Err(WebRTCError::ConnectionFailed("mock failure".to_string()));
            }
            self.recorder.record(Event::CreateSession(peer));
            Ok(Arc::new(MockSession {
                recorder: self.recorder.clone(),
            }))
        }
    }

    #[async_trait]
    impl MediaSession for MockSession {
        async fn create_offer(&self) -> Result<String, WebRTCError> {
            self.recorder.record(Event::CreateOffer);
            Ok("v=0 mock offer".to_string())
        }

        async fn set_local_description(&self, sdp: &str) -> Result<(), WebRTCError> {
            self.recorder.record(Event::SetLocal(sdp.to_string()));
            Ok(())
        }

        async fn set_remote_description(&self, sdp: &str) -> Result<(), WebRTCError> {
            self.recorder.record(Event::SetRemote(sdp.to_string()));
            Ok(())
        }

        async fn add_ice_candidate(&self, candidate: IceCandidateFields) -> Result<(), WebRTCError> {
            self.recorder.record(Event::AddCandidate(candidate));
            Ok(())
        }

        async fn close(&self) -> Result<(), WebRTCError> {
            Ok(())
        }
    }

    impl OutboundSink for MockSink {
        fn submit(&self, envelope: OutboundMessage) {
            self.recorder
                .record(Event::Submitted(envelope.to_json().unwrap()));
        }
    }

    fn harness() -> (Arc<SignalingClient>, mpsc::UnboundedReceiver<Event>) {
        harness_with(false)
    }

    fn harness_with(fail_create: bool) -> (Arc<SignalingClient>, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recorder = Recorder { tx };
        let engine = Arc::new(MockEngine {
            recorder: recorder.clone(),
            fail_create,
        });
        let sink = Arc::new(MockSink { recorder });
        (SignalingClient::with_sink(engine, sink), rx)
    }

    async fn collect(rx: &mut mpsc::UnboundedReceiver<Event>, n: usize) -> Vec<Event> {
        let mut events = Vec::with_capacity(n);
        timeout(Duration::from_secs(5), async {
            while events.len() < n {
                match rx.recv().await {
                    Some(event) => events.push(event),
                    None => break,
                }
            }
        })
        .await
        .expect("timed out waiting for events");
        events
    }

    #[tokio::test]
    async fn subscribe_sends_offer_before_setting_local_description() {
        let (client, mut rx) = harness();

        client
            .handle_message(r#"{"type":"subscribe","sender":42}"#)
            .await;

        let events = collect(&mut rx, 4).await;
        assert_eq!(events[0], Event::CreateSession(42));
        assert_eq!(events[1], Event::CreateOffer);
        match &events[2] {
            Event::Submitted(json) => {
                assert!(json.contains(r#""type":"offer""#));
                assert!(json.contains(r#""target":42"#));
            }
            other => panic!("Expected offer submission, got {:?}", other),
        }
        assert!(matches!(events[3], Event::SetLocal(_)));
        assert_eq!(client.session_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_subscribe_is_a_noop() {
        let (client, mut rx) = harness();

        client
            .handle_message(r#"{"type":"subscribe","sender":42}"#)
            .await;
        client
            .handle_message(r#"{"type":"subscribe","sender":42}"#)
            .await;

        let _ = collect(&mut rx, 4).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(client.session_count(), 1);
    }

    #[tokio::test]
    async fn failed_session_creation_leaves_registry_untouched() {
        let (client, mut rx) = harness_with(true);

        client
            .handle_message(r#"{"type":"subscribe","sender":42}"#)
            .await;

        assert!(rx.try_recv().is_err());
        assert_eq!(client.session_count(), 0);
    }

    #[tokio::test]
    async fn answer_applies_remote_description() {
        let (client, mut rx) = harness();
        client
            .handle_message(r#"{"type":"subscribe","sender":42}"#)
            .await;
        let _ = collect(&mut rx, 4).await;

        client
            .handle_message(r#"{"type":"answer","sender":42,"sdp":"v=0 answer"}"#)
            .await;

        let events = collect(&mut rx, 1).await;
        assert_eq!(events[0], Event::SetRemote("v=0 answer".to_string()));
    }

    #[tokio::test]
    async fn answer_for_unknown_peer_is_dropped() {
        let (client, mut rx) = harness();

        client
            .handle_message(r#"{"type":"answer","sender":7,"sdp":"v=0"}"#)
            .await;

        assert!(rx.try_recv().is_err());
        assert_eq!(client.session_count(), 0);
    }

    #[tokio::test]
    async fn ice_candidate_routes_all_three_fields_to_the_engine() {
        let (client, mut rx) = harness();
        client
            .handle_message(r#"{"type":"subscribe","sender":42}"#)
            .await;
        let _ = collect(&mut rx, 4).await;

        client
            .handle_message(
                r#"{"type":"ice-candidate","sender":42,"candidate":{"sdpMid":"0","sdpMLineIndex":0,"candidate":"candidate:1 1 UDP 2122252543 192.0.2.1 54400 typ host"}}"#,
            )
            .await;

        let events = collect(&mut rx, 1).await;
        assert_eq!(
            events[0],
            Event::AddCandidate(IceCandidateFields {
                sdp_mid: "0".to_string(),
                sdp_mline_index: 0,
                candidate: "candidate:1 1 UDP 2122252543 192.0.2.1 54400 typ host".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn ice_candidate_for_unknown_peer_is_dropped() {
        let (client, mut rx) = harness();

        client
            .handle_message(
                r#"{"type":"ice-candidate","sender":7,"candidate":{"sdpMid":"0","sdpMLineIndex":0,"candidate":"candidate:1"}}"#,
            )
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn consumer_disconnect_removes_session_and_later_answer_is_dropped() {
        let (client, mut rx) = harness();
        client
            .handle_message(r#"{"type":"subscribe","sender":42}"#)
            .await;
        let _ = collect(&mut rx, 4).await;

        client
            .handle_message(r#"{"type":"consumer-disconnected","consumer_id":42}"#)
            .await;
        assert_eq!(client.session_count(), 0);

        client
            .handle_message(r#"{"type":"answer","sender":42,"sdp":"v=0"}"#)
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_clears_all_sessions() {
        let (client, mut rx) = harness();
        client
            .handle_message(r#"{"type":"subscribe","sender":42}"#)
            .await;
        let _ = collect(&mut rx, 4).await;
        assert_eq!(client.session_count(), 1);

        client.disconnect().await;
        assert_eq!(client.session_count(), 0);
    }

    #[tokio::test]
    async fn connect_records_local_identity() {
        let (client, _rx) = harness();
        assert_eq!(client.local_peer_id(), None);

        client.handle_message(r#"{"type":"connect","id":7}"#).await;
        assert_eq!(client.local_peer_id(), Some(7));
    }

    #[tokio::test]
    async fn unknown_and_malformed_messages_are_ignored() {
        let (client, mut rx) = harness();

        client.handle_message(r#"{"type":"shrug"}"#).await;
        client.handle_message("not json at all").await;
        client.handle_message(r#"{"sender":1}"#).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(client.session_count(), 0);
    }

    #[tokio::test]
    async fn renegotiation_reuses_the_offer_path() {
        let (client, mut rx) = harness();
        client
            .handle_message(r#"{"type":"subscribe","sender":42}"#)
            .await;
        let _ = collect(&mut rx, 4).await;

        let observer = NegotiationObserver::new(client.clone(), 42);
        observer.on_negotiation_needed().await;

        let events = collect(&mut rx, 3).await;
        assert_eq!(events[0], Event::CreateOffer);
        match &events[1] {
            Event::Submitted(json) => assert!(json.contains(r#""type":"offer""#)),
            other => panic!("Expected offer submission, got {:?}", other),
        }
        assert!(matches!(events[2], Event::SetLocal(_)));
    }

    #[tokio::test]
    async fn renegotiation_for_removed_session_is_dropped() {
        let (client, mut rx) = harness();

        let observer = NegotiationObserver::new(client.clone(), 42);
        observer.on_negotiation_needed().await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn local_candidate_becomes_an_outbound_envelope() {
        let (client, mut rx) = harness();

        let observer = NegotiationObserver::new(client.clone(), 42);
        observer
            .on_local_candidate(IceCandidateFields {
                sdp_mid: "0".to_string(),
                sdp_mline_index: 1,
                candidate: "candidate:1".to_string(),
            })
            .await;

        let events = collect(&mut rx, 1).await;
        match &events[0] {
            Event::Submitted(json) => {
                assert!(json.contains(r#""type":"ice-candidate""#));
                assert!(json.contains(r#""target":42"#));
                assert!(json.contains(r#""sdpMLineIndex":1"#));
            }
            other => panic!("Expected candidate submission, got {:?}", other),
        }
    }
}
