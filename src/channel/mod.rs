//! The conference channel: one negotiated media session per instance
//!
//! `ConferenceChannel` owns the publish/subscribe lifecycle for exactly one
//! logical session. It drives the media transport for offer/answer and
//! transceiver setup, emits signaling envelopes through the signaling
//! transport, buffers locally generated ICE candidates while negotiation is
//! in flight, and funnels every failure through a single teardown path.
//!
//! The channel has no explicit state variable; its state is derived from
//! which stream slot is held (Idle / Publisher / Subscriber), whether
//! callback slots are occupied (Negotiating), and the teardown flag
//! (Closed).
//!
//! All user-supplied callbacks are delivered on the channel's ordered event
//! queue, never synchronously inside the call that registered them and never
//! while a state lock is held. Outbound signaling sends ride the same queue,
//! which is what keeps candidate transmission in generation order.

use crate::config::{ChannelConfiguration, RtpEncodingParameters};
use crate::error::ChannelError;
use crate::queue::EventQueue;
use crate::sdp;
use crate::signaling::{Ack, InitAck, SignalingEnvelope, SignalingTransport};
use crate::stream::{
    sub_option_allowed, LocalStream, MediaStreamHandle, RemoteStream, SubscribeOptions, TrackKind,
    VideoSourceInfo,
};
use crate::transport::{
    IceCandidate, IceConnectionState, MediaTransport, SdpType, SessionDescription, SignalingState,
    TransceiverDirection, TransceiverInit, TransceiverSource,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Success callback carrying the session id
pub type SuccessCallback = Box<dyn FnOnce(String) + Send>;
/// Completion callback for operations without a payload
pub type DoneCallback = Box<dyn FnOnce() + Send>;
/// Failure callback carrying the error
pub type FailureCallback = Box<dyn FnOnce(ChannelError) + Send>;
/// Stats callback carrying the transport's report
pub type StatsCallback = Box<dyn FnOnce(Value) + Send>;

/// The stream a channel-level error belongs to
#[derive(Debug, Clone)]
pub enum ChannelStream {
    /// The locally published stream
    Published(Arc<LocalStream>),
    /// The subscribed remote stream
    Subscribed(Arc<RemoteStream>),
}

/// Listener for stream-level errors on a channel.
///
/// Registrations are compared by identity (`Arc::ptr_eq`), not value.
pub trait ChannelObserver: Send + Sync {
    /// A stream-level error occurred; `stream` is the owning stream when one
    /// is still held
    fn on_stream_error(&self, stream: Option<ChannelStream>, error: &ChannelError);
}

/// At most one of each pending callback; cleared after any terminal outcome
#[derive(Default)]
struct CallbackSet {
    publish_success: Option<SuccessCallback>,
    subscribe_success: Option<SuccessCallback>,
    failure: Option<FailureCallback>,
}

impl CallbackSet {
    fn clear(&mut self) {
        self.publish_success = None;
        self.subscribe_success = None;
        self.failure = None;
    }
}

/// Dual-condition gate for subscribe success
#[derive(Default)]
struct SubscribeReadiness {
    stream_attached: bool,
    server_acknowledged: bool,
}

/// Per-peer session negotiation and signaling state machine.
///
/// Construct with [`ConferenceChannel::new`] inside a tokio runtime; the
/// event queue spawns its drain loop at construction time.
pub struct ConferenceChannel {
    config: ChannelConfiguration,
    signaling: Arc<dyn SignalingTransport>,
    transport: Arc<dyn MediaTransport>,
    queue: EventQueue,
    weak_self: Weak<ConferenceChannel>,

    session_id: Mutex<String>,
    signaling_state: Mutex<SignalingState>,
    ice_restart_needed: AtomicBool,
    connected: AtomicBool,

    published: Mutex<Option<Arc<LocalStream>>>,
    subscribed: Mutex<Option<Arc<RemoteStream>>>,

    // One lock per concern; none is ever held across an .await or while a
    // user callback runs.
    candidates: Mutex<Vec<Value>>,
    readiness: Mutex<SubscribeReadiness>,
    callbacks: Mutex<CallbackSet>,
    torn_down: Mutex<bool>,
    observers: Mutex<Vec<Arc<dyn ChannelObserver>>>,
}

impl ConferenceChannel {
    /// Create a channel over the given capabilities
    pub fn new(
        config: ChannelConfiguration,
        signaling: Arc<dyn SignalingTransport>,
        transport: Arc<dyn MediaTransport>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            config,
            signaling,
            transport,
            queue: EventQueue::new(),
            weak_self: weak.clone(),
            session_id: Mutex::new(String::new()),
            signaling_state: Mutex::new(SignalingState::Stable),
            ice_restart_needed: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            published: Mutex::new(None),
            subscribed: Mutex::new(None),
            candidates: Mutex::new(Vec::new()),
            readiness: Mutex::new(SubscribeReadiness::default()),
            callbacks: Mutex::new(CallbackSet::default()),
            torn_down: Mutex::new(false),
            observers: Mutex::new(Vec::new()),
        })
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Register an error observer; duplicate registrations are ignored
    pub fn add_observer(&self, observer: Arc<dyn ChannelObserver>) {
        let mut observers = self.observers.lock();
        if observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            warn!("adding duplicate observer");
            return;
        }
        observers.push(observer);
    }

    /// Remove an observer by identity
    pub fn remove_observer(&self, observer: &Arc<dyn ChannelObserver>) {
        self.observers.lock().retain(|o| !Arc::ptr_eq(o, observer));
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Session id assigned by the signaling server; empty before assignment
    pub fn session_id(&self) -> String {
        self.session_id.lock().clone()
    }

    fn set_session_id(&self, id: String) {
        info!("setting session id for current channel");
        *self.session_id.lock() = id;
    }

    /// Id of the subscribed remote stream, or empty when not subscribing
    pub fn subscribed_stream_id(&self) -> String {
        self.subscribed
            .lock()
            .as_ref()
            .map(|s| s.id().to_string())
            .unwrap_or_default()
    }

    /// Whether the transport has reported a connected/completed ICE state
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Wait until every callback and send scheduled before this call has run
    pub async fn flush_events(&self) {
        self.queue.flush().await;
    }

    // ------------------------------------------------------------------
    // Publish / subscribe
    // ------------------------------------------------------------------

    /// Publish a local stream.
    ///
    /// Terminal success fires only when the server later acknowledges the
    /// session with `"success"`, not at initialization-ack time.
    pub fn publish(
        &self,
        stream: Option<Arc<LocalStream>>,
        on_success: Option<SuccessCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        info!("publish a local stream");
        // Both null checks execute; a single fault reports either failure.
        let stream_missing = stream.is_none();
        let media_missing = stream
            .as_ref()
            .map(|s| s.media_stream().is_none())
            .unwrap_or(true);
        if stream_missing || media_missing {
            info!("local stream cannot be null");
            self.post_failure(on_failure, ChannelError::NullArgument);
            return;
        }
        let stream = match stream {
            Some(s) => s,
            None => return,
        };
        let media = match stream.media_stream() {
            Some(m) => m.clone(),
            None => return,
        };
        if media.is_ended() {
            self.post_failure(on_failure, ChannelError::EndedStream);
            return;
        }
        if media.audio_track_count() == 0 && media.video_track_count() == 0 {
            self.post_failure(on_failure, ChannelError::NoTracks);
            return;
        }

        *self.published.lock() = Some(Arc::clone(&stream));
        {
            let mut callbacks = self.callbacks.lock();
            callbacks.publish_success = on_success;
            callbacks.failure = on_failure;
        }

        let options = SignalingEnvelope::publish_options(&stream, &media);
        let media_id = media.id.clone();
        let weak = self.weak_self.clone();
        let signaling = Arc::clone(&self.signaling);
        self.queue.post_async(Box::pin(async move {
            match signaling.send_initialization(options, &media_id, "").await {
                Ok(ack) => {
                    if let Some(channel) = weak.upgrade() {
                        channel.on_publish_initialized(&media, ack).await;
                    }
                }
                Err(e) => {
                    warn!("publish initialization failed: {}", e);
                    if let Some(channel) = weak.upgrade() {
                        channel.fail_pending(ChannelError::Signaling(e.to_string()));
                    }
                }
            }
        }));
    }

    /// Initialization acknowledged: record the session id, add one send-only
    /// transceiver per local track, then start the offer.
    async fn on_publish_initialized(&self, media: &MediaStreamHandle, ack: InitAck) {
        self.set_session_id(ack.session_id);
        for track in media.tracks_of(TrackKind::Audio) {
            let init = TransceiverInit {
                direction: TransceiverDirection::SendOnly,
                stream_ids: vec![media.id.clone()],
                send_encodings: Vec::new(),
            };
            let source = TransceiverSource::Track {
                track_id: track.id.clone(),
                kind: TrackKind::Audio,
            };
            if let Err(e) = self.transport.add_transceiver(source, init).await {
                warn!("failed to add audio transceiver: {}", e);
            }
        }
        for track in media.tracks_of(TrackKind::Video) {
            let init = TransceiverInit {
                direction: TransceiverDirection::SendOnly,
                stream_ids: vec![media.id.clone()],
                send_encodings: self.configured_send_encodings(),
            };
            let source = TransceiverSource::Track {
                track_id: track.id.clone(),
                kind: TrackKind::Video,
            };
            if let Err(e) = self.transport.add_transceiver(source, init).await {
                warn!("failed to add video transceiver: {}", e);
            }
        }
        self.negotiate_local_description(SdpType::Offer).await;
    }

    /// Send encodings from configuration with out-of-range values dropped.
    /// Temporal-layer counts outside [1, 4] are treated as unspecified.
    fn configured_send_encodings(&self) -> Vec<RtpEncodingParameters> {
        self.config
            .video_send_encodings()
            .iter()
            .map(|encoding| {
                let mut encoding = encoding.clone();
                if !(1..=4).contains(&encoding.num_temporal_layers) {
                    encoding.num_temporal_layers = 0;
                }
                encoding
            })
            .collect()
    }

    /// Subscribe to a remote stream.
    ///
    /// Success fires once both the media stream is attached and the server
    /// acknowledged the subscription, in whichever order those arrive.
    pub fn subscribe(
        &self,
        stream: Option<Arc<RemoteStream>>,
        options: SubscribeOptions,
        on_success: Option<SuccessCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        let stream = match stream {
            Some(s) => s,
            None => {
                error!("remote stream cannot be null");
                self.post_failure(on_failure, ChannelError::NullArgument);
                return;
            }
        };
        info!(
            "subscribe a remote stream, has audio? {}, has video? {}",
            stream.has_audio(),
            stream.has_video()
        );
        if !sub_option_allowed(&options, stream.settings(), stream.capabilities()) {
            error!("subscribe option mismatch with stream subscription capabilities");
            self.post_failure(on_failure, ChannelError::UnsupportedSubscribeOption);
            return;
        }
        // Check and install in one critical section; a racing subscribe must
        // not overwrite the in-flight registration.
        {
            let mut callbacks = self.callbacks.lock();
            if callbacks.subscribe_success.is_some() {
                drop(callbacks);
                self.post_failure(on_failure, ChannelError::subscribe_in_progress());
                return;
            }
            callbacks.subscribe_success = on_success;
            callbacks.failure = on_failure;
        }
        *self.subscribed.lock() = Some(Arc::clone(&stream));

        let audio_enabled = stream.has_audio() && !options.audio.disabled;
        let video_enabled = stream.has_video() && !options.video.disabled;
        let payload =
            SignalingEnvelope::subscribe_options(&stream, &options, audio_enabled, video_enabled);
        let source_id = stream.id().to_string();
        let weak = self.weak_self.clone();
        let signaling = Arc::clone(&self.signaling);
        let transport = Arc::clone(&self.transport);
        self.queue.post_async(Box::pin(async move {
            if audio_enabled {
                let init = TransceiverInit::with_direction(TransceiverDirection::RecvOnly);
                if let Err(e) = transport
                    .add_transceiver(TransceiverSource::Kind(TrackKind::Audio), init)
                    .await
                {
                    warn!("failed to add audio transceiver: {}", e);
                }
            }
            if video_enabled {
                let init = TransceiverInit::with_direction(TransceiverDirection::RecvOnly);
                if let Err(e) = transport
                    .add_transceiver(TransceiverSource::Kind(TrackKind::Video), init)
                    .await
                {
                    warn!("failed to add video transceiver: {}", e);
                }
            }
            match signaling.send_initialization(payload, "", &source_id).await {
                Ok(ack) => {
                    if let Some(channel) = weak.upgrade() {
                        channel.set_session_id(ack.session_id);
                        channel.negotiate_local_description(SdpType::Offer).await;
                    }
                }
                Err(e) => {
                    warn!("subscribe initialization failed: {}", e);
                    if let Some(channel) = weak.upgrade() {
                        channel.fail_pending(ChannelError::Signaling(e.to_string()));
                    }
                }
            }
        }));
    }

    /// Stop publishing. The supplied id must match the channel's session.
    pub fn unpublish(
        &self,
        session_id: &str,
        on_success: Option<DoneCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        if session_id != self.session_id() {
            error!("publication id mismatch");
            self.post_failure(on_failure, ChannelError::invalid_unpublish());
            return;
        }
        self.teardown("unpublish", on_success, on_failure);
    }

    /// Stop subscribing. Rejected while the subscribe is still in flight.
    pub fn unsubscribe(
        &self,
        session_id: &str,
        on_success: Option<DoneCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        if session_id != self.session_id() {
            error!("subscription id mismatch");
            self.post_failure(on_failure, ChannelError::invalid_unsubscribe());
            return;
        }
        if self.callbacks.lock().subscribe_success.is_some() {
            self.post_failure(on_failure, ChannelError::unsubscribe_during_subscribe());
            return;
        }
        self.teardown("unsubscribe", on_success, on_failure);
    }

    /// Emit the stream event once and close the transport once. Later calls
    /// complete successfully without re-emitting — teardown may be reached
    /// from both an explicit unpublish/unsubscribe and a fault path.
    fn teardown(
        &self,
        event: &'static str,
        on_success: Option<DoneCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        self.connected.store(false, Ordering::SeqCst);
        let first = {
            let mut torn_down = self.torn_down.lock();
            !std::mem::replace(&mut *torn_down, true)
        };
        if !first {
            if let Some(cb) = on_success {
                self.queue.post(cb);
            }
            return;
        }
        *self.published.lock() = None;
        *self.subscribed.lock() = None;
        let session_id = self.session_id();
        let weak = self.weak_self.clone();
        let signaling = Arc::clone(&self.signaling);
        let transport = Arc::clone(&self.transport);
        self.queue.post_async(Box::pin(async move {
            match signaling.send_stream_event(event, &session_id).await {
                Ok(()) => {
                    if weak.upgrade().is_some() {
                        if let Some(cb) = on_success {
                            cb();
                        }
                    }
                }
                Err(e) => {
                    warn!("failed to send {} event: {}", event, e);
                    if weak.upgrade().is_some() {
                        if let Some(cb) = on_failure {
                            cb(ChannelError::Signaling(e.to_string()));
                        }
                    }
                }
            }
            info!("close peer connection");
            if let Err(e) = transport.close().await {
                warn!("failed to close transport: {}", e);
            }
        }));
    }

    /// Tear down whichever role is still active, as on destruction
    pub fn close(&self) {
        let session_id = self.session_id();
        let is_publisher = self.published.lock().is_some();
        let is_subscriber = self.subscribed.lock().is_some();
        if is_publisher {
            self.unpublish(&session_id, None, None);
        } else if is_subscriber {
            self.unsubscribe(&session_id, None, None);
        }
    }

    /// Kept for API parity; sessions stop via unpublish/unsubscribe
    pub fn stop(&self) {
        info!("stop session");
    }

    // ------------------------------------------------------------------
    // Media / transport control
    // ------------------------------------------------------------------

    fn send_control(
        &self,
        in_action: &'static str,
        out_action: &'static str,
        operation: &'static str,
        on_success: Option<DoneCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        let session_id = self.session_id();
        let signaling = Arc::clone(&self.signaling);
        let weak = self.weak_self.clone();
        let is_publisher = self.published.lock().is_some();
        let is_subscriber = self.subscribed.lock().is_some();
        if !is_publisher && !is_subscriber {
            error!("control requested with no active session");
            debug_assert!(false, "control requested with no active session");
            return;
        }
        self.queue.post_async(Box::pin(async move {
            let result = if is_publisher {
                signaling
                    .send_stream_control(&session_id, out_action, operation)
                    .await
            } else {
                signaling
                    .send_subscription_control(&session_id, in_action, operation)
                    .await
            };
            if weak.upgrade().is_none() {
                return;
            }
            match result {
                Ok(()) => {
                    if let Some(cb) = on_success {
                        cb();
                    }
                }
                Err(e) => {
                    if let Some(cb) = on_failure {
                        cb(ChannelError::Signaling(e.to_string()));
                    }
                }
            }
        }));
    }

    /// Resume both audio and video
    pub fn play_audio_video(
        &self,
        on_success: Option<DoneCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        self.send_control("av", "av", "play", on_success, on_failure);
    }

    /// Pause both audio and video
    pub fn pause_audio_video(
        &self,
        on_success: Option<DoneCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        self.send_control("av", "av", "pause", on_success, on_failure);
    }

    /// Resume audio
    pub fn play_audio(
        &self,
        on_success: Option<DoneCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        self.send_control("audio", "audio", "play", on_success, on_failure);
    }

    /// Pause audio
    pub fn pause_audio(
        &self,
        on_success: Option<DoneCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        self.send_control("audio", "audio", "pause", on_success, on_failure);
    }

    /// Resume video
    pub fn play_video(
        &self,
        on_success: Option<DoneCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        self.send_control("video", "video", "play", on_success, on_failure);
    }

    /// Pause video
    pub fn pause_video(
        &self,
        on_success: Option<DoneCallback>,
        on_failure: Option<FailureCallback>,
    ) {
        self.send_control("video", "video", "pause", on_success, on_failure);
    }

    /// Fetch a stats report from the media transport
    pub fn get_stats(&self, on_success: StatsCallback, on_failure: Option<FailureCallback>) {
        if self.published.lock().is_none() && self.subscribed.lock().is_none() {
            self.post_failure(on_failure, ChannelError::NoActiveStream);
            return;
        }
        let transport = Arc::clone(&self.transport);
        let weak = self.weak_self.clone();
        self.queue.post_async(Box::pin(async move {
            let result = transport.get_stats().await;
            if weak.upgrade().is_none() {
                return;
            }
            match result {
                Ok(report) => on_success(report),
                Err(e) => {
                    if let Some(cb) = on_failure {
                        cb(ChannelError::Transport(e.to_string()));
                    }
                }
            }
        }));
    }

    // ------------------------------------------------------------------
    // Negotiation
    // ------------------------------------------------------------------

    /// Request a fresh local offer from the media transport
    pub fn create_offer(&self) {
        info!("create offer");
        self.post_negotiation(SdpType::Offer);
    }

    /// Request a local answer from the media transport
    pub fn create_answer(&self) {
        info!("create answer");
        self.post_negotiation(SdpType::Answer);
    }

    fn post_negotiation(&self, kind: SdpType) {
        let weak = self.weak_self.clone();
        self.queue.post_async(Box::pin(async move {
            if let Some(channel) = weak.upgrade() {
                channel.negotiate_local_description(kind).await;
            }
        }));
    }

    async fn negotiate_local_description(&self, kind: SdpType) {
        let created = match kind {
            SdpType::Offer => self.transport.create_offer().await,
            SdpType::Answer => self.transport.create_answer().await,
        };
        match created {
            Ok(description) => self.commit_local_description(description).await,
            Err(e) => info!("create sdp failed: {}", e),
        }
    }

    /// Post-process codec preferences, commit the local description, then
    /// emit it as a signaling message tagged with its own type.
    async fn commit_local_description(&self, description: SessionDescription) {
        debug!("create sdp success");
        let sdp = sdp::prefer_audio_codecs(&description.sdp, &self.config.audio_codecs());
        let is_screen = self.is_screen_session();
        let sdp = sdp::prefer_video_codecs(&sdp, &self.config.video_codecs(is_screen));
        let description = SessionDescription {
            kind: description.kind,
            sdp,
        };
        match self
            .transport
            .set_local_description(description.clone())
            .await
        {
            Ok(()) => {
                debug!("set local sdp success");
                let message = SignalingEnvelope::description(
                    &self.session_id(),
                    description.kind.as_str(),
                    &description.sdp,
                );
                if let Err(e) = self.signaling.send_sdp(message).await {
                    warn!("failed to send local description: {}", e);
                }
            }
            Err(e) => {
                warn!("set local sdp failed: {}", e);
                self.fail_pending(ChannelError::set_local_failed());
                self.handle_stream_error(ChannelError::set_local_failed());
            }
        }
    }

    fn is_screen_session(&self) -> bool {
        if let Some(stream) = self.published.lock().as_ref() {
            return stream.video_source() == VideoSourceInfo::ScreenCast;
        }
        if let Some(stream) = self.subscribed.lock().as_ref() {
            return stream.video_source() == VideoSourceInfo::ScreenCast;
        }
        false
    }

    /// Ask for an ICE restart, deferring it until Stable when necessary
    pub fn request_ice_restart(&self) {
        let stable = self.signaling_state.lock().is_stable();
        if stable {
            self.do_ice_restart();
        } else {
            self.ice_restart_needed.store(true, Ordering::SeqCst);
        }
    }

    fn do_ice_restart(&self) {
        info!("ice restart");
        debug_assert!(
            self.signaling_state.lock().is_stable(),
            "ice restart outside stable state"
        );
        self.create_offer();
    }

    // ------------------------------------------------------------------
    // Transport notifications
    // ------------------------------------------------------------------

    /// The media transport's signaling state changed.
    ///
    /// On the transition into Stable a pending restart wins over draining:
    /// the backlog is discarded and a fresh offer starts from an empty
    /// candidate queue.
    pub fn on_signaling_change(&self, new_state: SignalingState) {
        info!("signaling state changed: {:?}", new_state);
        // Candidate lock taken first so the queue-or-send decision in
        // on_ice_candidate cannot interleave with the drain.
        let mut candidates = self.candidates.lock();
        *self.signaling_state.lock() = new_state;
        if !new_state.is_stable() {
            return;
        }
        if self.ice_restart_needed.swap(false, Ordering::SeqCst) {
            candidates.clear();
            drop(candidates);
            self.do_ice_restart();
        } else {
            for message in candidates.drain(..) {
                self.post_send_sdp(message);
            }
        }
    }

    /// A local ICE candidate was generated
    pub fn on_ice_candidate(&self, candidate: IceCandidate) {
        debug!("on ice candidate");
        let message = SignalingEnvelope::candidate(&self.session_id(), &candidate);
        let mut candidates = self.candidates.lock();
        if self.signaling_state.lock().is_stable() {
            drop(candidates);
            self.post_send_sdp(message);
        } else {
            candidates.push(message);
        }
    }

    /// Previously sent ICE candidates were removed.
    ///
    /// Removal notices report candidates that already left, so they bypass
    /// the Stable-state gate.
    pub fn on_ice_candidates_removed(&self, removed: Vec<String>) {
        debug!("on ice candidates removed");
        if removed.is_empty() {
            return;
        }
        let message = SignalingEnvelope::removed_candidates(&self.session_id(), &removed);
        self.post_send_sdp(message);
    }

    /// ICE connectivity changed
    pub fn on_ice_connection_change(&self, new_state: IceConnectionState) {
        info!("ice connection state changed: {:?}", new_state);
        match new_state {
            IceConnectionState::Connected | IceConnectionState::Completed => {
                self.connected.store(true, Ordering::SeqCst);
            }
            IceConnectionState::Failed => {
                if self.connected.load(Ordering::SeqCst) {
                    self.handle_stream_error(ChannelError::TransportConnectionFailed);
                }
                self.connected.store(false, Ordering::SeqCst);
            }
            _ => {}
        }
    }

    /// The negotiated remote media stream was attached by the transport
    pub fn on_stream_added(&self, handle: MediaStreamHandle) {
        info!("on add stream");
        if let Some(stream) = self.subscribed.lock().as_ref() {
            stream.attach_media_stream(handle);
        }
        if self.callbacks.lock().subscribe_success.is_none() {
            return;
        }
        let fire = {
            let mut readiness = self.readiness.lock();
            readiness.stream_attached = true;
            if readiness.server_acknowledged {
                readiness.stream_attached = false;
                readiness.server_acknowledged = false;
                true
            } else {
                false
            }
        };
        if fire {
            self.fire_subscribe_success();
        }
    }

    // ------------------------------------------------------------------
    // Inbound signaling
    // ------------------------------------------------------------------

    /// Process a message from the signaling server: a bare `"success"` /
    /// `"failure"` acknowledgment, or an answer to our offer. Anything else
    /// is ignored.
    pub fn on_signaling_message(&self, message: &Value) {
        if let Some(ack) = SignalingEnvelope::parse_ack(message) {
            match ack {
                Ack::Success => self.on_server_success(),
                Ack::Failure => self.on_server_failure(),
            }
            return;
        }
        if message.is_string() {
            return;
        }
        if !message.is_object() {
            warn!("ignoring invalid signaling message from server");
            return;
        }
        match SignalingEnvelope::parse_remote_answer(message) {
            Some((_, sdp)) => self.apply_remote_answer(sdp),
            None => debug!("ignoring signaling message from server other than answer"),
        }
    }

    /// The remote description type is fixed to "answer": the server only
    /// ever answers our offers in this protocol.
    fn apply_remote_answer(&self, sdp: String) {
        let weak = self.weak_self.clone();
        let transport = Arc::clone(&self.transport);
        self.queue.post_async(Box::pin(async move {
            match transport
                .set_remote_description(SessionDescription::answer(sdp))
                .await
            {
                Ok(()) => debug!("set remote sdp success"),
                Err(e) => {
                    warn!("set remote sdp failed: {}", e);
                    if let Some(channel) = weak.upgrade() {
                        channel.fail_pending(ChannelError::set_remote_failed());
                        channel.handle_stream_error(ChannelError::remote_description_error());
                    }
                }
            }
        }));
    }

    fn on_server_success(&self) {
        let (publish_pending, subscribe_pending) = {
            let callbacks = self.callbacks.lock();
            (
                callbacks.publish_success.is_some(),
                callbacks.subscribe_success.is_some(),
            )
        };
        if publish_pending {
            self.fire_publish_success();
        } else if subscribe_pending {
            let fire = {
                let mut readiness = self.readiness.lock();
                readiness.server_acknowledged = true;
                if readiness.stream_attached {
                    readiness.stream_attached = false;
                    readiness.server_acknowledged = false;
                    true
                } else {
                    false
                }
            };
            if fire {
                self.fire_subscribe_success();
            }
        }
    }

    fn on_server_failure(&self) {
        // An established session ignores late failure acks.
        if self.connected.load(Ordering::SeqCst) {
            return;
        }
        if self.callbacks.lock().failure.is_none() {
            return;
        }
        self.fail_pending(ChannelError::ServerReportedFailure);
    }

    // ------------------------------------------------------------------
    // Callback delivery
    // ------------------------------------------------------------------

    fn post_failure(&self, on_failure: Option<FailureCallback>, error: ChannelError) {
        if let Some(cb) = on_failure {
            self.queue.post(move || cb(error));
        }
    }

    /// Fire the registered failure callback once and clear every slot.
    ///
    /// The slots are cleared before returning; only the invocation is
    /// deferred. A fault-triggered teardown that follows must not observe
    /// the failed operation as still in flight.
    fn fail_pending(&self, error: ChannelError) {
        let cb = {
            let mut callbacks = self.callbacks.lock();
            let cb = callbacks.failure.take();
            if cb.is_some() {
                callbacks.clear();
            }
            cb
        };
        if let Some(cb) = cb {
            self.queue.post(move || cb(error));
        }
    }

    fn fire_publish_success(&self) {
        let weak = self.weak_self.clone();
        self.queue.post(move || {
            let channel = match weak.upgrade() {
                Some(c) => c,
                None => return,
            };
            let session_id = channel.session_id();
            let cb = {
                let mut callbacks = channel.callbacks.lock();
                let cb = callbacks.publish_success.take();
                if cb.is_some() {
                    callbacks.clear();
                }
                cb
            };
            if let Some(cb) = cb {
                cb(session_id);
            }
        });
    }

    fn fire_subscribe_success(&self) {
        let weak = self.weak_self.clone();
        self.queue.post(move || {
            let channel = match weak.upgrade() {
                Some(c) => c,
                None => return,
            };
            let session_id = channel.session_id();
            let cb = {
                let mut callbacks = channel.callbacks.lock();
                let cb = callbacks.subscribe_success.take();
                if cb.is_some() {
                    callbacks.clear();
                }
                cb
            };
            if let Some(cb) = cb {
                cb(session_id);
            }
        });
    }

    fn post_send_sdp(&self, message: Value) {
        let signaling = Arc::clone(&self.signaling);
        self.queue.post_async(Box::pin(async move {
            if let Err(e) = signaling.send_sdp(message).await {
                warn!("failed to send signaling message: {}", e);
            }
        }));
    }

    // ------------------------------------------------------------------
    // Faults
    // ------------------------------------------------------------------

    /// Broadcast a stream error to every observer, then tear down whichever
    /// role is active. Safe to reach while teardown is already underway.
    fn handle_stream_error(&self, error: ChannelError) {
        let observers: Vec<Arc<dyn ChannelObserver>> = self.observers.lock().clone();
        let stream = {
            if let Some(s) = self.published.lock().as_ref() {
                Some(ChannelStream::Published(Arc::clone(s)))
            } else {
                self.subscribed
                    .lock()
                    .as_ref()
                    .map(|s| ChannelStream::Subscribed(Arc::clone(s)))
            }
        };
        let broadcast_error = error.clone();
        let broadcast_stream = stream.clone();
        self.queue.post(move || {
            for observer in &observers {
                info!("on stream error");
                observer.on_stream_error(broadcast_stream.clone(), &broadcast_error);
            }
        });
        let session_id = self.session_id();
        match stream {
            Some(ChannelStream::Published(_)) => self.unpublish(&session_id, None, None),
            Some(ChannelStream::Subscribed(_)) => self.unsubscribe(&session_id, None, None),
            None => debug!("stream error with no active stream"),
        }
    }
}

impl Drop for ConferenceChannel {
    fn drop(&mut self) {
        debug!("deconstruct conference channel");
    }
}
