//! Per-peer session negotiation and signaling for a media conference.
//!
//! A [`channel::ConferenceChannel`] manages exactly one logical media
//! session: publishing a local stream or subscribing to a remote one. It
//! negotiates offer/answer with the server through an abstract
//! [`transport::MediaTransport`], exchanges envelopes through an abstract
//! [`signaling::SignalingTransport`], trickles ICE candidates in generation
//! order, gates subscribe success on both media attachment and server
//! acknowledgment, and routes every failure through one teardown path.
//!
//! Connection management, room membership, and media capture are the
//! embedder's concern; this crate covers the per-session state machine
//! between them.

pub mod channel;
pub mod config;
pub mod error;
pub mod queue;
pub mod sdp;
pub mod signaling;
pub mod stream;
pub mod transport;

pub use channel::{
    ChannelObserver, ChannelStream, ConferenceChannel, DoneCallback, FailureCallback,
    StatsCallback, SuccessCallback,
};
pub use config::{
    AudioCodec, AudioEncodingParameters, ChannelConfiguration, NetworkPriority,
    RtpEncodingParameters, VideoCodec, VideoEncodingParameters,
};
pub use error::{ChannelError, Result};
pub use signaling::{Ack, InitAck, SignalingEnvelope, SignalingTransport};
pub use stream::{
    AudioSourceInfo, AudioSubscribeConstraints, LocalStream, MediaStreamHandle, MediaTrack,
    PublicationSettings, RemoteStream, Resolution, SubscribeOptions, SubscriptionCapabilities,
    TrackKind, TrackState, VideoPublicationSettings, VideoSourceInfo, VideoSubscribeConstraints,
    VideoSubscriptionCapabilities,
};
pub use transport::{
    IceCandidate, IceConnectionState, MediaTransport, SdpType, SessionDescription, SignalingState,
    TransceiverDirection, TransceiverInit, TransceiverSource,
};
