//! Media transport capability
//!
//! The underlying media engine (ICE gathering, DTLS, codec negotiation,
//! RTP/RTCP) sits behind [`MediaTransport`]. The channel drives it for
//! offer/answer and transceiver setup, and receives its notifications
//! through the channel's `on_*` entry points.

use crate::config::RtpEncodingParameters;
use crate::error::Result;
use crate::stream::TrackKind;
use async_trait::async_trait;

/// Offer/answer exchange progress as seen by the media transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    /// No offer/answer exchange in progress
    Stable,
    /// A local offer was applied
    HaveLocalOffer,
    /// A remote offer was applied
    HaveRemoteOffer,
    /// A local provisional answer was applied
    HaveLocalPranswer,
    /// A remote provisional answer was applied
    HaveRemotePranswer,
    /// The connection is closed
    Closed,
}

impl SignalingState {
    /// True when candidate draining and ICE restarts may execute
    pub fn is_stable(&self) -> bool {
        matches!(self, SignalingState::Stable)
    }
}

/// ICE connectivity as seen by the media transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    /// Gathering or checking
    New,
    /// Checking candidate pairs
    Checking,
    /// A usable pair was found
    Connected,
    /// All checks finished with a usable pair
    Completed,
    /// Connectivity was lost, possibly transiently
    Disconnected,
    /// Terminal failure, no usable pair
    Failed,
    /// The transport is closed
    Closed,
}

/// Kind tag of a session description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    /// An offer
    Offer,
    /// An answer
    Answer,
}

impl SdpType {
    /// Wire tag of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpType::Offer => "offer",
            SdpType::Answer => "answer",
        }
    }
}

/// A session description produced or consumed by the media transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    /// Offer or answer
    pub kind: SdpType,
    /// SDP text
    pub sdp: String,
}

impl SessionDescription {
    /// An offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// An answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Direction of a transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransceiverDirection {
    /// Send media only
    SendOnly,
    /// Receive media only
    RecvOnly,
    /// Send and receive
    SendRecv,
    /// Negotiated but inactive
    Inactive,
}

/// What a transceiver is created for: a local track or a bare media kind
#[derive(Debug, Clone)]
pub enum TransceiverSource {
    /// Attach a local track by id
    Track {
        /// Track identifier
        track_id: String,
        /// Media kind of the track
        kind: TrackKind,
    },
    /// Reserve an m-line of the given kind without a local track
    Kind(TrackKind),
}

/// Parameters of a transceiver to add
#[derive(Debug, Clone)]
pub struct TransceiverInit {
    /// Transceiver direction
    pub direction: TransceiverDirection,
    /// Stream ids the transceiver belongs to
    pub stream_ids: Vec<String>,
    /// Send encodings (simulcast layers) for outgoing media
    pub send_encodings: Vec<RtpEncodingParameters>,
}

impl TransceiverInit {
    /// An init with the given direction and no encodings
    pub fn with_direction(direction: TransceiverDirection) -> Self {
        Self {
            direction,
            stream_ids: Vec::new(),
            send_encodings: Vec::new(),
        }
    }
}

/// A locally generated ICE candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    /// m-line index the candidate belongs to
    pub sdp_mline_index: i32,
    /// Media section id the candidate belongs to
    pub sdp_mid: String,
    /// Candidate string without the `a=` prefix
    pub candidate: String,
}

/// Abstract media transport engine
///
/// All methods complete asynchronously; errors carry the engine's own
/// message and surface as `ChannelError::Transport`.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Create a local offer
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Create a local answer
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Commit a local description
    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    /// Commit a remote description
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Add a transceiver for a track or media kind
    async fn add_transceiver(&self, source: TransceiverSource, init: TransceiverInit)
        -> Result<()>;

    /// Close the connection; closing an already-closed connection is a no-op
    async fn close(&self) -> Result<()>;

    /// Fetch a stats report
    async fn get_stats(&self) -> Result<serde_json::Value>;
}
