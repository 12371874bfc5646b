//! Channel configuration: codec preferences and RTP encoding parameters
//!
//! The embedder fills this in once per channel; the channel consults it when
//! post-processing local descriptions and when adding send transceivers.

use serde::{Deserialize, Serialize};

/// Audio codec identifiers used for SDP preference ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    /// Opus
    Opus,
    /// G.711 mu-law
    Pcmu,
    /// G.711 A-law
    Pcma,
    /// G.722
    G722,
    /// iSAC
    Isac,
    /// iLBC
    Ilbc,
}

impl AudioCodec {
    /// Codec name as it appears in `a=rtpmap` lines
    pub fn sdp_name(&self) -> &'static str {
        match self {
            AudioCodec::Opus => "opus",
            AudioCodec::Pcmu => "PCMU",
            AudioCodec::Pcma => "PCMA",
            AudioCodec::G722 => "G722",
            AudioCodec::Isac => "ISAC",
            AudioCodec::Ilbc => "ILBC",
        }
    }
}

/// Video codec identifiers used for SDP preference ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    /// VP8
    Vp8,
    /// VP9
    Vp9,
    /// H.264
    H264,
    /// H.265
    H265,
    /// AV1
    Av1,
}

impl VideoCodec {
    /// Codec name as it appears in `a=rtpmap` lines
    pub fn sdp_name(&self) -> &'static str {
        match self {
            VideoCodec::Vp8 => "VP8",
            VideoCodec::Vp9 => "VP9",
            VideoCodec::H264 => "H264",
            VideoCodec::H265 => "H265",
            VideoCodec::Av1 => "AV1",
        }
    }
}

/// Relative network priority for a send encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkPriority {
    /// Transport default; not forwarded to the media transport
    #[default]
    Default,
    /// Very low priority
    VeryLow,
    /// Low priority
    Low,
    /// Medium priority
    Medium,
    /// High priority
    High,
}

/// One simulcast/send encoding layer, as configured by the embedder.
///
/// Zero-valued fields mean "not specified" and are not forwarded to the
/// media transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RtpEncodingParameters {
    /// Simulcast rid; empty when not a simulcast layer
    pub rid: String,
    /// Maximum bitrate in bits per second; 0 = unspecified
    pub max_bitrate_bps: u64,
    /// Maximum framerate; 0 = unspecified
    pub max_framerate: u32,
    /// Downscale factor relative to the source resolution; <= 0 = unspecified
    pub scale_resolution_down_by: f64,
    /// Temporal layer count; only applied when within [1, 4]
    pub num_temporal_layers: i32,
    /// Network priority for this layer
    pub priority: NetworkPriority,
    /// Whether the layer starts active
    pub active: bool,
}

/// Audio encoding preferences for one codec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioEncodingParameters {
    /// Preferred codec, in declaration order
    pub codec: AudioCodec,
}

/// Video encoding preferences for one codec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoEncodingParameters {
    /// Preferred codec, in declaration order
    pub codec: VideoCodec,
    /// Send encodings (simulcast layers) applied to the first video entry
    pub rtp_encoding_parameters: Vec<RtpEncodingParameters>,
}

/// Per-channel configuration handed in by the embedder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfiguration {
    /// Audio codec preference order for local descriptions
    pub audio: Vec<AudioEncodingParameters>,
    /// Video codec preference order for local descriptions
    pub video: Vec<VideoEncodingParameters>,
    /// Distinct codec preference order for screen-cast sessions; falls back
    /// to `video` when empty
    pub screen_video_codecs: Vec<VideoCodec>,
}

impl ChannelConfiguration {
    /// Audio codec allow-list in preference order
    pub fn audio_codecs(&self) -> Vec<AudioCodec> {
        self.audio.iter().map(|p| p.codec).collect()
    }

    /// Video codec allow-list in preference order for the given source
    pub fn video_codecs(&self, is_screen: bool) -> Vec<VideoCodec> {
        if is_screen && !self.screen_video_codecs.is_empty() {
            return self.screen_video_codecs.clone();
        }
        self.video.iter().map(|p| p.codec).collect()
    }

    /// Send encodings configured for outgoing video, if any
    pub fn video_send_encodings(&self) -> &[RtpEncodingParameters] {
        self.video
            .first()
            .map(|v| v.rtp_encoding_parameters.as_slice())
            .unwrap_or(&[])
    }
}
