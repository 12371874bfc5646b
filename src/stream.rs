//! Stream model: local streams for publishing, remote streams for subscribing
//!
//! These are the channel-facing views of media streams. Track payloads,
//! attribute semantics, and renderer plumbing live with the embedder; the
//! channel only needs identity, track inventory, source tagging, and the
//! published settings/capabilities a subscribe request is validated against.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Audio capture source for a local stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioSourceInfo {
    /// Microphone capture
    #[default]
    Mic,
    /// Screen-cast system audio
    ScreenCast,
    /// Other or unknown source
    Unknown,
}

/// Video capture source for a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoSourceInfo {
    /// Camera capture
    #[default]
    Camera,
    /// Screen capture
    ScreenCast,
    /// Other or unknown source
    Unknown,
}

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

/// Liveness of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Producing media
    Live,
    /// Stopped; will not produce again
    Ended,
}

/// One media track inside a stream handle
#[derive(Debug, Clone)]
pub struct MediaTrack {
    /// Track identifier
    pub id: String,
    /// Audio or video
    pub kind: TrackKind,
    /// Live or ended
    pub state: TrackState,
}

impl MediaTrack {
    /// A live track of the given kind
    pub fn live(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            state: TrackState::Live,
        }
    }
}

/// Opaque handle to an underlying media stream and its tracks
#[derive(Debug, Clone)]
pub struct MediaStreamHandle {
    /// Stream identifier
    pub id: String,
    /// Tracks carried by the stream
    pub tracks: Vec<MediaTrack>,
}

impl MediaStreamHandle {
    /// Create a handle with the given id and tracks
    pub fn new(id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    /// Tracks of the given kind
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    /// Number of audio tracks
    pub fn audio_track_count(&self) -> usize {
        self.tracks_of(TrackKind::Audio).count()
    }

    /// Number of video tracks
    pub fn video_track_count(&self) -> usize {
        self.tracks_of(TrackKind::Video).count()
    }

    /// True when no track of either kind is live
    pub fn is_ended(&self) -> bool {
        !self.tracks.iter().any(|t| t.state == TrackState::Live)
    }
}

/// A stream captured locally, offered for publishing
#[derive(Debug)]
pub struct LocalStream {
    media: Option<MediaStreamHandle>,
    attributes: HashMap<String, String>,
    audio_source: AudioSourceInfo,
    video_source: VideoSourceInfo,
}

impl LocalStream {
    /// Create a local stream over a media handle
    pub fn new(media: MediaStreamHandle) -> Self {
        Self {
            media: Some(media),
            attributes: HashMap::new(),
            audio_source: AudioSourceInfo::default(),
            video_source: VideoSourceInfo::default(),
        }
    }

    /// A stream whose media handle was never attached; publish rejects it
    pub fn detached() -> Self {
        Self {
            media: None,
            attributes: HashMap::new(),
            audio_source: AudioSourceInfo::default(),
            video_source: VideoSourceInfo::default(),
        }
    }

    /// Set user attributes carried in the publish options
    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Tag the capture sources
    pub fn with_sources(mut self, audio: AudioSourceInfo, video: VideoSourceInfo) -> Self {
        self.audio_source = audio;
        self.video_source = video;
        self
    }

    /// Underlying media handle, if attached
    pub fn media_stream(&self) -> Option<&MediaStreamHandle> {
        self.media.as_ref()
    }

    /// User attributes
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Audio capture source
    pub fn audio_source(&self) -> AudioSourceInfo {
        self.audio_source
    }

    /// Video capture source
    pub fn video_source(&self) -> VideoSourceInfo {
        self.video_source
    }
}

/// Video resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// A width x height resolution
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when neither dimension is specified
    pub fn is_unspecified(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// One published video layer, as announced by the server
#[derive(Debug, Clone, Default)]
pub struct VideoPublicationSettings {
    /// Simulcast rid of this layer; empty for single-layer publications
    pub rid: String,
    /// Track id carrying this layer
    pub track_id: String,
    /// Encoded resolution
    pub resolution: Resolution,
    /// Encoded frame rate
    pub frame_rate: u32,
    /// Keyframe interval in seconds
    pub keyframe_interval: u64,
}

/// Publication settings of a remote stream
#[derive(Debug, Clone, Default)]
pub struct PublicationSettings {
    /// Per-layer video settings
    pub video: Vec<VideoPublicationSettings>,
}

/// Video capability ranges a subscription may pick from
#[derive(Debug, Clone, Default)]
pub struct VideoSubscriptionCapabilities {
    /// Resolutions the server can deliver
    pub resolutions: Vec<Resolution>,
    /// Frame rates the server can deliver
    pub frame_rates: Vec<u32>,
    /// Keyframe intervals the server can deliver
    pub keyframe_intervals: Vec<u64>,
    /// Bitrate multipliers the server can deliver
    pub bitrate_multipliers: Vec<f64>,
}

/// Capability ranges of a remote stream
#[derive(Debug, Clone, Default)]
pub struct SubscriptionCapabilities {
    /// Video capabilities
    pub video: VideoSubscriptionCapabilities,
}

/// Audio constraints of a subscribe request
#[derive(Debug, Clone, Default)]
pub struct AudioSubscribeConstraints {
    /// Skip audio entirely
    pub disabled: bool,
}

/// Video constraints of a subscribe request.
///
/// Zero values mean "unspecified"; an unspecified option is trivially
/// satisfied.
#[derive(Debug, Clone, Default)]
pub struct VideoSubscribeConstraints {
    /// Skip video entirely
    pub disabled: bool,
    /// Requested resolution
    pub resolution: Resolution,
    /// Requested frame rate
    pub frame_rate: u32,
    /// Requested keyframe interval in seconds
    pub keyframe_interval: u64,
    /// Requested bitrate multiplier
    pub bitrate_multiplier: f64,
    /// Requested simulcast rid; when non-empty it is the sole criterion
    pub rid: String,
}

/// Options of a subscribe request
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Audio constraints
    pub audio: AudioSubscribeConstraints,
    /// Video constraints
    pub video: VideoSubscribeConstraints,
}

/// A stream published by a remote participant, offered for subscribing
#[derive(Debug)]
pub struct RemoteStream {
    id: String,
    has_audio: bool,
    has_video: bool,
    video_source: VideoSourceInfo,
    settings: PublicationSettings,
    capabilities: SubscriptionCapabilities,
    attached: Mutex<Option<MediaStreamHandle>>,
}

impl RemoteStream {
    /// Create a remote stream description
    pub fn new(
        id: impl Into<String>,
        has_audio: bool,
        has_video: bool,
        settings: PublicationSettings,
        capabilities: SubscriptionCapabilities,
    ) -> Self {
        Self {
            id: id.into(),
            has_audio,
            has_video,
            video_source: VideoSourceInfo::default(),
            settings,
            capabilities,
            attached: Mutex::new(None),
        }
    }

    /// Tag the remote video source
    pub fn with_video_source(mut self, source: VideoSourceInfo) -> Self {
        self.video_source = source;
        self
    }

    /// Stream id as announced by the server
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the publication carries audio
    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    /// Whether the publication carries video
    pub fn has_video(&self) -> bool {
        self.has_video
    }

    /// Remote video source tag
    pub fn video_source(&self) -> VideoSourceInfo {
        self.video_source
    }

    /// Publication settings announced by the server
    pub fn settings(&self) -> &PublicationSettings {
        &self.settings
    }

    /// Capability ranges announced by the server
    pub fn capabilities(&self) -> &SubscriptionCapabilities {
        &self.capabilities
    }

    /// Attach the negotiated media stream once the transport delivers it
    pub fn attach_media_stream(&self, handle: MediaStreamHandle) {
        *self.attached.lock() = Some(handle);
    }

    /// The attached media stream, once negotiation delivered one
    pub fn media_stream(&self) -> Option<MediaStreamHandle> {
        self.attached.lock().clone()
    }
}

/// Decide whether a subscribe request is satisfiable by a remote stream.
///
/// A requested rid is the sole criterion: any per-rid publication setting
/// with that rid admits the whole option set. Otherwise each video option is
/// independently satisfied when unspecified, or when matched against either
/// the publication settings or the declared capability ranges.
pub fn sub_option_allowed(
    options: &SubscribeOptions,
    settings: &PublicationSettings,
    capabilities: &SubscriptionCapabilities,
) -> bool {
    // Audio constraints are not checked: the wire protocol admits sample
    // rate and channel count but the option surface only carries codec.
    let video = &options.video;
    if !video.rid.is_empty() {
        return settings.video.iter().any(|s| s.rid == video.rid);
    }

    let mut resolution_supported = video.resolution.is_unspecified();
    let mut frame_rate_supported = video.frame_rate == 0;
    let mut keyframe_interval_supported = video.keyframe_interval == 0;
    let mut bitrate_multiplier_supported = video.bitrate_multiplier == 0.0;

    for setting in &settings.video {
        if !video.resolution.is_unspecified() && setting.resolution == video.resolution {
            resolution_supported = true;
        }
        if video.frame_rate != 0 && setting.frame_rate == video.frame_rate {
            frame_rate_supported = true;
        }
        if video.keyframe_interval != 0 && setting.keyframe_interval == video.keyframe_interval {
            keyframe_interval_supported = true;
        }
    }

    if !video.resolution.is_unspecified()
        && capabilities.video.resolutions.contains(&video.resolution)
    {
        resolution_supported = true;
    }
    if video.frame_rate != 0 && capabilities.video.frame_rates.contains(&video.frame_rate) {
        frame_rate_supported = true;
    }
    if video.keyframe_interval != 0
        && capabilities
            .video
            .keyframe_intervals
            .contains(&video.keyframe_interval)
    {
        keyframe_interval_supported = true;
    }
    if video.bitrate_multiplier != 0.0
        && capabilities
            .video
            .bitrate_multipliers
            .iter()
            .any(|m| *m == video.bitrate_multiplier)
    {
        bitrate_multiplier_supported = true;
    }

    resolution_supported
        && frame_rate_supported
        && keyframe_interval_supported
        && bitrate_multiplier_supported
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_rids(rids: &[&str]) -> PublicationSettings {
        PublicationSettings {
            video: rids
                .iter()
                .map(|r| VideoPublicationSettings {
                    rid: r.to_string(),
                    track_id: format!("track-{}", r),
                    resolution: Resolution::new(1280, 720),
                    frame_rate: 30,
                    keyframe_interval: 100,
                })
                .collect(),
        }
    }

    #[test]
    fn unspecified_options_are_always_allowed() {
        let options = SubscribeOptions::default();
        assert!(sub_option_allowed(
            &options,
            &PublicationSettings::default(),
            &SubscriptionCapabilities::default()
        ));
    }

    #[test]
    fn rid_match_is_sole_criterion() {
        let mut options = SubscribeOptions::default();
        options.video.rid = "1".to_string();
        // Even an otherwise-unsatisfiable resolution rides along with the rid.
        options.video.resolution = Resolution::new(9999, 9999);
        assert!(sub_option_allowed(
            &options,
            &settings_with_rids(&["0", "1"]),
            &SubscriptionCapabilities::default()
        ));
    }

    #[test]
    fn missing_rid_is_rejected() {
        let mut options = SubscribeOptions::default();
        options.video.rid = "1".to_string();
        assert!(!sub_option_allowed(
            &options,
            &settings_with_rids(&["0"]),
            &SubscriptionCapabilities::default()
        ));
    }

    #[test]
    fn resolution_matches_against_settings_or_capabilities() {
        let mut options = SubscribeOptions::default();
        options.video.resolution = Resolution::new(640, 480);
        let settings = settings_with_rids(&[""]);
        assert!(!sub_option_allowed(
            &options,
            &settings,
            &SubscriptionCapabilities::default()
        ));
        let caps = SubscriptionCapabilities {
            video: VideoSubscriptionCapabilities {
                resolutions: vec![Resolution::new(640, 480)],
                ..Default::default()
            },
        };
        assert!(sub_option_allowed(&options, &settings, &caps));
    }

    #[test]
    fn every_specified_option_must_match() {
        let mut options = SubscribeOptions::default();
        options.video.resolution = Resolution::new(1280, 720);
        options.video.frame_rate = 60; // published at 30
        assert!(!sub_option_allowed(
            &options,
            &settings_with_rids(&[""]),
            &SubscriptionCapabilities::default()
        ));
    }

    #[test]
    fn ended_stream_detection() {
        let live = MediaStreamHandle::new(
            "s",
            vec![MediaTrack::live("a", TrackKind::Audio)],
        );
        assert!(!live.is_ended());
        let ended = MediaStreamHandle::new(
            "s",
            vec![MediaTrack {
                id: "a".to_string(),
                kind: TrackKind::Audio,
                state: TrackState::Ended,
            }],
        );
        assert!(ended.is_ended());
    }
}
