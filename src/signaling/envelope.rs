//! Signaling envelope codec
//!
//! Pure, synchronous builders and parsers for the structured payloads the
//! channel exchanges with the signaling server. No state, no I/O.

use crate::stream::{
    AudioSourceInfo, LocalStream, MediaStreamHandle, RemoteStream, SubscribeOptions,
    VideoSourceInfo,
};
use crate::transport::IceCandidate;
use serde_json::{json, Map, Value};

/// Bare acknowledgment from the signaling server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The outstanding operation succeeded server-side
    Success,
    /// The outstanding operation failed server-side
    Failure,
}

/// Builders and parsers for signaling payloads
pub struct SignalingEnvelope;

impl SignalingEnvelope {
    /// Description message: `{ id, signaling: { type, sdp } }`
    pub fn description(session_id: &str, sdp_type: &str, sdp: &str) -> Value {
        json!({
            "id": session_id,
            "signaling": {
                "type": sdp_type,
                "sdp": sdp,
            }
        })
    }

    /// Candidate message: `{ id, signaling: { type: "candidate", candidate } }`
    ///
    /// The candidate string carries the `a=` prefix on the wire.
    pub fn candidate(session_id: &str, candidate: &IceCandidate) -> Value {
        json!({
            "id": session_id,
            "signaling": {
                "type": "candidate",
                "candidate": {
                    "sdpMLineIndex": candidate.sdp_mline_index,
                    "sdpMid": candidate.sdp_mid,
                    "candidate": format!("a={}", candidate.candidate),
                }
            }
        })
    }

    /// Removed-candidates message listing previously sent candidates
    pub fn removed_candidates(session_id: &str, candidates: &[String]) -> Value {
        let listed: Vec<Value> = candidates
            .iter()
            .map(|c| json!({ "candidate": format!("a={}", c) }))
            .collect();
        json!({
            "id": session_id,
            "signaling": {
                "type": "removed-candidates",
                "candidates": listed,
            }
        })
    }

    /// Publish options payload for the initialization message.
    ///
    /// Mids are fixed: audio takes "0"; video takes "0" when the stream has
    /// no audio, otherwise "1".
    pub fn publish_options(stream: &LocalStream, media: &MediaStreamHandle) -> Value {
        let mut attributes = Map::new();
        for (k, v) in stream.attributes() {
            attributes.insert(k.clone(), Value::String(v.clone()));
        }
        let audio_count = media.audio_track_count();
        let mut tracks: Vec<Value> = Vec::new();
        if audio_count != 0 {
            let source = match stream.audio_source() {
                AudioSourceInfo::ScreenCast => "screen-cast",
                _ => "mic",
            };
            tracks.push(json!({
                "type": "audio",
                "mid": "0",
                "source": source,
            }));
        }
        if media.video_track_count() != 0 {
            let mid = if audio_count == 0 { "0" } else { "1" };
            let source = match stream.video_source() {
                VideoSourceInfo::ScreenCast => "screen-cast",
                _ => "camera",
            };
            tracks.push(json!({
                "type": "video",
                "mid": mid,
                "source": source,
            }));
        }
        json!({
            "attributes": attributes,
            "media": { "tracks": tracks },
            "transport": { "type": "webrtc" },
        })
    }

    /// Subscribe options payload for the initialization message.
    ///
    /// Tracks name their `from` source: the stream id, or the rid-selected
    /// track id when a simulcast layer was requested. Video parameters carry
    /// only the explicitly requested overrides; the bitrate multiplier is
    /// rendered as `"x"` plus the first three characters of its six-decimal
    /// form and omitted when it comes out as `"x1.0"`.
    pub fn subscribe_options(
        stream: &RemoteStream,
        options: &SubscribeOptions,
        audio_enabled: bool,
        video_enabled: bool,
    ) -> Value {
        let mut tracks: Vec<Value> = Vec::new();
        if audio_enabled {
            tracks.push(json!({
                "type": "audio",
                "mid": "0",
                "from": stream.id(),
            }));
        }
        if video_enabled {
            let mid = if audio_enabled { "1" } else { "0" };
            let video = &options.video;
            let from = if !video.rid.is_empty() {
                stream
                    .settings()
                    .video
                    .iter()
                    .find(|s| s.rid == video.rid)
                    .map(|s| s.track_id.clone())
                    .unwrap_or_else(|| stream.id().to_string())
            } else {
                stream.id().to_string()
            };
            let mut parameters = Map::new();
            if !video.resolution.is_unspecified() {
                parameters.insert(
                    "resolution".to_string(),
                    json!({
                        "width": video.resolution.width,
                        "height": video.resolution.height,
                    }),
                );
            }
            let quality_level = if video.bitrate_multiplier != 0.0 {
                bitrate_quality_level(video.bitrate_multiplier)
            } else {
                "x1.0".to_string()
            };
            if quality_level != "x1.0" {
                parameters.insert("bitrate".to_string(), Value::String(quality_level));
            }
            if video.keyframe_interval != 0 {
                parameters.insert(
                    "keyFrameInterval".to_string(),
                    json!(video.keyframe_interval),
                );
            }
            if video.frame_rate != 0 {
                parameters.insert("framerate".to_string(), json!(video.frame_rate));
            }
            let mut track = Map::new();
            track.insert("type".to_string(), json!("video"));
            track.insert("mid".to_string(), json!(mid));
            track.insert("from".to_string(), json!(from));
            track.insert("parameters".to_string(), Value::Object(parameters));
            if !video.rid.is_empty() {
                track.insert("simulcastRid".to_string(), json!(video.rid));
            }
            tracks.push(Value::Object(track));
        }
        json!({
            "media": { "tracks": tracks },
            "transport": { "type": "webrtc" },
        })
    }

    /// Parse a bare string acknowledgment
    pub fn parse_ack(message: &Value) -> Option<Ack> {
        match message.as_str() {
            Some("success") => Some(Ack::Success),
            Some("failure") => Some(Ack::Failure),
            _ => None,
        }
    }

    /// Parse an inbound answer.
    ///
    /// Only objects carrying string `type` and `sdp` fields with
    /// `type == "answer"` are accepted; everything else is ignored.
    pub fn parse_remote_answer(message: &Value) -> Option<(String, String)> {
        let map = message.as_object()?;
        let sdp_type = map.get("type")?.as_str()?;
        let sdp = map.get("sdp")?.as_str()?;
        if sdp_type != "answer" {
            return None;
        }
        Some((sdp_type.to_string(), sdp.to_string()))
    }
}

/// `"x"` + first three characters of the six-decimal rendering
fn bitrate_quality_level(multiplier: f64) -> String {
    let rendered = format!("{:.6}", multiplier);
    let truncated: String = rendered.chars().take(3).collect();
    format!("x{}", truncated)
}
