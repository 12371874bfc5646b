//! SDP codec-preference post-processing
//!
//! Before a locally created description is committed, its m-line payload
//! ordering is rewritten so the configured codecs come first, in preference
//! order. Codecs absent from the preference list keep their relative order
//! after the preferred ones; nothing is removed.

use crate::config::{AudioCodec, VideoCodec};
use std::collections::HashMap;

/// Reorder the audio m-line payload list to prefer `codecs`
pub fn prefer_audio_codecs(sdp: &str, codecs: &[AudioCodec]) -> String {
    let names: Vec<&str> = codecs.iter().map(|c| c.sdp_name()).collect();
    prefer_codecs(sdp, "audio", &names)
}

/// Reorder the video m-line payload list to prefer `codecs`
pub fn prefer_video_codecs(sdp: &str, codecs: &[VideoCodec]) -> String {
    let names: Vec<&str> = codecs.iter().map(|c| c.sdp_name()).collect();
    prefer_codecs(sdp, "video", &names)
}

fn prefer_codecs(sdp: &str, media: &str, names: &[&str]) -> String {
    if names.is_empty() {
        return sdp.to_string();
    }
    let payload_names = rtpmap_names(sdp);
    let newline = if sdp.contains("\r\n") { "\r\n" } else { "\n" };
    let prefix = format!("m={} ", media);
    let lines: Vec<String> = sdp
        .split(newline)
        .map(|line| {
            if line.starts_with(&prefix) {
                reorder_m_line(line, names, &payload_names)
            } else {
                line.to_string()
            }
        })
        .collect();
    lines.join(newline)
}

/// Map of payload type -> codec name, from every `a=rtpmap` line
fn rtpmap_names(sdp: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in sdp.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("a=rtpmap:") {
            // "a=rtpmap:<pt> <name>/<clock>[/<channels>]"
            let mut parts = rest.splitn(2, ' ');
            if let (Some(pt), Some(spec)) = (parts.next(), parts.next()) {
                let name = spec.split('/').next().unwrap_or("");
                map.insert(pt.to_string(), name.to_string());
            }
        }
    }
    map
}

fn reorder_m_line(line: &str, names: &[&str], payload_names: &HashMap<String, String>) -> String {
    // "m=<media> <port> <proto> <fmt> <fmt> ..."
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() <= 3 {
        return line.to_string();
    }
    let (head, fmts) = fields.split_at(3);
    let mut preferred: Vec<&str> = Vec::new();
    for name in names {
        for fmt in fmts {
            let matches = payload_names
                .get(*fmt)
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false);
            if matches && !preferred.contains(fmt) {
                preferred.push(fmt);
            }
        }
    }
    let rest: Vec<&str> = fmts.iter().filter(|f| !preferred.contains(f)).copied().collect();
    let mut out: Vec<&str> = head.to_vec();
    out.extend(preferred);
    out.extend(rest);
    out.join(" ")
}
