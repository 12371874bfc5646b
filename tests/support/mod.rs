//! Test doubles: recording signaling and media transports

#![allow(dead_code)]

use async_trait::async_trait;
use conference_channel::{
    ChannelConfiguration, ChannelError, ChannelObserver, ChannelStream, ConferenceChannel,
    InitAck, LocalStream, MediaStreamHandle, MediaTrack, MediaTransport, Result,
    RtpEncodingParameters, SessionDescription, SignalingTransport, TrackKind, TransceiverDirection,
    TransceiverInit, TransceiverSource,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

pub const SESSION_ID: &str = "session-1";

pub const OFFER_SDP: &str = "v=0\r\n\
    o=- 0 0 IN IP4 127.0.0.1\r\n\
    s=-\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 111 0\r\n\
    a=rtpmap:111 opus/48000/2\r\n\
    a=rtpmap:0 PCMU/8000\r\n\
    m=video 9 UDP/TLS/RTP/SAVPF 96 102\r\n\
    a=rtpmap:96 VP8/90000\r\n\
    a=rtpmap:102 H264/90000\r\n";

/// Everything the channel handed to the signaling transport, in order
#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    Initialization {
        options: Value,
        media_id: String,
        source_id: String,
    },
    Sdp(Value),
    StreamEvent {
        name: String,
        session_id: String,
    },
    StreamControl {
        session_id: String,
        action: String,
        operation: String,
    },
    SubscriptionControl {
        session_id: String,
        action: String,
        operation: String,
    },
}

#[derive(Default)]
pub struct MockSignaling {
    sent: Mutex<Vec<SentMessage>>,
    pub fail_initialization: Mutex<bool>,
}

impl MockSignaling {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Candidate strings from every candidate envelope, in send order
    pub fn sent_candidates(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                SentMessage::Sdp(v) if v["signaling"]["type"] == "candidate" => Some(
                    v["signaling"]["candidate"]["candidate"]
                        .as_str()
                        .unwrap()
                        .to_string(),
                ),
                _ => None,
            })
            .collect()
    }

    /// SDP descriptions (offers/answers) sent, in order
    pub fn sent_descriptions(&self) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                SentMessage::Sdp(v)
                    if v["signaling"]["type"] == "offer"
                        || v["signaling"]["type"] == "answer" =>
                {
                    Some(v)
                }
                _ => None,
            })
            .collect()
    }

    pub fn stream_events(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                SentMessage::StreamEvent { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SignalingTransport for MockSignaling {
    async fn send_initialization(
        &self,
        options: Value,
        media_id: &str,
        source_id: &str,
    ) -> Result<InitAck> {
        self.sent.lock().push(SentMessage::Initialization {
            options,
            media_id: media_id.to_string(),
            source_id: source_id.to_string(),
        });
        if *self.fail_initialization.lock() {
            return Err(ChannelError::Signaling("initialization rejected".into()));
        }
        Ok(InitAck {
            session_id: SESSION_ID.to_string(),
            transport_id: "transport-1".to_string(),
        })
    }

    async fn send_sdp(&self, message: Value) -> Result<()> {
        self.sent.lock().push(SentMessage::Sdp(message));
        Ok(())
    }

    async fn send_stream_event(&self, name: &str, session_id: &str) -> Result<()> {
        self.sent.lock().push(SentMessage::StreamEvent {
            name: name.to_string(),
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    async fn send_stream_control(
        &self,
        session_id: &str,
        action: &str,
        operation: &str,
    ) -> Result<()> {
        self.sent.lock().push(SentMessage::StreamControl {
            session_id: session_id.to_string(),
            action: action.to_string(),
            operation: operation.to_string(),
        });
        Ok(())
    }

    async fn send_subscription_control(
        &self,
        session_id: &str,
        action: &str,
        operation: &str,
    ) -> Result<()> {
        self.sent.lock().push(SentMessage::SubscriptionControl {
            session_id: session_id.to_string(),
            action: action.to_string(),
            operation: operation.to_string(),
        });
        Ok(())
    }
}

/// Everything the channel asked the media transport to do, in order
#[derive(Debug, Clone)]
pub enum TransportOp {
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddTransceiver {
        kind: TrackKind,
        direction: TransceiverDirection,
        send_encodings: Vec<RtpEncodingParameters>,
    },
    Close,
    GetStats,
}

#[derive(Default)]
pub struct MockTransport {
    ops: Mutex<Vec<TransportOp>>,
    pub fail_set_local: Mutex<bool>,
    pub fail_set_remote: Mutex<bool>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ops(&self) -> Vec<TransportOp> {
        self.ops.lock().clone()
    }

    pub fn transceivers(&self) -> Vec<(TrackKind, TransceiverDirection)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                TransportOp::AddTransceiver {
                    kind, direction, ..
                } => Some((kind, direction)),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, TransportOp::Close))
            .count()
    }

    pub fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                TransportOp::SetRemote(d) => Some(d),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MediaTransport for MockTransport {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.ops.lock().push(TransportOp::CreateOffer);
        Ok(SessionDescription::offer(OFFER_SDP))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.ops.lock().push(TransportOp::CreateAnswer);
        Ok(SessionDescription::answer(OFFER_SDP))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.ops.lock().push(TransportOp::SetLocal(description));
        if *self.fail_set_local.lock() {
            return Err(ChannelError::Transport("set local rejected".into()));
        }
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.ops.lock().push(TransportOp::SetRemote(description));
        if *self.fail_set_remote.lock() {
            return Err(ChannelError::Transport("set remote rejected".into()));
        }
        Ok(())
    }

    async fn add_transceiver(
        &self,
        source: TransceiverSource,
        init: TransceiverInit,
    ) -> Result<()> {
        let kind = match source {
            TransceiverSource::Track { kind, .. } => kind,
            TransceiverSource::Kind(kind) => kind,
        };
        self.ops.lock().push(TransportOp::AddTransceiver {
            kind,
            direction: init.direction,
            send_encodings: init.send_encodings,
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.ops.lock().push(TransportOp::Close);
        Ok(())
    }

    async fn get_stats(&self) -> Result<Value> {
        self.ops.lock().push(TransportOp::GetStats);
        Ok(json!({ "transport": "mock" }))
    }
}

/// Observer recording every error broadcast
#[derive(Default)]
pub struct RecordingObserver {
    errors: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl ChannelObserver for RecordingObserver {
    fn on_stream_error(&self, _stream: Option<ChannelStream>, error: &ChannelError) {
        self.errors.lock().push(error.to_string());
    }
}

pub fn audio_video_stream() -> Arc<LocalStream> {
    Arc::new(LocalStream::new(MediaStreamHandle::new(
        "local-stream",
        vec![
            MediaTrack::live("audio-track", TrackKind::Audio),
            MediaTrack::live("video-track", TrackKind::Video),
        ],
    )))
}

pub fn channel_with(
    signaling: &Arc<MockSignaling>,
    transport: &Arc<MockTransport>,
) -> Arc<ConferenceChannel> {
    channel_with_config(ChannelConfiguration::default(), signaling, transport)
}

pub fn channel_with_config(
    config: ChannelConfiguration,
    signaling: &Arc<MockSignaling>,
    transport: &Arc<MockTransport>,
) -> Arc<ConferenceChannel> {
    init_tracing();
    ConferenceChannel::new(
        config,
        Arc::clone(signaling) as Arc<dyn SignalingTransport>,
        Arc::clone(transport) as Arc<dyn MediaTransport>,
    )
}

/// Install a subscriber once so assertion failures come with channel logs
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Flush repeatedly so tasks posted by earlier tasks also run
pub async fn settle(channel: &ConferenceChannel) {
    for _ in 0..4 {
        channel.flush_events().await;
    }
}
