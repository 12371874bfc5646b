//! Signaling transport capability
//!
//! Message delivery, reconnection, and wire encoding live behind this trait.
//! The channel treats every send as fire-and-forget with an async completion.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Acknowledgment of an initialization message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitAck {
    /// Session id assigned by the remote signaling peer
    pub session_id: String,
    /// Transport id assigned by the remote signaling peer; unused here
    pub transport_id: String,
}

/// Abstract signaling transport consumed by the channel
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Send a publish/subscribe initialization message.
    ///
    /// `media_id` carries the local media stream id for publishes;
    /// `source_id` carries the remote stream id for subscribes. Either may
    /// be empty.
    async fn send_initialization(
        &self,
        options: Value,
        media_id: &str,
        source_id: &str,
    ) -> Result<InitAck>;

    /// Send an SDP-bearing envelope (description, candidate, removal notice)
    async fn send_sdp(&self, message: Value) -> Result<()>;

    /// Send a stream lifecycle event ("unpublish" / "unsubscribe")
    async fn send_stream_event(&self, name: &str, session_id: &str) -> Result<()>;

    /// Send a control message for a published stream
    async fn send_stream_control(
        &self,
        session_id: &str,
        action: &str,
        operation: &str,
    ) -> Result<()>;

    /// Send a control message for a subscription
    async fn send_subscription_control(
        &self,
        session_id: &str,
        action: &str,
        operation: &str,
    ) -> Result<()>;
}
