// Chat platform boundary
//
// The engine never talks to a chat platform directly. Inbound events arrive
// on a channel of `GatewayEvent`s; outbound actions go through the
// `ChatGateway` trait:
// - Stdio: JSON-lines adapter, one event or action per line, for piping a
//   platform connector into the engine
// - Mock: recording double for scenario tests

pub mod mock;
pub mod stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use mock::{GatewayAction, MockGateway};
pub use stdio::StdioGateway;

use crate::error::Result;

/// Inbound platform events the dispatch engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    MessageCreated {
        channel_id: String,
        message_id: String,
        author_id: String,
        #[serde(default)]
        author_name: String,
        #[serde(default)]
        author_is_automated: bool,
        text: String,
    },
    AffordanceInvoked {
        channel_id: String,
        message_id: String,
        invoker_id: String,
        interaction_id: String,
    },
    ReactionAdded {
        channel_id: String,
        message_id: String,
        member_id: String,
        emoji: String,
    },
}

/// A source message resolved for translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub author: String,
    pub text: String,
}

/// Outbound operations the engine performs against the platform.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_to_channel(&self, channel_id: &str, text: &str) -> Result<()>;

    /// Direct-message equivalent; the only delivery path for translations.
    async fn send_privately(&self, member_id: &str, text: &str) -> Result<()>;

    /// Private reply tied to an interaction (visible to the invoker only).
    async fn reply_ephemeral(&self, interaction_id: &str, text: &str) -> Result<()>;

    /// Attach the shared translate affordance to a source message.
    async fn create_affordance(&self, channel_id: &str, message_id: &str) -> Result<()>;

    async fn remove_affordance(&self, message_id: &str) -> Result<()>;

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<FetchedMessage>>;
}
