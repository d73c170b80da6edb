//! Recording gateway double for scenario tests.
//!
//! Every outbound operation is appended to an action log the test can
//! assert on; messages are seeded up front so `fetch_message` resolves
//! without a platform.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, TsujiError};

use super::{ChatGateway, FetchedMessage};

/// One recorded outbound operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayAction {
    ChannelMessage { channel_id: String, text: String },
    PrivateMessage { member_id: String, text: String },
    EphemeralReply { interaction_id: String, text: String },
    AffordanceCreated { channel_id: String, message_id: String },
    AffordanceRemoved { message_id: String },
}

#[derive(Default)]
pub struct MockGateway {
    actions: Mutex<Vec<GatewayAction>>,
    messages: Mutex<HashMap<String, FetchedMessage>>,
    blocked_members: Mutex<HashSet<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a message resolvable through `fetch_message`.
    pub fn seed_message(&self, message_id: &str, author: &str, text: &str) {
        self.messages.lock().expect("mock lock poisoned").insert(
            message_id.to_string(),
            FetchedMessage {
                author: author.to_string(),
                text: text.to_string(),
            },
        );
    }

    /// Make private delivery to `member_id` fail (member blocks DMs).
    pub fn block_private_delivery(&self, member_id: &str) {
        self.blocked_members
            .lock()
            .expect("mock lock poisoned")
            .insert(member_id.to_string());
    }

    pub fn actions(&self) -> Vec<GatewayAction> {
        self.actions.lock().expect("mock lock poisoned").clone()
    }

    pub fn private_messages_to(&self, member_id: &str) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                GatewayAction::PrivateMessage { member_id: m, text } if m == member_id => {
                    Some(text)
                }
                _ => None,
            })
            .collect()
    }

    pub fn ephemeral_replies_to(&self, interaction_id: &str) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                GatewayAction::EphemeralReply {
                    interaction_id: i,
                    text,
                } if i == interaction_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn affordances_created(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                GatewayAction::AffordanceCreated { message_id, .. } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    pub fn affordances_removed(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                GatewayAction::AffordanceRemoved { message_id } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    pub fn channel_messages(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                GatewayAction::ChannelMessage { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: GatewayAction) {
        self.actions.lock().expect("mock lock poisoned").push(action);
    }
}

#[async_trait]
impl ChatGateway for MockGateway {
    async fn send_to_channel(&self, channel_id: &str, text: &str) -> Result<()> {
        self.record(GatewayAction::ChannelMessage {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_privately(&self, member_id: &str, text: &str) -> Result<()> {
        if self
            .blocked_members
            .lock()
            .expect("mock lock poisoned")
            .contains(member_id)
        {
            return Err(TsujiError::Gateway(format!(
                "private delivery to {} blocked",
                member_id
            )));
        }
        self.record(GatewayAction::PrivateMessage {
            member_id: member_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn reply_ephemeral(&self, interaction_id: &str, text: &str) -> Result<()> {
        self.record(GatewayAction::EphemeralReply {
            interaction_id: interaction_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn create_affordance(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.record(GatewayAction::AffordanceCreated {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn remove_affordance(&self, message_id: &str) -> Result<()> {
        self.record(GatewayAction::AffordanceRemoved {
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn fetch_message(
        &self,
        _channel_id: &str,
        message_id: &str,
    ) -> Result<Option<FetchedMessage>> {
        Ok(self
            .messages
            .lock()
            .expect("mock lock poisoned")
            .get(message_id)
            .cloned())
    }
}
