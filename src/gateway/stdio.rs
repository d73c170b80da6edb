//! JSON-lines gateway adapter.
//!
//! A platform connector pipes inbound events to stdin, one JSON object per
//! line, and reads outbound actions from stdout in the same shape. Each
//! outbound action carries a generated `action_id` so the connector can
//! correlate acknowledgements in its own logs.
//!
//! A line protocol has no request/response pairing, so `fetch_message`
//! serves from a retained window of recently observed messages instead of
//! asking the connector.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::TtlMap;
use crate::error::Result;

use super::{ChatGateway, FetchedMessage, GatewayEvent};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum OutboundOp<'a> {
    SendToChannel { channel_id: &'a str, text: &'a str },
    SendPrivately { member_id: &'a str, text: &'a str },
    ReplyEphemeral { interaction_id: &'a str, text: &'a str },
    CreateAffordance { channel_id: &'a str, message_id: &'a str },
    RemoveAffordance { message_id: &'a str },
}

#[derive(Debug, Serialize)]
struct OutboundAction<'a> {
    action_id: Uuid,
    #[serde(flatten)]
    op: OutboundOp<'a>,
}

pub struct StdioGateway {
    out: Mutex<Stdout>,
    seen: TtlMap<String, FetchedMessage>,
    retention: Duration,
}

impl StdioGateway {
    /// `retention` bounds how long observed messages stay fetchable; it
    /// should comfortably exceed the trigger TTL.
    pub fn new(retention: Duration) -> Arc<Self> {
        Arc::new(Self {
            out: Mutex::new(tokio::io::stdout()),
            seen: TtlMap::new(),
            retention,
        })
    }

    /// Spawn the stdin reader task. Returns the event stream the engine
    /// consumes; the stream ends when stdin closes.
    pub fn spawn_reader(self: &Arc<Self>, buffer: usize) -> mpsc::Receiver<GatewayEvent> {
        let (tx, rx) = mpsc::channel(buffer);
        let gateway = Arc::clone(self);

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<GatewayEvent>(line) {
                            Ok(event) => {
                                gateway.observe(&event);
                                if tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Ignoring unparsable gateway line: {}", e),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Gateway input error: {}", e);
                        break;
                    }
                }
            }
            info!("Gateway input closed");
        });

        rx
    }

    fn observe(&self, event: &GatewayEvent) {
        if let GatewayEvent::MessageCreated {
            message_id,
            author_id,
            author_name,
            text,
            ..
        } = event
        {
            self.seen.sweep(self.retention);
            let author = if author_name.is_empty() {
                author_id.clone()
            } else {
                author_name.clone()
            };
            self.seen.put(
                message_id.clone(),
                FetchedMessage {
                    author,
                    text: text.clone(),
                },
            );
        }
    }

    fn encode(op: OutboundOp<'_>) -> Result<String> {
        let action = OutboundAction {
            action_id: Uuid::new_v4(),
            op,
        };
        Ok(serde_json::to_string(&action)?)
    }

    async fn emit(&self, op: OutboundOp<'_>) -> Result<()> {
        let line = Self::encode(op)?;
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ChatGateway for StdioGateway {
    async fn send_to_channel(&self, channel_id: &str, text: &str) -> Result<()> {
        self.emit(OutboundOp::SendToChannel { channel_id, text }).await
    }

    async fn send_privately(&self, member_id: &str, text: &str) -> Result<()> {
        self.emit(OutboundOp::SendPrivately { member_id, text }).await
    }

    async fn reply_ephemeral(&self, interaction_id: &str, text: &str) -> Result<()> {
        self.emit(OutboundOp::ReplyEphemeral {
            interaction_id,
            text,
        })
        .await
    }

    async fn create_affordance(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.emit(OutboundOp::CreateAffordance {
            channel_id,
            message_id,
        })
        .await
    }

    async fn remove_affordance(&self, message_id: &str) -> Result<()> {
        self.emit(OutboundOp::RemoveAffordance { message_id }).await
    }

    async fn fetch_message(
        &self,
        _channel_id: &str,
        message_id: &str,
    ) -> Result<Option<FetchedMessage>> {
        self.seen.sweep(self.retention);
        Ok(self.seen.get(&message_id.to_string()))
    }
}
