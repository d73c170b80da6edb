use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::cache::TtlMap;
use crate::config::{DispatchConfig, TriggerConfig};
use crate::error::classify;
use crate::gate::ChannelGate;
use crate::gateway::{ChatGateway, GatewayEvent};
use crate::lang;
use crate::pipeline::Pipeline;
use crate::prefs::{DeliveryMode, MemberPreference, PreferenceSnapshot, PreferenceStore};

const MSG_SET_LANGUAGE_FIRST: &str =
    "⚠️ Please set your language first using /setlanguage.";
const MSG_MESSAGE_UNAVAILABLE: &str = "❌ Could not find the message to translate.";

/// The live record behind a shared affordance. At most one exists per
/// source message; the registry's insert-if-absent upholds that.
#[derive(Debug, Clone)]
pub struct PendingTrigger {
    pub channel_id: String,
    pub detected_language: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Where a member-facing reply goes: tied to an interaction, or straight to
/// the member when the invocation came from a reaction.
enum ReplyTarget<'a> {
    Ephemeral(&'a str),
    Direct(&'a str),
}

/// The per-message dispatch state machine: gate, detect, bucket by delivery
/// mode, then auto-deliver or present the shared trigger. Also owns the
/// trigger lifecycle (idempotent creation, invocation, expiry).
pub struct Router {
    gate: Arc<ChannelGate>,
    prefs: Arc<PreferenceStore>,
    pipeline: Arc<Pipeline>,
    gateway: Arc<dyn ChatGateway>,
    triggers: TtlMap<String, PendingTrigger>,
    trigger_ttl: Duration,
    trigger_emoji: String,
}

impl Router {
    pub fn new(
        gate: Arc<ChannelGate>,
        prefs: Arc<PreferenceStore>,
        pipeline: Arc<Pipeline>,
        gateway: Arc<dyn ChatGateway>,
        trigger: &TriggerConfig,
        dispatch: &DispatchConfig,
    ) -> Self {
        Self {
            gate,
            prefs,
            pipeline,
            gateway,
            triggers: TtlMap::new(),
            trigger_ttl: Duration::seconds(trigger.ttl_secs as i64),
            trigger_emoji: dispatch.trigger_emoji.clone(),
        }
    }

    /// Entry point for every inbound platform event. Never fails: passive
    /// scan errors are logged, member-action errors are reported privately
    /// to that member.
    pub async fn handle_event(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::MessageCreated {
                channel_id,
                message_id,
                author_id,
                author_name,
                author_is_automated,
                text,
            } => {
                let author = if author_name.is_empty() {
                    author_id
                } else {
                    author_name
                };
                self.on_message(&channel_id, &message_id, &author, author_is_automated, &text)
                    .await;
            }
            GatewayEvent::AffordanceInvoked {
                channel_id,
                message_id,
                invoker_id,
                interaction_id,
            } => {
                self.on_invoke(
                    &channel_id,
                    &message_id,
                    &invoker_id,
                    ReplyTarget::Ephemeral(&interaction_id),
                )
                .await;
            }
            GatewayEvent::ReactionAdded {
                channel_id,
                message_id,
                member_id,
                emoji,
            } => {
                self.on_reaction(&channel_id, &message_id, &member_id, &emoji)
                    .await;
            }
        }
    }

    /// Passive scan of a freshly posted message. Nothing on this path may
    /// surface an error to the channel.
    async fn on_message(
        &self,
        channel_id: &str,
        message_id: &str,
        author: &str,
        author_is_automated: bool,
        text: &str,
    ) {
        if author_is_automated || text.is_empty() {
            return;
        }

        self.gate.reload().await;
        if !self.gate.is_allowed(channel_id) {
            return;
        }

        let detected = match self.pipeline.detect_language(text).await {
            Ok(detected) => detected,
            Err(e) => {
                warn!(
                    "Language detection failed for message {} ({}): {}",
                    message_id,
                    classify(&e),
                    e
                );
                return;
            }
        };

        let snapshot = self.prefs.snapshot().await;
        let (auto_bucket, trigger_bucket) = bucket_members(&snapshot, &detected);
        if auto_bucket.is_empty() && trigger_bucket.is_empty() {
            debug!("No subscriber needs a translation of message {}", message_id);
            return;
        }

        self.present_auto(message_id, author, text, &detected, &auto_bucket)
            .await;
        self.present_trigger(channel_id, message_id, &detected, &trigger_bucket)
            .await;
    }

    /// Immediate mode: translate per member and deliver privately. One
    /// member's failure never aborts the others.
    async fn present_auto(
        &self,
        message_id: &str,
        author: &str,
        text: &str,
        detected: &str,
        members: &[MemberPreference],
    ) {
        for member in members {
            match self
                .pipeline
                .translate(text, Some(detected), &member.language)
                .await
            {
                Ok(translated) => {
                    let body = render_reveal(detected, &member.language, author, text, &translated);
                    if let Err(e) = self.gateway.send_privately(&member.member_id, &body).await {
                        warn!(
                            "Private delivery of message {} to {} failed: {}",
                            message_id, member.member_id, e
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        "Auto translation of message {} for {} failed ({}): {}",
                        message_id,
                        member.member_id,
                        classify(&e),
                        e
                    );
                }
            }
        }
    }

    /// On-demand mode: one shared affordance per source message, however
    /// many members want it and however often the event is redelivered.
    async fn present_trigger(
        &self,
        channel_id: &str,
        message_id: &str,
        detected: &str,
        members: &[MemberPreference],
    ) {
        if members.is_empty() {
            return;
        }

        let now = Utc::now();
        let trigger = PendingTrigger {
            channel_id: channel_id.to_string(),
            detected_language: detected.to_string(),
            created_at: now,
            expires_at: now + self.trigger_ttl,
        };
        if !self.triggers.insert_if_absent(message_id.to_string(), trigger) {
            debug!("Trigger already live for message {}", message_id);
            return;
        }

        if let Err(e) = self.gateway.create_affordance(channel_id, message_id).await {
            warn!("Failed to create affordance for {}: {}", message_id, e);
            // No affordance exists, so drop the registry entry and let a
            // redelivered event retry.
            self.triggers.remove(&message_id.to_string());
        }
    }

    /// A member invoked the shared affordance. Reported outcomes go to the
    /// invoker only.
    async fn on_invoke(
        &self,
        channel_id: &str,
        message_id: &str,
        invoker_id: &str,
        reply: ReplyTarget<'_>,
    ) {
        let fetched = match self.gateway.fetch_message(channel_id, message_id).await {
            Ok(Some(fetched)) if !fetched.text.is_empty() => fetched,
            Ok(_) => {
                self.reply(&reply, MSG_MESSAGE_UNAVAILABLE).await;
                return;
            }
            Err(e) => {
                warn!("Failed to fetch message {}: {}", message_id, e);
                self.reply(&reply, MSG_MESSAGE_UNAVAILABLE).await;
                return;
            }
        };

        let pref = match self.prefs.get(invoker_id).await {
            Some(pref) if !pref.language.is_empty() => pref,
            _ => {
                self.reply(&reply, MSG_SET_LANGUAGE_FIRST).await;
                return;
            }
        };

        // Reuse the detection recorded at trigger time; an invocation that
        // races expiry detects fresh instead of failing.
        let detected = match self.triggers.get(&message_id.to_string()) {
            Some(trigger) => trigger.detected_language,
            None => match self.pipeline.detect_language(&fetched.text).await {
                Ok(detected) => detected,
                Err(e) => {
                    warn!("Detection for invoked message {} failed: {}", message_id, e);
                    self.reply(&reply, classify(&e).user_message()).await;
                    return;
                }
            },
        };

        if lang::languages_match(&pref.language, &detected) {
            let text = format!(
                "✅ This message is already in {}. No translation needed.",
                detected
            );
            self.reply(&reply, &text).await;
            return;
        }

        match self
            .pipeline
            .translate(&fetched.text, Some(&detected), &pref.language)
            .await
        {
            Ok(translated) => {
                let body = render_reveal(
                    &detected,
                    &pref.language,
                    &fetched.author,
                    &fetched.text,
                    &translated,
                );
                self.reply(&reply, &body).await;
            }
            Err(e) => {
                warn!(
                    "Translation of {} for {} failed ({}): {}",
                    message_id,
                    invoker_id,
                    classify(&e),
                    e
                );
                self.reply(&reply, classify(&e).user_message()).await;
            }
        }
    }

    /// A reaction counts as invoking the affordance only while the trigger
    /// is live and the emoji is the configured one.
    async fn on_reaction(&self, channel_id: &str, message_id: &str, member_id: &str, emoji: &str) {
        if emoji != self.trigger_emoji {
            return;
        }
        if !self.triggers.contains(&message_id.to_string()) {
            debug!("Ignoring reaction on {} without a live trigger", message_id);
            return;
        }
        self.on_invoke(channel_id, message_id, member_id, ReplyTarget::Direct(member_id))
            .await;
    }

    /// Remove expired triggers and their affordances. Runs on a timer,
    /// independent of whether anyone ever invoked them.
    pub async fn sweep_triggers(&self) -> usize {
        let expired = self.triggers.sweep(self.trigger_ttl);
        for (message_id, _) in &expired {
            if let Err(e) = self.gateway.remove_affordance(message_id).await {
                warn!("Failed to remove affordance for {}: {}", message_id, e);
            }
        }
        expired.len()
    }

    pub fn pending_trigger_count(&self) -> usize {
        self.triggers.len()
    }

    async fn reply(&self, target: &ReplyTarget<'_>, text: &str) {
        let result = match target {
            ReplyTarget::Ephemeral(interaction_id) => {
                self.gateway.reply_ephemeral(interaction_id, text).await
            }
            ReplyTarget::Direct(member_id) => self.gateway.send_privately(member_id, text).await,
        };
        if let Err(e) = result {
            warn!("Failed to deliver reply: {}", e);
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate_trigger(&self, message_id: &str, age: Duration) {
        if let Some(trigger) = self.triggers.get(&message_id.to_string()) {
            self.triggers
                .put_with_timestamp(message_id.to_string(), trigger, Utc::now() - age);
        }
    }
}

/// The single bucketing algorithm both delivery modes share: members whose
/// base language already matches the detected one are dropped, everyone
/// else lands in the bucket for their mode.
fn bucket_members(
    snapshot: &PreferenceSnapshot,
    detected: &str,
) -> (Vec<MemberPreference>, Vec<MemberPreference>) {
    let mut auto = Vec::new();
    let mut trigger = Vec::new();
    for member_id in snapshot.member_ids() {
        let Some(pref) = snapshot.get(member_id) else {
            continue;
        };
        if pref.language.is_empty() || lang::languages_match(&pref.language, detected) {
            continue;
        }
        match pref.mode {
            DeliveryMode::Auto => auto.push(pref.clone()),
            DeliveryMode::Trigger => trigger.push(pref.clone()),
        }
    }
    (auto, trigger)
}

fn render_reveal(
    source: &str,
    target: &str,
    author: &str,
    original: &str,
    translated: &str,
) -> String {
    format!(
        "🌍 **Translation** ({source} → {target})\n**From:** {author}\n\n**Original:**\n{original}\n\n**Translation:**\n{translated}"
    )
}
