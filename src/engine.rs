use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::cache::TranslationCache;
use crate::config::Config;
use crate::gateway::GatewayEvent;
use crate::router::Router;

/// The cooperative event loop. Every inbound event runs in its own task so
/// one slow provider call never stalls the loop; the cache and trigger
/// sweeps run on their own timers, independent of traffic.
pub struct Engine {
    router: Arc<Router>,
    cache: Arc<TranslationCache>,
    cache_sweep_interval: Duration,
    trigger_sweep_interval: Duration,
}

impl Engine {
    pub fn new(router: Arc<Router>, cache: Arc<TranslationCache>, config: &Config) -> Self {
        Self {
            router,
            cache,
            cache_sweep_interval: Duration::from_secs(config.cache.sweep_interval_secs),
            trigger_sweep_interval: Duration::from_secs(config.trigger.sweep_interval_secs),
        }
    }

    /// Serve events until the stream closes, then drain in-flight tasks.
    /// No event failure is fatal; panics in event tasks are logged and the
    /// loop keeps going.
    pub async fn run(&self, mut events: mpsc::Receiver<GatewayEvent>) {
        let mut tasks: JoinSet<()> = JoinSet::new();

        let mut cache_tick = interval_at(
            Instant::now() + self.cache_sweep_interval,
            self.cache_sweep_interval,
        );
        cache_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut trigger_tick = interval_at(
            Instant::now() + self.trigger_sweep_interval,
            self.trigger_sweep_interval,
        );
        trigger_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Dispatch engine started");

        loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        let router = self.router.clone();
                        tasks.spawn(async move {
                            router.handle_event(event).await;
                        });
                    }
                    None => break,
                },
                _ = cache_tick.tick() => {
                    let cache = self.cache.clone();
                    tasks.spawn(async move {
                        let removed = cache.sweep().await;
                        if removed > 0 {
                            info!("Evicted {} expired cached translations", removed);
                        }
                    });
                }
                _ = trigger_tick.tick() => {
                    let router = self.router.clone();
                    tasks.spawn(async move {
                        let removed = router.sweep_triggers().await;
                        if removed > 0 {
                            debug!("Retired {} expired triggers", removed);
                        }
                    });
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        warn!("Event task failed: {}", e);
                    }
                }
            }
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Event task failed: {}", e);
            }
        }
        info!("Dispatch engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DispatchConfig, TriggerConfig};
    use crate::gate::ChannelGate;
    use crate::gateway::MockGateway;
    use crate::pipeline::Pipeline;
    use crate::prefs::{DeliveryMode, PreferenceStore};
    use crate::provider::{MockMode, MockProvider};
    use crate::store::JsonStore;

    #[tokio::test]
    async fn test_engine_dispatches_until_stream_closes() {
        let dir = tempfile::tempdir().unwrap();

        let gate = Arc::new(ChannelGate::new(JsonStore::new(
            dir.path().join("translate_channel.json"),
        )));
        gate.add("chan-1").await.unwrap();

        let prefs = Arc::new(PreferenceStore::new(JsonStore::new(
            dir.path().join("user_languages.json"),
        )));
        prefs.set("alice", "EN-US", DeliveryMode::Auto).await.unwrap();

        let cache = Arc::new(TranslationCache::new(
            JsonStore::new(dir.path().join("cache.json")),
            chrono::Duration::hours(6),
        ));
        let provider = Arc::new(MockProvider::with_detected(MockMode::Suffix, "FR"));
        let pipeline = Arc::new(Pipeline::new(
            Box::new(provider),
            cache.clone(),
            &DispatchConfig::default(),
        ));
        let gateway = Arc::new(MockGateway::new());
        let router = Arc::new(Router::new(
            gate,
            prefs,
            pipeline,
            gateway.clone(),
            &TriggerConfig::default(),
            &DispatchConfig::default(),
        ));

        let engine = Engine::new(router, cache, &Config::default());

        let (tx, rx) = mpsc::channel(16);
        tx.send(GatewayEvent::MessageCreated {
            channel_id: "chan-1".to_string(),
            message_id: "m1".to_string(),
            author_id: "u1".to_string(),
            author_name: "marie".to_string(),
            author_is_automated: false,
            text: "Bonjour".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        engine.run(rx).await;

        assert_eq!(gateway.private_messages_to("alice").len(), 1);
    }
}
