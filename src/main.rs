//! Tsuji - Multi-Mode Translation Dispatch Engine
//!
//! This is the main entry point for the Tsuji daemon, which watches chat
//! messages arriving on the stdio gateway, detects their language, and
//! offers DeepL translations to members according to their stored
//! preferences.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tsuji::cache::TranslationCache;
use tsuji::cli::{Args, CacheAction, ChannelsAction, Commands, PrefsAction};
use tsuji::config::Config;
use tsuji::engine::Engine;
use tsuji::error::TsujiError;
use tsuji::gate::ChannelGate;
use tsuji::gateway::StdioGateway;
use tsuji::lang;
use tsuji::pipeline::Pipeline;
use tsuji::prefs::{DeliveryMode, PreferenceStore};
use tsuji::provider::TranslationProvider;
use tsuji::provider::deepl::{DeeplProvider, check_availability};
use tsuji::router::Router;
use tsuji::store::JsonStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("tsuji.toml").exists() {
                Config::from_file("tsuji.toml")?
            } else {
                Config::default()
            }
        }
    };

    // Setup logging to stderr and file
    setup_logging(args.verbose, &config)?;

    let data_dir = PathBuf::from(&config.storage.data_dir);
    let prefs = Arc::new(PreferenceStore::new(JsonStore::new(
        data_dir.join("user_languages.json"),
    )));
    let gate = Arc::new(ChannelGate::new(JsonStore::new(
        data_dir.join("translate_channel.json"),
    )));
    let cache = Arc::new(TranslationCache::new(
        JsonStore::new(data_dir.join("cache.json")),
        chrono::Duration::seconds(config.cache.max_age_secs as i64),
    ));

    match args.command {
        Commands::Run => {
            info!("Starting Tsuji translation dispatch engine");

            gate.reload().await;
            cache.load().await;

            let provider = DeeplProvider::from_config(&config.provider)?;
            info!("Using translation provider: {}", provider.provider_name());
            let pipeline = Arc::new(Pipeline::new(
                Box::new(provider),
                cache.clone(),
                &config.dispatch,
            ));

            // Observed messages must stay fetchable for the trigger lifetime
            let retention = chrono::Duration::seconds((config.trigger.ttl_secs * 3) as i64);
            let gateway = StdioGateway::new(retention);
            let events = gateway.spawn_reader(256);

            let router = Arc::new(Router::new(
                gate,
                prefs,
                pipeline,
                gateway,
                &config.trigger,
                &config.dispatch,
            ));

            Engine::new(router, cache, &config).run(events).await;
        }
        Commands::Check => {
            info!("Checking translation provider availability...");
            let (used, limit) = check_availability(&config.provider).await?;
            println!("DeepL is reachable: {}/{} characters used this period", used, limit);
        }
        Commands::Prefs { action } => match action {
            PrefsAction::Set {
                member,
                language,
                mode,
            } => {
                let code = lang::normalize(&language);
                if !lang::is_supported(&code) {
                    let supported = lang::SUPPORTED_LANGUAGES
                        .iter()
                        .map(|(_, c)| *c)
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(TsujiError::Config(format!(
                        "Unsupported language '{}'. Supported codes: {}",
                        language, supported
                    ))
                    .into());
                }
                let mode = parse_delivery_mode(&mode)?;

                prefs.set(&member, &code, mode).await?;
                println!("Set language for {} to {} ({})", member, code, mode.as_str());
            }
            PrefsAction::List => {
                let snapshot = prefs.snapshot().await;
                if snapshot.is_empty() {
                    println!("No member preferences stored.");
                } else {
                    println!("\nMember Preferences:");
                    println!("{:<24} {:<10} {:<8}", "Member", "Language", "Mode");
                    println!("{}", "-".repeat(44));

                    let mut member_ids: Vec<&str> = snapshot.member_ids().collect();
                    member_ids.sort();
                    for member_id in member_ids {
                        if let Some(pref) = snapshot.get(member_id) {
                            println!(
                                "{:<24} {:<10} {:<8}",
                                member_id,
                                pref.language,
                                pref.mode.as_str()
                            );
                        }
                    }
                }
            }
        },
        Commands::Channels { action } => match action {
            ChannelsAction::Add { channel_id } => {
                gate.add(&channel_id).await?;
                println!("Dispatch enabled in channel {}", channel_id);
            }
            ChannelsAction::Remove { channel_id } => {
                gate.remove(&channel_id).await?;
                println!("Dispatch disabled in channel {}", channel_id);
            }
            ChannelsAction::List => {
                gate.reload().await;
                let channels = gate.channel_ids();
                if channels.is_empty() {
                    println!("No channels allowlisted; dispatch is inactive everywhere.");
                } else {
                    println!("Allowlisted channels:");
                    for channel_id in channels {
                        println!("  {}", channel_id);
                    }
                }
            }
        },
        Commands::Cache { action } => {
            cache.load().await;
            match action {
                CacheAction::List => {
                    let items = cache.list();
                    if items.is_empty() {
                        println!("No cached translations found.");
                    } else {
                        println!("\nCached Translations:");
                        println!("{:<10} {:<12} {:<50}", "Target", "Cached", "Source Text");
                        println!("{}", "-".repeat(75));

                        for item in items {
                            let (source_text, target) =
                                item.key.rsplit_once("::").unwrap_or((item.key.as_str(), "?"));
                            let cached_ago =
                                (Utc::now() - item.cached_at).num_seconds().max(0) as u64;
                            let preview: String = if source_text.chars().count() > 47 {
                                source_text.chars().take(47).collect::<String>() + "..."
                            } else {
                                source_text.to_string()
                            };

                            println!(
                                "{:<10} {:<12} {:<50}",
                                target,
                                format_duration(cached_ago),
                                preview
                            );
                        }
                    }
                }
                CacheAction::Clear => {
                    let cleared = cache.clear().await;
                    println!("Cleared {} cached translations", cleared);
                }
                CacheAction::Sweep => {
                    let removed = cache.sweep().await;
                    println!("Evicted {} expired cached translations", removed);
                }
            }
        }
    }

    Ok(())
}

/// Setup logging to stderr and a daily rolling file. Stdout is reserved for
/// the gateway line protocol.
fn setup_logging(verbose: bool, config: &Config) -> Result<()> {
    let log_dir = PathBuf::from(&config.storage.data_dir).join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "tsuji.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Format duration in seconds to human readable string
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

/// Parse delivery mode from string
fn parse_delivery_mode(mode: &str) -> Result<DeliveryMode> {
    match mode.to_lowercase().as_str() {
        "auto" => Ok(DeliveryMode::Auto),
        "button" => Ok(DeliveryMode::Trigger),
        _ => Err(TsujiError::Config(format!(
            "Invalid delivery mode '{}'. Valid modes: auto, button",
            mode
        ))
        .into()),
    }
}
