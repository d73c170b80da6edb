use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the dispatch engine on the stdio gateway
    Run,

    /// Verify the translation provider accepts the configured credentials
    Check,

    /// Manage member language preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Manage the channel allowlist
    Channels {
        #[command(subcommand)]
        action: ChannelsAction,
    },

    /// Manage the translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Set a member's preferred language and delivery mode
    Set {
        /// Member id
        member: String,

        /// Preferred language code (e.g. DE, EN-US, PT-BR)
        language: String,

        /// Delivery mode: "button" waits for the member to invoke the
        /// shared affordance, "auto" delivers every translation immediately
        #[arg(long, default_value = "button")]
        mode: String,
    },

    /// List stored member preferences
    List,
}

#[derive(Subcommand)]
pub enum ChannelsAction {
    /// Allow dispatch in a channel
    Add {
        /// Channel id
        channel_id: String,
    },

    /// Remove a channel from the allowlist
    Remove {
        /// Channel id
        channel_id: String,
    },

    /// List allowlisted channels
    List,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached translations
    List,

    /// Clear all cached translations
    Clear,

    /// Evict cached translations past the maximum age
    Sweep,
}
