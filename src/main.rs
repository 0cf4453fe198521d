use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod models;
mod prefs;
mod remote;
mod repos;
mod store;
mod suggest;

use commands::{
    ConfigCommand, FamilyCommand, InviteCommand, ItemCommand, MemberCommand, WatchCommand,
};
use config::Config;
use remote::RemoteClient;
use repos::{FamilyRepository, InvitationRepository, ItemRepository, MemberRepository};
use store::SyncStore;
use suggest::{HttpSuggestionBackend, Suggester};

#[derive(Parser)]
#[command(name = "famcart")]
#[command(version)]
#[command(about = "Family grocery lists with live sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage families
    Family(FamilyCommand),

    /// Manage grocery items
    Item(ItemCommand),

    /// Manage family members
    Member(MemberCommand),

    /// Manage invitations
    Invite(InviteCommand),

    /// Manage configuration and preferences
    Config(ConfigCommand),

    /// Follow the grocery list live
    Watch(WatchCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn remote_client(config: &Config) -> Arc<RemoteClient> {
    Arc::new(RemoteClient::new(
        config.server_url.clone(),
        config.api_key.clone(),
    ))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Family(cmd)) => {
            let repo = FamilyRepository::new(remote_client(&config));
            cmd.run(&repo, &config).await?;
        }
        Some(Commands::Item(cmd)) => {
            let repo = ItemRepository::new(remote_client(&config));
            let suggester = Suggester::new(Arc::new(HttpSuggestionBackend::new(
                config.suggest_url.clone(),
                config.api_key.clone(),
            )));
            let currency = prefs::load_currency(&prefs::default_currency_path())?;
            cmd.run(&repo, &suggester, &currency).await?;
        }
        Some(Commands::Member(cmd)) => {
            let repo = MemberRepository::new(remote_client(&config));
            cmd.run(&repo).await?;
        }
        Some(Commands::Invite(cmd)) => {
            let repo = InvitationRepository::new(remote_client(&config));
            cmd.run(&repo, &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        Some(Commands::Watch(cmd)) => {
            let client = remote_client(&config);
            let (store, errors) = SyncStore::new(client.clone());
            cmd.run(&store, errors, &config.user_id).await?;
            client.close().await;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
