pub mod config_cmd;
pub mod family;
pub mod invite;
pub mod item;
pub mod member;
pub mod watch;

use clap::ValueEnum;

/// Output format shared by the list subcommands.
#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub use config_cmd::ConfigCommand;
pub use family::FamilyCommand;
pub use invite::InviteCommand;
pub use item::ItemCommand;
pub use member::MemberCommand;
pub use watch::WatchCommand;
