use clap::{Args, Subcommand};

use crate::config::Config;
use crate::prefs;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show,

    /// Save the preferred display currency
    SetCurrency {
        /// Currency code (e.g., USD, EUR, JPY)
        currency: String,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show => {
                println!("Configuration");
                println!("=============\n");
                println!("server_url: {}", config.server_url);
                println!("suggest_url: {}", config.suggest_url);
                println!("user_id: {}", config.user_id);

                let currency_path = prefs::default_currency_path();
                let currency = prefs::load_currency(&currency_path)?;
                println!("currency: {} ({})", currency, currency_path.display());
                Ok(())
            }

            ConfigSubcommand::SetCurrency { currency } => {
                let code = currency.trim().to_uppercase();
                if code.is_empty() {
                    return Err("Currency code cannot be empty".into());
                }
                let path = prefs::default_currency_path();
                prefs::save_currency(&path, &code)?;
                println!("Saved currency preference: {}", code);
                Ok(())
            }
        }
    }
}
