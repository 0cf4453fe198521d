use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::config::Config;
use crate::models::Family;
use crate::prefs;
use crate::repos::FamilyRepository;

#[derive(Args)]
pub struct FamilyCommand {
    #[command(subcommand)]
    pub command: FamilySubcommand,
}

#[derive(Subcommand)]
pub enum FamilySubcommand {
    /// Create a new family
    Create {
        /// Family name
        name: String,

        /// Display currency (defaults to the saved preference)
        #[arg(long)]
        currency: Option<String>,
    },

    /// List families you own
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Rename a family
    Rename {
        /// Family ID
        id: String,

        /// New name
        name: String,
    },

    /// Change a family's display currency
    SetCurrency {
        /// Family ID
        id: String,

        /// Currency code (e.g., USD, EUR, JPY)
        currency: String,
    },

    /// Delete a family
    Delete {
        /// Family ID
        id: String,
    },
}

impl FamilyCommand {
    pub async fn run(
        &self,
        repo: &FamilyRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            FamilySubcommand::Create { name, currency } => {
                if name.trim().is_empty() {
                    return Err("Family name cannot be empty".into());
                }

                let currency = match currency {
                    Some(code) => code.clone(),
                    None => prefs::load_currency(&prefs::default_currency_path())?,
                };

                let family = Family::new(name.trim(), currency, &config.user_id);
                let id = repo.create(&family).await?;
                println!("Created family {} ({})", name.trim(), id);
                Ok(())
            }

            FamilySubcommand::List { format } => {
                let families = repo.list_by_owner(&config.user_id).await?;

                if families.is_empty() {
                    println!("No families found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&families)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<24}  {:<30}  CURRENCY", "ID", "NAME");
                        println!("{}", "-".repeat(66));
                        for family in &families {
                            println!(
                                "{:<24}  {:<30}  {}",
                                family.id, family.name, family.currency
                            );
                        }
                        println!("\nTotal: {} family(ies)", families.len());
                    }
                }
                Ok(())
            }

            FamilySubcommand::Rename { id, name } => {
                repo.rename(id, name.trim()).await?;
                println!("Renamed family {}", id);
                Ok(())
            }

            FamilySubcommand::SetCurrency { id, currency } => {
                repo.set_currency(id, currency).await?;
                println!("Set currency of family {} to {}", id, currency);
                Ok(())
            }

            FamilySubcommand::Delete { id } => {
                repo.delete(id).await?;
                println!("Deleted family {}", id);
                Ok(())
            }
        }
    }
}
