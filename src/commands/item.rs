use clap::{Args, Subcommand};
use tracing::warn;

use super::OutputFormat;
use crate::models::{GroceryItem, Unit};
use crate::repos::ItemRepository;
use crate::suggest::Suggester;

#[derive(Args)]
pub struct ItemCommand {
    #[command(subcommand)]
    pub command: ItemSubcommand,
}

#[derive(Subcommand)]
pub enum ItemSubcommand {
    /// Add an item to a family's list
    Add {
        /// Family ID
        family_id: String,

        /// Item name
        name: String,

        /// Quantity
        #[arg(long)]
        quantity: Option<f64>,

        /// Unit of measurement (pcs, kg, g, ltr, ml, pack, dozen)
        #[arg(long)]
        unit: Option<Unit>,

        /// Brand
        #[arg(long)]
        brand: Option<String>,

        /// Estimated unit price
        #[arg(long)]
        price: Option<f64>,

        /// Fill in missing details from the suggestion service
        #[arg(long)]
        suggest: bool,
    },

    /// List a family's items
    List {
        /// Family ID
        family_id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark an item as purchased
    Check {
        /// Item ID
        id: String,
    },

    /// Mark an item as not purchased
    Uncheck {
        /// Item ID
        id: String,
    },

    /// Change an item's quantity
    SetQuantity {
        /// Item ID
        id: String,

        /// New quantity
        quantity: f64,

        /// Unit of measurement
        #[arg(long, default_value = "pcs")]
        unit: Unit,
    },

    /// Remove an item from the list
    Remove {
        /// Item ID
        id: String,
    },
}

impl ItemCommand {
    pub async fn run(
        &self,
        repo: &ItemRepository,
        suggester: &Suggester,
        currency: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ItemSubcommand::Add {
                family_id,
                name,
                quantity,
                unit,
                brand,
                price,
                suggest,
            } => {
                if name.trim().is_empty() {
                    return Err("Item name cannot be empty".into());
                }

                let mut item = GroceryItem::new(family_id, name.trim());

                if *suggest {
                    // A failed suggestion degrades to defaults; it never
                    // aborts the add.
                    match suggester.suggest(name.trim(), currency).await {
                        Ok(details) => {
                            item.quantity = details.quantity;
                            item.unit = details.unit;
                            if !details.brand.is_empty() {
                                item.brand = Some(details.brand);
                            }
                            if details.price > 0.0 {
                                item.price = Some(details.price);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "suggestion unavailable, using defaults");
                            eprintln!("Suggestion unavailable: {}", e);
                        }
                    }
                }

                // Explicit flags override anything suggested.
                if let Some(quantity) = quantity {
                    item.quantity = *quantity;
                }
                if let Some(unit) = unit {
                    item.unit = *unit;
                }
                if brand.is_some() {
                    item.brand = brand.clone();
                }
                if price.is_some() {
                    item.price = *price;
                }

                if item.quantity < 0.0 {
                    return Err("Quantity cannot be negative".into());
                }

                let id = repo.add(&item).await?;
                println!("Added {} ({})", item.name, id);
                Ok(())
            }

            ItemSubcommand::List { family_id, format } => {
                let items = repo.list_by_family(family_id).await?;

                if items.is_empty() {
                    println!("No items found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&items)?);
                    }
                    OutputFormat::Text => {
                        for item in &items {
                            println!("{:<24}  {}", item.id, item);
                        }
                        println!("\nTotal: {} item(s)", items.len());
                    }
                }
                Ok(())
            }

            ItemSubcommand::Check { id } => {
                repo.set_checked(id, true).await?;
                println!("Checked {}", id);
                Ok(())
            }

            ItemSubcommand::Uncheck { id } => {
                repo.set_checked(id, false).await?;
                println!("Unchecked {}", id);
                Ok(())
            }

            ItemSubcommand::SetQuantity { id, quantity, unit } => {
                if *quantity < 0.0 {
                    return Err("Quantity cannot be negative".into());
                }
                repo.set_quantity(id, *quantity, *unit).await?;
                println!("Set {} to {} {}", id, quantity, unit);
                Ok(())
            }

            ItemSubcommand::Remove { id } => {
                repo.remove(id).await?;
                println!("Removed {}", id);
                Ok(())
            }
        }
    }
}
