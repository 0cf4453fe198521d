use clap::Args;
use tracing::warn;

use crate::store::SyncStore;

#[derive(Args)]
pub struct WatchCommand {
    /// Activate a specific family instead of the first one
    #[arg(long)]
    pub family: Option<String>,
}

impl WatchCommand {
    /// Run the live view: subscribe, reprint the list on every change,
    /// tear down on Ctrl-C.
    pub async fn run(
        &self,
        store: &SyncStore,
        mut errors: tokio::sync::mpsc::UnboundedReceiver<crate::store::SyncError>,
        owner_id: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut changes = store.watch_changes();

        store.init(owner_id).await?;
        if let Some(family_id) = &self.family {
            store.set_active_family(family_id).await?;
        }

        println!("Watching grocery lists for {} (Ctrl-C to stop)", owner_id);

        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    print_state(store).await;
                }
                error = errors.recv() => {
                    match error {
                        // Recoverable: report and keep showing cached state.
                        Some(e) => {
                            warn!(error = %e, "sync degraded");
                            eprintln!("Sync warning: {}", e);
                        }
                        None => break,
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    break;
                }
            }
        }

        store.cleanup().await;
        println!("\nStopped.");
        Ok(())
    }
}

async fn print_state(store: &SyncStore) {
    println!();
    match store.active_family().await {
        Some(family) => println!("== {} ==", family),
        None => match store.active_family_id().await {
            Some(id) => println!("== {} ==", id),
            None => {
                println!("(no family yet)");
                return;
            }
        },
    }

    let items = store.items().await;
    if items.is_empty() {
        println!("(list is empty)");
    }
    for item in items {
        println!("{}", item);
    }
}
