use clap::{Args, Subcommand};

use crate::config::Config;
use crate::models::Invitation;
use crate::repos::InvitationRepository;

#[derive(Args)]
pub struct InviteCommand {
    #[command(subcommand)]
    pub command: InviteSubcommand,
}

#[derive(Subcommand)]
pub enum InviteSubcommand {
    /// Invite an email address to a family
    Send {
        /// Family ID
        family_id: String,

        /// Email address to invite
        email: String,
    },

    /// List a family's invitations
    List {
        /// Family ID
        family_id: String,
    },

    /// Accept an invitation
    Accept {
        /// Invitation ID
        id: String,
    },

    /// Decline an invitation
    Decline {
        /// Invitation ID
        id: String,
    },

    /// Delete an invitation
    Delete {
        /// Invitation ID
        id: String,
    },
}

impl InviteCommand {
    pub async fn run(
        &self,
        repo: &InvitationRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            InviteSubcommand::Send { family_id, email } => {
                let invitation = Invitation::new(family_id, email, &config.user_id);
                let id = repo.send(&invitation).await?;
                println!("Invited {} ({})", email, id);
                Ok(())
            }

            InviteSubcommand::List { family_id } => {
                let invitations = repo.list_for_family(family_id).await?;

                if invitations.is_empty() {
                    println!("No invitations found");
                    return Ok(());
                }

                println!("{:<24}  {:<30}  STATUS", "ID", "EMAIL");
                println!("{}", "-".repeat(64));
                for invitation in &invitations {
                    println!(
                        "{:<24}  {:<30}  {}",
                        invitation.id, invitation.email, invitation.status
                    );
                }
                println!("\nTotal: {} invitation(s)", invitations.len());
                Ok(())
            }

            InviteSubcommand::Accept { id } => {
                repo.accept(id).await?;
                println!("Accepted invitation {}", id);
                Ok(())
            }

            InviteSubcommand::Decline { id } => {
                repo.decline(id).await?;
                println!("Declined invitation {}", id);
                Ok(())
            }

            InviteSubcommand::Delete { id } => {
                repo.delete(id).await?;
                println!("Deleted invitation {}", id);
                Ok(())
            }
        }
    }
}
