use clap::{Args, Subcommand};

use crate::models::{FamilyMember, Role};
use crate::repos::MemberRepository;

#[derive(Args)]
pub struct MemberCommand {
    #[command(subcommand)]
    pub command: MemberSubcommand,
}

#[derive(Subcommand)]
pub enum MemberSubcommand {
    /// Add a member to a family
    Add {
        /// Family ID
        family_id: String,

        /// User ID to add
        user_id: String,

        /// Role (owner, admin, member)
        #[arg(long, default_value = "member")]
        role: Role,
    },

    /// List a family's members
    List {
        /// Family ID
        family_id: String,
    },

    /// Change a member's role
    SetRole {
        /// Membership ID
        id: String,

        /// New role (owner, admin, member)
        role: Role,
    },

    /// Remove a member from a family
    Remove {
        /// Membership ID
        id: String,
    },
}

impl MemberCommand {
    pub async fn run(&self, repo: &MemberRepository) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MemberSubcommand::Add {
                family_id,
                user_id,
                role,
            } => {
                let member = FamilyMember::new(family_id, user_id, *role);
                let id = repo.add(&member).await?;
                println!("Added {} as {} ({})", user_id, role, id);
                Ok(())
            }

            MemberSubcommand::List { family_id } => {
                let members = repo.list(family_id).await?;

                if members.is_empty() {
                    println!("No members found");
                    return Ok(());
                }

                println!("{:<24}  {:<20}  {:<8}  STATUS", "ID", "USER", "ROLE");
                println!("{}", "-".repeat(64));
                for member in &members {
                    println!(
                        "{:<24}  {:<20}  {:<8}  {}",
                        member.id, member.user_id, member.role, member.status
                    );
                }
                println!("\nTotal: {} member(s)", members.len());
                Ok(())
            }

            MemberSubcommand::SetRole { id, role } => {
                repo.set_role(id, *role).await?;
                println!("Set role of {} to {}", id, role);
                Ok(())
            }

            MemberSubcommand::Remove { id } => {
                repo.remove(id).await?;
                println!("Removed member {}", id);
                Ok(())
            }
        }
    }
}
