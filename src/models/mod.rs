pub mod family;
pub mod invitation;
pub mod item;
pub mod member;

pub use family::Family;
pub use invitation::{Invitation, InvitationStatus};
pub use item::{GroceryItem, Unit};
pub use member::{FamilyMember, MemberStatus, Role};
