//! Family member repository.

use std::sync::Arc;

use serde_json::json;

use super::{decode_lossy, now_millis, stamped_patch, to_fields, FAMILY_MEMBERS};
use crate::models::{FamilyMember, MemberStatus, Role};
use crate::remote::{CollectionClient, Filter, RemoteError, Subscription};

pub struct MemberRepository {
    client: Arc<dyn CollectionClient>,
}

impl MemberRepository {
    pub fn new(client: Arc<dyn CollectionClient>) -> Self {
        Self { client }
    }

    /// Add a membership row; returns the server-assigned id.
    pub async fn add(&self, member: &FamilyMember) -> Result<String, RemoteError> {
        let mut fields = to_fields(member)?;
        let now = now_millis();
        fields.insert("createdAt".to_string(), json!(now));
        fields.insert("updatedAt".to_string(), json!(now));
        self.client.create(FAMILY_MEMBERS, fields).await
    }

    pub async fn list(&self, family_id: &str) -> Result<Vec<FamilyMember>, RemoteError> {
        let docs = self
            .client
            .list(FAMILY_MEMBERS, &Filter::eq("familyId", family_id))
            .await?;
        Ok(decode_lossy(docs))
    }

    pub async fn set_role(&self, id: &str, role: Role) -> Result<(), RemoteError> {
        self.client
            .update(
                FAMILY_MEMBERS,
                id,
                stamped_patch(vec![("role", json!(role.to_string()))]),
            )
            .await
    }

    pub async fn set_status(&self, id: &str, status: MemberStatus) -> Result<(), RemoteError> {
        self.client
            .update(
                FAMILY_MEMBERS,
                id,
                stamped_patch(vec![("status", json!(status.to_string()))]),
            )
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<(), RemoteError> {
        self.client.delete(FAMILY_MEMBERS, id).await
    }

    /// Live subscription on one family's membership.
    pub async fn subscribe(&self, family_id: &str) -> Result<Subscription, RemoteError> {
        self.client
            .subscribe(FAMILY_MEMBERS, &Filter::eq("familyId", family_id))
            .await
    }
}
