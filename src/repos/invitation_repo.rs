//! Invitation repository.

use std::sync::Arc;

use serde_json::json;

use super::{decode_lossy, now_millis, stamped_patch, to_fields, INVITATIONS};
use crate::models::{Invitation, InvitationStatus};
use crate::remote::{CollectionClient, Filter, RemoteError, Subscription};

pub struct InvitationRepository {
    client: Arc<dyn CollectionClient>,
}

impl InvitationRepository {
    pub fn new(client: Arc<dyn CollectionClient>) -> Self {
        Self { client }
    }

    /// Record an invitation; returns the server-assigned id.
    pub async fn send(&self, invitation: &Invitation) -> Result<String, RemoteError> {
        let mut fields = to_fields(invitation)?;
        let now = now_millis();
        fields.insert("createdAt".to_string(), json!(now));
        fields.insert("updatedAt".to_string(), json!(now));
        self.client.create(INVITATIONS, fields).await
    }

    pub async fn list_for_family(&self, family_id: &str) -> Result<Vec<Invitation>, RemoteError> {
        let docs = self
            .client
            .list(INVITATIONS, &Filter::eq("familyId", family_id))
            .await?;
        Ok(decode_lossy(docs))
    }

    pub async fn set_status(&self, id: &str, status: InvitationStatus) -> Result<(), RemoteError> {
        self.client
            .update(
                INVITATIONS,
                id,
                stamped_patch(vec![("status", json!(status.to_string()))]),
            )
            .await
    }

    pub async fn accept(&self, id: &str) -> Result<(), RemoteError> {
        self.set_status(id, InvitationStatus::Accepted).await
    }

    pub async fn decline(&self, id: &str) -> Result<(), RemoteError> {
        self.set_status(id, InvitationStatus::Declined).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.client.delete(INVITATIONS, id).await
    }

    /// Live subscription on one family's invitations.
    pub async fn subscribe(&self, family_id: &str) -> Result<Subscription, RemoteError> {
        self.client
            .subscribe(INVITATIONS, &Filter::eq("familyId", family_id))
            .await
    }
}
