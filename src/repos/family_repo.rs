//! Family repository.

use std::sync::Arc;

use serde_json::json;

use super::{decode, decode_lossy, now_millis, to_fields, FAMILIES};
use crate::models::Family;
use crate::remote::{CollectionClient, Filter, RemoteError, Subscription};

pub struct FamilyRepository {
    client: Arc<dyn CollectionClient>,
}

impl FamilyRepository {
    pub fn new(client: Arc<dyn CollectionClient>) -> Self {
        Self { client }
    }

    /// Create a family; returns the server-assigned id.
    pub async fn create(&self, family: &Family) -> Result<String, RemoteError> {
        let mut fields = to_fields(family)?;
        fields.insert("createdAt".to_string(), json!(now_millis()));
        self.client.create(FAMILIES, fields).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Family>, RemoteError> {
        match self.client.get(FAMILIES, id).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Family>, RemoteError> {
        let docs = self
            .client
            .list(FAMILIES, &Filter::eq("ownerId", owner_id))
            .await?;
        Ok(decode_lossy(docs))
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<(), RemoteError> {
        let mut patch = serde_json::Map::new();
        patch.insert("name".to_string(), json!(name));
        self.client.update(FAMILIES, id, patch).await
    }

    /// Change the family's display currency.
    pub async fn set_currency(&self, id: &str, currency: &str) -> Result<(), RemoteError> {
        let mut patch = serde_json::Map::new();
        patch.insert("currency".to_string(), json!(currency));
        self.client.update(FAMILIES, id, patch).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.client.delete(FAMILIES, id).await
    }

    /// Live subscription on families owned by a user.
    pub async fn subscribe_by_owner(&self, owner_id: &str) -> Result<Subscription, RemoteError> {
        self.client
            .subscribe(FAMILIES, &Filter::eq("ownerId", owner_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::MockClient;

    fn repo() -> (Arc<MockClient>, FamilyRepository) {
        let client = Arc::new(MockClient::new());
        let repo = FamilyRepository::new(client.clone());
        (client, repo)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_, repo) = repo();
        let id = repo
            .create(&Family::new("The Simpsons", "USD", "user-1"))
            .await
            .unwrap();

        let family = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(family.id, id);
        assert_eq!(family.name, "The Simpsons");
        assert_eq!(family.currency, "USD");
        assert_eq!(family.owner_id, "user-1");
    }

    #[tokio::test]
    async fn test_list_by_owner_filters() {
        let (_, repo) = repo();
        repo.create(&Family::new("Mine", "USD", "user-1"))
            .await
            .unwrap();
        repo.create(&Family::new("Theirs", "USD", "user-2"))
            .await
            .unwrap();

        let owned = repo.list_by_owner("user-1").await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].name, "Mine");
    }

    #[tokio::test]
    async fn test_rename_leaves_currency() {
        let (_, repo) = repo();
        let id = repo
            .create(&Family::new("The Simpsons", "EUR", "user-1"))
            .await
            .unwrap();

        repo.rename(&id, "The Flanders").await.unwrap();
        let family = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(family.name, "The Flanders");
        assert_eq!(family.currency, "EUR");
    }

    #[tokio::test]
    async fn test_set_currency() {
        let (_, repo) = repo();
        let id = repo
            .create(&Family::new("The Simpsons", "USD", "user-1"))
            .await
            .unwrap();

        repo.set_currency(&id, "JPY").await.unwrap();
        let family = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(family.currency, "JPY");
    }

    #[tokio::test]
    async fn test_delete() {
        let (_, repo) = repo();
        let id = repo
            .create(&Family::new("The Simpsons", "USD", "user-1"))
            .await
            .unwrap();
        repo.delete(&id).await.unwrap();
        assert!(repo.get(&id).await.unwrap().is_none());
    }
}
