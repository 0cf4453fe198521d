//! Grocery item repository.

use std::sync::Arc;

use serde_json::json;

use super::{decode, decode_lossy, now_millis, stamped_patch, to_fields, GROCERY_ITEMS};
use crate::models::{GroceryItem, Unit};
use crate::remote::{CollectionClient, Filter, RemoteError, Subscription};

pub struct ItemRepository {
    client: Arc<dyn CollectionClient>,
}

impl ItemRepository {
    pub fn new(client: Arc<dyn CollectionClient>) -> Self {
        Self { client }
    }

    /// Add an item to a family's list; returns the server-assigned id.
    /// Both timestamps are stamped at write time.
    pub async fn add(&self, item: &GroceryItem) -> Result<String, RemoteError> {
        let mut fields = to_fields(item)?;
        let now = now_millis();
        fields.insert("createdAt".to_string(), json!(now));
        fields.insert("updatedAt".to_string(), json!(now));
        self.client.create(GROCERY_ITEMS, fields).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<GroceryItem>, RemoteError> {
        match self.client.get(GROCERY_ITEMS, id).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn list_by_family(&self, family_id: &str) -> Result<Vec<GroceryItem>, RemoteError> {
        let docs = self
            .client
            .list(GROCERY_ITEMS, &Filter::eq("familyId", family_id))
            .await?;
        Ok(decode_lossy(docs))
    }

    /// Toggle the purchased flag. Patches only `checked` and `updatedAt`.
    pub async fn set_checked(&self, id: &str, checked: bool) -> Result<(), RemoteError> {
        self.client
            .update(
                GROCERY_ITEMS,
                id,
                stamped_patch(vec![("checked", json!(checked))]),
            )
            .await
    }

    pub async fn set_quantity(
        &self,
        id: &str,
        quantity: f64,
        unit: Unit,
    ) -> Result<(), RemoteError> {
        self.client
            .update(
                GROCERY_ITEMS,
                id,
                stamped_patch(vec![
                    ("quantity", json!(quantity)),
                    ("unit", json!(unit.as_str())),
                ]),
            )
            .await
    }

    pub async fn set_price(&self, id: &str, price: f64) -> Result<(), RemoteError> {
        self.client
            .update(GROCERY_ITEMS, id, stamped_patch(vec![("price", json!(price))]))
            .await
    }

    /// Remove the item outright. Items have no soft-delete.
    pub async fn remove(&self, id: &str) -> Result<(), RemoteError> {
        self.client.delete(GROCERY_ITEMS, id).await
    }

    /// Live subscription on one family's items.
    pub async fn subscribe(&self, family_id: &str) -> Result<Subscription, RemoteError> {
        self.client
            .subscribe(GROCERY_ITEMS, &Filter::eq("familyId", family_id))
            .await
    }
}
