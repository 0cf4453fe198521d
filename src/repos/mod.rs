//! Repository adapters over the document store.
//!
//! One module per entity type. Each is a thin pass-through to the
//! [`CollectionClient`](crate::remote::CollectionClient): writes stamp
//! `createdAt`/`updatedAt`, reads flatten the store's (id, field-map)
//! shape into the typed record. No business logic lives here; every
//! remote failure propagates to the caller unchanged.

pub mod family_repo;
pub mod invitation_repo;
pub mod item_repo;
pub mod member_repo;

pub use family_repo::FamilyRepository;
pub use invitation_repo::InvitationRepository;
pub use item_repo::ItemRepository;
pub use member_repo::MemberRepository;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::remote::{Document, RemoteError};

/// Collection names as the document store knows them.
pub const FAMILIES: &str = "families";
pub const FAMILY_MEMBERS: &str = "familyMembers";
pub const GROCERY_ITEMS: &str = "groceryItems";
pub const INVITATIONS: &str = "invitations";

/// Current time as epoch milliseconds, the store's timestamp format.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Flatten a document into a typed record by folding the server id
/// into the field map.
pub(crate) fn decode<T: DeserializeOwned>(doc: Document) -> Result<T, RemoteError> {
    let mut fields = doc.fields;
    fields.insert("id".to_string(), Value::String(doc.id));
    serde_json::from_value(Value::Object(fields)).map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Decode every document in a snapshot, skipping records that do not
/// match the expected shape. A single malformed document must not take
/// the rest of the result set down with it.
pub(crate) fn decode_lossy<T: DeserializeOwned>(docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            match decode(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(document_id = %id, error = %e, "skipping malformed document");
                    None
                }
            }
        })
        .collect()
}

/// Serialize a record to a field map for writing, dropping the `id`
/// (the store assigns ids, they are never stored as fields).
pub(crate) fn to_fields<T: Serialize>(record: &T) -> Result<Map<String, Value>, RemoteError> {
    let value = serde_json::to_value(record).map_err(|e| RemoteError::Decode(e.to_string()))?;
    match value {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        _ => Err(RemoteError::Decode("record is not an object".to_string())),
    }
}

/// A merge patch carrying a fresh `updatedAt` stamp.
pub(crate) fn stamped_patch(entries: Vec<(&str, Value)>) -> Map<String, Value> {
    let mut patch = Map::new();
    for (key, value) in entries {
        patch.insert(key.to_string(), value);
    }
    patch.insert("updatedAt".to_string(), Value::from(now_millis()));
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroceryItem, Unit};
    use serde_json::json;

    #[test]
    fn test_decode_folds_id_into_record() {
        let item = GroceryItem::new("fam-1", "Milk").with_quantity(2.0, Unit::Ltr);
        let fields = to_fields(&item).unwrap();
        let doc = Document::new("doc-7", fields);

        let decoded: GroceryItem = decode(doc).unwrap();
        assert_eq!(decoded.id, "doc-7");
        assert_eq!(decoded.name, "Milk");
        assert_eq!(decoded.unit, Unit::Ltr);
    }

    #[test]
    fn test_to_fields_drops_id() {
        let mut item = GroceryItem::new("fam-1", "Milk");
        item.id = "doc-7".to_string();
        let fields = to_fields(&item).unwrap();
        assert!(fields.get("id").is_none());
        assert_eq!(fields["familyId"], "fam-1");
    }

    #[test]
    fn test_decode_lossy_skips_malformed() {
        let good = Document::new("a", to_fields(&GroceryItem::new("fam-1", "Milk")).unwrap());
        let mut bad_fields = Map::new();
        bad_fields.insert("name".to_string(), json!("no other fields"));
        let bad = Document::new("b", bad_fields);

        let decoded: Vec<GroceryItem> = decode_lossy(vec![good, bad]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, "a");
    }

    #[test]
    fn test_stamped_patch_includes_updated_at() {
        let patch = stamped_patch(vec![("checked", json!(true))]);
        assert_eq!(patch["checked"], true);
        assert!(patch["updatedAt"].is_i64());
    }
}
