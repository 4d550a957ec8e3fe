//! One-time migration from the legacy single-document schema.
//!
//! Older builds stored every collection inline in one document per user.
//! Before the first read, that document is copied into the per-collection
//! layout through the normal write path, then flagged. The legacy
//! document is never deleted, so the migration stays reversible; because
//! writes are idempotent upserts, a re-run after a partially applied
//! migration is redundant but harmless.

use serde_json::Value;

use super::gateway::{CollectionGateway, LEGACY_COLLECTION};
use crate::error::Result;
use crate::models::{CollectionKind, EntityRecord, JsonMap, UserId, WorkspaceData};

const MIGRATED_FLAG: &str = "migrated";

/// Migrate `owner`'s legacy document into the per-collection layout.
/// Idempotent: a set flag or a missing legacy document is a no-op.
pub async fn migrate_legacy(gateway: &CollectionGateway, owner: &UserId) -> Result<()> {
    let Some(legacy) = gateway
        .store()
        .read_document(LEGACY_COLLECTION, owner.as_str())
        .await?
    else {
        return Ok(());
    };

    if legacy
        .get(MIGRATED_FLAG)
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return Ok(());
    }

    tracing::info!(owner = %owner, "migrating legacy single-document data");
    let data = decode_legacy(&legacy);
    let version = gateway.server_time_millis();
    gateway.push_workspace(owner, &data, version).await?;

    let mut flag = JsonMap::new();
    flag.insert(MIGRATED_FLAG.to_string(), true.into());
    flag.insert("migratedAt".to_string(), version.into());
    gateway
        .store()
        .upsert_document(LEGACY_COLLECTION, owner.as_str(), flag)
        .await?;
    Ok(())
}

fn decode_legacy(legacy: &JsonMap) -> WorkspaceData {
    let mut data = WorkspaceData::default();
    for kind in CollectionKind::ALL {
        if let Some(Value::Array(items)) = legacy.get(kind.as_str()) {
            *data.collection_mut(kind) = items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(EntityRecord::from_map(map.clone())),
                    _ => None,
                })
                .collect();
        }
    }
    if let Some(Value::Object(config)) = legacy.get("config") {
        data.config = config.clone();
    }
    data
}
