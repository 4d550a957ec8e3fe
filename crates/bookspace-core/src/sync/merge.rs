//! Last-writer-wins merge of local and remote collection state.

use std::collections::HashMap;

use crate::models::{CollectionKind, ConfigRecord, EntityRecord, WorkspaceData};

/// Union two arrays of the same entity type, deduplicated by id, keeping
/// the record with the strictly greater normalized `updatedAt`. Local
/// wins ties. Tombstoned records participate in the same comparison, so
/// delete and edit are symmetric with respect to time.
///
/// The result is deterministic for a given candidate set regardless of
/// which side delivered which record. O(n) in total record count.
///
/// This is last-writer-wins at record granularity, not field granularity:
/// callers must bump `updatedAt` on every mutation.
#[must_use]
pub fn merge_records(local: &[EntityRecord], remote: &[EntityRecord]) -> Vec<EntityRecord> {
    let mut merged: Vec<EntityRecord> = Vec::with_capacity(local.len() + remote.len());
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(local.len() + remote.len());

    // Records without a usable id cannot be reconciled and are dropped.
    for item in local {
        let Some(id) = item.doc_id() else { continue };
        if !slots.contains_key(&id) {
            slots.insert(id, merged.len());
            merged.push(item.clone());
        }
    }

    for item in remote {
        let Some(id) = item.doc_id() else { continue };
        match slots.get(&id) {
            None => {
                slots.insert(id, merged.len());
                merged.push(item.clone());
            }
            Some(&slot) => {
                if item.updated_at_millis() > merged[slot].updated_at_millis() {
                    merged[slot] = item.clone();
                }
            }
        }
    }

    merged
}

/// Shallow right-biased merge of the config scalar; config has no
/// per-field timestamp, so remote is assumed fresher when a pull invokes
/// this.
#[must_use]
pub fn merge_config(local: &ConfigRecord, remote: &ConfigRecord) -> ConfigRecord {
    let mut merged = local.clone();
    for (field, value) in remote {
        merged.insert(field.clone(), value.clone());
    }
    merged
}

/// Merge every collection plus the config scalar.
#[must_use]
pub fn merge_workspace(local: &WorkspaceData, remote: &WorkspaceData) -> WorkspaceData {
    let mut merged = WorkspaceData::default();
    for kind in CollectionKind::ALL {
        *merged.collection_mut(kind) = merge_records(local.collection(kind), remote.collection(kind));
    }
    merged.config = merge_config(&local.config, &remote.config);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: serde_json::Value) -> EntityRecord {
        serde_json::from_value(value).unwrap()
    }

    fn ids(items: &[EntityRecord]) -> Vec<String> {
        let mut ids: Vec<String> = items.iter().filter_map(EntityRecord::doc_id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn disjoint_ids_commute_as_sets() {
        let a = vec![record(json!({ "id": "1", "updatedAt": 10 }))];
        let b = vec![
            record(json!({ "id": "2", "updatedAt": 20 })),
            record(json!({ "id": "3", "updatedAt": 30 })),
        ];

        assert_eq!(ids(&merge_records(&a, &b)), ids(&merge_records(&b, &a)));
        assert_eq!(merge_records(&a, &b).len(), 3);
    }

    #[test]
    fn strictly_newer_remote_wins() {
        let local = vec![record(json!({ "id": "1", "monto": 100, "updatedAt": 100 }))];
        let remote = vec![record(json!({ "id": "1", "monto": 150, "updatedAt": 200 }))];

        let merged = merge_records(&local, &remote);
        assert_eq!(merged, remote);

        // Reversing which side is "local" with swapped stamps reverses
        // the winner.
        let local = vec![record(json!({ "id": "1", "monto": 100, "updatedAt": 200 }))];
        let remote = vec![record(json!({ "id": "1", "monto": 150, "updatedAt": 100 }))];
        assert_eq!(merge_records(&local, &remote), local);
    }

    #[test]
    fn local_wins_timestamp_ties() {
        let local = vec![record(json!({ "id": "1", "monto": 1, "updatedAt": 500 }))];
        let remote = vec![record(json!({ "id": "1", "monto": 2, "updatedAt": 500 }))];
        assert_eq!(merge_records(&local, &remote), local);
    }

    #[test]
    fn later_tombstone_beats_earlier_edit() {
        let local = vec![record(json!({ "id": "5", "deleted": true, "updatedAt": 300 }))];
        let remote = vec![record(json!({ "id": "5", "deleted": false, "updatedAt": 200 }))];

        let merged = merge_records(&local, &remote);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_deleted());

        // And the reverse: a later edit resurrects over an earlier
        // tombstone.
        let merged = merge_records(&remote, &local);
        assert!(merged[0].is_deleted());
        let local = vec![record(json!({ "id": "5", "deleted": false, "updatedAt": 400 }))];
        let remote = vec![record(json!({ "id": "5", "deleted": true, "updatedAt": 300 }))];
        assert!(!merge_records(&local, &remote)[0].is_deleted());
    }

    #[test]
    fn fecha_is_a_timestamp_fallback_during_comparison() {
        let local = vec![record(json!({ "id": "1", "monto": 1, "fecha": "2024-01-10" }))];
        let remote = vec![record(json!({ "id": "1", "monto": 2, "fecha": "2024-02-10" }))];
        let merged = merge_records(&local, &remote);
        assert_eq!(merged[0].get("monto"), Some(&json!(2)));
    }

    #[test]
    fn records_without_id_are_dropped() {
        let local = vec![record(json!({ "monto": 1 }))];
        let remote = vec![record(json!({ "id": "1", "monto": 2 }))];
        let merged = merge_records(&local, &remote);
        assert_eq!(ids(&merged), vec!["1".to_string()]);
    }

    #[test]
    fn config_merge_is_right_biased() {
        let local: ConfigRecord =
            serde_json::from_value(json!({ "empresa": "Bookspace", "tel": "111" })).unwrap();
        let remote: ConfigRecord =
            serde_json::from_value(json!({ "tel": "222", "rfc": "XYZ" })).unwrap();

        let merged = merge_config(&local, &remote);
        assert_eq!(merged.get("empresa"), Some(&json!("Bookspace")));
        assert_eq!(merged.get("tel"), Some(&json!("222")));
        assert_eq!(merged.get("rfc"), Some(&json!("XYZ")));
    }

    #[test]
    fn workspace_merge_covers_every_collection() {
        let mut local = WorkspaceData::default();
        let mut remote = WorkspaceData::default();
        for kind in CollectionKind::ALL {
            local
                .collection_mut(kind)
                .push(record(json!({ "id": "l", "updatedAt": 1 })));
            remote
                .collection_mut(kind)
                .push(record(json!({ "id": "r", "updatedAt": 2 })));
        }

        let merged = merge_workspace(&local, &remote);
        assert_eq!(merged.record_count(), CollectionKind::ALL.len() * 2);
    }
}
