//! Entity record model and timestamp codec.
//!
//! Business records (transactions, clients, invoices, ...) are schemaless
//! maps with three reserved fields: `id`, `updatedAt`, and the optional
//! `deleted`/`deletedAt` tombstone pair. Remote stores hand back timestamps
//! in several shapes (epoch millis, ISO strings, server timestamp handles),
//! so everything is decoded once into [`Timestamp`] at the boundary and
//! compared as plain milliseconds afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schemaless JSON object used for record fields and the config scalar.
pub type JsonMap = serde_json::Map<String, Value>;

/// Company profile scalar; one per workspace, shallow-merge semantics.
pub type ConfigRecord = JsonMap;

/// Alternate id fields accepted when `id` is absent.
const ID_FALLBACK_FIELDS: [&str; 2] = ["uid", "key"];

/// Domain date field used to derive `updatedAt` when it is missing.
const DATE_FALLBACK_FIELD: &str = "fecha";

/// A write timestamp in one of the shapes seen on the wire.
///
/// Decoded once from raw JSON; comparisons always go through
/// [`Timestamp::as_millis`]. Unparseable input degrades to 0 rather than
/// failing, because timestamp loss must never block a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    /// Epoch milliseconds.
    Millis(i64),
    /// ISO-8601 date or datetime string (numeric strings also accepted).
    Iso(String),
    /// Server-generated handle exposing seconds since epoch.
    Seconds(i64),
    /// Absent or unrecognized shape.
    Missing,
}

impl Timestamp {
    /// Decode a raw JSON value into a timestamp.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(number) => number.as_i64().map_or(Self::Missing, Self::Millis),
            Value::String(text) => Self::Iso(text.clone()),
            Value::Object(map) => {
                // Server timestamp handles expose either a milliseconds
                // accessor or a seconds-since-epoch field.
                if let Some(millis) = map.get("milliseconds").and_then(Value::as_i64) {
                    Self::Millis(millis)
                } else if let Some(seconds) = map.get("seconds").and_then(Value::as_i64) {
                    Self::Seconds(seconds)
                } else {
                    Self::Missing
                }
            }
            _ => Self::Missing,
        }
    }

    /// Comparable epoch milliseconds; 0 for missing/unparseable input.
    #[must_use]
    pub fn as_millis(&self) -> i64 {
        match self {
            Self::Millis(millis) => *millis,
            Self::Seconds(seconds) => seconds.saturating_mul(1000),
            Self::Iso(text) => parse_date_text(text),
            Self::Missing => 0,
        }
    }
}

fn parse_date_text(text: &str) -> i64 {
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(text) {
        return datetime.timestamp_millis();
    }
    // Timezone-less datetimes are treated as UTC.
    if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return datetime.and_utc().timestamp_millis();
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map_or(0, |datetime| datetime.and_utc().timestamp_millis());
    }
    text.parse::<i64>().unwrap_or(0)
}

/// Normalize a heterogeneous timestamp value into epoch milliseconds.
#[must_use]
pub fn normalize_timestamp(value: &Value) -> i64 {
    Timestamp::from_value(value).as_millis()
}

/// A mutable business record with reserved sync fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRecord {
    fields: JsonMap,
}

impl EntityRecord {
    #[must_use]
    pub const fn from_map(fields: JsonMap) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn into_map(self) -> JsonMap {
        self.fields
    }

    #[must_use]
    pub const fn fields(&self) -> &JsonMap {
        &self.fields
    }

    /// Read a raw field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a raw field value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// The stable document id, accepting `uid`/`key` as fallbacks.
    ///
    /// Returns `None` for records without a usable id; such records are
    /// rejected from persistence (logged, never fatal to a batch).
    #[must_use]
    pub fn doc_id(&self) -> Option<String> {
        let raw = self.fields.get("id").or_else(|| {
            ID_FALLBACK_FIELDS
                .iter()
                .find_map(|field| self.fields.get(*field))
        })?;
        let id = match raw {
            Value::String(text) => text.trim().to_string(),
            Value::Number(number) => number.to_string(),
            _ => return None,
        };
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    /// Normalized `updatedAt`, falling back to the domain date field.
    #[must_use]
    pub fn updated_at_millis(&self) -> i64 {
        let updated_at = self
            .fields
            .get("updatedAt")
            .map_or(0, |value| normalize_timestamp(value));
        if updated_at != 0 {
            return updated_at;
        }
        self.fields
            .get(DATE_FALLBACK_FIELD)
            .map_or(0, |value| normalize_timestamp(value))
    }

    /// Guarantee a non-null `updatedAt`, deriving it from the domain date
    /// field, else the supplied wall clock. Never fails.
    pub fn ensure_updated_at(&mut self, now_ms: i64) {
        let existing = self
            .fields
            .get("updatedAt")
            .map_or(0, |value| normalize_timestamp(value));
        if existing != 0 {
            return;
        }
        let derived = self
            .fields
            .get(DATE_FALLBACK_FIELD)
            .map_or(0, |value| normalize_timestamp(value));
        let stamp = if derived != 0 { derived } else { now_ms };
        self.fields.insert("updatedAt".to_string(), stamp.into());
    }

    /// Bump `updatedAt` to the supplied wall clock.
    pub fn touch(&mut self, now_ms: i64) {
        self.fields.insert("updatedAt".to_string(), now_ms.into());
    }

    /// Whether this record carries a tombstone.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.fields
            .get("deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Flag the record as deleted without removing it, so the deletion
    /// propagates through the same merge path as edits.
    pub fn tombstone(&mut self, now_ms: i64) {
        self.fields.insert("deleted".to_string(), true.into());
        self.fields.insert("deletedAt".to_string(), now_ms.into());
        self.touch(now_ms);
    }

    /// Backfill the `id` field from an externally known document id.
    pub fn with_doc_id(mut self, doc_id: &str) -> Self {
        if self.doc_id().is_none() {
            self.fields
                .insert("id".to_string(), Value::String(doc_id.to_string()));
        }
        self
    }
}

impl From<JsonMap> for EntityRecord {
    fn from(fields: JsonMap) -> Self {
        Self::from_map(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> EntityRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn timestamp_decodes_epoch_millis() {
        assert_eq!(normalize_timestamp(&json!(1_700_000_000_000_i64)), 1_700_000_000_000);
    }

    #[test]
    fn timestamp_decodes_iso_datetime() {
        let millis = normalize_timestamp(&json!("2024-01-15T10:30:00Z"));
        assert_eq!(millis, 1_705_314_600_000);
    }

    #[test]
    fn timestamp_decodes_timezone_less_datetime() {
        assert_eq!(
            normalize_timestamp(&json!("2024-01-15T10:30:00")),
            1_705_314_600_000
        );
        assert_eq!(
            normalize_timestamp(&json!("2024-01-15T10:30:00.250")),
            1_705_314_600_250
        );
    }

    #[test]
    fn timestamp_decodes_plain_date() {
        let millis = normalize_timestamp(&json!("2024-01-15"));
        assert_eq!(millis, 1_705_276_800_000);
    }

    #[test]
    fn timestamp_decodes_numeric_string() {
        assert_eq!(normalize_timestamp(&json!("12345")), 12_345);
    }

    #[test]
    fn timestamp_decodes_server_handles() {
        assert_eq!(normalize_timestamp(&json!({ "seconds": 1_700_000_000_i64 })), 1_700_000_000_000);
        assert_eq!(normalize_timestamp(&json!({ "milliseconds": 42 })), 42);
    }

    #[test]
    fn timestamp_degrades_to_zero() {
        assert_eq!(normalize_timestamp(&json!(null)), 0);
        assert_eq!(normalize_timestamp(&json!("not a date")), 0);
        assert_eq!(normalize_timestamp(&json!({ "unexpected": true })), 0);
        assert_eq!(normalize_timestamp(&json!([1, 2, 3])), 0);
    }

    #[test]
    fn doc_id_accepts_fallback_fields() {
        assert_eq!(record(json!({ "id": "a1" })).doc_id().as_deref(), Some("a1"));
        assert_eq!(record(json!({ "uid": "u1" })).doc_id().as_deref(), Some("u1"));
        assert_eq!(record(json!({ "key": 7 })).doc_id().as_deref(), Some("7"));
    }

    #[test]
    fn doc_id_rejects_missing_or_empty() {
        assert_eq!(record(json!({ "monto": 100 })).doc_id(), None);
        assert_eq!(record(json!({ "id": "  " })).doc_id(), None);
        assert_eq!(record(json!({ "id": null })).doc_id(), None);
    }

    #[test]
    fn ensure_updated_at_keeps_existing_value() {
        let mut item = record(json!({ "id": "a", "updatedAt": 500 }));
        item.ensure_updated_at(9_999);
        assert_eq!(item.updated_at_millis(), 500);
    }

    #[test]
    fn ensure_updated_at_derives_from_fecha() {
        let mut item = record(json!({ "id": "a", "fecha": "2024-01-15" }));
        item.ensure_updated_at(9_999);
        assert_eq!(item.updated_at_millis(), 1_705_276_800_000);
    }

    #[test]
    fn ensure_updated_at_falls_back_to_wall_clock() {
        let mut item = record(json!({ "id": "a" }));
        item.ensure_updated_at(9_999);
        assert_eq!(item.updated_at_millis(), 9_999);
    }

    #[test]
    fn tombstone_flags_without_removing_fields() {
        let mut item = record(json!({ "id": "a", "monto": 100 }));
        item.tombstone(1_000);
        assert!(item.is_deleted());
        assert_eq!(item.get("monto"), Some(&json!(100)));
        assert_eq!(item.get("deletedAt"), Some(&json!(1_000)));
        assert_eq!(item.updated_at_millis(), 1_000);
    }
}
