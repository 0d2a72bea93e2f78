use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Stable, opaque identifier of one media item in the asset source
pub type AssetId = String;

/// Asset ID → epoch seconds at which the asset was marked "keep"
pub type KeptRecord = HashMap<AssetId, f64>;

/// Asset IDs whose media has been (or will be) removed
pub type DeletedSet = HashSet<AssetId>;

/// Field names shared by the durable mapping store and the remote record
pub mod keys {
    pub const KEPT_IMAGES: &str = "keptImages";
    pub const DELETED_IMAGES: &str = "deletedImages";
    pub const DELETED_COUNT: &str = "deletedCount";
    pub const FREED_SPACE: &str = "freedSpace";
    pub const RESET_TIMESTAMP: &str = "resetTimestamp";
    pub const SYNC_ENABLED: &str = "syncEnabled";
    pub const MODIFIED_BY: &str = "modifiedBy";
    pub const MODIFIED_AT: &str = "modifiedAt";
}

/// Current time as floating-point seconds since the Unix epoch
pub fn epoch_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Complete unit of decision state exchanged with the remote store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub kept_record: KeptRecord,
    pub deleted_set: DeletedSet,
    pub deleted_count: i64,
    pub freed_space_bytes: i64,

    /// Epoch seconds of the last deliberate remote reset, `0.0` if none
    pub reset_timestamp: f64,
}

impl SyncSnapshot {
    /// An empty snapshot carrying a reset marker at `timestamp`
    pub fn reset_marker(timestamp: f64) -> Self {
        Self {
            reset_timestamp: timestamp,
            ..Self::default()
        }
    }

    /// True when the four data fields hold no decisions at all
    pub fn is_empty(&self) -> bool {
        self.kept_record.is_empty()
            && self.deleted_set.is_empty()
            && self.deleted_count == 0
            && self.freed_space_bytes == 0
    }

    /// True when this snapshot was deliberately cleared at `reset_timestamp`
    /// and nothing has been written since
    pub fn is_fresh_reset(&self) -> bool {
        self.is_empty() && self.reset_timestamp > 0.0
    }
}

/// Wire form of a [`SyncSnapshot`] as stored by a remote backend
///
/// Collection fields are stored as JSON-encoded strings so that backends
/// with string-typed fields can hold them. The record is kept as a raw field
/// bag: unknown fields written by other clients survive a round trip, and a
/// malformed field only degrades itself when decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRecord {
    fields: Map<String, Value>,
}

impl RemoteRecord {
    /// Build a record from scratch holding `snapshot`
    pub fn from_snapshot(snapshot: &SyncSnapshot) -> Self {
        let mut record = Self::default();
        record.set_data_fields(snapshot);
        record.fields.insert(
            keys::RESET_TIMESTAMP.to_string(),
            Value::from(snapshot.reset_timestamp),
        );
        record
    }

    /// Decode into a snapshot, replacing each unreadable field with its default
    pub fn decode(&self) -> SyncSnapshot {
        SyncSnapshot {
            kept_record: self.decode_collection(keys::KEPT_IMAGES),
            deleted_set: self
                .decode_collection::<Vec<AssetId>>(keys::DELETED_IMAGES)
                .into_iter()
                .collect(),
            deleted_count: self.decode_i64(keys::DELETED_COUNT),
            freed_space_bytes: self.decode_i64(keys::FREED_SPACE),
            reset_timestamp: self.decode_f64(keys::RESET_TIMESTAMP),
        }
    }

    /// Replace the four data fields with those of `merged`
    ///
    /// The stored reset timestamp is left as it is: only a reset moves it.
    pub fn with_merged(mut self, merged: &SyncSnapshot) -> Self {
        self.set_data_fields(merged);
        self
    }

    /// Clear the data fields and stamp a fresh reset marker
    pub fn with_reset(mut self, timestamp: f64) -> Self {
        self.set_data_fields(&SyncSnapshot::default());
        self.fields
            .insert(keys::RESET_TIMESTAMP.to_string(), Value::from(timestamp));
        self
    }

    /// Record which device wrote this record and when
    pub fn stamped_by(mut self, device_id: &str) -> Self {
        self.fields
            .insert(keys::MODIFIED_BY.to_string(), Value::from(device_id));
        self.fields.insert(
            keys::MODIFIED_AT.to_string(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        );
        self
    }

    /// Device that last wrote this record, if stamped
    pub fn modified_by(&self) -> Option<&str> {
        self.fields.get(keys::MODIFIED_BY).and_then(Value::as_str)
    }

    /// Raw access to one field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Overwrite one raw field
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    fn set_data_fields(&mut self, snapshot: &SyncSnapshot) {
        let mut deleted: Vec<&AssetId> = snapshot.deleted_set.iter().collect();
        deleted.sort();

        // Encoding plain maps and string vectors cannot fail
        let kept_json = serde_json::to_string(&snapshot.kept_record).unwrap_or_else(|_| "{}".into());
        let deleted_json = serde_json::to_string(&deleted).unwrap_or_else(|_| "[]".into());

        self.fields
            .insert(keys::KEPT_IMAGES.to_string(), Value::from(kept_json));
        self.fields
            .insert(keys::DELETED_IMAGES.to_string(), Value::from(deleted_json));
        self.fields.insert(
            keys::DELETED_COUNT.to_string(),
            Value::from(snapshot.deleted_count),
        );
        self.fields.insert(
            keys::FREED_SPACE.to_string(),
            Value::from(snapshot.freed_space_bytes),
        );
    }

    /// Collections are normally JSON strings; a native JSON value is accepted too
    fn decode_collection<T>(&self, name: &str) -> T
    where
        T: Default + serde::de::DeserializeOwned,
    {
        let decoded = match self.fields.get(name) {
            None | Some(Value::Null) => return T::default(),
            Some(Value::String(encoded)) => serde_json::from_str::<T>(encoded),
            Some(other) => serde_json::from_value::<T>(other.clone()),
        };

        decoded.unwrap_or_else(|e| {
            log::warn!("Remote field '{name}' is malformed, treating it as empty: {e}");
            T::default()
        })
    }

    fn decode_i64(&self, name: &str) -> i64 {
        match self.fields.get(name) {
            None | Some(Value::Null) => 0,
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_f64().map(|f| f as i64))
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
                .unwrap_or_else(|| {
                    log::warn!("Remote field '{name}' is malformed, treating it as 0");
                    0
                }),
        }
    }

    fn decode_f64(&self, name: &str) -> f64 {
        match self.fields.get(name) {
            None | Some(Value::Null) => 0.0,
            Some(value) => value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
                .filter(|f: &f64| f.is_finite())
                .unwrap_or_else(|| {
                    log::warn!("Remote field '{name}' is malformed, treating it as 0");
                    0.0
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_snapshot() -> SyncSnapshot {
        SyncSnapshot {
            kept_record: HashMap::from([("A".to_string(), 100.0), ("B".to_string(), 250.5)]),
            deleted_set: HashSet::from(["C".to_string(), "D".to_string()]),
            deleted_count: 2,
            freed_space_bytes: 4096,
            reset_timestamp: 42.0,
        }
    }

    #[test]
    fn test_record_stores_collections_as_json_strings() {
        let record = RemoteRecord::from_snapshot(&sample_snapshot());

        assert!(record.field(keys::KEPT_IMAGES).unwrap().is_string());
        assert_eq!(
            record.field(keys::DELETED_IMAGES),
            Some(&json!(r#"["C","D"]"#))
        );
        assert_eq!(record.field(keys::DELETED_COUNT), Some(&json!(2)));
        assert_eq!(record.decode(), sample_snapshot());
    }

    #[test]
    fn test_malformed_field_degrades_alone() {
        let mut record = RemoteRecord::from_snapshot(&sample_snapshot());
        record.set_field(keys::KEPT_IMAGES, json!("{not json"));
        record.set_field(keys::FREED_SPACE, json!({"nested": true}));

        let decoded = record.decode();

        assert!(decoded.kept_record.is_empty());
        assert_eq!(decoded.freed_space_bytes, 0);
        assert_eq!(decoded.deleted_set.len(), 2);
        assert_eq!(decoded.deleted_count, 2);
        assert_eq!(decoded.reset_timestamp, 42.0);
    }

    #[test]
    fn test_native_json_collections_are_accepted() {
        let record: RemoteRecord = serde_json::from_value(json!({
            "keptImages": {"X": 1000.0},
            "deletedImages": ["Y"],
            "deletedCount": "3",
            "freedSpace": 12.0,
        }))
        .unwrap();

        let decoded = record.decode();
        assert_eq!(decoded.kept_record.get("X"), Some(&1000.0));
        assert!(decoded.deleted_set.contains("Y"));
        assert_eq!(decoded.deleted_count, 3);
        assert_eq!(decoded.freed_space_bytes, 12);
        assert_eq!(decoded.reset_timestamp, 0.0);
    }

    #[test]
    fn test_with_merged_preserves_reset_timestamp_and_unknown_fields() {
        let mut record = RemoteRecord::from_snapshot(&SyncSnapshot::reset_marker(5000.0));
        record.set_field("mediaMuted", json!(true));

        let mut merged = sample_snapshot();
        merged.reset_timestamp = 0.0;
        let record = record.with_merged(&merged);

        assert_eq!(record.decode().reset_timestamp, 5000.0);
        assert_eq!(record.field("mediaMuted"), Some(&json!(true)));
        assert_eq!(record.decode().kept_record.len(), 2);
    }

    #[test]
    fn test_with_reset_clears_data() {
        let record = RemoteRecord::from_snapshot(&sample_snapshot())
            .with_reset(7000.0)
            .stamped_by("device-1");

        let decoded = record.decode();
        assert!(decoded.is_fresh_reset());
        assert_eq!(decoded.reset_timestamp, 7000.0);
        assert_eq!(record.modified_by(), Some("device-1"));
    }

    #[test]
    fn test_fresh_reset_requires_positive_timestamp() {
        assert!(!SyncSnapshot::default().is_fresh_reset());
        assert!(SyncSnapshot::reset_marker(1.0).is_fresh_reset());

        let mut touched = SyncSnapshot::reset_marker(1.0);
        touched.deleted_count = 1;
        assert!(!touched.is_fresh_reset());
    }
}
