mod sqlite;

pub mod config;

pub use sqlite::SettingsDb;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};

use crate::api::{ConnectionPayload, ExclusionsPayload, MappingsPayload};

const KEY_CONNECTION: &str = "connection";
const KEY_MAPPINGS: &str = "mappings";
const KEY_EXCLUSIONS: &str = "exclusions";

/// Point-in-time view of the enforcement configuration. The pipeline reads
/// one snapshot per request so a concurrent admin write cannot change the
/// rules halfway through a single evaluation.
#[derive(Debug, Default, Clone)]
pub struct SettingsSnapshot {
    pub subject_fields: HashSet<String>,
    pub resource_fields: HashMap<String, HashSet<String>>,
    pub excluded_types: HashSet<String>,
    pub connection: Option<ConnectionPayload>,
}

impl SettingsSnapshot {
    pub fn fields_for_type(&self, type_name: &str) -> Option<&HashSet<String>> {
        self.resource_fields
            .get(type_name)
            .filter(|fields| !fields.is_empty())
    }

    pub fn is_excluded(&self, type_name: &str) -> bool {
        self.excluded_types.contains(type_name)
    }
}

/// Persisted enforcement settings with an in-process read cache.
///
/// Every write goes to the database and invalidates the cache, so readers
/// always observe the latest committed configuration.
pub struct Settings {
    db: SettingsDb,
    cache: RwLock<Option<Arc<SettingsSnapshot>>>,
}

impl Settings {
    pub fn new(db: SettingsDb) -> Self {
        Self {
            db,
            cache: RwLock::new(None),
        }
    }

    pub fn snapshot(&self) -> Result<Arc<SettingsSnapshot>> {
        {
            let cache = self.cache.read().unwrap();
            if let Some(ref snapshot) = *cache {
                return Ok(snapshot.clone());
            }
        }

        let mut cache = self.cache.write().unwrap();
        // Another reader may have filled the cache while we waited
        if let Some(ref snapshot) = *cache {
            return Ok(snapshot.clone());
        }

        let snapshot = Arc::new(self.load_snapshot()?);
        *cache = Some(snapshot.clone());
        Ok(snapshot)
    }

    pub fn save_mappings(&self, payload: &MappingsPayload) -> Result<()> {
        let value = serde_json::to_string(payload).context("encode mappings")?;
        self.db.put(KEY_MAPPINGS, &value)?;
        self.invalidate();
        Ok(())
    }

    pub fn save_exclusions(&self, payload: &ExclusionsPayload) -> Result<()> {
        let value = serde_json::to_string(payload).context("encode exclusions")?;
        self.db.put(KEY_EXCLUSIONS, &value)?;
        self.invalidate();
        Ok(())
    }

    pub fn save_connection(&self, payload: &ConnectionPayload) -> Result<()> {
        let value = serde_json::to_string(payload).context("encode connection")?;
        self.db.put(KEY_CONNECTION, &value)?;
        self.invalidate();
        Ok(())
    }

    pub fn clear_connection(&self) -> Result<()> {
        self.db.delete(KEY_CONNECTION)?;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&self) {
        let mut cache = self.cache.write().unwrap();
        *cache = None;
    }

    fn load_snapshot(&self) -> Result<SettingsSnapshot> {
        let mut snapshot = SettingsSnapshot::default();

        if let Some(value) = self.db.get(KEY_MAPPINGS)? {
            let mappings: MappingsPayload =
                serde_json::from_str(&value).context("decode mappings")?;
            snapshot.subject_fields = mappings.subject_fields.into_iter().collect();
            snapshot.resource_fields = mappings
                .resource_fields
                .into_iter()
                .map(|(type_name, fields)| (type_name, fields.into_iter().collect()))
                .collect();
        }

        if let Some(value) = self.db.get(KEY_EXCLUSIONS)? {
            let exclusions: ExclusionsPayload =
                serde_json::from_str(&value).context("decode exclusions")?;
            snapshot.excluded_types = exclusions.types.into_iter().collect();
        }

        if let Some(value) = self.db.get(KEY_CONNECTION)? {
            let connection: ConnectionPayload =
                serde_json::from_str(&value).context("decode connection")?;
            snapshot.connection = Some(connection);
        }

        Ok(snapshot)
    }

    /// Rebuilds the admin-facing mappings payload with deterministic ordering.
    pub fn mappings(&self) -> Result<MappingsPayload> {
        let snapshot = self.snapshot()?;
        let mut subject_fields: Vec<String> =
            snapshot.subject_fields.iter().cloned().collect();
        subject_fields.sort();

        let mut resource_fields = HashMap::new();
        for (type_name, fields) in snapshot.resource_fields.iter() {
            let mut fields: Vec<String> = fields.iter().cloned().collect();
            fields.sort();
            resource_fields.insert(type_name.clone(), fields);
        }

        Ok(MappingsPayload {
            subject_fields,
            resource_fields,
        })
    }

    pub fn exclusions(&self) -> Result<ExclusionsPayload> {
        let snapshot = self.snapshot()?;
        let mut types: Vec<String> = snapshot.excluded_types.iter().cloned().collect();
        types.sort();
        Ok(ExclusionsPayload { types })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        Settings::new(SettingsDb::memory().unwrap())
    }

    #[test]
    fn test_empty_snapshot() {
        let settings = test_settings();
        let snapshot = settings.snapshot().unwrap();
        assert!(snapshot.subject_fields.is_empty());
        assert!(snapshot.resource_fields.is_empty());
        assert!(snapshot.excluded_types.is_empty());
        assert!(snapshot.connection.is_none());
    }

    #[test]
    fn test_write_invalidates_cache() {
        let settings = test_settings();

        // Prime the cache
        let before = settings.snapshot().unwrap();
        assert!(!before.is_excluded("comment"));

        settings
            .save_exclusions(&ExclusionsPayload {
                types: vec!["comment".to_string()],
            })
            .unwrap();

        // A fresh snapshot reflects the write immediately
        let after = settings.snapshot().unwrap();
        assert!(after.is_excluded("comment"));
        assert!(!before.is_excluded("comment"));
    }

    #[test]
    fn test_mappings_roundtrip() {
        let settings = test_settings();

        let payload = MappingsPayload {
            subject_fields: vec!["plan".to_string(), "department".to_string()],
            resource_fields: HashMap::from([(
                "article".to_string(),
                vec!["status".to_string()],
            )]),
        };
        settings.save_mappings(&payload).unwrap();

        let snapshot = settings.snapshot().unwrap();
        assert!(snapshot.subject_fields.contains("plan"));
        assert!(snapshot.subject_fields.contains("department"));
        assert!(snapshot
            .fields_for_type("article")
            .unwrap()
            .contains("status"));
        assert!(snapshot.fields_for_type("comment").is_none());

        // Read-back is sorted
        let mappings = settings.mappings().unwrap();
        assert_eq!(mappings.subject_fields, vec!["department", "plan"]);
    }

    #[test]
    fn test_connection_lifecycle() {
        let settings = test_settings();

        settings
            .save_connection(&ConnectionPayload {
                url: "http://localhost:7766".to_string(),
                token: "secret".to_string(),
            })
            .unwrap();
        let snapshot = settings.snapshot().unwrap();
        let connection = snapshot.connection.as_ref().unwrap();
        assert_eq!(connection.url, "http://localhost:7766");

        settings.clear_connection().unwrap();
        assert!(settings.snapshot().unwrap().connection.is_none());
    }

    #[test]
    fn test_empty_field_set_not_mapped() {
        let settings = test_settings();
        settings
            .save_mappings(&MappingsPayload {
                subject_fields: vec![],
                resource_fields: HashMap::from([("article".to_string(), vec![])]),
            })
            .unwrap();

        // A type mapped to an empty field list behaves as unmapped
        let snapshot = settings.snapshot().unwrap();
        assert!(snapshot.fields_for_type("article").is_none());
    }
}
