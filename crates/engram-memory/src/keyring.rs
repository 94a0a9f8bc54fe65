//! Chamber key resolution.
//!
//! Every record of a chamber is encrypted under the key of the chamber's
//! first participant. A malformed stored key is never used: it is replaced by
//! a freshly generated one, persisted, and reported loudly because whatever
//! was written under the old value cannot be read back.

use std::sync::Arc;

use engram_crypto::{ChamberKey, generate_key};
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::MemoryError;
use crate::store::SqliteStore;

#[derive(Clone)]
pub struct Keyring {
    store: Arc<SqliteStore>,
}

impl Keyring {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// Return the usable key of `chamber_id`, regenerating it if malformed.
    pub fn resolve(&self, chamber_id: Uuid) -> Result<ChamberKey, MemoryError> {
        let chamber = self
            .store
            .get_chamber(chamber_id)?
            .ok_or_else(|| MemoryError::chamber_not_found(chamber_id))?;
        let persona = chamber.first_participant().ok_or_else(|| {
            MemoryError::InvalidInput(format!("chamber {chamber_id} has no participants"))
        })?;

        match ChamberKey::parse(&persona.key) {
            Ok(key) => Ok(key),
            Err(e) => {
                let fresh = self.replace(chamber_id)?;
                error!(
                    chamber = %chamber_id,
                    persona = %persona.name,
                    reason = %e,
                    "stored chamber key was malformed and has been regenerated; \
                     messages encrypted under it are unrecoverable"
                );
                Ok(fresh)
            }
        }
    }

    /// Generate and persist a new first-participant key.
    pub fn replace(&self, chamber_id: Uuid) -> Result<ChamberKey, MemoryError> {
        let key = generate_key();
        if !self.store.set_first_participant_key(chamber_id, &key.encoded())? {
            warn!(chamber = %chamber_id, "no participant row to hold regenerated key");
            return Err(MemoryError::chamber_not_found(chamber_id));
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use engram_crypto::is_valid;
    use engram_types::{Chamber, MemoryMetadata, Persona};

    fn chamber_with_key(store: &SqliteStore, key: &str) -> Uuid {
        let chamber = Chamber {
            id: Uuid::new_v4(),
            name: "c".into(),
            participants: vec![Persona { name: "A".into(), key: key.into() }],
            created_at: Utc::now(),
        };
        store
            .insert_chamber(&chamber, &MemoryMetadata::new(chamber.id))
            .unwrap();
        chamber.id
    }

    #[test]
    fn valid_key_is_returned_untouched() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let encoded = generate_key().encoded();
        let id = chamber_with_key(&store, &encoded);
        let key = Keyring::new(store).resolve(id).unwrap();
        assert_eq!(key.encoded(), encoded);
    }

    #[test]
    fn uuid_shaped_key_is_regenerated_and_persisted() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let legacy = Uuid::new_v4().to_string();
        let id = chamber_with_key(&store, &legacy);

        let keyring = Keyring::new(Arc::clone(&store));
        let key = keyring.resolve(id).unwrap();

        let stored = store.get_chamber(id).unwrap().unwrap().participants[0].key.clone();
        assert_ne!(stored, legacy);
        assert!(is_valid(&stored));
        assert_eq!(key.encoded(), stored);
        // The persisted key is stable on the next lookup.
        assert_eq!(keyring.resolve(id).unwrap(), key);
    }

    #[test]
    fn unknown_chamber_is_not_found() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let err = Keyring::new(store).resolve(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, MemoryError::NotFound { kind: "chamber", .. }));
    }
}
