use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{ReadingRepository, new_share_slug};
use crate::models::{Interpretation, Reading};

type InterpretationKey = (String, String, String, bool);
type DetailsKey = (String, String, bool);

#[derive(Default)]
struct Store {
    readings: HashMap<String, Reading>,
    interpretations: HashMap<InterpretationKey, Interpretation>,
    details: HashMap<DetailsKey, Vec<String>>,
    slug_to_id: HashMap<String, String>,
    id_to_slug: HashMap<String, String>,
}

/// Process-local reading storage, lost on restart
#[derive(Default)]
pub struct MemoryReadingRepository {
    store: Mutex<Store>,
}

impl MemoryReadingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| anyhow!("reading store lock poisoned"))
    }
}

impl ReadingRepository for MemoryReadingRepository {
    #[instrument(skip(self, reading))]
    fn create(&self, mut reading: Reading) -> Result<Reading> {
        let id = Uuid::new_v4().to_string();
        reading.id = Some(id.clone());
        self.lock()?.readings.insert(id.clone(), reading.clone());
        debug!("Stored reading {}", id);
        Ok(reading)
    }

    fn get(&self, id: &str) -> Result<Option<Reading>> {
        Ok(self.lock()?.readings.get(id).cloned())
    }

    fn get_interpretation(&self, id: &str, lang: &str, style: &str, use_llm: bool) -> Result<Option<Interpretation>> {
        let key = (id.to_string(), lang.to_string(), style.to_string(), use_llm);
        Ok(self.lock()?.interpretations.get(&key).cloned())
    }

    fn save_interpretation(&self, interpretation: &Interpretation, lang: &str, style: &str, use_llm: bool) -> Result<()> {
        let key = (interpretation.id.clone(), lang.to_string(), style.to_string(), use_llm);
        self.lock()?.interpretations.insert(key, interpretation.clone());
        Ok(())
    }

    fn get_details(&self, id: &str, lang: &str, use_llm: bool) -> Result<Option<Vec<String>>> {
        let key = (id.to_string(), lang.to_string(), use_llm);
        Ok(self.lock()?.details.get(&key).cloned())
    }

    fn save_details(&self, id: &str, lang: &str, use_llm: bool, details: &[String]) -> Result<()> {
        let key = (id.to_string(), lang.to_string(), use_llm);
        self.lock()?.details.insert(key, details.to_vec());
        Ok(())
    }

    #[instrument(skip(self))]
    fn create_share_slug(&self, id: &str) -> Result<String> {
        let mut store = self.lock()?;
        if let Some(existing) = store.id_to_slug.get(id) {
            return Ok(existing.clone());
        }
        if !store.readings.contains_key(id) {
            return Err(anyhow!("reading {} not found", id));
        }

        let mut slug = new_share_slug();
        while store.slug_to_id.contains_key(&slug) {
            slug = new_share_slug();
        }
        store.slug_to_id.insert(slug.clone(), id.to_string());
        store.id_to_slug.insert(id.to_string(), slug.clone());
        Ok(slug)
    }

    fn resolve_share_slug(&self, slug: &str) -> Result<Option<String>> {
        Ok(self.lock()?.slug_to_id.get(slug).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Card, DrawnCard, GroupOrder};

    fn reading() -> Reading {
        let items = vec![DrawnCard {
            position: 1,
            is_reversed: true,
            card: Card::new(13, "Death", "Major Arcana"),
        }];
        Reading::new("What ends?".to_string(), GroupOrder::ALL.to_vec(), items)
    }

    fn interpretation(id: &str, summary: &str) -> Interpretation {
        Interpretation {
            id: id.to_string(),
            lang: "en".to_string(),
            summary: summary.to_string(),
            positions: vec![],
            advices: vec!["a".to_string()],
            llm_used: false,
            sections: None,
        }
    }

    #[test]
    fn test_create_assigns_id() {
        let repo = MemoryReadingRepository::new();
        let saved = repo.create(reading()).unwrap();
        let id = saved.id.clone().unwrap();

        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(repo.get(&id).unwrap(), Some(saved));
        assert!(repo.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_interpretation_cache_is_keyed() {
        let repo = MemoryReadingRepository::new();
        let id = repo.create(reading()).unwrap().get_id();

        repo.save_interpretation(&interpretation(&id, "local"), "en", "concise", false)
            .unwrap();

        assert_eq!(
            repo.get_interpretation(&id, "en", "concise", false).unwrap().unwrap().summary,
            "local"
        );
        assert!(repo.get_interpretation(&id, "en", "concise", true).unwrap().is_none());
        assert!(repo.get_interpretation(&id, "ko", "concise", false).unwrap().is_none());
        assert!(repo.get_interpretation(&id, "en", "long", false).unwrap().is_none());

        // Saving again overwrites
        repo.save_interpretation(&interpretation(&id, "again"), "en", "concise", false)
            .unwrap();
        assert_eq!(
            repo.get_interpretation(&id, "en", "concise", false).unwrap().unwrap().summary,
            "again"
        );
    }

    #[test]
    fn test_details_cache() {
        let repo = MemoryReadingRepository::new();
        let details = vec!["one".to_string(), "two".to_string()];
        repo.save_details("r", "ja", true, &details).unwrap();

        assert_eq!(repo.get_details("r", "ja", true).unwrap(), Some(details));
        assert!(repo.get_details("r", "ja", false).unwrap().is_none());
    }

    #[test]
    fn test_share_slug_is_idempotent_and_resolves() {
        let repo = MemoryReadingRepository::new();
        let id = repo.create(reading()).unwrap().get_id();

        let slug = repo.create_share_slug(&id).unwrap();
        assert_eq!(repo.create_share_slug(&id).unwrap(), slug);
        assert_eq!(repo.resolve_share_slug(&slug).unwrap(), Some(id));
        assert!(repo.resolve_share_slug("0-nope00").unwrap().is_none());
    }

    #[test]
    fn test_share_slug_for_unknown_reading_fails() {
        let repo = MemoryReadingRepository::new();
        assert!(repo.create_share_slug("missing").is_err());
    }
}
