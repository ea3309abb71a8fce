//! In-memory store and catalog

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{CardCatalog, Result, ReviewStore, StorageError};
use crate::memory::{CardId, CardMemoryState, LearningState, ReviewStats};

/// Review store and card catalog held in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    cards: RwLock<HashSet<CardId>>,
    states: RwLock<HashMap<CardId, CardMemoryState>>,
}

fn poisoned(which: &str) -> StorageError {
    StorageError::Init(format!("{} lock poisoned", which))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the given cards already registered
    pub fn with_cards<I, T>(cards: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<CardId>,
    {
        Self {
            cards: RwLock::new(cards.into_iter().map(Into::into).collect()),
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Add a card to the catalog; returns false if it was already present
    pub fn register_card(&self, card_id: impl Into<CardId>) -> Result<bool> {
        let mut cards = self.cards.write().map_err(|_| poisoned("Catalog"))?;
        Ok(cards.insert(card_id.into()))
    }

    /// Remove a card and its review record
    pub fn remove_card(&self, card_id: &CardId) -> Result<bool> {
        let removed = {
            let mut cards = self.cards.write().map_err(|_| poisoned("Catalog"))?;
            cards.remove(card_id)
        };
        let mut states = self.states.write().map_err(|_| poisoned("State"))?;
        states.remove(card_id);
        Ok(removed)
    }

    /// Number of stored review records
    pub fn len(&self) -> Result<usize> {
        Ok(self.states.read().map_err(|_| poisoned("State"))?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> Result<ReviewStats> {
        let total_cards = self.cards.read().map_err(|_| poisoned("Catalog"))?.len() as i64;
        let states = self.states.read().map_err(|_| poisoned("State"))?;

        let mut stats = ReviewStats {
            total_cards,
            ..Default::default()
        };
        for state in states.values() {
            match state.state {
                LearningState::Learning { .. } => stats.learning += 1,
                LearningState::Review => stats.review += 1,
                LearningState::Relearning { .. } => stats.relearning += 1,
                LearningState::New => {}
            }
            if state.is_due(now) {
                stats.due_now += 1;
            }
        }
        Ok(stats)
    }
}

impl ReviewStore for InMemoryStore {
    fn get(&self, card_id: &CardId) -> Result<Option<CardMemoryState>> {
        let states = self.states.read().map_err(|_| poisoned("State"))?;
        Ok(states.get(card_id).cloned())
    }

    fn upsert(&self, card_id: &CardId, state: &CardMemoryState) -> Result<()> {
        let mut states = self.states.write().map_err(|_| poisoned("State"))?;
        states.insert(card_id.clone(), state.clone());
        Ok(())
    }

    fn due(&self, now: DateTime<Utc>, limit: usize, offset: usize) -> Result<Vec<CardMemoryState>> {
        let states = self.states.read().map_err(|_| poisoned("State"))?;
        let mut due: Vec<CardMemoryState> = states
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.due.cmp(&b.due).then_with(|| a.card_id.cmp(&b.card_id)));
        Ok(due.into_iter().skip(offset).take(limit).collect())
    }
}

impl CardCatalog for InMemoryStore {
    fn contains_card(&self, card_id: &CardId) -> Result<bool> {
        let cards = self.cards.read().map_err(|_| poisoned("Catalog"))?;
        Ok(cards.contains(card_id))
    }
}
