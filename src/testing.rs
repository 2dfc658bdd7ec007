//! Test doubles shared by the unit tests

use std::cell::{Cell, RefCell};

use crate::{
    models::store::Store,
    notifier::Notifier,
    storage::{Storage, StorageError},
};

/// Storage that keeps nothing and only counts saves
#[derive(Default)]
pub struct MemoryStorage {
    saves: Cell<usize>,
}

impl MemoryStorage {
    pub fn saves(&self) -> usize {
        self.saves.get()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Store, StorageError> {
        Ok(Store::default())
    }

    fn save(&self, _store: &Store) -> Result<(), StorageError> {
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

/// Notifier that records every message and fails for chosen destinations
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<(String, String)>>,
    pub failing: Vec<String>,
}

impl RecordingNotifier {
    pub fn failing_for(destination: &str) -> Self {
        Self {
            failing: vec![destination.to_string()],
            ..Self::default()
        }
    }

    pub fn messages_to(&self, destination: &str) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, message: &str, destination: &str) -> bool {
        self.sent
            .borrow_mut()
            .push((destination.to_string(), message.to_string()));
        !self.failing.iter().any(|d| d == destination)
    }
}
