//! Lazily populated model cache with a load guard per key.
//!
//! The outer lock is held only long enough to find or create a key's slot.
//! Each slot has its own mutex, so concurrent first use of one key runs the
//! loader once while loads of other keys proceed in parallel. A failed load
//! leaves the slot empty and the next caller tries again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;

type Slot<T> = Arc<Mutex<Option<Arc<T>>>>;

pub struct ModelCache<T: ?Sized> {
    slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T: ?Sized> Default for ModelCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: ?Sized> ModelCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, running `load` if there is none yet.
    pub fn get_or_load<F>(&self, key: &str, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key.to_string()).or_default().clone()
        };

        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = entry.as_ref() {
            return Ok(Arc::clone(value));
        }

        let value = load()?;
        *entry = Some(Arc::clone(&value));
        Ok(value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.loaded_slot(key).is_some()
    }

    /// Number of successfully loaded entries.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<T>> = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.values().cloned().collect()
        };
        slots
            .iter()
            .filter(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn loaded_slot(&self, key: &str) -> Option<Arc<T>> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.get(key).cloned()?
        };
        let entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        entry.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TtsError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn test_loads_once_and_reuses() {
        let cache: ModelCache<str> = ModelCache::new();
        let loads = AtomicUsize::new(0);
        let load = || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::from("model"))
        };

        let first = cache.get_or_load("a", load).unwrap();
        let second = cache.get_or_load("a", load).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache: ModelCache<str> = ModelCache::new();

        let result = cache.get_or_load("a", || {
            Err(TtsError::BackendLoadFailure {
                model_id: "a".to_string(),
                reason: "disk on fire".to_string(),
            })
        });
        assert!(result.is_err());
        assert!(!cache.contains("a"));
        assert!(cache.is_empty());

        let retried = cache.get_or_load("a", || Ok(Arc::from("model"))).unwrap();
        assert_eq!(&*retried, "model");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let cache: ModelCache<str> = ModelCache::new();
        let loads = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    cache
                        .get_or_load("shared", || {
                            loads.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(20));
                            Ok(Arc::from("model"))
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }
}
