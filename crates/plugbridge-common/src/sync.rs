//! Keyed caching and locking primitives shared by the provisioner and the
//! domain factory.
//!
//! Both types hand out one slot per key. The outer map lock is only held long
//! enough to find or create the slot, so work for distinct keys never
//! serialises behind a slow initialiser for another key.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

type Slot<V> = Arc<Mutex<Option<V>>>;

/// A map whose values are computed at most once per key.
///
/// Concurrent callers asking for the same key block on that key's slot; the
/// first caller runs the initialiser and the rest observe its value. A failed
/// initialiser leaves the slot empty so a later caller may try again.
pub struct OnceMap<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for OnceMap<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value for `key` if it has been initialised.
    pub fn get(&self, key: &K) -> Option<V> {
        let slot = self.slots.lock().get(key).cloned()?;
        let value = slot.lock();
        value.clone()
    }

    /// Get the value for `key`, running `init` if no value exists yet.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: K,
        init: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        loop {
            let slot = self.slot(key.clone());
            let mut value = slot.lock();
            if let Some(existing) = value.as_ref() {
                return Ok(existing.clone());
            }
            // The slot was removed while we waited on it.
            if !self.is_current(&key, &slot) {
                continue;
            }

            let created = init()?;
            *value = Some(created.clone());
            return Ok(created);
        }
    }

    /// Infallible variant of [`OnceMap::get_or_try_insert_with`].
    pub fn get_or_insert_with(&self, key: K, init: impl FnOnce() -> V) -> V {
        match self.get_or_try_insert_with(key, || Ok::<V, std::convert::Infallible>(init())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Remove the value for `key`, returning it if it was initialised.
    ///
    /// Waits for an initialiser already running for `key`, so its value is
    /// the one removed rather than stored in a detached slot.
    pub fn remove(&self, key: &K) -> Option<V> {
        let slot = self.slots.lock().get(key).cloned()?;
        let mut value = slot.lock();
        let mut slots = self.slots.lock();
        if self.is_same_slot(&slots, key, &slot) {
            slots.remove(key);
        }
        value.take()
    }

    /// Number of initialised entries.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<V>> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    /// Whether no entry has been initialised.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: K) -> Slot<V> {
        let mut slots = self.slots.lock();
        slots.entry(key).or_default().clone()
    }

    fn is_current(&self, key: &K, slot: &Slot<V>) -> bool {
        let slots = self.slots.lock();
        self.is_same_slot(&slots, key, slot)
    }

    fn is_same_slot(&self, slots: &HashMap<K, Slot<V>>, key: &K, slot: &Slot<V>) -> bool {
        slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot))
    }
}

/// Mutual exclusion scoped to a key.
pub struct KeyedMutex<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash,
{
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<R>(&self, key: K, f: impl FnOnce() -> R) -> R {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(key).or_default().clone()
        };
        let _guard = lock.lock();
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_once_map_initialises_once_under_contention() {
        let map: Arc<OnceMap<String, Arc<usize>>> = Arc::new(OnceMap::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let map = map.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    map.get_or_insert_with("key".to_string(), || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(20));
                        Arc::new(7)
                    })
                })
            })
            .collect();

        let values: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_once_map_failed_init_can_be_retried() {
        let map: OnceMap<&str, u32> = OnceMap::new();

        let first: Result<u32, &str> = map.get_or_try_insert_with("a", || Err("boom"));
        assert_eq!(first, Err("boom"));
        assert!(map.get(&"a").is_none());
        assert!(map.is_empty());

        let second: Result<u32, &str> = map.get_or_try_insert_with("a", || Ok(3));
        assert_eq!(second, Ok(3));
        assert_eq!(map.get(&"a"), Some(3));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_once_map_remove() {
        let map: OnceMap<u8, u8> = OnceMap::new();
        map.get_or_insert_with(1, || 10);
        assert_eq!(map.remove(&1), Some(10));
        assert_eq!(map.remove(&1), None);
        assert_eq!(map.get_or_insert_with(1, || 11), 11);
    }

    #[test]
    fn test_once_map_remove_waits_for_running_init() {
        use std::sync::mpsc;

        let map: Arc<OnceMap<u8, Arc<u8>>> = Arc::new(OnceMap::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let builder = {
            let map = map.clone();
            thread::spawn(move || {
                map.get_or_insert_with(1, || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Arc::new(1)
                })
            })
        };
        started_rx.recv().unwrap();

        let remover = {
            let map = map.clone();
            thread::spawn(move || map.remove(&1))
        };
        thread::sleep(std::time::Duration::from_millis(20));
        release_tx.send(()).unwrap();

        let built = builder.join().unwrap();
        let removed = remover.join().unwrap().unwrap();
        assert!(Arc::ptr_eq(&built, &removed));
        assert!(map.is_empty());

        let rebuilt = map.get_or_insert_with(1, || Arc::new(2));
        assert_eq!(*rebuilt, 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_keyed_mutex_serialises_same_key() {
        let locks: Arc<KeyedMutex<&'static str>> = Arc::new(KeyedMutex::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                thread::spawn(move || {
                    locks.with_lock("dir", || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
