//! Per-city rolling reading buffers.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use aqcast_core::{City, PollutionReading};

pub const DEFAULT_CAPACITY: usize = 24;

#[derive(Debug, Default)]
struct CityBuffer {
    readings: VecDeque<PollutionReading>,
    /// Advisory only; nothing expires on it.
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferStats {
    pub city: City,
    pub size: usize,
    pub max_size: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Bounded FIFO of readings per city.
///
/// The outer map lock is held only long enough to find or create a city's
/// slot; appends and snapshots then lock that city alone.
#[derive(Debug)]
pub struct BufferManager {
    capacity: usize,
    inner: RwLock<HashMap<City, Arc<Mutex<CityBuffer>>>>,
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BufferManager {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot(&self, city: &City) -> Option<Arc<Mutex<CityBuffer>>> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(city).cloned()
    }

    fn slot_or_insert(&self, city: &City) -> Arc<Mutex<CityBuffer>> {
        if let Some(slot) = self.slot(city) {
            return slot;
        }
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(city.clone()).or_default().clone()
    }

    /// Append a reading, evicting the oldest once over capacity.
    pub fn add(&self, city: &City, reading: PollutionReading) {
        let slot = self.slot_or_insert(city);
        let mut buf = slot.lock().unwrap_or_else(PoisonError::into_inner);

        buf.readings.push_back(reading);
        while buf.readings.len() > self.capacity {
            buf.readings.pop_front();
        }
        buf.last_updated = Some(Utc::now());

        debug!(city = %city, size = buf.readings.len(), "buffer updated");
    }

    /// Snapshot of the buffer, oldest first. Empty for unknown cities.
    pub fn get(&self, city: &City) -> Vec<PollutionReading> {
        match self.slot(city) {
            Some(slot) => {
                let buf = slot.lock().unwrap_or_else(PoisonError::into_inner);
                buf.readings.iter().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    pub fn len(&self, city: &City) -> usize {
        self.slot(city)
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).readings.len())
            .unwrap_or(0)
    }

    pub fn clear(&self, city: &City) {
        if let Some(slot) = self.slot(city) {
            let mut buf = slot.lock().unwrap_or_else(PoisonError::into_inner);
            buf.readings.clear();
            info!(city = %city, "buffer cleared");
        }
    }

    pub fn stats(&self, city: &City) -> BufferStats {
        let (size, oldest, newest, last_updated) = match self.slot(city) {
            Some(slot) => {
                let buf = slot.lock().unwrap_or_else(PoisonError::into_inner);
                (
                    buf.readings.len(),
                    buf.readings.front().map(|r| r.timestamp),
                    buf.readings.back().map(|r| r.timestamp),
                    buf.last_updated,
                )
            }
            None => (0, None, None, None),
        };

        BufferStats {
            city: city.clone(),
            size,
            max_size: self.capacity,
            oldest,
            newest,
            last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn reading(aqi: f64) -> PollutionReading {
        PollutionReading::new(aqi, "Station", Utc::now() + Duration::seconds(aqi as i64))
    }

    #[test]
    fn twenty_fifth_reading_evicts_the_oldest() {
        let buffers = BufferManager::default();
        let city = City::new("Delhi");
        for i in 0..25 {
            buffers.add(&city, reading(i as f64));
        }

        let snapshot = buffers.get(&city);
        assert_eq!(snapshot.len(), 24);
        assert_eq!(snapshot[0].aqi, 1.0);
        assert_eq!(snapshot[23].aqi, 24.0);
    }

    #[test]
    fn city_names_share_a_buffer_case_insensitively() {
        let buffers = BufferManager::default();
        buffers.add(&City::new("Delhi"), reading(100.0));
        buffers.add(&City::new(" delhi "), reading(110.0));
        assert_eq!(buffers.len(&City::new("DELHI")), 2);
    }

    #[test]
    fn snapshots_are_detached_from_the_buffer() {
        let buffers = BufferManager::default();
        let city = City::new("Mumbai");
        buffers.add(&city, reading(80.0));
        let snapshot = buffers.get(&city);
        buffers.add(&city, reading(90.0));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn clear_and_stats() {
        let buffers = BufferManager::new(3);
        let city = City::new("Chennai");
        assert_eq!(buffers.stats(&city).size, 0);

        buffers.add(&city, reading(10.0));
        buffers.add(&city, reading(20.0));
        let stats = buffers.stats(&city);
        assert_eq!(stats.size, 2);
        assert_eq!(stats.max_size, 3);
        assert!(stats.oldest < stats.newest);
        assert!(stats.last_updated.is_some());

        buffers.clear(&city);
        assert!(buffers.get(&city).is_empty());
    }

    #[test]
    fn concurrent_writers_respect_capacity() {
        let buffers = Arc::new(BufferManager::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let buffers = buffers.clone();
                std::thread::spawn(move || {
                    let city = City::new(if t % 2 == 0 { "Delhi" } else { "Kolkata" });
                    for i in 0..50 {
                        buffers.add(&city, reading(i as f64));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(buffers.len(&City::new("Delhi")), 24);
        assert_eq!(buffers.len(&City::new("Kolkata")), 24);
    }

    proptest! {
        /// Property: length is min(added, capacity) and the newest reading is always kept.
        #[test]
        fn length_never_exceeds_capacity(n in 1usize..80, capacity in 1usize..30) {
            let buffers = BufferManager::new(capacity);
            let city = City::new("Lucknow");
            for i in 0..n {
                buffers.add(&city, reading(i as f64));
            }
            let snapshot = buffers.get(&city);
            prop_assert_eq!(snapshot.len(), n.min(capacity));
            prop_assert_eq!(snapshot.last().map(|r| r.aqi), Some((n - 1) as f64));
        }
    }
}
