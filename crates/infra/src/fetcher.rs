//! Live fetch with a last-known-good fallback.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use aqcast_core::{City, FetchSource, PollutionReading};

use crate::buffer::BufferManager;
use crate::provider::LiveDataProvider;

/// A reading (when one could be produced) and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub reading: Option<PollutionReading>,
    pub source: FetchSource,
}

impl FetchOutcome {
    /// The reading, only if it was fetched live during this call.
    pub fn fresh(&self) -> Option<&PollutionReading> {
        match self.source {
            FetchSource::Live => self.reading.as_ref(),
            _ => None,
        }
    }
}

/// Fetches readings, feeds the buffer, and hides provider failures behind the cache.
pub struct ReadingFetcher {
    provider: Arc<dyn LiveDataProvider>,
    buffers: Arc<BufferManager>,
    last_good: RwLock<HashMap<City, PollutionReading>>,
}

impl core::fmt::Debug for ReadingFetcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReadingFetcher").field("buffers", &self.buffers).finish_non_exhaustive()
    }
}

impl ReadingFetcher {
    pub fn new(provider: Arc<dyn LiveDataProvider>, buffers: Arc<BufferManager>) -> Self {
        Self {
            provider,
            buffers,
            last_good: RwLock::new(HashMap::new()),
        }
    }

    pub fn buffers(&self) -> &Arc<BufferManager> {
        &self.buffers
    }

    /// Never fails: errors degrade to the cached reading, then to `FetchSource::Error`.
    pub fn fetch(&self, city: &City) -> FetchOutcome {
        match self.provider.fetch(city) {
            Ok(reading) => {
                self.buffers.add(city, reading.clone());
                self.last_good
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(city.clone(), reading.clone());

                info!(
                    city = %city,
                    aqi = reading.aqi,
                    pm25 = ?reading.pm25,
                    complete = reading.is_complete(),
                    station = %reading.station,
                    "live reading fetched"
                );
                FetchOutcome {
                    reading: Some(reading),
                    source: FetchSource::Live,
                }
            }
            Err(err) => {
                let cached = self
                    .last_good
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(city)
                    .cloned();
                let source = if cached.is_some() {
                    FetchSource::Fallback
                } else {
                    FetchSource::Error
                };

                warn!(city = %city, error = %err, source = ?source, "live fetch failed");
                FetchOutcome { reading: cached, source }
            }
        }
    }
}
