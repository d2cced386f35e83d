//! Module registry: which remote modules exist, where they listen, and when
//! they were last reached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use interop_core::messages::RegisterRequest;
use interop_core::{ClockSource, ModuleRecord, SystemClock, RPC_ENDPOINT};
use tracing::{debug, info};

use super::error::InteropError;
use super::non_empty;

/// A record plus its insertion sequence, which fixes its listing position.
#[derive(Debug)]
struct Slot {
    seq: u64,
    record: ModuleRecord,
}

/// Thread-safe registry of remote modules keyed by name.
///
/// Backed by a `DashMap` so concurrent register, unregister, and touch calls
/// from HTTP handlers, channel tasks, and the drain worker never contend on
/// a single lock. Listing order is registration order; re-registering a name
/// keeps its original position.
pub struct ModuleRegistry {
    modules: DashMap<String, Slot>,
    next_seq: AtomicU64,
    clock: Arc<dyn ClockSource>,
}

impl ModuleRegistry {
    /// Creates an empty registry reading the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty registry with an injected clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        Self {
            modules: DashMap::new(),
            next_seq: AtomicU64::new(0),
            clock,
        }
    }

    /// Inserts or replaces the record for `request.name`.
    ///
    /// Replacement is last-write-wins with no merge: every field, including
    /// `registeredAt`, comes from the new request.
    ///
    /// # Errors
    ///
    /// Returns `InteropError::InvalidRequest` if `name` or `language` is
    /// missing or empty.
    pub fn register(&self, request: RegisterRequest) -> Result<ModuleRecord, InteropError> {
        let (name, language) = match (non_empty(request.name), non_empty(request.language)) {
            (Some(name), Some(language)) => (name, language),
            (name, language) => {
                let mut missing = Vec::with_capacity(2);
                if name.is_none() {
                    missing.push("name");
                }
                if language.is_none() {
                    missing.push("language");
                }
                return Err(InteropError::missing_fields(&missing));
            }
        };

        let now = self.clock.now();
        let record = ModuleRecord {
            name: name.clone(),
            language,
            endpoints: request
                .endpoints
                .unwrap_or_else(|| vec![RPC_ENDPOINT.to_string()]),
            port: request.port,
            registered_at: now,
            last_seen: now,
        };

        let replaced = match self.modules.entry(name) {
            Entry::Occupied(mut slot) => {
                slot.get_mut().record = record.clone();
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(Slot {
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    record: record.clone(),
                });
                false
            }
        };

        info!(
            module = %record.name,
            language = %record.language,
            port = ?record.port,
            replaced,
            "module registered"
        );
        self.report_size();
        Ok(record)
    }

    /// Removes a module and returns its last record.
    ///
    /// # Errors
    ///
    /// Returns `InteropError::NotFound` if no module has that name.
    pub fn unregister(&self, name: &str) -> Result<ModuleRecord, InteropError> {
        let (_, slot) = self.modules.remove(name).ok_or_else(|| InteropError::NotFound {
            name: name.to_string(),
        })?;
        info!(module = %name, "module unregistered");
        self.report_size();
        Ok(slot.record)
    }

    /// Looks up a module by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ModuleRecord> {
        self.modules.get(name).map(|slot| slot.record.clone())
    }

    /// Refreshes `lastSeen` and returns the updated record, or `None` if the
    /// module is not registered.
    pub fn touch(&self, name: &str) -> Option<ModuleRecord> {
        let mut slot = self.modules.get_mut(name)?;
        slot.record.last_seen = self.clock.now();
        debug!(module = %name, "module touched");
        Some(slot.record.clone())
    }

    /// Returns every record in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ModuleRecord> {
        let mut slots: Vec<(u64, ModuleRecord)> = self
            .modules
            .iter()
            .map(|entry| (entry.seq, entry.record.clone()))
            .collect();
        slots.sort_unstable_by_key(|(seq, _)| *seq);
        slots.into_iter().map(|(_, record)| record).collect()
    }

    /// Returns module names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.list().into_iter().map(|record| record.name).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    #[allow(clippy::cast_precision_loss)]
    fn report_size(&self) {
        metrics::gauge!("interop_modules_registered").set(self.modules.len() as f64);
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
