//! Per-wine mutual exclusion for enrichment runs

use crate::catalog::WineId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

/// Tracks which wines have an enrichment running.
///
/// Cloning shares the same set. At most one slot per wine exists at a time.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    in_flight: Arc<DashMap<WineId, Instant>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the wine, or `None` if another run already holds it.
    pub fn try_acquire(&self, wine_id: &WineId) -> Option<InFlightSlot> {
        match self.in_flight.entry(wine_id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Some(InFlightSlot {
                    wine_id: wine_id.clone(),
                    in_flight: Arc::clone(&self.in_flight),
                })
            }
        }
    }

    pub fn is_in_flight(&self, wine_id: &WineId) -> bool {
        self.in_flight.contains_key(wine_id)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// A claimed wine. Released on drop.
#[derive(Debug)]
pub struct InFlightSlot {
    wine_id: WineId,
    in_flight: Arc<DashMap<WineId, Instant>>,
}

impl InFlightSlot {
    pub fn wine_id(&self) -> &WineId {
        &self.wine_id
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.in_flight.remove(&self.wine_id);
    }
}
