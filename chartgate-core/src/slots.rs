//! Per-connection slot bookkeeping (§3's `seriesSlots`/`studySlots`,
//! §4.4/§4.5's slot-reuse scheduling). Kept independent of the transport and
//! the supervisor state machine so it can be unit tested without a socket.

use std::collections::HashMap;
use std::time::Instant;

use chartgate_types::Resolution;

/// An addressable series container inside a chart session, identified by a
/// short opaque id the client chooses (§GLOSSARY).
#[derive(Debug, Clone)]
pub struct SeriesSlot {
    pub slot_id: String,
    pub symbol: String,
    pub resolution: Resolution,
    pub bar_count: u32,
    pub last_activity: Instant,
}

/// An addressable study container, referencing its parent series slot.
#[derive(Debug, Clone)]
pub struct StudySlot {
    pub slot_id: String,
    pub study_id: String,
    pub parent_series: String,
}

/// The slot table owned by one connection record (§3). Tracks which series
/// slot is currently showing which `(symbol, resolution)` so the coordinator
/// can decide between `create_series` and `modify_series` (§4.7 step 1).
#[derive(Debug, Default)]
pub struct SlotTable {
    series: HashMap<String, SeriesSlot>,
    studies: HashMap<String, StudySlot>,
    next_series_id: u64,
    next_study_id: u64,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a series slot already showing this resolution, regardless of
    /// which symbol it currently carries. Slot reuse is scoped to identical
    /// resolution; a symbol switch at the same resolution is handled with
    /// `modify_series` on the slot this returns, while a resolution change
    /// allocates a new slot — matching §4.5/§4.7's "symbol switches use
    /// `modify_series` on an existing slot" and property 3 in §8.
    pub fn find_reusable(&self, resolution: &Resolution) -> Option<&SeriesSlot> {
        self.series.values().find(|s| s.resolution == *resolution)
    }

    /// Allocate a fresh series slot id, e.g. `"sds_1"`, `"sds_2"`, ...
    pub fn allocate_series(
        &mut self,
        symbol: String,
        resolution: Resolution,
        bar_count: u32,
    ) -> &SeriesSlot {
        self.next_series_id += 1;
        let slot_id = format!("sds_{}", self.next_series_id);
        let slot = SeriesSlot {
            slot_id: slot_id.clone(),
            symbol,
            resolution,
            bar_count,
            last_activity: Instant::now(),
        };
        self.series.insert(slot_id.clone(), slot);
        self.series.get(&slot_id).expect("just inserted")
    }

    /// Update an existing slot in place for `modify_series` (symbol swap or
    /// bar-count change), without ever issuing `remove_series` first.
    pub fn modify_series(
        &mut self,
        slot_id: &str,
        symbol: String,
        bar_count: u32,
    ) -> Option<&SeriesSlot> {
        let slot = self.series.get_mut(slot_id)?;
        slot.symbol = symbol;
        slot.bar_count = bar_count;
        slot.last_activity = Instant::now();
        Some(slot)
    }

    pub fn get_series(&self, slot_id: &str) -> Option<&SeriesSlot> {
        self.series.get(slot_id)
    }

    pub fn remove_series(&mut self, slot_id: &str) {
        self.series.remove(slot_id);
        self.studies.retain(|_, s| s.parent_series != slot_id);
    }

    pub fn allocate_study(&mut self, study_id: String, parent_series: String) -> &StudySlot {
        self.next_study_id += 1;
        let slot_id = format!("st_{}", self.next_study_id);
        let slot = StudySlot {
            slot_id: slot_id.clone(),
            study_id,
            parent_series,
        };
        self.studies.insert(slot_id.clone(), slot);
        self.studies.get(&slot_id).expect("just inserted")
    }

    pub fn study_for_series(&self, series_slot_id: &str) -> Option<&StudySlot> {
        self.studies
            .values()
            .find(|s| s.parent_series == series_slot_id)
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }
}
