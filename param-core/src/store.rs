//! The parameter store collaborator.
//!
//! The store is the source of truth for parameter identity, value and sync
//! status. The engine never caches parameter data; it asks the store which
//! index is out of sync, looks parameters up for transmission and reports
//! outcomes back.
//!
//! [`MemoryParameterStore`] is a plain in-memory implementation, used by the
//! simulated vehicle, the CLI and the tests.

use mavparam_types::{MemoryAreaResult, ParamType, ParamValue};

use crate::state::Campaign;

/// One parameter as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Index in the vehicle's table.
    pub index: u16,
    /// Parameter name.
    pub param_id: String,
    /// Current local value.
    pub value: f32,
    /// Storage type on the vehicle.
    pub param_type: ParamType,
    /// Whether the local value is confirmed equal to the vehicle's.
    pub synced: bool,
}

impl Parameter {
    /// Create an unsynchronised parameter.
    pub fn new(index: u16, param_id: &str, value: f32, param_type: ParamType) -> Self {
        Self {
            index,
            param_id: param_id.to_string(),
            value,
            param_type,
            synced: false,
        }
    }
}

impl From<&ParamValue> for Parameter {
    fn from(msg: &ParamValue) -> Self {
        Self {
            index: msg.param_index,
            param_id: msg.param_id.clone(),
            value: msg.value,
            param_type: msg.param_type,
            synced: true,
        }
    }
}

/// Interface the engine expects from the parameter store.
pub trait ParameterStore {
    /// Apply an incoming value.
    ///
    /// Returns `true` if it was the last value of a bulk transfer.
    fn apply_value(&mut self, value: &ParamValue) -> bool;

    /// Mark every parameter as out of sync.
    fn clear_sync(&mut self);

    /// Index of the next out-of-sync parameter, `None` when all are in sync.
    fn next_unsynced(&self) -> Option<u16>;

    /// Look a parameter up for transmission.
    fn parameter(&self, index: u16) -> Option<Parameter>;

    /// A campaign finished with every parameter in sync.
    fn sync_complete(&mut self);

    /// A memory-area operation was acknowledged.
    fn memory_area_result(&mut self, result: MemoryAreaResult);

    /// The link went up or down; whatever was synchronised no longer is.
    fn invalidate(&mut self);

    /// A campaign was given up after exhausting its retries.
    fn sync_abandoned(&mut self, _campaign: Campaign) {}
}

/// In-memory parameter store.
#[derive(Debug, Default)]
pub struct MemoryParameterStore {
    params: Vec<Option<Parameter>>,
    synchronised: bool,
    completions: usize,
    area_results: Vec<MemoryAreaResult>,
    abandoned: Vec<Campaign>,
}

impl MemoryParameterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with parameters, placed by their index.
    pub fn with_parameters(params: impl IntoIterator<Item = Parameter>) -> Self {
        let mut store = Self::new();
        for param in params {
            let slot = usize::from(param.index);
            store.ensure_len(slot + 1);
            store.params[slot] = Some(param);
        }
        store
    }

    /// Change a parameter locally, marking it for the next write.
    ///
    /// Returns the parameter's index, or `None` if no parameter has that id.
    pub fn set_local(&mut self, param_id: &str, value: f32) -> Option<u16> {
        let param = self
            .params
            .iter_mut()
            .flatten()
            .find(|p| p.param_id == param_id)?;
        param.value = value;
        param.synced = false;
        self.synchronised = false;
        Some(param.index)
    }

    /// Look a parameter up by name.
    pub fn get(&self, param_id: &str) -> Option<&Parameter> {
        self.params.iter().flatten().find(|p| p.param_id == param_id)
    }

    /// Iterate over known parameters in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().flatten()
    }

    /// Number of slots in the table (known or still missing).
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Whether the last campaign completed and nothing changed since.
    pub fn is_synchronised(&self) -> bool {
        self.synchronised
    }

    /// Number of "sync complete" notifications received.
    pub fn completions(&self) -> usize {
        self.completions
    }

    /// Memory-area results received, oldest first.
    pub fn area_results(&self) -> &[MemoryAreaResult] {
        &self.area_results
    }

    /// Campaigns reported as abandoned, oldest first.
    pub fn abandoned(&self) -> &[Campaign] {
        &self.abandoned
    }

    fn ensure_len(&mut self, len: usize) {
        if self.params.len() < len {
            self.params.resize(len, None);
        }
    }

    fn slot_for(&self, value: &ParamValue) -> Option<usize> {
        // PARAM_SET echoes may carry index 65535; fall back to the name.
        if value.param_index != u16::MAX {
            return Some(usize::from(value.param_index));
        }
        self.params
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.param_id == value.param_id))
    }
}

impl ParameterStore for MemoryParameterStore {
    fn apply_value(&mut self, value: &ParamValue) -> bool {
        if value.param_count != u16::MAX {
            self.ensure_len(usize::from(value.param_count));
        }
        if let Some(slot) = self.slot_for(value) {
            self.ensure_len(slot + 1);
            let mut param = Parameter::from(value);
            param.index = slot as u16;
            self.params[slot] = Some(param);
        }
        value.is_last
    }

    fn clear_sync(&mut self) {
        for param in self.params.iter_mut().flatten() {
            param.synced = false;
        }
        self.synchronised = false;
    }

    fn next_unsynced(&self) -> Option<u16> {
        self.params
            .iter()
            .position(|p| !p.as_ref().is_some_and(|p| p.synced))
            .map(|i| i as u16)
    }

    fn parameter(&self, index: u16) -> Option<Parameter> {
        self.params.get(usize::from(index)).cloned().flatten()
    }

    fn sync_complete(&mut self) {
        self.synchronised = true;
        self.completions += 1;
    }

    fn memory_area_result(&mut self, result: MemoryAreaResult) {
        self.area_results.push(result);
    }

    fn invalidate(&mut self) {
        self.synchronised = false;
    }

    fn sync_abandoned(&mut self, campaign: Campaign) {
        self.abandoned.push(campaign);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavparam_types::{MemoryAreaAction, Target};

    fn value(index: u16, count: u16, id: &str, v: f32, is_last: bool) -> ParamValue {
        ParamValue {
            source: Target::new(1, 1),
            param_index: index,
            param_count: count,
            param_id: id.to_string(),
            value: v,
            param_type: ParamType::Real32,
            is_last,
        }
    }

    #[test]
    fn empty_store_is_in_sync() {
        let store = MemoryParameterStore::new();
        assert_eq!(store.next_unsynced(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn first_value_reveals_missing_slots() {
        let mut store = MemoryParameterStore::new();
        store.apply_value(&value(1, 3, "B", 2.0, false));

        assert_eq!(store.len(), 3);
        assert_eq!(store.next_unsynced(), Some(0));
        assert!(store.parameter(1).unwrap().synced);
        assert!(store.parameter(0).is_none());
    }

    #[test]
    fn apply_reports_last_flag() {
        let mut store = MemoryParameterStore::new();
        assert!(!store.apply_value(&value(0, 2, "A", 1.0, false)));
        assert!(store.apply_value(&value(1, 2, "B", 1.0, true)));
        assert_eq!(store.next_unsynced(), None);
    }

    #[test]
    fn clear_sync_marks_everything_unsynced() {
        let mut store = MemoryParameterStore::new();
        store.apply_value(&value(0, 2, "A", 1.0, false));
        store.apply_value(&value(1, 2, "B", 1.0, true));

        store.clear_sync();

        assert_eq!(store.next_unsynced(), Some(0));
        assert_eq!(store.get("B").map(|p| p.value), Some(1.0));
    }

    #[test]
    fn set_local_marks_parameter_changed() {
        let mut store = MemoryParameterStore::with_parameters(vec![
            Parameter {
                synced: true,
                ..Parameter::new(0, "A", 1.0, ParamType::Real32)
            },
            Parameter {
                synced: true,
                ..Parameter::new(1, "B", 2.0, ParamType::Int16)
            },
        ]);
        assert_eq!(store.next_unsynced(), None);

        assert_eq!(store.set_local("B", 7.0), Some(1));
        assert_eq!(store.set_local("NOPE", 1.0), None);

        assert_eq!(store.next_unsynced(), Some(1));
        assert_eq!(store.parameter(1).unwrap().value, 7.0);
    }

    #[test]
    fn echo_without_index_matches_by_name() {
        let mut store = MemoryParameterStore::with_parameters(vec![Parameter::new(
            0,
            "A",
            5.0,
            ParamType::Real32,
        )]);

        store.apply_value(&value(u16::MAX, u16::MAX, "A", 5.0, false));

        assert_eq!(store.len(), 1);
        assert!(store.parameter(0).unwrap().synced);
    }

    #[test]
    fn notifications_are_recorded() {
        let mut store = MemoryParameterStore::new();
        store.sync_complete();
        assert!(store.is_synchronised());
        assert_eq!(store.completions(), 1);

        store.invalidate();
        assert!(!store.is_synchronised());

        let result = MemoryAreaResult {
            action: MemoryAreaAction::Write,
            area_id: 2,
            result: 0,
        };
        store.memory_area_result(result);
        store.sync_abandoned(Campaign::ReadAll);

        assert_eq!(store.area_results(), &[result]);
        assert_eq!(store.abandoned(), &[Campaign::ReadAll]);
    }
}
