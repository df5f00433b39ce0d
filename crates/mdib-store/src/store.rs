//! The canonical MDIB: three tables plus the version counters.

use crate::error::{Result, StoreError};
use crate::snapshot::MdibSnapshot;
use mdib_core::{Coding, Descriptor, Entity, Handle, Kind, MdibVersionGroup, State};
use mdib_lookup::{DescriptorsLookup, MultiStatesLookup, StatesLookup};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Objects removed by [`MdibStore::rm_descriptors_and_states`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovedObjects {
    pub descriptors: Vec<Descriptor>,
    pub states: Vec<State>,
    pub context_states: Vec<State>,
}

impl RemovedObjects {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty() && self.states.is_empty() && self.context_states.is_empty()
    }

    /// Single and multi states, in removal order.
    pub fn all_states(&self) -> impl Iterator<Item = &State> {
        self.states.iter().chain(self.context_states.iter())
    }
}

/// Descriptors, states and context states of one MDIB.
///
/// The store has no lock of its own. It is owned by the `Mdib` facade which
/// hands out guarded access; everything here is plain `&self` / `&mut self`.
#[derive(Debug)]
pub struct MdibStore {
    descriptors: DescriptorsLookup,
    states: StatesLookup,
    context_states: MultiStatesLookup,
    mdib_version: u64,
    mddescription_version: u64,
    mdstate_version: u64,
    sequence_id: String,
    instance_id: Option<u64>,
}

impl MdibStore {
    pub fn new(sequence_id: impl Into<String>, instance_id: Option<u64>) -> Self {
        Self {
            descriptors: DescriptorsLookup::new(),
            states: StatesLookup::new(),
            context_states: MultiStatesLookup::new(),
            mdib_version: 0,
            mddescription_version: 0,
            mdstate_version: 0,
            sequence_id: sequence_id.into(),
            instance_id,
        }
    }

    // === Versions ===

    pub fn mdib_version(&self) -> u64 {
        self.mdib_version
    }

    pub fn mddescription_version(&self) -> u64 {
        self.mddescription_version
    }

    pub fn mdstate_version(&self) -> u64 {
        self.mdstate_version
    }

    pub fn sequence_id(&self) -> &str {
        &self.sequence_id
    }

    pub fn instance_id(&self) -> Option<u64> {
        self.instance_id
    }

    pub fn set_instance_id(&mut self, instance_id: Option<u64>) {
        self.instance_id = instance_id;
    }

    pub fn version_group(&self) -> MdibVersionGroup {
        MdibVersionGroup::new(self.mdib_version, self.sequence_id.clone(), self.instance_id)
    }

    /// The mdib version the next changing commit will produce.
    pub fn next_mdib_version(&self) -> u64 {
        self.mdib_version + 1
    }

    /// Bump the sub-versions that changed and, if any did, the mdib version
    /// by exactly one. Returns whether anything was bumped.
    pub fn apply_version_bump(&mut self, description_changed: bool, state_changed: bool) -> bool {
        if description_changed {
            self.mddescription_version += 1;
        }
        if state_changed {
            self.mdstate_version += 1;
        }
        let changed = description_changed || state_changed;
        if changed {
            self.mdib_version += 1;
        }
        changed
    }

    /// Start a new sequence: fresh sequence id and all counters back to zero.
    pub fn new_sequence(&mut self) {
        self.sequence_id = MdibVersionGroup::new_sequence_id();
        self.mdib_version = 0;
        self.mddescription_version = 0;
        self.mdstate_version = 0;
        info!(sequence_id = %self.sequence_id, "started new mdib sequence");
    }

    // === Tables ===

    pub fn descriptors(&self) -> &DescriptorsLookup {
        &self.descriptors
    }

    pub fn descriptors_mut(&mut self) -> &mut DescriptorsLookup {
        &mut self.descriptors
    }

    pub fn states(&self) -> &StatesLookup {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut StatesLookup {
        &mut self.states
    }

    pub fn context_states(&self) -> &MultiStatesLookup {
        &self.context_states
    }

    pub fn context_states_mut(&mut self) -> &mut MultiStatesLookup {
        &mut self.context_states
    }

    // === Queries ===

    pub fn descriptor(&self, handle: &str) -> Option<&Descriptor> {
        self.descriptors.get(handle)
    }

    pub fn state(&self, descriptor_handle: &str) -> Option<&State> {
        self.states.get(descriptor_handle)
    }

    pub fn context_state(&self, handle: &str) -> Option<&State> {
        self.context_states.get(handle)
    }

    pub fn context_states_of(&self, descriptor_handle: &str) -> Vec<&State> {
        self.context_states.by_descriptor(descriptor_handle)
    }

    /// Every state of a descriptor: its single state or all its multi-states.
    pub fn states_of(&self, descriptor_handle: &str) -> Vec<&State> {
        match self.states.get(descriptor_handle) {
            Some(state) => vec![state],
            None => self.context_states.by_descriptor(descriptor_handle),
        }
    }

    pub fn children(&self, handle: &str) -> Vec<&Descriptor> {
        self.descriptors.children_of(handle)
    }

    pub fn root_descriptors(&self) -> Vec<&Descriptor> {
        self.descriptors.roots()
    }

    pub fn descriptors_by_kind(&self, kind: Kind) -> Vec<&Descriptor> {
        self.descriptors.by_kind(kind)
    }

    /// Walk the subtree under `root`.
    ///
    /// With `depth_first` every descendant precedes its ancestors, which is
    /// the order a delete must follow. Without it the root comes first, as a
    /// serializer needs it. An unknown root yields nothing.
    pub fn get_all_descriptors_in_subtree(
        &self,
        root: &str,
        depth_first: bool,
        include_root: bool,
    ) -> Vec<&Descriptor> {
        let mut out = Vec::new();
        if let Some(root) = self.descriptors.get(root) {
            self.walk(root, depth_first, &mut out);
            if !include_root {
                if depth_first {
                    out.pop();
                } else {
                    out.remove(0);
                }
            }
        }
        out
    }

    fn walk<'a>(&'a self, node: &'a Descriptor, leaves_first: bool, out: &mut Vec<&'a Descriptor>) {
        if !leaves_first {
            out.push(node);
        }
        for child in self.descriptors.children_of(node.handle().as_str()) {
            self.walk(child, leaves_first, out);
        }
        if leaves_first {
            out.push(node);
        }
    }

    /// Descriptors along a code path of arbitrary depth.
    ///
    /// The first coding is matched against every descriptor, each further
    /// coding against the children of the previous matches. Translations
    /// count as matches.
    pub fn select_descriptors(&self, codings: &[Coding]) -> Vec<&Descriptor> {
        let mut selected: Vec<&Descriptor> = Vec::new();
        for (level, coding) in codings.iter().enumerate() {
            let candidates: Vec<&Descriptor> = if level == 0 {
                self.descriptors.iter().collect()
            } else {
                selected
                    .iter()
                    .flat_map(|parent| self.descriptors.children_of(parent.handle().as_str()))
                    .collect()
            };
            selected = candidates
                .into_iter()
                .filter(|d| d.matches_coding(coding))
                .collect();
            if selected.is_empty() {
                break;
            }
        }
        selected
    }

    /// The one metric under VMD / channel / metric codes.
    ///
    /// Handles are implementation-defined, so this is how a client finds a
    /// metric reliably. More than one leaf match is an error.
    pub fn get_metric_descriptor_by_code(
        &self,
        vmd_code: &Coding,
        channel_code: &Coding,
        metric_code: &Coding,
    ) -> Result<Option<&Descriptor>> {
        let metrics: Vec<&Descriptor> = self
            .descriptors
            .by_kind(Kind::Vmd)
            .into_iter()
            .filter(|vmd| vmd.matches_coding(vmd_code))
            .flat_map(|vmd| self.descriptors.children_of(vmd.handle().as_str()))
            .filter(|channel| channel.kind() == Kind::Channel && channel.matches_coding(channel_code))
            .flat_map(|channel| self.descriptors.children_of(channel.handle().as_str()))
            .filter(|metric| metric.kind().is_metric() && metric.matches_coding(metric_code))
            .collect();

        match metrics.len() {
            0 => Ok(None),
            1 => Ok(metrics.into_iter().next()),
            count => Err(StoreError::AmbiguousCode {
                path: format!("{}/{}/{}", vmd_code, channel_code, metric_code),
                count,
            }),
        }
    }

    /// The one descriptor anywhere in the tree whose `Type` denotes `coding`.
    pub fn get_descriptor_by_code(&self, coding: &Coding) -> Result<Option<&Descriptor>> {
        let matches = self.select_descriptors(std::slice::from_ref(coding));
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.into_iter().next()),
            count => Err(StoreError::AmbiguousCode {
                path: coding.to_string(),
                count,
            }),
        }
    }

    // === Mutation ===

    /// Remove the given descriptors and every state attached to them.
    ///
    /// No cascade: callers pass the full subtree, leaves first.
    pub fn rm_descriptors_and_states<I, S>(&mut self, handles: I) -> Result<RemovedObjects>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = RemovedObjects::default();
        for handle in handles {
            let handle = handle.as_ref();
            if !self.descriptors.contains(handle) {
                return Err(StoreError::DescriptorNotFound(handle.to_string()));
            }
            if self.states.contains(handle) {
                removed.states.push(self.states.remove_object(handle)?);
            }
            let context_handles: Vec<String> = self
                .context_states
                .by_descriptor(handle)
                .iter()
                .filter_map(|s| s.handle().map(|h| h.to_string()))
                .collect();
            for context_handle in context_handles {
                removed
                    .context_states
                    .push(self.context_states.remove_object(&context_handle)?);
            }
            removed.descriptors.push(self.descriptors.remove_object(handle)?);
        }
        debug!(
            descriptors = removed.descriptors.len(),
            states = removed.states.len(),
            context_states = removed.context_states.len(),
            "removed descriptors and states"
        );
        Ok(removed)
    }

    /// Bulk-insert descriptors without touching any version counter.
    pub fn add_description_containers(
        &mut self,
        descriptors: impl IntoIterator<Item = Descriptor>,
    ) -> Result<()> {
        let mut count = 0usize;
        for descriptor in descriptors {
            self.descriptors.add_object(descriptor)?;
            count += 1;
        }
        debug!(count, "loaded descriptors");
        Ok(())
    }

    /// Bulk-insert states without touching any version counter.
    ///
    /// Each state is routed to the single or multi table by its kind and
    /// must belong to a descriptor of the same kind.
    pub fn add_state_containers(&mut self, states: impl IntoIterator<Item = State>) -> Result<()> {
        let mut count = 0usize;
        for state in states {
            self.check_state_descriptor(&state)?;
            if state.is_multi_state() {
                self.context_states.add_object(state)?;
            } else {
                self.states.add_object(state)?;
            }
            count += 1;
        }
        debug!(count, "loaded states");
        Ok(())
    }

    fn check_state_descriptor(&self, state: &State) -> Result<()> {
        let handle = state.descriptor_handle().as_str();
        let descriptor = self
            .descriptors
            .get(handle)
            .ok_or_else(|| StoreError::DescriptorNotFound(handle.to_string()))?;
        if descriptor.kind() != state.kind() {
            return Err(StoreError::KindMismatch {
                handle: handle.to_string(),
                expected: descriptor.kind(),
                found: state.kind(),
            });
        }
        Ok(())
    }

    /// Create a default state for every single-state descriptor lacking one.
    ///
    /// Returns how many states were created.
    pub fn mk_state_containers_for_all_descriptors(&mut self) -> Result<usize> {
        let missing: Vec<State> = self
            .descriptors
            .iter()
            .filter(|d| !d.kind().is_multi_state() && !self.states.contains(d.handle().as_str()))
            .map(State::new)
            .collect();
        let count = missing.len();
        self.states.add_objects(missing)?;
        if count > 0 {
            debug!(count, "created missing states");
        }
        Ok(count)
    }

    // === Snapshot ===

    /// Detached copy of the whole MDIB, descriptors root-first.
    pub fn snapshot(&self) -> MdibSnapshot {
        let mut descriptors: Vec<&Descriptor> = Vec::with_capacity(self.descriptors.len());
        for root in self.descriptors.roots() {
            self.walk(root, false, &mut descriptors);
        }
        // Descriptors whose parent is absent are not reachable from a root.
        let reached: HashSet<&str> = descriptors
            .iter()
            .copied()
            .map(|d| d.handle().as_str())
            .collect();
        let mut unreached: Vec<&Descriptor> = self
            .descriptors
            .iter()
            .filter(|d| !reached.contains(d.handle().as_str()))
            .collect();
        unreached.sort_by(|a, b| a.handle().as_str().cmp(b.handle().as_str()));
        descriptors.extend(unreached);

        let states = descriptors
            .iter()
            .filter_map(|d| self.states.get(d.handle().as_str()))
            .map(State::detached)
            .collect();
        let context_states = descriptors
            .iter()
            .flat_map(|d| self.context_states.by_descriptor(d.handle().as_str()))
            .map(State::detached)
            .collect();

        MdibSnapshot {
            version_group: self.version_group(),
            mddescription_version: self.mddescription_version,
            mdstate_version: self.mdstate_version,
            descriptors: descriptors.into_iter().map(Descriptor::detached).collect(),
            states,
            context_states,
            remembered_descriptor_versions: remembered(self.descriptors.remembered_versions()),
            remembered_state_versions: remembered(self.states.remembered_versions()),
            remembered_context_state_versions: remembered(
                self.context_states.remembered_versions(),
            ),
        }
    }

    /// Rebuild a store from a snapshot, versions included.
    pub fn from_snapshot(snapshot: MdibSnapshot) -> Result<Self> {
        let MdibSnapshot {
            version_group,
            mddescription_version,
            mdstate_version,
            descriptors,
            states,
            context_states,
            remembered_descriptor_versions,
            remembered_state_versions,
            remembered_context_state_versions,
        } = snapshot;
        let mut store = Self::new(version_group.sequence_id, version_group.instance_id);
        store.descriptors.seed_versions(remembered_descriptor_versions);
        store.states.seed_versions(remembered_state_versions);
        store.context_states.seed_versions(remembered_context_state_versions);
        store.add_description_containers(descriptors)?;
        store.add_state_containers(states.into_iter().chain(context_states))?;
        store.mdib_version = version_group.mdib_version;
        store.mddescription_version = mddescription_version;
        store.mdstate_version = mdstate_version;
        Ok(store)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: MdibSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }
}

fn remembered<'a>(versions: impl Iterator<Item = (&'a Handle, u64)>) -> BTreeMap<Handle, u64> {
    versions.map(|(key, version)| (key.clone(), version)).collect()
}

impl Default for MdibStore {
    fn default() -> Self {
        Self::new(MdibVersionGroup::new_sequence_id(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdib_core::CodedValue;

    fn handles(list: Vec<&Descriptor>) -> Vec<&str> {
        list.into_iter().map(|d| d.handle().as_str()).collect()
    }

    fn sample_tree() -> MdibStore {
        let mut store = MdibStore::new("urn:test", None);
        store
            .add_description_containers(vec![
                Descriptor::mds("mds"),
                Descriptor::child(Kind::Vmd, "vmd", "mds").with_type(CodedValue::new("69650")),
                Descriptor::child(Kind::Channel, "ch", "vmd").with_type(CodedValue::new("69651")),
                Descriptor::child(Kind::NumericMetric, "hr", "ch").with_type(CodedValue::new("147842")),
                Descriptor::child(Kind::NumericMetric, "spo2", "ch")
                    .with_type(CodedValue::new("150456")),
                Descriptor::child(Kind::SystemContext, "sc", "mds"),
                Descriptor::child(Kind::PatientContext, "pat", "sc"),
            ])
            .unwrap();
        store.mk_state_containers_for_all_descriptors().unwrap();
        store
    }

    #[test]
    fn test_subtree_orders() {
        let store = sample_tree();
        assert_eq!(
            handles(store.get_all_descriptors_in_subtree("vmd", false, true)),
            vec!["vmd", "ch", "hr", "spo2"]
        );
        assert_eq!(
            handles(store.get_all_descriptors_in_subtree("vmd", true, true)),
            vec!["hr", "spo2", "ch", "vmd"]
        );
        assert_eq!(
            handles(store.get_all_descriptors_in_subtree("vmd", true, false)),
            vec!["hr", "spo2", "ch"]
        );
        assert!(store.get_all_descriptors_in_subtree("nope", true, true).is_empty());
    }

    #[test]
    fn test_mk_state_containers_skips_multi_states() {
        let store = sample_tree();
        assert_eq!(store.states().len(), 6);
        assert!(store.state("pat").is_none());
        assert!(store.context_states_of("pat").is_empty());
    }

    #[test]
    fn test_rm_descriptors_and_states() {
        let mut store = sample_tree();
        let pat = store.descriptor("pat").unwrap().clone();
        store
            .add_state_containers(vec![State::new_context(&pat, "pat_1")])
            .unwrap();

        let subtree: Vec<String> = store
            .get_all_descriptors_in_subtree("sc", true, true)
            .iter()
            .map(|d| d.handle().to_string())
            .collect();
        let removed = store.rm_descriptors_and_states(&subtree).unwrap();

        assert_eq!(removed.descriptors.len(), 2);
        assert_eq!(removed.states.len(), 1);
        assert_eq!(removed.context_states.len(), 1);
        assert!(store.context_state("pat_1").is_none());
        assert_eq!(handles(store.children("mds")), vec!["vmd"]);
    }

    #[test]
    fn test_code_lookup() {
        let store = sample_tree();
        let found = store
            .get_metric_descriptor_by_code(
                &Coding::new("69650"),
                &Coding::new("69651"),
                &Coding::new("147842"),
            )
            .unwrap();
        assert_eq!(found.map(|d| d.handle().as_str()), Some("hr"));

        let missing = store
            .get_metric_descriptor_by_code(
                &Coding::new("69650"),
                &Coding::new("69651"),
                &Coding::new("0"),
            )
            .unwrap();
        assert!(missing.is_none());

        let path = store.select_descriptors(&[Coding::new("69650"), Coding::new("69651")]);
        assert_eq!(handles(path), vec!["ch"]);
    }

    #[test]
    fn test_ambiguous_code() {
        let mut store = sample_tree();
        store
            .add_description_containers(vec![Descriptor::child(Kind::NumericMetric, "hr2", "ch")
                .with_type(CodedValue::new("147842"))])
            .unwrap();
        let err = store
            .get_metric_descriptor_by_code(
                &Coding::new("69650"),
                &Coding::new("69651"),
                &Coding::new("147842"),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::AmbiguousCode { count: 2, .. }));
    }

    #[test]
    fn test_state_kind_must_match_descriptor() {
        let mut store = sample_tree();
        let state = State::from_parts(Kind::StringMetric, "hr".into(), None);
        store.states_mut().remove_object("hr").unwrap();
        assert!(matches!(
            store.add_state_containers(vec![state]),
            Err(StoreError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_version_bump() {
        let mut store = MdibStore::new("urn:test", Some(7));
        assert!(!store.apply_version_bump(false, false));
        assert_eq!(store.mdib_version(), 0);

        assert!(store.apply_version_bump(true, true));
        assert_eq!(store.mdib_version(), 1);
        assert_eq!(store.mddescription_version(), 1);
        assert_eq!(store.mdstate_version(), 1);
        assert_eq!(store.next_mdib_version(), 2);

        store.new_sequence();
        assert_eq!(store.mdib_version(), 0);
        assert_ne!(store.sequence_id(), "urn:test");
        assert_eq!(store.version_group().instance_id, Some(7));
    }
}
