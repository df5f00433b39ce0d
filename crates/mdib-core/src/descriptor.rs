//! Descriptor containers: the structural part of the MDIB.

use crate::coding::{CodedValue, Coding};
use crate::entity::{Entity, Versioned};
use crate::handle::{Handle, ObjectId};
use crate::kind::{ChildSlot, Kind, StateCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Risk class of the information a descriptor provides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SafetyClassification {
    #[default]
    Informational,
    MedicalA,
    MedicalB,
    MedicalC,
}

/// A node of the descriptor tree.
///
/// Identity fields (kind, handle, parent) are fixed at construction; only
/// the version and the descriptive attributes are mutable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(skip)]
    object_id: ObjectId,
    kind: Kind,
    handle: Handle,
    parent_handle: Option<Handle>,
    descriptor_version: u64,
    coded_type: Option<CodedValue>,
    safety_classification: Option<SafetyClassification>,
    /// Type-specific attributes, opaque to the engine.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Descriptor {
    pub fn new(kind: Kind, handle: impl Into<Handle>, parent_handle: Option<Handle>) -> Self {
        Self {
            object_id: ObjectId::next(),
            kind,
            handle: handle.into(),
            parent_handle,
            descriptor_version: 0,
            coded_type: None,
            safety_classification: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Shorthand for a root `Mds` descriptor.
    pub fn mds(handle: impl Into<Handle>) -> Self {
        Self::new(Kind::Mds, handle, None)
    }

    /// Shorthand for a descriptor below `parent`.
    pub fn child(kind: Kind, handle: impl Into<Handle>, parent: impl Into<Handle>) -> Self {
        Self::new(kind, handle, Some(parent.into()))
    }

    pub fn with_type(mut self, coded_type: CodedValue) -> Self {
        self.coded_type = Some(coded_type);
        self
    }

    pub fn with_safety_classification(mut self, classification: SafetyClassification) -> Self {
        self.safety_classification = Some(classification);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.descriptor_version = version;
        self
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn parent_handle(&self) -> Option<&Handle> {
        self.parent_handle.as_ref()
    }

    pub fn descriptor_version(&self) -> u64 {
        self.descriptor_version
    }

    pub fn set_descriptor_version(&mut self, version: u64) {
        self.descriptor_version = version;
    }

    pub fn increment_version(&mut self) {
        self.descriptor_version += 1;
    }

    pub fn coded_type(&self) -> Option<&CodedValue> {
        self.coded_type.as_ref()
    }

    pub fn set_coded_type(&mut self, coded_type: Option<CodedValue>) {
        self.coded_type = coded_type;
    }

    /// Normalized coding of `Type`, if any.
    pub fn coding(&self) -> Option<Coding> {
        self.coded_type.as_ref().map(CodedValue::coding)
    }

    /// True if `Type` (or one of its translations) denotes `coding`.
    pub fn matches_coding(&self, coding: &Coding) -> bool {
        self.coded_type
            .as_ref()
            .is_some_and(|cv| cv.is_equivalent(coding))
    }

    pub fn safety_classification(&self) -> Option<SafetyClassification> {
        self.safety_classification
    }

    /// Safety classification with the implied `Informational` applied.
    pub fn effective_safety_classification(&self) -> SafetyClassification {
        self.safety_classification.unwrap_or_default()
    }

    pub fn set_safety_classification(&mut self, classification: Option<SafetyClassification>) {
        self.safety_classification = classification;
    }

    pub fn category(&self) -> StateCategory {
        self.kind.category()
    }

    pub fn is_context_descriptor(&self) -> bool {
        self.kind.is_multi_state()
    }

    pub fn child_slot(&self) -> Option<ChildSlot> {
        self.kind.child_slot()
    }

    pub fn node_type(&self) -> &'static str {
        self.kind.descriptor_node_type()
    }

    /// A copy with a fresh object identity, detached from this container.
    pub fn detached(&self) -> Self {
        let mut copy = self.clone();
        copy.object_id = ObjectId::next();
        copy
    }
}

// Object identity is bookkeeping, not content.
impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.handle == other.handle
            && self.parent_handle == other.parent_handle
            && self.descriptor_version == other.descriptor_version
            && self.coded_type == other.coded_type
            && self.safety_classification == other.safety_classification
            && self.attributes == other.attributes
    }
}

impl Entity for Descriptor {
    fn object_id(&self) -> ObjectId {
        self.object_id
    }

    fn kind(&self) -> Kind {
        self.kind
    }
}

impl Versioned for Descriptor {
    fn version_key(&self) -> &Handle {
        &self.handle
    }

    fn version(&self) -> u64 {
        self.descriptor_version
    }

    fn set_version(&mut self, version: u64) {
        self.descriptor_version = version;
    }
}
