//! What a committed transaction changed.

use crate::transaction::TransactionKind;
use mdib_core::{Descriptor, MdibVersionGroup, ReportKind, State, StateCategory};

/// A staged `(old, new)` pair.
///
/// `old == None` is a creation, `new == None` a deletion, both present an
/// update.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionItem<T> {
    pub old: Option<T>,
    pub new: Option<T>,
}

impl<T> TransactionItem<T> {
    pub fn created(new: T) -> Self {
        Self {
            old: None,
            new: Some(new),
        }
    }

    pub fn updated(old: T, new: T) -> Self {
        Self {
            old: Some(old),
            new: Some(new),
        }
    }

    pub fn deleted(old: T) -> Self {
        Self {
            old: Some(old),
            new: None,
        }
    }

    pub fn is_create(&self) -> bool {
        self.old.is_none() && self.new.is_some()
    }

    pub fn is_update(&self) -> bool {
        self.old.is_some() && self.new.is_some()
    }

    pub fn is_delete(&self) -> bool {
        self.old.is_some() && self.new.is_none()
    }
}

/// Detached copies of everything one commit changed, partitioned the way
/// reports are built: one list per state category plus the descriptor lists.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResult {
    pub kind: TransactionKind,
    pub version_group: MdibVersionGroup,
    pub descr_created: Vec<Descriptor>,
    pub descr_updated: Vec<Descriptor>,
    pub descr_deleted: Vec<Descriptor>,
    pub deleted_states: Vec<State>,
    pub metric_updates: Vec<State>,
    pub alert_updates: Vec<State>,
    pub component_updates: Vec<State>,
    pub context_updates: Vec<State>,
    pub operational_updates: Vec<State>,
    pub rt_updates: Vec<State>,
}

impl TransactionResult {
    pub fn new(kind: TransactionKind, version_group: MdibVersionGroup) -> Self {
        Self {
            kind,
            version_group,
            descr_created: Vec::new(),
            descr_updated: Vec::new(),
            descr_deleted: Vec::new(),
            deleted_states: Vec::new(),
            metric_updates: Vec::new(),
            alert_updates: Vec::new(),
            component_updates: Vec::new(),
            context_updates: Vec::new(),
            operational_updates: Vec::new(),
            rt_updates: Vec::new(),
        }
    }

    pub fn mdib_version(&self) -> u64 {
        self.version_group.mdib_version
    }

    pub fn has_descriptor_updates(&self) -> bool {
        !(self.descr_created.is_empty()
            && self.descr_updated.is_empty()
            && self.descr_deleted.is_empty())
    }

    /// Whether any of the six state categories carries an update.
    ///
    /// States deleted along with their descriptor are not counted.
    pub fn has_category_updates(&self) -> bool {
        StateCategory::ALL
            .iter()
            .any(|category| !self.updates(*category).is_empty())
    }

    pub fn has_state_updates(&self) -> bool {
        self.has_category_updates() || !self.deleted_states.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_descriptor_updates() && !self.has_state_updates()
    }

    pub fn updates(&self, category: StateCategory) -> &[State] {
        match category {
            StateCategory::Metric => &self.metric_updates,
            StateCategory::Alert => &self.alert_updates,
            StateCategory::Component => &self.component_updates,
            StateCategory::Context => &self.context_updates,
            StateCategory::Operational => &self.operational_updates,
            StateCategory::RealTimeSample => &self.rt_updates,
        }
    }

    pub(crate) fn updates_mut(&mut self, category: StateCategory) -> &mut Vec<State> {
        match category {
            StateCategory::Metric => &mut self.metric_updates,
            StateCategory::Alert => &mut self.alert_updates,
            StateCategory::Component => &mut self.component_updates,
            StateCategory::Context => &mut self.context_updates,
            StateCategory::Operational => &mut self.operational_updates,
            StateCategory::RealTimeSample => &mut self.rt_updates,
        }
    }

    /// Every updated state, category by category.
    pub fn all_updated_states(&self) -> impl Iterator<Item = &State> {
        StateCategory::ALL
            .iter()
            .flat_map(move |category| self.updates(*category).iter())
    }

    /// The reports a notifier has to send for this commit, in send order.
    pub fn report_kinds(&self) -> Vec<ReportKind> {
        let mut kinds = Vec::new();
        if self.has_descriptor_updates() {
            kinds.push(ReportKind::DescriptionModification);
        }
        for category in StateCategory::ALL {
            if !self.updates(category).is_empty() {
                kinds.push(category.report_kind());
            }
        }
        kinds
    }
}
