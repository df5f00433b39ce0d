//! State containers: the live part of the MDIB.
//!
//! A state belongs to exactly one descriptor. Single states are keyed by
//! their descriptor handle; multi-states (contexts) carry their own handle.
//! Each optional protocol attribute has a raw accessor returning `Option`
//! and an `effective_*` accessor that applies the implied value.

use crate::descriptor::Descriptor;
use crate::entity::{Entity, Versioned};
use crate::handle::{Handle, ObjectId};
use crate::kind::{Kind, StateCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivationState {
    #[default]
    On,
    NotReady,
    StandBy,
    Off,
    Shutdown,
    Failure,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextAssociation {
    #[default]
    NotAssociated,
    PreAssociated,
    Associated,
    Disassociated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementValidity {
    Valid,
    Validated,
    Ongoing,
    Questionable,
    Calibration,
    Invalid,
    Overflow,
    Underflow,
    NotAvailable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertSignalPresence {
    On,
    #[default]
    Off,
    Latched,
    Acknowledged,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingMode {
    #[default]
    Enabled,
    Disabled,
    NotAvailable,
}

/// Observed value of a metric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MetricData {
    Numeric(f64),
    Text(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: Option<MetricData>,
    pub determination_time: Option<DateTime<Utc>>,
    pub validity: Option<MeasurementValidity>,
}

impl MetricValue {
    pub fn numeric(value: f64) -> Self {
        Self {
            value: Some(MetricData::Numeric(value)),
            determination_time: None,
            validity: Some(MeasurementValidity::Valid),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: Some(MetricData::Text(value.into())),
            determination_time: None,
            validity: Some(MeasurementValidity::Valid),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleArrayValue {
    pub samples: Vec<f64>,
    pub determination_time: Option<DateTime<Utc>>,
    pub validity: Option<MeasurementValidity>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceIdentifier {
    pub root: Option<String>,
    pub extension: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDetail {
    pub metric_value: Option<MetricValue>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleArrayDetail {
    pub metric_value: Option<SampleArrayValue>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertConditionDetail {
    pub presence: Option<bool>,
    pub determination_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSignalDetail {
    pub presence: Option<AlertSignalPresence>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextDetail {
    pub association: Option<ContextAssociation>,
    pub binding_mdib_version: Option<u64>,
    pub unbinding_mdib_version: Option<u64>,
    pub binding_start_time: Option<DateTime<Utc>>,
    pub binding_end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identification: Vec<InstanceIdentifier>,
}

impl ContextDetail {
    pub fn effective_association(&self) -> ContextAssociation {
        self.association.unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationDetail {
    pub operating_mode: Option<OperatingMode>,
}

/// Kind-family specific payload of a state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StateDetail {
    Component,
    AlertSystem,
    Metric(MetricDetail),
    SampleArray(SampleArrayDetail),
    AlertCondition(AlertConditionDetail),
    AlertSignal(AlertSignalDetail),
    Context(ContextDetail),
    Operation(OperationDetail),
}

impl StateDetail {
    /// Empty payload matching `kind`.
    pub fn default_for(kind: Kind) -> Self {
        match kind {
            Kind::Mds
            | Kind::Vmd
            | Kind::Channel
            | Kind::Sco
            | Kind::SystemContext
            | Kind::Clock
            | Kind::Battery => StateDetail::Component,
            Kind::NumericMetric
            | Kind::StringMetric
            | Kind::EnumStringMetric
            | Kind::DistributionSampleArrayMetric => StateDetail::Metric(MetricDetail::default()),
            Kind::RealTimeSampleArrayMetric => StateDetail::SampleArray(SampleArrayDetail::default()),
            Kind::AlertSystem => StateDetail::AlertSystem,
            Kind::AlertCondition | Kind::LimitAlertCondition => {
                StateDetail::AlertCondition(AlertConditionDetail::default())
            }
            Kind::AlertSignal => StateDetail::AlertSignal(AlertSignalDetail::default()),
            Kind::PatientContext
            | Kind::LocationContext
            | Kind::EnsembleContext
            | Kind::WorkflowContext
            | Kind::OperatorContext
            | Kind::MeansContext => StateDetail::Context(ContextDetail::default()),
            Kind::SetValueOperation
            | Kind::SetStringOperation
            | Kind::ActivateOperation
            | Kind::SetContextStateOperation
            | Kind::SetMetricStateOperation
            | Kind::SetComponentStateOperation
            | Kind::SetAlertStateOperation => StateDetail::Operation(OperationDetail::default()),
        }
    }
}

/// A state container.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct State {
    #[serde(skip)]
    object_id: ObjectId,
    kind: Kind,
    descriptor_handle: Handle,
    handle: Option<Handle>,
    state_version: u64,
    descriptor_version: u64,
    activation_state: Option<ActivationState>,
    detail: StateDetail,
}

impl State {
    /// Default single state for `descriptor`.
    pub fn new(descriptor: &Descriptor) -> Self {
        Self::from_parts(descriptor.kind(), descriptor.handle().clone(), None)
            .with_descriptor_version(descriptor.descriptor_version())
    }

    /// Default multi-state for a context `descriptor`.
    pub fn new_context(descriptor: &Descriptor, handle: impl Into<Handle>) -> Self {
        Self::from_parts(descriptor.kind(), descriptor.handle().clone(), Some(handle.into()))
            .with_descriptor_version(descriptor.descriptor_version())
    }

    pub fn from_parts(kind: Kind, descriptor_handle: Handle, handle: Option<Handle>) -> Self {
        Self {
            object_id: ObjectId::next(),
            kind,
            descriptor_handle,
            handle,
            state_version: 0,
            descriptor_version: 0,
            activation_state: None,
            detail: StateDetail::default_for(kind),
        }
    }

    pub fn with_descriptor_version(mut self, version: u64) -> Self {
        self.descriptor_version = version;
        self
    }

    pub fn with_state_version(mut self, version: u64) -> Self {
        self.state_version = version;
        self
    }

    pub fn with_activation_state(mut self, activation: ActivationState) -> Self {
        self.activation_state = Some(activation);
        self
    }

    pub fn descriptor_handle(&self) -> &Handle {
        &self.descriptor_handle
    }

    /// Own handle; only multi-states have one.
    pub fn handle(&self) -> Option<&Handle> {
        self.handle.as_ref()
    }

    pub fn is_multi_state(&self) -> bool {
        self.kind.is_multi_state()
    }

    pub fn category(&self) -> StateCategory {
        self.kind.category()
    }

    pub fn node_type(&self) -> &'static str {
        self.kind.state_node_type()
    }

    pub fn state_version(&self) -> u64 {
        self.state_version
    }

    pub fn set_state_version(&mut self, version: u64) {
        self.state_version = version;
    }

    pub fn increment_state_version(&mut self) {
        self.state_version += 1;
    }

    pub fn descriptor_version(&self) -> u64 {
        self.descriptor_version
    }

    pub fn set_descriptor_version(&mut self, version: u64) {
        self.descriptor_version = version;
    }

    pub fn activation_state(&self) -> Option<ActivationState> {
        self.activation_state
    }

    /// Activation state with the implied `On` applied.
    pub fn effective_activation_state(&self) -> ActivationState {
        self.activation_state.unwrap_or_default()
    }

    pub fn set_activation_state(&mut self, activation: Option<ActivationState>) {
        self.activation_state = activation;
    }

    pub fn detail(&self) -> &StateDetail {
        &self.detail
    }

    pub fn detail_mut(&mut self) -> &mut StateDetail {
        &mut self.detail
    }

    pub fn as_metric(&self) -> Option<&MetricDetail> {
        match &self.detail {
            StateDetail::Metric(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_metric_mut(&mut self) -> Option<&mut MetricDetail> {
        match &mut self.detail {
            StateDetail::Metric(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sample_array(&self) -> Option<&SampleArrayDetail> {
        match &self.detail {
            StateDetail::SampleArray(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sample_array_mut(&mut self) -> Option<&mut SampleArrayDetail> {
        match &mut self.detail {
            StateDetail::SampleArray(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_alert_condition(&self) -> Option<&AlertConditionDetail> {
        match &self.detail {
            StateDetail::AlertCondition(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_alert_condition_mut(&mut self) -> Option<&mut AlertConditionDetail> {
        match &mut self.detail {
            StateDetail::AlertCondition(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_alert_signal_mut(&mut self) -> Option<&mut AlertSignalDetail> {
        match &mut self.detail {
            StateDetail::AlertSignal(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<&ContextDetail> {
        match &self.detail {
            StateDetail::Context(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_context_mut(&mut self) -> Option<&mut ContextDetail> {
        match &mut self.detail {
            StateDetail::Context(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_operation_mut(&mut self) -> Option<&mut OperationDetail> {
        match &mut self.detail {
            StateDetail::Operation(o) => Some(o),
            _ => None,
        }
    }

    /// Set the metric value of a metric state; no-op for other kinds.
    pub fn set_metric_value(&mut self, value: MetricValue) {
        if let Some(metric) = self.as_metric_mut() {
            metric.metric_value = Some(value);
        }
    }

    /// Effective alert condition presence (implied `false`).
    pub fn alert_presence(&self) -> bool {
        self.as_alert_condition()
            .and_then(|a| a.presence)
            .unwrap_or(false)
    }

    /// Effective context association (implied `NotAssociated`).
    pub fn context_association(&self) -> Option<ContextAssociation> {
        self.as_context().map(ContextDetail::effective_association)
    }

    /// A copy with a fresh object identity, detached from this container.
    pub fn detached(&self) -> Self {
        let mut copy = self.clone();
        copy.object_id = ObjectId::next();
        copy
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.descriptor_handle == other.descriptor_handle
            && self.handle == other.handle
            && self.state_version == other.state_version
            && self.descriptor_version == other.descriptor_version
            && self.activation_state == other.activation_state
            && self.detail == other.detail
    }
}

impl Entity for State {
    fn object_id(&self) -> ObjectId {
        self.object_id
    }

    fn kind(&self) -> Kind {
        self.kind
    }
}

impl Versioned for State {
    /// Single states are versioned per descriptor, multi-states per own handle.
    fn version_key(&self) -> &Handle {
        self.handle.as_ref().unwrap_or(&self.descriptor_handle)
    }

    fn version(&self) -> u64 {
        self.state_version
    }

    fn set_version(&mut self, version: u64) {
        self.state_version = version;
    }
}
