//! The closed catalogue of descriptor/state kinds.
//!
//! Every routing decision in the engine (which lookup table, which report,
//! which child slot of the parent) is a `match` over [`Kind`], so adding a
//! kind forces every decision to be revisited.

use serde::{Deserialize, Serialize};

/// Node type of a descriptor and of the state(s) belonging to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Mds,
    Vmd,
    Channel,
    Sco,
    SystemContext,
    Clock,
    Battery,
    NumericMetric,
    StringMetric,
    EnumStringMetric,
    RealTimeSampleArrayMetric,
    DistributionSampleArrayMetric,
    AlertSystem,
    AlertCondition,
    LimitAlertCondition,
    AlertSignal,
    PatientContext,
    LocationContext,
    EnsembleContext,
    WorkflowContext,
    OperatorContext,
    MeansContext,
    SetValueOperation,
    SetStringOperation,
    ActivateOperation,
    SetContextStateOperation,
    SetMetricStateOperation,
    SetComponentStateOperation,
    SetAlertStateOperation,
}

/// Which family of state reports a kind belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateCategory {
    Metric,
    Alert,
    Component,
    Context,
    Operational,
    RealTimeSample,
}

/// Notification type emitted for one committed transaction category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReportKind {
    DescriptionModification,
    EpisodicMetric,
    EpisodicAlert,
    EpisodicComponent,
    EpisodicContext,
    OperationalState,
    Waveform,
}

/// Container slot a descriptor occupies inside its parent.
///
/// Declaration order is the order in which the slots appear when the tree is
/// serialized, so ordering children by slot reproduces the wire layout:
/// the alert system and SCO every component carries come before the
/// MDS- and VMD-specific children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChildSlot {
    AlertSystem,
    Sco,
    SystemContext,
    Clock,
    Battery,
    Vmd,
    Channel,
    Metric,
    AlertCondition,
    AlertSignal,
    Operation,
    PatientContext,
    LocationContext,
    EnsembleContext,
    OperatorContext,
    WorkflowContext,
    MeansContext,
}

impl Kind {
    pub const ALL: [Kind; 29] = [
        Kind::Mds,
        Kind::Vmd,
        Kind::Channel,
        Kind::Sco,
        Kind::SystemContext,
        Kind::Clock,
        Kind::Battery,
        Kind::NumericMetric,
        Kind::StringMetric,
        Kind::EnumStringMetric,
        Kind::RealTimeSampleArrayMetric,
        Kind::DistributionSampleArrayMetric,
        Kind::AlertSystem,
        Kind::AlertCondition,
        Kind::LimitAlertCondition,
        Kind::AlertSignal,
        Kind::PatientContext,
        Kind::LocationContext,
        Kind::EnsembleContext,
        Kind::WorkflowContext,
        Kind::OperatorContext,
        Kind::MeansContext,
        Kind::SetValueOperation,
        Kind::SetStringOperation,
        Kind::ActivateOperation,
        Kind::SetContextStateOperation,
        Kind::SetMetricStateOperation,
        Kind::SetComponentStateOperation,
        Kind::SetAlertStateOperation,
    ];

    /// The state category this kind's states are reported in.
    pub fn category(self) -> StateCategory {
        match self {
            Kind::Mds
            | Kind::Vmd
            | Kind::Channel
            | Kind::Sco
            | Kind::SystemContext
            | Kind::Clock
            | Kind::Battery => StateCategory::Component,
            Kind::NumericMetric
            | Kind::StringMetric
            | Kind::EnumStringMetric
            | Kind::DistributionSampleArrayMetric => StateCategory::Metric,
            Kind::RealTimeSampleArrayMetric => StateCategory::RealTimeSample,
            Kind::AlertSystem
            | Kind::AlertCondition
            | Kind::LimitAlertCondition
            | Kind::AlertSignal => StateCategory::Alert,
            Kind::PatientContext
            | Kind::LocationContext
            | Kind::EnsembleContext
            | Kind::WorkflowContext
            | Kind::OperatorContext
            | Kind::MeansContext => StateCategory::Context,
            Kind::SetValueOperation
            | Kind::SetStringOperation
            | Kind::ActivateOperation
            | Kind::SetContextStateOperation
            | Kind::SetMetricStateOperation
            | Kind::SetComponentStateOperation
            | Kind::SetAlertStateOperation => StateCategory::Operational,
        }
    }

    /// Multi-state kinds may have zero or more states, each with its own handle.
    pub fn is_multi_state(self) -> bool {
        self.category() == StateCategory::Context
    }

    pub fn is_metric(self) -> bool {
        matches!(
            self.category(),
            StateCategory::Metric | StateCategory::RealTimeSample
        )
    }

    pub fn is_realtime_sample(self) -> bool {
        self == Kind::RealTimeSampleArrayMetric
    }

    pub fn is_alert(self) -> bool {
        self.category() == StateCategory::Alert
    }

    pub fn is_alert_condition(self) -> bool {
        matches!(self, Kind::AlertCondition | Kind::LimitAlertCondition)
    }

    pub fn is_component(self) -> bool {
        self.category() == StateCategory::Component
    }

    pub fn is_operational(self) -> bool {
        self.category() == StateCategory::Operational
    }

    pub fn is_context(self) -> bool {
        self.is_multi_state()
    }

    /// Slot inside the parent container, `None` for the root `Mds`.
    pub fn child_slot(self) -> Option<ChildSlot> {
        let slot = match self {
            Kind::Mds => return None,
            Kind::Vmd => ChildSlot::Vmd,
            Kind::Channel => ChildSlot::Channel,
            Kind::Sco => ChildSlot::Sco,
            Kind::SystemContext => ChildSlot::SystemContext,
            Kind::Clock => ChildSlot::Clock,
            Kind::Battery => ChildSlot::Battery,
            Kind::NumericMetric
            | Kind::StringMetric
            | Kind::EnumStringMetric
            | Kind::RealTimeSampleArrayMetric
            | Kind::DistributionSampleArrayMetric => ChildSlot::Metric,
            Kind::AlertSystem => ChildSlot::AlertSystem,
            Kind::AlertCondition | Kind::LimitAlertCondition => ChildSlot::AlertCondition,
            Kind::AlertSignal => ChildSlot::AlertSignal,
            Kind::PatientContext => ChildSlot::PatientContext,
            Kind::LocationContext => ChildSlot::LocationContext,
            Kind::EnsembleContext => ChildSlot::EnsembleContext,
            Kind::WorkflowContext => ChildSlot::WorkflowContext,
            Kind::OperatorContext => ChildSlot::OperatorContext,
            Kind::MeansContext => ChildSlot::MeansContext,
            Kind::SetValueOperation
            | Kind::SetStringOperation
            | Kind::ActivateOperation
            | Kind::SetContextStateOperation
            | Kind::SetMetricStateOperation
            | Kind::SetComponentStateOperation
            | Kind::SetAlertStateOperation => ChildSlot::Operation,
        };
        Some(slot)
    }

    /// Whether a descriptor of this kind may contain a child of kind `child`.
    pub fn accepts_child(self, child: Kind) -> bool {
        let Some(slot) = child.child_slot() else {
            return false;
        };
        match self {
            Kind::Mds => matches!(
                slot,
                ChildSlot::SystemContext
                    | ChildSlot::Clock
                    | ChildSlot::Battery
                    | ChildSlot::AlertSystem
                    | ChildSlot::Sco
                    | ChildSlot::Vmd
            ),
            Kind::Vmd => matches!(
                slot,
                ChildSlot::AlertSystem | ChildSlot::Sco | ChildSlot::Channel
            ),
            Kind::Channel => slot == ChildSlot::Metric,
            Kind::AlertSystem => {
                matches!(slot, ChildSlot::AlertCondition | ChildSlot::AlertSignal)
            }
            Kind::Sco => slot == ChildSlot::Operation,
            Kind::SystemContext => matches!(
                slot,
                ChildSlot::PatientContext
                    | ChildSlot::LocationContext
                    | ChildSlot::EnsembleContext
                    | ChildSlot::OperatorContext
                    | ChildSlot::WorkflowContext
                    | ChildSlot::MeansContext
            ),
            _ => false,
        }
    }

    /// Qualified BICEPS element name of the descriptor.
    pub fn descriptor_node_type(self) -> &'static str {
        match self {
            Kind::Mds => "pm:MdsDescriptor",
            Kind::Vmd => "pm:VmdDescriptor",
            Kind::Channel => "pm:ChannelDescriptor",
            Kind::Sco => "pm:ScoDescriptor",
            Kind::SystemContext => "pm:SystemContextDescriptor",
            Kind::Clock => "pm:ClockDescriptor",
            Kind::Battery => "pm:BatteryDescriptor",
            Kind::NumericMetric => "pm:NumericMetricDescriptor",
            Kind::StringMetric => "pm:StringMetricDescriptor",
            Kind::EnumStringMetric => "pm:EnumStringMetricDescriptor",
            Kind::RealTimeSampleArrayMetric => "pm:RealTimeSampleArrayMetricDescriptor",
            Kind::DistributionSampleArrayMetric => "pm:DistributionSampleArrayMetricDescriptor",
            Kind::AlertSystem => "pm:AlertSystemDescriptor",
            Kind::AlertCondition => "pm:AlertConditionDescriptor",
            Kind::LimitAlertCondition => "pm:LimitAlertConditionDescriptor",
            Kind::AlertSignal => "pm:AlertSignalDescriptor",
            Kind::PatientContext => "pm:PatientContextDescriptor",
            Kind::LocationContext => "pm:LocationContextDescriptor",
            Kind::EnsembleContext => "pm:EnsembleContextDescriptor",
            Kind::WorkflowContext => "pm:WorkflowContextDescriptor",
            Kind::OperatorContext => "pm:OperatorContextDescriptor",
            Kind::MeansContext => "pm:MeansContextDescriptor",
            Kind::SetValueOperation => "pm:SetValueOperationDescriptor",
            Kind::SetStringOperation => "pm:SetStringOperationDescriptor",
            Kind::ActivateOperation => "pm:ActivateOperationDescriptor",
            Kind::SetContextStateOperation => "pm:SetContextStateOperationDescriptor",
            Kind::SetMetricStateOperation => "pm:SetMetricStateOperationDescriptor",
            Kind::SetComponentStateOperation => "pm:SetComponentStateOperationDescriptor",
            Kind::SetAlertStateOperation => "pm:SetAlertStateOperationDescriptor",
        }
    }

    /// Qualified BICEPS element name of the state.
    pub fn state_node_type(self) -> &'static str {
        match self {
            Kind::Mds => "pm:MdsState",
            Kind::Vmd => "pm:VmdState",
            Kind::Channel => "pm:ChannelState",
            Kind::Sco => "pm:ScoState",
            Kind::SystemContext => "pm:SystemContextState",
            Kind::Clock => "pm:ClockState",
            Kind::Battery => "pm:BatteryState",
            Kind::NumericMetric => "pm:NumericMetricState",
            Kind::StringMetric => "pm:StringMetricState",
            Kind::EnumStringMetric => "pm:EnumStringMetricState",
            Kind::RealTimeSampleArrayMetric => "pm:RealTimeSampleArrayMetricState",
            Kind::DistributionSampleArrayMetric => "pm:DistributionSampleArrayMetricState",
            Kind::AlertSystem => "pm:AlertSystemState",
            Kind::AlertCondition => "pm:AlertConditionState",
            Kind::LimitAlertCondition => "pm:LimitAlertConditionState",
            Kind::AlertSignal => "pm:AlertSignalState",
            Kind::PatientContext => "pm:PatientContextState",
            Kind::LocationContext => "pm:LocationContextState",
            Kind::EnsembleContext => "pm:EnsembleContextState",
            Kind::WorkflowContext => "pm:WorkflowContextState",
            Kind::OperatorContext => "pm:OperatorContextState",
            Kind::MeansContext => "pm:MeansContextState",
            Kind::SetValueOperation => "pm:SetValueOperationState",
            Kind::SetStringOperation => "pm:SetStringOperationState",
            Kind::ActivateOperation => "pm:ActivateOperationState",
            Kind::SetContextStateOperation => "pm:SetContextStateOperationState",
            Kind::SetMetricStateOperation => "pm:SetMetricStateOperationState",
            Kind::SetComponentStateOperation => "pm:SetComponentStateOperationState",
            Kind::SetAlertStateOperation => "pm:SetAlertStateOperationState",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptor_node_type())
    }
}

impl StateCategory {
    pub const ALL: [StateCategory; 6] = [
        StateCategory::Metric,
        StateCategory::Alert,
        StateCategory::Component,
        StateCategory::Context,
        StateCategory::Operational,
        StateCategory::RealTimeSample,
    ];

    pub fn report_kind(self) -> ReportKind {
        match self {
            StateCategory::Metric => ReportKind::EpisodicMetric,
            StateCategory::Alert => ReportKind::EpisodicAlert,
            StateCategory::Component => ReportKind::EpisodicComponent,
            StateCategory::Context => ReportKind::EpisodicContext,
            StateCategory::Operational => ReportKind::OperationalState,
            StateCategory::RealTimeSample => ReportKind::Waveform,
        }
    }
}

impl std::fmt::Display for StateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StateCategory::Metric => "metric",
            StateCategory::Alert => "alert",
            StateCategory::Component => "component",
            StateCategory::Context => "context",
            StateCategory::Operational => "operational",
            StateCategory::RealTimeSample => "rt-sample",
        };
        f.write_str(name)
    }
}
