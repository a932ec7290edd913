pub mod analysis;
pub mod control;
pub mod curve;
pub mod demand;
pub mod link;
pub mod node;
pub mod options;
pub mod pattern;
pub mod rule;

pub use analysis::{ActionCode, AnalysisStatistic, CountType, InitHydOption, ObjectType};
pub use control::{Control, ControlType};
pub use curve::{Curve, CurveType};
pub use demand::{Demand, DemandModel};
pub use link::{Link, LinkProperty, LinkStatus, LinkType, Pump, PumpType, Valve};
pub use node::{MixingModel, Node, NodeProperty, NodeType, Source, SourceType, Tank};
pub use options::{
    EnergyOptions, EngineOption, FlowUnits, HeadLossType, HydOptions, PressUnits, QualOptions,
    QualityType, StatusReport, TimeOptions, TimeParameter,
};
pub use pattern::Pattern;
pub use rule::{
    ActionClause, LogicalOperator, Premise, Rule, RuleObject, RuleOperator, RuleStatus,
    RuleVariable,
};

/// Max ID size
pub const MAX_ID_SIZE: usize = 31;
/// Max message size
pub const MAX_MSG_SIZE: usize = 255;

/// Max project title size.
pub const MAX_TITLE_SIZE: usize = 79;
