use crate::types::link::LinkStatus;
use num_derive::FromPrimitive;

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum RuleObject {
    Node = 0,   // Clause refers to a node
    Link = 1,   // Clause refers to a link
    System = 2, // Clause refers to a system parameter (e.g., time)
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum RuleVariable {
    Demand = 0,    // Nodal demand
    Head = 1,      // Nodal hydraulic head
    Grade = 2,     // Nodal hydraulic grade
    Level = 3,     // Tank water level
    Pressure = 4,  // Nodal pressure
    Flow = 5,      // Link flow rate
    Status = 6,    // Link status
    Setting = 7,   // Link setting
    Power = 8,     // Pump power output
    Time = 9,      // Elapsed simulation time
    ClockTime = 10, // Time of day
    FillTime = 11, // Time to fill a tank
    DrainTime = 12, // Time to drain a tank
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum RuleOperator {
    Eq = 0,    // Equal to
    Ne = 1,    // Not equal
    Le = 2,    // Less than or equal to
    Ge = 3,    // Greater than or equal to
    Lt = 4,    // Less than
    Gt = 5,    // Greater than
    Is = 6,    // Is equal to
    Not = 7,   // Is not equal to
    Below = 8, // Is below
    Above = 9, // Is above
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum RuleStatus {
    IsOpen = 1,   // Link is open
    IsClosed = 2, // Link is closed
    IsActive = 3, // Control valve is active
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum LogicalOperator {
    If = 1,
    And = 2,
    Or = 3,
}

/// A rule-based control: premises, actions and a priority.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub premises: Vec<Premise>,
    pub then_actions: Vec<ActionClause>,
    pub else_actions: Vec<ActionClause>,
    /// Higher priority wins when several rules act on the same link.
    pub priority: f64,
    pub enabled: bool,
}

impl Rule {
    pub fn new(id: &str) -> Self {
        Rule {
            id: id.to_string(),
            premises: Vec::new(),
            then_actions: Vec::new(),
            else_actions: Vec::new(),
            priority: 0.0,
            enabled: true,
        }
    }
}

/// One premise of a rule. `And` binds tighter than `Or`.
#[derive(Debug, Clone)]
pub struct Premise {
    pub logop: LogicalOperator,
    pub object: RuleObject,
    /// Node or link index; unused for system premises.
    pub index: usize,
    pub variable: RuleVariable,
    pub operator: RuleOperator,
    /// Compared status for status premises.
    pub status: Option<RuleStatus>,
    /// Compared value for numeric premises.
    pub value: f64,
}

/// One THEN/ELSE action of a rule.
#[derive(Debug, Clone)]
pub struct ActionClause {
    pub link: usize,
    pub status: Option<LinkStatus>,
    pub setting: Option<f64>,
}
