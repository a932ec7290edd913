use num_derive::FromPrimitive;

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum InitHydOption {
    NoSave = 0,       // Don't save hydraulics; don't re-initialize flows
    Save = 1,         // Save hydraulics to file, don't re-initialize flows
    InitFlow = 10,    // Don't save hydraulics; re-initialize flows
    SaveAndInit = 11, // Save hydraulics; re-initialize flows
}

impl InitHydOption {
    /// Units digit of the two-digit code: save results.
    pub fn save(self) -> bool {
        matches!(self, InitHydOption::Save | InitHydOption::SaveAndInit)
    }

    /// Tens digit of the two-digit code: re-initialize flows.
    pub fn init_flows(self) -> bool {
        matches!(self, InitHydOption::InitFlow | InitHydOption::SaveAndInit)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum AnalysisStatistic {
    Iterations = 0,    // Number of hydraulic iterations taken
    RelativeError = 1, // Sum of link flow changes / sum of link flows
    MaxHeadError = 2,  // Largest head loss error for links
    MaxFlowChange = 3, // Largest flow change in links
    MassBalance = 4,   // Cumulative water quality mass balance ratio
    DeficientNodes = 5, // Number of pressure deficient nodes
    DemandReduction = 6, // % demand reduction at pressure deficient nodes
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum ObjectType {
    Node = 0,        // Nodes
    Link = 1,        // Links
    TimePattern = 2, // Time patterns
    Curve = 3,       // Data curves
    Control = 4,     // Simple controls
    Rule = 5,        // Control rules
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[repr(u32)]
pub enum CountType {
    NodeCount = 0,    // Number of nodes (junctions + tanks + reservoirs)
    TankCount = 1,    // Number of tanks and reservoirs
    LinkCount = 2,    // Number of links (pipes + pumps + valves)
    PatternCount = 3, // Number of time patterns
    CurveCount = 4,   // Number of data curves
    ControlCount = 5, // Number of simple controls
    RuleCount = 6,    // Number of rule-based controls
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum ActionCode {
    /// Delete referencing controls, and for nodes, their connecting links
    Unconditional = 0,
    /// Cancel deletion if the object appears in controls or has connecting links
    Conditional = 1,
}
