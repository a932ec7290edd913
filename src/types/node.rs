use crate::types::demand::Demand;
use num_derive::FromPrimitive;

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum MixingModel {
    Mix1 = 0, // Complete mix model
    Mix2 = 1, // 2-compartment model
    Fifo = 2, // First in, first out model
    Lifo = 3, // Last in, first out model
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum NodeType {
    Junction = 0,  // Junction node
    Reservoir = 1, // Reservoir node
    Tank = 2,      // Storage tank node
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum SourceType {
    Concen = 0,    // Sets the concentration of external inflow entering a node
    Mass = 1,      // Injects a given mass/minute into a node
    Setpoint = 2,  // Sets the concentration leaving a node to a given value
    FlowPaced = 3, // Adds a given value to the concentration leaving a node
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum NodeProperty {
    Elevation = 0,     // Elevation
    BaseDemand = 1,    // Primary demand baseline value
    Pattern = 2,       // Primary demand time pattern index
    Emitter = 3,       // Emitter flow coefficient
    InitQual = 4,      // Initial quality
    SourceQual = 5,    // Quality source strength
    SourcePat = 6,     // Quality source pattern index
    SourceType = 7,    // Quality source type
    TankLevel = 8,     // Current computed tank water level (read only)
    Demand = 9,        // Current computed demand (read only)
    Head = 10,         // Current computed hydraulic head (read only)
    Pressure = 11,     // Current computed pressure (read only)
    Quality = 12,      // Current computed quality (read only)
    SourceMass = 13,   // Current computed quality source mass inflow (read only)
    InitVolume = 14,   // Tank initial volume (read only)
    MixModel = 15,     // Tank mixing model
    MixZoneVol = 16,   // Tank mixing zone volume (read only)
    TankDiam = 17,     // Tank diameter
    MinVolume = 18,    // Tank minimum volume
    VolCurve = 19,     // Tank volume curve index
    MinLevel = 20,     // Tank minimum level
    MaxLevel = 21,     // Tank maximum level
    MixFraction = 22,  // Tank mixing fraction
    TankKBulk = 23,    // Tank bulk decay coefficient
    TankVolume = 24,   // Current computed tank volume (read only)
    MaxVolume = 25,    // Tank maximum volume (read only)
    CanOverflow = 26,  // Tank can overflow (= 1) or not (= 0)
    DemandDeficit = 27, // Amount that full demand is reduced under PDA (read only)
    EmitterFlow = 28,  // Current emitter flow (read only)
    DemandFlow = 29,   // Current consumer demand delivered (read only)
    FullDemand = 30,   // Current consumer demand requested (read only)
}

/// A water quality source attached to a node.
#[derive(Debug, Clone)]
pub struct Source {
    /// Source strength: a concentration, or a mass rate for [`SourceType::Mass`].
    pub strength: f64,
    /// Source type.
    pub source_type: SourceType,
    /// Strength time pattern index (0 = none).
    pub pattern: usize,
    /// Mass inflow accumulated over the current quality run (read only).
    pub mass_added: f64,
}

/// A network node: junction, reservoir or tank.
///
/// Nodes are stored junctions-first; tank and reservoir data beyond the
/// shared fields live in the [`Tank`] records that parallel the tail of the
/// node list.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    /// Elevation (m).
    pub elevation: f64,
    /// Demand categories (junctions only).
    pub demands: Vec<Demand>,
    /// Emitter discharge coefficient (flow units per metre^qexp).
    pub emitter_coeff: f64,
    /// Initial quality.
    pub init_quality: f64,
    /// Optional water quality source.
    pub source: Option<Source>,
    /// Include in reports.
    pub report: bool,
}

impl Node {
    pub fn new(id: &str, node_type: NodeType) -> Self {
        Node {
            id: id.to_string(),
            node_type,
            elevation: 0.0,
            demands: Vec::new(),
            emitter_coeff: 0.0,
            init_quality: 0.0,
            source: None,
            report: false,
        }
    }
}

/// Extra state for a fixed-grade node. A reservoir is a tank with zero area.
#[derive(Debug, Clone)]
pub struct Tank {
    /// Index of the owning node.
    pub node: usize,
    /// Initial grade (elevation + initial level, m).
    pub h0: f64,
    /// Minimum grade (m).
    pub hmin: f64,
    /// Maximum grade (m).
    pub hmax: f64,
    /// Cross-sectional area (m^2); zero marks a reservoir.
    pub area: f64,
    /// Minimum volume (m^3).
    pub vmin: f64,
    /// Maximum volume (m^3).
    pub vmax: f64,
    /// Initial volume (m^3).
    pub v0: f64,
    /// Volume curve index (0 = none).
    pub vol_curve: usize,
    /// Head pattern for reservoirs (0 = none).
    pub pattern: usize,
    /// Mixing model for quality transport.
    pub mix_model: MixingModel,
    /// Mixing-zone fraction of total volume for the 2-compartment model.
    pub mix_fraction: f64,
    /// Bulk reaction coefficient (1/s).
    pub kb: f64,
    /// Whether the tank is allowed to overflow when full.
    pub can_overflow: bool,
    /// Current volume (m^3).
    pub volume: f64,
    /// Current quality.
    pub concentration: f64,
}

impl Tank {
    /// A reservoir: fixed grade, no storage.
    pub fn reservoir(node: usize) -> Self {
        Tank {
            node,
            h0: 0.0,
            hmin: 0.0,
            hmax: 0.0,
            area: 0.0,
            vmin: 0.0,
            vmax: 0.0,
            v0: 0.0,
            vol_curve: 0,
            pattern: 0,
            mix_model: MixingModel::Mix1,
            mix_fraction: 1.0,
            kb: 0.0,
            can_overflow: false,
            volume: 0.0,
            concentration: 0.0,
        }
    }

    /// A cylindrical tank with default one-metre dimensions.
    pub fn tank(node: usize) -> Self {
        let area = std::f64::consts::PI / 4.0;
        Tank {
            area,
            vmax: area,
            v0: area / 2.0,
            h0: 0.5,
            hmax: 1.0,
            volume: area / 2.0,
            ..Tank::reservoir(node)
        }
    }

    pub fn is_reservoir(&self) -> bool {
        self.area == 0.0
    }

    /// Equivalent diameter from the cross-sectional area.
    pub fn diameter(&self) -> f64 {
        (4.0 * self.area / std::f64::consts::PI).sqrt()
    }
}
