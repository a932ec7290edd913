use crate::types::demand::DemandModel;
use num_derive::FromPrimitive;

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum HeadLossType {
    HazenWilliams = 0, // Hazen-Williams
    DarcyWeisbach = 1, // Darcy-Weisbach
    ChezyManning = 2,  // Chezy-Manning
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[repr(u32)]
pub enum FlowUnits {
    Cfs = 0,  // Cubic feet per second
    Gpm = 1,  // Gallons per minute
    Mgd = 2,  // Million gallons per day
    Imgd = 3, // Imperial million gallons per day
    Afd = 4,  // Acre-feet per day
    Lps = 5,  // Liters per second
    Lpm = 6,  // Liters per minute
    Mld = 7,  // Million liters per day
    Cmh = 8,  // Cubic meters per hour
    Cmd = 9,  // Cubic meters per day
    Cms = 10, // Cubic meters per second
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum PressUnits {
    Psi = 0,    // Pounds per square inch
    Kpa = 1,    // Kilopascals
    Meters = 2, // Meters
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum QualityType {
    None = 0,  // No quality analysis
    Chem = 1,  // Chemical fate and transport
    Age = 2,   // Water age analysis
    Trace = 3, // Source tracing analysis
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum StatusReport {
    NoReport = 0,     // No status reporting
    NormalReport = 1, // Normal level of status reporting
    FullReport = 2,   // Full level of status reporting
}

/// Hydraulic solution options.
#[derive(Debug, Clone)]
pub struct HydOptions {
    /// Head loss formula.
    pub headloss: HeadLossType,
    /// Specific gravity.
    pub spgrav: f64,
    /// Kinematic viscosity relative to water at 20 C.
    pub viscos: f64,
    /// Maximum trials allowed for convergence.
    pub max_iter: i32,
    /// Extra trials allowed when status cycling; -1 halts instead.
    pub extra_iter: i32,
    /// Relative flow change convergence tolerance.
    pub hacc: f64,
    /// Maximum head loss error for convergence (0 = not used) (m).
    pub head_error_limit: f64,
    /// Maximum flow change for convergence (0 = not used) (m^3/s).
    pub flow_change_limit: f64,
    /// Head tolerance used by the status machines (m).
    pub htol: f64,
    /// Flow tolerance used by the status machines (m^3/s).
    pub qtol: f64,
    /// Lower bound on the head loss gradient (m per m^3/s).
    pub rqtol: f64,
    /// Frequency of periodic status checks.
    pub check_freq: i32,
    /// Iteration beyond which periodic status checks stop.
    pub max_check: i32,
    /// Convergence error below which solution damping begins.
    pub damp_limit: f64,
    /// Global demand multiplier.
    pub demand_mult: f64,
    /// Emitter discharge exponent.
    pub qexp: f64,
    /// Demand model.
    pub demand_model: DemandModel,
    /// Pressure head below which PDA demand is zero (m).
    pub pmin: f64,
    /// Pressure head at which PDA demand is fully supplied (m).
    pub preq: f64,
    /// PDA pressure exponent.
    pub pexp: f64,
}

impl Default for HydOptions {
    fn default() -> Self {
        HydOptions {
            headloss: HeadLossType::HazenWilliams,
            spgrav: 1.0,
            viscos: 1.0,
            max_iter: 200,
            extra_iter: 10,
            hacc: 0.001,
            head_error_limit: 0.0,
            flow_change_limit: 0.0,
            htol: 0.0005,
            qtol: 1.0e-5,
            rqtol: 1.0e-7,
            check_freq: 2,
            max_check: 10,
            damp_limit: 0.0,
            demand_mult: 1.0,
            qexp: 0.5,
            demand_model: DemandModel::Dda,
            pmin: 0.0,
            preq: 0.1,
            pexp: 0.5,
        }
    }
}

/// Water quality options.
#[derive(Debug, Clone)]
pub struct QualOptions {
    pub quality: QualityType,
    pub chem_name: String,
    pub chem_units: String,
    /// Trace node index for [`QualityType::Trace`].
    pub trace_node: usize,
    /// Quality tolerance for merging adjacent segments.
    pub ctol: f64,
    /// Molecular diffusivity relative to chlorine at 20 C.
    pub diffus: f64,
    /// Bulk reaction order for pipes.
    pub bulk_order: f64,
    /// Wall reaction order for pipes (0 or 1).
    pub wall_order: f64,
    /// Bulk reaction order for tanks.
    pub tank_order: f64,
    /// Limiting concentration for growth/decay reactions (0 = none).
    pub climit: f64,
    /// Global bulk reaction coefficient (1/s).
    pub kbulk: f64,
    /// Global wall reaction coefficient.
    pub kwall: f64,
}

impl Default for QualOptions {
    fn default() -> Self {
        QualOptions {
            quality: QualityType::None,
            chem_name: "Chemical".to_string(),
            chem_units: "mg/L".to_string(),
            trace_node: 0,
            ctol: 0.01,
            diffus: 1.0,
            bulk_order: 1.0,
            wall_order: 1.0,
            tank_order: 1.0,
            climit: 0.0,
            kbulk: 0.0,
            kwall: 0.0,
        }
    }
}

/// Pump energy accounting options.
#[derive(Debug, Clone)]
pub struct EnergyOptions {
    /// Global pump efficiency (percent).
    pub epump: f64,
    /// Global energy price per kWh.
    pub ecost: f64,
    /// Global energy price pattern index (0 = none).
    pub epat: usize,
    /// Demand charge per peak kW.
    pub dcost: f64,
    /// Peak system kW observed so far.
    pub emax: f64,
}

impl Default for EnergyOptions {
    fn default() -> Self {
        EnergyOptions {
            epump: 75.0,
            ecost: 0.0,
            epat: 0,
            dcost: 0.0,
            emax: 0.0,
        }
    }
}

/// Simulation clock options (all values in seconds).
#[derive(Debug, Clone)]
pub struct TimeOptions {
    /// Total simulation duration.
    pub duration: i64,
    /// Hydraulic time step.
    pub hstep: i64,
    /// Water quality time step.
    pub qstep: i64,
    /// Time pattern period.
    pub pstep: i64,
    /// Time offset at which patterns begin.
    pub pstart: i64,
    /// Reporting time step.
    pub rstep: i64,
    /// Time when reporting starts.
    pub rstart: i64,
    /// Rule evaluation time step.
    pub rulestep: i64,
    /// Clock time at simulation start.
    pub tstart: i64,
}

impl Default for TimeOptions {
    fn default() -> Self {
        TimeOptions {
            duration: 0,
            hstep: 3600,
            qstep: 360,
            pstep: 3600,
            pstart: 0,
            rstep: 3600,
            rstart: 0,
            rulestep: 360,
            tstart: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[repr(u32)]
pub enum EngineOption {
    Trials = 0,        // Maximum trials allowed for hydraulic convergence
    Accuracy = 1,      // Total normalized flow change for hydraulic convergence
    Tolerance = 2,     // Water quality tolerance
    EmitExpon = 3,     // Exponent in emitter discharge formula
    DemandMult = 4,    // Global demand multiplier
    HeadError = 5,     // Maximum head loss error for hydraulic convergence
    FlowChange = 6,    // Maximum flow change for hydraulic convergence
    HeadLossForm = 7,  // Head loss formula
    GlobalEffic = 8,   // Global pump efficiency (percent)
    GlobalPrice = 9,   // Global energy price per kWh
    GlobalPattern = 10, // Index of a global energy price pattern
    DemandCharge = 11, // Energy charge per max. kW usage
    SpGravity = 12,    // Specific gravity
    SpViscos = 13,     // Specific viscosity (relative to water at 20 deg C)
    Unbalanced = 14,   // Extra trials allowed if hydraulics don't converge
    CheckFreq = 15,    // Frequency of hydraulic status checks
    MaxCheck = 16,     // Maximum trials for status checking
    DampLimit = 17,    // Accuracy level where solution damping begins
    SpDiffus = 18,     // Specific diffusivity (relative to chlorine at 20 deg C)
    BulkOrder = 19,    // Bulk water reaction order for pipes
    WallOrder = 20,    // Wall reaction order for pipes (either 0 or 1)
    TankOrder = 21,    // Bulk water reaction order for tanks
    ConcenLimit = 22,  // Limiting concentration for growth reactions
    PressUnits = 23,   // Pressure units
    StatusReport = 24, // Type of status report to produce
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[repr(u32)]
pub enum TimeParameter {
    Duration = 0,     // Total simulation duration
    HydStep = 1,      // Hydraulic time step
    QualStep = 2,     // Water quality time step
    PatternStep = 3,  // Time pattern period
    PatternStart = 4, // Time when time patterns begin
    ReportStep = 5,   // Reporting time step
    ReportStart = 6,  // Time when reporting starts
    RuleStep = 7,     // Rule-based control evaluation time step
    StartTime = 8,    // Simulation starting time of day
    HTime = 9,        // Elapsed time of current hydraulic solution (read only)
    QTime = 10,       // Elapsed time of current quality solution (read only)
    HaltFlag = 11,    // Flag indicating if the simulation was halted (read only)
    NextEvent = 12,   // Shortest time until a tank becomes empty or full (read only)
}
