use num_derive::FromPrimitive;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, FromPrimitive)]
#[repr(u32)]
pub enum LinkType {
    CvPipe = 0, // Pipe with check valve
    Pipe = 1,   // Pipe
    Pump = 2,   // Pump
    Prv = 3,    // Pressure reducing valve
    Psv = 4,    // Pressure sustaining valve
    Pbv = 5,    // Pressure breaker valve
    Fcv = 6,    // Flow control valve
    Tcv = 7,    // Throttle control valve
    Gpv = 8,    // General purpose valve
}

impl LinkType {
    pub fn is_valve(self) -> bool {
        self >= LinkType::Prv
    }

    /// PRV/PSV/FCV carry their own matrix assembly when active.
    pub fn is_control_valve(self) -> bool {
        matches!(self, LinkType::Prv | LinkType::Psv | LinkType::Fcv)
    }
}

/// Discrete operating mode of a link.
///
/// Ordering matters: anything at or below `Closed` conducts no flow, and
/// the diagnostic states above `Active` conduct as open links. The last
/// two states describe tanks in the status report, which shares this
/// enum the way the status vectors do.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, FromPrimitive)]
#[repr(u32)]
pub enum LinkStatus {
    XHead = 0,      // Pump cannot deliver its head (closed)
    TempClosed = 1, // Temporarily closed by tank full/empty logic
    Closed = 2,     // Closed
    Open = 3,       // Open
    Active = 4,     // Control valve holding its setting
    XFlow = 5,      // Pump cannot deliver its flow
    XPressure = 6,  // Pressure valve cannot hold its pressure
    XFcv = 7,       // Flow valve cannot hold its flow
    Filling = 8,    // Tank is filling
    Emptying = 9,   // Tank is emptying
}

impl LinkStatus {
    /// Whether the link conducts no flow.
    pub fn is_closed(self) -> bool {
        self <= LinkStatus::Closed
    }
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum PumpType {
    ConstHp = 0,   // Constant horsepower
    PowerFunc = 1, // Power function
    Custom = 2,    // User-defined custom curve
    NoCurve = 3,   // No curve
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum LinkProperty {
    Diameter = 0,     // Pipe/valve diameter
    Length = 1,       // Pipe length
    Roughness = 2,    // Pipe roughness coefficient
    MinorLoss = 3,    // Pipe/valve minor loss coefficient
    InitStatus = 4,   // Initial status
    InitSetting = 5,  // Initial pump speed or valve setting
    KBulk = 6,        // Bulk chemical reaction coefficient
    KWall = 7,        // Pipe wall chemical reaction coefficient
    Flow = 8,         // Current computed flow rate (read only)
    Velocity = 9,     // Current computed flow velocity (read only)
    HeadLoss = 10,    // Current computed head loss (read only)
    Status = 11,      // Current link status
    Setting = 12,     // Current link setting
    Energy = 13,      // Current computed pump energy usage (read only)
    LinkQual = 14,    // Current computed link quality (read only)
    PumpState = 15,   // Current computed pump state (read only)
    PumpEffic = 16,   // Current computed pump efficiency (read only)
    PumpPower = 17,   // Pump constant power rating
    PumpHCurve = 18,  // Pump head v. flow curve index
    PumpECurve = 19,  // Pump efficiency v. flow curve index
    PumpECost = 20,   // Pump average energy price
    PumpEPat = 21,    // Pump energy price time pattern index
    PumpUPat = 22,    // Pump utilization (speed) time pattern index
    GpvCurve = 23,    // GPV head loss v. flow curve index
}

/// A network link: pipe, pump or valve.
#[derive(Debug, Clone)]
pub struct Link {
    pub id: String,
    pub link_type: LinkType,
    /// Start node index.
    pub n1: usize,
    /// End node index.
    pub n2: usize,
    /// Diameter (m).
    pub diameter: f64,
    /// Length (m).
    pub length: f64,
    /// Roughness coefficient for pipes; initial speed/setting otherwise.
    pub kc: f64,
    /// Minor loss coefficient converted to head per flow squared.
    pub km: f64,
    /// Bulk reaction coefficient (1/s).
    pub kb: f64,
    /// Wall reaction coefficient (m/s for first order).
    pub kw: f64,
    /// Flow resistance, precomputed from the head loss formula.
    pub resistance: f64,
    /// Initial status.
    pub init_status: LinkStatus,
    /// Initial speed or setting for pumps and valves; `None` for a control
    /// valve whose status is fixed open or closed.
    pub init_setting: Option<f64>,
    /// Include in reports.
    pub report: bool,
}

impl Link {
    pub fn new(id: &str, link_type: LinkType, n1: usize, n2: usize) -> Self {
        let (diameter, length, kc) = match link_type {
            LinkType::CvPipe | LinkType::Pipe => (0.3048, 100.0, 100.0),
            LinkType::Pump => (0.0, 0.0, 1.0),
            _ => (0.3048, 0.0, 0.0),
        };
        let init_setting = match link_type {
            LinkType::Pump => Some(1.0),
            t if t.is_valve() => None,
            _ => None,
        };
        Link {
            id: id.to_string(),
            link_type,
            n1,
            n2,
            diameter,
            length,
            kc,
            init_setting,
            km: 0.0,
            kb: 0.0,
            kw: 0.0,
            resistance: 0.0,
            init_status: LinkStatus::Open,
            report: false,
        }
    }

    /// Interior volume (m^3); zero for pumps.
    pub fn volume(&self) -> f64 {
        std::f64::consts::PI * self.diameter * self.diameter / 4.0 * self.length
    }
}

/// Pump-specific data; parallels a link of type [`LinkType::Pump`].
#[derive(Debug, Clone)]
pub struct Pump {
    /// Index of the owning link.
    pub link: usize,
    pub ptype: PumpType,
    /// Constant power rating (kW) for [`PumpType::ConstHp`].
    pub power: f64,
    /// Shutoff head (m), scaled by speed squared.
    pub h0: f64,
    /// Head curve flow exponent.
    pub n: f64,
    /// Head curve resistance coefficient.
    pub r: f64,
    /// Design (initial) flow (m^3/s).
    pub q0: f64,
    /// Maximum flow (m^3/s).
    pub qmax: f64,
    /// Maximum head (m).
    pub hmax: f64,
    /// Head v. flow curve index (0 = none).
    pub hcurve: usize,
    /// Efficiency v. flow curve index (0 = none).
    pub ecurve: usize,
    /// Utilization (speed) pattern index (0 = none).
    pub upat: usize,
    /// Energy price pattern index (0 = none).
    pub epat: usize,
    /// Unit energy price; zero falls back to the global price.
    pub ecost: f64,
    /// Cumulative energy usage statistics:
    /// hours on-line, efficiency-hours, kWh per m^3, kWh, peak kW, cost.
    pub energy: [f64; 6],
}

impl Pump {
    pub fn new(link: usize) -> Self {
        Pump {
            link,
            ptype: PumpType::NoCurve,
            power: 0.0,
            h0: 0.0,
            n: 0.0,
            r: 0.0,
            q0: 0.0,
            qmax: 0.0,
            hmax: 0.0,
            hcurve: 0,
            ecurve: 0,
            upat: 0,
            epat: 0,
            ecost: 0.0,
            energy: [0.0; 6],
        }
    }
}

/// Valve back-reference; parallels a link whose type is a valve.
#[derive(Debug, Clone)]
pub struct Valve {
    /// Index of the owning link.
    pub link: usize,
}
