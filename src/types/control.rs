use crate::types::link::LinkStatus;
use num_derive::FromPrimitive;

/// A struct for holding simple control information.
#[derive(Debug, Clone)]
pub struct Control {
    /// The control type. (see [`ControlType`])
    pub control_type: ControlType,
    /// The index of the link to control starting from 1.
    pub link: usize,
    /// Status applied to the link when the control fires.
    pub status: LinkStatus,
    /// Setting applied to the link when the control fires (pumps and valves).
    pub setting: Option<f64>,
    /// The index of the node used to trigger the control.
    /// 0 for [`ControlType::Timer`] and [`ControlType::TimeOfDay`].
    pub node: usize,
    /// Trigger grade (tank level or junction pressure head, m).
    pub grade: f64,
    /// Trigger time (seconds) for the time-based control types.
    pub time: i64,
    /// Enabled status of the control.
    pub enabled: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum ControlType {
    /// Act when pressure or tank level drops below a setpoint
    LowLevel = 0,
    /// Act when pressure or tank level rises above a setpoint
    HiLevel = 1,
    /// Act at a prescribed elapsed amount of time
    Timer = 2,
    /// Act at a particular time of day
    TimeOfDay = 3,
}
