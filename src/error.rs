//! Error codes and the crate-wide error type.
//!
//! Every API entry point returns a numeric error code wrapped in
//! [`EngineError`]. Warnings are non-fatal: they are written to the report
//! log and recorded in the project's warning flag.

use thiserror::Error;

/// Engine errors carry a numeric code and a descriptive message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error {code}: {message}")]
pub struct EngineError {
    pub code: i32,
    pub message: String,
}

/// Result type with engine-specific errors.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn new(code: i32) -> Self {
        EngineError {
            code,
            message: error_message(code).to_string(),
        }
    }

    /// Returns the numeric error code.
    pub fn code(&self) -> i32 {
        self.code
    }
}

impl From<i32> for EngineError {
    fn from(code: i32) -> Self {
        EngineError::new(code)
    }
}

/// System errors (101-120).
pub const ERR_MEMORY: i32 = 101;
pub const ERR_NO_DATA: i32 = 102;
pub const ERR_HYD_NOT_OPENED: i32 = 103;
pub const ERR_NO_HYDRAULICS: i32 = 104;
pub const ERR_QUAL_NOT_OPENED: i32 = 105;
pub const ERR_NO_RESULTS: i32 = 106;
pub const ERR_HYD_FILE_IN_USE: i32 = 107;
pub const ERR_SOLVER_OPEN: i32 = 109;
pub const ERR_HYD_EQNS: i32 = 110;
pub const ERR_QUAL_EQNS: i32 = 120;

/// Input errors (200-251).
pub const ERR_SYNTAX: i32 = 201;
pub const ERR_ILLEGAL_NUMBER: i32 = 202;
pub const ERR_UNDEF_NODE: i32 = 203;
pub const ERR_UNDEF_LINK: i32 = 204;
pub const ERR_UNDEF_PATTERN: i32 = 205;
pub const ERR_UNDEF_CURVE: i32 = 206;
pub const ERR_CONTROL_CV: i32 = 207;
pub const ERR_ILLEGAL_NODE_VALUE: i32 = 209;
pub const ERR_ILLEGAL_LINK_VALUE: i32 = 211;
pub const ERR_UNDEF_TRACE_NODE: i32 = 212;
pub const ERR_TOO_LONG: i32 = 214;
pub const ERR_DUPLICATE_ID: i32 = 215;
pub const ERR_VALVE_TANK: i32 = 219;
pub const ERR_VALVE_VALVE: i32 = 220;
pub const ERR_RULE_CLAUSE: i32 = 221;
pub const ERR_SAME_ENDPOINTS: i32 = 222;
pub const ERR_TOO_FEW_NODES: i32 = 223;
pub const ERR_NO_FIXED_GRADE: i32 = 224;
pub const ERR_TANK_LEVELS: i32 = 225;
pub const ERR_NO_PUMP_CURVE: i32 = 226;
pub const ERR_PUMP_CURVE: i32 = 227;
pub const ERR_CURVE_SEQUENCE: i32 = 230;
pub const ERR_DISCONNECTED: i32 = 233;
pub const ERR_UNDEF_SOURCE: i32 = 240;
pub const ERR_UNDEF_CONTROL: i32 = 241;
pub const ERR_IN_USE: i32 = 242;
pub const ERR_ARGUMENT: i32 = 250;
pub const ERR_PARAM_CODE: i32 = 251;

/// File errors (301-309).
pub const ERR_HYD_FILE_OPEN: i32 = 305;
pub const ERR_HYD_FILE_FORMAT: i32 = 306;
pub const ERR_HYD_FILE_READ: i32 = 307;
pub const ERR_FILE_SAVE: i32 = 308;

/// Lockstep hydraulics/quality driver errors.
pub const ERR_QSTEP_HSTEP: i32 = 401;

/// Runtime warning codes, in increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum Warning {
    None = 0,
    /// A pump is operating outside its curve range.
    PumpOutsideCurve = 1,
    /// Negative pressure at a junction with demand.
    NegativePressure = 2,
    /// A control valve could not maintain its pressure or flow setting.
    ValveNotMaintained = 3,
    /// The network is disconnected at the current instant.
    Disconnected = 4,
    /// Hydraulic equations did not fully balance.
    Unbalanced = 5,
}

pub(crate) fn error_message(code: i32) -> &'static str {
    match code {
        ERR_MEMORY => "insufficient memory",
        ERR_NO_DATA => "no network data available",
        ERR_HYD_NOT_OPENED => "hydraulics solver not opened",
        ERR_NO_HYDRAULICS => "no hydraulics for water quality analysis",
        ERR_QUAL_NOT_OPENED => "water quality solver not opened",
        ERR_NO_RESULTS => "no results saved to report on",
        ERR_HYD_FILE_IN_USE => "hydraulics supplied from external file",
        ERR_SOLVER_OPEN => "cannot change data while a solver is open",
        ERR_HYD_EQNS => "cannot solve network hydraulic equations",
        ERR_QUAL_EQNS => "cannot solve water quality transport equations",
        ERR_SYNTAX => "syntax error",
        ERR_ILLEGAL_NUMBER => "illegal numeric value",
        ERR_UNDEF_NODE => "undefined node",
        ERR_UNDEF_LINK => "undefined link",
        ERR_UNDEF_PATTERN => "undefined time pattern",
        ERR_UNDEF_CURVE => "undefined curve",
        ERR_CONTROL_CV => "attempt to control a check valve pipe",
        ERR_ILLEGAL_NODE_VALUE => "illegal value for a node property",
        ERR_ILLEGAL_LINK_VALUE => "illegal value for a link property",
        ERR_UNDEF_TRACE_NODE => "undefined trace node",
        ERR_TOO_LONG => "ID string is too long",
        ERR_DUPLICATE_ID => "duplicate ID",
        ERR_VALVE_TANK => "valve illegally connected to a tank or reservoir",
        ERR_VALVE_VALVE => "valve illegally connected to another valve",
        ERR_RULE_CLAUSE => "misplaced clause in a rule",
        ERR_SAME_ENDPOINTS => "link has the same start and end nodes",
        ERR_TOO_FEW_NODES => "not enough nodes in the network",
        ERR_NO_FIXED_GRADE => "no tanks or reservoirs in the network",
        ERR_TANK_LEVELS => "invalid lower/upper levels for a tank",
        ERR_NO_PUMP_CURVE => "no head curve or power rating for a pump",
        ERR_PUMP_CURVE => "invalid head curve for a pump",
        ERR_CURVE_SEQUENCE => "nonincreasing x-values for a curve",
        ERR_DISCONNECTED => "network has an unconnected node",
        ERR_UNDEF_SOURCE => "undefined water quality source",
        ERR_UNDEF_CONTROL => "undefined control",
        ERR_IN_USE => "object is referenced by a control or rule",
        ERR_ARGUMENT => "invalid function argument",
        ERR_PARAM_CODE => "invalid parameter code",
        ERR_HYD_FILE_OPEN => "cannot open hydraulics file",
        ERR_HYD_FILE_FORMAT => "hydraulics file does not match network data",
        ERR_HYD_FILE_READ => "cannot read hydraulics file",
        ERR_FILE_SAVE => "cannot save results to file",
        ERR_QSTEP_HSTEP => "quality time step must evenly divide hydraulic time step",
        _ => "unknown error",
    }
}

pub(crate) fn warning_message(w: Warning) -> &'static str {
    match w {
        Warning::None => "",
        Warning::PumpOutsideCurve => "pump operating outside of its curve range",
        Warning::NegativePressure => "negative pressures at demand nodes",
        Warning::ValveNotMaintained => "valve unable to maintain its setting",
        Warning::Disconnected => "network is disconnected",
        Warning::Unbalanced => "hydraulic equations unbalanced",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_carries_code_and_message() {
        let err = EngineError::new(ERR_DUPLICATE_ID);
        assert_eq!(err.code(), 215);
        assert_eq!(format!("{}", err), "Error 215: duplicate ID");
    }

    #[test]
    fn warnings_order_by_severity() {
        assert!(Warning::Unbalanced > Warning::NegativePressure);
        assert!(Warning::None < Warning::PumpOutsideCurve);
    }
}
