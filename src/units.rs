//! Boundary unit conversions.
//!
//! The engine computes in SI throughout: heads and elevations in metres,
//! flows in cubic metres per second, reaction coefficients per second.
//! Callers choose a flow unit and a pressure unit; the API property layer
//! applies the factors below when values cross the boundary. Nothing inside
//! the solvers ever converts units.

use crate::types::options::{FlowUnits, PressUnits};

/// Seconds per day.
pub const SEC_PER_DAY: i64 = 86_400;

/// Gravitational acceleration (m/s^2).
pub const GRAVITY: f64 = 9.81;

/// Kinematic viscosity of water at 20 C (m^2/s).
pub const VISCOSITY: f64 = 1.022e-6;

/// Molecular diffusivity of chlorine at 20 C (m^2/s).
pub const DIFFUSIVITY: f64 = 1.208e-9;

/// Factor converting one unit of flow to m^3/s.
pub fn flow_factor(units: FlowUnits) -> f64 {
    match units {
        FlowUnits::Cms => 1.0,
        FlowUnits::Lps => 1.0e-3,
        FlowUnits::Lpm => 1.0e-3 / 60.0,
        FlowUnits::Mld => 1.0e3 / SEC_PER_DAY as f64,
        FlowUnits::Cmh => 1.0 / 3600.0,
        FlowUnits::Cmd => 1.0 / SEC_PER_DAY as f64,
        FlowUnits::Cfs => 0.028316847,
        FlowUnits::Gpm => 6.30902e-5,
        FlowUnits::Mgd => 0.043812636,
        FlowUnits::Imgd => 0.052616782,
        FlowUnits::Afd => 0.014276410,
    }
}

/// Factor converting one unit of pressure to metres of head.
pub fn pressure_factor(units: PressUnits) -> f64 {
    match units {
        PressUnits::Meters => 1.0,
        PressUnits::Kpa => 1.0 / 9.80665,
        PressUnits::Psi => 0.70325,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lps_converts_to_cms() {
        assert!((flow_factor(FlowUnits::Lps) * 1000.0 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kpa_converts_to_metres() {
        // 98.0665 kPa is ten metres of water column.
        assert!((pressure_factor(PressUnits::Kpa) * 98.0665 - 10.0).abs() < 1e-9);
    }
}
