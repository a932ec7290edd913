use crate::types::options::TimeParameter;
use crate::types::*;
use crate::Project;
use rstest::fixture;

pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

#[fixture]
pub fn ph_close() -> Project {
    Project::new("", "", FlowUnits::Lps, HeadLossType::HazenWilliams)
        .expect("ERROR CREATING PROJECT")
}

/// Standard test network: a high reservoir gravity-feeding two demand
/// junctions and an elevated tank over a 24 hour horizon.
#[fixture]
pub fn ph() -> Project {
    let mut ph = ph_close();

    ph.add_node("J1", NodeType::Junction).unwrap();
    ph.add_node("J2", NodeType::Junction).unwrap();
    ph.add_node("R1", NodeType::Reservoir).unwrap();
    ph.add_node("T1", NodeType::Tank).unwrap();

    let j1 = ph.get_node_index("J1").unwrap();
    let j2 = ph.get_node_index("J2").unwrap();
    let r1 = ph.get_node_index("R1").unwrap();
    let t1 = ph.get_node_index("T1").unwrap();

    ph.set_junction_data(j1, 20.0, 10.0, "").unwrap();
    ph.set_junction_data(j2, 10.0, 5.0, "").unwrap();
    ph.set_node_value(r1, NodeProperty::Elevation, 100.0).unwrap();
    ph.set_tank_data(t1, 70.0, 2.0, 0.0, 5.0, 20.0, 0.0, "").unwrap();

    let p1 = ph.add_link("P1", LinkType::Pipe, "R1", "J1").unwrap();
    let p2 = ph.add_link("P2", LinkType::Pipe, "J1", "J2").unwrap();
    let p3 = ph.add_link("P3", LinkType::Pipe, "J2", "T1").unwrap();
    let p4 = ph.add_link("P4", LinkType::Pipe, "J1", "T1").unwrap();

    ph.set_pipe_data(p1, 1000.0, 0.30, 100.0, 0.0).unwrap();
    ph.set_pipe_data(p2, 500.0, 0.20, 100.0, 0.0).unwrap();
    ph.set_pipe_data(p3, 800.0, 0.20, 100.0, 0.0).unwrap();
    ph.set_pipe_data(p4, 1200.0, 0.15, 100.0, 0.0).unwrap();

    ph.set_time_parameter(TimeParameter::Duration, 24 * 3600).unwrap();
    ph.set_time_parameter(TimeParameter::HydStep, 3600).unwrap();
    ph.set_time_parameter(TimeParameter::QualStep, 300).unwrap();
    ph.set_time_parameter(TimeParameter::PatternStep, 3600).unwrap();
    ph.set_time_parameter(TimeParameter::ReportStep, 3600).unwrap();

    ph
}
