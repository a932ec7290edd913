//! Hydraulic and water-quality simulation engine for pressurized pipe
//! networks.
//!
//! A [`Project`] owns a network description (junctions, reservoirs, tanks,
//! pipes, pumps, valves, controls, patterns and reaction kinetics) and
//! computes, over a multi-day horizon, steady-state flows and pressures at
//! every instant together with the advective-reactive transport of a
//! single constituent, water age, or a source trace.
//!
//! The usual calling sequence mirrors the classic toolkit:
//!
//! ```
//! use hydronet::types::{FlowUnits, HeadLossType, InitHydOption, LinkType, NodeType};
//! # fn main() -> hydronet::Result<()> {
//! let mut ph = hydronet::Project::new("", "", FlowUnits::Lps, HeadLossType::HazenWilliams)?;
//! ph.add_node("R1", NodeType::Reservoir)?;
//! ph.add_node("J1", NodeType::Junction)?;
//! ph.add_link("P1", LinkType::Pipe, "R1", "J1")?;
//! ph.open_h()?;
//! ph.init_h(InitHydOption::NoSave)?;
//! loop {
//!     ph.run_h()?;
//!     if ph.next_h()? == 0 {
//!         break;
//!     }
//! }
//! ph.close_h()?;
//! # Ok(()) }
//! ```

pub mod error;
pub mod network;
pub mod report;
pub mod types;
pub mod units;

pub(crate) mod hydfile;
pub(crate) mod hydraulics;
pub(crate) mod quality;
pub(crate) mod rules;

mod impls;

use std::path::PathBuf;

pub use error::{EngineError, Result, Warning};
pub use quality::MassBalance;

use hydfile::{HydCache, OutputFile};
use hydraulics::{HydState, Solver};
use network::Network;
use quality::QualState;
use report::Report;
use types::*;

/// A simulation project: one network plus all solver state. Projects are
/// independent of one another; each is driven by a single thread at a
/// time.
pub struct Project {
    pub(crate) network: Network,
    pub(crate) hyd_options: options::HydOptions,
    pub(crate) qual_options: options::QualOptions,
    pub(crate) energy_options: options::EnergyOptions,
    pub(crate) times: options::TimeOptions,
    pub(crate) hyd: HydState,
    pub(crate) solver: Option<Solver>,
    pub(crate) qual: QualState,
    pub(crate) report: Report,
    pub(crate) hyd_cache: HydCache,
    pub(crate) out_file: OutputFile,
    pub(crate) out_path: Option<PathBuf>,
    pub(crate) flow_units: FlowUnits,
    pub(crate) press_units: PressUnits,
    pub(crate) open_h_flag: bool,
    pub(crate) open_q_flag: bool,
    pub(crate) save_h_flag: bool,
    pub(crate) save_q_flag: bool,
    pub(crate) hyd_from_file: bool,
    pub(crate) title: [String; 3],
}

impl Project {
    /// Creates an empty project.
    ///
    /// `report_path` and `out_path` name the report and binary output
    /// files ("" for none); `units` selects the flow unit used at the API
    /// boundary and `headloss` the head loss formula.
    pub fn new(
        report_path: &str,
        out_path: &str,
        units: FlowUnits,
        headloss: HeadLossType,
    ) -> Result<Self> {
        let out_path = if out_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(out_path))
        };
        let hyd_options = options::HydOptions {
            headloss,
            ..options::HydOptions::default()
        };
        Ok(Project {
            network: Network::new(),
            hyd_options,
            qual_options: options::QualOptions::default(),
            energy_options: options::EnergyOptions::default(),
            times: options::TimeOptions::default(),
            hyd: HydState::default(),
            solver: None,
            qual: QualState::default(),
            report: Report::new(),
            hyd_cache: HydCache::default(),
            out_file: OutputFile::default(),
            out_path,
            flow_units: units,
            press_units: PressUnits::Meters,
            open_h_flag: false,
            open_q_flag: false,
            save_h_flag: false,
            save_q_flag: false,
            hyd_from_file: false,
            title: Default::default(),
        }
        .with_report_path(report_path))
    }

    fn with_report_path(mut self, report_path: &str) -> Self {
        if !report_path.is_empty() {
            self.report.path = Some(PathBuf::from(report_path));
        }
        self
    }

    /// Flow conversion factor: one API flow unit in m^3/s.
    pub(crate) fn qcf(&self) -> f64 {
        units::flow_factor(self.flow_units)
    }

    /// Pressure conversion factor: one API pressure unit in metres.
    pub(crate) fn pcf(&self) -> f64 {
        units::pressure_factor(self.press_units)
    }

    /// Borrowed hydraulic-engine view; fails if the solver is not open.
    pub(crate) fn hyd_ctx(&mut self) -> Result<hydraulics::Hyd<'_>> {
        let sol = self
            .solver
            .as_mut()
            .ok_or(EngineError::new(error::ERR_HYD_NOT_OPENED))?;
        Ok(hydraulics::Hyd {
            net: &mut self.network,
            op: &self.hyd_options,
            en: &mut self.energy_options,
            times: &self.times,
            st: &mut self.hyd,
            sol,
            rpt: &mut self.report,
            qcf: units::flow_factor(self.flow_units),
        })
    }

    /// Borrowed quality-engine view.
    pub(crate) fn qual_ctx(&mut self) -> quality::Qual<'_> {
        quality::Qual {
            net: &mut self.network,
            op: &self.hyd_options,
            qop: &self.qual_options,
            times: &self.times,
            st: &mut self.hyd,
            qs: &mut self.qual,
            rpt: &mut self.report,
        }
    }

    /// Rejects topology mutation while a solver is open.
    pub(crate) fn check_closed(&self) -> Result<()> {
        if self.open_h_flag || self.open_q_flag {
            return Err(EngineError::new(error::ERR_SOLVER_OPEN));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::test_utils::fixtures::*;
    use crate::types::options::TimeParameter;
    use rstest::rstest;

    /// Head loss predicted by the Hazen-Williams formula (SI form).
    fn hw_headloss(length: f64, q: f64, c: f64, d: f64) -> f64 {
        10.67 * length * q.powf(1.852) / (c.powf(1.852) * d.powf(4.871))
    }

    #[test]
    fn single_pipe_matches_hazen_williams_analytically() {
        // A 100 m reservoir feeding one junction at elevation 0 through a
        // 100 m long, 100 mm pipe with C = 100 and a 1 L/s demand.
        let mut ph = Project::new("", "", FlowUnits::Lps, HeadLossType::HazenWilliams).unwrap();
        ph.add_node("R", NodeType::Reservoir).unwrap();
        ph.add_node("J", NodeType::Junction).unwrap();
        let r = ph.get_node_index("R").unwrap();
        let j = ph.get_node_index("J").unwrap();
        ph.set_node_value(r, NodeProperty::Elevation, 100.0).unwrap();
        ph.set_junction_data(j, 0.0, 1.0, "").unwrap();
        let p = ph.add_link("P", LinkType::Pipe, "R", "J").unwrap();
        ph.set_pipe_data(p, 100.0, 0.1, 100.0, 0.0).unwrap();

        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        ph.run_h().unwrap();

        let expected = 100.0 - hw_headloss(100.0, 0.001, 100.0, 0.1);
        let head = ph.get_node_value(j, NodeProperty::Head).unwrap();
        assert!(
            (head - expected).abs() < 0.01,
            "head {} vs analytical {}",
            head,
            expected
        );
        ph.close_h().unwrap();
    }

    #[test]
    fn tank_fill_event_bounds_the_time_step() {
        // An FCV feeds an empty 100 m^3 tank at 10 L/s; the selector must
        // stop at the fill event, 10000 s in.
        let mut ph = Project::new("", "", FlowUnits::Lps, HeadLossType::HazenWilliams).unwrap();
        ph.add_node("R", NodeType::Reservoir).unwrap();
        ph.add_node("J0", NodeType::Junction).unwrap();
        ph.add_node("J", NodeType::Junction).unwrap();
        ph.add_node("T", NodeType::Tank).unwrap();
        let r = ph.get_node_index("R").unwrap();
        let t = ph.get_node_index("T").unwrap();
        ph.set_node_value(r, NodeProperty::Elevation, 50.0).unwrap();
        // Tank: 5 m diameter, max level sized for Vmax = 100 m^3.
        let area = std::f64::consts::PI * 25.0 / 4.0;
        ph.set_tank_data(t, 0.0, 0.0, 0.0, 100.0 / area, 5.0, 0.0, "").unwrap();

        let p0 = ph.add_link("P0", LinkType::Pipe, "R", "J0").unwrap();
        ph.set_pipe_data(p0, 10.0, 0.3, 120.0, 0.0).unwrap();
        let v = ph.add_link("V", LinkType::Fcv, "J0", "J").unwrap();
        ph.set_link_value(v, LinkProperty::InitSetting, 10.0).unwrap();
        let p = ph.add_link("P", LinkType::Pipe, "J", "T").unwrap();
        ph.set_pipe_data(p, 10.0, 0.3, 120.0, 0.0).unwrap();

        ph.set_time_parameter(TimeParameter::Duration, 20_000).unwrap();
        ph.set_time_parameter(TimeParameter::HydStep, 20_000).unwrap();
        // Keep pattern and reporting periods from preempting the tank event.
        ph.set_time_parameter(TimeParameter::PatternStep, 20_000).unwrap();
        ph.set_time_parameter(TimeParameter::ReportStep, 20_000).unwrap();

        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        ph.run_h().unwrap();
        let flow = ph.get_link_value(v, LinkProperty::Flow).unwrap();
        assert!(approx_eq(flow, 10.0, 0.05), "FCV flow {}", flow);

        let step = ph.next_h().unwrap() as i64;
        assert!(
            (step - 10_000).abs() <= 1,
            "fill event step {} should be 10000 s",
            step
        );
        let volume = ph.get_node_value(t, NodeProperty::TankVolume).unwrap();
        assert!(approx_eq(volume, 100.0, 0.5), "tank volume {}", volume);
        ph.close_h().unwrap();
    }

    #[test]
    fn prv_cycles_active_open_active_across_demand_periods() {
        let mut ph = Project::new("", "", FlowUnits::Lps, HeadLossType::HazenWilliams).unwrap();
        ph.add_node("R", NodeType::Reservoir).unwrap();
        ph.add_node("J1", NodeType::Junction).unwrap();
        ph.add_node("J2", NodeType::Junction).unwrap();
        ph.add_node("J3", NodeType::Junction).unwrap();
        let r = ph.get_node_index("R").unwrap();
        ph.set_node_value(r, NodeProperty::Elevation, 50.0).unwrap();

        let pat = ph.add_pattern("DP").unwrap();
        ph.set_pattern(pat, &[1.0, 12.0]).unwrap();
        let j3 = ph.get_node_index("J3").unwrap();
        ph.set_junction_data(j3, 0.0, 5.0, "DP").unwrap();

        // Supply main whose friction collapses the pressure at high demand.
        let p1 = ph.add_link("P1", LinkType::Pipe, "R", "J1").unwrap();
        ph.set_pipe_data(p1, 250.0, 0.15, 100.0, 0.0).unwrap();
        let v1 = ph.add_link("V1", LinkType::Prv, "J1", "J2").unwrap();
        ph.set_link_value(v1, LinkProperty::Diameter, 0.15).unwrap();
        ph.set_link_value(v1, LinkProperty::InitSetting, 30.0).unwrap();
        let p2 = ph.add_link("P2", LinkType::Pipe, "J2", "J3").unwrap();
        ph.set_pipe_data(p2, 10.0, 0.3, 100.0, 0.0).unwrap();

        ph.set_time_parameter(TimeParameter::Duration, 3 * 3600).unwrap();
        ph.set_time_parameter(TimeParameter::HydStep, 3600).unwrap();
        ph.set_time_parameter(TimeParameter::PatternStep, 3600).unwrap();

        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        let mut statuses = Vec::new();
        loop {
            ph.run_h().unwrap();
            statuses.push(ph.hyd.status[v1 as usize]);
            // Converged with no residual oscillation.
            assert!(ph.hyd.relative_error <= ph.hyd_options.hacc + 1e-12);
            if ph.next_h().unwrap() == 0 {
                break;
            }
        }
        ph.close_h().unwrap();
        assert_eq!(
            &statuses[..3],
            &[LinkStatus::Active, LinkStatus::Open, LinkStatus::Active],
            "PRV status sequence {:?}",
            statuses
        );
    }

    #[test]
    fn dead_end_age_approaches_travel_time() {
        let mut ph = Project::new("", "", FlowUnits::Lps, HeadLossType::HazenWilliams).unwrap();
        ph.add_node("R", NodeType::Reservoir).unwrap();
        ph.add_node("J", NodeType::Junction).unwrap();
        let r = ph.get_node_index("R").unwrap();
        let j = ph.get_node_index("J").unwrap();
        ph.set_node_value(r, NodeProperty::Elevation, 100.0).unwrap();
        ph.set_junction_data(j, 0.0, 1.0, "").unwrap();
        let p = ph.add_link("P", LinkType::Pipe, "R", "J").unwrap();
        ph.set_pipe_data(p, 100.0, 0.1, 100.0, 0.0).unwrap();

        ph.set_time_parameter(TimeParameter::Duration, 24 * 3600).unwrap();
        ph.set_time_parameter(TimeParameter::HydStep, 3600).unwrap();
        ph.set_time_parameter(TimeParameter::QualStep, 300).unwrap();
        ph.set_quality_type(QualityType::Age, "", "", "").unwrap();

        ph.solve_h().unwrap();
        ph.solve_q().unwrap();

        // Travel time of the pipe at 1 L/s, in hours.
        let volume = std::f64::consts::PI * 0.01 / 4.0 * 100.0;
        let travel_hrs = volume / 0.001 / 3600.0;
        let age = ph.get_node_value(j, NodeProperty::Quality).unwrap();
        let tol = 300.0 / 3600.0;
        assert!(
            (age - travel_hrs).abs() <= tol,
            "age {} hrs vs travel time {} hrs",
            age,
            travel_hrs
        );
    }

    #[test]
    fn source_trace_splits_by_flow_fraction() {
        // Y-network: two reservoirs of equal grade feed one junction
        // through pipes of different diameter.
        let mut ph = Project::new("", "", FlowUnits::Lps, HeadLossType::HazenWilliams).unwrap();
        ph.add_node("R1", NodeType::Reservoir).unwrap();
        ph.add_node("R2", NodeType::Reservoir).unwrap();
        ph.add_node("J", NodeType::Junction).unwrap();
        for id in ["R1", "R2"] {
            let n = ph.get_node_index(id).unwrap();
            ph.set_node_value(n, NodeProperty::Elevation, 50.0).unwrap();
        }
        let j = ph.get_node_index("J").unwrap();
        ph.set_junction_data(j, 0.0, 10.0, "").unwrap();
        let p1 = ph.add_link("P1", LinkType::Pipe, "R1", "J").unwrap();
        let p2 = ph.add_link("P2", LinkType::Pipe, "R2", "J").unwrap();
        ph.set_pipe_data(p1, 300.0, 0.15, 100.0, 0.0).unwrap();
        ph.set_pipe_data(p2, 300.0, 0.10, 100.0, 0.0).unwrap();

        ph.set_time_parameter(TimeParameter::Duration, 48 * 3600).unwrap();
        ph.set_time_parameter(TimeParameter::HydStep, 3600).unwrap();
        ph.set_time_parameter(TimeParameter::QualStep, 300).unwrap();
        ph.set_quality_type(QualityType::Trace, "", "", "R1").unwrap();

        ph.solve_h().unwrap();
        ph.solve_q().unwrap();

        let q1 = ph.get_link_value(p1, LinkProperty::Flow).unwrap();
        let q2 = ph.get_link_value(p2, LinkProperty::Flow).unwrap();
        let expected = 100.0 * q1 / (q1 + q2);
        let trace = ph.get_node_value(j, NodeProperty::Quality).unwrap();
        assert!(
            (trace - expected).abs() / expected < 0.001,
            "trace {}% vs flow split {}%",
            trace,
            expected
        );
    }

    #[test]
    fn higher_priority_rule_wins_conflicting_pump_actions() {
        let mut ph = Project::new("", "", FlowUnits::Lps, HeadLossType::HazenWilliams).unwrap();
        ph.add_node("R", NodeType::Reservoir).unwrap();
        ph.add_node("J", NodeType::Junction).unwrap();
        let r = ph.get_node_index("R").unwrap();
        let j = ph.get_node_index("J").unwrap();
        ph.set_node_value(r, NodeProperty::Elevation, 10.0).unwrap();
        ph.set_junction_data(j, 0.0, 5.0, "").unwrap();
        let pump = ph.add_link("PU1", LinkType::Pump, "R", "J").unwrap();
        let hc = ph.add_curve("HC").unwrap();
        ph.set_curve(hc, &[(10.0, 30.0)]).unwrap();
        ph.set_link_value(pump, LinkProperty::PumpHCurve, hc as f64).unwrap();

        for (id, priority, speed) in [("LOW", 1.0, 0.5), ("HIGH", 5.0, 2.0)] {
            let rule = ph.add_rule(id).unwrap();
            ph.add_premise(
                rule,
                LogicalOperator::If,
                RuleObject::System,
                0,
                RuleVariable::Time,
                RuleOperator::Ge,
                None,
                0.0,
            )
            .unwrap();
            ph.add_then_action(rule, pump, None, Some(speed)).unwrap();
            ph.set_rule_priority(rule, priority).unwrap();
        }

        ph.set_time_parameter(TimeParameter::Duration, 7200).unwrap();
        ph.set_time_parameter(TimeParameter::HydStep, 3600).unwrap();
        ph.set_time_parameter(TimeParameter::RuleStep, 360).unwrap();

        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        ph.run_h().unwrap();
        ph.next_h().unwrap();

        // The priority-5 rule's speed wins; the loser is logged.
        assert_eq!(ph.hyd.setting[pump as usize], Some(2.0));
        assert!(
            ph.get_report_lines()
                .iter()
                .any(|line| line.contains("overridden") && line.contains("LOW")),
            "overridden rule not logged: {:?}",
            ph.get_report_lines()
        );
        ph.close_h().unwrap();
    }

    #[test]
    fn or_premise_starts_a_fresh_and_group() {
        // Premises encode (Time >= 0 AND Time >= forever) OR Time >= 0:
        // the first AND-group fails but the second group must still fire
        // the rule.
        let mut ph = Project::new("", "", FlowUnits::Lps, HeadLossType::HazenWilliams).unwrap();
        ph.add_node("R", NodeType::Reservoir).unwrap();
        ph.add_node("J", NodeType::Junction).unwrap();
        let r = ph.get_node_index("R").unwrap();
        let j = ph.get_node_index("J").unwrap();
        ph.set_node_value(r, NodeProperty::Elevation, 50.0).unwrap();
        ph.set_junction_data(j, 0.0, 5.0, "").unwrap();
        let p = ph.add_link("P", LinkType::Pipe, "R", "J").unwrap();
        ph.set_pipe_data(p, 100.0, 0.2, 100.0, 0.0).unwrap();

        let rule = ph.add_rule("R-OR").unwrap();
        for (logop, value) in [
            (LogicalOperator::If, 0.0),
            (LogicalOperator::And, 1.0e9),
            (LogicalOperator::Or, 0.0),
        ] {
            ph.add_premise(
                rule,
                logop,
                RuleObject::System,
                0,
                RuleVariable::Time,
                RuleOperator::Ge,
                None,
                value,
            )
            .unwrap();
        }
        ph.add_then_action(rule, p, Some(LinkStatus::Closed), None).unwrap();

        ph.set_time_parameter(TimeParameter::Duration, 7200).unwrap();
        ph.set_time_parameter(TimeParameter::HydStep, 3600).unwrap();
        ph.set_time_parameter(TimeParameter::RuleStep, 360).unwrap();

        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        ph.run_h().unwrap();
        ph.next_h().unwrap();

        assert_eq!(ph.hyd.status[p as usize], LinkStatus::Closed);
        ph.close_h().unwrap();
    }

    #[rstest]
    fn junction_flow_balance_holds(mut ph: Project) {
        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        ph.run_h().unwrap();

        for i in 1..=ph.network.njuncs() {
            let mut balance = -ph.hyd.demand[i];
            for k in 1..=ph.network.nlinks() {
                let link = ph.network.link(k);
                if link.n1 == i {
                    balance -= ph.hyd.flow[k];
                }
                if link.n2 == i {
                    balance += ph.hyd.flow[k];
                }
            }
            // Conservation holds to the convergence tolerance on the
            // total system flow.
            assert!(
                balance.abs() < 5.0e-4,
                "node {} imbalance {}",
                ph.network.node(i).id,
                balance
            );
        }
        ph.close_h().unwrap();
    }

    #[rstest]
    fn tank_volume_stays_within_bounds(mut ph: Project) {
        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        loop {
            ph.run_h().unwrap();
            for ti in 1..=ph.network.ntanks() {
                let tank = ph.network.tank(ti);
                if tank.is_reservoir() {
                    continue;
                }
                assert!(
                    tank.volume >= tank.vmin - 1e-6 && tank.volume <= tank.vmax + 1e-6,
                    "tank volume {} outside [{}, {}]",
                    tank.volume,
                    tank.vmin,
                    tank.vmax
                );
            }
            if ph.next_h().unwrap() == 0 {
                break;
            }
        }
        ph.close_h().unwrap();
    }

    #[rstest]
    fn chemical_mass_balance_closes(mut ph: Project) {
        ph.set_quality_type(QualityType::Chem, "Chlorine", "mg/L", "").unwrap();
        let r1 = ph.get_node_index("R1").unwrap();
        ph.set_node_value(r1, NodeProperty::InitQual, 1.0).unwrap();
        // First-order decay everywhere.
        for k in 1..=ph.get_count(CountType::LinkCount).unwrap() {
            let _ = ph.set_link_value(k, LinkProperty::KBulk, -0.5);
        }
        ph.solve_h().unwrap();
        ph.solve_q().unwrap();
        let ratio = ph.get_statistic(AnalysisStatistic::MassBalance).unwrap();
        assert!(
            (ratio - 1.0).abs() <= 0.01,
            "quality mass balance ratio {}",
            ratio
        );
    }

    #[rstest]
    fn zero_duration_runs_a_single_solve(mut ph: Project) {
        ph.set_time_parameter(TimeParameter::Duration, 0).unwrap();
        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        ph.run_h().unwrap();
        assert_eq!(ph.next_h().unwrap(), 0);
        ph.close_h().unwrap();
    }

    #[rstest]
    fn pump_status_follows_speed(mut ph: Project) {
        let pump = ph.add_link("PU1", LinkType::Pump, "J1", "J2").unwrap();
        let hc = ph.add_curve("HC").unwrap();
        ph.set_curve(hc, &[(20.0, 15.0)]).unwrap();
        ph.set_link_value(pump, LinkProperty::PumpHCurve, hc as f64).unwrap();
        ph.set_link_value(pump, LinkProperty::InitSetting, 0.0).unwrap();

        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        ph.run_h().unwrap();
        // Speed 0 reports closed.
        assert_eq!(ph.get_link_value(pump, LinkProperty::Status).unwrap(), 0.0);
        ph.close_h().unwrap();
    }

    #[rstest]
    fn patterns_start_at_the_configured_offset(mut ph: Project) {
        let pat = ph.add_pattern("SHIFT").unwrap();
        ph.set_pattern(pat, &[1.0, 3.0]).unwrap();
        let j1 = ph.get_node_index("J1").unwrap();
        ph.set_junction_data(j1, 20.0, 10.0, "SHIFT").unwrap();
        // Starting one pattern period in selects the second multiplier.
        ph.set_time_parameter(TimeParameter::PatternStart, 3600).unwrap();

        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        ph.run_h().unwrap();
        let demand = ph.get_node_value(j1, NodeProperty::FullDemand).unwrap();
        assert!(approx_eq(demand, 30.0, 1e-9), "demand {}", demand);
        ph.close_h().unwrap();
    }
}
