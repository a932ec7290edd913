//! Analysis option and time parameter API methods.

use num_traits::FromPrimitive;

use crate::error::*;
use crate::types::options::{EngineOption, TimeParameter};
use crate::types::*;
use crate::Project;

/// ## Analysis Option APIs
impl Project {
    /// Retrieves the value of an analysis option.
    pub fn get_option(&self, option: EngineOption) -> Result<f64> {
        let value = match option {
            EngineOption::Trials => self.hyd_options.max_iter as f64,
            EngineOption::Accuracy => self.hyd_options.hacc,
            EngineOption::Tolerance => self.qual_options.ctol,
            EngineOption::EmitExpon => self.hyd_options.qexp,
            EngineOption::DemandMult => self.hyd_options.demand_mult,
            EngineOption::HeadError => self.hyd_options.head_error_limit,
            EngineOption::FlowChange => self.hyd_options.flow_change_limit / self.qcf(),
            EngineOption::HeadLossForm => self.hyd_options.headloss as u32 as f64,
            EngineOption::GlobalEffic => self.energy_options.epump,
            EngineOption::GlobalPrice => self.energy_options.ecost,
            EngineOption::GlobalPattern => self.energy_options.epat as f64,
            EngineOption::DemandCharge => self.energy_options.dcost,
            EngineOption::SpGravity => self.hyd_options.spgrav,
            EngineOption::SpViscos => self.hyd_options.viscos,
            EngineOption::Unbalanced => self.hyd_options.extra_iter as f64,
            EngineOption::CheckFreq => self.hyd_options.check_freq as f64,
            EngineOption::MaxCheck => self.hyd_options.max_check as f64,
            EngineOption::DampLimit => self.hyd_options.damp_limit,
            EngineOption::SpDiffus => self.qual_options.diffus,
            EngineOption::BulkOrder => self.qual_options.bulk_order,
            EngineOption::WallOrder => self.qual_options.wall_order,
            EngineOption::TankOrder => self.qual_options.tank_order,
            EngineOption::ConcenLimit => self.qual_options.climit,
            EngineOption::PressUnits => self.press_units as u32 as f64,
            EngineOption::StatusReport => self.report.statflag as u32 as f64,
        };
        Ok(value)
    }

    /// Sets the value of an analysis option.
    pub fn set_option(&mut self, option: EngineOption, value: f64) -> Result<()> {
        match option {
            EngineOption::Trials => {
                if value < 1.0 {
                    return Err(EngineError::new(ERR_ARGUMENT));
                }
                self.hyd_options.max_iter = value as i32;
            }
            EngineOption::Accuracy => {
                if value <= 0.0 {
                    return Err(EngineError::new(ERR_ARGUMENT));
                }
                self.hyd_options.hacc = value;
            }
            EngineOption::Tolerance => {
                if value < 0.0 {
                    return Err(EngineError::new(ERR_ARGUMENT));
                }
                self.qual_options.ctol = value;
            }
            EngineOption::EmitExpon => {
                if value <= 0.0 {
                    return Err(EngineError::new(ERR_ARGUMENT));
                }
                self.hyd_options.qexp = value;
            }
            EngineOption::DemandMult => self.hyd_options.demand_mult = value,
            EngineOption::HeadError => self.hyd_options.head_error_limit = value.max(0.0),
            EngineOption::FlowChange => {
                self.hyd_options.flow_change_limit = value.max(0.0) * self.qcf()
            }
            EngineOption::HeadLossForm => {
                self.check_closed()?;
                self.hyd_options.headloss =
                    HeadLossType::from_f64(value).ok_or(EngineError::new(ERR_PARAM_CODE))?;
            }
            EngineOption::GlobalEffic => self.energy_options.epump = value.clamp(1.0, 100.0),
            EngineOption::GlobalPrice => self.energy_options.ecost = value,
            EngineOption::GlobalPattern => {
                let pat = value.round() as usize;
                if pat > self.network.patterns.len() {
                    return Err(EngineError::new(ERR_UNDEF_PATTERN));
                }
                self.energy_options.epat = pat;
            }
            EngineOption::DemandCharge => self.energy_options.dcost = value,
            EngineOption::SpGravity => {
                if value <= 0.0 {
                    return Err(EngineError::new(ERR_ARGUMENT));
                }
                self.hyd_options.spgrav = value;
            }
            EngineOption::SpViscos => {
                if value <= 0.0 {
                    return Err(EngineError::new(ERR_ARGUMENT));
                }
                self.hyd_options.viscos = value;
            }
            EngineOption::Unbalanced => self.hyd_options.extra_iter = value as i32,
            EngineOption::CheckFreq => self.hyd_options.check_freq = (value as i32).max(1),
            EngineOption::MaxCheck => self.hyd_options.max_check = (value as i32).max(1),
            EngineOption::DampLimit => self.hyd_options.damp_limit = value.max(0.0),
            EngineOption::SpDiffus => self.qual_options.diffus = value.max(0.0),
            EngineOption::BulkOrder => self.qual_options.bulk_order = value,
            EngineOption::WallOrder => {
                if value != 0.0 && value != 1.0 {
                    return Err(EngineError::new(ERR_ARGUMENT));
                }
                self.qual_options.wall_order = value;
            }
            EngineOption::TankOrder => self.qual_options.tank_order = value,
            EngineOption::ConcenLimit => self.qual_options.climit = value.max(0.0),
            EngineOption::PressUnits => {
                self.press_units =
                    PressUnits::from_f64(value).ok_or(EngineError::new(ERR_PARAM_CODE))?;
            }
            EngineOption::StatusReport => {
                self.report.statflag =
                    StatusReport::from_f64(value).ok_or(EngineError::new(ERR_PARAM_CODE))?;
            }
        }
        Ok(())
    }

    /// Retrieves a time parameter, in seconds.
    pub fn get_time_parameter(&self, param: TimeParameter) -> Result<i64> {
        let value = match param {
            TimeParameter::Duration => self.times.duration,
            TimeParameter::HydStep => self.times.hstep,
            TimeParameter::QualStep => self.times.qstep,
            TimeParameter::PatternStep => self.times.pstep,
            TimeParameter::PatternStart => self.times.pstart,
            TimeParameter::ReportStep => self.times.rstep,
            TimeParameter::ReportStart => self.times.rstart,
            TimeParameter::RuleStep => self.times.rulestep,
            TimeParameter::StartTime => self.times.tstart,
            TimeParameter::HTime => self.hyd.htime,
            TimeParameter::QTime => self.qual.qtime,
            TimeParameter::HaltFlag => self.hyd.halt as i64,
            TimeParameter::NextEvent => self.next_tank_event(),
        };
        Ok(value)
    }

    /// Sets a time parameter, in seconds. Read-only parameters and
    /// nonsensical values are rejected with error 251/202.
    pub fn set_time_parameter(&mut self, param: TimeParameter, value: i64) -> Result<()> {
        if value < 0 {
            return Err(EngineError::new(ERR_ILLEGAL_NUMBER));
        }
        match param {
            TimeParameter::Duration => self.times.duration = value,
            TimeParameter::HydStep => {
                if value == 0 {
                    return Err(EngineError::new(ERR_ILLEGAL_NUMBER));
                }
                self.times.hstep = value;
            }
            TimeParameter::QualStep => {
                if value == 0 {
                    return Err(EngineError::new(ERR_ILLEGAL_NUMBER));
                }
                self.times.qstep = value;
            }
            TimeParameter::PatternStep => {
                if value == 0 {
                    return Err(EngineError::new(ERR_ILLEGAL_NUMBER));
                }
                self.times.pstep = value;
            }
            TimeParameter::PatternStart => self.times.pstart = value,
            TimeParameter::ReportStep => {
                if value == 0 {
                    return Err(EngineError::new(ERR_ILLEGAL_NUMBER));
                }
                self.times.rstep = value;
            }
            TimeParameter::ReportStart => self.times.rstart = value,
            TimeParameter::RuleStep => {
                if value == 0 {
                    return Err(EngineError::new(ERR_ILLEGAL_NUMBER));
                }
                self.times.rulestep = value;
            }
            TimeParameter::StartTime => self.times.tstart = value,
            _ => return Err(EngineError::new(ERR_PARAM_CODE)),
        }
        Ok(())
    }

    /// Shortest time until any tank becomes empty or full given the
    /// current flows.
    fn next_tank_event(&self) -> i64 {
        let mut t = i64::MAX;
        if self.hyd.head.is_empty() {
            return 0;
        }
        for ti in 1..=self.network.ntanks() {
            let tank = self.network.tank(ti);
            if tank.is_reservoir() {
                continue;
            }
            let q = self.hyd.demand[tank.node];
            if q.abs() <= 1.0e-6 {
                continue;
            }
            let v = if q > 0.0 {
                tank.vmax - tank.volume
            } else {
                tank.vmin - tank.volume
            };
            let tt = (v / q).round() as i64;
            if tt > 0 && tt < t {
                t = tt;
            }
        }
        if t == i64::MAX {
            0
        } else {
            t
        }
    }

    /// Returns the type of water quality analysis together with the
    /// constituent name, its units and the trace node index.
    pub fn get_quality_info(&self) -> Result<(QualityType, String, String, i32)> {
        Ok((
            self.qual_options.quality,
            self.qual_options.chem_name.clone(),
            self.qual_options.chem_units.clone(),
            self.qual_options.trace_node as i32,
        ))
    }

    /// Sets the type of water quality analysis; `trace_node_id` names the
    /// traced node for [`QualityType::Trace`].
    pub fn set_quality_type(
        &mut self,
        quality: QualityType,
        chem_name: &str,
        chem_units: &str,
        trace_node_id: &str,
    ) -> Result<()> {
        self.check_closed()?;
        if quality == QualityType::Trace {
            let node = self
                .network
                .find_node(trace_node_id)
                .ok_or(EngineError::new(ERR_UNDEF_TRACE_NODE))?;
            self.qual_options.trace_node = node;
        }
        match quality {
            QualityType::Chem => {
                if !chem_name.is_empty() {
                    self.qual_options.chem_name = chem_name.to_string();
                }
                if !chem_units.is_empty() {
                    self.qual_options.chem_units = chem_units.to_string();
                }
            }
            QualityType::Age => {
                self.qual_options.chem_name = "Age".to_string();
                self.qual_options.chem_units = "hrs".to_string();
            }
            QualityType::Trace => {
                self.qual_options.chem_name = "Trace".to_string();
                self.qual_options.chem_units = "%".to_string();
            }
            QualityType::None => {}
        }
        self.qual_options.quality = quality;
        Ok(())
    }

    /// Returns the demand model with its pressure limits and exponent.
    pub fn get_demand_model(&self) -> Result<(DemandModel, f64, f64, f64)> {
        Ok((
            self.hyd_options.demand_model,
            self.hyd_options.pmin / self.pcf(),
            self.hyd_options.preq / self.pcf(),
            self.hyd_options.pexp,
        ))
    }

    /// Sets the demand model. For pressure-driven analysis, demand falls
    /// to zero below `pmin` and is fully supplied above `preq`.
    pub fn set_demand_model(
        &mut self,
        model: DemandModel,
        pmin: f64,
        preq: f64,
        pexp: f64,
    ) -> Result<()> {
        if model == DemandModel::Pda && (pmin > preq || pexp <= 0.0) {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        let pcf = self.pcf();
        self.hyd_options.demand_model = model;
        self.hyd_options.pmin = pmin * pcf;
        self.hyd_options.preq = (preq * pcf).max(self.hyd_options.pmin + 0.01);
        self.hyd_options.pexp = pexp;
        Ok(())
    }

    /// Returns the flow units the API uses.
    pub fn get_flow_units(&self) -> FlowUnits {
        self.flow_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::test_utils::fixtures::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[rstest]
    fn options_round_trip(mut ph: Project) {
        ph.set_option(EngineOption::Trials, 55.0).unwrap();
        assert_eq!(ph.get_option(EngineOption::Trials).unwrap(), 55.0);
        ph.set_option(EngineOption::Accuracy, 0.005).unwrap();
        assert_eq!(ph.get_option(EngineOption::Accuracy).unwrap(), 0.005);
        for option in EngineOption::iter() {
            assert!(ph.get_option(option).is_ok());
        }
    }

    #[rstest]
    fn time_parameters_round_trip(mut ph: Project) {
        ph.set_time_parameter(TimeParameter::Duration, 86_400).unwrap();
        ph.set_time_parameter(TimeParameter::HydStep, 1_800).unwrap();
        assert_eq!(ph.get_time_parameter(TimeParameter::Duration).unwrap(), 86_400);
        assert_eq!(ph.get_time_parameter(TimeParameter::HydStep).unwrap(), 1_800);
        // Read-only parameters reject writes.
        assert!(ph.set_time_parameter(TimeParameter::HTime, 0).is_err());
    }

    #[rstest]
    fn trace_mode_requires_a_valid_node(mut ph: Project) {
        let err = ph
            .set_quality_type(QualityType::Trace, "", "", "NOPE")
            .unwrap_err();
        assert_eq!(err.code(), ERR_UNDEF_TRACE_NODE);
        ph.set_quality_type(QualityType::Trace, "", "", "R1").unwrap();
        let (qtype, name, units, trace) = ph.get_quality_info().unwrap();
        assert_eq!(qtype, QualityType::Trace);
        assert_eq!(name, "Trace");
        assert_eq!(units, "%");
        assert_eq!(trace, ph.get_node_index("R1").unwrap());
    }
}
