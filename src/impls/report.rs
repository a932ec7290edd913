//! Reporting API methods and binary output assembly.

use crate::error::*;
use crate::types::*;
use crate::units::GRAVITY;
use crate::Project;

/// ## Reporting APIs
impl Project {
    /// Appends a line of text to the report log.
    pub fn writeline(&mut self, line: &str) {
        self.report.writeline(line);
    }

    /// Writes a simulation summary to the report log and flushes the log
    /// to the report file, if one was named. Also writes the binary
    /// output file when output periods have been saved.
    pub fn report(&mut self) -> Result<()> {
        let title = self.get_title()?;
        for line in title.lines().filter(|l| !l.is_empty()) {
            self.report.writeline(line);
        }
        self.report.writeline(&format!(
            "network has {} junctions, {} tanks/reservoirs, {} links",
            self.network.njuncs(),
            self.network.ntanks(),
            self.network.nlinks()
        ));
        self.report.writeline(&format!(
            "system demand {:.4} {:?}",
            self.hyd.dsystem / self.qcf(),
            self.flow_units
        ));

        // Pump energy usage summary.
        if self.network.npumps() > 0 {
            let mut total_cost = 0.0;
            for pi in 1..=self.network.npumps() {
                let pump = self.network.pump(pi).clone();
                let hours = pump.energy[0];
                let avg_effic = if hours > 0.0 {
                    pump.energy[1] / hours
                } else {
                    0.0
                };
                let avg_kw = if hours > 0.0 {
                    pump.energy[3] / hours
                } else {
                    0.0
                };
                total_cost += pump.energy[5];
                let id = self.network.link(pump.link).id.clone();
                self.report.writeline(&format!(
                    "pump {}: {:.2} hrs on-line, effic {:.1}%, avg {:.2} kW, peak {:.2} kW, cost {:.2}",
                    id, hours, avg_effic, avg_kw, pump.energy[4], pump.energy[5]
                ));
            }
            // Peak-demand charge applies to the highest system load.
            total_cost += self.energy_options.dcost * self.energy_options.emax;
            self.report
                .writeline(&format!("total pumping cost: {:.2}", total_cost));
        }
        // Per-object results for everything flagged for reporting.
        let has_state = !self.hyd.head.is_empty();
        if has_state {
            for i in 1..=self.network.nnodes() {
                let node = self.network.node(i);
                if !node.report {
                    continue;
                }
                let line = format!(
                    "node {}: head {:.3} m, pressure {:.3}, demand {:.4}",
                    node.id,
                    self.hyd.head[i],
                    (self.hyd.head[i] - node.elevation) / self.pcf(),
                    self.hyd.demand[i] / self.qcf()
                );
                self.report.writeline(&line);
            }
            for k in 1..=self.network.nlinks() {
                let link = self.network.link(k);
                if !link.report {
                    continue;
                }
                let line = format!(
                    "link {}: flow {:.4}, status {:?}",
                    link.id,
                    self.hyd.flow[k] / self.qcf(),
                    self.hyd.status[k]
                );
                self.report.writeline(&line);
            }
        }

        if self.report.warn_flag != Warning::None {
            let warn = self.report.warn_flag;
            self.report
                .writeline(&format!("highest warning severity: {:?}", warn));
        }
        self.report.flush_to_file()?;
        self.finalize_output()
    }

    /// Flags a node or link for inclusion in the per-object section of
    /// the report.
    pub fn set_report_flag(&mut self, object: ObjectType, index: i32, flag: bool) -> Result<()> {
        match object {
            ObjectType::Node => {
                let i = self.node_index(index)?;
                self.network.node_mut(i).report = flag;
            }
            ObjectType::Link => {
                let k = self.link_index(index)?;
                self.network.link_mut(k).report = flag;
            }
            _ => return Err(EngineError::new(ERR_PARAM_CODE)),
        }
        Ok(())
    }

    /// Clears the report log and warning flag.
    pub fn reset_report(&mut self) {
        self.report.clear();
    }

    /// Sets the amount of hydraulic status information logged during a
    /// run.
    pub fn set_status_report(&mut self, level: StatusReport) {
        self.report.statflag = level;
    }

    /// Accumulated report lines.
    pub fn get_report_lines(&self) -> &[String] {
        self.report.lines()
    }

    /// Highest-severity runtime warning raised so far.
    pub fn get_warning_flag(&self) -> Warning {
        self.report.warn_flag
    }

    /// Starts a fresh binary output: prolog, counts, option codes and ID
    /// tables.
    pub(crate) fn begin_output(&mut self) {
        let node_ids: Vec<String> = (1..=self.network.nnodes())
            .map(|i| self.network.node(i).id.clone())
            .collect();
        let link_ids: Vec<String> = (1..=self.network.nlinks())
            .map(|k| self.network.link(k).id.clone())
            .collect();
        let counts = [
            self.network.nnodes() as i32,
            self.network.ntanks() as i32,
            self.network.nlinks() as i32,
            self.network.npumps() as i32,
            self.network.nvalves() as i32,
        ];
        let option_codes = [
            self.qual_options.quality as u32 as i32,
            self.qual_options.trace_node as i32,
            self.flow_units as u32 as i32,
            self.press_units as u32 as i32,
        ];
        self.out_file.begin(
            &node_ids,
            &link_ids,
            counts,
            option_codes,
            self.times.rstart,
            self.times.rstep,
            self.times.duration,
        );
    }

    /// Appends one reporting period: four node variables (demand, head,
    /// pressure, quality) and eight link variables (flow, velocity, head
    /// loss, quality, status, setting, reaction rate, friction factor).
    pub(crate) fn write_output_period(&mut self) {
        let qcf = self.qcf();
        let pcf = self.pcf();
        let nnodes = self.network.nnodes();
        let nlinks = self.network.nlinks();
        let has_qual = !self.qual.node_qual.is_empty();

        let mut node_vars = Vec::with_capacity(nnodes * crate::hydfile::OutputFile::NODE_VARS);
        for i in 1..=nnodes {
            node_vars.push((self.hyd.demand[i] / qcf) as f32);
        }
        for i in 1..=nnodes {
            node_vars.push(self.hyd.head[i] as f32);
        }
        for i in 1..=nnodes {
            let el = self.network.node(i).elevation;
            node_vars.push(((self.hyd.head[i] - el) / pcf) as f32);
        }
        for i in 1..=nnodes {
            node_vars.push(if has_qual { self.qual.node_qual[i] as f32 } else { 0.0 });
        }

        let mut link_vars = Vec::with_capacity(nlinks * crate::hydfile::OutputFile::LINK_VARS);
        for k in 1..=nlinks {
            link_vars.push((self.hyd.flow[k] / qcf) as f32);
        }
        for k in 1..=nlinks {
            let d = self.network.link(k).diameter;
            let v = if d > 0.0 {
                self.hyd.flow[k].abs() / (std::f64::consts::PI * d * d / 4.0)
            } else {
                0.0
            };
            link_vars.push(v as f32);
        }
        for k in 1..=nlinks {
            let link = self.network.link(k);
            link_vars.push((self.hyd.head[link.n1] - self.hyd.head[link.n2]) as f32);
        }
        for k in 1..=nlinks {
            let q = if has_qual {
                let (v, m) = self.qual.chains[k].totals(&self.qual.pool);
                if v > 0.0 {
                    m / v
                } else {
                    0.0
                }
            } else {
                0.0
            };
            link_vars.push(q as f32);
        }
        for k in 1..=nlinks {
            link_vars.push(self.hyd.status[k] as u32 as f32);
        }
        for k in 1..=nlinks {
            link_vars.push(self.hyd.setting[k].unwrap_or(0.0) as f32);
        }
        for _ in 1..=nlinks {
            // Per-link average reaction rates are not tracked.
            link_vars.push(0.0);
        }
        for k in 1..=nlinks {
            link_vars.push(self.friction_factor(k) as f32);
        }

        self.out_file.write_period(&node_vars, &link_vars);
    }

    /// Writes the binary output file with its footer, if a path was set
    /// and any periods were recorded.
    pub(crate) fn finalize_output(&mut self) -> Result<()> {
        let Some(path) = self.out_path.clone() else {
            return Ok(());
        };
        if self.out_file.periods == 0 {
            return Ok(());
        }
        // Average reaction rates over the reporting duration, in mass/hr.
        let hours = (self.times.duration.max(3600)) as f64 / 3600.0;
        let rates = [
            (self.qual.wbulk / 3600.0 / hours) as f32,
            (self.qual.wwall / 3600.0 / hours) as f32,
            (self.qual.wtank / 3600.0 / hours) as f32,
            (self.qual.wsource / hours) as f32,
        ];
        self.out_file
            .finalize_to(&path, rates, self.report.warn_flag as i32)
    }

    /// Darcy-Weisbach friction factor implied by the current solution.
    fn friction_factor(&self, k: usize) -> f64 {
        let link = self.network.link(k);
        if link.link_type > LinkType::Pipe || self.hyd.flow.is_empty() {
            return 0.0;
        }
        let q = self.hyd.flow[k].abs();
        if q < 1.0e-8 || link.length == 0.0 || link.diameter == 0.0 {
            return 0.0;
        }
        let hloss = (self.hyd.head[link.n1] - self.hyd.head[link.n2]).abs();
        let area = std::f64::consts::PI * link.diameter * link.diameter / 4.0;
        hloss * link.diameter * 2.0 * GRAVITY * area * area / (link.length * q * q)
    }
}

#[cfg(test)]
mod tests {
    use crate::impls::test_utils::fixtures::*;
    use crate::types::StatusReport;
    use crate::Project;
    use rstest::rstest;

    #[rstest]
    fn writeline_appends_to_the_log(mut ph: Project) {
        ph.writeline("hello");
        assert_eq!(ph.get_report_lines(), ["hello".to_string()]);
        ph.reset_report();
        assert!(ph.get_report_lines().is_empty());
    }

    #[rstest]
    fn status_reporting_logs_balancing_lines(mut ph: Project) {
        ph.set_status_report(StatusReport::NormalReport);
        ph.solve_h().unwrap();
        assert!(ph
            .get_report_lines()
            .iter()
            .any(|line| line.contains("balanced")));
    }

    #[rstest]
    fn flagged_objects_appear_in_the_report(mut ph: Project) {
        let j1 = ph.get_node_index("J1").unwrap();
        ph.set_report_flag(crate::types::ObjectType::Node, j1, true)
            .unwrap();
        ph.solve_h().unwrap();
        ph.report().unwrap();
        assert!(ph
            .get_report_lines()
            .iter()
            .any(|line| line.starts_with("node J1:")));
    }
}
