//! Hydraulic analysis API methods.
//!
//! Methods for opening, initializing, running, stepping, saving and
//! closing hydraulic analyses, the interleaved hydraulics/quality
//! driver, and convergence statistics.

use std::path::Path;

use crate::error::*;
use crate::hydfile::{decode_setting, encode_setting, HydSnapshot};
use crate::hydraulics::{self, Solver};
use crate::quality;
use crate::types::*;
use crate::Project;

use num_traits::FromPrimitive;

/// ## Hydraulic Analysis APIs
impl Project {
    /// Opens the hydraulic solver: validates the network, builds the
    /// sparse matrix structure and initializes link flows.
    ///
    /// Must be called before the `init_h` / `run_h` / `next_h` sequence.
    /// An already-open solver is closed and re-opened.
    ///
    /// # Errors
    /// Input errors (2xx) from network validation.
    pub fn open_h(&mut self) -> Result<()> {
        if self.open_h_flag {
            self.close_h()?;
        }
        self.network.validate()?;
        self.solver = Some(Solver::create(&self.network));
        self.open_h_flag = true;
        self.hyd_from_file = false;
        let mut ctx = self.hyd_ctx()?;
        match hydraulics::open_hyd(&mut ctx) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.open_h_flag = false;
                self.solver = None;
                Err(e)
            }
        }
    }

    /// Initializes the network prior to running a hydraulic analysis:
    /// tank levels, link status and settings, and the simulation clock.
    ///
    /// The two-digit `init_flag` controls whether flows are
    /// re-initialized (tens digit) and whether results are saved to the
    /// intermediate hydraulics cache (units digit); recognized values are
    /// {0, 1, 10, 11} (see [`InitHydOption`]).
    pub fn init_h(&mut self, init_flag: InitHydOption) -> Result<()> {
        if !self.open_h_flag {
            return Err(EngineError::new(ERR_HYD_NOT_OPENED));
        }
        self.save_h_flag = init_flag.save();
        if self.save_h_flag {
            let (nnodes, nlinks) = (self.network.nnodes(), self.network.nlinks());
            self.hyd_cache.reset(nnodes, nlinks);
        }
        let mut ctx = self.hyd_ctx()?;
        hydraulics::init_hyd(&mut ctx, init_flag.init_flows());
        Ok(())
    }

    /// Computes a hydraulic solution for the current point in time.
    ///
    /// Used in a loop with [`Project::next_h`] to run an extended-period
    /// simulation. Returns the current simulation time in seconds.
    ///
    /// # Errors
    /// - 103 if the solver is not open.
    /// - 110 if the hydraulic equations cannot be solved.
    pub fn run_h(&mut self) -> Result<u64> {
        if !self.open_h_flag {
            return Err(EngineError::new(ERR_HYD_NOT_OPENED));
        }
        let mut ctx = self.hyd_ctx()?;
        let t = hydraulics::run_hyd(&mut ctx)?;
        Ok(t.max(0) as u64)
    }

    /// Advances the simulation to the next hydraulic event: the nominal
    /// step bounded by pattern changes, reporting times, tank fill or
    /// drain events, control triggers and rule firings.
    ///
    /// Returns the step taken in seconds; zero means the simulation
    /// duration is exhausted.
    pub fn next_h(&mut self) -> Result<u64> {
        if !self.open_h_flag {
            return Err(EngineError::new(ERR_HYD_NOT_OPENED));
        }
        let save = self.save_h_flag && self.hyd.htime <= self.times.duration;
        if save {
            let snap = self.make_snapshot();
            self.hyd_cache.push(snap);
        }
        let mut ctx = self.hyd_ctx()?;
        let step = hydraulics::next_hyd(&mut ctx)?;
        if save {
            if let Some(last) = self.hyd_cache.records.last_mut() {
                last.hydstep = step;
            }
        }
        Ok(step.max(0) as u64)
    }

    /// Runs a complete hydraulic analysis over the whole duration, saving
    /// results to the intermediate cache for use by a subsequent water
    /// quality analysis.
    pub fn solve_h(&mut self) -> Result<()> {
        self.open_h()?;
        self.init_h(InitHydOption::Save)?;
        loop {
            self.run_h()?;
            if self.next_h()? == 0 {
                break;
            }
        }
        self.close_h()
    }

    /// Requests that the simulation stop: the next call to
    /// [`Project::next_h`] advances the clock to the full duration.
    pub fn halt(&mut self) {
        self.hyd.halt = true;
    }

    /// Transfers cached hydraulic results to the binary output file at
    /// uniform reporting intervals.
    ///
    /// # Errors
    /// - 106 if no hydraulics have been saved.
    pub fn save_h(&mut self) -> Result<()> {
        if self.hyd_cache.is_empty() {
            return Err(EngineError::new(ERR_NO_RESULTS));
        }
        if self.hyd.head.is_empty() {
            let (n, l, t) = (
                self.network.nnodes(),
                self.network.nlinks(),
                self.network.ntanks(),
            );
            self.hyd.allocate(n, l, t);
        }
        self.begin_output();
        let mut t = self.times.rstart;
        loop {
            let rec = self
                .hyd_cache
                .records
                .iter()
                .rev()
                .find(|r| r.time <= t)
                .cloned();
            if let Some(rec) = rec {
                self.load_snapshot(&rec);
                self.write_output_period();
            }
            t += self.times.rstep;
            if t > self.times.duration {
                break;
            }
        }
        Ok(())
    }

    /// Saves the intermediate hydraulics cache to a binary file that can
    /// be reused later with [`Project::use_hydraulics_file`].
    pub fn save_hydraulics_file(&self, file_name: &str) -> Result<()> {
        if self.hyd_cache.is_empty() {
            return Err(EngineError::new(ERR_NO_RESULTS));
        }
        self.hyd_cache.save(Path::new(file_name))
    }

    /// Supplies the project's hydraulics from a previously saved binary
    /// hydraulics file instead of solving them.
    ///
    /// # Errors
    /// - 305/306/307 on open, compatibility or read failures.
    pub fn use_hydraulics_file(&mut self, file_name: &str) -> Result<()> {
        self.check_closed()?;
        let (nnodes, nlinks) = (self.network.nnodes(), self.network.nlinks());
        self.hyd_cache
            .load(Path::new(file_name), nnodes, nlinks)?;
        self.hyd.allocate(nnodes, nlinks, self.network.ntanks());
        hydraulics::init_tanks(&mut self.network)?;
        self.hyd_from_file = true;
        Ok(())
    }

    /// Closes the hydraulic solver and frees its scratch storage.
    pub fn close_h(&mut self) -> Result<()> {
        self.solver = None;
        self.open_h_flag = false;
        Ok(())
    }

    /// Retrieves a convergence or mass balance statistic from the most
    /// recent solution.
    pub fn get_statistic(&self, statistic: AnalysisStatistic) -> Result<f64> {
        let value = match statistic {
            AnalysisStatistic::Iterations => self.hyd.iterations as f64,
            AnalysisStatistic::RelativeError => self.hyd.relative_error,
            AnalysisStatistic::MaxHeadError => self.hyd.max_head_error,
            AnalysisStatistic::MaxFlowChange => self.hyd.max_flow_change / self.qcf(),
            AnalysisStatistic::MassBalance => self.qual.mass.ratio(),
            AnalysisStatistic::DeficientNodes => self.hyd.deficient_nodes as f64,
            AnalysisStatistic::DemandReduction => self.hyd.demand_reduction,
        };
        Ok(value)
    }

    /// Opens and initializes both solvers for lockstep operation, in
    /// which each call to [`Project::run_step_hq`] advances hydraulics
    /// and quality together.
    ///
    /// # Errors
    /// - 401 if the quality step does not evenly divide the hydraulic
    ///   step.
    pub fn open_init_hq(&mut self) -> Result<()> {
        if self.times.hstep % self.times.qstep != 0 {
            return Err(EngineError::new(ERR_QSTEP_HSTEP));
        }
        self.open_h()?;
        self.open_q()?;
        self.init_h(InitHydOption::InitFlow)?;
        self.init_q_unchecked(InitHydOption::NoSave)
    }

    /// Advances hydraulics and quality together by one quality step,
    /// re-solving hydraulics whenever the quality clock reaches a
    /// hydraulic event boundary.
    ///
    /// Returns `(stime, tleft)`: the current simulation time and the time
    /// remaining.
    pub fn run_step_hq(&mut self) -> Result<(u64, u64)> {
        if !self.open_h_flag {
            return Err(EngineError::new(ERR_HYD_NOT_OPENED));
        }
        if !self.open_q_flag {
            return Err(EngineError::new(ERR_QUAL_NOT_OPENED));
        }

        // Push the hydraulic solution forward if quality has caught up.
        if self.qual.qtime == self.hyd.htime {
            self.lockstep_advance()?;
        }

        let mut tstep = self.times.qstep;
        while tstep > 0 {
            let mut dt = tstep;
            let hstep = self.hyd.htime - self.qual.qtime;
            if hstep < dt {
                // The hydraulic event boundary is closer than a full
                // quality step.
                dt = hstep.max(0);
                if self.qual_options.quality != QualityType::None && dt > 0 {
                    let mut ctx = self.qual_ctx();
                    quality::transport(&mut ctx, dt);
                }
                self.qual.qtime += dt;

                {
                    let mut ctx = self.hyd_ctx()?;
                    hydraulics::sync_tank_grades(&mut ctx);
                }
                let solved_at = self.lockstep_advance()?;
                self.qual.qtime = solved_at;
                if dt == 0 && self.hyd.htime <= self.qual.qtime {
                    break; // Duration exhausted
                }
            } else {
                if self.qual_options.quality != QualityType::None {
                    let mut ctx = self.qual_ctx();
                    quality::transport(&mut ctx, dt);
                }
                self.qual.qtime += dt;
            }
            tstep -= dt;
        }

        let tleft = (self.times.duration - self.qual.qtime).max(0);

        // Re-align hydraulics so both states describe the same instant.
        if self.qual.qtime == self.hyd.htime && self.hyd.htime < self.times.duration {
            {
                let mut ctx = self.hyd_ctx()?;
                hydraulics::sync_tank_grades(&mut ctx);
            }
            self.lockstep_advance()?;
        }

        Ok((self.qual.qtime.max(0) as u64, tleft as u64))
    }

    /// Closes both solvers of a lockstep session.
    pub fn close_hq(&mut self) -> Result<()> {
        self.close_q()?;
        self.close_h()
    }

    /// Solves hydraulics at the current clock, finds the next event step
    /// without touching the reporting clock, and aligns the quality
    /// segments to the new solution. Returns the solved instant.
    fn lockstep_advance(&mut self) -> Result<i64> {
        let (t, step) = {
            let mut ctx = self.hyd_ctx()?;
            let t = hydraulics::run_hyd(&mut ctx)?;
            let step = hydraulics::next_hyd_lockstep(&mut ctx)?;
            (t, step)
        };
        self.hyd.htime = t + step;
        if self.qual_options.quality != QualityType::None && self.qual.qtime < self.times.duration {
            let mut ctx = self.qual_ctx();
            quality::qual_hyd_updated(&mut ctx);
        }
        Ok(t)
    }

    /// Captures the current hydraulic state for the intermediate cache.
    fn make_snapshot(&self) -> HydSnapshot {
        let nnodes = self.network.nnodes();
        let nlinks = self.network.nlinks();
        HydSnapshot {
            time: self.hyd.htime,
            demand: (1..=nnodes).map(|i| self.hyd.demand[i] as f32).collect(),
            head: (1..=nnodes).map(|i| self.hyd.head[i] as f32).collect(),
            flow: (1..=nlinks).map(|k| self.hyd.flow[k] as f32).collect(),
            status: (1..=nlinks)
                .map(|k| self.hyd.status[k] as u32 as f32)
                .collect(),
            setting: (1..=nlinks)
                .map(|k| encode_setting(self.hyd.setting[k]))
                .collect(),
            hydstep: 0,
        }
    }

    /// Restores the hydraulic state from a cached snapshot and advances
    /// the hydraulic clock past it.
    pub(crate) fn load_snapshot(&mut self, rec: &HydSnapshot) {
        for i in 1..=self.network.nnodes() {
            self.hyd.demand[i] = rec.demand[i - 1] as f64;
            self.hyd.head[i] = rec.head[i - 1] as f64;
        }
        for k in 1..=self.network.nlinks() {
            self.hyd.flow[k] = rec.flow[k - 1] as f64;
            self.hyd.status[k] =
                LinkStatus::from_f64(rec.status[k - 1] as f64).unwrap_or(LinkStatus::Open);
            self.hyd.setting[k] = decode_setting(rec.setting[k - 1]);
        }
        self.hyd.htime = rec.time + rec.hydstep;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::test_utils::fixtures::*;
    use rstest::rstest;
    use std::fs;

    #[rstest]
    fn test_solve_h(mut ph: Project) {
        let result = ph.solve_h();
        assert_eq!(result, Ok(()));
    }

    #[rstest]
    fn test_hyd_step(mut ph: Project) {
        let result = ph.open_h();
        assert_eq!(result, Ok(()));

        let init_result = ph.init_h(InitHydOption::NoSave);
        assert_eq!(init_result, Ok(()));

        let mut steps = 0;
        loop {
            let run_result = ph.run_h();
            assert!(run_result.is_ok());

            let step_result = ph.next_h();
            assert!(step_result.is_ok());

            if step_result.unwrap() == 0 {
                break;
            }
            steps += 1;
        }
        assert!(steps >= 24, "expected hourly steps over one day");

        let close_result = ph.close_h();
        assert_eq!(close_result, Ok(()));
    }

    #[rstest]
    fn run_before_open_is_rejected(mut ph: Project) {
        let err = ph.run_h().unwrap_err();
        assert_eq!(err.code(), ERR_HYD_NOT_OPENED);
    }

    #[rstest]
    fn test_hydraulics_save_file(mut ph: Project) {
        ph.solve_h().unwrap();

        let hyd_file = std::env::temp_dir().join("hydronet_savefile.hyd");
        ph.save_hydraulics_file(hyd_file.to_str().unwrap()).unwrap();
        assert!(hyd_file.exists(), "hydraulics file was not created");

        ph.use_hydraulics_file(hyd_file.to_str().unwrap()).unwrap();
        ph.solve_q().unwrap();

        fs::remove_file(hyd_file).unwrap();
    }

    #[rstest]
    fn statistics_are_available_after_a_solve(mut ph: Project) {
        ph.solve_h().unwrap();
        assert!(ph.get_statistic(AnalysisStatistic::Iterations).unwrap() >= 1.0);
        let relerr = ph.get_statistic(AnalysisStatistic::RelativeError).unwrap();
        assert!(relerr <= 0.001 + 1e-9, "relative error {}", relerr);
    }

    #[rstest]
    fn halt_flag_forces_completion(mut ph: Project) {
        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        ph.run_h().unwrap();
        ph.halt();
        // The halt flag makes the next step exhaust the duration.
        while ph.next_h().unwrap() != 0 {
            ph.run_h().unwrap();
        }
        assert!(ph.get_time_parameter(crate::types::options::TimeParameter::HTime).unwrap()
            > ph.get_time_parameter(crate::types::options::TimeParameter::Duration).unwrap());
        ph.close_h().unwrap();
    }

    #[rstest]
    fn lockstep_driver_reaches_the_duration(mut ph: Project) {
        ph.set_quality_type(QualityType::Age, "", "", "").unwrap();
        ph.open_init_hq().unwrap();
        let mut guard = 0;
        loop {
            let (_stime, tleft) = ph.run_step_hq().unwrap();
            guard += 1;
            if tleft == 0 || guard > 10_000 {
                break;
            }
        }
        assert!(guard <= 10_000, "lockstep driver did not terminate");
        ph.close_hq().unwrap();
    }

    #[rstest]
    fn lockstep_requires_divisible_steps(mut ph: Project) {
        ph.set_time_parameter(crate::types::options::TimeParameter::QualStep, 7)
            .unwrap();
        let err = ph.open_init_hq().unwrap_err();
        assert_eq!(err.code(), ERR_QSTEP_HSTEP);
    }
}
