//! Water quality analysis API methods.
//!
//! Methods for initializing, running, stepping and closing water quality
//! simulations. A quality run either replays the intermediate hydraulics
//! cache produced by a finished hydraulic analysis, or tracks a live
//! hydraulic solver driven in parallel by the caller.

use crate::error::*;
use crate::quality;
use crate::types::*;
use crate::Project;

/// ## Water Quality Analysis APIs
impl Project {
    /// Opens the water quality solver. An already-open solver is closed
    /// and re-opened.
    pub fn open_q(&mut self) -> Result<()> {
        if self.open_q_flag {
            self.close_q()?;
        }
        if self.network.nnodes() == 0 {
            return Err(EngineError::new(ERR_NO_DATA));
        }
        let mut ctx = self.qual_ctx();
        quality::open_qual(&mut ctx);
        self.open_q_flag = true;
        Ok(())
    }

    /// Initializes the water quality simulation.
    ///
    /// `save_flag` controls whether computed results are saved as binary
    /// output periods.
    ///
    /// # Errors
    /// - 105 if the quality solver is not open.
    /// - 104 if no hydraulics are available to transport against.
    pub fn init_q(&mut self, save_flag: InitHydOption) -> Result<()> {
        if !self.open_q_flag {
            return Err(EngineError::new(ERR_QUAL_NOT_OPENED));
        }
        if !self.open_h_flag && self.hyd_cache.is_empty() && !self.hyd_from_file {
            return Err(EngineError::new(ERR_NO_HYDRAULICS));
        }
        self.init_q_unchecked(save_flag)
    }

    /// Initialization shared with the lockstep driver, which supplies its
    /// own hydraulics and so skips the availability check.
    pub(crate) fn init_q_unchecked(&mut self, save_flag: InitHydOption) -> Result<()> {
        if !self.open_h_flag {
            // Replay mode: start the hydraulic clock over from the cache.
            let (nnodes, nlinks, ntanks) = (
                self.network.nnodes(),
                self.network.nlinks(),
                self.network.ntanks(),
            );
            if self.hyd.head.is_empty() {
                self.hyd.allocate(nnodes, nlinks, ntanks);
            }
            self.hyd.htime = 0;
            self.hyd_cache.rewind();
        }
        let mut ctx = self.qual_ctx();
        quality::init_qual(&mut ctx);
        self.save_q_flag = save_flag.save();
        if self.save_q_flag {
            self.begin_output();
        }
        Ok(())
    }

    /// Computes the water quality at the current point in time, aligning
    /// the transport state with the hydraulic solution whenever the two
    /// clocks coincide. Returns the current simulation time in seconds.
    pub fn run_q(&mut self) -> Result<u64> {
        if !self.open_q_flag {
            return Err(EngineError::new(ERR_QUAL_NOT_OPENED));
        }
        let t = self.qual.qtime;
        self.runq_core()?;
        if self.save_q_flag && self.qual.qtime == self.qual.rtime {
            self.write_output_period();
            self.qual.rtime += self.times.rstep;
        }
        Ok(t.max(0) as u64)
    }

    /// Advances the quality simulation over the remainder of the current
    /// hydraulic interval. Returns the time step taken in seconds; zero
    /// means the simulation is complete.
    pub fn next_q(&mut self) -> Result<u64> {
        if !self.open_q_flag {
            return Err(EngineError::new(ERR_QUAL_NOT_OPENED));
        }
        let hstep = (self.hyd.htime - self.qual.qtime).max(0);
        if self.qual_options.quality != QualityType::None && hstep > 0 {
            let mut ctx = self.qual_ctx();
            quality::transport(&mut ctx, hstep);
        }
        self.qual.qtime += hstep;
        if self.save_q_flag && self.qual.qtime >= self.qual.rtime {
            self.write_output_period();
            self.qual.rtime += self.times.rstep;
        }
        Ok(hstep as u64)
    }

    /// Advances the quality simulation by one quality time step,
    /// stepping across hydraulic boundaries as needed. Returns the time
    /// left in the simulation in seconds.
    ///
    /// This differs from [`Project::next_q`], which advances over a whole
    /// hydraulic interval and reports the step taken rather than the time
    /// remaining.
    pub fn step_q(&mut self) -> Result<u64> {
        if !self.open_q_flag {
            return Err(EngineError::new(ERR_QUAL_NOT_OPENED));
        }
        let mut tstep = self.times.qstep;
        while tstep > 0 {
            let mut dt = tstep;
            let hstep = self.hyd.htime - self.qual.qtime;
            if hstep < dt {
                // Hydraulic boundary first: transport up to it, then pull
                // in the next hydraulic solution.
                dt = hstep.max(0);
                if self.qual_options.quality != QualityType::None && dt > 0 {
                    let mut ctx = self.qual_ctx();
                    quality::transport(&mut ctx, dt);
                }
                self.qual.qtime += dt;
                let before = self.hyd.htime;
                self.runq_core()?;
                if self.hyd.htime == before && dt == 0 {
                    break; // No hydraulics left to consume
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
        if self.save_q_flag && self.qual.qtime >= self.qual.rtime {
            self.write_output_period();
            self.qual.rtime += self.times.rstep;
        }
        Ok((self.times.duration - self.qual.qtime).max(0) as u64)
    }

    /// Runs a complete water quality analysis over the whole duration
    /// using previously saved hydraulics.
    pub fn solve_q(&mut self) -> Result<()> {
        self.open_q()?;
        self.init_q(InitHydOption::Save)?;
        loop {
            self.run_q()?;
            if self.next_q()? == 0 {
                break;
            }
        }
        self.close_q()
    }

    /// Closes the water quality solver, writing the binary output file if
    /// one was requested.
    pub fn close_q(&mut self) -> Result<()> {
        if self.open_q_flag && self.save_q_flag {
            self.finalize_output()?;
        }
        self.open_q_flag = false;
        self.save_q_flag = false;
        Ok(())
    }

    /// Pulls the next hydraulic solution into scope when the quality
    /// clock has reached the hydraulic clock.
    fn runq_core(&mut self) -> Result<()> {
        if self.qual.qtime != self.hyd.htime {
            return Ok(());
        }
        if !self.open_h_flag {
            let rec = self.hyd_cache.next().cloned();
            match rec {
                Some(rec) => self.load_snapshot(&rec),
                None => return Ok(()), // Replay exhausted
            }
        }
        let mut ctx = self.qual_ctx();
        quality::qual_hyd_updated(&mut ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::impls::test_utils::fixtures::*;
    use crate::types::*;
    use crate::Project;
    use rstest::rstest;

    #[rstest]
    pub fn test_solve_q(mut ph: Project) {
        ph.set_quality_type(QualityType::Chem, "Chlorine", "mg/L", "")
            .unwrap();
        let mut result = ph.solve_h();
        assert!(result.is_ok(), "failed to solve hydraulics: {:?}", result);

        result = ph.solve_q();
        assert!(result.is_ok(), "failed to solve quality: {:?}", result);
    }

    #[rstest]
    pub fn test_solve_q_step(mut ph: Project) {
        let t_stop = 10_800;
        ph.set_quality_type(QualityType::Age, "", "", "").unwrap();

        let result = ph.solve_h();
        assert!(result.is_ok(), "failed to solve hydraulics: {:?}", result);

        ph.open_q().unwrap();
        ph.init_q(InitHydOption::NoSave).unwrap();

        loop {
            let t = ph.run_q().expect("failed to run quality");
            let t_left = ph.step_q().expect("failed to step quality");
            if t_left == 0 || t >= t_stop {
                break;
            }
        }
        ph.close_q().unwrap();
    }

    #[rstest]
    pub fn test_progressive_step(mut ph: Project) {
        ph.set_quality_type(QualityType::Age, "", "", "").unwrap();

        ph.open_h().unwrap();
        ph.init_h(InitHydOption::NoSave).unwrap();
        ph.open_q().unwrap();
        ph.init_q(InitHydOption::NoSave).unwrap();

        loop {
            ph.run_h().unwrap();
            ph.run_q().unwrap();
            let tstep_h = ph.next_h().unwrap();
            let tstep_q = ph.next_q().unwrap();
            let _ = tstep_q;
            if tstep_h == 0 {
                break;
            }
        }

        ph.close_h().unwrap();
        ph.close_q().unwrap();
    }

    #[rstest]
    fn init_without_hydraulics_is_rejected(mut ph: Project) {
        ph.open_q().unwrap();
        let err = ph.init_q(InitHydOption::NoSave).unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_NO_HYDRAULICS);
    }
}
