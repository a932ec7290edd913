//! Network hydraulic simulator.
//!
//! Simulates hydraulic behavior over an extended period: demand and
//! pattern updates, simple and rule-based controls, event-driven time-step
//! selection, tank level integration and pump energy accounting, around a
//! gradient-method solution of the flow-head equations.

pub(crate) mod coeffs;
pub(crate) mod smatrix;
pub(crate) mod solver;
pub(crate) mod status;

pub(crate) use smatrix::Solver;

use crate::error::*;
use crate::network::Network;
use crate::report::Report;
use crate::types::*;
use crate::units::SEC_PER_DAY;

/// Equivalent to zero flow (m^3/s).
pub(crate) const QZERO: f64 = 1.0e-6;
/// Big coefficient.
pub(crate) const CBIG: f64 = 1.0e8;
/// Small coefficient.
pub(crate) const CSMALL: f64 = 1.0e-6;
pub(crate) const TINY: f64 = 1.0e-6;
pub(crate) const BIG: f64 = 1.0e10;

/// Mutable hydraulic state of a project, sized at solver open.
#[derive(Debug, Default)]
pub struct HydState {
    /// Hydraulic grade at each node (m).
    pub head: Vec<f64>,
    /// Full demand at junctions; net inflow at fixed-grade nodes (m^3/s).
    pub demand: Vec<f64>,
    /// Consumer demand actually delivered (equals `demand` under DDA).
    pub demand_flows: Vec<f64>,
    /// Full pattern-scaled demand requested at junctions (m^3/s).
    pub full_demand: Vec<f64>,
    /// Emitter outflows (m^3/s).
    pub emitter_flows: Vec<f64>,
    /// Precomputed emitter head loss coefficients.
    pub emitter_ke: Vec<f64>,
    /// Link flows (m^3/s).
    pub flow: Vec<f64>,
    /// Current link statuses.
    pub status: Vec<LinkStatus>,
    /// Current link settings; `None` marks a control valve whose status is
    /// fixed open or closed.
    pub setting: Vec<Option<f64>>,
    /// Statuses at the last report, links then tanks.
    pub old_status: Vec<LinkStatus>,
    /// Current hydraulic time (s).
    pub htime: i64,
    /// Next reporting time (s).
    pub rtime: i64,
    /// Inverse of the emitter discharge exponent.
    pub qexp_inv: f64,
    /// Halt flag: forces the next time step to complete the simulation.
    pub halt: bool,
    /// Relaxation factor applied to flow updates.
    pub relax: f64,
    /// System-wide positive demand (m^3/s).
    pub dsystem: f64,
    /// Convergence statistics of the last solve.
    pub iterations: i32,
    pub relative_error: f64,
    pub max_head_error: f64,
    pub max_flow_change: f64,
    pub deficient_nodes: i32,
    pub demand_reduction: f64,
}

impl HydState {
    pub(crate) fn allocate(&mut self, nnodes: usize, nlinks: usize, ntanks: usize) {
        self.head = vec![0.0; nnodes + 1];
        self.demand = vec![0.0; nnodes + 1];
        self.demand_flows = vec![0.0; nnodes + 1];
        self.full_demand = vec![0.0; nnodes + 1];
        self.emitter_flows = vec![0.0; nnodes + 1];
        self.emitter_ke = vec![0.0; nnodes + 1];
        self.flow = vec![0.0; nlinks + 1];
        self.status = vec![LinkStatus::Open; nlinks + 1];
        self.setting = vec![None; nlinks + 1];
        self.old_status = vec![LinkStatus::Closed; nlinks + ntanks + 1];
    }
}

/// Borrowed view of everything the hydraulic engine touches.
pub(crate) struct Hyd<'a> {
    pub net: &'a mut Network,
    pub op: &'a HydOptions,
    pub en: &'a mut EnergyOptions,
    pub times: &'a TimeOptions,
    pub st: &'a mut HydState,
    pub sol: &'a mut Solver,
    pub rpt: &'a mut Report,
    /// One API flow unit in m^3/s; data curves keep API flow units.
    pub qcf: f64,
}

/// Head loss exponent of the active formula.
pub(crate) fn headloss_exponent(op: &HydOptions) -> f64 {
    match op.headloss {
        HeadLossType::HazenWilliams => 1.852,
        HeadLossType::DarcyWeisbach | HeadLossType::ChezyManning => 2.0,
    }
}

/// Minor loss coefficient converted to head per flow squared.
pub(crate) fn minor_loss_coeff(mloss: f64, diameter: f64) -> f64 {
    if diameter <= 0.0 {
        return 0.0;
    }
    let area = std::f64::consts::PI * diameter * diameter / 4.0;
    mloss / (2.0 * crate::units::GRAVITY * area * area)
}

/// Computes a link's flow resistance from the head loss formula.
pub(crate) fn resistance(link: &mut Link, form: HeadLossType) {
    link.resistance = CSMALL;
    match link.link_type {
        LinkType::CvPipe | LinkType::Pipe => {
            let e = link.kc;
            let d = link.diameter;
            let l = link.length;
            link.resistance = match form {
                HeadLossType::HazenWilliams => 10.67 * l / e.powf(1.852) / d.powf(4.871),
                HeadLossType::DarcyWeisbach => {
                    let area = std::f64::consts::PI * d * d / 4.0;
                    l / 2.0 / crate::units::GRAVITY / d / (area * area)
                }
                HeadLossType::ChezyManning => {
                    let a = 4.0 * e / (std::f64::consts::PI * d * d);
                    a * a * (d / 4.0).powf(-1.333) * l
                }
            };
        }
        LinkType::Pump => link.resistance = CBIG,
        _ => {}
    }
}

/// Opens the hydraulics solver: validates the network, builds the sparse
/// matrix structure and initializes link flows.
pub(crate) fn open_hyd(ctx: &mut Hyd<'_>) -> Result<()> {
    ctx.net.validate()?;
    init_tanks(ctx.net)?;
    for k in 1..=ctx.net.nlinks() {
        resistance(ctx.net.link_mut(k), ctx.op.headloss);
    }
    ctx.st
        .allocate(ctx.net.nnodes(), ctx.net.nlinks(), ctx.net.ntanks());
    ctx.st.qexp_inv = 1.0 / ctx.op.qexp;
    for i in 1..=ctx.net.njuncs() {
        let ke = ctx.net.node(i).emitter_coeff;
        ctx.st.emitter_ke[i] = if ke > 0.0 {
            (1.0 / ke).powf(ctx.st.qexp_inv)
        } else {
            0.0
        };
    }
    for k in 1..=ctx.net.nlinks() {
        let link = ctx.net.link(k);
        ctx.st.status[k] = link.init_status;
        ctx.st.setting[k] = init_setting(link);
        init_link_flow(ctx, k);
    }
    Ok(())
}

/// Derives tank volumes from levels, areas and any volume curve.
pub(crate) fn init_tanks(net: &mut Network) -> Result<()> {
    for ti in 1..=net.ntanks() {
        let tank = net.tank(ti);
        if tank.is_reservoir() {
            continue;
        }
        if tank.vol_curve > 0 {
            let el = net.node(tank.node).elevation;
            let curve = net.curve(tank.vol_curve).clone();
            let (x0, _) = curve.points[0];
            let (xn, _) = curve.points[curve.points.len() - 1];
            if tank.hmin - el < x0 || tank.hmax - el > xn {
                return Err(EngineError::new(ERR_TANK_LEVELS));
            }
            let vmin = curve.interpolate(tank.hmin - el);
            let vmax = curve.interpolate(tank.hmax - el);
            let v0 = curve.interpolate(tank.h0 - el);
            // Nominal area from the average curve slope.
            let (y0, yn) = (curve.points[0].1, curve.points[curve.points.len() - 1].1);
            let area = if xn > x0 { (yn - y0) / (xn - x0) } else { 0.0 };
            let tank = net.tank_mut(ti);
            tank.vmin = vmin;
            tank.vmax = vmax;
            tank.v0 = v0;
            tank.area = area;
        } else {
            let vmin = tank.vmin;
            let v0 = vmin + (tank.h0 - tank.hmin) * tank.area;
            let vmax = vmin + (tank.hmax - tank.hmin) * tank.area;
            let tank = net.tank_mut(ti);
            tank.v0 = v0;
            tank.vmax = vmax;
        }
        let tank = net.tank_mut(ti);
        tank.volume = tank.v0;
    }
    Ok(())
}

fn init_setting(link: &Link) -> Option<f64> {
    match link.link_type {
        LinkType::CvPipe | LinkType::Pipe => Some(link.kc),
        _ => link.init_setting,
    }
}

/// Initializes tank levels, link status and flows and the simulation clock.
pub(crate) fn init_hyd(ctx: &mut Hyd<'_>, init_flows: bool) {
    let nlinks = ctx.net.nlinks();
    for ti in 1..=ctx.net.ntanks() {
        let tank = ctx.net.tank_mut(ti);
        tank.volume = tank.v0;
        let (node, h0) = (tank.node, tank.h0);
        ctx.st.head[node] = h0;
        ctx.st.demand[node] = 0.0;
        ctx.st.old_status[nlinks + ti] = LinkStatus::TempClosed;
    }

    ctx.st.emitter_flows.fill(0.0);
    for i in 1..=ctx.net.njuncs() {
        if ctx.net.node(i).emitter_coeff > 0.0 {
            ctx.st.emitter_flows[i] = 1.0e-3;
        }
    }

    for k in 1..=nlinks {
        let link = ctx.net.link(k);
        ctx.st.status[k] = link.init_status;
        ctx.st.setting[k] = init_setting(link);

        // Control valves given a numeric setting start out active.
        if link.link_type.is_control_valve() && ctx.st.setting[k].is_some() {
            ctx.st.status[k] = LinkStatus::Active;
        }

        if ctx.st.status[k].is_closed() {
            ctx.st.flow[k] = QZERO;
        } else if ctx.st.flow[k].abs() <= QZERO || init_flows {
            init_link_flow(ctx, k);
        }
        ctx.st.old_status[k] = ctx.st.status[k];
    }

    for pump in &mut ctx.net.pumps {
        pump.energy = [0.0; 6];
    }
    ctx.en.emax = 0.0;

    ctx.st.halt = false;
    ctx.st.htime = 0;
    ctx.st.rtime = ctx.times.rstep;
    ctx.st.relax = 1.0;
}

/// Sets the initial flow in a link: zero when closed, design flow for a
/// pump, one metre-per-second velocity otherwise.
fn init_link_flow(ctx: &mut Hyd<'_>, k: usize) {
    let link = ctx.net.link(k);
    if ctx.st.status[k] == LinkStatus::Closed {
        ctx.st.flow[k] = QZERO;
    } else if link.link_type == LinkType::Pump {
        let speed = ctx.st.setting[k].unwrap_or(1.0);
        if let Some(pi) = ctx.net.find_pump(k) {
            ctx.st.flow[k] = speed * ctx.net.pump(pi).q0;
        }
    } else {
        ctx.st.flow[k] = std::f64::consts::PI * link.diameter * link.diameter / 4.0;
    }
    if ctx.st.flow[k].abs() < QZERO {
        ctx.st.flow[k] = QZERO;
    }
}

/// Solves network hydraulics for the current point in time.
pub(crate) fn run_hyd(ctx: &mut Hyd<'_>) -> Result<i64> {
    let t = ctx.st.htime;
    demands(ctx);
    controls(ctx);

    let (iter, relerr) = solver::hyd_solve(ctx)?;
    ctx.st.iterations = iter;
    ctx.st.relative_error = relerr;
    tracing::debug!(time = t, iter, relerr, "hydraulic solution");

    if ctx.rpt.statflag != StatusReport::NoReport {
        write_hyd_status(ctx, iter, relerr);
    }

    // If the system is unbalanced and no extra trials are allowed,
    // force the simulation to halt.
    if relerr > ctx.op.hacc && ctx.op.extra_iter == -1 {
        ctx.st.halt = true;
    }
    write_hyd_warnings(ctx, iter, relerr);
    Ok(t)
}

/// Finds the length of the next time step and updates tank levels and
/// rule-based control actions. Returns zero once the duration is exhausted.
pub(crate) fn next_hyd(ctx: &mut Hyd<'_>) -> Result<i64> {
    next_hyd_ex(ctx, true)
}

/// Lockstep variant used by the interleaved hydraulics/quality driver: the
/// reporting clock is left alone.
pub(crate) fn next_hyd_lockstep(ctx: &mut Hyd<'_>) -> Result<i64> {
    next_hyd_ex(ctx, false)
}

fn next_hyd_ex(ctx: &mut Hyd<'_>, advance_rtime: bool) -> Result<i64> {
    // Force the end of the simulation when the halt flag is set.
    if ctx.st.halt {
        ctx.st.htime = ctx.times.duration;
    }

    let mut hydstep = 0;
    if ctx.st.htime < ctx.times.duration {
        hydstep = timestep(ctx);
    }

    // Compute pumping energy.
    if ctx.times.duration == 0 {
        add_energy(ctx, 0);
    } else if ctx.st.htime < ctx.times.duration {
        add_energy(ctx, hydstep);
    }

    if ctx.st.htime < ctx.times.duration {
        ctx.st.htime += hydstep;
        if advance_rtime && ctx.st.htime >= ctx.st.rtime {
            ctx.st.rtime += ctx.times.rstep;
        }
    } else {
        ctx.st.htime += 1; // Force completion of the analysis
    }
    Ok(hydstep)
}

/// Re-derives tank grades from volumes mutated by the quality transport,
/// clamping tanks that will be full or empty within the next second.
pub(crate) fn sync_tank_grades(ctx: &mut Hyd<'_>) {
    for ti in 1..=ctx.net.ntanks() {
        let tank = ctx.net.tank(ti);
        if tank.is_reservoir() {
            continue;
        }
        let n = tank.node;
        let mut volume = tank.volume;
        if volume + ctx.st.demand[n] >= tank.vmax {
            volume = tank.vmax;
        }
        if volume - ctx.st.demand[n] <= tank.vmin {
            volume = tank.vmin;
        }
        ctx.net.tank_mut(ti).volume = volume;
        ctx.st.head[n] = tank_grade(ctx.net, ti, volume);
    }
}

/// Computes demands at nodes during the current time period, updates
/// pattern-driven reservoir heads and pump utilization settings.
pub(crate) fn demands(ctx: &mut Hyd<'_>) {
    // Total elapsed number of pattern periods.
    let p = (ctx.st.htime + ctx.times.pstart) / ctx.times.pstep;

    ctx.st.dsystem = 0.0;
    for i in 1..=ctx.net.njuncs() {
        let mut sum = 0.0;
        for demand in &ctx.net.node(i).demands {
            let djunc = demand.base * ctx.net.pattern_factor(demand.pattern, p) * ctx.op.demand_mult;
            if djunc > 0.0 {
                ctx.st.dsystem += djunc;
            }
            sum += djunc;
        }
        ctx.st.demand[i] = sum;
        ctx.st.demand_flows[i] = sum;
        ctx.st.full_demand[i] = sum;
    }

    // Update heads at fixed-grade nodes with time patterns.
    for ti in 1..=ctx.net.ntanks() {
        let tank = ctx.net.tank(ti);
        if tank.is_reservoir() && tank.pattern > 0 {
            let node = tank.node;
            let factor = ctx.net.pattern_factor(tank.pattern, p);
            ctx.st.head[node] = ctx.net.node(node).elevation * factor;
        }
    }

    // Update settings of pumps with utilization patterns.
    for pi in 1..=ctx.net.npumps() {
        let pump = ctx.net.pump(pi);
        if pump.upat > 0 {
            let k = pump.link;
            let factor = ctx.net.pattern_factor(pump.upat, p);
            let (mut s, mut kset) = (ctx.st.status[k], ctx.st.setting[k]);
            set_link_setting(ctx.net.link(k), factor, &mut s, &mut kset);
            ctx.st.status[k] = s;
            ctx.st.setting[k] = kset;
        }
    }
}

/// Implements simple controls based on time or tank levels. Returns the
/// number of links whose status or setting changed.
pub(crate) fn controls(ctx: &mut Hyd<'_>) -> usize {
    let mut setsum = 0;
    for i in 0..ctx.net.controls.len() {
        let control = ctx.net.controls[i].clone();
        if !control.enabled || control.link == 0 {
            continue;
        }
        let k = control.link;
        let mut reset = false;

        // Link controlled by tank level.
        let n = control.node;
        if n > ctx.net.njuncs() {
            let ti = ctx.net.tank_index(n);
            let h = ctx.st.head[n];
            let vplus = ctx.st.demand[n].abs();
            let v1 = tank_volume(ctx.net, ti, h);
            let v2 = tank_volume(ctx.net, ti, control.grade + ctx.net.node(n).elevation);
            match control.control_type {
                ControlType::LowLevel if v1 <= v2 + vplus => reset = true,
                ControlType::HiLevel if v1 >= v2 - vplus => reset = true,
                _ => {}
            }
        }

        match control.control_type {
            ControlType::Timer if control.time == ctx.st.htime => reset = true,
            ControlType::TimeOfDay
                if (ctx.st.htime + ctx.times.tstart) % SEC_PER_DAY == control.time =>
            {
                reset = true
            }
            _ => {}
        }

        if reset {
            let link = ctx.net.link(k);
            let s1 = if ctx.st.status[k].is_closed() {
                LinkStatus::Closed
            } else {
                LinkStatus::Open
            };
            let s2 = control.status;
            let k1 = ctx.st.setting[k];
            let k2 = if link.link_type > LinkType::Pipe {
                control.setting
            } else {
                k1
            };
            if s1 != s2 || k1 != k2 {
                ctx.st.status[k] = s2;
                ctx.st.setting[k] = k2;
                if ctx.rpt.statflag != StatusReport::NoReport {
                    let id = link.id.clone();
                    ctx.rpt.writeline(&format!(
                        "{}: control {} acts on link {}",
                        crate::report::clocktime(ctx.st.htime + ctx.times.tstart),
                        i + 1,
                        id
                    ));
                }
                setsum += 1;
            }
        }
    }
    setsum
}

/// Computes the time step to advance the hydraulic simulation: the
/// smallest of the nominal step, the next pattern or reporting period, a
/// tank fill/drain event or a simple-control trigger; rule evaluation can
/// narrow it further.
pub(crate) fn timestep(ctx: &mut Hyd<'_>) -> i64 {
    let mut tstep = ctx.times.hstep;

    // Time until the next demand period.
    let n = (ctx.st.htime + ctx.times.pstart) / ctx.times.pstep + 1;
    let t = n * ctx.times.pstep - ctx.st.htime;
    if t > 0 && t < tstep {
        tstep = t;
    }

    // Time until the next reporting period.
    let t = ctx.st.rtime - ctx.st.htime;
    if t > 0 && t < tstep {
        tstep = t;
    }

    tank_timestep(ctx, &mut tstep);
    control_timestep(ctx, &mut tstep);

    // Rule evaluation updates tank levels itself.
    if !ctx.net.rules.is_empty() {
        rule_timestep(ctx, &mut tstep);
    } else {
        tank_levels(ctx, tstep);
    }
    tstep
}

/// Revises the time step based on the shortest time to fill or drain any
/// tank. The returned step satisfies `tstep <= (Vlimit - V) / q`.
pub(crate) fn tank_timestep(ctx: &Hyd<'_>, tstep: &mut i64) {
    for ti in 1..=ctx.net.ntanks() {
        let tank = ctx.net.tank(ti);
        if tank.is_reservoir() {
            continue;
        }
        let n = tank.node;
        let h = ctx.st.head[n];
        let q = ctx.st.demand[n]; // net inflow
        if q.abs() <= QZERO {
            continue;
        }
        let v = if q > 0.0 && h < tank.hmax {
            tank.vmax - tank.volume
        } else if q < 0.0 && h > tank.hmin {
            tank.vmin - tank.volume
        } else {
            continue;
        };
        let t = (v / q).round() as i64;
        if t > 0 && t < *tstep {
            *tstep = t;
        }
    }
}

/// Revises the time step based on the shortest time to activate a simple
/// control.
pub(crate) fn control_timestep(ctx: &Hyd<'_>, tstep: &mut i64) {
    for control in &ctx.net.controls {
        if !control.enabled {
            continue;
        }
        let mut t: i64 = 0;
        let n = control.node;
        if n > 0 {
            let ti = ctx.net.tank_index(n);
            if ti == 0 {
                continue; // Junction-pressure controls handled after solves
            }
            let h = ctx.st.head[n];
            let q = ctx.st.demand[n];
            if q.abs() <= QZERO {
                continue;
            }
            let grade = control.grade + ctx.net.node(n).elevation;
            if (h < grade && control.control_type == ControlType::HiLevel && q > 0.0)
                || (h > grade && control.control_type == ControlType::LowLevel && q < 0.0)
            {
                let v = tank_volume(ctx.net, ti, grade) - ctx.net.tank(ti).volume;
                t = (v / q).round() as i64;
            }
        }

        if control.control_type == ControlType::Timer && control.time > ctx.st.htime {
            t = control.time - ctx.st.htime;
        }

        if control.control_type == ControlType::TimeOfDay {
            let t1 = (ctx.st.htime + ctx.times.tstart) % SEC_PER_DAY;
            let t2 = control.time;
            t = if t2 >= t1 { t2 - t1 } else { SEC_PER_DAY - t1 + t2 };
        }

        if t > 0 && t < *tstep {
            // Only if the control would actually change the link.
            let k = control.link;
            let link = ctx.net.link(k);
            if (link.link_type > LinkType::Pipe && ctx.st.setting[k] != control.setting)
                || ctx.st.status[k] != control.status
            {
                *tstep = t;
            }
        }
    }
}

/// Updates the next time step by checking whether any rule fires before
/// it, advancing tank levels along the way. The simulation clock is
/// advanced in rule-step increments for evaluation and restored before
/// returning; the tank-level updates persist.
pub(crate) fn rule_timestep(ctx: &mut Hyd<'_>, tstep: &mut i64) {
    let tnow = ctx.st.htime;
    let tmax = tnow + *tstep;

    let (mut dt, mut dt1);
    if ctx.net.rules.is_empty() {
        dt = *tstep;
        dt1 = dt;
    } else {
        dt = ctx.times.rulestep;
        dt1 = ctx.times.rulestep - (tnow % ctx.times.rulestep);
    }
    dt = dt.min(*tstep);
    dt1 = dt1.min(*tstep);
    if dt1 == 0 {
        dt1 = dt;
    }

    loop {
        ctx.st.htime += dt1;
        tank_levels(ctx, dt1);
        if crate::rules::check_rules(ctx, dt1) > 0 {
            break;
        }
        dt = dt.min(tmax - ctx.st.htime);
        dt1 = dt;
        if dt <= 0 {
            break;
        }
    }

    *tstep = ctx.st.htime - tnow;
    ctx.st.htime = tnow;
}

/// Accumulates pump energy usage over a time step.
pub(crate) fn add_energy(ctx: &mut Hyd<'_>, hstep: i64) {
    // Time interval in hours.
    let dt = if ctx.times.duration == 0 {
        1.0
    } else if ctx.st.htime < ctx.times.duration {
        hstep as f64 / 3600.0
    } else {
        0.0
    };
    if dt == 0.0 {
        return;
    }
    let n = (ctx.st.htime + ctx.times.pstart) / ctx.times.pstep;

    // Default energy cost at the current time.
    let c0 = ctx.en.ecost;
    let f0 = if ctx.en.epat > 0 {
        ctx.net.pattern_factor(ctx.en.epat, n)
    } else {
        1.0
    };

    let mut psum = 0.0;
    for pi in 1..=ctx.net.npumps() {
        let pump = ctx.net.pump(pi);
        let k = pump.link;
        if ctx.st.status[k].is_closed() {
            continue;
        }
        let q = ctx.st.flow[k].abs().max(QZERO);

        let mut c = if pump.ecost > 0.0 { pump.ecost } else { c0 };
        c *= if pump.epat > 0 {
            ctx.net.pattern_factor(pump.epat, n)
        } else {
            f0
        };

        let (p, e) = get_energy(ctx, k);
        psum += p;

        let pump = ctx.net.pump_mut(pi);
        pump.energy[0] += dt; // time on-line
        pump.energy[1] += e * dt; // efficiency-hours
        pump.energy[2] += p / q * dt; // kW per flow
        pump.energy[3] += p * dt; // kWh
        pump.energy[4] = pump.energy[4].max(p);
        pump.energy[5] += c * p * dt; // cost
    }
    ctx.en.emax = ctx.en.emax.max(psum);
}

/// Computes the energy (kW) and efficiency associated with link `k`.
pub(crate) fn get_energy(ctx: &Hyd<'_>, k: usize) -> (f64, f64) {
    if ctx.st.status[k].is_closed() {
        return (0.0, 0.0);
    }
    let link = ctx.net.link(k);
    let q = ctx.st.flow[k].abs();
    let dh = (ctx.st.head[link.n1] - ctx.st.head[link.n2]).abs();

    let e = if link.link_type == LinkType::Pump {
        let mut e = ctx.en.epump;
        if let Some(pi) = ctx.net.find_pump(k) {
            let pump = ctx.net.pump(pi);
            if pump.ecurve > 0 {
                e = ctx.net.curve(pump.ecurve).interpolate(q / ctx.qcf);
            }
        }
        e.clamp(1.0, 100.0) / 100.0
    } else {
        1.0
    };

    // kW = rho g Q dh / e, with rho g folded into SpGrav * 9.81.
    let kw = dh * q * ctx.op.spgrav * crate::units::GRAVITY / e;
    (kw, e)
}

/// Computes new tank levels and volumes after a time step, clamping at
/// the capacity limits.
pub(crate) fn tank_levels(ctx: &mut Hyd<'_>, tstep: i64) {
    for ti in 1..=ctx.net.ntanks() {
        let tank = ctx.net.tank(ti);
        if tank.is_reservoir() {
            continue;
        }
        let n = tank.node;
        let dv = ctx.st.demand[n] * tstep as f64;
        let mut volume = tank.volume + dv;

        // Check if the tank will be full or empty within the next second.
        if volume + ctx.st.demand[n] >= tank.vmax {
            volume = tank.vmax;
        }
        if volume - ctx.st.demand[n] <= tank.vmin {
            volume = tank.vmin;
        }

        ctx.net.tank_mut(ti).volume = volume;
        ctx.st.head[n] = tank_grade(ctx.net, ti, volume);
    }
}

/// Water volume in tank `ti` at grade `h`.
pub(crate) fn tank_volume(net: &Network, ti: usize, h: f64) -> f64 {
    let tank = net.tank(ti);
    if tank.vol_curve == 0 {
        tank.vmin + (h - tank.hmin) * tank.area
    } else {
        let el = net.node(tank.node).elevation;
        net.curve(tank.vol_curve).interpolate(h - el)
    }
}

/// Water grade in tank `ti` holding volume `v`.
pub(crate) fn tank_grade(net: &Network, ti: usize, v: f64) -> f64 {
    let tank = net.tank(ti);
    if tank.vol_curve == 0 {
        if tank.area == 0.0 {
            return tank.h0;
        }
        tank.hmin + (v - tank.vmin) / tank.area
    } else {
        let el = net.node(tank.node).elevation;
        el + net.curve(tank.vol_curve).interpolate_inverse(v)
    }
}

/// Sets a link's status to open or closed, adjusting its setting the way
/// an operator command would.
pub(crate) fn set_link_status(
    link: &Link,
    open: bool,
    s: &mut LinkStatus,
    k: &mut Option<f64>,
) {
    if open {
        if link.link_type == LinkType::Pump {
            *k = Some(1.0);
        } else if link.link_type.is_valve() && link.link_type != LinkType::Gpv {
            *k = None;
        }
        *s = LinkStatus::Open;
    } else {
        if link.link_type == LinkType::Pump {
            *k = Some(0.0);
        } else if link.link_type.is_valve() && link.link_type != LinkType::Gpv {
            *k = None;
        }
        *s = LinkStatus::Closed;
    }
}

/// Sets a pump speed or valve setting, adjusting status when necessary.
pub(crate) fn set_link_setting(
    link: &Link,
    value: f64,
    s: &mut LinkStatus,
    k: &mut Option<f64>,
) {
    if link.link_type == LinkType::Pump {
        *k = Some(value);
        if value > 0.0 && s.is_closed() {
            *s = LinkStatus::Open;
        }
        if value == 0.0 && !s.is_closed() {
            *s = LinkStatus::Closed;
        }
    } else if link.link_type == LinkType::Fcv {
        *k = Some(value);
        *s = LinkStatus::Active;
    } else {
        // Open a closed control valve whose status was fixed.
        if k.is_none() && s.is_closed() {
            *s = LinkStatus::Open;
        }
        *k = Some(value);
        if link.link_type.is_control_valve() {
            *s = LinkStatus::Active;
        }
    }
}

/// Logs tank fill/drain transitions and link status changes since the
/// previous report.
fn write_hyd_status(ctx: &mut Hyd<'_>, iter: i32, relerr: f64) {
    let clock = crate::report::clocktime(ctx.st.htime + ctx.times.tstart);
    ctx.rpt.writeline(&format!(
        "{}: balanced after {} trials (relative error {:.6})",
        clock, iter, relerr
    ));

    // Tank state follows the sign of its net inflow.
    let nlinks = ctx.net.nlinks();
    for ti in 1..=ctx.net.ntanks() {
        let tank = ctx.net.tank(ti);
        let n = tank.node;
        let q = ctx.st.demand[n];
        let newstat = if q.abs() < 1.0e-5 {
            LinkStatus::Closed
        } else if q > 0.0 {
            LinkStatus::Filling
        } else {
            LinkStatus::Emptying
        };
        if newstat != ctx.st.old_status[nlinks + ti] {
            let id = ctx.net.node(n).id.clone();
            if tank.is_reservoir() {
                ctx.rpt
                    .writeline(&format!("{}: reservoir {} is {:?}", clock, id, newstat));
            } else {
                let level = ctx.st.head[n] - ctx.net.node(n).elevation;
                ctx.rpt.writeline(&format!(
                    "{}: tank {} is {:?} at level {:.3} m",
                    clock, id, newstat, level
                ));
            }
            ctx.st.old_status[nlinks + ti] = newstat;
        }
    }

    for k in 1..=nlinks {
        let s = ctx.st.status[k];
        if s != ctx.st.old_status[k] {
            let id = ctx.net.link(k).id.clone();
            ctx.rpt.stat_change(ctx.st.htime + ctx.times.tstart, &id, ctx.st.old_status[k], s);
            ctx.st.old_status[k] = s;
        }
    }
}

/// Raises runtime warnings for the converged solution.
fn write_hyd_warnings(ctx: &mut Hyd<'_>, iter: i32, relerr: f64) {
    if relerr > ctx.op.hacc && iter > ctx.op.max_iter {
        ctx.rpt.warn(
            Warning::Unbalanced,
            &format!("at {}", crate::report::clocktime(ctx.st.htime + ctx.times.tstart)),
        );
    }
    for i in 1..=ctx.net.njuncs() {
        if ctx.st.demand[i] > 0.0 && ctx.st.head[i] < ctx.net.node(i).elevation {
            ctx.rpt.warn(Warning::NegativePressure, &ctx.net.node(i).id.clone());
            break;
        }
    }
    for pi in 1..=ctx.net.npumps() {
        let k = ctx.net.pump(pi).link;
        if matches!(ctx.st.status[k], LinkStatus::XHead | LinkStatus::XFlow) {
            ctx.rpt.warn(Warning::PumpOutsideCurve, &ctx.net.link(k).id.clone());
        }
    }
    for vi in 0..ctx.net.nvalves() {
        let k = ctx.net.valves[vi].link;
        if matches!(ctx.st.status[k], LinkStatus::XFcv | LinkStatus::XPressure) {
            ctx.rpt.warn(Warning::ValveNotMaintained, &ctx.net.link(k).id.clone());
        }
    }
    check_connectivity(ctx);
}

/// Breadth-first scan from the fixed-grade nodes over conducting links;
/// junctions with demand left unreached mean the network is disconnected
/// at this instant.
fn check_connectivity(ctx: &mut Hyd<'_>) {
    let nnodes = ctx.net.nnodes();
    let mut reached = vec![false; nnodes + 1];
    let mut queue: Vec<usize> = Vec::new();
    for ti in 1..=ctx.net.ntanks() {
        let n = ctx.net.tank(ti).node;
        reached[n] = true;
        queue.push(n);
    }
    while let Some(n) = queue.pop() {
        for a in &ctx.sol.adj[n] {
            if !reached[a.node] && !ctx.st.status[a.link].is_closed() {
                reached[a.node] = true;
                queue.push(a.node);
            }
        }
    }
    for i in 1..=ctx.net.njuncs() {
        if !reached[i] && ctx.st.demand[i] > 0.0 {
            ctx.rpt.warn(Warning::Disconnected, &ctx.net.node(i).id.clone());
            break;
        }
    }
}
