//! Water quality transport.
//!
//! Models the advective-reactive transport of a single constituent (or
//! water age, or a source trace) through the network using plug-flow
//! segments in pipes and one of four mixing models in tanks. Each quality
//! time step reacts segment contents, moves mass downstream, mixes it at
//! nodes, injects source mass and releases new segments upstream, then
//! updates tank contents against the current hydraulic solution.

pub(crate) mod segpool;

use segpool::{SegChain, SegPool};

use crate::hydraulics::{HydState, QZERO, TINY};
use crate::network::Network;
use crate::report::Report;
use crate::types::*;
use crate::units::{DIFFUSIVITY, VISCOSITY};

/// Cumulative constituent mass accounting over a quality run. A ratio
/// near one means the transport conserved mass.
#[derive(Debug, Default, Clone)]
pub struct MassBalance {
    /// Mass stored in the network when transport began.
    pub initial: f64,
    /// Mass added by sources and fixed-grade inflows.
    pub inflow: f64,
    /// Mass carried out through demands and into fixed-grade nodes.
    pub outflow: f64,
    /// Net mass removed by reactions (negative for growth).
    pub reacted: f64,
    /// Mass stored in the network now.
    pub stored: f64,
}

impl MassBalance {
    /// Ratio of accounted-for mass to mass that entered the system.
    pub fn ratio(&self) -> f64 {
        let inputs = self.initial + self.inflow;
        let outputs = self.outflow + self.reacted + self.stored;
        if inputs > 0.0 {
            outputs / inputs
        } else {
            1.0
        }
    }
}

/// Mutable water-quality state of a project, sized at solver open.
#[derive(Debug, Default)]
pub struct QualState {
    /// Current quality at each node.
    pub node_qual: Vec<f64>,
    pub(crate) pool: SegPool,
    /// Segment chains: links first, then tanks.
    pub(crate) chains: Vec<SegChain>,
    /// Flow direction of each link during the current hydraulic interval.
    pub flow_dir: Vec<i8>,
    /// Wall reaction rate coefficient per link.
    pub rate_coeff: Vec<f64>,
    /// Current quality time (s).
    pub qtime: i64,
    /// Next reporting time for output snapshots (s).
    pub rtime: i64,
    /// Whether any reaction coefficients are active.
    pub reactive: bool,
    /// Scratch: volume and mass flowing into each node this step.
    vol_in: Vec<f64>,
    mass_in: Vec<f64>,
    /// Scratch: average quality of segments incident on each node.
    x_avg: Vec<f64>,
    /// Average reaction rate accumulators for reporting (mass/hr).
    pub wbulk: f64,
    pub wwall: f64,
    pub wtank: f64,
    pub wsource: f64,
    pub mass: MassBalance,
}

impl QualState {
    pub(crate) fn allocate(&mut self, nnodes: usize, nlinks: usize, ntanks: usize) {
        self.node_qual = vec![0.0; nnodes + 1];
        self.chains = vec![SegChain::default(); nlinks + ntanks + 1];
        self.flow_dir = vec![0; nlinks + 1];
        self.rate_coeff = vec![0.0; nlinks + 1];
        self.vol_in = vec![0.0; nnodes + 1];
        self.mass_in = vec![0.0; nnodes + 1];
        self.x_avg = vec![0.0; nnodes + 1];
    }
}

/// Borrowed view of everything the quality engine touches.
pub(crate) struct Qual<'a> {
    pub net: &'a mut Network,
    pub op: &'a HydOptions,
    pub qop: &'a QualOptions,
    pub times: &'a TimeOptions,
    pub st: &'a mut HydState,
    pub qs: &'a mut QualState,
    pub rpt: &'a mut Report,
}

impl Qual<'_> {
    fn up_node(&self, k: usize) -> usize {
        let link = self.net.link(k);
        if self.qs.flow_dir[k] >= 0 {
            link.n1
        } else {
            link.n2
        }
    }

    fn down_node(&self, k: usize) -> usize {
        let link = self.net.link(k);
        if self.qs.flow_dir[k] >= 0 {
            link.n2
        } else {
            link.n1
        }
    }
}

/// Opens the water quality solver.
pub(crate) fn open_qual(ctx: &mut Qual<'_>) {
    ctx.qs
        .allocate(ctx.net.nnodes(), ctx.net.nlinks(), ctx.net.ntanks());
    ctx.qs.reactive = reactive(ctx.net, ctx.qop);
}

/// Whether any reaction is configured anywhere in the network.
fn reactive(net: &Network, qop: &QualOptions) -> bool {
    if qop.quality != QualityType::Chem {
        return qop.quality == QualityType::Age;
    }
    for k in 1..=net.nlinks() {
        let link = net.link(k);
        if link.kb != 0.0 || link.kw != 0.0 {
            return true;
        }
    }
    net.tanks.iter().any(|t| t.kb != 0.0)
}

/// Initializes the water quality solver: node qualities, tank contents,
/// source accounting and the clock.
pub(crate) fn init_qual(ctx: &mut Qual<'_>) {
    for i in 1..=ctx.net.nnodes() {
        ctx.qs.node_qual[i] = ctx.net.node(i).init_quality;
    }
    for ti in 1..=ctx.net.ntanks() {
        let node = ctx.net.tank(ti).node;
        let c0 = ctx.net.node(node).init_quality;
        let tank = ctx.net.tank_mut(ti);
        tank.concentration = c0;
        tank.volume = tank.v0;
    }
    for i in 1..=ctx.net.nnodes() {
        if let Some(source) = &mut ctx.net.node_mut(i).source {
            source.mass_added = 0.0;
        }
    }
    if ctx.qop.quality == QualityType::Trace {
        ctx.qs.node_qual.fill(0.0);
    }
    ctx.qs.pool.clear();
    for chain in &mut ctx.qs.chains {
        *chain = SegChain::default();
    }
    ctx.qs.flow_dir.fill(0);
    ctx.qs.qtime = 0;
    ctx.qs.rtime = ctx.times.rstart;
    ctx.qs.wbulk = 0.0;
    ctx.qs.wwall = 0.0;
    ctx.qs.wtank = 0.0;
    ctx.qs.wsource = 0.0;
    ctx.qs.mass = MassBalance::default();
}

/// Hooks run whenever a new hydraulic solution becomes current: reaction
/// rate coefficients, then segment creation or re-orientation.
pub(crate) fn qual_hyd_updated(ctx: &mut Qual<'_>) {
    if ctx.qs.reactive && ctx.qop.quality == QualityType::Chem {
        rate_coeffs(ctx);
    }
    if ctx.qs.qtime == 0 {
        init_segs(ctx);
    } else {
        reorient_segs(ctx);
    }
}

/// Computes the apparent wall reaction rate coefficient of each link,
/// limited by mass transfer to the pipe wall.
fn rate_coeffs(ctx: &mut Qual<'_>) {
    for k in 1..=ctx.net.nlinks() {
        let kw = ctx.net.link(k).kw;
        ctx.qs.rate_coeff[k] = if kw != 0.0 { pipe_rate(ctx, k) } else { 0.0 };
    }
}

/// Mass transfer-limited wall rate for one pipe, using the
/// Notter-Sleicher formula in turbulent flow and the Graetz solution in
/// laminar flow.
fn pipe_rate(ctx: &Qual<'_>, k: usize) -> f64 {
    let link = ctx.net.link(k);
    let d = link.diameter;
    if d == 0.0 {
        return 0.0;
    }
    let viscos = VISCOSITY * ctx.op.viscos;
    let diffus = DIFFUSIVITY * ctx.qop.diffus;

    // Zero diffusivity: no mass transfer limitation.
    if diffus == 0.0 {
        if ctx.qop.wall_order == 0.0 {
            return crate::hydraulics::BIG;
        }
        return link.kw * 4.0 / d;
    }
    let sc = viscos / diffus; // Schmidt number

    let area = std::f64::consts::PI * d * d / 4.0;
    let u = ctx.st.flow[k].abs() / area;
    let re = u * d / viscos;

    let sh = if re < 1.0 {
        // Stagnant flow: transfer coefficient = diffusivity / radius.
        2.0
    } else if re >= 2300.0 {
        0.0149 * re.powf(0.88) * sc.powf(0.333)
    } else {
        let y = d / link.length * re * sc;
        3.65 + 0.0668 * y / (1.0 + 0.04 * y.powf(0.667))
    };

    let kf = sh * diffus / d;
    if ctx.qop.wall_order == 0.0 {
        return kf;
    }
    let kw = link.kw;
    (4.0 / d) * kw * kf / (kf + kw.abs())
}

/// Creates one segment per link (and per segmented tank) holding the
/// current quality of its downstream node.
fn init_segs(ctx: &mut Qual<'_>) {
    for k in 1..=ctx.net.nlinks() {
        ctx.qs.flow_dir[k] = if ctx.st.flow[k] < 0.0 { -1 } else { 1 };
        let j = ctx.down_node(k);
        let c = ctx.qs.node_qual[j];
        let v = ctx.net.link(k).volume().max(0.0);
        ctx.qs.chains[k].clear(&mut ctx.qs.pool);
        if v > 0.0 {
            ctx.qs.chains[k].push_last(&mut ctx.qs.pool, v, c);
        }
    }

    let nlinks = ctx.net.nlinks();
    for ti in 1..=ctx.net.ntanks() {
        let tank = ctx.net.tank(ti).clone();
        if tank.is_reservoir() || tank.mix_model == MixingModel::Mix1 {
            continue;
        }
        let k = nlinks + ti;
        ctx.qs.chains[k].clear(&mut ctx.qs.pool);
        let c = tank.concentration;
        if tank.mix_model == MixingModel::Mix2 {
            let v1max = tank.mix_fraction * tank.vmax;
            // Ambient zone first, mixing zone last.
            let v2 = (tank.volume - v1max).max(0.0);
            ctx.qs.chains[k].push_last(&mut ctx.qs.pool, v2, c);
            ctx.qs.chains[k].push_last(&mut ctx.qs.pool, tank.volume - v2, c);
        } else {
            ctx.qs.chains[k].push_last(&mut ctx.qs.pool, tank.volume, c);
        }
    }

    // Mass stored at the start of transport.
    ctx.qs.mass.initial = stored_mass(ctx);
}

/// Reverses the segment chain of any link whose flow direction changed.
fn reorient_segs(ctx: &mut Qual<'_>) {
    for k in 1..=ctx.net.nlinks() {
        let newdir: i8 = if ctx.st.flow[k] == 0.0 {
            ctx.qs.flow_dir[k]
        } else if ctx.st.flow[k] < 0.0 {
            -1
        } else {
            1
        };
        if newdir != ctx.qs.flow_dir[k] {
            ctx.qs.chains[k].reverse(&mut ctx.qs.pool);
            ctx.qs.flow_dir[k] = newdir;
        }
    }
}

/// Total constituent mass resident in pipes and tanks.
fn stored_mass(ctx: &Qual<'_>) -> f64 {
    let mut mass = 0.0;
    for k in 1..=ctx.net.nlinks() {
        let (_, m) = ctx.qs.chains[k].totals(&ctx.qs.pool);
        mass += m;
    }
    for ti in 1..=ctx.net.ntanks() {
        let tank = ctx.net.tank(ti);
        if tank.is_reservoir() {
            continue;
        }
        if tank.mix_model == MixingModel::Mix1 {
            mass += tank.volume * tank.concentration;
        } else {
            let (_, m) = ctx.qs.chains[ctx.net.nlinks() + ti].totals(&ctx.qs.pool);
            mass += m;
        }
    }
    mass
}

/// Transports the constituent over `tstep` seconds in quality-step
/// increments.
pub(crate) fn transport(ctx: &mut Qual<'_>, tstep: i64) {
    let mut qtime = 0;
    while qtime < tstep {
        let dt = ctx.times.qstep.min(tstep - qtime);
        qtime += dt;
        if ctx.qs.reactive {
            react_segs(ctx, dt);
        }
        accumulate(ctx, dt);
        update_nodes(ctx, dt);
        source_input(ctx, dt);
        release(ctx, dt);
    }
    ctx.qs.mass.stored = stored_mass(ctx);
}

/// Applies bulk and wall reactions to every pipe segment and to tank
/// contents of complete-mix tanks (segmented tanks react inside their
/// mixing routines).
fn react_segs(ctx: &mut Qual<'_>, dt: i64) {
    let dt = dt as f64;
    for k in 1..=ctx.net.nlinks() {
        let link = ctx.net.link(k).clone();
        let kf = ctx.qs.rate_coeff[k];
        let mut cur = ctx.qs.chains[k].first;
        while let Some(id) = cur {
            let seg = *ctx.qs.pool.get(id);
            let c = pipe_react(ctx, &link, kf, seg.c, seg.v, dt);
            let seg = ctx.qs.pool.get_mut(id);
            seg.c = c;
            cur = seg.prev;
        }
    }
}

/// New quality of a pipe segment after reacting for `dt` seconds.
fn pipe_react(ctx: &mut Qual<'_>, link: &Link, kf: f64, c: f64, v: f64, dt: f64) -> f64 {
    if ctx.qop.quality == QualityType::Age {
        return c + dt / 3600.0;
    }
    let rbulk = bulk_rate(ctx.qop, c, link.kb, ctx.qop.bulk_order);
    let rwall = wall_rate(ctx.qop, c, link.diameter, link.kw, kf);
    let dcdt = rbulk + rwall;
    let cnew = (c + dcdt * dt).max(0.0);

    // Track average reaction rates and the reacted mass.
    ctx.qs.wbulk += rbulk.abs() * v * dt;
    ctx.qs.wwall += rwall.abs() * v * dt;
    ctx.qs.mass.reacted += (c - cnew) * v;
    cnew
}

/// New quality of tank contents after reacting for `dt` seconds.
fn tank_react(ctx: &mut Qual<'_>, c: f64, v: f64, kb: f64, dt: f64) -> f64 {
    if !ctx.qs.reactive {
        return c;
    }
    if ctx.qop.quality == QualityType::Age {
        return c + dt / 3600.0;
    }
    let rate = bulk_rate(ctx.qop, c, kb, ctx.qop.tank_order);
    let cnew = (c + rate * dt).max(0.0);
    ctx.qs.wtank += rate.abs() * v * dt;
    ctx.qs.mass.reacted += (c - cnew) * v;
    cnew
}

/// Bulk reaction rate for the configured kinetic order, with an optional
/// limiting potential.
fn bulk_rate(qop: &QualOptions, c: f64, kb: f64, order: f64) -> f64 {
    let mut c = c;
    if order == 0.0 {
        c = 1.0;
    } else if order < 0.0 {
        // Michaelis-Menten kinetics.
        let mut c1 = qop.climit + kb.signum() * c;
        if c1.abs() < TINY {
            c1 = c1.signum() * TINY;
        }
        c /= c1;
    } else {
        // N-th order kinetics with a limiting potential.
        let c1 = if qop.climit == 0.0 {
            c
        } else {
            (kb.signum() * (qop.climit - c)).max(0.0)
        };
        c = if order == 1.0 {
            c1
        } else if order == 2.0 {
            c1 * c
        } else {
            c1 * c.max(0.0).powf(order - 1.0)
        };
    }
    if c < 0.0 {
        c = 0.0;
    }
    kb * c
}

/// Wall reaction rate per unit volume; zero-order rates are limited by
/// mass transfer.
fn wall_rate(qop: &QualOptions, c: f64, d: f64, kw: f64, kf: f64) -> f64 {
    if kw == 0.0 || d == 0.0 {
        return 0.0;
    }
    if qop.wall_order == 0.0 {
        let kfs = kw.signum() * c * kf; // rate sustainable by transfer
        let mut kwv = kw;
        if kfs.abs() < kwv.abs() {
            kwv = kfs;
        }
        kwv * 4.0 / d
    } else {
        c * kf
    }
}

/// Moves the flow volume of each link out of its leading segments and
/// into its downstream node, accumulating inflow volume and mass.
fn accumulate(ctx: &mut Qual<'_>, dt: i64) {
    ctx.qs.vol_in.fill(0.0);
    ctx.qs.mass_in.fill(0.0);
    ctx.qs.x_avg.fill(0.0);

    // Average quality of the segments incident on each node, used when
    // nothing flows through the node this step.
    for k in 1..=ctx.net.nlinks() {
        let j = ctx.down_node(k);
        if let Some(first) = ctx.qs.chains[k].first {
            ctx.qs.mass_in[j] += ctx.qs.pool.get(first).c;
            ctx.qs.vol_in[j] += 1.0;
        }
        let i = ctx.up_node(k);
        if let Some(last) = ctx.qs.chains[k].last {
            ctx.qs.mass_in[i] += ctx.qs.pool.get(last).c;
            ctx.qs.vol_in[i] += 1.0;
        }
    }
    for n in 1..=ctx.net.nnodes() {
        if ctx.qs.vol_in[n] > 0.0 {
            ctx.qs.x_avg[n] = ctx.qs.mass_in[n] / ctx.qs.vol_in[n];
        }
    }

    ctx.qs.vol_in.fill(0.0);
    ctx.qs.mass_in.fill(0.0);
    for k in 1..=ctx.net.nlinks() {
        let j = ctx.down_node(k);
        let mut v = ctx.st.flow[k].abs() * dt as f64;
        while v > 0.0 {
            let Some(first) = ctx.qs.chains[k].first else {
                break;
            };
            let seg = *ctx.qs.pool.get(first);
            // Volume moved out of the leading segment, unless it is also
            // the only segment left.
            let mut vseg = seg.v.min(v);
            if ctx.qs.chains[k].first == ctx.qs.chains[k].last {
                vseg = v;
            }
            ctx.qs.vol_in[j] += vseg;
            ctx.qs.mass_in[j] += vseg * seg.c;
            v -= vseg;
            if v >= 0.0 && vseg >= seg.v && ctx.qs.chains[k].first != ctx.qs.chains[k].last {
                ctx.qs.chains[k].pop_first(&mut ctx.qs.pool);
            } else {
                ctx.qs.pool.get_mut(first).v -= vseg;
            }
        }
    }
}

/// Mixes accumulated inflow at junctions; nodes with no through-flow keep
/// the average quality of their incident segments.
fn update_nodes(ctx: &mut Qual<'_>, dt: i64) {
    for i in 1..=ctx.net.njuncs() {
        // External inflow enters with zero quality unless a source is
        // attached (handled in source_input).
        if ctx.st.demand[i] < 0.0 {
            ctx.qs.vol_in[i] -= ctx.st.demand[i] * dt as f64;
        }
        if ctx.qs.vol_in[i] > 0.0 {
            ctx.qs.node_qual[i] = ctx.qs.mass_in[i] / ctx.qs.vol_in[i];
        } else {
            ctx.qs.node_qual[i] = ctx.qs.x_avg[i];
        }
        // Mass leaving the system through demands.
        if ctx.st.demand[i] > 0.0 {
            ctx.qs.mass.outflow += ctx.st.demand[i] * dt as f64 * ctx.qs.node_qual[i];
        }
    }
    update_tanks(ctx, dt);
    if ctx.qop.quality == QualityType::Trace && ctx.qop.trace_node > 0 {
        ctx.qs.node_qual[ctx.qop.trace_node] = 100.0;
    }
}

/// Adds source mass at nodes with quality sources, modulated by their
/// patterns, and re-expresses source-node concentrations.
fn source_input(ctx: &mut Qual<'_>, dt: i64) {
    if ctx.qop.quality != QualityType::Chem {
        return;
    }
    let qcutoff = 10.0 * QZERO;
    let p = (ctx.st.htime + ctx.times.pstart) / ctx.times.pstep;
    let njuncs = ctx.net.njuncs();

    for n in 1..=ctx.net.nnodes() {
        let Some(source) = ctx.net.node(n).source.clone() else {
            continue;
        };
        if source.strength == 0.0 {
            continue;
        }

        // Flow volume leaving the node.
        let volout = if n <= njuncs {
            ctx.qs.vol_in[n]
        } else {
            ctx.qs.vol_in[n] - ctx.st.demand[n] * dt as f64
        };
        let qout = volout / dt as f64;
        if qout <= qcutoff {
            continue;
        }

        let s = source_strength(ctx.net, &source, p);
        let massadded = match source.source_type {
            SourceType::Concen => {
                // Concentration sources only dose external inflow.
                if n <= njuncs && ctx.st.demand[n] < 0.0 {
                    -s * ctx.st.demand[n] * dt as f64
                } else if n > njuncs {
                    s * qout * dt as f64
                } else {
                    0.0
                }
            }
            SourceType::Mass => s * dt as f64,
            SourceType::Setpoint => {
                let c = ctx.qs.node_qual[n];
                if s > c {
                    (s - c) * volout
                } else {
                    0.0
                }
            }
            SourceType::FlowPaced => s * volout,
        };

        // Source contribution to the node's outgoing concentration.
        ctx.qs.node_qual[n] = (ctx.qs.node_qual[n] + massadded / volout).max(0.0);
        let is_reservoir = ctx.net.tank_index(n) > 0 && ctx.net.tank(ctx.net.tank_index(n)).is_reservoir();
        if let Some(source) = &mut ctx.net.node_mut(n).source {
            source.mass_added += massadded;
        }
        ctx.qs.wsource += massadded;
        // Reservoir outflow mass is already counted when it is released.
        if !is_reservoir {
            ctx.qs.mass.inflow += massadded;
        }
    }
}

/// Pattern-adjusted strength of a source; mass-rate sources are given in
/// mass per minute.
fn source_strength(net: &Network, source: &Source, period: i64) -> f64 {
    let mut s = source.strength;
    if source.source_type == SourceType::Mass {
        s /= 60.0;
    }
    s * net.pattern_factor(source.pattern, period)
}

/// Releases outflow from each node into the upstream end of its outflow
/// links, merging with the last segment when the quality difference is
/// inside the tolerance.
fn release(ctx: &mut Qual<'_>, dt: i64) {
    for k in 1..=ctx.net.nlinks() {
        if ctx.st.flow[k] == 0.0 {
            continue;
        }
        let n = ctx.up_node(k);
        let c = ctx.qs.node_qual[n];
        let v = ctx.st.flow[k].abs() * dt as f64;
        if v < TINY {
            continue;
        }

        // Mass released from a reservoir crosses the system boundary; the
        // mass arriving at reservoirs is tallied below from accumulate().
        if ctx.net.tank_index(n) > 0 && ctx.net.tank(ctx.net.tank_index(n)).is_reservoir() {
            ctx.qs.mass.inflow += v * c;
        }

        let chain = &mut ctx.qs.chains[k];
        match chain.last {
            Some(last) => {
                let seg = *ctx.qs.pool.get(last);
                if (seg.c - c).abs() < ctx.qop.ctol {
                    let seg = ctx.qs.pool.get_mut(last);
                    seg.c = (seg.c * seg.v + c * v) / (seg.v + v);
                    seg.v += v;
                } else {
                    chain.push_last(&mut ctx.qs.pool, v, c);
                }
            }
            None => chain.push_last(&mut ctx.qs.pool, v, c),
        }
    }

    // Mass entering reservoirs leaves the system.
    for ti in 1..=ctx.net.ntanks() {
        let tank = ctx.net.tank(ti);
        if tank.is_reservoir() {
            let n = tank.node;
            ctx.qs.mass.outflow += ctx.qs.mass_in[n];
        }
    }
}

/// Updates tank contents per each tank's mixing model. Water age still
/// accrues in tanks through the reaction step.
fn update_tanks(ctx: &mut Qual<'_>, dt: i64) {
    for ti in 1..=ctx.net.ntanks() {
        let tank = ctx.net.tank(ti);
        if tank.is_reservoir() {
            // Reservoir quality holds its initial value; age and trace
            // modes pin it.
            let n = tank.node;
            match ctx.qop.quality {
                QualityType::Age => ctx.qs.node_qual[n] = 0.0,
                QualityType::Trace => {}
                _ => ctx.qs.node_qual[n] = ctx.net.node(n).init_quality,
            }
            continue;
        }
        match tank.mix_model {
            MixingModel::Mix1 => tank_mix1(ctx, ti, dt),
            MixingModel::Mix2 => tank_mix2(ctx, ti, dt),
            MixingModel::Fifo => tank_mix3(ctx, ti, dt),
            MixingModel::Lifo => tank_mix4(ctx, ti, dt),
        }
    }
}

/// Complete-mix tank model.
fn tank_mix1(ctx: &mut Qual<'_>, ti: usize, dt: i64) {
    let tank = ctx.net.tank(ti).clone();
    let n = tank.node;
    let mut c = tank_react(ctx, tank.concentration, tank.volume, tank.kb, dt as f64);

    let vnet = ctx.st.demand[n] * dt as f64;
    let vin = ctx.qs.vol_in[n];
    let cin = if vin > 0.0 {
        ctx.qs.mass_in[n] / vin
    } else {
        0.0
    };

    let cmax = c.max(cin);
    if vin > 0.0 {
        c = (c * tank.volume + cin * vin) / (tank.volume + vin);
    }
    c = c.min(cmax).max(0.0);

    let tank = ctx.net.tank_mut(ti);
    tank.concentration = c;
    tank.volume = (tank.volume + vnet).max(0.0);
    ctx.qs.node_qual[n] = c;
}

/// Two-compartment tank model: a mixing zone near the inlet/outlet and an
/// ambient zone holding the remainder.
fn tank_mix2(ctx: &mut Qual<'_>, ti: usize, dt: i64) {
    let tank = ctx.net.tank(ti).clone();
    let n = tank.node;
    let k = ctx.net.nlinks() + ti;
    let (Some(last), Some(first)) = (ctx.qs.chains[k].last, ctx.qs.chains[k].first) else {
        return;
    };
    if last == first {
        return;
    }
    // Mixing zone is the last segment, ambient zone the first.
    let mut seg1 = *ctx.qs.pool.get(last);
    let mut seg2 = *ctx.qs.pool.get(first);
    if ctx.qs.reactive {
        seg1.c = tank_react(ctx, seg1.c, seg1.v, tank.kb, dt as f64);
        seg2.c = tank_react(ctx, seg2.c, seg2.v, tank.kb, dt as f64);
    }

    let vnet = ctx.st.demand[n] * dt as f64;
    let vin = ctx.qs.vol_in[n];
    let cin = if vin > 0.0 {
        ctx.qs.mass_in[n] / vin
    } else {
        0.0
    };
    let v1max = tank.mix_fraction * tank.vmax;

    let mut vt = 0.0;
    if vnet > 0.0 {
        // Filling: overflow from the mixing zone spills into the ambient
        // zone.
        vt = (seg1.v + vnet - v1max).max(0.0);
        if vin > 0.0 {
            seg1.c = (seg1.c * seg1.v + cin * vin) / (seg1.v + vin);
        }
        if vt > 0.0 {
            seg2.c = (seg2.c * seg2.v + seg1.c * vt) / (seg2.v + vt);
        }
    } else if vnet < 0.0 {
        // Draining: the ambient zone backfills the mixing zone.
        if seg2.v > 0.0 {
            vt = seg2.v.min(-vnet);
        }
        if vin + vt > 0.0 {
            seg1.c = (seg1.c * seg1.v + cin * vin + seg2.c * vt) / (seg1.v + vin + vt);
        }
    }

    if vt > 0.0 {
        seg1.v = v1max;
        if vnet > 0.0 {
            seg2.v += vt;
        } else {
            seg2.v = (seg2.v - vt).max(0.0);
        }
    } else {
        seg1.v = (seg1.v + vnet).clamp(0.0, v1max);
        seg2.v = 0.0;
    }

    let prev1 = ctx.qs.pool.get(last).prev;
    *ctx.qs.pool.get_mut(last) = segpool::Seg { prev: prev1, ..seg1 };
    let prev2 = ctx.qs.pool.get(first).prev;
    *ctx.qs.pool.get_mut(first) = segpool::Seg { prev: prev2, ..seg2 };

    // Outflow leaves from the mixing zone.
    let tank = ctx.net.tank_mut(ti);
    tank.concentration = seg1.c;
    tank.volume = (tank.volume + vnet).max(0.0);
    ctx.qs.node_qual[n] = seg1.c;
}

/// First-in first-out (plug flow) tank model.
fn tank_mix3(ctx: &mut Qual<'_>, ti: usize, dt: i64) {
    let tank = ctx.net.tank(ti).clone();
    let n = tank.node;
    let k = ctx.net.nlinks() + ti;
    if ctx.qs.chains[k].first.is_none() {
        return;
    }

    if ctx.qs.reactive {
        let mut cur = ctx.qs.chains[k].first;
        while let Some(id) = cur {
            let seg = *ctx.qs.pool.get(id);
            let c = tank_react(ctx, seg.c, seg.v, tank.kb, dt as f64);
            let seg = ctx.qs.pool.get_mut(id);
            seg.c = c;
            cur = seg.prev;
        }
    }

    let vnet = ctx.st.demand[n] * dt as f64;
    let vin = ctx.qs.vol_in[n];
    let mut vout = vin - vnet;
    let cin = if vin > 0.0 {
        ctx.qs.mass_in[n] / vin
    } else {
        0.0
    };
    ctx.net.tank_mut(ti).volume = (tank.volume + vnet).max(0.0);

    // Withdraw the outflow volume from the oldest segments.
    let mut vsum = 0.0;
    let mut csum = 0.0;
    while vout > 0.0 {
        let Some(first) = ctx.qs.chains[k].first else {
            break;
        };
        let seg = *ctx.qs.pool.get(first);
        let mut vseg = seg.v.min(vout);
        if ctx.qs.chains[k].first == ctx.qs.chains[k].last {
            vseg = vout;
        }
        vsum += vseg;
        csum += seg.c * vseg;
        vout -= vseg;
        if vout >= 0.0 && vseg >= seg.v && ctx.qs.chains[k].first != ctx.qs.chains[k].last {
            ctx.qs.chains[k].pop_first(&mut ctx.qs.pool);
        } else {
            ctx.qs.pool.get_mut(first).v -= vseg;
        }
    }

    // Outlet quality represents the tank.
    let c = if vsum > 0.0 {
        csum / vsum
    } else if let Some(first) = ctx.qs.chains[k].first {
        ctx.qs.pool.get(first).c
    } else {
        tank.concentration
    };
    ctx.net.tank_mut(ti).concentration = c;
    ctx.qs.node_qual[n] = c;

    // New inflow becomes the youngest segment.
    if vin > 0.0 {
        let chain = &mut ctx.qs.chains[k];
        match chain.last {
            Some(last) if (ctx.qs.pool.get(last).c - cin).abs() < ctx.qop.ctol => {
                ctx.qs.pool.get_mut(last).v += vin;
            }
            _ => chain.push_last(&mut ctx.qs.pool, vin, cin),
        }
    }
}

/// Last-in first-out (stacked plug) tank model: flow enters and leaves
/// from the same end.
fn tank_mix4(ctx: &mut Qual<'_>, ti: usize, dt: i64) {
    let tank = ctx.net.tank(ti).clone();
    let n = tank.node;
    let k = ctx.net.nlinks() + ti;
    if ctx.qs.chains[k].first.is_none() {
        return;
    }

    if ctx.qs.reactive {
        let mut cur = ctx.qs.chains[k].first;
        while let Some(id) = cur {
            let seg = *ctx.qs.pool.get(id);
            let c = tank_react(ctx, seg.c, seg.v, tank.kb, dt as f64);
            let seg = ctx.qs.pool.get_mut(id);
            seg.c = c;
            cur = seg.prev;
        }
    }

    let vnet = ctx.st.demand[n] * dt as f64;
    let vin = ctx.qs.vol_in[n];
    let cin = if vin > 0.0 {
        ctx.qs.mass_in[n] / vin
    } else {
        0.0
    };
    ctx.net.tank_mut(ti).volume = (tank.volume + vnet).max(0.0);

    let mut c = match ctx.qs.chains[k].last {
        Some(last) => ctx.qs.pool.get(last).c,
        None => tank.concentration,
    };

    if vnet > 0.0 {
        // Filling: the net inflow stacks on top.
        let chain = &mut ctx.qs.chains[k];
        match chain.last {
            Some(last) if (ctx.qs.pool.get(last).c - cin).abs() < ctx.qop.ctol => {
                ctx.qs.pool.get_mut(last).v += vnet;
            }
            _ => chain.push_last(&mut ctx.qs.pool, vnet, cin),
        }
        if let Some(last) = ctx.qs.chains[k].last {
            c = ctx.qs.pool.get(last).c;
        }
    } else if vnet < 0.0 {
        // Draining: withdraw from the top of the stack.
        let mut vneed = -vnet;
        let mut vsum = 0.0;
        let mut csum = 0.0;
        while vneed > 0.0 {
            let Some(last) = ctx.qs.chains[k].last else {
                break;
            };
            let seg = *ctx.qs.pool.get(last);
            let mut vseg = seg.v.min(vneed);
            if ctx.qs.chains[k].first == ctx.qs.chains[k].last {
                vseg = vneed;
            }
            vsum += vseg;
            csum += seg.c * vseg;
            vneed -= vseg;
            if vneed >= 0.0 && vseg >= seg.v && ctx.qs.chains[k].first != ctx.qs.chains[k].last {
                ctx.qs.chains[k].pop_last(&mut ctx.qs.pool);
            } else {
                ctx.qs.pool.get_mut(last).v -= vseg;
            }
        }
        if vsum > 0.0 {
            c = csum / vsum;
        }
    }

    ctx.net.tank_mut(ti).concentration = c;
    ctx.qs.node_qual[n] = c;
}
