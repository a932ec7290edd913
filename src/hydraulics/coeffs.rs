//! Head loss linearization and matrix assembly.
//!
//! For every link the solver needs `p = 1/(dh/dQ)`, the inverse gradient
//! of the head loss at the current flow, and `y = p * h(Q)`, the flow
//! correction term. Pipes use the selected head loss formula, pumps their
//! curve, and open/closed valves an equivalent-pipe form; active PRV, PSV
//! and FCV rows are assembled by dedicated routines that embed the valve
//! setpoint directly in the matrix.

use super::{Hyd, CBIG, CSMALL, TINY};
use crate::types::*;
use crate::units::VISCOSITY;

// Constants for the Darcy-Weisbach friction factor, with the Dunlop
// interpolation used in the transition region 2000 < Re < 4000.
const A1: f64 = 0.314159265359e4; // 1000*PI
const A2: f64 = 0.157079632679e4; // 500*PI
const A3: f64 = 0.502654824574e2; // 16*PI
const A4: f64 = 6.283185307; // 2*PI
const A8: f64 = 4.61841319859; // 5.74*(PI/4)^.9
const A9: f64 = -8.685889638e-1; // -2/ln(10)
const AB: f64 = 3.28895476345e-3; // 5.74/(4000^.9)
const AC: f64 = -5.14214965799e-3; // AA*AB

/// Computes `p` and `y` for every link whose status is not governed by an
/// active control-valve row.
pub(crate) fn headloss_coeffs(ctx: &mut Hyd<'_>) {
    for k in 1..=ctx.net.nlinks() {
        match ctx.net.link(k).link_type {
            LinkType::CvPipe | LinkType::Pipe => pipe_coeff(ctx, k),
            LinkType::Pump => pump_coeff(ctx, k),
            LinkType::Pbv => pbv_coeff(ctx, k),
            LinkType::Tcv => tcv_coeff(ctx, k),
            LinkType::Gpv => gpv_coeff(ctx, k),
            LinkType::Fcv | LinkType::Prv | LinkType::Psv => {
                // Valves with a fixed status reduce to equivalent pipes;
                // the rest are assembled later by valve_coeffs().
                if ctx.st.setting[k].is_none() {
                    valve_coeff(ctx, k);
                }
            }
        }
    }
}

/// Assembles the solution matrix and right-hand side from the link
/// coefficients, emitters, pressure-driven demands and valve rows.
pub(crate) fn matrix_coeffs(ctx: &mut Hyd<'_>) {
    ctx.sol.aii.fill(0.0);
    ctx.sol.aij.fill(0.0);
    ctx.sol.f.fill(0.0);
    ctx.sol.x_acc.fill(0.0);
    link_coeffs(ctx);
    emitter_coeffs(ctx);
    demand_coeffs(ctx);
    node_coeffs(ctx);
    valve_coeffs(ctx);
}

/// Accumulates link coefficients into the matrix and RHS, using the
/// convention that flow out of a node is negative, into it positive.
fn link_coeffs(ctx: &mut Hyd<'_>) {
    let njuncs = ctx.net.njuncs();
    for k in 1..=ctx.net.nlinks() {
        let link = ctx.net.link(k);
        // Active control valves are assembled by valve_coeffs().
        if link.link_type.is_control_valve() && ctx.st.setting[k].is_some() {
            continue;
        }
        let (n1, n2) = (link.n1, link.n2);
        let q = ctx.st.flow[k];
        let p = ctx.sol.p[k];
        let y = ctx.sol.y[k];

        ctx.sol.x_acc[n1] -= q;
        ctx.sol.x_acc[n2] += q;
        ctx.sol.aij[ctx.sol.ndx[k]] -= p;
        if n1 <= njuncs {
            ctx.sol.aii[ctx.sol.row[n1]] += p;
            ctx.sol.f[ctx.sol.row[n1]] += y;
        } else {
            ctx.sol.f[ctx.sol.row[n2]] += p * ctx.st.head[n1];
        }
        if n2 <= njuncs {
            ctx.sol.aii[ctx.sol.row[n2]] += p;
            ctx.sol.f[ctx.sol.row[n2]] -= y;
        } else {
            ctx.sol.f[ctx.sol.row[n1]] += p * ctx.st.head[n2];
        }
    }
}

/// Completes nodal flow imbalance and flow correction terms.
fn node_coeffs(ctx: &mut Hyd<'_>) {
    for i in 1..=ctx.net.njuncs() {
        ctx.sol.x_acc[i] -= ctx.st.demand_flows[i];
        ctx.sol.f[ctx.sol.row[i]] += ctx.sol.x_acc[i];
    }
}

/// Emitters are fictitious pipes to fictitious reservoirs at junction
/// elevation with head loss `ke * |q|^(1/qexp)`; their contribution goes
/// straight onto the diagonal and RHS.
fn emitter_coeffs(ctx: &mut Hyd<'_>) {
    for i in 1..=ctx.net.njuncs() {
        let node = ctx.net.node(i);
        if node.emitter_coeff == 0.0 {
            continue;
        }
        let ke = ctx.st.emitter_ke[i].max(CSMALL);
        let q = ctx.st.emitter_flows[i];
        let z = ke * q.abs().powf(ctx.st.qexp_inv);
        let mut p = ctx.st.qexp_inv * z / q.abs();
        if p < ctx.op.rqtol {
            p = 1.0 / ctx.op.rqtol;
        } else {
            p = 1.0 / p;
        }
        let y = q.signum() * z * p;
        let row = ctx.sol.row[i];
        ctx.sol.aii[row] += p;
        ctx.sol.f[row] += y + p * node.elevation;
        ctx.sol.x_acc[i] -= q;
    }
}

/// Emitter flow change given the newly computed heads.
pub(crate) fn emit_flow_change(ctx: &Hyd<'_>, i: usize) -> f64 {
    let ke = ctx.st.emitter_ke[i].max(CSMALL);
    let q = ctx.st.emitter_flows[i];
    let mut p = ctx.st.qexp_inv * ke * q.abs().powf(ctx.st.qexp_inv - 1.0);
    if p < ctx.op.rqtol {
        p = 1.0 / ctx.op.rqtol;
    } else {
        p = 1.0 / p;
    }
    q / ctx.st.qexp_inv - p * (ctx.st.head[i] - ctx.net.node(i).elevation)
}

/// Pressure range and exponent of the pressure-driven demand function.
pub(crate) fn demand_params(op: &HydOptions) -> (f64, f64) {
    (op.preq - op.pmin, 1.0 / op.pexp)
}

/// Adds pressure-driven demand terms to junction rows.
fn demand_coeffs(ctx: &mut Hyd<'_>) {
    if ctx.op.demand_model == DemandModel::Dda {
        return;
    }
    let (dp, n) = demand_params(ctx.op);
    for i in 1..=ctx.net.njuncs() {
        if ctx.st.demand[i] <= 0.0 {
            continue;
        }
        let (hloss, hgrad) = demand_headloss(ctx, i, dp, n);
        let row = ctx.sol.row[i];
        ctx.sol.aii[row] += 1.0 / hgrad;
        ctx.sol.f[row] += (hloss + ctx.net.node(i).elevation + ctx.op.pmin) / hgrad;
    }
}

/// Head loss and gradient of the demand-versus-pressure function, with
/// barrier terms outside the deliverable range.
pub(crate) fn demand_headloss(ctx: &Hyd<'_>, i: usize, dp: f64, n: f64) -> (f64, f64) {
    let d = ctx.st.demand_flows[i];
    let dfull = ctx.st.demand[i];
    let r = d / dfull;
    if r <= 0.0 {
        (CBIG * d, CBIG)
    } else if r >= 1.0 {
        (dp + CBIG * (d - dfull), CBIG)
    } else {
        let hloss = dp * r.powf(n);
        (hloss, n * hloss / d)
    }
}

/// Demand flow change at a pressure-driven junction.
pub(crate) fn demand_flow_change(ctx: &Hyd<'_>, i: usize, dp: f64, n: f64) -> f64 {
    let (hloss, hgrad) = demand_headloss(ctx, i, dp, n);
    (hloss - ctx.st.head[i] + ctx.net.node(i).elevation + ctx.op.pmin) / hgrad
}

/// Computes `p` and `y` coefficients for a pipe.
fn pipe_coeff(ctx: &mut Hyd<'_>, k: usize) {
    // Closed pipes use the head loss formula h = CBIG*q.
    if ctx.st.status[k].is_closed() {
        ctx.sol.p[k] = 1.0 / CBIG;
        ctx.sol.y[k] = ctx.st.flow[k];
        return;
    }

    let link = ctx.net.link(k);
    let q = ctx.st.flow[k].abs();
    let ml = link.km;
    let r = link.resistance;
    let hexp = super::headloss_exponent(ctx.op);
    let mut f = 1.0;
    if ctx.op.headloss == HeadLossType::DarcyWeisbach {
        f = dw_coeff(ctx, k);
    }
    let r1 = f * r + ml;

    // Large p for a negligible flow-resistance product.
    if r1 * q < ctx.op.rqtol {
        ctx.sol.p[k] = 1.0 / ctx.op.rqtol;
        ctx.sol.y[k] = ctx.st.flow[k] / hexp;
        return;
    }

    if ctx.op.headloss == HeadLossType::DarcyWeisbach {
        let hpipe = r1 * q * q;
        let p = 1.0 / (2.0 * r1 * q);
        ctx.sol.p[k] = p;
        ctx.sol.y[k] = ctx.st.flow[k].signum() * hpipe * p;
    } else {
        let hpipe = r * q.powf(hexp);
        let mut p = hexp * hpipe;
        let hml = if ml > 0.0 {
            let hml = ml * q * q;
            p += 2.0 * hml;
            hml
        } else {
            0.0
        };
        let p = ctx.st.flow[k] / p;
        ctx.sol.p[k] = p.abs();
        ctx.sol.y[k] = p * (hpipe + hml);
    }
}

/// Darcy-Weisbach friction factor at the current flow. The df/dq term is
/// ignored as it slows the convergence rate.
fn dw_coeff(ctx: &Hyd<'_>, k: usize) -> f64 {
    let link = ctx.net.link(k);
    if link.link_type > LinkType::Pipe {
        return 1.0;
    }
    let q = ctx.st.flow[k].abs();
    let s = VISCOSITY * ctx.op.viscos * link.diameter;
    let w = q / s; // w = Re*(PI/4)
    if w >= A1 {
        // Re >= 4000: Colebrook formula.
        let y1 = A8 / w.powf(0.9);
        let y2 = link.kc / (3.7 * link.diameter) + y1;
        let y3 = A9 * y2.ln();
        1.0 / (y3 * y3)
    } else if w > A2 {
        // Re > 2000: Dunlop interpolation formula.
        let y2 = link.kc / (3.7 * link.diameter) + AB;
        let y3 = A9 * y2.ln();
        let fa = 1.0 / (y3 * y3);
        let fb = (2.0 + AC / (y2 * y3)) * fa;
        let r = w / A2;
        let x1 = 7.0 * fa - fb;
        let x2 = 0.128 - 17.0 * fa + 2.5 * fb;
        let x3 = -0.128 + 13.0 * fa - (fb + fb);
        let x4 = r * (0.032 - 3.0 * fa + 0.5 * fb);
        x1 + r * (x2 + r * (x3 + x4))
    } else if w > A4 {
        // Laminar flow: Hagen-Poiseuille formula.
        A3 * s / q
    } else {
        8.0
    }
}

/// Computes `p` and `y` coefficients for a pump.
fn pump_coeff(ctx: &mut Hyd<'_>, k: usize) {
    let speed = ctx.st.setting[k].unwrap_or(0.0);

    // A closed pump behaves like a very high resistance pipe.
    if ctx.st.status[k].is_closed() || speed == 0.0 {
        ctx.sol.p[k] = 1.0 / CBIG;
        ctx.sol.y[k] = ctx.st.flow[k];
        return;
    }

    let q = ctx.st.flow[k].abs().max(TINY);
    let Some(pi) = ctx.net.find_pump(k) else {
        return;
    };
    let pump = ctx.net.pump(pi);

    let (h0, r0, n) = if pump.ptype == PumpType::Custom {
        // Local slope and intercept of the curve segment holding the
        // speed-adjusted flow; curves keep API flow units.
        let (h0, r) = ctx.net.curve(pump.hcurve).segment_at(q / speed / ctx.qcf);
        (-h0, -(r / ctx.qcf), 1.0)
    } else {
        (pump.h0, pump.r, pump.n)
    };

    // Adjust head loss coefficients for pump speed.
    let h0 = speed * speed * h0;
    let mut r = r0 * speed.powf(2.0 - n);
    if n != 1.0 {
        r = n * r * q.powf(n - 1.0);
    }

    let p = 1.0 / r.max(ctx.op.rqtol);
    ctx.sol.p[k] = p;
    ctx.sol.y[k] = ctx.st.flow[k] / n + p * h0;
}

/// Computes `p` and `y` coefficients for a general purpose valve from its
/// head loss curve.
fn gpv_coeff(ctx: &mut Hyd<'_>, k: usize) {
    if ctx.st.status[k] == LinkStatus::Closed {
        valve_coeff(ctx, k);
        return;
    }
    let curve_index = ctx.st.setting[k].map(|s| s.round() as usize).unwrap_or(0);
    if curve_index == 0 || curve_index > ctx.net.curves.len() {
        valve_coeff(ctx, k);
        return;
    }
    let q = ctx.st.flow[k].abs().max(TINY);
    let (h0, r) = ctx.net.curve(curve_index).segment_at(q / ctx.qcf);
    let r = r / ctx.qcf;
    let p = 1.0 / r.max(ctx.op.rqtol);
    ctx.sol.p[k] = p;
    ctx.sol.y[k] = p * (h0 + r * q) * ctx.st.flow[k].signum();
}

/// Computes `p` and `y` coefficients for a pressure breaker valve.
fn pbv_coeff(ctx: &mut Hyd<'_>, k: usize) {
    match ctx.st.setting[k] {
        Some(setting) if setting != 0.0 => {
            let km = ctx.net.link(k).km;
            if km * ctx.st.flow[k] * ctx.st.flow[k] > setting {
                // Minor loss exceeds the setting: treat as a pipe.
                valve_coeff(ctx, k);
            } else {
                // Force the head loss across the valve to equal the setting.
                ctx.sol.p[k] = CBIG;
                ctx.sol.y[k] = setting * CBIG;
            }
        }
        _ => valve_coeff(ctx, k),
    }
}

/// Computes `p` and `y` coefficients for a throttle control valve by
/// converting its setting into an equivalent minor loss.
fn tcv_coeff(ctx: &mut Hyd<'_>, k: usize) {
    let link = ctx.net.link(k);
    let km = match ctx.st.setting[k] {
        Some(setting) => super::minor_loss_coeff(setting, link.diameter),
        None => link.km,
    };
    valve_coeff_with_km(ctx, k, km);
}

/// Coefficients for a completely open, closed, or throttled valve.
fn valve_coeff(ctx: &mut Hyd<'_>, k: usize) {
    let km = ctx.net.link(k).km;
    valve_coeff_with_km(ctx, k, km);
}

fn valve_coeff_with_km(ctx: &mut Hyd<'_>, k: usize, km: f64) {
    // Closed valve: use a very small matrix coefficient.
    if ctx.st.status[k].is_closed() {
        ctx.sol.p[k] = 1.0 / CBIG;
        ctx.sol.y[k] = ctx.st.flow[k];
        return;
    }
    if km > 0.0 {
        // Account for minor head loss through the valve.
        let p = (2.0 * km * ctx.st.flow[k].abs()).max(ctx.op.rqtol);
        ctx.sol.p[k] = 1.0 / p;
        ctx.sol.y[k] = ctx.st.flow[k] / 2.0;
    } else {
        ctx.sol.p[k] = 1.0 / ctx.op.rqtol;
        ctx.sol.y[k] = ctx.st.flow[k];
    }
}

/// Assembles matrix rows for PRVs, PSVs and FCVs whose status is not
/// fixed open or closed.
fn valve_coeffs(ctx: &mut Hyd<'_>) {
    for vi in 0..ctx.net.nvalves() {
        let k = ctx.net.valves[vi].link;
        if ctx.st.setting[k].is_none() {
            continue;
        }
        let link = ctx.net.link(k);
        let (n1, n2) = (link.n1, link.n2);
        match link.link_type {
            LinkType::Prv => prv_coeff(ctx, k, n1, n2),
            LinkType::Psv => psv_coeff(ctx, k, n1, n2),
            LinkType::Fcv => fcv_coeff(ctx, k, n1, n2),
            _ => {}
        }
    }
}

/// Matrix contribution of a PRV. When active, the downstream head is
/// forced to the setpoint with a very large diagonal weight and the flow
/// correction absorbs the downstream imbalance.
fn prv_coeff(ctx: &mut Hyd<'_>, k: usize, n1: usize, n2: usize) {
    let i = ctx.sol.row[n1];
    let j = ctx.sol.row[n2];
    let hset = ctx.net.node(n2).elevation + ctx.st.setting[k].unwrap_or(0.0);

    if ctx.st.status[k] == LinkStatus::Active {
        ctx.sol.p[k] = 0.0;
        ctx.sol.y[k] = ctx.st.flow[k] + ctx.sol.x_acc[n2];
        ctx.sol.f[j] += hset * CBIG;
        ctx.sol.aii[j] += CBIG;
        if ctx.sol.x_acc[n2] < 0.0 {
            ctx.sol.f[i] += ctx.sol.x_acc[n2];
        }
        return;
    }

    valve_coeff(ctx, k);
    ctx.sol.aij[ctx.sol.ndx[k]] -= ctx.sol.p[k];
    ctx.sol.aii[i] += ctx.sol.p[k];
    ctx.sol.aii[j] += ctx.sol.p[k];
    ctx.sol.f[i] += ctx.sol.y[k] - ctx.st.flow[k];
    ctx.sol.f[j] -= ctx.sol.y[k] - ctx.st.flow[k];
}

/// Matrix contribution of a PSV: symmetric to the PRV at the upstream
/// node.
fn psv_coeff(ctx: &mut Hyd<'_>, k: usize, n1: usize, n2: usize) {
    let i = ctx.sol.row[n1];
    let j = ctx.sol.row[n2];
    let hset = ctx.net.node(n1).elevation + ctx.st.setting[k].unwrap_or(0.0);

    if ctx.st.status[k] == LinkStatus::Active {
        ctx.sol.p[k] = 0.0;
        ctx.sol.y[k] = ctx.st.flow[k] - ctx.sol.x_acc[n1];
        ctx.sol.f[i] += hset * CBIG;
        ctx.sol.aii[i] += CBIG;
        if ctx.sol.x_acc[n1] > 0.0 {
            ctx.sol.f[j] += ctx.sol.x_acc[n1];
        }
        return;
    }

    valve_coeff(ctx, k);
    ctx.sol.aij[ctx.sol.ndx[k]] -= ctx.sol.p[k];
    ctx.sol.aii[i] += ctx.sol.p[k];
    ctx.sol.aii[j] += ctx.sol.p[k];
    ctx.sol.f[i] += ctx.sol.y[k] - ctx.st.flow[k];
    ctx.sol.f[j] -= ctx.sol.y[k] - ctx.st.flow[k];
}

/// Matrix contribution of an FCV. When active the network is split at the
/// valve: the setting becomes an external demand upstream and an external
/// supply downstream.
fn fcv_coeff(ctx: &mut Hyd<'_>, k: usize, n1: usize, n2: usize) {
    let i = ctx.sol.row[n1];
    let j = ctx.sol.row[n2];
    let q = ctx.st.setting[k].unwrap_or(0.0);

    if ctx.st.status[k] == LinkStatus::Active {
        ctx.sol.x_acc[n1] -= q;
        ctx.sol.f[i] -= q;
        ctx.sol.x_acc[n2] += q;
        ctx.sol.f[j] += q;
        ctx.sol.p[k] = 1.0 / CBIG;
        ctx.sol.aij[ctx.sol.ndx[k]] -= ctx.sol.p[k];
        ctx.sol.aii[i] += ctx.sol.p[k];
        ctx.sol.aii[j] += ctx.sol.p[k];
        ctx.sol.y[k] = ctx.st.flow[k] - q;
    } else {
        valve_coeff(ctx, k);
        ctx.sol.aij[ctx.sol.ndx[k]] -= ctx.sol.p[k];
        ctx.sol.aii[i] += ctx.sol.p[k];
        ctx.sol.aii[j] += ctx.sol.p[k];
        ctx.sol.f[i] += ctx.sol.y[k] - ctx.st.flow[k];
        ctx.sol.f[j] -= ctx.sol.y[k] - ctx.st.flow[k];
    }
}
