//! Gradient-method solution of the network flow-head equations.
//!
//! Status checks on CVs, pumps and pipes to tanks are made every
//! `check_freq` iterations, up until `max_check` iterations are reached.
//! Status checks on control valves are made every iteration if
//! `damp_limit` is zero, or only when the convergence error is at or below
//! `damp_limit`; in that case future flow changes are damped to 60% of
//! their full value. A complete status check on all links is made when
//! convergence is achieved. If convergence is not achieved in `max_iter`
//! trials and `extra_iter` > 0, another `extra_iter` trials are made with
//! no further status changes.

use super::coeffs;
use super::status;
use super::{Hyd, QZERO};
use crate::error::*;
use crate::types::*;

/// Largest head imbalance and flow change of an iteration.
#[derive(Debug, Default, Clone)]
pub(crate) struct HydBalance {
    pub max_head_error: f64,
    pub max_head_link: usize,
    pub max_flow_change: f64,
    pub max_flow_link: usize,
    pub max_flow_node: usize,
}

/// Solves the network nodal equations for heads and flows. Returns the
/// iteration count and final convergence error.
pub(crate) fn hyd_solve(ctx: &mut Hyd<'_>) -> Result<(i32, f64)> {
    let njuncs = ctx.net.njuncs();
    let mut hbal = HydBalance::default();
    let mut next_check = ctx.op.check_freq;
    ctx.st.relax = 1.0;

    if ctx.rpt.statflag == StatusReport::FullReport {
        ctx.rpt.rel_err(0, 0.0);
    }
    let mut max_trials = ctx.op.max_iter;
    if ctx.op.extra_iter > 0 {
        max_trials += ctx.op.extra_iter;
    }

    let mut relerr = 0.0;
    let mut iter = 1;
    while iter <= max_trials {
        // Assemble A and F, then solve A*H = F. A holds the Jacobian
        // coefficients derived from the head loss gradients and F the flow
        // correction terms; the solution for H comes back in F.
        coeffs::headloss_coeffs(ctx);
        coeffs::matrix_coeffs(ctx);
        match ctx.sol.lin_solve(njuncs) {
            Ok(()) => {}
            Err(row) => {
                // Ill-conditioning: if a control valve is the cause, fix
                // its status and continue; otherwise give up.
                let node = ctx.sol.order[row];
                if status::bad_valve(ctx, node) {
                    continue;
                }
                let id = ctx.net.node(node).id.clone();
                ctx.rpt
                    .writeline(&format!("hydraulic equations ill-conditioned at node {}", id));
                return Err(EngineError::new(ERR_HYD_EQNS));
            }
        }

        // Update heads; fixed-grade nodes keep their fixed values.
        for i in 1..=njuncs {
            ctx.st.head[i] = ctx.sol.f[ctx.sol.row[i]];
        }
        relerr = new_flows(ctx, &mut hbal);

        if ctx.rpt.statflag == StatusReport::FullReport {
            ctx.rpt.rel_err(iter, relerr);
        }

        // Apply solution damping and check control valve statuses.
        ctx.st.relax = 1.0;
        let mut valve_change = false;
        if ctx.op.damp_limit > 0.0 {
            if relerr <= ctx.op.damp_limit {
                ctx.st.relax = 0.6;
                valve_change = status::valve_status(ctx);
            }
        } else {
            valve_change = status::valve_status(ctx);
        }

        if has_converged(ctx, relerr, &mut hbal) {
            // Converged: quit if already into extra iterations.
            if iter > ctx.op.max_iter {
                break;
            }

            // Quit if no status changes occur.
            let mut stat_change = valve_change;
            if status::link_status(ctx) {
                stat_change = true;
            }
            if status::pressure_switch(ctx) {
                stat_change = true;
            }
            if !stat_change {
                break;
            }

            // A status changed, so continue the iterations.
            next_check = iter + ctx.op.check_freq;
        } else if iter <= ctx.op.max_check && iter == next_check {
            // Periodic status check on pumps, CVs and pipes to tanks.
            status::link_status(ctx);
            next_check += ctx.op.check_freq;
        }
        iter += 1;
    }

    update_pda_statistics(ctx);

    // Replace junction demands with the total outflow delivered.
    for i in 1..=njuncs {
        ctx.st.demand[i] = ctx.st.demand_flows[i] + ctx.st.emitter_flows[i];
    }

    ctx.st.max_head_error = hbal.max_head_error;
    ctx.st.max_flow_change = hbal.max_flow_change;
    Ok((iter, relerr))
}

/// Updates link, emitter and demand flows after new nodal heads have been
/// computed. Returns the convergence error, the ratio of total flow
/// corrections to total flow.
fn new_flows(ctx: &mut Hyd<'_>, hbal: &mut HydBalance) -> f64 {
    let mut qsum = 0.0;
    let mut dqsum = 0.0;
    hbal.max_flow_change = 0.0;
    hbal.max_flow_link = 0;
    hbal.max_flow_node = 0;

    new_link_flows(ctx, hbal, &mut qsum, &mut dqsum);
    new_emitter_flows(ctx, hbal, &mut qsum, &mut dqsum);
    new_demand_flows(ctx, hbal, &mut qsum, &mut dqsum);

    if qsum > ctx.op.hacc {
        dqsum / qsum
    } else {
        dqsum
    }
}

fn new_link_flows(ctx: &mut Hyd<'_>, hbal: &mut HydBalance, qsum: &mut f64, dqsum: &mut f64) {
    let njuncs = ctx.net.njuncs();

    // Re-derive net inflows at fixed-grade nodes.
    for n in njuncs + 1..=ctx.net.nnodes() {
        ctx.st.demand[n] = 0.0;
    }

    for k in 1..=ctx.net.nlinks() {
        let link = ctx.net.link(k);
        let (n1, n2) = (link.n1, link.n2);

        // dq = Y - P*(new head loss), damped by the relaxation factor.
        let dh = ctx.st.head[n1] - ctx.st.head[n2];
        let mut dq = ctx.sol.y[k] - ctx.sol.p[k] * dh;
        dq *= ctx.st.relax;

        // Keep constant-power pump flows from reversing sign.
        if link.link_type == LinkType::Pump {
            if let Some(pi) = ctx.net.find_pump(k) {
                if ctx.net.pump(pi).ptype == PumpType::ConstHp && dq > ctx.st.flow[k] {
                    dq = ctx.st.flow[k] / 2.0;
                }
            }
        }

        ctx.st.flow[k] -= dq;
        *qsum += ctx.st.flow[k].abs();
        *dqsum += dq.abs();

        if dq.abs() > hbal.max_flow_change {
            hbal.max_flow_change = dq.abs();
            hbal.max_flow_link = k;
            hbal.max_flow_node = 0;
        }

        // Net inflows to fixed-grade nodes.
        if !ctx.st.status[k].is_closed() {
            if n1 > njuncs {
                ctx.st.demand[n1] -= ctx.st.flow[k];
            }
            if n2 > njuncs {
                ctx.st.demand[n2] += ctx.st.flow[k];
            }
        }
    }
}

fn new_emitter_flows(ctx: &mut Hyd<'_>, hbal: &mut HydBalance, qsum: &mut f64, dqsum: &mut f64) {
    for i in 1..=ctx.net.njuncs() {
        if ctx.net.node(i).emitter_coeff == 0.0 {
            continue;
        }
        let dq = coeffs::emit_flow_change(ctx, i);
        ctx.st.emitter_flows[i] -= dq;
        *qsum += ctx.st.emitter_flows[i].abs();
        *dqsum += dq.abs();
        if dq.abs() > hbal.max_flow_change {
            hbal.max_flow_change = dq.abs();
            hbal.max_flow_node = i;
            hbal.max_flow_link = 0;
        }
    }
}

fn new_demand_flows(ctx: &mut Hyd<'_>, hbal: &mut HydBalance, qsum: &mut f64, dqsum: &mut f64) {
    if ctx.op.demand_model == DemandModel::Dda {
        return;
    }
    let (dp, n) = coeffs::demand_params(ctx.op);
    for i in 1..=ctx.net.njuncs() {
        if ctx.st.demand[i] <= 0.0 {
            continue;
        }
        let dq = coeffs::demand_flow_change(ctx, i, dp, n);
        ctx.st.demand_flows[i] -= dq;
        *qsum += ctx.st.demand_flows[i].abs();
        *dqsum += dq.abs();
        if dq.abs() > hbal.max_flow_change {
            hbal.max_flow_change = dq.abs();
            hbal.max_flow_node = i;
            hbal.max_flow_link = 0;
        }
    }
}

/// Finds the link with the largest head imbalance.
fn check_hyd_balance(ctx: &mut Hyd<'_>, hbal: &mut HydBalance) {
    hbal.max_head_error = 0.0;
    hbal.max_head_link = 0;
    coeffs::headloss_coeffs(ctx);
    for k in 1..=ctx.net.nlinks() {
        if ctx.st.status[k].is_closed() || ctx.st.status[k] == LinkStatus::Active {
            continue;
        }
        if ctx.sol.p[k] == 0.0 {
            continue;
        }
        let link = ctx.net.link(k);
        let dh = ctx.st.head[link.n1] - ctx.st.head[link.n2];
        let headloss = ctx.sol.y[k] / ctx.sol.p[k];
        let headerror = (dh - headloss).abs();
        if headerror > hbal.max_head_error {
            hbal.max_head_error = headerror;
            hbal.max_head_link = k;
        }
    }
}

/// Checks the convergence criteria: relative flow change, then the
/// optional head error and flow change limits.
fn has_converged(ctx: &mut Hyd<'_>, relerr: f64, hbal: &mut HydBalance) -> bool {
    if relerr > ctx.op.hacc {
        return false;
    }
    check_hyd_balance(ctx, hbal);
    if ctx.rpt.statflag == StatusReport::FullReport {
        report_hyd_balance(ctx, hbal);
    }
    if ctx.op.head_error_limit > 0.0 && hbal.max_head_error > ctx.op.head_error_limit {
        return false;
    }
    if ctx.op.flow_change_limit > 0.0 && hbal.max_flow_change > ctx.op.flow_change_limit {
        return false;
    }
    true
}

/// Names the elements carrying the largest flow change and head loss
/// error in the full status report.
fn report_hyd_balance(ctx: &mut Hyd<'_>, hbal: &HydBalance) {
    let flow_link = (hbal.max_flow_link >= 1).then(|| ctx.net.link(hbal.max_flow_link).id.clone());
    let flow_node = (hbal.max_flow_node >= 1).then(|| ctx.net.node(hbal.max_flow_node).id.clone());
    let head_link = (hbal.max_head_link >= 1).then(|| ctx.net.link(hbal.max_head_link).id.clone());
    ctx.rpt.hyd_balance(
        hbal.max_flow_change / ctx.qcf,
        flow_link.as_deref(),
        flow_node.as_deref(),
        hbal.max_head_error,
        head_link.as_deref(),
    );
}

/// Pressure-deficiency statistics for pressure-driven analyses.
fn update_pda_statistics(ctx: &mut Hyd<'_>) {
    ctx.st.deficient_nodes = 0;
    ctx.st.demand_reduction = 0.0;
    if ctx.op.demand_model == DemandModel::Dda {
        return;
    }
    let mut full = 0.0;
    let mut delivered = 0.0;
    for i in 1..=ctx.net.njuncs() {
        let d = ctx.st.demand_flows[i];
        let dfull = ctx.st.demand[i].max(d);
        if dfull > QZERO {
            full += dfull;
            delivered += d;
            if d < dfull - QZERO {
                ctx.st.deficient_nodes += 1;
            }
        }
    }
    if full > 0.0 {
        ctx.st.demand_reduction = (full - delivered) / full * 100.0;
    }
}
