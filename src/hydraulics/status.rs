//! Discrete status machines for check valves, pumps, control valves and
//! links connected to full or empty tanks, plus the pressure-switch scan
//! applied after convergence.

use super::{Hyd, BIG};
use crate::types::*;

/// Updates the status of PRVs and PSVs whose status is not fixed open or
/// closed. Returns whether any valve changed status.
pub(crate) fn valve_status(ctx: &mut Hyd<'_>) -> bool {
    let mut change = false;
    for vi in 0..ctx.net.nvalves() {
        let k = ctx.net.valves[vi].link;
        let Some(setting) = ctx.st.setting[k] else {
            continue; // Valve status fixed by the caller
        };
        let link = ctx.net.link(k);
        let (n1, n2) = (link.n1, link.n2);
        let s = ctx.st.status[k];
        let new_status = match link.link_type {
            LinkType::Prv => {
                let hset = ctx.net.node(n2).elevation + setting;
                prv_status(ctx, k, s, hset, ctx.st.head[n1], ctx.st.head[n2])
            }
            LinkType::Psv => {
                let hset = ctx.net.node(n1).elevation + setting;
                psv_status(ctx, k, s, hset, ctx.st.head[n1], ctx.st.head[n2])
            }
            _ => continue,
        };

        // Flow through the valve is not reset on a status change; that
        // strategy improves convergence.
        if s != new_status {
            ctx.st.status[k] = new_status;
            let id = ctx.net.link(k).id.clone();
            ctx.rpt
                .stat_change(ctx.st.htime + ctx.times.tstart, &id, s, new_status);
            change = true;
        }
    }
    change
}

/// Determines a new status for pumps, CVs, non-fixed FCVs and links
/// connected to tanks. Returns whether any link changed status.
pub(crate) fn link_status(ctx: &mut Hyd<'_>) -> bool {
    let mut change = false;
    for k in 1..=ctx.net.nlinks() {
        let link = ctx.net.link(k);
        let (n1, n2) = (link.n1, link.n2);
        let dh = ctx.st.head[n1] - ctx.st.head[n2];

        // Re-open temporarily closed links.
        let status = ctx.st.status[k];
        if status == LinkStatus::XHead || status == LinkStatus::TempClosed {
            ctx.st.status[k] = LinkStatus::Open;
        }

        match link.link_type {
            LinkType::CvPipe => {
                ctx.st.status[k] = cv_status(ctx.op.htol, ctx.op.qtol, ctx.st.status[k], dh, ctx.st.flow[k]);
            }
            LinkType::Pump => {
                let speed = ctx.st.setting[k].unwrap_or(0.0);
                if ctx.st.status[k] >= LinkStatus::Open && speed > 0.0 {
                    ctx.st.status[k] = pump_status(ctx, k, -dh);
                }
            }
            LinkType::Fcv => {
                if ctx.st.setting[k].is_some() {
                    ctx.st.status[k] =
                        fcv_status(ctx, k, status, ctx.st.head[n1], ctx.st.head[n2]);
                }
            }
            _ => {}
        }

        // Check for flow into full or out of empty tanks.
        if n1 > ctx.net.njuncs() || n2 > ctx.net.njuncs() {
            tank_status(ctx, k, n1, n2);
        }

        if status != ctx.st.status[k] {
            change = true;
            let id = ctx.net.link(k).id.clone();
            ctx.rpt
                .stat_change(ctx.st.htime + ctx.times.tstart, &id, status, ctx.st.status[k]);
        }
    }
    change
}

/// Updates the status of a check valve: closed on reverse head or flow.
pub(crate) fn cv_status(htol: f64, qtol: f64, s: LinkStatus, dh: f64, q: f64) -> LinkStatus {
    if dh.abs() > htol {
        if dh < -htol || q < -qtol {
            LinkStatus::Closed
        } else {
            LinkStatus::Open
        }
    } else if q < -qtol {
        LinkStatus::Closed
    } else {
        s
    }
}

/// Updates the status of an open pump: `XHead` when the computed head
/// gain exceeds the speed-adjusted shutoff head, `XFlow` when the flow
/// exceeds the speed-adjusted maximum flow.
fn pump_status(ctx: &Hyd<'_>, k: usize, dh: f64) -> LinkStatus {
    let speed = ctx.st.setting[k].unwrap_or(0.0);
    let (hmax, qmax) = match ctx.net.find_pump(k) {
        Some(pi) => {
            let pump = ctx.net.pump(pi);
            if pump.ptype == PumpType::ConstHp {
                (BIG, BIG)
            } else {
                (speed * speed * pump.hmax, speed * pump.qmax)
            }
        }
        None => (BIG, BIG),
    };
    if dh > hmax + ctx.op.htol {
        return LinkStatus::XHead;
    }
    if ctx.st.flow[k] > qmax + ctx.op.qtol {
        return LinkStatus::XFlow;
    }
    LinkStatus::Open
}

/// Updates the status of a pressure reducing valve.
fn prv_status(ctx: &Hyd<'_>, k: usize, s: LinkStatus, hset: f64, h1: f64, h2: f64) -> LinkStatus {
    let htol = ctx.op.htol;
    let qtol = ctx.op.qtol;
    let q = ctx.st.flow[k];
    let hml = ctx.net.link(k).km * q * q; // head loss when open

    match s {
        LinkStatus::Active => {
            if q < -qtol {
                LinkStatus::Closed
            } else if h1 - hml < hset - htol {
                LinkStatus::Open
            } else {
                LinkStatus::Active
            }
        }
        LinkStatus::Open => {
            if q < -qtol {
                LinkStatus::Closed
            } else if h2 >= hset + htol {
                LinkStatus::Active
            } else {
                LinkStatus::Open
            }
        }
        LinkStatus::Closed => {
            if h1 >= hset + htol && h2 < hset - htol {
                LinkStatus::Active
            } else if h1 < hset - htol && h1 > h2 + htol {
                LinkStatus::Open
            } else {
                LinkStatus::Closed
            }
        }
        LinkStatus::XPressure => {
            if q < -qtol {
                LinkStatus::Closed
            } else {
                s
            }
        }
        _ => s,
    }
}

/// Updates the status of a pressure sustaining valve.
fn psv_status(ctx: &Hyd<'_>, k: usize, s: LinkStatus, hset: f64, h1: f64, h2: f64) -> LinkStatus {
    let htol = ctx.op.htol;
    let qtol = ctx.op.qtol;
    let q = ctx.st.flow[k];
    let hml = ctx.net.link(k).km * q * q;

    match s {
        LinkStatus::Active => {
            if q < -qtol {
                LinkStatus::Closed
            } else if h2 + hml > hset + htol {
                LinkStatus::Open
            } else {
                LinkStatus::Active
            }
        }
        LinkStatus::Open => {
            if q < -qtol {
                LinkStatus::Closed
            } else if h1 < hset - htol {
                LinkStatus::Active
            } else {
                LinkStatus::Open
            }
        }
        LinkStatus::Closed => {
            if h2 > hset + htol && h1 > h2 + htol {
                LinkStatus::Open
            } else if h1 >= hset + htol && h1 > h2 + htol {
                LinkStatus::Active
            } else {
                LinkStatus::Closed
            }
        }
        LinkStatus::XPressure => {
            if q < -qtol {
                LinkStatus::Closed
            } else {
                s
            }
        }
        _ => s,
    }
}

/// Updates the status of a flow control valve.
///
/// The valve becomes `XFcv` on flow reversal or when the upstream head
/// drops below the downstream head; once `XFcv`, it re-activates when the
/// flow again reaches the setting.
fn fcv_status(ctx: &Hyd<'_>, k: usize, s: LinkStatus, h1: f64, h2: f64) -> LinkStatus {
    let q = ctx.st.flow[k];
    let setting = ctx.st.setting[k].unwrap_or(0.0);
    if h1 - h2 < -ctx.op.htol || q < -ctx.op.qtol {
        LinkStatus::XFcv
    } else if s == LinkStatus::XFcv && q >= setting {
        LinkStatus::Active
    } else {
        s
    }
}

/// Temporarily closes a link flowing into a full tank or out of an empty
/// one. Pump orientation and check-valve directionality decide which
/// endpoint qualifies.
fn tank_status(ctx: &mut Hyd<'_>, k: usize, n1: usize, n2: usize) {
    let mut q = ctx.st.flow[k];
    let (n1, n2) = {
        // Make n1 the tank node.
        if ctx.net.tank_index(n1) > 0 {
            (n1, n2)
        } else if ctx.net.tank_index(n2) > 0 {
            q = -q;
            (n2, n1)
        } else {
            return;
        }
    };
    let ti = ctx.net.tank_index(n1);
    let tank = ctx.net.tank(ti);
    if tank.is_reservoir() || ctx.st.status[k].is_closed() {
        return;
    }
    let h = ctx.st.head[n1] - ctx.st.head[n2];
    let link = ctx.net.link(k);

    // Tank full: prevent flow into it unless it may overflow.
    if ctx.st.head[n1] >= tank.hmax - ctx.op.htol && !tank.can_overflow {
        if link.link_type == LinkType::Pump {
            if link.n2 == n1 {
                ctx.st.status[k] = LinkStatus::TempClosed;
            }
        } else if cv_status(ctx.op.htol, ctx.op.qtol, LinkStatus::Open, h, q) == LinkStatus::Closed
        {
            ctx.st.status[k] = LinkStatus::TempClosed;
        }
    }

    // Tank empty: prevent flow out of it.
    if ctx.st.head[n1] <= tank.hmin + ctx.op.htol {
        if link.link_type == LinkType::Pump {
            if link.n1 == n1 {
                ctx.st.status[k] = LinkStatus::TempClosed;
            }
        } else if cv_status(ctx.op.htol, ctx.op.qtol, LinkStatus::Closed, h, q) == LinkStatus::Open
        {
            ctx.st.status[k] = LinkStatus::TempClosed;
        }
    }
}

/// Adjusts links controlled by junction pressures after a converged
/// solution. Returns whether any status or setting changed.
pub(crate) fn pressure_switch(ctx: &mut Hyd<'_>) -> bool {
    let mut any_change = false;
    for i in 0..ctx.net.controls.len() {
        let control = ctx.net.controls[i].clone();
        if !control.enabled || control.link == 0 {
            continue;
        }
        let n = control.node;
        if n == 0 || n > ctx.net.njuncs() {
            continue;
        }
        let grade = control.grade + ctx.net.node(n).elevation;
        let reset = match control.control_type {
            ControlType::LowLevel => ctx.st.head[n] <= grade + ctx.op.htol,
            ControlType::HiLevel => ctx.st.head[n] >= grade - ctx.op.htol,
            _ => false,
        };
        if !reset {
            continue;
        }

        let k = control.link;
        let link = ctx.net.link(k);
        let s = ctx.st.status[k];
        let change = match link.link_type {
            LinkType::CvPipe | LinkType::Pipe => s != control.status,
            LinkType::Pump => ctx.st.setting[k] != control.setting,
            _ => {
                ctx.st.setting[k] != control.setting
                    || (ctx.st.setting[k].is_none() && s != control.status)
            }
        };
        if change {
            ctx.st.status[k] = control.status;
            if link.link_type > LinkType::Pipe {
                ctx.st.setting[k] = control.setting;
            }
            let id = link.id.clone();
            ctx.rpt
                .stat_change(ctx.st.htime + ctx.times.tstart, &id, s, ctx.st.status[k]);
            any_change = true;
        }
    }
    any_change
}

/// When the linear solver reports ill-conditioning at a node touching an
/// active control valve, the valve's status is demoted to a fixed
/// diagnostic state so the iterations can continue. Returns whether a
/// valve was demoted.
pub(crate) fn bad_valve(ctx: &mut Hyd<'_>, n: usize) -> bool {
    for vi in 0..ctx.net.nvalves() {
        let k = ctx.net.valves[vi].link;
        let link = ctx.net.link(k);
        if n != link.n1 && n != link.n2 {
            continue;
        }
        if link.link_type.is_control_valve() && ctx.st.status[k] == LinkStatus::Active {
            let new_status = if link.link_type == LinkType::Fcv {
                LinkStatus::XFcv
            } else {
                LinkStatus::XPressure
            };
            let id = link.id.clone();
            ctx.rpt
                .stat_change(ctx.st.htime + ctx.times.tstart, &id, LinkStatus::Active, new_status);
            ctx.st.status[k] = new_status;
            return true;
        }
        return false;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_valve_closes_on_reverse_head() {
        let s = cv_status(0.0005, 1.0e-5, LinkStatus::Open, -0.1, 0.01);
        assert_eq!(s, LinkStatus::Closed);
    }

    #[test]
    fn check_valve_closes_on_reverse_flow() {
        let s = cv_status(0.0005, 1.0e-5, LinkStatus::Open, 0.1, -0.01);
        assert_eq!(s, LinkStatus::Closed);
    }

    #[test]
    fn check_valve_keeps_status_in_dead_band() {
        let s = cv_status(0.0005, 1.0e-5, LinkStatus::Closed, 0.0, 0.0);
        assert_eq!(s, LinkStatus::Closed);
        let s = cv_status(0.0005, 1.0e-5, LinkStatus::Open, 0.0, 0.0);
        assert_eq!(s, LinkStatus::Open);
    }
}
