//! Rule-based control evaluation.
//!
//! Rules are evaluated every rule step against the current hydraulic
//! state. A premise chain is a boolean expression in which `And` binds
//! tighter than `Or`. When several rules act on the same link in one
//! evaluation, the highest-priority rule wins; ties break in declaration
//! order and losing actions are logged as overridden.

use crate::hydraulics::{self, Hyd, TINY};
use crate::types::*;
use crate::units::SEC_PER_DAY;

/// A queued rule action awaiting arbitration.
#[derive(Debug, Clone)]
struct PendingAction {
    rule: usize,
    action: ActionClause,
}

/// Checks which rules fire over the interval ending at the current
/// hydraulic time and applies the winning actions. Returns the number of
/// links whose status or setting changed.
pub(crate) fn check_rules(ctx: &mut Hyd<'_>, dt: i64) -> usize {
    let mut pending: Vec<PendingAction> = Vec::new();

    for ri in 0..ctx.net.rules.len() {
        let rule = ctx.net.rules[ri].clone();
        if !rule.enabled {
            continue;
        }
        let fired = eval_premises(ctx, &rule, dt);
        let list = if fired {
            &rule.then_actions
        } else {
            &rule.else_actions
        };
        for action in list {
            queue_action(ctx, &mut pending, ri, action);
        }
    }

    take_actions(ctx, &pending)
}

/// Adds an action to the pending list, keeping only the highest-priority
/// action per link.
fn queue_action(ctx: &mut Hyd<'_>, pending: &mut Vec<PendingAction>, rule: usize, action: &ActionClause) {
    for existing in pending.iter_mut() {
        if existing.action.link == action.link {
            let old_pri = ctx.net.rules[existing.rule].priority;
            let new_pri = ctx.net.rules[rule].priority;
            if new_pri > old_pri {
                let overridden = ctx.net.rules[existing.rule].id.clone();
                let winner = ctx.net.rules[rule].id.clone();
                ctx.rpt.writeline(&format!(
                    "rule {} action on link {} overridden by rule {}",
                    overridden,
                    ctx.net.link(action.link).id,
                    winner
                ));
                existing.rule = rule;
                existing.action = action.clone();
            } else {
                let overridden = ctx.net.rules[rule].id.clone();
                let winner = ctx.net.rules[existing.rule].id.clone();
                ctx.rpt.writeline(&format!(
                    "rule {} action on link {} overridden by rule {}",
                    overridden,
                    ctx.net.link(action.link).id,
                    winner
                ));
            }
            return;
        }
    }
    pending.push(PendingAction {
        rule,
        action: action.clone(),
    });
}

/// Applies the pending actions, counting actual status or setting changes.
fn take_actions(ctx: &mut Hyd<'_>, pending: &[PendingAction]) -> usize {
    let mut taken = 0;
    for item in pending {
        let k = item.action.link;
        if k == 0 || k > ctx.net.nlinks() {
            continue;
        }
        let s0 = ctx.st.status[k];
        let k0 = ctx.st.setting[k];
        let (mut s, mut setting) = (s0, k0);
        let link = ctx.net.link(k).clone();
        if let Some(value) = item.action.setting {
            hydraulics::set_link_setting(&link, value, &mut s, &mut setting);
        } else if let Some(status) = item.action.status {
            hydraulics::set_link_status(&link, status > LinkStatus::Closed, &mut s, &mut setting);
        }
        if s != s0 || setting != k0 {
            ctx.st.status[k] = s;
            ctx.st.setting[k] = setting;
            let rule_id = ctx.net.rules[item.rule].id.clone();
            if ctx.rpt.statflag != StatusReport::NoReport {
                ctx.rpt.writeline(&format!(
                    "{}: rule {} acts on link {}",
                    crate::report::clocktime(ctx.st.htime + ctx.times.tstart),
                    rule_id,
                    link.id
                ));
            }
            taken += 1;
        }
    }
    taken
}

/// Evaluates a rule's premise chain with `And` binding tighter than `Or`:
/// the chain is a disjunction of AND-groups, and an `Or` premise closes
/// the current group and opens a new one. A failed premise short-circuits
/// only the group it belongs to.
fn eval_premises(ctx: &Hyd<'_>, rule: &Rule, dt: i64) -> bool {
    let mut or_result = false;
    let mut and_group = true;
    for premise in &rule.premises {
        if premise.logop == LogicalOperator::Or {
            or_result = or_result || and_group;
            and_group = check_premise(ctx, premise, dt);
        } else if and_group {
            and_group = check_premise(ctx, premise, dt);
        }
    }
    or_result || and_group
}

fn check_premise(ctx: &Hyd<'_>, premise: &Premise, dt: i64) -> bool {
    match premise.object {
        RuleObject::System => check_time(ctx, premise, dt),
        RuleObject::Node => check_node(ctx, premise),
        RuleObject::Link => check_link(ctx, premise),
    }
}

/// Checks a time premise against the evaluation interval
/// `(Htime - dt, Htime]`, wrapping across midnight for clock times.
fn check_time(ctx: &Hyd<'_>, premise: &Premise, dt: i64) -> bool {
    let (t1, t2) = match premise.variable {
        RuleVariable::Time => (ctx.st.htime - dt + 1, ctx.st.htime),
        RuleVariable::ClockTime => (
            (ctx.st.htime - dt + 1 + ctx.times.tstart).rem_euclid(SEC_PER_DAY),
            (ctx.st.htime + ctx.times.tstart).rem_euclid(SEC_PER_DAY),
        ),
        _ => return false,
    };
    let x = premise.value as i64;
    match premise.operator {
        RuleOperator::Lt | RuleOperator::Below => t2 < x,
        RuleOperator::Le => t2 <= x,
        RuleOperator::Gt | RuleOperator::Above => t1 > x,
        RuleOperator::Ge => t1 >= x,
        RuleOperator::Eq | RuleOperator::Is | RuleOperator::Ne | RuleOperator::Not => {
            let inside = if t2 < t1 {
                // Interval wraps past midnight.
                x >= t1 || x <= t2
            } else {
                x >= t1 && x <= t2
            };
            match premise.operator {
                RuleOperator::Eq | RuleOperator::Is => inside,
                _ => !inside,
            }
        }
    }
}

fn check_node(ctx: &Hyd<'_>, premise: &Premise) -> bool {
    let n = premise.index;
    if n == 0 || n > ctx.net.nnodes() {
        return false;
    }
    let x = match premise.variable {
        RuleVariable::Demand => ctx.st.demand[n],
        RuleVariable::Head | RuleVariable::Grade => ctx.st.head[n],
        RuleVariable::Level => ctx.st.head[n] - ctx.net.node(n).elevation,
        RuleVariable::Pressure => ctx.st.head[n] - ctx.net.node(n).elevation,
        RuleVariable::FillTime => {
            let ti = ctx.net.tank_index(n);
            if ti == 0 {
                return false;
            }
            let tank = ctx.net.tank(ti);
            let q = ctx.st.demand[n];
            if q <= TINY {
                return false;
            }
            (tank.vmax - tank.volume) / q
        }
        RuleVariable::DrainTime => {
            let ti = ctx.net.tank_index(n);
            if ti == 0 {
                return false;
            }
            let tank = ctx.net.tank(ti);
            let q = ctx.st.demand[n];
            if q >= -TINY {
                return false;
            }
            (tank.volume - tank.vmin) / (-q)
        }
        _ => return false,
    };
    check_value(premise.operator, x, premise.value)
}

fn check_link(ctx: &Hyd<'_>, premise: &Premise) -> bool {
    let k = premise.index;
    if k == 0 || k > ctx.net.nlinks() {
        return false;
    }
    match premise.variable {
        RuleVariable::Status => {
            let s = ctx.st.status[k];
            let actual = if s.is_closed() {
                RuleStatus::IsClosed
            } else if s == LinkStatus::Active {
                RuleStatus::IsActive
            } else {
                RuleStatus::IsOpen
            };
            let target = match premise.status {
                Some(t) => t,
                None => return false,
            };
            match premise.operator {
                RuleOperator::Eq | RuleOperator::Is => actual == target,
                RuleOperator::Ne | RuleOperator::Not => actual != target,
                _ => false,
            }
        }
        RuleVariable::Flow => check_value(premise.operator, ctx.st.flow[k].abs(), premise.value),
        RuleVariable::Setting => match ctx.st.setting[k] {
            Some(setting) => check_value(premise.operator, setting, premise.value),
            None => false,
        },
        RuleVariable::Power => {
            let (kw, _) = hydraulics::get_energy(ctx, k);
            check_value(premise.operator, kw, premise.value)
        }
        _ => false,
    }
}

/// Numeric comparison with a small tolerance on equality.
fn check_value(op: RuleOperator, x: f64, value: f64) -> bool {
    const TOL: f64 = 1.0e-3;
    match op {
        RuleOperator::Eq | RuleOperator::Is => (x - value).abs() <= TOL,
        RuleOperator::Ne | RuleOperator::Not => (x - value).abs() > TOL,
        RuleOperator::Le => x <= value + TOL,
        RuleOperator::Ge => x >= value - TOL,
        RuleOperator::Lt | RuleOperator::Below => x < value + TOL,
        RuleOperator::Gt | RuleOperator::Above => x > value - TOL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_comparisons_use_tolerance() {
        assert!(check_value(RuleOperator::Eq, 1.0005, 1.0));
        assert!(!check_value(RuleOperator::Eq, 1.1, 1.0));
        assert!(check_value(RuleOperator::Above, 1.1, 1.0));
        assert!(check_value(RuleOperator::Below, 0.9, 1.0));
    }
}
