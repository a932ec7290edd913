//! Rule-based control API methods.
//!
//! Rules are built programmatically: create the rule, then append
//! premises and THEN/ELSE actions.

use crate::error::*;
use crate::types::*;
use crate::Project;

/// ## Rule APIs
impl Project {
    /// Adds an empty rule. Returns the 1-based rule index.
    pub fn add_rule(&mut self, id: &str) -> Result<i32> {
        if self.network.rules.iter().any(|r| r.id == id) {
            return Err(EngineError::new(ERR_DUPLICATE_ID));
        }
        self.network.rules.push(Rule::new(id));
        Ok(self.network.rules.len() as i32)
    }

    /// Deletes a rule.
    pub fn delete_rule(&mut self, index: i32) -> Result<()> {
        let i = self.rule_index(index)?;
        self.network.rules.remove(i - 1);
        Ok(())
    }

    /// Gets the index of the rule with the given ID.
    pub fn get_rule_index(&self, id: &str) -> Result<i32> {
        self.network
            .rules
            .iter()
            .position(|r| r.id == id)
            .map(|i| i as i32 + 1)
            .ok_or(EngineError::new(ERR_UNDEF_CONTROL))
    }

    /// Gets a rule's ID given its index.
    pub fn get_rule_id(&self, index: i32) -> Result<String> {
        let i = self.rule_index(index)?;
        Ok(self.network.rules[i - 1].id.clone())
    }

    /// Returns a rule's premise, THEN-action and ELSE-action counts and
    /// its priority.
    pub fn get_rule_info(&self, index: i32) -> Result<(i32, i32, i32, f64)> {
        let i = self.rule_index(index)?;
        let rule = &self.network.rules[i - 1];
        Ok((
            rule.premises.len() as i32,
            rule.then_actions.len() as i32,
            rule.else_actions.len() as i32,
            rule.priority,
        ))
    }

    /// Sets a rule's priority; higher priorities win conflicting actions.
    pub fn set_rule_priority(&mut self, index: i32, priority: f64) -> Result<()> {
        let i = self.rule_index(index)?;
        self.network.rules[i - 1].priority = priority;
        Ok(())
    }

    /// Enables or disables a rule.
    pub fn set_rule_enabled(&mut self, index: i32, enabled: bool) -> Result<()> {
        let i = self.rule_index(index)?;
        self.network.rules[i - 1].enabled = enabled;
        Ok(())
    }

    /// Appends a premise to a rule.
    ///
    /// The first premise of a rule must use [`LogicalOperator::If`];
    /// later premises chain with `And` (binds tighter) or `Or`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_premise(
        &mut self,
        rule_index: i32,
        logop: LogicalOperator,
        object: RuleObject,
        object_index: i32,
        variable: RuleVariable,
        operator: RuleOperator,
        status: Option<RuleStatus>,
        value: f64,
    ) -> Result<()> {
        let i = self.rule_index(rule_index)?;
        match object {
            RuleObject::Node => {
                self.node_index(object_index)?;
            }
            RuleObject::Link => {
                self.link_index(object_index)?;
            }
            RuleObject::System => {}
        }
        let first = self.network.rules[i - 1].premises.is_empty();
        if first != (logop == LogicalOperator::If) {
            return Err(EngineError::new(ERR_RULE_CLAUSE));
        }
        self.network.rules[i - 1].premises.push(Premise {
            logop,
            object,
            index: object_index.max(0) as usize,
            variable,
            operator,
            status,
            value,
        });
        Ok(())
    }

    /// Appends a THEN action to a rule.
    pub fn add_then_action(
        &mut self,
        rule_index: i32,
        link_index: i32,
        status: Option<LinkStatus>,
        setting: Option<f64>,
    ) -> Result<()> {
        let i = self.rule_index(rule_index)?;
        let k = self.link_index(link_index)?;
        self.network.rules[i - 1].then_actions.push(ActionClause {
            link: k,
            status,
            setting,
        });
        Ok(())
    }

    /// Appends an ELSE action to a rule.
    pub fn add_else_action(
        &mut self,
        rule_index: i32,
        link_index: i32,
        status: Option<LinkStatus>,
        setting: Option<f64>,
    ) -> Result<()> {
        let i = self.rule_index(rule_index)?;
        if self.network.rules[i - 1].then_actions.is_empty() {
            return Err(EngineError::new(ERR_RULE_CLAUSE));
        }
        let k = self.link_index(link_index)?;
        self.network.rules[i - 1].else_actions.push(ActionClause {
            link: k,
            status,
            setting,
        });
        Ok(())
    }

    /// Returns a copy of one premise of a rule (1-based).
    pub fn get_premise(&self, rule_index: i32, premise_index: i32) -> Result<Premise> {
        let i = self.rule_index(rule_index)?;
        let premises = &self.network.rules[i - 1].premises;
        let p = premise_index as usize;
        if premise_index < 1 || p > premises.len() {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        Ok(premises[p - 1].clone())
    }

    /// Replaces one premise of a rule (1-based).
    pub fn set_premise(&mut self, rule_index: i32, premise_index: i32, premise: Premise) -> Result<()> {
        let i = self.rule_index(rule_index)?;
        let premises = &mut self.network.rules[i - 1].premises;
        let p = premise_index as usize;
        if premise_index < 1 || p > premises.len() {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        premises[p - 1] = premise;
        Ok(())
    }

    /// Returns a copy of one THEN action of a rule (1-based).
    pub fn get_then_action(&self, rule_index: i32, action_index: i32) -> Result<ActionClause> {
        let i = self.rule_index(rule_index)?;
        Self::action_at(&self.network.rules[i - 1].then_actions, action_index)
    }

    /// Replaces one THEN action of a rule (1-based).
    pub fn set_then_action(
        &mut self,
        rule_index: i32,
        action_index: i32,
        action: ActionClause,
    ) -> Result<()> {
        let i = self.rule_index(rule_index)?;
        Self::replace_action(&mut self.network.rules[i - 1].then_actions, action_index, action)
    }

    /// Returns a copy of one ELSE action of a rule (1-based).
    pub fn get_else_action(&self, rule_index: i32, action_index: i32) -> Result<ActionClause> {
        let i = self.rule_index(rule_index)?;
        Self::action_at(&self.network.rules[i - 1].else_actions, action_index)
    }

    /// Replaces one ELSE action of a rule (1-based).
    pub fn set_else_action(
        &mut self,
        rule_index: i32,
        action_index: i32,
        action: ActionClause,
    ) -> Result<()> {
        let i = self.rule_index(rule_index)?;
        Self::replace_action(&mut self.network.rules[i - 1].else_actions, action_index, action)
    }

    fn action_at(actions: &[ActionClause], index: i32) -> Result<ActionClause> {
        let a = index as usize;
        if index < 1 || a > actions.len() {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        Ok(actions[a - 1].clone())
    }

    fn replace_action(actions: &mut [ActionClause], index: i32, action: ActionClause) -> Result<()> {
        let a = index as usize;
        if index < 1 || a > actions.len() {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        actions[a - 1] = action;
        Ok(())
    }

    fn rule_index(&self, index: i32) -> Result<usize> {
        let i = index as usize;
        if index < 1 || i > self.network.rules.len() {
            return Err(EngineError::new(ERR_UNDEF_CONTROL));
        }
        Ok(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::test_utils::fixtures::*;
    use rstest::rstest;

    #[rstest]
    fn rule_construction_round_trip(mut ph: Project) {
        let t1 = ph.get_node_index("T1").unwrap();
        let p1 = ph.get_link_index("P1").unwrap();
        let r = ph.add_rule("R-1").unwrap();
        ph.add_premise(
            r,
            LogicalOperator::If,
            RuleObject::Node,
            t1,
            RuleVariable::Level,
            RuleOperator::Below,
            None,
            2.0,
        )
        .unwrap();
        ph.add_then_action(r, p1, Some(crate::types::LinkStatus::Open), None)
            .unwrap();
        ph.add_else_action(r, p1, Some(crate::types::LinkStatus::Closed), None)
            .unwrap();
        ph.set_rule_priority(r, 2.0).unwrap();

        let (np, nt, ne, priority) = ph.get_rule_info(r).unwrap();
        assert_eq!((np, nt, ne), (1, 1, 1));
        assert_eq!(priority, 2.0);
        assert_eq!(ph.get_rule_index("R-1").unwrap(), r);
    }

    #[rstest]
    fn misplaced_clauses_are_rejected(mut ph: Project) {
        let t1 = ph.get_node_index("T1").unwrap();
        let p1 = ph.get_link_index("P1").unwrap();
        let r = ph.add_rule("R-1").unwrap();
        // First premise must be an IF.
        let err = ph
            .add_premise(
                r,
                LogicalOperator::And,
                RuleObject::Node,
                t1,
                RuleVariable::Level,
                RuleOperator::Below,
                None,
                2.0,
            )
            .unwrap_err();
        assert_eq!(err.code(), ERR_RULE_CLAUSE);
        // ELSE before any THEN is rejected.
        let err = ph.add_else_action(r, p1, None, Some(1.0)).unwrap_err();
        assert_eq!(err.code(), ERR_RULE_CLAUSE);
    }
}
