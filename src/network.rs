//! In-memory network: topology, component properties and the ID index.
//!
//! All cross-component relations are expressed with 1-based indices rather
//! than references, so components can be inserted and removed while
//! referential integrity is enforced in one place. Node storage keeps
//! junctions first, then tanks and reservoirs; the `tanks` list parallels
//! the fixed-grade tail of the node list.

use std::collections::HashMap;

use crate::error::*;
use crate::types::*;

#[derive(Debug, Default)]
pub struct Network {
    pub(crate) nodes: Vec<Node>,
    pub(crate) links: Vec<Link>,
    pub(crate) tanks: Vec<Tank>,
    pub(crate) pumps: Vec<Pump>,
    pub(crate) valves: Vec<Valve>,
    pub(crate) patterns: Vec<Pattern>,
    pub(crate) curves: Vec<Curve>,
    pub(crate) controls: Vec<Control>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) node_index: HashMap<String, usize>,
    pub(crate) link_index: HashMap<String, usize>,
    pub(crate) njuncs: usize,
}

impl Network {
    pub fn new() -> Self {
        Network::default()
    }

    pub fn nnodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nlinks(&self) -> usize {
        self.links.len()
    }

    pub fn ntanks(&self) -> usize {
        self.tanks.len()
    }

    pub fn njuncs(&self) -> usize {
        self.njuncs
    }

    pub fn npumps(&self) -> usize {
        self.pumps.len()
    }

    pub fn nvalves(&self) -> usize {
        self.valves.len()
    }

    /// Node by 1-based index.
    pub fn node(&self, i: usize) -> &Node {
        &self.nodes[i - 1]
    }

    pub fn node_mut(&mut self, i: usize) -> &mut Node {
        &mut self.nodes[i - 1]
    }

    /// Link by 1-based index.
    pub fn link(&self, k: usize) -> &Link {
        &self.links[k - 1]
    }

    pub fn link_mut(&mut self, k: usize) -> &mut Link {
        &mut self.links[k - 1]
    }

    /// 1-based tank list index for node `n`, or 0 if `n` is a junction.
    pub fn tank_index(&self, n: usize) -> usize {
        if n > self.njuncs {
            n - self.njuncs
        } else {
            0
        }
    }

    pub fn tank(&self, ti: usize) -> &Tank {
        &self.tanks[ti - 1]
    }

    pub fn tank_mut(&mut self, ti: usize) -> &mut Tank {
        &mut self.tanks[ti - 1]
    }

    /// Tank record for node `n`, if `n` is a fixed-grade node.
    pub fn tank_of_node(&self, n: usize) -> Option<&Tank> {
        let ti = self.tank_index(n);
        if ti > 0 {
            Some(self.tank(ti))
        } else {
            None
        }
    }

    /// Pump list index (1-based) for link `k`.
    pub fn find_pump(&self, k: usize) -> Option<usize> {
        self.pumps.iter().position(|p| p.link == k).map(|i| i + 1)
    }

    pub fn pump(&self, pi: usize) -> &Pump {
        &self.pumps[pi - 1]
    }

    pub fn pump_mut(&mut self, pi: usize) -> &mut Pump {
        &mut self.pumps[pi - 1]
    }

    pub fn find_node(&self, id: &str) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    pub fn find_link(&self, id: &str) -> Option<usize> {
        self.link_index.get(id).copied()
    }

    pub fn find_pattern(&self, id: &str) -> Option<usize> {
        self.patterns.iter().position(|p| p.id == id).map(|i| i + 1)
    }

    pub fn find_curve(&self, id: &str) -> Option<usize> {
        self.curves.iter().position(|c| c.id == id).map(|i| i + 1)
    }

    pub fn pattern(&self, i: usize) -> &Pattern {
        &self.patterns[i - 1]
    }

    pub fn curve(&self, i: usize) -> &Curve {
        &self.curves[i - 1]
    }

    /// Multiplier for pattern `i` at elapsed period `p`; pattern 0 is the
    /// implicit constant pattern.
    pub fn pattern_factor(&self, i: usize, p: i64) -> f64 {
        if i == 0 {
            1.0
        } else {
            self.patterns[i - 1].factor(p)
        }
    }

    fn check_id(id: &str) -> Result<()> {
        if id.is_empty() || id.len() > MAX_ID_SIZE || id.contains(char::is_whitespace) {
            return Err(EngineError::new(ERR_TOO_LONG));
        }
        Ok(())
    }

    /// Adds a node, returning its 1-based index. Junctions are inserted
    /// ahead of the fixed-grade nodes; tanks and reservoirs are appended.
    pub fn add_node(&mut self, id: &str, node_type: NodeType) -> Result<usize> {
        Self::check_id(id)?;
        if self.node_index.contains_key(id) {
            return Err(EngineError::new(ERR_DUPLICATE_ID));
        }
        let index = match node_type {
            NodeType::Junction => {
                let at = self.njuncs + 1;
                self.nodes.insert(at - 1, Node::new(id, node_type));
                self.njuncs += 1;
                self.shift_node_refs_up(at);
                at
            }
            NodeType::Reservoir | NodeType::Tank => {
                self.nodes.push(Node::new(id, node_type));
                let at = self.nodes.len();
                let tank = if node_type == NodeType::Reservoir {
                    Tank::reservoir(at)
                } else {
                    Tank::tank(at)
                };
                self.tanks.push(tank);
                at
            }
        };
        self.reindex_nodes();
        Ok(index)
    }

    /// Adds a link between two existing, distinct nodes.
    pub fn add_link(
        &mut self,
        id: &str,
        link_type: LinkType,
        from: &str,
        to: &str,
    ) -> Result<usize> {
        Self::check_id(id)?;
        if self.link_index.contains_key(id) {
            return Err(EngineError::new(ERR_DUPLICATE_ID));
        }
        let n1 = self.find_node(from).ok_or(EngineError::new(ERR_UNDEF_NODE))?;
        let n2 = self.find_node(to).ok_or(EngineError::new(ERR_UNDEF_NODE))?;
        if n1 == n2 {
            return Err(EngineError::new(ERR_SAME_ENDPOINTS));
        }
        if link_type.is_control_valve() {
            if n1 > self.njuncs || n2 > self.njuncs {
                return Err(EngineError::new(ERR_VALVE_TANK));
            }
            self.valve_check(link_type, n1, n2)?;
        }
        self.links.push(Link::new(id, link_type, n1, n2));
        let k = self.links.len();
        self.link_index.insert(id.to_string(), k);
        match link_type {
            LinkType::Pump => self.pumps.push(Pump::new(k)),
            t if t.is_valve() => self.valves.push(Valve { link: k }),
            _ => {}
        }
        Ok(k)
    }

    /// Rejects PRV/PSV/FCV placements that make the flow-head equations
    /// singular: shared or opposing setpoint nodes among control valves.
    fn valve_check(&self, link_type: LinkType, j1: usize, j2: usize) -> Result<()> {
        for valve in &self.valves {
            let link = self.link(valve.link);
            let (vj1, vj2) = (link.n1, link.n2);
            let bad = match (link.link_type, link_type) {
                (LinkType::Prv, LinkType::Prv) => vj2 == j2 || vj2 == j1 || vj1 == j2,
                (LinkType::Psv, LinkType::Psv) => vj1 == j1 || vj1 == j2 || vj2 == j1,
                (LinkType::Psv, LinkType::Prv) => vj1 == j2,
                (LinkType::Prv, LinkType::Psv) => vj2 == j1,
                (LinkType::Fcv, LinkType::Psv) => vj2 == j1,
                (LinkType::Fcv, LinkType::Prv) => vj1 == j2,
                (LinkType::Psv, LinkType::Fcv) => vj1 == j2,
                (LinkType::Prv, LinkType::Fcv) => vj2 == j1,
                _ => false,
            };
            if bad {
                return Err(EngineError::new(ERR_VALVE_VALVE));
            }
        }
        Ok(())
    }

    /// Deletes a node. With [`ActionCode::Conditional`] the delete fails if
    /// any link, control or rule references the node; with
    /// [`ActionCode::Unconditional`] those references are cascaded away.
    pub fn delete_node(&mut self, index: usize, action: ActionCode) -> Result<()> {
        if index == 0 || index > self.nnodes() {
            return Err(EngineError::new(ERR_UNDEF_NODE));
        }
        let incident: Vec<usize> = (1..=self.nlinks())
            .filter(|&k| self.link(k).n1 == index || self.link(k).n2 == index)
            .collect();
        let referenced = self.controls.iter().any(|c| c.node == index)
            || self.rules.iter().any(|r| {
                r.premises
                    .iter()
                    .any(|p| p.object == RuleObject::Node && p.index == index)
            });
        if action == ActionCode::Conditional && (!incident.is_empty() || referenced) {
            return Err(EngineError::new(ERR_IN_USE));
        }
        for k in incident.into_iter().rev() {
            self.delete_link(k, ActionCode::Unconditional)?;
        }
        self.controls.retain(|c| c.node != index);
        self.rules.retain(|r| {
            !r.premises
                .iter()
                .any(|p| p.object == RuleObject::Node && p.index == index)
        });
        if index > self.njuncs {
            self.tanks.remove(index - self.njuncs - 1);
        } else {
            self.njuncs -= 1;
        }
        self.nodes.remove(index - 1);
        self.shift_node_refs_down(index);
        self.reindex_nodes();
        Ok(())
    }

    /// Deletes a link, honoring the same action-code policy as node deletes.
    pub fn delete_link(&mut self, index: usize, action: ActionCode) -> Result<()> {
        if index == 0 || index > self.nlinks() {
            return Err(EngineError::new(ERR_UNDEF_LINK));
        }
        let referenced = self.controls.iter().any(|c| c.link == index)
            || self.rules.iter().any(|r| {
                r.premises
                    .iter()
                    .any(|p| p.object == RuleObject::Link && p.index == index)
                    || r.then_actions.iter().any(|a| a.link == index)
                    || r.else_actions.iter().any(|a| a.link == index)
            });
        if action == ActionCode::Conditional && referenced {
            return Err(EngineError::new(ERR_IN_USE));
        }
        self.controls.retain(|c| c.link != index);
        self.rules.retain(|r| {
            !(r.premises
                .iter()
                .any(|p| p.object == RuleObject::Link && p.index == index)
                || r.then_actions.iter().any(|a| a.link == index)
                || r.else_actions.iter().any(|a| a.link == index))
        });
        self.pumps.retain(|p| p.link != index);
        self.valves.retain(|v| v.link != index);
        self.links.remove(index - 1);
        for pump in &mut self.pumps {
            if pump.link > index {
                pump.link -= 1;
            }
        }
        for valve in &mut self.valves {
            if valve.link > index {
                valve.link -= 1;
            }
        }
        for control in &mut self.controls {
            if control.link > index {
                control.link -= 1;
            }
        }
        for rule in &mut self.rules {
            for p in &mut rule.premises {
                if p.object == RuleObject::Link && p.index > index {
                    p.index -= 1;
                }
            }
            for a in rule.then_actions.iter_mut().chain(rule.else_actions.iter_mut()) {
                if a.link > index {
                    a.link -= 1;
                }
            }
        }
        self.reindex_links();
        Ok(())
    }

    pub fn add_pattern(&mut self, id: &str) -> Result<usize> {
        Self::check_id(id)?;
        if self.find_pattern(id).is_some() {
            return Err(EngineError::new(ERR_DUPLICATE_ID));
        }
        self.patterns.push(Pattern::new(id));
        Ok(self.patterns.len())
    }

    pub fn add_curve(&mut self, id: &str) -> Result<usize> {
        Self::check_id(id)?;
        if self.find_curve(id).is_some() {
            return Err(EngineError::new(ERR_DUPLICATE_ID));
        }
        self.curves.push(Curve::new(id));
        Ok(self.curves.len())
    }

    fn shift_node_refs_up(&mut self, from: usize) {
        for link in &mut self.links {
            if link.n1 >= from {
                link.n1 += 1;
            }
            if link.n2 >= from {
                link.n2 += 1;
            }
        }
        for tank in &mut self.tanks {
            if tank.node >= from {
                tank.node += 1;
            }
        }
        for control in &mut self.controls {
            if control.node >= from {
                control.node += 1;
            }
        }
        for rule in &mut self.rules {
            for p in &mut rule.premises {
                if p.object == RuleObject::Node && p.index >= from {
                    p.index += 1;
                }
            }
        }
    }

    fn shift_node_refs_down(&mut self, removed: usize) {
        for link in &mut self.links {
            if link.n1 > removed {
                link.n1 -= 1;
            }
            if link.n2 > removed {
                link.n2 -= 1;
            }
        }
        for tank in &mut self.tanks {
            if tank.node > removed {
                tank.node -= 1;
            }
        }
        for control in &mut self.controls {
            if control.node > removed {
                control.node -= 1;
            }
        }
        for rule in &mut self.rules {
            for p in &mut rule.premises {
                if p.object == RuleObject::Node && p.index > removed {
                    p.index -= 1;
                }
            }
        }
    }

    fn reindex_nodes(&mut self) {
        self.node_index.clear();
        for (i, node) in self.nodes.iter().enumerate() {
            self.node_index.insert(node.id.clone(), i + 1);
        }
    }

    fn reindex_links(&mut self) {
        self.link_index.clear();
        for (k, link) in self.links.iter().enumerate() {
            self.link_index.insert(link.id.clone(), k + 1);
        }
    }

    /// Structural validation run before a solver opens.
    pub fn validate(&self) -> Result<()> {
        if self.nnodes() < 2 || self.nlinks() < 1 {
            return Err(EngineError::new(ERR_TOO_FEW_NODES));
        }
        if self.ntanks() == 0 {
            return Err(EngineError::new(ERR_NO_FIXED_GRADE));
        }
        for tank in &self.tanks {
            if tank.is_reservoir() {
                continue;
            }
            if tank.hmin > tank.h0 || tank.h0 > tank.hmax || tank.hmin > tank.hmax {
                return Err(EngineError::new(ERR_TANK_LEVELS));
            }
            if tank.vol_curve > 0 {
                let curve = self.curve(tank.vol_curve);
                if !curve.is_valid() || curve.points.len() < 2 {
                    return Err(EngineError::new(ERR_CURVE_SEQUENCE));
                }
            }
        }
        for curve in &self.curves {
            if !curve.is_valid() {
                return Err(EngineError::new(ERR_CURVE_SEQUENCE));
            }
        }
        for pump in &self.pumps {
            if pump.ptype == PumpType::NoCurve {
                return Err(EngineError::new(ERR_NO_PUMP_CURVE));
            }
            if pump.ptype == PumpType::Custom {
                let curve = self.curve(pump.hcurve);
                if curve.points.len() < 2
                    || !curve.points.windows(2).all(|w| w[0].1 > w[1].1)
                {
                    return Err(EngineError::new(ERR_PUMP_CURVE));
                }
            }
        }
        // Every node must touch at least one link.
        let mut connected = vec![false; self.nnodes() + 1];
        for link in &self.links {
            connected[link.n1] = true;
            connected[link.n2] = true;
        }
        if connected.iter().skip(1).any(|&c| !c) {
            return Err(EngineError::new(ERR_DISCONNECTED));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn y_network() -> Network {
        let mut net = Network::new();
        net.add_node("R1", NodeType::Reservoir).unwrap();
        net.add_node("J1", NodeType::Junction).unwrap();
        net.add_node("J2", NodeType::Junction).unwrap();
        net.add_link("P1", LinkType::Pipe, "R1", "J1").unwrap();
        net.add_link("P2", LinkType::Pipe, "J1", "J2").unwrap();
        net
    }

    #[test]
    fn junctions_stay_ahead_of_fixed_grade_nodes() {
        let net = y_network();
        assert_eq!(net.njuncs(), 2);
        assert_eq!(net.node(1).id, "J1");
        assert_eq!(net.node(2).id, "J2");
        assert_eq!(net.node(3).id, "R1");
        assert_eq!(net.tank(1).node, 3);
    }

    #[test]
    fn link_endpoints_follow_junction_insertion() {
        let mut net = y_network();
        // P1 runs R1 -> J1; adding a junction shifts the reservoir index.
        let r1_before = net.find_node("R1").unwrap();
        net.add_node("J3", NodeType::Junction).unwrap();
        let r1_after = net.find_node("R1").unwrap();
        assert_eq!(r1_after, r1_before + 1);
        let p1 = net.find_link("P1").unwrap();
        assert_eq!(net.link(p1).n1, r1_after);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut net = y_network();
        let err = net.add_node("J1", NodeType::Junction).unwrap_err();
        assert_eq!(err.code(), ERR_DUPLICATE_ID);
        let err = net.add_link("P1", LinkType::Pipe, "J1", "J2").unwrap_err();
        assert_eq!(err.code(), ERR_DUPLICATE_ID);
    }

    #[test]
    fn self_loops_are_rejected() {
        let mut net = y_network();
        let err = net.add_link("P9", LinkType::Pipe, "J1", "J1").unwrap_err();
        assert_eq!(err.code(), ERR_SAME_ENDPOINTS);
    }

    #[test]
    fn control_valves_cannot_touch_tanks() {
        let mut net = y_network();
        let err = net.add_link("V1", LinkType::Prv, "R1", "J1").unwrap_err();
        assert_eq!(err.code(), ERR_VALVE_TANK);
    }

    #[test]
    fn two_prvs_cannot_share_a_downstream_node() {
        let mut net = y_network();
        net.add_node("J3", NodeType::Junction).unwrap();
        net.add_link("V1", LinkType::Prv, "J1", "J2").unwrap();
        let err = net.add_link("V2", LinkType::Prv, "J3", "J2").unwrap_err();
        assert_eq!(err.code(), ERR_VALVE_VALVE);
    }

    #[test]
    fn conditional_delete_fails_on_connected_node() {
        let mut net = y_network();
        let j1 = net.find_node("J1").unwrap();
        let err = net.delete_node(j1, ActionCode::Conditional).unwrap_err();
        assert_eq!(err.code(), ERR_IN_USE);
    }

    #[test]
    fn unconditional_delete_cascades_incident_links() {
        let mut net = y_network();
        let j1 = net.find_node("J1").unwrap();
        net.delete_node(j1, ActionCode::Unconditional).unwrap();
        assert_eq!(net.nlinks(), 0);
        assert_eq!(net.find_node("J2"), Some(1));
        assert_eq!(net.find_node("R1"), Some(2));
        assert_eq!(net.tank(1).node, 2);
    }

    #[test]
    fn validation_requires_a_fixed_grade_node() {
        let mut net = Network::new();
        net.add_node("J1", NodeType::Junction).unwrap();
        net.add_node("J2", NodeType::Junction).unwrap();
        net.add_link("P1", LinkType::Pipe, "J1", "J2").unwrap();
        let err = net.validate().unwrap_err();
        assert_eq!(err.code(), ERR_NO_FIXED_GRADE);
    }
}
