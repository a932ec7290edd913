//! Demand category API methods.
//!
//! Junctions carry a list of demand categories, each with a baseline
//! value, a time pattern and an optional name.

use crate::error::*;
use crate::types::Demand;
use crate::Project;

/// ## Demand APIs
impl Project {
    /// Appends a demand category to a junction.
    pub fn add_demand(
        &mut self,
        node_index: i32,
        base_demand: f64,
        pattern_id: &str,
        name: &str,
    ) -> Result<()> {
        let i = self.node_index(node_index)?;
        let pattern = if pattern_id.is_empty() {
            0
        } else {
            self.network
                .find_pattern(pattern_id)
                .ok_or(EngineError::new(ERR_UNDEF_PATTERN))?
        };
        let base = base_demand * self.qcf();
        let node = self.network.node_mut(i);
        node.demands.push(Demand {
            base,
            pattern,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Deletes a demand category from a junction (1-based).
    pub fn delete_demand(&mut self, node_index: i32, demand_index: i32) -> Result<()> {
        let i = self.node_index(node_index)?;
        let d = self.demand_slot(i, demand_index)?;
        self.network.node_mut(i).demands.remove(d);
        Ok(())
    }

    /// Number of demand categories at a node.
    pub fn get_num_demands(&self, node_index: i32) -> Result<i32> {
        let i = self.node_index(node_index)?;
        Ok(self.network.node(i).demands.len() as i32)
    }

    /// Baseline value of one demand category.
    pub fn get_base_demand(&self, node_index: i32, demand_index: i32) -> Result<f64> {
        let i = self.node_index(node_index)?;
        let d = self.demand_slot(i, demand_index)?;
        Ok(self.network.node(i).demands[d].base / self.qcf())
    }

    /// Sets the baseline value of one demand category.
    pub fn set_base_demand(&mut self, node_index: i32, demand_index: i32, value: f64) -> Result<()> {
        let i = self.node_index(node_index)?;
        let d = self.demand_slot(i, demand_index)?;
        let base = value * self.qcf();
        self.network.node_mut(i).demands[d].base = base;
        Ok(())
    }

    /// Pattern index of one demand category.
    pub fn get_demand_pattern(&self, node_index: i32, demand_index: i32) -> Result<i32> {
        let i = self.node_index(node_index)?;
        let d = self.demand_slot(i, demand_index)?;
        Ok(self.network.node(i).demands[d].pattern as i32)
    }

    /// Sets the pattern of one demand category.
    pub fn set_demand_pattern(
        &mut self,
        node_index: i32,
        demand_index: i32,
        pattern_index: i32,
    ) -> Result<()> {
        let i = self.node_index(node_index)?;
        let d = self.demand_slot(i, demand_index)?;
        let p = pattern_index as usize;
        if pattern_index < 0 || p > self.network.patterns.len() {
            return Err(EngineError::new(ERR_UNDEF_PATTERN));
        }
        self.network.node_mut(i).demands[d].pattern = p;
        Ok(())
    }

    /// Name of one demand category.
    pub fn get_demand_name(&self, node_index: i32, demand_index: i32) -> Result<String> {
        let i = self.node_index(node_index)?;
        let d = self.demand_slot(i, demand_index)?;
        Ok(self.network.node(i).demands[d].name.clone())
    }

    /// Sets the name of one demand category.
    pub fn set_demand_name(
        &mut self,
        node_index: i32,
        demand_index: i32,
        name: &str,
    ) -> Result<()> {
        let i = self.node_index(node_index)?;
        let d = self.demand_slot(i, demand_index)?;
        self.network.node_mut(i).demands[d].name = name.to_string();
        Ok(())
    }

    fn demand_slot(&self, node: usize, demand_index: i32) -> Result<usize> {
        let d = demand_index as usize;
        if demand_index < 1 || d > self.network.node(node).demands.len() {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        Ok(d - 1)
    }
}

#[cfg(test)]
mod tests {
    use crate::impls::test_utils::fixtures::*;
    use crate::Project;
    use rstest::rstest;

    #[rstest]
    fn demand_categories_round_trip(mut ph: Project) {
        let j1 = ph.get_node_index("J1").unwrap();
        let before = ph.get_num_demands(j1).unwrap();
        ph.add_demand(j1, 0.4, "", "industrial").unwrap();
        assert_eq!(ph.get_num_demands(j1).unwrap(), before + 1);
        let d = before + 1;
        assert!(approx_eq(ph.get_base_demand(j1, d).unwrap(), 0.4, 1e-12));
        assert_eq!(ph.get_demand_name(j1, d).unwrap(), "industrial");

        ph.set_base_demand(j1, d, 0.6).unwrap();
        assert!(approx_eq(ph.get_base_demand(j1, d).unwrap(), 0.6, 1e-12));

        ph.delete_demand(j1, d).unwrap();
        assert_eq!(ph.get_num_demands(j1).unwrap(), before);
    }

    #[rstest]
    fn unknown_pattern_is_rejected(mut ph: Project) {
        let j1 = ph.get_node_index("J1").unwrap();
        let err = ph.add_demand(j1, 1.0, "NOPE", "").unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_UNDEF_PATTERN);
    }
}
