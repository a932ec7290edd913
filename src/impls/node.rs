//! Node-related API methods.
//!
//! Methods for adding, deleting and querying junctions, reservoirs and
//! tanks, and for getting or setting their properties.

use num_traits::FromPrimitive;

use crate::error::*;
use crate::types::*;
use crate::units::SEC_PER_DAY;
use crate::Project;

/// ## Node APIs
impl Project {
    /// Adds a node to the project with a given ID and type.
    /// Returns the 1-based index of the new node.
    ///
    /// Junctions are kept ahead of tanks and reservoirs, so adding a
    /// junction can shift the indices of existing fixed-grade nodes.
    ///
    /// # Errors
    /// - 215 if the ID is already in use.
    /// - 109 if a solver is open.
    pub fn add_node(&mut self, id: &str, node_type: NodeType) -> Result<i32> {
        self.check_closed()?;
        self.network.add_node(id, node_type).map(|i| i as i32)
    }

    /// Deletes a node from the project.
    ///
    /// With [`ActionCode::Conditional`] the delete fails if the node has
    /// connecting links or appears in any control or rule; with
    /// [`ActionCode::Unconditional`] those references are deleted too.
    pub fn delete_node(&mut self, index: i32, action_code: ActionCode) -> Result<()> {
        self.check_closed()?;
        self.network.delete_node(index as usize, action_code)
    }

    /// Gets the index of the node with the given ID.
    pub fn get_node_index(&self, id: &str) -> Result<i32> {
        self.network
            .find_node(id)
            .map(|i| i as i32)
            .ok_or(EngineError::new(ERR_UNDEF_NODE))
    }

    /// Gets a node ID given an index.
    pub fn get_node_id(&self, index: i32) -> Result<String> {
        let i = self.node_index(index)?;
        Ok(self.network.node(i).id.clone())
    }

    /// Renames a node.
    pub fn set_node_id(&mut self, index: i32, id: &str) -> Result<()> {
        let i = self.node_index(index)?;
        if self.network.find_node(id).is_some() {
            return Err(EngineError::new(ERR_DUPLICATE_ID));
        }
        let old = self.network.node(i).id.clone();
        self.network.node_mut(i).id = id.to_string();
        self.network.node_index.remove(&old);
        self.network.node_index.insert(id.to_string(), i);
        Ok(())
    }

    /// Gets the type of a node.
    pub fn get_node_type(&self, index: i32) -> Result<NodeType> {
        let i = self.node_index(index)?;
        Ok(self.network.node(i).node_type)
    }

    /// Retrieves a property value for a node. Flow-dimension values are
    /// expressed in the project's flow units, pressures in its pressure
    /// units, and everything else in metres, cubic metres and seconds.
    pub fn get_node_value(&self, index: i32, property: NodeProperty) -> Result<f64> {
        let i = self.node_index(index)?;
        let node = self.network.node(i);
        let qcf = self.qcf();
        let has_state = !self.hyd.head.is_empty();

        let value = match property {
            NodeProperty::Elevation => node.elevation,
            NodeProperty::BaseDemand => {
                node.demands.first().map(|d| d.base).unwrap_or(0.0) / qcf
            }
            NodeProperty::Pattern => match self.network.tank_of_node(i) {
                // Head pattern for fixed-grade nodes.
                Some(tank) => tank.pattern as f64,
                None => node.demands.first().map(|d| d.pattern).unwrap_or(0) as f64,
            },
            NodeProperty::Emitter => node.emitter_coeff / qcf,
            NodeProperty::InitQual => node.init_quality,
            NodeProperty::SourceQual
            | NodeProperty::SourcePat
            | NodeProperty::SourceType
            | NodeProperty::SourceMass => {
                let source = node.source.as_ref().ok_or(EngineError::new(ERR_UNDEF_SOURCE))?;
                match property {
                    NodeProperty::SourceQual => source.strength,
                    NodeProperty::SourcePat => source.pattern as f64,
                    NodeProperty::SourceType => source.source_type as u32 as f64,
                    _ => source.mass_added,
                }
            }
            NodeProperty::TankLevel => {
                let tank = self.tank_at(i)?;
                if has_state {
                    self.hyd.head[i] - node.elevation
                } else {
                    tank.h0 - node.elevation
                }
            }
            NodeProperty::Demand => {
                if has_state {
                    self.hyd.demand[i] / qcf
                } else {
                    0.0
                }
            }
            NodeProperty::Head => {
                if has_state {
                    self.hyd.head[i]
                } else {
                    0.0
                }
            }
            NodeProperty::Pressure => {
                if has_state {
                    (self.hyd.head[i] - node.elevation) / self.pcf()
                } else {
                    0.0
                }
            }
            NodeProperty::Quality => {
                if self.qual.node_qual.is_empty() {
                    node.init_quality
                } else {
                    self.qual.node_qual[i]
                }
            }
            NodeProperty::InitVolume => self.tank_at(i)?.v0,
            NodeProperty::MixModel => self.tank_at(i)?.mix_model as u32 as f64,
            NodeProperty::MixZoneVol => {
                let tank = self.tank_at(i)?;
                tank.mix_fraction * tank.vmax
            }
            NodeProperty::TankDiam => self.tank_at(i)?.diameter(),
            NodeProperty::MinVolume => self.tank_at(i)?.vmin,
            NodeProperty::VolCurve => self.tank_at(i)?.vol_curve as f64,
            NodeProperty::MinLevel => self.tank_at(i)?.hmin - node.elevation,
            NodeProperty::MaxLevel => self.tank_at(i)?.hmax - node.elevation,
            NodeProperty::MixFraction => self.tank_at(i)?.mix_fraction,
            NodeProperty::TankKBulk => self.tank_at(i)?.kb * SEC_PER_DAY as f64,
            NodeProperty::TankVolume => self.tank_at(i)?.volume,
            NodeProperty::MaxVolume => self.tank_at(i)?.vmax,
            NodeProperty::CanOverflow => self.tank_at(i)?.can_overflow as i32 as f64,
            NodeProperty::DemandDeficit => {
                if has_state {
                    (self.hyd.full_demand[i] - self.hyd.demand_flows[i]) / qcf
                } else {
                    0.0
                }
            }
            NodeProperty::EmitterFlow => {
                if has_state {
                    self.hyd.emitter_flows[i] / qcf
                } else {
                    0.0
                }
            }
            NodeProperty::DemandFlow => {
                if has_state {
                    self.hyd.demand_flows[i] / qcf
                } else {
                    0.0
                }
            }
            NodeProperty::FullDemand => {
                if has_state {
                    self.hyd.full_demand[i] / qcf
                } else {
                    0.0
                }
            }
        };
        Ok(value)
    }

    /// Sets a property value for a node, using the same units as
    /// [`Project::get_node_value`].
    pub fn set_node_value(&mut self, index: i32, property: NodeProperty, value: f64) -> Result<()> {
        let i = self.node_index(index)?;
        let qcf = self.qcf();
        match property {
            NodeProperty::Elevation => {
                let old = self.network.node(i).elevation;
                self.network.node_mut(i).elevation = value;
                if let Some(ti) = self.tank_index_checked(i) {
                    let delta = value - old;
                    let tank = self.network.tank_mut(ti);
                    tank.h0 += delta;
                    tank.hmin += delta;
                    tank.hmax += delta;
                }
            }
            NodeProperty::BaseDemand => {
                let node = self.network.node_mut(i);
                match node.demands.first_mut() {
                    Some(demand) => demand.base = value * qcf,
                    None => node.demands.push(Demand::new(value * qcf, 0)),
                }
            }
            NodeProperty::Pattern => {
                let pat = self.pattern_index_from_value(value)?;
                if let Some(ti) = self.tank_index_checked(i) {
                    // Head pattern for reservoirs.
                    self.network.tank_mut(ti).pattern = pat;
                } else {
                    let node = self.network.node_mut(i);
                    match node.demands.first_mut() {
                        Some(demand) => demand.pattern = pat,
                        None => node.demands.push(Demand::new(0.0, pat)),
                    }
                }
            }
            NodeProperty::Emitter => {
                if value < 0.0 {
                    return Err(EngineError::new(ERR_ILLEGAL_NODE_VALUE));
                }
                self.network.node_mut(i).emitter_coeff = value * qcf;
            }
            NodeProperty::InitQual => {
                if value < 0.0 {
                    return Err(EngineError::new(ERR_ILLEGAL_NODE_VALUE));
                }
                self.network.node_mut(i).init_quality = value;
            }
            NodeProperty::SourceQual => self.edit_source(i, |s| s.strength = value)?,
            NodeProperty::SourcePat => {
                let pat = self.pattern_index_from_value(value)?;
                self.edit_source(i, |s| s.pattern = pat)?;
            }
            NodeProperty::SourceType => {
                let st = SourceType::from_f64(value).ok_or(EngineError::new(ERR_PARAM_CODE))?;
                self.edit_source(i, |s| s.source_type = st)?;
            }
            NodeProperty::TankLevel => {
                let el = self.network.node(i).elevation;
                let ti = self.tank_index_of(i)?;
                let tank = self.network.tank_mut(ti);
                tank.h0 = el + value;
                if tank.hmin > tank.h0 || tank.h0 > tank.hmax {
                    return Err(EngineError::new(ERR_TANK_LEVELS));
                }
            }
            NodeProperty::MixModel => {
                let model = MixingModel::from_f64(value).ok_or(EngineError::new(ERR_PARAM_CODE))?;
                let ti = self.tank_index_of(i)?;
                self.network.tank_mut(ti).mix_model = model;
            }
            NodeProperty::TankDiam => {
                if value <= 0.0 {
                    return Err(EngineError::new(ERR_ILLEGAL_NODE_VALUE));
                }
                let ti = self.tank_index_of(i)?;
                self.network.tank_mut(ti).area = std::f64::consts::PI * value * value / 4.0;
            }
            NodeProperty::MinVolume => {
                if value < 0.0 {
                    return Err(EngineError::new(ERR_ILLEGAL_NODE_VALUE));
                }
                let ti = self.tank_index_of(i)?;
                self.network.tank_mut(ti).vmin = value;
            }
            NodeProperty::VolCurve => {
                let ci = value.round() as usize;
                if ci > self.network.curves.len() {
                    return Err(EngineError::new(ERR_UNDEF_CURVE));
                }
                let ti = self.tank_index_of(i)?;
                if ci > 0 {
                    self.network.curves[ci - 1].curve_type = CurveType::VolumeCurve;
                }
                self.network.tank_mut(ti).vol_curve = ci;
            }
            NodeProperty::MinLevel => {
                let el = self.network.node(i).elevation;
                let ti = self.tank_index_of(i)?;
                self.network.tank_mut(ti).hmin = el + value;
            }
            NodeProperty::MaxLevel => {
                let el = self.network.node(i).elevation;
                let ti = self.tank_index_of(i)?;
                self.network.tank_mut(ti).hmax = el + value;
            }
            NodeProperty::MixFraction => {
                if !(0.0..=1.0).contains(&value) || value == 0.0 {
                    return Err(EngineError::new(ERR_ILLEGAL_NODE_VALUE));
                }
                let ti = self.tank_index_of(i)?;
                self.network.tank_mut(ti).mix_fraction = value;
            }
            NodeProperty::TankKBulk => {
                let ti = self.tank_index_of(i)?;
                self.network.tank_mut(ti).kb = value / SEC_PER_DAY as f64;
            }
            NodeProperty::CanOverflow => {
                let ti = self.tank_index_of(i)?;
                self.network.tank_mut(ti).can_overflow = value != 0.0;
            }
            _ => return Err(EngineError::new(ERR_PARAM_CODE)),
        }
        Ok(())
    }

    /// Sets the elevation, primary base demand and demand pattern of a
    /// junction in one call.
    pub fn set_junction_data(
        &mut self,
        index: i32,
        elevation: f64,
        base_demand: f64,
        pattern_id: &str,
    ) -> Result<()> {
        let i = self.node_index(index)?;
        if self.network.node(i).node_type != NodeType::Junction {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        let pattern = if pattern_id.is_empty() {
            0
        } else {
            self.network
                .find_pattern(pattern_id)
                .ok_or(EngineError::new(ERR_UNDEF_PATTERN))?
        };
        let qcf = self.qcf();
        let node = self.network.node_mut(i);
        node.elevation = elevation;
        node.demands.clear();
        node.demands.push(Demand::new(base_demand * qcf, pattern));
        Ok(())
    }

    /// Sets the geometry of a tank in one call: elevation, initial,
    /// minimum and maximum water levels, diameter, minimum volume and an
    /// optional volume curve.
    #[allow(clippy::too_many_arguments)]
    pub fn set_tank_data(
        &mut self,
        index: i32,
        elevation: f64,
        init_level: f64,
        min_level: f64,
        max_level: f64,
        diameter: f64,
        min_volume: f64,
        vol_curve_id: &str,
    ) -> Result<()> {
        let i = self.node_index(index)?;
        let ti = self.tank_index_of(i)?;
        if min_level > init_level || init_level > max_level {
            return Err(EngineError::new(ERR_TANK_LEVELS));
        }
        let vol_curve = if vol_curve_id.is_empty() {
            0
        } else {
            self.network
                .find_curve(vol_curve_id)
                .ok_or(EngineError::new(ERR_UNDEF_CURVE))?
        };
        if vol_curve > 0 {
            self.network.curves[vol_curve - 1].curve_type = CurveType::VolumeCurve;
        }
        self.network.node_mut(i).elevation = elevation;
        let tank = self.network.tank_mut(ti);
        tank.h0 = elevation + init_level;
        tank.hmin = elevation + min_level;
        tank.hmax = elevation + max_level;
        tank.area = std::f64::consts::PI * diameter * diameter / 4.0;
        tank.vmin = min_volume;
        tank.vol_curve = vol_curve;
        Ok(())
    }

    fn edit_source(&mut self, i: usize, edit: impl FnOnce(&mut Source)) -> Result<()> {
        let node = self.network.node_mut(i);
        let source = node.source.get_or_insert(Source {
            strength: 0.0,
            source_type: SourceType::Concen,
            pattern: 0,
            mass_added: 0.0,
        });
        edit(source);
        Ok(())
    }

    fn pattern_index_from_value(&self, value: f64) -> Result<usize> {
        let pat = value.round();
        if pat < 0.0 || pat as usize > self.network.patterns.len() {
            return Err(EngineError::new(ERR_UNDEF_PATTERN));
        }
        Ok(pat as usize)
    }

    pub(crate) fn node_index(&self, index: i32) -> Result<usize> {
        let i = index as usize;
        if index < 1 || i > self.network.nnodes() {
            return Err(EngineError::new(ERR_UNDEF_NODE));
        }
        Ok(i)
    }

    fn tank_index_checked(&self, i: usize) -> Option<usize> {
        let ti = self.network.tank_index(i);
        (ti > 0).then_some(ti)
    }

    fn tank_index_of(&self, i: usize) -> Result<usize> {
        self.tank_index_checked(i)
            .ok_or(EngineError::new(ERR_ARGUMENT))
    }

    fn tank_at(&self, i: usize) -> Result<&Tank> {
        self.network
            .tank_of_node(i)
            .ok_or(EngineError::new(ERR_ARGUMENT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::test_utils::fixtures::*;
    use rstest::rstest;

    #[rstest]
    fn node_add_lookup_round_trip(mut ph: Project) {
        let index = ph.add_node("N2", NodeType::Junction).unwrap();
        assert_eq!(ph.get_node_index("N2").unwrap(), index);
        assert_eq!(ph.get_node_id(index).unwrap(), "N2");
        assert_eq!(ph.get_node_type(index).unwrap(), NodeType::Junction);
    }

    #[rstest]
    fn set_get_round_trip_for_mutable_properties(mut ph: Project) {
        let j1 = ph.get_node_index("J1").unwrap();
        ph.set_node_value(j1, NodeProperty::Elevation, 12.5).unwrap();
        assert_eq!(ph.get_node_value(j1, NodeProperty::Elevation).unwrap(), 12.5);

        ph.set_node_value(j1, NodeProperty::BaseDemand, 2.5).unwrap();
        assert!(approx_eq(
            ph.get_node_value(j1, NodeProperty::BaseDemand).unwrap(),
            2.5,
            1e-12
        ));

        ph.set_node_value(j1, NodeProperty::InitQual, 0.8).unwrap();
        assert_eq!(ph.get_node_value(j1, NodeProperty::InitQual).unwrap(), 0.8);
    }

    #[rstest]
    fn tank_levels_are_relative_to_elevation(mut ph: Project) {
        let t1 = ph.get_node_index("T1").unwrap();
        ph.set_node_value(t1, NodeProperty::MaxLevel, 6.0).unwrap();
        assert_eq!(ph.get_node_value(t1, NodeProperty::MaxLevel).unwrap(), 6.0);
        let el = ph.get_node_value(t1, NodeProperty::Elevation).unwrap();
        assert!(el > 0.0);
    }

    #[rstest]
    fn source_requires_creation_before_reading(mut ph: Project) {
        let j1 = ph.get_node_index("J1").unwrap();
        let err = ph.get_node_value(j1, NodeProperty::SourceQual).unwrap_err();
        assert_eq!(err.code(), ERR_UNDEF_SOURCE);

        ph.set_node_value(j1, NodeProperty::SourceQual, 1.5).unwrap();
        assert_eq!(ph.get_node_value(j1, NodeProperty::SourceQual).unwrap(), 1.5);
    }

    #[rstest]
    fn junction_rejects_tank_properties(ph: Project) {
        let j1 = ph.get_node_index("J1").unwrap();
        let err = ph.get_node_value(j1, NodeProperty::TankVolume).unwrap_err();
        assert_eq!(err.code(), ERR_ARGUMENT);
    }
}
