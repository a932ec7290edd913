//! Link-related API methods.
//!
//! Methods for adding, deleting and querying pipes, pumps and valves, for
//! getting or setting their properties, and for binding pump curves.

use crate::error::*;
use crate::hydraulics::{minor_loss_coeff, set_link_setting, set_link_status, BIG};
use crate::types::*;
use crate::units::{GRAVITY, SEC_PER_DAY};
use crate::Project;

/// ## Link APIs
impl Project {
    /// Adds a link between two existing nodes.
    /// Returns the 1-based index of the new link.
    ///
    /// # Errors
    /// - 215 if the ID is already in use.
    /// - 203 if either node is undefined; 222 if the endpoints coincide.
    /// - 219/220 for illegal control-valve placements.
    pub fn add_link(
        &mut self,
        id: &str,
        link_type: LinkType,
        from_node: &str,
        to_node: &str,
    ) -> Result<i32> {
        self.check_closed()?;
        self.network
            .add_link(id, link_type, from_node, to_node)
            .map(|k| k as i32)
    }

    /// Deletes a link from the project, honoring the action code the same
    /// way node deletion does.
    pub fn delete_link(&mut self, index: i32, action_code: ActionCode) -> Result<()> {
        self.check_closed()?;
        self.network.delete_link(index as usize, action_code)
    }

    /// Gets the index of the link with the given ID.
    pub fn get_link_index(&self, id: &str) -> Result<i32> {
        self.network
            .find_link(id)
            .map(|k| k as i32)
            .ok_or(EngineError::new(ERR_UNDEF_LINK))
    }

    /// Gets a link ID given an index.
    pub fn get_link_id(&self, index: i32) -> Result<String> {
        let k = self.link_index(index)?;
        Ok(self.network.link(k).id.clone())
    }

    /// Gets the type of a link.
    pub fn get_link_type(&self, index: i32) -> Result<LinkType> {
        let k = self.link_index(index)?;
        Ok(self.network.link(k).link_type)
    }

    /// Gets the indices of a link's start and end nodes.
    pub fn get_link_nodes(&self, index: i32) -> Result<(i32, i32)> {
        let k = self.link_index(index)?;
        let link = self.network.link(k);
        Ok((link.n1 as i32, link.n2 as i32))
    }

    /// Retrieves a property value for a link, in the project's API units.
    pub fn get_link_value(&self, index: i32, property: LinkProperty) -> Result<f64> {
        let k = self.link_index(index)?;
        let link = self.network.link(k);
        let qcf = self.qcf();
        let has_state = !self.hyd.flow.is_empty();

        let value = match property {
            LinkProperty::Diameter => link.diameter,
            LinkProperty::Length => link.length,
            LinkProperty::Roughness => link.kc,
            LinkProperty::MinorLoss => {
                if link.diameter > 0.0 {
                    link.km / minor_loss_coeff(1.0, link.diameter)
                } else {
                    0.0
                }
            }
            LinkProperty::InitStatus => (!link.init_status.is_closed()) as i32 as f64,
            LinkProperty::InitSetting => match link.link_type {
                LinkType::CvPipe | LinkType::Pipe => link.kc,
                _ => link.init_setting.unwrap_or(0.0),
            },
            LinkProperty::KBulk => link.kb * SEC_PER_DAY as f64,
            LinkProperty::KWall => link.kw * SEC_PER_DAY as f64,
            LinkProperty::Flow => {
                if has_state {
                    self.hyd.flow[k] / qcf
                } else {
                    0.0
                }
            }
            LinkProperty::Velocity => {
                if has_state && link.diameter > 0.0 {
                    let area = std::f64::consts::PI * link.diameter * link.diameter / 4.0;
                    self.hyd.flow[k].abs() / area
                } else {
                    0.0
                }
            }
            LinkProperty::HeadLoss => {
                if has_state {
                    self.hyd.head[link.n1] - self.hyd.head[link.n2]
                } else {
                    0.0
                }
            }
            LinkProperty::Status => {
                if has_state {
                    (!self.hyd.status[k].is_closed()) as i32 as f64
                } else {
                    (!link.init_status.is_closed()) as i32 as f64
                }
            }
            LinkProperty::Setting => {
                if has_state {
                    self.hyd.setting[k].unwrap_or(0.0)
                } else {
                    match link.link_type {
                        LinkType::CvPipe | LinkType::Pipe => link.kc,
                        _ => link.init_setting.unwrap_or(0.0),
                    }
                }
            }
            LinkProperty::Energy => self.link_energy(k).0,
            LinkProperty::LinkQual => self.link_quality(k),
            LinkProperty::PumpState => {
                if has_state {
                    self.hyd.status[k] as u32 as f64
                } else {
                    link.init_status as u32 as f64
                }
            }
            LinkProperty::PumpEffic => self.link_energy(k).1 * 100.0,
            LinkProperty::PumpPower => self.pump_at(k)?.power,
            LinkProperty::PumpHCurve => self.pump_at(k)?.hcurve as f64,
            LinkProperty::PumpECurve => self.pump_at(k)?.ecurve as f64,
            LinkProperty::PumpECost => self.pump_at(k)?.ecost,
            LinkProperty::PumpEPat => self.pump_at(k)?.epat as f64,
            LinkProperty::PumpUPat => self.pump_at(k)?.upat as f64,
            LinkProperty::GpvCurve => {
                if link.link_type != LinkType::Gpv {
                    return Err(EngineError::new(ERR_ARGUMENT));
                }
                link.init_setting.unwrap_or(0.0)
            }
        };
        Ok(value)
    }

    /// Sets a property value for a link, using the same units as
    /// [`Project::get_link_value`].
    pub fn set_link_value(&mut self, index: i32, property: LinkProperty, value: f64) -> Result<()> {
        let k = self.link_index(index)?;
        let has_state = !self.hyd.flow.is_empty();
        match property {
            LinkProperty::Diameter => {
                if value <= 0.0 {
                    return Err(EngineError::new(ERR_ILLEGAL_LINK_VALUE));
                }
                let link = self.network.link_mut(k);
                // Preserve the dimensionless minor loss coefficient.
                let ratio = if link.diameter > 0.0 {
                    (link.diameter / value).powi(4)
                } else {
                    0.0
                };
                link.km *= ratio;
                link.diameter = value;
            }
            LinkProperty::Length => {
                if value <= 0.0 {
                    return Err(EngineError::new(ERR_ILLEGAL_LINK_VALUE));
                }
                self.network.link_mut(k).length = value;
            }
            LinkProperty::Roughness => {
                if value <= 0.0 {
                    return Err(EngineError::new(ERR_ILLEGAL_LINK_VALUE));
                }
                self.network.link_mut(k).kc = value;
            }
            LinkProperty::MinorLoss => {
                if value < 0.0 {
                    return Err(EngineError::new(ERR_ILLEGAL_LINK_VALUE));
                }
                let link = self.network.link_mut(k);
                link.km = minor_loss_coeff(value, link.diameter);
            }
            LinkProperty::InitStatus => {
                let link = self.network.link_mut(k);
                link.init_status = if value == 0.0 {
                    LinkStatus::Closed
                } else {
                    LinkStatus::Open
                };
                // A fixed status overrides any valve setting.
                if link.link_type.is_control_valve() {
                    link.init_setting = None;
                }
            }
            LinkProperty::InitSetting => {
                let link = self.network.link_mut(k);
                match link.link_type {
                    LinkType::CvPipe | LinkType::Pipe => {
                        if value <= 0.0 {
                            return Err(EngineError::new(ERR_ILLEGAL_LINK_VALUE));
                        }
                        link.kc = value;
                    }
                    LinkType::Pump => {
                        if value < 0.0 {
                            return Err(EngineError::new(ERR_ILLEGAL_LINK_VALUE));
                        }
                        link.init_setting = Some(value);
                        if value == 0.0 {
                            link.init_status = LinkStatus::Closed;
                        } else if link.init_status.is_closed() {
                            link.init_status = LinkStatus::Open;
                        }
                    }
                    _ => {
                        link.init_setting = Some(value);
                        if link.link_type.is_control_valve() {
                            link.init_status = LinkStatus::Active;
                        }
                    }
                }
            }
            LinkProperty::KBulk => self.network.link_mut(k).kb = value / SEC_PER_DAY as f64,
            LinkProperty::KWall => self.network.link_mut(k).kw = value / SEC_PER_DAY as f64,
            LinkProperty::Status => {
                let link = self.network.link(k).clone();
                if has_state {
                    let (mut s, mut set) = (self.hyd.status[k], self.hyd.setting[k]);
                    set_link_status(&link, value != 0.0, &mut s, &mut set);
                    self.hyd.status[k] = s;
                    self.hyd.setting[k] = set;
                } else {
                    return self.set_link_value(index, LinkProperty::InitStatus, value);
                }
            }
            LinkProperty::Setting => {
                let link = self.network.link(k).clone();
                if has_state {
                    let (mut s, mut set) = (self.hyd.status[k], self.hyd.setting[k]);
                    set_link_setting(&link, value, &mut s, &mut set);
                    self.hyd.status[k] = s;
                    self.hyd.setting[k] = set;
                } else {
                    return self.set_link_value(index, LinkProperty::InitSetting, value);
                }
            }
            LinkProperty::PumpPower => {
                if value <= 0.0 {
                    return Err(EngineError::new(ERR_ILLEGAL_LINK_VALUE));
                }
                let pi = self.pump_index_of(k)?;
                self.network.pump_mut(pi).power = value;
                self.network.pump_mut(pi).hcurve = 0;
                self.update_pump_params(pi)?;
            }
            LinkProperty::PumpHCurve => {
                let ci = self.curve_index_from_value(value)?;
                let pi = self.pump_index_of(k)?;
                self.network.pump_mut(pi).hcurve = ci;
                if ci > 0 {
                    self.network.curves[ci - 1].curve_type = CurveType::PumpCurve;
                    self.network.pump_mut(pi).power = 0.0;
                }
                self.update_pump_params(pi)?;
            }
            LinkProperty::PumpECurve => {
                let ci = self.curve_index_from_value(value)?;
                let pi = self.pump_index_of(k)?;
                if ci > 0 {
                    self.network.curves[ci - 1].curve_type = CurveType::EfficCurve;
                }
                self.network.pump_mut(pi).ecurve = ci;
            }
            LinkProperty::PumpECost => {
                let pi = self.pump_index_of(k)?;
                self.network.pump_mut(pi).ecost = value;
            }
            LinkProperty::PumpEPat => {
                let pat = self.pattern_index_from_value_link(value)?;
                let pi = self.pump_index_of(k)?;
                self.network.pump_mut(pi).epat = pat;
            }
            LinkProperty::PumpUPat => {
                let pat = self.pattern_index_from_value_link(value)?;
                let pi = self.pump_index_of(k)?;
                self.network.pump_mut(pi).upat = pat;
            }
            LinkProperty::GpvCurve => {
                let ci = self.curve_index_from_value(value)?;
                let link = self.network.link_mut(k);
                if link.link_type != LinkType::Gpv {
                    return Err(EngineError::new(ERR_ARGUMENT));
                }
                link.init_setting = Some(ci as f64);
                if has_state {
                    self.hyd.setting[k] = Some(ci as f64);
                }
                if ci > 0 {
                    self.network.curves[ci - 1].curve_type = CurveType::HLossCurve;
                }
            }
            _ => return Err(EngineError::new(ERR_PARAM_CODE)),
        }
        Ok(())
    }

    /// Sets the length, diameter, roughness and minor loss coefficient of
    /// a pipe in one call.
    pub fn set_pipe_data(
        &mut self,
        index: i32,
        length: f64,
        diameter: f64,
        roughness: f64,
        minor_loss: f64,
    ) -> Result<()> {
        let k = self.link_index(index)?;
        if self.network.link(k).link_type > LinkType::Pipe {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        self.set_link_value(index, LinkProperty::Length, length)?;
        self.set_link_value(index, LinkProperty::Diameter, diameter)?;
        self.set_link_value(index, LinkProperty::Roughness, roughness)?;
        self.set_link_value(index, LinkProperty::MinorLoss, minor_loss)
    }

    /// Gets the type of head curve a pump uses.
    pub fn get_pump_type(&self, index: i32) -> Result<PumpType> {
        let k = self.link_index(index)?;
        Ok(self.pump_at(k)?.ptype)
    }

    /// Re-derives a pump's operating parameters from its power rating or
    /// head curve.
    ///
    /// One-point curves are extended to a synthetic power function with a
    /// shutoff head a third above the design head; three-point curves
    /// starting at zero flow fit a power function; anything else becomes a
    /// custom curve that must be strictly decreasing in head.
    pub(crate) fn update_pump_params(&mut self, pi: usize) -> Result<()> {
        let pump = self.network.pump(pi).clone();
        let qcf = self.qcf();
        let spgrav = self.hyd_options.spgrav;

        if pump.power > 0.0 {
            let pump = self.network.pump_mut(pi);
            pump.ptype = PumpType::ConstHp;
            pump.h0 = 0.0;
            pump.r = -pump.power / (GRAVITY * spgrav);
            pump.n = -1.0;
            pump.hmax = BIG;
            pump.qmax = BIG;
            pump.q0 = 0.03;
            return Ok(());
        }

        if pump.hcurve == 0 {
            self.network.pump_mut(pi).ptype = PumpType::NoCurve;
            return Ok(());
        }

        let curve = self.network.curve(pump.hcurve).clone();
        let pts = &curve.points;
        let n = pts.len();
        if n == 0 {
            return Err(EngineError::new(ERR_PUMP_CURVE));
        }

        if n == 1 {
            // Single design point: shutoff head 33% higher, max flow twice
            // the design flow.
            let (q1, h1) = pts[0];
            let (a, b, c) = power_curve(4.0 / 3.0 * h1, h1, 0.0, q1, 2.0 * q1)?;
            self.store_power_pump(pi, a, b, c, q1 * qcf, qcf);
        } else if n == 3 && pts[0].0 == 0.0 {
            let (a, b, c) = power_curve(pts[0].1, pts[1].1, pts[2].1, pts[1].0, pts[2].0)?;
            self.store_power_pump(pi, a, b, c, pts[1].0 * qcf, qcf);
        } else {
            if !pts.windows(2).all(|w| w[0].1 > w[1].1) {
                return Err(EngineError::new(ERR_PUMP_CURVE));
            }
            let pump = self.network.pump_mut(pi);
            pump.ptype = PumpType::Custom;
            pump.q0 = pts[(n - 1) / 2].0 * qcf;
            pump.qmax = pts[n - 1].0 * qcf;
            pump.hmax = pts[0].1;
        }
        Ok(())
    }

    /// Stores power-function coefficients converted from API flow units.
    fn store_power_pump(&mut self, pi: usize, a: f64, b: f64, c: f64, q0: f64, qcf: f64) {
        let pump = self.network.pump_mut(pi);
        pump.ptype = PumpType::PowerFunc;
        pump.h0 = a;
        pump.r = b / qcf.powf(c);
        pump.n = c;
        pump.q0 = q0;
        pump.qmax = (-a / pump.r).powf(1.0 / c);
        pump.hmax = a;
    }

    /// Energy in kW and efficiency of a conducting link.
    fn link_energy(&self, k: usize) -> (f64, f64) {
        if self.hyd.flow.is_empty() || self.hyd.status[k].is_closed() {
            return (0.0, 0.0);
        }
        let link = self.network.link(k);
        let q = self.hyd.flow[k].abs();
        let dh = (self.hyd.head[link.n1] - self.hyd.head[link.n2]).abs();
        let e = if link.link_type == LinkType::Pump {
            let mut e = self.energy_options.epump;
            if let Some(pi) = self.network.find_pump(k) {
                let pump = self.network.pump(pi);
                if pump.ecurve > 0 {
                    e = self.network.curve(pump.ecurve).interpolate(q / self.qcf());
                }
            }
            e.clamp(1.0, 100.0) / 100.0
        } else {
            1.0
        };
        (dh * q * self.hyd_options.spgrav * GRAVITY / e, e)
    }

    /// Flow-weighted average quality within a link.
    fn link_quality(&self, k: usize) -> f64 {
        if self.qual.node_qual.is_empty() {
            return 0.0;
        }
        let (v, m) = self.qual.chains[k].totals(&self.qual.pool);
        if v > 0.0 {
            m / v
        } else {
            let link = self.network.link(k);
            (self.qual.node_qual[link.n1] + self.qual.node_qual[link.n2]) / 2.0
        }
    }

    fn pump_at(&self, k: usize) -> Result<&Pump> {
        let pi = self.pump_index_of(k)?;
        Ok(self.network.pump(pi))
    }

    fn pump_index_of(&self, k: usize) -> Result<usize> {
        self.network
            .find_pump(k)
            .ok_or(EngineError::new(ERR_ARGUMENT))
    }

    fn curve_index_from_value(&self, value: f64) -> Result<usize> {
        let ci = value.round();
        if ci < 0.0 || ci as usize > self.network.curves.len() {
            return Err(EngineError::new(ERR_UNDEF_CURVE));
        }
        Ok(ci as usize)
    }

    fn pattern_index_from_value_link(&self, value: f64) -> Result<usize> {
        let pat = value.round();
        if pat < 0.0 || pat as usize > self.network.patterns.len() {
            return Err(EngineError::new(ERR_UNDEF_PATTERN));
        }
        Ok(pat as usize)
    }

    pub(crate) fn link_index(&self, index: i32) -> Result<usize> {
        let k = index as usize;
        if index < 1 || k > self.network.nlinks() {
            return Err(EngineError::new(ERR_UNDEF_LINK));
        }
        Ok(k)
    }
}

/// Fits `h = a - b*q^c` through a shutoff head and two operating points.
fn power_curve(h0: f64, h1: f64, h2: f64, q1: f64, q2: f64) -> Result<(f64, f64, f64)> {
    const TINY: f64 = 1.0e-6;
    if h0 < TINY || h0 - h1 < TINY || h1 - h2 < TINY || q1 < TINY || q2 - q1 < TINY {
        return Err(EngineError::new(ERR_PUMP_CURVE));
    }
    let a = h0;
    let h4 = h0 - h1;
    let h5 = h0 - h2;
    let c = (h5 / h4).ln() / (q2 / q1).ln();
    if c <= 0.0 || c > 6.0 {
        return Err(EngineError::new(ERR_PUMP_CURVE));
    }
    let b = -h4 / q1.powf(c);
    Ok((a, b, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::test_utils::fixtures::*;
    use rstest::rstest;

    #[rstest]
    fn link_add_lookup_round_trip(mut ph: Project) {
        let index = ph.add_link("PX", LinkType::Pipe, "J1", "J2").unwrap();
        assert_eq!(ph.get_link_index("PX").unwrap(), index);
        assert_eq!(ph.get_link_id(index).unwrap(), "PX");
        assert_eq!(ph.get_link_type(index).unwrap(), LinkType::Pipe);
    }

    #[rstest]
    fn pipe_data_round_trips(mut ph: Project) {
        let p1 = ph.get_link_index("P1").unwrap();
        ph.set_pipe_data(p1, 800.0, 0.25, 120.0, 2.0).unwrap();
        assert_eq!(ph.get_link_value(p1, LinkProperty::Length).unwrap(), 800.0);
        assert_eq!(ph.get_link_value(p1, LinkProperty::Diameter).unwrap(), 0.25);
        assert_eq!(ph.get_link_value(p1, LinkProperty::Roughness).unwrap(), 120.0);
        assert!(approx_eq(
            ph.get_link_value(p1, LinkProperty::MinorLoss).unwrap(),
            2.0,
            1e-9
        ));
    }

    #[rstest]
    fn one_point_head_curve_becomes_power_function(mut ph: Project) {
        let pump = ph.add_link("PU9", LinkType::Pump, "J1", "J2").unwrap();
        let curve = ph.add_curve("HC9").unwrap();
        ph.set_curve(curve, &[(0.05, 30.0)]).unwrap();
        ph.set_link_value(pump, LinkProperty::PumpHCurve, curve as f64)
            .unwrap();
        assert_eq!(ph.get_pump_type(pump).unwrap(), PumpType::PowerFunc);
        // Shutoff head is a third above the design head.
        let pi = ph.network.find_pump(pump as usize).unwrap();
        assert!(approx_eq(ph.network.pump(pi).h0, 40.0, 1e-9));
    }

    #[rstest]
    fn rising_head_curve_is_rejected(mut ph: Project) {
        let pump = ph.add_link("PU9", LinkType::Pump, "J1", "J2").unwrap();
        let curve = ph.add_curve("HC9").unwrap();
        ph.set_curve(curve, &[(0.0, 10.0), (0.05, 20.0), (0.1, 5.0)])
            .unwrap();
        let err = ph
            .set_link_value(pump, LinkProperty::PumpHCurve, curve as f64)
            .unwrap_err();
        assert_eq!(err.code(), ERR_PUMP_CURVE);
    }

    #[rstest]
    fn constant_power_pump_parameters(mut ph: Project) {
        let pump = ph.add_link("PU9", LinkType::Pump, "J1", "J2").unwrap();
        ph.set_link_value(pump, LinkProperty::PumpPower, 10.0).unwrap();
        assert_eq!(ph.get_pump_type(pump).unwrap(), PumpType::ConstHp);
        assert_eq!(ph.get_link_value(pump, LinkProperty::PumpPower).unwrap(), 10.0);
    }
}
