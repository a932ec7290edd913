//! Data curve API methods.
//!
//! Curves with a flow dimension (pump head, efficiency, valve head loss)
//! keep their x-values in the project's flow units; volume curves use
//! metres and cubic metres.

use num_traits::FromPrimitive;

use crate::error::*;
use crate::types::CurveType;
use crate::Project;

/// ## Curve APIs
impl Project {
    /// Adds a new, empty data curve.
    /// Returns the 1-based index of the curve.
    pub fn add_curve(&mut self, id: &str) -> Result<i32> {
        self.network.add_curve(id).map(|i| i as i32)
    }

    /// Gets the index of the curve with the given ID.
    pub fn get_curve_index(&self, id: &str) -> Result<i32> {
        self.network
            .find_curve(id)
            .map(|i| i as i32)
            .ok_or(EngineError::new(ERR_UNDEF_CURVE))
    }

    /// Gets a curve ID given an index.
    pub fn get_curve_id(&self, index: i32) -> Result<String> {
        let i = self.curve_index(index)?;
        Ok(self.network.curve(i).id.clone())
    }

    /// Gets the role a curve plays, assigned when it is bound to a tank,
    /// pump or valve.
    pub fn get_curve_type(&self, index: i32) -> Result<CurveType> {
        let i = self.curve_index(index)?;
        Ok(self.network.curve(i).curve_type)
    }

    /// Explicitly assigns a curve's role.
    pub fn set_curve_type(&mut self, index: i32, curve_type: f64) -> Result<()> {
        let i = self.curve_index(index)?;
        let ct = CurveType::from_f64(curve_type).ok_or(EngineError::new(ERR_PARAM_CODE))?;
        self.network.curves[i - 1].curve_type = ct;
        Ok(())
    }

    /// Number of points on a curve.
    pub fn get_curve_length(&self, index: i32) -> Result<i32> {
        let i = self.curve_index(index)?;
        Ok(self.network.curve(i).points.len() as i32)
    }

    /// Gets one point of a curve (1-based).
    pub fn get_curve_value(&self, index: i32, point: i32) -> Result<(f64, f64)> {
        let i = self.curve_index(index)?;
        let points = &self.network.curve(i).points;
        let p = point as usize;
        if point < 1 || p > points.len() {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        Ok(points[p - 1])
    }

    /// Replaces all points of a curve. The x-values must be strictly
    /// increasing.
    pub fn set_curve(&mut self, index: i32, points: &[(f64, f64)]) -> Result<()> {
        let i = self.curve_index(index)?;
        if points.is_empty() {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        if !points.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err(EngineError::new(ERR_CURVE_SEQUENCE));
        }
        self.network.curves[i - 1].points = points.to_vec();
        Ok(())
    }

    fn curve_index(&self, index: i32) -> Result<usize> {
        let i = index as usize;
        if index < 1 || i > self.network.curves.len() {
            return Err(EngineError::new(ERR_UNDEF_CURVE));
        }
        Ok(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::test_utils::fixtures::*;
    use crate::Project;
    use rstest::rstest;

    #[rstest]
    fn curve_round_trip(mut ph: Project) {
        let curve = ph.add_curve("C9").unwrap();
        ph.set_curve(curve, &[(0.0, 30.0), (10.0, 20.0)]).unwrap();
        assert_eq!(ph.get_curve_length(curve).unwrap(), 2);
        assert_eq!(ph.get_curve_value(curve, 2).unwrap(), (10.0, 20.0));
        assert_eq!(ph.get_curve_index("C9").unwrap(), curve);
    }

    #[rstest]
    fn nonincreasing_x_is_rejected(mut ph: Project) {
        let curve = ph.add_curve("C9").unwrap();
        let err = ph.set_curve(curve, &[(1.0, 1.0), (1.0, 2.0)]).unwrap_err();
        assert_eq!(err.code(), ERR_CURVE_SEQUENCE);
    }

    #[rstest]
    fn curve_type_defaults_to_generic(mut ph: Project) {
        let curve = ph.add_curve("C9").unwrap();
        assert_eq!(ph.get_curve_type(curve).unwrap(), CurveType::GenericCurve);
    }
}
