//! Time pattern API methods.

use crate::error::*;
use crate::Project;

/// ## Pattern APIs
impl Project {
    /// Adds a new, empty time pattern (one period with multiplier 1.0).
    /// Returns the 1-based index of the pattern.
    pub fn add_pattern(&mut self, id: &str) -> Result<i32> {
        self.network.add_pattern(id).map(|i| i as i32)
    }

    /// Gets the index of the pattern with the given ID.
    pub fn get_pattern_index(&self, id: &str) -> Result<i32> {
        self.network
            .find_pattern(id)
            .map(|i| i as i32)
            .ok_or(EngineError::new(ERR_UNDEF_PATTERN))
    }

    /// Gets a pattern ID given an index.
    pub fn get_pattern_id(&self, index: i32) -> Result<String> {
        let i = self.pattern_index(index)?;
        Ok(self.network.pattern(i).id.clone())
    }

    /// Number of periods in a pattern.
    pub fn get_pattern_length(&self, index: i32) -> Result<i32> {
        let i = self.pattern_index(index)?;
        Ok(self.network.pattern(i).factors.len() as i32)
    }

    /// Multiplier of a pattern for a given period (1-based).
    pub fn get_pattern_value(&self, index: i32, period: i32) -> Result<f64> {
        let i = self.pattern_index(index)?;
        let factors = &self.network.pattern(i).factors;
        let p = period as usize;
        if period < 1 || p > factors.len() {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        Ok(factors[p - 1])
    }

    /// Sets the multiplier of a pattern for a given period (1-based).
    pub fn set_pattern_value(&mut self, index: i32, period: i32, value: f64) -> Result<()> {
        let i = self.pattern_index(index)?;
        let factors = &mut self.network.patterns[i - 1].factors;
        let p = period as usize;
        if period < 1 || p > factors.len() {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        factors[p - 1] = value;
        Ok(())
    }

    /// Replaces all periods of a pattern.
    pub fn set_pattern(&mut self, index: i32, factors: &[f64]) -> Result<()> {
        let i = self.pattern_index(index)?;
        if factors.is_empty() {
            return Err(EngineError::new(ERR_ARGUMENT));
        }
        self.network.patterns[i - 1].factors = factors.to_vec();
        Ok(())
    }

    /// Average of all of a pattern's multipliers.
    pub fn get_average_pattern_value(&self, index: i32) -> Result<f64> {
        let i = self.pattern_index(index)?;
        let factors = &self.network.pattern(i).factors;
        Ok(factors.iter().sum::<f64>() / factors.len() as f64)
    }

    fn pattern_index(&self, index: i32) -> Result<usize> {
        let i = index as usize;
        if index < 1 || i > self.network.patterns.len() {
            return Err(EngineError::new(ERR_UNDEF_PATTERN));
        }
        Ok(i)
    }
}

#[cfg(test)]
mod tests {
    use crate::impls::test_utils::fixtures::*;
    use crate::Project;
    use rstest::rstest;

    #[rstest]
    fn pattern_round_trip(mut ph: Project) {
        let pat = ph.add_pattern("PAT9").unwrap();
        ph.set_pattern(pat, &[0.5, 1.5, 1.0]).unwrap();
        assert_eq!(ph.get_pattern_length(pat).unwrap(), 3);
        assert_eq!(ph.get_pattern_value(pat, 2).unwrap(), 1.5);
        assert_eq!(ph.get_average_pattern_value(pat).unwrap(), 1.0);
        assert_eq!(ph.get_pattern_index("PAT9").unwrap(), pat);
        assert_eq!(ph.get_pattern_id(pat).unwrap(), "PAT9");
    }

    #[rstest]
    fn out_of_range_period_is_rejected(mut ph: Project) {
        let pat = ph.add_pattern("PAT9").unwrap();
        assert!(ph.get_pattern_value(pat, 2).is_err());
        assert!(ph.set_pattern_value(pat, 0, 1.0).is_err());
    }
}
