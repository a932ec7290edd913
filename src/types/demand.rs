use num_derive::FromPrimitive;

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum DemandModel {
    Dda = 0, // Demand driven analysis
    Pda = 1, // Pressure driven analysis
}

/// One demand category at a junction.
#[derive(Debug, Clone)]
pub struct Demand {
    /// Baseline demand (m^3/s).
    pub base: f64,
    /// Time pattern index (0 = default pattern).
    pub pattern: usize,
    /// Category name.
    pub name: String,
}

impl Demand {
    pub fn new(base: f64, pattern: usize) -> Self {
        Demand {
            base,
            pattern,
            name: String::new(),
        }
    }
}
