/// temporary registers a program may address
pub const MAX_TEMPS: usize = 256;

/// immediates a program may declare
pub const MAX_IMMEDIATES: usize = 256;

pub const MAX_OUTPUTS: usize = 32;

pub const MAX_INPUTS: usize = 32;

/// lane registers available to a lowered program
pub const REGISTER_COUNT: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoaConfig {
    pub max_temps: usize,
    pub max_immediates: usize,
    pub max_outputs: usize,
    pub max_inputs: usize,
    pub max_registers: usize,
    /// skip unsupported instructions with a warning instead of failing the program
    pub best_effort: bool,
}

impl Default for SoaConfig {
    fn default() -> Self {
        Self {
            max_temps: MAX_TEMPS,
            max_immediates: MAX_IMMEDIATES,
            max_outputs: MAX_OUTPUTS,
            max_inputs: MAX_INPUTS,
            max_registers: REGISTER_COUNT,
            best_effort: false,
        }
    }
}

impl SoaConfig {
    pub fn best_effort(mut self, best_effort: bool) -> Self {
        self.best_effort = best_effort;
        self
    }
}
