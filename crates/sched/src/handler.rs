use crate::{PairInstruction, ScheduleError, TexInstruction};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// hardware temporaries of an r500 class fragment unit
pub const MAX_HW_TEMPS: u32 = 128;

pub const MAX_PROGRAM_TEMPS: u32 = 256;

pub const MAX_INPUTS: u32 = 32;

/// description of the paired-ALU target a program is scheduled for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairTarget {
    pub max_hw_temps: u32,
    /// OUTPUT register that holds the fragment color
    pub output_color: u32,
    /// OUTPUT register whose `w` channel holds the fragment depth
    pub output_depth: Option<u32>,
    pub max_program_temps: u32,
    pub max_inputs: u32,
}

impl Default for PairTarget {
    fn default() -> Self {
        Self {
            max_hw_temps: MAX_HW_TEMPS,
            output_color: 0,
            output_depth: Some(1),
            max_program_temps: MAX_PROGRAM_TEMPS,
            max_inputs: MAX_INPUTS,
        }
    }
}

/// receives the scheduled program, one unit at a time in emission order
pub trait PairHandler {
    fn target(&self) -> &PairTarget;

    /// assigns a hardware temporary to every used input through `alloc(input, hw_index)`
    ///
    /// inputs are handed out consecutively from hardware register 0 unless overridden
    fn allocate_hw_inputs(&mut self, inputs: &[u32], alloc: &mut dyn FnMut(u32, u32)) {
        for (hw_index, input) in inputs.iter().enumerate() {
            alloc(*input, hw_index as u32);
        }
    }

    fn emit_tex_block(&mut self, block: &[TexInstruction]) -> Result<(), ScheduleError>;

    fn emit_paired(&mut self, inst: &PairInstruction) -> Result<(), ScheduleError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledUnit {
    TexBlock(Vec<TexInstruction>),
    Alu(PairInstruction),
}

/// a [`PairHandler`] that records the scheduled program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairCodeBuffer {
    target: PairTarget,
    inputs: Vec<(u32, u32)>,
    units: Vec<ScheduledUnit>,
}

impl PairCodeBuffer {
    pub fn new(target: PairTarget) -> Self {
        Self {
            target,
            inputs: Vec::new(),
            units: Vec::new(),
        }
    }

    /// `(input, hw_index)` for every input the program reads
    pub fn inputs(&self) -> &[(u32, u32)] {
        &self.inputs
    }

    pub fn units(&self) -> &[ScheduledUnit] {
        &self.units
    }

    pub fn into_units(self) -> Vec<ScheduledUnit> {
        self.units
    }

    pub fn alu_count(&self) -> usize {
        self.alu().count()
    }

    pub fn tex_count(&self) -> usize {
        self.units
            .iter()
            .map(|unit| match unit {
                ScheduledUnit::TexBlock(block) => block.len(),
                ScheduledUnit::Alu(_) => 0,
            })
            .sum()
    }

    pub fn alu(&self) -> impl Iterator<Item = &PairInstruction> + '_ {
        self.units.iter().filter_map(|unit| match unit {
            ScheduledUnit::Alu(inst) => Some(inst),
            ScheduledUnit::TexBlock(_) => None,
        })
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
        self.units.clear();
    }
}

impl PairHandler for PairCodeBuffer {
    fn target(&self) -> &PairTarget {
        &self.target
    }

    fn allocate_hw_inputs(&mut self, inputs: &[u32], alloc: &mut dyn FnMut(u32, u32)) {
        for (hw_index, input) in inputs.iter().enumerate() {
            self.inputs.push((*input, hw_index as u32));
            alloc(*input, hw_index as u32);
        }
    }

    fn emit_tex_block(&mut self, block: &[TexInstruction]) -> Result<(), ScheduleError> {
        self.units.push(ScheduledUnit::TexBlock(block.to_vec()));
        Ok(())
    }

    fn emit_paired(&mut self, inst: &PairInstruction) -> Result<(), ScheduleError> {
        self.units.push(ScheduledUnit::Alu(*inst));
        Ok(())
    }
}

impl Display for PairCodeBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for unit in &self.units {
            match unit {
                ScheduledUnit::TexBlock(block) => {
                    writeln!(f, "BEGIN_TEX")?;
                    for inst in block {
                        writeln!(f, "  {inst}")?;
                    }
                    writeln!(f, "END_TEX")?;
                }
                ScheduledUnit::Alu(inst) => {
                    for line in inst.to_string().lines() {
                        writeln!(f, "  {line}")?;
                    }
                }
            }
        }
        writeln!(f, "END")
    }
}
