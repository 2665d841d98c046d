mod ir;

pub use ir::{
    IR, IRProgram, LaneBuilder, LaneProgram, LaneType, lower_to_opcodes, optimize_hashcons, optimize_peephole,
    split_uniform_varying,
};

use crate::{DefaultSampler, LaneOpcode, LaneReg, SamplerSoa, SoaConfig, SoaTranslator, TranslateError};
use bumpalo::Bump;
use lanepair_core::Program;

/// a translated program, lowered into a uniform part run once per dispatch and a varying part run per lane group
#[derive(Debug, Clone)]
pub struct SoaShader {
    input_registers: u32,
    constant_registers: u32,

    uniform_opcodes: Vec<LaneOpcode>,
    uniform_outputs: Vec<LaneReg>,
    uniform_registers: usize,

    varying_opcodes: Vec<LaneOpcode>,
    varying_registers: usize,
    outputs: Vec<[Option<LaneReg>; 4]>,
    mask: LaneReg,
}

impl SoaShader {
    pub fn compile(arena: &Bump, program: &Program, config: &SoaConfig) -> Result<Self, TranslateError> {
        Self::compile_with_sampler(arena, program, config, &mut DefaultSampler)
    }

    /// `arena` only holds the intermediate graph, it can be reset once this returns
    #[tracing::instrument(skip_all)]
    pub fn compile_with_sampler(
        arena: &Bump,
        program: &Program,
        config: &SoaConfig,
        sampler: &mut dyn SamplerSoa,
    ) -> Result<Self, TranslateError> {
        let bld = LaneBuilder::new(arena, LaneType::F32);
        let mut translator = SoaTranslator::new(bld, config.clone(), sampler);
        translator.translate_program(program)?;

        // program roots: every written output channel followed by the final lane mask
        let mut roots = Vec::new();
        let mut outputs = Vec::with_capacity(translator.outputs().len());
        for channels in translator.outputs().iter().copied() {
            outputs.push(channels.map(|value| {
                value.map(|value| {
                    roots.push(value);
                    roots.len() - 1
                })
            }));
        }

        let mask_root = roots.len();
        roots.push(translator.mask());

        let program = IRProgram::new(arena, roots);
        let program = optimize_peephole(&program, arena);
        let program = optimize_hashcons(&program, arena);
        let (uniform, varying) = split_uniform_varying(&program, arena);

        let uniform = lower_to_opcodes(&uniform, arena, config.max_registers)?;
        let varying = lower_to_opcodes(&varying, arena, config.max_registers)?;

        let shader = Self {
            input_registers: translator.input_registers(),
            constant_registers: translator.constant_registers(),

            uniform_opcodes: uniform.opcodes.to_vec(),
            uniform_outputs: uniform.outputs.to_vec(),
            uniform_registers: uniform.registers,

            outputs: outputs
                .into_iter()
                .map(|channels| channels.map(|root| root.map(|root| varying.outputs[root])))
                .collect(),
            mask: varying.outputs[mask_root],
            varying_opcodes: varying.opcodes.to_vec(),
            varying_registers: varying.registers,
        };

        tracing::debug!(
            uniform_ops = shader.uniform_opcodes.len(),
            varying_ops = shader.varying_opcodes.len(),
            registers = shader.varying_registers,
            arena_kb = arena.allocated_bytes() / 1024,
            "compiled shader"
        );

        Ok(shader)
    }

    pub fn uniform_opcodes(&self) -> &[LaneOpcode] {
        &self.uniform_opcodes
    }

    pub fn varying_opcodes(&self) -> &[LaneOpcode] {
        &self.varying_opcodes
    }

    /// lane registers the uniform program writes its results to, in `Uniform(slot)` order
    pub fn uniform_outputs(&self) -> &[LaneReg] {
        &self.uniform_outputs
    }

    pub fn uniform_registers(&self) -> usize {
        self.uniform_registers
    }

    pub fn varying_registers(&self) -> usize {
        self.varying_registers
    }

    /// number of OUT registers the program wrote to
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// the lane register holding `OUT[index].channel`, `None` when the program never wrote it
    pub fn output_register(&self, index: usize, channel: usize) -> Option<LaneReg> {
        self.outputs.get(index).and_then(|channels| channels[channel & 3])
    }

    /// the lane register holding the final active-lane mask
    pub fn mask_register(&self) -> LaneReg {
        self.mask
    }

    /// IN registers every element has to supply
    pub fn input_registers(&self) -> u32 {
        self.input_registers
    }

    /// CONST registers the program reads
    pub fn constant_registers(&self) -> u32 {
        self.constant_registers
    }
}
