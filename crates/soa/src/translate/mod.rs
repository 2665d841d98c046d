mod mask;
mod sampler;

pub use mask::MaskContext;
pub use sampler::{DefaultSampler, SamplerSoa};

use crate::{IR, LaneBuilder, LaneType, LodMode, SoaConfig, TranslateError, Unsupported};
use lanepair_core::{
    Channel, CompareFunc, Declaration, DstRegister, Immediate, Instruction, Opcode, Program, ProgramError,
    RegisterFile, Saturate, SignMode, SwizzleSource, Token, WriteMask,
};

/// the four channel values of one register, `None` where never written
pub type Channels<'a> = [Option<IR<'a>>; 4];

/// translates a token stream into lane IR, one value per register channel
pub struct SoaTranslator<'a, 's> {
    bld: LaneBuilder<'a>,
    config: SoaConfig,
    sampler: &'s mut dyn SamplerSoa,

    temps: Vec<Channels<'a>>,
    outputs: Vec<Channels<'a>>,
    immediates: Vec<[IR<'a>; 4]>,
    inputs: Vec<Option<[IR<'a>; 4]>>,
    constant_registers: u32,

    mask: MaskContext<'a>,
}

impl<'a, 's> SoaTranslator<'a, 's> {
    pub fn new(bld: LaneBuilder<'a>, config: SoaConfig, sampler: &'s mut dyn SamplerSoa) -> Self {
        let bld = bld.with_type(LaneType::F32);
        Self {
            mask: MaskContext::new(&bld),
            bld,
            config,
            sampler,
            temps: Vec::new(),
            outputs: Vec::new(),
            immediates: Vec::new(),
            inputs: Vec::new(),
            constant_registers: 0,
        }
    }

    /// walks the token stream once, in order
    pub fn translate_program(&mut self, program: &Program) -> Result<(), TranslateError> {
        for token in program.tokens() {
            match token {
                Token::Declaration(decl) => self.declare(decl)?,
                Token::Immediate(imm) => self.push_immediate(imm)?,
                Token::Instruction(inst) => match self.translate_instruction(inst) {
                    Ok(()) => {}
                    Err(err) if self.config.best_effort && err.is_skippable() => {
                        tracing::warn!(opcode = inst.opcode.mnemonic(), "failed to translate instruction: {err}");
                    }
                    Err(err) => return Err(err),
                },
            }
        }

        Ok(())
    }

    pub fn declare(&mut self, decl: &Declaration) -> Result<(), TranslateError> {
        match decl.file {
            RegisterFile::Input => {
                for index in decl.range() {
                    check_capacity(RegisterFile::Input, index, self.config.max_inputs)?;
                    if self.inputs.len() <= index as usize {
                        self.inputs.resize(index as usize + 1, None);
                    }

                    let bld = self.bld;
                    self.inputs[index as usize] = Some([0, 1, 2, 3].map(|c| bld.input(index * 4 + c)));
                }
            }
            RegisterFile::Temporary => check_capacity(RegisterFile::Temporary, decl.last, self.config.max_temps)?,
            RegisterFile::Output => check_capacity(RegisterFile::Output, decl.last, self.config.max_outputs)?,
            _ => {}
        }

        Ok(())
    }

    /// fills the next immediate slot, components past the literal's size read as undefined
    pub fn push_immediate(&mut self, imm: &Immediate) -> Result<(), TranslateError> {
        let index = self.immediates.len() as u32;
        check_capacity(RegisterFile::Immediate, index, self.config.max_immediates)?;

        let bld = self.bld;
        let mut slot = [bld.undef(); 4];
        for (i, value) in imm.values.iter().take(imm.size.min(4)).enumerate() {
            slot[i] = bld.lit(*value);
        }

        self.immediates.push(slot);
        Ok(())
    }

    pub fn translate_instruction(&mut self, inst: &Instruction) -> Result<(), TranslateError> {
        inst.validate()?;

        let unsupported = |reason| TranslateError::Unsupported {
            opcode: inst.opcode,
            reason,
        };

        if inst.has_indirect_temporary() {
            return Err(unsupported(Unsupported::IndirectTemporary));
        }

        if inst.src.iter().any(|s| s.indirect) || inst.dst.is_some_and(|d| d.indirect) {
            return Err(unsupported(Unsupported::IndirectAddressing));
        }

        if inst.opcode.info().is_control_flow {
            return Err(unsupported(Unsupported::ControlFlow));
        }

        if let Some(dst) = &inst.dst {
            self.check_destination(inst.opcode, dst)?;
        }

        let mask = inst.dst.map(|d| d.write_mask).unwrap_or(WriteMask::NONE);
        let results = self.emit_instruction(inst, mask)?;
        self.note_constants(inst);

        // every source is fetched before the first store, a destination may alias a source
        for channel in mask.iter() {
            if let Some(value) = results[channel.index()] {
                self.store(inst, channel, value)?;
            }
        }

        tracing::trace!(instruction = %inst, "translated");
        Ok(())
    }

    /// the value of one channel of source operand `index`, after swizzle and sign mode
    pub fn fetch(&self, inst: &Instruction, index: usize, channel: Channel) -> Result<IR<'a>, TranslateError> {
        let src = inst.src.get(index).ok_or(ProgramError::SourceCount {
            opcode: inst.opcode,
            expected: inst.opcode.info().num_src,
            got: inst.src.len(),
        })?;

        let bld = &self.bld;
        let value = match src.swizzle.get(channel) {
            SwizzleSource::Zero => bld.zero(),
            SwizzleSource::One => bld.one(),
            source => {
                let swizzled = source.channel().map(Channel::index).unwrap_or_default();

                match src.file {
                    RegisterFile::Constant => bld.constant(src.index * 4 + swizzled as u32),

                    RegisterFile::Immediate => match self.immediates.get(src.index as usize) {
                        Some(imm) => imm[swizzled],
                        None => return Err(TranslateError::UndeclaredImmediate { index: src.index }),
                    },

                    RegisterFile::Input => match self.inputs.get(src.index as usize) {
                        Some(Some(input)) => input[swizzled],
                        _ => return Err(TranslateError::UndeclaredInput { index: src.index }),
                    },

                    RegisterFile::Temporary => {
                        check_capacity(RegisterFile::Temporary, src.index, self.config.max_temps)?;
                        match self.temps.get(src.index as usize).and_then(|t| t[swizzled]) {
                            Some(value) => value,
                            None => return Ok(bld.undef()),
                        }
                    }

                    file => {
                        return Err(TranslateError::InvalidSource {
                            opcode: inst.opcode,
                            file,
                        });
                    }
                }
            }
        };

        Ok(match src.sign[channel.index()] {
            SignMode::Keep => value,
            SignMode::Toggle => bld.neg(value),
            SignMode::Clear => bld.abs(value),
            SignMode::Set => bld.neg(bld.abs(value)),
        })
    }

    /// writes one destination channel, applying the instruction's saturate mode
    pub fn store(&mut self, inst: &Instruction, channel: Channel, value: IR<'a>) -> Result<(), TranslateError> {
        let Some(dst) = inst.dst else {
            return Err(ProgramError::MissingDestination { opcode: inst.opcode }.into());
        };

        let bld = self.bld;
        let value = match inst.saturate {
            Saturate::None => value,
            Saturate::ZeroOne => bld.clamp(value, bld.zero(), bld.one()),
            Saturate::MinusPlusOne => bld.clamp(value, bld.lit(-1.0), bld.one()),
        };

        let registers = match dst.file {
            RegisterFile::Output => &mut self.outputs,
            RegisterFile::Temporary => &mut self.temps,
            file => {
                return Err(TranslateError::InvalidDestination {
                    opcode: inst.opcode,
                    file,
                });
            }
        };

        if registers.len() <= dst.index as usize {
            registers.resize(dst.index as usize + 1, [None; 4]);
        }

        registers[dst.index as usize][channel.index()] = Some(value);
        Ok(())
    }

    fn check_destination(&mut self, opcode: Opcode, dst: &DstRegister) -> Result<(), TranslateError> {
        match dst.file {
            RegisterFile::Output => check_capacity(RegisterFile::Output, dst.index, self.config.max_outputs),
            RegisterFile::Temporary => check_capacity(RegisterFile::Temporary, dst.index, self.config.max_temps),
            file => Err(TranslateError::InvalidDestination { opcode, file }),
        }
    }

    fn emit_instruction(&mut self, inst: &Instruction, mask: WriteMask) -> Result<Channels<'a>, TranslateError> {
        use Opcode::*;

        let bld = self.bld;
        let x = |t: &Self, index| t.fetch(inst, index, Channel::X);

        Ok(match inst.opcode {
            Mov | Swz => self.each_channel(mask, |t, c| t.fetch(inst, 0, c))?,

            Lit => self.each_channel(mask, |t, c| {
                Ok(match c {
                    Channel::X | Channel::W => bld.one(),
                    Channel::Y => bld.max(x(t, 0)?, bld.zero()),
                    Channel::Z => {
                        let base = bld.max(t.fetch(inst, 0, Channel::Y)?, bld.zero());
                        let power = bld.pow(base, t.fetch(inst, 0, Channel::W)?);
                        let lit = bld.cmp(CompareFunc::Greater, x(t, 0)?, bld.zero());
                        bld.select(lit, power, bld.zero())
                    }
                })
            })?,

            Rcp => broadcast(mask, bld.rcp(x(self, 0)?)),
            Rsq => broadcast(mask, bld.rsqrt(bld.abs(x(self, 0)?))),
            Ex2 => broadcast(mask, bld.exp2(x(self, 0)?)),
            Lg2 => broadcast(mask, bld.log2(x(self, 0)?)),
            Cos => broadcast(mask, bld.cos(x(self, 0)?)),
            Sin => broadcast(mask, bld.sin(x(self, 0)?)),
            Pow => broadcast(mask, bld.pow(x(self, 0)?, x(self, 1)?)),

            Exp => {
                let (int_part, frac_part, exp) = match mask.intersects(WriteMask::XYZ) {
                    true => bld.exp2_approx(x(self, 0)?),
                    false => (bld.undef(), bld.undef(), bld.undef()),
                };
                pick(mask, [int_part, frac_part, exp, bld.one()])
            }

            Log => {
                let (abs, (exp, floor_log2, log2)) = match mask.intersects(WriteMask::XYZ) {
                    true => {
                        let abs = bld.abs(x(self, 0)?);
                        (abs, bld.log2_approx(abs))
                    }
                    false => (bld.undef(), (bld.undef(), bld.undef(), bld.undef())),
                };

                let mantissa = match mask.contains(Channel::Y) {
                    true => bld.div(abs, exp),
                    false => bld.undef(),
                };
                pick(mask, [floor_log2, mantissa, log2, bld.one()])
            }

            Mul => self.each_channel(mask, |t, c| Ok(bld.mul(t.fetch(inst, 0, c)?, t.fetch(inst, 1, c)?)))?,
            Add => self.each_channel(mask, |t, c| Ok(bld.add(t.fetch(inst, 0, c)?, t.fetch(inst, 1, c)?)))?,
            Sub => self.each_channel(mask, |t, c| Ok(bld.sub(t.fetch(inst, 0, c)?, t.fetch(inst, 1, c)?)))?,
            Min => self.each_channel(mask, |t, c| Ok(bld.min(t.fetch(inst, 0, c)?, t.fetch(inst, 1, c)?)))?,
            Max => self.each_channel(mask, |t, c| Ok(bld.max(t.fetch(inst, 0, c)?, t.fetch(inst, 1, c)?)))?,
            Abs => self.each_channel(mask, |t, c| Ok(bld.abs(t.fetch(inst, 0, c)?)))?,

            Mad => self.each_channel(mask, |t, c| {
                let product = bld.mul(t.fetch(inst, 0, c)?, t.fetch(inst, 1, c)?);
                Ok(bld.add(product, t.fetch(inst, 2, c)?))
            })?,

            Lrp => self.each_channel(mask, |t, c| {
                let (s0, s1, s2) = (t.fetch(inst, 0, c)?, t.fetch(inst, 1, c)?, t.fetch(inst, 2, c)?);
                Ok(bld.add(bld.mul(s0, bld.sub(s1, s2)), s2))
            })?,

            Dp2 => broadcast(mask, self.dot(inst, 2)?),
            Dp3 => broadcast(mask, self.dot(inst, 3)?),
            Dp4 => broadcast(mask, self.dot(inst, 4)?),
            Dp2a => broadcast(mask, bld.add(self.dot(inst, 2)?, self.fetch(inst, 2, Channel::X)?)),
            Dph => broadcast(mask, bld.add(self.dot(inst, 3)?, self.fetch(inst, 1, Channel::W)?)),

            Dst => self.each_channel(mask, |t, c| {
                Ok(match c {
                    Channel::X => bld.one(),
                    Channel::Y => bld.mul(t.fetch(inst, 0, c)?, t.fetch(inst, 1, c)?),
                    Channel::Z => t.fetch(inst, 0, c)?,
                    Channel::W => t.fetch(inst, 1, c)?,
                })
            })?,

            Slt => self.set_on_compare(inst, mask, CompareFunc::Less)?,
            Sge => self.set_on_compare(inst, mask, CompareFunc::GreaterEqual)?,
            Seq => self.set_on_compare(inst, mask, CompareFunc::Equal)?,
            Sgt => self.set_on_compare(inst, mask, CompareFunc::Greater)?,
            Sle => self.set_on_compare(inst, mask, CompareFunc::LessEqual)?,
            Sne => self.set_on_compare(inst, mask, CompareFunc::NotEqual)?,

            Cmp => self.each_channel(mask, |t, c| {
                let (s0, s1, s2) = (t.fetch(inst, 0, c)?, t.fetch(inst, 1, c)?, t.fetch(inst, 2, c)?);
                Ok(bld.select(bld.cmp(CompareFunc::Less, s0, bld.zero()), s1, s2))
            })?,

            Xpd => self.each_channel(mask, |t, c| {
                let a = |ch| t.fetch(inst, 0, ch);
                let b = |ch| t.fetch(inst, 1, ch);
                let (cx, cy, cz) = (Channel::X, Channel::Y, Channel::Z);

                Ok(match c {
                    Channel::X => bld.sub(bld.mul(a(cy)?, b(cz)?), bld.mul(a(cz)?, b(cy)?)),
                    Channel::Y => bld.sub(bld.mul(a(cz)?, b(cx)?), bld.mul(b(cz)?, a(cx)?)),
                    Channel::Z => bld.sub(bld.mul(a(cx)?, b(cy)?), bld.mul(a(cy)?, b(cx)?)),
                    Channel::W => bld.one(),
                })
            })?,

            Scs => self.each_channel(mask, |t, c| {
                Ok(match c {
                    Channel::X => bld.cos(x(t, 0)?),
                    Channel::Y => bld.sin(x(t, 0)?),
                    Channel::Z => bld.zero(),
                    Channel::W => bld.one(),
                })
            })?,

            Nrm => self.normalize(inst, mask, 3)?,
            Nrm4 => self.normalize(inst, mask, 4)?,

            Tex => self.emit_tex(inst, mask, LodMode::None, false)?,
            Txb => self.emit_tex(inst, mask, LodMode::Bias, false)?,
            Txl => self.emit_tex(inst, mask, LodMode::Explicit, false)?,
            Txp => self.emit_tex(inst, mask, LodMode::None, true)?,

            Kil => {
                self.emit_kil(inst)?;
                [None; 4]
            }

            End => [None; 4],

            _ => {
                return Err(TranslateError::Unsupported {
                    opcode: inst.opcode,
                    reason: Unsupported::NotImplemented,
                });
            }
        })
    }

    fn each_channel(
        &self,
        mask: WriteMask,
        mut f: impl FnMut(&Self, Channel) -> Result<IR<'a>, TranslateError>,
    ) -> Result<Channels<'a>, TranslateError> {
        let mut result = [None; 4];
        for channel in mask.iter() {
            result[channel.index()] = Some(f(self, channel)?);
        }
        Ok(result)
    }

    /// `sum(src0[c] * src1[c])` over the first `n` channels
    fn dot(&self, inst: &Instruction, n: usize) -> Result<IR<'a>, TranslateError> {
        let bld = self.bld;
        let mut sum = None;
        for channel in Channel::ALL.into_iter().take(n) {
            let product = bld.mul(self.fetch(inst, 0, channel)?, self.fetch(inst, 1, channel)?);
            sum = Some(match sum {
                Some(sum) => bld.add(sum, product),
                None => product,
            });
        }
        Ok(sum.unwrap_or(bld.zero()))
    }

    fn set_on_compare(
        &self,
        inst: &Instruction,
        mask: WriteMask,
        func: CompareFunc,
    ) -> Result<Channels<'a>, TranslateError> {
        let bld = self.bld;
        self.each_channel(mask, |t, c| {
            let holds = bld.cmp(func, t.fetch(inst, 0, c)?, t.fetch(inst, 1, c)?);
            Ok(bld.select(holds, bld.one(), bld.zero()))
        })
    }

    fn normalize(&self, inst: &Instruction, mask: WriteMask, dims: usize) -> Result<Channels<'a>, TranslateError> {
        let bld = self.bld;
        let mut result = [None; 4];

        if Channel::ALL.iter().take(dims).any(|c| mask.contains(*c)) {
            let mut src = [bld.undef(); 4];
            let mut sum = None;
            for channel in Channel::ALL.into_iter().take(dims) {
                let value = self.fetch(inst, 0, channel)?;
                let square = bld.mul(value, value);
                src[channel.index()] = value;
                sum = Some(match sum {
                    Some(sum) => bld.add(sum, square),
                    None => square,
                });
            }

            let scale = bld.rsqrt(sum.unwrap_or(bld.zero()));
            for channel in mask.iter().filter(|c| c.index() < dims) {
                result[channel.index()] = Some(bld.mul(src[channel.index()], scale));
            }
        }

        if dims == 3 && mask.contains(Channel::W) {
            result[3] = Some(bld.one());
        }

        Ok(result)
    }

    fn emit_tex(
        &mut self,
        inst: &Instruction,
        mask: WriteMask,
        mode: LodMode,
        projected: bool,
    ) -> Result<Channels<'a>, TranslateError> {
        let Some(texture) = inst.texture else {
            return Err(ProgramError::MissingTexture { opcode: inst.opcode }.into());
        };

        let bld = self.bld;
        let lod = match mode {
            LodMode::None => bld.zero(),
            LodMode::Bias | LodMode::Explicit => self.fetch(inst, 0, Channel::W)?,
        };

        let oow = match projected {
            true => Some(bld.rcp(self.fetch(inst, 0, Channel::W)?)),
            false => None,
        };

        let mut coords = [bld.undef(); 3];
        let num_coords = texture.target.num_coords().min(3);
        for (i, coord) in coords.iter_mut().enumerate().take(num_coords) {
            let value = self.fetch(inst, 0, Channel::ALL[i])?;
            *coord = match oow {
                Some(oow) => bld.mul(value, oow),
                None => value,
            };
        }

        let texel = self
            .sampler
            .emit_fetch_texel(&bld, texture.unit, &coords[..num_coords], mode, lod);

        Ok(pick(mask, texel))
    }

    /// clears the lanes where any tested source channel is below zero
    fn emit_kil(&mut self, inst: &Instruction) -> Result<(), TranslateError> {
        let bld = self.bld;
        let src = &inst.src[0];

        // one term per distinct source channel, forced 0 and 1 never kill
        let mut terms: [Option<IR<'a>>; 4] = [None; 4];
        for channel in Channel::ALL {
            if let Some(source) = src.swizzle.get(channel).channel() {
                if terms[source.index()].is_none() {
                    terms[source.index()] = Some(self.fetch(inst, 0, channel)?);
                }
            }
        }

        let mask = terms
            .into_iter()
            .flatten()
            .map(|term| bld.cmp(CompareFunc::GreaterEqual, term, bld.zero()))
            .reduce(|a, b| bld.and(a, b));

        if let Some(mask) = mask {
            self.mask.update(&bld, mask);
        }

        Ok(())
    }

    pub fn builder(&self) -> &LaneBuilder<'a> {
        &self.bld
    }

    pub fn outputs(&self) -> &[Channels<'a>] {
        &self.outputs
    }

    pub fn temp(&self, index: u32) -> Option<&Channels<'a>> {
        self.temps.get(index as usize)
    }

    /// the active lane mask after every translated KIL
    pub fn mask(&self) -> IR<'a> {
        self.mask.value()
    }

    /// one past the highest declared input register
    pub fn input_registers(&self) -> u32 {
        self.inputs.len() as u32
    }

    /// one past the highest constant register that was read
    pub fn constant_registers(&self) -> u32 {
        self.constant_registers
    }

    /// records constant reads, called once per translated instruction
    fn note_constants(&mut self, inst: &Instruction) {
        for src in inst.src.iter().filter(|s| s.file == RegisterFile::Constant) {
            self.constant_registers = self.constant_registers.max(src.index + 1);
        }
    }
}

fn check_capacity(file: RegisterFile, index: u32, limit: usize) -> Result<(), TranslateError> {
    match (index as usize) < limit {
        true => Ok(()),
        false => Err(TranslateError::CapacityExceeded { file, index, limit }),
    }
}

fn broadcast<'a>(mask: WriteMask, value: IR<'a>) -> Channels<'a> {
    pick(mask, [value; 4])
}

fn pick<'a>(mask: WriteMask, values: [IR<'a>; 4]) -> Channels<'a> {
    let mut result = [None; 4];
    for channel in mask.iter() {
        result[channel.index()] = Some(values[channel.index()]);
    }
    result
}
