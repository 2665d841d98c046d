use crate::{
    AlphaArg, Classification, HalfOpcode, PairHandler, PairInstruction, PairSource, PairTarget, ReadyList, RgbArg,
    ScheduleError, TexInstruction, TexOpcode, canonicalize, classify,
};
use lanepair_core::{
    Channel, DstRegister, Instruction, Opcode, Program, RegisterFile, Saturate, SignMode, SrcRegister, SwizzleSource,
    WriteMask,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ValueId(usize);

/// one write of one channel of a temporary or output
#[derive(Debug)]
struct Value {
    writer: usize,
    /// the value that overwrites this one next
    next: Option<ValueId>,
    readers: Vec<usize>,
    pending_readers: u32,
}

#[derive(Debug)]
struct PairInst {
    inst: Instruction,
    class: Classification,
    dependencies: u32,
    values: [Option<ValueId>; 4],
    reads: Vec<ValueId>,
    scheduled: bool,
}

/// maps a program register to its hardware temporary
#[derive(Debug, Clone, Default)]
struct Translation {
    hw_index: Option<u32>,
    /// number of operands naming this register
    ref_count: u32,
}

#[derive(Debug, Default)]
struct ReadyLists {
    tex: Vec<usize>,
    rgb: Vec<usize>,
    alpha: Vec<usize>,
    full: Vec<usize>,
}

impl ReadyLists {
    fn has_alu(&self) -> bool {
        !(self.full.is_empty() && self.rgb.is_empty() && self.alpha.is_empty())
    }

    fn is_empty(&self) -> bool {
        self.tex.is_empty() && !self.has_alu()
    }
}

/// schedules `program` onto a paired RGB/Alpha ALU and hands every unit to `handler`
///
/// instructions are emitted in a dependency-respecting order, not in program order: ready texture
/// instructions are flushed as one block, independent rgb-only and alpha-only instructions share one
/// ALU instruction where their sources fit. program registers are mapped to hardware temporaries,
/// which are recycled as soon as every operand naming a register has been emitted
#[tracing::instrument(skip_all)]
pub fn pair_program<H: PairHandler + ?Sized>(program: &Program, handler: &mut H) -> Result<(), ScheduleError> {
    let target = handler.target().clone();
    let mut state = PairState::new(handler, target);

    state.scan(program)?;
    state.allocate_inputs()?;

    while !state.ready.is_empty() {
        if !state.ready.tex.is_empty() {
            state.emit_all_tex()?;
        }

        while state.ready.has_alu() {
            state.emit_alu()?;
        }
    }

    if let Some(ip) = state.insts.iter().position(|inst| !inst.scheduled) {
        return Err(ScheduleError::Internal(format!("instruction {ip} never became ready")));
    }

    tracing::debug!(instructions = state.insts.len(), "scheduled program");
    Ok(())
}

struct PairState<'h, H: ?Sized> {
    handler: &'h mut H,
    target: PairTarget,

    insts: Vec<PairInst>,
    values: Vec<Value>,
    temps: Vec<Translation>,
    inputs: Vec<Translation>,
    hw_temps: Vec<u32>,
    ready: ReadyLists,
}

impl<'h, H: PairHandler + ?Sized> PairState<'h, H> {
    fn new(handler: &'h mut H, target: PairTarget) -> Self {
        Self {
            handler,
            hw_temps: vec![0; target.max_hw_temps as usize],
            target,

            insts: Vec::new(),
            values: Vec::new(),
            temps: Vec::new(),
            inputs: Vec::new(),
            ready: ReadyLists::default(),
        }
    }

    /// counts register references and links every instruction to the values it depends on
    fn scan(&mut self, program: &Program) -> Result<(), ScheduleError> {
        self.temps = vec![Translation::default(); program.register_count(RegisterFile::Temporary) as usize];
        self.inputs = vec![Translation::default(); program.register_count(RegisterFile::Input) as usize];

        // the live value of every temporary and output channel, in program order
        let mut current = vec![[None::<ValueId>; 4]; self.temps.len()];
        let mut output_writes =
            vec![[None::<ValueId>; 4]; program.register_count(RegisterFile::Output) as usize];

        for (ip, inst) in program.instructions().enumerate() {
            if inst.opcode == Opcode::End {
                break;
            }

            inst.validate()?;
            let inst = canonicalize(inst);
            let class = classify(&inst)?;
            self.check_operands(&inst, class)?;

            let mut pair = PairInst {
                inst,
                class,
                dependencies: 0,
                values: [None; 4],
                reads: Vec::new(),
                scheduled: false,
            };

            let dst = pair.inst.dst;
            // the destination dependency below already orders an instruction that rewrites what it reads
            let rewrites = |src: &SrcRegister, channel: Channel| {
                dst.is_some_and(|dst| {
                    dst.file == RegisterFile::Temporary && dst.index == src.index && dst.write_mask.contains(channel)
                })
            };

            for src in &pair.inst.src {
                let Some(t) = self.translation_mut(src.file, src.index) else {
                    continue;
                };
                t.ref_count += 1;

                if src.file != RegisterFile::Temporary {
                    continue;
                }

                for channel in Channel::ALL {
                    let Some(read) = src.source_channel(channel) else {
                        continue;
                    };
                    // reading a channel nothing wrote yet
                    let Some(value) = current[src.index as usize][read.index()] else {
                        continue;
                    };
                    if rewrites(src, read) {
                        continue;
                    }

                    pair.dependencies += 1;
                    pair.reads.push(value);
                    let value = &mut self.values[value.0];
                    value.pending_readers += 1;
                    value.readers.push(ip);
                }
            }

            if let Some(dst) = dst {
                if let Some(t) = self.translation_mut(dst.file, dst.index) {
                    t.ref_count += 1;
                }

                // outputs are never read, their chains only order writes of the same channel
                let chain = match dst.file {
                    RegisterFile::Temporary => current.get_mut(dst.index as usize),
                    RegisterFile::Output => output_writes.get_mut(dst.index as usize),
                    _ => None,
                };

                if let Some(chain) = chain {
                    for channel in dst.write_mask.iter() {
                        let id = ValueId(self.values.len());
                        self.values.push(Value {
                            writer: ip,
                            next: None,
                            readers: Vec::new(),
                            pending_readers: 0,
                        });

                        if let Some(prev) = chain[channel.index()].replace(id) {
                            pair.dependencies += 1;
                            self.values[prev.0].next = Some(id);
                        }
                        pair.values[channel.index()] = Some(id);
                    }
                }
            }

            tracing::trace!(ip, dependencies = pair.dependencies, "scan {}", pair.inst);

            let ready = pair.dependencies == 0;
            self.insts.push(pair);
            if ready {
                self.instruction_ready(ip);
            }
        }

        Ok(())
    }

    fn check_operands(&self, inst: &Instruction, class: Classification) -> Result<(), ScheduleError> {
        let opcode = inst.opcode;

        if inst.src.iter().any(|src| src.indirect) || inst.dst.is_some_and(|dst| dst.indirect) {
            return Err(ScheduleError::IndirectOperand { opcode });
        }

        for src in &inst.src {
            self.check_capacity(src.file, src.index)?;
        }
        if let Some(dst) = &inst.dst {
            self.check_capacity(dst.file, dst.index)?;
        }

        if class.tex {
            let src = &inst.src[0];
            if !matches!(src.file, RegisterFile::Temporary | RegisterFile::Input) {
                return Err(ScheduleError::UnsupportedOperand { opcode, file: src.file });
            }
            if src.sign.iter().any(|sign| *sign != SignMode::Keep) {
                return Err(ScheduleError::UnsupportedModifier { opcode });
            }
            match inst.dst {
                Some(dst) if dst.file != RegisterFile::Temporary => {
                    return Err(ScheduleError::UnsupportedOperand { opcode, file: dst.file });
                }
                _ => {}
            }
            return Ok(());
        }

        if inst.saturate == Saturate::MinusPlusOne {
            return Err(ScheduleError::UnsupportedModifier { opcode });
        }

        for src in &inst.src {
            match src.file {
                RegisterFile::Temporary | RegisterFile::Input | RegisterFile::Constant => {}
                RegisterFile::Null if src.swizzle.0.iter().all(|s| s.is_forced()) => {}
                file => return Err(ScheduleError::UnsupportedOperand { opcode, file }),
            }

            // the rgb half carries one abs and one negate flag per argument
            if src.sign[1] != src.sign[0] || src.sign[2] != src.sign[0] {
                return Err(ScheduleError::UnsupportedModifier { opcode });
            }
        }

        match inst.dst {
            Some(DstRegister {
                file: RegisterFile::Temporary,
                ..
            }) => Ok(()),
            Some(DstRegister {
                file: RegisterFile::Output,
                index,
                ..
            }) => {
                if index == self.target.output_color || Some(index) == self.target.output_depth {
                    Ok(())
                } else {
                    Err(ScheduleError::UnknownOutput { index })
                }
            }
            Some(dst) => Err(ScheduleError::UnsupportedOperand { opcode, file: dst.file }),
            None => Err(ScheduleError::Internal(format!("{opcode} has no destination"))),
        }
    }

    fn check_capacity(&self, file: RegisterFile, index: u32) -> Result<(), ScheduleError> {
        let limit = match file {
            RegisterFile::Temporary => self.target.max_program_temps,
            RegisterFile::Input => self.target.max_inputs,
            _ => return Ok(()),
        };

        match index < limit {
            true => Ok(()),
            false => Err(ScheduleError::CapacityExceeded { file, index, limit }),
        }
    }

    fn translation(&self, file: RegisterFile, index: u32) -> Option<&Translation> {
        match file {
            RegisterFile::Temporary => self.temps.get(index as usize),
            RegisterFile::Input => self.inputs.get(index as usize),
            _ => None,
        }
    }

    fn translation_mut(&mut self, file: RegisterFile, index: u32) -> Option<&mut Translation> {
        match file {
            RegisterFile::Temporary => self.temps.get_mut(index as usize),
            RegisterFile::Input => self.inputs.get_mut(index as usize),
            _ => None,
        }
    }

    fn allocate_inputs(&mut self) -> Result<(), ScheduleError> {
        let used = self
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, t)| t.ref_count > 0)
            .map(|(index, _)| index as u32)
            .collect::<Vec<_>>();

        let mut assigned = Vec::with_capacity(used.len());
        self.handler
            .allocate_hw_inputs(&used, &mut |input, hw_index| assigned.push((input, hw_index)));

        for (input, hw_index) in assigned {
            self.alloc_hw_reg(RegisterFile::Input, input, hw_index)?;
        }

        Ok(())
    }

    fn alloc_hw_reg(&mut self, file: RegisterFile, index: u32, hw_index: u32) -> Result<(), ScheduleError> {
        let limit = self.target.max_hw_temps;
        let t = self
            .translation(file, index)
            .ok_or_else(|| ScheduleError::Internal(format!("{file}[{index}] has no hardware register")))?;

        if t.hw_index.is_some() {
            return Err(ScheduleError::Internal(format!("{file}[{index}] is already allocated")));
        }
        let ref_count = t.ref_count;

        match self.hw_temps.get_mut(hw_index as usize) {
            None => return Err(ScheduleError::OutOfHwTemps { limit }),
            Some(count) if *count != 0 => {
                return Err(ScheduleError::Internal(format!("hardware register {hw_index} is in use")));
            }
            Some(count) => *count = ref_count,
        }

        if let Some(t) = self.translation_mut(file, index) {
            t.hw_index = Some(hw_index);
        }

        tracing::trace!(%file, index, hw_index, ref_count, "allocated hardware register");
        Ok(())
    }

    /// the hardware temporary of a register, allocated first-fit on first use
    fn hw_reg(&mut self, file: RegisterFile, index: u32) -> Result<u32, ScheduleError> {
        let t = self
            .translation(file, index)
            .ok_or_else(|| ScheduleError::Internal(format!("{file}[{index}] has no hardware register")))?;

        if let Some(hw_index) = t.hw_index {
            return Ok(hw_index);
        }

        let hw_index = self
            .hw_temps
            .iter()
            .position(|count| *count == 0)
            .ok_or(ScheduleError::OutOfHwTemps {
                limit: self.target.max_hw_temps,
            })? as u32;

        self.alloc_hw_reg(file, index, hw_index)?;
        Ok(hw_index)
    }

    fn deref_hw_reg(&mut self, hw_index: u32) -> Result<(), ScheduleError> {
        let count = self
            .hw_temps
            .get_mut(hw_index as usize)
            .filter(|count| **count > 0)
            .ok_or_else(|| ScheduleError::Internal(format!("hardware register {hw_index} reference count underflow")))?;

        *count -= 1;
        Ok(())
    }

    fn instruction_ready(&mut self, ip: usize) {
        let list = self.insts[ip].class.ready_list();
        tracing::trace!(ip, ?list, "ready");

        match list {
            ReadyList::Tex => self.ready.tex.push(ip),
            ReadyList::Rgb => self.ready.rgb.push(ip),
            ReadyList::Alpha => self.ready.alpha.push(ip),
            ReadyList::Full => self.ready.full.push(ip),
        }
    }

    fn decrement_dependencies(&mut self, ip: usize) -> Result<(), ScheduleError> {
        let inst = &mut self.insts[ip];
        inst.dependencies = inst
            .dependencies
            .checked_sub(1)
            .ok_or_else(|| ScheduleError::Internal(format!("instruction {ip} dependency count underflow")))?;

        if inst.dependencies == 0 {
            self.instruction_ready(ip);
        }
        Ok(())
    }

    /// marks an instruction as emitted: releases its registers and wakes up whatever waited on it
    fn commit(&mut self, ip: usize) -> Result<(), ScheduleError> {
        tracing::trace!(ip, "commit");

        let inst = &mut self.insts[ip];
        if inst.scheduled {
            return Err(ScheduleError::Internal(format!("instruction {ip} committed twice")));
        }
        inst.scheduled = true;

        let dst = inst.inst.dst;
        let sources = inst.inst.src.iter().map(|src| (src.file, src.index)).collect::<Vec<_>>();
        let written = inst.values;
        let reads = std::mem::take(&mut inst.reads);

        if let Some(dst) = dst.filter(|dst| dst.file == RegisterFile::Temporary) {
            let hw_index = self.hw_reg(dst.file, dst.index)?;
            self.deref_hw_reg(hw_index)?;
        }

        for id in written.into_iter().flatten() {
            let value = &self.values[id.0];
            if value.pending_readers > 0 {
                for reader in value.readers.clone() {
                    self.decrement_dependencies(reader)?;
                }
            } else if let Some(next) = value.next {
                // nobody reads this value, the next write of the channel may go ahead
                self.decrement_dependencies(self.values[next.0].writer)?;
            }
        }

        for (file, index) in sources {
            if self.translation(file, index).is_none() {
                continue;
            }
            let hw_index = self.hw_reg(file, index)?;
            self.deref_hw_reg(hw_index)?;
        }

        for id in reads {
            let value = &mut self.values[id.0];
            value.pending_readers = value
                .pending_readers
                .checked_sub(1)
                .ok_or_else(|| ScheduleError::Internal(format!("value {} reader count underflow", id.0)))?;

            if value.pending_readers == 0 {
                if let Some(next) = value.next {
                    self.decrement_dependencies(self.values[next.0].writer)?;
                }
            }
        }

        Ok(())
    }

    /// emits every ready texture instruction as one block
    ///
    /// all destinations are allocated before the first commit, so no result lands in a register
    /// another instruction of the block still samples from
    fn emit_all_tex(&mut self) -> Result<(), ScheduleError> {
        let mut block = std::mem::take(&mut self.ready.tex);
        block.reverse();

        for &ip in &block {
            if let Some(dst) = self.insts[ip].inst.dst {
                self.hw_reg(dst.file, dst.index)?;
            }
        }

        let mut emitted = Vec::with_capacity(block.len());
        for ip in block {
            self.commit(ip)?;

            let inst = &self.insts[ip].inst;
            let (opcode, dst, src, texture) = (inst.opcode, inst.dst, inst.src[0], inst.texture);
            let opcode = TexOpcode::from_opcode(opcode).ok_or(ScheduleError::UnsupportedOpcode { opcode })?;

            let (dest_index, write_mask) = match dst {
                Some(dst) => (self.hw_reg(dst.file, dst.index)?, dst.write_mask),
                None => (0, WriteMask::NONE),
            };

            emitted.push(TexInstruction {
                opcode,
                dest_index,
                write_mask,
                texture,
                src_index: self.hw_reg(src.file, src.index)?,
                src_swizzle: src.swizzle,
            });
        }

        tracing::debug!(instructions = emitted.len(), "tex block");
        self.handler.emit_tex_block(&emitted)
    }

    /// emits one ALU instruction, pairing an rgb-only with an alpha-only instruction when possible
    ///
    /// instructions that need both halves go first, so that more candidates are around for
    /// pairing once none are left
    fn emit_alu(&mut self) -> Result<(), ScheduleError> {
        let ready = &mut self.ready;
        let pair = if !ready.full.is_empty() || ready.rgb.is_empty() || ready.alpha.is_empty() {
            let ip = ready
                .full
                .pop()
                .or_else(|| ready.rgb.pop())
                .or_else(|| ready.alpha.pop())
                .ok_or_else(|| ScheduleError::Internal("no ready ALU instruction".into()))?;
            self.emit_single(ip)?
        } else {
            match self.try_pairing()? {
                Some(pair) => pair,
                None => {
                    let ip = self
                        .ready
                        .rgb
                        .pop()
                        .ok_or_else(|| ScheduleError::Internal("no ready rgb instruction".into()))?;
                    self.emit_single(ip)?
                }
            }
        };

        tracing::debug!(rgb = %pair.rgb.opcode, alpha = %pair.alpha.opcode, "alu\n{pair}");
        self.handler.emit_paired(&pair)
    }

    fn emit_single(&mut self, ip: usize) -> Result<PairInstruction, ScheduleError> {
        let mut pair = PairInstruction::default();
        if !self.fill_instruction(&mut pair, ip)? {
            return Err(ScheduleError::SourceSlots { ip });
        }

        self.fill_dest(&mut pair, ip)?;
        self.commit(ip)?;
        Ok(pair)
    }

    /// tries every ready rgb/alpha combination, a pairing fails when the sources need more slots than there are
    fn try_pairing(&mut self) -> Result<Option<PairInstruction>, ScheduleError> {
        for r in (0..self.ready.rgb.len()).rev() {
            for a in (0..self.ready.alpha.len()).rev() {
                let (rgb, alpha) = (self.ready.rgb[r], self.ready.alpha[a]);

                let mut pair = PairInstruction::default();
                if !self.fill_instruction(&mut pair, rgb)? || !self.fill_instruction(&mut pair, alpha)? {
                    continue;
                }

                self.ready.rgb.remove(r);
                self.ready.alpha.remove(a);

                self.fill_dest(&mut pair, rgb)?;
                self.fill_dest(&mut pair, alpha)?;
                self.commit(rgb)?;
                self.commit(alpha)?;

                tracing::trace!(rgb, alpha, "paired");
                return Ok(Some(pair));
            }
        }

        Ok(None)
    }

    /// fills opcodes and arguments of an instruction into `pair`, false when its sources do not fit
    fn fill_instruction(&mut self, pair: &mut PairInstruction, ip: usize) -> Result<bool, ScheduleError> {
        let PairInst { inst, class, .. } = &self.insts[ip];
        let (opcode, saturate, class) = (inst.opcode, inst.saturate == Saturate::ZeroOne, *class);
        let mut args = inst.src.clone();

        if (class.need_rgb && pair.rgb.opcode != HalfOpcode::Nop)
            || (class.need_alpha && pair.alpha.opcode != HalfOpcode::Nop)
        {
            return Err(ScheduleError::Internal(format!("instruction {ip} filled into a busy half")));
        }

        if class.need_rgb {
            pair.rgb.opcode = match class.transcendent {
                true => HalfOpcode::ReplicateAlpha,
                false => HalfOpcode::Alu(opcode),
            };
            pair.rgb.saturate = saturate;
        }
        if class.need_alpha {
            pair.alpha.opcode = HalfOpcode::Alu(opcode);
            pair.alpha.saturate = saturate;
        }

        // derivatives occupy source slot 0 and pass their operand twice
        if matches!(opcode, Opcode::Ddx | Opcode::Ddy) {
            if pair.rgb.src[0].used || pair.alpha.src[0].used {
                return Ok(false);
            }
            args.push(args[0]);
        }

        for (i, src) in args.iter().enumerate() {
            if class.need_rgb && !class.transcendent {
                let swizzle = [Channel::X, Channel::Y, Channel::Z].map(|c| src.swizzle.get(c));
                let rgb = swizzle.iter().any(|s| matches!(s, SwizzleSource::X | SwizzleSource::Y | SwizzleSource::Z));
                let alpha = swizzle.contains(&SwizzleSource::W);

                let Some(source) = self.alloc_pair_source(pair, src, rgb, alpha)? else {
                    return Ok(false);
                };

                pair.rgb.args[i] = RgbArg {
                    source,
                    swizzle,
                    abs: src.sign[0].is_abs(),
                    negate: src.sign[0].is_negate(),
                };
            }

            if class.need_alpha {
                let channel = if class.transcendent { Channel::X } else { Channel::W };
                let swizzle = src.swizzle.get(channel);
                let (rgb, alpha) = match swizzle {
                    SwizzleSource::X | SwizzleSource::Y | SwizzleSource::Z => (true, false),
                    SwizzleSource::W => (false, true),
                    SwizzleSource::Zero | SwizzleSource::One => (false, false),
                };

                let Some(source) = self.alloc_pair_source(pair, src, rgb, alpha)? else {
                    return Ok(false);
                };

                pair.alpha.args[i] = AlphaArg {
                    source,
                    swizzle,
                    abs: src.sign_of(channel).is_abs(),
                    negate: src.sign_of(channel).is_negate(),
                };
            }
        }

        Ok(true)
    }

    /// finds a source slot for `src` on the requested halves, preferring a slot that already holds it
    fn alloc_pair_source(
        &mut self,
        pair: &mut PairInstruction,
        src: &SrcRegister,
        rgb: bool,
        alpha: bool,
    ) -> Result<Option<usize>, ScheduleError> {
        if !rgb && !alpha {
            return Ok(Some(0));
        }

        let wanted = match src.file {
            RegisterFile::Temporary | RegisterFile::Input => PairSource {
                used: true,
                constant: false,
                index: self.hw_reg(src.file, src.index)?,
            },
            _ => PairSource {
                used: true,
                constant: true,
                index: src.index,
            },
        };

        let mut candidate: Option<(usize, u32)> = None;
        for slot in 0..3 {
            let mut quality = 0;
            let halves = [(rgb, &pair.rgb.src[slot]), (alpha, &pair.alpha.src[slot])];

            let mut usable = true;
            for (wanted_here, held) in halves {
                if !wanted_here || !held.used {
                    continue;
                }
                if *held != wanted {
                    usable = false;
                    break;
                }
                quality += 1;
            }

            if usable && candidate.is_none_or(|(_, best)| quality > best) {
                candidate = Some((slot, quality));
            }
        }

        let Some((slot, _)) = candidate else {
            return Ok(None);
        };

        if rgb {
            pair.rgb.src[slot] = wanted;
        }
        if alpha {
            pair.alpha.src[slot] = wanted;
        }
        Ok(Some(slot))
    }

    /// fills the destination of an instruction, kept apart from the sources so that hardware temporaries are
    /// only allocated for a pairing that is actually emitted
    fn fill_dest(&mut self, pair: &mut PairInstruction, ip: usize) -> Result<(), ScheduleError> {
        let (dst, class) = (self.insts[ip].inst.dst, self.insts[ip].class);
        let Some(dst) = dst else {
            return Ok(());
        };

        if dst.file == RegisterFile::Output {
            if dst.index == self.target.output_color {
                pair.rgb.output_write_mask = pair
                    .rgb
                    .output_write_mask
                    .union(dst.write_mask.intersection(WriteMask::XYZ));
                pair.alpha.output_write |= dst.write_mask.contains(Channel::W);
            } else if Some(dst.index) == self.target.output_depth {
                pair.alpha.depth_write |= dst.write_mask.contains(Channel::W);
            }
            return Ok(());
        }

        let hw_index = self.hw_reg(dst.file, dst.index)?;
        if class.need_rgb {
            pair.rgb.dest_index = hw_index;
            pair.rgb.write_mask = pair.rgb.write_mask.union(dst.write_mask.intersection(WriteMask::XYZ));
        }
        if class.need_alpha {
            pair.alpha.dest_index = hw_index;
            pair.alpha.write |= dst.write_mask.contains(Channel::W);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PairCodeBuffer, ScheduledUnit};
    use lanepair_core::{Swizzle, TextureTarget};

    fn schedule(program: &Program, target: PairTarget) -> Result<PairCodeBuffer, ScheduleError> {
        let mut buffer = PairCodeBuffer::new(target);
        pair_program(program, &mut buffer)?;
        Ok(buffer)
    }

    fn swz(s: &str) -> Swizzle {
        s.parse().unwrap()
    }

    fn mask(s: &str) -> WriteMask {
        s.parse().unwrap()
    }

    #[test]
    fn test_pairs_independent_halves() {
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=1)
            .op(
                Opcode::Add,
                DstRegister::temp(0).mask(WriteMask::XYZ),
                [SrcRegister::input(0), SrcRegister::input(1)],
            )
            .op(
                Opcode::Mul,
                DstRegister::temp(1).mask(WriteMask::W),
                [SrcRegister::input(0), SrcRegister::input(1)],
            )
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        assert_eq!(buffer.inputs(), &[(0, 0), (1, 1)]);
        assert_eq!(buffer.units().len(), 1);

        let ScheduledUnit::Alu(pair) = &buffer.units()[0] else {
            panic!("expected an ALU instruction");
        };

        assert_eq!(pair.rgb.opcode, HalfOpcode::Alu(Opcode::Mad));
        assert_eq!(pair.alpha.opcode, HalfOpcode::Alu(Opcode::Mad));
        assert_eq!((pair.rgb.dest_index, pair.rgb.write_mask), (2, WriteMask::XYZ));
        assert_eq!((pair.alpha.dest_index, pair.alpha.write), (3, true));
        assert_eq!(
            pair.to_string(),
            "RGB: Src0 = TEMP[0] Src1 = TEMP[1]\n\
             Alpha: Src0 = TEMP[0] Src1 = TEMP[1]\n\
             MAD TEMP[2].xyz, Src0.xyz, Src0.111, Src1.xyz\n\
             MAD TEMP[3].w, Src0.w, Src1.w, Src0.0"
        );
    }

    #[test]
    fn test_full_instructions_go_first() {
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=0)
            .op(Opcode::Mov, DstRegister::temp(0).mask(WriteMask::X), [SrcRegister::input(0)])
            .op(Opcode::Mov, DstRegister::temp(1).mask(WriteMask::W), [SrcRegister::input(0)])
            .op(Opcode::Mov, DstRegister::temp(2), [SrcRegister::input(0)])
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        let alu = buffer.alu().collect::<Vec<_>>();
        assert_eq!(alu.len(), 2);

        // the xyzw move fills both halves on its own
        assert_eq!(alu[0].rgb.write_mask, WriteMask::XYZ);
        assert!(alu[0].alpha.write);
        assert_eq!(alu[0].rgb.dest_index, alu[0].alpha.dest_index);

        assert_eq!(alu[1].rgb.write_mask, WriteMask::X);
        assert!(alu[1].alpha.write);
        assert_ne!(alu[1].rgb.dest_index, alu[1].alpha.dest_index);
    }

    #[test]
    fn test_source_slot_overflow_falls_back() {
        // every rgb argument also reads `w`, so the rgb instruction takes all three alpha slots
        let rgb = Instruction::new(Opcode::Mad)
            .dst(DstRegister::temp(0).mask(WriteMask::XYZ))
            .src(SrcRegister::constant(0).swizzle(swz("xyw")))
            .src(SrcRegister::constant(1).swizzle(swz("xyw")))
            .src(SrcRegister::constant(2).swizzle(swz("xyw")));
        let alpha = Instruction::new(Opcode::Mad)
            .dst(DstRegister::temp(1).mask(WriteMask::W))
            .src(SrcRegister::constant(3))
            .src(SrcRegister::constant(4))
            .src(SrcRegister::constant(5));

        let program = Program::builder().inst(rgb).inst(alpha).build().unwrap();
        let buffer = schedule(&program, PairTarget::default()).unwrap();

        let alu = buffer.alu().collect::<Vec<_>>();
        assert_eq!(alu.len(), 2);
        assert_eq!(alu[0].rgb.opcode, HalfOpcode::Alu(Opcode::Mad));
        assert_eq!(alu[0].alpha.opcode, HalfOpcode::Nop);
        assert_eq!(alu[0].alpha_slots(), 3);
        assert_eq!(alu[1].rgb.opcode, HalfOpcode::Nop);
        assert_eq!(alu[1].alpha.opcode, HalfOpcode::Alu(Opcode::Mad));

        for pair in alu {
            assert!(pair.rgb_slots() <= 3 && pair.alpha_slots() <= 3);
        }
    }

    #[test]
    fn test_shared_source_slot() {
        // the rgb instruction reads CONST[0].w through alpha slot 0, the alpha instruction reuses it
        let program = Program::builder()
            .op(
                Opcode::Add,
                DstRegister::temp(0).mask(WriteMask::XYZ),
                [SrcRegister::constant(0).swizzle(swz("xyw")), SrcRegister::constant(1)],
            )
            .op(
                Opcode::Mad,
                DstRegister::temp(1).mask(WriteMask::W),
                [
                    SrcRegister::constant(0),
                    SrcRegister::constant(1),
                    SrcRegister::constant(0),
                ],
            )
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        let alu = buffer.alu().collect::<Vec<_>>();
        assert_eq!(alu.len(), 1);

        let pair = alu[0];
        assert_eq!(pair.rgb_slots(), 2);
        assert_eq!(pair.alpha_slots(), 2);
        assert_eq!(pair.alpha.src[0], pair.rgb.src[0]);
        assert_eq!(pair.alpha.args[0].source, pair.rgb.args[0].source);
        assert_eq!(pair.alpha.args[2].source, pair.alpha.args[0].source);
        assert_ne!(pair.alpha.args[1].source, pair.alpha.args[0].source);
    }

    #[test]
    fn test_transcendental_replicates_alpha() {
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=0)
            .op(
                Opcode::Rcp,
                DstRegister::output(0),
                [SrcRegister::input(0).swizzle(swz("y")).negate()],
            )
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        let pair = buffer.alu().next().unwrap();

        assert_eq!(pair.rgb.opcode, HalfOpcode::ReplicateAlpha);
        assert_eq!(pair.alpha.opcode, HalfOpcode::Alu(Opcode::Rcp));
        assert_eq!(pair.rgb.output_write_mask, WriteMask::XYZ);
        assert!(pair.alpha.output_write);
        assert_eq!(pair.alpha.args[0].swizzle, SwizzleSource::Y);
        assert!(pair.alpha.args[0].negate);
        assert_eq!(pair.rgb_slots(), 1);
        assert_eq!(pair.to_string().lines().nth(2), Some("SOP COLOR.xyz"));
    }

    #[test]
    fn test_saturate_and_depth() {
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=0)
            .inst(
                Instruction::new(Opcode::Max)
                    .dst(DstRegister::output(1).mask(mask("zw")))
                    .src(SrcRegister::input(0))
                    .src(SrcRegister::constant(0).abs())
                    .saturate(Saturate::ZeroOne),
            )
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        let pair = buffer.alu().next().unwrap();

        assert!(pair.rgb.saturate && pair.alpha.saturate);
        assert!(pair.alpha.depth_write);
        assert!(pair.rgb.output_write_mask.is_empty() && pair.rgb.write_mask.is_empty());
        assert!(pair.rgb.args[1].abs && pair.alpha.args[1].abs);
    }

    #[test]
    fn test_tex_block() {
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=1)
            .inst(
                Instruction::new(Opcode::Tex)
                    .dst(DstRegister::temp(0))
                    .src(SrcRegister::input(0))
                    .texture(0, TextureTarget::Tex2D),
            )
            .inst(
                Instruction::new(Opcode::Txp)
                    .dst(DstRegister::temp(1))
                    .src(SrcRegister::input(1).swizzle(swz("xyww")))
                    .texture(1, TextureTarget::Tex2D),
            )
            .op(
                Opcode::Mul,
                DstRegister::output(0),
                [SrcRegister::temp(0), SrcRegister::temp(1)],
            )
            .inst(Instruction::new(Opcode::Kil).src(SrcRegister::temp(0).swizzle(swz("wwww"))))
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        let units = buffer.units();
        assert_eq!(units.len(), 3);

        let ScheduledUnit::TexBlock(block) = &units[0] else {
            panic!("expected the texture fetches first");
        };
        assert_eq!(block.len(), 2);
        // destinations are allocated together and never alias a coordinate register
        let sources = block.iter().map(|t| t.src_index).collect::<Vec<_>>();
        for tex in block {
            assert!(!sources.contains(&tex.dest_index));
        }
        assert_ne!(block[0].dest_index, block[1].dest_index);

        // KIL waits for the TEX result and is flushed after the ALU instruction that became ready with it
        assert!(matches!(units[1], ScheduledUnit::Alu(_)));

        let ScheduledUnit::TexBlock(kil) = &units[2] else {
            panic!("expected a KIL block");
        };
        assert_eq!(kil[0].opcode, TexOpcode::Kil);
        assert_eq!(kil[0].src_swizzle, swz("w"));
        assert_eq!(buffer.tex_count(), 3);
        assert_eq!(buffer.alu_count(), 1);
    }

    #[test]
    fn test_anti_dependency_orders_write_after_read() {
        // the second write of TEMP[0].w must wait for the read of the first
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=0)
            .op(Opcode::Mov, DstRegister::temp(0).mask(WriteMask::W), [SrcRegister::input(0)])
            .op(
                Opcode::Mov,
                DstRegister::output(0).mask(WriteMask::W),
                [SrcRegister::temp(0)],
            )
            .op(
                Opcode::Mov,
                DstRegister::temp(0).mask(WriteMask::W),
                [SrcRegister::constant(0)],
            )
            .op(
                Opcode::Mov,
                DstRegister::output(0).mask(WriteMask::XYZ),
                [SrcRegister::temp(0).swizzle(swz("w"))],
            )
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        let alu = buffer.alu().collect::<Vec<_>>();

        let color_w = alu.iter().position(|p| p.alpha.output_write).unwrap();
        let const_write = alu
            .iter()
            .position(|p| p.alpha.write && p.alpha.src[0].constant)
            .unwrap();
        let color_xyz = alu.iter().position(|p| !p.rgb.output_write_mask.is_empty()).unwrap();

        assert!(color_w <= const_write);
        assert!(const_write < color_xyz);
    }

    #[test]
    fn test_output_writes_keep_program_order() {
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=1)
            .op(Opcode::Mov, DstRegister::output(0), [SrcRegister::input(0)])
            .op(Opcode::Mov, DstRegister::output(0), [SrcRegister::input(1)])
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        assert_eq!(buffer.inputs(), &[(0, 0), (1, 1)]);

        let sources = buffer
            .alu()
            .map(|pair| (pair.rgb.src[0].index, pair.alpha.src[0].index))
            .collect::<Vec<_>>();
        assert_eq!(sources, [(0, 0), (1, 1)]);

        // overlapping masks only order the shared channel, the later write still lands last
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=1)
            .op(
                Opcode::Mov,
                DstRegister::output(0).mask(mask("xy")),
                [SrcRegister::input(0)],
            )
            .op(
                Opcode::Mov,
                DstRegister::output(0).mask(mask("yz")),
                [SrcRegister::input(1)],
            )
            .op(
                Opcode::Mov,
                DstRegister::output(1).mask(WriteMask::W),
                [SrcRegister::input(1)],
            )
            .op(
                Opcode::Mov,
                DstRegister::output(1).mask(WriteMask::W),
                [SrcRegister::input(0)],
            )
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        let alu = buffer.alu().collect::<Vec<_>>();

        let color_y = alu
            .iter()
            .rposition(|p| p.rgb.output_write_mask.contains(Channel::Y))
            .unwrap();
        assert_eq!(alu[color_y].rgb.src[0].index, 1);

        let depth = alu.iter().rposition(|p| p.alpha.depth_write).unwrap();
        assert_eq!(alu[depth].alpha.src[0].index, 0);
    }

    #[test]
    fn test_self_rewrite() {
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=0)
            .op(Opcode::Mov, DstRegister::temp(0), [SrcRegister::input(0)])
            .op(
                Opcode::Add,
                DstRegister::temp(0).mask(WriteMask::X),
                [SrcRegister::temp(0), SrcRegister::temp(0).swizzle(swz("y"))],
            )
            .op(Opcode::Mov, DstRegister::output(0), [SrcRegister::temp(0)])
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        assert_eq!(buffer.alu_count(), 3);
    }

    #[test]
    fn test_hw_temps_are_recycled() {
        // a chain of short lived temporaries fits into three hardware registers
        let mut builder = Program::builder().declare(RegisterFile::Input, 0..=0);
        builder = builder.op(Opcode::Mov, DstRegister::temp(0), [SrcRegister::input(0)]);
        for i in 1..16 {
            builder = builder.op(
                Opcode::Add,
                DstRegister::temp(i),
                [SrcRegister::temp(i - 1), SrcRegister::constant(0)],
            );
        }
        let program = builder
            .op(Opcode::Mov, DstRegister::output(0), [SrcRegister::temp(15)])
            .build()
            .unwrap();

        let target = PairTarget {
            max_hw_temps: 3,
            ..PairTarget::default()
        };
        let buffer = schedule(&program, target).unwrap();
        assert_eq!(buffer.alu_count(), 17);
    }

    #[test]
    fn test_out_of_hw_temps() {
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=2)
            .op(
                Opcode::Mad,
                DstRegister::output(0),
                [SrcRegister::input(0), SrcRegister::input(1), SrcRegister::input(2)],
            )
            .build()
            .unwrap();

        let target = PairTarget {
            max_hw_temps: 2,
            ..PairTarget::default()
        };
        assert_eq!(schedule(&program, target), Err(ScheduleError::OutOfHwTemps { limit: 2 }));

        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=1)
            .op(Opcode::Add, DstRegister::temp(0), [SrcRegister::input(0), SrcRegister::input(1)])
            .op(Opcode::Add, DstRegister::output(0), [SrcRegister::temp(0), SrcRegister::input(1)])
            .build()
            .unwrap();

        let target = PairTarget {
            max_hw_temps: 2,
            ..PairTarget::default()
        };
        assert_eq!(schedule(&program, target), Err(ScheduleError::OutOfHwTemps { limit: 2 }));
    }

    #[test]
    fn test_rejected_programs() {
        let target = PairTarget::default();

        let program = Program::builder()
            .op(
                Opcode::Lrp,
                DstRegister::temp(0),
                [SrcRegister::temp(1), SrcRegister::temp(2), SrcRegister::temp(3)],
            )
            .build()
            .unwrap();
        assert_eq!(
            schedule(&program, target.clone()).err(),
            Some(ScheduleError::UnsupportedOpcode { opcode: Opcode::Lrp })
        );

        let program = Program::builder()
            .op(Opcode::Mov, DstRegister::output(5), [SrcRegister::constant(0)])
            .build()
            .unwrap();
        assert_eq!(
            schedule(&program, target.clone()).err(),
            Some(ScheduleError::UnknownOutput { index: 5 })
        );

        let program = Program::builder()
            .op(Opcode::Mov, DstRegister::temp(0), [SrcRegister::immediate(0)])
            .build()
            .unwrap();
        assert_eq!(
            schedule(&program, target.clone()).err(),
            Some(ScheduleError::UnsupportedOperand {
                opcode: Opcode::Mad,
                file: RegisterFile::Immediate
            })
        );

        let program = Program::builder()
            .op(Opcode::Mov, DstRegister::temp(0), [SrcRegister::temp(1).indirect()])
            .build()
            .unwrap();
        assert_eq!(
            schedule(&program, target.clone()).err(),
            Some(ScheduleError::IndirectOperand { opcode: Opcode::Mad })
        );

        let program = Program::builder()
            .op(
                Opcode::Mov,
                DstRegister::temp(0),
                [SrcRegister::constant(0).channel_sign(Channel::Y, SignMode::Toggle)],
            )
            .build()
            .unwrap();
        assert_eq!(
            schedule(&program, target.clone()).err(),
            Some(ScheduleError::UnsupportedModifier { opcode: Opcode::Mad })
        );

        let program = Program::builder()
            .op(Opcode::Mov, DstRegister::temp(300), [SrcRegister::constant(0)])
            .build()
            .unwrap();
        assert_eq!(
            schedule(&program, target).err(),
            Some(ScheduleError::CapacityExceeded {
                file: RegisterFile::Temporary,
                index: 300,
                limit: 256
            })
        );
    }

    #[test]
    fn test_end_stops_scan() {
        let program = Program::builder()
            .op(Opcode::Mov, DstRegister::output(0), [SrcRegister::constant(0)])
            .inst(Instruction::new(Opcode::End))
            .op(
                Opcode::Lrp,
                DstRegister::temp(0),
                [SrcRegister::temp(1), SrcRegister::temp(2), SrcRegister::temp(3)],
            )
            .build()
            .unwrap();

        let buffer = schedule(&program, PairTarget::default()).unwrap();
        assert_eq!(buffer.alu_count(), 1);
    }

    #[test]
    fn test_handler_error() {
        struct Failing(PairTarget);

        impl PairHandler for Failing {
            fn target(&self) -> &PairTarget {
                &self.0
            }

            fn emit_tex_block(&mut self, _: &[TexInstruction]) -> Result<(), ScheduleError> {
                Ok(())
            }

            fn emit_paired(&mut self, _: &PairInstruction) -> Result<(), ScheduleError> {
                Err(ScheduleError::Handler("too many instructions".into()))
            }
        }

        let program = Program::builder()
            .op(Opcode::Mov, DstRegister::output(0), [SrcRegister::constant(0)])
            .build()
            .unwrap();

        assert_eq!(
            pair_program(&program, &mut Failing(PairTarget::default())),
            Err(ScheduleError::Handler("too many instructions".into()))
        );
    }
}
