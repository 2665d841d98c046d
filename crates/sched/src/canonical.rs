use crate::ScheduleError;
use lanepair_core::{Channel, Instruction, Opcode, SrcRegister, WriteMask};

/// rewrites an instruction into the operand layout of the paired ALU
///
/// ADD, MOV and MUL become MAD with register-less `1`/`0` operands, CMP gets its first
/// and third operand swapped. every other instruction is returned unchanged
pub fn canonicalize(inst: &Instruction) -> Instruction {
    let mut out = inst.clone();

    match (inst.opcode, inst.src.as_slice()) {
        (Opcode::Add, [a, b]) => {
            out.opcode = Opcode::Mad;
            out.src = vec![*a, SrcRegister::one(), *b];
        }
        (Opcode::Mov, [a]) => {
            out.opcode = Opcode::Mad;
            out.src = vec![*a, SrcRegister::one(), SrcRegister::zero()];
        }
        (Opcode::Mul, [a, b]) => {
            out.opcode = Opcode::Mad;
            out.src = vec![*a, *b, SrcRegister::zero()];
        }
        (Opcode::Cmp, [_, _, _]) => out.src.swap(0, 2),
        _ => {}
    }

    out
}

/// the execution resources an instruction occupies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub need_rgb: bool,
    pub need_alpha: bool,
    /// runs on the alpha unit only, the rgb half replicates its result
    pub transcendent: bool,
    /// runs on the texture unit
    pub tex: bool,
}

/// which ready list an instruction waits on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyList {
    Tex,
    Rgb,
    Alpha,
    Full,
}

impl Classification {
    pub fn ready_list(self) -> ReadyList {
        if self.tex {
            ReadyList::Tex
        } else if !self.need_alpha {
            ReadyList::Rgb
        } else if !self.need_rgb {
            ReadyList::Alpha
        } else {
            ReadyList::Full
        }
    }
}

/// classifies a canonical instruction
pub fn classify(inst: &Instruction) -> Result<Classification, ScheduleError> {
    let mask = inst.dst.map(|dst| dst.write_mask).unwrap_or(WriteMask::NONE);
    let mut class = Classification {
        need_rgb: mask.intersects(WriteMask::XYZ),
        need_alpha: mask.contains(Channel::W),
        ..Classification::default()
    };

    match inst.opcode {
        Opcode::Add
        | Opcode::Cmp
        | Opcode::Ddx
        | Opcode::Ddy
        | Opcode::Frc
        | Opcode::Mad
        | Opcode::Max
        | Opcode::Min
        | Opcode::Mov
        | Opcode::Mul => {}
        Opcode::Cos | Opcode::Ex2 | Opcode::Lg2 | Opcode::Rcp | Opcode::Rsq | Opcode::Sin => {
            class.transcendent = true;
            class.need_alpha = true;
        }
        Opcode::Dp3 => class.need_rgb = true,
        Opcode::Dp4 => {
            class.need_rgb = true;
            class.need_alpha = true;
        }
        Opcode::Kil | Opcode::Tex | Opcode::Txb | Opcode::Txp => {
            class = Classification {
                tex: true,
                ..Classification::default()
            }
        }
        opcode => return Err(ScheduleError::UnsupportedOpcode { opcode }),
    }

    Ok(class)
}
