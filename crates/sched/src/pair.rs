use lanepair_core::{Opcode, Swizzle, SwizzleSource, TextureInfo, WriteMask};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// the operation of one half of a paired instruction
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum HalfOpcode {
    #[default]
    Nop,
    Alu(Opcode),
    /// rgb half copies the scalar result of the alpha half
    ReplicateAlpha,
}

impl HalfOpcode {
    pub fn num_args(self) -> usize {
        match self {
            HalfOpcode::Nop | HalfOpcode::ReplicateAlpha => 0,
            // derivatives read their operand twice
            HalfOpcode::Alu(op @ (Opcode::Ddx | Opcode::Ddy)) => op.info().num_src as usize + 1,
            HalfOpcode::Alu(op) => op.info().num_src as usize,
        }
    }
}

impl Display for HalfOpcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            HalfOpcode::Nop => f.write_str("NOP"),
            HalfOpcode::Alu(op) => f.write_str(op.mnemonic()),
            HalfOpcode::ReplicateAlpha => f.write_str("SOP"),
        }
    }
}

/// a source slot: a hardware temporary or a constant register
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct PairSource {
    pub used: bool,
    pub constant: bool,
    pub index: u32,
}

impl Display for PairSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let file = if self.constant { "CNST" } else { "TEMP" };
        write!(f, "{file}[{}]", self.index)
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct RgbArg {
    pub source: usize,
    pub swizzle: [SwizzleSource; 3],
    pub abs: bool,
    pub negate: bool,
}

impl Default for RgbArg {
    fn default() -> Self {
        Self {
            source: 0,
            swizzle: [SwizzleSource::X, SwizzleSource::Y, SwizzleSource::Z],
            abs: false,
            negate: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct AlphaArg {
    pub source: usize,
    pub swizzle: SwizzleSource,
    pub abs: bool,
    pub negate: bool,
}

impl Default for AlphaArg {
    fn default() -> Self {
        Self {
            source: 0,
            swizzle: SwizzleSource::W,
            abs: false,
            negate: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RgbHalf {
    pub opcode: HalfOpcode,
    pub saturate: bool,
    pub dest_index: u32,
    /// channels of `TEMP[dest_index]` written, a subset of xyz
    pub write_mask: WriteMask,
    /// channels of the color output written, a subset of xyz
    pub output_write_mask: WriteMask,
    pub src: [PairSource; 3],
    pub args: [RgbArg; 3],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlphaHalf {
    pub opcode: HalfOpcode,
    pub saturate: bool,
    pub dest_index: u32,
    pub write: bool,
    pub output_write: bool,
    pub depth_write: bool,
    pub src: [PairSource; 3],
    pub args: [AlphaArg; 3],
}

/// one dual-issue ALU instruction: an rgb operation and an alpha operation sharing a cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PairInstruction {
    pub rgb: RgbHalf,
    pub alpha: AlphaHalf,
}

impl PairInstruction {
    /// number of source slots the rgb half reads
    pub fn rgb_slots(&self) -> usize {
        self.rgb.src.iter().filter(|s| s.used).count()
    }

    pub fn alpha_slots(&self) -> usize {
        self.alpha.src.iter().filter(|s| s.used).count()
    }
}

fn write_sources(f: &mut Formatter<'_>, name: &str, sources: &[PairSource; 3]) -> FmtResult {
    f.write_str(name)?;
    for (i, src) in sources.iter().enumerate().filter(|(_, s)| s.used) {
        write!(f, " Src{i} = {src}")?;
    }
    writeln!(f)
}

fn write_opcode(f: &mut Formatter<'_>, opcode: HalfOpcode, saturate: bool) -> FmtResult {
    write!(f, "{opcode}")?;
    if saturate {
        f.write_str("_SAT")?;
    }
    Ok(())
}

fn write_arg(f: &mut Formatter<'_>, source: usize, abs: bool, negate: bool) -> FmtResult {
    let abs = if abs { "|" } else { "" };
    let neg = if negate { "-" } else { "" };
    write!(f, ", {neg}{abs}Src{source}.")
}

impl Display for PairInstruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let (rgb, alpha) = (&self.rgb, &self.alpha);

        write_sources(f, "RGB:", &rgb.src)?;
        write_sources(f, "Alpha:", &alpha.src)?;

        write_opcode(f, rgb.opcode, rgb.saturate)?;
        if !rgb.write_mask.is_empty() {
            write!(f, " TEMP[{}].{}", rgb.dest_index, rgb.write_mask)?;
        }
        if !rgb.output_write_mask.is_empty() {
            write!(f, " COLOR.{}", rgb.output_write_mask)?;
        }
        for arg in &rgb.args[..rgb.opcode.num_args().min(3)] {
            write_arg(f, arg.source, arg.abs, arg.negate)?;
            for s in arg.swizzle {
                write!(f, "{}", s.name())?;
            }
            if arg.abs {
                f.write_str("|")?;
            }
        }
        writeln!(f)?;

        write_opcode(f, alpha.opcode, alpha.saturate)?;
        if alpha.write {
            write!(f, " TEMP[{}].w", alpha.dest_index)?;
        }
        if alpha.output_write {
            f.write_str(" COLOR.w")?;
        }
        if alpha.depth_write {
            f.write_str(" DEPTH.w")?;
        }
        for arg in &alpha.args[..alpha.opcode.num_args().min(3)] {
            write_arg(f, arg.source, arg.abs, arg.negate)?;
            write!(f, "{}", arg.swizzle.name())?;
            if arg.abs {
                f.write_str("|")?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum TexOpcode {
    Tex,
    Txb,
    Txp,
    Kil,
}

impl TexOpcode {
    pub fn from_opcode(opcode: Opcode) -> Option<Self> {
        match opcode {
            Opcode::Tex => Some(TexOpcode::Tex),
            Opcode::Txb => Some(TexOpcode::Txb),
            Opcode::Txp => Some(TexOpcode::Txp),
            Opcode::Kil => Some(TexOpcode::Kil),
            _ => None,
        }
    }
}

impl Display for TexOpcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            TexOpcode::Tex => "TEX",
            TexOpcode::Txb => "TXB",
            TexOpcode::Txp => "TXP",
            TexOpcode::Kil => "KIL",
        })
    }
}

/// a texture unit instruction with resolved hardware registers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TexInstruction {
    pub opcode: TexOpcode,
    /// unused by KIL
    pub dest_index: u32,
    pub write_mask: WriteMask,
    /// `None` for KIL
    pub texture: Option<TextureInfo>,
    pub src_index: u32,
    pub src_swizzle: Swizzle,
}

impl Display for TexInstruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.opcode)?;
        if self.opcode != TexOpcode::Kil {
            write!(f, " TEMP[{}].{},", self.dest_index, self.write_mask)?;
        }
        write!(f, " TEMP[{}].{}", self.src_index, self.src_swizzle)?;
        if let Some(tex) = self.texture {
            write!(f, ", SAMP[{}], {}", tex.unit, tex.target.name())?;
        }
        Ok(())
    }
}
