use crate::{DstRegister, Opcode, RegisterFile, Saturate, SrcRegister, TextureTarget};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::RangeInclusive;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("invalid swizzle `{0}`")]
    InvalidSwizzle(String),
    #[error("invalid write mask `{0}`")]
    InvalidWriteMask(String),
    #[error("{opcode} takes {expected} source operand(s), got {got}")]
    SourceCount { opcode: Opcode, expected: u8, got: usize },
    #[error("{opcode} requires a destination")]
    MissingDestination { opcode: Opcode },
    #[error("{opcode} takes no destination")]
    UnexpectedDestination { opcode: Opcode },
    #[error("{opcode} requires texture unit and target")]
    MissingTexture { opcode: Opcode },
    #[error("immediate size must be 1..=4, got {0}")]
    ImmediateSize(usize),
}

/// texture unit and target of a sampling instruction
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct TextureInfo {
    pub unit: u32,
    pub target: TextureTarget,
}

/// a single shader instruction
///
/// instructions are plain values: passes that rewrite them build new instructions instead of mutating shared ones
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub saturate: Saturate,
    pub dst: Option<DstRegister>,
    pub src: Vec<SrcRegister>,
    pub texture: Option<TextureInfo>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            saturate: Saturate::None,
            dst: None,
            src: Vec::new(),
            texture: None,
        }
    }

    pub fn dst(mut self, dst: DstRegister) -> Self {
        self.dst = Some(dst);
        self
    }

    pub fn src(mut self, src: SrcRegister) -> Self {
        self.src.push(src);
        self
    }

    pub fn saturate(mut self, saturate: Saturate) -> Self {
        self.saturate = saturate;
        self
    }

    pub fn texture(mut self, unit: u32, target: TextureTarget) -> Self {
        self.texture = Some(TextureInfo { unit, target });
        self
    }

    /// checks operand counts against the opcode table
    pub fn validate(&self) -> Result<(), ProgramError> {
        let info = self.opcode.info();

        if self.src.len() != info.num_src as usize {
            return Err(ProgramError::SourceCount {
                opcode: self.opcode,
                expected: info.num_src,
                got: self.src.len(),
            });
        }

        match (self.dst.is_some(), info.num_dst > 0) {
            (false, true) => return Err(ProgramError::MissingDestination { opcode: self.opcode }),
            (true, false) => return Err(ProgramError::UnexpectedDestination { opcode: self.opcode }),
            _ => {}
        }

        if matches!(self.opcode, Opcode::Tex | Opcode::Txb | Opcode::Txl | Opcode::Txp) && self.texture.is_none() {
            return Err(ProgramError::MissingTexture { opcode: self.opcode });
        }

        Ok(())
    }

    /// whether any operand uses address-register-relative indexing into the temporary file
    pub fn has_indirect_temporary(&self) -> bool {
        let dst = self
            .dst
            .iter()
            .any(|d| d.indirect && d.file == RegisterFile::Temporary);
        let src = self
            .src
            .iter()
            .any(|s| s.indirect && s.file == RegisterFile::Temporary);
        dst || src
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.opcode)?;
        match self.saturate {
            Saturate::None => {}
            Saturate::ZeroOne => write!(f, "_SAT")?,
            Saturate::MinusPlusOne => write!(f, "_SATNV")?,
        }

        let mut first = true;
        let mut sep = |f: &mut Formatter<'_>| {
            let s = if first { " " } else { ", " };
            first = false;
            f.write_str(s)
        };

        if let Some(dst) = &self.dst {
            sep(f)?;
            write!(f, "{dst}")?;
        }

        for src in &self.src {
            sep(f)?;
            write!(f, "{src}")?;
        }

        if let Some(tex) = &self.texture {
            sep(f)?;
            write!(f, "SAMP[{}], {}", tex.unit, tex.target.name())?;
        }

        Ok(())
    }
}

/// declares that a register range of a file is in use
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub file: RegisterFile,
    pub first: u32,
    pub last: u32,
}

impl Declaration {
    pub fn range(&self) -> RangeInclusive<u32> {
        self.first..=self.last
    }
}

/// a literal vector, addressed by `IMM[n]` in declaration order
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Immediate {
    pub values: [f32; 4],
    /// number of meaningful components, the rest are undefined
    pub size: usize,
}

impl Immediate {
    pub fn new(values: [f32; 4]) -> Self {
        Self { values, size: 4 }
    }

    pub fn from_slice(values: &[f32]) -> Result<Self, ProgramError> {
        if values.is_empty() || values.len() > 4 {
            return Err(ProgramError::ImmediateSize(values.len()));
        }

        let mut padded = [0.0; 4];
        padded[..values.len()].copy_from_slice(values);
        Ok(Self {
            values: padded,
            size: values.len(),
        })
    }
}

/// one element of a shader token stream
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Declaration(Declaration),
    Immediate(Immediate),
    Instruction(Instruction),
}

/// a linear, order-significant shader token stream
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    tokens: Vec<Token>,
}

impl Program {
    /// wrap an already validated token stream
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> + '_ {
        self.tokens.iter().filter_map(|t| match t {
            Token::Declaration(d) => Some(d),
            _ => None,
        })
    }

    pub fn immediates(&self) -> impl Iterator<Item = &Immediate> + '_ {
        self.tokens.iter().filter_map(|t| match t {
            Token::Immediate(i) => Some(i),
            _ => None,
        })
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.tokens.iter().filter_map(|t| match t {
            Token::Instruction(i) => Some(i),
            _ => None,
        })
    }

    /// one past the highest index declared or referenced in `file`
    pub fn register_count(&self, file: RegisterFile) -> u32 {
        let declared = self
            .declarations()
            .filter(|d| d.file == file)
            .map(|d| d.last + 1)
            .max()
            .unwrap_or(0);

        let referenced = self
            .instructions()
            .flat_map(|i| {
                let dst = i.dst.iter().filter(|d| d.file == file).map(|d| d.index + 1);
                let src = i.src.iter().filter(|s| s.file == file).map(|s| s.index + 1);
                dst.chain(src).collect::<Vec<_>>()
            })
            .max()
            .unwrap_or(0);

        declared.max(referenced)
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut immediates = 0;
        for token in &self.tokens {
            match token {
                Token::Declaration(d) if d.first == d.last => writeln!(f, "DCL {}[{}]", d.file.name(), d.first)?,
                Token::Declaration(d) => writeln!(f, "DCL {}[{}..{}]", d.file.name(), d.first, d.last)?,
                Token::Immediate(imm) => {
                    let values = &imm.values[..imm.size];
                    writeln!(f, "IMM[{immediates}] {values:?}")?;
                    immediates += 1;
                }
                Token::Instruction(inst) => writeln!(f, "{inst}")?,
            }
        }
        Ok(())
    }
}

/// fluent construction of a [`Program`]
#[derive(Clone, Debug, Default)]
pub struct ProgramBuilder {
    tokens: Vec<Token>,
    immediates: u32,
}

impl ProgramBuilder {
    pub fn declare(mut self, file: RegisterFile, range: RangeInclusive<u32>) -> Self {
        self.tokens.push(Token::Declaration(Declaration {
            file,
            first: *range.start(),
            last: *range.end(),
        }));
        self
    }

    /// declares an immediate, its index is returned through `index`
    pub fn immediate(mut self, values: [f32; 4], index: &mut u32) -> Self {
        *index = self.immediates;
        self.immediates += 1;
        self.tokens.push(Token::Immediate(Immediate::new(values)));
        self
    }

    pub fn inst(mut self, instruction: Instruction) -> Self {
        self.tokens.push(Token::Instruction(instruction));
        self
    }

    pub fn op(self, opcode: Opcode, dst: DstRegister, src: impl IntoIterator<Item = SrcRegister>) -> Self {
        let mut inst = Instruction::new(opcode).dst(dst);
        inst.src.extend(src);
        self.inst(inst)
    }

    pub fn build(self) -> Result<Program, ProgramError> {
        for token in &self.tokens {
            if let Token::Instruction(inst) = token {
                inst.validate()?;
            }
        }

        Ok(Program { tokens: self.tokens })
    }
}
