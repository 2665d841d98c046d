use lanepair_core::{Opcode, ProgramError, RegisterFile};
use std::fmt;
use thiserror::Error;

/// why an instruction has no lane translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    /// a TEMP operand is addressed relative to the address register
    IndirectTemporary,
    /// any other operand addressed relative to the address register
    IndirectAddressing,
    /// branches, loops and subroutines need a scalar fallback path
    ControlFlow,
    /// the opcode has no lane implementation
    NotImplemented,
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unsupported::IndirectTemporary => "indirect temporary addressing",
            Unsupported::IndirectAddressing => "indirect addressing",
            Unsupported::ControlFlow => "control flow",
            Unsupported::NotImplemented => "not implemented",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    #[error("unsupported instruction {opcode}: {reason}")]
    Unsupported { opcode: Opcode, reason: Unsupported },

    #[error("{opcode} cannot write to the {file} register file")]
    InvalidDestination { opcode: Opcode, file: RegisterFile },

    #[error("{opcode} cannot read from the {file} register file")]
    InvalidSource { opcode: Opcode, file: RegisterFile },

    #[error("immediate {index} is read before it is declared")]
    UndeclaredImmediate { index: u32 },

    #[error("input {index} is not declared")]
    UndeclaredInput { index: u32 },

    #[error("{file}[{index}] exceeds the limit of {limit} registers")]
    CapacityExceeded { file: RegisterFile, index: u32, limit: usize },

    #[error("program needs {needed} lane registers, only {limit} are available")]
    TooManyRegisters { needed: usize, limit: usize },

    #[error(transparent)]
    Program(#[from] ProgramError),
}

impl TranslateError {
    /// whether best-effort translation may skip the failing instruction and continue
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            TranslateError::Unsupported {
                reason: Unsupported::ControlFlow | Unsupported::NotImplemented,
                ..
            }
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("shader reads {expected} constants, {got} were supplied")]
    ConstantCount { expected: usize, got: usize },

    #[error("shader reads {expected} input registers, elements carry {got}")]
    InputCount { expected: usize, got: usize },

    #[error("coverage has {got} entries for {expected} elements")]
    CoverageLength { expected: usize, got: usize },

    #[error("unknown shader id")]
    UnknownShader,
}
