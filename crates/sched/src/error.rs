use lanepair_core::{Opcode, ProgramError, RegisterFile};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("{opcode} has no paired ALU or texture unit encoding")]
    UnsupportedOpcode { opcode: Opcode },

    #[error("{opcode} cannot address a {file} operand")]
    UnsupportedOperand { opcode: Opcode, file: RegisterFile },

    #[error("{opcode} uses indirect addressing")]
    IndirectOperand { opcode: Opcode },

    #[error("{opcode} uses a source or destination modifier the hardware cannot encode")]
    UnsupportedModifier { opcode: Opcode },

    #[error("OUTPUT[{index}] is neither the color nor the depth output")]
    UnknownOutput { index: u32 },

    #[error("{file}[{index}] exceeds the limit of {limit} registers")]
    CapacityExceeded { file: RegisterFile, index: u32, limit: u32 },

    #[error("ran out of hardware temporaries ({limit} available)")]
    OutOfHwTemps { limit: u32 },

    #[error("instruction {ip} does not fit into the source slots of one ALU instruction")]
    SourceSlots { ip: usize },

    #[error("internal scheduler error: {0}")]
    Internal(String),

    #[error("handler failed: {0}")]
    Handler(String),

    #[error(transparent)]
    Program(#[from] ProgramError),
}
