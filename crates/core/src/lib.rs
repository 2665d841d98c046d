mod opcode;
mod program;
mod register;

pub use opcode::*;
pub use program::*;
pub use register::*;
