//! dependency-driven scheduling for paired RGB/Alpha fragment ALUs
//!
//! the instruction stream is scanned once to build per-channel value chains, instructions become ready
//! when every value they read was written and every earlier reader of a value they overwrite was
//! emitted. ready instructions are emitted as texture blocks and as paired ALU instructions with
//! hardware temporaries allocated on first use

mod canonical;
mod error;
mod handler;
mod pair;
mod scheduler;

pub use canonical::*;
pub use error::*;
pub use handler::*;
pub use pair::*;
pub use scheduler::*;
