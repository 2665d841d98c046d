//! structure-of-arrays shader execution
//!
//! a token stream is translated into a graph of lane values (one value per register channel),
//! optimized, split into a uniform and a varying part and lowered to register based lane ops.
//! the varying part runs [`LANE_COUNT`] elements in lockstep, lane groups are spread over a thread pool.

mod backend;
mod config;
mod dispatch;
mod error;
mod logic;
mod translate;
mod util;
mod vm;

pub use backend::*;
pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use translate::*;
pub use util::ThreadPool;
pub use vm::*;
