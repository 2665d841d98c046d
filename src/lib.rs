//! shader token streams lowered to lane-parallel code, or scheduled onto a paired RGB/Alpha ALU
//!
//! - [`soa`] translates a [`Program`] into structure-of-arrays lane code and runs it over batches of elements
//! - [`sched`] reorders a [`Program`] into texture blocks and dual-issue ALU instructions with hardware
//!   temporaries allocated on the fly
//! - [`FragmentCompiler`] prefers the paired schedule and falls back to lane code when a program
//!   cannot be scheduled

pub use lanepair_core::*;

#[cfg(feature = "soa")]
pub use lanepair_soa as soa;

#[cfg(feature = "sched")]
pub use lanepair_sched as sched;

#[cfg(all(feature = "soa", feature = "sched"))]
mod driver;

#[cfg(all(feature = "soa", feature = "sched"))]
pub use driver::*;
