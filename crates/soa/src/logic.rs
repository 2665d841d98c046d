//! lane comparison and selection primitives
//!
//! masks are integer lanes holding either all zero bits or all one bits

use crate::{IR, LaneBuilder, LaneOp};
use lanepair_core::CompareFunc;

impl<'a> LaneBuilder<'a> {
    /// per lane `a <func> b` as an all-ones/all-zeros mask
    ///
    /// float lanes compare unordered, so a NaN operand satisfies every relation except `Never`
    pub fn cmp(&self, func: CompareFunc, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        match func {
            CompareFunc::Never => self.lit_int(0),
            CompareFunc::Always => self.lit_int(-1),
            _ => {
                let ty = self.lane_type();
                if ty.floating {
                    self.emit(LaneOp::CmpF(func, a, b, ()))
                } else if ty.signed {
                    self.emit(LaneOp::CmpI(func, a, b, ()))
                } else {
                    self.emit(LaneOp::CmpU(func, a, b, ()))
                }
            }
        }
    }

    /// per lane `mask ? a : b`, a bitwise blend that keeps any bit pattern intact
    pub fn select(&self, mask: IR<'a>, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        if a == b {
            return a;
        }

        self.emit(LaneOp::Select(mask, a, b, ()))
    }

    /// a constant mask where lane `i` is set when `pattern[i % 4]` is
    pub fn const_mask_aos(&self, pattern: [bool; 4]) -> IR<'a> {
        let bits = pattern
            .iter()
            .enumerate()
            .fold(0u8, |bits, (i, set)| bits | ((*set as u8) << i));

        match bits {
            0 => self.lit_int(0),
            15 => self.lit_int(-1),
            _ => self.emit(LaneOp::MaskAos(bits, ())),
        }
    }

    /// [`LaneBuilder::select`] with a mask fixed at compile time, see [`LaneBuilder::const_mask_aos`]
    pub fn select_aos(&self, a: IR<'a>, b: IR<'a>, pattern: [bool; 4]) -> IR<'a> {
        if a == b {
            return a;
        }

        match pattern {
            [true, true, true, true] => a,
            [false, false, false, false] => b,
            _ if a.is_undef() || b.is_undef() => self.undef(),
            _ => self.select(self.const_mask_aos(pattern), a, b),
        }
    }
}
