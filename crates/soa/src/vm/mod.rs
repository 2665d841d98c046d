mod compiler;
mod interpreter;

pub use compiler::*;
pub use interpreter::*;

use lanepair_core::CompareFunc;

/// number of shaded elements processed in lockstep by the varying program
pub const LANE_COUNT: usize = 16;

/// bit pattern of an undefined lane value (a quiet NaN with a recognizable payload)
pub const UNDEF_BITS: u32 = 0x7fc0_dead;

/// how a texel fetch interprets its level-of-detail operand
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum LodMode {
    None,
    Bias,
    Explicit,
}

/// static parameters of one texel fetch
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TexelFetch {
    pub unit: u32,
    pub num_coords: u8,
    pub lod: LodMode,
}

#[repr(align(8))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaneOp<I, O> {
    Undef(O),
    Coverage(O),
    MaskAos(u8, O),

    Input(u32, O),
    Constant(u32, O),
    Uniform(u32, O),

    LitF(f32, O),
    LitI(i32, O),

    AddF(I, I, O),
    SubF(I, I, O),
    MulF(I, I, O),
    DivF(I, I, O),
    MinF(I, I, O),
    MaxF(I, I, O),
    PowF(I, I, O),

    AddCF(f32, I, O),
    MulCF(f32, I, O),
    MinCF(f32, I, O),
    MaxCF(f32, I, O),

    NegF(I, O),
    AbsF(I, O),
    FloorF(I, O),
    RcpF(I, O),
    RsqF(I, O),
    Exp2F(I, O),
    Log2F(I, O),
    SinF(I, O),
    CosF(I, O),

    AndI(I, I, O),
    OrI(I, I, O),
    XorI(I, I, O),
    NotI(I, O),

    CmpF(CompareFunc, I, I, O),
    CmpI(CompareFunc, I, I, O),
    CmpU(CompareFunc, I, I, O),

    Select(I, I, I, O),

    /// fetches a whole texel per lane, the output holds `x` and all four channels stay readable through
    /// `TexelChannel` for as long as the output register is live
    Tex(TexelFetch, I, I, I, I, O),
    TexelChannel(u8, I, O),
}

impl<I, O> LaneOp<I, O> {
    pub fn map<I0, O0>(self, mut inp: impl FnMut(I) -> I0, out: impl FnOnce(O) -> O0) -> LaneOp<I0, O0> {
        use LaneOp::*;
        match self {
            Undef(o) => Undef(out(o)),
            Coverage(o) => Coverage(out(o)),
            MaskAos(p, o) => MaskAos(p, out(o)),
            Input(idx, o) => Input(idx, out(o)),
            Constant(idx, o) => Constant(idx, out(o)),
            Uniform(idx, o) => Uniform(idx, out(o)),
            LitF(val, o) => LitF(val, out(o)),
            LitI(val, o) => LitI(val, out(o)),
            AddF(a, b, o) => AddF(inp(a), inp(b), out(o)),
            SubF(a, b, o) => SubF(inp(a), inp(b), out(o)),
            MulF(a, b, o) => MulF(inp(a), inp(b), out(o)),
            DivF(a, b, o) => DivF(inp(a), inp(b), out(o)),
            MinF(a, b, o) => MinF(inp(a), inp(b), out(o)),
            MaxF(a, b, o) => MaxF(inp(a), inp(b), out(o)),
            PowF(a, b, o) => PowF(inp(a), inp(b), out(o)),
            AddCF(a, b, o) => AddCF(a, inp(b), out(o)),
            MulCF(a, b, o) => MulCF(a, inp(b), out(o)),
            MinCF(a, b, o) => MinCF(a, inp(b), out(o)),
            MaxCF(a, b, o) => MaxCF(a, inp(b), out(o)),
            NegF(a, o) => NegF(inp(a), out(o)),
            AbsF(a, o) => AbsF(inp(a), out(o)),
            FloorF(a, o) => FloorF(inp(a), out(o)),
            RcpF(a, o) => RcpF(inp(a), out(o)),
            RsqF(a, o) => RsqF(inp(a), out(o)),
            Exp2F(a, o) => Exp2F(inp(a), out(o)),
            Log2F(a, o) => Log2F(inp(a), out(o)),
            SinF(a, o) => SinF(inp(a), out(o)),
            CosF(a, o) => CosF(inp(a), out(o)),
            AndI(a, b, o) => AndI(inp(a), inp(b), out(o)),
            OrI(a, b, o) => OrI(inp(a), inp(b), out(o)),
            XorI(a, b, o) => XorI(inp(a), inp(b), out(o)),
            NotI(a, o) => NotI(inp(a), out(o)),
            CmpF(f, a, b, o) => CmpF(f, inp(a), inp(b), out(o)),
            CmpI(f, a, b, o) => CmpI(f, inp(a), inp(b), out(o)),
            CmpU(f, a, b, o) => CmpU(f, inp(a), inp(b), out(o)),
            Select(m, a, b, o) => Select(inp(m), inp(a), inp(b), out(o)),
            Tex(t, s, r, q, l, o) => Tex(t, inp(s), inp(r), inp(q), inp(l), out(o)),
            TexelChannel(c, t, o) => TexelChannel(c, inp(t), out(o)),
        }
    }

    pub fn map_inputs<I0>(self, inp: impl FnMut(I) -> I0) -> LaneOp<I0, O> {
        self.map(inp, |o| o)
    }

    pub fn map_outputs<O0>(self, out: impl FnOnce(O) -> O0) -> LaneOp<I, O0> {
        self.map(|i| i, out)
    }

    pub fn output(self) -> O {
        let mut output = None;
        self.map(|_| (), |o| output = Some(o));
        match output {
            Some(o) => o,
            None => unreachable!("every lane op has exactly one output"),
        }
    }

    /// whether the op produces a different value per lane regardless of its operands
    pub fn is_lane_varying(&self) -> bool {
        matches!(
            self,
            LaneOp::Coverage(_) | LaneOp::MaskAos(..) | LaneOp::Input(..) | LaneOp::Tex(..)
        )
    }
}

pub type LaneReg = u8;
pub type LaneOpcode = LaneOp<LaneReg, LaneReg>;
