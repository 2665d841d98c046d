use super::IR;
use crate::{LaneOp, LodMode, TexelFetch};
use bumpalo::Bump;

/// element type carried by the lanes of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneType {
    pub floating: bool,
    pub signed: bool,
}

impl LaneType {
    pub const F32: LaneType = LaneType {
        floating: true,
        signed: true,
    };
    pub const I32: LaneType = LaneType {
        floating: false,
        signed: true,
    };
    pub const U32: LaneType = LaneType {
        floating: false,
        signed: false,
    };
}

/// build context for lane values of a single [`LaneType`]
#[derive(Clone, Copy)]
pub struct LaneBuilder<'a> {
    arena: &'a Bump,
    ty: LaneType,
    zero: IR<'a>,
    one: IR<'a>,
    undef: IR<'a>,
}

impl<'a> LaneBuilder<'a> {
    pub fn new(arena: &'a Bump, ty: LaneType) -> Self {
        let (zero, one) = if ty.floating {
            (LaneOp::LitF(0.0, ()), LaneOp::LitF(1.0, ()))
        } else {
            (LaneOp::LitI(0, ()), LaneOp::LitI(1, ()))
        };

        Self {
            arena,
            ty,
            zero: IR::new(arena, zero),
            one: IR::new(arena, one),
            undef: IR::new(arena, LaneOp::Undef(())),
        }
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }

    pub fn lane_type(&self) -> LaneType {
        self.ty
    }

    /// the same context, building values of another type
    pub fn with_type(&self, ty: LaneType) -> Self {
        Self::new(self.arena, ty)
    }

    pub fn zero(&self) -> IR<'a> {
        self.zero
    }

    pub fn one(&self) -> IR<'a> {
        self.one
    }

    pub fn undef(&self) -> IR<'a> {
        self.undef
    }

    pub fn emit(&self, op: LaneOp<IR<'a>, ()>) -> IR<'a> {
        IR::new(self.arena, op)
    }

    pub fn lit(&self, value: f32) -> IR<'a> {
        self.emit(LaneOp::LitF(value, ()))
    }

    pub fn lit_int(&self, value: i32) -> IR<'a> {
        self.emit(LaneOp::LitI(value, ()))
    }

    pub fn input(&self, slot: u32) -> IR<'a> {
        self.emit(LaneOp::Input(slot, ()))
    }

    pub fn constant(&self, slot: u32) -> IR<'a> {
        self.emit(LaneOp::Constant(slot, ()))
    }

    pub fn coverage(&self) -> IR<'a> {
        self.emit(LaneOp::Coverage(()))
    }

    pub fn add(&self, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::AddF(a, b, ()))
    }

    pub fn sub(&self, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::SubF(a, b, ()))
    }

    pub fn mul(&self, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::MulF(a, b, ()))
    }

    pub fn div(&self, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::DivF(a, b, ()))
    }

    pub fn min(&self, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::MinF(a, b, ()))
    }

    pub fn max(&self, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::MaxF(a, b, ()))
    }

    pub fn pow(&self, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::PowF(a, b, ()))
    }

    pub fn neg(&self, a: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::NegF(a, ()))
    }

    pub fn abs(&self, a: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::AbsF(a, ()))
    }

    pub fn floor(&self, a: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::FloorF(a, ()))
    }

    pub fn rcp(&self, a: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::RcpF(a, ()))
    }

    pub fn rsqrt(&self, a: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::RsqF(a, ()))
    }

    pub fn exp2(&self, a: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::Exp2F(a, ()))
    }

    pub fn log2(&self, a: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::Log2F(a, ()))
    }

    pub fn sin(&self, a: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::SinF(a, ()))
    }

    pub fn cos(&self, a: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::CosF(a, ()))
    }

    pub fn and(&self, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::AndI(a, b, ()))
    }

    pub fn or(&self, a: IR<'a>, b: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::OrI(a, b, ()))
    }

    pub fn not(&self, a: IR<'a>) -> IR<'a> {
        self.emit(LaneOp::NotI(a, ()))
    }

    /// `min(max(a, lo), hi)`
    pub fn clamp(&self, a: IR<'a>, lo: IR<'a>, hi: IR<'a>) -> IR<'a> {
        self.min(self.max(a, lo), hi)
    }

    /// returns `(2^floor(x), x - floor(x), 2^x)`
    pub fn exp2_approx(&self, x: IR<'a>) -> (IR<'a>, IR<'a>, IR<'a>) {
        let ipart = self.floor(x);
        let fpart = self.sub(x, ipart);
        (self.exp2(ipart), fpart, self.exp2(x))
    }

    /// returns `(2^floor(log2(x)), floor(log2(x)), log2(x))`
    pub fn log2_approx(&self, x: IR<'a>) -> (IR<'a>, IR<'a>, IR<'a>) {
        let log = self.log2(x);
        let floor_log = self.floor(log);
        (self.exp2(floor_log), floor_log, log)
    }

    /// one texel fetch per lane split into its four channels
    pub fn tex(&self, fetch: TexelFetch, coords: [IR<'a>; 3], lod: IR<'a>) -> [IR<'a>; 4] {
        let lod = match fetch.lod {
            LodMode::None => self.zero,
            _ => lod,
        };
        let texel = self.emit(LaneOp::Tex(fetch, coords[0], coords[1], coords[2], lod, ()));
        [
            texel,
            self.emit(LaneOp::TexelChannel(1, texel, ())),
            self.emit(LaneOp::TexelChannel(2, texel, ())),
            self.emit(LaneOp::TexelChannel(3, texel, ())),
        ]
    }
}
