use super::{LaneOp, LaneOpcode, LaneReg, LodMode, UNDEF_BITS};

/// supplies texels to `Tex` ops at execution time
pub trait TexelSource: Sync {
    fn fetch_texel(&self, unit: u32, coords: [f32; 3], lod: f32, mode: LodMode) -> [f32; 4];
}

/// texel source for shaders that never sample, every fetch reads as transparent black
pub struct NoTextures;

impl TexelSource for NoTextures {
    fn fetch_texel(&self, _: u32, _: [f32; 3], _: f32, _: LodMode) -> [f32; 4] {
        [0.0; 4]
    }
}

/// one lane register, `N` raw 32 bit values
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(align(64))]
pub struct Lanes<const N: usize>(pub [u32; N]);

impl<const N: usize> Lanes<N> {
    pub const UNDEF: Self = Lanes([UNDEF_BITS; N]);

    pub fn splat(bits: u32) -> Self {
        Lanes([bits; N])
    }

    pub fn from_f32(values: [f32; N]) -> Self {
        Lanes(values.map(f32::to_bits))
    }

    pub fn to_f32(self) -> [f32; N] {
        self.0.map(f32::from_bits)
    }
}

pub struct LaneContext<'a, const N: usize> {
    pub ops: &'a [LaneOpcode],
    /// interpolated inputs, slot `index * 4 + channel`
    pub inputs: &'a [Lanes<N>],
    /// flat constant buffer, slot `index * 4 + channel`
    pub constants: &'a [f32],
    /// results of the uniform program
    pub uniforms: &'a [u32],
    pub coverage: Lanes<N>,
    pub texels: &'a dyn TexelSource,
}

/// conversion between raw lane bits and the value type an op works on
trait LaneValue: Copy {
    fn from_lane(bits: u32) -> Self;
    fn into_lane(self) -> u32;
}

impl LaneValue for f32 {
    #[inline(always)]
    fn from_lane(bits: u32) -> Self {
        f32::from_bits(bits)
    }

    #[inline(always)]
    fn into_lane(self) -> u32 {
        self.to_bits()
    }
}

impl LaneValue for i32 {
    #[inline(always)]
    fn from_lane(bits: u32) -> Self {
        bits as i32
    }

    #[inline(always)]
    fn into_lane(self) -> u32 {
        self as u32
    }
}

impl LaneValue for u32 {
    #[inline(always)]
    fn from_lane(bits: u32) -> Self {
        bits
    }

    #[inline(always)]
    fn into_lane(self) -> u32 {
        self
    }
}

#[inline(always)]
fn mask(holds: bool) -> i32 {
    -(holds as i32)
}

pub struct LaneInterpreter<const N: usize> {
    registers: Vec<Lanes<N>>,
    /// texels fetched by the `Tex` op that last wrote the register of the same index
    texels: Vec<[Lanes<N>; 4]>,
}

impl<const N: usize> LaneInterpreter<N> {
    pub fn new(registers: usize) -> Self {
        Self {
            registers: vec![Lanes::UNDEF; registers],
            texels: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn execute(&mut self, ctx: &LaneContext<N>) {
        use LaneOp::*;

        macro_rules! op {
            ($out:expr, |$($arg:ident: $ty:ty),*| $x:expr) => {{
                $(let $arg = self.registers[$arg as usize];)*
                let out = &mut self.registers[$out as usize];
                for i in 0..N {
                    $(let $arg = <$ty as LaneValue>::from_lane($arg.0[i]);)*
                    out.0[i] = LaneValue::into_lane($x);
                }
            }};
        }

        macro_rules! fill {
            ($out:expr, $value:expr) => {{
                self.registers[$out as usize] = Lanes::splat($value);
            }};
        }

        for op in ctx.ops.iter().copied() {
            let needed = op.output() as usize + 1;
            if self.registers.len() < needed {
                self.registers.resize(needed, Lanes::UNDEF);
            }

            match op {
                Undef(o) => fill!(o, UNDEF_BITS),
                Coverage(o) => self.registers[o as usize] = ctx.coverage,
                MaskAos(bits, o) => {
                    let out = &mut self.registers[o as usize];
                    for i in 0..N {
                        out.0[i] = if bits >> (i % 4) & 1 != 0 { u32::MAX } else { 0 };
                    }
                }

                Input(slot, o) => {
                    self.registers[o as usize] = ctx.inputs.get(slot as usize).copied().unwrap_or(Lanes::UNDEF);
                }
                Constant(slot, o) => fill!(
                    o,
                    ctx.constants.get(slot as usize).map(|x| x.to_bits()).unwrap_or(UNDEF_BITS)
                ),
                Uniform(slot, o) => fill!(o, ctx.uniforms.get(slot as usize).copied().unwrap_or(UNDEF_BITS)),

                LitF(x, o) => fill!(o, x.to_bits()),
                LitI(x, o) => fill!(o, x as u32),

                AddF(a, b, c) => op!(c, |a: f32, b: f32| a + b),
                SubF(a, b, c) => op!(c, |a: f32, b: f32| a - b),
                MulF(a, b, c) => op!(c, |a: f32, b: f32| a * b),
                DivF(a, b, c) => op!(c, |a: f32, b: f32| a / b),
                MinF(a, b, c) => op!(c, |a: f32, b: f32| a.min(b)),
                MaxF(a, b, c) => op!(c, |a: f32, b: f32| a.max(b)),
                PowF(a, b, c) => op!(c, |a: f32, b: f32| a.powf(b)),

                AddCF(x, a, c) => op!(c, |a: f32| x + a),
                MulCF(x, a, c) => op!(c, |a: f32| x * a),
                MinCF(x, a, c) => op!(c, |a: f32| x.min(a)),
                MaxCF(x, a, c) => op!(c, |a: f32| x.max(a)),

                NegF(a, b) => op!(b, |a: f32| -a),
                AbsF(a, b) => op!(b, |a: f32| a.abs()),
                FloorF(a, b) => op!(b, |a: f32| a.floor()),
                RcpF(a, b) => op!(b, |a: f32| a.recip()),
                RsqF(a, b) => op!(b, |a: f32| a.sqrt().recip()),
                Exp2F(a, b) => op!(b, |a: f32| a.exp2()),
                Log2F(a, b) => op!(b, |a: f32| a.log2()),
                SinF(a, b) => op!(b, |a: f32| a.sin()),
                CosF(a, b) => op!(b, |a: f32| a.cos()),

                AndI(a, b, c) => op!(c, |a: u32, b: u32| a & b),
                OrI(a, b, c) => op!(c, |a: u32, b: u32| a | b),
                XorI(a, b, c) => op!(c, |a: u32, b: u32| a ^ b),
                NotI(a, b) => op!(b, |a: u32| !a),

                CmpF(f, a, b, c) => op!(c, |a: f32, b: f32| mask(f.eval_f32(a, b))),
                CmpI(f, a, b, c) => op!(c, |a: i32, b: i32| mask(f.eval_ord(a, b))),
                CmpU(f, a, b, c) => op!(c, |a: u32, b: u32| mask(f.eval_ord(a, b))),

                Select(m, a, b, d) => op!(d, |m: u32, a: u32, b: u32| (m & a) | (!m & b)),

                Tex(fetch, s, t, r, lod, o) => {
                    let (s, t, r, lod) = (
                        self.registers[s as usize].to_f32(),
                        self.registers[t as usize].to_f32(),
                        self.registers[r as usize].to_f32(),
                        self.registers[lod as usize].to_f32(),
                    );

                    if self.texels.len() <= o as usize {
                        self.texels.resize(o as usize + 1, [Lanes::UNDEF; 4]);
                    }

                    let texels = &mut self.texels[o as usize];
                    for i in 0..N {
                        let texel = ctx.texels.fetch_texel(fetch.unit, [s[i], t[i], r[i]], lod[i], fetch.lod);
                        for (channel, value) in texels.iter_mut().zip(texel) {
                            channel.0[i] = value.to_bits();
                        }
                    }
                    self.registers[o as usize] = texels[0];
                }
                TexelChannel(c, t, o) => {
                    self.registers[o as usize] = self
                        .texels
                        .get(t as usize)
                        .map_or(Lanes::UNDEF, |texels| texels[c as usize & 3]);
                }
            }
        }
    }

    pub fn register(&self, id: LaneReg) -> &Lanes<N> {
        &self.registers[id as usize]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::TexelFetch;
    use lanepair_core::CompareFunc;

    #[test]
    fn test_vm() {
        let mut interpreter = LaneInterpreter::<4>::new(3);
        interpreter.execute(&LaneContext {
            ops: &[LaneOp::LitF(1.0, 0), LaneOp::Input(0, 1), LaneOp::AddF(0, 1, 2)],
            inputs: &[Lanes::from_f32([-1.5, 0.0, 1.0, 2.0])],
            constants: &[],
            uniforms: &[],
            coverage: Lanes::splat(u32::MAX),
            texels: &NoTextures,
        });

        assert_eq!(interpreter.register(2).to_f32(), [-0.5, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_in_place_ops() {
        // the register allocator reuses an input register for the output
        let mut interpreter = LaneInterpreter::<2>::new(2);
        interpreter.execute(&LaneContext {
            ops: &[
                LaneOp::Constant(1, 0),
                LaneOp::LitF(2.0, 1),
                LaneOp::MulF(0, 1, 0),
                LaneOp::CmpF(CompareFunc::Greater, 0, 1, 1),
            ],
            inputs: &[],
            constants: &[0.0, 3.0],
            uniforms: &[],
            coverage: Lanes::splat(u32::MAX),
            texels: &NoTextures,
        });

        assert_eq!(interpreter.register(0).to_f32(), [6.0, 6.0]);
        assert_eq!(interpreter.register(1).0, [u32::MAX, u32::MAX]);
    }

    #[test]
    fn test_undef_sources() {
        let mut interpreter = LaneInterpreter::<2>::new(0);
        interpreter.execute(&LaneContext {
            ops: &[LaneOp::Undef(0), LaneOp::Input(7, 1), LaneOp::Constant(9, 2)],
            inputs: &[],
            constants: &[],
            uniforms: &[],
            coverage: Lanes::splat(0),
            texels: &NoTextures,
        });

        for r in 0..3 {
            assert_eq!(interpreter.register(r).0, [UNDEF_BITS; 2]);
        }
    }

    #[test]
    fn test_tex() {
        struct Gradient;
        impl TexelSource for Gradient {
            fn fetch_texel(&self, unit: u32, coords: [f32; 3], lod: f32, _: LodMode) -> [f32; 4] {
                [coords[0], coords[1], lod, unit as f32]
            }
        }

        let fetch = TexelFetch {
            unit: 3,
            num_coords: 2,
            lod: LodMode::Bias,
        };

        let mut interpreter = LaneInterpreter::<2>::new(8);
        interpreter.execute(&LaneContext {
            ops: &[
                LaneOp::Input(0, 0),
                LaneOp::Input(1, 1),
                LaneOp::LitF(0.5, 2),
                LaneOp::Tex(fetch, 0, 1, 1, 2, 6),
                LaneOp::TexelChannel(1, 6, 3),
                LaneOp::TexelChannel(2, 6, 4),
                LaneOp::TexelChannel(3, 6, 5),
            ],
            inputs: &[Lanes::from_f32([0.25, 0.75]), Lanes::from_f32([1.0, 2.0])],
            constants: &[],
            uniforms: &[],
            coverage: Lanes::splat(u32::MAX),
            texels: &Gradient,
        });

        assert_eq!(interpreter.register(3).to_f32(), [1.0, 2.0]);
        assert_eq!(interpreter.register(4).to_f32(), [0.5, 0.5]);
        assert_eq!(interpreter.register(5).to_f32(), [3.0, 3.0]);
        assert_eq!(interpreter.register(6).to_f32(), [0.25, 0.75]);
    }
}
