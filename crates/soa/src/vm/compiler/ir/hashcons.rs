use super::{IR, IRProgram};
use crate::LaneOp;
use bumpalo::Bump;
use lanepair_core::CompareFunc;
use std::{collections::HashMap, hash::Hash, mem::discriminant};

/// common subexpression elimination
/// this is a simple hashconsing pass that will eliminate duplicate IR nodes
pub fn optimize_hashcons<'a>(program: &IRProgram<'a>, arena: &'a Bump) -> IRProgram<'a> {
    let mut forward = HashMap::new();
    let mut reverse = HashMap::new();

    program.visit_ops(
        arena,
        (&mut forward, &mut reverse),
        |(_, reverse), ir, _| !reverse.contains_key(&ir),
        |(forward, reverse), ir, _| {
            let key = IRKey(ir.0.map_inputs(|input| reverse[&input]));
            let normalized = *forward.entry(key).or_insert(ir.map_children(arena, |ir| reverse[&ir]));
            reverse.insert(ir, normalized);
        },
    );

    IRProgram {
        outputs: arena.alloc_slice_fill_iter(program.outputs.iter().map(|ir| reverse[ir])),
    }
}

/// an IR graph node that can be hashed and compared "structurally"
#[derive(Debug)]
struct IRKey<'a>(LaneOp<IR<'a>, ()>);

fn symmetric(func: CompareFunc) -> bool {
    matches!(func, CompareFunc::Equal | CompareFunc::NotEqual)
}

impl<'a> Eq for IRKey<'a> {}
impl<'a> PartialEq for IRKey<'a> {
    fn eq(&self, other: &Self) -> bool {
        use LaneOp::*;
        match (self.0, other.0) {
            (AddF(a, b, _), AddF(x, y, _))
            | (MulF(a, b, _), MulF(x, y, _))
            | (AndI(a, b, _), AndI(x, y, _))
            | (OrI(a, b, _), OrI(x, y, _))
            | (XorI(a, b, _), XorI(x, y, _)) => (a == x && b == y) || (a == y && b == x),

            (CmpF(f, a, b, _), CmpF(g, x, y, _)) | (CmpI(f, a, b, _), CmpI(g, x, y, _)) if f == g && symmetric(f) => {
                (a == x && b == y) || (a == y && b == x)
            }

            (LitF(x, _), LitF(y, _)) => x.to_bits() == y.to_bits(),
            (AddCF(x, a, _), AddCF(y, b, _))
            | (MulCF(x, a, _), MulCF(y, b, _))
            | (MinCF(x, a, _), MinCF(y, b, _))
            | (MaxCF(x, a, _), MaxCF(y, b, _)) => x.to_bits() == y.to_bits() && a == b,

            _ => self.0 == other.0,
        }
    }
}

impl<'a> Hash for IRKey<'a> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        use LaneOp::*;

        discriminant(&self.0).hash(state);
        match self.0 {
            AddF(a, b, _) | MulF(a, b, _) | AndI(a, b, _) | OrI(a, b, _) | XorI(a, b, _) => {
                (a.0 as *const _ as usize ^ b.0 as *const _ as usize).hash(state);
            }

            CmpF(f, a, b, _) | CmpI(f, a, b, _) | CmpU(f, a, b, _) => {
                f.hash(state);
                (a.0 as *const _ as usize ^ b.0 as *const _ as usize).hash(state);
            }

            MaskAos(x, _) => x.hash(state),
            Input(x, _) | Constant(x, _) | Uniform(x, _) => x.hash(state),
            LitF(x, _) => x.to_bits().hash(state),
            LitI(x, _) => x.hash(state),

            AddCF(x, b, _) | MulCF(x, b, _) | MinCF(x, b, _) | MaxCF(x, b, _) => {
                x.to_bits().hash(state);
                b.hash(state);
            }

            Tex(t, ..) => {
                t.hash(state);
                self.0.map_inputs(|i| std::ptr::hash(i.0, state));
            }
            TexelChannel(c, t, _) => {
                c.hash(state);
                std::ptr::hash(t.0, state);
            }

            _ => {
                self.0.map_inputs(|i| std::ptr::hash(i.0, state));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::compiler::ir::{LaneBuilder, LaneType};

    #[test]
    fn test_hashcons() {
        let arena = Bump::new();
        let bld = LaneBuilder::new(&arena, LaneType::F32);

        let a = bld.add(bld.input(0), bld.input(4));
        let b = bld.add(bld.input(4), bld.input(0));
        let c = bld.sub(bld.input(4), bld.input(0));
        let d = bld.sub(bld.input(0), bld.input(4));

        let program = IRProgram::new(&arena, [a, b, c, d]);
        let program = optimize_hashcons(&program, &arena);

        assert_eq!(program.outputs[0], program.outputs[1]);
        assert_ne!(program.outputs[2], program.outputs[3]);
    }

    #[test]
    fn test_nan_literals_merge() {
        let arena = Bump::new();
        let bld = LaneBuilder::new(&arena, LaneType::F32);

        let program = IRProgram::new(&arena, [bld.lit(f32::NAN), bld.lit(f32::NAN), bld.lit(-0.0), bld.lit(0.0)]);
        let program = optimize_hashcons(&program, &arena);

        assert_eq!(program.outputs[0], program.outputs[1]);
        assert_ne!(program.outputs[2], program.outputs[3]);
    }
}
