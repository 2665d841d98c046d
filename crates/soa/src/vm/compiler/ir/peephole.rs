use super::{IR, IRProgram};
use crate::LaneOp;
use bumpalo::Bump;
use std::collections::HashMap;

/// do peephole optimizations and constant folding on the IR graph
///
/// only rewrites that are bit-exact for every input (including NaN and signed zero) are applied
pub fn optimize_peephole<'a>(program: &IRProgram<'a>, arena: &'a Bump) -> IRProgram<'a> {
    let mut mapping = HashMap::new();
    program.visit_ops(
        arena,
        &mut mapping,
        |mapping, ir, _| !mapping.contains_key(&ir),
        |mapping, ir, _| {
            mapping.insert(ir, single_peephole(arena, ir.map_children(arena, |ir| mapping[&ir])));
        },
    );

    IRProgram {
        outputs: arena.alloc_slice_fill_iter(program.outputs.iter().map(|ir| mapping[ir])),
    }
}

fn single_peephole<'a>(arena: &'a Bump, ir: IR<'a>) -> IR<'a> {
    use LaneOp::*;
    match *ir.0 {
        AddF(a, b, _) => match (a.0, b.0) {
            (LitF(x, _), LitF(y, _)) => IR::new(arena, LitF(x + y, ())),
            (LitF(x, _), _) => IR::new(arena, AddCF(*x, b, ())),
            (_, LitF(y, _)) => IR::new(arena, AddCF(*y, a, ())),
            _ => ir,
        },

        SubF(a, b, _) => match (a.0, b.0) {
            (LitF(x, _), LitF(y, _)) => IR::new(arena, LitF(x - y, ())),
            (_, LitF(y, _)) if *y == 0.0 && y.is_sign_positive() => a,
            _ => ir,
        },

        MulF(a, b, _) => match (a.0, b.0) {
            (LitF(x, _), LitF(y, _)) => IR::new(arena, LitF(x * y, ())),
            (LitF(1.0, _), _) => b,
            (_, LitF(1.0, _)) => a,
            (LitF(x, _), _) => IR::new(arena, MulCF(*x, b, ())),
            (_, LitF(y, _)) => IR::new(arena, MulCF(*y, a, ())),
            _ => ir,
        },

        DivF(a, b, _) => match (a.0, b.0) {
            (LitF(x, _), LitF(y, _)) => IR::new(arena, LitF(x / y, ())),
            (_, LitF(1.0, _)) => a,
            _ => ir,
        },

        MinF(a, b, _) => match (a.0, b.0) {
            (LitF(x, _), LitF(y, _)) => IR::new(arena, LitF(x.min(*y), ())),
            (LitF(x, _), _) => IR::new(arena, MinCF(*x, b, ())),
            (_, LitF(y, _)) => IR::new(arena, MinCF(*y, a, ())),
            _ => ir,
        },

        MaxF(a, b, _) => match (a.0, b.0) {
            (LitF(x, _), LitF(y, _)) => IR::new(arena, LitF(x.max(*y), ())),
            (LitF(x, _), _) => IR::new(arena, MaxCF(*x, b, ())),
            (_, LitF(y, _)) => IR::new(arena, MaxCF(*y, a, ())),
            _ => ir,
        },

        PowF(a, b, _) => match (a.0, b.0) {
            (LitF(x, _), LitF(y, _)) => IR::new(arena, LitF(x.powf(*y), ())),
            (_, LitF(1.0, _)) => a,
            _ => ir,
        },

        NegF(a, _) => match a.0 {
            LitF(x, _) => IR::new(arena, LitF(-x, ())),
            NegF(b, _) => *b,
            _ => ir,
        },

        AbsF(a, _) => match a.0 {
            LitF(x, _) => IR::new(arena, LitF(x.abs(), ())),
            AbsF(_, _) => a,
            NegF(b, _) => IR::new(arena, AbsF(*b, ())),
            _ => ir,
        },

        FloorF(a, _) => match a.0 {
            LitF(x, _) => IR::new(arena, LitF(x.floor(), ())),
            _ => ir,
        },

        RcpF(a, _) => match a.0 {
            LitF(x, _) => IR::new(arena, LitF(x.recip(), ())),
            _ => ir,
        },

        RsqF(a, _) => match a.0 {
            LitF(x, _) => IR::new(arena, LitF(x.sqrt().recip(), ())),
            _ => ir,
        },

        Exp2F(a, _) => match a.0 {
            LitF(x, _) => IR::new(arena, LitF(x.exp2(), ())),
            _ => ir,
        },

        Log2F(a, _) => match a.0 {
            LitF(x, _) => IR::new(arena, LitF(x.log2(), ())),
            _ => ir,
        },

        AndI(a, b, _) => match (a.0, b.0) {
            (LitI(x, _), LitI(y, _)) => IR::new(arena, LitI(x & y, ())),
            (LitI(0, _), _) => a,
            (_, LitI(0, _)) => b,
            (LitI(-1, _), _) => b,
            (_, LitI(-1, _)) => a,
            _ if a == b => a,
            _ => ir,
        },

        OrI(a, b, _) => match (a.0, b.0) {
            (LitI(x, _), LitI(y, _)) => IR::new(arena, LitI(x | y, ())),
            (LitI(0, _), _) => b,
            (_, LitI(0, _)) => a,
            _ if a == b => a,
            _ => ir,
        },

        NotI(a, _) => match a.0 {
            LitI(x, _) => IR::new(arena, LitI(!x, ())),
            NotI(b, _) => *b,
            _ => ir,
        },

        CmpF(func, a, b, _) => match (a.0, b.0) {
            (LitF(x, _), LitF(y, _)) => IR::new(arena, LitI(-(func.eval_f32(*x, *y) as i32), ())),
            _ => ir,
        },

        CmpI(func, a, b, _) => match (a.0, b.0) {
            (LitI(x, _), LitI(y, _)) => IR::new(arena, LitI(-(func.eval_ord(*x, *y) as i32), ())),
            _ => ir,
        },

        CmpU(func, a, b, _) => match (a.0, b.0) {
            (LitI(x, _), LitI(y, _)) => IR::new(arena, LitI(-(func.eval_ord(*x as u32, *y as u32) as i32), ())),
            _ => ir,
        },

        Select(mask, a, b, _) => match mask.0 {
            _ if a == b => a,
            LitI(0, _) => b,
            LitI(-1, _) => a,
            NotI(m, _) => IR::new(arena, Select(*m, b, a, ())),
            MaskAos(0, _) => b,
            MaskAos(15, _) => a,
            _ => ir,
        },

        _ => ir,
    }
}
