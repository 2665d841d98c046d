use super::{IR, IRProgram};
use crate::LaneOp;
use bumpalo::Bump;
use std::collections::HashMap;

/// split the IR graph into 2 parts: a "uniform" per dispatch graph, and a "varying" per lane graph
///
/// the uniform graph only depends on constants and literals, so it is executed once with a single lane,
/// its outputs are read back by the varying graph through `Uniform(slot)` ops
pub fn split_uniform_varying<'a>(program: &IRProgram<'a>, arena: &'a Bump) -> (IRProgram<'a>, IRProgram<'a>) {
    let mut varying = HashMap::new();

    program.visit_ops(
        arena,
        &mut varying,
        |mapping, ir, _| !mapping.contains_key(&ir),
        |mapping, ir, _| {
            let is_varying = ir.0.is_lane_varying() || {
                let mut result = false;
                ir.visit_children(|i| {
                    if mapping[&i] {
                        result = true;
                    }
                });
                result
            };

            mapping.insert(ir, is_varying);
        },
    );

    let mut boundary = Vec::new();
    let mut mapping = HashMap::new();

    program.visit_ops(
        arena,
        &mut mapping,
        |mapping, ir, from| !mapping.contains_key(&ir) && from.map(|from| varying[&from]).unwrap_or(true),
        |mapping, ir, _| {
            if varying[&ir] || !can_be_a_boundary(&ir) {
                mapping.insert(ir, ir.map_children(arena, |ir| mapping[&ir]));
            } else {
                let boundary_idx = boundary.len();
                boundary.push(ir);
                mapping.insert(ir, IR::new(arena, LaneOp::Uniform(boundary_idx as u32, ())));
            }
        },
    );

    let program_uniform = IRProgram {
        outputs: arena.alloc_slice_fill_iter(boundary.iter().copied()),
    };

    let program_varying = IRProgram {
        outputs: arena.alloc_slice_fill_iter(program.outputs.iter().map(|ir| mapping[ir])),
    };

    (program_uniform, program_varying)
}

fn can_be_a_boundary(ir: &IR) -> bool {
    !matches!(
        ir.0,
        LaneOp::LitF(_, _) | LaneOp::LitI(_, _) | LaneOp::Undef(_) | LaneOp::Constant(_, _) | LaneOp::Uniform(_, _)
    )
}
