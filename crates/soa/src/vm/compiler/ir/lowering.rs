use super::{IRProgram, LaneProgram};
use crate::TranslateError;
use bumpalo::{Bump, collections::Vec};
use std::collections::HashMap;

/// register allocation and lowering to executable lane ops
///
/// `limit` is the number of lane registers the interpreter may use, at most 256
pub fn lower_to_opcodes<'a>(
    program: &IRProgram<'a>,
    arena: &'a Bump,
    limit: usize,
) -> Result<LaneProgram<'a>, TranslateError> {
    let limit = limit.min(256);

    // collect ops in dfs post order and count output edges, program outputs count as an edge too
    let mut ops = Vec::new_in(arena);
    let mut edges = HashMap::new();

    program.visit_ops(
        arena,
        (),
        |_, ir, _| {
            let edges = edges.entry(ir).or_insert(0usize);
            *edges += 1;
            *edges == 1
        },
        |_, ir, _| {
            ops.push(ir);
        },
    );

    // first fit allocation, the output register is taken before the inputs are released
    let mut registers = HashMap::new();
    let mut state = Vec::new_in(arena);

    for op in ops.iter().copied() {
        let output_register = match state.iter().position(|x| !x) {
            Some(register) => {
                state[register] = true;
                register
            }
            None => {
                if state.len() >= limit {
                    return Err(TranslateError::TooManyRegisters {
                        needed: state.len() + 1,
                        limit,
                    });
                }
                state.push(true);
                state.len() - 1
            }
        };

        registers.insert(op, output_register as u8);

        op.visit_children(|input| {
            let register = registers[&input];
            let edges = edges.entry(input).or_default();
            *edges -= 1;
            if *edges == 0 {
                state[register as usize] = false;
            }
        });
    }

    let mut opcodes = Vec::with_capacity_in(ops.len(), arena);
    let mut outputs = Vec::with_capacity_in(program.outputs.len(), arena);

    for op in ops.iter().copied() {
        opcodes.push(
            op.0.map_inputs(|input| registers[&input])
                .map_outputs(|_| registers[&op]),
        );
    }

    for output in program.outputs.iter().copied() {
        outputs.push(registers[&output]);
    }

    tracing::trace!(ops = opcodes.len(), registers = state.len(), "lowered lane program");

    Ok(LaneProgram {
        opcodes,
        outputs,
        registers: state.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LaneOp;
    use crate::vm::compiler::ir::{LaneBuilder, LaneType};

    #[test]
    fn test_register_reuse() {
        let arena = Bump::new();
        let bld = LaneBuilder::new(&arena, LaneType::F32);

        // a chain only ever needs two live registers
        let mut value = bld.input(0);
        for i in 1..32 {
            value = bld.add(value, bld.input(i));
        }

        let program = lower_to_opcodes(&IRProgram::new(&arena, [value]), &arena, 256).unwrap();
        assert!(program.registers <= 3, "{} registers", program.registers);
        assert_eq!(program.outputs.len(), 1);
        assert!(matches!(program.opcodes.last(), Some(LaneOp::AddF(..))));
    }

    #[test]
    fn test_outputs_stay_live() {
        let arena = Bump::new();
        let bld = LaneBuilder::new(&arena, LaneType::F32);

        let a = bld.input(0);
        let b = bld.neg(a);
        let c = bld.abs(b);

        let program = lower_to_opcodes(&IRProgram::new(&arena, [a, b, c]), &arena, 256).unwrap();
        let outputs = program.outputs.as_slice();
        assert_ne!(outputs[0], outputs[1]);
        assert_ne!(outputs[1], outputs[2]);
        assert_ne!(outputs[0], outputs[2]);
    }

    #[test]
    fn test_too_many_registers() {
        let arena = Bump::new();
        let bld = LaneBuilder::new(&arena, LaneType::F32);

        let values: std::vec::Vec<_> = (0..8).map(|i| bld.input(i)).collect();
        let result = lower_to_opcodes(&IRProgram::new(&arena, values), &arena, 4);
        assert_eq!(result.unwrap_err(), TranslateError::TooManyRegisters { needed: 5, limit: 4 });
    }
}
