use crate::{
    DispatchError, LANE_COUNT, LaneContext, LaneInterpreter, Lanes, SoaShader, TexelSource, UNDEF_BITS,
    util::{ThreadPool, dispatch_simd},
};
use std::sync::Mutex;

/// the per-element data of one shader dispatch
#[derive(Clone, Copy)]
pub struct Batch<'a> {
    pub elements: usize,
    /// element major, [`SoaShader::input_registers`] registers per element
    pub inputs: &'a [[f32; 4]],
    pub constants: &'a [[f32; 4]],
    /// elements without coverage start out inactive, `None` means every element is covered
    pub coverage: Option<&'a [bool]>,
    pub texels: &'a dyn TexelSource,
}

/// output registers and final lane mask of every element of a dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderResult {
    num_outputs: usize,
    outputs: Vec<[f32; 4]>,
    mask: Vec<bool>,
}

impl ShaderResult {
    /// `OUT[register]` of `element`, channels the program never wrote read as [`UNDEF_BITS`]
    pub fn output(&self, element: usize, register: usize) -> [f32; 4] {
        self.outputs[element * self.num_outputs + register]
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// whether `element` is still active after every KIL
    pub fn is_active(&self, element: usize) -> bool {
        self.mask[element]
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }
}

struct DispatchJob<'a> {
    first: usize,
    outputs: Mutex<&'a mut [[f32; 4]]>,
    mask: Mutex<&'a mut [bool]>,
}

struct DispatchWorker {
    inputs: Vec<Lanes<LANE_COUNT>>,
    interpreter: LaneInterpreter<LANE_COUNT>,
}

impl DispatchWorker {
    fn new(shader: &SoaShader) -> Self {
        Self {
            inputs: vec![Lanes::UNDEF; shader.input_registers() as usize * 4],
            interpreter: LaneInterpreter::new(shader.varying_registers()),
        }
    }
}

impl SoaShader {
    /// runs the shader over every element of `batch` on the calling thread
    pub fn execute(&self, batch: &Batch) -> Result<ShaderResult, DispatchError> {
        let (constants, uniforms) = self.prepare(batch)?;
        let mut result = self.empty_result(batch);
        let mut worker = DispatchWorker::new(self);

        for (first, outputs, mask) in split_groups(&mut result) {
            dispatch_simd(|| self.run_group(batch, &constants, &uniforms, &mut worker, first, outputs, mask));
        }

        Ok(result)
    }

    /// like [`SoaShader::execute`], lane groups are spread over the threads of `pool`
    #[tracing::instrument(skip_all, fields(elements = batch.elements))]
    pub fn execute_in(&self, pool: &mut ThreadPool, batch: &Batch) -> Result<ShaderResult, DispatchError> {
        let (constants, uniforms) = self.prepare(batch)?;
        let mut result = self.empty_result(batch);

        let jobs = split_groups(&mut result)
            .map(|(first, outputs, mask)| DispatchJob {
                first,
                outputs: Mutex::new(outputs),
                mask: Mutex::new(mask),
            })
            .collect::<Vec<_>>();

        let workers = (0..pool.num_threads())
            .map(|_| Mutex::new(DispatchWorker::new(self)))
            .collect::<Vec<_>>();

        pool.execute(&jobs, |job, thread_idx| {
            let worker = &mut *workers[thread_idx].lock().unwrap();
            let outputs = &mut **job.outputs.lock().unwrap();
            let mask = &mut **job.mask.lock().unwrap();

            dispatch_simd(
                #[inline(always)]
                || self.run_group(batch, &constants, &uniforms, worker, job.first, outputs, mask),
            );
        });

        drop(jobs);
        Ok(result)
    }

    /// validates the batch, flattens the constant buffer and runs the uniform program
    fn prepare(&self, batch: &Batch) -> Result<(Vec<f32>, Vec<u32>), DispatchError> {
        let expected = self.constant_registers() as usize;
        if batch.constants.len() < expected {
            return Err(DispatchError::ConstantCount {
                expected,
                got: batch.constants.len(),
            });
        }

        let expected = self.input_registers() as usize;
        if batch.inputs.len() != batch.elements * expected {
            return Err(DispatchError::InputCount {
                expected,
                got: batch.inputs.len().checked_div(batch.elements).unwrap_or(batch.inputs.len()),
            });
        }

        match batch.coverage {
            Some(coverage) if coverage.len() != batch.elements => {
                return Err(DispatchError::CoverageLength {
                    expected: batch.elements,
                    got: coverage.len(),
                });
            }
            _ => {}
        }

        let constants = batch.constants.iter().flatten().copied().collect::<Vec<_>>();

        let mut interpreter = LaneInterpreter::<1>::new(self.uniform_registers());
        interpreter.execute(&LaneContext {
            ops: self.uniform_opcodes(),
            inputs: &[],
            constants: &constants,
            uniforms: &[],
            coverage: Lanes::splat(u32::MAX),
            texels: batch.texels,
        });

        let uniforms = self
            .uniform_outputs()
            .iter()
            .map(|register| interpreter.register(*register).0[0])
            .collect();

        Ok((constants, uniforms))
    }

    fn empty_result(&self, batch: &Batch) -> ShaderResult {
        ShaderResult {
            num_outputs: self.num_outputs(),
            outputs: vec![[f32::from_bits(UNDEF_BITS); 4]; batch.elements * self.num_outputs()],
            mask: vec![false; batch.elements],
        }
    }

    /// executes the varying program for up to [`LANE_COUNT`] elements starting at `first`
    #[allow(clippy::too_many_arguments)]
    #[inline(always)]
    fn run_group(
        &self,
        batch: &Batch,
        constants: &[f32],
        uniforms: &[u32],
        worker: &mut DispatchWorker,
        first: usize,
        outputs: &mut [[f32; 4]],
        mask: &mut [bool],
    ) {
        let count = mask.len();
        let num_inputs = self.input_registers() as usize;

        // transpose element major inputs into one lane register per input channel
        for (register, lanes) in worker.inputs.chunks_mut(4).enumerate() {
            for (channel, lanes) in lanes.iter_mut().enumerate() {
                for lane in 0..LANE_COUNT {
                    lanes.0[lane] = match lane < count {
                        true => batch.inputs[(first + lane) * num_inputs + register][channel].to_bits(),
                        false => UNDEF_BITS,
                    };
                }
            }
        }

        let mut coverage = Lanes::splat(0);
        for lane in 0..count {
            let covered = batch.coverage.is_none_or(|coverage| coverage[first + lane]);
            coverage.0[lane] = if covered { u32::MAX } else { 0 };
        }

        worker.interpreter.execute(&LaneContext {
            ops: self.varying_opcodes(),
            inputs: &worker.inputs,
            constants,
            uniforms,
            coverage,
            texels: batch.texels,
        });

        let num_outputs = self.num_outputs();
        for index in 0..num_outputs {
            for channel in 0..4 {
                let Some(register) = self.output_register(index, channel) else {
                    continue;
                };

                let lanes = worker.interpreter.register(register).to_f32();
                for lane in 0..count {
                    outputs[lane * num_outputs + index][channel] = lanes[lane];
                }
            }
        }

        let lanes = worker.interpreter.register(self.mask_register());
        for lane in 0..count {
            mask[lane] = lanes.0[lane] != 0;
        }
    }
}

/// splits a result into lane groups of `(first element, outputs, mask)`
fn split_groups(result: &mut ShaderResult) -> impl Iterator<Item = (usize, &mut [[f32; 4]], &mut [bool])> {
    let num_outputs = result.num_outputs;
    let mut outputs = &mut result.outputs[..];

    result.mask.chunks_mut(LANE_COUNT).enumerate().map(move |(group, mask)| {
        let (head, tail) = std::mem::take(&mut outputs).split_at_mut(mask.len() * num_outputs);
        outputs = tail;
        (group * LANE_COUNT, head, mask)
    })
}
