use crate::{
    Program,
    sched::{PairCodeBuffer, PairTarget, ScheduleError, pair_program},
    soa::{Batch, DispatchError, ShaderId, ShaderResult, SoaBackend, TranslateError},
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// neither the paired schedule nor the lane translator accepted the program
    #[error("no backend accepted the program: {scheduler}; {translator}")]
    Rejected {
        scheduler: ScheduleError,
        translator: TranslateError,
    },
}

/// the code a fragment program was compiled to
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentCode {
    /// native texture blocks and instruction pairs
    Paired(PairCodeBuffer),
    /// lane code owned by the compiler's [`SoaBackend`]
    Lanes(ShaderId),
}

/// compiles fragment programs for a paired-ALU target, falling back to lane code
pub struct FragmentCompiler {
    target: PairTarget,
    software: SoaBackend,
}

impl FragmentCompiler {
    pub fn new(target: PairTarget) -> Self {
        Self::with_backend(target, SoaBackend::new())
    }

    pub fn with_backend(target: PairTarget, software: SoaBackend) -> Self {
        Self { target, software }
    }

    pub fn target(&self) -> &PairTarget {
        &self.target
    }

    pub fn software(&mut self) -> &mut SoaBackend {
        &mut self.software
    }

    #[tracing::instrument(skip_all)]
    pub fn compile(&mut self, program: &Program) -> Result<FragmentCode, CompileError> {
        let mut buffer = PairCodeBuffer::new(self.target.clone());

        let scheduler = match pair_program(program, &mut buffer) {
            Ok(()) => return Ok(FragmentCode::Paired(buffer)),
            Err(err) => err,
        };

        tracing::warn!("paired schedule failed ({scheduler}), using lane code");

        match self.software.create_shader(program) {
            Ok(id) => Ok(FragmentCode::Lanes(id)),
            Err(translator) => Err(CompileError::Rejected { scheduler, translator }),
        }
    }

    /// runs lane code compiled by this compiler
    pub fn dispatch(&mut self, id: ShaderId, batch: &Batch) -> Result<ShaderResult, DispatchError> {
        self.software.dispatch(id, batch)
    }

    /// releases lane code, paired code owns nothing on the compiler
    pub fn release(&mut self, code: FragmentCode) {
        if let FragmentCode::Lanes(id) = code {
            self.software.delete_shader(id);
        }
    }
}

impl Default for FragmentCompiler {
    fn default() -> Self {
        Self::new(PairTarget::default())
    }
}
