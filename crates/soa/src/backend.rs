use crate::{Batch, DispatchError, SamplerSoa, ShaderResult, SoaConfig, SoaShader, TranslateError, util::ThreadPool};
use bumpalo::Bump;
use lanepair_core::Program;
use slotmap::{DefaultKey, Key, KeyData, SlotMap};

/// handle of a shader owned by a [`SoaBackend`]
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct ShaderId(pub u64);

/// owns compiled shaders and the threads they are dispatched on
pub struct SoaBackend {
    shaders: SlotMap<DefaultKey, SoaShader>,
    arena: Bump,
    thread_pool: ThreadPool,
    config: SoaConfig,
}

impl SoaBackend {
    pub fn new() -> Self {
        Self::with_config(SoaConfig::default(), ThreadPool::new())
    }

    pub fn with_config(config: SoaConfig, thread_pool: ThreadPool) -> Self {
        Self {
            shaders: SlotMap::new(),
            arena: Bump::new(),
            thread_pool,
            config,
        }
    }

    pub fn config(&self) -> &SoaConfig {
        &self.config
    }

    pub fn create_shader(&mut self, program: &Program) -> Result<ShaderId, TranslateError> {
        let compiled = SoaShader::compile(&self.arena, program, &self.config);
        self.arena.reset();
        Ok(self.insert(compiled?))
    }

    pub fn create_shader_with_sampler(
        &mut self,
        program: &Program,
        sampler: &mut dyn SamplerSoa,
    ) -> Result<ShaderId, TranslateError> {
        let compiled = SoaShader::compile_with_sampler(&self.arena, program, &self.config, sampler);
        self.arena.reset();
        Ok(self.insert(compiled?))
    }

    /// compiles every program on the rayon pool, each with an arena of its own
    #[cfg(feature = "parallel")]
    pub fn create_shaders(&mut self, programs: &[Program]) -> Vec<Result<ShaderId, TranslateError>> {
        use rayon::prelude::*;

        let config = &self.config;
        let compiled = programs
            .par_iter()
            .map(|program| SoaShader::compile(&Bump::new(), program, config))
            .collect::<Vec<_>>();

        compiled
            .into_iter()
            .map(|shader| shader.map(|shader| self.insert(shader)))
            .collect()
    }

    pub fn delete_shader(&mut self, id: ShaderId) -> bool {
        self.shaders.remove(KeyData::from_ffi(id.0).into()).is_some()
    }

    pub fn shader(&self, id: ShaderId) -> Option<&SoaShader> {
        self.shaders.get(KeyData::from_ffi(id.0).into())
    }

    pub fn dispatch(&mut self, id: ShaderId, batch: &Batch) -> Result<ShaderResult, DispatchError> {
        let shader = self
            .shaders
            .get(KeyData::from_ffi(id.0).into())
            .ok_or(DispatchError::UnknownShader)?;

        shader.execute_in(&mut self.thread_pool, batch)
    }

    fn insert(&mut self, shader: SoaShader) -> ShaderId {
        let key = self.shaders.insert(shader);
        ShaderId(key.data().as_ffi())
    }
}

impl Default for SoaBackend {
    fn default() -> Self {
        Self::new()
    }
}
