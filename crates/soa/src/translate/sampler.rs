use crate::{IR, LaneBuilder, LodMode, TexelFetch};

/// emits the lane code of a texture sample
pub trait SamplerSoa {
    /// `coords` holds one to three coordinate channels, `lod` is ignored for [`LodMode::None`]
    fn emit_fetch_texel<'a>(
        &mut self,
        bld: &LaneBuilder<'a>,
        unit: u32,
        coords: &[IR<'a>],
        mode: LodMode,
        lod: IR<'a>,
    ) -> [IR<'a>; 4];
}

/// samples through the `TexelSource` handed to the shader at execution time, one vector fetch per sample
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSampler;

impl SamplerSoa for DefaultSampler {
    fn emit_fetch_texel<'a>(
        &mut self,
        bld: &LaneBuilder<'a>,
        unit: u32,
        coords: &[IR<'a>],
        mode: LodMode,
        lod: IR<'a>,
    ) -> [IR<'a>; 4] {
        let coord = |i: usize| coords.get(i).copied().unwrap_or(bld.undef());
        let fetch = TexelFetch {
            unit,
            num_coords: coords.len().min(3) as u8,
            lod: mode,
        };

        bld.tex(fetch, [coord(0), coord(1), coord(2)], lod)
    }
}
