// ABOUTME: The effect table: each effect key maps to its shader and options type.
// ABOUTME: `create_effect` builds the GPU side of any effect from its options.

use std::sync::Arc;

use fx_core::single_pass::{
    DitherOptions, EdgeOptions, HalftoneOptions, NoiseOptions, PixelSortOptions, VhsOptions,
};
use fx_core::{EffectKind, EffectOptions};

use crate::ascii::AsciiEffect;
use crate::atlas::AtlasProvider;
use crate::effect::{Effect, EffectError, ShaderEffect, SinglePassEffect};
use crate::gpu::GpuContext;
use crate::shaders;

macro_rules! shader_effect {
    ($name:ident, $kind:ident, $label:literal, $shader:expr, $options:ty) => {
        pub struct $name;

        impl ShaderEffect for $name {
            const KIND: EffectKind = EffectKind::$kind;
            const LABEL: &'static str = $label;
            const SHADER: &'static str = $shader;

            type Options = $options;

            fn wrap(options: $options) -> EffectOptions {
                EffectOptions::$kind(options)
            }
        }
    };
}

shader_effect!(Halftone, Halftone, "Halftone", shaders::HALFTONE, HalftoneOptions);
shader_effect!(Dither, Dither, "Dither", shaders::DITHER, DitherOptions);
shader_effect!(Edges, Edges, "Edge Detection", shaders::EDGES, EdgeOptions);
shader_effect!(PixelSort, PixelSort, "Pixel Sort", shaders::PIXEL_SORT, PixelSortOptions);
shader_effect!(Noise, Noise, "Noise Field", shaders::NOISE, NoiseOptions);
shader_effect!(Vhs, Vhs, "VHS", shaders::VHS, VhsOptions);

/// Build the GPU side of an effect. `atlas` is only consulted by the ASCII effect.
pub fn create_effect(
    context: &GpuContext,
    format: wgpu::TextureFormat,
    options: EffectOptions,
    atlas: &Arc<dyn AtlasProvider + Send + Sync>,
) -> Result<Box<dyn Effect>, EffectError> {
    Ok(match options {
        EffectOptions::Ascii(o) => Box::new(AsciiEffect::new(context, format, o, atlas.clone())?),
        EffectOptions::Halftone(o) => Box::new(SinglePassEffect::<Halftone>::new(context, format, o)),
        EffectOptions::Dither(o) => Box::new(SinglePassEffect::<Dither>::new(context, format, o)),
        EffectOptions::Edges(o) => Box::new(SinglePassEffect::<Edges>::new(context, format, o)),
        EffectOptions::PixelSort(o) => Box::new(SinglePassEffect::<PixelSort>::new(context, format, o)),
        EffectOptions::Noise(o) => Box::new(SinglePassEffect::<Noise>::new(context, format, o)),
        EffectOptions::Vhs(o) => Box::new(SinglePassEffect::<Vhs>::new(context, format, o)),
    })
}
