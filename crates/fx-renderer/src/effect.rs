// ABOUTME: The effect interface the frame orchestrator drives, plus the generic
// ABOUTME: single-pass effect: one fragment shader, one parameter block, one draw.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use fx_core::params::{FrameInfo, PackParams};
use fx_core::{merge_options, EffectKind, EffectOptions, OptionError};

use crate::atlas::AtlasError;
use crate::gpu::GpuContext;
use crate::params::ParameterBlock;
use crate::pipeline;

#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    #[error(transparent)]
    Options(#[from] OptionError),

    #[error(transparent)]
    Atlas(#[from] AtlasError),
}

pub trait Effect {
    fn kind(&self) -> EffectKind;

    /// Current options, as the tagged union.
    fn options(&self) -> EffectOptions;

    /// Merge a partial record over the current options. GPU resources are
    /// untouched; the next `render` picks the change up.
    fn update_options(&mut self, partial: &Map<String, Value>) -> Result<(), EffectError>;

    /// Record this effect's passes onto `encoder`, reading `source` and writing `output`.
    fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        output: &wgpu::TextureView,
        frame: &FrameInfo,
    );

    /// Uniform buffers created for this effect's parameter blocks.
    fn parameter_allocations(&self) -> usize;

    /// Release GPU resources. Safe to call more than once.
    fn destroy(&mut self);

    /// Downcast hook for the ASCII effect's match readback.
    fn as_ascii(&self) -> Option<&crate::ascii::AsciiEffect> {
        None
    }
}

/// A render-only effect: a fragment body plus an options type that packs itself.
pub trait ShaderEffect {
    const KIND: EffectKind;
    const LABEL: &'static str;
    /// Full WGSL module (shared vertex stage + fragment body).
    const SHADER: &'static str;

    type Options: PackParams + Serialize + DeserializeOwned + Clone;

    fn wrap(options: Self::Options) -> EffectOptions;
}

pub struct SinglePassEffect<E: ShaderEffect> {
    context: GpuContext,
    options: E::Options,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    params: ParameterBlock<<E::Options as PackParams>::Uniforms>,
}

impl<E: ShaderEffect> SinglePassEffect<E> {
    pub fn new(context: &GpuContext, format: wgpu::TextureFormat, options: E::Options) -> Self {
        let device = &context.device;
        let bind_group_layout = pipeline::single_input_layout(device, E::LABEL);
        let pipeline = pipeline::fullscreen_pipeline(device, E::LABEL, E::SHADER, &bind_group_layout, format);
        let sampler = pipeline::create_sampler(device, E::LABEL, wgpu::FilterMode::Linear);
        let params = ParameterBlock::new(device, E::LABEL, &options.pack(&FrameInfo::new(1, 1, 0.0)));
        tracing::debug!("Created {} effect", E::LABEL);

        Self {
            context: context.clone(),
            options,
            pipeline,
            bind_group_layout,
            sampler,
            params,
        }
    }
}

impl<E: ShaderEffect> Effect for SinglePassEffect<E> {
    fn kind(&self) -> EffectKind {
        E::KIND
    }

    fn options(&self) -> EffectOptions {
        E::wrap(self.options.clone())
    }

    fn update_options(&mut self, partial: &Map<String, Value>) -> Result<(), EffectError> {
        self.options = merge_options(&self.options, partial)?;
        Ok(())
    }

    fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        output: &wgpu::TextureView,
        frame: &FrameInfo,
    ) {
        self.params.write(&self.context.queue, &self.options.pack(frame));

        let bind_group = self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(E::LABEL),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        pipeline::draw_fullscreen(encoder, E::LABEL, &self.pipeline, &bind_group, output);
    }

    fn parameter_allocations(&self) -> usize {
        self.params.allocations()
    }

    fn destroy(&mut self) {
        self.params.destroy();
    }
}
