// ABOUTME: Post-process compositor: optional bloom (threshold, blur H, blur V) and
// ABOUTME: the final composite of CRT, chromatic, scanlines, grain, phosphor and vignette.

use serde_json::{Map, Value};

use fx_core::params::{FrameInfo, PackParams};
use fx_core::post::{BlurUniforms, CompositeUniforms, ThresholdUniforms};
use fx_core::{merge_options, OptionError, PostProcessOptions};

use crate::gpu::GpuContext;
use crate::params::ParameterBlock;
use crate::pipeline;
use crate::shaders;
use crate::textures::{GpuResource, SizedSlot, SizedTexture};

/// Bloom-only intermediates, all at output size.
#[derive(Default)]
struct BloomTargets {
    /// Threshold output
    bright: SizedSlot<SizedTexture>,
    /// Horizontal blur output
    blur_h: SizedSlot<SizedTexture>,
    /// Vertical blur output, sampled by the composite
    blur_v: SizedSlot<SizedTexture>,
}

impl BloomTargets {
    fn ensure(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat, size: (u32, u32)) {
        if self.bright.get().map(GpuResource::size) != Some(size) {
            tracing::debug!("Allocating bloom textures {}x{}", size.0, size.1);
        }
        self.bright
            .ensure(size, || SizedTexture::render_target(device, "Bloom Bright", size, format));
        self.blur_h
            .ensure(size, || SizedTexture::render_target(device, "Bloom Blur H", size, format));
        self.blur_v
            .ensure(size, || SizedTexture::render_target(device, "Bloom Blur V", size, format));
    }

    fn live(&self) -> usize {
        [&self.bright, &self.blur_h, &self.blur_v]
            .iter()
            .filter(|slot| slot.is_live())
            .count()
    }

    fn allocations(&self) -> usize {
        self.bright.allocations() + self.blur_h.allocations() + self.blur_v.allocations()
    }

    fn clear(&mut self) {
        self.bright.clear();
        self.blur_h.clear();
        self.blur_v.clear();
    }
}

pub struct PostProcessor {
    context: GpuContext,
    format: wgpu::TextureFormat,
    options: PostProcessOptions,

    threshold_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    single_input_layout: wgpu::BindGroupLayout,
    composite_pipeline: wgpu::RenderPipeline,
    composite_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    threshold_params: ParameterBlock<ThresholdUniforms>,
    // Separate blocks: both directions are recorded before the single submit.
    blur_h_params: ParameterBlock<BlurUniforms>,
    blur_v_params: ParameterBlock<BlurUniforms>,
    composite_params: ParameterBlock<CompositeUniforms>,

    targets: BloomTargets,
    /// Bound in place of the bloom texture while bloom is inactive.
    placeholder: SizedTexture,
}

impl PostProcessor {
    pub fn new(context: &GpuContext, format: wgpu::TextureFormat, options: PostProcessOptions) -> Self {
        let device = &context.device;

        let single_input_layout = pipeline::single_input_layout(device, "Bloom Bind Group Layout");
        let threshold_pipeline = pipeline::fullscreen_pipeline(
            device,
            "Bloom Threshold Pipeline",
            shaders::BLOOM_THRESHOLD,
            &single_input_layout,
            format,
        );
        let blur_pipeline = pipeline::fullscreen_pipeline(
            device,
            "Bloom Blur Pipeline",
            shaders::BLOOM_BLUR,
            &single_input_layout,
            format,
        );

        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite Bind Group Layout"),
            entries: &[
                pipeline::uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                // Scene
                pipeline::texture_entry(1, wgpu::ShaderStages::FRAGMENT),
                pipeline::sampler_entry(2, wgpu::ShaderStages::FRAGMENT),
                // Bloom contribution (or placeholder)
                pipeline::texture_entry(3, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let composite_pipeline = pipeline::fullscreen_pipeline(
            device,
            "Composite Pipeline",
            shaders::COMPOSITE,
            &composite_layout,
            format,
        );

        let frame = FrameInfo::new(1, 1, 0.0);
        let threshold_params = ParameterBlock::new(device, "Bloom Threshold Parameters", &options.bloom.pack_threshold());
        let blur_h_params = ParameterBlock::new(device, "Bloom Blur H Parameters", &options.bloom.pack_blur(1, 1, [1.0, 0.0]));
        let blur_v_params = ParameterBlock::new(device, "Bloom Blur V Parameters", &options.bloom.pack_blur(1, 1, [0.0, 1.0]));
        let composite_params = ParameterBlock::new(device, "Composite Parameters", &options.pack(&frame));

        let placeholder = SizedTexture::new(
            device,
            "Bloom Placeholder",
            (1, 1),
            format,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        // Black regardless of channel order.
        context.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &placeholder.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[0, 0, 0, 255],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        Self {
            context: context.clone(),
            format,
            options,
            threshold_pipeline,
            blur_pipeline,
            single_input_layout,
            composite_pipeline,
            composite_layout,
            sampler: pipeline::create_sampler(device, "Post Process Sampler", wgpu::FilterMode::Linear),
            threshold_params,
            blur_h_params,
            blur_v_params,
            composite_params,
            targets: BloomTargets::default(),
            placeholder,
        }
    }

    pub fn options(&self) -> &PostProcessOptions {
        &self.options
    }

    pub fn needs_post(&self) -> bool {
        self.options.needs_post()
    }

    pub fn update_options(&mut self, partial: &Map<String, Value>) -> Result<(), OptionError> {
        self.options = merge_options(&self.options, partial)?;
        Ok(())
    }

    /// Bloom textures currently allocated (0 or 3).
    pub fn live_bloom_textures(&self) -> usize {
        self.targets.live()
    }

    pub fn bloom_allocations(&self) -> usize {
        self.targets.allocations()
    }

    fn single_input_bind_group(&self, label: &str, params: &wgpu::Buffer, input: &wgpu::TextureView) -> wgpu::BindGroup {
        self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.single_input_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Record the post chain: `input` is the effect output, `output` the final target.
    pub fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        input: &wgpu::TextureView,
        output: &wgpu::TextureView,
        frame: &FrameInfo,
    ) {
        let bloom_active = self.options.bloom_active();
        if bloom_active {
            self.render_bloom(encoder, input, frame);
        }

        self.composite_params
            .write(&self.context.queue, &self.options.pack(frame));

        let bloom_view = match self.targets.blur_v.get() {
            Some(texture) if bloom_active => &texture.view,
            _ => &self.placeholder.view,
        };

        let bind_group = self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Bind Group"),
            layout: &self.composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.composite_params.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(bloom_view),
                },
            ],
        });
        pipeline::draw_fullscreen(encoder, "Composite Pass", &self.composite_pipeline, &bind_group, output);
    }

    fn render_bloom(&mut self, encoder: &mut wgpu::CommandEncoder, input: &wgpu::TextureView, frame: &FrameInfo) {
        let size = (frame.width, frame.height);
        self.targets.ensure(&self.context.device, self.format, size);

        let bloom = &self.options.bloom;
        let queue = &self.context.queue;
        self.threshold_params.write(queue, &bloom.pack_threshold());
        self.blur_h_params
            .write(queue, &bloom.pack_blur(frame.width, frame.height, [1.0, 0.0]));
        self.blur_v_params
            .write(queue, &bloom.pack_blur(frame.width, frame.height, [0.0, 1.0]));

        let (Some(bright), Some(blur_h), Some(blur_v)) = (
            self.targets.bright.get(),
            self.targets.blur_h.get(),
            self.targets.blur_v.get(),
        ) else {
            return;
        };

        let threshold_group = self.single_input_bind_group("Bloom Threshold", self.threshold_params.buffer(), input);
        pipeline::draw_fullscreen(encoder, "Bloom Threshold Pass", &self.threshold_pipeline, &threshold_group, &bright.view);

        let blur_h_group = self.single_input_bind_group("Bloom Blur H", self.blur_h_params.buffer(), &bright.view);
        pipeline::draw_fullscreen(encoder, "Bloom Blur H Pass", &self.blur_pipeline, &blur_h_group, &blur_h.view);

        let blur_v_group = self.single_input_bind_group("Bloom Blur V", self.blur_v_params.buffer(), &blur_h.view);
        pipeline::draw_fullscreen(encoder, "Bloom Blur V Pass", &self.blur_pipeline, &blur_v_group, &blur_v.view);
    }

    pub fn destroy(&mut self) {
        self.targets.clear();
        self.placeholder.texture.destroy();
        self.threshold_params.destroy();
        self.blur_h_params.destroy();
        self.blur_v_params.destroy();
        self.composite_params.destroy();
    }
}
