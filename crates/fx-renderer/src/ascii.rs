// ABOUTME: Dual-pass ASCII effect: a compute pass picks one glyph per cell,
// ABOUTME: then a render pass paints the glyphs. Both are recorded on one encoder.

use std::sync::Arc;

use serde_json::{Map, Value};

use fx_core::ascii::{
    grid_dims, AsciiMatchUniforms, AsciiOptions, AsciiPaintUniforms, GridDims, MATCH_ENTRY_SIZE, MAX_GRID_COLS,
    MAX_GRID_ROWS,
};
use fx_core::params::FrameInfo;
use fx_core::{merge_options, EffectKind, EffectOptions};

use crate::atlas::{AtlasProvider, FontAtlas};
use crate::effect::{Effect, EffectError};
use crate::gpu::GpuContext;
use crate::params::ParameterBlock;
use crate::pipeline;
use crate::readback::{read_buffer, ReadbackError};
use crate::shaders;

const WORKGROUP_SIZE: u32 = 8;

pub struct AsciiEffect {
    context: GpuContext,
    options: AsciiOptions,
    atlas_provider: Arc<dyn AtlasProvider + Send + Sync>,
    atlas: FontAtlas,

    match_pipeline: wgpu::ComputePipeline,
    match_layout: wgpu::BindGroupLayout,
    paint_pipeline: wgpu::RenderPipeline,
    paint_layout: wgpu::BindGroupLayout,
    point_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,

    match_params: ParameterBlock<AsciiMatchUniforms>,
    paint_params: ParameterBlock<AsciiPaintUniforms>,
    /// One `u32` glyph index per cell, sized for the largest grid.
    match_result: wgpu::Buffer,

    last_grid: Option<GridDims>,
    warned_clamp: bool,
    destroyed: bool,
}

impl AsciiEffect {
    pub fn new(
        context: &GpuContext,
        format: wgpu::TextureFormat,
        options: AsciiOptions,
        atlas_provider: Arc<dyn AtlasProvider + Send + Sync>,
    ) -> Result<Self, EffectError> {
        options.validate()?;
        let device = &context.device;
        let bitmap = atlas_provider.build(&options.charset)?;
        let atlas = FontAtlas::upload(device, &context.queue, &bitmap)?;

        let match_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ASCII Match Bind Group Layout"),
            entries: &[
                pipeline::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                // Source frame
                pipeline::texture_entry(1, wgpu::ShaderStages::COMPUTE),
                pipeline::sampler_entry(2, wgpu::ShaderStages::COMPUTE),
                // Font atlas
                pipeline::texture_entry(3, wgpu::ShaderStages::COMPUTE),
                // Match result
                pipeline::storage_entry(4, wgpu::ShaderStages::COMPUTE, false),
            ],
        });

        let match_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ASCII Match Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::ASCII_MATCH.into()),
        });
        let match_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ASCII Match Pipeline Layout"),
            bind_group_layouts: &[&match_layout],
            push_constant_ranges: &[],
        });
        let match_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("ASCII Match Pipeline"),
            layout: Some(&match_pipeline_layout),
            module: &match_shader,
            entry_point: Some("cs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let paint_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ASCII Paint Bind Group Layout"),
            entries: &[
                pipeline::uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                pipeline::texture_entry(1, wgpu::ShaderStages::FRAGMENT),
                pipeline::sampler_entry(2, wgpu::ShaderStages::FRAGMENT),
                pipeline::texture_entry(3, wgpu::ShaderStages::FRAGMENT),
                pipeline::storage_entry(4, wgpu::ShaderStages::FRAGMENT, true),
            ],
        });
        let paint_pipeline =
            pipeline::fullscreen_pipeline(device, "ASCII Paint Pipeline", shaders::ASCII_PAINT, &paint_layout, format);

        let initial_grid = grid_dims(1, 1, options.cell_size);
        let frame = FrameInfo::new(1, 1, 0.0);
        let match_params = ParameterBlock::new(
            device,
            "ASCII Match Parameters",
            &options.pack_match(&frame, &atlas.layout, initial_grid),
        );
        let paint_params = ParameterBlock::new(
            device,
            "ASCII Paint Parameters",
            &options.pack_paint(&frame, &atlas.layout, initial_grid),
        );

        let capacity = MAX_GRID_COLS as u64 * MAX_GRID_ROWS as u64 * MATCH_ENTRY_SIZE;
        let match_result = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ASCII Match Result"),
            size: capacity,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        tracing::info!(
            "Created ASCII effect ({} glyphs, match buffer {} KiB)",
            atlas.layout.glyph_count,
            capacity / 1024
        );

        Ok(Self {
            context: context.clone(),
            options,
            atlas_provider,
            atlas,
            match_pipeline,
            match_layout,
            paint_pipeline,
            paint_layout,
            point_sampler: pipeline::create_sampler(device, "ASCII Point Sampler", wgpu::FilterMode::Nearest),
            linear_sampler: pipeline::create_sampler(device, "ASCII Linear Sampler", wgpu::FilterMode::Linear),
            match_params,
            paint_params,
            match_result,
            last_grid: None,
            warned_clamp: false,
            destroyed: false,
        })
    }

    pub fn ascii_options(&self) -> &AsciiOptions {
        &self.options
    }

    /// Copy the most recent frame's glyph indices back to the host, row-major.
    /// Blocks until the GPU has finished that frame.
    pub fn read_matches(&self) -> Result<(GridDims, Vec<u32>), ReadbackError> {
        let grid = self.last_grid.ok_or(ReadbackError::NoFrame)?;
        let size = grid.cells() as u64 * MATCH_ENTRY_SIZE;
        if size == 0 {
            return Ok((grid, Vec::new()));
        }

        let device = &self.context.device;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ASCII Match Readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ASCII Match Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.match_result, 0, &staging, 0, size);
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let bytes = read_buffer(&self.context, &staging)?;
        staging.destroy();
        let indices = bytes
            .chunks_exact(MATCH_ENTRY_SIZE as usize)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok((grid, indices))
    }

    fn rebuild_atlas(&mut self, charset: &str) -> Result<(), EffectError> {
        let bitmap = self.atlas_provider.build(charset)?;
        let atlas = FontAtlas::upload(&self.context.device, &self.context.queue, &bitmap)?;
        self.atlas.destroy();
        self.atlas = atlas;
        tracing::info!("Rebuilt font atlas for {} glyphs", self.atlas.layout.glyph_count);
        Ok(())
    }
}

impl Effect for AsciiEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Ascii
    }

    fn options(&self) -> EffectOptions {
        EffectOptions::Ascii(self.options.clone())
    }

    fn update_options(&mut self, partial: &Map<String, Value>) -> Result<(), EffectError> {
        let merged: AsciiOptions = merge_options(&self.options, partial)?;
        merged.validate()?;
        if merged.charset != self.options.charset {
            self.rebuild_atlas(&merged.charset)?;
        }
        self.options = merged;
        Ok(())
    }

    fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        output: &wgpu::TextureView,
        frame: &FrameInfo,
    ) {
        let grid = grid_dims(frame.width, frame.height, self.options.cell_size);
        if grid.clamped && !self.warned_clamp {
            tracing::warn!(
                "ASCII grid for {}x{} at cell size {} exceeds {}x{}; clamping",
                frame.width,
                frame.height,
                self.options.cell_size,
                MAX_GRID_COLS,
                MAX_GRID_ROWS
            );
            self.warned_clamp = true;
        }

        let queue = &self.context.queue;
        let layout = &self.atlas.layout;
        self.match_params.write(queue, &self.options.pack_match(frame, layout, grid));
        self.paint_params.write(queue, &self.options.pack_paint(frame, layout, grid));

        let device = &self.context.device;
        let match_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ASCII Match Bind Group"),
            layout: &self.match_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.match_params.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&self.atlas.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.match_result.as_entire_binding(),
                },
            ],
        });
        let paint_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ASCII Paint Bind Group"),
            layout: &self.paint_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.paint_params.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&self.atlas.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.match_result.as_entire_binding(),
                },
            ],
        });

        if grid.cells() > 0 {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ASCII Match Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.match_pipeline);
            pass.set_bind_group(0, &match_bind_group, &[]);
            pass.dispatch_workgroups(
                grid.cols.div_ceil(WORKGROUP_SIZE),
                grid.rows.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }

        // Same encoder: the paint pass sees this frame's match result.
        pipeline::draw_fullscreen(encoder, "ASCII Paint Pass", &self.paint_pipeline, &paint_bind_group, output);
        self.last_grid = Some(grid);
    }

    fn parameter_allocations(&self) -> usize {
        self.match_params.allocations() + self.paint_params.allocations()
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.match_params.destroy();
        self.paint_params.destroy();
        self.match_result.destroy();
        self.atlas.destroy();
        self.destroyed = true;
    }

    fn as_ascii(&self) -> Option<&AsciiEffect> {
        Some(self)
    }
}
