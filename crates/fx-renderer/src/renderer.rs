// ABOUTME: Frame orchestrator: routes the active effect through the optional
// ABOUTME: post-process chain, one encoder and one submit per frame.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use fx_core::ascii::{ascii_text, GridDims};
use fx_core::{Command, EffectKind, EffectSettings, FrameInfo, OptionError, OptionTarget, PostProcessOptions};

use crate::atlas::AtlasProvider;
use crate::effect::{Effect, EffectError};
use crate::effects::create_effect;
use crate::gpu::GpuContext;
use crate::post_process::PostProcessor;
use crate::readback::{padded_bytes_per_row, read_buffer, CapturedFrame, ReadbackError};
use crate::textures::{GpuResource, InputError, InputFrame, SizedTexture, TextureManager};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("Effect error: {0}")]
    Effect(#[from] EffectError),

    #[error("Option error: {0}")]
    Options(#[from] OptionError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Readback error: {0}")]
    Readback(#[from] ReadbackError),

    #[error("GPU validation error: {0}")]
    Validation(String),
}

/// What a frame actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered,
    /// No input yet; nothing was drawn.
    NoInput,
}

pub struct Renderer {
    context: GpuContext,
    format: wgpu::TextureFormat,
    settings: EffectSettings,
    atlas_provider: Arc<dyn AtlasProvider + Send + Sync>,

    effects: HashMap<EffectKind, Box<dyn Effect>>,
    active: EffectKind,
    textures: TextureManager,
    post: PostProcessor,
}

impl Renderer {
    /// Build the orchestrator with `active` ready to draw. Other effects are
    /// created from `settings` when first selected.
    pub fn new(
        context: GpuContext,
        format: wgpu::TextureFormat,
        settings: EffectSettings,
        post_options: PostProcessOptions,
        active: EffectKind,
        atlas_provider: Arc<dyn AtlasProvider + Send + Sync>,
    ) -> Result<Self, RenderError> {
        let post = PostProcessor::new(&context, format, post_options);
        let textures = TextureManager::new(context.clone(), format);

        let mut renderer = Self {
            context,
            format,
            settings,
            atlas_provider,
            effects: HashMap::new(),
            active,
            textures,
            post,
        };
        renderer.ensure_effect(active)?;
        tracing::info!("Renderer ready ({:?}, active effect {})", format, active.label());
        Ok(renderer)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn active_effect(&self) -> EffectKind {
        self.active
    }

    pub fn effect(&self, kind: EffectKind) -> Option<&dyn Effect> {
        self.effects.get(&kind).map(|e| e.as_ref())
    }

    pub fn post_options(&self) -> &PostProcessOptions {
        self.post.options()
    }

    pub fn textures(&self) -> &TextureManager {
        &self.textures
    }

    pub fn live_bloom_textures(&self) -> usize {
        self.post.live_bloom_textures()
    }

    /// Bloom textures created since construction.
    pub fn bloom_allocations(&self) -> usize {
        self.post.bloom_allocations()
    }

    fn ensure_effect(&mut self, kind: EffectKind) -> Result<&mut Box<dyn Effect>, EffectError> {
        Ok(match self.effects.entry(kind) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                let options = self.settings.options_for(kind);
                slot.insert(create_effect(&self.context, self.format, options, &self.atlas_provider)?)
            }
        })
    }

    pub fn set_input(&mut self, frame: &InputFrame) -> Result<(), RenderError> {
        self.textures.set_input(frame)?;
        Ok(())
    }

    /// Switch effects. The previous effect keeps its resources for a fast switch back.
    pub fn set_active_effect(&mut self, kind: EffectKind) -> Result<(), RenderError> {
        self.ensure_effect(kind)?;
        if self.active != kind {
            tracing::info!("Active effect: {}", kind.label());
        }
        self.active = kind;
        Ok(())
    }

    /// Apply a UI command between frames. A failed update leaves the options unchanged.
    pub fn apply(&mut self, command: Command) -> Result<(), RenderError> {
        if let Command::SetActiveEffect(kind) = command {
            return self.set_active_effect(kind);
        }
        let Some((target, patch)) = command.into_patch() else {
            return Ok(());
        };
        match target {
            OptionTarget::PostProcess => self.post.update_options(&patch)?,
            OptionTarget::Effect(kind) => match self.effects.entry(kind) {
                Entry::Occupied(slot) => slot.into_mut().update_options(&patch)?,
                // Not built yet: create it straight from the configured options plus this patch.
                Entry::Vacant(slot) => {
                    let options = self.settings.options_with(kind, &patch)?;
                    slot.insert(create_effect(&self.context, self.format, options, &self.atlas_provider)?);
                }
            },
        }
        Ok(())
    }

    /// Record the whole frame onto `encoder`, writing `target`.
    fn record(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        frame: &FrameInfo,
    ) -> Result<FrameStatus, RenderError> {
        let needs_post = self.post.needs_post();
        let Some((source, intermediate)) = self.textures.frame_views(frame.width, frame.height, needs_post) else {
            return Ok(FrameStatus::NoInput);
        };

        let effect = match self.effects.entry(self.active) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                let options = self.settings.options_for(self.active);
                slot.insert(create_effect(&self.context, self.format, options, &self.atlas_provider)?)
            }
        };

        match intermediate {
            Some(intermediate) => {
                effect.render(encoder, source, intermediate, frame);
                self.post.render(encoder, intermediate, target, frame);
            }
            None => effect.render(encoder, source, target, frame),
        }
        Ok(FrameStatus::Rendered)
    }

    /// Render one frame into `target` and submit it. Validation errors raised
    /// while recording are returned instead of reaching the uncaptured handler.
    pub fn render_frame(
        &mut self,
        target: &wgpu::TextureView,
        width: u32,
        height: u32,
        time: f32,
    ) -> Result<FrameStatus, RenderError> {
        let frame = FrameInfo::new(width, height, time);
        self.context.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        let status = self.record(&mut encoder, target, &frame);
        self.context.queue.submit(std::iter::once(encoder.finish()));

        if let Some(error) = pollster::block_on(self.context.device.pop_error_scope()) {
            return Err(RenderError::Validation(error.to_string()));
        }
        status
    }

    /// Render the current frame offscreen and read it back.
    pub fn capture_frame(&mut self, width: u32, height: u32, time: f32) -> Result<CapturedFrame, RenderError> {
        if !CapturedFrame::is_capturable(self.format) {
            return Err(ReadbackError::UnsupportedFormat(self.format).into());
        }
        let (width, height) = (width.max(1), height.max(1));
        let device = &self.context.device;
        let mut capture = SizedTexture::new(
            device,
            "Capture Texture",
            (width, height),
            self.format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let padded = padded_bytes_per_row(width);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Readback"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Capture Encoder"),
        });
        let frame = FrameInfo::new(width, height, time);
        let status = self.record(&mut encoder, &capture.view, &frame)?;
        if status == FrameStatus::NoInput {
            capture.destroy();
            buffer.destroy();
            return Err(ReadbackError::NoFrame.into());
        }

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &capture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let data = read_buffer(&self.context, &buffer);
        capture.destroy();
        buffer.destroy();
        tracing::info!("Captured {}x{} frame", width, height);

        Ok(CapturedFrame {
            width,
            height,
            padded_bytes_per_row: padded,
            format: self.format,
            data: data?,
        })
    }

    /// Glyph indices of the ASCII effect's latest frame.
    pub fn read_matches(&self) -> Result<(GridDims, Vec<u32>), ReadbackError> {
        self.effects
            .get(&EffectKind::Ascii)
            .and_then(|e| e.as_ascii())
            .ok_or(ReadbackError::NoFrame)?
            .read_matches()
    }

    /// The ASCII effect's latest frame as lines of text.
    pub fn ascii_text(&self) -> Result<String, ReadbackError> {
        let ascii = self
            .effects
            .get(&EffectKind::Ascii)
            .and_then(|e| e.as_ascii())
            .ok_or(ReadbackError::NoFrame)?;
        let (grid, indices) = ascii.read_matches()?;
        Ok(ascii_text(&indices, grid, &ascii.ascii_options().charset))
    }

    /// Release every GPU resource. Further frames report `NoInput`.
    pub fn destroy(&mut self) {
        for effect in self.effects.values_mut() {
            effect.destroy();
        }
        self.effects.clear();
        self.post.destroy();
        self.textures.destroy();
        tracing::info!("Renderer resources released");
    }
}
