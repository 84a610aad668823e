// ABOUTME: Texture resource manager: the source texture and the intermediate target.
// ABOUTME: Size-keyed slots reuse a resource until its size changes, then destroy and recreate it.

use crate::gpu::GpuContext;

/// Format of the uploaded input. Sampled as-is, without sRGB decoding.
pub const SOURCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// One decoded input frame, tightly packed RGBA8.
#[derive(Debug, Clone)]
pub struct InputFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Input frame has zero size")]
    Empty,

    #[error("Input frame is {width}x{height} but carries {actual} bytes (expected {expected})")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Input frame {width}x{height} exceeds the device limit of {limit}")]
    TooLarge { width: u32, height: u32, limit: u32 },
}

impl InputFrame {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.width == 0 || self.height == 0 {
            return Err(InputError::Empty);
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != expected {
            return Err(InputError::SizeMismatch {
                width: self.width,
                height: self.height,
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// A GPU object with a fixed size that must be released explicitly.
pub trait GpuResource {
    fn size(&self) -> (u32, u32);
    fn destroy(&mut self);
}

/// Holds at most one resource and recreates it only when the requested size changes.
pub struct SizedSlot<T: GpuResource> {
    current: Option<T>,
    allocations: usize,
}

impl<T: GpuResource> Default for SizedSlot<T> {
    fn default() -> Self {
        Self {
            current: None,
            allocations: 0,
        }
    }
}

impl<T: GpuResource> SizedSlot<T> {
    /// Return the resource for `size`, creating it (and destroying the old one) if needed.
    pub fn ensure(&mut self, size: (u32, u32), create: impl FnOnce() -> T) -> &mut T {
        if let Some(old) = self.current.as_mut() {
            if old.size() != size {
                old.destroy();
                self.current = None;
            }
        }
        if self.current.is_none() {
            self.allocations += 1;
        }
        self.current.get_or_insert_with(create)
    }

    pub fn get(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.current.as_mut()
    }

    pub fn is_live(&self) -> bool {
        self.current.is_some()
    }

    /// How many resources this slot has created over its lifetime.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn clear(&mut self) {
        if let Some(mut old) = self.current.take() {
            old.destroy();
        }
    }
}

/// A 2D texture with its default view.
pub struct SizedTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    size: (u32, u32),
}

impl SizedTexture {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        size: (u32, u32),
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            size,
        }
    }

    /// Texture that is rendered into by one pass and sampled by the next.
    pub fn render_target(device: &wgpu::Device, label: &str, size: (u32, u32), format: wgpu::TextureFormat) -> Self {
        Self::new(
            device,
            label,
            size,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }
}

impl GpuResource for SizedTexture {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn destroy(&mut self) {
        self.texture.destroy();
    }
}

/// Owns the source texture and the effect-to-post intermediate.
pub struct TextureManager {
    context: GpuContext,
    format: wgpu::TextureFormat,
    source: SizedSlot<SizedTexture>,
    intermediate: SizedSlot<SizedTexture>,
}

impl TextureManager {
    /// `format` is the output format; the intermediate uses it so one pipeline
    /// per effect serves both the surface and the intermediate.
    pub fn new(context: GpuContext, format: wgpu::TextureFormat) -> Self {
        Self {
            context,
            format,
            source: SizedSlot::default(),
            intermediate: SizedSlot::default(),
        }
    }

    /// Upload a new input. Same-sized frames reuse the existing texture.
    pub fn set_input(&mut self, frame: &InputFrame) -> Result<(), InputError> {
        frame.validate()?;
        let limit = self.context.device.limits().max_texture_dimension_2d;
        if frame.width > limit || frame.height > limit {
            return Err(InputError::TooLarge {
                width: frame.width,
                height: frame.height,
                limit,
            });
        }

        let size = (frame.width, frame.height);
        let device = &self.context.device;
        let reallocating = self.source.get().map(|t| t.size()) != Some(size);
        if reallocating {
            tracing::info!("Allocating source texture {}x{}", frame.width, frame.height);
        }
        let source = self.source.ensure(size, || {
            SizedTexture::new(
                device,
                "Source Texture",
                size,
                SOURCE_FORMAT,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            )
        });

        self.context.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * frame.width),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    pub fn source(&self) -> Option<&SizedTexture> {
        self.source.get()
    }

    /// Intermediate target sized to the output. Recreated only on a size change.
    pub fn ensure_intermediate(&mut self, width: u32, height: u32) -> &wgpu::TextureView {
        let device = &self.context.device;
        let format = self.format;
        &self
            .intermediate
            .ensure((width, height), || {
                tracing::debug!("Allocating intermediate texture {}x{}", width, height);
                SizedTexture::render_target(device, "Intermediate Texture", (width, height), format)
            })
            .view
    }

    /// Source view plus, when `with_intermediate`, the intermediate view for a
    /// `width`x`height` output. `None` until an input has been set.
    pub fn frame_views(
        &mut self,
        width: u32,
        height: u32,
        with_intermediate: bool,
    ) -> Option<(&wgpu::TextureView, Option<&wgpu::TextureView>)> {
        if with_intermediate {
            self.ensure_intermediate(width, height);
        }
        let source = &self.source.get()?.view;
        let intermediate = if with_intermediate {
            self.intermediate.get().map(|t| &t.view)
        } else {
            None
        };
        Some((source, intermediate))
    }

    /// Number of textures currently alive in this manager.
    pub fn live_textures(&self) -> usize {
        self.source.is_live() as usize + self.intermediate.is_live() as usize
    }

    /// Textures created since construction.
    pub fn allocations(&self) -> usize {
        self.source.allocations() + self.intermediate.allocations()
    }

    pub fn destroy(&mut self) {
        self.source.clear();
        self.intermediate.clear();
    }
}
