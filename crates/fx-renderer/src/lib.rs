// ABOUTME: GPU side of the effect framework: effect passes, post-processing,
// ABOUTME: texture management and the per-frame orchestrator, all on wgpu.

pub mod ascii;
pub mod atlas;
pub mod effect;
pub mod effects;
pub mod gpu;
pub mod params;
mod pipeline;
pub mod post_process;
pub mod readback;
pub mod renderer;
pub mod shaders;
pub mod textures;

pub use ascii::AsciiEffect;
pub use atlas::{AtlasError, AtlasProvider, BlockAtlasProvider, FontAtlasBuilder};
pub use effect::{Effect, EffectError};
pub use gpu::{GpuContext, GpuState, InitError};
pub use readback::{CapturedFrame, ReadbackError};
pub use renderer::{FrameStatus, RenderError, Renderer};
pub use textures::{InputError, InputFrame};
