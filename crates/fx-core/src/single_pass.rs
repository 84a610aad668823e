// ABOUTME: Options and parameter blocks of the single-pass effects.
// ABOUTME: Each block mirrors the uniform struct declared in the effect's fragment shader.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::param_field;
use crate::params::{flag, FrameInfo, PackParams, ParamLayout};
use crate::Color;

// ---------------------------------------------------------------------------
// Halftone
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HalftoneOptions {
    /// Dot grid pitch in pixels
    pub dot_size: f32,
    /// Screen angle in degrees
    pub angle: f32,
    pub ink: Color,
    pub paper: Color,
    /// Color dots with the source instead of `ink`
    pub use_original_colors: bool,
}

impl Default for HalftoneOptions {
    fn default() -> Self {
        Self {
            dot_size: 8.0,
            angle: 45.0,
            ink: Color::BLACK,
            paper: Color::rgb(0.96, 0.94, 0.88),
            use_original_colors: false,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct HalftoneUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub dot_size: f32,
    pub angle: f32,
    pub use_original_colors: u32,
    pub _pad0: f32,
    pub _pad1: f32,
    pub ink: [f32; 4],
    pub paper: [f32; 4],
}

impl PackParams for HalftoneOptions {
    type Uniforms = HalftoneUniforms;

    const LAYOUT: ParamLayout = ParamLayout {
        struct_name: "HalftoneUniforms",
        size: std::mem::size_of::<HalftoneUniforms>(),
        fields: &[
            param_field!(HalftoneUniforms, resolution, Vec2F),
            param_field!(HalftoneUniforms, time, F32),
            param_field!(HalftoneUniforms, dot_size, F32),
            param_field!(HalftoneUniforms, angle, F32),
            param_field!(HalftoneUniforms, use_original_colors, U32),
            param_field!(HalftoneUniforms, _pad0, F32),
            param_field!(HalftoneUniforms, _pad1, F32),
            param_field!(HalftoneUniforms, ink, Vec4F),
            param_field!(HalftoneUniforms, paper, Vec4F),
        ],
    };

    fn pack(&self, frame: &FrameInfo) -> HalftoneUniforms {
        HalftoneUniforms {
            resolution: frame.resolution(),
            time: frame.time,
            dot_size: self.dot_size.max(1.0),
            angle: self.angle.to_radians(),
            use_original_colors: flag(self.use_original_colors),
            _pad0: 0.0,
            _pad1: 0.0,
            ink: self.ink.to_array(),
            paper: self.paper.to_array(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ordered dither
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DitherOptions {
    /// Output levels per channel (2 = 1-bit)
    pub levels: u32,
    /// Bayer matrix size: 2, 4 or 8
    pub matrix_size: u32,
    /// Size of one dither pixel in screen pixels
    pub pixel_scale: f32,
    pub use_original_colors: bool,
    pub dark: Color,
    pub light: Color,
}

impl Default for DitherOptions {
    fn default() -> Self {
        Self {
            levels: 2,
            matrix_size: 4,
            pixel_scale: 2.0,
            use_original_colors: false,
            dark: Color::rgb(0.08, 0.09, 0.12),
            light: Color::rgb(0.85, 0.9, 0.8),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DitherUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub levels: u32,
    pub matrix_size: u32,
    pub pixel_scale: f32,
    pub use_original_colors: u32,
    pub _pad0: u32,
    pub dark: [f32; 4],
    pub light: [f32; 4],
}

impl PackParams for DitherOptions {
    type Uniforms = DitherUniforms;

    const LAYOUT: ParamLayout = ParamLayout {
        struct_name: "DitherUniforms",
        size: std::mem::size_of::<DitherUniforms>(),
        fields: &[
            param_field!(DitherUniforms, resolution, Vec2F),
            param_field!(DitherUniforms, time, F32),
            param_field!(DitherUniforms, levels, U32),
            param_field!(DitherUniforms, matrix_size, U32),
            param_field!(DitherUniforms, pixel_scale, F32),
            param_field!(DitherUniforms, use_original_colors, U32),
            param_field!(DitherUniforms, _pad0, U32),
            param_field!(DitherUniforms, dark, Vec4F),
            param_field!(DitherUniforms, light, Vec4F),
        ],
    };

    fn pack(&self, frame: &FrameInfo) -> DitherUniforms {
        // Only 2, 4 and 8 have Bayer tables in the shader.
        let matrix_size = match self.matrix_size {
            0..=2 => 2,
            3..=4 => 4,
            _ => 8,
        };
        DitherUniforms {
            resolution: frame.resolution(),
            time: frame.time,
            levels: self.levels.max(2),
            matrix_size,
            pixel_scale: self.pixel_scale.max(1.0),
            use_original_colors: flag(self.use_original_colors),
            _pad0: 0,
            dark: self.dark.to_array(),
            light: self.light.to_array(),
        }
    }
}

// ---------------------------------------------------------------------------
// Edge detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeOptions {
    /// Sobel magnitude below which a pixel is not an edge
    pub threshold: f32,
    pub strength: f32,
    pub invert: bool,
    /// Draw edges over the source instead of over `background`
    pub overlay: bool,
    pub edge_color: Color,
    pub background: Color,
}

impl Default for EdgeOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            strength: 1.0,
            invert: false,
            overlay: false,
            edge_color: Color::WHITE,
            background: Color::BLACK,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct EdgeUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub threshold: f32,
    pub strength: f32,
    pub invert: u32,
    pub overlay: u32,
    pub _pad0: u32,
    pub edge_color: [f32; 4],
    pub background: [f32; 4],
}

impl PackParams for EdgeOptions {
    type Uniforms = EdgeUniforms;

    const LAYOUT: ParamLayout = ParamLayout {
        struct_name: "EdgeUniforms",
        size: std::mem::size_of::<EdgeUniforms>(),
        fields: &[
            param_field!(EdgeUniforms, resolution, Vec2F),
            param_field!(EdgeUniforms, time, F32),
            param_field!(EdgeUniforms, threshold, F32),
            param_field!(EdgeUniforms, strength, F32),
            param_field!(EdgeUniforms, invert, U32),
            param_field!(EdgeUniforms, overlay, U32),
            param_field!(EdgeUniforms, _pad0, U32),
            param_field!(EdgeUniforms, edge_color, Vec4F),
            param_field!(EdgeUniforms, background, Vec4F),
        ],
    };

    fn pack(&self, frame: &FrameInfo) -> EdgeUniforms {
        EdgeUniforms {
            resolution: frame.resolution(),
            time: frame.time,
            threshold: self.threshold.clamp(0.0, 1.0),
            strength: self.strength,
            invert: flag(self.invert),
            overlay: flag(self.overlay),
            _pad0: 0,
            edge_color: self.edge_color.to_array(),
            background: self.background.to_array(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pixel sort
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelSortOptions {
    /// Pixels with luma inside [low, high] form sortable spans
    pub threshold_low: f32,
    pub threshold_high: f32,
    /// Longest span considered, in pixels
    pub span: u32,
    pub direction: SortDirection,
    pub reverse: bool,
}

impl Default for PixelSortOptions {
    fn default() -> Self {
        Self {
            threshold_low: 0.25,
            threshold_high: 0.8,
            span: 48,
            direction: SortDirection::Horizontal,
            reverse: false,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct PixelSortUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub threshold_low: f32,
    pub threshold_high: f32,
    pub span: u32,
    pub vertical: u32,
    pub reverse: u32,
}

/// The fragment shader walks the span one texel at a time.
pub const MAX_SORT_SPAN: u32 = 128;

impl PackParams for PixelSortOptions {
    type Uniforms = PixelSortUniforms;

    const LAYOUT: ParamLayout = ParamLayout {
        struct_name: "PixelSortUniforms",
        size: std::mem::size_of::<PixelSortUniforms>(),
        fields: &[
            param_field!(PixelSortUniforms, resolution, Vec2F),
            param_field!(PixelSortUniforms, time, F32),
            param_field!(PixelSortUniforms, threshold_low, F32),
            param_field!(PixelSortUniforms, threshold_high, F32),
            param_field!(PixelSortUniforms, span, U32),
            param_field!(PixelSortUniforms, vertical, U32),
            param_field!(PixelSortUniforms, reverse, U32),
        ],
    };

    fn pack(&self, frame: &FrameInfo) -> PixelSortUniforms {
        let low = self.threshold_low.clamp(0.0, 1.0);
        PixelSortUniforms {
            resolution: frame.resolution(),
            time: frame.time,
            threshold_low: low,
            threshold_high: self.threshold_high.clamp(low, 1.0),
            span: self.span.clamp(1, MAX_SORT_SPAN),
            vertical: flag(self.direction == SortDirection::Vertical),
            reverse: flag(self.reverse),
        }
    }
}

// ---------------------------------------------------------------------------
// Procedural noise
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseOptions {
    /// Noise frequency across the shorter screen axis
    pub scale: f32,
    /// Animation speed in noise units per second
    pub speed: f32,
    /// Fractal octaves, 1-8
    pub octaves: u32,
    /// How strongly the noise displaces and tints the source
    pub intensity: f32,
    pub tint: Color,
}

impl Default for NoiseOptions {
    fn default() -> Self {
        Self {
            scale: 4.0,
            speed: 0.3,
            octaves: 4,
            intensity: 0.5,
            tint: Color::rgb(0.4, 0.7, 1.0),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct NoiseUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub scale: f32,
    pub speed: f32,
    pub octaves: u32,
    pub intensity: f32,
    pub _pad0: f32,
    pub tint: [f32; 4],
}

impl PackParams for NoiseOptions {
    type Uniforms = NoiseUniforms;

    const LAYOUT: ParamLayout = ParamLayout {
        struct_name: "NoiseUniforms",
        size: std::mem::size_of::<NoiseUniforms>(),
        fields: &[
            param_field!(NoiseUniforms, resolution, Vec2F),
            param_field!(NoiseUniforms, time, F32),
            param_field!(NoiseUniforms, scale, F32),
            param_field!(NoiseUniforms, speed, F32),
            param_field!(NoiseUniforms, octaves, U32),
            param_field!(NoiseUniforms, intensity, F32),
            param_field!(NoiseUniforms, _pad0, F32),
            param_field!(NoiseUniforms, tint, Vec4F),
        ],
    };

    fn pack(&self, frame: &FrameInfo) -> NoiseUniforms {
        NoiseUniforms {
            resolution: frame.resolution(),
            time: frame.time,
            scale: self.scale.max(0.01),
            speed: self.speed,
            octaves: self.octaves.clamp(1, 8),
            intensity: self.intensity.clamp(0.0, 1.0),
            _pad0: 0.0,
            tint: self.tint.to_array(),
        }
    }
}

// ---------------------------------------------------------------------------
// VHS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VhsOptions {
    /// Height and strength of the rolling tracking band
    pub tracking: f32,
    /// Horizontal chroma smear in pixels
    pub color_bleed: f32,
    /// Tape noise amount
    pub noise: f32,
    /// Line wobble in pixels
    pub wobble: f32,
    pub saturation: f32,
}

impl Default for VhsOptions {
    fn default() -> Self {
        Self {
            tracking: 0.3,
            color_bleed: 3.0,
            noise: 0.15,
            wobble: 1.5,
            saturation: 0.85,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct VhsUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub tracking: f32,
    pub color_bleed: f32,
    pub noise: f32,
    pub wobble: f32,
    pub saturation: f32,
}

impl PackParams for VhsOptions {
    type Uniforms = VhsUniforms;

    const LAYOUT: ParamLayout = ParamLayout {
        struct_name: "VhsUniforms",
        size: std::mem::size_of::<VhsUniforms>(),
        fields: &[
            param_field!(VhsUniforms, resolution, Vec2F),
            param_field!(VhsUniforms, time, F32),
            param_field!(VhsUniforms, tracking, F32),
            param_field!(VhsUniforms, color_bleed, F32),
            param_field!(VhsUniforms, noise, F32),
            param_field!(VhsUniforms, wobble, F32),
            param_field!(VhsUniforms, saturation, F32),
        ],
    };

    fn pack(&self, frame: &FrameInfo) -> VhsUniforms {
        VhsUniforms {
            resolution: frame.resolution(),
            time: frame.time,
            tracking: self.tracking.clamp(0.0, 1.0),
            color_bleed: self.color_bleed.max(0.0),
            noise: self.noise.clamp(0.0, 1.0),
            wobble: self.wobble.max(0.0),
            saturation: self.saturation.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{read_f32, read_u32, read_vec4};

    const FRAME: FrameInfo = FrameInfo {
        width: 800,
        height: 600,
        time: 2.0,
    };

    fn assert_layout<P: PackParams>() {
        let layout = P::LAYOUT;
        assert!(layout.is_aligned(), "{} is not 16-byte aligned", layout.struct_name);
        assert!(layout.is_consistent(), "{} has overlapping fields", layout.struct_name);
        assert_eq!(layout.size, std::mem::size_of::<P::Uniforms>());
    }

    #[test]
    fn every_block_is_aligned() {
        assert_layout::<HalftoneOptions>();
        assert_layout::<DitherOptions>();
        assert_layout::<EdgeOptions>();
        assert_layout::<PixelSortOptions>();
        assert_layout::<NoiseOptions>();
        assert_layout::<VhsOptions>();
    }

    #[test]
    fn halftone_golden_offsets() {
        let options = HalftoneOptions {
            dot_size: 10.0,
            angle: 90.0,
            ink: Color::rgb(0.1, 0.2, 0.3),
            paper: Color::WHITE,
            use_original_colors: true,
        };
        let packed = options.pack(&FRAME);
        let bytes = bytemuck::bytes_of(&packed);
        let layout = HalftoneOptions::LAYOUT;

        assert_eq!(layout.field("resolution").unwrap().offset, 0);
        assert_eq!(read_f32(&layout, bytes, "time"), Some(2.0));
        assert_eq!(layout.field("dot_size").unwrap().offset, 12);
        assert_eq!(read_f32(&layout, bytes, "dot_size"), Some(10.0));
        assert_eq!(read_f32(&layout, bytes, "angle"), Some(90.0_f32.to_radians()));
        assert_eq!(read_u32(&layout, bytes, "use_original_colors"), Some(1));
        assert_eq!(layout.field("ink").unwrap().offset, 32);
        assert_eq!(read_vec4(&layout, bytes, "ink"), Some([0.1, 0.2, 0.3, 1.0]));
        assert_eq!(layout.field("paper").unwrap().offset, 48);
        assert_eq!(layout.size, 64);
    }

    #[test]
    fn dither_snaps_matrix_size() {
        let mut options = DitherOptions::default();
        options.matrix_size = 3;
        assert_eq!(options.pack(&FRAME).matrix_size, 4);
        options.matrix_size = 16;
        assert_eq!(options.pack(&FRAME).matrix_size, 8);
        options.matrix_size = 0;
        assert_eq!(options.pack(&FRAME).matrix_size, 2);

        let bytes = bytemuck::bytes_of(&options.pack(&FRAME)).to_vec();
        let layout = DitherOptions::LAYOUT;
        assert_eq!(layout.field("levels").unwrap().offset, 12);
        assert_eq!(read_u32(&layout, &bytes, "levels"), Some(2));
        assert_eq!(layout.field("dark").unwrap().offset, 32);
    }

    #[test]
    fn edge_golden_offsets() {
        let options = EdgeOptions {
            threshold: 0.25,
            invert: true,
            ..Default::default()
        };
        let bytes = bytemuck::bytes_of(&options.pack(&FRAME)).to_vec();
        let layout = EdgeOptions::LAYOUT;
        assert_eq!(layout.field("threshold").unwrap().offset, 12);
        assert_eq!(read_f32(&layout, &bytes, "threshold"), Some(0.25));
        assert_eq!(read_u32(&layout, &bytes, "invert"), Some(1));
        assert_eq!(read_vec4(&layout, &bytes, "background"), Some([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn pixel_sort_clamps_span_and_thresholds() {
        let options = PixelSortOptions {
            threshold_low: 0.6,
            threshold_high: 0.2,
            span: 10_000,
            direction: SortDirection::Vertical,
            reverse: false,
        };
        let packed = options.pack(&FRAME);
        assert_eq!(packed.span, MAX_SORT_SPAN);
        assert_eq!(packed.threshold_high, 0.6);
        assert_eq!(packed.vertical, 1);
        assert_eq!(PixelSortOptions::LAYOUT.size, 32);
    }

    #[test]
    fn noise_and_vhs_golden_offsets() {
        let bytes = bytemuck::bytes_of(&NoiseOptions::default().pack(&FRAME)).to_vec();
        let layout = NoiseOptions::LAYOUT;
        assert_eq!(read_u32(&layout, &bytes, "octaves"), Some(4));
        assert_eq!(layout.field("tint").unwrap().offset, 32);

        let bytes = bytemuck::bytes_of(&VhsOptions::default().pack(&FRAME)).to_vec();
        let layout = VhsOptions::LAYOUT;
        assert_eq!(layout.field("saturation").unwrap().offset, 28);
        assert_eq!(read_f32(&layout, &bytes, "saturation"), Some(0.85));
    }

    #[test]
    fn packing_is_deterministic_apart_from_time() {
        let options = VhsOptions::default();
        let a = bytemuck::bytes_of(&options.pack(&FRAME)).to_vec();
        let b = bytemuck::bytes_of(&options.pack(&FRAME)).to_vec();
        assert_eq!(a, b);

        let later = FrameInfo { time: 3.0, ..FRAME };
        let c = bytemuck::bytes_of(&options.pack(&later)).to_vec();
        assert_ne!(a, c);
        assert_eq!(a[..8], c[..8]);
        assert_eq!(a[12..], c[12..]);
    }
}
