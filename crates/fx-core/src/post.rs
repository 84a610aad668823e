// ABOUTME: Post-process options (bloom, grain, chromatic, scanlines, vignette, CRT, phosphor).
// ABOUTME: Packs the composite, threshold and blur parameter blocks and the bloom blur weights.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::param_field;
use crate::params::{flag, FrameInfo, PackParams, ParamLayout};
use crate::Color;

/// Taps on each side of the blur center.
pub const BLUR_HALF_TAPS: usize = 6;
/// Total taps of the separable blur (13).
pub const BLUR_TAPS: usize = BLUR_HALF_TAPS * 2 + 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomOptions {
    pub enabled: bool,
    pub intensity: f32,
    /// Luminance cutoff
    pub threshold: f32,
    /// Width of the soft edge below the cutoff
    pub soft_knee: f32,
    /// Blur radius in pixels
    pub radius: f32,
}

impl Default for BloomOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 0.6,
            threshold: 0.7,
            soft_knee: 0.2,
            radius: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrainOptions {
    pub enabled: bool,
    pub intensity: f32,
    /// Grain cell size in pixels
    pub size: f32,
}

impl Default for GrainOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 0.08,
            size: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaticOptions {
    pub enabled: bool,
    /// Horizontal channel offset in pixels
    pub offset: f32,
}

impl Default for ChromaticOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            offset: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanlineOptions {
    pub enabled: bool,
    pub intensity: f32,
    /// Half the scanline period in pixels
    pub spacing: f32,
}

impl Default for ScanlineOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 0.3,
            spacing: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VignetteOptions {
    pub enabled: bool,
    pub intensity: f32,
    pub softness: f32,
}

impl Default for VignetteOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 0.5,
            softness: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrtOptions {
    pub enabled: bool,
    /// Barrel distortion strength
    pub curvature: f32,
}

impl Default for CrtOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            curvature: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhosphorOptions {
    pub enabled: bool,
    pub color: Color,
}

impl Default for PhosphorOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Color::GREEN,
        }
    }
}

/// All post effects. Every one is off by default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessOptions {
    pub bloom: BloomOptions,
    pub grain: GrainOptions,
    pub chromatic: ChromaticOptions,
    pub scanlines: ScanlineOptions,
    pub vignette: VignetteOptions,
    pub crt: CrtOptions,
    pub phosphor: PhosphorOptions,
}

/// Which post effect a toggle key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostEffect {
    Bloom,
    Grain,
    Chromatic,
    Scanlines,
    Vignette,
    Crt,
    Phosphor,
}

impl PostEffect {
    /// Table name inside `PostProcessOptions`.
    pub fn key(&self) -> &'static str {
        match self {
            PostEffect::Bloom => "bloom",
            PostEffect::Grain => "grain",
            PostEffect::Chromatic => "chromatic",
            PostEffect::Scanlines => "scanlines",
            PostEffect::Vignette => "vignette",
            PostEffect::Crt => "crt",
            PostEffect::Phosphor => "phosphor",
        }
    }
}

impl PostProcessOptions {
    /// Any of the seven post effects is enabled.
    pub fn needs_post(&self) -> bool {
        self.bloom.enabled
            || self.grain.enabled
            || self.chromatic.enabled
            || self.scanlines.enabled
            || self.vignette.enabled
            || self.crt.enabled
            || self.phosphor.enabled
    }

    pub fn bloom_active(&self) -> bool {
        self.bloom.enabled && self.bloom.intensity > 0.0
    }

    pub fn is_enabled(&self, effect: PostEffect) -> bool {
        match effect {
            PostEffect::Bloom => self.bloom.enabled,
            PostEffect::Grain => self.grain.enabled,
            PostEffect::Chromatic => self.chromatic.enabled,
            PostEffect::Scanlines => self.scanlines.enabled,
            PostEffect::Vignette => self.vignette.enabled,
            PostEffect::Crt => self.crt.enabled,
            PostEffect::Phosphor => self.phosphor.enabled,
        }
    }
}

// ---------------------------------------------------------------------------
// Composite pass
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CompositeUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub bloom_enabled: u32,
    pub bloom_intensity: f32,
    pub grain_enabled: u32,
    pub grain_intensity: f32,
    pub grain_size: f32,
    pub chromatic_enabled: u32,
    pub chromatic_offset: f32,
    pub scanlines_enabled: u32,
    pub scanline_intensity: f32,
    pub scanline_spacing: f32,
    pub vignette_enabled: u32,
    pub vignette_intensity: f32,
    pub vignette_softness: f32,
    pub crt_enabled: u32,
    pub crt_curvature: f32,
    pub phosphor_enabled: u32,
    pub _pad0: u32,
    pub phosphor_color: [f32; 4],
}

impl PackParams for PostProcessOptions {
    type Uniforms = CompositeUniforms;

    const LAYOUT: ParamLayout = ParamLayout {
        struct_name: "CompositeUniforms",
        size: std::mem::size_of::<CompositeUniforms>(),
        fields: &[
            param_field!(CompositeUniforms, resolution, Vec2F),
            param_field!(CompositeUniforms, time, F32),
            param_field!(CompositeUniforms, bloom_enabled, U32),
            param_field!(CompositeUniforms, bloom_intensity, F32),
            param_field!(CompositeUniforms, grain_enabled, U32),
            param_field!(CompositeUniforms, grain_intensity, F32),
            param_field!(CompositeUniforms, grain_size, F32),
            param_field!(CompositeUniforms, chromatic_enabled, U32),
            param_field!(CompositeUniforms, chromatic_offset, F32),
            param_field!(CompositeUniforms, scanlines_enabled, U32),
            param_field!(CompositeUniforms, scanline_intensity, F32),
            param_field!(CompositeUniforms, scanline_spacing, F32),
            param_field!(CompositeUniforms, vignette_enabled, U32),
            param_field!(CompositeUniforms, vignette_intensity, F32),
            param_field!(CompositeUniforms, vignette_softness, F32),
            param_field!(CompositeUniforms, crt_enabled, U32),
            param_field!(CompositeUniforms, crt_curvature, F32),
            param_field!(CompositeUniforms, phosphor_enabled, U32),
            param_field!(CompositeUniforms, _pad0, U32),
            param_field!(CompositeUniforms, phosphor_color, Vec4F),
        ],
    };

    fn pack(&self, frame: &FrameInfo) -> CompositeUniforms {
        CompositeUniforms {
            resolution: frame.resolution(),
            time: frame.time,
            bloom_enabled: flag(self.bloom_active()),
            bloom_intensity: self.bloom.intensity.max(0.0),
            grain_enabled: flag(self.grain.enabled),
            grain_intensity: self.grain.intensity,
            grain_size: self.grain.size.max(1.0),
            chromatic_enabled: flag(self.chromatic.enabled),
            chromatic_offset: self.chromatic.offset,
            scanlines_enabled: flag(self.scanlines.enabled),
            scanline_intensity: self.scanlines.intensity.clamp(0.0, 1.0),
            scanline_spacing: self.scanlines.spacing.max(1.0),
            vignette_enabled: flag(self.vignette.enabled),
            vignette_intensity: self.vignette.intensity,
            vignette_softness: self.vignette.softness.max(0.01),
            crt_enabled: flag(self.crt.enabled),
            crt_curvature: self.crt.curvature,
            phosphor_enabled: flag(self.phosphor.enabled),
            _pad0: 0,
            phosphor_color: self.phosphor.color.to_array(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bloom passes
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ThresholdUniforms {
    pub threshold: f32,
    pub soft_knee: f32,
    pub _pad0: f32,
    pub _pad1: f32,
}

pub const THRESHOLD_LAYOUT: ParamLayout = ParamLayout {
    struct_name: "ThresholdUniforms",
    size: std::mem::size_of::<ThresholdUniforms>(),
    fields: &[
        param_field!(ThresholdUniforms, threshold, F32),
        param_field!(ThresholdUniforms, soft_knee, F32),
        param_field!(ThresholdUniforms, _pad0, F32),
        param_field!(ThresholdUniforms, _pad1, F32),
    ],
};

impl BloomOptions {
    pub fn pack_threshold(&self) -> ThresholdUniforms {
        ThresholdUniforms {
            threshold: self.threshold.clamp(0.0, 1.0),
            soft_knee: self.soft_knee.max(1e-4),
            _pad0: 0.0,
            _pad1: 0.0,
        }
    }

    /// Blur block for one direction. `direction` is `[1, 0]` or `[0, 1]`.
    pub fn pack_blur(&self, width: u32, height: u32, direction: [f32; 2]) -> BlurUniforms {
        let step = blur_tap_step(self.radius);
        let texel = [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32];
        BlurUniforms {
            texel_step: [direction[0] * texel[0] * step, direction[1] * texel[1] * step],
            _pad0: [0.0; 2],
            weights: pack_weights(&gaussian_weights(self.radius)),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct BlurUniforms {
    /// UV distance between two taps
    pub texel_step: [f32; 2],
    pub _pad0: [f32; 2],
    /// Center weight then the six side weights, packed in two vec4s
    pub weights: [[f32; 4]; 2],
}

pub const BLUR_LAYOUT: ParamLayout = ParamLayout {
    struct_name: "BlurUniforms",
    size: std::mem::size_of::<BlurUniforms>(),
    fields: &[
        param_field!(BlurUniforms, texel_step, Vec2F),
        param_field!(BlurUniforms, _pad0, Vec2F),
        param_field!(BlurUniforms, weights, Vec4FArray(2)),
    ],
};

/// Pixels between two blur taps.
pub fn blur_tap_step(radius: f32) -> f32 {
    (radius / BLUR_HALF_TAPS as f32).max(1.0)
}

/// Center and one-sided weights of the 13-tap Gaussian, normalised so all
/// 13 taps sum to 1.
pub fn gaussian_weights(radius: f32) -> [f32; BLUR_HALF_TAPS + 1] {
    let sigma = (radius / 2.0).max(0.5);
    let mut weights = [0.0; BLUR_HALF_TAPS + 1];
    for (i, w) in weights.iter_mut().enumerate() {
        let x = i as f32;
        *w = (-(x * x) / (2.0 * sigma * sigma)).exp();
    }
    let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
    for w in &mut weights {
        *w /= total;
    }
    weights
}

fn pack_weights(weights: &[f32; BLUR_HALF_TAPS + 1]) -> [[f32; 4]; 2] {
    let mut packed = [[0.0; 4]; 2];
    for (i, w) in weights.iter().enumerate() {
        packed[i / 4][i % 4] = *w;
    }
    packed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{read_f32, read_u32, read_vec4};

    #[test]
    fn everything_off_by_default() {
        let options = PostProcessOptions::default();
        assert!(!options.needs_post());
        assert!(!options.bloom_active());
    }

    #[test]
    fn any_single_effect_needs_post() {
        let mut options = PostProcessOptions::default();
        options.vignette.enabled = true;
        assert!(options.needs_post());
        assert!(options.is_enabled(PostEffect::Vignette));
    }

    #[test]
    fn bloom_with_zero_intensity_is_inactive() {
        let mut options = PostProcessOptions::default();
        options.bloom.enabled = true;
        options.bloom.intensity = 0.0;
        assert!(options.needs_post());
        assert!(!options.bloom_active());
    }

    #[test]
    fn disabled_bloom_packs_zero_flag() {
        let mut options = PostProcessOptions::default();
        options.grain.enabled = true;
        let packed = options.pack(&FrameInfo::new(320, 200, 1.0));
        let bytes = bytemuck::bytes_of(&packed);
        let layout = PostProcessOptions::LAYOUT;
        assert_eq!(read_u32(&layout, bytes, "bloom_enabled"), Some(0));
        assert_eq!(read_u32(&layout, bytes, "grain_enabled"), Some(1));
    }

    #[test]
    fn composite_block_golden_offsets() {
        let mut options = PostProcessOptions::default();
        options.bloom.enabled = true;
        options.bloom.intensity = 1.25;
        options.crt.curvature = 0.3;
        options.phosphor.color = Color::AMBER;
        let packed = options.pack(&FrameInfo::new(800, 600, 2.0));
        let bytes = bytemuck::bytes_of(&packed);
        let layout = PostProcessOptions::LAYOUT;

        assert_eq!(layout.size, 96);
        assert!(layout.is_aligned());
        assert!(layout.is_consistent());
        assert_eq!(layout.field("bloom_intensity").unwrap().offset, 16);
        assert_eq!(read_f32(&layout, bytes, "bloom_intensity"), Some(1.25));
        assert_eq!(layout.field("crt_curvature").unwrap().offset, 68);
        assert_eq!(read_f32(&layout, bytes, "crt_curvature"), Some(0.3));
        assert_eq!(layout.field("phosphor_color").unwrap().offset, 80);
        assert_eq!(read_vec4(&layout, bytes, "phosphor_color"), Some(Color::AMBER.to_array()));
    }

    #[test]
    fn composite_packing_is_deterministic_apart_from_time() {
        let options = PostProcessOptions::default();
        let a = options.pack(&FrameInfo::new(64, 64, 0.0));
        let b = options.pack(&FrameInfo::new(64, 64, 0.0));
        assert_eq!(bytemuck::bytes_of(&a), bytemuck::bytes_of(&b));
    }

    #[test]
    fn gaussian_weights_sum_to_one() {
        for radius in [0.0, 1.0, 4.0, 8.0, 32.0] {
            let w = gaussian_weights(radius);
            let total = w[0] + 2.0 * w[1..].iter().sum::<f32>();
            assert!((total - 1.0).abs() < 1e-5, "radius {radius}: {total}");
            assert!(w.windows(2).all(|p| p[0] >= p[1]));
        }
    }

    #[test]
    fn blur_block_layout_and_direction() {
        let bloom = BloomOptions {
            radius: 12.0,
            ..Default::default()
        };
        let packed = bloom.pack_blur(200, 100, [0.0, 1.0]);
        assert_eq!(BLUR_LAYOUT.size, 48);
        assert!(BLUR_LAYOUT.is_aligned());
        assert_eq!(BLUR_LAYOUT.field("weights").unwrap().offset, 16);
        assert_eq!(packed.texel_step[0], 0.0);
        assert_eq!(packed.texel_step[1], 2.0 / 100.0);
        assert_eq!(packed.weights[1][3], 0.0);
    }

    #[test]
    fn threshold_block_is_one_row() {
        assert_eq!(THRESHOLD_LAYOUT.size, 16);
        let packed = BloomOptions::default().pack_threshold();
        assert_eq!(packed.threshold, 0.7);
    }
}
