// ABOUTME: CPU mirror of the ASCII match pass; the GPU result is checked against it in tests.
// ABOUTME: Same tone curve, sampling pattern and tie-breaking as shaders/ascii_match.wgsl.

use crate::ascii::{grid_dims, AsciiOptions, AtlasLayout, GridDims, FAST_PATH_WEIGHT};
use crate::color::luma;

/// Tone curve of the match pass. Narrower than the paint pass chain on purpose:
/// no sharpen, blur or edge enhance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCurve {
    pub gamma: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub invert: bool,
}

impl ToneCurve {
    pub fn from_options(options: &AsciiOptions) -> Self {
        Self {
            gamma: options.gamma.max(0.01),
            brightness: options.brightness,
            contrast: options.contrast,
            invert: options.invert,
        }
    }

    pub fn apply(&self, luma: f32) -> f32 {
        let mut b = luma.max(0.0).powf(1.0 / self.gamma);
        b += self.brightness;
        b = (b - 0.5) * self.contrast + 0.5;
        if self.invert {
            b = 1.0 - b;
        }
        b.clamp(0.0, 1.0)
    }
}

/// O(1) brightness-to-index pick used when spatial matching is off.
pub fn select_glyph_fast(brightness: f32, charset_len: u32) -> u32 {
    (brightness.clamp(0.0, 0.9999) * charset_len as f32).floor() as u32
}

/// Weighted index/shape match. `glyph_samples(g)` yields glyph `g`'s coverage
/// at the same sub-cell offsets as `cell_samples`.
pub fn select_glyph<F>(
    cell_samples: &[f32],
    brightness: f32,
    charset_len: u32,
    weight: f32,
    mut glyph_samples: F,
) -> u32
where
    F: FnMut(u32, &mut [f32]),
{
    if weight >= FAST_PATH_WEIGHT || charset_len <= 1 {
        return select_glyph_fast(brightness, charset_len);
    }
    let len = charset_len as f32;
    let expected = brightness * (len - 1.0);
    let mut scratch = vec![0.0; cell_samples.len()];
    let mut best = 0;
    let mut best_score = f32::MAX;
    for g in 0..charset_len {
        glyph_samples(g, &mut scratch);
        let index_dist = (g as f32 - expected).abs() / len;
        let spatial = cell_samples
            .iter()
            .zip(&scratch)
            .map(|(c, s)| (c - s) * (c - s))
            .sum::<f32>()
            / cell_samples.len().max(1) as f32;
        let score = index_dist * weight + spatial * (1.0 - weight);
        // Strict comparison keeps the first glyph on ties.
        if score < best_score {
            best_score = score;
            best = g;
        }
    }
    best
}

/// RGBA8 image borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl ImageView<'_> {
    /// Nearest-texel luma at normalized `(u, v)`.
    pub fn luma_at(&self, u: f32, v: f32) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        let i = ((y * self.width + x) * 4) as usize;
        match self.pixels.get(i..i + 3) {
            Some(rgb) => luma([
                rgb[0] as f32 / 255.0,
                rgb[1] as f32 / 255.0,
                rgb[2] as f32 / 255.0,
            ]),
            None => 0.0,
        }
    }
}

/// Single-channel coverage bitmap of a font atlas.
#[derive(Debug, Clone)]
pub struct AtlasBitmap {
    pub layout: AtlasLayout,
    pub coverage: Vec<u8>,
}

impl AtlasBitmap {
    /// Nearest-texel coverage of glyph `index` at cell-relative `(u, v)`.
    pub fn coverage_at(&self, index: u32, u: f32, v: f32) -> f32 {
        let [au, av] = self.layout.glyph_uv(index, u, v);
        let w = self.layout.atlas_width;
        let h = self.layout.atlas_height;
        if w == 0 || h == 0 {
            return 0.0;
        }
        let x = ((au * w as f32) as u32).min(w - 1);
        let y = ((av * h as f32) as u32).min(h - 1);
        self.coverage
            .get((y * w + x) as usize)
            .map(|c| *c as f32 / 255.0)
            .unwrap_or(0.0)
    }
}

/// Sub-cell offset of sample `i` on an `n × n` grid.
fn sample_offset(i: u32, n: u32) -> f32 {
    (i as f32 + 0.5) / n as f32
}

/// Glyph index per cell for an `output_width × output_height` target, row-major.
/// `atlas` may be `None` when the fast path is in use.
pub fn match_grid(
    source: ImageView<'_>,
    output_width: u32,
    output_height: u32,
    options: &AsciiOptions,
    atlas: Option<&AtlasBitmap>,
) -> (GridDims, Vec<u32>) {
    let grid = grid_dims(output_width, output_height, options.cell_size);
    let cell = options.cell_size();
    let n = options.quality.samples_per_axis();
    let curve = ToneCurve::from_options(options);
    let charset_len = atlas
        .map(|a| a.layout.glyph_count)
        .unwrap_or_else(|| options.charset_len());

    let mut cell_samples = vec![0.0; (n * n) as usize];
    let mut out = Vec::with_capacity(grid.cells() as usize);
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            for sy in 0..n {
                for sx in 0..n {
                    let px = (col as f32 + sample_offset(sx, n)) * cell;
                    let py = (row as f32 + sample_offset(sy, n)) * cell;
                    let l = source.luma_at(px / output_width as f32, py / output_height as f32);
                    cell_samples[(sy * n + sx) as usize] = curve.apply(l);
                }
            }
            let brightness = cell_samples.iter().sum::<f32>() / cell_samples.len() as f32;
            let index = match atlas {
                Some(atlas) => select_glyph(
                    &cell_samples,
                    brightness,
                    charset_len,
                    options.brightness_weight,
                    |g, dst| {
                        for sy in 0..n {
                            for sx in 0..n {
                                dst[(sy * n + sx) as usize] =
                                    atlas.coverage_at(g, sample_offset(sx, n), sample_offset(sy, n));
                            }
                        }
                    },
                ),
                None => select_glyph_fast(brightness, charset_len),
            };
            out.push(index);
        }
    }
    (grid, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ascii::{charsets, MatchQuality};

    #[test]
    fn fast_path_boundaries() {
        for len in [10u32, 69] {
            for b in [0.0f32, 0.33, 0.999] {
                let expected = (b.clamp(0.0, 0.9999) * len as f32).floor() as u32;
                let picked = select_glyph(&[b; 4], b, len, 1.0, |_, _| {});
                assert_eq!(picked, expected, "len {len} b {b}");
            }
        }
        assert_eq!(select_glyph_fast(0.33, 10), 3);
        assert_eq!(select_glyph_fast(0.999, 69), 68);
        assert_eq!(select_glyph_fast(1.5, 10), 9);
    }

    #[test]
    fn full_path_prefers_first_glyph_on_ties() {
        // All glyphs look identical and the weight ignores index distance.
        let picked = select_glyph(&[0.5; 4], 0.5, 8, 0.0, |_, dst| dst.fill(0.5));
        assert_eq!(picked, 0);
    }

    #[test]
    fn full_path_follows_shape_when_weight_is_zero() {
        let picked = select_glyph(&[1.0, 0.0, 1.0, 0.0], 0.5, 3, 0.0, |g, dst| {
            if g == 2 {
                dst.copy_from_slice(&[1.0, 0.0, 1.0, 0.0]);
            } else {
                dst.fill(0.5);
            }
        });
        assert_eq!(picked, 2);
    }

    #[test]
    fn tone_curve_inverts_and_clamps() {
        let curve = ToneCurve {
            gamma: 1.0,
            brightness: 0.0,
            contrast: 2.0,
            invert: true,
        };
        assert_eq!(curve.apply(1.0), 0.0);
        assert_eq!(curve.apply(0.0), 1.0);
        assert_eq!(curve.apply(0.5), 0.5);
    }

    #[test]
    fn mid_grey_frame_matches_index_five() {
        let pixels = [128u8, 128, 128, 255].repeat(64 * 64);
        let source = ImageView {
            pixels: &pixels,
            width: 64,
            height: 64,
        };
        let options = AsciiOptions {
            cell_size: 16.0,
            charset: charsets::STANDARD.to_string(),
            brightness_weight: 1.0,
            spacing: 0.0,
            quality: MatchQuality::Quality,
            ..Default::default()
        };
        let (grid, indices) = match_grid(source, 64, 64, &options, None);
        assert_eq!((grid.cols, grid.rows), (4, 4));
        assert_eq!(indices, vec![5; 16]);
    }

    #[test]
    fn atlas_coverage_uses_glyph_cells() {
        let layout = AtlasLayout::for_glyphs(4, 2, 2);
        // 2x2 atlas cells of 2x2 px; glyph 3 is fully covered.
        let mut coverage = vec![0u8; 16];
        for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)] {
            coverage[y * 4 + x] = 255;
        }
        let atlas = AtlasBitmap { layout, coverage };
        assert_eq!(atlas.coverage_at(3, 0.25, 0.75), 1.0);
        assert_eq!(atlas.coverage_at(0, 0.25, 0.75), 0.0);
    }
}
