// ABOUTME: ASCII effect options, grid sizing, atlas metadata, and both parameter blocks.
// ABOUTME: The match (compute) and paint (render) passes each own one block.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::options::OptionError;
use crate::param_field;
use crate::params::{flag, FrameInfo, ParamLayout};
use crate::Color;

/// Physical capacity of the match result buffer, in cells per axis.
pub const MAX_GRID_COLS: u32 = 2048;
pub const MAX_GRID_ROWS: u32 = 2048;

/// Bytes per match result entry (one `u32` glyph index).
pub const MATCH_ENTRY_SIZE: u64 = 4;

/// Cells smaller than this would make the grid exceed any sane capacity.
pub const MIN_CELL_SIZE: f32 = 2.0;

/// Largest charset the atlas and matcher accept.
pub const MAX_CHARSET_LEN: usize = 256;

/// At or above this brightness weight the matcher skips spatial scoring.
pub const FAST_PATH_WEIGHT: f32 = 0.99;

/// Charset presets, ordered darkest to brightest.
pub mod charsets {
    pub const STANDARD: &str = " .:-=+*#%@";
    pub const BLOCKS: &str = " ░▒▓█";
    pub const DETAILED: &str =
        " .'`^\",:;Il!i><~+_-?][}{1)(|\\/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";
}

/// Samples per axis taken inside each cell by the match pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    Fast,
    #[default]
    Balanced,
    Quality,
}

impl MatchQuality {
    pub fn samples_per_axis(self) -> u32 {
        match self {
            MatchQuality::Fast => 2,
            MatchQuality::Balanced => 3,
            MatchQuality::Quality => 4,
        }
    }

    pub fn next(self) -> Self {
        match self {
            MatchQuality::Fast => MatchQuality::Balanced,
            MatchQuality::Balanced => MatchQuality::Quality,
            MatchQuality::Quality => MatchQuality::Fast,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsciiOptions {
    /// Cell edge length in output pixels
    pub cell_size: f32,
    /// Fraction of each cell kept as a background gap (0 = glyphs touch)
    pub spacing: f32,
    /// Candidate glyphs, darkest first. Index order is what the matcher returns.
    pub charset: String,
    pub quality: MatchQuality,
    /// 1.0 = pick by brightness only, 0.0 = pick by glyph shape only
    pub brightness_weight: f32,
    pub gamma: f32,
    /// Added to brightness after gamma
    pub brightness: f32,
    /// Contrast factor around mid-grey
    pub contrast: f32,
    pub saturation: f32,
    /// Hue rotation in degrees
    pub hue_shift: f32,
    pub invert: bool,
    /// Unsharp-mask amount
    pub sharpen: f32,
    /// 5x5 box blur mix
    pub blur: f32,
    /// Laplacian edge enhancement amount
    pub edge_enhance: f32,
    /// Color quantization levels per channel (0 disables)
    pub color_levels: u32,
    /// Paint glyphs with the processed source color instead of `color`
    pub use_original_colors: bool,
    pub color: Color,
    pub background: Color,
}

impl Default for AsciiOptions {
    fn default() -> Self {
        Self {
            cell_size: 12.0,
            spacing: 0.0,
            charset: charsets::STANDARD.to_string(),
            quality: MatchQuality::Balanced,
            brightness_weight: 0.7,
            gamma: 1.0,
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            hue_shift: 0.0,
            invert: false,
            sharpen: 0.0,
            blur: 0.0,
            edge_enhance: 0.0,
            color_levels: 0,
            use_original_colors: true,
            color: Color::GREEN,
            background: Color::BLACK,
        }
    }
}

impl AsciiOptions {
    pub fn cell_size(&self) -> f32 {
        self.cell_size.max(MIN_CELL_SIZE)
    }

    pub fn charset_len(&self) -> u32 {
        self.charset.chars().count() as u32
    }

    pub fn validate(&self) -> Result<(), OptionError> {
        validate_charset(&self.charset)
    }
}

pub fn validate_charset(charset: &str) -> Result<(), OptionError> {
    let len = charset.chars().count();
    if len == 0 {
        return Err(OptionError::InvalidCharset("charset is empty".to_string()));
    }
    if len > MAX_CHARSET_LEN {
        return Err(OptionError::InvalidCharset(format!(
            "{} glyphs exceeds the limit of {}",
            len, MAX_CHARSET_LEN
        )));
    }
    Ok(())
}

/// Visible cell grid for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub cols: u32,
    pub rows: u32,
    /// The unclamped grid did not fit the match result buffer
    pub clamped: bool,
}

impl GridDims {
    pub fn cells(&self) -> u32 {
        self.cols * self.rows
    }

    pub fn index(&self, col: u32, row: u32) -> usize {
        (row * self.cols + col) as usize
    }
}

/// `floor(output / cell)` per axis, clamped to the result buffer capacity.
pub fn grid_dims(output_width: u32, output_height: u32, cell_size: f32) -> GridDims {
    let cell = cell_size.max(MIN_CELL_SIZE);
    let cols = (output_width as f32 / cell).floor() as u32;
    let rows = (output_height as f32 / cell).floor() as u32;
    GridDims {
        cols: cols.min(MAX_GRID_COLS),
        rows: rows.min(MAX_GRID_ROWS),
        clamped: cols > MAX_GRID_COLS || rows > MAX_GRID_ROWS,
    }
}

/// Metadata half of the font atlas contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub glyph_cell_width: u32,
    pub glyph_cell_height: u32,
    pub column_count: u32,
    pub glyph_count: u32,
}

impl AtlasLayout {
    /// Smallest near-square grid of cells that holds `glyph_count` glyphs.
    pub fn for_glyphs(glyph_count: u32, glyph_cell_width: u32, glyph_cell_height: u32) -> Self {
        let column_count = (glyph_count as f32).sqrt().ceil().max(1.0) as u32;
        let row_count = glyph_count.div_ceil(column_count).max(1);
        Self {
            atlas_width: column_count * glyph_cell_width,
            atlas_height: row_count * glyph_cell_height,
            glyph_cell_width,
            glyph_cell_height,
            column_count,
            glyph_count,
        }
    }

    /// Atlas cell of a glyph index. The shaders use the same arithmetic.
    pub fn glyph_cell(&self, index: u32) -> (u32, u32) {
        (index % self.column_count, index / self.column_count)
    }

    /// Atlas UV of a point `(u, v)` inside glyph `index`'s cell.
    pub fn glyph_uv(&self, index: u32, u: f32, v: f32) -> [f32; 2] {
        let (col, row) = self.glyph_cell(index);
        [
            (col as f32 + u) * self.glyph_cell_width as f32 / self.atlas_width as f32,
            (row as f32 + v) * self.glyph_cell_height as f32 / self.atlas_height as f32,
        ]
    }
}

// ---------------------------------------------------------------------------
// Parameter blocks
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct AsciiMatchUniforms {
    pub output_size: [f32; 2],
    pub cell_size: [f32; 2],
    pub grid_size: [u32; 2],
    pub atlas_size: [f32; 2],
    pub glyph_size: [f32; 2],
    pub atlas_cols: u32,
    pub charset_len: u32,
    pub brightness_weight: f32,
    pub samples_per_axis: u32,
    pub gamma: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub invert: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

pub const MATCH_LAYOUT: ParamLayout = ParamLayout {
    struct_name: "MatchUniforms",
    size: std::mem::size_of::<AsciiMatchUniforms>(),
    fields: &[
        param_field!(AsciiMatchUniforms, output_size, Vec2F),
        param_field!(AsciiMatchUniforms, cell_size, Vec2F),
        param_field!(AsciiMatchUniforms, grid_size, Vec2U),
        param_field!(AsciiMatchUniforms, atlas_size, Vec2F),
        param_field!(AsciiMatchUniforms, glyph_size, Vec2F),
        param_field!(AsciiMatchUniforms, atlas_cols, U32),
        param_field!(AsciiMatchUniforms, charset_len, U32),
        param_field!(AsciiMatchUniforms, brightness_weight, F32),
        param_field!(AsciiMatchUniforms, samples_per_axis, U32),
        param_field!(AsciiMatchUniforms, gamma, F32),
        param_field!(AsciiMatchUniforms, brightness, F32),
        param_field!(AsciiMatchUniforms, contrast, F32),
        param_field!(AsciiMatchUniforms, invert, U32),
        param_field!(AsciiMatchUniforms, _pad0, U32),
        param_field!(AsciiMatchUniforms, _pad1, U32),
    ],
};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct AsciiPaintUniforms {
    pub output_size: [f32; 2],
    pub cell_size: f32,
    pub spacing: f32,
    pub grid_size: [u32; 2],
    pub atlas_size: [f32; 2],
    pub glyph_size: [f32; 2],
    pub atlas_cols: u32,
    pub charset_len: u32,
    pub brightness: f32,
    pub contrast: f32,
    pub gamma: f32,
    pub saturation: f32,
    pub hue_shift: f32,
    pub sharpen: f32,
    pub blur: f32,
    pub edge_enhance: f32,
    pub color_levels: u32,
    pub use_original_colors: u32,
    pub invert: u32,
    pub _pad0: u32,
    pub color: [f32; 4],
    pub background: [f32; 4],
}

pub const PAINT_LAYOUT: ParamLayout = ParamLayout {
    struct_name: "PaintUniforms",
    size: std::mem::size_of::<AsciiPaintUniforms>(),
    fields: &[
        param_field!(AsciiPaintUniforms, output_size, Vec2F),
        param_field!(AsciiPaintUniforms, cell_size, F32),
        param_field!(AsciiPaintUniforms, spacing, F32),
        param_field!(AsciiPaintUniforms, grid_size, Vec2U),
        param_field!(AsciiPaintUniforms, atlas_size, Vec2F),
        param_field!(AsciiPaintUniforms, glyph_size, Vec2F),
        param_field!(AsciiPaintUniforms, atlas_cols, U32),
        param_field!(AsciiPaintUniforms, charset_len, U32),
        param_field!(AsciiPaintUniforms, brightness, F32),
        param_field!(AsciiPaintUniforms, contrast, F32),
        param_field!(AsciiPaintUniforms, gamma, F32),
        param_field!(AsciiPaintUniforms, saturation, F32),
        param_field!(AsciiPaintUniforms, hue_shift, F32),
        param_field!(AsciiPaintUniforms, sharpen, F32),
        param_field!(AsciiPaintUniforms, blur, F32),
        param_field!(AsciiPaintUniforms, edge_enhance, F32),
        param_field!(AsciiPaintUniforms, color_levels, U32),
        param_field!(AsciiPaintUniforms, use_original_colors, U32),
        param_field!(AsciiPaintUniforms, invert, U32),
        param_field!(AsciiPaintUniforms, _pad0, U32),
        param_field!(AsciiPaintUniforms, color, Vec4F),
        param_field!(AsciiPaintUniforms, background, Vec4F),
    ],
};

impl AsciiOptions {
    /// Parameter block of the match (compute) pass.
    pub fn pack_match(&self, frame: &FrameInfo, atlas: &AtlasLayout, grid: GridDims) -> AsciiMatchUniforms {
        let cell = self.cell_size();
        AsciiMatchUniforms {
            output_size: frame.resolution(),
            cell_size: [cell, cell],
            grid_size: [grid.cols, grid.rows],
            atlas_size: [atlas.atlas_width as f32, atlas.atlas_height as f32],
            glyph_size: [atlas.glyph_cell_width as f32, atlas.glyph_cell_height as f32],
            atlas_cols: atlas.column_count,
            charset_len: atlas.glyph_count,
            brightness_weight: self.brightness_weight,
            samples_per_axis: self.quality.samples_per_axis(),
            gamma: self.gamma.max(0.01),
            brightness: self.brightness,
            contrast: self.contrast,
            invert: flag(self.invert),
            _pad0: 0,
            _pad1: 0,
        }
    }

    /// Parameter block of the paint (render) pass.
    pub fn pack_paint(&self, frame: &FrameInfo, atlas: &AtlasLayout, grid: GridDims) -> AsciiPaintUniforms {
        AsciiPaintUniforms {
            output_size: frame.resolution(),
            cell_size: self.cell_size(),
            spacing: self.spacing.clamp(0.0, 0.9),
            grid_size: [grid.cols, grid.rows],
            atlas_size: [atlas.atlas_width as f32, atlas.atlas_height as f32],
            glyph_size: [atlas.glyph_cell_width as f32, atlas.glyph_cell_height as f32],
            atlas_cols: atlas.column_count,
            charset_len: atlas.glyph_count,
            brightness: self.brightness,
            contrast: self.contrast,
            gamma: self.gamma.max(0.01),
            saturation: self.saturation,
            hue_shift: self.hue_shift.to_radians(),
            sharpen: self.sharpen.max(0.0),
            blur: self.blur.clamp(0.0, 1.0),
            edge_enhance: self.edge_enhance.max(0.0),
            color_levels: self.color_levels,
            use_original_colors: flag(self.use_original_colors),
            invert: flag(self.invert),
            _pad0: 0,
            color: self.color.to_array(),
            background: self.background.to_array(),
        }
    }
}

/// Render matched glyph indices as text, one line per grid row.
pub fn ascii_text(indices: &[u32], grid: GridDims, charset: &str) -> String {
    let glyphs: Vec<char> = charset.chars().collect();
    let mut out = String::with_capacity(indices.len() + grid.rows as usize);
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let glyph = indices
                .get(grid.index(col, row))
                .and_then(|&i| glyphs.get(i as usize))
                .copied()
                .unwrap_or(' ');
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{read_f32, read_u32};

    fn atlas() -> AtlasLayout {
        AtlasLayout::for_glyphs(10, 8, 16)
    }

    #[test]
    fn grid_is_floor_of_output_over_cell() {
        let grid = grid_dims(1024, 768, 12.0);
        assert_eq!(grid.cols, 85);
        assert_eq!(grid.rows, 64);
        assert!(!grid.clamped);
    }

    #[test]
    fn grid_is_clamped_to_buffer_capacity() {
        let grid = grid_dims(16384, 100, 2.0);
        assert_eq!(grid.cols, MAX_GRID_COLS);
        assert_eq!(grid.rows, 50);
        assert!(grid.clamped);
        assert!(grid.cells() as u64 <= MAX_GRID_COLS as u64 * MAX_GRID_ROWS as u64);
    }

    #[test]
    fn tiny_cells_are_raised_to_minimum() {
        let grid = grid_dims(100, 100, 0.0);
        assert_eq!(grid.cols, 50);
    }

    #[test]
    fn atlas_cell_arithmetic() {
        let layout = atlas();
        assert_eq!(layout.column_count, 4);
        assert_eq!(layout.atlas_width, 32);
        assert_eq!(layout.atlas_height, 48);
        assert_eq!(layout.glyph_cell(0), (0, 0));
        assert_eq!(layout.glyph_cell(5), (1, 1));
        assert_eq!(layout.glyph_cell(9), (1, 2));
        assert_eq!(layout.glyph_uv(5, 0.5, 0.5), [1.5 / 4.0, 1.5 / 3.0]);
    }

    #[test]
    fn match_block_golden_offsets() {
        let options = AsciiOptions {
            brightness_weight: 0.37,
            quality: MatchQuality::Quality,
            invert: true,
            ..Default::default()
        };
        let frame = FrameInfo::new(1024, 768, 0.0);
        let grid = grid_dims(1024, 768, options.cell_size);
        let packed = options.pack_match(&frame, &atlas(), grid);
        let bytes = bytemuck::bytes_of(&packed);

        assert_eq!(MATCH_LAYOUT.size, 80);
        assert!(MATCH_LAYOUT.is_aligned());
        assert!(MATCH_LAYOUT.is_consistent());
        assert_eq!(MATCH_LAYOUT.field("brightness_weight").unwrap().offset, 48);
        assert_eq!(read_f32(&MATCH_LAYOUT, bytes, "brightness_weight"), Some(0.37));
        assert_eq!(MATCH_LAYOUT.field("grid_size").unwrap().offset, 16);
        assert_eq!(read_u32(&MATCH_LAYOUT, bytes, "grid_size"), Some(85));
        assert_eq!(read_u32(&MATCH_LAYOUT, bytes, "atlas_cols"), Some(4));
        assert_eq!(read_u32(&MATCH_LAYOUT, bytes, "charset_len"), Some(10));
        assert_eq!(read_u32(&MATCH_LAYOUT, bytes, "samples_per_axis"), Some(4));
        assert_eq!(read_u32(&MATCH_LAYOUT, bytes, "invert"), Some(1));
    }

    #[test]
    fn paint_block_golden_offsets() {
        let options = AsciiOptions {
            spacing: 0.2,
            hue_shift: 180.0,
            color_levels: 4,
            ..Default::default()
        };
        let frame = FrameInfo::new(640, 480, 0.0);
        let grid = grid_dims(640, 480, options.cell_size);
        let packed = options.pack_paint(&frame, &atlas(), grid);
        let bytes = bytemuck::bytes_of(&packed);

        assert_eq!(PAINT_LAYOUT.size, 128);
        assert!(PAINT_LAYOUT.is_aligned());
        assert!(PAINT_LAYOUT.is_consistent());
        assert_eq!(read_f32(&PAINT_LAYOUT, bytes, "spacing"), Some(0.2));
        assert_eq!(read_f32(&PAINT_LAYOUT, bytes, "hue_shift"), Some(180.0_f32.to_radians()));
        assert_eq!(read_u32(&PAINT_LAYOUT, bytes, "color_levels"), Some(4));
        assert_eq!(PAINT_LAYOUT.field("color").unwrap().offset, 96);
        assert_eq!(PAINT_LAYOUT.field("background").unwrap().offset, 112);
    }

    #[test]
    fn charset_validation() {
        assert!(validate_charset("").is_err());
        assert!(validate_charset(&"#".repeat(MAX_CHARSET_LEN + 1)).is_err());
        assert!(validate_charset(charsets::STANDARD).is_ok());
        assert_eq!(charsets::STANDARD.chars().count(), 10);
        assert_eq!(charsets::BLOCKS.chars().count(), 5);
    }

    #[test]
    fn text_export_uses_charset_order() {
        let grid = GridDims {
            cols: 3,
            rows: 2,
            clamped: false,
        };
        let text = ascii_text(&[0, 1, 2, 9, 9, 0], grid, charsets::STANDARD);
        assert_eq!(text, " .:\n@@ \n");
    }
}
