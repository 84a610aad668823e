// ABOUTME: Font atlas for the ASCII effect: one fixed-size cell per charset glyph.
// ABOUTME: Rasterizes with fontdue and uploads the coverage bitmap as an R8 texture.

use fontdue::{Font, FontSettings};
use fx_core::ascii::{validate_charset, AtlasLayout};
use fx_core::matcher::AtlasBitmap;
use fx_core::OptionError;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    #[error("Failed to load font: {0}")]
    FontLoadError(String),

    #[error("Failed to read font file {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("No monospace font found in the system font directories")]
    NoFontFound,

    #[error(transparent)]
    Charset(#[from] OptionError),

    #[error("Atlas {width}x{height} exceeds the device limit of {limit}")]
    TooLarge { width: u32, height: u32, limit: u32 },
}

/// Supplies the coverage bitmap for a charset. Glyph `i` of the charset must
/// land in atlas cell `i`.
pub trait AtlasProvider {
    fn build(&self, charset: &str) -> Result<AtlasBitmap, AtlasError>;
}

/// Rasterizes a TTF/OTF font with fontdue.
pub struct FontAtlasBuilder {
    font: Font,
    pixel_size: f32,
}

impl FontAtlasBuilder {
    pub fn from_bytes(font_data: &[u8], pixel_size: f32) -> Result<Self, AtlasError> {
        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| AtlasError::FontLoadError(e.to_string()))?;
        Ok(Self {
            font,
            pixel_size: pixel_size.max(4.0),
        })
    }

    pub fn from_path(path: &Path, pixel_size: f32) -> Result<Self, AtlasError> {
        let data = std::fs::read(path).map_err(|e| AtlasError::Io(path.to_path_buf(), e))?;
        tracing::info!("Loaded atlas font {}", path.display());
        Self::from_bytes(&data, pixel_size)
    }

    /// First monospace font found under the platform font directories.
    pub fn discover(pixel_size: f32) -> Result<Self, AtlasError> {
        let path = find_monospace_font().ok_or(AtlasError::NoFontFound)?;
        Self::from_path(&path, pixel_size)
    }

    /// Cell size shared by every glyph: advance of 'M' by the line height.
    fn cell_size(&self) -> (u32, u32, f32) {
        let line_metrics = self
            .font
            .horizontal_line_metrics(self.pixel_size)
            .unwrap_or(fontdue::LineMetrics {
                ascent: self.pixel_size * 0.8,
                descent: self.pixel_size * -0.2,
                line_gap: 0.0,
                new_line_size: self.pixel_size,
            });
        let advance = self.font.metrics('M', self.pixel_size).advance_width;
        let width = advance.ceil().max(1.0) as u32;
        let height = (line_metrics.ascent - line_metrics.descent).ceil().max(1.0) as u32;
        (width, height, line_metrics.ascent)
    }
}

impl AtlasProvider for FontAtlasBuilder {
    fn build(&self, charset: &str) -> Result<AtlasBitmap, AtlasError> {
        validate_charset(charset)?;
        let glyph_count = charset.chars().count() as u32;
        let (cell_w, cell_h, ascent) = self.cell_size();
        let layout = AtlasLayout::for_glyphs(glyph_count, cell_w, cell_h);
        let mut coverage = vec![0u8; (layout.atlas_width * layout.atlas_height) as usize];

        for (index, c) in charset.chars().enumerate() {
            let (metrics, bitmap) = self.font.rasterize(c, self.pixel_size);
            if metrics.width == 0 || metrics.height == 0 {
                // Space or empty glyph
                continue;
            }
            let (col, row) = layout.glyph_cell(index as u32);
            let origin_x = col * cell_w;
            let origin_y = row * cell_h;
            // Center horizontally, sit on the shared baseline.
            let left = (cell_w as i32 - metrics.width as i32) / 2;
            let top = (ascent - (metrics.ymin as f32 + metrics.height as f32)).round() as i32;

            for y in 0..metrics.height {
                let dy = top + y as i32;
                if dy < 0 || dy >= cell_h as i32 {
                    continue;
                }
                for x in 0..metrics.width {
                    let dx = left + x as i32;
                    if dx < 0 || dx >= cell_w as i32 {
                        continue;
                    }
                    let dst = ((origin_y + dy as u32) * layout.atlas_width + origin_x + dx as u32) as usize;
                    coverage[dst] = bitmap[y * metrics.width + x];
                }
            }
        }

        tracing::info!(
            "Built font atlas {}x{} for {} glyphs ({}x{} cells)",
            layout.atlas_width,
            layout.atlas_height,
            glyph_count,
            cell_w,
            cell_h
        );
        Ok(AtlasBitmap { layout, coverage })
    }
}

/// Font-free atlas where glyph `i` is a centered block whose area grows with `i`.
/// Used when no font is available and by tests.
pub struct BlockAtlasProvider {
    pub cell_size: u32,
}

impl Default for BlockAtlasProvider {
    fn default() -> Self {
        Self { cell_size: 16 }
    }
}

impl AtlasProvider for BlockAtlasProvider {
    fn build(&self, charset: &str) -> Result<AtlasBitmap, AtlasError> {
        validate_charset(charset)?;
        let glyph_count = charset.chars().count() as u32;
        let cell = self.cell_size.max(2);
        let layout = AtlasLayout::for_glyphs(glyph_count, cell, cell);
        let mut coverage = vec![0u8; (layout.atlas_width * layout.atlas_height) as usize];

        for index in 0..glyph_count {
            let fill = if glyph_count > 1 {
                index as f32 / (glyph_count - 1) as f32
            } else {
                1.0
            };
            let side = (fill.sqrt() * cell as f32).round() as u32;
            let inset = (cell - side) / 2;
            let (col, row) = layout.glyph_cell(index);
            for y in inset..inset + side {
                for x in inset..inset + side {
                    let dst = ((row * cell + y) * layout.atlas_width + col * cell + x) as usize;
                    coverage[dst] = 255;
                }
            }
        }
        Ok(AtlasBitmap { layout, coverage })
    }
}

/// GPU copy of an atlas bitmap.
pub struct FontAtlas {
    pub layout: AtlasLayout,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl FontAtlas {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, bitmap: &AtlasBitmap) -> Result<Self, AtlasError> {
        let layout = bitmap.layout;
        let limit = device.limits().max_texture_dimension_2d;
        if layout.atlas_width > limit || layout.atlas_height > limit {
            return Err(AtlasError::TooLarge {
                width: layout.atlas_width,
                height: layout.atlas_height,
                limit,
            });
        }

        let size = wgpu::Extent3d {
            width: layout.atlas_width,
            height: layout.atlas_height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Font Atlas"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bitmap.coverage,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(layout.atlas_width),
                rows_per_image: Some(layout.atlas_height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            layout,
            texture,
            view,
        })
    }

    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = dirs::font_dir().into_iter().collect();
    if let Some(data) = dirs::data_dir() {
        dirs.push(data.join("fonts"));
    }
    for system in [
        "/usr/share/fonts",
        "/usr/local/share/fonts",
        "/System/Library/Fonts",
        "/Library/Fonts",
        "C:\\Windows\\Fonts",
    ] {
        dirs.push(PathBuf::from(system));
    }
    dirs
}

fn is_monospace_font(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_ascii_lowercase();
    let font_file = lower.ends_with(".ttf") || lower.ends_with(".otf");
    let mono = lower.contains("mono") || lower.starts_with("consola") || lower.starts_with("cour");
    let plain = !lower.contains("bold") && !lower.contains("italic") && !lower.contains("oblique");
    font_file && mono && plain
}

fn find_monospace_font() -> Option<PathBuf> {
    font_dirs().iter().find_map(|dir| search_dir(dir, 4))
}

fn search_dir(dir: &Path, depth: u32) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if is_monospace_font(&path) {
            return Some(path);
        }
    }
    if depth == 0 {
        return None;
    }
    subdirs.sort();
    subdirs.iter().find_map(|d| search_dir(d, depth - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fx_core::ascii::charsets;

    #[test]
    fn block_atlas_places_glyphs_in_index_order() {
        let bitmap = BlockAtlasProvider { cell_size: 8 }.build(charsets::STANDARD).unwrap();
        assert_eq!(bitmap.layout.glyph_count, 10);
        assert_eq!(bitmap.layout.column_count, 4);
        // First glyph is empty, last glyph is a full block.
        assert_eq!(bitmap.coverage_at(0, 0.5, 0.5), 0.0);
        assert_eq!(bitmap.coverage_at(9, 0.05, 0.05), 1.0);
        assert_eq!(bitmap.coverage_at(9, 0.95, 0.95), 1.0);
    }

    #[test]
    fn block_atlas_rejects_empty_charset() {
        assert!(matches!(
            BlockAtlasProvider::default().build(""),
            Err(AtlasError::Charset(_))
        ));
    }

    #[test]
    fn monospace_detection() {
        assert!(is_monospace_font(Path::new("/fonts/DejaVuSansMono.ttf")));
        assert!(is_monospace_font(Path::new("C:/Windows/Fonts/consola.ttf")));
        assert!(!is_monospace_font(Path::new("/fonts/DejaVuSansMono-Bold.ttf")));
        assert!(!is_monospace_font(Path::new("/fonts/DejaVuSans.ttf")));
    }
}
