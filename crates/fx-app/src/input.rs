// ABOUTME: Image input and export: decodes files into RGBA8 frames off the UI thread
// ABOUTME: and writes captured frames and ASCII text next to each other.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use winit::event_loop::EventLoopProxy;

use fx_renderer::{CapturedFrame, InputFrame};

/// Delivered to the event loop from the loader thread.
#[derive(Debug)]
pub enum AppEvent {
    InputLoaded(PathBuf, InputFrame),
    InputFailed(PathBuf, String),
}

pub fn decode_image(bytes: &[u8]) -> Result<InputFrame> {
    let image = image::load_from_memory(bytes)
        .context("Failed to decode image")?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(InputFrame {
        pixels: image.into_raw(),
        width,
        height,
    })
}

pub fn load_image(path: &Path) -> Result<InputFrame> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    decode_image(&bytes).with_context(|| format!("Failed to load {}", path.display()))
}

/// Decode `path` on a worker thread and post the result to the event loop.
pub fn spawn_loader(path: PathBuf, proxy: EventLoopProxy<AppEvent>) {
    std::thread::spawn(move || {
        let event = match load_image(&path) {
            Ok(frame) => AppEvent::InputLoaded(path, frame),
            Err(e) => AppEvent::InputFailed(path, format!("{:#}", e)),
        };
        // Event loop already gone
        let _ = proxy.send_event(event);
    });
}

fn export_path(dir: &Path, extension: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    dir.join(format!("fxdeck-{}.{}", stamp, extension))
}

pub fn save_capture(dir: &Path, frame: &CapturedFrame) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = export_path(dir, "png");
    image::save_buffer(
        &path,
        &frame.to_rgba8(),
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgba8,
    )
    .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn save_text(dir: &Path, text: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = export_path(dir, "txt");
    std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_png_to_rgba8() {
        let image = image::RgbImage::from_fn(3, 2, |x, _| image::Rgb([x as u8 * 100, 0, 0]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let frame = decode_image(&bytes).unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(frame.pixels.len(), 3 * 2 * 4);
        assert_eq!(&frame.pixels[4..8], &[100, 0, 0, 255]);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_image(b"not an image").is_err());
    }

    #[test]
    fn exports_land_in_the_capture_dir() {
        let dir = std::env::temp_dir().join(format!("fxdeck-test-{}", std::process::id()));
        let path = save_text(&dir, "++\n++\n").unwrap();
        assert_eq!(path.parent(), Some(dir.as_path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "++\n++\n");

        let frame = CapturedFrame {
            width: 1,
            height: 1,
            padded_bytes_per_row: 256,
            format: wgpu::TextureFormat::Rgba8Unorm,
            data: [vec![1, 2, 3, 255], vec![0; 252]].concat(),
        };
        let png = save_capture(&dir, &frame).unwrap();
        let decoded = image::open(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [1, 2, 3, 255]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
