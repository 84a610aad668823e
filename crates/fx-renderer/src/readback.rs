// ABOUTME: One-shot GPU readback: mapping staging buffers and unpadding captured frames.
// ABOUTME: Blocks the caller until the map completes; never used on the per-frame path.

use std::sync::mpsc;

use crate::gpu::GpuContext;

#[derive(Debug, thiserror::Error)]
pub enum ReadbackError {
    #[error("GPU buffer mapping failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("GPU map callback was dropped before completing")]
    CallbackDropped,

    #[error("No frame has been rendered yet")]
    NoFrame,

    #[error("Cannot capture format {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),
}

/// Row pitch of a texture-to-buffer copy, rounded up to the copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Map a `MAP_READ` buffer, copy its contents out and unmap it.
pub fn read_buffer(context: &GpuContext, buffer: &wgpu::Buffer) -> Result<Vec<u8>, ReadbackError> {
    let buffer_slice = buffer.slice(..);
    let (sender, receiver) = mpsc::channel();

    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    context.device.poll(wgpu::Maintain::Wait);

    receiver.recv().map_err(|_| ReadbackError::CallbackDropped)??;

    let data = buffer_slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}

/// A rendered frame copied back from the GPU, rows still padded.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub padded_bytes_per_row: u32,
    pub format: wgpu::TextureFormat,
    pub data: Vec<u8>,
}

impl CapturedFrame {
    /// Tightly packed RGBA8, padding stripped and BGRA swizzled.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let unpadded = (self.width * 4) as usize;
        let bgra = matches!(
            self.format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );
        let mut out = Vec::with_capacity(unpadded * self.height as usize);
        for row in self
            .data
            .chunks(self.padded_bytes_per_row as usize)
            .take(self.height as usize)
        {
            let pixels = &row[..unpadded.min(row.len())];
            if bgra {
                for px in pixels.chunks_exact(4) {
                    out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            } else {
                out.extend_from_slice(pixels);
            }
        }
        out
    }

    pub fn is_capturable(format: wgpu::TextureFormat) -> bool {
        matches!(
            format,
            wgpu::TextureFormat::Rgba8Unorm
                | wgpu::TextureFormat::Rgba8UnormSrgb
                | wgpu::TextureFormat::Bgra8Unorm
                | wgpu::TextureFormat::Bgra8UnormSrgb
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1), 256);
    }

    #[test]
    fn unpads_and_swizzles_bgra() {
        let width = 2;
        let pitch = padded_bytes_per_row(width);
        let mut data = vec![0xAA; (pitch * 2) as usize];
        // Row 0: blue pixel, green pixel. Row 1: red pixel, white pixel.
        data[..8].copy_from_slice(&[255, 0, 0, 255, 0, 255, 0, 255]);
        let row1 = pitch as usize;
        data[row1..row1 + 8].copy_from_slice(&[0, 0, 255, 255, 255, 255, 255, 255]);

        let frame = CapturedFrame {
            width,
            height: 2,
            padded_bytes_per_row: pitch,
            format: wgpu::TextureFormat::Bgra8Unorm,
            data,
        };
        let rgba = frame.to_rgba8();
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[..4], &[0, 0, 255, 255]);
        assert_eq!(&rgba[4..8], &[0, 255, 0, 255]);
        assert_eq!(&rgba[8..12], &[255, 0, 0, 255]);
    }

    #[test]
    fn rgba_frames_are_only_unpadded() {
        let pitch = padded_bytes_per_row(1);
        let mut data = vec![0; pitch as usize];
        data[..4].copy_from_slice(&[1, 2, 3, 4]);
        let frame = CapturedFrame {
            width: 1,
            height: 1,
            padded_bytes_per_row: pitch,
            format: wgpu::TextureFormat::Rgba8Unorm,
            data,
        };
        assert_eq!(frame.to_rgba8(), vec![1, 2, 3, 4]);
    }
}
