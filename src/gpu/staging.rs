// gpu/staging.rs — Per-call accelerator resources for one filter pass.
//
// A `FilterSession` owns everything the kernel touches on the device:
//
//   - the source texture (`R32Uint`, one packed pixel per texel), uploaded
//     through a 256-byte-row-aligned staging buffer;
//   - the output storage buffer (width * height * 4 bytes).
//
// Sampling semantics: non-normalized integer coordinates with
// clamp-to-edge in both axes. Uint textures are not filterable, so the
// clamp lives in the shader (`textureLoad` after coordinate clamping)
// rather than in a sampler object — same observable behavior, one less
// binding.
//
// The session is an explicit object passed into the kernel invocation, so
// two sequential (or interleaved) filter calls never share device state.
// All wgpu resources are RAII handles: dropping the session — including on
// every error path — releases the device memory.
//
// UPLOAD ALIGNMENT:
// `copy_buffer_to_texture` requires `bytes_per_row` to be a multiple of
// wgpu::COPY_BYTES_PER_ROW_ALIGNMENT (256). Rows are padded into the
// staging buffer to meet it; the padding never reaches the texture.

use wgpu::util::DeviceExt;

use crate::gpu::device::{GpuDevice, GpuError};
use crate::image::Image;

const COPY_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Device-side state for one filter call: source texture, its view, and
/// the output buffer the kernel writes.
///
/// Created by [`FilterSession::acquire`], consumed by
/// [`FilterSession::release`]. The host pixel buffer is only read during
/// `acquire`; nothing aliases it afterwards.
pub struct FilterSession {
    pub(crate) view: wgpu::TextureView,
    pub(crate) output: wgpu::Buffer,
    pub(crate) width: u32,
    pub(crate) height: u32,
    transposed: bool,
    /// Keeps the source texture alive for the duration of the session.
    _texture: wgpu::Texture,
}

impl FilterSession {
    /// Allocate the device resources for filtering `src` and upload its
    /// pixels.
    ///
    /// # Errors
    /// `GpuError::Device` on any allocation or copy failure, with the wgpu
    /// diagnostic text. No device resources remain reachable after a
    /// failure — everything allocated before the failing step drops before
    /// the error propagates.
    pub fn acquire(gpu: &GpuDevice, src: &Image) -> Result<Self, GpuError> {
        let width = src.width();
        let height = src.height();
        if width == 0 || height == 0 {
            return Err(GpuError::Device {
                stage: "acquire",
                message: format!("cannot stage an empty image ({width}×{height})"),
            });
        }

        gpu.push_error_scopes();

        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("FilterSession source"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            // One packed RGBA word per texel, read as uint in the shader.
            format: wgpu::TextureFormat::R32Uint,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let output_size = width as u64 * height as u64 * 4;
        let output = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("FilterSession output"),
            size: output_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        // Compact the host rows into a 256-byte-aligned staging buffer.
        let row_bytes = width * 4;
        let aligned_bytes_per_row = align_to(row_bytes, COPY_ALIGNMENT);
        let mut staging = vec![0u8; (aligned_bytes_per_row as u64 * height as u64) as usize];
        let src_bytes: &[u8] = bytemuck::cast_slice(src.pixels());
        for y in 0..height as usize {
            let src_start = y * row_bytes as usize;
            let dst_start = y * aligned_bytes_per_row as usize;
            staging[dst_start..dst_start + row_bytes as usize]
                .copy_from_slice(&src_bytes[src_start..src_start + row_bytes as usize]);
        }

        let staging_buf = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("FilterSession staging"),
                contents: &staging,
                usage: wgpu::BufferUsages::COPY_SRC,
            });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("FilterSession upload"),
            });
        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &staging_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(aligned_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        gpu.pop_error_scopes("acquire")?;

        Ok(FilterSession {
            view,
            output,
            width,
            height,
            transposed: src.is_transposed(),
            _texture: texture,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Copy the output buffer back to the host and free every device
    /// resource, returning the result as a new Image with the source's
    /// dimensions and orientation flag.
    ///
    /// This consumes the session; device memory is released when it drops,
    /// whether or not the readback succeeded.
    ///
    /// # Errors
    /// `GpuError::Device` if the copy-back or buffer mapping fails.
    pub fn release(self, gpu: &GpuDevice) -> Result<Image, GpuError> {
        let output_size = self.width as u64 * self.height as u64 * 4;

        gpu.push_error_scopes();
        let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("FilterSession readback"),
            size: output_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("FilterSession readback"),
            });
        encoder.copy_buffer_to_buffer(&self.output, 0, &readback, 0, output_size);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        gpu.pop_error_scopes("release")?;

        // Map is async in wgpu's API; block via poll(Wait) until the copy
        // completes and the callback fires.
        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(GpuError::Device {
                    stage: "release",
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(GpuError::Device {
                    stage: "release",
                    message: "readback map callback never fired".into(),
                })
            }
        }

        let mapped = slice.get_mapped_range();
        let pixels: Vec<u32> = bytemuck::cast_slice(&mapped).to_vec();
        drop(mapped);
        readback.unmap();

        Ok(Image::from_vec_oriented(
            self.width,
            self.height,
            self.transposed,
            pixels,
        ))
    }
}

/// Round `value` up to the next multiple of `alignment`.
#[inline]
pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) / alignment * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    // GPU-dependent session tests live in gpu::sobel (subprocess-isolated);
    // here only the pure staging arithmetic.

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        // 3-pixel row = 12 bytes → one aligned row.
        assert_eq!(align_to(3 * 4, 256), 256);
        // 100-pixel row = 400 bytes → two.
        assert_eq!(align_to(100 * 4, 256), 512);
    }

    #[test]
    fn test_staging_row_compaction() {
        // Reproduce the compaction loop and verify the aligned layout.
        let pixels: Vec<u32> = vec![0x11111111, 0x22222222, 0x33333333, 0x44444444];
        let width = 2u32;
        let height = 2u32;
        let row_bytes = width * 4;
        let aligned = align_to(row_bytes, 256);
        let mut staging = vec![0u8; (aligned * height) as usize];
        let src_bytes: &[u8] = bytemuck::cast_slice(&pixels);
        for y in 0..height as usize {
            let src_start = y * row_bytes as usize;
            let dst_start = y * aligned as usize;
            staging[dst_start..dst_start + row_bytes as usize]
                .copy_from_slice(&src_bytes[src_start..src_start + row_bytes as usize]);
        }
        // Row 0 at offset 0, row 1 at the aligned boundary.
        assert_eq!(&staging[0..8], bytemuck::cast_slice::<u32, u8>(&pixels[0..2]));
        assert_eq!(
            &staging[aligned as usize..aligned as usize + 8],
            bytemuck::cast_slice::<u32, u8>(&pixels[2..4])
        );
        // Padding between rows untouched.
        assert!(staging[8..aligned as usize].iter().all(|&b| b == 0));
    }
}
