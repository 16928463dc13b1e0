// edgewise — GPU-accelerated Sobel edge detection over a packed-RGBA
// binary raster format.
//
// The crate is two halves:
//   - A minimal image container/codec: `image::Image` owns a buffer of
//     packed 32-bit RGBA pixels and reads/writes a fixed big-endian binary
//     format, normalizing storage so that width >= height (an orientation
//     flag lets `save` reproduce the original file bit-for-bit).
//   - The compute stage: `gpu::sobel::SobelFilter` runs a grid-stride Sobel
//     kernel on a wgpu device, with `gpu::staging::FilterSession` owning the
//     accelerator-side resources for one filter call.
//
// `sobel::sobel` is the CPU reference implementation of the same kernel,
// with identical clamped-sampling and arithmetic semantics. The non-GPU
// test suites run against it; the GPU suites (behind `#[ignore]`) assert
// agreement between the two.

pub mod gpu;
pub mod image;
pub mod pixel;
pub mod sobel;
pub mod wire;
