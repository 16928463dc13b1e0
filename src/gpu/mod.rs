// gpu/ — wgpu-backed execution of the Sobel kernel.
//
//   device   — adapter selection, device limits, launch-shape configuration
//   staging  — per-call accelerator resources (upload, output, readback)
//   sobel    — the compute pipeline and the acquire → run → release driver

pub mod device;
pub mod sobel;
pub mod staging;
