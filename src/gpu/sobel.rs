// gpu/sobel.rs — the Sobel compute pipeline and the filter driver.
//
// `SobelFilter` compiles shaders/sobel.wgsl once (workgroup shape
// substituted into the source) and is reused across calls. Each call is
// the blocking sequence
//
//   acquire → run → release
//
// with release executing even when the launch failed, so device memory is
// never leaked on the failure path. The steps are public: callers that
// want to stage once and inspect the session may drive them individually,
// `filter()` is the one-shot path.

use wgpu::util::DeviceExt;

use crate::gpu::device::{GpuDevice, GpuError, LaunchShape};
use crate::gpu::staging::FilterSession;
use crate::image::Image;
use crate::pixel::MAX_CHANNEL;

// Uniform params — must match WGSL struct Params exactly.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SobelParams {
    width: u32,
    height: u32,
    stride_x: u32,
    stride_y: u32,
    max_value: u32,
    _pad: [u32; 3],
}

/// GPU Sobel edge detector.
///
/// Create once per device; call [`filter`](Self::filter) per image. The
/// launch shape is captured from the device at creation (the shader is
/// specialized to the workgroup size), so configure
/// `GpuDevice::set_launch_shape` before constructing the filter.
pub struct SobelFilter {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
    shape: LaunchShape,
    /// Saturation bound for the output magnitude (default 255).
    pub max_value: u32,
}

impl SobelFilter {
    pub fn new(gpu: &GpuDevice) -> Self {
        let shape = gpu.launch;
        let shader_template = include_str!("../shaders/sobel.wgsl");
        let shader_src = shader_template
            .replace("{{WG_X}}", &shape.workgroup.0.to_string())
            .replace("{{WG_Y}}", &shape.workgroup.1.to_string());

        let shader = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("sobel.wgsl"),
                source: wgpu::ShaderSource::Wgsl(shader_src.into()),
            });

        let bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("SobelFilter BGL"),
                entries: &[
                    // 0 — source texture (packed pixels as uint texels)
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Uint,
                        },
                        count: None,
                    },
                    // 1 — output buffer (storage read_write)
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // 2 — params uniform
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("SobelFilter pipeline layout"),
                bind_group_layouts: &[&bgl],
                push_constant_ranges: &[],
            });

        let pipeline = gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("sobel_edges"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: "sobel_edges",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        SobelFilter {
            pipeline,
            bgl,
            shape,
            max_value: MAX_CHANNEL,
        }
    }

    /// Launch the kernel against a session's texture and output buffer.
    ///
    /// Blocks only for command submission; the result is not host-visible
    /// until [`FilterSession::release`].
    ///
    /// # Errors
    /// `GpuError::Device` if the bind or launch fails.
    pub fn run(&self, gpu: &GpuDevice, session: &FilterSession) -> Result<(), GpuError> {
        let (stride_x, stride_y) = self.shape.stride();
        let params = SobelParams {
            width: session.width,
            height: session.height,
            stride_x,
            stride_y,
            max_value: self.max_value,
            _pad: [0; 3],
        };

        gpu.push_error_scopes();
        let params_buf = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("SobelFilter params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SobelFilter BG"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&session.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: session.output.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("SobelFilter dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("sobel_edges"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            // Fixed dispatch: the grid-stride loop covers the raster.
            pass.dispatch_workgroups(self.shape.grid.0, self.shape.grid.1, 1);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));

        gpu.pop_error_scopes("launch")
    }

    /// One-shot filter: upload, launch, read back.
    ///
    /// The host buffer of `src` is only read during staging. On a launch
    /// failure the session is still released — its device resources are
    /// freed — before the error propagates.
    pub fn filter(&self, gpu: &GpuDevice, src: &Image) -> Result<Image, GpuError> {
        let session = FilterSession::acquire(gpu, src)?;
        let launched = self.run(gpu, &session);
        // Cleanup runs unconditionally; a launch error takes precedence
        // over whatever the readback produced.
        let result = session.release(gpu);
        launched?;
        result
    }
}

// ---------------------------------------------------------------------------
// Tests (GPU integration, subprocess isolation)
// ---------------------------------------------------------------------------
//
// dzn (Microsoft's D3D12-to-Vulkan layer on WSL2) crashes with SIGSEGV in
// its own atexit cleanup once any Vulkan device existed in the process.
// Workaround: each GPU test runs in an isolated child `cargo test` process;
// the child prints "GPU_TEST_OK" before returning and the parent checks the
// output, not the exit code.
