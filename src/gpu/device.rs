// gpu/device.rs — wgpu device abstraction.
//
// Responsibilities:
//   - Enumerate Vulkan adapters and select the first non-CPU one.
//   - Request limits high enough for the default launch shape (a 32×32
//     workgroup is 1024 invocations; wgpu's baseline limit is 256).
//   - Expose `LaunchShape` — the physical launch configuration (workgroup
//     shape × dispatch-grid shape), validated against the device limits.
//   - Capture asynchronous wgpu errors as `GpuError` via error scopes, so
//     allocation/copy/launch failures surface as typed results instead of
//     the uncaptured-error panic handler.
//
// ADAPTER SELECTION:
// wgpu's default `request_adapter` uses power preference heuristics that
// may grab llvmpipe/softpipe on WSL2 (where the software renderer appears
// as a valid Vulkan device). We enumerate explicitly and prefer real
// hardware over anything reporting DeviceType::Cpu.
//
// LAUNCH SHAPE:
// The kernel uses a grid-stride loop, so the physical shape is decoupled
// from image dimensions: a fixed dispatch covers any raster by having each
// lane step through the logical index space by the total physical extent.
// The defaults (32×32 workgroup, 32×32 grid = 1,048,576 lanes) degrade to
// a smaller workgroup on devices that cap invocations below 1024.

use std::fmt;

// ---------------------------------------------------------------------------
// LaunchShape
// ---------------------------------------------------------------------------

/// Physical launch configuration for the 2D compute dispatch.
///
/// `workgroup` is the per-workgroup invocation shape (the shader is
/// specialized to it at pipeline creation); `grid` is the number of
/// workgroups dispatched in each axis. Both are fixed per dispatch — the
/// grid-stride loop in the kernel covers arbitrary image sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchShape {
    pub workgroup: (u32, u32),
    pub grid: (u32, u32),
}

impl LaunchShape {
    /// Invocations per workgroup (x * y).
    pub fn invocations(&self) -> u32 {
        self.workgroup.0 * self.workgroup.1
    }

    /// Total physical extent in each axis — the step of the grid-stride
    /// loop.
    pub fn stride(&self) -> (u32, u32) {
        (
            self.workgroup.0 * self.grid.0,
            self.workgroup.1 * self.grid.1,
        )
    }

    /// Total physical lanes across the dispatch.
    pub fn lanes(&self) -> u64 {
        self.invocations() as u64 * self.grid.0 as u64 * self.grid.1 as u64
    }

    /// The default shape for a device allowing `max_invocations` per
    /// workgroup: the largest square workgroup that fits, with a 32×32
    /// dispatch grid.
    fn for_limit(max_invocations: u32) -> Self {
        let wg = if max_invocations >= 1024 {
            32
        } else if max_invocations >= 256 {
            16
        } else {
            8
        };
        LaunchShape {
            workgroup: (wg, wg),
            grid: (32, 32),
        }
    }
}

impl fmt::Display for LaunchShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}×{} workgroup × {}×{} grid ({} lanes)",
            self.workgroup.0,
            self.workgroup.1,
            self.grid.0,
            self.grid.1,
            self.lanes()
        )
    }
}

// ---------------------------------------------------------------------------
// AdapterInfo
// ---------------------------------------------------------------------------

/// Cached adapter information for logging and debugging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, {:?})",
            self.name, self.backend, self.device_type
        )
    }
}

// ---------------------------------------------------------------------------
// GpuDevice
// ---------------------------------------------------------------------------

/// The core GPU context: adapter, device, queue, and launch configuration.
///
/// Create once and reuse — Vulkan instance + device initialization is
/// expensive, a filter call is not.
///
/// # Field drop order
/// Rust drops struct fields in declaration order (top → bottom).
/// `_instance` is declared last so the `wgpu::Instance` outlives `device`
/// and `queue`. This prevents a crash in dzn (the D3D12-to-Vulkan layer on
/// WSL2) when the Vulkan instance is destroyed while device-level objects
/// still hold back-references to it.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub launch: LaunchShape,
    /// The limits actually granted by the device; launch-shape changes are
    /// validated against these.
    limits: wgpu::Limits,
    /// Keeps the `wgpu::Instance` alive until `device` and `queue` are
    /// dropped. Never accessed directly.
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Create a `GpuDevice` on the first non-CPU Vulkan adapter found.
    ///
    /// # Errors
    /// Returns `Err` if no suitable adapter is found or the device request
    /// fails.
    pub fn new() -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> Result<Self, GpuError> {
        // Vulkan only. ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER lets wgpu
        // enumerate dzn on WSL2 (it declares itself non-conformant but runs
        // compute-only workloads fine); validation layer in debug builds.
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN,
            flags,
            ..Default::default()
        });

        let all_adapters: Vec<wgpu::Adapter> = instance
            .enumerate_adapters(wgpu::Backends::VULKAN)
            .into_iter()
            .collect();

        if all_adapters.is_empty() {
            return Err(GpuError::NoSuitableAdapter);
        }

        for a in &all_adapters {
            let info = a.get_info();
            eprintln!(
                "[edgewise] Vulkan adapter: {} ({:?}, {:?})",
                info.name, info.backend, info.device_type
            );
        }

        // Tier 1: real hardware (or dzn/VM pass-through, which report as
        // Other/VirtualGpu). Tier 2: whatever exists, even software — the
        // adapter name is logged above so the fallback is visible.
        let adapter = all_adapters
            .into_iter()
            .find(|a| {
                matches!(
                    a.get_info().device_type,
                    wgpu::DeviceType::DiscreteGpu
                        | wgpu::DeviceType::IntegratedGpu
                        | wgpu::DeviceType::VirtualGpu
                        | wgpu::DeviceType::Other
                )
            })
            .or_else(|| {
                instance
                    .enumerate_adapters(wgpu::Backends::VULKAN)
                    .into_iter()
                    .next()
            })
            .ok_or(GpuError::NoSuitableAdapter)?;

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name.clone(),
            vendor: raw_info.vendor,
            device: raw_info.device,
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };

        // Ask for as many compute invocations per workgroup as the adapter
        // actually supports (capped at the 1024 the default launch shape
        // wants). wgpu validates dispatches against the *requested* limits,
        // so the baseline 256 would reject a 32×32 workgroup even on
        // hardware that handles it.
        let adapter_limits = adapter.limits();
        let limits = wgpu::Limits {
            max_compute_invocations_per_workgroup: adapter_limits
                .max_compute_invocations_per_workgroup
                .min(1024),
            ..wgpu::Limits::default()
        };

        // wgpu 22: request_device returns (Device, Queue) directly.
        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("edgewise"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        let launch = LaunchShape::for_limit(limits.max_compute_invocations_per_workgroup);

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            launch,
            limits,
            _instance: instance,
        })
    }

    /// Override the launch shape, validating it against the device limits.
    ///
    /// Note that `SobelFilter` captures the shape at pipeline creation —
    /// configure the shape first, then build the filter.
    pub fn set_launch_shape(&mut self, shape: LaunchShape) -> Result<(), GpuError> {
        let max = self.limits.max_compute_invocations_per_workgroup;
        if shape.invocations() > max
            || shape.workgroup.0 > self.limits.max_compute_workgroup_size_x
            || shape.workgroup.1 > self.limits.max_compute_workgroup_size_y
        {
            return Err(GpuError::LaunchTooLarge {
                total: shape.invocations(),
                max,
            });
        }
        if shape.workgroup.0 == 0
            || shape.workgroup.1 == 0
            || shape.grid.0 == 0
            || shape.grid.1 == 0
            || shape.grid.0 > self.limits.max_compute_workgroups_per_dimension
            || shape.grid.1 > self.limits.max_compute_workgroups_per_dimension
        {
            return Err(GpuError::LaunchTooLarge {
                total: shape.invocations(),
                max,
            });
        }
        self.launch = shape;
        Ok(())
    }

    // --- Error scopes ---
    //
    // wgpu reports allocation/validation failures asynchronously. Bracketing
    // each staging/launch step in error scopes turns those into typed
    // errors on the calling thread; resources created inside a failed scope
    // are dropped by the caller before the error propagates.

    pub(crate) fn push_error_scopes(&self) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    /// Pop both scopes pushed by `push_error_scopes`, reporting the first
    /// failure with the wgpu diagnostic text.
    pub(crate) fn pop_error_scopes(&self, stage: &'static str) -> Result<(), GpuError> {
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match out_of_memory.or(validation) {
            Some(e) => Err(GpuError::Device {
                stage,
                message: e.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, launch: {} }}",
            self.adapter_info, self.launch
        )
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from device initialization, configuration, and kernel execution.
#[derive(Debug)]
pub enum GpuError {
    /// No Vulkan adapter found. On WSL2: check that Vulkan is installed
    /// and `vulkaninfo` shows a device.
    NoSuitableAdapter,
    /// wgpu device request failed (driver issue, unsupported limits, etc.).
    DeviceRequest(wgpu::RequestDeviceError),
    /// Requested launch shape exceeds the device's compute limits.
    LaunchTooLarge { total: u32, max: u32 },
    /// An allocation, copy, bind, or kernel launch failed on the device;
    /// carries the underlying wgpu diagnostic.
    Device {
        stage: &'static str,
        message: String,
    },
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoSuitableAdapter => write!(
                f,
                "no suitable Vulkan adapter found (only CPU/software renderers visible)"
            ),
            GpuError::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            GpuError::LaunchTooLarge { total, max } => write!(
                f,
                "workgroup size {total} exceeds device limit of {max} invocations"
            ),
            GpuError::Device { stage, message } => {
                write!(f, "device failure during {stage}: {message}")
            }
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceRequest(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
