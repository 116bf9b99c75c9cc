//! Instance, adapter, device and queue shared by every pass.

use crate::error::{DofError, DofResult};
use crate::render_targets::TargetKind;

pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub fn create_instance() -> wgpu::Instance {
        wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        })
    }

    /// Request an adapter (compatible with `surface` when given) and a device.
    /// Adapters that cannot allocate every render target are skipped.
    pub fn from_instance(
        instance: wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> DofResult<Self> {
        let preferred = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| DofError::context("Failed to find suitable GPU adapter"))?;

        let adapter = match check_adapter(&preferred) {
            Ok(()) => preferred,
            Err(reason) => {
                log::warn!("Adapter {} rejected: {reason}", preferred.get_info().name);
                instance
                    .enumerate_adapters(wgpu::Backends::PRIMARY)
                    .into_iter()
                    .filter(|a| surface.map_or(true, |s| a.is_surface_supported(s)))
                    .find(|a| check_adapter(a).is_ok())
                    .ok_or_else(|| DofError::context(format!("No adapter supports the pipeline: {reason}")))?
            }
        };

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Depthfield Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| DofError::context(format!("Failed to create device: {e}")))?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Largest width or height a texture may have on this device.
    pub fn max_extent(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// `InvalidArgument` when `width × height` cannot back a texture.
    pub fn check_extent(&self, what: &str, width: u32, height: u32) -> DofResult<()> {
        let max = self.max_extent();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(DofError::InvalidArgument(format!(
                "{what} size {width}x{height} is outside 1..={max}"
            )));
        }
        Ok(())
    }

    pub fn headless() -> DofResult<Self> {
        Self::from_instance(Self::create_instance(), None)
    }

    /// Run `create` inside a validation error scope and report the first error.
    pub fn capture_validation<T>(
        &self,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, wgpu::Error> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }
}

/// Every target kind must be renderable with its sample count, and the
/// adapter must meet the default WebGPU limits.
pub fn check_adapter(adapter: &wgpu::Adapter) -> Result<(), String> {
    let downlevel = adapter.get_downlevel_capabilities();
    if !downlevel.is_webgpu_compliant() {
        return Err(format!("missing downlevel features {:?}", wgpu::DownlevelFlags::compliant() - downlevel.flags));
    }
    if !wgpu::Limits::default().check_limits(&adapter.limits()) {
        return Err("adapter limits are below the WebGPU defaults".into());
    }
    TargetKind::ALL
        .iter()
        .try_for_each(|kind| kind.check_support(adapter).map_err(|e| format!("{}: {e}", kind.label())))
}
