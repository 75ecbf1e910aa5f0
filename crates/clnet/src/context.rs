//! Contexts and the factories for every context-owned resource.

use std::path::Path;
use std::sync::Arc;

use clnet_sys::info::context as key;
use clnet_sys::types::mem_object_type;
use clnet_sys::{
    AddressingMode, ClApi, DeviceType, FilterMode, ImageDesc, ImageFormat, InfoTarget, MemFlags,
    NativeHandle, ResourceKind, Status,
};
use tracing::debug;

use crate::config::ClnetConfig;
use crate::device::Device;
use crate::error::{ClError, Result};
use crate::event::Event;
use crate::handle::OwnedHandle;
use crate::memory::{Image, Mem};
use crate::platform::Platform;
use crate::program::Program;
use crate::property::PropertyReader;
use crate::queue::CommandQueue;
use crate::sampler::Sampler;

#[derive(Debug)]
struct ContextInner {
    owned: OwnedHandle,
    platform: Option<Platform>,
    devices: Vec<Device>,
}

/// An OpenCL context.
///
/// Clones share one native reference: releasing through any clone releases
/// the context for all of them, and the last clone to drop releases it if
/// nobody did. Resources created from a context keep a clone as their
/// back-reference.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Create a context over `devices` of `platform`.
    pub fn new(platform: &Platform, devices: &[Device]) -> Result<Self> {
        if devices.is_empty() {
            return Err(ClError::InvalidArgument("a context needs at least one device".into()));
        }
        let api = Arc::clone(platform.api());
        let handles: Vec<NativeHandle> = devices.iter().map(Device::handle).collect();
        let raw = api
            .create_context(Some(platform.handle()), &handles)
            .map_err(|status| ClError::native("clCreateContext", status))?;
        Self::adopt(api, Some(platform.clone()), raw)
    }

    /// Create a context over every device of `device_type` on `platform`.
    pub fn from_type(platform: &Platform, device_type: DeviceType) -> Result<Self> {
        let api = Arc::clone(platform.api());
        let raw = match api.create_context_from_type(Some(platform.handle()), device_type) {
            Ok(raw) => raw,
            Err(Status::DEVICE_NOT_FOUND) => {
                return Err(ClError::ResourceUnavailable(format!(
                    "no {device_type} devices on platform {}",
                    platform.handle()
                )));
            }
            Err(status) => return Err(ClError::native("clCreateContextFromType", status)),
        };
        Self::adopt(api, Some(platform.clone()), raw)
    }

    /// Pick the configured platform and device class.
    pub fn from_config(api: Arc<dyn ClApi>, config: &ClnetConfig) -> Result<Self> {
        let platform = Platform::nth(api, config.platform_index)?;
        Self::from_type(&platform, config.device_type.device_type())
    }

    fn adopt(api: Arc<dyn ClApi>, platform: Option<Platform>, raw: NativeHandle) -> Result<Self> {
        // Owned first: a failed device read below still releases the context.
        let owned = OwnedHandle::new(Arc::clone(&api), ResourceKind::Context, raw);
        let devices = owned
            .container(InfoTarget::Context)?
            .read_handles(key::DEVICES)?
            .into_iter()
            .map(|h| Device::wrap(Arc::clone(&api), h))
            .collect::<Result<Vec<_>>>()?;
        debug!(context = %raw, devices = devices.len(), "context ready");
        Ok(Self { inner: Arc::new(ContextInner { owned, platform, devices }) })
    }

    pub(crate) fn own(&self, kind: ResourceKind, raw: NativeHandle) -> OwnedHandle {
        OwnedHandle::new(Arc::clone(self.api()), kind, raw)
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.inner.owned.handle()
    }

    pub fn api(&self) -> &Arc<dyn ClApi> {
        self.inner.owned.api()
    }

    /// The platform the context was created on, when known.
    pub fn platform(&self) -> Option<&Platform> {
        self.inner.platform.as_ref()
    }

    /// Devices attached to the context, in native order.
    pub fn devices(&self) -> &[Device] {
        &self.inner.devices
    }

    pub fn release(&self) -> Result<()> {
        self.inner.owned.release()
    }

    pub fn is_released(&self) -> bool {
        self.inner.owned.is_released()
    }

    pub fn reference_count(&self) -> Result<u32> {
        self.inner.owned.container(InfoTarget::Context)?.read_scalar(key::REFERENCE_COUNT)
    }

    pub fn num_devices(&self) -> Result<u32> {
        self.inner.owned.container(InfoTarget::Context)?.read_scalar(key::NUM_DEVICES)
    }

    /// Whether any attached device has 64-bit addressing.
    pub fn is_64bit(&self) -> Result<bool> {
        for device in self.devices() {
            if device.address_bits()? == 64 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn create_command_queue(&self, device: &Device, properties: u64) -> Result<CommandQueue> {
        let raw = self
            .api()
            .create_command_queue(self.handle()?, device.handle(), properties)
            .map_err(|status| ClError::native("clCreateCommandQueue", status))?;
        Ok(CommandQueue::new(self.own(ResourceKind::CommandQueue, raw), self.clone()))
    }

    /// Uninitialised buffer of `size` bytes.
    pub fn create_buffer(&self, flags: MemFlags, size: usize) -> Result<Mem> {
        if flags.contains(MemFlags::COPY_HOST_PTR) || flags.contains(MemFlags::USE_HOST_PTR) {
            return Err(ClError::InvalidArgument(
                "host pointer flags need data; use create_buffer_with_data".into(),
            ));
        }
        self.buffer(flags, size, None)
    }

    /// Buffer initialised with a copy of `data`.
    pub fn create_buffer_with_data(&self, flags: MemFlags, data: &[u8]) -> Result<Mem> {
        if flags.contains(MemFlags::USE_HOST_PTR) {
            return Err(ClError::InvalidArgument(
                "USE_HOST_PTR would outlive the borrowed data".into(),
            ));
        }
        self.buffer(flags | MemFlags::COPY_HOST_PTR, data.len(), Some(data))
    }

    /// Sub-buffer over `size` bytes of `buffer` starting at `origin`.
    ///
    /// Access flags left empty are inherited from the parent; host pointer
    /// flags always are. The sub-buffer holds a native reference on its
    /// parent, so dropping the parent first is fine.
    pub fn create_sub_buffer(
        &self,
        buffer: &Mem,
        flags: MemFlags,
        origin: usize,
        size: usize,
    ) -> Result<Mem> {
        let host_flags = [MemFlags::USE_HOST_PTR, MemFlags::ALLOC_HOST_PTR, MemFlags::COPY_HOST_PTR];
        if host_flags.iter().any(|f| flags.contains(*f)) {
            return Err(ClError::InvalidArgument(
                "sub-buffers inherit host pointer flags from their parent".into(),
            ));
        }
        let raw = self
            .api()
            .create_sub_buffer(buffer.handle()?, flags, origin, size)
            .map_err(|status| ClError::native("clCreateSubBuffer", status))?;
        debug!(sub_buffer = %raw, origin, size, "sub-buffer created");
        Ok(Mem::new(self.own(ResourceKind::MemObject, raw), self.clone()))
    }

    fn buffer(&self, flags: MemFlags, size: usize, data: Option<&[u8]>) -> Result<Mem> {
        let raw = self
            .api()
            .create_buffer(self.handle()?, flags, size, data)
            .map_err(|status| ClError::native("clCreateBuffer", status))?;
        Ok(Mem::new(self.own(ResourceKind::MemObject, raw), self.clone()))
    }

    /// Image described by `desc`. `data`, when given, is copied.
    pub fn create_image(
        &self,
        flags: MemFlags,
        format: ImageFormat,
        desc: &ImageDesc,
        data: Option<&[u8]>,
    ) -> Result<Image> {
        if flags.contains(MemFlags::USE_HOST_PTR) {
            return Err(ClError::InvalidArgument(
                "USE_HOST_PTR would outlive the borrowed data".into(),
            ));
        }
        let flags = if data.is_some() { flags | MemFlags::COPY_HOST_PTR } else { flags };
        let raw = self
            .api()
            .create_image(self.handle()?, flags, &format, desc, data)
            .map_err(|status| ClError::native("clCreateImage", status))?;
        Ok(Image::new(self.own(ResourceKind::MemObject, raw), self.clone()))
    }

    pub fn create_image_2d(
        &self,
        flags: MemFlags,
        format: ImageFormat,
        width: usize,
        height: usize,
        data: Option<&[u8]>,
    ) -> Result<Image> {
        self.create_image(flags, format, &ImageDesc::image_2d(width, height, 0), data)
    }

    pub fn create_image_3d(
        &self,
        flags: MemFlags,
        format: ImageFormat,
        (width, height, depth): (usize, usize, usize),
        data: Option<&[u8]>,
    ) -> Result<Image> {
        self.create_image(flags, format, &ImageDesc::image_3d(width, height, depth, 0, 0), data)
    }

    pub fn create_sampler(
        &self,
        normalized_coords: bool,
        addressing: AddressingMode,
        filter: FilterMode,
    ) -> Result<Sampler> {
        let raw = self
            .api()
            .create_sampler(self.handle()?, normalized_coords, addressing, filter)
            .map_err(|status| ClError::native("clCreateSampler", status))?;
        Ok(Sampler::new(self.own(ResourceKind::Sampler, raw), self.clone()))
    }

    pub fn create_program_with_source(&self, source: &str) -> Result<Program> {
        self.create_program_with_sources(&[source])
    }

    /// One program from several source strings, concatenated natively.
    pub fn create_program_with_sources(&self, sources: &[&str]) -> Result<Program> {
        if sources.is_empty() {
            return Err(ClError::InvalidArgument("no program sources given".into()));
        }
        let raw = self
            .api()
            .create_program_with_source(self.handle()?, sources)
            .map_err(|status| ClError::native("clCreateProgramWithSource", status))?;
        Ok(Program::new(self.own(ResourceKind::Program, raw), self.clone()))
    }

    pub fn create_program_from_file(&self, path: &Path) -> Result<Program> {
        let source = std::fs::read_to_string(path)?;
        self.create_program_with_source(&source)
    }

    /// Program from per-device binaries. `devices` and `binaries` are
    /// parallel; the per-device load status comes back in the same order.
    pub fn create_program_with_binary(
        &self,
        devices: &[Device],
        binaries: &[&[u8]],
    ) -> Result<(Program, Vec<Status>)> {
        if devices.len() != binaries.len() || devices.is_empty() {
            return Err(ClError::InvalidArgument(format!(
                "{} device(s) but {} binar(ies)",
                devices.len(),
                binaries.len()
            )));
        }
        let handles: Vec<NativeHandle> = devices.iter().map(Device::handle).collect();
        let (raw, statuses) = self
            .api()
            .create_program_with_binary(self.handle()?, &handles, binaries)
            .map_err(|status| ClError::native("clCreateProgramWithBinary", status))?;
        Ok((Program::new(self.own(ResourceKind::Program, raw), self.clone()), statuses))
    }

    pub fn create_user_event(&self) -> Result<Event> {
        let raw = self
            .api()
            .create_user_event(self.handle()?)
            .map_err(|status| ClError::native("clCreateUserEvent", status))?;
        Ok(Event::new(self.own(ResourceKind::Event, raw), self.clone()))
    }

    /// Image formats usable with `flags` for 2-D (`three_d == false`) or
    /// 3-D images.
    pub fn supported_image_formats(&self, flags: MemFlags, three_d: bool) -> Result<Vec<ImageFormat>> {
        let image_type = if three_d { mem_object_type::IMAGE3D } else { mem_object_type::IMAGE2D };
        self.api()
            .supported_image_formats(self.handle()?, flags, image_type)
            .map_err(|status| ClError::native("clGetSupportedImageFormats", status))
    }

    /// Whether `format` is usable with `flags` for 2-D (`three_d == false`)
    /// or 3-D images.
    pub fn supports_image_format(
        &self,
        flags: MemFlags,
        three_d: bool,
        format: ImageFormat,
    ) -> Result<bool> {
        Ok(self.supported_image_formats(flags, three_d)?.contains(&format))
    }

    /// Whether every attached device advertises `name`.
    pub fn has_extension(&self, name: &str) -> bool {
        self.devices().iter().all(|d| d.has_extension(name))
    }

    /// Whether every attached device advertises all of `names`.
    pub fn has_extensions(&self, names: &[&str]) -> bool {
        self.devices().iter().all(|d| d.has_extensions(names))
    }

    /// Whether `other` refers to the same native context.
    pub fn same_as(&self, other: NativeHandle) -> bool {
        self.handle().is_ok_and(|h| h == other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemObject;
    use clnet_sys::types::{channel_order, channel_type};
    use clnet_test_support::{SimDevice, SimPlatform, SimulatedCl, simulated};

    fn context() -> (Arc<SimulatedCl>, Context) {
        let (sim, api) = simulated(SimulatedCl::default());
        let platform = Platform::nth(api, 0).unwrap();
        let ctx = Context::from_type(&platform, DeviceType::ALL).unwrap();
        (sim, ctx)
    }

    #[test]
    fn devices_are_read_back_in_order() {
        let (sim, ctx) = context();
        let handles: Vec<NativeHandle> = ctx.devices().iter().map(Device::handle).collect();
        assert_eq!(handles, sim.device_handles());
        assert_eq!(ctx.num_devices().unwrap(), 2);
        assert_eq!(ctx.reference_count().unwrap(), 1);
        assert!(ctx.is_64bit().unwrap());
    }

    #[test]
    fn explicit_device_list() {
        let (_, api) = simulated(SimulatedCl::default());
        let platform = Platform::nth(api, 0).unwrap();
        let gpus = platform.devices(DeviceType::GPU).unwrap();
        let ctx = Context::new(&platform, &gpus).unwrap();
        assert_eq!(ctx.devices(), gpus.as_slice());
        assert!(matches!(Context::new(&platform, &[]), Err(ClError::InvalidArgument(_))));
    }

    #[test]
    fn missing_device_class_is_unavailable() {
        let (_, api) = simulated(SimulatedCl::new([
            SimPlatform::new("P").device(SimDevice::cpu("c"))
        ]));
        let platform = Platform::nth(api, 0).unwrap();
        assert!(matches!(
            Context::from_type(&platform, DeviceType::ACCELERATOR),
            Err(ClError::ResourceUnavailable(_))
        ));
    }

    #[test]
    fn dropping_last_clone_releases() {
        let (sim, ctx) = context();
        let raw = ctx.handle().unwrap();
        let clone = ctx.clone();
        drop(ctx);
        assert!(sim.is_live(raw));
        drop(clone);
        assert!(!sim.is_live(raw));
        assert_eq!(sim.release_calls(ResourceKind::Context), 1);
    }

    #[test]
    fn factories_refuse_released_context() {
        let (sim, ctx) = context();
        ctx.release().unwrap();
        let before = sim.info_calls();
        assert!(matches!(
            ctx.create_buffer(MemFlags::READ_WRITE, 64),
            Err(ClError::UseAfterRelease { kind: ResourceKind::Context })
        ));
        assert!(ctx.reference_count().is_err());
        assert_eq!(sim.info_calls(), before);
    }

    #[test]
    fn buffer_flags_are_checked_before_native_call() {
        let (_, ctx) = context();
        assert!(matches!(
            ctx.create_buffer(MemFlags::COPY_HOST_PTR, 8),
            Err(ClError::InvalidArgument(_))
        ));
        assert!(matches!(
            ctx.create_buffer_with_data(MemFlags::USE_HOST_PTR, &[0; 8]),
            Err(ClError::InvalidArgument(_))
        ));
        let mem = ctx.create_buffer_with_data(MemFlags::READ_ONLY, &[1, 2, 3, 4]).unwrap();
        mem.release().unwrap();
    }

    #[test]
    fn supported_formats_are_listed() {
        let (_, ctx) = context();
        let formats = ctx.supported_image_formats(MemFlags::READ_ONLY, false).unwrap();
        assert!(formats.contains(&ImageFormat::new(channel_order::RGBA, channel_type::FLOAT)));

        let rgba = ImageFormat::new(channel_order::RGBA, channel_type::UNORM_INT8);
        assert!(ctx.supports_image_format(MemFlags::READ_ONLY, true, rgba).unwrap());
        let odd = ImageFormat::new(channel_order::LUMINANCE, channel_type::SNORM_INT16);
        assert!(!ctx.supports_image_format(MemFlags::READ_ONLY, false, odd).unwrap());
    }

    #[test]
    fn extensions_must_be_on_every_device() {
        let (_, api) = simulated(SimulatedCl::new([SimPlatform::new("P")
            .device(SimDevice::gpu("g").extensions("cl_khr_fp64 cl_khr_gl_sharing"))
            .device(SimDevice::cpu("c").extensions("cl_khr_fp64"))]));
        let ctx = Context::from_type(&Platform::nth(api, 0).unwrap(), DeviceType::ALL).unwrap();
        assert!(ctx.has_extension("cl_khr_fp64"));
        assert!(!ctx.has_extension("cl_khr_gl_sharing"));
        assert!(ctx.has_extensions(&["cl_khr_fp64"]));
        assert!(!ctx.has_extensions(&["cl_khr_fp64", "cl_khr_gl_sharing"]));
        assert!(ctx.has_extensions(&[]));
    }

    #[test]
    fn sub_buffer_shares_the_context() {
        let (_, ctx) = context();
        let parent = ctx.create_buffer(MemFlags::WRITE_ONLY, 2048).unwrap();
        let sub = ctx.create_sub_buffer(&parent, MemFlags::default(), 128, 512).unwrap();
        assert!(ctx.same_as(sub.context_handle().unwrap()));
        assert_eq!(sub.flags().unwrap(), MemFlags::WRITE_ONLY);
    }

    #[test]
    fn binary_count_must_match_devices() {
        let (_, ctx) = context();
        let devices = ctx.devices().to_vec();
        assert!(matches!(
            ctx.create_program_with_binary(&devices, &[b"x".as_slice()]),
            Err(ClError::InvalidArgument(_))
        ));
    }
}
