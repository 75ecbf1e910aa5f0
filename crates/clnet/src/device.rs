//! Device attributes, capabilities and a printable summary.

use std::fmt;
use std::sync::Arc;

use clnet_sys::info::device as key;
use clnet_sys::{ClApi, DeviceType, InfoTarget, NativeHandle};

use crate::capability::{ApiVersion, CapabilitySet};
use crate::error::Result;
use crate::platform::Platform;
use crate::property::{InfoContainer, PropertyReader};

macro_rules! scalar_getters {
    ($($(#[$meta:meta])* $name:ident: $ty:ty = $key:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self) -> Result<$ty> {
                self.info().read_scalar::<$ty>(key::$key)
            }
        )*
    };
}

macro_rules! bool_getters {
    ($($(#[$meta:meta])* $name:ident = $key:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self) -> Result<bool> {
                self.info().read_bool(key::$key)
            }
        )*
    };
}

macro_rules! string_getters {
    ($($(#[$meta:meta])* $name:ident = $key:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self) -> Result<String> {
                self.info().read_string(key::$key)
            }
        )*
    };
}

/// An OpenCL device. Enumerated, never created; cloning is cheap.
#[derive(Debug, Clone)]
pub struct Device {
    api: Arc<dyn ClApi>,
    handle: NativeHandle,
    capabilities: CapabilitySet,
    version: ApiVersion,
}

impl Device {
    pub(crate) fn wrap(api: Arc<dyn ClApi>, handle: NativeHandle) -> Result<Self> {
        let container = InfoContainer::new(api.as_ref(), InfoTarget::Device(handle));
        let capabilities = CapabilitySet::parse(&container.read_string(key::EXTENSIONS)?);
        let version = ApiVersion::parse(&container.read_string(key::VERSION)?);
        Ok(Self { api, handle, capabilities, version })
    }

    fn info(&self) -> InfoContainer<'_> {
        InfoContainer::new(self.api.as_ref(), InfoTarget::Device(self.handle))
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn api(&self) -> &Arc<dyn ClApi> {
        &self.api
    }

    /// Version parsed once at wrap time.
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.capabilities.has(name)
    }

    pub fn has_extensions(&self, names: &[&str]) -> bool {
        self.capabilities.has_all(names)
    }

    pub fn device_type(&self) -> Result<DeviceType> {
        Ok(DeviceType(self.info().read_scalar::<u64>(key::TYPE)?))
    }

    /// Maximum work-item count per dimension.
    pub fn max_work_item_sizes(&self) -> Result<Vec<usize>> {
        self.info().read_usize_array(key::MAX_WORK_ITEM_SIZES)
    }

    /// The platform this device belongs to.
    pub fn platform(&self) -> Result<Platform> {
        let raw = self.info().read_scalar::<usize>(key::PLATFORM)?;
        Platform::wrap(Arc::clone(&self.api), NativeHandle::from_usize(raw))
    }

    scalar_getters! {
        vendor_id: u32 = VENDOR_ID;
        max_compute_units: u32 = MAX_COMPUTE_UNITS;
        max_work_item_dimensions: u32 = MAX_WORK_ITEM_DIMENSIONS;
        max_work_group_size: usize = MAX_WORK_GROUP_SIZE;
        preferred_vector_width_char: u32 = PREFERRED_VECTOR_WIDTH_CHAR;
        preferred_vector_width_short: u32 = PREFERRED_VECTOR_WIDTH_SHORT;
        preferred_vector_width_int: u32 = PREFERRED_VECTOR_WIDTH_INT;
        preferred_vector_width_long: u32 = PREFERRED_VECTOR_WIDTH_LONG;
        preferred_vector_width_float: u32 = PREFERRED_VECTOR_WIDTH_FLOAT;
        preferred_vector_width_double: u32 = PREFERRED_VECTOR_WIDTH_DOUBLE;
        preferred_vector_width_half: u32 = PREFERRED_VECTOR_WIDTH_HALF;
        /// In MHz.
        max_clock_frequency: u32 = MAX_CLOCK_FREQUENCY;
        address_bits: u32 = ADDRESS_BITS;
        max_read_image_args: u32 = MAX_READ_IMAGE_ARGS;
        max_write_image_args: u32 = MAX_WRITE_IMAGE_ARGS;
        max_mem_alloc_size: u64 = MAX_MEM_ALLOC_SIZE;
        image2d_max_width: usize = IMAGE2D_MAX_WIDTH;
        image2d_max_height: usize = IMAGE2D_MAX_HEIGHT;
        image3d_max_width: usize = IMAGE3D_MAX_WIDTH;
        image3d_max_height: usize = IMAGE3D_MAX_HEIGHT;
        image3d_max_depth: usize = IMAGE3D_MAX_DEPTH;
        max_parameter_size: usize = MAX_PARAMETER_SIZE;
        max_samplers: u32 = MAX_SAMPLERS;
        /// In bits.
        mem_base_addr_align: u32 = MEM_BASE_ADDR_ALIGN;
        min_data_type_align_size: u32 = MIN_DATA_TYPE_ALIGN_SIZE;
        global_mem_cacheline_size: u32 = GLOBAL_MEM_CACHELINE_SIZE;
        global_mem_cache_size: u64 = GLOBAL_MEM_CACHE_SIZE;
        global_mem_size: u64 = GLOBAL_MEM_SIZE;
        max_constant_buffer_size: u64 = MAX_CONSTANT_BUFFER_SIZE;
        max_constant_args: u32 = MAX_CONSTANT_ARGS;
        local_mem_size: u64 = LOCAL_MEM_SIZE;
        /// In nanoseconds.
        profiling_timer_resolution: usize = PROFILING_TIMER_RESOLUTION;
        /// `cl_command_queue_properties` bitfield.
        queue_properties: u64 = QUEUE_PROPERTIES;
    }

    bool_getters! {
        image_support = IMAGE_SUPPORT;
        error_correction_support = ERROR_CORRECTION_SUPPORT;
        endian_little = ENDIAN_LITTLE;
        available = AVAILABLE;
        compiler_available = COMPILER_AVAILABLE;
        host_unified_memory = HOST_UNIFIED_MEMORY;
    }

    string_getters! {
        name = NAME;
        vendor = VENDOR;
        driver_version = DRIVER_VERSION;
        profile = PROFILE;
        /// The raw version string.
        version_string = VERSION;
        opencl_c_version = OPENCL_C_VERSION;
        extensions = EXTENSIONS;
    }

    /// Snapshot of the attributes most useful when choosing a device.
    pub fn summary(&self) -> Result<DeviceSummary> {
        Ok(DeviceSummary {
            name: self.name()?,
            vendor: self.vendor()?,
            device_type: self.device_type()?,
            version: self.version_string()?,
            driver_version: self.driver_version()?,
            compute_units: self.max_compute_units()?,
            max_clock_mhz: self.max_clock_frequency()?,
            global_mem_bytes: self.global_mem_size()?,
            local_mem_bytes: self.local_mem_size()?,
            max_work_group_size: self.max_work_group_size()?,
            max_work_item_sizes: self.max_work_item_sizes()?,
            image_support: self.image_support()?,
            extensions: self.capabilities.sorted().into_iter().map(str::to_owned).collect(),
        })
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Device {}

/// Human-readable device profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub name: String,
    pub vendor: String,
    pub device_type: DeviceType,
    pub version: String,
    pub driver_version: String,
    pub compute_units: u32,
    pub max_clock_mhz: u32,
    pub global_mem_bytes: u64,
    pub local_mem_bytes: u64,
    pub max_work_group_size: usize,
    pub max_work_item_sizes: Vec<usize>,
    pub image_support: bool,
    /// Sorted extension names.
    pub extensions: Vec<String>,
}

impl fmt::Display for DeviceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.name, self.vendor)?;
        writeln!(f, "  type:            {}", self.device_type)?;
        writeln!(f, "  version:         {}", self.version)?;
        writeln!(f, "  driver:          {}", self.driver_version)?;
        writeln!(f, "  compute units:   {} @ {} MHz", self.compute_units, self.max_clock_mhz)?;
        writeln!(f, "  global memory:   {} MiB", self.global_mem_bytes / (1024 * 1024))?;
        writeln!(f, "  local memory:    {} KiB", self.local_mem_bytes / 1024)?;
        writeln!(f, "  work group:      {} max, items {:?}", self.max_work_group_size, self.max_work_item_sizes)?;
        writeln!(f, "  image support:   {}", if self.image_support { "yes" } else { "no" })?;
        write!(f, "  extensions:      {}", self.extensions.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clnet_sys::info;
    use clnet_test_support::{SimDevice, SimPlatform, SimulatedCl, encode, simulated};

    fn only_device(device: SimDevice) -> Device {
        let (_, api) = simulated(SimulatedCl::new([SimPlatform::new("P").device(device)]));
        Platform::nth(api, 0).unwrap().devices(DeviceType::ALL).unwrap().remove(0)
    }

    #[test]
    fn typed_getters_decode_native_payloads() {
        let device = only_device(SimDevice::gpu("Sim GPU").compute_units(24));
        assert_eq!(device.name().unwrap(), "Sim GPU");
        assert_eq!(device.device_type().unwrap(), DeviceType::GPU);
        assert_eq!(device.max_compute_units().unwrap(), 24);
        assert_eq!(device.max_work_item_sizes().unwrap(), vec![256, 256, 64]);
        assert!(device.image_support().unwrap());
        assert!(device.endian_little().unwrap());
        assert_eq!(device.platform().unwrap().name().unwrap(), "P");
    }

    #[test]
    fn unknown_version_defaults_to_one_zero() {
        let device = only_device(SimDevice::cpu("c").version("vendor build 7"));
        assert_eq!(device.version(), ApiVersion::DEFAULT);
    }

    #[test]
    fn extensions_are_cached_at_wrap_time() {
        let device = only_device(SimDevice::gpu("g").extensions("cl_khr_fp16 cl_khr_fp64"));
        assert!(device.has_extensions(&["cl_khr_fp64", "cl_khr_fp16"]));
        assert!(device.has_extensions(&[]));
        assert!(!device.has_extension("cl_khr_gl_sharing"));
    }

    #[test]
    fn missing_attribute_surfaces_native_failure() {
        let device = only_device(SimDevice::gpu("g").without(info::device::MAX_SAMPLERS));
        let err = device.max_samplers().unwrap_err();
        assert_eq!(err.status(), Some(clnet_sys::Status::INVALID_VALUE));
    }

    #[test]
    fn summary_renders() {
        let device = only_device(
            SimDevice::gpu("Sim GPU").extensions("cl_khr_fp64 cl_khr_fp16").vendor("Acme"),
        );
        insta::assert_snapshot!(device.summary().unwrap().to_string(), @r"
        Sim GPU (Acme)
          type:            GPU
          version:         OpenCL 1.2 SIM
          driver:          1.0.0-sim
          compute units:   8 @ 1000 MHz
          global memory:   1024 MiB
          local memory:    32 KiB
          work group:      256 max, items [256, 256, 64]
          image support:   yes
          extensions:      cl_khr_fp16 cl_khr_fp64
        ");
    }

    #[test]
    fn raw_attribute_overrides_are_honoured() {
        let device = only_device(SimDevice::gpu("g").attr(info::device::ADDRESS_BITS, encode::u32(32)));
        assert_eq!(device.address_bits().unwrap(), 32);
    }
}
