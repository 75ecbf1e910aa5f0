//! Declarative descriptions of simulated platforms and devices.

use std::collections::HashMap;

use clnet_sys::info::{AttributeKey, device, platform};
use clnet_sys::{CL_FALSE, CL_TRUE, DeviceType};

use crate::encode;

// ── SimDevice ───────────────────────────────────────────────────────────────

/// A simulated device. Every standard attribute gets a plausible default;
/// [`SimDevice::attr`] overrides any key with raw bytes.
#[derive(Debug, Clone)]
pub struct SimDevice {
    pub(crate) name: String,
    pub(crate) device_type: DeviceType,
    pub(crate) attrs: HashMap<AttributeKey, Vec<u8>>,
    pub(crate) build_failure: Option<String>,
}

impl SimDevice {
    pub fn new(name: impl Into<String>, device_type: DeviceType) -> Self {
        let name = name.into();
        let mut attrs = HashMap::new();
        attrs.insert(device::NAME, encode::string(&name));
        attrs.insert(device::TYPE, encode::u64(device_type.bits()));
        attrs.insert(device::VENDOR, encode::string("Simulated Devices Inc."));
        attrs.insert(device::VENDOR_ID, encode::u32(0x5153));
        attrs.insert(device::VERSION, encode::string("OpenCL 1.2 SIM"));
        attrs.insert(device::DRIVER_VERSION, encode::string("1.0.0-sim"));
        attrs.insert(device::PROFILE, encode::string("FULL_PROFILE"));
        attrs.insert(device::OPENCL_C_VERSION, encode::string("OpenCL C 1.2"));
        attrs.insert(device::EXTENSIONS, encode::string("cl_khr_global_int32_base_atomics"));
        attrs.insert(device::MAX_COMPUTE_UNITS, encode::u32(8));
        attrs.insert(device::MAX_CLOCK_FREQUENCY, encode::u32(1000));
        attrs.insert(device::MAX_WORK_ITEM_DIMENSIONS, encode::u32(3));
        attrs.insert(device::MAX_WORK_GROUP_SIZE, encode::usize(256));
        attrs.insert(device::MAX_WORK_ITEM_SIZES, encode::usizes(&[256, 256, 64]));
        attrs.insert(device::ADDRESS_BITS, encode::u32(64));
        attrs.insert(device::MAX_MEM_ALLOC_SIZE, encode::u64(256 * 1024 * 1024));
        attrs.insert(device::GLOBAL_MEM_SIZE, encode::u64(1024 * 1024 * 1024));
        attrs.insert(device::GLOBAL_MEM_CACHE_SIZE, encode::u64(512 * 1024));
        attrs.insert(device::GLOBAL_MEM_CACHELINE_SIZE, encode::u32(64));
        attrs.insert(device::LOCAL_MEM_SIZE, encode::u64(32 * 1024));
        attrs.insert(device::MAX_CONSTANT_BUFFER_SIZE, encode::u64(64 * 1024));
        attrs.insert(device::MAX_PARAMETER_SIZE, encode::usize(1024));
        attrs.insert(device::MEM_BASE_ADDR_ALIGN, encode::u32(1024));
        attrs.insert(device::IMAGE_SUPPORT, encode::u32(CL_TRUE));
        attrs.insert(device::IMAGE2D_MAX_WIDTH, encode::usize(8192));
        attrs.insert(device::IMAGE2D_MAX_HEIGHT, encode::usize(8192));
        attrs.insert(device::IMAGE3D_MAX_WIDTH, encode::usize(2048));
        attrs.insert(device::IMAGE3D_MAX_HEIGHT, encode::usize(2048));
        attrs.insert(device::IMAGE3D_MAX_DEPTH, encode::usize(2048));
        attrs.insert(device::MAX_SAMPLERS, encode::u32(16));
        attrs.insert(device::PREFERRED_VECTOR_WIDTH_FLOAT, encode::u32(4));
        attrs.insert(device::ERROR_CORRECTION_SUPPORT, encode::u32(CL_FALSE));
        attrs.insert(device::HOST_UNIFIED_MEMORY, encode::u32(CL_FALSE));
        attrs.insert(device::PROFILING_TIMER_RESOLUTION, encode::usize(1));
        attrs.insert(device::ENDIAN_LITTLE, encode::u32(CL_TRUE));
        attrs.insert(device::AVAILABLE, encode::u32(CL_TRUE));
        attrs.insert(device::COMPILER_AVAILABLE, encode::u32(CL_TRUE));
        attrs.insert(device::QUEUE_PROPERTIES, encode::u64(0b11));
        Self { name, device_type, attrs, build_failure: None }
    }

    pub fn gpu(name: impl Into<String>) -> Self {
        Self::new(name, DeviceType::GPU)
    }

    pub fn cpu(name: impl Into<String>) -> Self {
        Self::new(name, DeviceType::CPU)
    }

    /// Space-separated extension list, reported verbatim.
    #[must_use]
    pub fn extensions(self, extensions: &str) -> Self {
        self.attr(device::EXTENSIONS, encode::string(extensions))
    }

    /// Raw version string, e.g. `"OpenCL 2.0 vendor"`.
    #[must_use]
    pub fn version(self, version: &str) -> Self {
        self.attr(device::VERSION, encode::string(version))
    }

    #[must_use]
    pub fn vendor(self, vendor: &str) -> Self {
        self.attr(device::VENDOR, encode::string(vendor))
    }

    #[must_use]
    pub fn compute_units(self, units: u32) -> Self {
        self.attr(device::MAX_COMPUTE_UNITS, encode::u32(units))
    }

    #[must_use]
    pub fn image_support(self, supported: bool) -> Self {
        self.attr(device::IMAGE_SUPPORT, encode::u32(u32::from(supported)))
    }

    /// Every build targeting this device fails with `log`.
    #[must_use]
    pub fn failing_builds(mut self, log: impl Into<String>) -> Self {
        self.build_failure = Some(log.into());
        self
    }

    /// Override one attribute with raw payload bytes.
    #[must_use]
    pub fn attr(mut self, key: AttributeKey, payload: Vec<u8>) -> Self {
        self.attrs.insert(key, payload);
        self
    }

    /// Remove an attribute so queries for it report `CL_INVALID_VALUE`.
    #[must_use]
    pub fn without(mut self, key: AttributeKey) -> Self {
        self.attrs.remove(&key);
        self
    }
}

// ── SimPlatform ─────────────────────────────────────────────────────────────

/// A simulated platform and the devices it exposes.
#[derive(Debug, Clone)]
pub struct SimPlatform {
    pub(crate) attrs: HashMap<AttributeKey, Vec<u8>>,
    pub(crate) devices: Vec<SimDevice>,
}

impl SimPlatform {
    pub fn new(name: impl Into<String>) -> Self {
        let mut attrs = HashMap::new();
        attrs.insert(platform::NAME, encode::string(&name.into()));
        attrs.insert(platform::VENDOR, encode::string("Simulated Devices Inc."));
        attrs.insert(platform::PROFILE, encode::string("FULL_PROFILE"));
        attrs.insert(platform::VERSION, encode::string("OpenCL 1.2 SIM"));
        attrs.insert(platform::EXTENSIONS, encode::string("cl_khr_icd"));
        Self { attrs, devices: Vec::new() }
    }

    #[must_use]
    pub fn device(mut self, device: SimDevice) -> Self {
        self.devices.push(device);
        self
    }

    #[must_use]
    pub fn version(self, version: &str) -> Self {
        self.attr(platform::VERSION, encode::string(version))
    }

    #[must_use]
    pub fn extensions(self, extensions: &str) -> Self {
        self.attr(platform::EXTENSIONS, encode::string(extensions))
    }

    #[must_use]
    pub fn attr(mut self, key: AttributeKey, payload: Vec<u8>) -> Self {
        self.attrs.insert(key, payload);
        self
    }
}

impl Default for SimPlatform {
    /// One platform with a GPU and a CPU device.
    fn default() -> Self {
        Self::new("Simulated Platform")
            .device(SimDevice::gpu("Sim GPU 0").extensions("cl_khr_fp64 cl_khr_fp16 cl_khr_icd"))
            .device(SimDevice::cpu("Sim CPU 0").extensions("cl_khr_fp64 cl_khr_icd"))
    }
}
