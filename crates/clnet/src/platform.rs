//! Platform enumeration and attributes.

use std::sync::Arc;

use clnet_sys::info::platform as key;
use clnet_sys::{ClApi, DeviceType, InfoTarget, NativeHandle, Status};
use tracing::info;

use crate::capability::{ApiVersion, CapabilitySet};
use crate::device::Device;
use crate::error::{ClError, Result};
use crate::property::{InfoContainer, PropertyReader};

/// An OpenCL platform. Enumerated, never created, so it owns no native
/// reference and is freely cloneable.
#[derive(Debug, Clone)]
pub struct Platform {
    api: Arc<dyn ClApi>,
    handle: NativeHandle,
    capabilities: CapabilitySet,
    version: ApiVersion,
}

impl Platform {
    /// All platforms the native layer exposes. Having none is
    /// [`ClError::ResourceUnavailable`].
    pub fn enumerate(api: Arc<dyn ClApi>) -> Result<Vec<Self>> {
        let handles = match api.platform_ids() {
            Ok(handles) => handles,
            Err(Status::PLATFORM_NOT_FOUND_KHR) => Vec::new(),
            Err(status) => return Err(ClError::native("clGetPlatformIDs", status)),
        };
        if handles.is_empty() {
            return Err(ClError::ResourceUnavailable("no OpenCL platforms found".into()));
        }
        let platforms = handles
            .into_iter()
            .map(|h| Self::wrap(Arc::clone(&api), h))
            .collect::<Result<Vec<_>>>()?;
        for p in &platforms {
            info!(name = %p.name().unwrap_or_default(), version = %p.version, "found platform");
        }
        Ok(platforms)
    }

    /// The platform at `index`, or [`ClError::ResourceUnavailable`].
    pub fn nth(api: Arc<dyn ClApi>, index: usize) -> Result<Self> {
        let mut platforms = Self::enumerate(api)?;
        let count = platforms.len();
        if index >= count {
            return Err(ClError::ResourceUnavailable(format!(
                "platform index {index} out of range ({count} available)"
            )));
        }
        Ok(platforms.swap_remove(index))
    }

    pub(crate) fn wrap(api: Arc<dyn ClApi>, handle: NativeHandle) -> Result<Self> {
        let container = InfoContainer::new(api.as_ref(), InfoTarget::Platform(handle));
        let capabilities = CapabilitySet::parse(&container.read_string(key::EXTENSIONS)?);
        let version = ApiVersion::parse(&container.read_string(key::VERSION)?);
        Ok(Self { api, handle, capabilities, version })
    }

    fn info(&self) -> InfoContainer<'_> {
        InfoContainer::new(self.api.as_ref(), InfoTarget::Platform(self.handle))
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn api(&self) -> &Arc<dyn ClApi> {
        &self.api
    }

    pub fn name(&self) -> Result<String> {
        self.info().read_string(key::NAME)
    }

    pub fn vendor(&self) -> Result<String> {
        self.info().read_string(key::VENDOR)
    }

    /// `FULL_PROFILE` or `EMBEDDED_PROFILE`.
    pub fn profile(&self) -> Result<String> {
        self.info().read_string(key::PROFILE)
    }

    /// The raw version string, e.g. `"OpenCL 1.2 CUDA 12.4"`.
    pub fn version_string(&self) -> Result<String> {
        self.info().read_string(key::VERSION)
    }

    pub fn extensions(&self) -> Result<String> {
        self.info().read_string(key::EXTENSIONS)
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

    /// Devices of `device_type`. None matching is
    /// [`ClError::ResourceUnavailable`].
    pub fn devices(&self, device_type: DeviceType) -> Result<Vec<Device>> {
        let handles = match self.api.device_ids(self.handle, device_type) {
            Ok(handles) if !handles.is_empty() => handles,
            Ok(_) | Err(Status::DEVICE_NOT_FOUND) => {
                return Err(ClError::ResourceUnavailable(format!(
                    "no {device_type} devices on platform {}",
                    self.handle
                )));
            }
            Err(status) => return Err(ClError::native("clGetDeviceIDs", status)),
        };
        let devices = handles
            .into_iter()
            .map(|h| Device::wrap(Arc::clone(&self.api), h))
            .collect::<Result<Vec<_>>>()?;
        info!(platform = %self.handle, %device_type, count = devices.len(), "enumerated devices");
        Ok(devices)
    }
}

impl PartialEq for Platform {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Platform {}

#[cfg(test)]
mod tests {
    use super::*;
    use clnet_test_support::{SimDevice, SimPlatform, SimulatedCl, simulated};

    #[test]
    fn no_platforms_is_unavailable() {
        let (_, api) = simulated(SimulatedCl::empty());
        assert!(matches!(Platform::enumerate(api), Err(ClError::ResourceUnavailable(_))));
    }

    #[test]
    fn attributes_and_capabilities_are_read() {
        let (_, api) = simulated(SimulatedCl::new([SimPlatform::new("Test Platform")
            .version("OpenCL 2.1 Mesa")
            .extensions("cl_khr_icd  cl_khr_il_program")
            .device(SimDevice::gpu("g"))]));
        let platform = Platform::nth(api, 0).unwrap();
        assert_eq!(platform.name().unwrap(), "Test Platform");
        assert_eq!(platform.profile().unwrap(), "FULL_PROFILE");
        assert_eq!(platform.version(), ApiVersion::new(2, 1));
        assert!(platform.has_extensions(&["cl_khr_icd", "cl_khr_il_program"]));
        assert!(!platform.has_extension("cl_khr_fp64"));
    }

    #[test]
    fn missing_device_type_is_unavailable() {
        let (_, api) = simulated(SimulatedCl::new([
            SimPlatform::new("P").device(SimDevice::cpu("c"))
        ]));
        let platform = Platform::nth(api, 0).unwrap();
        assert_eq!(platform.devices(DeviceType::CPU).unwrap().len(), 1);
        assert!(matches!(
            platform.devices(DeviceType::GPU),
            Err(ClError::ResourceUnavailable(_))
        ));
    }

    #[test]
    fn out_of_range_index_is_unavailable() {
        let (_, api) = simulated(SimulatedCl::default());
        assert!(matches!(Platform::nth(api, 3), Err(ClError::ResourceUnavailable(_))));
    }
}
