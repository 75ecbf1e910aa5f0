//! Attribute reads through the two-phase protocol against the simulated
//! driver: decoding, capabilities, versions and the image fallback.

use clnet::{ApiVersion, ClError, Context, MemObject, Platform, PropertyReader};
use clnet_sys::info::{device, mem, platform};
use clnet_sys::types::{channel_order, channel_type};
use clnet_sys::{DeviceType, ImageFormat, InfoTarget, MemFlags, Status};
use clnet_test_support::{SimDevice, SimPlatform, SimulatedCl, encode, simulated};
use proptest::prelude::*;

#[test]
fn platform_strings_and_capabilities() {
    let (_, api) = simulated(SimulatedCl::new([SimPlatform::new("Mesa")
        .version("OpenCL 2.1 Mesa 23.1")
        .extensions("  cl_khr_icd   cl_khr_il_program ")
        .device(SimDevice::gpu("radeon"))]));
    let platform = Platform::nth(api, 0).unwrap();
    assert_eq!(platform.name().unwrap(), "Mesa");
    assert_eq!(platform.version(), ApiVersion { major: 2, minor: 1 });
    assert!(platform.version().at_least(1, 2));
    assert_eq!(platform.capabilities().len(), 2);
    assert!(platform.has_extension("cl_khr_icd"));
    assert!(!platform.has_extension("cl_khr"));
    assert!(!platform.has_extension(""));
    assert!(platform.has_extensions(&[]));
    assert!(platform.has_extensions(&["cl_khr_il_program", "cl_khr_icd"]));
    assert!(!platform.has_extensions(&["cl_khr_icd", "cl_khr_fp64"]));
}

#[test]
fn unparseable_version_defaults_to_1_0() {
    let (_, api) = simulated(SimulatedCl::new([SimPlatform::new("Odd")
        .version("FooBar 9")
        .device(SimDevice::cpu("cpu").version("OpenCL two point oh"))]));
    let platform = Platform::nth(api, 0).unwrap();
    assert_eq!(platform.version(), ApiVersion { major: 1, minor: 0 });
    let devices = platform.devices(DeviceType::CPU).unwrap();
    assert_eq!(devices[0].version(), ApiVersion::DEFAULT);
}

#[test]
fn device_extensions_are_cached_at_wrap_time() {
    let (sim, api) = simulated(SimulatedCl::default());
    let platform = Platform::nth(api, 0).unwrap();
    let gpu = platform.devices(DeviceType::GPU).unwrap().remove(0);
    let before = sim.info_calls();
    assert!(gpu.has_extensions(&["cl_khr_fp64", "cl_khr_fp16"]));
    assert!(!gpu.has_extension("cl_khr_gl_sharing"));
    assert_eq!(sim.info_calls(), before);
}

#[test]
fn embedded_nul_truncates_strings() {
    let (_, api) = simulated(SimulatedCl::new([SimPlatform::new("P")
        .device(SimDevice::gpu("g").attr(device::VENDOR, b"Acme\0hidden\0".to_vec()))]));
    let gpu = Platform::nth(api, 0).unwrap().devices(DeviceType::ALL).unwrap().remove(0);
    assert_eq!(gpu.vendor().unwrap(), "Acme");
}

#[test]
fn missing_attribute_names_key_and_status() {
    let (_, api) = simulated(SimulatedCl::new([SimPlatform::new("P")
        .device(SimDevice::gpu("g").without(device::DRIVER_VERSION))]));
    let gpu = Platform::nth(api, 0).unwrap().devices(DeviceType::ALL).unwrap().remove(0);
    let err = gpu.driver_version().unwrap_err();
    assert!(matches!(
        err,
        ClError::NativeCallFailed {
            operation: "clGetDeviceInfo",
            key: Some(device::DRIVER_VERSION),
            status: Status::INVALID_VALUE,
        }
    ));
}

#[test]
fn reader_works_on_raw_containers() {
    let (sim, api) = simulated(SimulatedCl::default());
    let container =
        clnet::InfoContainer::new(api.as_ref(), InfoTarget::Platform(sim.platform_handles()[0]));
    assert_eq!(container.read_string(platform::PROFILE).unwrap(), "FULL_PROFILE");
    assert_eq!(container.read_handles(0x0fff).unwrap_err().status(), Some(Status::INVALID_VALUE));
}

#[test]
fn image_reads_fall_back_to_memory_info() {
    let (_, api) = simulated(SimulatedCl::default());
    let ctx = Context::from_type(&Platform::nth(api, 0).unwrap(), DeviceType::ALL).unwrap();
    let format = ImageFormat::new(channel_order::BGRA, channel_type::UNORM_INT8);
    let image = ctx.create_image_2d(MemFlags::WRITE_ONLY, format, 64, 32, None).unwrap();
    assert_eq!(image.width().unwrap(), 64);
    assert_eq!(image.height().unwrap(), 32);
    assert_eq!(image.size().unwrap(), 64 * 4 * 32);
    assert_eq!(image.flags().unwrap(), MemFlags::WRITE_ONLY);
    assert_eq!(image.reference_count().unwrap(), 1);
    let container = image.mem_info().unwrap();
    assert_eq!(container.read_scalar::<u32>(mem::MAP_COUNT).unwrap(), 0);
}

proptest! {
    #[test]
    fn string_attributes_round_trip(value in "[a-zA-Z0-9 ._-]{0,48}", tail in "[a-z]{0,8}") {
        let mut payload = encode::string(&value);
        payload.extend_from_slice(tail.as_bytes());
        let (_, api) = simulated(SimulatedCl::new([SimPlatform::new("P")
            .device(SimDevice::gpu("g").attr(device::NAME, payload))]));
        let gpu = Platform::nth(api, 0).unwrap().devices(DeviceType::ALL).unwrap().remove(0);
        prop_assert_eq!(gpu.name().unwrap(), value);
    }
}
