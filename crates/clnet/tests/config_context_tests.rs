//! Contexts and builds driven by a configuration file.

use std::io::Write;

use clnet::{ClError, ClnetConfig, Context, DeviceClass};
use clnet_sys::DeviceType;
use clnet_test_support::{SimDevice, SimPlatform, SimulatedCl, simulated};
use serial_test::serial;

const VARS: [&str; 4] =
    ["CLNET_PLATFORM_INDEX", "CLNET_DEVICE_TYPE", "CLNET_BUILD_OPTIONS", "CLNET_LOG_BUILD_FAILURES"];

fn two_platforms() -> SimulatedCl {
    SimulatedCl::new([
        SimPlatform::new("first").device(SimDevice::cpu("cpu-a")),
        SimPlatform::new("second")
            .device(SimDevice::gpu("gpu-b"))
            .device(SimDevice::cpu("cpu-b")),
    ])
}

fn load(contents: &str) -> ClnetConfig {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    temp_env::with_vars_unset(VARS, || ClnetConfig::load(file.path()).unwrap())
}

#[test]
#[serial(clnet_env)]
fn file_selects_platform_and_device_class() {
    let config = load("platform_index = 1\ndevice_type = \"gpu\"\n");
    assert_eq!(config.device_type, DeviceClass::Gpu);
    let (_, api) = simulated(two_platforms());
    let ctx = Context::from_config(api, &config).unwrap();
    assert_eq!(ctx.devices().len(), 1);
    assert_eq!(ctx.devices()[0].name().unwrap(), "gpu-b");
    assert_eq!(ctx.devices()[0].device_type().unwrap(), DeviceType::GPU);
    assert_eq!(ctx.platform().map(|p| p.name().unwrap()).as_deref(), Some("second"));
}

#[test]
#[serial(clnet_env)]
fn environment_overrides_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"platform_index = 1\n").unwrap();
    let config = temp_env::with_vars(
        [
            ("CLNET_PLATFORM_INDEX", Some("0")),
            ("CLNET_DEVICE_TYPE", Some("cpu")),
            ("CLNET_BUILD_OPTIONS", None),
            ("CLNET_LOG_BUILD_FAILURES", None),
        ],
        || ClnetConfig::load(file.path()).unwrap(),
    );
    let (_, api) = simulated(two_platforms());
    let ctx = Context::from_config(api, &config).unwrap();
    assert_eq!(ctx.devices()[0].name().unwrap(), "cpu-a");
}

#[test]
#[serial(clnet_env)]
fn out_of_range_platform_is_unavailable() {
    let config = load("platform_index = 7\n");
    let (_, api) = simulated(two_platforms());
    assert!(matches!(Context::from_config(api, &config), Err(ClError::ResourceUnavailable(_))));

    let config = load("platform_index = 4096\n");
    let (_, api) = simulated(two_platforms());
    assert!(matches!(Context::from_config(api, &config), Err(ClError::ResourceUnavailable(_))));
}

#[test]
#[serial(clnet_env)]
fn no_platforms_is_unavailable() {
    let (_, api) = simulated(SimulatedCl::empty());
    let config = load("");
    assert!(matches!(Context::from_config(api, &config), Err(ClError::ResourceUnavailable(_))));
}

#[test]
#[serial(clnet_env)]
fn configured_options_reach_the_compiler() {
    let config = load("build_options = \"-DTILE=16 -cl-mad-enable\"\nlog_build_failures = false\n");
    let (_, api) = simulated(two_platforms());
    let ctx = Context::from_config(api, &config).unwrap();
    let program = ctx.create_program_with_source("kernel void k(global int* x) {}").unwrap();
    program.build_configured(&config).unwrap();
    for device in ctx.devices() {
        assert_eq!(program.build_options(device).unwrap(), "-DTILE=16 -cl-mad-enable");
    }
}

#[test]
fn program_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"kernel void from_disk(global float* x) {}\n").unwrap();
    let (_, api) = simulated(two_platforms());
    let ctx = Context::from_config(api, &ClnetConfig::default()).unwrap();
    let program = ctx.create_program_from_file(file.path()).unwrap();
    program.build(None, None, None).unwrap();
    assert_eq!(program.create_kernel("from_disk").unwrap().function_name().unwrap(), "from_disk");

    let missing = file.path().with_extension("missing");
    let Err(ClError::Io(err)) = ctx.create_program_from_file(&missing) else {
        panic!("expected an I/O error");
    };
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}
