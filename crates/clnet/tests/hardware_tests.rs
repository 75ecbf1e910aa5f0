//! Smoke tests against the system OpenCL installation.
//!
//! Run with `cargo test -p clnet --features opencl -- --ignored`.

#![cfg(feature = "opencl")]

use std::sync::Arc;

use clnet::{BuildStatus, ClError, Context, Platform};
use clnet_sys::{ClApi, DeviceType, OpenClRuntime};

fn api() -> Arc<dyn ClApi> {
    Arc::new(OpenClRuntime::new())
}

#[test]
#[ignore = "requires an OpenCL ICD"]
fn enumerates_platforms_and_devices() {
    clnet_test_support::init_tracing();
    let platforms = match Platform::enumerate(api()) {
        Ok(platforms) => platforms,
        Err(ClError::ResourceUnavailable(reason)) => {
            eprintln!("skipping: {reason}");
            return;
        }
        Err(err) => panic!("{err}"),
    };
    for platform in &platforms {
        println!("{} ({})", platform.name().unwrap(), platform.version());
        for device in platform.devices(DeviceType::ALL).unwrap_or_default() {
            println!("{}", device.summary().unwrap());
        }
    }
}

#[test]
#[ignore = "requires an OpenCL ICD"]
fn builds_a_trivial_program_everywhere() {
    let Ok(platform) = Platform::nth(api(), 0) else {
        return;
    };
    let ctx = Context::from_type(&platform, DeviceType::ALL).unwrap();
    let program = ctx
        .create_program_with_source("kernel void add(global int* a, int b) { a[0] += b; }")
        .unwrap();
    program.build(None, None, None).unwrap();
    for device in ctx.devices() {
        assert_eq!(program.build_status(device).unwrap(), BuildStatus::Success);
    }
    assert_eq!(program.binaries().unwrap().len(), ctx.devices().len());
    assert_eq!(program.create_kernel("add").unwrap().num_args().unwrap(), 2);
}
