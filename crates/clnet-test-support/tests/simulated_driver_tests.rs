//! Behaviour of the simulated driver at the raw `ClApi` level.

use std::ffi::{CString, c_void};
use std::ptr;

use clnet_sys::info::{self, InfoTarget};
use clnet_sys::{ClApi, DeviceType, MemFlags, ResourceKind, Status};
use clnet_test_support::{SimDevice, SimPlatform, SimulatedCl, simulated};

fn raw_string(api: &dyn ClApi, target: InfoTarget, key: u32) -> Result<String, Status> {
    let mut size = 0usize;
    // SAFETY: size query with a null value pointer.
    unsafe { api.get_info(target, key, 0, ptr::null_mut(), &mut size) }.ok()?;
    let mut buf = vec![0u8; size];
    // SAFETY: `buf` holds `size` bytes.
    unsafe { api.get_info(target, key, size, buf.as_mut_ptr().cast::<c_void>(), ptr::null_mut()) }
        .ok()?;
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

#[test]
fn platforms_and_devices_are_enumerated_in_declaration_order() {
    let sim = SimulatedCl::new([
        SimPlatform::new("A").device(SimDevice::gpu("a-gpu")),
        SimPlatform::new("B").device(SimDevice::cpu("b-cpu")).device(SimDevice::gpu("b-gpu")),
    ]);
    let platforms = sim.platform_ids().unwrap();
    assert_eq!(platforms.len(), 2);
    let gpus = sim.device_ids(platforms[1], DeviceType::GPU).unwrap();
    assert_eq!(gpus.len(), 1);
    assert_eq!(raw_string(&sim, InfoTarget::Device(gpus[0]), info::device::NAME).unwrap(), "b-gpu");
    assert_eq!(
        sim.device_ids(platforms[0], DeviceType::ACCELERATOR),
        Err(Status::DEVICE_NOT_FOUND)
    );
}

#[test]
fn undersized_buffer_is_rejected() {
    let sim = SimulatedCl::default();
    let platform = sim.platform_handles()[0];
    let mut buf = [0u8; 2];
    // SAFETY: `buf` is valid for 2 bytes.
    let status = unsafe {
        sim.get_info(
            InfoTarget::Platform(platform),
            info::platform::NAME,
            buf.len(),
            buf.as_mut_ptr().cast(),
            ptr::null_mut(),
        )
    };
    assert_eq!(status, Status::INVALID_VALUE);
}

#[test]
fn released_objects_become_invalid() {
    let (sim, api) = simulated(SimulatedCl::default());
    let devices = sim.device_handles();
    let ctx = api.create_context(None, &devices).unwrap();
    assert_eq!(sim.refcount(ctx), Some(1));
    assert_eq!(api.release(ResourceKind::Context, ctx), Status::SUCCESS);
    assert!(!sim.is_live(ctx));
    assert_eq!(api.release(ResourceKind::Context, ctx), Status::INVALID_CONTEXT);
    assert_eq!(sim.release_calls(ResourceKind::Context), 2);
}

#[test]
fn injected_release_failure_keeps_object_alive() {
    let (sim, api) = simulated(SimulatedCl::default());
    let ctx = api.create_context(None, &sim.device_handles()).unwrap();
    sim.fail_releases(ResourceKind::Context, Status::OUT_OF_RESOURCES);
    assert_eq!(api.release(ResourceKind::Context, ctx), Status::OUT_OF_RESOURCES);
    assert!(sim.is_live(ctx));
    sim.clear_faults();
    assert_eq!(api.release(ResourceKind::Context, ctx), Status::SUCCESS);
}

#[test]
fn kernels_require_a_successful_build() {
    let (sim, api) = simulated(SimulatedCl::default());
    let ctx = api.create_context(None, &sim.device_handles()).unwrap();
    let program = api.create_program_with_source(ctx, &["kernel void k(global int* x) {}"]).unwrap();
    let name = CString::new("k").unwrap();
    assert_eq!(api.create_kernel(program, &name), Err(Status::INVALID_PROGRAM_EXECUTABLE));
    assert_eq!(api.build_program(program, &[], None, None), Status::SUCCESS);
    let kernel = api.create_kernel(program, &name).unwrap();
    assert_eq!(
        api.create_kernel(program, &CString::new("missing").unwrap()),
        Err(Status::INVALID_KERNEL_NAME)
    );
    assert_eq!(api.build_program(program, &[], None, None), Status::INVALID_OPERATION);
    assert_eq!(api.release(ResourceKind::Kernel, kernel), Status::SUCCESS);
}

#[test]
fn build_failure_is_reported_per_device() {
    let sim = SimulatedCl::new([SimPlatform::new("P")
        .device(SimDevice::gpu("ok"))
        .device(SimDevice::gpu("broken").failing_builds("internal compiler error"))]);
    let (sim, api) = simulated(sim);
    let devices = sim.device_handles();
    let ctx = api.create_context(None, &devices).unwrap();
    let program = api.create_program_with_source(ctx, &["kernel void k() {}"]).unwrap();
    assert_eq!(api.build_program(program, &[], None, None), Status::BUILD_PROGRAM_FAILURE);

    let log = raw_string(
        api.as_ref(),
        InfoTarget::ProgramBuild { program, device: devices[1] },
        info::build::LOG,
    )
    .unwrap();
    assert_eq!(log, "internal compiler error");
}

#[test]
fn buffers_validate_host_data() {
    let (sim, api) = simulated(SimulatedCl::default());
    let ctx = api.create_context(None, &sim.device_handles()).unwrap();
    assert_eq!(
        api.create_buffer(ctx, MemFlags::READ_ONLY, 16, Some(&[0u8; 16])),
        Err(Status::INVALID_HOST_PTR)
    );
    assert_eq!(api.create_buffer(ctx, MemFlags::READ_WRITE, 0, None), Err(Status::INVALID_BUFFER_SIZE));
    assert!(api
        .create_buffer(ctx, MemFlags::READ_ONLY | MemFlags::COPY_HOST_PTR, 16, Some(&[1u8; 16]))
        .is_ok());
}
