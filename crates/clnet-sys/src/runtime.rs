//! [`ClApi`] over the system ICD loader.
//!
//! Platform and device enumeration go through `opencl3`; everything else is a
//! direct `opencl-sys` call so that raw sizes, pointers and status codes reach
//! the managed layer untouched.

#![allow(unsafe_code)]

use std::ffi::{CStr, c_char, c_void};
use std::ptr;

use opencl3::device::Device;
use opencl3::platform::{Platform, get_platforms};
use opencl_sys as cl;
use tracing::{debug, trace};

use crate::api::{BuildNotify, ClApi, notify_may_run};
use crate::handle::{NativeHandle, ResourceKind};
use crate::info::{AttributeKey, InfoTarget};
use crate::status::Status;
use crate::types::{AddressingMode, DeviceType, FilterMode, ImageDesc, ImageFormat, MemFlags};

const CONTEXT_PLATFORM: isize = 0x1084;
const BUFFER_CREATE_TYPE_REGION: u32 = 0x1220;

/// The real OpenCL runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenClRuntime;

impl OpenClRuntime {
    pub const fn new() -> Self {
        Self
    }
}

fn handle_or_status(raw: *mut c_void, errcode: i32) -> Result<NativeHandle, Status> {
    if errcode == Status::SUCCESS.code() && !raw.is_null() {
        Ok(NativeHandle::from_raw(raw))
    } else if errcode == Status::SUCCESS.code() {
        Err(Status::INVALID_VALUE)
    } else {
        Err(Status(errcode))
    }
}

fn context_properties(platform: Option<NativeHandle>) -> Option<[isize; 3]> {
    platform.map(|p| [CONTEXT_PLATFORM, p.as_usize() as isize, 0])
}

extern "C" fn build_trampoline(program: cl::cl_program, user_data: *mut c_void) {
    // SAFETY: `user_data` was produced by `Box::into_raw` in `build_program`
    // and the driver invokes this callback at most once.
    let notify = unsafe { Box::from_raw(user_data.cast::<BuildNotify>()) };
    notify(NativeHandle::from_raw(program as *mut c_void));
}

impl ClApi for OpenClRuntime {
    fn platform_ids(&self) -> Result<Vec<NativeHandle>, Status> {
        let platforms = get_platforms().map_err(|e| Status(e.0))?;
        debug!(count = platforms.len(), "enumerated OpenCL platforms");
        Ok(platforms.iter().map(|p| NativeHandle::from_raw(p.id() as *mut c_void)).collect())
    }

    fn device_ids(
        &self,
        platform: NativeHandle,
        device_type: DeviceType,
    ) -> Result<Vec<NativeHandle>, Status> {
        let platform = Platform::new(platform.as_raw() as _);
        let ids = platform.get_devices(device_type.bits()).map_err(|e| Status(e.0))?;
        for id in &ids {
            let device = Device::new(*id);
            trace!(name = %device.name().unwrap_or_default(), "found device");
        }
        Ok(ids.into_iter().map(|id| NativeHandle::from_raw(id as *mut c_void)).collect())
    }

    unsafe fn get_info(
        &self,
        target: InfoTarget,
        key: AttributeKey,
        size: usize,
        value: *mut c_void,
        size_ret: *mut usize,
    ) -> Status {
        // SAFETY: forwarded from the caller's contract on `value`/`size_ret`.
        let code = unsafe {
            match target {
                InfoTarget::Platform(h) => {
                    cl::clGetPlatformInfo(h.as_raw() as _, key, size, value, size_ret)
                }
                InfoTarget::Device(h) => {
                    cl::clGetDeviceInfo(h.as_raw() as _, key, size, value, size_ret)
                }
                InfoTarget::Context(h) => {
                    cl::clGetContextInfo(h.as_raw() as _, key, size, value, size_ret)
                }
                InfoTarget::CommandQueue(h) => {
                    cl::clGetCommandQueueInfo(h.as_raw() as _, key, size, value, size_ret)
                }
                InfoTarget::MemObject(h) => {
                    cl::clGetMemObjectInfo(h.as_raw() as _, key, size, value, size_ret)
                }
                InfoTarget::Image(h) => {
                    cl::clGetImageInfo(h.as_raw() as _, key, size, value, size_ret)
                }
                InfoTarget::Sampler(h) => {
                    cl::clGetSamplerInfo(h.as_raw() as _, key, size, value, size_ret)
                }
                InfoTarget::Program(h) => {
                    cl::clGetProgramInfo(h.as_raw() as _, key, size, value, size_ret)
                }
                InfoTarget::ProgramBuild { program, device } => cl::clGetProgramBuildInfo(
                    program.as_raw() as _,
                    device.as_raw() as _,
                    key,
                    size,
                    value,
                    size_ret,
                ),
                InfoTarget::Kernel(h) => {
                    cl::clGetKernelInfo(h.as_raw() as _, key, size, value, size_ret)
                }
                InfoTarget::KernelWorkGroup { kernel, device } => cl::clGetKernelWorkGroupInfo(
                    kernel.as_raw() as _,
                    device.as_raw() as _,
                    key,
                    size,
                    value,
                    size_ret,
                ),
                InfoTarget::Event(h) => {
                    cl::clGetEventInfo(h.as_raw() as _, key, size, value, size_ret)
                }
            }
        };
        Status(code)
    }

    fn create_context(
        &self,
        platform: Option<NativeHandle>,
        devices: &[NativeHandle],
    ) -> Result<NativeHandle, Status> {
        let props = context_properties(platform);
        let props_ptr = props.as_ref().map_or(ptr::null(), |p| p.as_ptr());
        let mut errcode = 0;
        // SAFETY: `NativeHandle` is `repr(transparent)` over a pointer-sized
        // integer, so the slice has the layout of a `cl_device_id` array.
        let raw = unsafe {
            cl::clCreateContext(
                props_ptr as _,
                devices.len() as _,
                devices.as_ptr() as _,
                None,
                ptr::null_mut(),
                &mut errcode,
            )
        };
        handle_or_status(raw as *mut c_void, errcode)
    }

    fn create_context_from_type(
        &self,
        platform: Option<NativeHandle>,
        device_type: DeviceType,
    ) -> Result<NativeHandle, Status> {
        let props = context_properties(platform);
        let props_ptr = props.as_ref().map_or(ptr::null(), |p| p.as_ptr());
        let mut errcode = 0;
        // SAFETY: property list is zero terminated and outlives the call.
        let raw = unsafe {
            cl::clCreateContextFromType(
                props_ptr as _,
                device_type.bits(),
                None,
                ptr::null_mut(),
                &mut errcode,
            )
        };
        handle_or_status(raw as *mut c_void, errcode)
    }

    #[allow(deprecated)]
    fn create_command_queue(
        &self,
        context: NativeHandle,
        device: NativeHandle,
        properties: u64,
    ) -> Result<NativeHandle, Status> {
        let mut errcode = 0;
        // SAFETY: plain handle arguments.
        let raw = unsafe {
            cl::clCreateCommandQueue(context.as_raw() as _, device.as_raw() as _, properties, &mut errcode)
        };
        handle_or_status(raw as *mut c_void, errcode)
    }

    fn create_buffer(
        &self,
        context: NativeHandle,
        flags: MemFlags,
        size: usize,
        host: Option<&[u8]>,
    ) -> Result<NativeHandle, Status> {
        let host_ptr = host.map_or(ptr::null_mut(), |h| h.as_ptr() as *mut c_void);
        let mut errcode = 0;
        // SAFETY: the managed layer only passes host data together with
        // COPY_HOST_PTR, so the driver copies it before returning.
        let raw = unsafe {
            cl::clCreateBuffer(context.as_raw() as _, flags.bits(), size, host_ptr, &mut errcode)
        };
        handle_or_status(raw as *mut c_void, errcode)
    }

    fn create_sub_buffer(
        &self,
        buffer: NativeHandle,
        flags: MemFlags,
        origin: usize,
        size: usize,
    ) -> Result<NativeHandle, Status> {
        let region = cl::cl_buffer_region { origin, size };
        let mut errcode = 0;
        // SAFETY: `region` outlives the call and matches the region create
        // type.
        let raw = unsafe {
            cl::clCreateSubBuffer(
                buffer.as_raw() as _,
                flags.bits(),
                BUFFER_CREATE_TYPE_REGION,
                ptr::from_ref(&region).cast::<c_void>(),
                &mut errcode,
            )
        };
        handle_or_status(raw as *mut c_void, errcode)
    }

    fn create_image(
        &self,
        context: NativeHandle,
        flags: MemFlags,
        format: &ImageFormat,
        desc: &ImageDesc,
        host: Option<&[u8]>,
    ) -> Result<NativeHandle, Status> {
        let native_format = cl::cl_image_format {
            image_channel_order: format.channel_order,
            image_channel_data_type: format.channel_type,
        };
        // SAFETY: all-zero is a valid `cl_image_desc` (null buffer, no mips).
        let mut native_desc: cl::cl_image_desc = unsafe { std::mem::zeroed() };
        native_desc.image_type = desc.image_type;
        native_desc.image_width = desc.width;
        native_desc.image_height = desc.height;
        native_desc.image_depth = desc.depth;
        native_desc.image_row_pitch = desc.row_pitch;
        native_desc.image_slice_pitch = desc.slice_pitch;
        let host_ptr = host.map_or(ptr::null_mut(), |h| h.as_ptr() as *mut c_void);
        let mut errcode = 0;
        // SAFETY: format and desc live on this frame; host data is copied.
        let raw = unsafe {
            cl::clCreateImage(
                context.as_raw() as _,
                flags.bits(),
                &native_format,
                &native_desc,
                host_ptr,
                &mut errcode,
            )
        };
        handle_or_status(raw as *mut c_void, errcode)
    }

    #[allow(deprecated)]
    fn create_sampler(
        &self,
        context: NativeHandle,
        normalized_coords: bool,
        addressing: AddressingMode,
        filter: FilterMode,
    ) -> Result<NativeHandle, Status> {
        let mut errcode = 0;
        // SAFETY: plain value arguments.
        let raw = unsafe {
            cl::clCreateSampler(
                context.as_raw() as _,
                u32::from(normalized_coords),
                addressing.as_raw(),
                filter.as_raw(),
                &mut errcode,
            )
        };
        handle_or_status(raw as *mut c_void, errcode)
    }

    fn create_program_with_source(
        &self,
        context: NativeHandle,
        sources: &[&str],
    ) -> Result<NativeHandle, Status> {
        let strings: Vec<*const c_char> = sources.iter().map(|s| s.as_ptr().cast()).collect();
        let lengths: Vec<usize> = sources.iter().map(|s| s.len()).collect();
        let mut errcode = 0;
        // SAFETY: explicit lengths are passed, so sources need no terminator.
        let raw = unsafe {
            cl::clCreateProgramWithSource(
                context.as_raw() as _,
                strings.len() as _,
                strings.as_ptr(),
                lengths.as_ptr(),
                &mut errcode,
            )
        };
        handle_or_status(raw as *mut c_void, errcode)
    }

    fn create_program_with_binary(
        &self,
        context: NativeHandle,
        devices: &[NativeHandle],
        binaries: &[&[u8]],
    ) -> Result<(NativeHandle, Vec<Status>), Status> {
        if devices.len() != binaries.len() {
            return Err(Status::INVALID_VALUE);
        }
        let pointers: Vec<*const u8> = binaries.iter().map(|b| b.as_ptr()).collect();
        let lengths: Vec<usize> = binaries.iter().map(|b| b.len()).collect();
        let mut statuses = vec![0i32; devices.len()];
        let mut errcode = 0;
        // SAFETY: all arrays are parallel and sized `devices.len()`.
        let raw = unsafe {
            cl::clCreateProgramWithBinary(
                context.as_raw() as _,
                devices.len() as _,
                devices.as_ptr() as _,
                lengths.as_ptr(),
                pointers.as_ptr(),
                statuses.as_mut_ptr(),
                &mut errcode,
            )
        };
        let handle = handle_or_status(raw as *mut c_void, errcode)?;
        Ok((handle, statuses.into_iter().map(Status).collect()))
    }

    fn build_program(
        &self,
        program: NativeHandle,
        devices: &[NativeHandle],
        options: Option<&CStr>,
        notify: Option<BuildNotify>,
    ) -> Status {
        let options_ptr = options.map_or(ptr::null(), CStr::as_ptr);
        let mut callback: Option<unsafe extern "C" fn(cl::cl_program, *mut c_void)> = None;
        let mut user_data = ptr::null_mut();
        if let Some(notify) = notify {
            callback = Some(build_trampoline);
            user_data = Box::into_raw(Box::new(notify)).cast::<c_void>();
        }
        let devices_ptr = if devices.is_empty() { ptr::null() } else { devices.as_ptr() };
        // SAFETY: device list and options outlive the call; `user_data` is
        // reclaimed by the trampoline, or below when the call is rejected.
        let code = unsafe {
            cl::clBuildProgram(
                program.as_raw() as _,
                devices.len() as _,
                devices_ptr as _,
                options_ptr,
                callback,
                user_data,
            )
        };
        let status = Status(code);
        if !user_data.is_null() && !notify_may_run(status) {
            // SAFETY: the call was rejected before a build started, so the
            // trampoline never sees `user_data` and this is its only owner.
            drop(unsafe { Box::from_raw(user_data.cast::<BuildNotify>()) });
        }
        status
    }

    fn create_kernel(&self, program: NativeHandle, name: &CStr) -> Result<NativeHandle, Status> {
        let mut errcode = 0;
        // SAFETY: `name` is NUL terminated.
        let raw = unsafe { cl::clCreateKernel(program.as_raw() as _, name.as_ptr(), &mut errcode) };
        handle_or_status(raw as *mut c_void, errcode)
    }

    fn create_kernels_in_program(
        &self,
        program: NativeHandle,
    ) -> Result<Vec<NativeHandle>, Status> {
        let mut count = 0u32;
        // SAFETY: count query with a null output array.
        let code = unsafe {
            cl::clCreateKernelsInProgram(program.as_raw() as _, 0, ptr::null_mut(), &mut count)
        };
        Status(code).ok()?;
        let mut kernels: Vec<cl::cl_kernel> = vec![ptr::null_mut(); count as usize];
        // SAFETY: `kernels` holds exactly `count` slots.
        let code = unsafe {
            cl::clCreateKernelsInProgram(
                program.as_raw() as _,
                count,
                kernels.as_mut_ptr(),
                ptr::null_mut(),
            )
        };
        Status(code).ok()?;
        Ok(kernels.into_iter().map(|k| NativeHandle::from_raw(k as *mut c_void)).collect())
    }

    fn create_user_event(&self, context: NativeHandle) -> Result<NativeHandle, Status> {
        let mut errcode = 0;
        // SAFETY: plain handle argument.
        let raw = unsafe { cl::clCreateUserEvent(context.as_raw() as _, &mut errcode) };
        handle_or_status(raw as *mut c_void, errcode)
    }

    fn set_user_event_status(&self, event: NativeHandle, execution_status: i32) -> Status {
        // SAFETY: plain value arguments.
        Status(unsafe { cl::clSetUserEventStatus(event.as_raw() as _, execution_status) })
    }

    fn supported_image_formats(
        &self,
        context: NativeHandle,
        flags: MemFlags,
        image_type: u32,
    ) -> Result<Vec<ImageFormat>, Status> {
        let mut count = 0u32;
        // SAFETY: count query with a null output array.
        let code = unsafe {
            cl::clGetSupportedImageFormats(
                context.as_raw() as _,
                flags.bits(),
                image_type,
                0,
                ptr::null_mut(),
                &mut count,
            )
        };
        Status(code).ok()?;
        let mut formats = vec![
            cl::cl_image_format { image_channel_order: 0, image_channel_data_type: 0 };
            count as usize
        ];
        // SAFETY: `formats` holds exactly `count` entries.
        let code = unsafe {
            cl::clGetSupportedImageFormats(
                context.as_raw() as _,
                flags.bits(),
                image_type,
                count,
                formats.as_mut_ptr(),
                ptr::null_mut(),
            )
        };
        Status(code).ok()?;
        Ok(formats
            .into_iter()
            .map(|f| ImageFormat::new(f.image_channel_order, f.image_channel_data_type))
            .collect())
    }

    fn release(&self, kind: ResourceKind, handle: NativeHandle) -> Status {
        let raw = handle.as_raw();
        // SAFETY: the caller hands over one reference it owns.
        let code = unsafe {
            match kind {
                ResourceKind::Context => cl::clReleaseContext(raw as _),
                ResourceKind::CommandQueue => cl::clReleaseCommandQueue(raw as _),
                ResourceKind::MemObject => cl::clReleaseMemObject(raw as _),
                ResourceKind::Program => cl::clReleaseProgram(raw as _),
                ResourceKind::Kernel => cl::clReleaseKernel(raw as _),
                ResourceKind::Sampler => cl::clReleaseSampler(raw as _),
                ResourceKind::Event => cl::clReleaseEvent(raw as _),
            }
        };
        Status(code)
    }
}
