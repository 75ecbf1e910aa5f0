//! The native call surface every backend implements.
//!
//! [`ClApi`] is deliberately flat: one method per native entry point the
//! managed layer needs, handles passed as [`NativeHandle`], failures reported
//! as raw [`Status`] codes. Everything above this trait is backend agnostic,
//! which lets the managed layer run against a real ICD loader or a simulated
//! driver without changes.

use std::ffi::{CStr, c_void};
use std::fmt;

use crate::handle::{NativeHandle, ResourceKind};
use crate::info::{AttributeKey, InfoTarget};
use crate::status::Status;
use crate::types::{AddressingMode, DeviceType, FilterMode, ImageDesc, ImageFormat, MemFlags};

/// Completion callback for an asynchronous program build. Receives the
/// program handle the build ran against.
pub type BuildNotify = Box<dyn FnOnce(NativeHandle) + Send + 'static>;

/// Whether a `clBuildProgram` call that returned `status` may still invoke
/// its completion callback. Any other status is an argument rejection and
/// the callback is never registered.
pub fn notify_may_run(status: Status) -> bool {
    status.is_success() || status == Status::BUILD_PROGRAM_FAILURE
}

/// Raw OpenCL entry points.
///
/// Creation methods return the new handle with one native reference owned by
/// the caller; the caller must eventually hand it back through
/// [`ClApi::release`].
pub trait ClApi: Send + Sync + fmt::Debug {
    /// Enumerate platform ids. An empty list is not an error at this level.
    fn platform_ids(&self) -> Result<Vec<NativeHandle>, Status>;

    /// Enumerate device ids of `device_type` on `platform`.
    fn device_ids(
        &self,
        platform: NativeHandle,
        device_type: DeviceType,
    ) -> Result<Vec<NativeHandle>, Status>;

    /// Generic `clGet*Info` call.
    ///
    /// With `value` null and `size` zero this is a size query: the byte count
    /// the attribute needs is written to `size_ret`. Otherwise up to `size`
    /// bytes are written to `value`.
    ///
    /// # Safety
    ///
    /// `value` must be null or valid for writes of `size` bytes, and
    /// `size_ret` must be null or valid for a single `usize` write. For
    /// attributes whose payload is itself a pointer array (program binaries)
    /// every pointer in the array must be valid for the length the driver
    /// reports for it.
    unsafe fn get_info(
        &self,
        target: InfoTarget,
        key: AttributeKey,
        size: usize,
        value: *mut c_void,
        size_ret: *mut usize,
    ) -> Status;

    /// Create a context over an explicit device list, optionally scoped to a
    /// platform.
    fn create_context(
        &self,
        platform: Option<NativeHandle>,
        devices: &[NativeHandle],
    ) -> Result<NativeHandle, Status>;

    /// Create a context over every device of `device_type`.
    fn create_context_from_type(
        &self,
        platform: Option<NativeHandle>,
        device_type: DeviceType,
    ) -> Result<NativeHandle, Status>;

    fn create_command_queue(
        &self,
        context: NativeHandle,
        device: NativeHandle,
        properties: u64,
    ) -> Result<NativeHandle, Status>;

    /// Create a buffer. `host`, when given, is copied at creation time.
    fn create_buffer(
        &self,
        context: NativeHandle,
        flags: MemFlags,
        size: usize,
        host: Option<&[u8]>,
    ) -> Result<NativeHandle, Status>;

    /// `clCreateSubBuffer` with a `CL_BUFFER_CREATE_TYPE_REGION` of
    /// `size` bytes starting at `origin` inside `buffer`.
    fn create_sub_buffer(
        &self,
        buffer: NativeHandle,
        flags: MemFlags,
        origin: usize,
        size: usize,
    ) -> Result<NativeHandle, Status>;

    /// Create a 2-D or 3-D image. `host`, when given, is copied at creation
    /// time.
    fn create_image(
        &self,
        context: NativeHandle,
        flags: MemFlags,
        format: &ImageFormat,
        desc: &ImageDesc,
        host: Option<&[u8]>,
    ) -> Result<NativeHandle, Status>;

    fn create_sampler(
        &self,
        context: NativeHandle,
        normalized_coords: bool,
        addressing: AddressingMode,
        filter: FilterMode,
    ) -> Result<NativeHandle, Status>;

    fn create_program_with_source(
        &self,
        context: NativeHandle,
        sources: &[&str],
    ) -> Result<NativeHandle, Status>;

    /// Create a program from per-device binaries. `devices` and `binaries`
    /// are parallel. On success the per-device load status is returned
    /// alongside the handle, in `devices` order.
    fn create_program_with_binary(
        &self,
        context: NativeHandle,
        devices: &[NativeHandle],
        binaries: &[&[u8]],
    ) -> Result<(NativeHandle, Vec<Status>), Status>;

    /// `clBuildProgram`. `options` of `None` passes a null pointer. With a
    /// `notify` callback the call may return before the build finishes.
    fn build_program(
        &self,
        program: NativeHandle,
        devices: &[NativeHandle],
        options: Option<&CStr>,
        notify: Option<BuildNotify>,
    ) -> Status;

    fn create_kernel(&self, program: NativeHandle, name: &CStr) -> Result<NativeHandle, Status>;

    /// Create one kernel per function in a built program.
    fn create_kernels_in_program(&self, program: NativeHandle)
    -> Result<Vec<NativeHandle>, Status>;

    fn create_user_event(&self, context: NativeHandle) -> Result<NativeHandle, Status>;

    fn set_user_event_status(&self, event: NativeHandle, execution_status: i32) -> Status;

    fn supported_image_formats(
        &self,
        context: NativeHandle,
        flags: MemFlags,
        image_type: u32,
    ) -> Result<Vec<ImageFormat>, Status>;

    /// Drop one native reference of `handle`, using the release entry point
    /// for `kind`.
    fn release(&self, kind: ResourceKind, handle: NativeHandle) -> Status;
}
