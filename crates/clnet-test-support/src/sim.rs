//! An in-process OpenCL driver.
//!
//! [`SimulatedCl`] implements [`ClApi`] over plain Rust state so the managed
//! layer can be exercised end to end without an ICD loader. Besides modelling
//! the native semantics the managed layer relies on (two-phase info queries,
//! per-device build status, `CL_INVALID_PROGRAM_EXECUTABLE` before a build)
//! it counts calls and can inject failures.

use std::collections::HashMap;
use std::ffi::{CStr, c_void};
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use clnet_sys::info::{self, AttributeKey, InfoTarget};
use clnet_sys::types::{
    COMMAND_USER, build_status, channel_order, channel_type, execution_status, mem_object_type,
};
use clnet_sys::{
    AddressingMode, BuildNotify, ClApi, DeviceType, FilterMode, ImageDesc, ImageFormat, MemFlags,
    NativeHandle, ResourceKind, Status,
};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::encode;
use crate::fixture::SimPlatform;

const HANDLE_BASE: usize = 0x1000;
const HANDLE_STRIDE: usize = 0x10;
const CONTEXT_PLATFORM: usize = 0x1084;

/// Header line of every binary the simulator produces or accepts.
pub const BINARY_MAGIC: &str = "SIMBIN";

/// Image formats every simulated context supports.
pub const SUPPORTED_IMAGE_FORMATS: [ImageFormat; 7] = [
    ImageFormat::new(channel_order::RGBA, channel_type::UNORM_INT8),
    ImageFormat::new(channel_order::RGBA, channel_type::UNSIGNED_INT8),
    ImageFormat::new(channel_order::RGBA, channel_type::HALF_FLOAT),
    ImageFormat::new(channel_order::RGBA, channel_type::FLOAT),
    ImageFormat::new(channel_order::BGRA, channel_type::UNORM_INT8),
    ImageFormat::new(channel_order::R, channel_type::FLOAT),
    ImageFormat::new(channel_order::R, channel_type::UNSIGNED_INT8),
];

/// Build a binary blob the simulator accepts for `device_name`.
pub fn simulated_binary(device_name: &str, source: &str) -> Vec<u8> {
    format!("{BINARY_MAGIC} {device_name}\n{source}").into_bytes()
}

fn embedded_source(binary: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(binary).ok()?;
    let (header, body) = text.split_once('\n')?;
    header.starts_with(BINARY_MAGIC).then(|| body.to_owned())
}

/// Find `kernel void name(args)` signatures and their argument counts.
pub fn kernel_signatures(source: &str) -> Vec<(String, u32)> {
    const MARKER: &str = "kernel void";
    let mut found = Vec::new();
    let mut offset = 0;
    while let Some(pos) = source[offset..].find(MARKER) {
        let start = offset + pos;
        offset = start + MARKER.len();
        let at_boundary =
            source[..start].chars().next_back().is_none_or(|c| !c.is_ascii_alphanumeric());
        if !at_boundary {
            continue;
        }
        let rest = source[offset..].trim_start();
        let name: String =
            rest.chars().take_while(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
        if name.is_empty() {
            continue;
        }
        let Some(params) = rest[name.len()..].trim_start().strip_prefix('(') else {
            continue;
        };
        let Some(close) = params.find(')') else {
            continue;
        };
        let params = params[..close].trim();
        let num_args = if params.is_empty() || params == "void" {
            0
        } else {
            params.split(',').count() as u32
        };
        found.push((name, num_args));
    }
    found
}

/// Compiler diagnostics for every `#error` directive in `source`.
fn compile_errors(source: &str) -> Vec<String> {
    source
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let message = line.trim_start().strip_prefix("#error")?;
            Some(format!("<source>:{}:1: error: {}", idx + 1, message.trim()))
        })
        .collect()
}

fn options_are_valid(options: &str) -> bool {
    let mut expect_operand = false;
    for token in options.split_whitespace() {
        if expect_operand {
            expect_operand = false;
            continue;
        }
        match token {
            "-D" | "-I" => expect_operand = true,
            "-w" | "-Werror" => {}
            t if t.starts_with("-D") || t.starts_with("-I") || t.starts_with("-cl-") => {}
            _ => return false,
        }
    }
    !expect_operand
}

fn element_size(format: &ImageFormat) -> usize {
    let channels = match format.channel_order {
        channel_order::R | channel_order::A | channel_order::INTENSITY | channel_order::LUMINANCE => 1,
        channel_order::RG | channel_order::RA => 2,
        channel_order::RGB => 3,
        channel_order::RGBA | channel_order::BGRA | channel_order::ARGB => 4,
        _ => 0,
    };
    let bytes = match format.channel_type {
        channel_type::SNORM_INT8
        | channel_type::UNORM_INT8
        | channel_type::SIGNED_INT8
        | channel_type::UNSIGNED_INT8 => 1,
        channel_type::SNORM_INT16
        | channel_type::UNORM_INT16
        | channel_type::SIGNED_INT16
        | channel_type::UNSIGNED_INT16
        | channel_type::HALF_FLOAT => 2,
        channel_type::SIGNED_INT32 | channel_type::UNSIGNED_INT32 | channel_type::FLOAT => 4,
        _ => 0,
    };
    channels * bytes
}

const fn invalid_handle_status(kind: ResourceKind) -> Status {
    match kind {
        ResourceKind::Context => Status::INVALID_CONTEXT,
        ResourceKind::CommandQueue => Status::INVALID_COMMAND_QUEUE,
        ResourceKind::MemObject => Status::INVALID_MEM_OBJECT,
        ResourceKind::Program => Status::INVALID_PROGRAM,
        ResourceKind::Kernel => Status::INVALID_KERNEL,
        ResourceKind::Sampler => Status::INVALID_SAMPLER,
        ResourceKind::Event => Status::INVALID_EVENT,
    }
}

// ── Driver state ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct PlatformRecord {
    handle: NativeHandle,
    attrs: HashMap<AttributeKey, Vec<u8>>,
    devices: Vec<NativeHandle>,
}

#[derive(Debug)]
struct DeviceRecord {
    platform: NativeHandle,
    name: String,
    device_type: DeviceType,
    attrs: HashMap<AttributeKey, Vec<u8>>,
    build_failure: Option<String>,
}

#[derive(Debug, Clone)]
struct ImageRecord {
    format: ImageFormat,
    desc: ImageDesc,
}

impl ImageRecord {
    fn element_size(&self) -> usize {
        element_size(&self.format)
    }

    fn row_pitch(&self) -> usize {
        if self.desc.row_pitch == 0 {
            self.desc.width * self.element_size()
        } else {
            self.desc.row_pitch
        }
    }

    fn is_3d(&self) -> bool {
        self.desc.image_type == mem_object_type::IMAGE3D
    }

    fn slice_pitch(&self) -> usize {
        match (self.is_3d(), self.desc.slice_pitch) {
            (false, _) => 0,
            (true, 0) => self.row_pitch() * self.desc.height,
            (true, pitch) => pitch,
        }
    }

    fn byte_size(&self) -> usize {
        if self.is_3d() {
            self.slice_pitch() * self.desc.depth
        } else {
            self.row_pitch() * self.desc.height
        }
    }
}

#[derive(Debug, Clone)]
struct BuildRecord {
    status: i32,
    options: String,
    log: String,
}

impl Default for BuildRecord {
    fn default() -> Self {
        Self { status: build_status::NONE, options: String::new(), log: String::new() }
    }
}

#[derive(Debug)]
struct ProgramRecord {
    context: NativeHandle,
    devices: Vec<NativeHandle>,
    source: String,
    binaries: Vec<Vec<u8>>,
    builds: Vec<BuildRecord>,
}

impl ProgramRecord {
    fn text(&self) -> String {
        if !self.source.is_empty() {
            return self.source.clone();
        }
        self.binaries.iter().find_map(|b| embedded_source(b)).unwrap_or_default()
    }

    fn is_built(&self) -> bool {
        self.builds.iter().any(|b| b.status == build_status::SUCCESS)
    }
}

#[derive(Debug)]
enum ObjectData {
    Context { platform: Option<NativeHandle>, devices: Vec<NativeHandle> },
    Queue { context: NativeHandle, device: NativeHandle, properties: u64 },
    Mem {
        context: NativeHandle,
        flags: MemFlags,
        size: usize,
        image: Option<ImageRecord>,
        /// Parent buffer and byte offset of a sub-buffer.
        region: Option<(NativeHandle, usize)>,
    },
    Sampler {
        context: NativeHandle,
        normalized: bool,
        addressing: AddressingMode,
        filter: FilterMode,
    },
    Program(ProgramRecord),
    Kernel { context: NativeHandle, program: NativeHandle, name: String, num_args: u32 },
    Event { context: NativeHandle, status: i32 },
}

#[derive(Debug)]
struct Object {
    kind: ResourceKind,
    refcount: u32,
    data: ObjectData,
}

#[derive(Debug)]
struct Outcome {
    device_index: usize,
    succeeded: bool,
    log: String,
    binary: Vec<u8>,
}

struct PendingBuild {
    program: NativeHandle,
    options: String,
    outcomes: Vec<Outcome>,
    notify: BuildNotify,
}

#[derive(Debug, Default)]
struct Faults {
    release: HashMap<ResourceKind, Status>,
    info: HashMap<(&'static str, AttributeKey), Status>,
}

#[derive(Default)]
struct State {
    platforms: Vec<PlatformRecord>,
    devices: HashMap<NativeHandle, DeviceRecord>,
    objects: HashMap<NativeHandle, Object>,
    next_handle: usize,
    faults: Faults,
    defer_builds: bool,
    pending: Vec<PendingBuild>,
    release_calls: HashMap<ResourceKind, usize>,
}

enum Payload {
    Bytes(Vec<u8>),
    /// Program binaries: the caller's buffer is an array of destination
    /// pointers, one per device.
    Binaries(Vec<Vec<u8>>),
}

impl State {
    fn allocate(&mut self) -> NativeHandle {
        let handle = NativeHandle::from_usize(HANDLE_BASE + self.next_handle * HANDLE_STRIDE);
        self.next_handle += 1;
        handle
    }

    fn insert(&mut self, kind: ResourceKind, data: ObjectData) -> NativeHandle {
        let handle = self.allocate();
        trace!(%kind, %handle, "simulated create");
        self.objects.insert(handle, Object { kind, refcount: 1, data });
        handle
    }

    /// Remove a dead object; a sub-buffer hands back its parent reference.
    fn destroy(&mut self, kind: ResourceKind, handle: NativeHandle) {
        let Some(obj) = self.objects.remove(&handle) else { return };
        trace!(%kind, %handle, "simulated object destroyed");
        if let ObjectData::Mem { region: Some((parent, _)), .. } = obj.data {
            if let Some(p) = self.objects.get_mut(&parent) {
                p.refcount -= 1;
                if p.refcount == 0 {
                    self.destroy(ResourceKind::MemObject, parent);
                }
            }
        }
    }

    fn object(&self, handle: NativeHandle, kind: ResourceKind) -> Result<&Object, Status> {
        match self.objects.get(&handle) {
            Some(obj) if obj.kind == kind => Ok(obj),
            _ => Err(invalid_handle_status(kind)),
        }
    }

    fn context_devices(&self, context: NativeHandle) -> Result<&[NativeHandle], Status> {
        match &self.object(context, ResourceKind::Context)?.data {
            ObjectData::Context { devices, .. } => Ok(devices),
            _ => Err(Status::INVALID_CONTEXT),
        }
    }

    fn program(&self, handle: NativeHandle) -> Result<&ProgramRecord, Status> {
        match &self.object(handle, ResourceKind::Program)?.data {
            ObjectData::Program(record) => Ok(record),
            _ => Err(Status::INVALID_PROGRAM),
        }
    }

    fn program_mut(&mut self, handle: NativeHandle) -> Option<&mut ProgramRecord> {
        match self.objects.get_mut(&handle) {
            Some(Object { data: ObjectData::Program(record), .. }) => Some(record),
            _ => None,
        }
    }

    fn matching_devices(
        &self,
        platform: NativeHandle,
        device_type: DeviceType,
    ) -> Result<Vec<NativeHandle>, Status> {
        let record = self
            .platforms
            .iter()
            .find(|p| p.handle == platform)
            .ok_or(Status::INVALID_PLATFORM)?;
        let matches: Vec<NativeHandle> = if device_type == DeviceType::DEFAULT {
            record.devices.iter().take(1).copied().collect()
        } else {
            record
                .devices
                .iter()
                .copied()
                .filter(|d| {
                    self.devices
                        .get(d)
                        .is_some_and(|rec| rec.device_type.bits() & device_type.bits() != 0)
                })
                .collect()
        };
        if matches.is_empty() { Err(Status::DEVICE_NOT_FOUND) } else { Ok(matches) }
    }

    fn payload(&self, target: InfoTarget, key: AttributeKey) -> Result<Payload, Status> {
        let bytes = match target {
            InfoTarget::Platform(h) => {
                let record = self
                    .platforms
                    .iter()
                    .find(|p| p.handle == h)
                    .ok_or(Status::INVALID_PLATFORM)?;
                record.attrs.get(&key).cloned().ok_or(Status::INVALID_VALUE)?
            }
            InfoTarget::Device(h) => {
                let record = self.devices.get(&h).ok_or(Status::INVALID_DEVICE)?;
                if key == info::device::PLATFORM {
                    encode::handle(record.platform)
                } else {
                    record.attrs.get(&key).cloned().ok_or(Status::INVALID_VALUE)?
                }
            }
            InfoTarget::Context(h) => {
                let obj = self.object(h, ResourceKind::Context)?;
                let ObjectData::Context { platform, devices } = &obj.data else {
                    return Err(Status::INVALID_CONTEXT);
                };
                match key {
                    info::context::REFERENCE_COUNT => encode::u32(obj.refcount),
                    info::context::DEVICES => encode::handles(devices),
                    info::context::NUM_DEVICES => encode::u32(devices.len() as u32),
                    info::context::PROPERTIES => platform.map_or_else(Vec::new, |p| {
                        encode::usizes(&[CONTEXT_PLATFORM, p.as_usize(), 0])
                    }),
                    _ => return Err(Status::INVALID_VALUE),
                }
            }
            InfoTarget::CommandQueue(h) => {
                let obj = self.object(h, ResourceKind::CommandQueue)?;
                let ObjectData::Queue { context, device, properties } = &obj.data else {
                    return Err(Status::INVALID_COMMAND_QUEUE);
                };
                match key {
                    info::queue::CONTEXT => encode::handle(*context),
                    info::queue::DEVICE => encode::handle(*device),
                    info::queue::REFERENCE_COUNT => encode::u32(obj.refcount),
                    info::queue::PROPERTIES => encode::u64(*properties),
                    _ => return Err(Status::INVALID_VALUE),
                }
            }
            InfoTarget::MemObject(h) => {
                let obj = self.object(h, ResourceKind::MemObject)?;
                let ObjectData::Mem { context, flags, size, image, region } = &obj.data else {
                    return Err(Status::INVALID_MEM_OBJECT);
                };
                match key {
                    info::mem::TYPE => encode::u32(
                        image.as_ref().map_or(mem_object_type::BUFFER, |i| i.desc.image_type),
                    ),
                    info::mem::FLAGS => encode::u64(flags.bits()),
                    info::mem::SIZE => encode::usize(*size),
                    info::mem::HOST_PTR => encode::usize(0),
                    info::mem::MAP_COUNT => encode::u32(0),
                    info::mem::REFERENCE_COUNT => encode::u32(obj.refcount),
                    info::mem::CONTEXT => encode::handle(*context),
                    info::mem::ASSOCIATED_MEMOBJECT => {
                        encode::handle(region.map_or(NativeHandle::NULL, |(parent, _)| parent))
                    }
                    info::mem::OFFSET => encode::usize(region.map_or(0, |(_, offset)| offset)),
                    _ => return Err(Status::INVALID_VALUE),
                }
            }
            InfoTarget::Image(h) => {
                let obj = self.object(h, ResourceKind::MemObject)?;
                let ObjectData::Mem { image: Some(image), .. } = &obj.data else {
                    return Err(Status::INVALID_MEM_OBJECT);
                };
                match key {
                    info::image::FORMAT => encode::image_format(&image.format),
                    info::image::ELEMENT_SIZE => encode::usize(image.element_size()),
                    info::image::ROW_PITCH => encode::usize(image.row_pitch()),
                    info::image::SLICE_PITCH => encode::usize(image.slice_pitch()),
                    info::image::WIDTH => encode::usize(image.desc.width),
                    info::image::HEIGHT => encode::usize(image.desc.height),
                    info::image::DEPTH => {
                        encode::usize(if image.is_3d() { image.desc.depth } else { 0 })
                    }
                    _ => return Err(Status::INVALID_VALUE),
                }
            }
            InfoTarget::Sampler(h) => {
                let obj = self.object(h, ResourceKind::Sampler)?;
                let ObjectData::Sampler { context, normalized, addressing, filter } = &obj.data
                else {
                    return Err(Status::INVALID_SAMPLER);
                };
                match key {
                    info::sampler::REFERENCE_COUNT => encode::u32(obj.refcount),
                    info::sampler::CONTEXT => encode::handle(*context),
                    info::sampler::NORMALIZED_COORDS => encode::u32(u32::from(*normalized)),
                    info::sampler::ADDRESSING_MODE => encode::u32(addressing.as_raw()),
                    info::sampler::FILTER_MODE => encode::u32(filter.as_raw()),
                    _ => return Err(Status::INVALID_VALUE),
                }
            }
            InfoTarget::Program(h) => {
                let obj = self.object(h, ResourceKind::Program)?;
                let ObjectData::Program(record) = &obj.data else {
                    return Err(Status::INVALID_PROGRAM);
                };
                match key {
                    info::program::REFERENCE_COUNT => encode::u32(obj.refcount),
                    info::program::CONTEXT => encode::handle(record.context),
                    info::program::NUM_DEVICES => encode::u32(record.devices.len() as u32),
                    info::program::DEVICES => encode::handles(&record.devices),
                    info::program::SOURCE => encode::string(&record.source),
                    info::program::BINARY_SIZES => {
                        let sizes: Vec<usize> = record.binaries.iter().map(Vec::len).collect();
                        encode::usizes(&sizes)
                    }
                    info::program::BINARIES => {
                        return Ok(Payload::Binaries(record.binaries.clone()));
                    }
                    _ => return Err(Status::INVALID_VALUE),
                }
            }
            InfoTarget::ProgramBuild { program, device } => {
                let record = self.program(program)?;
                let idx = record
                    .devices
                    .iter()
                    .position(|d| *d == device)
                    .ok_or(Status::INVALID_DEVICE)?;
                let build = &record.builds[idx];
                match key {
                    info::build::STATUS => encode::i32(build.status),
                    info::build::OPTIONS => encode::string(&build.options),
                    info::build::LOG => encode::string(&build.log),
                    _ => return Err(Status::INVALID_VALUE),
                }
            }
            InfoTarget::Kernel(h) => {
                let obj = self.object(h, ResourceKind::Kernel)?;
                let ObjectData::Kernel { context, program, name, num_args } = &obj.data else {
                    return Err(Status::INVALID_KERNEL);
                };
                match key {
                    info::kernel::FUNCTION_NAME => encode::string(name),
                    info::kernel::NUM_ARGS => encode::u32(*num_args),
                    info::kernel::REFERENCE_COUNT => encode::u32(obj.refcount),
                    info::kernel::CONTEXT => encode::handle(*context),
                    info::kernel::PROGRAM => encode::handle(*program),
                    _ => return Err(Status::INVALID_VALUE),
                }
            }
            InfoTarget::KernelWorkGroup { kernel, device } => {
                let obj = self.object(kernel, ResourceKind::Kernel)?;
                let ObjectData::Kernel { program, .. } = &obj.data else {
                    return Err(Status::INVALID_KERNEL);
                };
                let on_program = self.program(*program).is_ok_and(|p| p.devices.contains(&device));
                let record = self.devices.get(&device).filter(|_| on_program);
                let record = record.ok_or(Status::INVALID_DEVICE)?;
                match key {
                    info::work_group::WORK_GROUP_SIZE => record
                        .attrs
                        .get(&info::device::MAX_WORK_GROUP_SIZE)
                        .cloned()
                        .unwrap_or_else(|| encode::usize(1)),
                    info::work_group::COMPILE_WORK_GROUP_SIZE => encode::usizes(&[0, 0, 0]),
                    info::work_group::LOCAL_MEM_SIZE => encode::u64(0),
                    info::work_group::PREFERRED_WORK_GROUP_SIZE_MULTIPLE => encode::usize(32),
                    info::work_group::PRIVATE_MEM_SIZE => encode::u64(0),
                    _ => return Err(Status::INVALID_VALUE),
                }
            }
            InfoTarget::Event(h) => {
                let obj = self.object(h, ResourceKind::Event)?;
                let ObjectData::Event { context, status } = &obj.data else {
                    return Err(Status::INVALID_EVENT);
                };
                match key {
                    info::event::COMMAND_QUEUE => encode::handle(NativeHandle::NULL),
                    info::event::COMMAND_TYPE => encode::u32(COMMAND_USER),
                    info::event::REFERENCE_COUNT => encode::u32(obj.refcount),
                    info::event::COMMAND_EXECUTION_STATUS => encode::i32(*status),
                    info::event::CONTEXT => encode::handle(*context),
                    _ => return Err(Status::INVALID_VALUE),
                }
            }
        };
        Ok(Payload::Bytes(bytes))
    }

    /// Validate a build request and decide the per-device outcome.
    fn plan_build(
        &self,
        program: NativeHandle,
        devices: &[NativeHandle],
        options: &str,
    ) -> Result<Vec<Outcome>, Status> {
        let record = self.program(program)?;
        let targets: Vec<usize> = if devices.is_empty() {
            (0..record.devices.len()).collect()
        } else {
            devices
                .iter()
                .map(|d| record.devices.iter().position(|p| p == d).ok_or(Status::INVALID_DEVICE))
                .collect::<Result<_, _>>()?
        };
        let has_kernels = self.objects.values().any(|o| {
            matches!(o.data, ObjectData::Kernel { program: p, .. } if p == program)
        });
        let in_progress =
            targets.iter().any(|&i| record.builds[i].status == build_status::IN_PROGRESS);
        if has_kernels || in_progress {
            return Err(Status::INVALID_OPERATION);
        }
        if !options_are_valid(options) {
            return Err(Status::INVALID_BUILD_OPTIONS);
        }

        let text = record.text();
        let errors = compile_errors(&text);
        Ok(targets
            .into_iter()
            .map(|device_index| {
                let device = self.devices.get(&record.devices[device_index]);
                let name = device.map_or("", |d| d.name.as_str());
                match device.and_then(|d| d.build_failure.clone()) {
                    Some(log) => Outcome { device_index, succeeded: false, log, binary: Vec::new() },
                    None if !errors.is_empty() => Outcome {
                        device_index,
                        succeeded: false,
                        log: errors.join("\n"),
                        binary: Vec::new(),
                    },
                    None => Outcome {
                        device_index,
                        succeeded: true,
                        log: String::new(),
                        binary: simulated_binary(name, &text),
                    },
                }
            })
            .collect())
    }

    fn mark_in_progress(&mut self, program: NativeHandle, options: &str, outcomes: &[Outcome]) {
        if let Some(record) = self.program_mut(program) {
            for outcome in outcomes {
                record.builds[outcome.device_index] = BuildRecord {
                    status: build_status::IN_PROGRESS,
                    options: options.to_owned(),
                    log: String::new(),
                };
            }
        }
    }

    fn apply_build(&mut self, program: NativeHandle, options: &str, outcomes: Vec<Outcome>) {
        let Some(record) = self.program_mut(program) else {
            return;
        };
        for outcome in outcomes {
            let status =
                if outcome.succeeded { build_status::SUCCESS } else { build_status::ERROR };
            record.builds[outcome.device_index] =
                BuildRecord { status, options: options.to_owned(), log: outcome.log };
            if outcome.succeeded {
                record.binaries[outcome.device_index] = outcome.binary;
            } else if !record.source.is_empty() {
                record.binaries[outcome.device_index].clear();
            }
        }
    }
}

/// # Safety
///
/// Same contract as [`ClApi::get_info`].
unsafe fn write_payload(
    payload: Payload,
    size: usize,
    value: *mut c_void,
    size_ret: *mut usize,
) -> Status {
    let required = match &payload {
        Payload::Bytes(bytes) => bytes.len(),
        Payload::Binaries(list) => list.len() * size_of::<usize>(),
    };
    if !value.is_null() {
        if size < required {
            return Status::INVALID_VALUE;
        }
        match &payload {
            // SAFETY: caller guarantees `value` is writable for `size` bytes.
            Payload::Bytes(bytes) => unsafe {
                ptr::copy_nonoverlapping(bytes.as_ptr(), value.cast::<u8>(), bytes.len());
            },
            Payload::Binaries(list) => {
                let slots = value.cast::<*mut u8>();
                for (i, binary) in list.iter().enumerate() {
                    // SAFETY: the pointer array holds `list.len()` entries and
                    // each non-null entry is valid for the reported size.
                    unsafe {
                        let dst = slots.add(i).read_unaligned();
                        if !dst.is_null() {
                            ptr::copy_nonoverlapping(binary.as_ptr(), dst, binary.len());
                        }
                    }
                }
            }
        }
    }
    if !size_ret.is_null() {
        // SAFETY: caller guarantees `size_ret` is writable.
        unsafe { size_ret.write(required) };
    }
    Status::SUCCESS
}

// ── SimulatedCl ─────────────────────────────────────────────────────────────

/// Simulated OpenCL driver. See the module docs.
pub struct SimulatedCl {
    state: Mutex<State>,
    info_calls: AtomicUsize,
}

impl SimulatedCl {
    /// A driver exposing `platforms` in order.
    pub fn new(platforms: impl IntoIterator<Item = SimPlatform>) -> Self {
        let mut state = State::default();
        for platform in platforms {
            let handle = state.allocate();
            let mut devices = Vec::with_capacity(platform.devices.len());
            for device in platform.devices {
                let device_handle = state.allocate();
                devices.push(device_handle);
                state.devices.insert(
                    device_handle,
                    DeviceRecord {
                        platform: handle,
                        name: device.name,
                        device_type: device.device_type,
                        attrs: device.attrs,
                        build_failure: device.build_failure,
                    },
                );
            }
            state.platforms.push(PlatformRecord { handle, attrs: platform.attrs, devices });
        }
        debug!(platforms = state.platforms.len(), devices = state.devices.len(), "simulated driver ready");
        Self { state: Mutex::new(state), info_calls: AtomicUsize::new(0) }
    }

    /// A driver with no platforms at all.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn platform_handles(&self) -> Vec<NativeHandle> {
        self.state.lock().platforms.iter().map(|p| p.handle).collect()
    }

    /// Every device handle, in platform then declaration order.
    pub fn device_handles(&self) -> Vec<NativeHandle> {
        self.state.lock().platforms.iter().flat_map(|p| p.devices.iter().copied()).collect()
    }

    /// Number of `get_info` calls served so far, including size queries.
    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    /// Number of release calls received for `kind`, failed ones included.
    pub fn release_calls(&self, kind: ResourceKind) -> usize {
        self.state.lock().release_calls.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_release_calls(&self) -> usize {
        self.state.lock().release_calls.values().sum()
    }

    pub fn is_live(&self, handle: NativeHandle) -> bool {
        self.state.lock().objects.contains_key(&handle)
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.state.lock().objects.values().filter(|o| o.kind == kind).count()
    }

    pub fn refcount(&self, handle: NativeHandle) -> Option<u32> {
        self.state.lock().objects.get(&handle).map(|o| o.refcount)
    }

    /// Every subsequent release of `kind` fails with `status` and leaves the
    /// object alive.
    pub fn fail_releases(&self, kind: ResourceKind, status: Status) {
        self.state.lock().faults.release.insert(kind, status);
    }

    /// Every subsequent query of `key` through `entry_point` (for example
    /// `"clGetProgramBuildInfo"`) fails with `status`.
    pub fn fail_info(&self, entry_point: &'static str, key: AttributeKey, status: Status) {
        self.state.lock().faults.info.insert((entry_point, key), status);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    /// Replace the configured build failure of `device`. `None` lets builds
    /// succeed again.
    pub fn set_build_failure(&self, device: NativeHandle, log: Option<String>) {
        if let Some(record) = self.state.lock().devices.get_mut(&device) {
            record.build_failure = log;
        }
    }

    /// When set, builds started with a completion callback stay
    /// `CL_BUILD_IN_PROGRESS` until [`SimulatedCl::complete_pending_builds`].
    pub fn defer_builds(&self, defer: bool) {
        self.state.lock().defer_builds = defer;
    }

    /// Finish every deferred build and run its callback. Returns how many
    /// builds were completed.
    pub fn complete_pending_builds(&self) -> usize {
        let notifications: Vec<(NativeHandle, BuildNotify)> = {
            let mut state = self.state.lock();
            let pending = std::mem::take(&mut state.pending);
            pending
                .into_iter()
                .map(|build| {
                    state.apply_build(build.program, &build.options, build.outcomes);
                    (build.program, build.notify)
                })
                .collect()
        };
        let completed = notifications.len();
        for (program, notify) in notifications {
            notify(program);
        }
        completed
    }
}

impl Default for SimulatedCl {
    fn default() -> Self {
        Self::new([SimPlatform::default()])
    }
}

impl fmt::Debug for SimulatedCl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimulatedCl")
            .field("platforms", &state.platforms.len())
            .field("devices", &state.devices.len())
            .field("live_objects", &state.objects.len())
            .field("pending_builds", &state.pending.len())
            .finish()
    }
}

impl ClApi for SimulatedCl {
    fn platform_ids(&self) -> Result<Vec<NativeHandle>, Status> {
        Ok(self.platform_handles())
    }

    fn device_ids(
        &self,
        platform: NativeHandle,
        device_type: DeviceType,
    ) -> Result<Vec<NativeHandle>, Status> {
        self.state.lock().matching_devices(platform, device_type)
    }

    unsafe fn get_info(
        &self,
        target: InfoTarget,
        key: AttributeKey,
        size: usize,
        value: *mut c_void,
        size_ret: *mut usize,
    ) -> Status {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if let Some(status) = state.faults.info.get(&(target.entry_point(), key)) {
            trace!(entry = target.entry_point(), key, %status, "injected info failure");
            return *status;
        }
        match state.payload(target, key) {
            // SAFETY: forwarded from the caller's contract.
            Ok(payload) => unsafe { write_payload(payload, size, value, size_ret) },
            Err(status) => status,
        }
    }

    fn create_context(
        &self,
        platform: Option<NativeHandle>,
        devices: &[NativeHandle],
    ) -> Result<NativeHandle, Status> {
        let mut state = self.state.lock();
        if devices.is_empty() {
            return Err(Status::INVALID_VALUE);
        }
        if let Some(p) = platform {
            if !state.platforms.iter().any(|rec| rec.handle == p) {
                return Err(Status::INVALID_PLATFORM);
            }
        }
        for device in devices {
            let record = state.devices.get(device).ok_or(Status::INVALID_DEVICE)?;
            if platform.is_some_and(|p| p != record.platform) {
                return Err(Status::INVALID_DEVICE);
            }
        }
        Ok(state.insert(
            ResourceKind::Context,
            ObjectData::Context { platform, devices: devices.to_vec() },
        ))
    }

    fn create_context_from_type(
        &self,
        platform: Option<NativeHandle>,
        device_type: DeviceType,
    ) -> Result<NativeHandle, Status> {
        let mut state = self.state.lock();
        let platform = match platform {
            Some(p) => p,
            None => state.platforms.first().map(|p| p.handle).ok_or(Status::INVALID_PLATFORM)?,
        };
        let devices = state.matching_devices(platform, device_type)?;
        Ok(state.insert(
            ResourceKind::Context,
            ObjectData::Context { platform: Some(platform), devices },
        ))
    }

    fn create_command_queue(
        &self,
        context: NativeHandle,
        device: NativeHandle,
        properties: u64,
    ) -> Result<NativeHandle, Status> {
        let mut state = self.state.lock();
        if !state.context_devices(context)?.contains(&device) {
            return Err(Status::INVALID_DEVICE);
        }
        if properties & !0b11 != 0 {
            return Err(Status::INVALID_VALUE);
        }
        Ok(state.insert(
            ResourceKind::CommandQueue,
            ObjectData::Queue { context, device, properties },
        ))
    }

    fn create_buffer(
        &self,
        context: NativeHandle,
        flags: MemFlags,
        size: usize,
        host: Option<&[u8]>,
    ) -> Result<NativeHandle, Status> {
        let mut state = self.state.lock();
        state.context_devices(context)?;
        if size == 0 {
            return Err(Status::INVALID_BUFFER_SIZE);
        }
        check_access_flags(flags)?;
        check_host_data(flags, host, size)?;
        Ok(state.insert(
            ResourceKind::MemObject,
            ObjectData::Mem { context, flags, size, image: None, region: None },
        ))
    }

    fn create_sub_buffer(
        &self,
        buffer: NativeHandle,
        flags: MemFlags,
        origin: usize,
        size: usize,
    ) -> Result<NativeHandle, Status> {
        let mut state = self.state.lock();
        let parent = state.object(buffer, ResourceKind::MemObject)?;
        let ObjectData::Mem {
            context,
            flags: parent_flags,
            size: parent_size,
            image: None,
            region: None,
        } = parent.data
        else {
            return Err(Status::INVALID_MEM_OBJECT);
        };
        let host_flags = MemFlags::USE_HOST_PTR.bits()
            | MemFlags::ALLOC_HOST_PTR.bits()
            | MemFlags::COPY_HOST_PTR.bits();
        if flags.bits() & host_flags != 0 {
            return Err(Status::INVALID_VALUE);
        }
        check_access_flags(flags)?;
        if size == 0 {
            return Err(Status::INVALID_BUFFER_SIZE);
        }
        if origin.checked_add(size).is_none_or(|end| end > parent_size) {
            return Err(Status::INVALID_VALUE);
        }
        let aligned = state.context_devices(context)?.iter().any(|d| {
            let bits = state
                .devices
                .get(d)
                .and_then(|rec| rec.attrs.get(&info::device::MEM_BASE_ADDR_ALIGN))
                .and_then(|v| v.get(..4))
                .map_or(1024, |b| u32::from_ne_bytes([b[0], b[1], b[2], b[3]]));
            origin % (bits as usize / 8).max(1) == 0
        });
        if !aligned {
            return Err(Status::MISALIGNED_SUB_BUFFER_OFFSET);
        }
        let access = MemFlags::READ_WRITE.bits()
            | MemFlags::WRITE_ONLY.bits()
            | MemFlags::READ_ONLY.bits();
        let inherited = if flags.bits() & access == 0 {
            parent_flags.bits() & (access | host_flags)
        } else {
            parent_flags.bits() & host_flags
        };
        if let Some(parent) = state.objects.get_mut(&buffer) {
            parent.refcount += 1;
        }
        Ok(state.insert(
            ResourceKind::MemObject,
            ObjectData::Mem {
                context,
                flags: MemFlags(flags.bits() | inherited),
                size,
                image: None,
                region: Some((buffer, origin)),
            },
        ))
    }

    fn create_image(
        &self,
        context: NativeHandle,
        flags: MemFlags,
        format: &ImageFormat,
        desc: &ImageDesc,
        host: Option<&[u8]>,
    ) -> Result<NativeHandle, Status> {
        let mut state = self.state.lock();
        let devices = state.context_devices(context)?;
        let image_capable = devices.iter().any(|d| {
            state
                .devices
                .get(d)
                .and_then(|rec| rec.attrs.get(&info::device::IMAGE_SUPPORT))
                .is_some_and(|v| v.first().copied().unwrap_or(0) != 0)
        });
        if !image_capable {
            return Err(Status::INVALID_OPERATION);
        }
        check_access_flags(flags)?;
        let record = ImageRecord { format: *format, desc: *desc };
        if record.element_size() == 0 {
            return Err(Status::INVALID_IMAGE_FORMAT_DESCRIPTOR);
        }
        if !SUPPORTED_IMAGE_FORMATS.contains(format) {
            return Err(Status::IMAGE_FORMAT_NOT_SUPPORTED);
        }
        let is_3d = match desc.image_type {
            mem_object_type::IMAGE2D => false,
            mem_object_type::IMAGE3D => true,
            _ => return Err(Status::INVALID_VALUE),
        };
        if desc.width == 0 || desc.height == 0 || (is_3d && desc.depth < 2) {
            return Err(Status::INVALID_IMAGE_SIZE);
        }
        if desc.row_pitch != 0 && desc.row_pitch < desc.width * record.element_size() {
            return Err(Status::INVALID_IMAGE_SIZE);
        }
        let size = record.byte_size();
        check_host_data(flags, host, size)?;
        Ok(state.insert(
            ResourceKind::MemObject,
            ObjectData::Mem { context, flags, size, image: Some(record), region: None },
        ))
    }

    fn create_sampler(
        &self,
        context: NativeHandle,
        normalized_coords: bool,
        addressing: AddressingMode,
        filter: FilterMode,
    ) -> Result<NativeHandle, Status> {
        let mut state = self.state.lock();
        state.context_devices(context)?;
        Ok(state.insert(
            ResourceKind::Sampler,
            ObjectData::Sampler { context, normalized: normalized_coords, addressing, filter },
        ))
    }

    fn create_program_with_source(
        &self,
        context: NativeHandle,
        sources: &[&str],
    ) -> Result<NativeHandle, Status> {
        let mut state = self.state.lock();
        let devices = state.context_devices(context)?.to_vec();
        if sources.is_empty() {
            return Err(Status::INVALID_VALUE);
        }
        let record = ProgramRecord {
            context,
            binaries: vec![Vec::new(); devices.len()],
            builds: vec![BuildRecord::default(); devices.len()],
            devices,
            source: sources.concat(),
        };
        Ok(state.insert(ResourceKind::Program, ObjectData::Program(record)))
    }

    fn create_program_with_binary(
        &self,
        context: NativeHandle,
        devices: &[NativeHandle],
        binaries: &[&[u8]],
    ) -> Result<(NativeHandle, Vec<Status>), Status> {
        let mut state = self.state.lock();
        let context_devices = state.context_devices(context)?;
        if devices.is_empty() || devices.len() != binaries.len() {
            return Err(Status::INVALID_VALUE);
        }
        if devices.iter().any(|d| !context_devices.contains(d)) {
            return Err(Status::INVALID_DEVICE);
        }
        if binaries.iter().any(|b| b.is_empty()) {
            return Err(Status::INVALID_VALUE);
        }
        let statuses: Vec<Status> = binaries
            .iter()
            .map(|b| {
                if embedded_source(b).is_some() { Status::SUCCESS } else { Status::INVALID_BINARY }
            })
            .collect();
        if statuses.iter().any(|s| !s.is_success()) {
            return Err(Status::INVALID_BINARY);
        }
        let record = ProgramRecord {
            context,
            devices: devices.to_vec(),
            source: String::new(),
            binaries: binaries.iter().map(|b| b.to_vec()).collect(),
            builds: vec![BuildRecord::default(); devices.len()],
        };
        Ok((state.insert(ResourceKind::Program, ObjectData::Program(record)), statuses))
    }

    fn build_program(
        &self,
        program: NativeHandle,
        devices: &[NativeHandle],
        options: Option<&CStr>,
        notify: Option<BuildNotify>,
    ) -> Status {
        let options = options.map(|o| o.to_string_lossy().into_owned()).unwrap_or_default();
        let mut state = self.state.lock();
        let outcomes = match state.plan_build(program, devices, &options) {
            Ok(outcomes) => outcomes,
            Err(status) => return status,
        };
        let failed = outcomes.iter().any(|o| !o.succeeded);
        debug!(%program, targets = outcomes.len(), failed, "simulated build");

        match notify {
            Some(notify) if state.defer_builds => {
                state.mark_in_progress(program, &options, &outcomes);
                state.pending.push(PendingBuild { program, options, outcomes, notify });
                Status::SUCCESS
            }
            notify => {
                state.apply_build(program, &options, outcomes);
                drop(state);
                if let Some(notify) = notify {
                    notify(program);
                }
                if failed { Status::BUILD_PROGRAM_FAILURE } else { Status::SUCCESS }
            }
        }
    }

    fn create_kernel(&self, program: NativeHandle, name: &CStr) -> Result<NativeHandle, Status> {
        let mut state = self.state.lock();
        let record = state.program(program)?;
        if !record.is_built() {
            return Err(Status::INVALID_PROGRAM_EXECUTABLE);
        }
        let name = name.to_str().map_err(|_| Status::INVALID_VALUE)?;
        let context = record.context;
        let (name, num_args) = kernel_signatures(&record.text())
            .into_iter()
            .find(|(n, _)| n == name)
            .ok_or(Status::INVALID_KERNEL_NAME)?;
        Ok(state.insert(
            ResourceKind::Kernel,
            ObjectData::Kernel { context, program, name, num_args },
        ))
    }

    fn create_kernels_in_program(
        &self,
        program: NativeHandle,
    ) -> Result<Vec<NativeHandle>, Status> {
        let mut state = self.state.lock();
        let record = state.program(program)?;
        if !record.is_built() {
            return Err(Status::INVALID_PROGRAM_EXECUTABLE);
        }
        let context = record.context;
        let signatures = kernel_signatures(&record.text());
        Ok(signatures
            .into_iter()
            .map(|(name, num_args)| {
                state.insert(
                    ResourceKind::Kernel,
                    ObjectData::Kernel { context, program, name, num_args },
                )
            })
            .collect())
    }

    fn create_user_event(&self, context: NativeHandle) -> Result<NativeHandle, Status> {
        let mut state = self.state.lock();
        state.context_devices(context)?;
        Ok(state.insert(
            ResourceKind::Event,
            ObjectData::Event { context, status: execution_status::SUBMITTED },
        ))
    }

    fn set_user_event_status(&self, event: NativeHandle, new_status: i32) -> Status {
        if new_status != execution_status::COMPLETE && new_status >= 0 {
            return Status::INVALID_VALUE;
        }
        let mut state = self.state.lock();
        match state.objects.get_mut(&event) {
            Some(Object { data: ObjectData::Event { status, .. }, .. }) => {
                if *status != execution_status::SUBMITTED {
                    return Status::INVALID_OPERATION;
                }
                *status = new_status;
                Status::SUCCESS
            }
            _ => Status::INVALID_EVENT,
        }
    }

    fn supported_image_formats(
        &self,
        context: NativeHandle,
        _flags: MemFlags,
        image_type: u32,
    ) -> Result<Vec<ImageFormat>, Status> {
        self.state.lock().context_devices(context)?;
        match image_type {
            mem_object_type::IMAGE2D | mem_object_type::IMAGE3D => {
                Ok(SUPPORTED_IMAGE_FORMATS.to_vec())
            }
            _ => Err(Status::INVALID_VALUE),
        }
    }

    fn release(&self, kind: ResourceKind, handle: NativeHandle) -> Status {
        let mut state = self.state.lock();
        *state.release_calls.entry(kind).or_default() += 1;
        if let Some(status) = state.faults.release.get(&kind) {
            trace!(%kind, %handle, %status, "injected release failure");
            return *status;
        }
        let Some(obj) = state.objects.get_mut(&handle).filter(|o| o.kind == kind) else {
            return invalid_handle_status(kind);
        };
        obj.refcount -= 1;
        if obj.refcount == 0 {
            state.destroy(kind, handle);
        }
        Status::SUCCESS
    }
}

fn check_access_flags(flags: MemFlags) -> Result<(), Status> {
    let access = [MemFlags::READ_WRITE, MemFlags::WRITE_ONLY, MemFlags::READ_ONLY];
    if access.iter().filter(|f| flags.contains(**f)).count() > 1 {
        return Err(Status::INVALID_VALUE);
    }
    if flags.contains(MemFlags::USE_HOST_PTR)
        && (flags.contains(MemFlags::COPY_HOST_PTR) || flags.contains(MemFlags::ALLOC_HOST_PTR))
    {
        return Err(Status::INVALID_VALUE);
    }
    Ok(())
}

fn check_host_data(flags: MemFlags, host: Option<&[u8]>, size: usize) -> Result<(), Status> {
    let wants_host =
        flags.contains(MemFlags::COPY_HOST_PTR) || flags.contains(MemFlags::USE_HOST_PTR);
    match host {
        Some(data) if wants_host && data.len() >= size => Ok(()),
        None if !wants_host => Ok(()),
        _ => Err(Status::INVALID_HOST_PTR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_signatures_count_arguments() {
        let source = "__kernel void add(global float* a, global float* b) {}\n\
                      kernel void noop(void) {}\n\
                      void helper(int x) {}\n\
                      __kernel void scale(global float* a,\n float k) {}";
        assert_eq!(
            kernel_signatures(source),
            vec![("add".to_owned(), 2), ("noop".to_owned(), 0), ("scale".to_owned(), 2)]
        );
    }

    #[test]
    fn kernel_marker_inside_identifier_is_ignored() {
        assert!(kernel_signatures("mykernel void f() {}").is_empty());
    }

    #[test]
    fn compile_errors_report_line_numbers() {
        let errors = compile_errors("int x;\n  #error missing semicolon\n");
        assert_eq!(errors, vec!["<source>:2:1: error: missing semicolon".to_owned()]);
    }

    #[test]
    fn build_options_are_screened() {
        assert!(options_are_valid(""));
        assert!(options_are_valid("-DWIDTH=4 -cl-fast-relaxed-math -I include -w"));
        assert!(!options_are_valid("--bogus"));
        assert!(!options_are_valid("-D"));
    }

    #[test]
    fn binaries_round_trip_their_source() {
        let binary = simulated_binary("Sim GPU 0", "kernel void k() {}");
        assert_eq!(embedded_source(&binary).as_deref(), Some("kernel void k() {}"));
        assert_eq!(embedded_source(b"garbage"), None);
    }

    #[test]
    fn sub_buffer_pins_its_parent() {
        let sim = SimulatedCl::default();
        let ctx = sim.create_context(None, &sim.device_handles()).unwrap();
        let parent = sim.create_buffer(ctx, MemFlags::READ_ONLY, 4096, None).unwrap();

        assert_eq!(
            sim.create_sub_buffer(parent, MemFlags::default(), 64, 128),
            Err(Status::MISALIGNED_SUB_BUFFER_OFFSET)
        );
        assert_eq!(
            sim.create_sub_buffer(parent, MemFlags::default(), 2048, 4096),
            Err(Status::INVALID_VALUE)
        );
        let sub = sim.create_sub_buffer(parent, MemFlags::default(), 1024, 512).unwrap();
        assert_eq!(sim.refcount(parent), Some(2));
        assert_eq!(
            sim.create_sub_buffer(sub, MemFlags::default(), 0, 128),
            Err(Status::INVALID_MEM_OBJECT)
        );

        assert!(sim.release(ResourceKind::MemObject, parent).is_success());
        assert!(sim.is_live(parent));
        assert!(sim.release(ResourceKind::MemObject, sub).is_success());
        assert!(!sim.is_live(parent));
        assert!(!sim.is_live(sub));
    }

    #[test]
    fn image_pitches_default_from_format() {
        let record = ImageRecord {
            format: ImageFormat::new(channel_order::RGBA, channel_type::FLOAT),
            desc: ImageDesc::image_3d(4, 3, 2, 0, 0),
        };
        assert_eq!(record.element_size(), 16);
        assert_eq!(record.row_pitch(), 64);
        assert_eq!(record.slice_pitch(), 192);
        assert_eq!(record.byte_size(), 384);
    }
}
