//! Attribute keys and the native info entry point each family belongs to.
//!
//! Key families are scoped per object kind: a `device` key is meaningless
//! against a program and vice versa.

use crate::handle::NativeHandle;

/// Integer enumerant selecting one queryable attribute.
pub type AttributeKey = u32;

/// Which native `clGet*Info` entry point a query is routed to, together with
/// the handle(s) it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoTarget {
    Platform(NativeHandle),
    Device(NativeHandle),
    Context(NativeHandle),
    CommandQueue(NativeHandle),
    MemObject(NativeHandle),
    Image(NativeHandle),
    Sampler(NativeHandle),
    Program(NativeHandle),
    /// Build information is scoped to a (program, device) pair.
    ProgramBuild { program: NativeHandle, device: NativeHandle },
    Kernel(NativeHandle),
    /// Work-group information is scoped to a (kernel, device) pair.
    KernelWorkGroup { kernel: NativeHandle, device: NativeHandle },
    Event(NativeHandle),
}

impl InfoTarget {
    /// Name of the native entry point serving this target.
    pub const fn entry_point(&self) -> &'static str {
        match self {
            Self::Platform(_) => "clGetPlatformInfo",
            Self::Device(_) => "clGetDeviceInfo",
            Self::Context(_) => "clGetContextInfo",
            Self::CommandQueue(_) => "clGetCommandQueueInfo",
            Self::MemObject(_) => "clGetMemObjectInfo",
            Self::Image(_) => "clGetImageInfo",
            Self::Sampler(_) => "clGetSamplerInfo",
            Self::Program(_) => "clGetProgramInfo",
            Self::ProgramBuild { .. } => "clGetProgramBuildInfo",
            Self::Kernel(_) => "clGetKernelInfo",
            Self::KernelWorkGroup { .. } => "clGetKernelWorkGroupInfo",
            Self::Event(_) => "clGetEventInfo",
        }
    }

    /// The primary handle of the query.
    pub const fn handle(&self) -> NativeHandle {
        match *self {
            Self::Platform(h)
            | Self::Device(h)
            | Self::Context(h)
            | Self::CommandQueue(h)
            | Self::MemObject(h)
            | Self::Image(h)
            | Self::Sampler(h)
            | Self::Program(h)
            | Self::Kernel(h)
            | Self::Event(h) => h,
            Self::ProgramBuild { program, .. } => program,
            Self::KernelWorkGroup { kernel, .. } => kernel,
        }
    }
}

/// `cl_platform_info`
pub mod platform {
    use super::AttributeKey;

    pub const PROFILE: AttributeKey = 0x0900;
    pub const VERSION: AttributeKey = 0x0901;
    pub const NAME: AttributeKey = 0x0902;
    pub const VENDOR: AttributeKey = 0x0903;
    pub const EXTENSIONS: AttributeKey = 0x0904;
    pub const ICD_SUFFIX_KHR: AttributeKey = 0x0920;
}

/// `cl_device_info`
pub mod device {
    use super::AttributeKey;

    pub const TYPE: AttributeKey = 0x1000;
    pub const VENDOR_ID: AttributeKey = 0x1001;
    pub const MAX_COMPUTE_UNITS: AttributeKey = 0x1002;
    pub const MAX_WORK_ITEM_DIMENSIONS: AttributeKey = 0x1003;
    pub const MAX_WORK_GROUP_SIZE: AttributeKey = 0x1004;
    pub const MAX_WORK_ITEM_SIZES: AttributeKey = 0x1005;
    pub const PREFERRED_VECTOR_WIDTH_CHAR: AttributeKey = 0x1006;
    pub const PREFERRED_VECTOR_WIDTH_SHORT: AttributeKey = 0x1007;
    pub const PREFERRED_VECTOR_WIDTH_INT: AttributeKey = 0x1008;
    pub const PREFERRED_VECTOR_WIDTH_LONG: AttributeKey = 0x1009;
    pub const PREFERRED_VECTOR_WIDTH_FLOAT: AttributeKey = 0x100A;
    pub const PREFERRED_VECTOR_WIDTH_DOUBLE: AttributeKey = 0x100B;
    pub const MAX_CLOCK_FREQUENCY: AttributeKey = 0x100C;
    pub const ADDRESS_BITS: AttributeKey = 0x100D;
    pub const MAX_READ_IMAGE_ARGS: AttributeKey = 0x100E;
    pub const MAX_WRITE_IMAGE_ARGS: AttributeKey = 0x100F;
    pub const MAX_MEM_ALLOC_SIZE: AttributeKey = 0x1010;
    pub const IMAGE2D_MAX_WIDTH: AttributeKey = 0x1011;
    pub const IMAGE2D_MAX_HEIGHT: AttributeKey = 0x1012;
    pub const IMAGE3D_MAX_WIDTH: AttributeKey = 0x1013;
    pub const IMAGE3D_MAX_HEIGHT: AttributeKey = 0x1014;
    pub const IMAGE3D_MAX_DEPTH: AttributeKey = 0x1015;
    pub const IMAGE_SUPPORT: AttributeKey = 0x1016;
    pub const MAX_PARAMETER_SIZE: AttributeKey = 0x1017;
    pub const MAX_SAMPLERS: AttributeKey = 0x1018;
    pub const MEM_BASE_ADDR_ALIGN: AttributeKey = 0x1019;
    pub const MIN_DATA_TYPE_ALIGN_SIZE: AttributeKey = 0x101A;
    pub const SINGLE_FP_CONFIG: AttributeKey = 0x101B;
    pub const GLOBAL_MEM_CACHE_TYPE: AttributeKey = 0x101C;
    pub const GLOBAL_MEM_CACHELINE_SIZE: AttributeKey = 0x101D;
    pub const GLOBAL_MEM_CACHE_SIZE: AttributeKey = 0x101E;
    pub const GLOBAL_MEM_SIZE: AttributeKey = 0x101F;
    pub const MAX_CONSTANT_BUFFER_SIZE: AttributeKey = 0x1020;
    pub const MAX_CONSTANT_ARGS: AttributeKey = 0x1021;
    pub const LOCAL_MEM_TYPE: AttributeKey = 0x1022;
    pub const LOCAL_MEM_SIZE: AttributeKey = 0x1023;
    pub const ERROR_CORRECTION_SUPPORT: AttributeKey = 0x1024;
    pub const PROFILING_TIMER_RESOLUTION: AttributeKey = 0x1025;
    pub const ENDIAN_LITTLE: AttributeKey = 0x1026;
    pub const AVAILABLE: AttributeKey = 0x1027;
    pub const COMPILER_AVAILABLE: AttributeKey = 0x1028;
    pub const EXECUTION_CAPABILITIES: AttributeKey = 0x1029;
    pub const QUEUE_PROPERTIES: AttributeKey = 0x102A;
    pub const NAME: AttributeKey = 0x102B;
    pub const VENDOR: AttributeKey = 0x102C;
    pub const DRIVER_VERSION: AttributeKey = 0x102D;
    pub const PROFILE: AttributeKey = 0x102E;
    pub const VERSION: AttributeKey = 0x102F;
    pub const EXTENSIONS: AttributeKey = 0x1030;
    pub const PLATFORM: AttributeKey = 0x1031;
    pub const DOUBLE_FP_CONFIG: AttributeKey = 0x1032;
    pub const HALF_FP_CONFIG: AttributeKey = 0x1033;
    pub const PREFERRED_VECTOR_WIDTH_HALF: AttributeKey = 0x1034;
    pub const HOST_UNIFIED_MEMORY: AttributeKey = 0x1035;
    pub const OPENCL_C_VERSION: AttributeKey = 0x103D;
}

/// `cl_context_info`
pub mod context {
    use super::AttributeKey;

    pub const REFERENCE_COUNT: AttributeKey = 0x1080;
    pub const DEVICES: AttributeKey = 0x1081;
    pub const PROPERTIES: AttributeKey = 0x1082;
    pub const NUM_DEVICES: AttributeKey = 0x1083;
}

/// `cl_command_queue_info`
pub mod queue {
    use super::AttributeKey;

    pub const CONTEXT: AttributeKey = 0x1090;
    pub const DEVICE: AttributeKey = 0x1091;
    pub const REFERENCE_COUNT: AttributeKey = 0x1092;
    pub const PROPERTIES: AttributeKey = 0x1093;
}

/// `cl_mem_info`
pub mod mem {
    use super::AttributeKey;

    pub const TYPE: AttributeKey = 0x1100;
    pub const FLAGS: AttributeKey = 0x1101;
    pub const SIZE: AttributeKey = 0x1102;
    pub const HOST_PTR: AttributeKey = 0x1103;
    pub const MAP_COUNT: AttributeKey = 0x1104;
    pub const REFERENCE_COUNT: AttributeKey = 0x1105;
    pub const CONTEXT: AttributeKey = 0x1106;
    pub const ASSOCIATED_MEMOBJECT: AttributeKey = 0x1107;
    pub const OFFSET: AttributeKey = 0x1108;
}

/// `cl_image_info`
pub mod image {
    use super::AttributeKey;

    pub const FORMAT: AttributeKey = 0x1110;
    pub const ELEMENT_SIZE: AttributeKey = 0x1111;
    pub const ROW_PITCH: AttributeKey = 0x1112;
    pub const SLICE_PITCH: AttributeKey = 0x1113;
    pub const WIDTH: AttributeKey = 0x1114;
    pub const HEIGHT: AttributeKey = 0x1115;
    pub const DEPTH: AttributeKey = 0x1116;
}

/// `cl_sampler_info`
pub mod sampler {
    use super::AttributeKey;

    pub const REFERENCE_COUNT: AttributeKey = 0x1150;
    pub const CONTEXT: AttributeKey = 0x1151;
    pub const NORMALIZED_COORDS: AttributeKey = 0x1152;
    pub const ADDRESSING_MODE: AttributeKey = 0x1153;
    pub const FILTER_MODE: AttributeKey = 0x1154;
}

/// `cl_program_info`
pub mod program {
    use super::AttributeKey;

    pub const REFERENCE_COUNT: AttributeKey = 0x1160;
    pub const CONTEXT: AttributeKey = 0x1161;
    pub const NUM_DEVICES: AttributeKey = 0x1162;
    pub const DEVICES: AttributeKey = 0x1163;
    pub const SOURCE: AttributeKey = 0x1164;
    pub const BINARY_SIZES: AttributeKey = 0x1165;
    /// Filled through a caller-supplied array of destination pointers, one per
    /// device, each pre-sized from [`BINARY_SIZES`].
    pub const BINARIES: AttributeKey = 0x1166;
}

/// `cl_program_build_info`
pub mod build {
    use super::AttributeKey;

    pub const STATUS: AttributeKey = 0x1181;
    pub const OPTIONS: AttributeKey = 0x1182;
    pub const LOG: AttributeKey = 0x1183;
}

/// `cl_kernel_info`
pub mod kernel {
    use super::AttributeKey;

    pub const FUNCTION_NAME: AttributeKey = 0x1190;
    pub const NUM_ARGS: AttributeKey = 0x1191;
    pub const REFERENCE_COUNT: AttributeKey = 0x1192;
    pub const CONTEXT: AttributeKey = 0x1193;
    pub const PROGRAM: AttributeKey = 0x1194;
}

/// `cl_kernel_work_group_info`
pub mod work_group {
    use super::AttributeKey;

    pub const WORK_GROUP_SIZE: AttributeKey = 0x11B0;
    pub const COMPILE_WORK_GROUP_SIZE: AttributeKey = 0x11B1;
    pub const LOCAL_MEM_SIZE: AttributeKey = 0x11B2;
    pub const PREFERRED_WORK_GROUP_SIZE_MULTIPLE: AttributeKey = 0x11B3;
    pub const PRIVATE_MEM_SIZE: AttributeKey = 0x11B4;
}

/// `cl_event_info`
pub mod event {
    use super::AttributeKey;

    pub const COMMAND_QUEUE: AttributeKey = 0x11D0;
    pub const COMMAND_TYPE: AttributeKey = 0x11D1;
    pub const REFERENCE_COUNT: AttributeKey = 0x11D2;
    pub const COMMAND_EXECUTION_STATUS: AttributeKey = 0x11D3;
    pub const CONTEXT: AttributeKey = 0x11D4;
}
