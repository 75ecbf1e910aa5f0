//! Native enumerants and plain-data structs shared across the boundary.

use std::fmt;
use std::ops::BitOr;

use bytemuck::{Pod, Zeroable};

/// The native boolean "true" sentinel (`CL_TRUE`).
pub const CL_TRUE: u32 = 1;
/// The native boolean "false" sentinel (`CL_FALSE`).
pub const CL_FALSE: u32 = 0;

/// `cl_device_type` bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct DeviceType(pub u64);

impl DeviceType {
    pub const DEFAULT: Self = Self(1 << 0);
    pub const CPU: Self = Self(1 << 1);
    pub const GPU: Self = Self(1 << 2);
    pub const ACCELERATOR: Self = Self(1 << 3);
    pub const ALL: Self = Self(0xFFFF_FFFF);

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ALL => return f.write_str("ALL"),
            Self(0) => return f.write_str("NONE"),
            _ => {}
        }
        let names = [
            (Self::DEFAULT, "DEFAULT"),
            (Self::CPU, "CPU"),
            (Self::GPU, "GPU"),
            (Self::ACCELERATOR, "ACCELERATOR"),
        ];
        let parts: Vec<&str> =
            names.iter().filter(|(bit, _)| self.contains(*bit)).map(|(_, name)| *name).collect();
        if parts.is_empty() {
            write!(f, "{:#x}", self.0)
        } else {
            f.write_str(&parts.join("|"))
        }
    }
}

/// `cl_mem_flags` bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct MemFlags(pub u64);

impl MemFlags {
    pub const READ_WRITE: Self = Self(1 << 0);
    pub const WRITE_ONLY: Self = Self(1 << 1);
    pub const READ_ONLY: Self = Self(1 << 2);
    pub const USE_HOST_PTR: Self = Self(1 << 3);
    pub const ALLOC_HOST_PTR: Self = Self(1 << 4);
    pub const COPY_HOST_PTR: Self = Self(1 << 5);

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MemFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// `cl_mem_object_type`
pub mod mem_object_type {
    pub const BUFFER: u32 = 0x10F0;
    pub const IMAGE2D: u32 = 0x10F1;
    pub const IMAGE3D: u32 = 0x10F2;
}

/// `cl_build_status`
pub mod build_status {
    pub const SUCCESS: i32 = 0;
    pub const NONE: i32 = -1;
    pub const ERROR: i32 = -2;
    pub const IN_PROGRESS: i32 = -3;
}

/// `cl_command_queue_properties`
pub mod queue_properties {
    pub const OUT_OF_ORDER_EXEC_MODE_ENABLE: u64 = 1 << 0;
    pub const PROFILING_ENABLE: u64 = 1 << 1;
}

/// Command execution status of an event.
pub mod execution_status {
    pub const COMPLETE: i32 = 0x0;
    pub const RUNNING: i32 = 0x1;
    pub const SUBMITTED: i32 = 0x2;
    pub const QUEUED: i32 = 0x3;
}

/// `cl_command_type` of user events.
pub const COMMAND_USER: u32 = 0x1204;

/// `cl_channel_order`
pub mod channel_order {
    pub const R: u32 = 0x10B0;
    pub const A: u32 = 0x10B1;
    pub const RG: u32 = 0x10B2;
    pub const RA: u32 = 0x10B3;
    pub const RGB: u32 = 0x10B4;
    pub const RGBA: u32 = 0x10B5;
    pub const BGRA: u32 = 0x10B6;
    pub const ARGB: u32 = 0x10B7;
    pub const INTENSITY: u32 = 0x10B8;
    pub const LUMINANCE: u32 = 0x10B9;
}

/// `cl_channel_type`
pub mod channel_type {
    pub const SNORM_INT8: u32 = 0x10D0;
    pub const SNORM_INT16: u32 = 0x10D1;
    pub const UNORM_INT8: u32 = 0x10D2;
    pub const UNORM_INT16: u32 = 0x10D3;
    pub const SIGNED_INT8: u32 = 0x10D7;
    pub const SIGNED_INT16: u32 = 0x10D8;
    pub const SIGNED_INT32: u32 = 0x10D9;
    pub const UNSIGNED_INT8: u32 = 0x10DA;
    pub const UNSIGNED_INT16: u32 = 0x10DB;
    pub const UNSIGNED_INT32: u32 = 0x10DC;
    pub const HALF_FLOAT: u32 = 0x10DD;
    pub const FLOAT: u32 = 0x10DE;
}

/// `cl_image_format`, laid out exactly as the native struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(C)]
pub struct ImageFormat {
    pub channel_order: u32,
    pub channel_type: u32,
}

impl ImageFormat {
    pub const fn new(channel_order: u32, channel_type: u32) -> Self {
        Self { channel_order, channel_type }
    }
}

/// Shape of an image to create. Pitches of zero let the native layer pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    /// One of [`mem_object_type::IMAGE2D`] or [`mem_object_type::IMAGE3D`].
    pub image_type: u32,
    pub width: usize,
    pub height: usize,
    /// Ignored for 2-D images.
    pub depth: usize,
    pub row_pitch: usize,
    /// Ignored for 2-D images.
    pub slice_pitch: usize,
}

impl ImageDesc {
    pub const fn image_2d(width: usize, height: usize, row_pitch: usize) -> Self {
        Self {
            image_type: mem_object_type::IMAGE2D,
            width,
            height,
            depth: 1,
            row_pitch,
            slice_pitch: 0,
        }
    }

    pub const fn image_3d(
        width: usize,
        height: usize,
        depth: usize,
        row_pitch: usize,
        slice_pitch: usize,
    ) -> Self {
        Self { image_type: mem_object_type::IMAGE3D, width, height, depth, row_pitch, slice_pitch }
    }
}

/// `cl_addressing_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    None,
    ClampToEdge,
    Clamp,
    Repeat,
    MirroredRepeat,
}

impl AddressingMode {
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::None => 0x1130,
            Self::ClampToEdge => 0x1131,
            Self::Clamp => 0x1132,
            Self::Repeat => 0x1133,
            Self::MirroredRepeat => 0x1134,
        }
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x1130 => Some(Self::None),
            0x1131 => Some(Self::ClampToEdge),
            0x1132 => Some(Self::Clamp),
            0x1133 => Some(Self::Repeat),
            0x1134 => Some(Self::MirroredRepeat),
            _ => None,
        }
    }
}

/// `cl_filter_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

impl FilterMode {
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::Nearest => 0x1140,
            Self::Linear => 0x1141,
        }
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x1140 => Some(Self::Nearest),
            0x1141 => Some(Self::Linear),
            _ => None,
        }
    }
}
