//! Opaque native handles and the kinds of creator-owned resources.

use std::ffi::c_void;
use std::fmt;

/// An opaque, process-scoped identifier for a native OpenCL object.
///
/// The value is a capability token, not an owner: copying a `NativeHandle`
/// never touches the native reference count. Ownership lives in the
/// wrappers built on top of it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct NativeHandle(usize);

impl NativeHandle {
    /// The null handle. Never a valid object.
    pub const NULL: Self = Self(0);

    /// Wrap a raw pointer returned by the native layer.
    pub fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    /// Build a handle from its integer value.
    pub const fn from_usize(value: usize) -> Self {
        Self(value)
    }

    /// The raw pointer form expected by native entry points.
    pub fn as_raw(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    /// The integer form, e.g. for packed handle arrays.
    pub const fn as_usize(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle({:#x})", self.0)
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Resource kinds whose handles are created, and therefore released, by
/// their owner.
///
/// Platforms and devices are enumerated rather than created and have no
/// entry here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Context,
    CommandQueue,
    MemObject,
    Program,
    Kernel,
    Sampler,
    Event,
}

impl ResourceKind {
    /// Every owned kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Context,
        Self::CommandQueue,
        Self::MemObject,
        Self::Program,
        Self::Kernel,
        Self::Sampler,
        Self::Event,
    ];

    /// Name of the native release entry point for this kind.
    pub const fn release_fn(self) -> &'static str {
        match self {
            Self::Context => "clReleaseContext",
            Self::CommandQueue => "clReleaseCommandQueue",
            Self::MemObject => "clReleaseMemObject",
            Self::Program => "clReleaseProgram",
            Self::Kernel => "clReleaseKernel",
            Self::Sampler => "clReleaseSampler",
            Self::Event => "clReleaseEvent",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Context => "context",
            Self::CommandQueue => "command queue",
            Self::MemObject => "memory object",
            Self::Program => "program",
            Self::Kernel => "kernel",
            Self::Sampler => "sampler",
            Self::Event => "event",
        };
        f.write_str(name)
    }
}
