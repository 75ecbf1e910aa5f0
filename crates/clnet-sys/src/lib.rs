//! Native boundary for the clnet managed OpenCL layer.
//!
//! This crate owns everything that touches raw OpenCL: handle values, status
//! codes, attribute keys and the [`ClApi`] trait. The real backend,
//! [`OpenClRuntime`], is only compiled with the `opencl` feature so that the
//! rest of the workspace builds and tests on hosts without an ICD loader.

pub mod api;
pub mod handle;
pub mod info;
#[cfg(feature = "opencl")]
pub mod runtime;
pub mod status;
pub mod types;

pub use api::{BuildNotify, ClApi};
pub use handle::{NativeHandle, ResourceKind};
pub use info::{AttributeKey, InfoTarget};
#[cfg(feature = "opencl")]
pub use runtime::OpenClRuntime;
pub use status::Status;
pub use types::{
    AddressingMode, CL_FALSE, CL_TRUE, DeviceType, FilterMode, ImageDesc, ImageFormat, MemFlags,
};
