//! Managed OpenCL bindings.
//!
//! Every native object is reached through a [`clnet_sys::ClApi`]
//! implementation and wrapped in a type that owns its reference:
//!
//! - attribute getters read through the two-phase size-then-fill protocol of
//!   [`PropertyContainer`] and [`PropertyReader`];
//! - creator-owned resources (contexts, queues, memory objects, samplers,
//!   programs, kernels, events) release exactly once, explicitly or on drop;
//! - [`Program::build`] reports failures with the status and log of every
//!   device attached to the program.
//!
//! ```no_run
//! # #[cfg(feature = "opencl")]
//! # fn main() -> clnet::Result<()> {
//! use std::sync::Arc;
//!
//! use clnet::{ClnetConfig, Context};
//! use clnet_sys::OpenClRuntime;
//!
//! let ctx = Context::from_config(Arc::new(OpenClRuntime::new()), &ClnetConfig::default())?;
//! let program = ctx.create_program_with_source("kernel void k(global int* x) { x[0] = 1; }")?;
//! program.build(None, None, None)?;
//! let kernel = program.create_kernel("k")?;
//! assert_eq!(kernel.num_args()?, 1);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "opencl"))]
//! # fn main() {}
//! ```

pub mod capability;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod event;
pub mod handle;
pub mod kernel;
pub mod memory;
pub mod platform;
pub mod program;
pub mod property;
pub mod queue;
pub mod sampler;

pub use capability::{ApiVersion, CapabilitySet};
pub use config::{ClnetConfig, ConfigError, DeviceClass};
pub use context::Context;
pub use device::{Device, DeviceSummary};
pub use error::{BuildFailure, BuildResult, ClError, Result};
pub use event::{Event, ExecutionStatus};
pub use handle::OwnedHandle;
pub use kernel::Kernel;
pub use memory::{Image, Mem, MemContainer, MemObject};
pub use platform::Platform;
pub use program::{BuildState, BuildStatus, Program};
pub use property::{
    FallbackContainer, InfoContainer, PinnedBufferArray, PropertyContainer, PropertyReader,
};
pub use queue::CommandQueue;
pub use sampler::Sampler;
