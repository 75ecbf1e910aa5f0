//! Programs: creation results, builds with per-device diagnostics, binaries
//! and kernel factories.

use std::ffi::CString;
use std::fmt;

use clnet_sys::info::{build as build_key, program as key};
use clnet_sys::types::build_status;
use clnet_sys::{BuildNotify, InfoTarget, NativeHandle, ResourceKind, Status};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ClnetConfig;
use crate::context::Context;
use crate::device::Device;
use crate::error::{BuildFailure, BuildResult, ClError, Result};
use crate::handle::OwnedHandle;
use crate::kernel::Kernel;
use crate::property::{InfoContainer, PropertyReader};

/// Per-device build status as reported by `CL_PROGRAM_BUILD_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStatus {
    Success,
    /// No build was attempted for the device.
    None,
    Error,
    InProgress,
    Unknown(i32),
}

impl BuildStatus {
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            build_status::SUCCESS => Self::Success,
            build_status::NONE => Self::None,
            build_status::ERROR => Self::Error,
            build_status::IN_PROGRESS => Self::InProgress,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::None => f.write_str("none"),
            Self::Error => f.write_str("error"),
            Self::InProgress => f.write_str("in progress"),
            Self::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}

/// Where the most recent build attempt stands.
///
/// `Built` and `Failed` end one attempt; a later [`Program::build`] starts a
/// new one and its diagnostics replace the previous ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Unbuilt,
    Building,
    Built,
    Failed,
}

#[derive(Debug)]
struct Attempt {
    state: BuildState,
    targets: Vec<NativeHandle>,
}

/// An OpenCL program object.
#[derive(Debug)]
pub struct Program {
    owned: OwnedHandle,
    context: Context,
    attempt: Mutex<Attempt>,
}

impl Program {
    pub(crate) fn new(owned: OwnedHandle, context: Context) -> Self {
        Self {
            owned,
            context,
            attempt: Mutex::new(Attempt { state: BuildState::Unbuilt, targets: Vec::new() }),
        }
    }

    fn info(&self) -> Result<InfoContainer<'_>> {
        self.owned.container(InfoTarget::Program)
    }

    fn build_info(&self, device: NativeHandle) -> Result<InfoContainer<'_>> {
        self.owned.container(|program| InfoTarget::ProgramBuild { program, device })
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.owned.handle()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn release(&self) -> Result<()> {
        self.owned.release()
    }

    pub fn is_released(&self) -> bool {
        self.owned.is_released()
    }

    pub fn reference_count(&self) -> Result<u32> {
        self.info()?.read_scalar(key::REFERENCE_COUNT)
    }

    pub fn context_handle(&self) -> Result<NativeHandle> {
        Ok(NativeHandle::from_usize(self.info()?.read_scalar(key::CONTEXT)?))
    }

    pub fn num_devices(&self) -> Result<u32> {
        self.info()?.read_scalar(key::NUM_DEVICES)
    }

    /// Handles of the devices attached to the program, in native order.
    pub fn device_handles(&self) -> Result<Vec<NativeHandle>> {
        self.info()?.read_handles(key::DEVICES)
    }

    /// Devices attached to the program, in native order.
    pub fn devices(&self) -> Result<Vec<Device>> {
        self.device_handles()?
            .into_iter()
            .map(|handle| match self.context.devices().iter().find(|d| d.handle() == handle) {
                Some(device) => Ok(device.clone()),
                None => Device::wrap(self.context.api().clone(), handle),
            })
            .collect()
    }

    /// Concatenated source text; empty for programs created from binaries.
    pub fn source(&self) -> Result<String> {
        self.info()?.read_string(key::SOURCE)
    }

    pub fn binary_sizes(&self) -> Result<Vec<usize>> {
        self.info()?.read_usize_array(key::BINARY_SIZES)
    }

    /// Compiled binaries, one per attached device in [`Program::devices`]
    /// order. Devices without a binary yield an empty vector.
    pub fn binaries(&self) -> Result<Vec<Vec<u8>>> {
        let info = self.info()?;
        let sizes = info.read_usize_array(key::BINARY_SIZES)?;
        let mut buffers: Vec<Vec<u8>> = sizes.iter().map(|&len| vec![0u8; len]).collect();
        info.read_into_buffers(key::BINARIES, &mut buffers)?;
        Ok(buffers)
    }

    pub fn build_status(&self, device: &Device) -> Result<BuildStatus> {
        self.status_of(device.handle())
    }

    /// Compiler log for `device`. An empty native log reads as `""`.
    pub fn build_log(&self, device: &Device) -> Result<String> {
        self.build_info(device.handle())?.read_string(build_key::LOG)
    }

    /// Options of the last build attempted for `device`.
    pub fn build_options(&self, device: &Device) -> Result<String> {
        self.build_info(device.handle())?.read_string(build_key::OPTIONS)
    }

    fn status_of(&self, device: NativeHandle) -> Result<BuildStatus> {
        Ok(BuildStatus::from_raw(self.build_info(device)?.read_scalar(build_key::STATUS)?))
    }

    /// Compile and link for `devices`, or for every device of the owning
    /// context when `None`.
    ///
    /// `options` is passed through literally: `Some("")` and `None` are
    /// different requests. With `notify` set the native layer may return
    /// before the build finishes; the program then reports
    /// [`BuildState::Building`] until every targeted device leaves
    /// `CL_BUILD_IN_PROGRESS`.
    ///
    /// Any non-success status returns [`ClError::BuildFailed`] with the
    /// status and log of every device attached to the program, not only the
    /// targeted ones. This includes rejections such as
    /// `CL_INVALID_BUILD_OPTIONS` that never reach the compiler.
    pub fn build(
        &self,
        devices: Option<&[Device]>,
        options: Option<&str>,
        notify: Option<BuildNotify>,
    ) -> Result<()> {
        let program = self.handle()?;
        let targets: Vec<NativeHandle> =
            devices.unwrap_or(self.context.devices()).iter().map(Device::handle).collect();
        let options = options
            .map(|o| {
                CString::new(o).map_err(|_| {
                    ClError::InvalidArgument("build options contain an interior NUL".into())
                })
            })
            .transpose()?;
        let asynchronous = notify.is_some();

        *self.attempt.lock() = Attempt { state: BuildState::Building, targets: targets.clone() };
        debug!(%program, devices = targets.len(), options = ?options, "building program");
        let status =
            self.context.api().build_program(program, &targets, options.as_deref(), notify);

        if status.is_success() {
            if !asynchronous {
                self.attempt.lock().state = BuildState::Built;
            }
            info!(%program, devices = targets.len(), "program build submitted");
            return Ok(());
        }

        // Argument rejections (bad options, attached kernels) still report
        // every device: their statuses show what the previous attempt left.
        self.attempt.lock().state = BuildState::Failed;
        let failure = BuildFailure { status, results: self.diagnostics(&targets) };
        Err(failure.into())
    }

    /// [`Program::build`] over the context's devices with the configured
    /// options, logging every device's diagnostics when the build fails and
    /// `log_build_failures` is set.
    pub fn build_configured(&self, config: &ClnetConfig) -> Result<()> {
        let result = self.build(None, config.build_options.as_deref(), None);
        if let Err(ClError::BuildFailed(failure)) = &result {
            if config.log_build_failures {
                for r in &failure.results {
                    warn!(device = %r.device, status = %r.status, log = %r.log, "build diagnostics");
                }
            }
        }
        result
    }

    /// Status and log for every attached device, in the program's device
    /// order. Per-device read failures are folded into the entry instead of
    /// aborting the collection.
    fn diagnostics(&self, targets: &[NativeHandle]) -> Vec<BuildResult> {
        let devices = self.device_handles().unwrap_or_else(|err| {
            warn!(%err, "reading program devices failed; reporting targeted devices only");
            targets.to_vec()
        });
        devices
            .into_iter()
            .map(|device| {
                let status = self.status_of(device).unwrap_or_else(|err| {
                    warn!(%device, %err, "reading build status failed");
                    BuildStatus::Unknown(err.status().map_or(0, Status::code))
                });
                let log = self
                    .build_info(device)
                    .and_then(|c| c.read_string(build_key::LOG))
                    .unwrap_or_else(|err| {
                        warn!(%device, %err, "reading build log failed");
                        format!("<build log unavailable: {err}>")
                    });
                BuildResult { device, status, log }
            })
            .collect()
    }

    /// State of the latest build attempt. While `Building`, the per-device
    /// statuses of the targeted devices are consulted.
    pub fn state(&self) -> Result<BuildState> {
        let mut attempt = self.attempt.lock();
        if attempt.state != BuildState::Building {
            return Ok(attempt.state);
        }
        let statuses = attempt
            .targets
            .iter()
            .map(|&d| self.status_of(d))
            .collect::<Result<Vec<_>>>()?;
        if statuses.contains(&BuildStatus::InProgress) {
            return Ok(BuildState::Building);
        }
        attempt.state = if statuses.iter().all(|s| *s == BuildStatus::Success) {
            BuildState::Built
        } else {
            BuildState::Failed
        };
        Ok(attempt.state)
    }

    /// Kernel for entry point `name`. The program must be built for at least
    /// one device; otherwise the native layer refuses with
    /// `CL_INVALID_PROGRAM_EXECUTABLE`.
    pub fn create_kernel(&self, name: &str) -> Result<Kernel> {
        let c_name = CString::new(name)
            .map_err(|_| ClError::InvalidArgument(format!("kernel name {name:?} contains NUL")))?;
        let raw = self
            .context
            .api()
            .create_kernel(self.handle()?, &c_name)
            .map_err(|status| ClError::native("clCreateKernel", status))?;
        Ok(Kernel::new(self.context.own(ResourceKind::Kernel, raw), self.context.clone()))
    }

    /// One kernel per entry point in the program.
    pub fn create_kernels(&self) -> Result<Vec<Kernel>> {
        let raws = self
            .context
            .api()
            .create_kernels_in_program(self.handle()?)
            .map_err(|status| ClError::native("clCreateKernelsInProgram", status))?;
        Ok(raws
            .into_iter()
            .map(|raw| Kernel::new(self.context.own(ResourceKind::Kernel, raw), self.context.clone()))
            .collect())
    }
}
