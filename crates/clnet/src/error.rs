//! Error taxonomy for the managed layer.

use std::fmt;

use clnet_sys::{AttributeKey, NativeHandle, ResourceKind, Status};

use crate::program::BuildStatus;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClError>;

/// Errors raised by managed OpenCL operations.
#[derive(Debug, thiserror::Error)]
pub enum ClError {
    /// A native entry point returned a non-success status.
    #[error("{operation}{} failed: {status}", key_suffix(.key))]
    NativeCallFailed { operation: &'static str, key: Option<AttributeKey>, status: Status },

    /// A release-by-kind call reported failure. Signals a reference count
    /// inconsistency on the native side or in the caller's bookkeeping.
    #[error("releasing {kind} failed: {status}")]
    ReleaseFailed { kind: ResourceKind, status: Status },

    /// A program build failed; carries diagnostics for every attached device.
    #[error(transparent)]
    BuildFailed(#[from] BuildFailure),

    /// The requested capability is absent (no platforms, no matching devices).
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Native access attempted through a wrapper that was already released.
    #[error("{kind} used after release")]
    UseAfterRelease { kind: ResourceKind },

    /// Caller input rejected before reaching the native layer.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Reading program source from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn key_suffix(key: &Option<AttributeKey>) -> String {
    key.map(|k| format!(" [key {k:#06x}]")).unwrap_or_default()
}

impl ClError {
    pub(crate) fn native(operation: &'static str, status: Status) -> Self {
        Self::NativeCallFailed { operation, key: None, status }
    }

    pub(crate) fn attribute(operation: &'static str, key: AttributeKey, status: Status) -> Self {
        Self::NativeCallFailed { operation, key: Some(key), status }
    }

    /// The native status carried by this error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::NativeCallFailed { status, .. } | Self::ReleaseFailed { status, .. } => {
                Some(*status)
            }
            Self::BuildFailed(failure) => Some(failure.status),
            _ => None,
        }
    }
}

/// Turn a native status into a `Result`.
pub(crate) fn check(operation: &'static str, status: Status) -> Result<()> {
    status.ok().map_err(|status| ClError::native(operation, status))
}

/// Diagnostics of one device after a build attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub device: NativeHandle,
    pub status: BuildStatus,
    pub log: String,
}

/// A failed build: the status `clBuildProgram` returned plus one
/// [`BuildResult`] per device attached to the program, in the program's
/// device-list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub status: Status,
    pub results: Vec<BuildResult>,
}

impl BuildFailure {
    /// Results of the devices whose build did not succeed.
    pub fn failed_devices(&self) -> impl Iterator<Item = &BuildResult> {
        self.results.iter().filter(|r| r.status != BuildStatus::Success)
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program build failed: {} ({} device(s))", self.status, self.results.len())?;
        for result in &self.results {
            write!(f, "\n  device {}: {}", result.device, result.status)?;
            for line in result.log.lines() {
                write!(f, "\n    {line}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for BuildFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_failure_names_key_and_status() {
        let err = ClError::attribute("clGetDeviceInfo", 0x102B, Status::INVALID_DEVICE);
        insta::assert_snapshot!(err.to_string(), @"clGetDeviceInfo [key 0x102b] failed: CL_INVALID_DEVICE (-33)");
        assert_eq!(err.status(), Some(Status::INVALID_DEVICE));
    }

    #[test]
    fn native_failure_without_key() {
        let err = ClError::native("clCreateKernel", Status::INVALID_PROGRAM_EXECUTABLE);
        insta::assert_snapshot!(err.to_string(), @"clCreateKernel failed: CL_INVALID_PROGRAM_EXECUTABLE (-45)");
    }

    #[test]
    fn build_failure_lists_every_device() {
        let failure = BuildFailure {
            status: Status::BUILD_PROGRAM_FAILURE,
            results: vec![
                BuildResult {
                    device: NativeHandle::from_usize(0x1010),
                    status: BuildStatus::Error,
                    log: "<source>:3:1: error: expected ';'\n1 error generated.".into(),
                },
                BuildResult {
                    device: NativeHandle::from_usize(0x1020),
                    status: BuildStatus::Success,
                    log: String::new(),
                },
            ],
        };
        insta::assert_snapshot!(ClError::from(failure.clone()).to_string(), @r"
        program build failed: CL_BUILD_PROGRAM_FAILURE (-11) (2 device(s))
          device 0x1010: error
            <source>:3:1: error: expected ';'
            1 error generated.
          device 0x1020: success
        ");
        assert_eq!(failure.failed_devices().count(), 1);
    }

    #[test]
    fn check_maps_non_success() {
        assert!(check("clBuildProgram", Status::SUCCESS).is_ok());
        let err = check("clBuildProgram", Status::OUT_OF_HOST_MEMORY).unwrap_err();
        assert!(matches!(
            err,
            ClError::NativeCallFailed { operation: "clBuildProgram", key: None, .. }
        ));
    }
}
