//! User events.

use clnet_sys::info::event as key;
use clnet_sys::types::execution_status;
use clnet_sys::{InfoTarget, NativeHandle};

use crate::context::Context;
use crate::error::{Result, check};
use crate::handle::OwnedHandle;
use crate::property::{InfoContainer, PropertyReader};

/// Execution status of the command behind an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Queued,
    Submitted,
    Running,
    Complete,
    /// A negative native error code; the command terminated abnormally.
    Error(i32),
}

impl ExecutionStatus {
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            execution_status::COMPLETE => Self::Complete,
            execution_status::RUNNING => Self::Running,
            execution_status::SUBMITTED => Self::Submitted,
            execution_status::QUEUED => Self::Queued,
            code => Self::Error(code),
        }
    }

    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Complete => execution_status::COMPLETE,
            Self::Running => execution_status::RUNNING,
            Self::Submitted => execution_status::SUBMITTED,
            Self::Queued => execution_status::QUEUED,
            Self::Error(code) => code,
        }
    }
}

#[derive(Debug)]
pub struct Event {
    owned: OwnedHandle,
    context: Context,
}

impl Event {
    pub(crate) fn new(owned: OwnedHandle, context: Context) -> Self {
        Self { owned, context }
    }

    fn info(&self) -> Result<InfoContainer<'_>> {
        self.owned.container(InfoTarget::Event)
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

    /// `cl_command_type`; `CL_COMMAND_USER` for user events.
    pub fn command_type(&self) -> Result<u32> {
        self.info()?.read_scalar(key::COMMAND_TYPE)
    }

    pub fn execution_status(&self) -> Result<ExecutionStatus> {
        Ok(ExecutionStatus::from_raw(self.info()?.read_scalar(key::COMMAND_EXECUTION_STATUS)?))
    }

    pub fn reference_count(&self) -> Result<u32> {
        self.info()?.read_scalar(key::REFERENCE_COUNT)
    }

    pub fn context_handle(&self) -> Result<NativeHandle> {
        Ok(NativeHandle::from_usize(self.info()?.read_scalar(key::CONTEXT)?))
    }

    /// Complete the user event, or fail it with a negative status. Can be
    /// set once.
    pub fn set_status(&self, status: ExecutionStatus) -> Result<()> {
        let handle = self.handle()?;
        let native = self.owned.api().set_user_event_status(handle, status.as_raw());
        check("clSetUserEventStatus", native)
    }
}
