//! Command queues. Enqueueing work is outside this crate; queues exist so
//! their attributes and lifetime can be managed like any other resource.

use clnet_sys::info::queue as key;
use clnet_sys::{InfoTarget, NativeHandle};

use crate::context::Context;
use crate::device::Device;
use crate::error::{ClError, Result};
use crate::handle::OwnedHandle;
use crate::property::{InfoContainer, PropertyReader};

#[derive(Debug)]
pub struct CommandQueue {
    owned: OwnedHandle,
    context: Context,
}

impl CommandQueue {
    pub(crate) fn new(owned: OwnedHandle, context: Context) -> Self {
        Self { owned, context }
    }

    fn info(&self) -> Result<InfoContainer<'_>> {
        self.owned.container(InfoTarget::CommandQueue)
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

    /// Native handle of the owning context as reported by the driver.
    pub fn context_handle(&self) -> Result<NativeHandle> {
        Ok(NativeHandle::from_usize(self.info()?.read_scalar(key::CONTEXT)?))
    }

    /// The device the queue feeds.
    pub fn device(&self) -> Result<Device> {
        let raw = NativeHandle::from_usize(self.info()?.read_scalar(key::DEVICE)?);
        self.context.devices().iter().find(|d| d.handle() == raw).cloned().ok_or_else(|| {
            ClError::ResourceUnavailable(format!("queue device {raw} is not in its context"))
        })
    }

    pub fn reference_count(&self) -> Result<u32> {
        self.info()?.read_scalar(key::REFERENCE_COUNT)
    }

    /// `cl_command_queue_properties` bitfield.
    pub fn properties(&self) -> Result<u64> {
        self.info()?.read_scalar(key::PROPERTIES)
    }
}
