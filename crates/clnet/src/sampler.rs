//! Image samplers.

use clnet_sys::info::sampler as key;
use clnet_sys::{AddressingMode, FilterMode, InfoTarget, NativeHandle, Status};

use crate::context::Context;
use crate::error::{ClError, Result};
use crate::handle::OwnedHandle;
use crate::property::{InfoContainer, PropertyReader};

#[derive(Debug)]
pub struct Sampler {
    owned: OwnedHandle,
    context: Context,
}

impl Sampler {
    pub(crate) fn new(owned: OwnedHandle, context: Context) -> Self {
        Self { owned, context }
    }

    fn info(&self) -> Result<InfoContainer<'_>> {
        self.owned.container(InfoTarget::Sampler)
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

    pub fn normalized_coords(&self) -> Result<bool> {
        self.info()?.read_bool(key::NORMALIZED_COORDS)
    }

    pub fn addressing_mode(&self) -> Result<AddressingMode> {
        let raw: u32 = self.info()?.read_scalar(key::ADDRESSING_MODE)?;
        AddressingMode::from_raw(raw).ok_or_else(|| unknown_enumerant(key::ADDRESSING_MODE))
    }

    pub fn filter_mode(&self) -> Result<FilterMode> {
        let raw: u32 = self.info()?.read_scalar(key::FILTER_MODE)?;
        FilterMode::from_raw(raw).ok_or_else(|| unknown_enumerant(key::FILTER_MODE))
    }
}

fn unknown_enumerant(attribute: u32) -> ClError {
    ClError::attribute("clGetSamplerInfo", attribute, Status::INVALID_VALUE)
}
