//! Buffers and images.
//!
//! Both are memory objects and answer the same `clGetMemObjectInfo`
//! attributes through [`MemObject`]. Images route every query through
//! `clGetImageInfo` first and fall back to `clGetMemObjectInfo` when the image
//! entry point refuses, since some attributes are only defined for one of
//! the two on certain drivers.

use clnet_sys::info::{image as image_key, mem as key};
use clnet_sys::{AttributeKey, ImageFormat, InfoTarget, MemFlags, NativeHandle};

use crate::context::Context;
use crate::error::Result;
use crate::handle::OwnedHandle;
use crate::property::{FallbackContainer, InfoContainer, PropertyContainer, PropertyReader};

/// Property container of a memory object.
#[derive(Debug, Clone, Copy)]
pub enum MemContainer<'a> {
    Buffer(InfoContainer<'a>),
    Image(FallbackContainer<InfoContainer<'a>, InfoContainer<'a>>),
}

impl PropertyContainer for MemContainer<'_> {
    fn size_of(&self, key: AttributeKey) -> Result<usize> {
        match self {
            Self::Buffer(c) => c.size_of(key),
            Self::Image(c) => c.size_of(key),
        }
    }

    fn fill(&self, key: AttributeKey, buf: &mut [u8]) -> Result<()> {
        match self {
            Self::Buffer(c) => c.fill(key, buf),
            Self::Image(c) => c.fill(key, buf),
        }
    }

    unsafe fn fill_pointers(&self, key: AttributeKey, slots: &mut [*mut u8]) -> Result<()> {
        // SAFETY: forwarded from the caller's contract.
        unsafe {
            match self {
                Self::Buffer(c) => c.fill_pointers(key, slots),
                Self::Image(c) => c.fill_pointers(key, slots),
            }
        }
    }
}

/// Attributes shared by every memory object.
pub trait MemObject {
    fn owned(&self) -> &OwnedHandle;

    fn mem_info(&self) -> Result<MemContainer<'_>>;

    fn handle(&self) -> Result<NativeHandle> {
        self.owned().handle()
    }

    fn release(&self) -> Result<()> {
        self.owned().release()
    }

    fn is_released(&self) -> bool {
        self.owned().is_released()
    }

    /// `cl_mem_object_type`: buffer, 2-D image or 3-D image.
    fn mem_type(&self) -> Result<u32> {
        self.mem_info()?.read_scalar(key::TYPE)
    }

    fn flags(&self) -> Result<MemFlags> {
        Ok(MemFlags(self.mem_info()?.read_scalar(key::FLAGS)?))
    }

    /// Size of the data store in bytes.
    fn size(&self) -> Result<usize> {
        self.mem_info()?.read_scalar(key::SIZE)
    }

    fn host_ptr(&self) -> Result<usize> {
        self.mem_info()?.read_scalar(key::HOST_PTR)
    }

    fn map_count(&self) -> Result<u32> {
        self.mem_info()?.read_scalar(key::MAP_COUNT)
    }

    fn reference_count(&self) -> Result<u32> {
        self.mem_info()?.read_scalar(key::REFERENCE_COUNT)
    }

    fn context_handle(&self) -> Result<NativeHandle> {
        Ok(NativeHandle::from_usize(self.mem_info()?.read_scalar(key::CONTEXT)?))
    }

    /// Parent buffer of a sub-buffer; null otherwise.
    fn associated_memobject(&self) -> Result<NativeHandle> {
        Ok(NativeHandle::from_usize(self.mem_info()?.read_scalar(key::ASSOCIATED_MEMOBJECT)?))
    }

    fn offset(&self) -> Result<usize> {
        self.mem_info()?.read_scalar(key::OFFSET)
    }
}

/// A buffer object.
#[derive(Debug)]
pub struct Mem {
    owned: OwnedHandle,
    context: Context,
}

impl Mem {
    pub(crate) fn new(owned: OwnedHandle, context: Context) -> Self {
        Self { owned, context }
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

    /// Sub-buffer over `size` bytes starting at `origin`. See
    /// [`Context::create_sub_buffer`].
    pub fn create_sub_buffer(&self, flags: MemFlags, origin: usize, size: usize) -> Result<Mem> {
        self.context.create_sub_buffer(self, flags, origin, size)
    }
}

impl MemObject for Mem {
    fn owned(&self) -> &OwnedHandle {
        &self.owned
    }

    fn mem_info(&self) -> Result<MemContainer<'_>> {
        Ok(MemContainer::Buffer(self.owned.container(InfoTarget::MemObject)?))
    }
}

/// A 2-D or 3-D image object.
#[derive(Debug)]
pub struct Image {
    owned: OwnedHandle,
    context: Context,
}

impl Image {
    pub(crate) fn new(owned: OwnedHandle, context: Context) -> Self {
        Self { owned, context }
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

    fn image_info(&self) -> Result<MemContainer<'_>> {
        let image = self.owned.container(InfoTarget::Image)?;
        let mem = self.owned.container(InfoTarget::MemObject)?;
        Ok(MemContainer::Image(FallbackContainer::new(image, mem)))
    }

    pub fn format(&self) -> Result<ImageFormat> {
        self.image_info()?.read_scalar(image_key::FORMAT)
    }

    /// Bytes per pixel.
    pub fn element_size(&self) -> Result<usize> {
        self.image_info()?.read_scalar(image_key::ELEMENT_SIZE)
    }

    pub fn row_pitch(&self) -> Result<usize> {
        self.image_info()?.read_scalar(image_key::ROW_PITCH)
    }

    /// Zero for 2-D images.
    pub fn slice_pitch(&self) -> Result<usize> {
        self.image_info()?.read_scalar(image_key::SLICE_PITCH)
    }

    pub fn width(&self) -> Result<usize> {
        self.image_info()?.read_scalar(image_key::WIDTH)
    }

    pub fn height(&self) -> Result<usize> {
        self.image_info()?.read_scalar(image_key::HEIGHT)
    }

    /// Zero for 2-D images.
    pub fn depth(&self) -> Result<usize> {
        self.image_info()?.read_scalar(image_key::DEPTH)
    }
}

impl MemObject for Image {
    fn owned(&self) -> &OwnedHandle {
        &self.owned
    }

    fn mem_info(&self) -> Result<MemContainer<'_>> {
        self.image_info()
    }
}
