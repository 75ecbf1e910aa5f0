//! Kernels created from built programs.

use clnet_sys::info::{kernel as key, work_group};
use clnet_sys::{InfoTarget, NativeHandle};

use crate::context::Context;
use crate::device::Device;
use crate::error::Result;
use crate::handle::OwnedHandle;
use crate::property::{InfoContainer, PropertyReader};

#[derive(Debug)]
pub struct Kernel {
    owned: OwnedHandle,
    context: Context,
}

impl Kernel {
    pub(crate) fn new(owned: OwnedHandle, context: Context) -> Self {
        Self { owned, context }
    }

    fn info(&self) -> Result<InfoContainer<'_>> {
        self.owned.container(InfoTarget::Kernel)
    }

    fn work_group_info(&self, device: &Device) -> Result<InfoContainer<'_>> {
        let device = device.handle();
        self.owned.container(|kernel| InfoTarget::KernelWorkGroup { kernel, device })
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

    /// Entry point name in the program source.
    pub fn function_name(&self) -> Result<String> {
        self.info()?.read_string(key::FUNCTION_NAME)
    }

    pub fn num_args(&self) -> Result<u32> {
        self.info()?.read_scalar(key::NUM_ARGS)
    }

    pub fn reference_count(&self) -> Result<u32> {
        self.info()?.read_scalar(key::REFERENCE_COUNT)
    }

    pub fn context_handle(&self) -> Result<NativeHandle> {
        Ok(NativeHandle::from_usize(self.info()?.read_scalar(key::CONTEXT)?))
    }

    pub fn program_handle(&self) -> Result<NativeHandle> {
        Ok(NativeHandle::from_usize(self.info()?.read_scalar(key::PROGRAM)?))
    }

    /// Largest work-group this kernel can run with on `device`.
    pub fn work_group_size(&self, device: &Device) -> Result<usize> {
        self.work_group_info(device)?.read_scalar(work_group::WORK_GROUP_SIZE)
    }

    /// `reqd_work_group_size` attribute; all zeros when absent.
    pub fn compile_work_group_size(&self, device: &Device) -> Result<Vec<usize>> {
        self.work_group_info(device)?.read_usize_array(work_group::COMPILE_WORK_GROUP_SIZE)
    }

    pub fn local_mem_size(&self, device: &Device) -> Result<u64> {
        self.work_group_info(device)?.read_scalar(work_group::LOCAL_MEM_SIZE)
    }

    pub fn preferred_work_group_size_multiple(&self, device: &Device) -> Result<usize> {
        self.work_group_info(device)?.read_scalar(work_group::PREFERRED_WORK_GROUP_SIZE_MULTIPLE)
    }

    pub fn private_mem_size(&self, device: &Device) -> Result<u64> {
        self.work_group_info(device)?.read_scalar(work_group::PRIVATE_MEM_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClError;
    use crate::platform::Platform;
    use clnet_sys::{DeviceType, ResourceKind};
    use clnet_test_support::{SimulatedCl, simulated};

    const SOURCE: &str = "kernel void fill(global int* out, int value) { out[0] = value; }\n\
                          kernel void noop(void) {}\n";

    #[test]
    fn kernel_attributes() {
        let (_, api) = simulated(SimulatedCl::default());
        let ctx = Context::from_type(&Platform::nth(api, 0).unwrap(), DeviceType::ALL).unwrap();
        let program = ctx.create_program_with_source(SOURCE).unwrap();
        program.build(None, None, None).unwrap();

        let kernels = program.create_kernels().unwrap();
        let names: Vec<String> = kernels.iter().map(|k| k.function_name().unwrap()).collect();
        assert_eq!(names, ["fill", "noop"]);
        assert_eq!(kernels[0].num_args().unwrap(), 2);
        assert_eq!(kernels[1].num_args().unwrap(), 0);
        assert_eq!(kernels[0].program_handle().unwrap(), program.handle().unwrap());
        assert!(ctx.same_as(kernels[0].context_handle().unwrap()));

        let gpu = &ctx.devices()[0];
        assert_eq!(kernels[0].work_group_size(gpu).unwrap(), 256);
        assert_eq!(kernels[0].compile_work_group_size(gpu).unwrap(), [0, 0, 0]);
        assert_eq!(kernels[0].preferred_work_group_size_multiple(gpu).unwrap(), 32);
        assert_eq!(kernels[0].local_mem_size(gpu).unwrap(), 0);
        assert_eq!(kernels[0].private_mem_size(gpu).unwrap(), 0);
    }

    #[test]
    fn kernels_block_rebuild_until_released() {
        let (sim, api) = simulated(SimulatedCl::default());
        let ctx = Context::from_type(&Platform::nth(api, 0).unwrap(), DeviceType::ALL).unwrap();
        let program = ctx.create_program_with_source(SOURCE).unwrap();
        program.build(None, None, None).unwrap();
        let kernel = program.create_kernel("fill").unwrap();

        let err = program.build(None, None, None).unwrap_err();
        assert_eq!(err.status(), Some(clnet_sys::Status::INVALID_OPERATION));
        let ClError::BuildFailed(failure) = err else {
            panic!("expected a build failure, got {err:?}");
        };
        assert_eq!(failure.results.len(), ctx.devices().len());
        assert_eq!(failure.failed_devices().count(), 0);

        kernel.release().unwrap();
        assert!(matches!(
            kernel.num_args(),
            Err(ClError::UseAfterRelease { kind: ResourceKind::Kernel })
        ));
        program.build(None, None, None).unwrap();
        assert_eq!(sim.release_calls(ResourceKind::Kernel), 1);
    }
}
