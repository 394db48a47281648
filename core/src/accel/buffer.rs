use super::device::{Access, Accelerator, BufferId, KernelArg};
use crate::Result;
use bytemuck::Pod;
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed device allocation that frees itself on drop.
pub struct DeviceBuffer<T: Pod, A: Accelerator> {
    device: Arc<A>,
    id: BufferId,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod, A: Accelerator> DeviceBuffer<T, A> {
    /// Allocates a buffer sized to `data` and copies it to the device.
    pub fn upload(device: &Arc<A>, data: &[T], access: Access) -> Result<Self> {
        let buffer = Self::alloc(device, data.len(), access)?;
        device.write(buffer.id, bytemuck::cast_slice(data))?;
        Ok(buffer)
    }

    /// Allocates `len` zero-initialised elements.
    pub fn zeroed(device: &Arc<A>, len: usize, access: Access) -> Result<Self> {
        let buffer = Self::alloc(device, len, access)?;
        let zeros = vec![T::zeroed(); len];
        device.write(buffer.id, bytemuck::cast_slice(&zeros))?;
        Ok(buffer)
    }

    fn alloc(device: &Arc<A>, len: usize, access: Access) -> Result<Self> {
        let id = device.alloc(len * std::mem::size_of::<T>(), access)?;
        Ok(Self {
            device: Arc::clone(device),
            id,
            len,
            _marker: PhantomData,
        })
    }

    /// Blocking device-to-host copy of the whole buffer.
    pub fn read(&self) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.len];
        self.device
            .read(self.id, bytemuck::cast_slice_mut(&mut out))?;
        Ok(out)
    }

    pub fn arg(&self) -> KernelArg {
        KernelArg::Buffer(self.id)
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: Pod, A: Accelerator> Drop for DeviceBuffer<T, A> {
    fn drop(&mut self) {
        self.device.release_buffer(self.id);
    }
}
