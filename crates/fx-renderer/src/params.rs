// ABOUTME: GPU-side parameter blocks: one uniform buffer per packed struct.
// ABOUTME: Allocated once, rewritten in place every frame.

use bytemuck::Pod;
use std::marker::PhantomData;
use wgpu::util::DeviceExt;

pub struct ParameterBlock<T: Pod> {
    buffer: wgpu::Buffer,
    /// Buffers created by this block; stays at 1 for its lifetime.
    allocations: usize,
    destroyed: bool,
    _marker: PhantomData<T>,
}

impl<T: Pod> ParameterBlock<T> {
    pub fn new(device: &wgpu::Device, label: &str, initial: &T) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(initial),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            buffer,
            allocations: 1,
            destroyed: false,
            _marker: PhantomData,
        }
    }

    /// Overwrite the whole block. Never reallocates.
    pub fn write(&self, queue: &wgpu::Queue, value: &T) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(value));
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }

    pub fn destroy(&mut self) {
        if !self.destroyed {
            self.buffer.destroy();
            self.destroyed = true;
        }
    }
}
