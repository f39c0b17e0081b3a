// src/wgpu_utils/uniform_buffer.rs
//! Per-frame uniform storage addressed with dynamic offsets.
//!
//! Every draw of a frame pushes its uniform block into a CPU staging area,
//! each block starting on the device's offset alignment. The whole area is
//! written to the GPU once before the frame's passes are encoded.

const INITIAL_CAPACITY: u64 = 16 * 1024;

pub struct DynamicUniformBuffer {
    buffer: wgpu::Buffer,
    alignment: u64,
    staging: Vec<u8>,
    generation: u64,
}

impl DynamicUniformBuffer {
    pub fn new(device: &wgpu::Device, alignment: u32) -> Self {
        Self {
            buffer: Self::create_buffer(device, INITIAL_CAPACITY),
            alignment: alignment.max(1) as u64,
            staging: Vec::new(),
            generation: 0,
        }
    }

    fn create_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DynamicUniformBuffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Forget everything pushed for the previous frame
    pub fn clear(&mut self) {
        self.staging.clear();
    }

    /// Appends `content` and returns its dynamic offset.
    pub fn push<Content: bytemuck::Pod>(&mut self, content: &Content) -> u32 {
        let offset = aligned_offset(self.staging.len() as u64, self.alignment);
        self.staging.resize(offset as usize, 0);
        self.staging.extend_from_slice(bytemuck::bytes_of(content));
        offset as u32
    }

    /// Writes the staged blocks, growing the buffer if needed. Returns true
    /// when the buffer was reallocated and bind groups must be rebuilt.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let needed = self.staging.len() as u64;
        let grown = needed > self.buffer.size();
        if grown {
            let size = needed.next_power_of_two().max(INITIAL_CAPACITY);
            log::debug!("Growing dynamic uniform buffer to {} bytes", size);
            self.buffer = Self::create_buffer(device, size);
            self.generation += 1;
        }
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
        grown
    }

    /// Binding of one `Content` sized block, offset supplied per draw
    pub fn binding_resource<Content>(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: wgpu::BufferSize::new(std::mem::size_of::<Content>() as u64),
        })
    }

    /// Bumped every time the underlying buffer is replaced
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.staging.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staging.is_empty()
    }
}

/// Rounds `offset` up to the next multiple of `alignment`.
pub fn aligned_offset(offset: u64, alignment: u64) -> u64 {
    offset.div_ceil(alignment) * alignment
}
