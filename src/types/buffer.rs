//! Buffer descriptors and usage flags.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be bound as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be the source of a copy.
        const COPY_SRC = 1 << 4;
        /// Buffer can be the destination of a copy or CPU upload.
        const COPY_DST = 1 << 5;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder() {
        let desc = BufferDescriptor::new(256, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
            .with_label("camera constants");
        assert_eq!(desc.size, 256);
        assert!(desc.usage.contains(BufferUsage::COPY_DST));
        assert_eq!(desc.label.as_deref(), Some("camera constants"));
    }
}
