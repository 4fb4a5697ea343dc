//! Sampler descriptors.

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest-neighbor filtering.
    Nearest,
    /// Linear interpolation.
    #[default]
    Linear,
}

/// Texture addressing mode outside the [0, 1] range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp coordinates to the edge.
    #[default]
    ClampToEdge,
    /// Repeat the texture.
    Repeat,
    /// Repeat the texture, mirroring on each repetition.
    MirrorRepeat,
}

/// Descriptor for creating a sampler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SamplerDescriptor {
    /// Debug label for the sampler.
    pub label: Option<String>,
    /// Minification/magnification filter.
    pub filter: FilterMode,
    /// Addressing mode for all axes.
    pub address_mode: AddressMode,
}

impl SamplerDescriptor {
    /// Create a new sampler descriptor.
    pub fn new(filter: FilterMode, address_mode: AddressMode) -> Self {
        Self {
            label: None,
            filter,
            address_mode,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
