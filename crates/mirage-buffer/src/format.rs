//! Texel formats for typed buffer views.

/// Texel format a typed buffer view reinterprets raw bytes with.
///
/// The element size drives view range validation and
/// [`element_count`](crate::view::BufferView::element_count).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Format {
    R8Unorm,
    R8Uint,
    R16Uint,
    R16Sfloat,
    R32Uint,
    R32Sint,
    R32Sfloat,
    Rg32Sfloat,
    Rgba8Unorm,
    Rgba16Sfloat,
    Rgba32Uint,
    Rgba32Sfloat,
}

impl Format {
    /// Size of one texel element in bytes.
    #[must_use]
    pub const fn element_size(&self) -> u64 {
        match self {
            Self::R8Unorm | Self::R8Uint => 1,
            Self::R16Uint | Self::R16Sfloat => 2,
            Self::R32Uint | Self::R32Sint | Self::R32Sfloat | Self::Rgba8Unorm => 4,
            Self::Rg32Sfloat | Self::Rgba16Sfloat => 8,
            Self::Rgba32Uint | Self::Rgba32Sfloat => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_sizes() {
        assert_eq!(Format::R8Uint.element_size(), 1);
        assert_eq!(Format::R16Sfloat.element_size(), 2);
        assert_eq!(Format::R32Sfloat.element_size(), 4);
        assert_eq!(Format::Rgba8Unorm.element_size(), 4);
        assert_eq!(Format::Rg32Sfloat.element_size(), 8);
        assert_eq!(Format::Rgba32Sfloat.element_size(), 16);
    }
}
