/// Output a render backend hands to the host surface
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Packed RGB pixels, `width * height * 3` bytes
    Raster {
        width: u32,
        height: u32,
        rgb: Vec<u8>,
    },
    /// A complete SVG document
    Vector(String),
}

impl Frame {
    pub fn is_vector(&self) -> bool {
        matches!(self, Frame::Vector(_))
    }
}
