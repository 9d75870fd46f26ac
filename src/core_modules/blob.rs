// THEORY:
// A `Blob` is one spatially coherent group of foreground pixels found inside the
// protected region during a single frame. It is a plain data container: it knows its
// extent and size, and nothing about previous frames. Blobs are produced and
// discarded within one analysis cycle.

/// A pixel coordinate relative to the top-left corner of the protected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// A connected component of the cleaned region mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// The component label assigned for the current frame only. Not persistent.
    pub id: u32,
    /// Top-left and bottom-right corners (inclusive) of the enclosing box.
    pub bounding_box: (Point, Point),
    /// The number of pixels in the component.
    pub area: usize,
    /// The mean position of the component's pixels.
    pub center_of_mass: (f64, f64),
}

impl Blob {
    pub fn width(&self) -> u32 {
        self.bounding_box.1.x - self.bounding_box.0.x + 1
    }

    pub fn height(&self) -> u32 {
        self.bounding_box.1.y - self.bounding_box.0.y + 1
    }
}
