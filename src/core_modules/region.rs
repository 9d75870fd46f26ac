// THEORY:
// The `ProtectedRegion` is the operator's designated rectangle. It is a small,
// immutable value: once accepted it is never edited in place, only replaced
// wholesale or dropped. The minimum-size rule is enforced at construction, so every
// `ProtectedRegion` in the system is known to be large enough to analyze.
//
// Frames and regions are independent inputs, so a region may extend past the edge
// of the frame (for example after the capture resolution shrinks). `clip_to` turns
// the region into the pixel window that actually exists inside a frame.

use crate::error::{Result, SentinelError};

/// Both sides of a region must be strictly greater than this many pixels.
pub const MIN_REGION_SIDE: u32 = 20;

/// An axis-aligned rectangle in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtectedRegion {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// The part of a region that overlaps a concrete frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClippedWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ClippedWindow {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl ProtectedRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        if width <= MIN_REGION_SIDE || height <= MIN_REGION_SIDE {
            return Err(SentinelError::InvalidRegion {
                width,
                height,
                min: MIN_REGION_SIDE,
            });
        }
        Ok(Self { x, y, width, height })
    }

    /// Builds a region from the two corners of a drag gesture, in any order.
    pub fn from_corners(a: (u32, u32), b: (u32, u32)) -> Result<Self> {
        let x = a.0.min(b.0);
        let y = a.1.min(b.1);
        Self::new(x, y, a.0.abs_diff(b.0), a.1.abs_diff(b.1))
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Intersects the region with a `frame_width` x `frame_height` frame.
    pub fn clip_to(&self, frame_width: u32, frame_height: u32) -> ClippedWindow {
        let x0 = self.x.min(frame_width);
        let y0 = self.y.min(frame_height);
        let x1 = self.x.saturating_add(self.width).min(frame_width);
        let y1 = self.y.saturating_add(self.height).min(frame_height);
        ClippedWindow {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

impl std::fmt::Display for ProtectedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

impl std::str::FromStr for ProtectedRegion {
    type Err = SentinelError;

    /// Parses `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| SentinelError::InvalidConfig(format!("region '{s}': {e}")))?;
        match parts.as_slice() {
            [x, y, w, h] => Self::new(*x, *y, *w, *h),
            _ => Err(SentinelError::InvalidConfig(format!(
                "region '{s}' must be x,y,width,height"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_narrow_region() {
        let err = ProtectedRegion::new(0, 0, 15, 50).unwrap_err();
        assert_eq!(
            err,
            SentinelError::InvalidRegion {
                width: 15,
                height: 50,
                min: MIN_REGION_SIDE
            }
        );
    }

    #[test]
    fn minimum_side_is_exclusive() {
        assert!(ProtectedRegion::new(0, 0, 20, 100).is_err());
        assert!(ProtectedRegion::new(0, 0, 100, 20).is_err());
        assert!(ProtectedRegion::new(0, 0, 21, 21).is_ok());
    }

    #[test]
    fn corners_in_any_order() {
        let a = ProtectedRegion::from_corners((120, 80), (20, 10)).unwrap();
        let b = ProtectedRegion::from_corners((20, 10), (120, 80)).unwrap();
        assert_eq!(a, b);
        assert_eq!((a.x(), a.y(), a.width(), a.height()), (20, 10, 100, 70));
    }

    #[test]
    fn clip_inside_frame_is_identity() {
        let region = ProtectedRegion::new(10, 10, 50, 40).unwrap();
        let window = region.clip_to(200, 200);
        assert_eq!((window.x, window.y, window.width, window.height), (10, 10, 50, 40));
        assert_eq!(window.area(), 2000);
    }

    #[test]
    fn clip_partially_outside() {
        let region = ProtectedRegion::new(80, 90, 50, 40).unwrap();
        let window = region.clip_to(100, 100);
        assert_eq!((window.width, window.height), (20, 10));
    }

    #[test]
    fn clip_fully_outside_is_empty() {
        let region = ProtectedRegion::new(300, 300, 50, 50).unwrap();
        let window = region.clip_to(100, 100);
        assert!(window.is_empty());
        assert_eq!(window.area(), 0);
    }

    #[test]
    fn parses_from_cli_string() {
        let region: ProtectedRegion = "5, 6, 40, 30".parse().unwrap();
        assert_eq!(region, ProtectedRegion::new(5, 6, 40, 30).unwrap());
        assert!("5,6,40".parse::<ProtectedRegion>().is_err());
        assert!("a,b,c,d".parse::<ProtectedRegion>().is_err());
    }
}
