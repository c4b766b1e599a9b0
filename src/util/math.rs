//! Math re-exports from `glam` and bounding boxes stored by geometry schemas.

pub use glam::{DMat4, DVec3, Mat4, Quat, Vec2, Vec3, Vec4, DVec2, DVec4, IVec3};

use super::{DataType, PlainOldDataType, PodElement};
use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Time value in seconds.
pub type Chrono = f64;

macro_rules! impl_glam_element {
    ($($t:ty => ($pod:ident, $extent:expr)),* $(,)?) => {
        $(impl PodElement for $t {
            const DATA_TYPE: DataType = DataType::new(PlainOldDataType::$pod, $extent);
        })*
    };
}

impl_glam_element! {
    Vec2 => (Float32, 2),
    Vec3 => (Float32, 3),
    Vec4 => (Float32, 4),
    Quat => (Float32, 4),
    Mat4 => (Float32, 16),
    DVec2 => (Float64, 2),
    DVec3 => (Float64, 3),
    DVec4 => (Float64, 4),
    DMat4 => (Float64, 16),
    IVec3 => (Int32, 3),
    BBox3f => (Float32, 6),
    BBox3d => (Float64, 6),
}

/// Single precision axis-aligned box.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BBox3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox3f {
    /// Inverted box; grows on the first point.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// True until a point is added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow to include `p`.
    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }
}

impl Default for BBox3f {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3f({:?} - {:?})", self.min, self.max)
    }
}

/// Double precision axis-aligned box; the layout of `.selfBnds`.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BBox3d {
    pub min: DVec3,
    pub max: DVec3,
}

impl BBox3d {
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Tight bounds of a point cloud, `EMPTY` for no points.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut b = Self::EMPTY;
        for p in points {
            b.expand_by_point(p.as_dvec3());
        }
        b
    }

    /// True until a point is added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow to include `p`.
    #[inline]
    pub fn expand_by_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grow to include `other`.
    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Center point; meaningless when empty.
    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }
}

impl Default for BBox3d {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3d({:?} - {:?})", self.min, self.max)
    }
}

impl From<BBox3f> for BBox3d {
    fn from(b: BBox3f) -> Self {
        Self {
            min: b.min.as_dvec3(),
            max: b.max.as_dvec3(),
        }
    }
}
