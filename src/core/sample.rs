//! Sample selection by index or time.

use crate::core::TimeSampling;
use crate::util::Chrono;

/// Which sample of a property to read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleSelector {
    /// Exact stored index.
    Index(usize),
    /// Largest index with time <= t.
    Floor(Chrono),
    /// Smallest index with time >= t.
    Ceil(Chrono),
    /// Closest to t, ties toward floor.
    Near(Chrono),
}

impl SampleSelector {
    /// Resolve to an index against a property's sampling and sample count.
    pub fn resolve(self, ts: &TimeSampling, num_samples: usize) -> usize {
        match self {
            Self::Index(i) => i,
            Self::Floor(t) => ts.floor_index(t, num_samples),
            Self::Ceil(t) => ts.ceil_index(t, num_samples),
            Self::Near(t) => ts.near_index(t, num_samples),
        }
    }
}

impl Default for SampleSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl From<usize> for SampleSelector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Chrono> for SampleSelector {
    fn from(time: Chrono) -> Self {
        Self::Near(time)
    }
}

/// Bracketing samples for a time lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleInterp {
    pub floor_index: usize,
    pub ceil_index: usize,
    /// 0.0 = floor, 1.0 = ceil.
    pub alpha: f64,
}

impl SampleInterp {
    /// Lands exactly on `index`.
    pub fn exact(index: usize) -> Self {
        Self {
            floor_index: index,
            ceil_index: index,
            alpha: 0.0,
        }
    }

    /// Blend between two samples; `alpha` is clamped to `[0, 1]`.
    pub fn lerp(floor: usize, ceil: usize, alpha: f64) -> Self {
        Self {
            floor_index: floor,
            ceil_index: ceil,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    /// No blending needed.
    pub fn is_exact(&self) -> bool {
        self.floor_index == self.ceil_index || self.alpha == 0.0
    }
}

/// Per-element scope of a geometry parameter (`geoScope` metadata).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GeometryScope {
    /// One value for the whole object.
    #[default]
    Constant,
    /// One value per face.
    Uniform,
    /// One value per point, interpolated.
    Varying,
    /// One value per point.
    Vertex,
    /// One value per face-vertex.
    FaceVarying,
}

impl GeometryScope {
    /// Parse the `geoScope` abbreviation.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "con" => Self::Constant,
            "uni" => Self::Uniform,
            "var" => Self::Varying,
            "vtx" => Self::Vertex,
            "fvr" => Self::FaceVarying,
            _ => return None,
        })
    }

    /// The `geoScope` abbreviation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "con",
            Self::Uniform => "uni",
            Self::Varying => "var",
            Self::Vertex => "vtx",
            Self::FaceVarying => "fvr",
        }
    }
}

/// How much of a geometry sample changes over time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TopologyVariance {
    /// Topology changes between samples.
    #[default]
    Heterogeneous,
    /// Topology is fixed, positions move.
    Homogeneous,
    /// Nothing changes.
    Static,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_resolution() {
        let ts = TimeSampling::cyclic(3.0, vec![1.0, 2.0, 3.0]);
        assert_eq!(SampleSelector::Index(7).resolve(&ts, 3), 7);
        assert_eq!(SampleSelector::Near(1.1).resolve(&ts, 3), 0);
        assert_eq!(SampleSelector::Ceil(1.1).resolve(&ts, 3), 1);
        assert_eq!(SampleSelector::Floor(3.1).resolve(&ts, 3), 2);

        let sel: SampleSelector = 1.5.into();
        assert_eq!(sel, SampleSelector::Near(1.5));
        assert_eq!(SampleSelector::from(4usize), SampleSelector::Index(4));
    }

    #[test]
    fn test_sample_interp() {
        assert!(SampleInterp::exact(5).is_exact());
        let lerp = SampleInterp::lerp(2, 3, 1.5);
        assert!(!lerp.is_exact());
        assert_eq!(lerp.alpha, 1.0);
    }

    #[test]
    fn test_geometry_scope() {
        assert_eq!(GeometryScope::parse("fvr"), Some(GeometryScope::FaceVarying));
        assert_eq!(GeometryScope::parse("bogus"), None);
        for scope in [GeometryScope::Constant, GeometryScope::Uniform, GeometryScope::Vertex] {
            assert_eq!(GeometryScope::parse(scope.as_str()), Some(scope));
        }
    }
}
