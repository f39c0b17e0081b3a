//! Axis-aligned bounding boxes.

use cgmath::Vector3;

/// Axis-aligned bounding box in untransformed model space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vector3<f32>,
    /// Maximum corner of the bounding box
    pub max: Vector3<f32>,
}

impl Aabb {
    /// Create a new AABB
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// Create an AABB from a set of points, `None` when there are no points
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f32; 3]>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;

        let mut min = Vector3::new(first[0], first[1], first[2]);
        let mut max = min;

        for p in points {
            min.x = min.x.min(p[0]);
            min.y = min.y.min(p[1]);
            min.z = min.z.min(p[2]);
            max.x = max.x.max(p[0]);
            max.y = max.y.max(p[1]);
            max.z = max.z.max(p[2]);
        }

        Some(Self::new(min, max))
    }

    /// Center point of the box
    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths along each axis
    pub fn extent(&self) -> Vector3<f32> {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_triangle_points() {
        let aabb = Aabb::from_points([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 3.0, 0.0]]).unwrap();

        assert_eq!(aabb.min, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vector3::new(2.0, 3.0, 0.0));
        assert_eq!(aabb.center(), Vector3::new(1.0, 1.5, 0.0));
    }

    #[test]
    fn test_aabb_negative_coordinates() {
        let aabb = Aabb::from_points([[1.0, -4.0, 2.0], [-1.0, 1.0, -2.0]]).unwrap();

        assert_eq!(aabb.min, Vector3::new(-1.0, -4.0, -2.0));
        assert_eq!(aabb.extent(), Vector3::new(2.0, 5.0, 4.0));
    }

    #[test]
    fn test_aabb_empty() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }
}
