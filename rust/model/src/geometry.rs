// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar polygon helpers.
//!
//! Only what reconciliation needs: area and normal (Newell's method),
//! tolerance-based point matching, and vertex cleanup. No clipping or
//! intersection lives here.

use nalgebra::{Point3, Vector3};

/// An ordered ring of 3D points describing a planar boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub points: Vec<Point3<f64>>,
}

impl Polygon {
    /// Creates a polygon from its boundary points.
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Creates a polygon from `[x, y, z]` triples.
    pub fn from_coords(coords: &[[f64; 3]]) -> Self {
        Self {
            points: coords
                .iter()
                .map(|c| Point3::new(c[0], c[1], c[2]))
                .collect(),
        }
    }

    /// Returns the boundary points as `[x, y, z]` triples.
    pub fn to_coords(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(|p| [p.x, p.y, p.z]).collect()
    }

    /// Number of boundary points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the polygon has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Unnormalized Newell normal. Its length is twice the polygon area.
    fn newell(&self) -> Vector3<f64> {
        let mut normal = Vector3::new(0.0, 0.0, 0.0);
        let n = self.points.len();

        for i in 0..n {
            let curr = &self.points[i];
            let next = &self.points[(i + 1) % n];

            normal.x += (curr.y - next.y) * (curr.z + next.z);
            normal.y += (curr.z - next.z) * (curr.x + next.x);
            normal.z += (curr.x - next.x) * (curr.y + next.y);
        }

        normal
    }

    /// Computes the unit normal, following the right-hand rule relative to
    /// the winding order. `None` for degenerate polygons.
    pub fn normal(&self) -> Option<Vector3<f64>> {
        if self.points.len() < 3 {
            return None;
        }

        let normal = self.newell();
        let len = normal.norm();
        if len < 1e-15 {
            return None;
        }

        Some(normal / len)
    }

    /// Area enclosed by the polygon.
    pub fn area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        self.newell().norm() / 2.0
    }

    /// Returns `true` if the polygon has at least 3 points and a non-zero area.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 3 && self.area() > 1e-12
    }

    /// Returns `true` if every point of `other` matches some point of `self`
    /// within `tolerance`.
    ///
    /// This is a point-set containment test, not polygon containment: it is
    /// how a face the host rebuilt with extra vertices is recognised as the
    /// same face.
    pub fn contains_points_of(&self, other: &Polygon, tolerance: f64) -> bool {
        other.points.iter().all(|p| self.has_point(p, tolerance))
    }

    /// Returns `true` if some boundary point lies within `tolerance` of `point`.
    pub fn has_point(&self, point: &Point3<f64>, tolerance: f64) -> bool {
        self.points
            .iter()
            .any(|q| (q - point).norm() <= tolerance)
    }

    /// Returns `true` if both polygons have the same points in the same
    /// cyclic order, starting anywhere.
    pub fn circular_eq(&self, other: &Polygon, tolerance: f64) -> bool {
        let n = self.points.len();
        if n != other.points.len() {
            return false;
        }
        if n == 0 {
            return true;
        }

        (0..n).any(|offset| {
            (0..n).all(|i| (self.points[(i + offset) % n] - other.points[i]).norm() <= tolerance)
        })
    }

    /// Removes consecutive duplicate points and collinear points.
    pub fn reduce(&mut self, tolerance: f64) {
        let mut points: Vec<Point3<f64>> = Vec::with_capacity(self.points.len());
        for p in &self.points {
            if points.last().map_or(true, |q| (p - q).norm() > tolerance) {
                points.push(*p);
            }
        }
        while points.len() > 1 && (points[0] - points[points.len() - 1]).norm() <= tolerance {
            points.pop();
        }

        let mut i = 0;
        while points.len() > 3 && i < points.len() {
            let n = points.len();
            let prev = points[(i + n - 1) % n];
            let curr = points[i];
            let next = points[(i + 1) % n];
            if (curr - prev).cross(&(next - curr)).norm() <= tolerance * tolerance {
                points.remove(i);
            } else {
                i += 1;
            }
        }

        self.points = points;
    }

    /// Translates every point by the given offset.
    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for p in &mut self.points {
            *p += *offset;
        }
    }
}

impl From<Vec<Point3<f64>>> for Polygon {
    fn from(points: Vec<Point3<f64>>) -> Self {
        Self::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Polygon {
        Polygon::from_coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ])
    }

    #[test]
    fn square_area_and_normal() {
        let square = unit_square();
        assert_relative_eq!(square.area(), 1.0, epsilon = 1e-12);
        let n = square.normal().unwrap();
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_polygon_has_no_normal() {
        let line = Polygon::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        assert!(line.normal().is_none());
        assert!(!line.is_valid());
    }

    #[test]
    fn superset_with_extra_vertex_contains_original() {
        let square = unit_square();
        let mut split = square.clone();
        split.points.insert(1, Point3::new(0.5, 0.0, 0.0));

        assert!(split.contains_points_of(&square, 1e-9));
        assert!(!square.contains_points_of(&split, 1e-9));
    }

    #[test]
    fn containment_respects_tolerance() {
        let square = unit_square();
        let mut moved = square.clone();
        moved.translate(&Vector3::new(1e-4, 0.0, 0.0));

        assert!(moved.contains_points_of(&square, 1e-3));
        assert!(!moved.contains_points_of(&square, 1e-6));
    }

    #[test]
    fn circular_eq_ignores_start_point() {
        let square = unit_square();
        let mut rotated = square.clone();
        rotated.points.rotate_left(2);

        assert!(square.circular_eq(&rotated, 1e-9));

        let mut reversed = square.clone();
        reversed.points.reverse();
        assert!(!square.circular_eq(&reversed, 1e-9));
    }

    #[test]
    fn reduce_drops_duplicates_and_collinear_points() {
        let mut polygon = Polygon::from_coords(&[
            [0.0, 0.0, 0.0],
            [0.5, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
        ]);
        polygon.reduce(1e-9);

        assert_eq!(polygon.len(), 4);
        assert_relative_eq!(polygon.area(), 1.0, epsilon = 1e-12);
    }
}
