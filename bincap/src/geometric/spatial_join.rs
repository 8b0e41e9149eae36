use geo::{BoundingRect, Geometry, Intersects};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::geo_core::BoundingBox;

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// R-tree over geometry envelopes, returning positions in the indexed slice
pub struct SpatialIndex {
    tree: RTree<IndexedEnvelope>,
}

impl SpatialIndex {
    pub fn new<'a, I>(geometries: I) -> Self
    where
        I: IntoIterator<Item = &'a Geometry<f64>>,
    {
        let envelopes = geometries
            .into_iter()
            .enumerate()
            .filter_map(|(position, geometry)| {
                let (lower, upper) = BoundingBox::from_rect(geometry.bounding_rect()?).corners();
                Some(GeomWithData::new(
                    Rectangle::from_corners(lower, upper),
                    position,
                ))
            })
            .collect();
        SpatialIndex {
            tree: RTree::bulk_load(envelopes),
        }
    }

    /// Positions whose envelope overlaps the envelope of `geometry`, ascending
    pub fn candidates(&self, geometry: &Geometry<f64>) -> Vec<usize> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let (lower, upper) = BoundingBox::from_rect(rect).corners();
        let mut positions: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_corners(lower, upper))
            .map(|entry| entry.data)
            .collect();
        positions.sort_unstable();
        positions
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Inner spatial join on the `intersects` predicate.
///
/// Returns every `(left position, right position)` pair whose geometries
/// intersect, ordered by left position then right position. A left record
/// with no match contributes no pair.
pub fn intersects_join<L, R>(
    left: &[L],
    right: &[R],
    left_geometry: impl Fn(&L) -> &Geometry<f64>,
    right_geometry: impl Fn(&R) -> &Geometry<f64>,
) -> Vec<(usize, usize)> {
    let index = SpatialIndex::new(right.iter().map(&right_geometry));

    let mut pairs = Vec::new();
    for (l, left_item) in left.iter().enumerate() {
        let geometry = left_geometry(left_item);
        for r in index.candidates(geometry) {
            if geometry.intersects(right_geometry(&right[r])) {
                pairs.push((l, r));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]
        .into()
    }

    #[test]
    fn test_candidates_use_envelopes() {
        let geoms = vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)];
        let index = SpatialIndex::new(&geoms);
        assert_eq!(index.len(), 2);
        assert_eq!(index.candidates(&point!(x: 0.5, y: 0.5).into()), vec![0]);
        assert_eq!(index.candidates(&square(0.5, 0.5, 5.0)), vec![0, 1]);
        assert!(index.candidates(&point!(x: 3.0, y: 3.0).into()).is_empty());
    }

    #[test]
    fn test_intersects_join_exact_predicate() {
        // triangle whose envelope covers (0.9, 0.9) but whose area does not
        let triangle: Geometry<f64> =
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)].into();
        let parcels = vec![triangle, square(2.0, 0.0, 1.0)];
        let bins: Vec<Geometry<f64>> = vec![
            point!(x: 0.9, y: 0.9).into(),
            point!(x: 0.1, y: 0.1).into(),
            square(0.5, 0.0, 2.0),
            point!(x: 9.0, y: 9.0).into(),
        ];

        let pairs = intersects_join(&bins, &parcels, |g| g, |g| g);
        assert_eq!(pairs, vec![(1, 0), (2, 0), (2, 1)]);
    }
}
