//! Screen-space spatial clustering.
//!
//! Clustering is purely a function of `(visible pulses, bounds, zoom)` and
//! never mutates pulse state. Clusters are recomputed from scratch on every
//! viewport or zoom change; at the expected scale of hundreds of points a
//! full pass is cheaper than maintaining an incremental index.

use vala_types::geo::{project, BoundingBox};
use vala_types::pulse::Pulse;
use vala_types::CLUSTER_RADIUS_PX;

/// A spatial aggregation of nearby pulses, rendered as one marker.
#[derive(Clone, Debug)]
pub struct ClusterNode {
    /// Centroid coordinate of the member pulses.
    pub lat: f64,
    pub lng: f64,
    pub count: usize,
    pub leaves: Vec<Pulse>,
}

/// One renderable map entity.
#[derive(Clone, Debug)]
pub enum MapEntity {
    Single(Pulse),
    Cluster(ClusterNode),
}

struct Bucket {
    px: f64,
    py: f64,
    sum_lat: f64,
    sum_lng: f64,
    members: Vec<Pulse>,
}

impl Bucket {
    fn seed(pulse: Pulse, px: f64, py: f64) -> Self {
        Self {
            px,
            py,
            sum_lat: pulse.lat,
            sum_lng: pulse.lng,
            members: vec![pulse],
        }
    }

    fn absorb(&mut self, pulse: Pulse, px: f64, py: f64) {
        let n = self.members.len() as f64;
        // Running mean in pixel space keeps the radius test anchored to
        // the cluster centroid rather than its first member.
        self.px = (self.px * n + px) / (n + 1.0);
        self.py = (self.py * n + py) / (n + 1.0);
        self.sum_lat += pulse.lat;
        self.sum_lng += pulse.lng;
        self.members.push(pulse);
    }
}

/// Group the visible pulses inside `bounds` into clusters at `zoom`.
///
/// Greedy assignment: each pulse joins the first cluster whose centroid is
/// within [`CLUSTER_RADIUS_PX`] on screen, else seeds a new one. Clusters
/// of one collapse to [`MapEntity::Single`].
pub fn cluster(visible: &[Pulse], bounds: &BoundingBox, zoom: f64) -> Vec<MapEntity> {
    let mut buckets: Vec<Bucket> = Vec::new();

    for pulse in visible.iter().filter(|p| bounds.contains(p.lat, p.lng)) {
        let (px, py) = project(pulse.lat, pulse.lng, zoom);
        let hit = buckets
            .iter_mut()
            .find(|b| ((b.px - px).powi(2) + (b.py - py).powi(2)).sqrt() < CLUSTER_RADIUS_PX);
        match hit {
            Some(bucket) => bucket.absorb(pulse.clone(), px, py),
            None => buckets.push(Bucket::seed(pulse.clone(), px, py)),
        }
    }

    buckets
        .into_iter()
        .map(|b| {
            let count = b.members.len();
            if count == 1 {
                let mut members = b.members;
                // Length checked above; remove instead of indexing to keep
                // this branch panic-free.
                MapEntity::Single(members.remove(0))
            } else {
                MapEntity::Cluster(ClusterNode {
                    lat: b.sum_lat / count as f64,
                    lng: b.sum_lng / count as f64,
                    count,
                    leaves: b.members,
                })
            }
        })
        .collect()
}

/// Expand a cluster into its ranked leaf list: respect descending, newest
/// first on ties. Used for the ranked list view and as radio-mode input.
pub fn expand(node: &ClusterNode) -> Vec<Pulse> {
    let mut leaves = node.leaves.clone();
    leaves.sort_by(|a, b| {
        b.respect_count
            .cmp(&a.respect_count)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    leaves
}
