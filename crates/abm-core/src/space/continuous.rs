//! Continuous Space
//!
//! Agents at real-valued points. Neighbor queries are answered from a
//! uniform bucket grid so only nearby buckets are scanned.

use indexmap::IndexSet;
use std::collections::HashMap;

use abm_snapshot::{PositionRecord, SpaceKind, SpaceSummary};

use super::{SpaceError, SpatialIndex};
use crate::agent::AgentId;
use crate::config::ContinuousConfig;

/// Point `(x, y)` in continuous space
pub type Point = (f64, f64);

type BucketKey = (i64, i64);

/// Buckets per axis used when no bucket size is given
const DEFAULT_BUCKETS_PER_AXIS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Bounds {
    fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// Real-valued 2-D space, bounded (optionally toroidal) or unbounded
#[derive(Debug, Clone)]
pub struct ContinuousSpace {
    bounds: Option<Bounds>,
    torus: bool,
    bucket_size: f64,
    /// Bucket extent per axis; stretched on a torus so buckets tile it exactly
    bucket_dims: (f64, f64),
    /// Bucket count per axis on a torus
    bucket_counts: Option<(i64, i64)>,
    positions: HashMap<AgentId, Point>,
    buckets: HashMap<BucketKey, Vec<AgentId>>,
}

impl ContinuousSpace {
    /// Bounded space over `[x_min, x_max) x [y_min, y_max)`
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64, torus: bool) -> Result<Self, SpaceError> {
        let finite = [x_min, x_max, y_min, y_max].iter().all(|v| v.is_finite());
        if !finite || x_min >= x_max || y_min >= y_max {
            return Err(SpaceError::InvalidDimensions(format!(
                "bounds [{}, {}) x [{}, {})",
                x_min, x_max, y_min, y_max
            )));
        }
        let bounds = Bounds { x_min, x_max, y_min, y_max };
        let bucket_size = bounds.width().max(bounds.height()) / DEFAULT_BUCKETS_PER_AXIS;
        Ok(Self::build(Some(bounds), torus, bucket_size))
    }

    /// Unbounded space; placement never fails on range
    pub fn unbounded(bucket_size: f64) -> Result<Self, SpaceError> {
        check_bucket_size(bucket_size)?;
        Ok(Self::build(None, false, bucket_size))
    }

    pub fn from_config(config: &ContinuousConfig) -> Result<Self, SpaceError> {
        let space = Self::new(config.x_min, config.x_max, config.y_min, config.y_max, config.torus)?;
        match config.bucket_size {
            Some(size) => space.with_bucket_size(size),
            None => Ok(space),
        }
    }

    /// Rebuild the lookup buckets with a different side length
    pub fn with_bucket_size(self, bucket_size: f64) -> Result<Self, SpaceError> {
        check_bucket_size(bucket_size)?;
        let mut space = Self::build(self.bounds, self.torus, bucket_size);
        for (id, point) in self.positions {
            space.insert(id, point);
        }
        Ok(space)
    }

    fn build(bounds: Option<Bounds>, torus: bool, bucket_size: f64) -> Self {
        let (bucket_dims, bucket_counts) = match (bounds, torus) {
            (Some(b), true) => {
                let cols = ((b.width() / bucket_size).floor() as i64).max(1);
                let rows = ((b.height() / bucket_size).floor() as i64).max(1);
                (
                    (b.width() / cols as f64, b.height() / rows as f64),
                    Some((cols, rows)),
                )
            }
            _ => ((bucket_size, bucket_size), None),
        };
        Self {
            bounds,
            torus,
            bucket_size,
            bucket_dims,
            bucket_counts,
            positions: HashMap::new(),
            buckets: HashMap::new(),
        }
    }

    pub fn is_torus(&self) -> bool {
        self.torus
    }

    pub fn bucket_size(&self) -> f64 {
        self.bucket_size
    }

    /// `(width, height)` of a bounded space
    pub fn extent(&self) -> Option<(f64, f64)> {
        self.bounds.map(|b| (b.width(), b.height()))
    }

    /// Whether the point falls outside a bounded space
    pub fn out_of_bounds(&self, (x, y): Point) -> bool {
        match self.bounds {
            Some(b) => x < b.x_min || x >= b.x_max || y < b.y_min || y >= b.y_max,
            None => false,
        }
    }

    /// Reduce a point to its stored form
    ///
    /// Toroidal spaces wrap into the bounds; bounded spaces return `None`
    /// for points outside them.
    pub fn wrap(&self, point: Point) -> Option<Point> {
        match self.bounds {
            Some(b) if self.torus => Some((
                wrap_axis(point.0, b.x_min, b.x_max),
                wrap_axis(point.1, b.y_min, b.y_max),
            )),
            Some(_) if self.out_of_bounds(point) => None,
            _ => Some(point),
        }
    }

    /// Shortest displacement from `a` to `b`, across the edges on a torus
    pub fn heading(&self, a: Point, b: Point) -> Point {
        let dx = b.0 - a.0;
        let dy = b.1 - a.1;
        match self.bounds {
            Some(bounds) if self.torus => (
                shortest_delta(dx, bounds.width()),
                shortest_delta(dy, bounds.height()),
            ),
            _ => (dx, dy),
        }
    }

    /// Euclidean distance, torus-aware
    pub fn distance(&self, a: Point, b: Point) -> f64 {
        let (dx, dy) = self.heading(a, b);
        dx.hypot(dy)
    }

    /// Agents within `radius` of `point`, in identity order
    ///
    /// With `include_center` unset, agents located exactly at `point` are
    /// left out.
    pub fn neighbors(&self, point: Point, radius: f64, include_center: bool) -> Vec<AgentId> {
        if !(radius >= 0.0) || !point.0.is_finite() || !point.1.is_finite() {
            return Vec::new();
        }
        let center = self.wrap(point).unwrap_or(point);

        let mut found: Vec<AgentId> = self
            .candidate_buckets(center, radius)
            .into_iter()
            .filter_map(|key| self.buckets.get(&key))
            .flatten()
            .copied()
            .filter(|id| {
                self.positions.get(id).is_some_and(|&p| {
                    let d = self.distance(center, p);
                    d <= radius && (include_center || d > 0.0)
                })
            })
            .collect();
        found.sort();
        found
    }

    fn candidate_buckets(&self, (x, y): Point, radius: f64) -> Vec<BucketKey> {
        let (bw, bh) = self.bucket_dims;
        let (ox, oy) = self.origin();
        let lo_x = ((x - radius - ox) / bw).floor();
        let hi_x = ((x + radius - ox) / bw).floor();
        let lo_y = ((y - radius - oy) / bh).floor();
        let hi_y = ((y + radius - oy) / bh).floor();

        match self.bucket_counts {
            Some((cols, rows)) => {
                let xs = wrapped_range(lo_x, hi_x, cols);
                let ys = wrapped_range(lo_y, hi_y, rows);
                let mut keys = IndexSet::new();
                for &ky in &ys {
                    for &kx in &xs {
                        keys.insert((kx, ky));
                    }
                }
                keys.into_iter().collect()
            }
            None => {
                let span = (hi_x - lo_x + 1.0) * (hi_y - lo_y + 1.0);
                if span > self.buckets.len() as f64 {
                    // Scanning the occupied buckets is cheaper than the range.
                    return self.buckets.keys().copied().collect();
                }
                let (lo_x, hi_x, lo_y, hi_y) = (lo_x as i64, hi_x as i64, lo_y as i64, hi_y as i64);
                (lo_y..=hi_y)
                    .flat_map(|ky| (lo_x..=hi_x).map(move |kx| (kx, ky)))
                    .collect()
            }
        }
    }

    fn origin(&self) -> (f64, f64) {
        self.bounds.map_or((0.0, 0.0), |b| (b.x_min, b.y_min))
    }

    fn bucket_of(&self, (x, y): Point) -> BucketKey {
        let (bw, bh) = self.bucket_dims;
        let (ox, oy) = self.origin();
        let kx = ((x - ox) / bw).floor() as i64;
        let ky = ((y - oy) / bh).floor() as i64;
        match self.bucket_counts {
            Some((cols, rows)) => (kx.clamp(0, cols - 1), ky.clamp(0, rows - 1)),
            None => (kx, ky),
        }
    }

    fn insert(&mut self, id: AgentId, point: Point) {
        let key = self.bucket_of(point);
        self.buckets.entry(key).or_default().push(id);
        self.positions.insert(id, point);
    }

    fn detach(&mut self, id: AgentId) -> Option<Point> {
        let point = self.positions.remove(&id)?;
        let key = self.bucket_of(point);
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.retain(|occupant| *occupant != id);
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
        Some(point)
    }
}

impl SpatialIndex for ContinuousSpace {
    type Position = Point;

    fn place(&mut self, id: AgentId, point: Point) -> Result<Point, SpaceError> {
        if !point.0.is_finite() || !point.1.is_finite() {
            return Err(SpaceError::InvalidCoordinate(format!("({}, {})", point.0, point.1)));
        }
        let stored = self
            .wrap(point)
            .ok_or_else(|| SpaceError::OutOfBounds(format!("({}, {})", point.0, point.1)))?;
        self.detach(id);
        self.insert(id, stored);
        Ok(stored)
    }

    fn remove(&mut self, id: AgentId) -> Option<Point> {
        self.detach(id)
    }

    fn position_of(&self, id: AgentId) -> Option<Point> {
        self.positions.get(&id).copied()
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    fn summary(&self) -> SpaceSummary {
        SpaceSummary {
            kind: SpaceKind::Continuous,
            width: self.bounds.map(|b| b.width()),
            height: self.bounds.map(|b| b.height()),
            nodes: None,
            torus: self.torus,
        }
    }

    fn record(position: &Point) -> Option<PositionRecord> {
        Some(PositionRecord::Point {
            x: position.0,
            y: position.1,
        })
    }
}

fn check_bucket_size(bucket_size: f64) -> Result<(), SpaceError> {
    if bucket_size > 0.0 && bucket_size.is_finite() {
        Ok(())
    } else {
        Err(SpaceError::InvalidDimensions(format!("bucket size {}", bucket_size)))
    }
}

fn wrap_axis(v: f64, min: f64, max: f64) -> f64 {
    let wrapped = min + (v - min).rem_euclid(max - min);
    // rem_euclid can round up to the full extent for tiny negative offsets
    if wrapped >= max {
        min
    } else {
        wrapped
    }
}

fn shortest_delta(delta: f64, extent: f64) -> f64 {
    let d = delta.rem_euclid(extent);
    if d > extent / 2.0 {
        d - extent
    } else {
        d
    }
}

/// Bucket indices covering `lo..=hi` on an axis of `count` buckets that wraps
fn wrapped_range(lo: f64, hi: f64, count: i64) -> Vec<i64> {
    if hi - lo + 1.0 >= count as f64 {
        return (0..count).collect();
    }
    let (lo, hi) = (lo as i64, hi as i64);
    (lo..=hi).map(|k| k.rem_euclid(count)).collect()
}
