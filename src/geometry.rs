//! The brush geometry container: a closed convex 2-manifold mesh owned by
//! one editor document at a time.
//!
//! `BrushGeometry` owns four pools (vertices, edges, sides, faces) and
//! keeps its cached bounds and centroid in step with every mutation. The
//! cut lives in [`crate::cut`], dragging in [`crate::drag`]; this module
//! provides construction, rigid/affine transforms, picking and lookup
//! queries, and the topology checker.

use glam::{DQuat, DVec3};
use rustc_hash::FxHashMap;

use crate::elements::{Edge, EdgeIdx, Face, FaceIdx, Side, SideIdx, Vertex, VertexIdx, pred};
use crate::math::{
    self, Axis, BoundingBox, Plane, PointStatus, Ray, project_to_dominant_plane,
};
use crate::pool::Pool;
use crate::position_set::PositionSet;

/// Numerical collapse detected mid-algorithm. The caller is expected to
/// discard the in-flight mutation and restore a saved snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeometryError {
    /// A side-split scan could not locate two complementary keep/drop
    /// transitions.
    InvalidSideSplit { side: SideIdx },
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSideSplit { side } => {
                write!(f, "invalid brush detected during split of side {side:?}")
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Topology validation errors.
///
/// These indicate inconsistencies in the mesh structure, typically the
/// result of numerical issues in the incremental algorithms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopologyError {
    /// `V - E + F` is not 2: the mesh is no longer a topological sphere.
    EulerMismatch {
        vertices: usize,
        edges: usize,
        sides: usize,
        actual: i64,
    },
    /// A side lists an edge that does not name it as a neighbour.
    ForeignEdge { side: SideIdx, edge: EdgeIdx },
    /// A side lists an edge that is gone from the edge pool.
    MissingEdge { side: SideIdx, edge: EdgeIdx },
    /// A side lists a vertex that is gone from the vertex pool.
    MissingVertex { side: SideIdx, vertex: VertexIdx },
    /// `side.vertices[i]` disagrees with `side.edges[i].start_vertex(side)`.
    CycleMismatch { side: SideIdx, index: usize },
    /// A vertex belongs to no side.
    OrphanVertex { vertex: VertexIdx },
    /// Two vertices occupy the same position under the tolerance.
    DuplicateVertexPosition { first: VertexIdx, second: VertexIdx },
    /// An edge was listed by a number of sides other than two.
    EdgeVisitCount { edge: EdgeIdx, visits: usize },
    /// An edge's two neighbours are not two distinct sides.
    IndistinctNeighbours { edge: EdgeIdx },
    /// Two edges span the same vertex pair.
    DuplicateEdge { first: EdgeIdx, second: EdgeIdx },
    /// A side has fewer than three vertices.
    DegenerateSide { side: SideIdx, vertex_count: usize },
    /// A side's defining vertices are collinear.
    CollinearSide { side: SideIdx },
    /// A vertex lies strictly outside the plane of a side (convexity
    /// audit only, see [`BrushGeometry::check_convex`]).
    ConvexityViolation { side: SideIdx, vertex: VertexIdx },
}

impl std::fmt::Display for TopologyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EulerMismatch {
                vertices,
                edges,
                sides,
                actual,
            } => write!(
                f,
                "Euler mismatch: V={vertices}, E={edges}, F={sides}, χ={actual} (expected 2)"
            ),
            Self::ForeignEdge { side, edge } => {
                write!(f, "edge {edge:?} of side {side:?} does not name it as a neighbour")
            }
            Self::MissingEdge { side, edge } => {
                write!(f, "edge {edge:?} of side {side:?} is missing from the edge pool")
            }
            Self::MissingVertex { side, vertex } => {
                write!(f, "vertex {vertex:?} of side {side:?} is missing from the vertex pool")
            }
            Self::CycleMismatch { side, index } => {
                write!(f, "vertex/edge cycles of side {side:?} disagree at position {index}")
            }
            Self::OrphanVertex { vertex } => {
                write!(f, "vertex {vertex:?} belongs to no side")
            }
            Self::DuplicateVertexPosition { first, second } => {
                write!(f, "vertices {first:?} and {second:?} occupy the same position")
            }
            Self::EdgeVisitCount { edge, visits } => {
                write!(f, "edge {edge:?} was listed by {visits} sides, expected 2")
            }
            Self::IndistinctNeighbours { edge } => {
                write!(f, "edge {edge:?} does not separate two distinct sides")
            }
            Self::DuplicateEdge { first, second } => {
                write!(f, "edges {first:?} and {second:?} span the same vertex pair")
            }
            Self::DegenerateSide { side, vertex_count } => {
                write!(f, "side {side:?} has only {vertex_count} vertices")
            }
            Self::CollinearSide { side } => {
                write!(f, "side {side:?} has collinear defining vertices")
            }
            Self::ConvexityViolation { side, vertex } => {
                write!(f, "vertex {vertex:?} lies outside the plane of side {side:?}")
            }
        }
    }
}

impl std::error::Error for TopologyError {}

/// Boundary representation of one convex brush.
#[derive(Clone, Debug)]
pub struct BrushGeometry {
    pub(crate) vertices: Pool<VertexIdx, Vertex>,
    pub(crate) edges: Pool<EdgeIdx, Edge>,
    pub(crate) sides: Pool<SideIdx, Side>,
    pub(crate) faces: Pool<FaceIdx, Face>,
    pub(crate) bounds: BoundingBox,
    pub(crate) center: DVec3,
}

impl BrushGeometry {
    /// Canonical cuboid over `bounds`: 8 vertices, 12 edges, 6 sides, no
    /// faces attached yet. Faces arrive through
    /// [`add_face`](Self::add_face), one per bounding plane of the desired
    /// brush.
    #[must_use]
    pub fn from_bounds(bounds: BoundingBox) -> Self {
        let mut geometry = Self {
            vertices: Pool::new(),
            edges: Pool::new(),
            sides: Pool::new(),
            faces: Pool::new(),
            bounds,
            center: bounds.center(),
        };

        let (min, max) = (bounds.min, bounds.max);
        // Corner naming: l/r = x min/max, f/b = y min/max, d/u = z min/max.
        let lfd = geometry.vertices.insert(Vertex::new(DVec3::new(min.x, min.y, min.z)));
        let lfu = geometry.vertices.insert(Vertex::new(DVec3::new(min.x, min.y, max.z)));
        let lbd = geometry.vertices.insert(Vertex::new(DVec3::new(min.x, max.y, min.z)));
        let lbu = geometry.vertices.insert(Vertex::new(DVec3::new(min.x, max.y, max.z)));
        let rfd = geometry.vertices.insert(Vertex::new(DVec3::new(max.x, min.y, min.z)));
        let rfu = geometry.vertices.insert(Vertex::new(DVec3::new(max.x, min.y, max.z)));
        let rbd = geometry.vertices.insert(Vertex::new(DVec3::new(max.x, max.y, min.z)));
        let rbu = geometry.vertices.insert(Vertex::new(DVec3::new(max.x, max.y, max.z)));

        let lfd_lbd = geometry.edges.insert(Edge::new(lfd, lbd));
        let lbd_lbu = geometry.edges.insert(Edge::new(lbd, lbu));
        let lbu_lfu = geometry.edges.insert(Edge::new(lbu, lfu));
        let lfu_lfd = geometry.edges.insert(Edge::new(lfu, lfd));
        let rfd_rfu = geometry.edges.insert(Edge::new(rfd, rfu));
        let rfu_rbu = geometry.edges.insert(Edge::new(rfu, rbu));
        let rbu_rbd = geometry.edges.insert(Edge::new(rbu, rbd));
        let rbd_rfd = geometry.edges.insert(Edge::new(rbd, rfd));
        let lfu_rfu = geometry.edges.insert(Edge::new(lfu, rfu));
        let rfd_lfd = geometry.edges.insert(Edge::new(rfd, lfd));
        let lbd_rbd = geometry.edges.insert(Edge::new(lbd, rbd));
        let rbu_lbu = geometry.edges.insert(Edge::new(rbu, lbu));

        const NONE: [bool; 4] = [false; 4];
        const ALL: [bool; 4] = [true; 4];
        const ODD: [bool; 4] = [false, true, false, true];

        geometry.new_side_from_edges(&[lfd_lbd, lbd_lbu, lbu_lfu, lfu_lfd], &NONE);
        geometry.new_side_from_edges(&[rfd_rfu, rfu_rbu, rbu_rbd, rbd_rfd], &NONE);
        geometry.new_side_from_edges(&[lfu_rfu, rfd_rfu, rfd_lfd, lfu_lfd], &ODD);
        geometry.new_side_from_edges(&[rbu_lbu, lbd_lbu, lbd_rbd, rbu_rbd], &ODD);
        geometry.new_side_from_edges(&[lbu_lfu, rbu_lbu, rfu_rbu, lfu_rfu], &ALL);
        geometry.new_side_from_edges(&[rfd_lfd, rbd_rfd, lbd_rbd, lfd_lbd], &ALL);

        geometry.recompute_bounds_center();
        geometry
    }

    // Counts and basic queries

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    #[must_use]
    pub fn side_count(&self) -> usize {
        self.sides.len()
    }

    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    #[inline]
    #[must_use]
    pub const fn center(&self) -> DVec3 {
        self.center
    }

    /// Every side realises a face. False only between construction and the
    /// completion of the caller's [`add_faces`](Self::add_faces) pass.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.sides.iter().all(|(_, side)| side.face.is_some())
    }

    // Element access

    #[must_use]
    pub fn vertex(&self, index: VertexIdx) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    #[must_use]
    pub fn edge(&self, index: EdgeIdx) -> Option<&Edge> {
        self.edges.get(index)
    }

    #[must_use]
    pub fn side(&self, index: SideIdx) -> Option<&Side> {
        self.sides.get(index)
    }

    #[must_use]
    pub fn face(&self, index: FaceIdx) -> Option<&Face> {
        self.faces.get(index)
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexIdx, &Vertex)> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeIdx, &Edge)> {
        self.edges.iter()
    }

    pub fn sides(&self) -> impl Iterator<Item = (SideIdx, &Side)> {
        self.sides.iter()
    }

    pub fn faces(&self) -> impl Iterator<Item = (FaceIdx, &Face)> {
        self.faces.iter()
    }

    // Lookup by position

    /// Vertex at `position`, under the global tolerance.
    #[must_use]
    pub fn find_vertex(&self, position: DVec3) -> Option<VertexIdx> {
        self.vertices
            .iter()
            .find(|(_, v)| math::points_equal(v.position, position))
            .map(|(i, _)| i)
    }

    /// Edge spanning the two positions, in either direction.
    #[must_use]
    pub fn find_edge(&self, p1: DVec3, p2: DVec3) -> Option<EdgeIdx> {
        self.edges
            .iter()
            .find(|(_, e)| {
                let s = self.vertices[e.start].position;
                let t = self.vertices[e.end].position;
                (math::points_equal(s, p1) && math::points_equal(t, p2))
                    || (math::points_equal(s, p2) && math::points_equal(t, p1))
            })
            .map(|(i, _)| i)
    }

    /// Side whose boundary cycle matches `positions` under some rotation.
    #[must_use]
    pub fn find_side(&self, positions: &[DVec3]) -> Option<SideIdx> {
        let n = positions.len();
        for (side_idx, side) in self.sides.iter() {
            if side.vertices.len() != n {
                continue;
            }
            for start in 0..n {
                let matches = (0..n).all(|k| {
                    let p = self.vertices[side.vertices[(start + k) % n]].position;
                    math::points_equal(p, positions[k])
                });
                if matches {
                    return Some(side_idx);
                }
            }
        }
        None
    }

    /// All sides around `vertex`, in traversal order around it.
    ///
    /// # Panics
    /// Panics when the mesh is not closed (an incident edge misses a
    /// neighbour).
    #[must_use]
    pub fn incident_sides(&self, vertex: VertexIdx) -> Vec<SideIdx> {
        let Some((mut edge_idx, _)) = self.edges.iter().find(|(_, e)| e.has_vertex(vertex)) else {
            return Vec::new();
        };

        let side_of = |edge: &Edge| {
            if edge.start == vertex { edge.right } else { edge.left }
        };

        let mut result = Vec::new();
        let mut side_idx = side_of(&self.edges[edge_idx]).unwrap();
        loop {
            result.push(side_idx);
            let side = &self.sides[side_idx];
            let i = side
                .edges
                .iter()
                .position(|&e| e == edge_idx)
                .unwrap();
            edge_idx = side.edges[pred(i, side.edges.len())];
            side_idx = side_of(&self.edges[edge_idx]).unwrap();
            if side_idx == result[0] {
                break;
            }
        }
        result
    }

    /// Is `point` inside the brush (on or below every side's plane)?
    #[must_use]
    pub fn contains_point(&self, point: DVec3) -> bool {
        self.sides.iter().all(|(side_idx, _)| {
            self.side_plane(side_idx)
                .is_some_and(|plane| plane.point_status(point) != PointStatus::Above)
        })
    }

    // Picking

    /// Frontmost side hit by `ray`, with its hit distance.
    #[must_use]
    pub fn pick_ray(&self, ray: &Ray) -> Option<(SideIdx, f64)> {
        self.sides
            .iter()
            .filter_map(|(side_idx, _)| {
                self.side_intersect_ray(side_idx, ray).map(|d| (side_idx, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Distance along `ray` to side `side_idx`, or `None` when the ray
    /// misses the polygon or approaches it from behind.
    #[must_use]
    pub fn side_intersect_ray(&self, side_idx: SideIdx, ray: &Ray) -> Option<f64> {
        let side = self.sides.get(side_idx)?;
        let boundary = match side.face {
            Some(face) => self.faces[face].boundary(),
            None => self.side_plane(side_idx)?,
        };

        // Front-facing hits only.
        if !math::neg(boundary.normal.dot(ray.direction)) {
            return None;
        }
        let dist = boundary.intersect_ray(ray)?;
        let hit = ray.point_at(dist);

        // Crossing count against the +X axis in the dominant coordinate
        // plane, with the hit point at the origin. Odd count = inside.
        let project = |p: DVec3| {
            let (u, v) = project_to_dominant_plane(p, boundary.normal);
            let (hu, hv) = project_to_dominant_plane(hit, boundary.normal);
            (u - hu, v - hv)
        };

        let mut crossings = 0u32;
        let (mut x0, mut y0) = project(self.vertices[*side.vertices.last()?].position);
        for &v in &side.vertices {
            let (x1, y1) = project(self.vertices[v].position);
            if (math::zero(x0) && math::zero(y0)) || (math::zero(x1) && math::zero(y1)) {
                // Hit point coincides with a polygon corner.
                crossings = 1;
                break;
            }

            // The segment crosses the +X axis when its endpoints straddle
            // y = 0 (zero counting as negative) and the crossing abscissa
            // is non-negative.
            if (y0 > 0.0 && y1 <= 0.0) || (y0 <= 0.0 && y1 > 0.0) {
                if x0 > 0.0 && x1 > 0.0 {
                    crossings += 1;
                } else if (x0 > 0.0 && x1 <= 0.0) || (x0 <= 0.0 && x1 > 0.0) {
                    let x = -y0 * (x1 - x0) / (y1 - y0) + x0;
                    if x >= 0.0 {
                        crossings += 1;
                    }
                }
            }
            (x0, y0) = (x1, y1);
        }

        (crossings % 2 == 1).then_some(dist)
    }

    /// Closest edge to `ray` within `max_distance_squared` of it, with the
    /// ray distance of the closest approach.
    #[must_use]
    pub fn pick_edge(&self, ray: &Ray, max_distance_squared: f64) -> Option<(EdgeIdx, f64)> {
        self.edges
            .iter()
            .filter_map(|(edge_idx, edge)| {
                let (dist_sq, ray_dist) = self.edge_distance_to_ray(edge, ray)?;
                (dist_sq <= max_distance_squared).then_some((edge_idx, ray_dist, dist_sq))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(edge_idx, ray_dist, _)| (edge_idx, ray_dist))
    }

    /// Squared distance of the closest approach between an edge segment
    /// and `ray`, plus the ray parameter of that approach. `None` when the
    /// approach lies behind the ray origin.
    fn edge_distance_to_ray(&self, edge: &Edge, ray: &Ray) -> Option<(f64, f64)> {
        let a = self.vertices[edge.start].position;
        let b = self.vertices[edge.end].position;
        let u = b - a;
        let w = a - ray.origin;

        let uu = u.dot(u);
        let ud = u.dot(ray.direction);
        let dd = ray.direction.dot(ray.direction);
        let uw = u.dot(w);
        let dw = ray.direction.dot(w);
        let denom = uu * dd - ud * ud;

        let s = if math::zero(denom) {
            0.0
        } else {
            ((ud * dw - dd * uw) / denom).clamp(0.0, 1.0)
        };
        let t = (dw + s * ud) / dd;
        if t < 0.0 {
            return None;
        }

        let offset = w + u * s - ray.direction * t;
        Some((offset.length_squared(), t))
    }

    /// Where does the vertex cloud sit relative to the plane orthogonal to
    /// `direction` through `origin`? `Inside` means the ray plane passes
    /// through the cloud.
    #[must_use]
    pub fn vertex_status_from_ray(&self, origin: DVec3, direction: DVec3) -> PointStatus {
        let ray = Ray::new(origin, direction);
        let mut above = 0usize;
        let mut below = 0usize;
        for (_, vertex) in self.vertices.iter() {
            match ray.point_status(vertex.position) {
                PointStatus::Above => above += 1,
                PointStatus::Below => below += 1,
                PointStatus::Inside => {}
            }
            if above > 0 && below > 0 {
                return PointStatus::Inside;
            }
        }
        if above > 0 { PointStatus::Above } else { PointStatus::Below }
    }

    // Transforms

    /// Translate every vertex by `delta`.
    pub fn translate(&mut self, delta: DVec3) {
        for index in self.vertices.indices() {
            self.vertices[index].position += delta;
        }
        self.bounds = self.bounds.translated(delta);
        self.center += delta;
        self.refresh_face_points();
    }

    /// Exact quarter-turn about `rotation_center`. Pure coordinate
    /// permutation, so integer positions stay integer.
    pub fn rotate90(&mut self, axis: Axis, rotation_center: DVec3, clockwise: bool) {
        for index in self.vertices.indices() {
            let p = self.vertices[index].position;
            self.vertices[index].position = math::rotate90(p, axis, rotation_center, clockwise);
        }
        self.recompute_bounds_center();
        self.refresh_face_points();
    }

    /// Arbitrary rotation about `rotation_center`.
    pub fn rotate(&mut self, rotation: DQuat, rotation_center: DVec3) {
        for index in self.vertices.indices() {
            let p = self.vertices[index].position;
            self.vertices[index].position = rotation_center + rotation * (p - rotation_center);
        }
        self.recompute_bounds_center();
        self.refresh_face_points();
    }

    /// Mirror across the axis-orthogonal plane through `flip_center`.
    ///
    /// Mirroring reverses every winding, so each edge's traversal is
    /// reversed and each side's cycles are reversed to keep outward
    /// normals outward and the half-edge convention intact.
    pub fn flip(&mut self, axis: Axis, flip_center: DVec3) {
        for index in self.vertices.indices() {
            let p = self.vertices[index].position;
            self.vertices[index].position = math::flipped(p, axis, flip_center);
        }
        for index in self.edges.indices() {
            let edge = &mut self.edges[index];
            std::mem::swap(&mut edge.start, &mut edge.end);
        }
        for index in self.sides.indices() {
            self.sides[index].flip();
        }
        self.recompute_bounds_center();
        self.refresh_face_points();
    }

    /// Re-align the brush with the editor grid.
    ///
    /// TODO: blocked on the surrounding editor supplying a grid size;
    /// until then this is deliberately a no-op so the mutation surface is
    /// already in place for callers.
    pub fn snap(&mut self) {}

    // Internal plumbing shared by the cut and drag algorithms

    /// Build a side over existing edges. `invert[i]` selects which end of
    /// `edge_indices[i]` starts the traversal: an inverted edge is claimed
    /// as the side's left neighbour, a straight one as its right.
    pub(crate) fn new_side_from_edges(
        &mut self,
        edge_indices: &[EdgeIdx],
        invert: &[bool],
    ) -> SideIdx {
        debug_assert_eq!(edge_indices.len(), invert.len());
        let side_idx = self.sides.insert(Side::default());
        let mut vertices = Vec::with_capacity(edge_indices.len());
        for (&edge_idx, &inv) in edge_indices.iter().zip(invert) {
            let edge = &mut self.edges[edge_idx];
            if inv {
                edge.left = Some(side_idx);
                vertices.push(edge.end);
            } else {
                edge.right = Some(side_idx);
                vertices.push(edge.start);
            }
        }
        let side = &mut self.sides[side_idx];
        side.vertices = vertices;
        side.edges = edge_indices.to_vec();
        side_idx
    }

    /// Plane through the side's first three vertices. `None` when they are
    /// collinear.
    pub(crate) fn side_plane(&self, side_idx: SideIdx) -> Option<Plane> {
        let side = self.sides.get(side_idx)?;
        if side.vertices.len() < 3 {
            return None;
        }
        Plane::from_points(
            self.vertices[side.vertices[0]].position,
            self.vertices[side.vertices[1]].position,
            self.vertices[side.vertices[2]].position,
        )
    }

    /// Centroid of the side's vertex positions.
    pub(crate) fn side_centroid(&self, side_idx: SideIdx) -> DVec3 {
        let side = &self.sides[side_idx];
        let sum: DVec3 = side
            .vertices
            .iter()
            .map(|&v| self.vertices[v].position)
            .sum();
        sum / side.vertices.len() as f64
    }

    pub(crate) fn recompute_bounds_center(&mut self) {
        let mut bounds = BoundingBox::empty();
        let mut sum = DVec3::ZERO;
        let mut count = 0usize;
        for (_, vertex) in self.vertices.iter() {
            bounds.expand_to_include(vertex.position);
            sum += vertex.position;
            count += 1;
        }
        if count > 0 {
            self.bounds = bounds;
            self.center = sum / count as f64;
        }
    }

    /// Ask every attached face to re-derive its three-point representation
    /// from its current side polygon.
    pub(crate) fn refresh_face_points(&mut self) {
        for side_idx in self.sides.indices() {
            let side = &self.sides[side_idx];
            let Some(face_idx) = side.face else { continue };
            if side.vertices.len() < 3 {
                continue;
            }
            let p0 = self.vertices[side.vertices[0]].position;
            let p1 = self.vertices[side.vertices[1]].position;
            let p2 = self.vertices[side.vertices[2]].position;
            if !self.faces[face_idx].update_points(p0, p1, p2) {
                // Keep the last known-good boundary rather than poisoning
                // the face with a degenerate plane.
                tracing::warn!(?side_idx, "skipped face update: side points are collinear");
            }
        }
    }

    // Invariant checker

    /// Full topological audit. Cheap enough for tests and debug
    /// assertions between surgery phases, not meant for per-frame use.
    ///
    /// # Errors
    /// The first inconsistency found, in checking order: Euler
    /// characteristic, per-side cycle consistency, element cross-
    /// references, duplicate detection.
    #[allow(clippy::cast_possible_wrap)]
    pub fn check(&self) -> Result<(), TopologyError> {
        let v = self.vertices.len();
        let e = self.edges.len();
        let f = self.sides.len();
        let euler = v as i64 - e as i64 + f as i64;
        if euler != 2 {
            return Err(TopologyError::EulerMismatch {
                vertices: v,
                edges: e,
                sides: f,
                actual: euler,
            });
        }

        let mut vertex_seen: FxHashMap<VertexIdx, usize> = FxHashMap::default();
        let mut edge_visits: FxHashMap<EdgeIdx, usize> = FxHashMap::default();

        for (side_idx, side) in self.sides.iter() {
            if side.vertices.len() < 3 {
                return Err(TopologyError::DegenerateSide {
                    side: side_idx,
                    vertex_count: side.vertices.len(),
                });
            }
            if side.vertices.len() != side.edges.len() {
                return Err(TopologyError::CycleMismatch {
                    side: side_idx,
                    index: side.vertices.len().min(side.edges.len()),
                });
            }
            for (i, &edge_idx) in side.edges.iter().enumerate() {
                let Some(edge) = self.edges.get(edge_idx) else {
                    return Err(TopologyError::MissingEdge {
                        side: side_idx,
                        edge: edge_idx,
                    });
                };
                if edge.left != Some(side_idx) && edge.right != Some(side_idx) {
                    return Err(TopologyError::ForeignEdge {
                        side: side_idx,
                        edge: edge_idx,
                    });
                }
                *edge_visits.entry(edge_idx).or_insert(0) += 1;

                let vertex = edge.start_vertex(side_idx);
                if side.vertices[i] != vertex {
                    return Err(TopologyError::CycleMismatch {
                        side: side_idx,
                        index: i,
                    });
                }
                if !self.vertices.contains(vertex) {
                    return Err(TopologyError::MissingVertex {
                        side: side_idx,
                        vertex,
                    });
                }
                *vertex_seen.entry(vertex).or_insert(0) += 1;
            }
        }

        for (vertex_idx, _) in self.vertices.iter() {
            if !vertex_seen.contains_key(&vertex_idx) {
                return Err(TopologyError::OrphanVertex { vertex: vertex_idx });
            }
        }

        let mut positions = PositionSet::new();
        let mut recorded: Vec<(VertexIdx, DVec3)> = Vec::with_capacity(v);
        for (vertex_idx, vertex) in self.vertices.iter() {
            if !positions.insert_if_unique(vertex.position) {
                let first = recorded
                    .iter()
                    .find(|(_, p)| math::points_equal(*p, vertex.position))
                    .map_or(vertex_idx, |(i, _)| *i);
                return Err(TopologyError::DuplicateVertexPosition {
                    first,
                    second: vertex_idx,
                });
            }
            recorded.push((vertex_idx, vertex.position));
        }

        let edge_indices = self.edges.indices();
        for (pos, &edge_idx) in edge_indices.iter().enumerate() {
            let edge = &self.edges[edge_idx];
            match edge_visits.get(&edge_idx) {
                Some(&2) => {}
                other => {
                    return Err(TopologyError::EdgeVisitCount {
                        edge: edge_idx,
                        visits: other.copied().unwrap_or(0),
                    });
                }
            }
            if edge.left.is_none() || edge.right.is_none() || edge.left == edge.right {
                return Err(TopologyError::IndistinctNeighbours { edge: edge_idx });
            }
            for &other_idx in &edge_indices[pos + 1..] {
                let other = &self.edges[other_idx];
                let same = (edge.start == other.start && edge.end == other.end)
                    || (edge.start == other.end && edge.end == other.start);
                if same {
                    return Err(TopologyError::DuplicateEdge {
                        first: edge_idx,
                        second: other_idx,
                    });
                }
            }
        }

        for (side_idx, _) in self.sides.iter() {
            if self.side_plane(side_idx).is_none() {
                return Err(TopologyError::CollinearSide { side: side_idx });
            }
        }

        Ok(())
    }

    /// Convexity audit: every vertex must sit on or below the plane of
    /// every side, within `tolerance`.
    ///
    /// Separate from [`check`](Self::check) because grid snapping can
    /// legitimately push a vertex a sub-unit distance above a far side's
    /// plane; callers pick a tolerance matching how exact their geometry
    /// is.
    ///
    /// # Errors
    /// [`TopologyError::ConvexityViolation`] naming the offending pair.
    pub fn check_convex(&self, tolerance: f64) -> Result<(), TopologyError> {
        for (side_idx, side) in self.sides.iter() {
            let Some(plane) = self.side_plane(side_idx) else {
                return Err(TopologyError::CollinearSide { side: side_idx });
            };
            for (vertex_idx, vertex) in self.vertices.iter() {
                if side.vertices.contains(&vertex_idx) {
                    continue;
                }
                if plane.signed_distance(vertex.position) > tolerance {
                    return Err(TopologyError::ConvexityViolation {
                        side: side_idx,
                        vertex: vertex_idx,
                    });
                }
            }
        }
        Ok(())
    }
}
