//! Face addition: intersecting the mesh with one oriented half-space.
//!
//! The mark-split-drop cut, in four phases:
//!
//! 1. Classify every vertex against the new plane (keep / drop /
//!    undecided) and short-circuit to [`CutResult::Redundant`] or
//!    [`CutResult::Null`] from the counts alone.
//! 2. Classify edges from their endpoint marks; a straddling edge is
//!    split at its plane intersection, which is snapped to the integer
//!    grid and replaces the dropped endpoint.
//! 3. Walk each side's edge cycle, dropping sides wholly above the plane
//!    and replacing each cut side's dropped arc with a single new edge.
//! 4. Chain the collected new edges head-to-tail into the polygon of the
//!    new side, attach the face, and sweep dropped elements.
//!
//! Marks live in per-operation maps keyed by handle; an absent entry is
//! "unknown". Between operations no mark state exists at all.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::elements::{Edge, EdgeIdx, Face, FaceIdx, Side, SideIdx, Vertex, VertexIdx};
use crate::geometry::{BrushGeometry, GeometryError};
use crate::math::{self, Plane, PointStatus};

/// Outcome of cutting the mesh with one face's half-space.
#[derive(Debug)]
pub enum CutResult {
    /// The plane does not cut the polyhedron; the mesh is unchanged and
    /// the face is handed back unused.
    Redundant(Face),
    /// The plane eliminates the whole brush. The mesh is no longer
    /// meaningful and should be discarded, along with the returned face.
    Null(Face),
    /// The plane properly cut the mesh. The face is attached to the new
    /// side; faces of sides that fell wholly above the plane are returned
    /// for the caller to retire.
    Split {
        face: FaceIdx,
        dropped_faces: Vec<Face>,
    },
}

/// Accumulated outcome of rebuilding a brush from a full plane list.
#[derive(Debug, Default)]
pub struct CutSummary {
    /// A plane eliminated the brush; the mesh is meaningless.
    pub nullified: bool,
    /// Faces attached by the cuts, in order.
    pub attached: Vec<FaceIdx>,
    /// Faces that were redundant and never attached.
    pub redundant: Vec<Face>,
    /// Faces detached from dropped sides.
    pub dropped_faces: Vec<Face>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VertexMark {
    Drop,
    Keep,
    Undecided,
    New,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EdgeMark {
    Drop,
    Keep,
    Split,
    Undecided,
    New,
}

/// How one side relates to the cut plane.
enum SideClass {
    Keep,
    /// Kept, but one boundary edge lies on the plane and doubles as an
    /// edge of the new side.
    KeepBridge(EdgeIdx),
    Drop,
    /// Cut; the dropped arc was replaced by this new edge.
    Split(EdgeIdx),
}

/// Edge classification from its two endpoint marks.
fn edge_mark(start: VertexMark, end: VertexMark) -> EdgeMark {
    let mut keep = 0u8;
    let mut drop = 0u8;
    for mark in [start, end] {
        match mark {
            VertexMark::Keep => keep += 1,
            VertexMark::Drop => drop += 1,
            VertexMark::Undecided => {}
            VertexMark::New => debug_assert!(false, "new vertices are not classified"),
        }
    }
    if keep == 1 && drop == 1 {
        EdgeMark::Split
    } else if keep > 0 {
        EdgeMark::Keep
    } else if drop > 0 {
        EdgeMark::Drop
    } else {
        EdgeMark::Undecided
    }
}

impl BrushGeometry {
    /// Intersect the mesh with `face`'s half-space.
    ///
    /// Requires the geometry in a closed convex state (all invariants
    /// holding); re-establishes them before returning `Ok`.
    ///
    /// # Errors
    /// [`GeometryError::InvalidSideSplit`] when a side's edge cycle does
    /// not produce the two complementary keep/drop transitions a convex
    /// section guarantees, which signals numerical collapse. The mesh is
    /// left inconsistent; the caller discards it and restores a snapshot.
    pub fn add_face(&mut self, face: Face) -> Result<CutResult, GeometryError> {
        let boundary = face.boundary();

        // Phase 1: mark vertices.
        let mut vertex_marks: FxHashMap<VertexIdx, VertexMark> = FxHashMap::default();
        let mut keep = 0usize;
        let mut drop = 0usize;
        let mut undecided = 0usize;
        for (vertex_idx, vertex) in self.vertices.iter() {
            let mark = match boundary.point_status(vertex.position) {
                PointStatus::Above => {
                    drop += 1;
                    VertexMark::Drop
                }
                PointStatus::Below => {
                    keep += 1;
                    VertexMark::Keep
                }
                PointStatus::Inside => {
                    undecided += 1;
                    VertexMark::Undecided
                }
            };
            vertex_marks.insert(vertex_idx, mark);
        }

        let total = self.vertices.len();
        if keep + undecided == total {
            return Ok(CutResult::Redundant(face));
        }
        if drop + undecided == total {
            return Ok(CutResult::Null(face));
        }

        // Phase 2: mark edges, splitting the straddling ones.
        let mut edge_marks: FxHashMap<EdgeIdx, EdgeMark> = FxHashMap::default();
        for edge_idx in self.edges.indices() {
            let (start, end) = {
                let edge = &self.edges[edge_idx];
                (edge.start, edge.end)
            };
            let mark = edge_mark(vertex_marks[&start], vertex_marks[&end]);
            if mark == EdgeMark::Split {
                let vertex = self.split_edge_at(edge_idx, &boundary, &vertex_marks);
                vertex_marks.insert(vertex, VertexMark::New);
            }
            edge_marks.insert(edge_idx, mark);
        }

        // Phase 3: classify sides, dropping and rewriting as needed.
        let mut new_edges: Vec<EdgeIdx> = Vec::new();
        let mut dropped_faces: Vec<Face> = Vec::new();
        for side_idx in self.sides.indices() {
            match self.classify_side(side_idx, &vertex_marks, &mut edge_marks)? {
                SideClass::Keep => {}
                SideClass::KeepBridge(bridge) => {
                    // An on-plane edge of a kept side doubles as an edge of
                    // the new side; orient it so the kept side stays on
                    // its right.
                    if self.edges[bridge].right != Some(side_idx) {
                        self.edges[bridge].flip();
                    }
                    new_edges.push(bridge);
                }
                SideClass::Split(new_edge) => new_edges.push(new_edge),
                SideClass::Drop => {
                    let side = self
                        .sides
                        .remove(side_idx)
                        .unwrap_or_else(|| unreachable!("side was live"));
                    if let Some(face_idx) = side.face
                        && let Some(mut dropped) = self.faces.remove(face_idx)
                    {
                        dropped.side = None;
                        dropped_faces.push(dropped);
                    }
                }
            }
        }

        // Phase 4: chain the new edges head-to-tail into a cycle. Each new
        // edge keeps its originating side on its right, so the new side
        // traverses them all as their left neighbour, end to start.
        for i in 0..new_edges.len().saturating_sub(1) {
            let chain_start = self.edges[new_edges[i]].start;
            for j in i + 2..new_edges.len() {
                if self.edges[new_edges[j]].end == chain_start {
                    new_edges.swap(i + 1, j);
                    break;
                }
            }
        }

        let face_idx = self.faces.insert(face);
        let side_idx = self.new_side_for_face(face_idx, &new_edges);

        // Sweep dropped vertices and edges, forget the marks.
        for (&vertex_idx, &mark) in &vertex_marks {
            if mark == VertexMark::Drop {
                self.vertices.remove(vertex_idx);
            }
        }
        for (&edge_idx, &mark) in &edge_marks {
            if mark == EdgeMark::Drop {
                self.edges.remove(edge_idx);
            }
        }

        #[cfg(debug_assertions)]
        for (side_idx, side) in self.sides.iter() {
            debug_assert_eq!(side.vertices.len(), side.edges.len());
            for (j, &edge_idx) in side.edges.iter().enumerate() {
                debug_assert_eq!(self.edges[edge_idx].start_vertex(side_idx), side.vertices[j]);
            }
        }

        self.recompute_bounds_center();
        debug!(
            new_side = ?side_idx,
            dropped = dropped_faces.len(),
            vertices = self.vertices.len(),
            "cut mesh with face plane"
        );
        Ok(CutResult::Split {
            face: face_idx,
            dropped_faces,
        })
    }

    /// Rebuild the brush from a plane list, one cut at a time. Stops early
    /// when a plane nullifies the brush, which leaves the mesh
    /// meaningless.
    ///
    /// # Errors
    /// Propagates [`GeometryError`] from the individual cuts.
    pub fn add_faces(
        &mut self,
        faces: impl IntoIterator<Item = Face>,
    ) -> Result<CutSummary, GeometryError> {
        let mut summary = CutSummary::default();
        for face in faces {
            match self.add_face(face)? {
                CutResult::Redundant(face) => summary.redundant.push(face),
                CutResult::Null(_) => {
                    summary.nullified = true;
                    return Ok(summary);
                }
                CutResult::Split {
                    face,
                    dropped_faces,
                } => {
                    summary.attached.push(face);
                    summary.dropped_faces.extend(dropped_faces);
                }
            }
        }
        Ok(summary)
    }

    /// Split a straddling edge at its intersection with `plane`: allocate
    /// a vertex there (snapped to the grid) and swap it in for the dropped
    /// endpoint.
    fn split_edge_at(
        &mut self,
        edge_idx: EdgeIdx,
        plane: &Plane,
        vertex_marks: &FxHashMap<VertexIdx, VertexMark>,
    ) -> VertexIdx {
        let (start, end) = {
            let edge = &self.edges[edge_idx];
            (edge.start, edge.end)
        };
        let start_pos = self.vertices[start].position;
        let end_pos = self.vertices[end].position;

        // The endpoints straddle the plane strictly, so the denominator
        // cannot vanish.
        let d_start = plane.signed_distance(start_pos);
        let d_end = plane.signed_distance(end_pos);
        let position =
            math::snapped(start_pos + (end_pos - start_pos) * (d_start / (d_start - d_end)));

        let vertex = self.vertices.insert(Vertex::new(position));
        let edge = &mut self.edges[edge_idx];
        if vertex_marks[&start] == VertexMark::Drop {
            edge.start = vertex;
        } else {
            edge.end = vertex;
        }
        vertex
    }

    /// Classify one side against the plane from its edge marks, rewriting
    /// a split side's boundary in place.
    ///
    /// Scanning the cycle, the first keep-to-drop transition names the
    /// outgoing split endpoint and the first drop-to-keep transition the
    /// incoming one; failing to find both is the malformed-transition
    /// error of [`GeometryError::InvalidSideSplit`].
    fn classify_side(
        &mut self,
        side_idx: SideIdx,
        vertex_marks: &FxHashMap<VertexIdx, VertexMark>,
        edge_marks: &mut FxHashMap<EdgeIdx, EdgeMark>,
    ) -> Result<SideClass, GeometryError> {
        let count = self.sides[side_idx].edges.len();
        debug_assert!(count >= 3);

        let mut keep = 0usize;
        let mut drop = 0usize;
        let mut undecided = 0usize;
        let mut undecided_edge = None;
        let mut split_out: Option<usize> = None;
        let mut split_in: Option<usize> = None;

        let mut last_mark = edge_marks[&self.sides[side_idx].edges[count - 1]];
        for i in 0..count {
            let edge_idx = self.sides[side_idx].edges[i];
            let mark = edge_marks[&edge_idx];
            match mark {
                EdgeMark::Split => {
                    let start = self.edges[edge_idx].start_vertex(side_idx);
                    if vertex_marks.get(&start) == Some(&VertexMark::Keep) {
                        split_out = Some(i);
                    } else {
                        split_in = Some(i);
                    }
                }
                EdgeMark::Undecided => {
                    undecided += 1;
                    undecided_edge = Some(edge_idx);
                }
                EdgeMark::Keep => {
                    if last_mark == EdgeMark::Drop {
                        split_in = Some(i);
                    }
                    keep += 1;
                }
                EdgeMark::Drop => {
                    if last_mark == EdgeMark::Keep {
                        split_out = Some(if i > 0 { i - 1 } else { count - 1 });
                    }
                    drop += 1;
                }
                EdgeMark::New => debug_assert!(false, "new edges are not in any old cycle"),
            }
            last_mark = mark;
        }

        if keep == count {
            return Ok(SideClass::Keep);
        }
        if undecided == 1 && keep == count - 1 {
            return Ok(SideClass::KeepBridge(
                undecided_edge.unwrap_or_else(|| unreachable!("counted one undecided edge")),
            ));
        }
        if drop + undecided == count {
            return Ok(SideClass::Drop);
        }

        let (Some(out_index), Some(in_index)) = (split_out, split_in) else {
            return Err(GeometryError::InvalidSideSplit { side: side_idx });
        };

        // The replacement edge runs between the two split points, with the
        // cut side on its right; its left neighbour is the new side, wired
        // up later.
        let start = {
            let edge_idx = self.sides[side_idx].edges[out_index];
            self.edges[edge_idx].end_vertex(side_idx)
        };
        let end = {
            let edge_idx = self.sides[side_idx].edges[in_index];
            self.edges[edge_idx].start_vertex(side_idx)
        };
        let mut new_edge = Edge::new(start, end);
        new_edge.right = Some(side_idx);
        let new_edge_idx = self.edges.insert(new_edge);
        edge_marks.insert(new_edge_idx, EdgeMark::New);

        self.sides[side_idx].replace_edges(out_index, in_index, new_edge_idx, &self.edges, side_idx);
        Ok(SideClass::Split(new_edge_idx))
    }

    /// Build the side realising `face_idx` over an already-sorted edge
    /// cycle, claiming each edge as its left neighbour.
    fn new_side_for_face(&mut self, face_idx: FaceIdx, cycle: &[EdgeIdx]) -> SideIdx {
        let side_idx = self.sides.insert(Side::default());
        let mut vertices = Vec::with_capacity(cycle.len());
        for &edge_idx in cycle {
            let edge = &mut self.edges[edge_idx];
            edge.left = Some(side_idx);
            vertices.push(edge.end);
        }
        let side = &mut self.sides[side_idx];
        side.vertices = vertices;
        side.edges = cycle.to_vec();
        side.face = Some(face_idx);
        self.faces[face_idx].side = Some(side_idx);
        side_idx
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use glam::DVec3;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use crate::math::BoundingBox;

    const WORLD: BoundingBox =
        BoundingBox::new(DVec3::splat(-64.0), DVec3::splat(64.0));

    fn unit_cube() -> BrushGeometry {
        BrushGeometry::from_bounds(BoundingBox::new(DVec3::splat(-1.0), DVec3::splat(1.0)))
    }

    /// The six bounding planes of the cube [-1, 1]^3.
    fn cube_faces() -> Vec<Face> {
        [
            (DVec3::X, 1.0),
            (-DVec3::X, 1.0),
            (DVec3::Y, 1.0),
            (-DVec3::Y, 1.0),
            (DVec3::Z, 1.0),
            (-DVec3::Z, 1.0),
        ]
        .into_iter()
        .map(|(n, d)| Face::from_plane(WORLD, Plane::new(n, d)))
        .collect()
    }

    /// A closed unit cube built the way the editor builds brushes: a
    /// world-sized cuboid carved down by the brush's plane list.
    pub(crate) fn closed_cube() -> BrushGeometry {
        let mut brush = BrushGeometry::from_bounds(WORLD);
        let summary = brush.add_faces(cube_faces()).unwrap();
        assert!(!summary.nullified);
        assert!(summary.redundant.is_empty());
        brush
    }

    fn assert_snapped(brush: &BrushGeometry) {
        for (_, v) in brush.vertices() {
            assert!(math::is_snapped(v.position), "unsnapped vertex at {:?}", v.position);
        }
    }

    #[test]
    fn test_rebuild_cube_from_plane_list() {
        let cube = closed_cube();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.edge_count(), 12);
        assert_eq!(cube.side_count(), 6);
        assert!(cube.closed());
        assert_eq!(cube.center(), DVec3::ZERO);
        cube.check().unwrap();
        assert_snapped(&cube);
        // Every face's back-pointer round-trips through its side.
        for (face_idx, face) in cube.faces() {
            let side = face.side().unwrap();
            assert_eq!(cube.side(side).unwrap().face, Some(face_idx));
        }
    }

    #[test]
    fn test_redundant_cut() {
        let mut cube = unit_cube();
        let face = Face::from_plane(WORLD, Plane::new(DVec3::Z, 2.0));
        match cube.add_face(face).unwrap() {
            CutResult::Redundant(_) => {}
            other => panic!("expected Redundant, got {other:?}"),
        }
        assert_eq!(cube.vertex_count(), 8);
        cube.check().unwrap();
    }

    #[test]
    fn test_nullifying_cut() {
        let mut cube = unit_cube();
        let face = Face::from_plane(WORLD, Plane::new(DVec3::Z, -2.0));
        match cube.add_face(face).unwrap() {
            CutResult::Null(_) => {}
            other => panic!("expected Null, got {other:?}"),
        }
    }

    #[test]
    fn test_cut_is_idempotent() {
        let mut cube = unit_cube();
        let plane = Plane::new(DVec3::new(1.0, 1.0, 1.0).normalize(), 2.0 / 3.0_f64.sqrt());
        match cube.add_face(Face::from_plane(WORLD, plane)).unwrap() {
            CutResult::Split { .. } => {}
            other => panic!("expected Split, got {other:?}"),
        }
        // The same plane again no longer cuts anything.
        match cube.add_face(Face::from_plane(WORLD, plane)).unwrap() {
            CutResult::Redundant(_) => {}
            other => panic!("expected Redundant, got {other:?}"),
        }
    }

    #[test]
    fn test_corner_cut_cardinalities() {
        // Chop the (1,1,1) corner with x + y + z = 2: one vertex out,
        // three in, a triangle gained.
        let mut cube = unit_cube();
        let plane = Plane::new(DVec3::ONE.normalize(), 2.0 / 3.0_f64.sqrt());
        let result = cube.add_face(Face::from_plane(WORLD, plane)).unwrap();
        let CutResult::Split { face, .. } = result else {
            panic!("expected Split");
        };

        assert_eq!(cube.vertex_count(), 8 + 2);
        assert_eq!(cube.edge_count(), 12 + 3);
        assert_eq!(cube.side_count(), 6 + 1);
        cube.check().unwrap();
        assert_snapped(&cube);

        // The new side is the triangle through the cut corner's
        // neighbouring edge midpoints.
        let side = cube.face(face).unwrap().side().unwrap();
        assert_eq!(cube.side(side).unwrap().vertices.len(), 3);
        assert!(cube.find_vertex(DVec3::new(1.0, 1.0, 0.0)).is_some());
        assert!(cube.find_vertex(DVec3::new(1.0, 0.0, 1.0)).is_some());
        assert!(cube.find_vertex(DVec3::new(0.0, 1.0, 1.0)).is_some());
        assert!(cube.find_vertex(DVec3::splat(1.0)).is_none());
    }

    #[test]
    fn test_diagonal_cut_through_vertices() {
        // x + y = 0 passes through four cube vertices; the section quad
        // threads through them and the result is a triangular prism.
        let mut cube = unit_cube();
        let plane = Plane::new(DVec3::new(1.0, 1.0, 0.0).normalize(), 0.0);
        let result = cube.add_face(Face::from_plane(WORLD, plane)).unwrap();
        assert!(matches!(result, CutResult::Split { .. }));

        assert_eq!(cube.vertex_count(), 6);
        assert_eq!(cube.edge_count(), 9);
        assert_eq!(cube.side_count(), 5);
        cube.check().unwrap();
        assert_snapped(&cube);
        // Both (1,1,*) corners are gone, the on-plane corners survive.
        assert!(cube.find_vertex(DVec3::new(1.0, 1.0, 1.0)).is_none());
        assert!(cube.find_vertex(DVec3::new(1.0, -1.0, 1.0)).is_some());
        assert!(cube.find_vertex(DVec3::new(-1.0, 1.0, -1.0)).is_some());
    }

    #[test]
    fn test_dropped_faces_are_reported() {
        let mut cube = closed_cube();
        let dropped_ids: Vec<_> = {
            // x + y = 0 drops the +X and +Y sides entirely.
            let plane = Plane::new(DVec3::new(1.0, 1.0, 0.0).normalize(), 0.0);
            let result = cube.add_face(Face::from_plane(WORLD, plane)).unwrap();
            let CutResult::Split { dropped_faces, .. } = result else {
                panic!("expected Split");
            };
            dropped_faces.iter().map(Face::id).collect()
        };
        assert_eq!(dropped_ids.len(), 2);
        assert!(cube.closed());
        assert_eq!(cube.side_count(), 5);
        assert_eq!(cube.face_count(), 5);
        cube.check().unwrap();
    }

    #[test]
    fn test_cut_updates_bounds_and_center() {
        let mut cube = unit_cube();
        // z = 0 halves the cube.
        let plane = Plane::new(DVec3::Z, 0.0);
        let result = cube.add_face(Face::from_plane(WORLD, plane)).unwrap();
        assert!(matches!(result, CutResult::Split { .. }));
        assert_eq!(cube.bounds().max.z, 0.0);
        assert_eq!(cube.bounds().min.z, -1.0);
        assert_eq!(cube.center(), DVec3::new(0.0, 0.0, -0.5));
        cube.check().unwrap();
    }

    #[test]
    fn test_add_faces_reports_null() {
        let mut brush = BrushGeometry::from_bounds(WORLD);
        let faces = vec![
            Face::from_plane(WORLD, Plane::new(DVec3::Z, 1.0)),
            Face::from_plane(WORLD, Plane::new(-DVec3::Z, -2.0)),
        ];
        let summary = brush.add_faces(faces).unwrap();
        assert!(summary.nullified);
        assert_eq!(summary.attached.len(), 1);
    }

    /// Evenly distributed plane normals, far enough apart that snapped
    /// section vertices can never collide.
    fn fibonacci_sphere_normals(n: usize) -> Vec<DVec3> {
        let golden = std::f64::consts::PI * (5.0_f64.sqrt() - 1.0);
        (0..n)
            .map(|i| {
                let y = 1.0 - (i as f64 / (n - 1) as f64) * 2.0;
                let radius = (1.0 - y * y).sqrt();
                let theta = golden * i as f64;
                DVec3::new(theta.cos() * radius, y, theta.sin() * radius).normalize()
            })
            .collect()
    }

    #[test]
    fn test_cut_storm_keeps_invariants() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x6b72_7573);
        for round in 0..8 {
            let mut brush = BrushGeometry::from_bounds(
                BoundingBox::new(DVec3::splat(-32.0), DVec3::splat(32.0)),
            );
            let n = rng.random_range(6..14);
            for normal in fibonacci_sphere_normals(n) {
                let distance = f64::from(rng.random_range(18..24_i32));
                let face = Face::from_plane(WORLD, Plane::new(normal, distance));
                match brush.add_face(face) {
                    Ok(CutResult::Split { .. }) => {
                        brush.check().unwrap_or_else(|e| {
                            panic!("round {round}: invariants broken after cut: {e}")
                        });
                        assert_snapped(&brush);
                    }
                    Ok(CutResult::Redundant(_)) => {}
                    // Offsets stay positive, so the origin stays inside
                    // and no plane can nullify the brush.
                    Ok(CutResult::Null(_)) => panic!("round {round}: unexpected Null"),
                    Err(e) => panic!("round {round}: {e}"),
                }
            }
            assert!(brush.contains_point(DVec3::ZERO));
        }
    }
}
