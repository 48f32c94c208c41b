//! Conversion of polylines into triangle meshes, to draw them as thick lines.
//!
//! Vertices carry their position on the centerline and an extrusion vector;
//! the line width is applied by the shader, so that a mesh stays valid across
//! zoom levels.

use crate::geometry::Point;
use log::trace;

/// Maximum number of vertices addressed by the `u16` indices of one
/// [`MeshSegment`].
pub const MAX_VERTICES_PER_SEGMENT: usize = u16::MAX as usize;

/// Shape of the corners between consecutive segments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineJoin {
    /// Corners are cut flat.
    #[default]
    Bevel,
    /// Corners are extended to a point, falling back to a bevel beyond the
    /// miter limit.
    Miter,
}

/// Shape of the ends of the line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineCap {
    /// The line stops at its end point.
    #[default]
    Butt,
    /// The line extends by half its width beyond its end point.
    Square,
}

/// Style of a generated polyline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolylineGeneratorOptions {
    /// Shape of the corners.
    pub join: LineJoin,
    /// Shape of the start of the line.
    pub begin_cap: LineCap,
    /// Shape of the end of the line.
    pub end_cap: LineCap,
    /// Maximum ratio between the miter length and the line half-width.
    pub miter_limit: f64,
    /// Whether vertices record their normalized position along the line.
    pub vertex_progress: bool,
}

impl Default for PolylineGeneratorOptions {
    fn default() -> Self {
        PolylineGeneratorOptions {
            join: LineJoin::Miter,
            begin_cap: LineCap::Butt,
            end_cap: LineCap::Butt,
            miter_limit: 2.0,
            vertex_progress: true,
        }
    }
}

impl PolylineGeneratorOptions {
    /// Style of route lines: bevel joins and square caps.
    pub fn route() -> Self {
        PolylineGeneratorOptions {
            join: LineJoin::Bevel,
            begin_cap: LineCap::Square,
            end_cap: LineCap::Square,
            ..Default::default()
        }
    }
}

/// Vertex of a line mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineVertex {
    /// Position on the centerline.
    pub position: [f32; 2],
    /// Offset from the centerline, scaled by the half-width of the line.
    pub extrude: [f32; 2],
    /// Normalized distance along the line, to sample color gradients.
    pub progress: f32,
}

/// Range of a mesh drawn with one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshSegment {
    /// First vertex of this segment.
    pub vertex_offset: usize,
    /// Number of vertices of this segment.
    pub vertex_length: usize,
    /// First index of this segment.
    pub index_offset: usize,
    /// Number of indices of this segment.
    pub index_length: usize,
}

/// Triangle mesh of a line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    /// Vertices.
    pub vertices: Vec<LineVertex>,
    /// Triangle indices, relative to the `vertex_offset` of their segment.
    pub indices: Vec<u16>,
    /// Segments, each addressing at most [`MAX_VERTICES_PER_SEGMENT`]
    /// vertices.
    pub segments: Vec<MeshSegment>,
}

impl Mesh {
    /// Checks whether the mesh has no triangle.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns the number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Generator of line meshes.
pub trait Tessellator {
    /// Generates the mesh of a polyline.
    fn generate(&self, points: &[Point<f64>], options: &PolylineGeneratorOptions) -> Mesh;
}

/// Incremental construction of a [`Mesh`], splitting it into segments.
struct MeshBuilder {
    mesh: Mesh,
    current: MeshSegment,
    max_vertices: usize,
}

impl MeshBuilder {
    fn new(max_vertices: usize) -> Self {
        MeshBuilder {
            mesh: Mesh::default(),
            current: MeshSegment::default(),
            max_vertices,
        }
    }

    /// Adds a piece of mesh, with triangles indexing into `vertices`.
    fn add(&mut self, vertices: &[LineVertex], triangles: &[[usize; 3]]) {
        if self.current.vertex_length + vertices.len() > self.max_vertices {
            self.flush();
        }
        let base = self.current.vertex_length;
        self.mesh.vertices.extend_from_slice(vertices);
        for triangle in triangles {
            for &i in triangle {
                self.mesh.indices.push((base + i) as u16);
            }
        }
        self.current.vertex_length += vertices.len();
        self.current.index_length += triangles.len() * 3;
    }

    fn flush(&mut self) {
        if self.current.vertex_length > 0 {
            self.mesh.segments.push(self.current);
        }
        self.current = MeshSegment {
            vertex_offset: self.mesh.vertices.len(),
            vertex_length: 0,
            index_offset: self.mesh.indices.len(),
            index_length: 0,
        };
    }

    fn finish(mut self) -> Mesh {
        self.flush();
        self.mesh
    }
}

/// Tessellator extruding each segment into a quad, with triangles filling
/// the joins.
#[derive(Clone, Copy, Debug)]
pub struct StrokeTessellator {
    max_vertices: usize,
}

impl Default for StrokeTessellator {
    fn default() -> Self {
        StrokeTessellator {
            max_vertices: MAX_VERTICES_PER_SEGMENT,
        }
    }
}

impl StrokeTessellator {
    /// Creates a tessellator splitting meshes into segments of at most
    /// `max_vertices` vertices.
    pub fn with_max_vertices(max_vertices: usize) -> Self {
        StrokeTessellator {
            max_vertices: max_vertices.clamp(8, MAX_VERTICES_PER_SEGMENT),
        }
    }
}

fn vertex(p: &Point<f64>, extrude: (f64, f64), progress: f64) -> LineVertex {
    LineVertex {
        position: [p.x as f32, p.y as f32],
        extrude: [extrude.0 as f32, extrude.1 as f32],
        progress: progress as f32,
    }
}

impl Tessellator for StrokeTessellator {
    fn generate(&self, points: &[Point<f64>], options: &PolylineGeneratorOptions) -> Mesh {
        let mut points = points.to_vec();
        points.dedup();
        if points.len() < 2 {
            return Mesh::default();
        }

        let directions: Vec<(f64, f64)> = points
            .windows(2)
            .map(|w| {
                let dx = w[1].x - w[0].x;
                let dy = w[1].y - w[0].y;
                let len = (dx * dx + dy * dy).sqrt();
                (dx / len, dy / len)
            })
            .collect();
        let mut cumulative = vec![0.0; points.len()];
        for (i, w) in points.windows(2).enumerate() {
            cumulative[i + 1] = cumulative[i] + crate::geometry::planar_distance(&w[0], &w[1]);
        }
        let total = cumulative[points.len() - 1];
        let progress = |i: usize| {
            if options.vertex_progress && total > 0.0 {
                cumulative[i] / total
            } else {
                0.0
            }
        };

        let mut builder = MeshBuilder::new(self.max_vertices);
        let last = directions.len() - 1;
        for (i, &(dx, dy)) in directions.iter().enumerate() {
            let normal = (-dy, dx);
            let start_cap = if i == 0 && options.begin_cap == LineCap::Square {
                1.0
            } else {
                0.0
            };
            let end_cap = if i == last && options.end_cap == LineCap::Square {
                1.0
            } else {
                0.0
            };
            let (p0, p1) = (&points[i], &points[i + 1]);
            let quad = [
                vertex(p0, (normal.0 - dx * start_cap, normal.1 - dy * start_cap), progress(i)),
                vertex(p0, (-normal.0 - dx * start_cap, -normal.1 - dy * start_cap), progress(i)),
                vertex(p1, (normal.0 + dx * end_cap, normal.1 + dy * end_cap), progress(i + 1)),
                vertex(p1, (-normal.0 + dx * end_cap, -normal.1 + dy * end_cap), progress(i + 1)),
            ];
            builder.add(&quad, &[[0, 1, 2], [1, 3, 2]]);

            if i < last {
                add_join(&mut builder, &points[i + 1], (dx, dy), directions[i + 1], progress(i + 1), options);
            }
        }

        let mesh = builder.finish();
        trace!(
            "Tessellated {} points into {} vertices, {} triangles, {} segments",
            points.len(),
            mesh.vertices.len(),
            mesh.triangle_count(),
            mesh.segments.len()
        );
        mesh
    }
}

/// Fills the gap on the outer side of the corner at `p`, between the
/// directions `d0` and `d1`.
fn add_join(
    builder: &mut MeshBuilder,
    p: &Point<f64>,
    d0: (f64, f64),
    d1: (f64, f64),
    progress: f64,
    options: &PolylineGeneratorOptions,
) {
    let cross = d0.0 * d1.1 - d0.1 * d1.0;
    if cross.abs() < 1e-12 {
        return;
    }
    // The outer side is to the right of a left turn.
    let side = if cross > 0.0 { -1.0 } else { 1.0 };
    let n0 = (-d0.1 * side, d0.0 * side);
    let n1 = (-d1.1 * side, d1.0 * side);

    let center = vertex(p, (0.0, 0.0), progress);
    let from = vertex(p, n0, progress);
    let to = vertex(p, n1, progress);

    if options.join == LineJoin::Miter {
        let (mx, my) = (n0.0 + n1.0, n0.1 + n1.1);
        let len = (mx * mx + my * my).sqrt();
        if len > 1e-12 {
            let (mx, my) = (mx / len, my / len);
            let cos_half = mx * n0.0 + my * n0.1;
            let miter_length = 1.0 / cos_half;
            if miter_length <= options.miter_limit {
                let tip = vertex(p, (mx * miter_length, my * miter_length), progress);
                builder.add(&[center, from, tip, to], &[[0, 1, 2], [0, 2, 3]]);
                return;
            }
        }
    }
    builder.add(&[center, from, to], &[[0, 1, 2]]);
}

#[cfg(test)]
mod test {
    use super::*;

    fn extrude_len(v: &LineVertex) -> f32 {
        (v.extrude[0] * v.extrude[0] + v.extrude[1] * v.extrude[1]).sqrt()
    }

    #[test]
    fn degenerate_lines_are_empty() {
        let tessellator = StrokeTessellator::default();
        let options = PolylineGeneratorOptions::default();
        assert!(tessellator.generate(&[], &options).is_empty());
        assert!(tessellator
            .generate(&[Point::new(1.0, 1.0)], &options)
            .is_empty());
        assert!(tessellator
            .generate(&[Point::new(1.0, 1.0), Point::new(1.0, 1.0)], &options)
            .is_empty());
    }

    #[test]
    fn collinear_points_have_no_join() {
        let mesh = StrokeTessellator::default().generate(
            &[Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(4.0, 0.0)],
            &PolylineGeneratorOptions::default(),
        );
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.segments.len(), 1);
        assert_eq!(mesh.vertices[0].progress, 0.0);
        assert_eq!(mesh.vertices[2].progress, 0.5);
        assert_eq!(mesh.vertices[7].progress, 1.0);
        for v in &mesh.vertices {
            assert!((extrude_len(v) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn square_caps_extend_ends() {
        let mesh = StrokeTessellator::default().generate(
            &[Point::new(0.0, 0.0), Point::new(2.0, 0.0)],
            &PolylineGeneratorOptions::route(),
        );
        assert_eq!(mesh.vertices[0].extrude, [-1.0, 1.0]);
        assert_eq!(mesh.vertices[1].extrude, [-1.0, -1.0]);
        assert_eq!(mesh.vertices[2].extrude, [1.0, 1.0]);
        assert_eq!(mesh.vertices[3].extrude, [1.0, -1.0]);
    }

    #[test]
    fn bevel_and_miter_joins() {
        let elbow = [Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(2.0, 2.0)];

        let bevel = StrokeTessellator::default().generate(&elbow, &PolylineGeneratorOptions::route());
        assert_eq!(bevel.triangle_count(), 5);
        // The join is on the outer side of the left turn.
        let join = &bevel.vertices[4..7];
        assert_eq!(join[1].extrude, [0.0, -1.0]);
        assert_eq!(join[2].extrude, [1.0, 0.0]);

        let miter = StrokeTessellator::default().generate(&elbow, &PolylineGeneratorOptions::default());
        assert_eq!(miter.triangle_count(), 6);
        let tip = miter.vertices[6];
        assert!((tip.extrude[0] - 1.0).abs() < 1e-6);
        assert!((tip.extrude[1] + 1.0).abs() < 1e-6);

        // A hairpin exceeds the miter limit.
        let hairpin = [Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(0.0, 0.1)];
        let mesh = StrokeTessellator::default().generate(&hairpin, &PolylineGeneratorOptions::default());
        assert_eq!(mesh.triangle_count(), 5);
    }

    #[test]
    fn large_meshes_are_split() {
        let points: Vec<_> = (0..100)
            .map(|i| Point::new(i as f64, (i % 2) as f64))
            .collect();
        let mesh = StrokeTessellator::with_max_vertices(64)
            .generate(&points, &PolylineGeneratorOptions::route());
        assert!(mesh.segments.len() > 1);

        let mut vertex_total = 0;
        let mut index_total = 0;
        for segment in &mesh.segments {
            assert!(segment.vertex_length <= 64);
            assert_eq!(segment.vertex_offset, vertex_total);
            assert_eq!(segment.index_offset, index_total);
            let indices = &mesh.indices[segment.index_offset..][..segment.index_length];
            assert!(indices.iter().all(|&i| (i as usize) < segment.vertex_length));
            vertex_total += segment.vertex_length;
            index_total += segment.index_length;
        }
        assert_eq!(vertex_total, mesh.vertices.len());
        assert_eq!(index_total, mesh.indices.len());
    }
}
