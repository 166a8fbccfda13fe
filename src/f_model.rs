use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use itertools::izip;

pub const F_VERTEX_COUNT: usize = 96;

/// The letter is built from 16 quads, each split into two triangles.
#[rustfmt::skip]
pub const F_POSITIONS: [[f32; 3]; F_VERTEX_COUNT] = [
    // left column front
    [0.0, 0.0, 0.0], [0.0, 150.0, 0.0], [30.0, 0.0, 0.0],
    [0.0, 150.0, 0.0], [30.0, 150.0, 0.0], [30.0, 0.0, 0.0],
    // top rung front
    [30.0, 0.0, 0.0], [30.0, 30.0, 0.0], [100.0, 0.0, 0.0],
    [30.0, 30.0, 0.0], [100.0, 30.0, 0.0], [100.0, 0.0, 0.0],
    // middle rung front
    [30.0, 60.0, 0.0], [30.0, 90.0, 0.0], [67.0, 60.0, 0.0],
    [30.0, 90.0, 0.0], [67.0, 90.0, 0.0], [67.0, 60.0, 0.0],
    // left column back
    [0.0, 0.0, 30.0], [30.0, 0.0, 30.0], [0.0, 150.0, 30.0],
    [0.0, 150.0, 30.0], [30.0, 0.0, 30.0], [30.0, 150.0, 30.0],
    // top rung back
    [30.0, 0.0, 30.0], [100.0, 0.0, 30.0], [30.0, 30.0, 30.0],
    [30.0, 30.0, 30.0], [100.0, 0.0, 30.0], [100.0, 30.0, 30.0],
    // middle rung back
    [30.0, 60.0, 30.0], [67.0, 60.0, 30.0], [30.0, 90.0, 30.0],
    [30.0, 90.0, 30.0], [67.0, 60.0, 30.0], [67.0, 90.0, 30.0],
    // top
    [0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [100.0, 0.0, 30.0],
    [0.0, 0.0, 0.0], [100.0, 0.0, 30.0], [0.0, 0.0, 30.0],
    // top rung right
    [100.0, 0.0, 0.0], [100.0, 30.0, 0.0], [100.0, 30.0, 30.0],
    [100.0, 0.0, 0.0], [100.0, 30.0, 30.0], [100.0, 0.0, 30.0],
    // under top rung
    [30.0, 30.0, 0.0], [30.0, 30.0, 30.0], [100.0, 30.0, 30.0],
    [30.0, 30.0, 0.0], [100.0, 30.0, 30.0], [100.0, 30.0, 0.0],
    // between top rung and middle
    [30.0, 30.0, 0.0], [30.0, 60.0, 30.0], [30.0, 30.0, 30.0],
    [30.0, 30.0, 0.0], [30.0, 60.0, 0.0], [30.0, 60.0, 30.0],
    // top of middle rung
    [30.0, 60.0, 0.0], [67.0, 60.0, 30.0], [30.0, 60.0, 30.0],
    [30.0, 60.0, 0.0], [67.0, 60.0, 0.0], [67.0, 60.0, 30.0],
    // right of middle rung
    [67.0, 60.0, 0.0], [67.0, 90.0, 30.0], [67.0, 60.0, 30.0],
    [67.0, 60.0, 0.0], [67.0, 90.0, 0.0], [67.0, 90.0, 30.0],
    // bottom of middle rung
    [30.0, 90.0, 0.0], [30.0, 90.0, 30.0], [67.0, 90.0, 30.0],
    [30.0, 90.0, 0.0], [67.0, 90.0, 30.0], [67.0, 90.0, 0.0],
    // right of bottom
    [30.0, 90.0, 0.0], [30.0, 150.0, 30.0], [30.0, 90.0, 30.0],
    [30.0, 90.0, 0.0], [30.0, 150.0, 0.0], [30.0, 150.0, 30.0],
    // bottom
    [0.0, 150.0, 0.0], [0.0, 150.0, 30.0], [30.0, 150.0, 30.0],
    [0.0, 150.0, 0.0], [30.0, 150.0, 30.0], [30.0, 150.0, 0.0],
    // left side
    [0.0, 0.0, 0.0], [0.0, 0.0, 30.0], [0.0, 150.0, 30.0],
    [0.0, 0.0, 0.0], [0.0, 150.0, 30.0], [0.0, 150.0, 0.0],
];

/// One colour per quad, in the same order as `F_POSITIONS`.
#[rustfmt::skip]
const QUAD_COLORS: [[u8; 3]; F_VERTEX_COUNT / 6] = [
    [200, 70, 120], [200, 70, 120], [200, 70, 120],
    [80, 70, 200], [80, 70, 200], [80, 70, 200],
    [70, 200, 210],
    [200, 200, 70],
    [210, 100, 70],
    [210, 160, 70],
    [70, 180, 210],
    [100, 70, 210],
    [76, 210, 100],
    [140, 210, 80],
    [90, 130, 110],
    [160, 160, 220],
];

pub fn f_colors() -> impl Iterator<Item = [u8; 3]> {
    QUAD_COLORS
        .iter()
        .flat_map(|color| std::iter::repeat(*color).take(6))
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    /// RGB plus one padding byte, read as `Unorm8x4`.
    pub color: [u8; 4],
}

impl Vertex {
    fn key(&self) -> ([u32; 3], [u8; 4]) {
        (self.position.map(f32::to_bits), self.color)
    }
}

pub fn triangle_list() -> Vec<Vertex> {
    izip!(F_POSITIONS.iter(), f_colors())
        .map(|(position, [r, g, b])| Vertex {
            position: *position,
            color: [r, g, b, 255],
        })
        .collect()
}

pub struct IndexedMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl IndexedMesh {
    pub fn from_triangle_list(triangles: &[Vertex]) -> anyhow::Result<Self> {
        let mut lookup = HashMap::new();
        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(triangles.len());

        for vertex in triangles {
            let index = *lookup.entry(vertex.key()).or_insert_with(|| {
                vertices.push(*vertex);
                vertices.len() - 1
            });

            let index = u16::try_from(index)
                .map_err(|_| anyhow::anyhow!("Mesh has too many unique vertices for u16"))?;
            indices.push(index);
        }

        // Index buffer copies must be a multiple of 4 bytes.
        if indices.len() % 2 != 0 {
            anyhow::bail!("Index count {} is not even", indices.len());
        }

        Ok(Self { vertices, indices })
    }

    #[allow(dead_code)]
    pub fn expand(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.indices
            .iter()
            .map(|&index| self.vertices[index as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_list_has_one_vertex_per_position() {
        let vertices = triangle_list();
        assert_eq!(vertices.len(), F_VERTEX_COUNT);
        assert_eq!(vertices[0].color, [200, 70, 120, 255]);
        assert_eq!(vertices[95].color, [160, 160, 220, 255]);
    }

    #[test]
    fn letter_fits_its_bounding_box() {
        for [x, y, z] in F_POSITIONS {
            assert!((0.0..=100.0).contains(&x));
            assert!((0.0..=150.0).contains(&y));
            assert!((0.0..=30.0).contains(&z));
        }
    }

    #[test]
    fn colors_are_constant_per_quad() {
        let vertices = triangle_list();
        for quad in vertices.chunks(6) {
            assert!(quad.iter().all(|v| v.color == quad[0].color));
        }
    }

    #[test]
    fn indexed_mesh_reproduces_triangle_list() {
        let triangles = triangle_list();
        let mesh = IndexedMesh::from_triangle_list(&triangles).unwrap();

        assert_eq!(mesh.indices.len(), F_VERTEX_COUNT);
        assert!(mesh.expand().eq(triangles.iter().copied()));
    }

    #[test]
    fn indexed_mesh_shares_corners() {
        let mesh = IndexedMesh::from_triangle_list(&triangle_list()).unwrap();

        // Each quad has at most four distinct corners.
        assert!(mesh.vertices.len() <= 64);
        assert!(mesh
            .indices
            .iter()
            .all(|&index| (index as usize) < mesh.vertices.len()));
    }

    #[test]
    fn same_position_different_color_is_not_merged() {
        let a = Vertex {
            position: [1.0, 2.0, 3.0],
            color: [1, 2, 3, 255],
        };
        let b = Vertex {
            color: [9, 9, 9, 255],
            ..a
        };

        let mesh = IndexedMesh::from_triangle_list(&[a, b, a, b]).unwrap();
        assert_eq!(mesh.vertices, vec![a, b]);
        assert_eq!(mesh.indices, vec![0, 1, 0, 1]);
    }
}
