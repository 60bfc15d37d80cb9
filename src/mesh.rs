//! Indexed triangle meshes with texture coordinates
//!
//! Meshes are immutable once built: a playback option change builds a new mesh
//! and drops the old one.

/// Primitive type the index buffer is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    #[default]
    Triangles,
}

/// Immutable indexed mesh: 3 floats of position and 2 floats of UV per vertex
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TexturedMesh {
    mode: DrawMode,
    vertex_count: usize,
    positions: Vec<f32>,
    uvs: Vec<f32>,
    indices: Vec<u16>,
}

impl TexturedMesh {
    /// Wraps prebuilt arrays. `vertex_count` is the number of indices drawn.
    pub fn new(vertex_count: usize, positions: Vec<f32>, uvs: Vec<f32>, indices: Vec<u16>) -> Self {
        assert_eq!(indices.len(), vertex_count, "index count mismatch");
        assert_eq!(positions.len() % 3, 0);
        assert_eq!(positions.len() / 3, uvs.len() / 2, "position/uv count mismatch");
        debug_assert!(indices.iter().all(|&i| (i as usize) < positions.len() / 3));

        Self {
            mode: DrawMode::Triangles,
            vertex_count,
            positions,
            uvs,
            indices,
        }
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    /// Number of indices drawn
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Number of distinct vertices stored
    pub fn position_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Uninitialized meshes render nothing
    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    /// Interleaved `[x, y, z, u, v]` vertices for GPU upload
    pub fn interleaved(&self) -> Vec<MeshVertex> {
        self.positions
            .chunks_exact(3)
            .zip(self.uvs.chunks_exact(2))
            .map(|(p, t)| MeshVertex {
                position: [p[0], p[1], p[2]],
                uv: [t[0], t[1]],
            })
            .collect()
    }
}

/// GPU vertex layout shared by the video and GUI pipelines
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Accumulates vertices and faces, then hands them off to a [`TexturedMesh`]
#[derive(Debug, Default)]
pub struct MeshBuilder {
    positions: Vec<f32>,
    uvs: Vec<f32>,
    indices: Vec<u16>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a vertex and returns its index
    pub fn add_vertex(&mut self, x: f32, y: f32, z: f32, u: f32, v: f32) -> u16 {
        debug_assert_eq!(self.positions.len() % 3, 0);
        let index = self.positions.len() / 3;
        let index = u16::try_from(index).unwrap_or_else(|_| panic!("mesh exceeds u16 index space"));

        self.positions.extend_from_slice(&[x, y, z]);
        self.uvs.extend_from_slice(&[u, v]);

        index
    }

    pub fn add_triangle(&mut self, a: u16, b: u16, c: u16) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Splits the quad along the a-c diagonal
    pub fn add_quad(&mut self, a: u16, b: u16, c: u16, d: u16) {
        self.indices.extend_from_slice(&[a, c, b]);
        self.indices.extend_from_slice(&[a, d, c]);
    }

    pub fn build(self) -> TexturedMesh {
        TexturedMesh::new(self.indices.len(), self.positions, self.uvs, self.indices)
    }
}
