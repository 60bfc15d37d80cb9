//! Per-eye projection meshes for each input video geometry
//!
//! Every builder is a pure function of its arguments so identical options
//! always produce identical meshes.

use std::f32::consts::{FRAC_PI_2, PI};

use crate::mesh::{MeshBuilder, TexturedMesh};
use crate::options::{Eye, InputVideoLayout, InputVideoMode};

/// Region of the video texture that belongs to one eye
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl UvRect {
    pub const FULL: UvRect = UvRect { left: 0.0, top: 0.0, right: 1.0, bottom: 1.0 };

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Picks the half (or whole) of the texture an eye samples from
pub fn eye_uv_rect(layout: InputVideoLayout, eye: Eye) -> UvRect {
    let e = eye.index() as f32;
    match layout {
        // Anaglyph views share the frame; the color map separates them
        InputVideoLayout::Mono | InputVideoLayout::AnaglyphRedCyan => UvRect::FULL,
        InputVideoLayout::StereoHoriz => UvRect {
            left: 0.5 * e,
            top: 0.0,
            right: 0.5 * (e + 1.0),
            bottom: 1.0,
        },
        InputVideoLayout::StereoVert => UvRect {
            left: 0.0,
            top: 0.5 * e,
            right: 1.0,
            bottom: 0.5 * (e + 1.0),
        },
    }
}

/// Builds the mesh one eye sees for the given options
pub fn build_eye_mesh(
    layout: InputVideoLayout,
    mode: InputVideoMode,
    eye: Eye,
    video_aspect: f32,
) -> TexturedMesh {
    let uv = eye_uv_rect(layout, eye);
    match mode {
        InputVideoMode::PlainFov => build_flat_mesh(video_aspect, uv),
        InputVideoMode::Equirect180 => build_uv_sphere_mesh(20, 20, FRAC_PI_2, PI * 1.5, uv),
        InputVideoMode::Equirect360 => build_uv_sphere_mesh(40, 20, 0.0, PI * 2.0, uv),
        InputVideoMode::Panorama180 => build_cylindrical_mesh(20, FRAC_PI_2, PI * 1.5, uv),
        InputVideoMode::Panorama360 => build_cylindrical_mesh(40, 0.0, PI * 2.0, uv),
        // TODO: real cube map and pyramid unwraps; these render the debug cube for now
        InputVideoMode::CubeMap | InputVideoMode::EquiangularCubeMap | InputVideoMode::Pyramid => {
            build_debug_cube_mesh()
        }
    }
}

/// UV sphere over the azimuth range `[min_theta, max_theta]`, full polar range
pub fn build_uv_sphere_mesh(
    n_slices: u16,
    n_stacks: u16,
    min_theta: f32,
    max_theta: f32,
    uv: UvRect,
) -> TexturedMesh {
    assert!(n_slices >= 1 && n_stacks >= 2, "sphere needs at least 1 slice and 2 stacks");

    let mut builder = MeshBuilder::new();
    let theta_range = max_theta - min_theta;

    for i in 0..=n_stacks {
        let v_frac = f32::from(i) / f32::from(n_stacks);
        let phi = PI * v_frac;
        let v = v_frac * uv.height() + uv.top;

        for j in 0..=n_slices {
            let u_frac = f32::from(j) / f32::from(n_slices);
            let theta = -(min_theta + theta_range * u_frac);
            let mut u = u_frac * uv.width() + uv.left;
            let x = phi.sin() * theta.sin();
            let y = phi.cos();
            let z = phi.sin() * theta.cos();

            // Pole rows collapse into a point; shift U one face to hide the seam,
            // wrapping inside this eye's region
            if i == 0 || i == n_stacks {
                u += uv.width() / f32::from(n_slices);
                if u > uv.right {
                    u -= uv.width();
                }
            }

            builder.add_vertex(x, y, z, u, v);
        }
    }

    let row = n_slices + 1;
    for j in 0..n_stacks {
        let j0 = j * row;
        let j1 = (j + 1) * row;
        for i in 0..n_slices {
            let i0 = j0 + i;
            let i1 = j0 + i + 1;
            let i2 = j1 + i + 1;
            let i3 = j1 + i;
            if j == 0 {
                builder.add_triangle(i0, i2, i3);
            } else if j == n_stacks - 1 {
                builder.add_triangle(i0, i2, i1);
            } else {
                builder.add_quad(i0, i1, i2, i3);
            }
        }
    }

    builder.build()
}

/// Unit-radius cylinder, y in [-1, 1], over the azimuth range
pub fn build_cylindrical_mesh(n_slices: u16, min_theta: f32, max_theta: f32, uv: UvRect) -> TexturedMesh {
    assert!(n_slices >= 1, "cylinder needs at least 1 slice");

    let mut builder = MeshBuilder::new();
    let theta_range = max_theta - min_theta;

    for i in 0..=n_slices {
        let u_frac = f32::from(i) / f32::from(n_slices);
        let theta = -(min_theta + theta_range * u_frac);
        let u = u_frac * uv.width() + uv.left;
        let x = theta.sin();
        let z = theta.cos();

        let top = builder.add_vertex(x, 1.0, z, u, uv.top);
        let bottom = builder.add_vertex(x, -1.0, z, u, uv.bottom);
        if i > 0 {
            builder.add_quad(top - 2, top, bottom, bottom - 2);
        }
    }

    builder.build()
}

/// Distance of the flat screen from the viewer
const FLAT_DISTANCE: f32 = 1.0;
const FLAT_HALF_HEIGHT: f32 = 0.5;

/// Flat rectangle in front of the viewer with the video's aspect ratio
pub fn build_flat_mesh(video_aspect: f32, uv: UvRect) -> TexturedMesh {
    let hw = FLAT_HALF_HEIGHT * video_aspect;
    let hh = FLAT_HALF_HEIGHT;
    let z = -FLAT_DISTANCE;

    let positions = vec![
        -hw, hh, z, //
        hw, hh, z, //
        hw, -hh, z, //
        -hw, -hh, z,
    ];
    let uvs = vec![
        uv.left, uv.top, //
        uv.right, uv.top, //
        uv.right, uv.bottom, //
        uv.left, uv.bottom,
    ];
    let indices = vec![0, 2, 1, 0, 3, 2];

    TexturedMesh::new(6, positions, uvs, indices)
}

/// Fixed unit cube, used where no proper unwrap exists yet
pub fn build_debug_cube_mesh() -> TexturedMesh {
    #[rustfmt::skip]
    let positions = vec![
        -1.0, -1.0, -1.0,
        1.0, -1.0, -1.0,
        1.0, 1.0, -1.0,
        -1.0, 1.0, -1.0,
        -1.0, -1.0, 1.0,
        1.0, -1.0, 1.0,
        1.0, 1.0, 1.0,
        -1.0, 1.0, 1.0,
    ];
    #[rustfmt::skip]
    let uvs = vec![
        0.0, 0.0,
        1.0, 0.0,
        1.0, 1.0,
        0.0, 1.0,
        0.0, 0.0,
        1.0, 0.0,
        1.0, 1.0,
        0.0, 1.0,
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 5, 4, 0, 1, 5,
        1, 6, 5, 1, 2, 6,
        2, 7, 6, 2, 3, 7,
        3, 4, 7, 3, 0, 4,
        4, 6, 7, 4, 5, 6,
        3, 1, 0, 3, 2, 1,
    ];

    TexturedMesh::new(36, positions, uvs, indices)
}
