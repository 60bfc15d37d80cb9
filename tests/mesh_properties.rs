//! Properties every projection mesh must hold, across all option combinations

use std::f32::consts::PI;

use vr_video_player::projection::{build_eye_mesh, build_uv_sphere_mesh, eye_uv_rect, UvRect};
use vr_video_player::{Eye, InputVideoLayout, InputVideoMode};

const LAYOUTS: [InputVideoLayout; 4] = [
    InputVideoLayout::Mono,
    InputVideoLayout::StereoHoriz,
    InputVideoLayout::StereoVert,
    InputVideoLayout::AnaglyphRedCyan,
];

const MODES: [InputVideoMode; 8] = [
    InputVideoMode::PlainFov,
    InputVideoMode::Equirect180,
    InputVideoMode::Equirect360,
    InputVideoMode::CubeMap,
    InputVideoMode::EquiangularCubeMap,
    InputVideoMode::Pyramid,
    InputVideoMode::Panorama180,
    InputVideoMode::Panorama360,
];

fn for_each_combination(mut f: impl FnMut(InputVideoLayout, InputVideoMode, Eye)) {
    for layout in LAYOUTS {
        for mode in MODES {
            for eye in Eye::BOTH {
                f(layout, mode, eye);
            }
        }
    }
}

#[test]
fn meshes_are_well_formed_triangle_lists() {
    for_each_combination(|layout, mode, eye| {
        let mesh = build_eye_mesh(layout, mode, eye, 16.0 / 9.0);
        let label = format!("{:?}/{:?}/{:?}", layout, mode, eye);

        assert!(!mesh.is_empty(), "{label}: empty mesh");
        assert_eq!(mesh.indices().len() % 3, 0, "{label}: partial triangle");
        assert_eq!(mesh.vertex_count(), mesh.indices().len(), "{label}");
        assert_eq!(mesh.positions().len(), mesh.position_count() * 3, "{label}");
        assert_eq!(mesh.uvs().len(), mesh.position_count() * 2, "{label}");
        assert!(
            mesh.indices().iter().all(|&i| (i as usize) < mesh.position_count()),
            "{label}: index out of range"
        );
        assert!(mesh.positions().iter().all(|p| p.is_finite()), "{label}: non-finite position");
    });
}

#[test]
fn identical_options_build_identical_meshes() {
    for_each_combination(|layout, mode, eye| {
        assert_eq!(
            build_eye_mesh(layout, mode, eye, 1.5),
            build_eye_mesh(layout, mode, eye, 1.5),
            "{:?}/{:?}/{:?}",
            layout,
            mode,
            eye
        );
    });
}

#[test]
fn texture_coordinates_stay_inside_the_eye_region() {
    let geometric = [
        InputVideoMode::PlainFov,
        InputVideoMode::Panorama180,
        InputVideoMode::Panorama360,
        InputVideoMode::Equirect180,
        InputVideoMode::Equirect360,
    ];
    for layout in LAYOUTS {
        for mode in geometric {
            for eye in Eye::BOTH {
                let rect = eye_uv_rect(layout, eye);
                let mesh = build_eye_mesh(layout, mode, eye, 2.0);
                let eps = 1e-5;
                for uv in mesh.uvs().chunks_exact(2) {
                    assert!(uv[1] >= rect.top - eps && uv[1] <= rect.bottom + eps, "{:?}/{:?}/{:?}: v {}", layout, mode, eye, uv[1]);
                    assert!(
                        uv[0] >= rect.left - eps && uv[0] <= rect.right + eps,
                        "{:?}/{:?}/{:?}: u {} outside [{}, {}]",
                        layout,
                        mode,
                        eye,
                        uv[0],
                        rect.left,
                        rect.right
                    );
                }
            }
        }
    }
}

#[test]
fn stereo_layouts_give_each_eye_its_own_half() {
    let left = eye_uv_rect(InputVideoLayout::StereoHoriz, Eye::Left);
    let right = eye_uv_rect(InputVideoLayout::StereoHoriz, Eye::Right);
    assert!(left.right <= right.left);

    let top = eye_uv_rect(InputVideoLayout::StereoVert, Eye::Left);
    let bottom = eye_uv_rect(InputVideoLayout::StereoVert, Eye::Right);
    assert!(top.bottom <= bottom.top);

    assert_eq!(eye_uv_rect(InputVideoLayout::Mono, Eye::Right), UvRect::FULL);
}

#[test]
fn sphere_pole_rows_are_single_triangles() {
    let (slices, stacks) = (12u16, 6u16);
    let mesh = build_uv_sphere_mesh(slices, stacks, 0.0, 2.0 * PI, UvRect::FULL);
    let triangles = mesh.indices().len() / 3;
    let expected = 2 * slices as usize + 2 * slices as usize * (stacks as usize - 2);
    assert_eq!(triangles, expected);
}

#[test]
fn full_sphere_vertices_lie_on_the_unit_sphere() {
    let mesh = build_eye_mesh(InputVideoLayout::Mono, InputVideoMode::Equirect360, Eye::Left, 1.0);
    for p in mesh.positions().chunks_exact(3) {
        let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        assert!((r - 1.0).abs() < 1e-4, "radius {}", r);
    }
}
