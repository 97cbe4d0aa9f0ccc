//! Mathematical utilities for the beam stiffness kernel

pub mod sparse;

use nalgebra::{SMatrix, SVector};

pub use sparse::{solve_pcg, sparse_matvec, PcgOutcome, SkylineCholesky, SparseMatrixBuilder};

/// 4x4 matrix for beam element stiffness (v_i, θ_i, v_j, θ_j)
pub type Mat4 = SMatrix<f64, 4, 4>;
/// 4-element vector for beam element forces/displacements
pub type Vec4 = SVector<f64, 4>;

/// Degrees of freedom per node: vertical translation and rotation
pub const DOFS_PER_NODE: usize = 2;

/// Compute the Euler-Bernoulli bending stiffness of a beam element
///
/// # Arguments
/// * `e` - Elastic modulus
/// * `i` - Second moment of area about the bending axis
/// * `length` - Element length
///
/// # Returns
/// 4x4 stiffness matrix ordered (v_i, θ_i, v_j, θ_j)
pub fn beam_element_stiffness(e: f64, i: f64, length: f64) -> Mat4 {
    let l = length;
    let l2 = l * l;
    let ei_l3 = e * i / (l2 * l);
    let ei_l2 = e * i / l2;
    let ei_l = e * i / l;

    #[rustfmt::skip]
    let data = [
        12.0*ei_l3,   6.0*ei_l2,   -12.0*ei_l3,  6.0*ei_l2,
        6.0*ei_l2,    4.0*ei_l,    -6.0*ei_l2,   2.0*ei_l,
        -12.0*ei_l3,  -6.0*ei_l2,  12.0*ei_l3,   -6.0*ei_l2,
        6.0*ei_l2,    2.0*ei_l,    -6.0*ei_l2,   4.0*ei_l,
    ];

    Mat4::from_row_slice(&data)
}

/// Global DOF indices of a two-node element
#[inline]
pub fn element_dofs(i_node: usize, j_node: usize) -> [usize; 4] {
    [
        i_node * DOFS_PER_NODE,
        i_node * DOFS_PER_NODE + 1,
        j_node * DOFS_PER_NODE,
        j_node * DOFS_PER_NODE + 1,
    ]
}
