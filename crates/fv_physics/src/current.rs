// crates/fv_physics/src/current.rs

//! 离散超导电流
//!
//! 边 e = (a, b) 上的电流:
//!
//! ```text
//! J[e] = Im( conj(ψ[a]) · (G ψ)[e] )
//! ```
//!
//! 其中 G 为边 × 节点的稀疏协变梯度算子。
//! [`covariant_gradient`] 组装 `(G ψ)[e] = (U_e ψ[b] − ψ[a]) / ℓ_e`，
//! 链变量 `U_e = exp(−i θ_e)`，θ_e 为矢势沿边的线积分。

use fv_foundation::CsrMatrix;
use num_complex::Complex64;

use crate::error::{PhysicsError, PhysicsResult};

fn check_edges(edges: &[[u32; 2]], n_sites: usize) -> PhysicsResult<()> {
    for edge in edges {
        if let Some(&v) = edge.iter().find(|&&v| v as usize >= n_sites) {
            return Err(PhysicsError::IndexOutOfRange {
                name: "edges",
                index: v as usize,
                len: n_sites,
            });
        }
    }
    Ok(())
}

/// 组装协变梯度算子（边 × 节点）
///
/// `link_phases` 为 `None` 时所有链变量为 1（无矢势）。
pub fn covariant_gradient(
    n_sites: usize,
    edges: &[[u32; 2]],
    lengths: &[f64],
    link_phases: Option<&[f64]>,
) -> PhysicsResult<CsrMatrix<Complex64>> {
    if lengths.len() != edges.len() {
        return Err(PhysicsError::dimension_mismatch("lengths", edges.len(), lengths.len()));
    }
    if let Some(phases) = link_phases {
        if phases.len() != edges.len() {
            return Err(PhysicsError::dimension_mismatch(
                "link_phases",
                edges.len(),
                phases.len(),
            ));
        }
    }
    check_edges(edges, n_sites)?;
    if let Some(e) = lengths.iter().position(|&l| !(l.is_finite() && l > 0.0)) {
        return Err(PhysicsError::InvalidValue {
            name: "lengths",
            index: e,
        });
    }

    let triplets = edges.iter().enumerate().flat_map(|(e, &[a, b])| {
        let inv = 1.0 / lengths[e];
        let link = link_phases.map_or(Complex64::new(1.0, 0.0), |p| Complex64::from_polar(1.0, -p[e]));
        [
            (e, a as usize, Complex64::new(-inv, 0.0)),
            (e, b as usize, link * inv),
        ]
    });

    Ok(CsrMatrix::from_triplets(edges.len(), n_sites, triplets)?)
}

/// 超导电流（每条边一个标量）
pub fn supercurrent(
    psi: &[Complex64],
    gradient: &CsrMatrix<Complex64>,
    edges: &[[u32; 2]],
) -> PhysicsResult<Vec<f64>> {
    if gradient.n_rows() != edges.len() {
        return Err(PhysicsError::dimension_mismatch(
            "gradient rows",
            edges.len(),
            gradient.n_rows(),
        ));
    }
    if gradient.n_cols() != psi.len() {
        return Err(PhysicsError::dimension_mismatch(
            "gradient cols",
            psi.len(),
            gradient.n_cols(),
        ));
    }
    check_edges(edges, psi.len())?;

    let mut grad = vec![Complex64::new(0.0, 0.0); edges.len()];
    for (e, out) in grad.iter_mut().enumerate() {
        let (cols, vals) = gradient.row(e);
        *out = cols.iter().zip(vals).map(|(&c, &v)| v * psi[c]).sum();
    }

    Ok(edges
        .iter()
        .zip(&grad)
        .map(|(&[a, _], g)| (psi[a as usize].conj() * g).im)
        .collect())
}
