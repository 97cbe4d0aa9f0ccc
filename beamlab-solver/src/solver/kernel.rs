//! Linear static solver kernel
//!
//! The pipeline treats the kernel as a pure function of a [`SolveRequest`]:
//! nodes, elements, constrained DOFs and nodal forces in, nodal displacements
//! and reactions out. [`StiffnessKernel`] is the stock implementation, a 2D
//! Euler-Bernoulli beam with two DOFs (v, θ) per node.

use std::time::Instant;

use log::{debug, info};
use nalgebra::DVector;

use crate::analysis::SolveMethod;
use crate::elements::Restraints;
use crate::error::{BeamError, BeamResult};
use crate::math::{
    beam_element_stiffness, element_dofs, solve_pcg, sparse_matvec, SkylineCholesky,
    SparseMatrixBuilder, DOFS_PER_NODE,
};
use crate::solver::protocol::{
    ProgressEvent, ProgressStage, SolveRequest, SolveTiming, SolverMetadata, SolverOutput,
};

/// A linear solver for beam meshes
///
/// Implementations must be shareable with the background worker thread.
pub trait SolverKernel: Send + Sync + 'static {
    /// Short name recorded in the result metadata
    fn name(&self) -> &str;

    /// Solve one request, reporting progress as it goes
    fn solve(
        &self,
        request: &SolveRequest,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> BeamResult<SolverOutput>;
}

/// Sparse stiffness-method kernel for 2D beams
#[derive(Debug, Clone, Copy, Default)]
pub struct StiffnessKernel;

impl StiffnessKernel {
    pub fn new() -> Self {
        Self
    }

    fn validate(request: &SolveRequest) -> BeamResult<()> {
        let n = request.nodes.len();
        if n < 2 || request.elements.is_empty() {
            return Err(BeamError::InvalidInput(
                "model needs at least two nodes and one element".to_string(),
            ));
        }

        for el in &request.elements {
            if el.i_node >= n || el.j_node >= n {
                return Err(BeamError::InvalidInput(format!(
                    "element {} references a missing node",
                    el.index
                )));
            }
            let length = request.nodes[el.j_node].position - request.nodes[el.i_node].position;
            if !length.is_finite() || length.abs() <= 1e-12 {
                return Err(BeamError::InvalidInput(format!(
                    "element {} has zero length",
                    el.index
                )));
            }
            if !el.ei().is_finite() || el.ei() <= 0.0 {
                return Err(BeamError::InvalidInput(format!(
                    "element {} has non-positive flexural rigidity",
                    el.index
                )));
            }
        }

        if let Some(c) = request.supports.iter().find(|c| c.node >= n) {
            return Err(BeamError::InvalidInput(format!(
                "support references missing node {}",
                c.node
            )));
        }
        if let Some(f) = request.loads.iter().find(|f| f.node >= n) {
            return Err(BeamError::InvalidInput(format!(
                "load references missing node {}",
                f.node
            )));
        }
        Ok(())
    }

    /// Check the supports remove both rigid-body modes (translation and rotation)
    ///
    /// A vertical restraint at x constrains `a + b·x`, a rotational one
    /// constrains `b`. The beam is stable when these rows have rank two.
    fn check_stability(request: &SolveRequest) -> BeamResult<()> {
        let position = |node: usize| request.nodes[node].position;
        let vertical: Vec<f64> = request
            .supports
            .iter()
            .filter(|c| c.restraints.contains(Restraints::TY))
            .map(|c| position(c.node))
            .collect();
        let rotational = request
            .supports
            .iter()
            .any(|c| c.restraints.contains(Restraints::RZ));

        if vertical.is_empty() {
            return Err(BeamError::Unstable(
                "no support restrains vertical translation".to_string(),
            ));
        }
        let distinct = vertical
            .iter()
            .any(|&x| (x - vertical[0]).abs() > 1e-12);
        if !distinct && !rotational {
            return Err(BeamError::Unstable(
                "beam can rotate freely about its only support".to_string(),
            ));
        }
        Ok(())
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

impl SolverKernel for StiffnessKernel {
    fn name(&self) -> &str {
        "stiffness"
    }

    fn solve(
        &self,
        request: &SolveRequest,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> BeamResult<SolverOutput> {
        let start = Instant::now();
        progress(ProgressEvent::new(
            ProgressStage::Initializing,
            5,
            "Validating model...",
        ));
        Self::validate(request)?;
        Self::check_stability(request)?;

        let n_dofs = request.dof_count();
        progress(ProgressEvent::new(
            ProgressStage::Initializing,
            8,
            format!(
                "Model: {} nodes, {} elements, {} DOFs",
                request.nodes.len(),
                request.elements.len(),
                n_dofs
            ),
        ));

        // Assembly
        let t = Instant::now();
        progress(ProgressEvent::new(
            ProgressStage::AssemblingSystem,
            10,
            format!("Assembling {} elements...", request.elements.len()),
        ));
        let mut builder = SparseMatrixBuilder::new(n_dofs);
        for el in &request.elements {
            let length = request.nodes[el.j_node].position - request.nodes[el.i_node].position;
            let k = beam_element_stiffness(el.e, el.i, length.abs());
            let mut k_elem = [[0.0; 4]; 4];
            for (r, row) in k_elem.iter_mut().enumerate() {
                for (c, value) in row.iter_mut().enumerate() {
                    *value = k[(r, c)];
                }
            }
            builder.add_element_matrix(&element_dofs(el.i_node, el.j_node), &k_elem);
        }
        let k_global = builder.to_csr();

        let mut f_global = DVector::<f64>::zeros(n_dofs);
        for load in &request.loads {
            f_global[load.node * DOFS_PER_NODE] += load.fy;
            f_global[load.node * DOFS_PER_NODE + 1] += load.mz;
        }
        let assembly_ms = elapsed_ms(t);
        progress(ProgressEvent::new(
            ProgressStage::AssemblingSystem,
            40,
            format!("Assembled stiffness with {} non-zeros", k_global.nnz()),
        ));

        // Boundary conditions
        let t = Instant::now();
        progress(ProgressEvent::new(
            ProgressStage::SolvingSystem,
            50,
            "Applying boundary conditions...",
        ));
        let mut restrained = vec![false; n_dofs];
        for c in &request.supports {
            let base = c.node * DOFS_PER_NODE;
            restrained[base] |= c.restraints.contains(Restraints::TY);
            restrained[base + 1] |= c.restraints.contains(Restraints::RZ);
        }
        // Map global DOF -> free index
        let mut free_index = vec![None; n_dofs];
        let mut free_dofs = Vec::with_capacity(n_dofs);
        for dof in (0..n_dofs).filter(|&d| !restrained[d]) {
            free_index[dof] = Some(free_dofs.len());
            free_dofs.push(dof);
        }
        let n_free = free_dofs.len();

        let mut k11 = SparseMatrixBuilder::new(n_free);
        for (row, col, &val) in k_global.triplet_iter() {
            if let (Some(r), Some(c)) = (free_index[row], free_index[col]) {
                k11.add(r, c, val);
            }
        }
        let k11 = k11.to_csr();
        let p1 = DVector::from_fn(n_free, |i, _| f_global[free_dofs[i]]);
        let boundary_conditions_ms = elapsed_ms(t);

        // Solve
        let t = Instant::now();
        let config = request.config;
        // CG stalls on long beam meshes (condition number grows as n⁴), so it
        // only runs when asked for
        let method = match config.method {
            SolveMethod::Auto => SolveMethod::Direct,
            explicit => explicit,
        };
        let mut iterations = None;

        let d1 = if n_free == 0 {
            DVector::zeros(0)
        } else if method == SolveMethod::Iterative {
            let max_iter = if config.max_iterations == 0 {
                10 * n_free
            } else {
                config.max_iterations
            };
            progress(ProgressEvent::new(
                ProgressStage::SolvingSystem,
                60,
                format!("Running preconditioned CG on {n_free} DOFs..."),
            ));
            let outcome = solve_pcg(&k11, &p1, config.tolerance, max_iter)?;
            if !outcome.converged {
                return Err(BeamError::ConvergenceFailed(outcome.iterations));
            }
            iterations = Some(outcome.iterations);
            progress(ProgressEvent::new(
                ProgressStage::SolvingSystem,
                85,
                format!("Converged in {} iterations", outcome.iterations),
            ));
            outcome.solution
        } else {
            let factor = SkylineCholesky::factor(&k11)?;
            progress(ProgressEvent::new(
                ProgressStage::SolvingSystem,
                60,
                format!("Factorized {n_free} DOFs"),
            ));
            let d1 = factor.solve(&p1);
            progress(ProgressEvent::new(
                ProgressStage::SolvingSystem,
                85,
                "Solved system",
            ));
            d1
        };
        if d1.iter().any(|v| !v.is_finite()) {
            return Err(BeamError::SingularMatrix);
        }
        let solve_ms = elapsed_ms(t);

        // Post-processing
        let t = Instant::now();
        progress(ProgressEvent::new(
            ProgressStage::PostProcessing,
            90,
            "Calculating reactions...",
        ));
        let mut d_full = DVector::<f64>::zeros(n_dofs);
        for (i, &dof) in free_dofs.iter().enumerate() {
            d_full[dof] = d1[i];
        }

        // R = K·u - F at restrained DOFs
        let ku = sparse_matvec(&k_global, &d_full);
        let reactions: Vec<f64> = (0..n_dofs)
            .map(|dof| {
                if restrained[dof] {
                    ku[dof] - f_global[dof]
                } else {
                    0.0
                }
            })
            .collect();
        let post_processing_ms = elapsed_ms(t);
        progress(ProgressEvent::new(
            ProgressStage::PostProcessing,
            100,
            "Complete!",
        ));

        let timing = SolveTiming {
            assembly_ms,
            boundary_conditions_ms,
            solve_ms,
            post_processing_ms,
            total_ms: elapsed_ms(start),
        };
        debug!("Solve timing: {:?}", timing);
        info!(
            "Solved {} free DOFs with {:?} solver in {:.2} ms",
            n_free, method, timing.total_ms
        );

        Ok(SolverOutput {
            displacements: d_full.iter().copied().collect(),
            reactions,
            metadata: SolverMetadata {
                kernel: self.name().to_string(),
                method,
                iterations,
                total_dofs: n_dofs,
                free_dofs: n_free,
                stiffness_nnz: k_global.nnz(),
            },
            timing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SolverConfig;
    use crate::elements::{Element, Node};
    use crate::solver::protocol::{NodalForce, NodeConstraint};
    use approx::assert_relative_eq;

    const E: f64 = 200e6;
    const I: f64 = 1.0e-4;

    fn beam(span: f64, elements: usize) -> SolveRequest {
        let nodes = (0..=elements)
            .map(|i| Node::new(i, span * i as f64 / elements as f64))
            .collect();
        let elements = (0..elements)
            .map(|k| Element {
                index: k,
                i_node: k,
                j_node: k + 1,
                e: E,
                i: I,
                a: 0.01,
            })
            .collect();
        SolveRequest {
            nodes,
            elements,
            supports: Vec::new(),
            loads: Vec::new(),
            config: SolverConfig::default(),
        }
    }

    fn support(node: usize, restraints: Restraints) -> NodeConstraint {
        NodeConstraint { node, restraints }
    }

    fn solve(request: &SolveRequest) -> BeamResult<SolverOutput> {
        StiffnessKernel.solve(request, &mut |_| {})
    }

    #[test]
    fn test_simply_supported_midspan_load() {
        let mut req = beam(6.0, 12);
        req.supports = vec![
            support(0, Restraints::TX | Restraints::TY),
            support(12, Restraints::TY),
        ];
        req.loads = vec![NodalForce { node: 6, fy: -10.0, mz: 0.0 }];

        let out = solve(&req).unwrap();
        assert_relative_eq!(out.reaction_force(0), 5.0, max_relative = 1e-9);
        assert_relative_eq!(out.reaction_force(12), 5.0, max_relative = 1e-9);
        // δ = PL³ / 48EI
        let expected = -10.0 * 6.0_f64.powi(3) / (48.0 * E * I);
        assert_relative_eq!(out.deflection(6), expected, max_relative = 1e-9);
        assert_eq!(out.metadata.method, SolveMethod::Direct);
        assert_eq!(out.metadata.free_dofs, 2 * 13 - 2);
    }

    #[test]
    fn test_cantilever_reaction_moment() {
        let mut req = beam(2.0, 8);
        req.supports = vec![support(0, Restraints::TX | Restraints::TY | Restraints::RZ)];
        req.loads = vec![NodalForce { node: 8, fy: -4.0, mz: 0.0 }];

        let out = solve(&req).unwrap();
        assert_relative_eq!(out.reaction_force(0), 4.0, max_relative = 1e-9);
        // Counter-clockwise reaction resists the clockwise load couple
        assert_relative_eq!(out.reaction_moment(0), 8.0, max_relative = 1e-9);
        assert_relative_eq!(
            out.deflection(8),
            -4.0 * 8.0 / (3.0 * E * I),
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_iterative_matches_direct() {
        let mut req = beam(5.0, 50);
        req.supports = vec![
            support(0, Restraints::TX | Restraints::TY),
            support(50, Restraints::TY),
        ];
        req.loads = vec![
            NodalForce { node: 10, fy: -3.0, mz: 0.0 },
            NodalForce { node: 37, fy: -7.0, mz: 0.0 },
        ];
        let direct = solve(&req).unwrap();

        req.config.method = SolveMethod::Iterative;
        req.config.tolerance = 1e-12;
        let iterative = solve(&req).unwrap();

        assert_eq!(iterative.metadata.method, SolveMethod::Iterative);
        assert!(iterative.metadata.iterations.is_some());
        for node in 0..=50 {
            assert_relative_eq!(
                iterative.deflection(node),
                direct.deflection(node),
                epsilon = 1e-9,
                max_relative = 1e-4
            );
        }
    }

    #[test]
    fn test_iterative_non_convergence() {
        let mut req = beam(5.0, 50);
        req.supports = vec![support(0, Restraints::TY), support(50, Restraints::TY)];
        req.loads = vec![NodalForce { node: 20, fy: -1.0, mz: 0.0 }];
        req.config.method = SolveMethod::Iterative;
        req.config.max_iterations = 2;
        assert!(matches!(solve(&req), Err(BeamError::ConvergenceFailed(2))));
    }

    #[test]
    fn test_auto_uses_direct_on_long_meshes() {
        let mut req = beam(300.0, 6000);
        req.supports = vec![
            support(0, Restraints::TX | Restraints::TY),
            support(6000, Restraints::TY),
        ];
        req.loads = vec![NodalForce { node: 3000, fy: -10.0, mz: 0.0 }];

        let out = solve(&req).unwrap();
        assert_eq!(out.metadata.method, SolveMethod::Direct);
        assert!(out.metadata.iterations.is_none());
        assert_relative_eq!(out.reaction_force(0), 5.0, max_relative = 1e-3);
        assert_relative_eq!(out.reaction_force(6000), 5.0, max_relative = 1e-3);
    }

    #[test]
    fn test_mechanisms_are_rejected() {
        let mut req = beam(4.0, 4);
        req.loads = vec![NodalForce { node: 2, fy: -1.0, mz: 0.0 }];

        req.supports = vec![support(0, Restraints::TX | Restraints::TY)];
        assert!(matches!(solve(&req), Err(BeamError::Unstable(_))));

        req.supports = vec![support(0, Restraints::RZ), support(4, Restraints::RZ)];
        assert!(matches!(solve(&req), Err(BeamError::Unstable(_))));
    }

    #[test]
    fn test_progress_stages_in_order() {
        let mut req = beam(3.0, 6);
        req.supports = vec![support(0, Restraints::TY), support(6, Restraints::TY)];
        req.loads = vec![NodalForce { node: 3, fy: -1.0, mz: 0.0 }];

        let mut events = Vec::new();
        StiffnessKernel.solve(&req, &mut |e| events.push(e)).unwrap();

        let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![5, 8, 10, 40, 50, 60, 85, 90, 100]);
        assert_eq!(events[0].stage, ProgressStage::Initializing);
        assert_eq!(events[8].stage, ProgressStage::PostProcessing);
    }

    #[test]
    fn test_rejects_broken_element() {
        let mut req = beam(3.0, 3);
        req.elements[1].j_node = 99;
        req.supports = vec![support(0, Restraints::TY), support(3, Restraints::TY)];
        assert!(matches!(solve(&req), Err(BeamError::InvalidInput(_))));
    }
}
