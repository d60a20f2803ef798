//! Cycle behaviour on small model problems
//!
//! The 1-D Dirichlet Laplacian is the reference operator throughout: its
//! Galerkin coarse operators under full weighting are again Laplacians, so
//! convergence rates are predictable.

use approx::assert_relative_eq;
use math_linalg::{CsrMatrix, lu_solve};
use math_multigrid::{
    CycleShape, DirectSolver, Grid1d, MgConfig, MgType, Multigrid, RichardsonTolerances, Smoother,
    SmootherError, full_weighting_1d, linear_interpolation_1d,
};
use ndarray::Array1;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Coarse solver that counts its solves
struct CountingSolver {
    inner: DirectSolver<f64>,
    solves: Arc<AtomicUsize>,
}

impl CountingSolver {
    fn new(solves: Arc<AtomicUsize>) -> Self {
        Self {
            inner: DirectSolver::new(),
            solves,
        }
    }
}

impl Smoother<f64> for CountingSolver {
    fn setup(&mut self, a: &CsrMatrix<f64>) -> Result<(), SmootherError> {
        self.inner.setup(a)
    }

    fn solve(&mut self, a: &CsrMatrix<f64>, b: &Array1<f64>, x: &mut Array1<f64>) -> Result<(), SmootherError> {
        self.solves.fetch_add(1, Ordering::SeqCst);
        self.inner.solve(a, b, x)
    }

    fn iterations(&self) -> usize {
        1
    }

    fn set_iterations(&mut self, _iterations: usize) {}

    fn duplicate(&self) -> Box<dyn Smoother<f64>> {
        Box::new(CountingSolver::new(self.solves.clone()))
    }

    fn describe(&self) -> String {
        "counting lu".to_string()
    }
}

fn relative_residual(a: &CsrMatrix<f64>, b: &Array1<f64>, x: &Array1<f64>) -> f64 {
    let mut r = Array1::zeros(b.len());
    a.residual_into(b, x, &mut r);
    r.dot(&r).sqrt() / b.dot(b).sqrt()
}

fn spd_5x5() -> CsrMatrix<f64> {
    let mut triplets = Vec::new();
    for i in 0..5 {
        triplets.push((i, i, 4.0 + i as f64));
        if i + 1 < 5 {
            triplets.push((i, i + 1, -1.0));
            triplets.push((i + 1, i, -1.0));
        }
    }
    CsrMatrix::from_triplets(5, 5, triplets)
}

#[test]
fn test_two_level_identity_transfer_is_exact() {
    // With identity transfers the coarse problem is the fine problem, so the
    // coarse-grid correction solves it exactly whatever the smoother did.
    let a = spd_5x5();
    let b = Array1::from_vec(vec![1.0, -2.0, 0.5, 3.0, -1.0]);
    let expected = lu_solve(&a.to_dense(), &b).expect("nonsingular");

    let config = MgConfig {
        galerkin: true,
        ..Default::default()
    };
    let mut mg = Multigrid::declare(2, config).expect("two levels");
    mg.set_operator(a);
    mg.set_transfer(1, CsrMatrix::<f64>::identity(5)).expect("level 1");

    let mut x = Array1::zeros(5);
    let failure = mg.apply(&b, &mut x).expect("apply");
    assert!(failure.is_none());

    for i in 0..5 {
        assert_relative_eq!(x[i], expected[i], epsilon = 1e-12);
    }
}

#[test]
fn test_w_cycle_visits_coarsest_more_often() {
    let solves = Arc::new(AtomicUsize::new(0));
    let grid = Grid1d::<f64>::dyadic(4).expect("grid");
    let mut mg = Multigrid::from_discretization(Box::new(grid), MgConfig::for_poisson()).expect("hierarchy");
    assert_eq!(mg.num_levels(), 4);
    mg.set_smoother(0, Box::new(CountingSolver::new(solves.clone())))
        .expect("coarsest");

    let b = Array1::from_elem(15, 1.0);
    let mut x = Array1::zeros(15);

    mg.apply(&b, &mut x).expect("v-cycle");
    assert_eq!(solves.load(Ordering::SeqCst), 1);

    solves.store(0, Ordering::SeqCst);
    mg.set_cycle_type(CycleShape::W);
    mg.apply(&b, &mut x).expect("w-cycle");
    // 2^(levels - 2): level 1 always recurses once
    assert_eq!(solves.load(Ordering::SeqCst), 4);
}

#[test]
fn test_w_on_finest_level_only() {
    let solves = Arc::new(AtomicUsize::new(0));
    let grid = Grid1d::<f64>::dyadic(4).expect("grid");
    let mut mg = Multigrid::from_discretization(Box::new(grid), MgConfig::for_poisson()).expect("hierarchy");
    mg.set_smoother(0, Box::new(CountingSolver::new(solves.clone())))
        .expect("coarsest");
    mg.set_cycle_type_on_level(3, CycleShape::W).expect("finest");
    assert_eq!(mg.level(2).expect("level 2").cycles(), 1);

    let b = Array1::from_elem(15, 1.0);
    let mut x = Array1::zeros(15);
    mg.apply(&b, &mut x).expect("apply");
    // level 3 visits level 2 twice, each a V-cycle down to the coarse solve
    assert_eq!(solves.load(Ordering::SeqCst), 2);

    solves.store(0, Ordering::SeqCst);
    mg.set_cycle_type_on_level(3, CycleShape::V).expect("finest");
    mg.set_cycle_type_on_level(2, CycleShape::W).expect("level 2");
    mg.apply(&b, &mut x).expect("apply");
    assert_eq!(solves.load(Ordering::SeqCst), 2);
}

#[test]
fn test_two_level_w_cycle_recurses_once() {
    let solves = Arc::new(AtomicUsize::new(0));
    let grid = Grid1d::<f64>::new(4).expect("grid");
    let config = MgConfig {
        cycle: CycleShape::W,
        galerkin: true,
        ..Default::default()
    };
    let mut mg = Multigrid::from_discretization(Box::new(grid), config).expect("hierarchy");
    assert_eq!(mg.num_levels(), 2);
    mg.set_smoother(0, Box::new(CountingSolver::new(solves.clone())))
        .expect("coarsest");

    let b = Array1::from_elem(3, 1.0);
    let mut x = Array1::zeros(3);
    mg.apply(&b, &mut x).expect("apply");
    assert_eq!(solves.load(Ordering::SeqCst), 1);
}

#[test]
fn test_laplacian_three_levels_converges_in_ten_cycles() {
    let fine = Grid1d::<f64>::dyadic(6).expect("grid");
    let a = Arc::new(fine.laplacian());
    let n = a.num_rows;
    assert_eq!(n, 63);

    let mut mg = Multigrid::declare(3, MgConfig::for_poisson()).expect("three levels");
    mg.set_operator(a.clone());
    mg.set_restriction(2, full_weighting_1d::<f64>(63).expect("odd")).expect("level 2");
    mg.set_interpolation(2, linear_interpolation_1d::<f64>(63).expect("odd")).expect("level 2");
    mg.set_restriction(1, full_weighting_1d::<f64>(31).expect("odd")).expect("level 1");
    mg.set_interpolation(1, linear_interpolation_1d::<f64>(31).expect("odd")).expect("level 1");

    let b = Array1::from_iter(fine.nodes().iter().map(|&t| (3.0 * t).sin() + 1.0));
    let mut x = Array1::zeros(n);
    let tolerances = RichardsonTolerances {
        rtol: 1e-8,
        atol: 0.0,
        dtol: 1e5,
        max_iterations: 10,
    };
    let outcome = mg.apply_richardson(&b, &mut x, &tolerances, true).expect("richardson");

    assert!(outcome.reason.is_converged());
    assert!(outcome.iterations <= 10);
    assert!(relative_residual(&a, &b, &x) < 1e-8);
    assert_eq!(mg.operator(0).map(|a0| a0.num_rows), Some(15));
}

#[test]
fn test_full_multigrid_single_pass() {
    let fine = Grid1d::<f64>::dyadic(6).expect("grid");
    let a = fine.laplacian();
    let mut mg = Multigrid::from_discretization(Box::new(fine), MgConfig::for_nested_iteration())
        .expect("hierarchy");
    assert_eq!(mg.mg_type(), MgType::Full);

    let b = Array1::from_elem(63, 1.0);
    let mut x = Array1::from_elem(63, 5.0);
    mg.apply(&b, &mut x).expect("apply");
    assert!(relative_residual(&a, &b, &x) < 0.1);
}

#[test]
fn test_kaskade_reduces_residual() {
    let fine = Grid1d::<f64>::dyadic(6).expect("grid");
    let a = fine.laplacian();
    let mut mg = Multigrid::from_discretization(Box::new(fine), MgConfig::for_poisson()).expect("hierarchy");
    mg.set_type(MgType::Kaskade);

    let b = Array1::from_elem(63, 1.0);
    let mut x = Array1::zeros(63);
    mg.apply(&b, &mut x).expect("apply");
    assert!(x.iter().all(|v| v.is_finite()));
    assert!(relative_residual(&a, &b, &x) < 0.5);
}

#[test]
fn test_additive_is_linear_in_rhs() {
    let fine = Grid1d::<f64>::dyadic(5).expect("grid");
    let mut mg = Multigrid::from_discretization(Box::new(fine), MgConfig::for_poisson()).expect("hierarchy");
    mg.set_type(MgType::Additive);

    let b = Array1::from_iter((0..31).map(|i| ((i * 7) % 5) as f64 - 2.0));
    let mut x1 = Array1::zeros(31);
    mg.apply(&b, &mut x1).expect("apply");

    let b2 = b.mapv(|v| 2.0 * v);
    let mut x2 = Array1::from_elem(31, 9.0);
    mg.apply(&b2, &mut x2).expect("apply");

    assert!(x1.iter().any(|v| v.abs() > 0.0));
    for i in 0..31 {
        assert_relative_eq!(x2[i], 2.0 * x1[i], epsilon = 1e-12, max_relative = 1e-12);
    }
}

#[test]
fn test_single_level_hierarchy_only_smooths() {
    let fine = Grid1d::<f64>::new(8).expect("grid");
    let a = fine.laplacian();
    let mut mg = Multigrid::declare(1, MgConfig::for_poisson()).expect("one level");
    mg.set_operator(a.clone());

    let b = Array1::from_elem(7, 1.0);
    let mut x = Array1::zeros(7);
    mg.apply(&b, &mut x).expect("apply");
    let after = relative_residual(&a, &b, &x);
    assert!(after < 1.0);
    assert!(after > 1e-3);
}

#[test]
fn test_cycles_per_apply_improves_result() {
    let fine = Grid1d::<f64>::dyadic(6).expect("grid");
    let a = fine.laplacian();
    let mut mg = Multigrid::from_discretization(Box::new(fine), MgConfig::for_poisson()).expect("hierarchy");

    let b = Array1::from_elem(63, 1.0);
    let mut once = Array1::zeros(63);
    mg.apply(&b, &mut once).expect("apply");

    mg.set_cycles_per_apply(3);
    let mut thrice = Array1::zeros(63);
    mg.apply(&b, &mut thrice).expect("apply");

    assert!(relative_residual(&a, &b, &thrice) < relative_residual(&a, &b, &once));
}
