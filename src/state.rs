//! The iterate record mutated by the solver driver and the line searches.

use crate::error::SolverError;
use crate::function::Evaluator;
use ndarray::Array1;
use std::fmt;

/// Why a run ended without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Failure {
    /// The line search could not find an acceptable step.
    LineSearch,
    /// Non-finite function value, gradient or point.
    Diverged,
    MaxIterations,
    MaxEvaluations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverStatus {
    Running,
    Converged,
    Failed(Failure),
    /// Cancelled by the logging hook.
    Stopped,
}

impl SolverStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SolverStatus::Running)
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverStatus::Running => write!(f, "running"),
            SolverStatus::Converged => write!(f, "converged"),
            SolverStatus::Stopped => write!(f, "stopped"),
            SolverStatus::Failed(Failure::LineSearch) => write!(f, "failed (line-search)"),
            SolverStatus::Failed(Failure::Diverged) => write!(f, "failed (diverged)"),
            SolverStatus::Failed(Failure::MaxIterations) => write!(f, "failed (max iterations)"),
            SolverStatus::Failed(Failure::MaxEvaluations) => write!(f, "failed (max evaluations)"),
        }
    }
}

/// `‖a‖_∞`, NaN if any component is NaN.
pub(crate) fn norm_inf(a: &Array1<f64>) -> f64 {
    a.iter().fold(0.0, |m: f64, &v| {
        if v.is_nan() || v.abs() > m { v.abs() } else { m }
    })
}

/// Current iterate, gradient, value, direction and step of a run.
///
/// `f` and `g` always belong to the same `x`: they are only ever replaced together.
#[derive(Debug, Clone)]
pub struct SolverState {
    pub(crate) x: Array1<f64>,
    pub(crate) g: Array1<f64>,
    pub(crate) d: Array1<f64>,
    pub(crate) f: f64,
    pub(crate) t: f64,
    pub(crate) iterations: usize,
    pub(crate) fcalls: usize,
    pub(crate) gcalls: usize,
    pub(crate) status: SolverStatus,
}

impl SolverState {
    /// Evaluates the objective at `x0`. A non-finite result is not an error here:
    /// the returned state is simply not [`valid`](Self::valid).
    pub fn new(evaluator: &mut Evaluator<'_>, x0: Array1<f64>) -> Self {
        let n = x0.len();
        let mut g = Array1::zeros(n);
        let f = evaluator.value_and_gradient_into(&x0, &mut g);
        Self {
            x: x0,
            g,
            d: Array1::zeros(n),
            f,
            t: 0.0,
            iterations: 0,
            fcalls: evaluator.fcalls(),
            gcalls: evaluator.gcalls(),
            status: SolverStatus::Running,
        }
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn g(&self) -> &Array1<f64> {
        &self.g
    }

    pub fn d(&self) -> &Array1<f64> {
        &self.d
    }

    pub fn f(&self) -> f64 {
        self.f
    }

    /// Last trial (or accepted) step length.
    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn fcalls(&self) -> usize {
        self.fcalls
    }

    pub fn gcalls(&self) -> usize {
        self.gcalls
    }

    pub fn status(&self) -> SolverStatus {
        self.status
    }

    /// Directional derivative `g·d`.
    pub fn dg(&self) -> f64 {
        self.g.dot(&self.d)
    }

    pub fn has_descent(&self) -> bool {
        self.dg() < 0.0
    }

    /// `‖g‖_∞ / (1 + |f|)`.
    pub fn convergence_criterion(&self) -> f64 {
        norm_inf(&self.g) / (1.0 + self.f.abs())
    }

    pub fn converged(&self, epsilon: f64) -> bool {
        self.convergence_criterion() < epsilon
    }

    pub fn valid(&self) -> bool {
        self.f.is_finite()
            && self.t.is_finite()
            && self.x.iter().all(|v| v.is_finite())
            && self.g.iter().all(|v| v.is_finite())
    }

    /// Replaces point, gradient and value at once.
    pub fn update(&mut self, x: Array1<f64>, g: Array1<f64>, f: f64) {
        assert_eq!(x.len(), self.x.len(), "state: incompatible point");
        assert_eq!(g.len(), self.g.len(), "state: incompatible gradient");
        self.x = x;
        self.g = g;
        self.f = f;
    }

    /// Moves to `state0.x + t·state0.d` and re-evaluates. Returns [`valid`](Self::valid).
    pub(crate) fn update_along(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        t: f64,
    ) -> bool {
        self.t = t;
        self.d.assign(&state0.d);
        let (f, _) = evaluator.value_and_slope(&state0.x, t, &state0.d, &mut self.x, &mut self.g);
        self.f = f;
        self.fcalls = evaluator.fcalls();
        self.gcalls = evaluator.gcalls();
        self.valid()
    }

    /// Sufficient decrease: `f ≤ f0 + c1·t·dg0`.
    pub fn has_armijo(&self, state0: &SolverState, c1: f64) -> bool {
        self.f <= state0.f + c1 * self.t * state0.dg()
    }

    /// `f ≤ f0 + epsilon`.
    pub fn has_approx_armijo(&self, state0: &SolverState, epsilon: f64) -> bool {
        self.f <= state0.f + epsilon
    }

    /// Curvature: `dg ≥ c2·dg0`.
    pub fn has_wolfe(&self, state0: &SolverState, c2: f64) -> bool {
        self.dg() >= c2 * state0.dg()
    }

    /// `|dg| ≤ c2·|dg0|`.
    pub fn has_strong_wolfe(&self, state0: &SolverState, c2: f64) -> bool {
        self.dg().abs() <= c2 * state0.dg().abs()
    }

    /// `(2·c1 - 1)·dg0 ≥ dg ≥ c2·dg0`.
    pub fn has_approx_wolfe(&self, state0: &SolverState, c1: f64, c2: f64) -> bool {
        let dg0 = state0.dg();
        let dg = self.dg();
        (2.0 * c1 - 1.0) * dg0 >= dg && dg >= c2 * dg0
    }

    /// Converts the terminal status into a `Result`. Converged and stopped runs are `Ok`.
    pub fn into_result(self) -> Result<SolverState, SolverError> {
        match self.status {
            SolverStatus::Failed(Failure::LineSearch) => Err(SolverError::LineSearchFailed {
                iterations: self.iterations,
                last_state: Box::new(self),
            }),
            SolverStatus::Failed(Failure::Diverged) => Err(SolverError::Diverged {
                last_state: Box::new(self),
            }),
            SolverStatus::Failed(Failure::MaxIterations) => Err(SolverError::MaxIterationsReached {
                last_state: Box::new(self),
            }),
            SolverStatus::Failed(Failure::MaxEvaluations) => {
                Err(SolverError::MaxEvaluationsReached {
                    last_state: Box::new(self),
                })
            }
            SolverStatus::Running | SolverStatus::Converged | SolverStatus::Stopped => Ok(self),
        }
    }
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "i={},calls={}|{},f={:.6e},g={:.6e},t={:.3e}[{}]",
            self.iterations,
            self.fcalls,
            self.gcalls,
            self.f,
            self.convergence_criterion(),
            self.t,
            self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{Evaluator, Objective};
    use crate::test_functions::sphere;
    use ndarray::array;
    use spectral::prelude::*;

    #[test]
    fn test_new_state_evaluates_once() {
        let mut function = sphere(2);
        let mut evaluator = Evaluator::new(&mut function);
        let state = SolverState::new(&mut evaluator, array![3.0, -4.0]);

        assert_that!(&state.f()).is_close_to(25.0, 1e-15);
        assert_eq!(state.g(), &array![6.0, -8.0]);
        assert_eq!((state.fcalls(), state.gcalls()), (1, 1));
        assert_eq!(state.t(), 0.0);
        assert_eq!(state.status(), SolverStatus::Running);
        assert!(state.valid());
    }

    #[test]
    fn test_non_finite_start_is_an_invalid_state() {
        let mut function = Objective::new(1, |_: &Array1<f64>| (f64::NAN, array![1.0]));
        let mut evaluator = Evaluator::new(&mut function);
        let state = SolverState::new(&mut evaluator, array![1.0]);
        assert!(!state.valid());
        assert!(!state.converged(1e-6));
    }

    #[test]
    fn test_convergence_criterion_is_scale_invariant() {
        let mut function = sphere(2);
        let mut evaluator = Evaluator::new(&mut function);
        let state = SolverState::new(&mut evaluator, array![1.0, 0.5]);
        // ‖g‖∞ = 2, f = 1.25
        assert_that!(&state.convergence_criterion()).is_close_to(2.0 / 2.25, 1e-15);
        assert!(!state.converged(0.5));
        assert!(state.converged(0.9));
    }

    #[test]
    fn test_nan_gradient_never_converges() {
        assert!(norm_inf(&array![0.0, f64::NAN, 1.0]).is_nan());
        assert!(norm_inf(&array![f64::NAN, 0.0]).is_nan());
        assert_eq!(norm_inf(&array![-3.0, 2.0]), 3.0);
    }

    #[test]
    fn test_descent_and_wolfe_predicates() {
        let mut function = sphere(1);
        let mut evaluator = Evaluator::new(&mut function);
        let mut state0 = SolverState::new(&mut evaluator, array![1.0]);
        state0.d = array![-2.0];
        assert!(state0.has_descent());
        assert_that!(&state0.dg()).is_close_to(-4.0, 1e-15);

        let mut state = state0.clone();
        assert!(state.update_along(&mut evaluator, &state0, 0.5));
        assert_eq!(state.x(), &array![0.0]);
        assert!(state.has_armijo(&state0, 1e-4));
        assert!(state.has_wolfe(&state0, 0.9));
        assert!(state.has_strong_wolfe(&state0, 0.1));
        assert!(state.has_approx_wolfe(&state0, 1e-4, 0.9));

        assert!(state.update_along(&mut evaluator, &state0, 1.0));
        assert!(!state.has_armijo(&state0, 1e-4));
        assert!(state.has_approx_armijo(&state0, 0.0));
        assert!(!state.has_strong_wolfe(&state0, 0.9));
        assert_eq!((state.fcalls(), state.gcalls()), (3, 3));
    }

    #[test]
    fn test_update_replaces_point_gradient_and_value() {
        let mut function = sphere(2);
        let mut evaluator = Evaluator::new(&mut function);
        let mut state = SolverState::new(&mut evaluator, array![1.0, 1.0]);
        state.update(array![0.0, 0.0], array![0.0, 0.0], 0.0);
        assert_eq!(state.f(), 0.0);
        assert!(state.converged(1e-12));
    }

    #[test]
    fn test_failed_status_maps_to_error() {
        let mut function = sphere(1);
        let mut evaluator = Evaluator::new(&mut function);
        let mut state = SolverState::new(&mut evaluator, array![1.0]);
        state.status = SolverStatus::Failed(Failure::MaxIterations);
        assert!(matches!(
            state.clone().into_result(),
            Err(SolverError::MaxIterationsReached { .. })
        ));
        state.status = SolverStatus::Stopped;
        assert!(state.into_result().is_ok());
    }
}
