//! First trial step `t0` for each line search.

use crate::error::ConfigError;
use crate::params;
use crate::state::{SolverState, norm_inf};

/// Proposes the first trial step of the current iteration.
///
/// `state.d` is the new direction; `state.t()` and `state.f()` still describe the
/// previously accepted step (zero before the first line search).
pub trait Initializer {
    fn id(&self) -> &'static str;

    /// Always strictly positive and finite.
    fn get(&mut self, state: &SolverState) -> f64;
}

fn accept_or_unit(t0: f64, epsilon: f64) -> f64 {
    if t0.is_finite() && t0 > epsilon { t0 } else { 1.0 }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConstantParams {
    pub t0: f64,
}

impl Default for ConstantParams {
    fn default() -> Self {
        Self { t0: 1.0 }
    }
}

impl ConstantParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        params::open("lsearch0::constant::t0", self.t0, 0.0, f64::INFINITY)?;
        Ok(())
    }
}

/// Parameters of the [`Linear`] and [`Quadratic`] extrapolating initializers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExtrapolationParams {
    /// Safety factor on the extrapolated step.
    pub alpha: f64,
    /// Maximum growth relative to the previous step.
    pub beta: f64,
}

impl Default for ExtrapolationParams {
    fn default() -> Self {
        Self {
            alpha: 1.01,
            beta: 10.0,
        }
    }
}

impl ExtrapolationParams {
    pub fn validate(&self, id: &str) -> Result<(), ConfigError> {
        params::open(&format!("lsearch0::{id}::alpha"), self.alpha, 1.0, 1e6)?;
        params::open(&format!("lsearch0::{id}::beta"), self.beta, 1.0, 1e6)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CgDescentInitParams {
    /// First iteration: fraction of `‖x‖∞/‖g‖∞` (or `|f|/‖g‖²`).
    pub phi0: f64,
    /// Later iterations: multiple of the previous step.
    pub phi2: f64,
}

impl Default for CgDescentInitParams {
    fn default() -> Self {
        Self {
            phi0: 0.01,
            phi2: 2.0,
        }
    }
}

impl CgDescentInitParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        params::open("lsearch0::cgdescent::phi0", self.phi0, 0.0, 1.0)?;
        params::open("lsearch0::cgdescent::phi2", self.phi2, 1.0, f64::INFINITY)?;
        Ok(())
    }
}

/// Always the same step.
pub struct Constant {
    params: ConstantParams,
}

impl Constant {
    pub fn new(params: ConstantParams) -> Self {
        Self { params }
    }
}

impl Initializer for Constant {
    fn id(&self) -> &'static str {
        "constant"
    }

    fn get(&mut self, _state: &SolverState) -> f64 {
        self.params.t0
    }
}

/// Scales the previous step by the ratio of the previous and current slopes.
pub struct Linear {
    params: ExtrapolationParams,
    epsilon: f64,
    iteration: usize,
    prev_dg: f64,
}

impl Linear {
    pub fn new(params: ExtrapolationParams, epsilon: f64) -> Self {
        Self {
            params,
            epsilon,
            iteration: 0,
            prev_dg: 0.0,
        }
    }
}

impl Initializer for Linear {
    fn id(&self) -> &'static str {
        "linear"
    }

    fn get(&mut self, state: &SolverState) -> f64 {
        let dg = state.dg();
        let t0 = if self.iteration == 0 {
            1.0
        } else {
            let t = self.params.alpha * state.t() * self.prev_dg / dg;
            t.min(self.params.beta * state.t())
        };
        self.iteration += 1;
        self.prev_dg = dg;
        accept_or_unit(t0, self.epsilon)
    }
}

/// Minimizer of the quadratic through the last two function values and the current slope.
pub struct Quadratic {
    params: ExtrapolationParams,
    epsilon: f64,
    iteration: usize,
    prev_f: f64,
}

impl Quadratic {
    pub fn new(params: ExtrapolationParams, epsilon: f64) -> Self {
        Self {
            params,
            epsilon,
            iteration: 0,
            prev_f: 0.0,
        }
    }
}

impl Initializer for Quadratic {
    fn id(&self) -> &'static str {
        "quadratic"
    }

    fn get(&mut self, state: &SolverState) -> f64 {
        let t0 = if self.iteration == 0 {
            1.0
        } else {
            let t = self.params.alpha * 2.0 * (state.f() - self.prev_f) / state.dg();
            t.min(1.0).min(self.params.beta * state.t())
        };
        self.iteration += 1;
        self.prev_f = state.f();
        accept_or_unit(t0, self.epsilon)
    }
}

/// CG_DESCENT initial steps: scale-based guess first, then a multiple of the last step.
pub struct CgDescentInit {
    params: CgDescentInitParams,
    epsilon: f64,
    iteration: usize,
}

impl CgDescentInit {
    pub fn new(params: CgDescentInitParams, epsilon: f64) -> Self {
        Self {
            params,
            epsilon,
            iteration: 0,
        }
    }
}

impl Initializer for CgDescentInit {
    fn id(&self) -> &'static str {
        "cgdescent"
    }

    fn get(&mut self, state: &SolverState) -> f64 {
        let t0 = if self.iteration == 0 {
            let xnorm = norm_inf(state.x());
            let gnorm = norm_inf(state.g());
            if xnorm > 0.0 {
                self.params.phi0 * xnorm / gnorm
            } else if state.f() != 0.0 {
                self.params.phi0 * state.f().abs() / state.g().dot(state.g())
            } else {
                1.0
            }
        } else {
            self.params.phi2 * state.t()
        };
        self.iteration += 1;
        accept_or_unit(t0, self.epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Evaluator;
    use crate::test_functions::sphere;
    use ndarray::array;
    use spectral::prelude::*;

    fn state_at(x: ndarray::Array1<f64>) -> SolverState {
        let mut function = sphere(x.len());
        let mut evaluator = Evaluator::new(&mut function);
        let mut state = SolverState::new(&mut evaluator, x);
        state.d = -&state.g;
        state
    }

    #[test]
    fn test_constant_returns_configured_step() {
        let mut init = Constant::new(ConstantParams { t0: 0.25 });
        let state = state_at(array![1.0, 2.0]);
        assert_eq!(init.get(&state), 0.25);
        assert_eq!(init.get(&state), 0.25);
    }

    #[test]
    fn test_first_iteration_tries_unit_step() {
        let state = state_at(array![1.0, 2.0]);
        assert_eq!(Linear::new(ExtrapolationParams::default(), 1e-6).get(&state), 1.0);
        assert_eq!(Quadratic::new(ExtrapolationParams::default(), 1e-6).get(&state), 1.0);
    }

    #[test]
    fn test_quadratic_uses_last_decrease() {
        let mut init = Quadratic::new(ExtrapolationParams::default(), 1e-6);
        let first = state_at(array![1.0, 2.0]);
        init.get(&first);

        // Accepted step 0.4 from f = 5 down to f = 0.2.
        let mut second = state_at(array![0.2, 0.4]);
        second.t = 0.4;
        // dg = -‖g‖² = -0.8; 1.01 * 2 * (0.2 - 5) / -0.8 = 12.12, capped at 1.
        assert_eq!(init.get(&second), 1.0);

        let mut third = state_at(array![0.1, 0.2]);
        third.t = 0.01;
        // 1.01 * 2 * (0.05 - 0.2) / -0.2 = 1.515, capped at beta * t = 0.1.
        assert_that!(&init.get(&third)).is_close_to(0.1, 1e-12);
    }

    #[test]
    fn test_linear_scales_previous_step_by_slope_ratio() {
        let mut init = Linear::new(ExtrapolationParams::default(), 1e-6);
        let first = state_at(array![1.0, 0.0]); // dg = -4
        init.get(&first);

        let mut second = state_at(array![0.5, 0.0]); // dg = -1
        second.t = 0.1;
        // 1.01 * 0.1 * (-4) / (-1) = 0.404
        assert_that!(&init.get(&second)).is_close_to(0.404, 1e-12);
    }

    #[test]
    fn test_non_finite_estimate_falls_back_to_unit_step() {
        let mut init = Linear::new(ExtrapolationParams::default(), 1e-6);
        let first = state_at(array![1.0, 0.0]);
        init.get(&first);
        let mut second = state_at(array![1.0, 0.0]);
        second.d = array![0.0, 0.0]; // dg = 0
        second.t = 0.5;
        assert_eq!(init.get(&second), 1.0);

        // Below the epsilon floor.
        let mut third = state_at(array![1.0, 0.0]);
        third.t = 1e-9;
        assert_eq!(init.get(&third), 1.0);
    }

    #[test]
    fn test_cgdescent_first_step_uses_problem_scale() {
        let mut init = CgDescentInit::new(CgDescentInitParams::default(), 1e-6);
        let state = state_at(array![2.0, -1.0]);
        // 0.01 * ‖x‖∞ / ‖g‖∞ = 0.01 * 2 / 4
        assert_that!(&init.get(&state)).is_close_to(0.005, 1e-15);

        let mut next = state_at(array![1.0, 0.0]);
        next.t = 0.3;
        assert_that!(&init.get(&next)).is_close_to(0.6, 1e-15);
    }

    #[test]
    fn test_parameters_are_range_checked() {
        assert!(ConstantParams { t0: 0.0 }.validate().is_err());
        assert!(ExtrapolationParams { alpha: 1.0, beta: 10.0 }.validate("linear").is_err());
        assert!(ExtrapolationParams::default().validate("quadratic").is_ok());
        assert!(CgDescentInitParams { phi0: 0.01, phi2: 0.5 }.validate().is_err());
    }
}
