//! Strong Wolfe bracketing and zoom, Nocedal & Wright, "Numerical Optimization", 2nd ed., §3.5.

use super::step::{Interpolation, LineSearchStep, clamp_step};
use super::strategy::{LineSearchStrategy, STPMAX, StrategyBase};
use crate::error::ConfigError;
use crate::function::Evaluator;
use crate::params;
use crate::state::SolverState;

type Step = LineSearchStep;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FletcherParams {
    /// Maximum extrapolation factor while bracketing.
    pub tau1: f64,
    /// Zoom safeguard at the low end of the bracket.
    pub tau2: f64,
    /// Zoom safeguard at the high end of the bracket.
    pub tau3: f64,
    pub interpolation: Interpolation,
}

impl Default for FletcherParams {
    fn default() -> Self {
        Self {
            tau1: 9.0,
            tau2: 0.1,
            tau3: 0.5,
            interpolation: Interpolation::Cubic,
        }
    }
}

impl FletcherParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        params::open("lsearchk::fletcher::tau1", self.tau1, 2.0, 1e6)?;
        params::open("lsearchk::fletcher::tau2", self.tau2, 0.0, self.tau3)?;
        params::left_open("lsearchk::fletcher::tau3", self.tau3, 0.0, 0.5)?;
        Ok(())
    }
}

pub struct Fletcher {
    base: StrategyBase,
    params: FletcherParams,
}

impl Fletcher {
    pub fn new(base: StrategyBase, params: FletcherParams) -> Self {
        Self { base, params }
    }

    fn zoom(
        &self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        state: &mut SolverState,
        mut lo: Step,
        mut hi: Step,
    ) -> bool {
        let (c1, c2) = (self.base.c1, self.base.c2);
        for _ in 0..self.base.max_iterations {
            let width = hi.t - lo.t;
            if width.abs() <= f64::EPSILON * lo.t.max(hi.t) {
                break;
            }
            // Oriented from lo toward hi; lo may sit right of hi.
            let near_lo = lo.t + self.params.tau2 * width;
            let near_hi = hi.t - self.params.tau3 * width;
            let t = clamp_step(
                Step::interpolate(lo, hi, self.params.interpolation),
                near_lo.min(near_hi),
                near_lo.max(near_hi),
            );
            if !self.base.move_to(evaluator, state0, state, t) {
                return false;
            }

            let curr = Step::from(&*state);
            if !state.has_armijo(state0, c1) || curr.f >= lo.f {
                hi = curr;
            } else if state.has_strong_wolfe(state0, c2) {
                return true;
            } else {
                if curr.g * (hi.t - lo.t) >= 0.0 {
                    hi = lo;
                }
                lo = curr;
            }
        }
        log::debug!("[Lsearch fletcher] zoom did not find an acceptable step");
        false
    }
}

impl LineSearchStrategy for Fletcher {
    fn id(&self) -> &'static str {
        "fletcher"
    }

    fn base(&self) -> &StrategyBase {
        &self.base
    }

    fn search(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        state: &mut SolverState,
    ) -> bool {
        let (c1, c2) = (self.base.c1, self.base.c2);
        let mut prev = Step::origin(state0);
        let mut curr = Step::from(&*state);

        for _ in 0..self.base.max_iterations {
            if !state.has_armijo(state0, c1) || (prev.t > 0.0 && curr.f >= prev.f) {
                return self.zoom(evaluator, state0, state, prev, curr);
            }
            if state.has_strong_wolfe(state0, c2) {
                return true;
            }
            if !state.has_descent() {
                return self.zoom(evaluator, state0, state, curr, prev);
            }
            if curr.t >= STPMAX {
                break;
            }

            let tmin = curr.t + (curr.t - prev.t);
            let tmax = (curr.t + self.params.tau1 * (curr.t - prev.t)).min(STPMAX);
            let t = clamp_step(
                Step::interpolate(prev, curr, self.params.interpolation),
                tmin.min(tmax),
                tmax,
            );
            if !self.base.move_to(evaluator, state0, state, t) {
                return false;
            }
            prev = curr;
            curr = Step::from(&*state);
        }
        log::debug!("[Lsearch fletcher] bracketing did not find an acceptable step");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsearch::strategy::tests::{assert_armijo, assert_strong_wolfe, check_strategy};

    #[test]
    fn test_accepted_steps_satisfy_strong_wolfe() {
        check_strategy(
            |c1, c2| Fletcher::new(StrategyBase::new(c1, c2, 100), FletcherParams::default()),
            |state0, state, c1, c2| {
                assert_armijo(state0, state, c1);
                assert_strong_wolfe(state0, state, c2);
            },
        );
    }

    #[test]
    fn test_quadratic_interpolation_is_also_accepted() {
        let params = FletcherParams {
            interpolation: Interpolation::Quadratic,
            ..FletcherParams::default()
        };
        check_strategy(
            |c1, c2| Fletcher::new(StrategyBase::new(c1, c2, 100), params),
            |state0, state, c1, c2| {
                assert_armijo(state0, state, c1);
                assert_strong_wolfe(state0, state, c2);
            },
        );
    }

    #[test]
    fn test_zoom_keeps_the_minimizer_when_the_bracket_is_reversed() {
        use crate::lsearch::strategy::StrategyLogger;
        use crate::test_functions::sphere;
        use ndarray::array;
        use spectral::prelude::*;
        use std::sync::{Arc, Mutex};

        let trials = Arc::new(Mutex::new(Vec::new()));
        let seen = trials.clone();
        let logger: StrategyLogger = Arc::new(move |_, trial| {
            seen.lock().unwrap().push(trial.t());
        });

        // x(t) = 1 - 2t overshoots at t = 0.8 with a positive slope, so the zoom runs
        // on lo = 0.8, hi = 0 and the cubic lands on the exact minimizer t = 0.5.
        let mut function = sphere(1);
        let mut evaluator = Evaluator::new(&mut function);
        let mut state = SolverState::new(&mut evaluator, array![1.0]);
        state.d = -&state.g;
        let base = StrategyBase::new(1e-4, 0.1, 100).with_logger(Some(logger));
        let mut strategy = Fletcher::new(base, FletcherParams::default());
        assert!(strategy.get(&mut evaluator, &mut state, 0.8));

        let trials = trials.lock().unwrap();
        assert_eq!(trials.len(), 2);
        assert_that!(&trials[0]).is_close_to(0.8, 1e-15);
        assert_that!(&trials[1]).is_close_to(0.5, 1e-12);
        assert_that!(&state.f()).is_close_to(0.0, 1e-20);
    }

    #[test]
    fn test_safeguards_must_be_ordered() {
        let params = FletcherParams {
            tau2: 0.5,
            tau3: 0.4,
            ..FletcherParams::default()
        };
        assert!(params.validate().is_err());
        assert!(FletcherParams::default().validate().is_ok());
    }
}
