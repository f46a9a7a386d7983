//! Armijo backtracking with interpolated, safeguarded reductions.

use super::step::{Interpolation, LineSearchStep, clamp_step};
use super::strategy::{LineSearchStrategy, StrategyBase};
use crate::error::ConfigError;
use crate::function::Evaluator;
use crate::state::SolverState;

type Step = LineSearchStep;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BacktrackParams {
    pub interpolation: Interpolation,
}

impl BacktrackParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Only sufficient decrease is enforced: pair it with descent methods that do not need
/// the curvature condition.
pub struct Backtrack {
    base: StrategyBase,
    params: BacktrackParams,
}

impl Backtrack {
    pub fn new(base: StrategyBase, params: BacktrackParams) -> Self {
        Self { base, params }
    }
}

impl LineSearchStrategy for Backtrack {
    fn id(&self) -> &'static str {
        "backtrack"
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
        let origin = Step::origin(state0);
        for _ in 0..self.base.max_iterations {
            if state.has_armijo(state0, self.base.c1) {
                return true;
            }
            let curr = Step::from(&*state);
            let t = clamp_step(
                Step::interpolate(origin, curr, self.params.interpolation),
                0.1 * curr.t,
                0.5 * curr.t,
            );
            if !self.base.move_to(evaluator, state0, state, t) {
                return false;
            }
        }
        let accepted = state.has_armijo(state0, self.base.c1);
        if !accepted {
            log::debug!(
                "[Lsearch backtrack] no sufficient decrease after {} reductions",
                self.base.max_iterations
            );
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Objective;
    use crate::lsearch::strategy::tests::{assert_armijo, check_strategy};
    use ndarray::{Array1, array};

    #[test]
    fn test_accepted_steps_satisfy_armijo() {
        check_strategy(
            |c1, c2| Backtrack::new(StrategyBase::new(c1, c2, 100), BacktrackParams::default()),
            |state0, state, c1, _| assert_armijo(state0, state, c1),
        );
    }

    #[test]
    fn test_bisection_halves_the_step() {
        let mut function = Objective::new(1, |x: &Array1<f64>| (x.dot(x), 2.0 * x));
        let mut evaluator = Evaluator::new(&mut function);
        let mut state = SolverState::new(&mut evaluator, array![1.0]);
        state.d = -&state.g;

        let params = BacktrackParams {
            interpolation: Interpolation::Bisection,
        };
        let mut strategy = Backtrack::new(StrategyBase::new(1e-4, 0.9, 100), params);
        // t = 4 and t = 2 (x = -7, -3) fail, t = 1 (x = -1) fails, t = 0.5 reaches the minimum.
        assert!(strategy.get(&mut evaluator, &mut state, 4.0));
        assert_eq!(state.t(), 0.5);
        assert_eq!(state.f(), 0.0);
    }

    #[test]
    fn test_reports_failure_when_the_gradient_lies() {
        // The reported gradient points uphill, so the function never decreases along -g.
        let mut function = Objective::new(1, |x: &Array1<f64>| (x.dot(x), -2.0 * x));
        let mut evaluator = Evaluator::new(&mut function);
        let mut state = SolverState::new(&mut evaluator, array![1.0]);
        state.d = -&state.g;

        let mut strategy = Backtrack::new(StrategyBase::new(1e-4, 0.9, 5), BacktrackParams::default());
        assert!(!strategy.get(&mut evaluator, &mut state, 1.0));
        assert!(state.f() > 1.0);
    }
}
