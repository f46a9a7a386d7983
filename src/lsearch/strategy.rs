//! The step-length search contract and the bookkeeping every strategy shares.

use crate::function::Evaluator;
use crate::state::SolverState;
use std::sync::Arc;

/// Smallest trial step.
pub const STPMIN: f64 = 10.0 * f64::EPSILON;
/// Largest trial step.
pub const STPMAX: f64 = 1.0 / STPMIN;

/// Called with `(state0, trial)` after every trial evaluation.
pub type StrategyLogger = Arc<dyn Fn(&SolverState, &SolverState) + Send + Sync>;

/// Wolfe constants, trial budget and trial hook common to all strategies.
#[derive(Clone)]
pub struct StrategyBase {
    pub(crate) c1: f64,
    pub(crate) c2: f64,
    pub(crate) max_iterations: usize,
    logger: Option<StrategyLogger>,
}

impl StrategyBase {
    pub fn new(c1: f64, c2: f64, max_iterations: usize) -> Self {
        Self {
            c1,
            c2,
            max_iterations,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Option<StrategyLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Evaluates the trial `state0.x + t·state0.d` into `state`. Returns whether it is finite.
    pub(crate) fn move_to(
        &self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        state: &mut SolverState,
        t: f64,
    ) -> bool {
        let valid = state.update_along(evaluator, state0, t);
        log::trace!(
            "[Lsearch] t={:.6e} f={:.6e} dg={:.6e} (f0={:.6e} dg0={:.6e})",
            t,
            state.f(),
            state.dg(),
            state0.f(),
            state0.dg()
        );
        if let Some(logger) = &self.logger {
            logger(state0, state);
        }
        valid
    }
}

/// Adjusts the step along `state.d` until an acceptance test holds.
pub trait LineSearchStrategy {
    fn id(&self) -> &'static str;

    fn base(&self) -> &StrategyBase;

    /// Searches from the already evaluated trial `state` (at `state.t()`).
    fn search(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        state: &mut SolverState,
    ) -> bool;

    /// Moves `state` to an accepted step starting from `t0`.
    ///
    /// `true` means the strategy's Wolfe-type conditions hold at `state`, with one exception:
    /// when rounding or the `[STPMIN, STPMAX]` bounds stop the search, `morethuente` accepts
    /// any finite trial with `t > 0` that strictly lowered `f`, as MINPACK does.
    /// On `false` the state holds the last trial; the driver decides what to keep.
    fn get(&mut self, evaluator: &mut Evaluator<'_>, state: &mut SolverState, t0: f64) -> bool {
        if !state.has_descent() {
            log::error!(
                "[Lsearch {}] not a descent direction (dg={:.6e})",
                self.id(),
                state.dg()
            );
            return false;
        }

        let state0 = state.clone();
        let base = self.base().clone();
        let mut t = if t0.is_finite() {
            t0.max(STPMIN).min(STPMAX)
        } else {
            1.0
        };
        let mut valid = base.move_to(evaluator, &state0, state, t);
        let mut shrinks = 0;
        while !valid && shrinks < base.max_iterations {
            t *= 0.3;
            shrinks += 1;
            log::debug!(
                "[Lsearch {}] non-finite trial; shrinking step to {:.3e}",
                self.id(),
                t
            );
            valid = base.move_to(evaluator, &state0, state, t);
        }
        if !valid {
            return false;
        }

        self.search(evaluator, &state0, state)
    }
}
