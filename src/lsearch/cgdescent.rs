//! Hager & Zhang, "A new conjugate gradient method with guaranteed descent and an efficient
//! line search", 2005 (CG_DESCENT line search).
//!
//! Accepts the regular Wolfe conditions and, once the function values flatten out relative to
//! their running magnitude, the approximate Wolfe conditions.

use super::step::LineSearchStep;
use super::strategy::{LineSearchStrategy, STPMIN, StrategyBase};
use crate::error::ConfigError;
use crate::function::Evaluator;
use crate::params;
use crate::state::SolverState;
use std::ops::ControlFlow::{self, Break, Continue};

type Step = LineSearchStep;

/// `Break(accepted)` ends the search, `Continue` keeps going.
type Flow = ControlFlow<bool>;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CgDescentParams {
    /// Approximate Armijo slack, relative to the running average of `|f|`.
    pub epsilon: f64,
    /// Bisection ratio of the interval update.
    pub theta: f64,
    /// Required shrink of the interval by one secant step before bisecting.
    pub gamma: f64,
    /// Decay of the running average of `|f|`.
    pub delta: f64,
    /// Switch to the approximate conditions once `|φ(t) - φ(0)| ≤ omega·sumC`.
    pub omega: f64,
    /// Expansion factor while bracketing.
    pub ro: f64,
}

impl Default for CgDescentParams {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            theta: 0.5,
            gamma: 0.66,
            delta: 0.7,
            omega: 1e-3,
            ro: 5.0,
        }
    }
}

impl CgDescentParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        params::open("lsearchk::cgdescent::epsilon", self.epsilon, 0.0, 1e6)?;
        params::open("lsearchk::cgdescent::theta", self.theta, 0.0, 1.0)?;
        params::open("lsearchk::cgdescent::gamma", self.gamma, 0.0, 1.0)?;
        params::closed("lsearchk::cgdescent::delta", self.delta, 0.0, 1.0)?;
        params::closed("lsearchk::cgdescent::omega", self.omega, 0.0, 1.0)?;
        params::open("lsearchk::cgdescent::ro", self.ro, 1.0, 1e6)?;
        Ok(())
    }
}

pub struct CgDescent {
    base: StrategyBase,
    params: CgDescentParams,
    sum_q: f64,
    sum_c: f64,
    epsilon_k: f64,
    approx: bool,
}

impl CgDescent {
    pub fn new(base: StrategyBase, params: CgDescentParams) -> Self {
        Self {
            base,
            params,
            sum_q: 0.0,
            sum_c: 0.0,
            epsilon_k: 0.0,
            approx: false,
        }
    }

    /// Whether the approximate Wolfe conditions are in use.
    pub fn approximate(&self) -> bool {
        self.approx
    }

    fn accept(&mut self, state0: &SolverState, state: &SolverState) -> Flow {
        let (c1, c2) = (self.base.c1, self.base.c2);
        let wolfe = state.has_armijo(state0, c1) && state.has_wolfe(state0, c2);
        let approx_wolfe = self.approx
            && state.has_approx_armijo(state0, self.epsilon_k)
            && state.has_approx_wolfe(state0, c1, c2);
        if !(wolfe || approx_wolfe) {
            return Continue(());
        }
        if !self.approx && (state.f() - state0.f()).abs() <= self.params.omega * self.sum_c {
            log::debug!("[Lsearch cgdescent] switching to approximate Wolfe conditions");
            self.approx = true;
        }
        Break(true)
    }

    fn evaluate(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        state: &mut SolverState,
        t: f64,
    ) -> Flow {
        if !self.base.move_to(evaluator, state0, state, t) {
            return Break(false);
        }
        self.accept(state0, state)
    }

    /// Shrinks `[a, b]` around the last trial.
    fn update(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        state: &mut SolverState,
        a: &mut Step,
        b: &mut Step,
    ) -> Flow {
        let c = Step::from(&*state);
        if c.t <= a.t || c.t >= b.t {
            return Continue(());
        }
        if c.g >= 0.0 {
            *b = c;
            return Continue(());
        }
        if state.has_approx_armijo(state0, self.epsilon_k) {
            *a = c;
            return Continue(());
        }
        *b = c;
        self.update_u(evaluator, state0, state, a, b)
    }

    /// Bisects `[a, b]` until `b` has a non-negative slope.
    fn update_u(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        state: &mut SolverState,
        a: &mut Step,
        b: &mut Step,
    ) -> Flow {
        for _ in 0..self.base.max_iterations {
            if b.t - a.t <= STPMIN {
                break;
            }
            let t = (1.0 - self.params.theta) * a.t + self.params.theta * b.t;
            self.evaluate(evaluator, state0, state, t)?;
            let d = Step::from(&*state);
            if d.g >= 0.0 {
                *b = d;
                return Continue(());
            }
            if state.has_approx_armijo(state0, self.epsilon_k) {
                *a = d;
            } else {
                *b = d;
            }
        }
        log::debug!("[Lsearch cgdescent] interval collapsed while bisecting");
        Break(false)
    }

    /// Expands the initial trial until `[a, b]` brackets a point satisfying the conditions.
    fn bracket(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        state: &mut SolverState,
        a: &mut Step,
        b: &mut Step,
    ) -> Flow {
        let origin = Step::origin(state0);
        let mut last_a = origin;
        for _ in 0..self.base.max_iterations {
            let c = Step::from(&*state);
            if c.g >= 0.0 {
                *a = last_a;
                *b = c;
                return Continue(());
            }
            if !state.has_approx_armijo(state0, self.epsilon_k) {
                *a = origin;
                *b = c;
                return self.update_u(evaluator, state0, state, a, b);
            }
            last_a = c;
            self.evaluate(evaluator, state0, state, self.params.ro * c.t)?;
        }
        log::debug!("[Lsearch cgdescent] bracketing failed");
        Break(false)
    }

    fn secant2(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        state: &mut SolverState,
        a: &mut Step,
        b: &mut Step,
    ) -> Flow {
        let (a0, b0) = (*a, *b);
        let tc = Step::secant(a0, b0);
        if !tc.is_finite() {
            return Continue(());
        }
        self.evaluate(evaluator, state0, state, tc)?;
        self.update(evaluator, state0, state, a, b)?;

        let t = if tc == b.t {
            Step::secant(b0, *b)
        } else if tc == a.t {
            Step::secant(a0, *a)
        } else {
            return Continue(());
        };
        if t.is_finite() {
            self.evaluate(evaluator, state0, state, t)?;
            self.update(evaluator, state0, state, a, b)?;
        }
        Continue(())
    }

    fn run(
        &mut self,
        evaluator: &mut Evaluator<'_>,
        state0: &SolverState,
        state: &mut SolverState,
    ) -> Flow {
        self.accept(state0, state)?;

        let mut a = Step::origin(state0);
        let mut b = a;
        self.bracket(evaluator, state0, state, &mut a, &mut b)?;

        for _ in 0..self.base.max_iterations {
            let width = b.t - a.t;
            if width <= STPMIN {
                log::debug!("[Lsearch cgdescent] interval collapsed");
                break;
            }
            self.secant2(evaluator, state0, state, &mut a, &mut b)?;
            if b.t - a.t > self.params.gamma * width {
                self.evaluate(evaluator, state0, state, 0.5 * (a.t + b.t))?;
                self.update(evaluator, state0, state, &mut a, &mut b)?;
            }
        }
        Break(false)
    }
}

impl LineSearchStrategy for CgDescent {
    fn id(&self) -> &'static str {
        "cgdescent"
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
        self.sum_q = 1.0 + self.sum_q * self.params.delta;
        self.sum_c += (state0.f().abs() - self.sum_c) / self.sum_q;
        self.epsilon_k = self.params.epsilon * self.sum_c;

        match self.run(evaluator, state0, state) {
            Break(accepted) => accepted,
            Continue(()) => false,
        }
    }
}
