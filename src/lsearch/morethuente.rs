//! Moré & Thuente, "Line search algorithms with guaranteed sufficient decrease", 1994.
//!
//! Strong Wolfe search with the safeguarded `dcstep` interval update of MINPACK-2.

use super::step::LineSearchStep;
use super::strategy::{LineSearchStrategy, STPMAX, STPMIN, StrategyBase};
use crate::error::ConfigError;
use crate::function::Evaluator;
use crate::params;
use crate::state::SolverState;

type Step = LineSearchStep;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MoreThuenteParams {
    /// Required relative shrink of the bracket per two trials before bisecting.
    pub delta: f64,
}

impl Default for MoreThuenteParams {
    fn default() -> Self {
        Self { delta: 0.66 }
    }
}

impl MoreThuenteParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        params::open("lsearchk::morethuente::delta", self.delta, 0.0, 1.0)?;
        Ok(())
    }
}

pub struct MoreThuente {
    base: StrategyBase,
    params: MoreThuenteParams,
}

impl MoreThuente {
    pub fn new(base: StrategyBase, params: MoreThuenteParams) -> Self {
        Self { base, params }
    }
}

/// Safeguarded step update. `x` is the best step so far, `y` the other bracket end,
/// `p` the current trial. Updates the bracket and returns the next trial step.
fn dcstep(
    x: &mut Step,
    y: &mut Step,
    p: Step,
    brackt: &mut bool,
    stmin: f64,
    stmax: f64,
    delta: f64,
) -> f64 {
    let sgnd = p.g * (x.g / x.g.abs());

    let stpf = if p.f > x.f {
        // Higher function value: the minimum is bracketed.
        let stpc = Step::cubic(*x, p);
        let (stpq, _) = Step::quadratic(*x, p);
        *brackt = true;
        if (stpc - x.t).abs() < (stpq - x.t).abs() {
            stpc
        } else {
            stpc + (stpq - stpc) / 2.0
        }
    } else if sgnd < 0.0 {
        // Derivatives of opposite sign: the minimum is bracketed.
        let stpc = Step::cubic(*x, p);
        let stpq = Step::secant(*x, p);
        *brackt = true;
        if (stpc - p.t).abs() > (stpq - p.t).abs() {
            stpc
        } else {
            stpq
        }
    } else if p.g.abs() < x.g.abs() {
        // Same sign, decreasing magnitude.
        let mut stpc = Step::cubic(*x, p);
        let stpq = Step::secant(*x, p);
        if !(stpc.is_finite() && (p.t - x.t) * (stpc - p.t) > 0.0) {
            stpc = if p.t > x.t { stmax } else { stmin };
        }
        if *brackt {
            let stpf = if (stpc - p.t).abs() < (stpq - p.t).abs() {
                stpc
            } else {
                stpq
            };
            let limit = p.t + delta * (y.t - p.t);
            if p.t > x.t { stpf.min(limit) } else { stpf.max(limit) }
        } else {
            let stpf = if (stpc - p.t).abs() > (stpq - p.t).abs() {
                stpc
            } else {
                stpq
            };
            stpf.min(stmax).max(stmin)
        }
    } else if *brackt {
        // Same sign, non-decreasing magnitude.
        Step::cubic(p, *y)
    } else if p.t > x.t {
        stmax
    } else {
        stmin
    };

    if p.f > x.f {
        *y = p;
    } else {
        if sgnd < 0.0 {
            *y = *x;
        }
        *x = p;
    }
    stpf
}

impl LineSearchStrategy for MoreThuente {
    fn id(&self) -> &'static str {
        "morethuente"
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
        let (ftol, gtol, xtol) = (self.base.c1, self.base.c2, f64::EPSILON);
        let delta = self.params.delta;

        let finit = state0.f();
        let ginit = state0.dg();
        let gtest = ftol * ginit;

        let mut stage1 = true;
        let mut brackt = false;
        let mut width = STPMAX - STPMIN;
        let mut width1 = 2.0 * width;

        let mut stp = state.t();
        let mut f = state.f();
        let mut g = state.dg();
        let mut stmin = 0.0;
        let mut stmax = stp + 4.0 * stp;

        let mut x = Step::new(0.0, finit, ginit);
        let mut y = Step::new(0.0, finit, ginit);

        // The trial cannot move any more: keep it only if it decreased the function, even
        // without strong Wolfe.
        let progress = |state: &SolverState| state.t() > 0.0 && state.f() < finit;

        for _ in 0..self.base.max_iterations {
            let ftest = finit + stp * gtest;
            if stage1 && f <= ftest && g >= 0.0 {
                stage1 = false;
            }

            if f <= ftest && g.abs() <= gtol * (-ginit) {
                return true;
            }
            if brackt && (stp <= stmin || stp >= stmax) {
                log::debug!("[Lsearch morethuente] rounding errors prevent progress");
                return progress(state);
            }
            if brackt && stmax - stmin <= xtol * stmax {
                log::debug!("[Lsearch morethuente] bracket below xtol");
                return progress(state);
            }
            if stp >= STPMAX && f <= ftest && g <= gtest {
                log::debug!("[Lsearch morethuente] step at STPMAX");
                return true;
            }
            if stp <= STPMIN && (f > ftest || g >= gtest) {
                log::debug!("[Lsearch morethuente] step at STPMIN");
                return progress(state);
            }

            let p = Step::new(stp, f, g);
            if stage1 && f <= x.f && f > ftest {
                // Modified function ψ(t) = φ(t) - t·gtest until a point with ψ ≤ 0 and φ' ≥ 0.
                let modify = |s: Step| Step::new(s.t, s.f - s.t * gtest, s.g - gtest);
                let restore = |s: Step| Step::new(s.t, s.f + s.t * gtest, s.g + gtest);
                let (mut xm, mut ym) = (modify(x), modify(y));
                stp = dcstep(&mut xm, &mut ym, modify(p), &mut brackt, stmin, stmax, delta);
                x = restore(xm);
                y = restore(ym);
            } else {
                stp = dcstep(&mut x, &mut y, p, &mut brackt, stmin, stmax, delta);
            }

            if brackt {
                if (y.t - x.t).abs() >= 0.66 * width1 {
                    stp = x.t + 0.5 * (y.t - x.t);
                }
                width1 = width;
                width = (y.t - x.t).abs();
                stmin = x.t.min(y.t);
                stmax = x.t.max(y.t);
            } else {
                stmin = stp + 1.1 * (stp - x.t);
                stmax = stp + 4.0 * (stp - x.t);
            }

            stp = stp.max(STPMIN).min(STPMAX);
            if brackt && (stp <= stmin || stp >= stmax || stmax - stmin <= xtol * stmax) {
                stp = x.t;
            }

            if !self.base.move_to(evaluator, state0, state, stp) {
                return false;
            }
            f = state.f();
            g = state.dg();
        }

        log::debug!(
            "[Lsearch morethuente] no acceptable step after {} trials",
            self.base.max_iterations
        );
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
            |c1, c2| MoreThuente::new(StrategyBase::new(c1, c2, 100), MoreThuenteParams::default()),
            |state0, state, c1, c2| {
                assert_armijo(state0, state, c1);
                assert_strong_wolfe(state0, state, c2);
            },
        );
    }

    #[test]
    fn test_dcstep_brackets_on_increase() {
        // φ(t) = (t - 1)², trial at t = 3 overshoots.
        let mut x = Step::new(0.0, 1.0, -2.0);
        let mut y = x;
        let p = Step::new(3.0, 4.0, 4.0);
        let mut brackt = false;
        let t = dcstep(&mut x, &mut y, p, &mut brackt, 0.0, 15.0, 0.66);
        assert!(brackt);
        assert_eq!(y, p);
        assert_eq!(x.t, 0.0);
        assert!((t - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dcstep_extrapolates_while_slope_stays_negative() {
        // φ(t) = (t - 10)², trial at t = 1 still descends steeply.
        let mut x = Step::new(0.0, 100.0, -20.0);
        let mut y = x;
        let p = Step::new(1.0, 81.0, -18.0);
        let mut brackt = false;
        let t = dcstep(&mut x, &mut y, p, &mut brackt, 1.1, 5.0, 0.66);
        assert!(!brackt);
        assert_eq!(x, p);
        assert!((1.1..=5.0).contains(&t));
    }

    #[test]
    fn test_stalled_search_settles_for_a_decrease() {
        use crate::function::Objective;
        use ndarray::{Array1, array};

        // |x| has slope ±1 everywhere along d, so strong Wolfe is out of reach and the
        // bracket collapses onto the kink.
        let mut function =
            Objective::new(1, |x: &Array1<f64>| (x[0].abs(), array![x[0].signum()]));
        let mut evaluator = Evaluator::new(&mut function);
        let mut state = SolverState::new(&mut evaluator, array![1.0 / 3.0]);
        state.d = -&state.g;
        let state0 = state.clone();

        let base = StrategyBase::new(1e-4, 0.9, 200);
        let mut strategy = MoreThuente::new(base, MoreThuenteParams::default());
        assert!(strategy.get(&mut evaluator, &mut state, 1.0));
        assert!(state.t() > 0.0);
        assert!(state.f() < state0.f());
        assert!(!state.has_strong_wolfe(&state0, 0.9));
    }

    #[test]
    fn test_bad_delta_is_rejected() {
        assert!(MoreThuenteParams { delta: 1.0 }.validate().is_err());
        assert!(MoreThuenteParams::default().validate().is_ok());
    }
}
