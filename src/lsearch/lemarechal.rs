//! Lemaréchal, "A view of line-searches", 1981: regular Wolfe conditions with safeguarded
//! extrapolation and interpolation.

use super::step::{Interpolation, LineSearchStep, clamp_step};
use super::strategy::{LineSearchStrategy, STPMAX, STPMIN, StrategyBase};
use crate::error::ConfigError;
use crate::function::Evaluator;
use crate::params;
use crate::state::SolverState;

type Step = LineSearchStep;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LemarechalParams {
    /// Maximum extrapolation factor.
    pub tau1: f64,
    /// Relative distance kept from both ends of the bracket.
    pub safeguard: f64,
    pub interpolation: Interpolation,
}

impl Default for LemarechalParams {
    fn default() -> Self {
        Self {
            tau1: 9.0,
            safeguard: 0.1,
            interpolation: Interpolation::Cubic,
        }
    }
}

impl LemarechalParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        params::open("lsearchk::lemarechal::tau1", self.tau1, 2.0, 1e6)?;
        params::open("lsearchk::lemarechal::safeguard", self.safeguard, 0.0, 0.5)?;
        Ok(())
    }
}

pub struct Lemarechal {
    base: StrategyBase,
    params: LemarechalParams,
}

impl Lemarechal {
    pub fn new(base: StrategyBase, params: LemarechalParams) -> Self {
        Self { base, params }
    }
}

impl LineSearchStrategy for Lemarechal {
    fn id(&self) -> &'static str {
        "lemarechal"
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
        let interpolation = self.params.interpolation;

        // L: largest step known to satisfy Armijo, R: smallest step known to violate it.
        let mut prev_l = Step::origin(state0);
        let mut l = prev_l;
        let mut r: Option<Step> = None;

        for _ in 0..self.base.max_iterations {
            let c = Step::from(&*state);
            if !state.has_armijo(state0, c1) {
                r = Some(c);
            } else if state.has_wolfe(state0, c2) {
                return true;
            } else {
                prev_l = l;
                l = c;
            }

            let t = match r {
                None => {
                    if l.t >= STPMAX {
                        break;
                    }
                    let tmin = 2.0 * l.t;
                    let tmax = (self.params.tau1 * l.t).min(STPMAX);
                    clamp_step(Step::interpolate(prev_l, l, interpolation), tmin.min(tmax), tmax)
                }
                Some(r) => {
                    let width = r.t - l.t;
                    if width <= STPMIN.max(f64::EPSILON * r.t) {
                        break;
                    }
                    let tmin = l.t + self.params.safeguard * width;
                    let tmax = r.t - self.params.safeguard * width;
                    clamp_step(Step::interpolate_inside(l, r, interpolation), tmin, tmax)
                }
            };
            if !self.base.move_to(evaluator, state0, state, t) {
                return false;
            }
        }
        log::debug!("[Lsearch lemarechal] no acceptable step found");
        false
    }
}
