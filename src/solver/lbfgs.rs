//! Limited-memory BFGS: `d = -H·g` computed by the two-loop recursion over the most recent
//! `history` curvature pairs.

use super::DescentStrategy;
use crate::error::ConfigError;
use crate::params;
use crate::state::SolverState;
use ndarray::Array1;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LbfgsParams {
    /// Number of `(Δx, Δg)` pairs kept.
    pub history: usize,
    /// Scale the initial matrix by `(s·y)/(y·y)` of the newest pair.
    pub scaled: bool,
}

impl Default for LbfgsParams {
    fn default() -> Self {
        Self {
            history: 20,
            scaled: true,
        }
    }
}

impl LbfgsParams {
    pub fn with_history(history: usize) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        params::count("lbfgs::history", self.history, 1, 1000)?;
        Ok(())
    }
}

struct Pair {
    s: Array1<f64>,
    y: Array1<f64>,
    rho: f64,
}

pub struct Lbfgs {
    params: LbfgsParams,
    pairs: VecDeque<Pair>,
}

impl Lbfgs {
    pub fn new(params: LbfgsParams) -> Self {
        Self {
            params,
            pairs: VecDeque::with_capacity(params.history),
        }
    }

    pub fn history_len(&self) -> usize {
        self.pairs.len()
    }

    fn two_loop(&self, g: &Array1<f64>) -> Array1<f64> {
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(self.pairs.len());
        for pair in self.pairs.iter().rev() {
            let alpha = pair.rho * pair.s.dot(&q);
            q.scaled_add(-alpha, &pair.y);
            alphas.push(alpha);
        }

        let gamma = match self.pairs.back() {
            Some(newest) if self.params.scaled => newest.s.dot(&newest.y) / newest.y.dot(&newest.y),
            _ => 1.0,
        };
        let mut r = q * gamma;

        for (pair, alpha) in self.pairs.iter().zip(alphas.into_iter().rev()) {
            let beta = pair.rho * pair.y.dot(&r);
            r.scaled_add(alpha - beta, &pair.s);
        }
        -r
    }
}

impl DescentStrategy for Lbfgs {
    fn direction(&mut self, state: &SolverState, _prev: Option<&SolverState>) -> Array1<f64> {
        self.two_loop(state.g())
    }

    fn update_model(&mut self, prev: &SolverState, curr: &SolverState) {
        let s = curr.x() - prev.x();
        let y = curr.g() - prev.g();
        let sy = s.dot(&y);
        let bound = f64::EPSILON * s.dot(&s).sqrt() * y.dot(&y).sqrt();
        if !(sy > bound) {
            log::debug!("[Solver lbfgs] skipping pair with s·y={sy:.3e}");
            return;
        }

        self.pairs.push_back(Pair { s, y, rho: 1.0 / sy });
        while self.pairs.len() > self.params.history {
            self.pairs.pop_front();
        }
    }

    fn reset(&mut self) {
        self.pairs.clear();
    }
}
