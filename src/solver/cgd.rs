//! Nonlinear conjugate gradient directions `d = -g + β·d_prev`.
//!
//! See Hager & Zhang, "A survey of nonlinear conjugate gradient methods", 2006, for the
//! update formulas.

use super::DescentStrategy;
use crate::error::ConfigError;
use crate::params;
use crate::state::SolverState;
use ndarray::Array1;

/// The `β` update formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CgdVariant {
    /// Hestenes–Stiefel, clipped at zero.
    HS,
    /// Fletcher–Reeves.
    FR,
    /// Polak–Ribière, clipped at zero.
    #[default]
    PR,
    /// Fletcher's conjugate descent.
    CD,
    /// Liu–Storey, clipped at zero.
    LS,
    /// Dai–Yuan.
    DY,
    /// Hager–Zhang CG_DESCENT, truncated below by `eta`.
    N,
    /// Dai–Yuan / conjugate descent hybrid.
    DYCD,
    /// Dai–Yuan / Hestenes–Stiefel hybrid.
    DYHS,
    /// Fletcher–Reeves / Polak–Ribière hybrid.
    FRPR,
}

impl CgdVariant {
    pub fn id(&self) -> &'static str {
        match self {
            CgdVariant::HS => "cgd-hs",
            CgdVariant::FR => "cgd-fr",
            CgdVariant::PR => "cgd-pr",
            CgdVariant::CD => "cgd-cd",
            CgdVariant::LS => "cgd-ls",
            CgdVariant::DY => "cgd-dy",
            CgdVariant::N => "cgd-n",
            CgdVariant::DYCD => "cgd-dycd",
            CgdVariant::DYHS => "cgd-dyhs",
            CgdVariant::FRPR => "cgd-frpr",
        }
    }

    /// `β` from the previous state (`g_prev`, `d_prev`) and the current gradient.
    pub fn beta(&self, prev: &SolverState, curr: &SolverState, eta: f64) -> f64 {
        let g = curr.g();
        let gp = prev.g();
        let dp = prev.d();
        let y = g - gp;

        let gg = g.dot(g);
        let gpgp = gp.dot(gp);
        let dpy = dp.dot(&y);
        let dpgp = dp.dot(gp);
        let gy = g.dot(&y);

        let hs = gy / dpy;
        let fr = gg / gpgp;
        let pr = gy / gpgp;
        let cd = -gg / dpgp;
        let ls = -gy / dpgp;
        let dy = gg / dpy;

        match self {
            CgdVariant::HS => hs.max(0.0),
            CgdVariant::FR => fr,
            CgdVariant::PR => pr.max(0.0),
            CgdVariant::CD => cd,
            CgdVariant::LS => ls.max(0.0),
            CgdVariant::DY => dy,
            CgdVariant::N => {
                let div = 1.0 / dpy;
                let eta_k = -1.0 / (dp.dot(dp).sqrt() * eta.min(gpgp.sqrt()));
                let beta = div * (&y - &(dp * (2.0 * y.dot(&y) * div))).dot(g);
                eta_k.max(beta)
            }
            CgdVariant::DYCD => gg / dpy.max(-dpgp),
            CgdVariant::DYHS => dy.min(hs).max(0.0),
            CgdVariant::FRPR => {
                if pr < -fr {
                    -fr
                } else if pr.abs() <= fr {
                    pr
                } else {
                    fr
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CgdParams {
    pub variant: CgdVariant,
    /// Restart when `|g·g_prev| ≥ orthotest·g·g`.
    pub orthotest: f64,
    /// Lower truncation of the `N` variant.
    pub eta: f64,
}

impl Default for CgdParams {
    fn default() -> Self {
        Self {
            variant: CgdVariant::PR,
            orthotest: 0.1,
            eta: 0.01,
        }
    }
}

impl CgdParams {
    pub fn new(variant: CgdVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        params::open("cgd::orthotest", self.orthotest, 0.0, 1.0)?;
        params::open("cgd::eta", self.eta, 0.0, f64::INFINITY)?;
        Ok(())
    }
}

pub struct ConjugateGradient {
    params: CgdParams,
}

impl ConjugateGradient {
    pub fn new(params: CgdParams) -> Self {
        Self { params }
    }
}

impl DescentStrategy for ConjugateGradient {
    fn direction(&mut self, state: &SolverState, prev: Option<&SolverState>) -> Array1<f64> {
        let steepest = -state.g();
        let Some(prev) = prev else {
            return steepest;
        };

        let g = state.g();
        if g.dot(prev.g()).abs() >= self.params.orthotest * g.dot(g) {
            log::debug!(
                "[Solver {}] consecutive gradients far from orthogonal; restarting",
                self.params.variant.id()
            );
            return steepest;
        }

        let beta = self.params.variant.beta(prev, state, self.params.eta);
        let mut d = steepest.clone();
        d.scaled_add(beta, prev.d());
        if !(d.dot(g) < 0.0) {
            log::debug!(
                "[Solver {}] beta={:.3e} gives no descent; restarting",
                self.params.variant.id(),
                beta
            );
            return steepest;
        }
        d
    }

    fn update_model(&mut self, _prev: &SolverState, _curr: &SolverState) {}

    fn reset(&mut self) {}
}
