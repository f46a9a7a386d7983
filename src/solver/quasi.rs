//! Quasi-Newton directions `d = -H·g` from a dense inverse-Hessian approximation `H`.

use super::DescentStrategy;
use crate::error::ConfigError;
use crate::params;
use crate::state::SolverState;
use ndarray::{Array1, Array2};

/// Secant update applied to `H` after each accepted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum QuasiUpdate {
    /// Symmetric rank one.
    Sr1,
    /// Davidon–Fletcher–Powell.
    Dfp,
    #[default]
    Bfgs,
    /// Convex combination of DFP and BFGS.
    Hoshino,
    /// Fletcher's switch between DFP, SR1 and BFGS.
    Fletcher,
}

impl QuasiUpdate {
    pub fn id(&self) -> &'static str {
        match self {
            QuasiUpdate::Sr1 => "sr1",
            QuasiUpdate::Dfp => "dfp",
            QuasiUpdate::Bfgs => "bfgs",
            QuasiUpdate::Hoshino => "hoshino",
            QuasiUpdate::Fletcher => "fletcher",
        }
    }
}

/// How `H` starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum QuasiInit {
    Identity,
    /// `I·(Δx·Δg)/(Δg·Δg)`, set right before the first update.
    #[default]
    Scaled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QuasiParams {
    pub update: QuasiUpdate,
    pub init: QuasiInit,
    /// SR1 skips the update when `|(Δx - HΔg)·Δg| < r·‖Δx‖·‖Δx - HΔg‖`.
    pub r: f64,
}

impl Default for QuasiParams {
    fn default() -> Self {
        Self {
            update: QuasiUpdate::Bfgs,
            init: QuasiInit::Scaled,
            r: 1e-8,
        }
    }
}

impl QuasiParams {
    pub fn new(update: QuasiUpdate) -> Self {
        Self {
            update,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        params::open("quasi::r", self.r, 0.0, 1.0)?;
        Ok(())
    }
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

/// Products reused by the rank-2 updates.
struct Secant<'a> {
    dx: &'a Array1<f64>,
    dg: &'a Array1<f64>,
    hdg: Array1<f64>,
    /// `Δx·Δg`
    sy: f64,
    /// `Δgᵀ·H·Δg`
    yhy: f64,
}

impl<'a> Secant<'a> {
    fn new(h: &Array2<f64>, dx: &'a Array1<f64>, dg: &'a Array1<f64>) -> Self {
        let hdg = h.dot(dg);
        let yhy = dg.dot(&hdg);
        Self {
            dx,
            dg,
            hdg,
            sy: dx.dot(dg),
            yhy,
        }
    }

    fn dfp(&self, h: &Array2<f64>) -> Array2<f64> {
        h + &(outer(self.dx, self.dx) / self.sy) - &(outer(&self.hdg, &self.hdg) / self.yhy)
    }

    /// `(I - ρ·Δx·Δgᵀ)·H·(I - ρ·Δg·Δxᵀ) + ρ·Δx·Δxᵀ`, expanded for symmetric `H`.
    fn bfgs(&self, h: &Array2<f64>) -> Array2<f64> {
        let rho = 1.0 / self.sy;
        let cross = outer(self.dx, &self.hdg) + outer(&self.hdg, self.dx);
        h - &(cross * rho) + &(outer(self.dx, self.dx) * (rho * rho * self.yhy + rho))
    }

    /// `None` when the denominator is too small for a stable update.
    fn sr1(&self, h: &Array2<f64>, r: f64) -> Option<Array2<f64>> {
        let v = self.dx - &self.hdg;
        let denom = v.dot(self.dg);
        let vnorm = v.dot(&v).sqrt();
        if denom == 0.0 || denom.abs() < r * self.dx.dot(self.dx).sqrt() * vnorm {
            return None;
        }
        Some(h + &(outer(&v, &v) / denom))
    }
}

/// Why an update left `H` alone or replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Applied,
    Skipped,
    Reverted,
}

/// The dense inverse-Hessian approximation and the rule that updates it.
#[derive(Debug, Clone)]
pub struct QuasiNewtonModel {
    h: Array2<f64>,
    rule: QuasiUpdate,
    r: f64,
}

impl QuasiNewtonModel {
    pub fn new(n: usize, rule: QuasiUpdate, r: f64) -> Self {
        Self {
            h: Array2::eye(n),
            rule,
            r,
        }
    }

    pub fn inverse_hessian(&self) -> &Array2<f64> {
        &self.h
    }

    pub fn reset(&mut self) {
        self.h = Array2::eye(self.h.nrows());
    }

    pub fn scale(&mut self, factor: f64) {
        self.h = Array2::eye(self.h.nrows()) * factor;
    }

    pub fn direction(&self, g: &Array1<f64>) -> Array1<f64> {
        -self.h.dot(g)
    }

    /// Applies the secant update for the step `dx` with gradient change `dg`.
    pub fn update(&mut self, dx: &Array1<f64>, dg: &Array1<f64>) -> UpdateStatus {
        let secant = Secant::new(&self.h, dx, dg);
        let curvature = secant.sy > 0.0 && secant.yhy > 0.0;

        let next = match self.rule {
            QuasiUpdate::Sr1 => secant.sr1(&self.h, self.r),
            QuasiUpdate::Dfp if curvature => Some(secant.dfp(&self.h)),
            QuasiUpdate::Bfgs if curvature => Some(secant.bfgs(&self.h)),
            QuasiUpdate::Hoshino if curvature => {
                let phi = secant.sy / (secant.sy + secant.yhy);
                Some(secant.dfp(&self.h) * (1.0 - phi) + &(secant.bfgs(&self.h) * phi))
            }
            QuasiUpdate::Fletcher if curvature => {
                let phi = secant.sy / (secant.sy - secant.yhy);
                if phi < 0.0 {
                    Some(secant.dfp(&self.h))
                } else if phi > 1.0 {
                    Some(secant.bfgs(&self.h))
                } else {
                    secant.sr1(&self.h, self.r).or_else(|| Some(secant.bfgs(&self.h)))
                }
            }
            _ => None,
        };

        match next {
            None => UpdateStatus::Skipped,
            Some(h) if h.iter().all(|v| v.is_finite()) => {
                self.h = h;
                UpdateStatus::Applied
            }
            Some(_) => {
                self.reset();
                UpdateStatus::Reverted
            }
        }
    }
}

/// Quasi-Newton descent strategy owning one [`QuasiNewtonModel`] per run.
pub struct QuasiNewton {
    model: QuasiNewtonModel,
    init: QuasiInit,
    updates: usize,
}

impl QuasiNewton {
    pub fn new(n: usize, params: QuasiParams) -> Self {
        Self {
            model: QuasiNewtonModel::new(n, params.update, params.r),
            init: params.init,
            updates: 0,
        }
    }

    pub fn model(&self) -> &QuasiNewtonModel {
        &self.model
    }
}

impl DescentStrategy for QuasiNewton {
    fn direction(&mut self, state: &SolverState, _prev: Option<&SolverState>) -> Array1<f64> {
        self.model.direction(state.g())
    }

    fn update_model(&mut self, prev: &SolverState, curr: &SolverState) {
        let dx = curr.x() - prev.x();
        let dg = curr.g() - prev.g();
        if self.updates == 0 && self.init == QuasiInit::Scaled {
            let scale = dx.dot(&dg) / dg.dot(&dg);
            if scale.is_finite() && scale > 0.0 {
                self.model.scale(scale);
            }
        }
        let status = self.model.update(&dx, &dg);
        if status == UpdateStatus::Applied {
            self.updates += 1;
        }
        log::debug!("[Quasi {}] inverse update {:?}", self.model.rule.id(), status);
    }

    fn reset(&mut self) {
        self.model.reset();
        self.updates = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const RULES: [QuasiUpdate; 5] = [
        QuasiUpdate::Sr1,
        QuasiUpdate::Dfp,
        QuasiUpdate::Bfgs,
        QuasiUpdate::Hoshino,
        QuasiUpdate::Fletcher,
    ];

    fn assert_secant(h: &Array2<f64>, dx: &Array1<f64>, dg: &Array1<f64>) {
        let hdg = h.dot(dg);
        for i in 0..dx.len() {
            assert!((hdg[i] - dx[i]).abs() < 1e-10, "H·Δg = {hdg}, Δx = {dx}");
        }
    }

    #[test]
    fn test_every_rule_satisfies_the_secant_equation() {
        // Δg = A·Δx for A = diag(2, 5, 1).
        let dx = array![0.5, -0.2, 1.0];
        let dg = array![1.0, -1.0, 1.0];
        for rule in RULES {
            let mut model = QuasiNewtonModel::new(3, rule, 1e-8);
            assert_eq!(model.update(&dx, &dg), UpdateStatus::Applied, "{rule:?}");
            assert_secant(model.inverse_hessian(), &dx, &dg);
        }
    }

    #[test]
    fn test_updates_keep_h_symmetric() {
        let mut model = QuasiNewtonModel::new(2, QuasiUpdate::Bfgs, 1e-8);
        model.update(&array![1.0, 0.5], &array![2.0, 0.3]);
        model.update(&array![-0.2, 0.4], &array![-0.1, 1.5]);
        let h = model.inverse_hessian();
        assert!((h[[0, 1]] - h[[1, 0]]).abs() < 1e-12);
    }

    #[test]
    fn test_rank_two_updates_skip_negative_curvature() {
        for rule in [QuasiUpdate::Dfp, QuasiUpdate::Bfgs, QuasiUpdate::Hoshino] {
            let mut model = QuasiNewtonModel::new(2, rule, 1e-8);
            let status = model.update(&array![1.0, 0.0], &array![-1.0, 0.0]);
            assert_eq!(status, UpdateStatus::Skipped);
            assert_eq!(model.inverse_hessian(), &Array2::eye(2));
        }
    }

    #[test]
    fn test_sr1_guard_skips_tiny_denominators() {
        let mut model = QuasiNewtonModel::new(2, QuasiUpdate::Sr1, 1e-8);
        // H = I already satisfies the secant equation: Δx - HΔg = 0.
        let status = model.update(&array![1.0, 2.0], &array![1.0, 2.0]);
        assert_eq!(status, UpdateStatus::Skipped);

        // (Δx - HΔg)·Δg = 0 while Δx - HΔg ≠ 0.
        let status = model.update(&array![1.0, 1.0], &array![1.0, 0.0]);
        assert_eq!(status, UpdateStatus::Skipped);
    }

    #[test]
    fn test_non_finite_update_reverts_to_identity() {
        let mut model = QuasiNewtonModel::new(2, QuasiUpdate::Bfgs, 1e-8);
        let status = model.update(&array![1e200, 1e200], &array![1e200, 1e200]);
        assert_eq!(status, UpdateStatus::Reverted);
        assert_eq!(model.inverse_hessian(), &Array2::eye(2));
    }

    #[test]
    fn test_direction_is_minus_h_g() {
        let mut model = QuasiNewtonModel::new(2, QuasiUpdate::Bfgs, 1e-8);
        model.scale(0.5);
        assert_eq!(model.direction(&array![2.0, -4.0]), array![-1.0, 2.0]);
        model.reset();
        assert_eq!(model.direction(&array![2.0, -4.0]), array![-2.0, 4.0]);
    }

    #[test]
    fn test_r_range() {
        assert!(QuasiParams { r: 0.0, ..QuasiParams::default() }.validate().is_err());
        assert!(QuasiParams::new(QuasiUpdate::Sr1).validate().is_ok());
    }
}
