//! One-dimensional trial points and the interpolation formulas used to pick the next one.

use crate::state::SolverState;

/// Highest-order model [`LineSearchStep::interpolate`] tries first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Interpolation {
    Bisection,
    Quadratic,
    #[default]
    Cubic,
}

/// `(t, φ(t), φ'(t))` of the restriction `φ(t) = f(x + t·d)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchStep {
    pub t: f64,
    pub f: f64,
    /// Directional derivative at `t`.
    pub g: f64,
}

impl LineSearchStep {
    pub fn new(t: f64, f: f64, g: f64) -> Self {
        Self { t, f, g }
    }

    /// The `t = 0` end of the restriction starting at `state0`.
    pub fn origin(state0: &SolverState) -> Self {
        Self::new(0.0, state0.f(), state0.dg())
    }

    /// Stationary point of the cubic matching value and slope at both ends.
    /// Non-finite when `u.t == v.t` or the discriminant is negative.
    pub fn cubic(u: Self, v: Self) -> f64 {
        let d1 = u.g + v.g - 3.0 * (u.f - v.f) / (u.t - v.t);
        let sign = if v.t > u.t { 1.0 } else { -1.0 };
        let d2 = sign * (d1 * d1 - u.g * v.g).sqrt();
        v.t - (v.t - u.t) * (v.g + d2 - d1) / (v.g - u.g + 2.0 * d2)
    }

    /// Minimizer of the quadratic matching `u`'s value and slope and `v`'s value,
    /// together with whether that quadratic is convex.
    pub fn quadratic(u: Self, v: Self) -> (f64, bool) {
        let dt = u.t - v.t;
        if dt == 0.0 {
            return (f64::NAN, false);
        }
        let df = u.f - v.f;
        let convex = (u.g - df / dt) * dt > 0.0;
        (u.t - u.g * dt * dt / (2.0 * (u.g * dt - df)), convex)
    }

    /// Zero of the linear interpolant of the two slopes.
    pub fn secant(u: Self, v: Self) -> f64 {
        (v.t * u.g - u.t * v.g) / (u.g - v.g)
    }

    pub fn bisection(u: Self, v: Self) -> f64 {
        0.5 * (u.t + v.t)
    }

    /// Tries the preferred model, then lower orders, until the candidate is finite.
    pub fn interpolate(u: Self, v: Self, method: Interpolation) -> f64 {
        let accept = |t: f64| t.is_finite();
        Self::interpolate_with(u, v, method, accept)
    }

    /// Like [`interpolate`](Self::interpolate), but a candidate must also lie strictly
    /// inside `(min(u.t, v.t), max(u.t, v.t))`.
    pub fn interpolate_inside(u: Self, v: Self, method: Interpolation) -> f64 {
        let (lo, hi) = (u.t.min(v.t), u.t.max(v.t));
        let accept = |t: f64| t.is_finite() && lo < t && t < hi;
        Self::interpolate_with(u, v, method, accept)
    }

    fn interpolate_with(u: Self, v: Self, method: Interpolation, accept: impl Fn(f64) -> bool) -> f64 {
        if method == Interpolation::Cubic {
            let t = Self::cubic(u, v);
            if accept(t) {
                return t;
            }
        }
        if method != Interpolation::Bisection {
            let (t, _) = Self::quadratic(u, v);
            if accept(t) {
                return t;
            }
        }
        Self::bisection(u, v)
    }
}

impl From<&SolverState> for LineSearchStep {
    fn from(state: &SolverState) -> Self {
        Self::new(state.t(), state.f(), state.dg())
    }
}

/// `t` limited to `[lo, hi]`; NaN maps to the midpoint.
pub(crate) fn clamp_step(t: f64, lo: f64, hi: f64) -> f64 {
    if t.is_nan() {
        0.5 * (lo + hi)
    } else {
        t.max(lo).min(hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    // φ(t) = t³/3 - t has its local minimum at t = 1.
    fn cubic_phi(t: f64) -> LineSearchStep {
        LineSearchStep::new(t, t.powi(3) / 3.0 - t, t * t - 1.0)
    }

    // φ(t) = (t - 3)².
    fn parabola(t: f64) -> LineSearchStep {
        LineSearchStep::new(t, (t - 3.0).powi(2), 2.0 * (t - 3.0))
    }

    #[test]
    fn test_cubic_recovers_exact_minimizer() {
        let t = LineSearchStep::cubic(cubic_phi(0.0), cubic_phi(2.0));
        assert_that!(&t).is_close_to(1.0, 1e-12);
        // Order of the two points does not matter.
        let t = LineSearchStep::cubic(cubic_phi(2.0), cubic_phi(0.0));
        assert_that!(&t).is_close_to(1.0, 1e-12);
    }

    #[test]
    fn test_cubic_reproduces_parabola_minimizer() {
        let t = LineSearchStep::cubic(parabola(0.0), parabola(1.0));
        assert_that!(&t).is_close_to(3.0, 1e-12);
    }

    #[test]
    fn test_quadratic_recovers_minimizer_and_convexity() {
        let (t, convex) = LineSearchStep::quadratic(parabola(0.0), parabola(1.0));
        assert_that!(&t).is_close_to(3.0, 1e-12);
        assert!(convex);

        // -(t - 3)² is concave.
        let u = LineSearchStep::new(0.0, -9.0, 6.0);
        let v = LineSearchStep::new(1.0, -4.0, 4.0);
        let (_, convex) = LineSearchStep::quadratic(u, v);
        assert!(!convex);
    }

    #[test]
    fn test_secant_and_bisection() {
        let t = LineSearchStep::secant(parabola(0.0), parabola(1.0));
        assert_that!(&t).is_close_to(3.0, 1e-12);
        assert_eq!(LineSearchStep::bisection(parabola(1.0), parabola(4.0)), 2.5);
    }

    #[test]
    fn test_singular_fits_are_not_finite() {
        let u = parabola(1.0);
        assert!(!LineSearchStep::cubic(u, u).is_finite());
        assert!(!LineSearchStep::quadratic(u, u).0.is_finite());
        assert!(!LineSearchStep::secant(u, u).is_finite());

        // Negative discriminant.
        let u = LineSearchStep::new(0.0, 0.0, 2.0);
        let v = LineSearchStep::new(1.0, 1.0, 2.0);
        assert!(LineSearchStep::cubic(u, v).is_nan());
    }

    #[test]
    fn test_interpolate_falls_back_to_lower_orders() {
        let u = LineSearchStep::new(0.0, 0.0, 2.0);
        let v = LineSearchStep::new(1.0, 1.0, 2.0);
        let (q, _) = LineSearchStep::quadratic(u, v);
        assert!(q.is_finite());
        assert_eq!(LineSearchStep::interpolate(u, v, Interpolation::Cubic), q);
        assert_eq!(
            LineSearchStep::interpolate(parabola(0.0), parabola(1.0), Interpolation::Bisection),
            0.5
        );

        let same = parabola(2.0);
        assert_eq!(
            LineSearchStep::interpolate(same, same, Interpolation::Cubic),
            2.0
        );
    }

    #[test]
    fn test_interpolate_inside_rejects_extrapolation() {
        // The minimizer t = 3 lies outside [0, 1].
        let t = LineSearchStep::interpolate_inside(parabola(0.0), parabola(1.0), Interpolation::Cubic);
        assert_eq!(t, 0.5);
        let t = LineSearchStep::interpolate_inside(parabola(0.0), parabola(4.0), Interpolation::Cubic);
        assert_that!(&t).is_close_to(3.0, 1e-12);
    }

    #[test]
    fn test_clamp_step_handles_nan() {
        assert_eq!(clamp_step(f64::NAN, 1.0, 3.0), 2.0);
        assert_eq!(clamp_step(5.0, 1.0, 3.0), 3.0);
        assert_eq!(clamp_step(0.0, 1.0, 3.0), 1.0);
    }
}
