//! Benchmark objectives shared by the unit tests.

use crate::function::Objective;
use ndarray::{Array1, array};

type Closure = fn(&Array1<f64>) -> (f64, Array1<f64>);

/// `f(x) = x·x`, minimum at 0.
pub(crate) fn sphere(n: usize) -> Objective<Closure> {
    Objective::new(n, (|x: &Array1<f64>| (x.dot(x), 2.0 * x)) as Closure)
        .with_name("sphere")
        .with_convexity(true)
}

/// `f(x) = Σ (i+1)·x_i²`, increasingly badly scaled with `n`.
pub(crate) fn quadratic_diag(n: usize) -> Objective<Closure> {
    fn eval(x: &Array1<f64>) -> (f64, Array1<f64>) {
        let weights = Array1::from_shape_fn(x.len(), |i| (i + 1) as f64);
        let f = (&weights * x).dot(x);
        (f, 2.0 * &weights * x)
    }
    Objective::new(n, eval as Closure)
        .with_name("quadratic-diag")
        .with_convexity(true)
}

/// `f(x) = log(1 + ‖x - b‖²/2)`, minimum at `b`.
pub(crate) fn log_quadratic(
    b: Array1<f64>,
) -> Objective<impl FnMut(&Array1<f64>) -> (f64, Array1<f64>)> {
    let n = b.len();
    Objective::new(n, move |x: &Array1<f64>| {
        let r = x - &b;
        let q = 1.0 + 0.5 * r.dot(&r);
        (q.ln(), r / q)
    })
    .with_name("log-quadratic")
}

/// The Rosenbrock valley, minimum at `[1, 1]`.
pub(crate) fn rosenbrock() -> Objective<Closure> {
    fn eval(x: &Array1<f64>) -> (f64, Array1<f64>) {
        let a = 1.0;
        let b = 100.0;
        let f = (a - x[0]).powi(2) + b * (x[1] - x[0].powi(2)).powi(2);
        let g = array![
            -2.0 * (a - x[0]) - 4.0 * b * (x[1] - x[0].powi(2)) * x[0],
            2.0 * b * (x[1] - x[0].powi(2))
        ];
        (f, g)
    }
    Objective::new(2, eval as Closure).with_name("rosenbrock")
}

/// `f(x) = x·x` reporting the negated gradient, so `-g` always climbs.
pub(crate) fn lying_gradient(n: usize) -> Objective<Closure> {
    Objective::new(n, (|x: &Array1<f64>| (x.dot(x), -2.0 * x)) as Closure)
        .with_name("lying-gradient")
}

/// `x·x` where `x[0] ≥ 1`, NaN everywhere else.
pub(crate) fn nan_cliff(n: usize) -> Objective<Closure> {
    fn eval(x: &Array1<f64>) -> (f64, Array1<f64>) {
        if x[0] >= 1.0 {
            (x.dot(x), 2.0 * x)
        } else {
            (f64::NAN, Array1::from_elem(x.len(), f64::NAN))
        }
    }
    Objective::new(n, eval as Closure).with_name("nan-cliff")
}
