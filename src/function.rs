//! Objective functions and the counting adapter the solver evaluates them through.

use ndarray::Array1;

/// A differentiable objective `f: R^n -> R`.
///
/// Implementations must be deterministic for a fixed `x` during one `minimize` call.
pub trait Function {
    /// Problem dimension `n`.
    fn size(&self) -> usize;

    /// Returns `f(x)` and, when `gradient` is given, writes `∇f(x)` into it.
    fn value_and_gradient(&mut self, x: &Array1<f64>, gradient: Option<&mut Array1<f64>>) -> f64;

    fn name(&self) -> &str {
        "function"
    }

    /// Diagnostic hint only.
    fn convex(&self) -> bool {
        false
    }

    /// Diagnostic hint only.
    fn smooth(&self) -> bool {
        true
    }
}

/// Wraps a closure returning `(f, g)` as a [`Function`].
///
/// ```
/// use wolfe_descent::{Function, Objective};
/// use ndarray::{array, Array1};
///
/// let mut sphere = Objective::new(2, |x: &Array1<f64>| (x.dot(x), 2.0 * x));
/// let mut g = Array1::zeros(2);
/// let f = sphere.value_and_gradient(&array![1.0, 2.0], Some(&mut g));
/// assert_eq!(f, 5.0);
/// assert_eq!(g, array![2.0, 4.0]);
/// ```
pub struct Objective<F> {
    size: usize,
    name: String,
    convex: bool,
    closure: F,
}

impl<F> Objective<F>
where
    F: FnMut(&Array1<f64>) -> (f64, Array1<f64>),
{
    pub fn new(size: usize, closure: F) -> Self {
        Self {
            size,
            name: "objective".to_string(),
            convex: false,
            closure,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_convexity(mut self, convex: bool) -> Self {
        self.convex = convex;
        self
    }
}

impl<F> Function for Objective<F>
where
    F: FnMut(&Array1<f64>) -> (f64, Array1<f64>),
{
    fn size(&self) -> usize {
        self.size
    }

    fn value_and_gradient(&mut self, x: &Array1<f64>, gradient: Option<&mut Array1<f64>>) -> f64 {
        let (f, g) = (self.closure)(x);
        if let Some(out) = gradient {
            out.assign(&g);
        }
        f
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn convex(&self) -> bool {
        self.convex
    }
}

/// Forwards every evaluation to the wrapped [`Function`] and counts them.
///
/// No caching: each call reaches the objective.
pub struct Evaluator<'a> {
    function: &'a mut dyn Function,
    fcalls: usize,
    gcalls: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(function: &'a mut dyn Function) -> Self {
        Self {
            function,
            fcalls: 0,
            gcalls: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.function.size()
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    /// The wrapped function's [`Function::convex`] hint.
    pub fn convex(&self) -> bool {
        self.function.convex()
    }

    pub fn smooth(&self) -> bool {
        self.function.smooth()
    }

    /// Returns `(f(x), ∇f(x))`.
    pub fn value_and_gradient(&mut self, x: &Array1<f64>) -> (f64, Array1<f64>) {
        let mut g = Array1::zeros(x.len());
        let f = self.value_and_gradient_into(x, &mut g);
        (f, g)
    }

    /// Writes `∇f(x)` into `gradient` and returns `f(x)`.
    pub fn value_and_gradient_into(&mut self, x: &Array1<f64>, gradient: &mut Array1<f64>) -> f64 {
        self.fcalls += 1;
        self.gcalls += 1;
        self.function.value_and_gradient(x, Some(gradient))
    }

    /// Restriction along a direction: returns `(f(x + t·d), ∇f(x + t·d)·d)`.
    ///
    /// The trial point and its full gradient are left in `xt` and `gradient`.
    pub fn value_and_slope(
        &mut self,
        x: &Array1<f64>,
        t: f64,
        d: &Array1<f64>,
        xt: &mut Array1<f64>,
        gradient: &mut Array1<f64>,
    ) -> (f64, f64) {
        xt.assign(x);
        xt.scaled_add(t, d);
        let f = self.value_and_gradient_into(xt, gradient);
        (f, gradient.dot(d))
    }

    pub fn fcalls(&self) -> usize {
        self.fcalls
    }

    pub fn gcalls(&self) -> usize {
        self.gcalls
    }
}
