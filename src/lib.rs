//! Line-search descent methods for smooth unconstrained minimization.
//!
//! A [`Solver`] runs one iterate loop for every method: a [`DescentStrategy`] proposes a
//! direction `d`, a [`LineSearch`](lsearch::LineSearch) picks a step along it, and the loop
//! stops on convergence, failure, budget exhaustion or a request from the logging hook.
//! The approach follows "Numerical Optimization" by Nocedal & Wright.
//!
//! # Features
//! - Descent methods: steepest descent, ten nonlinear conjugate-gradient formulas
//!   (Hestenes–Stiefel, Fletcher–Reeves, Polak–Ribière, conjugate descent, Liu–Storey, Dai–Yuan,
//!   Hager–Zhang and hybrids), dense quasi-Newton updates (SR1, DFP, BFGS, Hoshino, Fletcher's
//!   switch) and L-BFGS.
//! - Step initializers: constant, linear and quadratic extrapolation, CG_DESCENT.
//! - Step strategies: Moré–Thuente (strong Wolfe), Hager–Zhang CG_DESCENT (approximate Wolfe),
//!   Fletcher bracketing/zoom, Lemaréchal (regular Wolfe) and Armijo backtracking.
//! - Every component is registered under a string id and configured through range-checked
//!   parameters ([`SolverConfig::set`]).
//! - Failures never panic: they are terminal statuses on the returned [`SolverState`], which
//!   always holds the last finite iterate. [`SolverState::into_result`] converts to a `Result`.
//! - Optional `serde` feature for (de)serializing configurations.
//!
//! ## Defaults
//! - Method: L-BFGS with 20 pairs.
//! - Line search: quadratic initializer with Moré–Thuente.
//! - Tolerances: `epsilon = 1e-6` on `‖g‖_∞ / (1 + |f|)`; `c1 = 1e-4` and `c2 = 0.9` for
//!   quasi-Newton methods, `c2 = 0.1` for gradient descent and CG.
//! - Budgets: 1000 iterations, 10000 function evaluations, 100 trials per line search.
//!
//! # Example
//!
//! Minimize the Rosenbrock function, a classic test case for optimization algorithms.
//!
//! ```
//! use wolfe_descent::{Objective, Solver, SolverStatus};
//! use ndarray::{array, Array1};
//!
//! let mut rosenbrock = Objective::new(2, |x: &Array1<f64>| {
//!     let a = 1.0;
//!     let b = 100.0;
//!     let f = (a - x[0]).powi(2) + b * (x[1] - x[0].powi(2)).powi(2);
//!     let g = array![
//!         -2.0 * (a - x[0]) - 4.0 * b * (x[1] - x[0].powi(2)) * x[0],
//!         2.0 * b * (x[1] - x[0].powi(2)),
//!     ];
//!     (f, g)
//! });
//!
//! let solver = Solver::from_id("lbfgs").expect("lbfgs is registered");
//! let state = solver.minimize(&mut rosenbrock, array![-1.2, 1.0]);
//!
//! println!("{state}");
//! assert_eq!(state.status(), SolverStatus::Converged);
//! assert!((state.x()[0] - 1.0).abs() < 1e-4);
//! assert!((state.x()[1] - 1.0).abs() < 1e-4);
//! ```

pub mod error;
pub mod function;
pub mod lsearch;
pub(crate) mod params;
pub mod solver;
pub mod state;

#[cfg(test)]
mod test_functions;

pub use error::{ConfigError, SolverError};
pub use function::{Evaluator, Function, Objective};
pub use lsearch::{InitializerConfig, StrategyConfig};
pub use solver::cgd::{CgdParams, CgdVariant};
pub use solver::lbfgs::LbfgsParams;
pub use solver::quasi::{QuasiInit, QuasiParams, QuasiUpdate};
pub use solver::{DescentStrategy, Method, Solver, SolverConfig, SolverLogger};
pub use state::{Failure, SolverState, SolverStatus};
