//! The iterate loop shared by every descent method.
//!
//! A [`Solver`] is plain configuration plus optional hooks. Each call to
//! [`Solver::minimize`] builds its own line search and its own descent model, so one solver can
//! be shared by reference across threads.
//!
//! Per iteration the driver:
//! 1. asks the [`DescentStrategy`] for `d`, falling back to `-g` (and resetting the model) when
//!    `d` is not a descent direction;
//! 2. runs the line search along `d`;
//! 3. stops on convergence, divergence, line-search failure, the evaluation budget or a `false`
//!    from the logging hook;
//! 4. otherwise lets the strategy update its model from the `(previous, current)` pair.

pub mod cgd;
pub mod gd;
pub mod lbfgs;
pub mod quasi;

use crate::error::ConfigError;
use crate::function::{Evaluator, Function};
use crate::lsearch::strategy::{StrategyBase, StrategyLogger};
use crate::lsearch::{InitializerConfig, InitializerLogger, LineSearch, StrategyConfig};
use crate::params;
use crate::state::{Failure, SolverState, SolverStatus};
use ndarray::Array1;
use std::sync::Arc;

use cgd::{CgdParams, CgdVariant, ConjugateGradient};
use gd::SteepestDescent;
use lbfgs::{Lbfgs, LbfgsParams};
use quasi::{QuasiNewton, QuasiParams, QuasiUpdate};

/// Called with the current state on start, once per iteration and on termination.
/// Returning `false` while running stops the solver.
pub type SolverLogger = Arc<dyn Fn(&SolverState) -> bool + Send + Sync>;

/// Produces descent directions and maintains whatever model they come from.
pub trait DescentStrategy {
    /// The direction at `state`; `prev` is the state before the last accepted step.
    fn direction(&mut self, state: &SolverState, prev: Option<&SolverState>) -> Array1<f64>;

    /// Learns from an accepted step `prev -> curr`.
    fn update_model(&mut self, prev: &SolverState, curr: &SolverState);

    /// Drops the model, so the next direction is steepest descent.
    fn reset(&mut self);
}

/// Sets `state.d`, falling back to `-g` when the strategy's direction does not descend.
pub(crate) fn choose_direction(
    descent: &mut dyn DescentStrategy,
    state: &mut SolverState,
    prev: Option<&SolverState>,
    id: &str,
) {
    let d = descent.direction(state, prev);
    state.d = d;
    if !state.has_descent() {
        log::warn!(
            "[Solver {id}] not a descent direction (dg={:.6e}); resetting to -g",
            state.dg()
        );
        descent.reset();
        state.d = -&state.g;
    }
}

/// Registered descent methods.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum Method {
    GradientDescent,
    ConjugateGradient(CgdParams),
    QuasiNewton(QuasiParams),
    Lbfgs(LbfgsParams),
}

impl Default for Method {
    fn default() -> Self {
        Method::Lbfgs(LbfgsParams::default())
    }
}

impl Method {
    pub const IDS: [&'static str; 18] = [
        "gd", "cgd", "cgd-n", "cgd-hs", "cgd-fr", "cgd-pr", "cgd-cd", "cgd-ls", "cgd-dy",
        "cgd-dycd", "cgd-dyhs", "cgd-frpr", "lbfgs", "dfp", "sr1", "bfgs", "hoshino", "fletcher",
    ];

    /// Default-parameterized method registered under `id`. `cgd` is Polak–Ribière.
    pub fn from_id(id: &str) -> Result<Self, ConfigError> {
        let cgd = |variant| Ok(Method::ConjugateGradient(CgdParams::new(variant)));
        let quasi = |update| Ok(Method::QuasiNewton(QuasiParams::new(update)));
        match id {
            "gd" => Ok(Method::GradientDescent),
            "cgd" | "cgd-pr" => cgd(CgdVariant::PR),
            "cgd-n" => cgd(CgdVariant::N),
            "cgd-hs" => cgd(CgdVariant::HS),
            "cgd-fr" => cgd(CgdVariant::FR),
            "cgd-cd" => cgd(CgdVariant::CD),
            "cgd-ls" => cgd(CgdVariant::LS),
            "cgd-dy" => cgd(CgdVariant::DY),
            "cgd-dycd" => cgd(CgdVariant::DYCD),
            "cgd-dyhs" => cgd(CgdVariant::DYHS),
            "cgd-frpr" => cgd(CgdVariant::FRPR),
            "lbfgs" => Ok(Method::Lbfgs(LbfgsParams::default())),
            "dfp" => quasi(QuasiUpdate::Dfp),
            "sr1" => quasi(QuasiUpdate::Sr1),
            "bfgs" => quasi(QuasiUpdate::Bfgs),
            "hoshino" => quasi(QuasiUpdate::Hoshino),
            "fletcher" => quasi(QuasiUpdate::Fletcher),
            _ => Err(ConfigError::UnknownId {
                kind: "solver",
                id: id.to_string(),
            }),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Method::GradientDescent => "gd",
            Method::ConjugateGradient(params) => params.variant.id(),
            Method::QuasiNewton(params) => params.update.id(),
            Method::Lbfgs(_) => "lbfgs",
        }
    }

    /// `(c1, c2)` suited to the method: a tight curvature condition for gradient descent
    /// and CG, a loose one for the quasi-Newton family.
    pub fn default_tolerance(&self) -> (f64, f64) {
        match self {
            Method::GradientDescent | Method::ConjugateGradient(_) => (1e-4, 0.1),
            Method::QuasiNewton(_) | Method::Lbfgs(_) => (1e-4, 0.9),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Method::GradientDescent => Ok(()),
            Method::ConjugateGradient(params) => params.validate(),
            Method::QuasiNewton(params) => params.validate(),
            Method::Lbfgs(params) => params.validate(),
        }
    }

    /// A fresh descent model for an `n`-dimensional problem.
    pub fn build(&self, n: usize) -> Box<dyn DescentStrategy> {
        match *self {
            Method::GradientDescent => Box::new(SteepestDescent),
            Method::ConjugateGradient(params) => Box::new(ConjugateGradient::new(params)),
            Method::QuasiNewton(params) => Box::new(QuasiNewton::new(n, params)),
            Method::Lbfgs(params) => Box::new(Lbfgs::new(params)),
        }
    }
}

/// Everything a run reads, validated as a whole.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    pub method: Method,
    /// Convergence threshold on `‖g‖_∞ / (1 + |f|)`.
    pub epsilon: f64,
    pub max_iterations: usize,
    /// Budget of function evaluations, checked once per iteration.
    pub max_evals: usize,
    pub c1: f64,
    pub c2: f64,
    /// Trial budget of one line search.
    pub lsearch_max_iterations: usize,
    pub lsearch0: InitializerConfig,
    pub lsearchk: StrategyConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::new(Method::default())
    }
}

impl SolverConfig {
    pub fn new(method: Method) -> Self {
        let (c1, c2) = method.default_tolerance();
        Self {
            method,
            epsilon: 1e-6,
            max_iterations: 1000,
            max_evals: 10_000,
            c1,
            c2,
            lsearch_max_iterations: 100,
            lsearch0: InitializerConfig::default(),
            lsearchk: StrategyConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        params::left_open("solver::epsilon", self.epsilon, 0.0, 0.1)?;
        params::count("solver::max_iterations", self.max_iterations, 1, usize::MAX)?;
        params::count("solver::max_evals", self.max_evals, 1, usize::MAX)?;
        params::count("lsearchk::max_iterations", self.lsearch_max_iterations, 1, 1000)?;
        params::tolerance(self.c1, self.c2)?;
        if matches!(self.lsearchk, StrategyConfig::CgDescent(_)) && self.c1 >= 0.5 {
            return Err(ConfigError::Tolerance {
                c1: self.c1,
                c2: self.c2,
            });
        }
        self.method.validate()?;
        self.lsearch0.validate()?;
        self.lsearchk.validate()
    }

    /// Sets a parameter by its qualified name, e.g. `lbfgs::history` or
    /// `lsearchk::morethuente::delta`. A rejected value leaves the configuration untouched.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        let mut next = self.clone();
        next.assign(name, value)?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn assign(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownParameter(name.to_string());
        match (name, &mut self.method) {
            ("solver::epsilon", _) => self.epsilon = value,
            ("solver::max_iterations", _) => {
                self.max_iterations = params::count_from_f64(name, value, 1, usize::MAX)?;
            }
            ("solver::max_evals", _) => {
                self.max_evals = params::count_from_f64(name, value, 1, usize::MAX)?;
            }
            ("lsearch::c1", _) => self.c1 = value,
            ("lsearch::c2", _) => self.c2 = value,
            ("lsearchk::max_iterations", _) => {
                self.lsearch_max_iterations = params::count_from_f64(name, value, 1, 1000)?;
            }
            ("cgd::orthotest", Method::ConjugateGradient(p)) => p.orthotest = value,
            ("cgd::eta", Method::ConjugateGradient(p)) => p.eta = value,
            ("quasi::r", Method::QuasiNewton(p)) => p.r = value,
            ("lbfgs::history", Method::Lbfgs(p)) => {
                p.history = params::count_from_f64(name, value, 1, 1000)?;
            }
            _ => {
                if let Some(rest) = name.strip_prefix("lsearch0::") {
                    let (id, param) = rest.split_once("::").ok_or_else(unknown)?;
                    if id != self.lsearch0.id() {
                        return Err(unknown());
                    }
                    self.lsearch0.set(param, value)?;
                } else if let Some(rest) = name.strip_prefix("lsearchk::") {
                    let (id, param) = rest.split_once("::").ok_or_else(unknown)?;
                    if id != self.lsearchk.id() {
                        return Err(unknown());
                    }
                    self.lsearchk.set(param, value)?;
                } else {
                    return Err(unknown());
                }
            }
        }
        Ok(())
    }
}

/// A configured line-search descent solver.
///
/// ```
/// use wolfe_descent::{Objective, Solver, SolverStatus};
/// use ndarray::{array, Array1};
///
/// let mut function = Objective::new(2, |x: &Array1<f64>| (x.dot(x), 2.0 * x));
/// let solver = Solver::from_id("cgd").unwrap().with_epsilon(1e-8).unwrap();
/// let state = solver.minimize(&mut function, array![3.0, -1.0]);
/// assert_eq!(state.status(), SolverStatus::Converged);
/// ```
#[derive(Clone)]
pub struct Solver {
    config: SolverConfig,
    logger: Option<SolverLogger>,
    lsearch0_logger: Option<InitializerLogger>,
    lsearchk_logger: Option<StrategyLogger>,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            config: SolverConfig::default(),
            logger: None,
            lsearch0_logger: None,
            lsearchk_logger: None,
        }
    }
}

impl Solver {
    /// Default settings for `method`, rejecting out-of-range method parameters.
    pub fn new(method: Method) -> Result<Self, ConfigError> {
        Self::from_config(SolverConfig::new(method))
    }

    pub fn from_id(id: &str) -> Result<Self, ConfigError> {
        Self::new(Method::from_id(id)?)
    }

    pub fn from_config(config: SolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn with(mut self, edit: impl FnOnce(&mut SolverConfig)) -> Result<Self, ConfigError> {
        let mut next = self.config.clone();
        edit(&mut next);
        next.validate()?;
        self.config = next;
        Ok(self)
    }

    pub fn with_epsilon(self, epsilon: f64) -> Result<Self, ConfigError> {
        self.with(|c| c.epsilon = epsilon)
    }

    pub fn with_max_iterations(self, max_iterations: usize) -> Result<Self, ConfigError> {
        self.with(|c| c.max_iterations = max_iterations)
    }

    pub fn with_max_evals(self, max_evals: usize) -> Result<Self, ConfigError> {
        self.with(|c| c.max_evals = max_evals)
    }

    /// Sets the Wolfe constants `c1 < c2`.
    pub fn with_tolerance(self, c1: f64, c2: f64) -> Result<Self, ConfigError> {
        self.with(|c| {
            c.c1 = c1;
            c.c2 = c2;
        })
    }

    pub fn with_lsearch0(self, lsearch0: InitializerConfig) -> Result<Self, ConfigError> {
        self.with(|c| c.lsearch0 = lsearch0)
    }

    pub fn with_lsearchk(self, lsearchk: StrategyConfig) -> Result<Self, ConfigError> {
        self.with(|c| c.lsearchk = lsearchk)
    }

    pub fn with_logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&SolverState) -> bool + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn with_lsearch0_logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&SolverState, f64) + Send + Sync + 'static,
    {
        self.lsearch0_logger = Some(Arc::new(logger));
        self
    }

    pub fn with_lsearchk_logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&SolverState, &SolverState) + Send + Sync + 'static,
    {
        self.lsearchk_logger = Some(Arc::new(logger));
        self
    }

    /// See [`SolverConfig::set`].
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        self.config.set(name, value)
    }

    fn line_search(&self) -> LineSearch {
        let c = &self.config;
        let base = StrategyBase::new(c.c1, c.c2, c.lsearch_max_iterations)
            .with_logger(self.lsearchk_logger.clone());
        LineSearch::new(c.lsearch0.build(c.epsilon), c.lsearchk.build(base))
            .with_logger(self.lsearch0_logger.clone())
    }

    fn log(&self, state: &SolverState) -> bool {
        self.logger.as_ref().is_none_or(|logger| logger(state))
    }

    /// Minimizes `function` from `x0` and returns the terminal state.
    ///
    /// Failures are reported through [`SolverState::status`]; use
    /// [`SolverState::into_result`] to get a `Result` instead.
    ///
    /// # Panics
    ///
    /// If `x0.len()` differs from `function.size()`.
    pub fn minimize(&self, function: &mut dyn Function, x0: Array1<f64>) -> SolverState {
        assert_eq!(
            x0.len(),
            function.size(),
            "solver: starting point has {} components, the function expects {}",
            x0.len(),
            function.size()
        );
        let id = self.config.method.id();
        let n = x0.len();
        let mut evaluator = Evaluator::new(function);
        log::info!(
            "[Solver {id}] minimizing {} (n={n}, convex={}, smooth={}) with {}/{}",
            evaluator.name(),
            evaluator.convex(),
            evaluator.smooth(),
            self.config.lsearch0.id(),
            self.config.lsearchk.id()
        );
        if !evaluator.smooth() {
            log::warn!(
                "[Solver {id}] {} is not smooth; Wolfe steps may not exist",
                evaluator.name()
            );
        }

        let mut descent = self.config.method.build(n);
        let mut lsearch = self.line_search();
        let mut state = SolverState::new(&mut evaluator, x0);

        if state.valid() && state.converged(self.config.epsilon) {
            self.finish(&mut state, SolverStatus::Converged);
            return state;
        }
        if !state.valid() {
            self.finish(&mut state, SolverStatus::Failed(Failure::Diverged));
            return state;
        }
        if !self.log(&state) {
            state.status = SolverStatus::Stopped;
            log::info!("[Solver {id}] stopped by the logger: {state}");
            return state;
        }

        let mut prev: Option<SolverState> = None;
        for k in 0..self.config.max_iterations {
            choose_direction(descent.as_mut(), &mut state, prev.as_ref(), id);

            let snapshot = state.clone();
            let iter_ok = lsearch.get(&mut evaluator, &mut state);
            state.iterations = k + 1;
            state.fcalls = evaluator.fcalls();
            state.gcalls = evaluator.gcalls();

            if self.done(&mut state, &snapshot, iter_ok) {
                return state;
            }

            descent.update_model(&snapshot, &state);
            prev = Some(snapshot);
        }

        self.finish(&mut state, SolverStatus::Failed(Failure::MaxIterations));
        state
    }

    /// Decides whether the run ends after an iteration, setting the terminal status.
    fn done(&self, state: &mut SolverState, snapshot: &SolverState, iter_ok: bool) -> bool {
        let id = self.config.method.id();
        let status = if state.valid() && state.converged(self.config.epsilon) {
            SolverStatus::Converged
        } else if !state.valid() {
            restore(state, snapshot);
            SolverStatus::Failed(Failure::Diverged)
        } else if !iter_ok {
            restore(state, snapshot);
            SolverStatus::Failed(Failure::LineSearch)
        } else if state.fcalls() >= self.config.max_evals {
            SolverStatus::Failed(Failure::MaxEvaluations)
        } else {
            log::debug!("[Solver {id}] {state}");
            if self.log(state) {
                return false;
            }
            state.status = SolverStatus::Stopped;
            log::info!("[Solver {id}] stopped by the logger: {state}");
            return true;
        };

        self.finish(state, status);
        true
    }

    fn finish(&self, state: &mut SolverState, status: SolverStatus) {
        let id = self.config.method.id();
        state.status = status;
        match status {
            SolverStatus::Failed(_) => log::warn!("[Solver {id}] {state}"),
            _ => log::info!("[Solver {id}] {state}"),
        }
        self.log(state);
    }
}

/// Puts back the point, gradient and value from before the line search.
fn restore(state: &mut SolverState, snapshot: &SolverState) {
    state.update(snapshot.x.clone(), snapshot.g.clone(), snapshot.f);
    state.t = snapshot.t;
}
