//! Step-length selection: an [`Initializer`] proposes `t0`, a [`LineSearchStrategy`] refines it.
//!
//! Components are chosen by id through [`InitializerConfig`] and [`StrategyConfig`] once, when
//! the solver is configured; [`LineSearch`] instances are built fresh for every run.

pub mod backtrack;
pub mod cgdescent;
pub mod fletcher;
pub mod init;
pub mod lemarechal;
pub mod morethuente;
pub mod step;
pub mod strategy;

use crate::error::ConfigError;
use crate::function::Evaluator;
use crate::state::SolverState;
use std::sync::Arc;

use backtrack::{Backtrack, BacktrackParams};
use cgdescent::{CgDescent, CgDescentParams};
use fletcher::{Fletcher, FletcherParams};
use init::{
    CgDescentInit, CgDescentInitParams, Constant, ConstantParams, ExtrapolationParams,
    Initializer, Linear, Quadratic,
};
use lemarechal::{Lemarechal, LemarechalParams};
use morethuente::{MoreThuente, MoreThuenteParams};
use strategy::{LineSearchStrategy, StrategyBase};

/// Called with `(state, t0)` whenever an initial step is proposed.
pub type InitializerLogger = Arc<dyn Fn(&SolverState, f64) + Send + Sync>;

/// Composes an initializer and a strategy into one step-length search.
pub struct LineSearch {
    initializer: Box<dyn Initializer>,
    strategy: Box<dyn LineSearchStrategy>,
    logger: Option<InitializerLogger>,
}

impl LineSearch {
    pub fn new(initializer: Box<dyn Initializer>, strategy: Box<dyn LineSearchStrategy>) -> Self {
        Self {
            initializer,
            strategy,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Option<InitializerLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Moves `state` along `state.d` to an accepted step.
    pub fn get(&mut self, evaluator: &mut Evaluator<'_>, state: &mut SolverState) -> bool {
        let t0 = self.initializer.get(state);
        if let Some(logger) = &self.logger {
            logger(state, t0);
        }
        log::debug!(
            "[Lsearch {}/{}] t0={:.6e}",
            self.initializer.id(),
            self.strategy.id(),
            t0
        );
        self.strategy.get(evaluator, state, t0)
    }
}

/// Registered initializers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum InitializerConfig {
    Constant(ConstantParams),
    Linear(ExtrapolationParams),
    Quadratic(ExtrapolationParams),
    CgDescent(CgDescentInitParams),
}

impl Default for InitializerConfig {
    fn default() -> Self {
        InitializerConfig::Quadratic(ExtrapolationParams::default())
    }
}

impl InitializerConfig {
    pub const IDS: [&'static str; 4] = ["constant", "linear", "quadratic", "cgdescent"];

    /// Default-parameterized initializer registered under `id`.
    pub fn from_id(id: &str) -> Result<Self, ConfigError> {
        match id {
            "constant" => Ok(InitializerConfig::Constant(ConstantParams::default())),
            "linear" => Ok(InitializerConfig::Linear(ExtrapolationParams::default())),
            "quadratic" => Ok(InitializerConfig::Quadratic(ExtrapolationParams::default())),
            "cgdescent" => Ok(InitializerConfig::CgDescent(CgDescentInitParams::default())),
            _ => Err(ConfigError::UnknownId {
                kind: "lsearch0",
                id: id.to_string(),
            }),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            InitializerConfig::Constant(_) => "constant",
            InitializerConfig::Linear(_) => "linear",
            InitializerConfig::Quadratic(_) => "quadratic",
            InitializerConfig::CgDescent(_) => "cgdescent",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            InitializerConfig::Constant(params) => params.validate(),
            InitializerConfig::Linear(params) => params.validate("linear"),
            InitializerConfig::Quadratic(params) => params.validate("quadratic"),
            InitializerConfig::CgDescent(params) => params.validate(),
        }
    }

    /// Sets `<param>` of the active initializer, as named after `lsearch0::<id>::`.
    pub(crate) fn set(&mut self, param: &str, value: f64) -> Result<(), ConfigError> {
        let slot = match (self, param) {
            (InitializerConfig::Constant(p), "t0") => &mut p.t0,
            (InitializerConfig::Linear(p) | InitializerConfig::Quadratic(p), "alpha") => &mut p.alpha,
            (InitializerConfig::Linear(p) | InitializerConfig::Quadratic(p), "beta") => &mut p.beta,
            (InitializerConfig::CgDescent(p), "phi0") => &mut p.phi0,
            (InitializerConfig::CgDescent(p), "phi2") => &mut p.phi2,
            (config, _) => {
                return Err(ConfigError::UnknownParameter(format!(
                    "lsearch0::{}::{param}",
                    config.id()
                )));
            }
        };
        *slot = value;
        Ok(())
    }

    /// A fresh initializer; `epsilon` is the floor below which estimates fall back to 1.
    pub fn build(&self, epsilon: f64) -> Box<dyn Initializer> {
        match *self {
            InitializerConfig::Constant(params) => Box::new(Constant::new(params)),
            InitializerConfig::Linear(params) => Box::new(Linear::new(params, epsilon)),
            InitializerConfig::Quadratic(params) => Box::new(Quadratic::new(params, epsilon)),
            InitializerConfig::CgDescent(params) => Box::new(CgDescentInit::new(params, epsilon)),
        }
    }
}

/// Registered line-search strategies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum StrategyConfig {
    Backtrack(BacktrackParams),
    CgDescent(CgDescentParams),
    Fletcher(FletcherParams),
    Lemarechal(LemarechalParams),
    MoreThuente(MoreThuenteParams),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::MoreThuente(MoreThuenteParams::default())
    }
}

impl StrategyConfig {
    pub const IDS: [&'static str; 5] = ["backtrack", "cgdescent", "fletcher", "lemarechal", "morethuente"];

    /// Default-parameterized strategy registered under `id`.
    pub fn from_id(id: &str) -> Result<Self, ConfigError> {
        match id {
            "backtrack" => Ok(StrategyConfig::Backtrack(BacktrackParams::default())),
            "cgdescent" => Ok(StrategyConfig::CgDescent(CgDescentParams::default())),
            "fletcher" => Ok(StrategyConfig::Fletcher(FletcherParams::default())),
            "lemarechal" => Ok(StrategyConfig::Lemarechal(LemarechalParams::default())),
            "morethuente" => Ok(StrategyConfig::MoreThuente(MoreThuenteParams::default())),
            _ => Err(ConfigError::UnknownId {
                kind: "lsearchk",
                id: id.to_string(),
            }),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            StrategyConfig::Backtrack(_) => "backtrack",
            StrategyConfig::CgDescent(_) => "cgdescent",
            StrategyConfig::Fletcher(_) => "fletcher",
            StrategyConfig::Lemarechal(_) => "lemarechal",
            StrategyConfig::MoreThuente(_) => "morethuente",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StrategyConfig::Backtrack(params) => params.validate(),
            StrategyConfig::CgDescent(params) => params.validate(),
            StrategyConfig::Fletcher(params) => params.validate(),
            StrategyConfig::Lemarechal(params) => params.validate(),
            StrategyConfig::MoreThuente(params) => params.validate(),
        }
    }

    /// Sets `<param>` of the active strategy, as named after `lsearchk::<id>::`.
    pub(crate) fn set(&mut self, param: &str, value: f64) -> Result<(), ConfigError> {
        let slot = match (self, param) {
            (StrategyConfig::CgDescent(p), "epsilon") => &mut p.epsilon,
            (StrategyConfig::CgDescent(p), "theta") => &mut p.theta,
            (StrategyConfig::CgDescent(p), "gamma") => &mut p.gamma,
            (StrategyConfig::CgDescent(p), "delta") => &mut p.delta,
            (StrategyConfig::CgDescent(p), "omega") => &mut p.omega,
            (StrategyConfig::CgDescent(p), "ro") => &mut p.ro,
            (StrategyConfig::Fletcher(p), "tau1") => &mut p.tau1,
            (StrategyConfig::Fletcher(p), "tau2") => &mut p.tau2,
            (StrategyConfig::Fletcher(p), "tau3") => &mut p.tau3,
            (StrategyConfig::Lemarechal(p), "tau1") => &mut p.tau1,
            (StrategyConfig::Lemarechal(p), "safeguard") => &mut p.safeguard,
            (StrategyConfig::MoreThuente(p), "delta") => &mut p.delta,
            (config, _) => {
                return Err(ConfigError::UnknownParameter(format!(
                    "lsearchk::{}::{param}",
                    config.id()
                )));
            }
        };
        *slot = value;
        Ok(())
    }

    /// A fresh strategy sharing `base`'s tolerances, trial budget and hook.
    pub fn build(&self, base: StrategyBase) -> Box<dyn LineSearchStrategy> {
        match *self {
            StrategyConfig::Backtrack(params) => Box::new(Backtrack::new(base, params)),
            StrategyConfig::CgDescent(params) => Box::new(CgDescent::new(base, params)),
            StrategyConfig::Fletcher(params) => Box::new(Fletcher::new(base, params)),
            StrategyConfig::Lemarechal(params) => Box::new(Lemarechal::new(base, params)),
            StrategyConfig::MoreThuente(params) => Box::new(MoreThuente::new(base, params)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_functions::sphere;
    use ndarray::array;
    use spectral::prelude::*;
    use std::sync::Mutex;

    #[test]
    fn test_every_registered_id_resolves() {
        for id in InitializerConfig::IDS {
            let config = InitializerConfig::from_id(id).unwrap();
            assert_eq!(config.id(), id);
            assert!(config.validate().is_ok());
            assert_eq!(config.build(1e-6).id(), id);
        }
        for id in StrategyConfig::IDS {
            let config = StrategyConfig::from_id(id).unwrap();
            assert_eq!(config.id(), id);
            assert!(config.validate().is_ok());
            assert_eq!(config.build(StrategyBase::new(1e-4, 0.9, 40)).id(), id);
        }
    }

    #[test]
    fn test_unknown_ids_are_rejected() {
        assert_eq!(
            StrategyConfig::from_id("wolfe"),
            Err(ConfigError::UnknownId {
                kind: "lsearchk",
                id: "wolfe".to_string()
            })
        );
        assert!(InitializerConfig::from_id("").is_err());
    }

    #[test]
    fn test_parameters_are_set_by_name() {
        let mut config = StrategyConfig::from_id("cgdescent").unwrap();
        config.set("omega", 0.01).unwrap();
        assert!(matches!(config, StrategyConfig::CgDescent(p) if p.omega == 0.01));
        assert!(config.set("tau1", 3.0).is_err());

        let mut config = InitializerConfig::from_id("linear").unwrap();
        config.set("beta", 4.0).unwrap();
        assert_eq!(
            config,
            InitializerConfig::Linear(ExtrapolationParams {
                alpha: 1.01,
                beta: 4.0
            })
        );
    }

    #[test]
    fn test_orchestrator_runs_initializer_then_strategy() {
        let proposals = Arc::new(Mutex::new(Vec::new()));
        let seen = proposals.clone();
        let logger: InitializerLogger = Arc::new(move |_, t0| seen.lock().unwrap().push(t0));

        let mut function = sphere(2);
        let mut evaluator = Evaluator::new(&mut function);
        let mut state = SolverState::new(&mut evaluator, array![1.0, -2.0]);
        state.d = -&state.g;

        let mut lsearch = LineSearch::new(
            InitializerConfig::from_id("constant").unwrap().build(1e-6),
            StrategyConfig::default().build(StrategyBase::new(1e-4, 0.1, 40)),
        )
        .with_logger(Some(logger));
        assert!(lsearch.get(&mut evaluator, &mut state));

        assert_eq!(*proposals.lock().unwrap(), vec![1.0]);
        // Exact minimizer of the sphere along -g is t = 0.5, up to the sufficient-decrease shift.
        assert_that!(&state.t()).is_close_to(0.5, 1e-3);
        assert!(state.f() < 1e-6);
    }
}
