use super::DescentStrategy;
use crate::state::SolverState;
use ndarray::Array1;

/// Steepest descent: `d = -g`, no model.
#[derive(Debug, Default, Clone, Copy)]
pub struct SteepestDescent;

impl DescentStrategy for SteepestDescent {
    fn direction(&mut self, state: &SolverState, _prev: Option<&SolverState>) -> Array1<f64> {
        -state.g()
    }

    fn update_model(&mut self, _prev: &SolverState, _curr: &SolverState) {}

    fn reset(&mut self) {}
}
