//! Flatzinc output specifications.

use crate::fzn::types::Int;
use crate::fzn::variable::VarId;

/// Output requested by an `output_var` or `output_array` annotation.
///
/// A scalar output carries one variable; an array output carries the
/// flattened variables plus the index ranges used to reshape them.
#[derive(Clone, Debug)]
pub struct SolutionOutput {
    pub name: String,
    pub variable: Option<VarId>,
    pub flat_variables: Vec<VarId>,
    pub ranges: Vec<(Int, Int)>,
}

impl SolutionOutput {
    /// Output spec for a single variable.
    pub fn scalar(name: impl Into<String>, variable: VarId) -> Self {
        SolutionOutput {
            name: name.into(),
            variable: Some(variable),
            flat_variables: Vec::new(),
            ranges: Vec::new(),
        }
    }

    /// Output spec for an array of variables.
    pub fn array(
        name: impl Into<String>,
        flat_variables: Vec<VarId>,
        ranges: Vec<(Int, Int)>,
    ) -> Self {
        SolutionOutput {
            name: name.into(),
            variable: None,
            flat_variables,
            ranges,
        }
    }
}
