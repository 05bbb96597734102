//! Flat constraints.

use crate::fzn::argument::Argument;
use crate::fzn::variable::VarId;

/// Tag of a constraint that is unsatisfiable regardless of its
/// (cleared) arguments. The downstream solver reports the model as
/// infeasible when it encounters one.
pub const FALSE_CONSTRAINT: &str = "false_constraint";

/// Index of a constraint in the model.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CtId(u32);

impl CtId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for CtId {
    fn from(index: usize) -> Self {
        CtId(index as u32)
    }
}

/// Flat constraint: a tag from the flatzinc builtin vocabulary and a
/// fixed-arity argument vector.
///
/// ```flatzinc
/// constraint int_lin_eq([1,-1],[x,y],0) :: defines_var(x);
/// ```
#[derive(Clone, Debug)]
pub struct Constraint {
    pub tag: String,
    pub args: Vec<Argument>,
    pub active: bool,
    /// Variable defined by this constraint, if any. Kept in sync with
    /// the variable's `defining_constraint` back pointer.
    pub target_variable: Option<VarId>,
    /// Guards once-only propagations that would otherwise refire
    /// without progress.
    pub presolve_propagation_done: bool,
    /// Set from the `domain` annotation; opt-in for stronger rules.
    pub strong_propagation: bool,
}

impl Constraint {
    pub fn new(tag: impl Into<String>, args: Vec<Argument>) -> Self {
        Constraint {
            tag: tag.into(),
            args,
            active: true,
            target_variable: None,
            presolve_propagation_done: false,
            strong_propagation: false,
        }
    }

    /// Remove the argument at `index`, shifting the rest down.
    pub fn remove_arg(&mut self, index: usize) {
        self.args.remove(index);
    }

    /// Return `true` if the tag carries the reification suffix.
    pub fn is_reified(&self) -> bool {
        self.tag.ends_with("_reif")
    }
}
