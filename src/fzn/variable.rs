//! Flatzinc variables.

use crate::fzn::constraint::CtId;
use crate::fzn::domain::Domain;

/// Index of a variable in the model arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VarId(u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for VarId {
    fn from(index: usize) -> Self {
        VarId(index as u32)
    }
}

/// Integer variable of the flat model.
///
/// Booleans are integer variables with domain `0..1`. A variable that
/// has been substituted away or presolved out is kept in the arena
/// with `active` unset so that indices stay stable.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    pub domain: Domain,
    pub active: bool,
    /// Introduced by flattening; preferred for elimination when two
    /// variables are merged.
    pub temporary: bool,
    /// Constraint whose target variable is this variable, if any.
    pub defining_constraint: Option<CtId>,
}

impl Variable {
    pub fn new(name: impl Into<String>, domain: Domain, temporary: bool) -> Self {
        Variable {
            name: name.into(),
            domain,
            active: true,
            temporary,
            defining_constraint: None,
        }
    }
}
