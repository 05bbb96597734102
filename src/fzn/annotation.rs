//! Search annotations.

use crate::fzn::types::Int;
use crate::fzn::variable::VarId;

/// Node of a search annotation tree.
///
/// ```flatzinc
/// solve :: int_search([x,y], first_fail, indomain_min, complete) satisfy;
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Annotation {
    Identifier(String),
    FunctionCall { name: String, args: Vec<Annotation> },
    List(Vec<Annotation>),
    IntValue(Int),
    Interval(Int, Int),
    VarRef(VarId),
    VarRefArray(Vec<VarId>),
    Str(String),
}

impl Annotation {
    /// Collect every variable referenced below this node.
    pub fn append_all_variables(&self, out: &mut Vec<VarId>) {
        match self {
            Annotation::FunctionCall { args, .. } => {
                for arg in args {
                    arg.append_all_variables(out);
                }
            }
            Annotation::List(items) => {
                for item in items {
                    item.append_all_variables(out);
                }
            }
            Annotation::VarRef(var) => out.push(*var),
            Annotation::VarRefArray(vars) => out.extend_from_slice(vars),
            _ => {}
        }
    }

    /// Rewrite every variable reference below this node.
    pub fn rewrite_variables(&mut self, rewrite: &mut impl FnMut(VarId) -> VarId) {
        match self {
            Annotation::FunctionCall { args, .. } => {
                for arg in args {
                    arg.rewrite_variables(rewrite);
                }
            }
            Annotation::List(items) => {
                for item in items {
                    item.rewrite_variables(rewrite);
                }
            }
            Annotation::VarRef(var) => *var = rewrite(*var),
            Annotation::VarRefArray(vars) => {
                for var in vars {
                    *var = rewrite(*var);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_and_rewrite() {
        let x = VarId::from(0usize);
        let y = VarId::from(1usize);
        let z = VarId::from(2usize);
        let mut ann = Annotation::FunctionCall {
            name: "int_search".to_string(),
            args: vec![
                Annotation::VarRefArray(vec![x, y]),
                Annotation::Identifier("first_fail".to_string()),
                Annotation::List(vec![Annotation::VarRef(x)]),
            ],
        };
        let mut vars = Vec::new();
        ann.append_all_variables(&mut vars);
        assert_eq!(vars, vec![x, y, x]);

        ann.rewrite_variables(&mut |v| if v == x { z } else { v });
        let mut vars = Vec::new();
        ann.append_all_variables(&mut vars);
        assert_eq!(vars, vec![z, y, z]);
    }
}
