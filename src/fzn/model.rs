//! Flat model container.

use std::fmt::Write as _;

use itertools::Itertools;

use crate::fzn::annotation::Annotation;
use crate::fzn::argument::Argument;
use crate::fzn::constraint::Constraint;
use crate::fzn::constraint::CtId;
use crate::fzn::constraint::FALSE_CONSTRAINT;
use crate::fzn::domain::Domain;
use crate::fzn::output::SolutionOutput;
use crate::fzn::solve::Goal;
use crate::fzn::types::Int;
use crate::fzn::variable::VarId;
use crate::fzn::variable::Variable;

/// Flat model: variable arena, ordered constraint list, search
/// annotations and output specifications.
///
/// The presolver mutates the model in place. Constraints and
/// variables are never removed from the arenas, only deactivated, so
/// ids handed out at build time stay valid for a whole run.
#[derive(Default, Debug)]
pub struct Model {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    pub search_annotations: Vec<Annotation>,
    pub outputs: Vec<SolutionOutput>,
    pub objective: Option<(Goal, VarId)>,
}

impl Model {
    /// Create a new empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable to the model.
    pub fn new_var(
        &mut self,
        name: impl Into<String>,
        domain: Domain,
        temporary: bool,
    ) -> VarId {
        let id = VarId::from(self.variables.len());
        self.variables.push(Variable::new(name, domain, temporary));
        id
    }

    /// Add a constraint to the model.
    pub fn add_constraint(&mut self, constraint: Constraint) -> CtId {
        let id = CtId::from(self.constraints.len());
        self.constraints.push(constraint);
        id
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn variable_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.variables[id.index()]
    }

    pub fn constraint(&self, id: CtId) -> &Constraint {
        &self.constraints[id.index()]
    }

    pub fn constraint_mut(&mut self, id: CtId) -> &mut Constraint {
        &mut self.constraints[id.index()]
    }

    /// Return an iterator over all variable ids.
    pub fn var_ids(&self) -> impl Iterator<Item = VarId> {
        (0..self.variables.len()).map(VarId::from)
    }

    /// Return an iterator over all constraint ids.
    pub fn ct_ids(&self) -> impl Iterator<Item = CtId> {
        (0..self.constraints.len()).map(CtId::from)
    }

    /// Return the number of variables.
    pub fn nb_variables(&self) -> usize {
        self.variables.len()
    }

    /// Return the number of constraints.
    pub fn nb_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Return the number of active constraints.
    pub fn nb_active_constraints(&self) -> usize {
        self.constraints.iter().filter(|ct| ct.active).count()
    }

    /// Return `true` if the argument resolves to a single integer,
    /// either a constant or a variable with a singleton domain.
    pub fn arg_has_one_value(&self, arg: &Argument) -> bool {
        match arg {
            Argument::IntValue(_) => true,
            Argument::IntInterval(lo, hi) => lo == hi,
            Argument::IntList(values) => values.len() == 1,
            Argument::VarRef(var) => self.variable(*var).domain.has_one_value(),
            Argument::VarRefArray(_) => false,
        }
    }

    /// Return the single integer the argument resolves to.
    ///
    /// Panic if [Model::arg_has_one_value] does not hold.
    pub fn arg_value(&self, arg: &Argument) -> Int {
        match arg {
            Argument::IntValue(value) => *value,
            Argument::IntInterval(lo, hi) if lo == hi => *lo,
            Argument::IntList(values) if values.len() == 1 => values[0],
            Argument::VarRef(var) => self.variable(*var).domain.value(),
            _ => panic!("argument {arg:?} has no single value"),
        }
    }

    /// Detach the target variable of a constraint, if any.
    pub fn remove_target_variable(&mut self, ct: CtId) {
        if let Some(var) = self.constraints[ct.index()].target_variable.take() {
            self.variables[var.index()].defining_constraint = None;
        }
    }

    /// Make `var` the target variable of `ct`.
    ///
    /// The variable must not already have a defining constraint.
    pub fn set_target_variable(&mut self, ct: CtId, var: VarId) {
        debug_assert!(self.variable(var).defining_constraint.is_none());
        self.constraints[ct.index()].target_variable = Some(var);
        self.variables[var.index()].defining_constraint = Some(ct);
    }

    /// Deactivate a constraint. All later passes ignore it.
    pub fn mark_inactive(&mut self, ct: CtId) {
        self.remove_target_variable(ct);
        self.constraints[ct.index()].active = false;
    }

    /// Replace a constraint by the unsatisfiable constant: the model
    /// admits no solution.
    pub fn set_as_false(&mut self, ct: CtId) {
        self.remove_target_variable(ct);
        let constraint = &mut self.constraints[ct.index()];
        constraint.tag = FALSE_CONSTRAINT.to_string();
        constraint.args.clear();
    }

    /// Render an argument in flatzinc syntax.
    pub fn fzn_argument(&self, arg: &Argument) -> String {
        match arg {
            Argument::IntValue(value) => value.to_string(),
            Argument::IntInterval(lo, hi) => format!("{lo}..{hi}"),
            Argument::IntList(values) => {
                format!("[{}]", values.iter().format(","))
            }
            Argument::VarRef(var) => self.variable(*var).name.clone(),
            Argument::VarRefArray(vars) => format!(
                "[{}]",
                vars.iter().map(|v| &self.variable(*v).name).format(",")
            ),
        }
    }

    /// Render a constraint in flatzinc syntax.
    pub fn fzn_constraint(&self, ct: CtId) -> String {
        let constraint = self.constraint(ct);
        let args = constraint
            .args
            .iter()
            .map(|arg| self.fzn_argument(arg))
            .format(", ");
        let mut out = format!("{}({})", constraint.tag, args);
        if let Some(var) = constraint.target_variable {
            write!(out, " :: defines_var({})", self.variable(var).name).unwrap();
        }
        out
    }

    /// Render the whole model in flatzinc-like syntax: active
    /// variables, active constraints, then the solve item.
    pub fn fzn(&self) -> String {
        let mut out = String::new();
        for var in self.variables.iter().filter(|v| v.active) {
            let _ = writeln!(out, "var {}: {};", var.domain, var.name);
        }
        for ct in self.ct_ids() {
            if self.constraint(ct).active {
                let _ = writeln!(out, "constraint {};", self.fzn_constraint(ct));
            }
        }
        match self.objective {
            None => {
                let _ = writeln!(out, "solve satisfy;");
            }
            Some((Goal::Minimize, var)) => {
                let _ = writeln!(out, "solve minimize {};", self.variable(var).name);
            }
            Some((Goal::Maximize, var)) => {
                let _ = writeln!(out, "solve maximize {};", self.variable(var).name);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_variable_round_trip() {
        let mut model = Model::new();
        let x = model.new_var("x", Domain::interval(0, 9), false);
        let ct = model.add_constraint(Constraint::new(
            "int_eq",
            vec![Argument::VarRef(x), Argument::IntValue(3)],
        ));
        model.set_target_variable(ct, x);
        assert_eq!(model.variable(x).defining_constraint, Some(ct));
        model.remove_target_variable(ct);
        assert_eq!(model.variable(x).defining_constraint, None);
        assert_eq!(model.constraint(ct).target_variable, None);
    }

    #[test]
    fn set_as_false_clears_arguments() {
        let mut model = Model::new();
        let x = model.new_var("x", Domain::boolean(), false);
        let ct = model.add_constraint(Constraint::new(
            "bool_le",
            vec![Argument::VarRef(x), Argument::IntValue(0)],
        ));
        model.set_as_false(ct);
        assert_eq!(model.constraint(ct).tag, FALSE_CONSTRAINT);
        assert!(model.constraint(ct).args.is_empty());
        assert!(model.constraint(ct).active);
    }

    #[test]
    fn arg_resolution_through_domains() {
        let mut model = Model::new();
        let x = model.new_var("x", Domain::singleton(4), false);
        let y = model.new_var("y", Domain::interval(0, 5), false);
        assert!(model.arg_has_one_value(&Argument::VarRef(x)));
        assert_eq!(model.arg_value(&Argument::VarRef(x)), 4);
        assert!(!model.arg_has_one_value(&Argument::VarRef(y)));
        assert!(model.arg_has_one_value(&Argument::IntValue(7)));
    }
}
