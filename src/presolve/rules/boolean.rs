//! Boolean constraint rules.

use crate::fzn::argument::Argument;
use crate::fzn::constraint::CtId;
use crate::fzn::model::Model;
use crate::fzn::types::as_int;
use crate::fzn::types::Int;
use crate::fzn::variable::VarId;
use crate::presolve::Presolver;

impl Presolver {
    /// `bool2int(b, x)`: a fixed side lowers to `int_eq`, two free
    /// variables merge into one.
    pub(crate) fn presolve_bool2int(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let args = &model.constraint(ct).args;
        if model.arg_has_one_value(&args[0]) || model.arg_has_one_value(&args[1]) {
            log.push_str("simplify bool2int with a fixed side");
            model.constraint_mut(ct).tag = "int_eq".to_string();
        } else {
            let from = model.constraint(ct).args[1].var();
            let to = model.constraint(ct).args[0].var();
            model.mark_inactive(ct);
            self.add_variable_substitution(model, from, to);
        }
        true
    }

    /// Partition the variables of a boolean array into a fixed-value
    /// flag and the unbound rest.
    ///
    /// The flag is `true` when some variable is fixed to `fixed`.
    fn split_bound_values(
        model: &Model,
        vars: &[VarId],
        fixed: Int,
    ) -> (bool, Vec<VarId>) {
        let mut has_fixed = false;
        let mut unbound = Vec::new();
        for var in vars {
            let domain = &model.variable(*var).domain;
            if domain.has_one_value() {
                has_fixed |= domain.min() == fixed;
            } else {
                unbound.push(*var);
            }
        }
        (has_fixed, unbound)
    }

    /// Simplify and reduce `array_bool_or`.
    pub(crate) fn presolve_array_bool_or(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        if model.constraint(ct).args[0].variables().len() == 1 {
            let var = model.constraint(ct).args[0].variables()[0];
            let constraint = model.constraint_mut(ct);
            constraint.tag = "bool_eq".to_string();
            constraint.args[0] = Argument::VarRef(var);
            return true;
        }
        let constraint = model.constraint(ct);
        if !constraint.presolve_propagation_done
            && model.arg_has_one_value(&constraint.args[1])
            && model.arg_value(&constraint.args[1]) == 0
        {
            // The disjunction is false: force every member to 0.
            let vars = constraint.args[0].variables().to_vec();
            if vars
                .iter()
                .any(|v| !model.variable(*v).domain.contains(0))
            {
                return false;
            }
            log.push_str("propagate constants");
            for var in vars {
                model
                    .variable_mut(var)
                    .domain
                    .intersect_with_interval(0, 0);
            }
            model.mark_inactive(ct);
            return true;
        }
        let vars = model.constraint(ct).args[0].variables().to_vec();
        let (has_bound_true, unbound) = Self::split_bound_values(model, &vars, 1);
        if has_bound_true {
            let target = &model.constraint(ct).args[1];
            if !model.arg_has_one_value(target) {
                log.push_str("propagate target variable to true");
                let target = target.var();
                model
                    .variable_mut(target)
                    .domain
                    .intersect_with_interval(1, 1);
                model.mark_inactive(ct);
                return true;
            } else if model.arg_value(target) == 1 {
                model.mark_inactive(ct);
                return true;
            }
            return false;
        }
        if unbound.is_empty() {
            // Every member is fixed to false.
            let target = &model.constraint(ct).args[1];
            if !model.arg_has_one_value(target) {
                log.push_str("propagate target variable to false");
                let target = target.var();
                model
                    .variable_mut(target)
                    .domain
                    .intersect_with_interval(0, 0);
                model.mark_inactive(ct);
                return true;
            }
            return false;
        }
        if unbound.len() < vars.len() {
            log.push_str("reduce array");
            model.constraint_mut(ct).args[0] = Argument::VarRefArray(unbound);
            return true;
        }
        false
    }

    /// Simplify and reduce `array_bool_and`.
    pub(crate) fn presolve_array_bool_and(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        if model.constraint(ct).args[0].variables().len() == 1 {
            let var = model.constraint(ct).args[0].variables()[0];
            let constraint = model.constraint_mut(ct);
            constraint.tag = "bool_eq".to_string();
            constraint.args[0] = Argument::VarRef(var);
            return true;
        }
        let constraint = model.constraint(ct);
        if !constraint.presolve_propagation_done
            && model.arg_has_one_value(&constraint.args[1])
            && model.arg_value(&constraint.args[1]) == 1
        {
            // The conjunction holds: force every member to 1.
            let vars = constraint.args[0].variables().to_vec();
            if vars
                .iter()
                .any(|v| !model.variable(*v).domain.contains(1))
            {
                return false;
            }
            log.push_str("propagate constants");
            for var in vars {
                model
                    .variable_mut(var)
                    .domain
                    .intersect_with_interval(1, 1);
            }
            model.constraint_mut(ct).presolve_propagation_done = true;
            model.mark_inactive(ct);
            return true;
        }
        let vars = model.constraint(ct).args[0].variables().to_vec();
        let (has_bound_false, unbound) = Self::split_bound_values(model, &vars, 0);
        if has_bound_false {
            let target = &model.constraint(ct).args[1];
            if !model.arg_has_one_value(target) {
                log.push_str("propagate target variable to false");
                let target = target.var();
                model
                    .variable_mut(target)
                    .domain
                    .intersect_with_interval(0, 0);
                model.mark_inactive(ct);
                return true;
            } else if model.arg_value(target) == 0 {
                model.mark_inactive(ct);
                return true;
            }
            return false;
        }
        if unbound.is_empty() {
            let target = &model.constraint(ct).args[1];
            if !model.arg_has_one_value(target) {
                log.push_str("propagate target variable to true");
                let target = target.var();
                model
                    .variable_mut(target)
                    .domain
                    .intersect_with_interval(1, 1);
                model.mark_inactive(ct);
                return true;
            }
            return false;
        }
        if unbound.len() < vars.len() {
            log.push_str("reduce array");
            model.constraint_mut(ct).args[0] = Argument::VarRefArray(unbound);
            return true;
        }
        false
    }

    /// `bool_eq_reif` / `bool_ne_reif` with a fixed operand: lower to
    /// `bool_eq` or `bool_not`.
    pub(crate) fn presolve_bool_eq_ne_reif(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        debug_assert!(matches!(
            model.constraint(ct).tag.as_str(),
            "bool_eq_reif" | "bool_ne_reif"
        ));
        for index in [1, 0] {
            let args = &model.constraint(ct).args;
            if model.arg_has_one_value(&args[index]) {
                log.push_str("simplify constraint");
                let value = model.arg_value(&args[index]);
                let constraint = model.constraint_mut(ct);
                let is_eq = constraint.tag == "bool_eq_reif";
                constraint.remove_arg(index);
                constraint.tag = if (is_eq && value == 1) || (!is_eq && value == 0)
                {
                    "bool_eq"
                } else {
                    "bool_not"
                }
                .to_string();
                return true;
            }
        }
        false
    }

    /// `bool_xor` with a fixed operand: lower to `bool_not` or
    /// `bool_eq`.
    pub(crate) fn presolve_bool_xor(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        for index in [0, 1, 2] {
            let args = &model.constraint(ct).args;
            if model.arg_has_one_value(&args[index]) {
                log.push_str("simplify constraint");
                let value = model.arg_value(&args[index]);
                let constraint = model.constraint_mut(ct);
                constraint.remove_arg(index);
                constraint.tag =
                    if value == 1 { "bool_not" } else { "bool_eq" }.to_string();
                return true;
            }
        }
        false
    }

    /// `bool_not` with a fixed side assigns the negation to the other
    /// side; with two free sides it acquires a target variable.
    pub(crate) fn presolve_bool_not(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let args = &model.constraint(ct).args;
        if model.arg_has_one_value(&args[0]) && args[1].is_variable() {
            let value = as_int(model.arg_value(&args[0]) == 0);
            let var = args[1].var();
            log.push_str("propagate constants");
            model
                .variable_mut(var)
                .domain
                .intersect_with_interval(value, value);
            model.mark_inactive(ct);
            return true;
        }
        if model.arg_has_one_value(&args[1]) && args[0].is_variable() {
            let value = as_int(model.arg_value(&args[1]) == 0);
            let var = args[0].var();
            log.push_str("propagate constants");
            model
                .variable_mut(var)
                .domain
                .intersect_with_interval(value, value);
            model.mark_inactive(ct);
            return true;
        }
        if model.constraint(ct).target_variable.is_some() {
            return false;
        }
        for index in [0, 1] {
            let args = &model.constraint(ct).args;
            if !args[index].is_variable() {
                continue;
            }
            let var = args[index].var();
            if model.variable(var).defining_constraint.is_none()
                && !model.variable(var).domain.has_one_value()
            {
                log.push_str("set target variable");
                model.set_target_variable(ct, var);
                return true;
            }
        }
        false
    }

    /// Simplify `bool_clause(pos, neg)` when one side is degenerate.
    pub(crate) fn presolve_bool_clause(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let args = &model.constraint(ct).args;
        // Single positive and single negative literal.
        if args[0].variables().len() == 1 && args[1].variables().len() == 1 {
            log.push_str("simplify constraint");
            let pos = args[0].variables()[0];
            let neg = args[1].variables()[0];
            let constraint = model.constraint_mut(ct);
            constraint.args[0] = Argument::VarRef(neg);
            constraint.args[1] = Argument::VarRef(pos);
            constraint.tag = "bool_le".to_string();
            return true;
        }
        // Constant positive side, single negative literal.
        if args[0].variables().is_empty()
            && args[0].values().len() == 1
            && args[1].variables().len() == 1
        {
            log.push_str("simplify constraint");
            let value = args[0].values()[0];
            if value != 0 {
                model.mark_inactive(ct);
            } else {
                let neg = args[1].variables()[0];
                let constraint = model.constraint_mut(ct);
                constraint.args[0] = Argument::VarRef(neg);
                constraint.args[1] = Argument::IntValue(0);
                constraint.tag = "bool_eq".to_string();
            }
            return true;
        }
        // Constant negative side.
        if args[1].variables().is_empty() && args[1].values().len() == 1 {
            log.push_str("simplify constraint");
            let value = args[1].values()[0];
            if value != 0 {
                if args[0].variables().len() > 1 {
                    model.constraint_mut(ct).tag = "array_bool_or".to_string();
                    return true;
                } else if args[0].variables().len() == 1 {
                    let var = args[0].variables()[0];
                    let constraint = model.constraint_mut(ct);
                    constraint.args[0] = Argument::VarRef(var);
                    constraint.args[1] = Argument::IntValue(1);
                    constraint.tag = "bool_eq".to_string();
                    return true;
                }
            } else {
                model.mark_inactive(ct);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fzn::constraint::Constraint;
    use crate::fzn::domain::Domain;

    fn bool_vars(model: &mut Model, n: usize) -> Vec<VarId> {
        (0..n)
            .map(|i| model.new_var(format!("b{i}"), Domain::boolean(), false))
            .collect()
    }

    #[test]
    fn bool2int_merges_free_variables() {
        let mut model = Model::new();
        let b = model.new_var("b", Domain::boolean(), false);
        let x = model.new_var("x", Domain::interval(0, 1), false);
        let ct = model.add_constraint(Constraint::new(
            "bool2int",
            vec![Argument::VarRef(b), Argument::VarRef(x)],
        ));
        let mut p = Presolver::new();
        let mut log = String::new();
        assert!(p.presolve_bool2int(&mut model, ct, &mut log));
        assert!(!model.constraint(ct).active);
        assert_eq!(p.find_representative(x), p.find_representative(b));
    }

    #[test]
    fn bool2int_with_fixed_side_becomes_int_eq() {
        let mut model = Model::new();
        let b = model.new_var("b", Domain::boolean(), false);
        let ct = model.add_constraint(Constraint::new(
            "bool2int",
            vec![Argument::VarRef(b), Argument::IntValue(1)],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_bool2int(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "int_eq");
    }

    #[test]
    fn array_bool_or_with_fixed_true_member() {
        let mut model = Model::new();
        let vars = bool_vars(&mut model, 3);
        let target = model.new_var("t", Domain::boolean(), false);
        model.variable_mut(vars[1]).domain = Domain::singleton(1);
        let ct = model.add_constraint(Constraint::new(
            "array_bool_or",
            vec![
                Argument::VarRefArray(vars.clone()),
                Argument::VarRef(target),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_array_bool_or(&mut model, ct, &mut log));
        assert!(!model.constraint(ct).active);
        assert_eq!(model.variable(target).domain, Domain::singleton(1));
    }

    #[test]
    fn array_bool_or_false_target_forces_members() {
        let mut model = Model::new();
        let vars = bool_vars(&mut model, 3);
        let ct = model.add_constraint(Constraint::new(
            "array_bool_or",
            vec![Argument::VarRefArray(vars.clone()), Argument::IntValue(0)],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_array_bool_or(&mut model, ct, &mut log));
        assert!(!model.constraint(ct).active);
        for var in vars {
            assert_eq!(model.variable(var).domain, Domain::interval(0, 0));
        }
    }

    #[test]
    fn array_bool_or_prunes_false_members() {
        let mut model = Model::new();
        let vars = bool_vars(&mut model, 3);
        let target = model.new_var("t", Domain::boolean(), false);
        model.variable_mut(vars[0]).domain = Domain::singleton(0);
        let ct = model.add_constraint(Constraint::new(
            "array_bool_or",
            vec![
                Argument::VarRefArray(vars.clone()),
                Argument::VarRef(target),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_array_bool_or(&mut model, ct, &mut log));
        assert!(model.constraint(ct).active);
        assert_eq!(
            model.constraint(ct).args[0],
            Argument::VarRefArray(vec![vars[1], vars[2]])
        );
    }

    #[test]
    fn array_bool_and_true_target_forces_members() {
        let mut model = Model::new();
        let vars = bool_vars(&mut model, 2);
        let ct = model.add_constraint(Constraint::new(
            "array_bool_and",
            vec![Argument::VarRefArray(vars.clone()), Argument::IntValue(1)],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_array_bool_and(&mut model, ct, &mut log));
        assert!(!model.constraint(ct).active);
        for var in vars {
            assert_eq!(model.variable(var).domain, Domain::interval(1, 1));
        }
    }

    #[test]
    fn singleton_array_becomes_bool_eq() {
        let mut model = Model::new();
        let vars = bool_vars(&mut model, 1);
        let target = model.new_var("t", Domain::boolean(), false);
        let ct = model.add_constraint(Constraint::new(
            "array_bool_and",
            vec![
                Argument::VarRefArray(vars.clone()),
                Argument::VarRef(target),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_array_bool_and(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "bool_eq");
        assert_eq!(model.constraint(ct).args[0], Argument::VarRef(vars[0]));
    }

    #[test]
    fn bool_eq_reif_with_fixed_middle() {
        let mut model = Model::new();
        let vars = bool_vars(&mut model, 2);
        let ct = model.add_constraint(Constraint::new(
            "bool_eq_reif",
            vec![
                Argument::VarRef(vars[0]),
                Argument::IntValue(0),
                Argument::VarRef(vars[1]),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_bool_eq_ne_reif(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "bool_not");
        assert_eq!(model.constraint(ct).args.len(), 2);
    }

    #[test]
    fn bool_xor_with_fixed_operand() {
        let mut model = Model::new();
        let vars = bool_vars(&mut model, 2);
        let ct = model.add_constraint(Constraint::new(
            "bool_xor",
            vec![
                Argument::VarRef(vars[0]),
                Argument::IntValue(1),
                Argument::VarRef(vars[1]),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_bool_xor(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "bool_not");
    }

    #[test]
    fn bool_not_propagates_fixed_side() {
        let mut model = Model::new();
        let b = model.new_var("b", Domain::boolean(), false);
        let ct = model.add_constraint(Constraint::new(
            "bool_not",
            vec![Argument::IntValue(1), Argument::VarRef(b)],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_bool_not(&mut model, ct, &mut log));
        assert!(!model.constraint(ct).active);
        assert_eq!(model.variable(b).domain, Domain::interval(0, 0));
    }

    #[test]
    fn bool_not_acquires_target() {
        let mut model = Model::new();
        let vars = bool_vars(&mut model, 2);
        let ct = model.add_constraint(Constraint::new(
            "bool_not",
            vec![Argument::VarRef(vars[0]), Argument::VarRef(vars[1])],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_bool_not(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).target_variable, Some(vars[0]));
        assert_eq!(model.variable(vars[0]).defining_constraint, Some(ct));
    }

    #[test]
    fn bool_clause_pair_becomes_bool_le() {
        let mut model = Model::new();
        let vars = bool_vars(&mut model, 2);
        let ct = model.add_constraint(Constraint::new(
            "bool_clause",
            vec![
                Argument::VarRefArray(vec![vars[0]]),
                Argument::VarRefArray(vec![vars[1]]),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_bool_clause(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "bool_le");
        assert_eq!(
            model.constraint(ct).args,
            vec![Argument::VarRef(vars[1]), Argument::VarRef(vars[0])]
        );
    }

    #[test]
    fn bool_clause_with_true_negative_side() {
        let mut model = Model::new();
        let vars = bool_vars(&mut model, 3);
        let ct = model.add_constraint(Constraint::new(
            "bool_clause",
            vec![
                Argument::VarRefArray(vars.clone()),
                Argument::IntList(vec![1]),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_bool_clause(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "array_bool_or");
    }
}
