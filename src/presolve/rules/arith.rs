//! Arithmetic constraint rules.

use log::debug;

use crate::fzn::argument::Argument;
use crate::fzn::constraint::CtId;
use crate::fzn::model::Model;
use crate::presolve::Presolver;

impl Presolver {
    /// `int_times(c1, c2, x)`: fix `x` to the product when it fits.
    ///
    /// On overflow or when the product misses the domain of `x`, the
    /// rule yields and leaves the constraint to the solver.
    pub(crate) fn presolve_int_times(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let args = &model.constraint(ct).args;
        if model.arg_has_one_value(&args[0])
            && model.arg_has_one_value(&args[1])
            && args[2].is_variable()
            && !model.constraint(ct).presolve_propagation_done
        {
            log.push_str("propagate constants");
            let left = model.arg_value(&model.constraint(ct).args[0]);
            let right = model.arg_value(&model.constraint(ct).args[1]);
            let Some(value) = left.checked_mul(right) else {
                log.push_str(", product overflows, ignoring presolve");
                return false;
            };
            model.constraint_mut(ct).presolve_propagation_done = true;
            let var = model.constraint(ct).args[2].var();
            if model.variable(var).domain.contains(value) {
                model
                    .variable_mut(var)
                    .domain
                    .intersect_with_interval(value, value);
                model.mark_inactive(ct);
                return true;
            }
            log.push_str(
                ", product is not compatible with variable domain, \
                 ignoring presolve",
            );
        }
        false
    }

    /// `int_div(c1, c2, x)` with `c2 != 0`: fix `x` to the quotient
    /// when it is in the domain of `x`.
    pub(crate) fn presolve_int_div(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let args = &model.constraint(ct).args;
        if model.arg_has_one_value(&args[0])
            && model.arg_has_one_value(&args[1])
            && args[2].is_variable()
            && !model.constraint(ct).presolve_propagation_done
            && model.arg_value(&args[1]) != 0
        {
            log.push_str("propagate constants");
            let value = model.arg_value(&model.constraint(ct).args[0])
                / model.arg_value(&model.constraint(ct).args[1]);
            model.constraint_mut(ct).presolve_propagation_done = true;
            let var = model.constraint(ct).args[2].var();
            if model.variable(var).domain.contains(value) {
                model
                    .variable_mut(var)
                    .domain
                    .intersect_with_interval(value, value);
                model.mark_inactive(ct);
                return true;
            }
            log.push_str(
                ", quotient is not compatible with variable domain, \
                 ignoring presolve",
            );
        }
        false
    }

    /// `int_mod(x1, x2, x3) => x3` with `x3` fixed: the constraint no
    /// longer defines anything.
    pub(crate) fn presolve_int_mod(
        &mut self,
        model: &mut Model,
        ct: CtId,
        _log: &mut String,
    ) -> bool {
        let constraint = model.constraint(ct);
        if let Some(target) = constraint.target_variable {
            if constraint.args[2].is_variable()
                && constraint.args[2].var() == target
                && model.arg_has_one_value(&constraint.args[2])
            {
                model.remove_target_variable(ct);
                return true;
            }
        }
        false
    }

    /// Record `y = |x|` from an `int_abs(x, y)` constraint.
    pub(crate) fn store_abs(&mut self, model: &Model, ct: CtId) -> bool {
        let constraint = model.constraint(ct);
        if !constraint.active || constraint.tag != "int_abs" {
            return false;
        }
        if !constraint.args[0].is_variable() || !constraint.args[1].is_variable() {
            return false;
        }
        let result = constraint.args[1].var();
        if self.abs_map.contains_key(&result) {
            return false;
        }
        debug!("store abs map for {}", model.fzn_constraint(ct));
        self.abs_map.insert(result, constraint.args[0].var());
        true
    }

    /// `int_eq_reif/int_ne_reif/int_ne` against zero with a left side
    /// known as `|y|`: compare `y` with zero directly.
    pub(crate) fn remove_abs_from_eq_ne_zero(
        &mut self,
        model: &mut Model,
        ct: CtId,
    ) -> bool {
        let constraint = model.constraint(ct);
        if !constraint.active {
            return false;
        }
        if !matches!(
            constraint.tag.as_str(),
            "int_eq_reif" | "int_ne_reif" | "int_ne"
        ) {
            return false;
        }
        if !constraint.args[0].is_variable()
            || !model.arg_has_one_value(&constraint.args[1])
            || model.arg_value(&constraint.args[1]) != 0
        {
            return false;
        }
        let Some(&without_abs) = self.abs_map.get(&constraint.args[0].var()) else {
            return false;
        };
        debug!("remove abs() from {}", model.fzn_constraint(ct));
        model.constraint_mut(ct).args[0] = Argument::VarRef(without_abs);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fzn::constraint::Constraint;
    use crate::fzn::domain::Domain;

    #[test]
    fn constant_product_fixes_target() {
        let mut model = Model::new();
        let x = model.new_var("x", Domain::interval(0, 100), false);
        let ct = model.add_constraint(Constraint::new(
            "int_times",
            vec![
                Argument::IntValue(6),
                Argument::IntValue(7),
                Argument::VarRef(x),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_int_times(&mut model, ct, &mut log));
        assert!(!model.constraint(ct).active);
        assert_eq!(model.variable(x).domain, Domain::interval(42, 42));
    }

    #[test]
    fn incompatible_product_is_left_to_the_solver() {
        let mut model = Model::new();
        let x = model.new_var("x", Domain::interval(0, 10), false);
        let ct = model.add_constraint(Constraint::new(
            "int_times",
            vec![
                Argument::IntValue(6),
                Argument::IntValue(7),
                Argument::VarRef(x),
            ],
        ));
        let mut log = String::new();
        assert!(!Presolver::new().presolve_int_times(&mut model, ct, &mut log));
        assert!(model.constraint(ct).active);
        assert_eq!(model.variable(x).domain, Domain::interval(0, 10));
    }

    #[test]
    fn overflowing_product_yields() {
        let mut model = Model::new();
        let x = model.new_var("x", Domain::all_ints(), false);
        let ct = model.add_constraint(Constraint::new(
            "int_times",
            vec![
                Argument::IntValue(i64::MAX / 2),
                Argument::IntValue(4),
                Argument::VarRef(x),
            ],
        ));
        let mut log = String::new();
        assert!(!Presolver::new().presolve_int_times(&mut model, ct, &mut log));
        assert!(!model.constraint(ct).presolve_propagation_done);
    }

    #[test]
    fn constant_quotient_fixes_target() {
        let mut model = Model::new();
        let x = model.new_var("x", Domain::interval(0, 100), false);
        let ct = model.add_constraint(Constraint::new(
            "int_div",
            vec![
                Argument::IntValue(17),
                Argument::IntValue(5),
                Argument::VarRef(x),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().presolve_int_div(&mut model, ct, &mut log));
        assert!(!model.constraint(ct).active);
        assert_eq!(model.variable(x).domain, Domain::interval(3, 3));
    }

    #[test]
    fn int_mod_sheds_fixed_target() {
        let mut model = Model::new();
        let a = model.new_var("a", Domain::interval(0, 9), false);
        let b = model.new_var("b", Domain::interval(1, 9), false);
        let m = model.new_var("m", Domain::interval(0, 8), false);
        let ct = model.add_constraint(Constraint::new(
            "int_mod",
            vec![
                Argument::VarRef(a),
                Argument::VarRef(b),
                Argument::VarRef(m),
            ],
        ));
        model.set_target_variable(ct, m);
        model.variable_mut(m).domain = Domain::singleton(2);
        let mut log = String::new();
        assert!(Presolver::new().presolve_int_mod(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).target_variable, None);
        assert_eq!(model.variable(m).defining_constraint, None);
    }

    #[test]
    fn abs_map_rewrites_eq_zero() {
        let mut model = Model::new();
        let y = model.new_var("y", Domain::interval(-5, 5), false);
        let abs_y = model.new_var("abs_y", Domain::interval(0, 5), false);
        let abs_ct = model.add_constraint(Constraint::new(
            "int_abs",
            vec![Argument::VarRef(y), Argument::VarRef(abs_y)],
        ));
        let ne = model.add_constraint(Constraint::new(
            "int_ne",
            vec![Argument::VarRef(abs_y), Argument::IntValue(0)],
        ));
        let mut p = Presolver::new();
        assert!(p.store_abs(&model, abs_ct));
        assert_eq!(p.abs_map[&abs_y], y);
        assert!(p.remove_abs_from_eq_ne_zero(&mut model, ne));
        assert_eq!(model.constraint(ne).args[0], Argument::VarRef(y));
    }
}
