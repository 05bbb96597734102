//! Equality, inequality and reified comparison rules.

use crate::fzn::argument::Argument;
use crate::fzn::constraint::CtId;
use crate::fzn::model::Model;
use crate::fzn::types::as_int;
use crate::fzn::types::INT_MAX;
use crate::fzn::types::INT_MIN;
use crate::presolve::rules::has_01_values;
use crate::presolve::rules::intersect_var_domain_with_arg;
use crate::presolve::rules::is_0_or_1;
use crate::presolve::Presolver;

/// Invert a two-letter comparison operator.
fn inverse_op(op: &str) -> &'static str {
    match op {
        "eq" => "ne",
        "ne" => "eq",
        "le" => "gt",
        "lt" => "ge",
        "ge" => "lt",
        "gt" => "le",
        _ => panic!("unknown comparison operator '{op}'"),
    }
}

impl Presolver {
    /// `R_reif(args.., t)` with the boolean fixed: drop the suffix and
    /// the boolean; keep the relation when true, invert it when false.
    pub(crate) fn unreify(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let last = model.constraint(ct).args.len() - 1;
        if !model.arg_has_one_value(&model.constraint(ct).args[last]) {
            return false;
        }
        debug_assert!(model.constraint(ct).is_reified());
        let value = model.arg_value(&model.constraint(ct).args[last]);
        model.remove_target_variable(ct);
        let constraint = model.constraint_mut(ct);
        let len = constraint.tag.len();
        constraint.tag.truncate(len - "_reif".len());
        constraint.args.pop();
        if value == 1 {
            log.push_str("unreify constraint");
        } else if constraint.tag == "set_in" {
            log.push_str("unreify and reverse constraint");
            constraint.tag = "set_not_in".to_string();
        } else if constraint.tag == "set_not_in" {
            log.push_str("unreify and reverse constraint");
            constraint.tag = "set_in".to_string();
        } else {
            log.push_str("unreify and reverse constraint");
            // The tag ends with the two-letter operation; its prefix
            // (`int_`, `bool_`, `int_lin_`) is unchanged.
            debug_assert!(constraint.tag.len() > 3);
            let split = constraint.tag.len() - 2;
            let op = inverse_op(&constraint.tag[split..]);
            constraint.tag.truncate(split);
            constraint.tag.push_str(op);
        }
        true
    }

    /// Equality on `int_eq` / `bool_eq`.
    ///
    /// A constant side fixes the other side's domain; two variables
    /// become a substitution; `int_eq(x, 0)` on a known difference
    /// `x = y - z` turns into `int_eq(y, z)`.
    pub(crate) fn presolve_int_eq(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let args = &model.constraint(ct).args;
        if args[0].is_variable()
            && args[1] == Argument::IntValue(0)
            && self.difference_map.contains_key(&args[0].var())
        {
            let var = args[0].var();
            log.push_str("propagate equality");
            model
                .variable_mut(var)
                .domain
                .intersect_with_interval(0, 0);
            log.push_str(", transform null difference");
            let (a, b) = self.difference_map[&var];
            let constraint = model.constraint_mut(ct);
            constraint.args[0] = Argument::VarRef(a);
            constraint.args[1] = Argument::VarRef(b);
            return true;
        }
        if model.constraint(ct).args[0].is_variable() {
            let var = model.constraint(ct).args[0].var();
            if model.arg_has_one_value(&model.constraint(ct).args[1]) {
                let value = model.arg_value(&model.constraint(ct).args[1]);
                log.push_str("propagate equality");
                model
                    .variable_mut(var)
                    .domain
                    .intersect_with_interval(value, value);
                model.mark_inactive(ct);
                return true;
            } else if model.constraint(ct).args[1].is_variable() {
                let other = model.constraint(ct).args[1].var();
                model.mark_inactive(ct);
                self.add_variable_substitution(model, var, other);
                return true;
            }
        } else if model.arg_has_one_value(&model.constraint(ct).args[0]) {
            let value = model.arg_value(&model.constraint(ct).args[0]);
            if model.constraint(ct).args[1].is_variable() {
                let var = model.constraint(ct).args[1].var();
                log.push_str("propagate equality");
                model
                    .variable_mut(var)
                    .domain
                    .intersect_with_interval(value, value);
                model.mark_inactive(ct);
                return true;
            } else if model.arg_has_one_value(&model.constraint(ct).args[1])
                && value == model.arg_value(&model.constraint(ct).args[1])
            {
                model.mark_inactive(ct);
                return false;
            }
        }
        false
    }

    /// `int_ne(x, c)` / `bool_not(x, c)`: remove the constant from the
    /// domain and deactivate when the removal succeeds.
    pub(crate) fn presolve_int_ne(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        if model.constraint(ct).presolve_propagation_done {
            return false;
        }
        let mut removed = false;
        for (var_index, value_index) in [(0, 1), (1, 0)] {
            let args = &model.constraint(ct).args;
            if args[var_index].is_variable()
                && model.arg_has_one_value(&args[value_index])
            {
                let var = args[var_index].var();
                let value = model.arg_value(&args[value_index]);
                if !model.variable(var).domain.contains(value)
                    || model.variable_mut(var).domain.remove_value(value)
                {
                    removed = true;
                    break;
                }
            }
        }
        if removed {
            log.push_str("remove value from variable domain");
            model.mark_inactive(ct);
            return true;
        }
        false
    }

    /// Bound propagation on `int_le/lt/ge/gt` and their `bool_`
    /// counterparts.
    pub(crate) fn presolve_inequalities(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let tag = model.constraint(ct).tag.clone();
        let op = &tag[tag.len() - 2..];
        let args = &model.constraint(ct).args;
        if !args[0].is_variable() && !args[1].is_variable() {
            // Both sides constant.
            let left = model.arg_value(&args[0]);
            let right = model.arg_value(&args[1]);
            let holds = match op {
                "le" => left <= right,
                "lt" => left < right,
                "ge" => left >= right,
                "gt" => left > right,
                _ => unreachable!(),
            };
            if holds {
                log.push_str("propagate bounds");
                model.mark_inactive(ct);
            } else {
                model.set_as_false(ct);
            }
            return true;
        }

        if args[0].is_variable() && model.arg_has_one_value(&args[1]) {
            // var OP constant
            let var = args[0].var();
            let value = model.arg_value(&args[1]);
            let domain = &mut model.variable_mut(var).domain;
            match op {
                "le" => domain.intersect_with_interval(INT_MIN, value),
                "lt" => domain.intersect_with_interval(INT_MIN, value - 1),
                "ge" => domain.intersect_with_interval(value, INT_MAX),
                "gt" => domain.intersect_with_interval(value + 1, INT_MAX),
                _ => unreachable!(),
            };
            model.mark_inactive(ct);
            return true;
        } else if model.arg_has_one_value(&args[0]) && args[1].is_variable() {
            // constant OP var
            let var = args[1].var();
            let value = model.arg_value(&args[0]);
            let domain = &mut model.variable_mut(var).domain;
            match op {
                "le" => domain.intersect_with_interval(value, INT_MAX),
                "lt" => domain.intersect_with_interval(value + 1, INT_MAX),
                "ge" => domain.intersect_with_interval(INT_MIN, value),
                "gt" => domain.intersect_with_interval(INT_MIN, value - 1),
                _ => unreachable!(),
            };
            model.mark_inactive(ct);
            return true;
        }

        // Two unfixed variables: cross-tighten both bounds but keep
        // the constraint for the solver.
        let left = model.constraint(ct).args[0].var();
        let right = model.constraint(ct).args[1].var();
        let left_min = model.variable(left).domain.min();
        let left_max = model.variable(left).domain.max();
        let right_min = model.variable(right).domain.min();
        let right_max = model.variable(right).domain.max();
        let modified = match op {
            "le" => {
                model
                    .variable_mut(left)
                    .domain
                    .intersect_with_interval(INT_MIN, right_max);
                model
                    .variable_mut(right)
                    .domain
                    .intersect_with_interval(left_min, INT_MAX);
                left_max > right_max || right_min < left_min
            }
            "lt" => {
                model
                    .variable_mut(left)
                    .domain
                    .intersect_with_interval(INT_MIN, right_max - 1);
                model
                    .variable_mut(right)
                    .domain
                    .intersect_with_interval(left_min + 1, INT_MAX);
                left_max >= right_max || right_min <= left_min
            }
            "ge" => {
                model
                    .variable_mut(left)
                    .domain
                    .intersect_with_interval(right_min, INT_MAX);
                model
                    .variable_mut(right)
                    .domain
                    .intersect_with_interval(INT_MIN, left_max);
                right_max > left_max || left_min < right_min
            }
            "gt" => {
                model
                    .variable_mut(left)
                    .domain
                    .intersect_with_interval(right_min + 1, INT_MAX);
                model
                    .variable_mut(right)
                    .domain
                    .intersect_with_interval(INT_MIN, left_max - 1);
                right_max >= left_max || left_min <= right_min
            }
            _ => unreachable!(),
        };
        if modified {
            log.push_str("propagate bounds");
        }
        modified
    }

    /// `set_in(x, S)`: intersect the domain of `x` with the set.
    pub(crate) fn presolve_set_in(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        if model.constraint(ct).args[0].is_variable() {
            log.push_str("propagate set on variable domain");
            let var = model.constraint(ct).args[0].var();
            let set = model.constraint(ct).args[1].clone();
            intersect_var_domain_with_arg(model, var, &set);
            model.mark_inactive(ct);
            return true;
        }
        false
    }

    /// Decide the boolean of a reified comparison when the relation
    /// is already settled by the domains.
    pub(crate) fn propagate_reified_comparisons(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let tag = model.constraint(ct).tag.clone();
        let args = &model.constraint(ct).args;
        if args[0].is_variable()
            && args[1].is_variable()
            && args[0].var() == args[1].var()
        {
            // x OP x is settled by the identity of the relation.
            let holds = matches!(
                tag.as_str(),
                "int_eq_reif"
                    | "int_ge_reif"
                    | "int_le_reif"
                    | "bool_eq_reif"
                    | "bool_ge_reif"
                    | "bool_le_reif"
            );
            let value = as_int(holds);
            let boolarg = &model.constraint(ct).args[2];
            if !model.arg_has_one_value(boolarg)
                || model.arg_value(boolarg) == value
            {
                log.push_str("propagate boolvar to value");
                let boolvar = model.constraint(ct).args[2].var();
                model
                    .variable_mut(boolvar)
                    .domain
                    .intersect_with_interval(value, value);
                model.mark_inactive(ct);
                return true;
            }
        }

        let args = &model.constraint(ct).args;
        let (var, value, reverse) = if args[0].is_variable()
            && model.arg_has_one_value(&args[1])
        {
            (args[0].var(), model.arg_value(&args[1]), false)
        } else if args[1].is_variable() && model.arg_has_one_value(&args[0]) {
            (args[1].var(), model.arg_value(&args[0]), true)
        } else {
            return false;
        };

        let eq_ne = matches!(
            tag.as_str(),
            "int_eq_reif" | "int_ne_reif" | "bool_eq_reif" | "bool_ne_reif"
        );
        if has_01_values(model, var) && eq_ne && is_0_or_1(value) {
            // Comparison of two booleans: lower to bool_eq/bool_not.
            let mut parity = matches!(tag.as_str(), "int_eq_reif" | "bool_eq_reif");
            if value == 0 {
                parity = !parity;
            }
            log.push_str("simplify constraint");
            let target = model.constraint(ct).args[2].clone();
            let constraint = model.constraint_mut(ct);
            constraint.args = vec![Argument::VarRef(var), target];
            constraint.tag =
                if parity { "bool_eq" } else { "bool_not" }.to_string();
            return true;
        }

        let domain = &model.variable(var).domain;
        // None when the relation is still open.
        let state: Option<bool> = match tag.as_str() {
            "int_eq_reif" | "bool_eq_reif" => {
                if domain.contains(value) {
                    domain.has_one_value().then_some(true)
                } else {
                    Some(false)
                }
            }
            "int_ne_reif" | "bool_ne_reif" => {
                if domain.contains(value) {
                    domain.has_one_value().then_some(false)
                } else {
                    Some(true)
                }
            }
            _ if domain.is_all_ints() => None,
            "int_lt_reif" | "bool_lt_reif" | "int_gt_reif" | "bool_gt_reif" => {
                let is_gt = matches!(tag.as_str(), "int_gt_reif" | "bool_gt_reif")
                    != reverse;
                if is_gt {
                    // var > value
                    if domain.min() > value {
                        Some(true)
                    } else if domain.max() <= value {
                        Some(false)
                    } else {
                        None
                    }
                } else if domain.max() < value {
                    Some(true)
                } else if domain.min() >= value {
                    Some(false)
                } else {
                    None
                }
            }
            "int_le_reif" | "bool_le_reif" | "int_ge_reif" | "bool_ge_reif" => {
                let is_ge = matches!(tag.as_str(), "int_ge_reif" | "bool_ge_reif")
                    != reverse;
                if is_ge {
                    // var >= value
                    if domain.min() >= value {
                        Some(true)
                    } else if domain.max() < value {
                        Some(false)
                    } else {
                        None
                    }
                } else if domain.max() <= value {
                    Some(true)
                } else if domain.min() > value {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        };
        if let Some(state) = state {
            log.push_str(if state {
                "assign boolvar to true"
            } else {
                "assign boolvar to false"
            });
            let boolvar = model.constraint(ct).args[2].var();
            let value = as_int(state);
            model
                .variable_mut(boolvar)
                .domain
                .intersect_with_interval(value, value);
            model.mark_inactive(ct);
            return true;
        }
        false
    }

    /// Memoize `int_eq_reif(x, y, b)` over variable pairs.
    pub(crate) fn store_int_eq_reif(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let args = &model.constraint(ct).args;
        if args[0].is_variable() && args[1].is_variable() && args[2].is_variable()
        {
            let first = args[0].var();
            let second = args[1].var();
            if self.int_eq_reif_map.contains_key(&(first, second)) {
                return false;
            }
            log.push_str("store eq_var info");
            let boolvar = args[2].var();
            self.int_eq_reif_map.insert((first, second), boolvar);
            self.int_eq_reif_map.insert((second, first), boolvar);
            return true;
        }
        false
    }

    /// `int_ne_reif(x, y, b')` with a memoized `int_eq_reif(x, y, b)`:
    /// rewrite as `bool_not(b, b')`.
    pub(crate) fn simplify_int_ne_reif(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let args = &model.constraint(ct).args;
        if args[0].is_variable() && args[1].is_variable() && args[2].is_variable()
        {
            let key = (args[0].var(), args[1].var());
            if let Some(&opposite) = self.int_eq_reif_map.get(&key) {
                log.push_str("merge constraint with opposite constraint");
                let boolvar = args[2].var();
                let constraint = model.constraint_mut(ct);
                constraint.args =
                    vec![Argument::VarRef(opposite), Argument::VarRef(boolvar)];
                constraint.tag = "bool_not".to_string();
                return true;
            }
        }
        false
    }

    /// `int_le_reif(x, c, b)` with `x = |y|`: compare `y` instead,
    /// as an equality for `c == 0` and a set membership otherwise.
    pub(crate) fn remove_abs_from_int_le_reif(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let args = &model.constraint(ct).args;
        if !args[0].is_variable() || !model.arg_has_one_value(&args[1]) {
            return false;
        }
        let Some(&without_abs) = self.abs_map.get(&args[0].var()) else {
            return false;
        };
        log.push_str("remove abs from constraint");
        let value = model.arg_value(&model.constraint(ct).args[1]);
        let constraint = model.constraint_mut(ct);
        constraint.args[0] = Argument::VarRef(without_abs);
        if value == 0 {
            constraint.tag = "int_eq_reif".to_string();
        } else {
            constraint.tag = "set_in_reif".to_string();
            constraint.args[1] = Argument::IntInterval(-value, value);
            // set_in_reif does not implement reification.
            model.remove_target_variable(ct);
        }
        true
    }
}
