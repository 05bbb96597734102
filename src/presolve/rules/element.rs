//! Element constraint rules.

use crate::fzn::argument::Argument;
use crate::fzn::constraint::CtId;
use crate::fzn::domain::Domain;
use crate::fzn::model::Model;
use crate::fzn::types::Int;
use crate::presolve::rules::intersect_var_domain_with_arg;
use crate::presolve::rules::is_increasing_contiguous;
use crate::presolve::Presolver;

impl Presolver {
    /// Structural rewrites of `array_int_element(i, values, y)`:
    /// affine and 2d index mappings, fixed index, array truncation
    /// and contiguous-value linearization.
    pub(crate) fn simplify_element(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        if model.constraint(ct).args[0].variables().len() > 1 {
            // Already rewritten into the 2d form.
            return false;
        }
        if !model.constraint(ct).args[0].is_variable() {
            return false;
        }
        let index_var = model.constraint(ct).args[0].var();

        if let Some(mapping) = self.affine_map.get(&index_var).copied() {
            let domain = model.variable(mapping.variable).domain.clone();
            if domain.is_all_ints() {
                // Unbounded mapping variable, nothing safe to do.
                return false;
            }
            let index_domain = model.variable(index_var).domain.clone();
            if domain.min() == 0
                && mapping.coefficient == 1
                && mapping.offset > 1
                && matches!(index_domain, Domain::Interval { .. })
            {
                // Pure shift: drop the leading unreachable entries.
                log.push_str("reduce constraint");
                let shift = mapping.offset - 1;
                let constraint = model.constraint_mut(ct);
                if let Argument::IntList(values) = &mut constraint.args[1] {
                    values.drain(..(shift as usize).min(values.len()));
                }
                model.constraint_mut(mapping.constraint).args[2] =
                    Argument::IntValue(-1);
                self.affine_map.get_mut(&index_var).unwrap().offset = 1;
                if let Domain::Interval { lo, hi } =
                    &mut model.variable_mut(index_var).domain
                {
                    *lo -= shift;
                    *hi -= shift;
                }
                return true;
            } else if mapping.offset + mapping.coefficient > 0 && domain.min() > 0
            {
                // Sample the array at the reachable positions and
                // retarget the element at the mapping variable.
                let values = model.constraint(ct).args[1].values().to_vec();
                let mut new_values = Vec::new();
                for i in 1..=domain.max() {
                    let index = i * mapping.coefficient + mapping.offset - 1;
                    if index < 0 {
                        return false;
                    }
                    if index >= values.len() as Int {
                        break;
                    }
                    new_values.push(values[index as usize]);
                }
                log.push_str("simplify constraint");
                let size = new_values.len() as Int;
                let constraint = model.constraint_mut(ct);
                constraint.args[0] = Argument::VarRef(mapping.variable);
                constraint.args[1] = if new_values.len() == 1 {
                    Argument::IntValue(new_values[0])
                } else {
                    Argument::IntList(new_values)
                };
                constraint.presolve_propagation_done = false;
                model
                    .variable_mut(mapping.variable)
                    .domain
                    .intersect_with_interval(1, size);
                model.mark_inactive(mapping.constraint);
                model.variable_mut(index_var).active = false;
                return true;
            }
        }

        if let Some(mapping) = self.array2d_index_map.get(&index_var).copied() {
            log.push_str("rewrite as a 2d element");
            let constraint = model.constraint_mut(ct);
            constraint.args[0] =
                Argument::VarRefArray(vec![mapping.variable1, mapping.variable2]);
            constraint
                .args
                .push(Argument::IntList(vec![mapping.coefficient, 1]));
            constraint.args.push(Argument::IntValue(mapping.offset));
            model.remove_target_variable(ct);
            model.variable_mut(index_var).active = false;
            model.mark_inactive(mapping.constraint);
            return true;
        }

        if model.variable(index_var).domain.has_one_value() {
            // Arrays are 1-based.
            let index = model.variable(index_var).domain.value() - 1;
            let values = model.constraint(ct).args[1].values();
            if index < 0 || index >= values.len() as Int {
                return false;
            }
            let value = values[index as usize];
            log.push_str("rewrite as an equality");
            let constraint = model.constraint_mut(ct);
            constraint.tag = "int_eq".to_string();
            constraint.args[0] = Argument::IntValue(value);
            constraint.remove_arg(1);
            return true;
        }

        let index_domain = model.variable(index_var).domain.clone();
        let size = model.constraint(ct).args[1].values().len() as Int;
        if matches!(index_domain, Domain::Interval { .. })
            && !index_domain.is_all_ints()
            && index_domain.max() >= 1
            && index_domain.max() < size
        {
            log.push_str("reduce array");
            let max = index_domain.max() as usize;
            let constraint = model.constraint_mut(ct);
            if let Argument::IntList(values) = &mut constraint.args[1] {
                values.truncate(max);
            }
            constraint.presolve_propagation_done = false;
            return true;
        }

        let values = model.constraint(ct).args[1].values();
        if !values.is_empty()
            && is_increasing_contiguous(values)
            && model.constraint(ct).args[2].is_variable()
        {
            // values[i] == start + i - 1, so y = i + start - 1.
            let start = values[0];
            let target = model.constraint(ct).args[2].var();
            log.push_str("linearize constraint");
            let constraint = model.constraint_mut(ct);
            if start == 1 {
                constraint.tag = "int_eq".to_string();
                constraint.remove_arg(1);
            } else {
                constraint.tag = "int_lin_eq".to_string();
                constraint.args[0] = Argument::IntList(vec![-1, 1]);
                constraint.args[1] = Argument::VarRefArray(vec![target, index_var]);
                constraint.args[2] = Argument::IntValue(1 - start);
            }
            return true;
        }
        false
    }

    /// Domain propagation of `array_int_element(i, values, y)`: trim
    /// unreachable borders of the array and intersect the target with
    /// the value set.
    pub(crate) fn presolve_array_int_element(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let args = &model.constraint(ct).args;
        if args[0].variables().len() == 1 && !model.arg_has_one_value(&args[0]) {
            let index_var = args[0].var();
            let (target_min, target_max) = if model.arg_has_one_value(&args[2]) {
                let value = model.arg_value(&args[2]);
                (value, value)
            } else {
                let domain = &model.variable(args[2].var()).domain;
                (domain.min(), domain.max())
            };
            let values = model.constraint(ct).args[1].values();
            let index_min = model.variable(index_var).domain.min();
            let index_max = model.variable(index_var).domain.max();

            let mut last_index = (values.len() as Int).min(index_max);
            while last_index >= 1 {
                let value = values[(last_index - 1) as usize];
                if value < target_min || value > target_max {
                    last_index -= 1;
                } else {
                    break;
                }
            }
            let mut first_index = index_min.max(1);
            while first_index <= last_index {
                let value = values[(first_index - 1) as usize];
                if value < target_min || value > target_max {
                    first_index += 1;
                } else {
                    break;
                }
            }
            if last_index < index_max || first_index > index_min {
                log.push_str(&format!(
                    "filter index to [{first_index}..{last_index}] and reduce array"
                ));
                model
                    .variable_mut(index_var)
                    .domain
                    .intersect_with_interval(first_index, last_index);
                let constraint = model.constraint_mut(ct);
                if let Argument::IntList(values) = &mut constraint.args[1] {
                    values.truncate(last_index.max(0) as usize);
                }
                return true;
            }
        }
        let constraint = model.constraint(ct);
        if constraint.args[2].is_variable() && !constraint.presolve_propagation_done
        {
            log.push_str("propagate domain");
            let target = constraint.args[2].var();
            // Only the positions reachable by the index can feed the
            // target.
            let reachable = if constraint.args[0].is_variable() {
                let values = constraint.args[1].values();
                let index = &model.variable(constraint.args[0].var()).domain;
                let first = index.min().max(1);
                let last = index.max().min(values.len() as Int);
                if first > last {
                    Argument::IntList(Vec::new())
                } else {
                    Argument::IntList(
                        values[(first - 1) as usize..last as usize].to_vec(),
                    )
                }
            } else {
                constraint.args[1].clone()
            };
            intersect_var_domain_with_arg(model, target, &reachable);
            model.constraint_mut(ct).presolve_propagation_done = true;
            return true;
        }
        false
    }

    /// Simplify `array_var_int_element(i, vars, y)`: downgrade to
    /// `array_int_element` when every member is fixed, resolve a
    /// fixed index, rewire affine index mappings, truncate.
    pub(crate) fn simplify_expr_element(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let variables = model.constraint(ct).args[1].variables().to_vec();
        if variables
            .iter()
            .all(|v| model.variable(*v).domain.has_one_value())
        {
            log.push_str("rewrite constraint as array_int_element");
            let values: Vec<Int> = variables
                .iter()
                .map(|v| model.variable(*v).domain.min())
                .collect();
            let constraint = model.constraint_mut(ct);
            constraint.tag = "array_int_element".to_string();
            constraint.args[1] = Argument::IntList(values);
            return true;
        }
        if !model.constraint(ct).args[0].is_variable() {
            return false;
        }
        let index_var = model.constraint(ct).args[0].var();
        if model.variable(index_var).domain.has_one_value() {
            let position = model.variable(index_var).domain.value() - 1;
            if position < 0 || position >= variables.len() as Int {
                return false;
            }
            log.push_str("simplify element as the index is fixed");
            let member = variables[position as usize];
            let constraint = model.constraint_mut(ct);
            constraint.tag = "int_eq".to_string();
            constraint.args[0] = Argument::VarRef(member);
            constraint.remove_arg(1);
            return true;
        }
        if let Some(mapping) = self.affine_map.get(&index_var).copied() {
            let domain = model.variable(mapping.variable).domain.clone();
            if domain.is_all_ints()
                || domain.min() != 1
                || mapping.offset + mapping.coefficient <= 0
            {
                return false;
            }
            let mut new_variables = Vec::new();
            for i in domain.min()..=domain.max() {
                let index = i * mapping.coefficient + mapping.offset - 1;
                if index < 0 {
                    return false;
                }
                if index >= variables.len() as Int {
                    break;
                }
                new_variables.push(variables[index as usize]);
            }
            log.push_str("simplify constraint");
            let constraint = model.constraint_mut(ct);
            constraint.args[0] = Argument::VarRef(mapping.variable);
            constraint.args[1] = Argument::VarRefArray(new_variables);
            constraint.presolve_propagation_done = false;
            model.mark_inactive(mapping.constraint);
            model.variable_mut(index_var).active = false;
            return true;
        }
        let index_domain = model.variable(index_var).domain.clone();
        if matches!(index_domain, Domain::Interval { .. })
            && !index_domain.is_all_ints()
            && index_domain.max() >= 1
            && index_domain.max() < variables.len() as Int
        {
            log.push_str("reduce array");
            let max = index_domain.max() as usize;
            let constraint = model.constraint_mut(ct);
            if let Argument::VarRefArray(vars) = &mut constraint.args[1] {
                vars.truncate(max);
            }
            constraint.presolve_propagation_done = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fzn::constraint::Constraint;
    use crate::fzn::VarId;
    use crate::presolve::AffineMapping;

    fn element(
        model: &mut Model,
        index: VarId,
        values: Vec<Int>,
        target: VarId,
    ) -> CtId {
        model.add_constraint(Constraint::new(
            "array_int_element",
            vec![
                Argument::VarRef(index),
                Argument::IntList(values),
                Argument::VarRef(target),
            ],
        ))
    }

    #[test]
    fn fixed_index_becomes_equality() {
        let mut model = Model::new();
        let i = model.new_var("i", Domain::singleton(3), false);
        let t = model.new_var("t", Domain::interval(0, 99), false);
        let ct = element(&mut model, i, vec![10, 20, 30, 40], t);
        let mut log = String::new();
        assert!(Presolver::new().simplify_element(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "int_eq");
        assert_eq!(
            model.constraint(ct).args,
            vec![Argument::IntValue(30), Argument::VarRef(t)]
        );
    }

    #[test]
    fn tight_index_truncates_array() {
        let mut model = Model::new();
        let i = model.new_var("i", Domain::interval(1, 2), false);
        let t = model.new_var("t", Domain::interval(0, 99), false);
        let ct = element(&mut model, i, vec![10, 20, 30, 40], t);
        let mut log = String::new();
        assert!(Presolver::new().simplify_element(&mut model, ct, &mut log));
        assert_eq!(
            model.constraint(ct).args[1],
            Argument::IntList(vec![10, 20])
        );
    }

    #[test]
    fn contiguous_values_are_linearized() {
        let mut model = Model::new();
        let i = model.new_var("i", Domain::interval(1, 4), false);
        let t = model.new_var("t", Domain::interval(0, 99), false);
        let ct = element(&mut model, i, vec![5, 6, 7, 8], t);
        let mut log = String::new();
        assert!(Presolver::new().simplify_element(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "int_lin_eq");
        assert_eq!(model.constraint(ct).args[0], Argument::IntList(vec![-1, 1]));
        assert_eq!(
            model.constraint(ct).args[1],
            Argument::VarRefArray(vec![t, i])
        );
        assert_eq!(model.constraint(ct).args[2], Argument::IntValue(-4));
    }

    #[test]
    fn contiguous_from_one_becomes_int_eq() {
        let mut model = Model::new();
        let i = model.new_var("i", Domain::interval(1, 3), false);
        let t = model.new_var("t", Domain::interval(0, 99), false);
        let ct = element(&mut model, i, vec![1, 2, 3], t);
        let mut log = String::new();
        assert!(Presolver::new().simplify_element(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "int_eq");
        assert_eq!(
            model.constraint(ct).args,
            vec![Argument::VarRef(i), Argument::VarRef(t)]
        );
    }

    #[test]
    fn affine_mapping_resamples_array() {
        let mut model = Model::new();
        // i = 2*j, j in 1..3, array of 6 values.
        let i = model.new_var("i", Domain::interval(1, 6), false);
        let j = model.new_var("j", Domain::interval(1, 3), false);
        let t = model.new_var("t", Domain::interval(0, 99), false);
        let origin = model.add_constraint(Constraint::new(
            "int_lin_eq",
            vec![
                Argument::IntList(vec![-1, 2]),
                Argument::VarRefArray(vec![i, j]),
                Argument::IntValue(0),
            ],
        ));
        let ct = element(&mut model, i, vec![10, 20, 30, 40, 50, 60], t);
        let mut p = Presolver::new();
        p.affine_map.insert(
            i,
            AffineMapping {
                variable: j,
                coefficient: 2,
                offset: 0,
                constraint: origin,
            },
        );
        let mut log = String::new();
        assert!(p.simplify_element(&mut model, ct, &mut log));
        // Sampled positions 2, 4, 6.
        assert_eq!(
            model.constraint(ct).args[1],
            Argument::IntList(vec![20, 40, 60])
        );
        assert_eq!(model.constraint(ct).args[0], Argument::VarRef(j));
        assert!(!model.constraint(origin).active);
        assert!(!model.variable(i).active);
    }

    #[test]
    fn element_intersects_target_domain() {
        let mut model = Model::new();
        let i = model.new_var("i", Domain::interval(2, 3), false);
        let t = model.new_var("t", Domain::interval(0, 99), false);
        let ct = element(&mut model, i, vec![10, 20, 30, 40], t);
        let mut log = String::new();
        assert!(Presolver::new().presolve_array_int_element(&mut model, ct, &mut log));
        assert!(model.constraint(ct).active);
        assert_eq!(model.variable(t).domain, Domain::Values(vec![20, 30]));
    }

    #[test]
    fn var_element_downgrades_when_members_fixed() {
        let mut model = Model::new();
        let i = model.new_var("i", Domain::interval(1, 2), false);
        let a = model.new_var("a", Domain::singleton(7), false);
        let b = model.new_var("b", Domain::singleton(9), false);
        let t = model.new_var("t", Domain::interval(0, 99), false);
        let ct = model.add_constraint(Constraint::new(
            "array_var_int_element",
            vec![
                Argument::VarRef(i),
                Argument::VarRefArray(vec![a, b]),
                Argument::VarRef(t),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().simplify_expr_element(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "array_int_element");
        assert_eq!(model.constraint(ct).args[1], Argument::IntList(vec![7, 9]));
    }

    #[test]
    fn var_element_with_fixed_index() {
        let mut model = Model::new();
        let i = model.new_var("i", Domain::singleton(2), false);
        let a = model.new_var("a", Domain::interval(0, 5), false);
        let b = model.new_var("b", Domain::interval(0, 5), false);
        let t = model.new_var("t", Domain::interval(0, 99), false);
        let ct = model.add_constraint(Constraint::new(
            "array_var_int_element",
            vec![
                Argument::VarRef(i),
                Argument::VarRefArray(vec![a, b]),
                Argument::VarRef(t),
            ],
        ));
        let mut log = String::new();
        assert!(Presolver::new().simplify_expr_element(&mut model, ct, &mut log));
        assert_eq!(model.constraint(ct).tag, "int_eq");
        assert_eq!(
            model.constraint(ct).args,
            vec![Argument::VarRef(b), Argument::VarRef(t)]
        );
    }
}
