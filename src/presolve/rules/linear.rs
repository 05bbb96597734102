//! Linear constraint rules.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::fzn::argument::Argument;
use crate::fzn::constraint::CtId;
use crate::fzn::model::Model;
use crate::fzn::types::as_int;
use crate::fzn::types::Int;
use crate::fzn::types::INT_MAX;
use crate::fzn::types::INT_MIN;
use crate::fzn::variable::VarId;
use crate::presolve::rules::compute_lin_bounds;
use crate::presolve::rules::has_01_values;
use crate::presolve::rules::is_0_or_1;
use crate::presolve::Array2dIndexMapping;
use crate::presolve::AffineMapping;
use crate::presolve::Presolver;

/// Drop the `_lin` infix of a linear tag: `int_lin_eq` becomes
/// `int_eq`, `int_lin_le_reif` becomes `int_le_reif`.
fn strip_lin(tag: &str) -> String {
    debug_assert!(tag.starts_with("int_lin_"));
    format!("int_{}", &tag["int_lin_".len()..])
}

impl Presolver {
    /// `int_lin_gt(a, x, c)` is `int_lin_ge(a, x, c + 1)`.
    pub(crate) fn presolve_int_lin_gt(
        &mut self,
        model: &mut Model,
        ct: CtId,
        _log: &mut String,
    ) -> bool {
        let rhs = model.constraint(ct).args[2].value();
        if rhs != INT_MAX {
            let constraint = model.constraint_mut(ct);
            constraint.args[2] = Argument::IntValue(rhs + 1);
            constraint.tag = "int_lin_ge".to_string();
            return true;
        }
        false
    }

    /// `int_lin_lt(a, x, c)` is `int_lin_le(a, x, c - 1)`.
    pub(crate) fn presolve_int_lin_lt(
        &mut self,
        model: &mut Model,
        ct: CtId,
        _log: &mut String,
    ) -> bool {
        let rhs = model.constraint(ct).args[2].value();
        if rhs != INT_MIN {
            let constraint = model.constraint_mut(ct);
            constraint.args[2] = Argument::IntValue(rhs - 1);
            constraint.tag = "int_lin_le".to_string();
            return true;
        }
        false
    }

    /// Evaluate a constant linear constraint, and reverse one whose
    /// coefficients are all non-positive.
    pub(crate) fn presolve_linear(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        if model.constraint(ct).args[0].values().is_empty() {
            return false;
        }
        if model.constraint(ct).args[1].variables().is_empty() {
            // No variables left: evaluate the scalar product.
            log.push_str("rewrite constant linear equation");
            let constraint = model.constraint(ct);
            let coefficients = constraint.args[0].values();
            let values = constraint.args[1].values();
            assert!(!values.is_empty());
            let scalprod: Int = coefficients
                .iter()
                .zip(values)
                .map(|(c, v)| c * v)
                .sum();
            let rhs = constraint.args[2].value();
            let tag = constraint.tag.clone();
            match tag.as_str() {
                "int_lin_eq" => {
                    if scalprod == rhs {
                        model.mark_inactive(ct);
                    } else {
                        model.set_as_false(ct);
                    }
                }
                "int_lin_le" => {
                    if scalprod <= rhs {
                        model.mark_inactive(ct);
                    } else {
                        model.set_as_false(ct);
                    }
                }
                "int_lin_ge" => {
                    if scalprod >= rhs {
                        model.mark_inactive(ct);
                    } else {
                        model.set_as_false(ct);
                    }
                }
                "int_lin_ne" => {
                    if scalprod != rhs {
                        model.mark_inactive(ct);
                    } else {
                        model.set_as_false(ct);
                    }
                }
                "int_lin_eq_reif" | "int_lin_le_reif" | "int_lin_ge_reif"
                | "int_lin_ne_reif" => {
                    let holds = match tag.as_str() {
                        "int_lin_eq_reif" => scalprod == rhs,
                        "int_lin_le_reif" => scalprod <= rhs,
                        "int_lin_ge_reif" => scalprod >= rhs,
                        _ => scalprod != rhs,
                    };
                    let boolarg = model.constraint(ct).args[3].clone();
                    let constraint = model.constraint_mut(ct);
                    constraint.tag = "bool_eq".to_string();
                    constraint.args =
                        vec![boolarg, Argument::IntValue(as_int(holds))];
                }
                _ => return false,
            }
            return true;
        }

        // Only non-positive coefficients: negate everything and swap
        // the comparison direction.
        if model.constraint(ct).args[0].values().iter().any(|c| *c > 0) {
            return false;
        }
        if let Some(target) = model.constraint(ct).target_variable {
            if model.constraint(ct).args[1].variables().contains(&target) {
                return false;
            }
        }
        log.push_str("reverse constraint");
        let constraint = model.constraint_mut(ct);
        if let Argument::IntList(coefficients) = &mut constraint.args[0] {
            for coefficient in coefficients {
                *coefficient = -*coefficient;
            }
        }
        let rhs = constraint.args[2].value();
        constraint.args[2] = Argument::IntValue(-rhs);
        constraint.tag = match constraint.tag.as_str() {
            "int_lin_le" => "int_lin_ge".to_string(),
            "int_lin_lt" => "int_lin_gt".to_string(),
            "int_lin_ge" => "int_lin_le".to_string(),
            "int_lin_gt" => "int_lin_lt".to_string(),
            "int_lin_le_reif" => "int_lin_ge_reif".to_string(),
            "int_lin_ge_reif" => "int_lin_le_reif".to_string(),
            other => other.to_string(),
        };
        true
    }

    /// Merge duplicated variables of a linear term; drop terms whose
    /// merged coefficient is zero.
    pub(crate) fn regroup_linear(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let constraint = model.constraint(ct);
        if constraint.args[1].variables().is_empty() {
            return false;
        }
        let coefficients = constraint.args[0].values();
        let variables = constraint.args[1].variables();
        let original_size = coefficients.len();
        let mut merged: HashMap<VarId, Int> = HashMap::new();
        for (coefficient, var) in coefficients.iter().zip(variables) {
            *merged.entry(*var).or_insert(0) += *coefficient;
        }
        if merged.len() == original_size {
            return false;
        }
        log.push_str("regroup variables");
        let mut new_coefficients = Vec::new();
        let mut new_variables = Vec::new();
        let mut processed = HashSet::new();
        for var in variables {
            if !processed.insert(*var) {
                continue;
            }
            let coefficient = merged[var];
            if coefficient != 0 {
                new_coefficients.push(coefficient);
                new_variables.push(*var);
            }
        }
        let constraint = model.constraint_mut(ct);
        constraint.args[0] = Argument::IntList(new_coefficients);
        constraint.args[1] = Argument::VarRefArray(new_variables);
        true
    }

    /// `c * x OP rhs` with a divisible right-hand side: drop the
    /// linear wrapper.
    pub(crate) fn simplify_unary_linear(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let constraint = model.constraint(ct);
        if constraint.args[0].values().len() != 1
            || constraint.args[1].variables().len() != 1
        {
            return false;
        }
        let coefficient = constraint.args[0].values()[0];
        let rhs = constraint.args[2].value();
        if coefficient == 1 || (coefficient > 0 && rhs % coefficient == 0) {
            log.push_str("remove linear part");
            let var = constraint.args[1].variables()[0];
            let constraint = model.constraint_mut(ct);
            constraint.args[0] = Argument::VarRef(var);
            constraint.args[1] = Argument::IntValue(rhs / coefficient);
            constraint.remove_arg(2);
            constraint.tag = strip_lin(&constraint.tag.clone());
            return true;
        }
        false
    }

    /// `x - y OP 0` (or `-x + y OP 0`): rewrite as a binary
    /// comparison of the two variables.
    pub(crate) fn simplify_binary_linear(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let constraint = model.constraint(ct);
        let coefficients = constraint.args[0].values();
        if coefficients.len() != 2
            || constraint.args[2].value() != 0
            || constraint.args[1].variables().is_empty()
        {
            return false;
        }
        let variables = constraint.args[1].variables();
        let (first, second) = if coefficients == [1, -1] {
            (variables[0], variables[1])
        } else if coefficients == [-1, 1] {
            (variables[1], variables[0])
        } else {
            return false;
        };
        log.push_str("remove linear part");
        let constraint = model.constraint_mut(ct);
        constraint.args[0] = Argument::VarRef(first);
        constraint.args[1] = Argument::VarRef(second);
        constraint.remove_arg(2);
        constraint.tag = strip_lin(&constraint.tag.clone());
        true
    }

    /// Bound propagation on all-positive linear constraints over
    /// non-negative variables.
    pub(crate) fn propagate_positive_linear(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let constraint = model.constraint(ct);
        let rhs = constraint.args[2].value();
        if constraint.presolve_propagation_done
            || rhs < 0
            || constraint.args[1].variables().is_empty()
        {
            return false;
        }
        if constraint.args[0].values().iter().any(|c| *c < 0) {
            return false;
        }
        let coefficients = constraint.args[0].values().to_vec();
        let variables = constraint.args[1].variables().to_vec();
        if variables
            .iter()
            .any(|v| model.variable(*v).domain.min() < 0)
        {
            return false;
        }
        let mut modified = false;
        if model.constraint(ct).tag != "int_lin_ge" {
            log.push_str("propagate constants");
            for (coefficient, var) in coefficients.iter().zip(&variables) {
                if *coefficient > 0 {
                    let bound = rhs / coefficient;
                    if bound < model.variable(*var).domain.max() {
                        model
                            .variable_mut(*var)
                            .domain
                            .intersect_with_interval(0, bound);
                        modified = true;
                    }
                }
            }
        } else if coefficients.len() == 1 && coefficients[0] > 0 {
            let coefficient = coefficients[0];
            let var = variables[0];
            let bound = (rhs + coefficient - 1) / coefficient;
            if bound > model.variable(var).domain.min() {
                model
                    .variable_mut(var)
                    .domain
                    .intersect_with_interval(bound, INT_MAX);
                model.mark_inactive(ct);
                modified = true;
            }
        }
        model.constraint_mut(ct).presolve_propagation_done = true;
        modified
    }

    /// Decide the boolean of `int_lin_eq_reif` from the exact bounds
    /// of the linear form.
    pub(crate) fn check_int_lin_reif_bounds(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        debug_assert_eq!(model.constraint(ct).tag, "int_lin_eq_reif");
        let constraint = model.constraint(ct);
        let coefficients = constraint.args[0].values();
        let variables = constraint.args[1].variables();
        let Some((lb, ub)) = compute_lin_bounds(model, coefficients, variables)
        else {
            log.push_str("overflow found when presolving");
            return false;
        };
        let value = model.constraint(ct).args[2].value();
        if value < lb || value > ub {
            log.push_str("assign boolean to false");
            let boolvar = model.constraint(ct).args[3].var();
            model
                .variable_mut(boolvar)
                .domain
                .intersect_with_interval(0, 0);
            model.mark_inactive(ct);
            return true;
        } else if value == lb && value == ub {
            log.push_str("assign boolean to true");
            let boolvar = model.constraint(ct).args[3].var();
            model
                .variable_mut(boolvar)
                .domain
                .intersect_with_interval(1, 1);
            model.mark_inactive(ct);
            return true;
        }
        false
    }

    /// Mark `x` as defined by `-x + c*y = rhs` when neither the
    /// constraint nor `x` is spoken for.
    pub(crate) fn create_linear_target(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        if model.constraint(ct).target_variable.is_some() {
            return false;
        }
        for var_index in [0, 1] {
            let constraint = model.constraint(ct);
            if constraint.args[0].values().len() == 2
                && constraint.args[0].values()[var_index] == -1
            {
                let var = constraint.args[1].variables()[var_index];
                if model.variable(var).defining_constraint.is_none()
                    && !model.variable(var).domain.has_one_value()
                {
                    log.push_str(&format!(
                        "mark variable index {var_index} as target"
                    ));
                    model.set_target_variable(ct, var);
                    return true;
                }
            }
        }
        false
    }

    /// Capture affine (`i = a*j + b`) and 2d (`i = a*j + k + b`) index
    /// mappings from targeted `int_lin_eq` constraints. Element rules
    /// consume them.
    pub(crate) fn store_mapping(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let constraint = model.constraint(ct);
        if constraint.args[1].variables().is_empty() {
            return false;
        }
        let Some(target) = constraint.target_variable else {
            return false;
        };
        let coefficients = constraint.args[0].values();
        let variables = constraint.args[1].variables();
        let offset = -constraint.args[2].value();
        let strong = constraint.strong_propagation;

        if coefficients.len() == 2
            && variables[0] == target
            && coefficients[0] == -1
            && !self.affine_map.contains_key(&target)
            && strong
        {
            self.affine_map.insert(
                target,
                AffineMapping {
                    variable: variables[1],
                    coefficient: coefficients[1],
                    offset,
                    constraint: ct,
                },
            );
            log.push_str("store affine mapping");
            return true;
        }
        if coefficients.len() == 2
            && variables[1] == target
            && coefficients[1] == -1
            && !self.affine_map.contains_key(&target)
        {
            self.affine_map.insert(
                target,
                AffineMapping {
                    variable: variables[0],
                    coefficient: coefficients[0],
                    offset,
                    constraint: ct,
                },
            );
            log.push_str("store affine mapping");
            return true;
        }
        if coefficients.len() == 3
            && variables[0] == target
            && coefficients[0] == -1
            && coefficients[2] == 1
            && !self.array2d_index_map.contains_key(&target)
            && strong
        {
            self.array2d_index_map.insert(
                target,
                Array2dIndexMapping {
                    variable1: variables[1],
                    coefficient: coefficients[1],
                    variable2: variables[2],
                    offset,
                    constraint: ct,
                },
            );
            log.push_str("store 2d index mapping");
            return true;
        }
        if coefficients.len() == 3
            && variables[0] == target
            && coefficients[0] == -1
            && coefficients[1] == 1
            && !self.array2d_index_map.contains_key(&target)
            && strong
        {
            self.array2d_index_map.insert(
                target,
                Array2dIndexMapping {
                    variable1: variables[2],
                    coefficient: coefficients[2],
                    variable2: variables[1],
                    offset,
                    constraint: ct,
                },
            );
            log.push_str("store 2d index mapping");
            return true;
        }
        if coefficients.len() == 3
            && variables[2] == target
            && coefficients[2] == -1
            && coefficients[1] == 1
            && !self.array2d_index_map.contains_key(&target)
        {
            self.array2d_index_map.insert(
                target,
                Array2dIndexMapping {
                    variable1: variables[0],
                    coefficient: coefficients[0],
                    variable2: variables[1],
                    offset,
                    constraint: ct,
                },
            );
            log.push_str("store 2d index mapping");
            return true;
        }
        if coefficients.len() == 3
            && variables[2] == target
            && coefficients[2] == -1
            && coefficients[0] == 1
            && !self.array2d_index_map.contains_key(&target)
        {
            self.array2d_index_map.insert(
                target,
                Array2dIndexMapping {
                    variable1: variables[1],
                    coefficient: coefficients[1],
                    variable2: variables[0],
                    offset,
                    constraint: ct,
                },
            );
            log.push_str("store 2d index mapping");
            return true;
        }
        false
    }

    /// Recognize `b1 + b2 = 1 <-> b0` over booleans as
    /// `bool_ne_reif(b1, b2, b0)`, collapsing further when one
    /// operand is fixed.
    pub(crate) fn simplify_int_lin_eq_reif(
        &mut self,
        model: &mut Model,
        ct: CtId,
        log: &mut String,
    ) -> bool {
        let constraint = model.constraint(ct);
        let coefficients = constraint.args[0].values();
        if coefficients != [1, 1] || constraint.args[2].value() != 1 {
            return false;
        }
        if !constraint.args[3].is_variable() {
            return false;
        }
        let left = constraint.args[1].variables()[0];
        let right = constraint.args[1].variables()[1];
        let target = constraint.args[3].var();

        if has_01_values(model, left) && has_01_values(model, right) {
            log.push_str("rewrite constraint to bool_ne_reif");
            let constraint = model.constraint_mut(ct);
            constraint.tag = "bool_ne_reif".to_string();
            constraint.args = vec![
                Argument::VarRef(left),
                Argument::VarRef(right),
                Argument::VarRef(target),
            ];
            return true;
        }

        for (fixed, free) in [(left, right), (right, left)] {
            let domain = &model.variable(fixed).domain;
            if has_01_values(model, free)
                && domain.has_one_value()
                && is_0_or_1(domain.min())
            {
                let value = model.variable(fixed).domain.min();
                let tag = if value == 0 { "bool_eq" } else { "bool_not" };
                log.push_str(if value == 0 {
                    "rewrite constraint to bool_eq"
                } else {
                    "rewrite constraint to bool_not"
                });
                let constraint = model.constraint_mut(ct);
                constraint.tag = tag.to_string();
                constraint.args =
                    vec![Argument::VarRef(free), Argument::VarRef(target)];
                return true;
            }
        }
        false
    }
}
