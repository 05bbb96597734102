//! Terminal cleanup for the downstream solver.
//!
//! Runs once after the fixed point: strips target variables that the
//! solver cannot honor, resolves variables defined by several
//! constraints, and regroups flattened min/max and running-sum chains
//! into their array forms.

use std::collections::HashMap;

use log::debug;

use crate::fzn::argument::Argument;
use crate::fzn::constraint::CtId;
use crate::fzn::model::Model;
use crate::fzn::variable::VarId;
use crate::presolve::rules::is_array_boolean;
use crate::presolve::rules::only_one_0_or_only_one_1;
use crate::presolve::Presolver;

/// Defining-constraint preference weight: smaller is kept. Reified
/// constraints are preferred over plain ones, then lower arity wins.
fn sort_weight(model: &Model, ct: CtId) -> usize {
    let constraint = model.constraint(ct);
    let mut weight = if constraint.is_reified() { 0 } else { 100 };
    for arg in &constraint.args {
        weight += arg.variables().len();
    }
    weight
}

/// All but the lightest constraint defining a variable lose their
/// target.
fn resolve_multiple_defining_constraints(model: &mut Model) {
    let mut by_target: HashMap<VarId, Vec<CtId>> = HashMap::new();
    for ct in model.ct_ids() {
        if let Some(target) = model.constraint(ct).target_variable {
            by_target.entry(target).or_default().push(ct);
        }
    }
    for (var, mut constraints) in by_target {
        if constraints.len() <= 1 {
            continue;
        }
        constraints.sort_by_key(|ct| sort_weight(model, *ct));
        for ct in &constraints[1..] {
            debug!("remove duplicate target from {}", model.fzn_constraint(*ct));
            model.remove_target_variable(*ct);
        }
        model.variable_mut(var).defining_constraint = Some(constraints[0]);
    }
}

/// Ones followed by a single -1: the shape of a flattened running
/// sum.
fn ones_followed_by_minus_one(coefficients: &[i64]) -> bool {
    let Some((last, rest)) = coefficients.split_last() else {
        return false;
    };
    rest.iter().all(|c| *c == 1) && *last == -1
}

fn is_strict_prefix(shorter: &[VarId], longer: &[VarId]) -> bool {
    shorter.len() < longer.len() && longer.starts_with(shorter)
}

/// State of an `int_min`/`int_max` chain being collected.
struct Chain {
    start: CtId,
    tag: String,
    members: Vec<VarId>,
    carry_over: Vec<VarId>,
}

impl Presolver {
    /// Recognize the start of a min/max chain: `int_min(x, x, t)` or
    /// `int_max(x, x, t)`.
    fn check_regroup_start(model: &mut Model, ct: CtId) -> Option<Chain> {
        let constraint = model.constraint(ct);
        if !matches!(constraint.tag.as_str(), "int_min" | "int_max") {
            return None;
        }
        if !constraint.args[0].is_variable()
            || !constraint.args[1].is_variable()
            || constraint.args[0].var() != constraint.args[1].var()
        {
            return None;
        }
        let chain = Chain {
            start: ct,
            tag: constraint.tag.clone(),
            members: vec![constraint.args[0].var()],
            carry_over: vec![constraint.args[2].var()],
        };
        let carry = chain.carry_over[0];
        model.variable_mut(carry).defining_constraint = None;
        Some(chain)
    }

    /// Rewrite a collected chain into `minimum_int`/`maximum_int`.
    fn regroup(model: &mut Model, chain: Chain) {
        let out = *chain.carry_over.last().unwrap();
        let old_tag = chain.tag.clone();
        model.remove_target_variable(chain.start);
        let constraint = model.constraint_mut(chain.start);
        constraint.args.pop();
        constraint.args[0] = Argument::VarRef(out);
        constraint.args[1] = Argument::VarRefArray(chain.members);
        constraint.tag = if old_tag == "int_min" {
            "minimum_int"
        } else {
            "maximum_int"
        }
        .to_string();
        constraint.target_variable = Some(out);
        model.variable_mut(out).defining_constraint = Some(chain.start);
        for var in &chain.carry_over {
            if *var != out {
                model.variable_mut(*var).active = false;
            }
        }
        debug!(
            "regroup chain of {} into {}",
            old_tag,
            model.fzn_constraint(chain.start)
        );
    }

    /// Regroup flattened `int_min`/`int_max` chains.
    ///
    /// Flattening turns `t = max([v1, .., vn])` into `t1 = max(v1, v1)`,
    /// `t2 = max(v2, t1)`, ... This reconstructs the array form.
    fn regroup_min_max_chains(&mut self, model: &mut Model) {
        self.var_to_constraints.clear();
        for ct in model.ct_ids() {
            for arg in &model.constraint(ct).args {
                for var in arg.variables() {
                    self.var_to_constraints.entry(*var).or_default().insert(ct);
                }
            }
        }

        let mut current: Option<Chain> = None;
        for ct in model.ct_ids() {
            match current.take() {
                None => current = Self::check_regroup_start(model, ct),
                Some(mut chain) => {
                    let constraint = model.constraint(ct);
                    let extends = constraint.tag == chain.tag
                        && constraint.args[1].is_variable()
                        && constraint.args[1].var() == *chain.carry_over.last().unwrap()
                        && constraint.args[0].is_variable()
                        && self
                            .var_to_constraints
                            .get(&constraint.args[0].var())
                            .map_or(0, |s| s.len())
                            <= 2;
                    if extends {
                        let member = constraint.args[0].var();
                        let carry = constraint.args[2].var();
                        chain.members.push(member);
                        chain.carry_over.push(carry);
                        let constraint = model.constraint_mut(ct);
                        constraint.active = false;
                        constraint.target_variable = None;
                        model.variable_mut(carry).defining_constraint = None;
                        current = Some(chain);
                    } else {
                        Self::regroup(model, chain);
                        current = Self::check_regroup_start(model, ct);
                    }
                }
            }
        }
        if let Some(chain) = current {
            Self::regroup(model, chain);
        }
    }

    /// Regroup running sums `int_lin_eq([1..1,-1], [x1..xn, yn], 0)`
    /// into a sequence of `int_plus`.
    fn regroup_linear_sum_chains(&mut self, model: &mut Model) {
        let mut current_variables: Vec<VarId> = Vec::new();
        let mut running: Option<VarId> = None;
        let mut first_constraint: Option<CtId> = None;
        for ct in model.ct_ids() {
            let constraint = model.constraint(ct);
            match running {
                None => {
                    if constraint.tag == "int_lin_eq"
                        && constraint.args[0].values().len() == 3
                        && ones_followed_by_minus_one(constraint.args[0].values())
                        && !constraint.args[1].variables().is_empty()
                        && constraint.args[2] == Argument::IntValue(0)
                    {
                        debug!("recognize assignment {}", model.fzn_constraint(ct));
                        current_variables = constraint.args[1].variables().to_vec();
                        running = current_variables.pop();
                        first_constraint = Some(ct);
                    }
                }
                Some(target) => {
                    if constraint.tag == "int_lin_eq"
                        && ones_followed_by_minus_one(constraint.args[0].values())
                        && constraint.args[0].values().len()
                            == current_variables.len() + 2
                        && is_strict_prefix(
                            &current_variables,
                            constraint.args[1].variables(),
                        )
                    {
                        debug!("recognize hidden int_plus {}", model.fzn_constraint(ct));
                        current_variables = constraint.args[1].variables().to_vec();
                        let new_member =
                            current_variables[current_variables.len() - 2];
                        let new_running = *current_variables.last().unwrap();
                        let constraint = model.constraint_mut(ct);
                        constraint.tag = "int_plus".to_string();
                        constraint.args = vec![
                            Argument::VarRef(target),
                            Argument::VarRef(new_member),
                            Argument::VarRef(new_running),
                        ];
                        // The intermediate result must stay a real
                        // variable to break the linear sweep during
                        // propagation.
                        model.remove_target_variable(ct);
                        running = Some(new_running);
                        current_variables.pop();
                        if let Some(first) = first_constraint.take() {
                            model.remove_target_variable(first);
                        }
                    } else {
                        current_variables.clear();
                        running = None;
                        first_constraint = None;
                    }
                }
            }
        }
    }

    /// Final normalization for the downstream solver.
    pub fn cleanup_for_solver(&mut self, model: &mut Model, use_sat: bool) {
        // First pass: strip or canonicalize target variables.
        for ct in model.ct_ids() {
            let tag = model.constraint(ct).tag.clone();
            if tag == "int_lin_eq" && model.constraint(ct).strong_propagation {
                // More than three terms will use a table encoding.
                if model.constraint(ct).args[0].values().len() > 3 {
                    debug!(
                        "remove target variable from {}",
                        model.fzn_constraint(ct)
                    );
                    model.remove_target_variable(ct);
                }
            }
            if tag == "int_lin_eq" {
                if let Some(target) = model.constraint(ct).target_variable {
                    // Make the target's coefficient -1.
                    let constraint = model.constraint(ct);
                    let coefficients = constraint.args[0].values();
                    let variables = constraint.args[1].variables();
                    let position = variables
                        .iter()
                        .zip(coefficients)
                        .find(|(var, _)| **var == target)
                        .map(|(_, coefficient)| *coefficient);
                    if position == Some(1) {
                        debug!("reverse {}", model.fzn_constraint(ct));
                        let rhs = model.constraint(ct).args[2].value();
                        let constraint = model.constraint_mut(ct);
                        constraint.args[2] = Argument::IntValue(-rhs);
                        if let Argument::IntList(coefficients) =
                            &mut constraint.args[0]
                        {
                            for coefficient in coefficients {
                                *coefficient = -*coefficient;
                            }
                        }
                    }
                }
            }
            if tag == "array_var_int_element" {
                if let Some(target) = model.constraint(ct).target_variable {
                    if model.constraint(ct).args[1].variables().contains(&target)
                    {
                        debug!(
                            "remove target variable from {}: it appears in the array",
                            model.fzn_constraint(ct)
                        );
                        model.remove_target_variable(ct);
                    }
                }
            }
            // Constraints handed to the SAT layer do not define
            // variables.
            if use_sat
                && model.constraint(ct).target_variable.is_some()
                && (tag == "array_bool_and"
                    || tag == "array_bool_or"
                    || ((tag == "bool_eq_reif" || tag == "bool_ne_reif")
                        && !model
                            .arg_has_one_value(&model.constraint(ct).args[1]))
                    || tag == "bool_le_reif"
                    || tag == "bool_ge_reif")
            {
                model.remove_target_variable(ct);
            }
            // Constraints that will not implement defined variables.
            if tag == "count_reif" || tag == "set_in_reif" {
                model.remove_target_variable(ct);
            }
            if tag == "array_var_int_element"
                || (tag == "array_int_element"
                    && (!is_array_boolean(model.constraint(ct).args[1].values())
                        || !only_one_0_or_only_one_1(
                            model.constraint(ct).args[1].values(),
                        )))
            {
                model.remove_target_variable(ct);
            }
        }

        resolve_multiple_defining_constraints(model);

        // Second pass: give reified comparisons an otherwise
        // undefined boolean as target.
        for ct in model.ct_ids() {
            let constraint = model.constraint(ct);
            if !constraint.active || constraint.target_variable.is_some() {
                continue;
            }
            if !matches!(
                constraint.tag.as_str(),
                "int_eq_reif"
                    | "int_ne_reif"
                    | "int_le_reif"
                    | "int_ge_reif"
                    | "int_lt_reif"
                    | "int_gt_reif"
            ) {
                continue;
            }
            if !constraint.args[2].is_variable() {
                continue;
            }
            let boolvar = constraint.args[2].var();
            if model.variable(boolvar).defining_constraint.is_none() {
                debug!("create target variable on {}", model.fzn_constraint(ct));
                model.set_target_variable(ct, boolvar);
            }
        }

        self.regroup_min_max_chains(model);
        self.regroup_linear_sum_chains(model);
    }
}
