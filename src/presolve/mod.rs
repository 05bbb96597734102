//! Rule-driven model rewriting.
//!
//! The presolver sweeps the constraint list, offering every active
//! constraint to the rules matching its tag. Rules tighten domains,
//! rewrite arguments, change tags, deactivate constraints or record
//! variable equivalences. Whenever an equivalence is recorded the
//! sweep stops, the substitution is applied to the whole model and
//! the sweep restarts, so no rule ever observes a reference to a
//! substituted-away variable. The loop ends on a sweep with no
//! change.

pub mod cleanup;
pub mod rules;
pub mod subst;

use std::collections::HashMap;
use std::collections::HashSet;

use log::debug;
use log::log_enabled;
use log::Level;

use crate::fzn::argument::Argument;
use crate::fzn::constraint::CtId;
use crate::fzn::model::Model;
use crate::fzn::types::Int;
use crate::fzn::variable::VarId;

/// Relation `target = coefficient * variable + offset`, captured from
/// a two-variable linear equality.
#[derive(Clone, Copy, Debug)]
pub struct AffineMapping {
    pub variable: VarId,
    pub coefficient: Int,
    pub offset: Int,
    /// Constraint the mapping was captured from.
    pub constraint: CtId,
}

/// Relation `target = coefficient * variable1 + variable2 + offset`,
/// the index form produced by flattening 2d element constraints.
#[derive(Clone, Copy, Debug)]
pub struct Array2dIndexMapping {
    pub variable1: VarId,
    pub coefficient: Int,
    pub variable2: VarId,
    pub offset: Int,
    pub constraint: CtId,
}

/// Signature shared by every rewrite rule.
///
/// A rule returns `true` iff it modified the model; the log string
/// collects a human-readable account of what it did.
pub type Rule = fn(&mut Presolver, &mut Model, CtId, &mut String) -> bool;

/// In-place simplifier for a flat model.
#[derive(Default)]
pub struct Presolver {
    /// `var -> (a, b)` meaning `var = a - b`.
    pub(crate) difference_map: HashMap<VarId, (VarId, VarId)>,
    /// `var -> v` meaning `var = |v|`.
    pub(crate) abs_map: HashMap<VarId, VarId>,
    pub(crate) affine_map: HashMap<VarId, AffineMapping>,
    pub(crate) array2d_index_map: HashMap<VarId, Array2dIndexMapping>,
    /// Memoized `int_eq_reif(x, y, b)` constraints, both orders.
    pub(crate) int_eq_reif_map: HashMap<(VarId, VarId), VarId>,
    /// Union-find parent pointers for substituted variables.
    pub(crate) var_representative_map: HashMap<VarId, VarId>,
    /// Reverse index from variables to the constraints using them.
    pub(crate) var_to_constraints: HashMap<VarId, HashSet<CtId>>,
    /// Variables appearing in search annotations.
    pub(crate) decision_variables: HashSet<VarId>,
}

macro_rules! call_type {
    ($self:ident, $model:ident, $ct:ident, $changed:ident, $tag:literal, $rule:ident) => {
        if $model.constraint($ct).active && $model.constraint($ct).tag == $tag {
            $changed |=
                $self.apply_rule($model, $ct, stringify!($rule), Self::$rule);
        }
    };
}

macro_rules! call_prefix {
    ($self:ident, $model:ident, $ct:ident, $changed:ident, $prefix:literal, $rule:ident) => {
        if $model.constraint($ct).active
            && $model.constraint($ct).tag.starts_with($prefix)
        {
            $changed |=
                $self.apply_rule($model, $ct, stringify!($rule), Self::$rule);
        }
    };
}

macro_rules! call_suffix {
    ($self:ident, $model:ident, $ct:ident, $changed:ident, $suffix:literal, $rule:ident) => {
        if $model.constraint($ct).active
            && $model.constraint($ct).tag.ends_with($suffix)
        {
            $changed |=
                $self.apply_rule($model, $ct, stringify!($rule), Self::$rule);
        }
    };
}

impl Presolver {
    /// Create a presolver with empty recognition state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a rule invocation with logging of its effect.
    fn apply_rule(
        &mut self,
        model: &mut Model,
        ct: CtId,
        name: &str,
        rule: Rule,
    ) -> bool {
        let verbose = log_enabled!(Level::Debug);
        let before = if verbose {
            model.fzn_constraint(ct)
        } else {
            String::new()
        };
        let mut log = String::new();
        let modified = rule(self, model, ct, &mut log);
        if modified && verbose {
            debug!("apply rule {name} on {before}");
            if !log.is_empty() {
                debug!("  - log: {log}");
            }
            if !model.constraint(ct).active {
                debug!("  - constraint is now inactive");
            } else {
                let after = model.fzn_constraint(ct);
                if after != before {
                    debug!("  - constraint is modified to {after}");
                }
            }
        }
        modified
    }

    /// Offer one constraint to every rule matching its tag.
    fn presolve_one_constraint(&mut self, model: &mut Model, ct: CtId) -> bool {
        let mut changed = false;
        call_suffix!(self, model, ct, changed, "_reif", unreify);
        call_type!(self, model, ct, changed, "bool2int", presolve_bool2int);
        call_type!(self, model, ct, changed, "int_le", presolve_inequalities);
        call_type!(self, model, ct, changed, "int_lt", presolve_inequalities);
        call_type!(self, model, ct, changed, "int_ge", presolve_inequalities);
        call_type!(self, model, ct, changed, "int_gt", presolve_inequalities);
        call_type!(self, model, ct, changed, "bool_le", presolve_inequalities);
        call_type!(self, model, ct, changed, "bool_lt", presolve_inequalities);
        call_type!(self, model, ct, changed, "bool_ge", presolve_inequalities);
        call_type!(self, model, ct, changed, "bool_gt", presolve_inequalities);

        changed |= self.store_abs(model, ct);
        call_type!(self, model, ct, changed, "int_eq_reif", store_int_eq_reif);
        call_type!(self, model, ct, changed, "int_ne_reif", simplify_int_ne_reif);
        changed |= self.remove_abs_from_eq_ne_zero(model, ct);
        call_type!(
            self,
            model,
            ct,
            changed,
            "int_le_reif",
            remove_abs_from_int_le_reif
        );
        call_type!(self, model, ct, changed, "int_eq", presolve_int_eq);
        call_type!(self, model, ct, changed, "bool_eq", presolve_int_eq);
        call_type!(self, model, ct, changed, "int_ne", presolve_int_ne);
        call_type!(self, model, ct, changed, "bool_not", presolve_int_ne);
        call_type!(self, model, ct, changed, "set_in", presolve_set_in);
        call_type!(
            self,
            model,
            ct,
            changed,
            "array_bool_and",
            presolve_array_bool_and
        );
        call_type!(
            self,
            model,
            ct,
            changed,
            "array_bool_or",
            presolve_array_bool_or
        );
        call_type!(
            self,
            model,
            ct,
            changed,
            "bool_eq_reif",
            presolve_bool_eq_ne_reif
        );
        call_type!(
            self,
            model,
            ct,
            changed,
            "bool_ne_reif",
            presolve_bool_eq_ne_reif
        );
        call_type!(self, model, ct, changed, "bool_xor", presolve_bool_xor);
        call_type!(self, model, ct, changed, "bool_not", presolve_bool_not);
        call_type!(self, model, ct, changed, "bool_clause", presolve_bool_clause);
        call_type!(self, model, ct, changed, "int_div", presolve_int_div);
        call_type!(self, model, ct, changed, "int_times", presolve_int_times);
        call_type!(self, model, ct, changed, "int_lin_gt", presolve_int_lin_gt);
        call_type!(self, model, ct, changed, "int_lin_lt", presolve_int_lin_lt);
        call_prefix!(self, model, ct, changed, "int_lin_", presolve_linear);
        call_prefix!(self, model, ct, changed, "int_lin_", regroup_linear);
        call_prefix!(self, model, ct, changed, "int_lin_", simplify_unary_linear);
        call_prefix!(self, model, ct, changed, "int_lin_", simplify_binary_linear);
        call_type!(
            self,
            model,
            ct,
            changed,
            "int_lin_eq",
            propagate_positive_linear
        );
        call_type!(
            self,
            model,
            ct,
            changed,
            "int_lin_le",
            propagate_positive_linear
        );
        call_type!(
            self,
            model,
            ct,
            changed,
            "int_lin_ge",
            propagate_positive_linear
        );
        call_type!(self, model, ct, changed, "int_lin_eq", create_linear_target);
        call_type!(self, model, ct, changed, "int_lin_eq", store_mapping);
        call_type!(
            self,
            model,
            ct,
            changed,
            "int_lin_eq_reif",
            check_int_lin_reif_bounds
        );
        call_type!(
            self,
            model,
            ct,
            changed,
            "int_lin_eq_reif",
            simplify_int_lin_eq_reif
        );
        call_type!(
            self,
            model,
            ct,
            changed,
            "array_int_element",
            simplify_element
        );
        call_type!(
            self,
            model,
            ct,
            changed,
            "array_int_element",
            presolve_array_int_element
        );
        call_type!(
            self,
            model,
            ct,
            changed,
            "array_var_int_element",
            simplify_expr_element
        );
        call_type!(self, model, ct, changed, "int_eq_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "int_ne_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "int_le_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "int_lt_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "int_ge_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "int_gt_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "bool_eq_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "bool_ne_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "bool_le_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "bool_lt_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "bool_ge_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "bool_gt_reif", propagate_reified_comparisons);
        call_type!(self, model, ct, changed, "int_mod", presolve_int_mod);
        // Last rule: a target variable fixed to a single value no
        // longer needs a defining constraint.
        if let Some(target) = model.constraint(ct).target_variable {
            if model.variable(target).domain.has_one_value() {
                debug!(
                    "remove fixed target variable from {}",
                    model.fzn_constraint(ct)
                );
                model.remove_target_variable(ct);
                changed = true;
            }
        }
        changed
    }

    /// Record `var = a - b` relations from `int_lin_eq` constraints
    /// shaped `[1,-1,1]` or `[-1,1,-1]` with a zero right-hand side.
    fn store_difference(&mut self, model: &Model, ct: CtId) {
        let constraint = model.constraint(ct);
        let coefs = constraint.args[0].values();
        if constraint.args[2] != Argument::IntValue(0) || coefs.len() != 3 {
            return;
        }
        if coefs == [1, -1, 1] || coefs == [-1, 1, -1] {
            debug!("store differences from {}", model.fzn_constraint(ct));
            let vars = constraint.args[1].variables();
            self.difference_map.insert(vars[0], (vars[2], vars[1]));
            self.difference_map.insert(vars[2], (vars[0], vars[1]));
        }
    }

    /// Populate the difference map and the decision variable set.
    fn first_pass_model_scan(&mut self, model: &Model) {
        for ct in model.ct_ids() {
            if !model.constraint(ct).active {
                continue;
            }
            if model.constraint(ct).tag == "int_lin_eq" {
                self.store_difference(model, ct);
            }
        }

        let mut vars = Vec::new();
        for ann in &model.search_annotations {
            ann.append_all_variables(&mut vars);
        }
        self.decision_variables.extend(vars);
    }

    /// Merge duplicate `int_eq_reif` / `int_ne_reif` constraints over
    /// the same variable and constant by unifying their boolean
    /// output variables.
    fn merge_int_eq_ne(&mut self, model: &mut Model) {
        let mut eq_map: HashMap<(VarId, Int), VarId> = HashMap::new();
        let mut ne_map: HashMap<(VarId, Int), VarId> = HashMap::new();
        for ct in model.ct_ids() {
            let constraint = model.constraint(ct);
            if !constraint.active {
                continue;
            }
            let tag = constraint.tag.as_str();
            if tag != "int_eq_reif" && tag != "int_ne_reif" {
                continue;
            }
            if !constraint.args[2].is_variable() {
                continue;
            }
            let pair = match (&constraint.args[0], &constraint.args[1]) {
                (Argument::VarRef(var), Argument::IntValue(value)) => {
                    Some((*var, *value))
                }
                (Argument::IntValue(value), Argument::VarRef(var)) => {
                    Some((*var, *value))
                }
                _ => None,
            };
            let Some(key) = pair else { continue };
            let boolvar = constraint.args[2].var();
            let map = if tag == "int_eq_reif" {
                &mut eq_map
            } else {
                &mut ne_map
            };
            match map.get(&key) {
                None => {
                    debug!("store {}", model.fzn_constraint(ct));
                    map.insert(key, boolvar);
                }
                Some(&stored) => {
                    debug!("merge {}", model.fzn_constraint(ct));
                    model.mark_inactive(ct);
                    self.add_variable_substitution(model, stored, boolvar);
                }
            }
        }
    }

    /// Run the presolve loop to a fixed point.
    ///
    /// Return `true` if the model was modified.
    pub fn run(&mut self, model: &mut Model) -> bool {
        if self.var_to_constraints.is_empty() {
            for ct in model.ct_ids() {
                for arg in &model.constraint(ct).args {
                    for var in arg.variables() {
                        self.var_to_constraints.entry(*var).or_default().insert(ct);
                    }
                }
            }
        }

        self.first_pass_model_scan(model);

        self.merge_int_eq_ne(model);
        if !self.var_representative_map.is_empty() {
            self.substitute_everywhere(model);
            self.var_representative_map.clear();
        }

        // Presolve the bool2int casts first so that later rules only
        // see one variable per cast pair.
        let mut changed_since_start = false;
        for ct in model.ct_ids() {
            if model.constraint(ct).active && model.constraint(ct).tag == "bool2int" {
                let mut log = String::new();
                changed_since_start |=
                    Self::presolve_bool2int(self, model, ct, &mut log);
            }
        }
        if !self.var_representative_map.is_empty() {
            self.substitute_everywhere(model);
            self.var_representative_map.clear();
        }

        loop {
            let mut changed = false;
            self.var_representative_map.clear();
            for ct in model.ct_ids() {
                if model.constraint(ct).active {
                    changed |= self.presolve_one_constraint(model, ct);
                }
                if !self.var_representative_map.is_empty() {
                    break;
                }
            }
            if !self.var_representative_map.is_empty() {
                self.substitute_everywhere(model);
                self.var_representative_map.clear();
                changed = true;
            }
            changed_since_start |= changed;
            if !changed {
                break;
            }
        }
        changed_since_start
    }
}
