//! Variable equivalence and substitution.
//!
//! Equivalences recorded by the rules are kept in a union-find map
//! and only materialized by [Presolver::substitute_everywhere], so
//! that every rule observes a consistent snapshot of the model.

use log::debug;

use crate::fzn::argument::Argument;
use crate::fzn::model::Model;
use crate::fzn::variable::VarId;
use crate::presolve::Presolver;

impl Presolver {
    /// Record that `from` is replaced by `to`.
    ///
    /// Both sides are resolved to their current representatives
    /// first. A temporary variable never survives a merge with a
    /// non-temporary one. The survivor absorbs the domain of the
    /// eliminated variable and its defining constraint when it has
    /// none; conflicting defining constraints are broken on the
    /// eliminated side.
    pub fn add_variable_substitution(
        &mut self,
        model: &mut Model,
        from: VarId,
        to: VarId,
    ) {
        let mut from = self.find_representative(from);
        let mut to = self.find_representative(to);
        if model.variable(to).temporary {
            // Keep a non temporary variable as representative.
            std::mem::swap(&mut from, &mut to);
        }
        if from == to {
            return;
        }
        debug!(
            "mark {} as equivalent to {}",
            model.variable(from).name,
            model.variable(to).name
        );
        if model.variable(from).defining_constraint.is_some()
            && model.variable(to).defining_constraint.is_some()
        {
            let broken = model.variable(from).defining_constraint.unwrap();
            debug!("  - break target variable on {}", model.fzn_constraint(broken));
            model.remove_target_variable(broken);
        }
        let from_domain = model.variable(from).domain.clone();
        let from_defining = model.variable(from).defining_constraint;
        let from_temporary = model.variable(from).temporary;
        let from_name = model.variable(from).name.clone();
        let survivor = model.variable_mut(to);
        if survivor.temporary && !from_temporary {
            survivor.temporary = false;
            survivor.name = from_name;
        }
        if survivor.defining_constraint.is_none() {
            survivor.defining_constraint = from_defining;
        }
        survivor.domain.intersect_with_domain(&from_domain);
        model.variable_mut(from).active = false;
        self.var_representative_map.insert(from, to);
    }

    /// Return the representative of `var`, compressing the walked
    /// path.
    pub fn find_representative(&mut self, var: VarId) -> VarId {
        let mut root = var;
        while let Some(parent) = self.var_representative_map.get(&root) {
            if *parent == root {
                break;
            }
            root = *parent;
        }
        let mut current = var;
        while current != root {
            let parent = self.var_representative_map[&current];
            self.var_representative_map.insert(current, root);
            current = parent;
        }
        root
    }

    /// Replace every substituted variable by its representative in
    /// constraints, search annotations, output specifications and the
    /// objective, then re-merge domains that evolved after the merge.
    pub fn substitute_everywhere(&mut self, model: &mut Model) {
        // Rules may have rewired arguments since the reverse index
        // was built, so every active constraint is inspected.
        for ct in model.ct_ids() {
            if !model.constraint(ct).active {
                continue;
            }
            let nb_args = model.constraint(ct).args.len();
            for i in 0..nb_args {
                match &mut model.constraint_mut(ct).args[i] {
                    Argument::VarRef(var) => {
                        let rep = self.find_representative(*var);
                        if rep != *var {
                            *var = rep;
                            self.var_to_constraints.entry(rep).or_default().insert(ct);
                        }
                    }
                    Argument::VarRefArray(vars) => {
                        for var in vars {
                            let rep = self.find_representative(*var);
                            if rep != *var {
                                *var = rep;
                                self.var_to_constraints
                                    .entry(rep)
                                    .or_default()
                                    .insert(ct);
                            }
                        }
                    }
                    _ => {}
                }
            }
            if let Some(target) = model.constraint(ct).target_variable {
                let rep = self.find_representative(target);
                model.constraint_mut(ct).target_variable = Some(rep);
            }
        }

        // Rewrite the search annotations.
        let mut annotations = std::mem::take(&mut model.search_annotations);
        for annotation in &mut annotations {
            annotation.rewrite_variables(&mut |var| self.find_representative(var));
        }
        model.search_annotations = annotations;

        // Rewrite the output specifications and the objective.
        let mut outputs = std::mem::take(&mut model.outputs);
        for output in &mut outputs {
            output.variable = output.variable.map(|var| self.find_representative(var));
            for var in &mut output.flat_variables {
                *var = self.find_representative(*var);
            }
        }
        model.outputs = outputs;
        if let Some((goal, var)) = model.objective {
            model.objective = Some((goal, self.find_representative(var)));
        }

        // Merge domains that could have been tightened on the
        // substituted side after the merge.
        let pairs: Vec<(VarId, VarId)> = self
            .var_representative_map
            .iter()
            .map(|(from, to)| (*from, *to))
            .collect();
        for (from, to) in pairs {
            let from_domain = model.variable(from).domain.clone();
            model
                .variable_mut(to)
                .domain
                .intersect_with_domain(&from_domain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fzn::constraint::Constraint;
    use crate::fzn::domain::Domain;

    fn two_var_model() -> (Model, VarId, VarId) {
        let mut model = Model::new();
        let x = model.new_var("x", Domain::interval(0, 10), false);
        let y = model.new_var("y", Domain::interval(3, 12), false);
        (model, x, y)
    }

    #[test]
    fn representative_closure() {
        let (mut model, x, y) = two_var_model();
        let z = model.new_var("z", Domain::interval(0, 5), false);
        let mut presolver = Presolver::new();
        presolver.add_variable_substitution(&mut model, x, y);
        presolver.add_variable_substitution(&mut model, y, z);
        let rep = presolver.find_representative(x);
        assert_eq!(rep, presolver.find_representative(rep));
        assert_eq!(rep, presolver.find_representative(y));
    }

    #[test]
    fn merge_intersects_domains_and_deactivates() {
        let (mut model, x, y) = two_var_model();
        let mut presolver = Presolver::new();
        presolver.add_variable_substitution(&mut model, x, y);
        assert!(!model.variable(x).active);
        assert_eq!(model.variable(y).domain, Domain::interval(3, 10));
    }

    #[test]
    fn temporary_side_is_eliminated() {
        let mut model = Model::new();
        let x = model.new_var("x", Domain::interval(0, 10), false);
        let tmp = model.new_var("tmp", Domain::interval(0, 10), true);
        let mut presolver = Presolver::new();
        // `to` is temporary: the sides are swapped so that the named
        // variable survives.
        presolver.add_variable_substitution(&mut model, x, tmp);
        assert!(model.variable(x).active);
        assert!(!model.variable(tmp).active);
        assert_eq!(presolver.find_representative(tmp), x);
    }

    #[test]
    fn substitution_rewrites_constraints_and_outputs() {
        let (mut model, x, y) = two_var_model();
        let ct = model.add_constraint(Constraint::new(
            "int_le",
            vec![Argument::VarRef(x), Argument::IntValue(7)],
        ));
        model.outputs.push(crate::fzn::SolutionOutput::scalar("x", x));
        let mut presolver = Presolver::new();
        presolver.var_to_constraints.entry(x).or_default().insert(ct);
        presolver.add_variable_substitution(&mut model, x, y);
        presolver.substitute_everywhere(&mut model);
        assert_eq!(model.constraint(ct).args[0], Argument::VarRef(y));
        assert_eq!(model.outputs[0].variable, Some(y));
    }
}
