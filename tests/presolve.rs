//! End-to-end presolve scenarios on hand-built and parsed models.

use fzn_presolve::fzn::parser::parse_model;
use fzn_presolve::fzn::Argument;
use fzn_presolve::fzn::Constraint;
use fzn_presolve::fzn::Domain;
use fzn_presolve::fzn::Model;
use fzn_presolve::fzn::VarId;
use fzn_presolve::presolve::Presolver;

fn int_var(model: &mut Model, name: &str, lo: i64, hi: i64) -> VarId {
    model.new_var(name, Domain::interval(lo, hi), false)
}

fn bool_var(model: &mut Model, name: &str) -> VarId {
    model.new_var(name, Domain::boolean(), false)
}

/// No active constraint may reference an inactive variable.
fn assert_active_subset_consistency(model: &Model) {
    for ct in model.ct_ids() {
        let constraint = model.constraint(ct);
        if !constraint.active {
            continue;
        }
        for arg in &constraint.args {
            for var in arg.variables() {
                assert!(
                    model.variable(*var).active,
                    "active constraint {} references inactive variable {}",
                    model.fzn_constraint(ct),
                    model.variable(*var).name
                );
            }
        }
    }
}

/// Every defined variable points back at its single defining
/// constraint.
fn assert_single_defining_constraint(model: &Model) {
    for var in model.var_ids() {
        if let Some(ct) = model.variable(var).defining_constraint {
            assert_eq!(model.constraint(ct).target_variable, Some(var));
            for other in model.ct_ids() {
                if other != ct && model.constraint(other).active {
                    assert_ne!(model.constraint(other).target_variable, Some(var));
                }
            }
        }
    }
}

#[test]
fn fixed_equality_is_presolved_out() {
    let mut model = Model::new();
    let x = int_var(&mut model, "x", 0, 10);
    let ct = model.add_constraint(Constraint::new(
        "int_eq",
        vec![Argument::VarRef(x), Argument::IntValue(5)],
    ));
    Presolver::new().run(&mut model);
    assert!(!model.constraint(ct).active);
    assert_eq!(model.variable(x).domain, Domain::interval(5, 5));
    assert_active_subset_consistency(&model);
}

#[test]
fn bool2int_substitutes_the_integer_view() {
    let mut model = Model::new();
    let b = bool_var(&mut model, "b");
    let x = int_var(&mut model, "x", 0, 1);
    let y = bool_var(&mut model, "y");
    let cast = model.add_constraint(Constraint::new(
        "bool2int",
        vec![Argument::VarRef(b), Argument::VarRef(x)],
    ));
    let le = model.add_constraint(Constraint::new(
        "int_le",
        vec![Argument::VarRef(x), Argument::VarRef(y)],
    ));
    Presolver::new().run(&mut model);
    assert!(!model.constraint(cast).active);
    assert!(!model.variable(x).active);
    // Any later use of x appears as b.
    assert_eq!(model.constraint(le).args[0], Argument::VarRef(b));
    assert_active_subset_consistency(&model);
}

#[test]
fn array_bool_or_with_fixed_true_member_is_inactive() {
    let mut model = Model::new();
    let b1 = bool_var(&mut model, "b1");
    let b2 = model.new_var("b2", Domain::singleton(1), false);
    let b3 = bool_var(&mut model, "b3");
    let t = bool_var(&mut model, "t");
    let ct = model.add_constraint(Constraint::new(
        "array_bool_or",
        vec![
            Argument::VarRefArray(vec![b1, b2, b3]),
            Argument::VarRef(t),
        ],
    ));
    Presolver::new().run(&mut model);
    assert!(!model.constraint(ct).active);
    assert_eq!(model.variable(t).domain, Domain::singleton(1));
}

#[test]
fn array_bool_or_with_false_target_forces_members() {
    let mut model = Model::new();
    let b1 = bool_var(&mut model, "b1");
    let b2 = bool_var(&mut model, "b2");
    let b3 = bool_var(&mut model, "b3");
    let ct = model.add_constraint(Constraint::new(
        "array_bool_or",
        vec![
            Argument::VarRefArray(vec![b1, b2, b3]),
            Argument::IntValue(0),
        ],
    ));
    Presolver::new().run(&mut model);
    assert!(!model.constraint(ct).active);
    for var in [b1, b2, b3] {
        assert_eq!(model.variable(var).domain, Domain::interval(0, 0));
    }
}

#[test]
fn difference_recognition_rewrites_zero_equality() {
    let mut model = Model::new();
    let x = int_var(&mut model, "x", 0, 9);
    let y = int_var(&mut model, "y", 0, 9);
    let z = int_var(&mut model, "z", -9, 9);
    model.add_constraint(Constraint::new(
        "int_lin_eq",
        vec![
            Argument::IntList(vec![1, -1, 1]),
            Argument::VarRefArray(vec![x, y, z]),
            Argument::IntValue(0),
        ],
    ));
    let eq = model.add_constraint(Constraint::new(
        "int_eq",
        vec![Argument::VarRef(z), Argument::IntValue(0)],
    ));
    Presolver::new().run(&mut model);
    // z is fixed to 0 and the null difference merged x and y.
    assert_eq!(model.variable(z).domain, Domain::interval(0, 0));
    assert!(!model.constraint(eq).active);
    assert!(
        !model.variable(x).active || !model.variable(y).active,
        "x and y should have been merged"
    );
    assert_active_subset_consistency(&model);
}

#[test]
fn element_target_domain_is_reduced_to_reachable_values() {
    let mut model = Model::new();
    let i = int_var(&mut model, "i", 2, 3);
    let t = int_var(&mut model, "t", 0, 99);
    let ct = model.add_constraint(Constraint::new(
        "array_int_element",
        vec![
            Argument::VarRef(i),
            Argument::IntList(vec![10, 20, 30, 40]),
            Argument::VarRef(t),
        ],
    ));
    Presolver::new().run(&mut model);
    assert!(model.constraint(ct).active);
    assert_eq!(model.variable(t).domain, Domain::Values(vec![20, 30]));
}

#[test]
fn min_chain_is_rebuilt_as_minimum_int() {
    let mut model = Model::new();
    let x = int_var(&mut model, "x", 0, 9);
    let y = int_var(&mut model, "y", 0, 9);
    let z = int_var(&mut model, "z", 0, 9);
    let t1 = model.new_var("t1", Domain::interval(0, 9), true);
    let t2 = model.new_var("t2", Domain::interval(0, 9), true);
    let t3 = model.new_var("t3", Domain::interval(0, 9), true);
    let start = model.add_constraint(Constraint::new(
        "int_min",
        vec![
            Argument::VarRef(x),
            Argument::VarRef(x),
            Argument::VarRef(t1),
        ],
    ));
    model.add_constraint(Constraint::new(
        "int_min",
        vec![
            Argument::VarRef(y),
            Argument::VarRef(t1),
            Argument::VarRef(t2),
        ],
    ));
    model.add_constraint(Constraint::new(
        "int_min",
        vec![
            Argument::VarRef(z),
            Argument::VarRef(t2),
            Argument::VarRef(t3),
        ],
    ));
    let mut presolver = Presolver::new();
    presolver.cleanup_for_solver(&mut model, false);
    let regrouped = model.constraint(start);
    assert_eq!(regrouped.tag, "minimum_int");
    assert_eq!(regrouped.args[0], Argument::VarRef(t3));
    assert_eq!(regrouped.args[1], Argument::VarRefArray(vec![x, y, z]));
    assert!(!model.variable(t1).active);
    assert!(!model.variable(t2).active);
    assert_single_defining_constraint(&model);
}

#[test]
fn run_is_idempotent() {
    let content = "\
var 0..10: x;
var 0..10: y;
var bool: b;
constraint int_le_reif(x, 4, b);
constraint int_le(x, y);
constraint int_ne(y, 10);
solve satisfy;
";
    let mut model = parse_model(content).expect("model should parse");
    Presolver::new().run(&mut model);
    let after_first = model.fzn();
    Presolver::new().run(&mut model);
    assert_eq!(model.fzn(), after_first);
}

#[test]
fn domains_never_grow() {
    let content = "\
var 0..10: x;
var 2..8: y;
var bool: b;
constraint int_le(x, y);
constraint int_eq_reif(x, 12, b);
solve satisfy;
";
    let mut model = parse_model(content).expect("model should parse");
    let before: Vec<(i64, i64)> = model
        .var_ids()
        .map(|v| {
            let d = &model.variable(v).domain;
            (d.min(), d.max())
        })
        .collect();
    Presolver::new().run(&mut model);
    for (v, (lo, hi)) in model.var_ids().zip(before) {
        let domain = &model.variable(v).domain;
        assert!(domain.min() >= lo, "lower bound grew");
        assert!(domain.max() <= hi, "upper bound grew");
    }
    // x == 12 is impossible: b must be false.
    let b = model
        .var_ids()
        .find(|v| model.variable(*v).name == "b")
        .unwrap();
    assert_eq!(model.variable(b).domain, Domain::interval(0, 0));
}

#[test]
fn parsed_model_round_trip_through_presolve() {
    let content = "\
array [1..4] of int: values = [10, 20, 30, 40];
var 1..4: i :: output_var;
var 0..99: t :: output_var;
var 0..10: x;
constraint array_int_element(i, values, t);
constraint int_eq(x, 3);
solve satisfy;
";
    let mut model = parse_model(content).expect("model should parse");
    let mut presolver = Presolver::new();
    presolver.run(&mut model);
    presolver.cleanup_for_solver(&mut model, false);
    assert_active_subset_consistency(&model);
    assert_single_defining_constraint(&model);
    let x = model
        .var_ids()
        .find(|v| model.variable(*v).name == "x")
        .unwrap();
    assert_eq!(model.variable(x).domain, Domain::interval(3, 3));
    // Output specs survive the run.
    assert_eq!(model.outputs.len(), 2);
}

#[test]
fn unsatisfiable_inequality_becomes_false_constraint() {
    let mut model = Model::new();
    let ct = model.add_constraint(Constraint::new(
        "int_gt",
        vec![Argument::IntValue(1), Argument::IntValue(2)],
    ));
    Presolver::new().run(&mut model);
    assert_eq!(model.constraint(ct).tag, "false_constraint");
    assert!(model.constraint(ct).active);
    assert!(model.constraint(ct).args.is_empty());
}

#[test]
fn merged_reified_equalities_share_one_boolean() {
    let mut model = Model::new();
    let x = int_var(&mut model, "x", 0, 9);
    let b1 = bool_var(&mut model, "b1");
    let b2 = bool_var(&mut model, "b2");
    let first = model.add_constraint(Constraint::new(
        "int_eq_reif",
        vec![
            Argument::VarRef(x),
            Argument::IntValue(4),
            Argument::VarRef(b1),
        ],
    ));
    let second = model.add_constraint(Constraint::new(
        "int_eq_reif",
        vec![
            Argument::VarRef(x),
            Argument::IntValue(4),
            Argument::VarRef(b2),
        ],
    ));
    Presolver::new().run(&mut model);
    assert!(!model.constraint(second).active);
    assert!(model.constraint(first).active);
    // One of the two booleans survives and is used by the kept
    // constraint.
    let kept = model.constraint(first).args[2].var();
    assert!(model.variable(kept).active);
    assert!(!model.variable(if kept == b1 { b2 } else { b1 }).active);
    assert_active_subset_consistency(&model);
}
