//! Rewrite rule library.
//!
//! Rules are grouped by constraint family. Each rule is a method on
//! [Presolver] with the shared [crate::presolve::Rule] signature and
//! is idempotent on its own output.

pub mod arith;
pub mod boolean;
pub mod comparison;
pub mod element;
pub mod linear;

use crate::fzn::argument::Argument;
use crate::fzn::model::Model;
use crate::fzn::types::Int;
use crate::fzn::types::INT_MAX;
use crate::fzn::types::INT_MIN;
use crate::fzn::variable::VarId;

/// Return `true` if the variable currently has the boolean domain.
pub(crate) fn has_01_values(model: &Model, var: VarId) -> bool {
    let domain = &model.variable(var).domain;
    domain.min() == 0 && domain.max() == 1
}

pub(crate) fn is_0_or_1(value: Int) -> bool {
    value == 0 || value == 1
}

/// Return `true` if every value is 0 or 1.
pub(crate) fn is_array_boolean(values: &[Int]) -> bool {
    values.iter().all(|v| is_0_or_1(*v))
}

/// Return `true` if the values contain at most one 0 or at most one 1.
pub(crate) fn only_one_0_or_only_one_1(values: &[Int]) -> bool {
    let mut nb_zero = 0;
    let mut nb_one = 0;
    for value in values {
        if *value != 0 {
            nb_one += 1;
        } else {
            nb_zero += 1;
        }
        if nb_one > 1 && nb_zero > 1 {
            return false;
        }
    }
    true
}

/// Intersect the domain of `var` with the values described by a
/// constant argument.
///
/// Panic on a non-constant argument: the caller violated the shape
/// contract of its constraint.
pub(crate) fn intersect_var_domain_with_arg(
    model: &mut Model,
    var: VarId,
    arg: &Argument,
) -> bool {
    match arg {
        Argument::IntValue(value) => model
            .variable_mut(var)
            .domain
            .intersect_with_interval(*value, *value),
        Argument::IntInterval(lo, hi) => model
            .variable_mut(var)
            .domain
            .intersect_with_interval(*lo, *hi),
        Argument::IntList(values) => {
            model.variable_mut(var).domain.intersect_with_values(values)
        }
        _ => panic!("wrong domain argument {arg:?}"),
    }
}

/// Compute the exact bounds of a scalar product.
///
/// Return `None` when a bound cannot be computed without overflow or
/// when a variable is unbounded.
pub(crate) fn compute_lin_bounds(
    model: &Model,
    coefficients: &[Int],
    variables: &[VarId],
) -> Option<(Int, Int)> {
    assert_eq!(coefficients.len(), variables.len(), "wrong constraint");
    let mut lb: Int = 0;
    let mut ub: Int = 0;
    for (coef, var) in coefficients.iter().zip(variables) {
        if *coef == 0 {
            continue;
        }
        let domain = &model.variable(*var).domain;
        let vmin = domain.min();
        let vmax = domain.max();
        if vmin == INT_MIN || vmax == INT_MAX {
            return None;
        }
        let min_delta = if *coef > 0 {
            vmin.saturating_mul(*coef)
        } else {
            vmax.saturating_mul(*coef)
        };
        let max_delta = if *coef > 0 {
            vmax.saturating_mul(*coef)
        } else {
            vmin.saturating_mul(*coef)
        };
        lb = lb.saturating_add(min_delta);
        ub = ub.saturating_add(max_delta);
        if lb == INT_MIN
            || ub == INT_MAX
            || min_delta == INT_MIN
            || min_delta == INT_MAX
            || max_delta == INT_MIN
            || max_delta == INT_MAX
        {
            return None;
        }
    }
    Some((lb, ub))
}

/// Return `true` if the values are consecutive increasing integers.
pub(crate) fn is_increasing_contiguous(values: &[Int]) -> bool {
    values.windows(2).all(|w| w[1] == w[0] + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fzn::domain::Domain;

    #[test]
    fn boolean_array_helpers() {
        assert!(is_array_boolean(&[0, 1, 1, 0]));
        assert!(!is_array_boolean(&[0, 2]));
        assert!(only_one_0_or_only_one_1(&[1, 1, 1, 0]));
        assert!(only_one_0_or_only_one_1(&[0, 0, 1]));
        assert!(!only_one_0_or_only_one_1(&[0, 0, 1, 1]));
    }

    #[test]
    fn lin_bounds_with_overflow() {
        let mut model = Model::new();
        let x = model.new_var("x", Domain::interval(2, 3), false);
        let y = model.new_var("y", Domain::interval(-1, 4), false);
        assert_eq!(
            compute_lin_bounds(&model, &[2, -1], &[x, y]),
            Some((0, 7))
        );
        let huge = model.new_var("huge", Domain::interval(0, INT_MAX / 2), false);
        assert_eq!(compute_lin_bounds(&model, &[4], &[huge]), None);
        let unbounded = model.new_var("u", Domain::all_ints(), false);
        assert_eq!(compute_lin_bounds(&model, &[1], &[unbounded]), None);
    }

    #[test]
    fn contiguous_detection() {
        assert!(is_increasing_contiguous(&[4, 5, 6]));
        assert!(!is_increasing_contiguous(&[4, 6, 7]));
        assert!(is_increasing_contiguous(&[9]));
    }
}
