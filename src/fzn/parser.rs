//! Flatzinc parsing.
//!
//! Statements are fed line by line to the `flatzinc` crate and turned
//! into the flat IR. Constraints are kept generic (tag plus argument
//! vector) since the presolver rewrites tags at run time.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::ensure;
use anyhow::Context;
use anyhow::Result;
use flatzinc::AnnExpr;
use flatzinc::ArrayOfBoolExpr;
use flatzinc::ArrayOfIntExpr;
use flatzinc::ConstraintItem;
use flatzinc::Expr;
use flatzinc::IntExpr;
use flatzinc::OptimizationType;
use flatzinc::ParDeclItem;
use flatzinc::SetExpr;
use flatzinc::SetLiteralExpr;
use flatzinc::Stmt;
use flatzinc::VarDeclItem;

use crate::fzn::annotation::Annotation;
use crate::fzn::argument::Argument;
use crate::fzn::constraint::Constraint;
use crate::fzn::domain::Domain;
use crate::fzn::model::Model;
use crate::fzn::output::SolutionOutput;
use crate::fzn::solve::Goal;
use crate::fzn::types::as_int;
use crate::fzn::types::Int;
use crate::fzn::variable::VarId;

/// Convert a flatzinc [OptimizationType] into a [Goal].
pub fn goal_from_optim_type(optim: &OptimizationType) -> Goal {
    match optim {
        OptimizationType::Minimize => Goal::Minimize,
        OptimizationType::Maximize => Goal::Maximize,
    }
}

/// Return `true` iff the annotation asks for output.
///
/// Remark: it only checks the annotation id.
pub fn is_output_anno(anno: &flatzinc::Annotation) -> bool {
    ["output_var", "output_array"].contains(&anno.id.as_str())
}

/// Return `true` iff the annotation marks an introduced variable.
pub fn is_introduced_anno(anno: &flatzinc::Annotation) -> bool {
    anno.id == "var_is_introduced"
}

/// Model under construction, with the name tables that only exist at
/// parse time.
#[derive(Default)]
pub struct ModelBuilder {
    model: Model,
    bool_pars: HashMap<String, bool>,
    int_pars: HashMap<String, Int>,
    bool_array_pars: HashMap<String, Vec<bool>>,
    int_array_pars: HashMap<String, Vec<Int>>,
    variables: HashMap<String, VarId>,
    var_arrays: HashMap<String, Vec<VarId>>,
    const_vars: HashMap<Int, VarId>,
}

impl ModelBuilder {
    /// Get the variable with the given name.
    ///
    /// Fail if no variable has the given name.
    fn get_variable(&self, name: &str) -> Result<VarId> {
        self.variables
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("variable '{}' is not defined", name))
    }

    /// Return a (cached) variable fixed to `value`.
    fn const_var(&mut self, value: Int) -> VarId {
        if let Some(var) = self.const_vars.get(&value) {
            return *var;
        }
        let var = self
            .model
            .new_var(format!("{value}"), Domain::singleton(value), true);
        self.const_vars.insert(value, var);
        var
    }

    fn new_var(&mut self, name: String, domain: Domain, temporary: bool) -> VarId {
        let var = self.model.new_var(name.clone(), domain, temporary);
        self.variables.insert(name, var);
        var
    }
}

/// Parse a flatzinc string into a new [Model].
pub fn parse_model(content: &str) -> Result<Model> {
    let mut builder = ModelBuilder::default();
    let mut nb_solve_items = 0;

    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let is_solve_item = parse_line(line, &mut builder).context(format!(
            "parsing failure at line {}:\n{}\n",
            i + 1,
            line
        ))?;
        if is_solve_item {
            nb_solve_items += 1;
        }
    }

    ensure!(
        nb_solve_items == 1,
        "exactly one solve statement is expected"
    );
    Ok(builder.model)
}

/// Update the builder with the given flatzinc line.
///
/// Return `true` if the line is a solve item.
pub fn parse_line(line: &str, builder: &mut ModelBuilder) -> Result<bool> {
    let statement = Stmt::from_str(line).map_err(|e| anyhow!(e))?;
    let is_solve_item = matches!(statement, Stmt::SolveItem(_));
    match statement {
        Stmt::Comment(_) => {}
        Stmt::Parameter(par_decl_item) => {
            parse_par_decl_item(par_decl_item, builder)?
        }
        Stmt::Variable(var_decl_item) => {
            parse_var_decl_item(var_decl_item, builder)?
        }
        Stmt::Constraint(constraint_item) => {
            parse_constraint_item(constraint_item, builder)?
        }
        Stmt::SolveItem(solve_item) => parse_solve_item(solve_item, builder)?,
        Stmt::Predicate(_) => { /* ignore predicate declaration */ }
    }
    Ok(is_solve_item)
}

/// Update the builder with the given parameter declaration.
pub fn parse_par_decl_item(
    par_decl_item: ParDeclItem,
    builder: &mut ModelBuilder,
) -> Result<()> {
    match par_decl_item {
        ParDeclItem::Bool { id, bool } => {
            builder.bool_pars.insert(id, bool);
        }
        ParDeclItem::Int { id, int } => {
            builder.int_pars.insert(id, int.try_into()?);
        }
        ParDeclItem::ArrayOfBool { ix: _, id, v } => {
            builder.bool_array_pars.insert(id, v);
        }
        ParDeclItem::ArrayOfInt { ix: _, id, v } => {
            let value: Vec<Int> = v.iter().map(|x| *x as Int).collect();
            builder.int_array_pars.insert(id, value);
        }
        _ => bail!("unsupported parameter declaration"),
    }
    Ok(())
}

/// Parse the index ranges of an `output_array` annotation.
///
/// Fall back to a single `1..len` range when the annotation cannot be
/// decoded.
fn output_array_ranges(
    annos: &[flatzinc::Annotation],
    len: usize,
) -> Vec<(Int, Int)> {
    for anno in annos {
        if anno.id != "output_array" {
            continue;
        }
        if let Some(AnnExpr::Expr(Expr::ArrayOfSet(sets))) = anno.expressions.first() {
            let mut ranges = Vec::new();
            for set in sets {
                if let SetExpr::Set(SetLiteralExpr::IntInRange(
                    IntExpr::Int(lb),
                    IntExpr::Int(ub),
                )) = set
                {
                    ranges.push((*lb as Int, *ub as Int));
                }
            }
            if !ranges.is_empty() {
                return ranges;
            }
        }
    }
    vec![(1, len as Int)]
}

/// Update the builder with a variable declaration.
pub fn parse_var_decl_item(
    var_decl_item: VarDeclItem,
    builder: &mut ModelBuilder,
) -> Result<()> {
    match var_decl_item {
        VarDeclItem::Bool { id, expr, annos } => {
            let domain = match expr {
                Some(e) => Domain::singleton(as_int(bool_from_expr(&e.into(), builder)?)),
                None => Domain::boolean(),
            };
            declare_var(id, domain, &annos, builder);
        }
        VarDeclItem::Int { id, expr, annos } => {
            let domain = match expr {
                Some(e) => Domain::singleton(int_from_expr(&e.into(), builder)?),
                None => Domain::all_ints(),
            };
            declare_var(id, domain, &annos, builder);
        }
        VarDeclItem::IntInRange {
            id,
            lb,
            ub,
            expr,
            annos,
        } => {
            let lb = Int::try_from(lb)?;
            let ub = Int::try_from(ub)?;
            let domain = if let Some(e) = expr {
                let value = int_from_expr(&e.into(), builder)?;
                ensure!(
                    lb <= value && value <= ub,
                    "{} is not in {}..{}",
                    value,
                    lb,
                    ub
                );
                Domain::singleton(value)
            } else {
                Domain::interval(lb, ub)
            };
            declare_var(id, domain, &annos, builder);
        }
        VarDeclItem::IntInSet {
            id,
            set,
            expr,
            annos,
        } => {
            let set: Vec<Int> = set.iter().map(|x| *x as Int).collect();
            ensure!(!set.is_empty(), "empty set");
            let domain = if let Some(e) = expr {
                let value = int_from_expr(&e.into(), builder)?;
                ensure!(set.contains(&value), "{} is not in the set", value);
                Domain::singleton(value)
            } else {
                Domain::values(set)
            };
            declare_var(id, domain, &annos, builder);
        }
        VarDeclItem::ArrayOfBool {
            ix: _,
            id,
            annos,
            array_expr,
        } => {
            let e = array_expr.ok_or_else(|| anyhow!("expected array expression"))?;
            let vars = match e {
                ArrayOfBoolExpr::Array(bool_exprs) => bool_exprs
                    .iter()
                    .cloned()
                    .map(|e| var_from_expr(&e.into(), builder))
                    .collect::<Result<Vec<VarId>>>()?,
                ArrayOfBoolExpr::VarParIdentifier(other) => builder
                    .var_arrays
                    .get(&other)
                    .cloned()
                    .ok_or_else(|| anyhow!("array '{}' is not defined", other))?,
            };
            declare_var_array(id, vars, &annos, builder);
        }
        VarDeclItem::ArrayOfInt {
            ix: _,
            id,
            annos,
            array_expr,
        } => {
            let e = array_expr.ok_or_else(|| anyhow!("expected array expression"))?;
            let vars = match e {
                ArrayOfIntExpr::Array(int_exprs) => int_exprs
                    .iter()
                    .cloned()
                    .map(|e| var_from_expr(&e.into(), builder))
                    .collect::<Result<Vec<VarId>>>()?,
                ArrayOfIntExpr::VarParIdentifier(other) => builder
                    .var_arrays
                    .get(&other)
                    .cloned()
                    .ok_or_else(|| anyhow!("array '{}' is not defined", other))?,
            };
            declare_var_array(id, vars, &annos, builder);
        }
        _ => bail!("unsupported variable declaration"),
    }
    Ok(())
}

fn declare_var(
    id: String,
    domain: Domain,
    annos: &[flatzinc::Annotation],
    builder: &mut ModelBuilder,
) {
    let temporary = annos.iter().any(is_introduced_anno);
    let output = annos.iter().any(is_output_anno);
    let var = builder.new_var(id.clone(), domain, temporary);
    if output {
        builder.model.outputs.push(SolutionOutput::scalar(id, var));
    }
}

fn declare_var_array(
    id: String,
    vars: Vec<VarId>,
    annos: &[flatzinc::Annotation],
    builder: &mut ModelBuilder,
) {
    if annos.iter().any(is_output_anno) {
        let ranges = output_array_ranges(annos, vars.len());
        builder
            .model
            .outputs
            .push(SolutionOutput::array(id.clone(), vars.clone(), ranges));
    }
    builder.var_arrays.insert(id, vars);
}

/// Convert a flatzinc [Expr] into a boolean.
pub fn bool_from_expr(expr: &Expr, builder: &ModelBuilder) -> Result<bool> {
    match expr {
        Expr::VarParIdentifier(id) => builder
            .bool_pars
            .get(id)
            .copied()
            .ok_or_else(|| anyhow!("no bool parameter named '{}'", id)),
        Expr::Bool(b) => Ok(*b),
        _ => bail!("not a bool"),
    }
}

/// Convert a flatzinc [Expr] into an [Int].
pub fn int_from_expr(expr: &Expr, builder: &ModelBuilder) -> Result<Int> {
    match expr {
        Expr::VarParIdentifier(id) => {
            if let Some(value) = builder.int_pars.get(id) {
                return Ok(*value);
            }
            if let Some(value) = builder.bool_pars.get(id) {
                return Ok(as_int(*value));
            }
            bail!("no int parameter named '{}'", id)
        }
        Expr::Int(x) => Ok(*x as Int),
        Expr::Bool(b) => Ok(as_int(*b)),
        _ => bail!("not an int"),
    }
}

/// Convert a flatzinc [Expr] into a variable, materializing literals
/// and parameters as cached constant variables.
pub fn var_from_expr(expr: &Expr, builder: &mut ModelBuilder) -> Result<VarId> {
    match expr {
        Expr::VarParIdentifier(id) => {
            if let Ok(var) = builder.get_variable(id) {
                return Ok(var);
            }
            let value = int_from_expr(expr, builder)?;
            Ok(builder.const_var(value))
        }
        _ => {
            let value = int_from_expr(expr, builder)?;
            Ok(builder.const_var(value))
        }
    }
}

/// Convert a flatzinc [Expr] into a constraint [Argument].
pub fn argument_from_expr(expr: &Expr, builder: &mut ModelBuilder) -> Result<Argument> {
    match expr {
        Expr::Bool(b) => Ok(Argument::IntValue(as_int(*b))),
        Expr::Int(x) => Ok(Argument::IntValue(*x as Int)),
        Expr::VarParIdentifier(id) => {
            if let Some(var) = builder.variables.get(id) {
                return Ok(Argument::VarRef(*var));
            }
            if let Some(vars) = builder.var_arrays.get(id) {
                return Ok(Argument::VarRefArray(vars.clone()));
            }
            if let Some(value) = builder.int_pars.get(id) {
                return Ok(Argument::IntValue(*value));
            }
            if let Some(value) = builder.bool_pars.get(id) {
                return Ok(Argument::IntValue(as_int(*value)));
            }
            if let Some(values) = builder.int_array_pars.get(id) {
                return Ok(Argument::IntList(values.clone()));
            }
            if let Some(values) = builder.bool_array_pars.get(id) {
                return Ok(Argument::IntList(
                    values.iter().map(|b| as_int(*b)).collect(),
                ));
            }
            bail!("identifier '{}' is not defined", id)
        }
        Expr::ArrayOfBool(bool_exprs) => {
            let exprs: Vec<Expr> =
                bool_exprs.iter().cloned().map(Expr::from).collect();
            argument_from_element_exprs(&exprs, builder)
        }
        Expr::ArrayOfInt(int_exprs) => {
            let exprs: Vec<Expr> =
                int_exprs.iter().cloned().map(Expr::from).collect();
            argument_from_element_exprs(&exprs, builder)
        }
        Expr::Set(set) => match set {
            SetLiteralExpr::IntInRange(lb, ub) => Ok(Argument::IntInterval(
                int_expr_value(lb, builder)?,
                int_expr_value(ub, builder)?,
            )),
            SetLiteralExpr::SetInts(values) => {
                let values: Result<Vec<Int>> = values
                    .iter()
                    .map(|v| int_expr_value(v, builder))
                    .collect();
                Ok(Argument::IntList(values?))
            }
            _ => bail!("float sets are not supported"),
        },
        _ => bail!("unsupported argument expression"),
    }
}

fn int_expr_value(expr: &IntExpr, builder: &ModelBuilder) -> Result<Int> {
    match expr {
        IntExpr::Int(x) => Ok(*x as Int),
        IntExpr::VarParIdentifier(id) => builder
            .int_pars
            .get(id)
            .copied()
            .ok_or_else(|| anyhow!("no int parameter named '{}'", id)),
    }
}

/// Build an array argument from element expressions: a constant list
/// when every element is a constant, a variable array otherwise.
fn argument_from_element_exprs(
    exprs: &[Expr],
    builder: &mut ModelBuilder,
) -> Result<Argument> {
    let all_constants = exprs.iter().all(|e| match e {
        Expr::Bool(_) | Expr::Int(_) => true,
        Expr::VarParIdentifier(id) => !builder.variables.contains_key(id),
        _ => false,
    });
    if all_constants {
        let values: Result<Vec<Int>> =
            exprs.iter().map(|e| int_from_expr(e, builder)).collect();
        Ok(Argument::IntList(values?))
    } else {
        let vars: Result<Vec<VarId>> =
            exprs.iter().map(|e| var_from_expr(e, builder)).collect();
        Ok(Argument::VarRefArray(vars?))
    }
}

/// Update the builder with the given constraint item.
pub fn parse_constraint_item(
    item: ConstraintItem,
    builder: &mut ModelBuilder,
) -> Result<()> {
    let args: Result<Vec<Argument>> = item
        .exprs
        .iter()
        .map(|e| argument_from_expr(e, builder))
        .collect();
    let mut constraint = Constraint::new(item.id, args?);

    let mut target = None;
    for anno in &item.annos {
        match anno.id.as_str() {
            "domain" => constraint.strong_propagation = true,
            "defines_var" => {
                if let Some(AnnExpr::Expr(Expr::VarParIdentifier(name))) =
                    anno.expressions.first()
                {
                    target = Some(builder.get_variable(name)?);
                }
            }
            _ => {}
        }
    }

    let ct = builder.model.add_constraint(constraint);
    if let Some(var) = target {
        if builder.model.variable(var).defining_constraint.is_none() {
            builder.model.set_target_variable(ct, var);
        }
    }
    Ok(())
}

/// Update the builder with the given solve item.
pub fn parse_solve_item(
    s_item: flatzinc::SolveItem,
    builder: &mut ModelBuilder,
) -> Result<()> {
    for anno in &s_item.annotations {
        let annotation = annotation_from_anno(anno, builder);
        builder.model.search_annotations.push(annotation);
    }
    match s_item.goal {
        flatzinc::Goal::Satisfy => {}
        flatzinc::Goal::OptimizeBool(optim, expr) => {
            let goal = goal_from_optim_type(&optim);
            let variable = var_from_expr(&expr.into(), builder)?;
            builder.model.objective = Some((goal, variable));
        }
        flatzinc::Goal::OptimizeInt(optim, expr) => {
            let goal = goal_from_optim_type(&optim);
            let variable = var_from_expr(&expr.into(), builder)?;
            builder.model.objective = Some((goal, variable));
        }
        _ => bail!("goal '{:?}' is not implemented", s_item.goal),
    };
    Ok(())
}

/// Convert a flatzinc annotation into the annotation IR.
fn annotation_from_anno(
    anno: &flatzinc::Annotation,
    builder: &ModelBuilder,
) -> Annotation {
    if anno.expressions.is_empty() {
        Annotation::Identifier(anno.id.clone())
    } else {
        Annotation::FunctionCall {
            name: anno.id.clone(),
            args: anno
                .expressions
                .iter()
                .map(|e| annotation_from_ann_expr(e, builder))
                .collect(),
        }
    }
}

fn annotation_from_ann_expr(
    expr: &AnnExpr,
    builder: &ModelBuilder,
) -> Annotation {
    match expr {
        AnnExpr::Annotations(annos) => Annotation::List(
            annos
                .iter()
                .map(|a| annotation_from_anno(a, builder))
                .collect(),
        ),
        AnnExpr::String(s) => Annotation::Str(s.clone()),
        AnnExpr::Expr(expr) => annotation_from_expr(expr, builder),
    }
}

fn annotation_from_expr(expr: &Expr, builder: &ModelBuilder) -> Annotation {
    match expr {
        Expr::VarParIdentifier(id) => {
            if let Some(var) = builder.variables.get(id) {
                Annotation::VarRef(*var)
            } else if let Some(vars) = builder.var_arrays.get(id) {
                Annotation::VarRefArray(vars.clone())
            } else {
                Annotation::Identifier(id.clone())
            }
        }
        Expr::Bool(b) => Annotation::IntValue(as_int(*b)),
        Expr::Int(x) => Annotation::IntValue(*x as Int),
        Expr::ArrayOfBool(exprs) => annotation_from_id_array(
            exprs.iter().cloned().map(Expr::from),
            builder,
        ),
        Expr::ArrayOfInt(exprs) => annotation_from_id_array(
            exprs.iter().cloned().map(Expr::from),
            builder,
        ),
        Expr::Set(SetLiteralExpr::IntInRange(lb, ub)) => Annotation::Interval(
            int_expr_value(lb, builder).unwrap_or(0),
            int_expr_value(ub, builder).unwrap_or(0),
        ),
        _ => Annotation::List(Vec::new()),
    }
}

fn annotation_from_id_array(
    exprs: impl Iterator<Item = Expr>,
    builder: &ModelBuilder,
) -> Annotation {
    let items: Vec<Annotation> = exprs
        .map(|e| annotation_from_expr(&e, builder))
        .collect();
    if items.iter().all(|a| matches!(a, Annotation::VarRef(_))) {
        let vars = items
            .iter()
            .map(|a| match a {
                Annotation::VarRef(v) => *v,
                _ => unreachable!(),
            })
            .collect();
        Annotation::VarRefArray(vars)
    } else {
        Annotation::List(items)
    }
}
