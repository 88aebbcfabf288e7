//! First-order formulas and the formula kernel: capture-free substitution,
//! the arithmetic simplifier, a sound-but-incomplete linear-arithmetic
//! decider, and function unfolding.
//!
//! All operations build fresh values; nothing here mutates a formula in
//! place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ast::{CmpOp, CtorId, FuncBinop, FuncExpr, FuncId, JudgmentId, SortId};
use crate::error::{Error, Result};
use crate::theory::Theory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Formula {
    True,
    False,
    Forall {
        var: String,
        sort: SortId,
        body: Box<Formula>,
    },
    Exists {
        var: String,
        sort: SortId,
        body: Box<Formula>,
    },
    Implies(Box<Formula>, Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Not(Box<Formula>),
    /// A judgment applied to expressions.
    Judgment {
        judgment: JudgmentId,
        args: Vec<FormulaExpr>,
    },
    TermEq(FormulaExpr, FormulaExpr),
    TermNeq(FormulaExpr, FormulaExpr),
    /// Numeric comparison between integer-valued expressions.
    Num {
        op: CmpOp,
        lhs: FormulaExpr,
        rhs: FormulaExpr,
    },
    SetEq(FormulaExpr, FormulaExpr),
    SetIn {
        element: FormulaExpr,
        set: FormulaExpr,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormulaExpr {
    Var(String),
    Int(i64),
    EmptySet,
    Ctor {
        ctor: CtorId,
        args: Vec<FormulaExpr>,
    },
    FuncApp {
        func: FuncId,
        args: Vec<FormulaExpr>,
    },
    Arith {
        op: ArithOp,
        lhs: Box<FormulaExpr>,
        rhs: Box<FormulaExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Max,
    Min,
}

impl ArithOp {
    fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            ArithOp::Add => lhs.saturating_add(rhs),
            ArithOp::Sub => lhs.saturating_sub(rhs),
            ArithOp::Mul => lhs.saturating_mul(rhs),
            ArithOp::Max => lhs.max(rhs),
            ArithOp::Min => lhs.min(rhs),
        }
    }
}

impl FormulaExpr {
    pub fn var(name: impl Into<String>) -> FormulaExpr {
        FormulaExpr::Var(name.into())
    }

    pub fn arith(op: ArithOp, lhs: FormulaExpr, rhs: FormulaExpr) -> FormulaExpr {
        FormulaExpr::Arith {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

/// Free variables of an expression.
pub fn expr_free_vars(expr: &FormulaExpr, out: &mut BTreeSet<String>) {
    match expr {
        FormulaExpr::Var(name) => {
            out.insert(name.clone());
        }
        FormulaExpr::Int(_) | FormulaExpr::EmptySet => {}
        FormulaExpr::Ctor { args, .. } | FormulaExpr::FuncApp { args, .. } => {
            for a in args {
                expr_free_vars(a, out);
            }
        }
        FormulaExpr::Arith { lhs, rhs, .. } => {
            expr_free_vars(lhs, out);
            expr_free_vars(rhs, out);
        }
    }
}

/// Substitute `replacement` for the variable `var` in an expression.
pub fn subst_expr(expr: &FormulaExpr, var: &str, replacement: &FormulaExpr) -> FormulaExpr {
    match expr {
        FormulaExpr::Var(name) if name == var => replacement.clone(),
        FormulaExpr::Var(_) | FormulaExpr::Int(_) | FormulaExpr::EmptySet => expr.clone(),
        FormulaExpr::Ctor { ctor, args } => FormulaExpr::Ctor {
            ctor: ctor.clone(),
            args: args.iter().map(|a| subst_expr(a, var, replacement)).collect(),
        },
        FormulaExpr::FuncApp { func, args } => FormulaExpr::FuncApp {
            func: func.clone(),
            args: args.iter().map(|a| subst_expr(a, var, replacement)).collect(),
        },
        FormulaExpr::Arith { op, lhs, rhs } => FormulaExpr::arith(
            *op,
            subst_expr(lhs, var, replacement),
            subst_expr(rhs, var, replacement),
        ),
    }
}

/// Substitute `replacement` for `var` throughout a formula. A quantifier
/// binding the same name shadows: its body is left untouched. Bound names
/// are never renamed; callers keep witnesses clear of the goal's binders.
pub fn subst_formula(formula: &Formula, var: &str, replacement: &FormulaExpr) -> Formula {
    match formula {
        Formula::True | Formula::False => formula.clone(),
        Formula::Forall { var: v, sort, body } => {
            if v == var {
                formula.clone()
            } else {
                Formula::Forall {
                    var: v.clone(),
                    sort: sort.clone(),
                    body: Box::new(subst_formula(body, var, replacement)),
                }
            }
        }
        Formula::Exists { var: v, sort, body } => {
            if v == var {
                formula.clone()
            } else {
                Formula::Exists {
                    var: v.clone(),
                    sort: sort.clone(),
                    body: Box::new(subst_formula(body, var, replacement)),
                }
            }
        }
        Formula::Implies(l, r) => Formula::Implies(
            Box::new(subst_formula(l, var, replacement)),
            Box::new(subst_formula(r, var, replacement)),
        ),
        Formula::And(l, r) => Formula::And(
            Box::new(subst_formula(l, var, replacement)),
            Box::new(subst_formula(r, var, replacement)),
        ),
        Formula::Or(l, r) => Formula::Or(
            Box::new(subst_formula(l, var, replacement)),
            Box::new(subst_formula(r, var, replacement)),
        ),
        Formula::Not(f) => Formula::Not(Box::new(subst_formula(f, var, replacement))),
        Formula::Judgment { judgment, args } => Formula::Judgment {
            judgment: judgment.clone(),
            args: args.iter().map(|a| subst_expr(a, var, replacement)).collect(),
        },
        Formula::TermEq(l, r) => Formula::TermEq(
            subst_expr(l, var, replacement),
            subst_expr(r, var, replacement),
        ),
        Formula::TermNeq(l, r) => Formula::TermNeq(
            subst_expr(l, var, replacement),
            subst_expr(r, var, replacement),
        ),
        Formula::Num { op, lhs, rhs } => Formula::Num {
            op: *op,
            lhs: subst_expr(lhs, var, replacement),
            rhs: subst_expr(rhs, var, replacement),
        },
        Formula::SetEq(l, r) => Formula::SetEq(
            subst_expr(l, var, replacement),
            subst_expr(r, var, replacement),
        ),
        Formula::SetIn { element, set } => Formula::SetIn {
            element: subst_expr(element, var, replacement),
            set: subst_expr(set, var, replacement),
        },
    }
}

/// True iff some quantifier inside `formula` binds one of `names`.
pub fn binds_any(formula: &Formula, names: &BTreeSet<String>) -> bool {
    match formula {
        Formula::Forall { var, body, .. } | Formula::Exists { var, body, .. } => {
            names.contains(var) || binds_any(body, names)
        }
        Formula::Implies(l, r) | Formula::And(l, r) | Formula::Or(l, r) => {
            binds_any(l, names) || binds_any(r, names)
        }
        Formula::Not(f) => binds_any(f, names),
        _ => false,
    }
}

/// Arithmetic simplifier. Fully folds constant subexpressions and applies
/// the unit/absorption/idempotence identities; one bottom-up pass, so a
/// second application is a no-op.
pub fn simplify_expr(expr: &FormulaExpr) -> FormulaExpr {
    match expr {
        FormulaExpr::Var(_) | FormulaExpr::Int(_) | FormulaExpr::EmptySet => expr.clone(),
        FormulaExpr::Ctor { ctor, args } => FormulaExpr::Ctor {
            ctor: ctor.clone(),
            args: args.iter().map(simplify_expr).collect(),
        },
        FormulaExpr::FuncApp { func, args } => FormulaExpr::FuncApp {
            func: func.clone(),
            args: args.iter().map(simplify_expr).collect(),
        },
        FormulaExpr::Arith { op, lhs, rhs } => {
            let lhs = simplify_expr(lhs);
            let rhs = simplify_expr(rhs);
            if let (FormulaExpr::Int(a), FormulaExpr::Int(b)) = (&lhs, &rhs) {
                return FormulaExpr::Int(op.apply(*a, *b));
            }
            match op {
                ArithOp::Add => {
                    if lhs == FormulaExpr::Int(0) {
                        return rhs;
                    }
                    if rhs == FormulaExpr::Int(0) {
                        return lhs;
                    }
                }
                ArithOp::Sub => {
                    if rhs == FormulaExpr::Int(0) {
                        return lhs;
                    }
                    if lhs == rhs {
                        return FormulaExpr::Int(0);
                    }
                }
                ArithOp::Mul => {
                    if lhs == FormulaExpr::Int(0) || rhs == FormulaExpr::Int(0) {
                        return FormulaExpr::Int(0);
                    }
                    if lhs == FormulaExpr::Int(1) {
                        return rhs;
                    }
                    if rhs == FormulaExpr::Int(1) {
                        return lhs;
                    }
                }
                ArithOp::Max | ArithOp::Min => {
                    if lhs == rhs {
                        return lhs;
                    }
                }
            }
            FormulaExpr::arith(*op, lhs, rhs)
        }
    }
}

/// Formula-level simplifier: simplifies embedded expressions, folds ground
/// comparisons, and collapses connectives with constant operands.
pub fn simplify_formula(formula: &Formula) -> Formula {
    match formula {
        Formula::True | Formula::False => formula.clone(),
        Formula::Forall { var, sort, body } => Formula::Forall {
            var: var.clone(),
            sort: sort.clone(),
            body: Box::new(simplify_formula(body)),
        },
        Formula::Exists { var, sort, body } => Formula::Exists {
            var: var.clone(),
            sort: sort.clone(),
            body: Box::new(simplify_formula(body)),
        },
        Formula::Implies(l, r) => {
            match (simplify_formula(l), simplify_formula(r)) {
                (Formula::True, r) => r,
                (Formula::False, _) => Formula::True,
                (_, Formula::True) => Formula::True,
                (l, r) => Formula::Implies(Box::new(l), Box::new(r)),
            }
        }
        Formula::And(l, r) => match (simplify_formula(l), simplify_formula(r)) {
            (Formula::True, r) => r,
            (l, Formula::True) => l,
            (Formula::False, _) | (_, Formula::False) => Formula::False,
            (l, r) => Formula::And(Box::new(l), Box::new(r)),
        },
        Formula::Or(l, r) => match (simplify_formula(l), simplify_formula(r)) {
            (Formula::True, _) | (_, Formula::True) => Formula::True,
            (Formula::False, r) => r,
            (l, Formula::False) => l,
            (l, r) => Formula::Or(Box::new(l), Box::new(r)),
        },
        Formula::Not(f) => match simplify_formula(f) {
            Formula::True => Formula::False,
            Formula::False => Formula::True,
            f => Formula::Not(Box::new(f)),
        },
        Formula::Judgment { judgment, args } => Formula::Judgment {
            judgment: judgment.clone(),
            args: args.iter().map(simplify_expr).collect(),
        },
        Formula::TermEq(l, r) => {
            let l = simplify_expr(l);
            let r = simplify_expr(r);
            if l == r {
                Formula::True
            } else {
                Formula::TermEq(l, r)
            }
        }
        Formula::TermNeq(l, r) => Formula::TermNeq(simplify_expr(l), simplify_expr(r)),
        Formula::Num { op, lhs, rhs } => {
            let lhs = simplify_expr(lhs);
            let rhs = simplify_expr(rhs);
            if let (FormulaExpr::Int(a), FormulaExpr::Int(b)) = (&lhs, &rhs) {
                if op.apply(*a, *b) {
                    return Formula::True;
                }
                return Formula::False;
            }
            Formula::Num { op: *op, lhs, rhs }
        }
        Formula::SetEq(l, r) => Formula::SetEq(simplify_expr(l), simplify_expr(r)),
        Formula::SetIn { element, set } => Formula::SetIn {
            element: simplify_expr(element),
            set: simplify_expr(set),
        },
    }
}

/// Sound, incomplete prover for `lhs ≥ rhs` under the given hypotheses.
/// Both sides are simplified before any rule applies.
pub fn can_prove_geq(lhs: &FormulaExpr, rhs: &FormulaExpr, hyps: &[&Formula]) -> bool {
    let lhs = simplify_expr(lhs);
    let rhs = simplify_expr(rhs);
    geq(&lhs, &rhs, hyps)
}

/// Strict counterpart of [`can_prove_geq`].
pub fn can_prove_gt(lhs: &FormulaExpr, rhs: &FormulaExpr, hyps: &[&Formula]) -> bool {
    let lhs = simplify_expr(lhs);
    let rhs = simplify_expr(rhs);
    gt(&lhs, &rhs, hyps)
}

fn hyp_states(hyps: &[&Formula], op: CmpOp, lhs: &FormulaExpr, rhs: &FormulaExpr) -> bool {
    hyps.iter().any(|h| {
        matches!(h, Formula::Num { op: o, lhs: l, rhs: r } if *o == op && l == lhs && r == rhs)
    })
}

fn geq(lhs: &FormulaExpr, rhs: &FormulaExpr, hyps: &[&Formula]) -> bool {
    if let (FormulaExpr::Int(a), FormulaExpr::Int(b)) = (lhs, rhs) {
        return a >= b;
    }
    if lhs == rhs {
        return true;
    }
    if hyp_states(hyps, CmpOp::Geq, lhs, rhs) || hyp_states(hyps, CmpOp::Gt, lhs, rhs) {
        return true;
    }
    if let FormulaExpr::Arith {
        op: ArithOp::Add,
        lhs: a,
        rhs: b,
    } = lhs
    {
        if (geq(a, rhs, hyps) && non_negative(b, hyps))
            || (geq(b, rhs, hyps) && non_negative(a, hyps))
        {
            return true;
        }
    }
    *rhs == FormulaExpr::Int(0) && non_negative(lhs, hyps)
}

fn gt(lhs: &FormulaExpr, rhs: &FormulaExpr, hyps: &[&Formula]) -> bool {
    if let (FormulaExpr::Int(a), FormulaExpr::Int(b)) = (lhs, rhs) {
        return a > b;
    }
    if hyp_states(hyps, CmpOp::Gt, lhs, rhs) {
        return true;
    }
    if let FormulaExpr::Arith {
        op: ArithOp::Add,
        lhs: a,
        rhs: b,
    } = lhs
    {
        if (gt(a, rhs, hyps) && non_negative(b, hyps))
            || (gt(b, rhs, hyps) && non_negative(a, hyps))
            || (geq(a, rhs, hyps) && positive(b, hyps))
            || (geq(b, rhs, hyps) && positive(a, hyps))
        {
            return true;
        }
    }
    *rhs == FormulaExpr::Int(0) && positive(lhs, hyps)
}

/// Syntactic non-negativity, extended with hypothesis lookup so an
/// induction hypothesis `e ≥ 0` counts.
fn non_negative(expr: &FormulaExpr, hyps: &[&Formula]) -> bool {
    let zero = FormulaExpr::Int(0);
    if hyp_states(hyps, CmpOp::Geq, expr, &zero) || hyp_states(hyps, CmpOp::Gt, expr, &zero) {
        return true;
    }
    match expr {
        FormulaExpr::Int(n) => *n >= 0,
        FormulaExpr::Arith { op, lhs, rhs } => match op {
            ArithOp::Add | ArithOp::Mul | ArithOp::Min => {
                non_negative(lhs, hyps) && non_negative(rhs, hyps)
            }
            ArithOp::Max => non_negative(lhs, hyps) || non_negative(rhs, hyps),
            ArithOp::Sub => false,
        },
        _ => false,
    }
}

fn positive(expr: &FormulaExpr, hyps: &[&Formula]) -> bool {
    if hyp_states(hyps, CmpOp::Gt, expr, &FormulaExpr::Int(0)) {
        return true;
    }
    match expr {
        FormulaExpr::Int(n) => *n > 0,
        FormulaExpr::Arith { op, lhs, rhs } => match op {
            ArithOp::Add => {
                (positive(lhs, hyps) && non_negative(rhs, hyps))
                    || (non_negative(lhs, hyps) && positive(rhs, hyps))
            }
            ArithOp::Mul | ArithOp::Min => positive(lhs, hyps) && positive(rhs, hyps),
            ArithOp::Max => positive(lhs, hyps) || positive(rhs, hyps),
            ArithOp::Sub => false,
        },
        _ => false,
    }
}

/// Rewrite the outermost application `f(C(…), …)` whose first argument is
/// a constructor node with a matching case, replacing it by the case body.
///
/// Returns `Ok(None)` when no applicable occurrence exists. Case bodies
/// using set operations, singletons, or conditionals have no formula
/// counterpart and make the unfolding fail with [`Error::Unsupported`]
/// rather than produce an unsound rewrite.
pub fn unfold_func_app(
    theory: &Theory,
    expr: &FormulaExpr,
    func: &FuncId,
) -> Result<Option<FormulaExpr>> {
    if let FormulaExpr::FuncApp { func: g, args } = expr {
        if g == func {
            if let Some(FormulaExpr::Ctor { ctor, args: ctor_args }) = args.first() {
                let rf = theory.func(func)?;
                if let Some(case) = rf.case_for(ctor) {
                    return instantiate_case(rf, case, ctor_args, &args[1..]).map(Some);
                }
            }
        }
    }
    match expr {
        FormulaExpr::Var(_) | FormulaExpr::Int(_) | FormulaExpr::EmptySet => Ok(None),
        FormulaExpr::Ctor { ctor, args } => {
            if let Some((i, new)) = unfold_first(theory, args, func)? {
                let mut args = args.clone();
                args[i] = new;
                Ok(Some(FormulaExpr::Ctor {
                    ctor: ctor.clone(),
                    args,
                }))
            } else {
                Ok(None)
            }
        }
        FormulaExpr::FuncApp { func: g, args } => {
            if let Some((i, new)) = unfold_first(theory, args, func)? {
                let mut args = args.clone();
                args[i] = new;
                Ok(Some(FormulaExpr::FuncApp {
                    func: g.clone(),
                    args,
                }))
            } else {
                Ok(None)
            }
        }
        FormulaExpr::Arith { op, lhs, rhs } => {
            if let Some(new) = unfold_func_app(theory, lhs, func)? {
                return Ok(Some(FormulaExpr::arith(*op, new, (**rhs).clone())));
            }
            if let Some(new) = unfold_func_app(theory, rhs, func)? {
                return Ok(Some(FormulaExpr::arith(*op, (**lhs).clone(), new)));
            }
            Ok(None)
        }
    }
}

fn unfold_first(
    theory: &Theory,
    args: &[FormulaExpr],
    func: &FuncId,
) -> Result<Option<(usize, FormulaExpr)>> {
    for (i, a) in args.iter().enumerate() {
        if let Some(new) = unfold_func_app(theory, a, func)? {
            return Ok(Some((i, new)));
        }
    }
    Ok(None)
}

fn instantiate_case(
    rf: &crate::ast::RecursiveFunc,
    case: &crate::ast::FuncCase,
    ctor_args: &[FormulaExpr],
    extra: &[FormulaExpr],
) -> Result<FormulaExpr> {
    if ctor_args.len() != case.bound_vars.len() {
        return Err(Error::shape(
            "unfold",
            format!("{} constructor arguments", case.bound_vars.len()),
            format!("{}", ctor_args.len()),
        ));
    }
    if extra.len() != rf.extra_args.len() {
        return Err(Error::shape(
            "unfold",
            format!("{} extra arguments", rf.extra_args.len()),
            format!("{}", extra.len()),
        ));
    }
    let mut env: Vec<(&str, &FormulaExpr)> = Vec::new();
    for (name, value) in case.bound_vars.iter().zip(ctor_args) {
        env.push((name, value));
    }
    for ((name, _), value) in rf.extra_args.iter().zip(extra) {
        env.push((name, value));
    }
    translate_body(&case.body, &env)
}

fn translate_body(body: &FuncExpr, env: &[(&str, &FormulaExpr)]) -> Result<FormulaExpr> {
    match body {
        FuncExpr::Int(n) => Ok(FormulaExpr::Int(*n)),
        FuncExpr::EmptySet => Ok(FormulaExpr::EmptySet),
        FuncExpr::Var(name) => env
            .iter()
            .rev()
            .find(|(n, _)| *n == name.as_str())
            .map(|(_, v)| (*v).clone())
            .ok_or_else(|| Error::shape("unfold", "a bound variable", name.clone())),
        FuncExpr::Singleton(_) => Err(Error::Unsupported {
            what: "unfolding a singleton-set case body".to_string(),
        }),
        FuncExpr::Call { func, args } => Ok(FormulaExpr::FuncApp {
            func: func.clone(),
            args: args
                .iter()
                .map(|a| translate_body(a, env))
                .collect::<Result<_>>()?,
        }),
        FuncExpr::Ctor { ctor, args } => Ok(FormulaExpr::Ctor {
            ctor: ctor.clone(),
            args: args
                .iter()
                .map(|a| translate_body(a, env))
                .collect::<Result<_>>()?,
        }),
        FuncExpr::Binop { op, lhs, rhs } => {
            let arith = match op {
                FuncBinop::Add => ArithOp::Add,
                FuncBinop::Sub => ArithOp::Sub,
                FuncBinop::Mul => ArithOp::Mul,
                FuncBinop::Max => ArithOp::Max,
                FuncBinop::Min => ArithOp::Min,
                FuncBinop::Union | FuncBinop::Intersect | FuncBinop::Diff => {
                    return Err(Error::Unsupported {
                        what: format!("unfolding a set operation ({})", op.symbol()),
                    })
                }
            };
            Ok(FormulaExpr::arith(
                arith,
                translate_body(lhs, env)?,
                translate_body(rhs, env)?,
            ))
        }
        FuncExpr::If { .. } => Err(Error::Unsupported {
            what: "unfolding a conditional case body".to_string(),
        }),
    }
}

/// Render an expression with the usual precedences; `max`/`min` print as
/// function calls.
pub fn render_expr(theory: &Theory, expr: &FormulaExpr) -> String {
    render_expr_prec(theory, expr, 0)
}

fn render_expr_prec(theory: &Theory, expr: &FormulaExpr, parent: u8) -> String {
    match expr {
        FormulaExpr::Var(name) => name.clone(),
        FormulaExpr::Int(n) => n.to_string(),
        FormulaExpr::EmptySet => "∅".to_string(),
        FormulaExpr::Ctor { ctor, args } => {
            let name = theory
                .ctor(ctor)
                .map(|c| c.name.clone())
                .unwrap_or_else(|_| ctor.to_string());
            if args.is_empty() {
                name
            } else {
                let inner: Vec<_> = args.iter().map(|a| render_expr_prec(theory, a, 0)).collect();
                format!("{}({})", name, inner.join(", "))
            }
        }
        FormulaExpr::FuncApp { func, args } => {
            let name = theory
                .func(func)
                .map(|f| f.name.clone())
                .unwrap_or_else(|_| func.to_string());
            let inner: Vec<_> = args.iter().map(|a| render_expr_prec(theory, a, 0)).collect();
            format!("{}({})", name, inner.join(", "))
        }
        FormulaExpr::Arith { op, lhs, rhs } => match op {
            ArithOp::Max | ArithOp::Min => {
                let name = if *op == ArithOp::Max { "max" } else { "min" };
                format!(
                    "{}({}, {})",
                    name,
                    render_expr_prec(theory, lhs, 0),
                    render_expr_prec(theory, rhs, 0)
                )
            }
            ArithOp::Mul => {
                let s = format!(
                    "{} * {}",
                    render_expr_prec(theory, lhs, 2),
                    render_expr_prec(theory, rhs, 2)
                );
                if parent > 2 {
                    format!("({})", s)
                } else {
                    s
                }
            }
            ArithOp::Add | ArithOp::Sub => {
                let sym = if *op == ArithOp::Add { "+" } else { "-" };
                let s = format!(
                    "{} {} {}",
                    render_expr_prec(theory, lhs, 1),
                    sym,
                    render_expr_prec(theory, rhs, 2)
                );
                if parent > 1 {
                    format!("({})", s)
                } else {
                    s
                }
            }
        },
    }
}

/// Render a formula with Unicode connectives.
pub fn render_formula(theory: &Theory, formula: &Formula) -> String {
    render_formula_prec(theory, formula, 0)
}

fn render_formula_prec(theory: &Theory, formula: &Formula, parent: u8) -> String {
    let wrap = |prec: u8, s: String| {
        if parent > prec {
            format!("({})", s)
        } else {
            s
        }
    };
    match formula {
        Formula::True => "⊤".to_string(),
        Formula::False => "⊥".to_string(),
        Formula::Forall { var, sort, body } => {
            let sort_name = theory
                .sort(sort)
                .map(|s| s.name.clone())
                .unwrap_or_else(|_| sort.to_string());
            wrap(
                0,
                format!(
                    "∀{}:{}. {}",
                    var,
                    sort_name,
                    render_formula_prec(theory, body, 0)
                ),
            )
        }
        Formula::Exists { var, sort, body } => {
            let sort_name = theory
                .sort(sort)
                .map(|s| s.name.clone())
                .unwrap_or_else(|_| sort.to_string());
            wrap(
                0,
                format!(
                    "∃{}:{}. {}",
                    var,
                    sort_name,
                    render_formula_prec(theory, body, 0)
                ),
            )
        }
        Formula::Implies(l, r) => wrap(
            1,
            format!(
                "{} → {}",
                render_formula_prec(theory, l, 2),
                render_formula_prec(theory, r, 1)
            ),
        ),
        Formula::Or(l, r) => wrap(
            2,
            format!(
                "{} ∨ {}",
                render_formula_prec(theory, l, 2),
                render_formula_prec(theory, r, 3)
            ),
        ),
        Formula::And(l, r) => wrap(
            3,
            format!(
                "{} ∧ {}",
                render_formula_prec(theory, l, 3),
                render_formula_prec(theory, r, 4)
            ),
        ),
        Formula::Not(f) => wrap(4, format!("¬{}", render_formula_prec(theory, f, 4))),
        Formula::Judgment { judgment, args } => {
            let rendered: Vec<_> = args.iter().map(|a| render_expr(theory, a)).collect();
            match theory.judgment(judgment) {
                Ok(j) => {
                    let mut out = String::new();
                    out.push_str(&j.separators[0]);
                    for (i, arg) in rendered.iter().enumerate() {
                        out.push_str(arg);
                        out.push_str(&j.separators[i + 1]);
                    }
                    wrap(5, out)
                }
                Err(_) => wrap(5, format!("{}({})", judgment, rendered.join(", "))),
            }
        }
        Formula::TermEq(l, r) => wrap(
            5,
            format!("{} = {}", render_expr(theory, l), render_expr(theory, r)),
        ),
        Formula::TermNeq(l, r) => wrap(
            5,
            format!("{} ≠ {}", render_expr(theory, l), render_expr(theory, r)),
        ),
        Formula::Num { op, lhs, rhs } => wrap(
            5,
            format!(
                "{} {} {}",
                render_expr(theory, lhs),
                op.symbol(),
                render_expr(theory, rhs)
            ),
        ),
        Formula::SetEq(l, r) => wrap(
            5,
            format!("{} = {}", render_expr(theory, l), render_expr(theory, r)),
        ),
        Formula::SetIn { element, set } => wrap(
            5,
            format!(
                "{} ∈ {}",
                render_expr(theory, element),
                render_expr(theory, set)
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> FormulaExpr {
        FormulaExpr::Int(n)
    }

    fn var(name: &str) -> FormulaExpr {
        FormulaExpr::var(name)
    }

    #[test]
    fn simplify_folds_constants() {
        let e = FormulaExpr::arith(ArithOp::Add, int(2), int(3));
        assert_eq!(simplify_expr(&e), int(5));
    }

    #[test]
    fn simplify_applies_identities() {
        let x = var("x");
        assert_eq!(
            simplify_expr(&FormulaExpr::arith(ArithOp::Add, int(0), x.clone())),
            x
        );
        assert_eq!(
            simplify_expr(&FormulaExpr::arith(ArithOp::Sub, x.clone(), x.clone())),
            int(0)
        );
        assert_eq!(
            simplify_expr(&FormulaExpr::arith(ArithOp::Mul, x.clone(), int(0))),
            int(0)
        );
        assert_eq!(
            simplify_expr(&FormulaExpr::arith(ArithOp::Mul, int(1), x.clone())),
            x
        );
        assert_eq!(
            simplify_expr(&FormulaExpr::arith(ArithOp::Max, x.clone(), x.clone())),
            x
        );
    }

    #[test]
    fn simplify_is_idempotent() {
        let samples = vec![
            FormulaExpr::arith(
                ArithOp::Add,
                FormulaExpr::arith(ArithOp::Sub, var("x"), var("x")),
                var("y"),
            ),
            FormulaExpr::arith(ArithOp::Mul, int(1), FormulaExpr::arith(ArithOp::Add, int(1), int(2))),
            FormulaExpr::arith(ArithOp::Min, var("a"), var("b")),
        ];
        for e in samples {
            let once = simplify_expr(&e);
            let twice = simplify_expr(&once);
            assert_eq!(once, twice, "not idempotent on {:?}", e);
        }
    }

    #[test]
    fn nested_rewrite_cascades_in_one_pass() {
        // (x - x) + y simplifies to y, not to 0 + y.
        let e = FormulaExpr::arith(
            ArithOp::Add,
            FormulaExpr::arith(ArithOp::Sub, var("x"), var("x")),
            var("y"),
        );
        assert_eq!(simplify_expr(&e), var("y"));
    }

    #[test]
    fn subst_respects_shadowing() {
        let sort = SortId("sort-000001".to_string());
        // ∀x. x = y, substituting for x must not touch the bound body.
        let f = Formula::Forall {
            var: "x".to_string(),
            sort: sort.clone(),
            body: Box::new(Formula::TermEq(var("x"), var("y"))),
        };
        let g = subst_formula(&f, "x", &int(0));
        assert_eq!(g, f);
        // Substituting for y does reach under the quantifier.
        let g = subst_formula(&f, "y", &int(0));
        assert_eq!(
            g,
            Formula::Forall {
                var: "x".to_string(),
                sort,
                body: Box::new(Formula::TermEq(var("x"), int(0))),
            }
        );
    }

    #[test]
    fn geq_by_constant_and_reflexivity() {
        assert!(can_prove_geq(&int(3), &int(3), &[]));
        assert!(can_prove_geq(&int(4), &int(3), &[]));
        assert!(!can_prove_geq(&int(2), &int(3), &[]));
        assert!(can_prove_geq(&var("x"), &var("x"), &[]));
    }

    #[test]
    fn geq_by_hypothesis() {
        let h = Formula::Num {
            op: CmpOp::Geq,
            lhs: var("x"),
            rhs: var("y"),
        };
        assert!(can_prove_geq(&var("x"), &var("y"), &[&h]));
        assert!(!can_prove_geq(&var("y"), &var("x"), &[&h]));
    }

    #[test]
    fn geq_summand_domination() {
        // 1 + f ≥ 0 when a hypothesis gives f ≥ 0.
        let f = var("f");
        let h = Formula::Num {
            op: CmpOp::Geq,
            lhs: f.clone(),
            rhs: int(0),
        };
        let sum = FormulaExpr::arith(ArithOp::Add, int(1), f);
        assert!(can_prove_geq(&sum, &int(0), &[&h]));
        assert!(!can_prove_geq(&sum, &int(0), &[]));
    }

    #[test]
    fn gt_strict_mirrors() {
        assert!(can_prove_gt(&int(1), &int(0), &[]));
        assert!(!can_prove_gt(&int(0), &int(0), &[]));
        let h = Formula::Num {
            op: CmpOp::Gt,
            lhs: var("x"),
            rhs: int(0),
        };
        let sum = FormulaExpr::arith(ArithOp::Add, var("x"), int(0));
        // x + 0 simplifies to x, then the hypothesis closes it.
        assert!(can_prove_gt(&sum, &int(0), &[&h]));
    }

    #[test]
    fn formula_simplifier_collapses_connectives() {
        let p = Formula::Num {
            op: CmpOp::Geq,
            lhs: var("x"),
            rhs: int(0),
        };
        let and = Formula::And(Box::new(Formula::True), Box::new(p.clone()));
        assert_eq!(simplify_formula(&and), p);
        let or = Formula::Or(Box::new(p.clone()), Box::new(Formula::True));
        assert_eq!(simplify_formula(&or), Formula::True);
        let ground = Formula::Num {
            op: CmpOp::Lt,
            lhs: int(1),
            rhs: int(2),
        };
        assert_eq!(simplify_formula(&ground), Formula::True);
    }
}
