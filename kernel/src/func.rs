//! The function engine: structural-termination checking and evaluation of
//! recursive functions over terms, integers, and atom-name sets.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast::{
    Constructor, FuncBinop, FuncCase, FuncExpr, FuncId, FuncPredicate, FuncValue, RecursiveFunc,
    Term,
};
use crate::error::{Error, Result, TerminationDetails};
use crate::theory::Theory;

/// Call-nesting cap for the evaluator. Structural recursion keeps honest
/// functions far below this; cross-function cycles get a stuck result
/// instead of a hung process.
const MAX_EVAL_DEPTH: usize = 4096;

/// Static checks that do not depend on the bodies: referenced sorts exist,
/// the principal sort is inductive, extra-argument names are distinct.
pub fn validate_function(theory: &Theory, func: &RecursiveFunc) -> Result<()> {
    let principal = theory.sort(&func.principal_sort)?;
    if principal.is_atom() {
        return Err(Error::shape(
            "function definition",
            "an inductive principal sort",
            format!("atom sort {}", principal.name),
        ));
    }
    for (name, sort) in &func.extra_args {
        theory.sort(sort)?;
        if func.extra_args.iter().filter(|(n, _)| n == name).count() > 1 {
            return Err(Error::shape(
                "function definition",
                "distinct extra-argument names",
                format!("duplicate {}", name),
            ));
        }
    }
    match &func.return_type {
        crate::ast::FuncReturnType::Int => {}
        crate::ast::FuncReturnType::Set { element_sort } => {
            theory.sort(element_sort)?;
        }
        crate::ast::FuncReturnType::Inductive { sort } => {
            theory.sort(sort)?;
        }
    }
    Ok(())
}

/// The structural-recursion check of §4.2: every recursive call's
/// principal argument must be, syntactically, one of the case's structural
/// variables. Returns the first failure, tagged with its case.
pub fn check_termination(theory: &Theory, func: &RecursiveFunc) -> Result<()> {
    validate_function(theory, func)?;
    for ctor in theory.constructors_of(&func.principal_sort) {
        let case = func.case_for(&ctor.id).ok_or_else(|| Error::TerminationFailure {
            case: ctor.name.clone(),
            details: TerminationDetails::MissingCase {
                constructor: ctor.name.clone(),
            },
        })?;
        if case.bound_vars.len() != ctor.args.len() {
            return Err(Error::shape(
                "function case",
                format!("{} bound variables for {}", ctor.args.len(), ctor.name),
                format!("{}", case.bound_vars.len()),
            ));
        }
        let structural: Vec<&str> = case
            .bound_vars
            .iter()
            .zip(&ctor.args)
            .filter(|(_, arg)| arg.sort == func.principal_sort)
            .map(|(name, _)| name.as_str())
            .collect();
        check_expr(theory, func, ctor, case, &structural, &case.body)?;
    }
    Ok(())
}

fn non_structural(
    theory: &Theory,
    ctor: &Constructor,
    argument: &FuncExpr,
) -> Error {
    Error::TerminationFailure {
        case: ctor.name.clone(),
        details: TerminationDetails::NonStructuralRecursion {
            argument: render_func_expr(theory, argument),
        },
    }
}

fn check_expr(
    theory: &Theory,
    func: &RecursiveFunc,
    ctor: &Constructor,
    case: &FuncCase,
    structural: &[&str],
    expr: &FuncExpr,
) -> Result<()> {
    match expr {
        FuncExpr::Int(_) | FuncExpr::EmptySet | FuncExpr::Var(_) => Ok(()),
        FuncExpr::Singleton(e) => check_expr(theory, func, ctor, case, structural, e),
        FuncExpr::Call { func: g, args } => {
            if g == &func.id {
                if args.len() != func.arity() {
                    return Err(Error::TerminationFailure {
                        case: ctor.name.clone(),
                        details: TerminationDetails::RecursiveArity {
                            expected: func.arity(),
                            found: args.len(),
                        },
                    });
                }
                match &args[0] {
                    FuncExpr::Var(v) if structural.contains(&v.as_str()) => {}
                    other => return Err(non_structural(theory, ctor, other)),
                }
                for a in &args[1..] {
                    check_expr(theory, func, ctor, case, structural, a)?;
                }
                Ok(())
            } else {
                theory.func(g)?;
                for a in args {
                    check_expr(theory, func, ctor, case, structural, a)?;
                }
                Ok(())
            }
        }
        FuncExpr::Ctor { args, .. } => {
            for a in args {
                check_expr(theory, func, ctor, case, structural, a)?;
            }
            Ok(())
        }
        FuncExpr::Binop { lhs, rhs, .. } => {
            check_expr(theory, func, ctor, case, structural, lhs)?;
            check_expr(theory, func, ctor, case, structural, rhs)
        }
        FuncExpr::If { cond, then, els } => {
            check_pred(theory, func, ctor, case, structural, cond)?;
            check_expr(theory, func, ctor, case, structural, then)?;
            check_expr(theory, func, ctor, case, structural, els)
        }
    }
}

fn check_pred(
    theory: &Theory,
    func: &RecursiveFunc,
    ctor: &Constructor,
    case: &FuncCase,
    structural: &[&str],
    pred: &FuncPredicate,
) -> Result<()> {
    match pred {
        FuncPredicate::Cmp { lhs, rhs, .. }
        | FuncPredicate::AtomEq(lhs, rhs)
        | FuncPredicate::AtomNeq(lhs, rhs) => {
            check_expr(theory, func, ctor, case, structural, lhs)?;
            check_expr(theory, func, ctor, case, structural, rhs)
        }
        FuncPredicate::In { element, set } => {
            check_expr(theory, func, ctor, case, structural, element)?;
            check_expr(theory, func, ctor, case, structural, set)
        }
        FuncPredicate::IsEmpty(e) => check_expr(theory, func, ctor, case, structural, e),
        FuncPredicate::And(a, b) | FuncPredicate::Or(a, b) => {
            check_pred(theory, func, ctor, case, structural, a)?;
            check_pred(theory, func, ctor, case, structural, b)
        }
        FuncPredicate::Not(p) => check_pred(theory, func, ctor, case, structural, p),
    }
}

struct EvalEnv {
    terms: BTreeMap<String, Rc<Term>>,
    extras: BTreeMap<String, FuncValue>,
}

/// Evaluate a function on a principal term plus extra-argument values.
/// Every type mismatch is a hard stuck result, never a coercion.
pub fn evaluate(
    theory: &Theory,
    func: &FuncId,
    principal: &Rc<Term>,
    extra: &[FuncValue],
) -> Result<FuncValue> {
    evaluate_at(theory, func, principal, extra, MAX_EVAL_DEPTH)
}

fn evaluate_at(
    theory: &Theory,
    func: &FuncId,
    principal: &Rc<Term>,
    extra: &[FuncValue],
    depth: usize,
) -> Result<FuncValue> {
    if depth == 0 {
        return Err(Error::stuck("call depth exhausted"));
    }
    let f = theory.func(func)?;
    if !f.terminates {
        return Err(Error::stuck(format!(
            "function {} failed the termination check",
            f.name
        )));
    }
    if extra.len() != f.extra_args.len() {
        return Err(Error::shape(
            "evaluation",
            format!("{} extra arguments to {}", f.extra_args.len(), f.name),
            format!("{}", extra.len()),
        ));
    }
    let (ctor_id, term_args) = match &**principal {
        Term::Ctor { ctor, args } => (ctor, args),
        Term::Atom { name, .. } => {
            return Err(Error::stuck(format!(
                "{} has no case for the atom {}",
                f.name, name
            )))
        }
    };
    let case = f.case_for(ctor_id).ok_or_else(|| {
        Error::stuck(format!("{} has no case for constructor {}", f.name, ctor_id))
    })?;
    if case.bound_vars.len() != term_args.len() {
        return Err(Error::shape(
            "evaluation",
            format!("{} bound variables", term_args.len()),
            format!("{}", case.bound_vars.len()),
        ));
    }
    let mut env = EvalEnv {
        terms: BTreeMap::new(),
        extras: BTreeMap::new(),
    };
    for (name, value) in case.bound_vars.iter().zip(term_args) {
        env.terms.insert(name.clone(), value.clone());
    }
    for ((name, _), value) in f.extra_args.iter().zip(extra) {
        env.extras.insert(name.clone(), value.clone());
    }
    eval_expr(theory, &env, &case.body, depth)
}

fn eval_expr(theory: &Theory, env: &EvalEnv, expr: &FuncExpr, depth: usize) -> Result<FuncValue> {
    match expr {
        FuncExpr::Int(n) => Ok(FuncValue::Int(*n)),
        FuncExpr::EmptySet => Ok(FuncValue::Set(Default::default())),
        FuncExpr::Var(name) => {
            if let Some(t) = env.terms.get(name) {
                Ok(FuncValue::Term(t.clone()))
            } else if let Some(v) = env.extras.get(name) {
                Ok(v.clone())
            } else {
                Err(Error::stuck(format!("unbound variable {}", name)))
            }
        }
        FuncExpr::Singleton(e) => match eval_expr(theory, env, e, depth)? {
            FuncValue::Term(t) => match &*t {
                Term::Atom { name, .. } => {
                    let mut set = std::collections::BTreeSet::new();
                    set.insert(name.clone());
                    Ok(FuncValue::Set(set))
                }
                Term::Ctor { .. } => Err(Error::stuck(
                    "singleton element must resolve to an atom",
                )),
            },
            v => Err(Error::stuck(format!(
                "singleton element must be a term, got a {}",
                v.kind()
            ))),
        },
        FuncExpr::Call { func, args } => {
            if args.is_empty() {
                return Err(Error::stuck("call without a principal argument"));
            }
            let principal = match eval_expr(theory, env, &args[0], depth)? {
                FuncValue::Term(t) => t,
                v => {
                    return Err(Error::stuck(format!(
                        "principal call argument must be a term, got a {}",
                        v.kind()
                    )))
                }
            };
            let mut extras = Vec::with_capacity(args.len() - 1);
            for a in &args[1..] {
                // Non-principal arguments: variable references and integer
                // literals only.
                match a {
                    FuncExpr::Var(_) | FuncExpr::Int(_) => {
                        extras.push(eval_expr(theory, env, a, depth)?)
                    }
                    _ => {
                        return Err(Error::stuck(
                            "non-principal call arguments must be variables or integer literals",
                        ))
                    }
                }
            }
            evaluate_at(theory, func, &principal, &extras, depth - 1)
        }
        FuncExpr::Ctor { ctor, args } => {
            let mut out = Vec::with_capacity(args.len());
            for a in args {
                match eval_expr(theory, env, a, depth)? {
                    FuncValue::Term(t) => out.push(t),
                    v => {
                        return Err(Error::stuck(format!(
                            "constructor argument must be a term, got a {}",
                            v.kind()
                        )))
                    }
                }
            }
            Ok(FuncValue::Term(Term::ctor(ctor, out)))
        }
        FuncExpr::Binop { op, lhs, rhs } => {
            let l = eval_expr(theory, env, lhs, depth)?;
            let r = eval_expr(theory, env, rhs, depth)?;
            if op.is_arithmetic() {
                match (l, r) {
                    (FuncValue::Int(a), FuncValue::Int(b)) => Ok(FuncValue::Int(match op {
                        FuncBinop::Add => a.saturating_add(b),
                        FuncBinop::Sub => a.saturating_sub(b),
                        FuncBinop::Mul => a.saturating_mul(b),
                        FuncBinop::Max => a.max(b),
                        FuncBinop::Min => a.min(b),
                        _ => unreachable!(),
                    })),
                    (l, r) => Err(Error::stuck(format!(
                        "{} needs two integers, got {} and {}",
                        op.symbol(),
                        l.kind(),
                        r.kind()
                    ))),
                }
            } else {
                match (l, r) {
                    (FuncValue::Set(a), FuncValue::Set(b)) => Ok(FuncValue::Set(match op {
                        FuncBinop::Union => a.union(&b).cloned().collect(),
                        FuncBinop::Intersect => a.intersection(&b).cloned().collect(),
                        FuncBinop::Diff => a.difference(&b).cloned().collect(),
                        _ => unreachable!(),
                    })),
                    (l, r) => Err(Error::stuck(format!(
                        "{} needs two sets, got {} and {}",
                        op.symbol(),
                        l.kind(),
                        r.kind()
                    ))),
                }
            }
        }
        FuncExpr::If { cond, then, els } => {
            if eval_pred(theory, env, cond, depth)? {
                eval_expr(theory, env, then, depth)
            } else {
                eval_expr(theory, env, els, depth)
            }
        }
    }
}

fn eval_pred(theory: &Theory, env: &EvalEnv, pred: &FuncPredicate, depth: usize) -> Result<bool> {
    match pred {
        FuncPredicate::Cmp { op, lhs, rhs } => {
            match (
                eval_expr(theory, env, lhs, depth)?,
                eval_expr(theory, env, rhs, depth)?,
            ) {
                (FuncValue::Int(a), FuncValue::Int(b)) => Ok(op.apply(a, b)),
                (l, r) => Err(Error::stuck(format!(
                    "comparison needs two integers, got {} and {}",
                    l.kind(),
                    r.kind()
                ))),
            }
        }
        FuncPredicate::AtomEq(lhs, rhs) | FuncPredicate::AtomNeq(lhs, rhs) => {
            let l = atom_name(theory, env, lhs, depth)?;
            let r = atom_name(theory, env, rhs, depth)?;
            let eq = l == r;
            Ok(if matches!(pred, FuncPredicate::AtomEq(..)) {
                eq
            } else {
                !eq
            })
        }
        FuncPredicate::In { element, set } => {
            let name = atom_name(theory, env, element, depth)?;
            match eval_expr(theory, env, set, depth)? {
                FuncValue::Set(s) => Ok(s.contains(&name)),
                v => Err(Error::stuck(format!(
                    "membership needs a set, got a {}",
                    v.kind()
                ))),
            }
        }
        FuncPredicate::IsEmpty(e) => match eval_expr(theory, env, e, depth)? {
            FuncValue::Set(s) => Ok(s.is_empty()),
            v => Err(Error::stuck(format!(
                "emptiness needs a set, got a {}",
                v.kind()
            ))),
        },
        FuncPredicate::And(a, b) => {
            Ok(eval_pred(theory, env, a, depth)? && eval_pred(theory, env, b, depth)?)
        }
        FuncPredicate::Or(a, b) => {
            Ok(eval_pred(theory, env, a, depth)? || eval_pred(theory, env, b, depth)?)
        }
        FuncPredicate::Not(p) => Ok(!eval_pred(theory, env, p, depth)?),
    }
}

fn atom_name(theory: &Theory, env: &EvalEnv, expr: &FuncExpr, depth: usize) -> Result<String> {
    match eval_expr(theory, env, expr, depth)? {
        FuncValue::Term(t) => match &*t {
            Term::Atom { name, .. } => Ok(name.clone()),
            Term::Ctor { .. } => Err(Error::stuck("expected an atom, got an application")),
        },
        v => Err(Error::stuck(format!("expected an atom, got a {}", v.kind()))),
    }
}

/// Render a function-body expression.
pub fn render_func_expr(theory: &Theory, expr: &FuncExpr) -> String {
    render_prec(theory, expr, 0)
}

fn render_prec(theory: &Theory, expr: &FuncExpr, parent: u8) -> String {
    match expr {
        FuncExpr::Int(n) => n.to_string(),
        FuncExpr::EmptySet => "∅".to_string(),
        FuncExpr::Var(name) => name.clone(),
        FuncExpr::Singleton(e) => format!("{{{}}}", render_prec(theory, e, 0)),
        FuncExpr::Call { func, args } => {
            let name = theory
                .func(func)
                .map(|f| f.name.clone())
                .unwrap_or_else(|_| func.to_string());
            let inner: Vec<_> = args.iter().map(|a| render_prec(theory, a, 0)).collect();
            format!("{}({})", name, inner.join(", "))
        }
        FuncExpr::Ctor { ctor, args } => {
            let name = theory
                .ctor(ctor)
                .map(|c| c.name.clone())
                .unwrap_or_else(|_| ctor.to_string());
            if args.is_empty() {
                name
            } else {
                let inner: Vec<_> = args.iter().map(|a| render_prec(theory, a, 0)).collect();
                format!("{}({})", name, inner.join(", "))
            }
        }
        FuncExpr::Binop { op, lhs, rhs } => match op {
            FuncBinop::Max | FuncBinop::Min => format!(
                "{}({}, {})",
                op.symbol(),
                render_prec(theory, lhs, 0),
                render_prec(theory, rhs, 0)
            ),
            FuncBinop::Mul => {
                let s = format!(
                    "{} * {}",
                    render_prec(theory, lhs, 2),
                    render_prec(theory, rhs, 2)
                );
                if parent > 2 {
                    format!("({})", s)
                } else {
                    s
                }
            }
            _ => {
                let s = format!(
                    "{} {} {}",
                    render_prec(theory, lhs, 1),
                    op.symbol(),
                    render_prec(theory, rhs, 2)
                );
                if parent > 1 {
                    format!("({})", s)
                } else {
                    s
                }
            }
        },
        FuncExpr::If { cond, then, els } => {
            let s = format!(
                "if {} then {} else {}",
                render_func_predicate(theory, cond),
                render_prec(theory, then, 1),
                render_prec(theory, els, 1)
            );
            if parent > 0 {
                format!("({})", s)
            } else {
                s
            }
        }
    }
}

pub fn render_func_predicate(theory: &Theory, pred: &FuncPredicate) -> String {
    match pred {
        FuncPredicate::Cmp { op, lhs, rhs } => format!(
            "{} {} {}",
            render_prec(theory, lhs, 1),
            op.symbol(),
            render_prec(theory, rhs, 1)
        ),
        FuncPredicate::AtomEq(l, r) => format!(
            "{} = {}",
            render_prec(theory, l, 1),
            render_prec(theory, r, 1)
        ),
        FuncPredicate::AtomNeq(l, r) => format!(
            "{} ≠ {}",
            render_prec(theory, l, 1),
            render_prec(theory, r, 1)
        ),
        FuncPredicate::In { element, set } => format!(
            "{} ∈ {}",
            render_prec(theory, element, 1),
            render_prec(theory, set, 1)
        ),
        FuncPredicate::IsEmpty(e) => format!("{} = ∅", render_prec(theory, e, 1)),
        FuncPredicate::And(a, b) => format!(
            "{} ∧ {}",
            render_func_predicate(theory, a),
            render_func_predicate(theory, b)
        ),
        FuncPredicate::Or(a, b) => format!(
            "{} ∨ {}",
            render_func_predicate(theory, a),
            render_func_predicate(theory, b)
        ),
        FuncPredicate::Not(p) => format!("¬({})", render_func_predicate(theory, p)),
    }
}
