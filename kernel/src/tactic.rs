//! The tactic interpreter.
//!
//! A tactic maps one open goal to an ordered list of new goals, or fails
//! with a typed error. Interpretation is pure: the registry commits the
//! produced goals only after the whole tactic succeeds, so a failing
//! tactic cannot corrupt a proof.

use std::collections::BTreeSet;

use crate::ast::CmpOp;
use crate::error::{Error, Result};
use crate::formula::{
    binds_any, can_prove_geq, can_prove_gt, expr_free_vars, simplify_expr, simplify_formula,
    subst_formula, unfold_func_app, Formula, FormulaExpr,
};
use crate::proof::{ContextVariable, Hypothesis, ProofGoal, Side, Tactic};
use crate::theory::Theory;

/// Contents of a goal a tactic wants created; the registry mints the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoal {
    pub variables: Vec<ContextVariable>,
    pub hypotheses: Vec<Hypothesis>,
    pub goal: Formula,
}

impl NewGoal {
    fn from_goal(goal: &ProofGoal, formula: Formula) -> NewGoal {
        NewGoal {
            variables: goal.variables.clone(),
            hypotheses: goal.hypotheses.clone(),
            goal: formula,
        }
    }
}

/// A goal is trivial when it is `⊤` or appears verbatim among the
/// hypotheses.
pub fn is_goal_trivial(goal: &Formula, hypotheses: &[Formula]) -> bool {
    *goal == Formula::True || hypotheses.iter().any(|h| h == goal)
}

/// Interpret one tactic against one goal. Total: every case either
/// produces goals or returns a typed error.
pub fn run_tactic(theory: &Theory, goal: &ProofGoal, tactic: &Tactic) -> Result<Vec<NewGoal>> {
    match tactic {
        Tactic::Intro { name } => intro(theory, goal, name),
        Tactic::IntroHyp { name } => intro_hyp(goal, name),
        Tactic::ExistsWitness { witness } => exists_witness(goal, witness),
        Tactic::Split => split(goal),
        Tactic::Left => pick_disjunct(goal, Side::Left),
        Tactic::Right => pick_disjunct(goal, Side::Right),
        Tactic::Induction { var } => constructor_split(theory, goal, var, true),
        Tactic::CaseAnalysis { var } => constructor_split(theory, goal, var, false),
        Tactic::Reflexivity => reflexivity(goal),
        Tactic::Trivial => trivial(goal),
        Tactic::Exact { hypothesis } => exact(goal, hypothesis),
        Tactic::Apply { hypothesis } => apply_hyp(goal, hypothesis),
        Tactic::Discriminate { hypothesis } => discriminate(goal, hypothesis),
        Tactic::Unfold { func, side } => unfold(theory, goal, func, *side),
        Tactic::Simplify => simplify(goal),
        Tactic::Rewrite
        | Tactic::DerivationInduction
        | Tactic::ApplyRule
        | Tactic::Contradiction
        | Tactic::Compute => Err(Error::Unsupported {
            what: format!("tactic {}", tactic.name()),
        }),
    }
}

fn intro(theory: &Theory, goal: &ProofGoal, name: &str) -> Result<Vec<NewGoal>> {
    let Formula::Forall { var, sort, body } = &goal.goal else {
        return Err(Error::tactic("intro", "goal is not a universal"));
    };
    if goal.name_taken(name) {
        return Err(Error::tactic(
            "intro",
            format!("name {} is already in the context", name),
        ));
    }
    theory.sort(sort)?;
    let body = if name == var {
        (**body).clone()
    } else {
        let mut introduced = BTreeSet::new();
        introduced.insert(name.to_string());
        if binds_any(body, &introduced) {
            return Err(Error::tactic(
                "intro",
                format!("name {} is bound inside the goal", name),
            ));
        }
        subst_formula(body, var, &FormulaExpr::var(name))
    };
    let mut new = NewGoal::from_goal(goal, body);
    new.variables.push(ContextVariable {
        name: name.to_string(),
        sort: sort.clone(),
    });
    Ok(vec![new])
}

fn intro_hyp(goal: &ProofGoal, name: &str) -> Result<Vec<NewGoal>> {
    let Formula::Implies(premise, conclusion) = &goal.goal else {
        return Err(Error::tactic("intro_hyp", "goal is not an implication"));
    };
    if goal.name_taken(name) {
        return Err(Error::tactic(
            "intro_hyp",
            format!("name {} is already in the context", name),
        ));
    }
    let mut new = NewGoal::from_goal(goal, (**conclusion).clone());
    new.hypotheses.push(Hypothesis {
        name: name.to_string(),
        formula: (**premise).clone(),
    });
    Ok(vec![new])
}

fn exists_witness(goal: &ProofGoal, witness: &FormulaExpr) -> Result<Vec<NewGoal>> {
    let Formula::Exists { var, body, .. } = &goal.goal else {
        return Err(Error::tactic("exists_witness", "goal is not an existential"));
    };
    let mut free = BTreeSet::new();
    expr_free_vars(witness, &mut free);
    if binds_any(body, &free) {
        return Err(Error::tactic(
            "exists_witness",
            "a free variable of the witness is bound inside the goal",
        ));
    }
    Ok(vec![NewGoal::from_goal(
        goal,
        subst_formula(body, var, witness),
    )])
}

fn split(goal: &ProofGoal) -> Result<Vec<NewGoal>> {
    let Formula::And(l, r) = &goal.goal else {
        return Err(Error::tactic("split", "goal is not a conjunction"));
    };
    Ok(vec![
        NewGoal::from_goal(goal, (**l).clone()),
        NewGoal::from_goal(goal, (**r).clone()),
    ])
}

fn pick_disjunct(goal: &ProofGoal, side: Side) -> Result<Vec<NewGoal>> {
    let name = if side == Side::Left { "left" } else { "right" };
    let Formula::Or(l, r) = &goal.goal else {
        return Err(Error::tactic(name, "goal is not a disjunction"));
    };
    let chosen = if side == Side::Left { l } else { r };
    Ok(vec![NewGoal::from_goal(goal, (**chosen).clone())])
}

/// `induction` and `case_analysis` share the constructor split; only the
/// induction hypotheses differ. Subgoals follow constructor registration
/// order.
fn constructor_split(
    theory: &Theory,
    goal: &ProofGoal,
    var: &str,
    with_ih: bool,
) -> Result<Vec<NewGoal>> {
    let tactic = if with_ih { "induction" } else { "case_analysis" };
    let Some(position) = goal.variables.iter().position(|v| v.name == var) else {
        return Err(Error::tactic(
            tactic,
            format!("no context variable named {}", var),
        ));
    };
    let sort_id = goal.variables[position].sort.clone();
    let sort = theory.sort(&sort_id)?;
    if sort.is_atom() {
        return Err(Error::tactic(
            tactic,
            format!("{} has atom sort {}", var, sort.name),
        ));
    }
    let mut base_variables = goal.variables.clone();
    base_variables.remove(position);
    let motive = &goal.goal;

    let mut subgoals = Vec::new();
    for ctor in theory.constructors_of(&sort_id) {
        let mut taken: BTreeSet<String> = base_variables.iter().map(|v| v.name.clone()).collect();
        taken.extend(goal.hypotheses.iter().map(|h| h.name.clone()));

        let mut fresh: Vec<ContextVariable> = Vec::with_capacity(ctor.args.len());
        for arg in &ctor.args {
            let base = match &arg.label {
                Some(label) => label.clone(),
                None => {
                    let arg_sort = theory.sort(&arg.sort)?;
                    match arg_sort.atom_prefix() {
                        Some(p) => p.to_string(),
                        None => arg_sort
                            .name
                            .chars()
                            .next()
                            .map(|c| c.to_lowercase().to_string())
                            .unwrap_or_else(|| "x".to_string()),
                    }
                }
            };
            let name = fresh_name(&base, &taken);
            taken.insert(name.clone());
            fresh.push(ContextVariable {
                name,
                sort: arg.sort.clone(),
            });
        }

        let mut hypotheses = goal.hypotheses.clone();
        if with_ih {
            for v in fresh.iter().filter(|v| v.sort == sort_id) {
                let ih_name = fresh_name(&format!("IH_{}", v.name), &taken);
                taken.insert(ih_name.clone());
                hypotheses.push(Hypothesis {
                    name: ih_name,
                    formula: subst_formula(motive, var, &FormulaExpr::var(&v.name)),
                });
            }
        }

        let applied = FormulaExpr::Ctor {
            ctor: ctor.id.clone(),
            args: fresh.iter().map(|v| FormulaExpr::var(&v.name)).collect(),
        };
        let mut variables = base_variables.clone();
        variables.extend(fresh);
        subgoals.push(NewGoal {
            variables,
            hypotheses,
            goal: subst_formula(motive, var, &applied),
        });
    }
    Ok(subgoals)
}

fn fresh_name(base: &str, taken: &BTreeSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut k = 1;
    loop {
        let candidate = format!("{}{}", base, k);
        if !taken.contains(&candidate) {
            return candidate;
        }
        k += 1;
    }
}

fn reflexivity(goal: &ProofGoal) -> Result<Vec<NewGoal>> {
    let (lhs, rhs) = match &goal.goal {
        Formula::TermEq(l, r) => (l, r),
        Formula::Num { op, lhs, rhs }
            if matches!(op, CmpOp::Eq | CmpOp::Leq | CmpOp::Geq) =>
        {
            (lhs, rhs)
        }
        _ => {
            return Err(Error::tactic(
                "reflexivity",
                "goal is not a reflexive comparison",
            ))
        }
    };
    if simplify_expr(lhs) == simplify_expr(rhs) {
        Ok(vec![])
    } else {
        Err(Error::tactic("reflexivity", "sides are not equal"))
    }
}

fn trivial(goal: &ProofGoal) -> Result<Vec<NewGoal>> {
    let hyps: Vec<Formula> = goal.hypotheses.iter().map(|h| h.formula.clone()).collect();
    if is_goal_trivial(&goal.goal, &hyps) {
        Ok(vec![])
    } else {
        Err(Error::tactic("trivial", "goal is not trivially true"))
    }
}

fn exact(goal: &ProofGoal, name: &str) -> Result<Vec<NewGoal>> {
    let hyp = goal
        .hypothesis(name)
        .ok_or_else(|| Error::tactic("exact", format!("no hypothesis named {}", name)))?;
    if hyp.formula == goal.goal {
        Ok(vec![])
    } else {
        Err(Error::tactic(
            "exact",
            format!("hypothesis {} does not match the goal", name),
        ))
    }
}

fn apply_hyp(goal: &ProofGoal, name: &str) -> Result<Vec<NewGoal>> {
    let hyp = goal
        .hypothesis(name)
        .ok_or_else(|| Error::tactic("apply", format!("no hypothesis named {}", name)))?;
    let Formula::Implies(premise, conclusion) = &hyp.formula else {
        return Err(Error::tactic(
            "apply",
            format!("hypothesis {} is not an implication", name),
        ));
    };
    if **conclusion != goal.goal {
        return Err(Error::tactic(
            "apply",
            format!("conclusion of {} does not match the goal", name),
        ));
    }
    Ok(vec![NewGoal::from_goal(goal, (**premise).clone())])
}

fn discriminate(goal: &ProofGoal, name: &str) -> Result<Vec<NewGoal>> {
    let hyp = goal
        .hypothesis(name)
        .ok_or_else(|| Error::tactic("discriminate", format!("no hypothesis named {}", name)))?;
    match &hyp.formula {
        Formula::TermEq(
            FormulaExpr::Ctor { ctor: c1, .. },
            FormulaExpr::Ctor { ctor: c2, .. },
        ) if c1 != c2 => Ok(vec![]),
        _ => Err(Error::tactic(
            "discriminate",
            format!("hypothesis {} does not equate distinct constructors", name),
        )),
    }
}

fn unfold(
    theory: &Theory,
    goal: &ProofGoal,
    func: &crate::ast::FuncId,
    side: Side,
) -> Result<Vec<NewGoal>> {
    let new = match &goal.goal {
        Formula::TermEq(l, r) => unfold_side(theory, l, r, func, side, Formula::TermEq)?,
        Formula::TermNeq(l, r) => unfold_side(theory, l, r, func, side, Formula::TermNeq)?,
        Formula::SetEq(l, r) => unfold_side(theory, l, r, func, side, Formula::SetEq)?,
        Formula::Num { op, lhs, rhs } => {
            let op = *op;
            unfold_side(theory, lhs, rhs, func, side, move |l, r| Formula::Num {
                op,
                lhs: l,
                rhs: r,
            })?
        }
        _ => return Err(Error::tactic("unfold", "goal is not a comparison")),
    };
    Ok(vec![NewGoal::from_goal(goal, new)])
}

fn unfold_side(
    theory: &Theory,
    lhs: &FormulaExpr,
    rhs: &FormulaExpr,
    func: &crate::ast::FuncId,
    side: Side,
    rebuild: impl FnOnce(FormulaExpr, FormulaExpr) -> Formula,
) -> Result<Formula> {
    let target = if side == Side::Left { lhs } else { rhs };
    let unfolded = unfold_func_app(theory, target, func)?.ok_or_else(|| {
        Error::tactic(
            "unfold",
            "no application of the function to a constructor on that side",
        )
    })?;
    Ok(if side == Side::Left {
        rebuild(unfolded, rhs.clone())
    } else {
        rebuild(lhs.clone(), unfolded)
    })
}

fn simplify(goal: &ProofGoal) -> Result<Vec<NewGoal>> {
    let hyps: Vec<&Formula> = goal.hypotheses.iter().map(|h| &h.formula).collect();
    let simplified = simplify_formula(&goal.goal);
    let closed = match &simplified {
        Formula::True => true,
        Formula::Num { op, lhs, rhs } => match op {
            CmpOp::Geq => can_prove_geq(lhs, rhs, &hyps),
            CmpOp::Gt => can_prove_gt(lhs, rhs, &hyps),
            CmpOp::Leq => can_prove_geq(rhs, lhs, &hyps),
            CmpOp::Lt => can_prove_gt(rhs, lhs, &hyps),
            CmpOp::Eq => lhs == rhs,
            CmpOp::Neq => false,
        },
        _ => false,
    };
    if closed {
        Ok(vec![])
    } else {
        Ok(vec![NewGoal::from_goal(goal, simplified)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::GoalId;

    fn goal_with(formula: Formula) -> ProofGoal {
        ProofGoal {
            id: GoalId("goal-000001".to_string()),
            variables: vec![],
            hypotheses: vec![],
            goal: formula,
        }
    }

    #[test]
    fn trivial_closes_top_and_hypothesis_matches() {
        let theory = Theory::new();
        let mut g = goal_with(Formula::True);
        assert!(run_tactic(&theory, &g, &Tactic::Trivial)
            .expect("trivial")
            .is_empty());
        let p = Formula::Num {
            op: CmpOp::Geq,
            lhs: FormulaExpr::var("x"),
            rhs: FormulaExpr::Int(0),
        };
        g.goal = p.clone();
        assert!(run_tactic(&theory, &g, &Tactic::Trivial).is_err());
        g.hypotheses.push(Hypothesis {
            name: "H".to_string(),
            formula: p,
        });
        assert!(run_tactic(&theory, &g, &Tactic::Trivial)
            .expect("trivial via hypothesis")
            .is_empty());
    }

    #[test]
    fn split_orders_left_then_right() {
        let theory = Theory::new();
        let l = Formula::Num {
            op: CmpOp::Eq,
            lhs: FormulaExpr::Int(1),
            rhs: FormulaExpr::Int(1),
        };
        let r = Formula::True;
        let g = goal_with(Formula::And(Box::new(l.clone()), Box::new(r.clone())));
        let goals = run_tactic(&theory, &g, &Tactic::Split).expect("split");
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].goal, l);
        assert_eq!(goals[1].goal, r);
    }

    #[test]
    fn reflexivity_uses_the_simplifier() {
        let theory = Theory::new();
        // x + 0 = x holds after simplification.
        let g = goal_with(Formula::Num {
            op: CmpOp::Eq,
            lhs: FormulaExpr::arith(
                crate::formula::ArithOp::Add,
                FormulaExpr::var("x"),
                FormulaExpr::Int(0),
            ),
            rhs: FormulaExpr::var("x"),
        });
        assert!(run_tactic(&theory, &g, &Tactic::Reflexivity)
            .expect("reflexivity")
            .is_empty());
    }

    #[test]
    fn reserved_tactics_are_unsupported() {
        let theory = Theory::new();
        let g = goal_with(Formula::True);
        for t in [
            Tactic::Rewrite,
            Tactic::DerivationInduction,
            Tactic::ApplyRule,
            Tactic::Contradiction,
            Tactic::Compute,
        ] {
            assert!(matches!(
                run_tactic(&theory, &g, &t),
                Err(Error::Unsupported { .. })
            ));
        }
    }

    #[test]
    fn intro_hyp_and_apply_round_trip() {
        let theory = Theory::new();
        let p = Formula::Num {
            op: CmpOp::Geq,
            lhs: FormulaExpr::var("x"),
            rhs: FormulaExpr::Int(0),
        };
        let q = Formula::Num {
            op: CmpOp::Geq,
            lhs: FormulaExpr::var("x"),
            rhs: FormulaExpr::Int(-1),
        };
        let g = goal_with(Formula::Implies(Box::new(p.clone()), Box::new(q.clone())));
        let mut goals = run_tactic(
            &theory,
            &g,
            &Tactic::IntroHyp {
                name: "H".to_string(),
            },
        )
        .expect("intro_hyp");
        assert_eq!(goals.len(), 1);
        let new = goals.remove(0);
        assert_eq!(new.goal, q);
        assert_eq!(new.hypotheses.len(), 1);

        // Now a hypothesis P → Q applies against goal Q.
        let g2 = ProofGoal {
            id: GoalId("goal-000002".to_string()),
            variables: vec![],
            hypotheses: vec![Hypothesis {
                name: "Himp".to_string(),
                formula: Formula::Implies(Box::new(p.clone()), Box::new(q.clone())),
            }],
            goal: q,
        };
        let produced = run_tactic(
            &theory,
            &g2,
            &Tactic::Apply {
                hypothesis: "Himp".to_string(),
            },
        )
        .expect("apply");
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].goal, p);
    }
}
