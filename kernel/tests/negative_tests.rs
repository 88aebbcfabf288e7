//! Error taxonomy and boundary behavior: depth bounds, termination
//! rejections, tactic preconditions, cascade integrity.

use kernel::formula::{Formula, FormulaExpr};
use kernel::proof::{Side, Tactic};
use kernel::theory::{CtorArgSpec, Theory};
use kernel::{
    derive_bounded, CmpOp, CtorId, Error, FuncBinop, FuncExpr, FuncId, FuncReturnType,
    JudgmentId, MetaVarId, Pattern, ProofStatus, RuleId, SideTest, SortId, SortKind, Term,
};
use std::rc::Rc;

struct Counting {
    theory: Theory,
    nat: SortId,
    zero: CtorId,
    succ: CtorId,
    count: JudgmentId,
    n: MetaVarId,
}

/// `count(Z)` axiomatically, `count(S(n)) ⟸ count(n)`: the derivation of
/// `count(Sᵏ(Z))` needs exactly k + 1 levels.
fn counting() -> Counting {
    let mut theory = Theory::new();
    let nat = theory
        .create_sort("ℕ", SortKind::Inductive, false)
        .expect("sort");
    let zero = theory.create_constructor(&nat, "Z", vec![]).expect("Z");
    let succ = theory
        .create_constructor(
            &nat,
            "S",
            vec![CtorArgSpec {
                sort: nat.clone(),
                label: Some("n".to_string()),
                is_binder: false,
                binds_in: vec![],
            }],
        )
        .expect("S");
    let count = theory
        .create_judgment(
            "count",
            "count",
            vec![(nat.clone(), None)],
            vec![String::new(), " count".to_string()],
        )
        .expect("count");
    let n = theory.create_metavar("n", &nat).expect("n");
    let base = theory.create_rule("C-Zero", &count).expect("base");
    theory
        .update_rule(
            &base,
            None,
            Some(vec![Pattern::Ctor {
                ctor: zero.clone(),
                args: vec![],
            }]),
        )
        .expect("base conclusion");
    let step = theory.create_rule("C-Succ", &count).expect("step");
    theory
        .update_rule(
            &step,
            None,
            Some(vec![Pattern::Ctor {
                ctor: succ.clone(),
                args: vec![Pattern::MetaVar(n.clone())],
            }]),
        )
        .expect("step conclusion");
    theory
        .add_premise(&step, &count, vec![Pattern::MetaVar(n.clone())])
        .expect("step premise");
    Counting {
        theory,
        nat,
        zero,
        succ,
        count,
        n,
    }
}

fn numeral(c: &Counting, k: usize) -> Rc<Term> {
    let mut t = Term::ctor(&c.zero, vec![]);
    for _ in 0..k {
        t = Term::ctor(&c.succ, vec![t]);
    }
    t
}

#[test]
fn derivation_depth_bound_is_exact() {
    let c = counting();
    // Depth 10 admits up to ten rule applications: S⁹(Z) derives.
    assert!(c.theory.derive(&c.count, &[numeral(&c, 9)]).is_ok());
    // S¹⁰(Z) needs an eleventh level and must NOT be found.
    let err = c
        .theory
        .derive(&c.count, &[numeral(&c, 10)])
        .expect_err("beyond the bound");
    assert!(matches!(err, Error::DerivationNotFound { depth: 10 }));
    // Raising the bound by one makes the same witness reachable.
    assert!(derive_bounded(&c.theory, &c.count, &[numeral(&c, 10)], 11).is_ok());
}

#[test]
fn incomplete_rules_are_skipped_by_the_search() {
    let mut c = counting();
    let holey = c.theory.create_judgment(
        "holey",
        "holey",
        vec![(c.nat.clone(), None)],
        vec![String::new(), " holey".to_string()],
    );
    let holey = holey.expect("judgment");
    // The rule keeps its freshly-created hole conclusion.
    c.theory.create_rule("H-Hole", &holey).expect("rule");
    let err = c
        .theory
        .derive(&holey, &[numeral(&c, 0)])
        .expect_err("hole conclusions never apply");
    assert!(matches!(err, Error::DerivationNotFound { .. }));
}

#[test]
fn derive_rejects_wrong_arity() {
    let c = counting();
    let err = c
        .theory
        .derive(&c.count, &[numeral(&c, 0), numeral(&c, 0)])
        .expect_err("count is unary");
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

#[test]
fn recursion_through_an_extra_argument_is_rejected() {
    let mut c = counting();
    let f = c
        .theory
        .create_function(
            "swap",
            &c.nat,
            vec![("m".to_string(), c.nat.clone())],
            FuncReturnType::Int,
        )
        .expect("create");
    // swap(S(n), m) = swap(m, n): principal argument of the recursive call
    // is the extra argument, not a structural sub-term.
    c.theory
        .update_func_case(
            &f,
            &c.succ,
            vec!["n".to_string()],
            FuncExpr::Call {
                func: f.clone(),
                args: vec![
                    FuncExpr::Var("m".to_string()),
                    FuncExpr::Var("n".to_string()),
                ],
            },
        )
        .expect("case update stores the failure");
    let stored = c.theory.func(&f).expect("func");
    assert!(!stored.terminates);
    assert!(stored
        .termination_error
        .as_deref()
        .expect("error recorded")
        .contains("structural"));
    // Evaluation refuses a function that failed the check.
    let err = c
        .theory
        .evaluate(&f, &numeral(&c, 1), &[kernel::FuncValue::Int(0)])
        .expect_err("refused");
    assert!(matches!(err, Error::EvaluationStuck { .. }));
}

#[test]
fn unfold_refuses_set_operation_bodies() {
    let mut c = counting();
    let names = c
        .theory
        .create_sort(
            "Name",
            SortKind::Atom {
                prefix: "x".to_string(),
            },
            true,
        )
        .expect("atom sort");
    let fv = c
        .theory
        .create_function(
            "fv",
            &c.nat,
            vec![],
            FuncReturnType::Set {
                element_sort: names,
            },
        )
        .expect("fv");
    c.theory
        .update_func_case(
            &fv,
            &c.succ,
            vec!["n".to_string()],
            FuncExpr::Binop {
                op: FuncBinop::Union,
                lhs: Box::new(FuncExpr::EmptySet),
                rhs: Box::new(FuncExpr::Call {
                    func: fv.clone(),
                    args: vec![FuncExpr::Var("n".to_string())],
                }),
            },
        )
        .expect("case");
    let statement = Formula::Forall {
        var: "n".to_string(),
        sort: c.nat.clone(),
        body: Box::new(Formula::SetEq(
            FormulaExpr::FuncApp {
                func: fv.clone(),
                args: vec![FormulaExpr::Ctor {
                    ctor: c.succ.clone(),
                    args: vec![FormulaExpr::var("n")],
                }],
            },
            FormulaExpr::EmptySet,
        )),
    };
    let prop = c.theory.create_property("fv-empty", statement).expect("prop");
    let proof = c.theory.start_proof(&prop).expect("start");
    let root = c.theory.proof(&proof).expect("proof").root.clone();
    let g = c
        .theory
        .apply_tactic(&proof, &root, Tactic::Intro { name: "n".to_string() })
        .expect("intro");
    let err = c
        .theory
        .apply_tactic(
            &proof,
            &g[0],
            Tactic::Unfold {
                func: fv.clone(),
                side: Side::Left,
            },
        )
        .expect_err("set bodies cannot be unfolded");
    assert!(matches!(err, Error::Unsupported { .. }));
    // The failure was a no-op on the proof.
    assert_eq!(
        c.theory.proof(&proof).expect("proof").open_goals,
        vec![g[0].clone()]
    );
}

#[test]
fn tactic_preconditions_are_typed_failures() {
    let mut c = counting();
    let prop = c
        .theory
        .create_property(
            "plain",
            Formula::Num {
                op: CmpOp::Geq,
                lhs: FormulaExpr::Int(1),
                rhs: FormulaExpr::Int(0),
            },
        )
        .expect("prop");
    let proof = c.theory.start_proof(&prop).expect("start");
    let root = c.theory.proof(&proof).expect("proof").root.clone();

    for tactic in [
        Tactic::Intro { name: "x".to_string() },
        Tactic::IntroHyp { name: "H".to_string() },
        Tactic::Split,
        Tactic::Left,
        Tactic::Right,
        Tactic::Exact { hypothesis: "H".to_string() },
        Tactic::Apply { hypothesis: "H".to_string() },
        Tactic::Discriminate { hypothesis: "H".to_string() },
        Tactic::Induction { var: "n".to_string() },
        Tactic::CaseAnalysis { var: "n".to_string() },
    ] {
        let err = c
            .theory
            .apply_tactic(&proof, &root, tactic)
            .expect_err("precondition fails");
        assert!(matches!(err, Error::TacticMismatch { .. }), "{:?}", err);
    }

    // Reserved tactics are a distinct failure.
    let err = c
        .theory
        .apply_tactic(&proof, &root, Tactic::Rewrite)
        .expect_err("reserved");
    assert!(matches!(err, Error::Unsupported { .. }));

    // The goal is still provable after all those failures.
    assert!(c
        .theory
        .apply_tactic(&proof, &root, Tactic::Simplify)
        .expect("simplify closes 1 ≥ 0")
        .is_empty());
    assert_eq!(
        c.theory.proof(&proof).expect("proof").status,
        ProofStatus::Complete
    );

    // And a closed goal cannot be targeted again.
    let err = c
        .theory
        .apply_tactic(&proof, &root, Tactic::Simplify)
        .expect_err("goal no longer open");
    assert!(matches!(err, Error::TacticMismatch { .. }));
}

#[test]
fn simplify_keeps_an_unprovable_goal_open_with_simpler_sides() {
    let mut c = counting();
    // x ≥ 1 is not decidable without hypotheses; simplify rewrites
    // (x + 0) to x and leaves one open goal.
    let prop = c
        .theory
        .create_property(
            "open",
            Formula::Forall {
                var: "x".to_string(),
                sort: c.nat.clone(),
                body: Box::new(Formula::Num {
                    op: CmpOp::Geq,
                    lhs: FormulaExpr::arith(
                        kernel::ArithOp::Add,
                        FormulaExpr::var("x"),
                        FormulaExpr::Int(0),
                    ),
                    rhs: FormulaExpr::Int(1),
                }),
            },
        )
        .expect("prop");
    let proof = c.theory.start_proof(&prop).expect("start");
    let root = c.theory.proof(&proof).expect("proof").root.clone();
    let g = c
        .theory
        .apply_tactic(&proof, &root, Tactic::Intro { name: "x".to_string() })
        .expect("intro");
    let simplified = c
        .theory
        .apply_tactic(&proof, &g[0], Tactic::Simplify)
        .expect("simplify");
    assert_eq!(simplified.len(), 1);
    let state = c.theory.proof(&proof).expect("proof");
    assert_eq!(state.status, ProofStatus::Incomplete);
    assert_eq!(
        kernel::render_formula(&c.theory, &state.goals[&simplified[0]].goal),
        "x ≥ 1"
    );
}

#[test]
fn exists_witness_rejects_captured_variables() {
    let mut c = counting();
    // ∃x:ℕ. ∀m:ℕ. x = m — the witness `m` would be captured.
    let prop = c
        .theory
        .create_property(
            "capture",
            Formula::Exists {
                var: "x".to_string(),
                sort: c.nat.clone(),
                body: Box::new(Formula::Forall {
                    var: "m".to_string(),
                    sort: c.nat.clone(),
                    body: Box::new(Formula::TermEq(
                        FormulaExpr::var("x"),
                        FormulaExpr::var("m"),
                    )),
                }),
            },
        )
        .expect("prop");
    let proof = c.theory.start_proof(&prop).expect("start");
    let root = c.theory.proof(&proof).expect("proof").root.clone();
    let err = c
        .theory
        .apply_tactic(
            &proof,
            &root,
            Tactic::ExistsWitness {
                witness: FormulaExpr::var("m"),
            },
        )
        .expect_err("capture");
    assert!(matches!(err, Error::TacticMismatch { .. }));
    // A closed witness is fine.
    let g = c
        .theory
        .apply_tactic(
            &proof,
            &root,
            Tactic::ExistsWitness {
                witness: FormulaExpr::Ctor {
                    ctor: c.zero.clone(),
                    args: vec![],
                },
            },
        )
        .expect("Z is a closed witness");
    assert_eq!(g.len(), 1);
}

#[test]
fn deleting_a_judgment_removes_dependent_rules() {
    let mut c = counting();
    let other = c
        .theory
        .create_judgment(
            "also",
            "also",
            vec![(c.nat.clone(), None)],
            vec![String::new(), " also".to_string()],
        )
        .expect("judgment");
    // A rule of `also` premised on `count` dies with `count`.
    let dependent = c.theory.create_rule("A-From-Count", &other).expect("rule");
    c.theory
        .update_rule(&dependent, None, Some(vec![Pattern::MetaVar(c.n.clone())]))
        .expect("conclusion");
    c.theory
        .add_premise(&dependent, &c.count, vec![Pattern::MetaVar(c.n.clone())])
        .expect("premise");

    c.theory.delete_judgment(&c.count).expect("delete");
    assert!(c.theory.judgment(&c.count).is_err());
    assert!(c.theory.rule(&dependent).is_err());
    assert!(c.theory.judgment(&other).is_ok());
}

#[test]
fn deleting_a_function_drops_its_side_conditions_but_keeps_rules() {
    let mut c = counting();
    let size = c
        .theory
        .create_function("size", &c.nat, vec![], FuncReturnType::Int)
        .expect("size");
    let rule_id: RuleId = {
        let step_rule = c
            .theory
            .rules()
            .find(|r| r.name == "C-Succ")
            .expect("step rule")
            .id
            .clone();
        c.theory
            .add_side_condition(
                &step_rule,
                &size,
                Pattern::MetaVar(c.n.clone()),
                SideTest::Geq(0),
            )
            .expect("condition");
        step_rule
    };
    c.theory.delete_function(&size).expect("delete");
    let rule = c.theory.rule(&rule_id).expect("rule survives");
    assert!(rule.side_conditions.is_empty());
}

#[test]
fn deleting_a_property_deletes_its_proof() {
    let mut c = counting();
    let prop = c
        .theory
        .create_property("t", Formula::True)
        .expect("prop");
    c.theory.start_proof(&prop).expect("start");
    assert_eq!(c.theory.proofs().count(), 1);
    c.theory.delete_property(&prop).expect("delete");
    assert_eq!(c.theory.proofs().count(), 0);
}

#[test]
fn queries_on_missing_entities_are_not_found() {
    let c = counting();
    let missing_sort = SortId("sort-424242".to_string());
    let missing_judgment = JudgmentId("judg-424242".to_string());
    let missing_func = FuncId("func-424242".to_string());
    assert!(matches!(
        c.theory.enumerate_terms(&missing_sort, 3),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        c.theory.derive(&missing_judgment, &[]),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        c.theory.evaluate(&missing_func, &numeral(&c, 0), &[]),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn serde_round_trips_proof_state() {
    let mut c = counting();
    let prop = c
        .theory
        .create_property(
            "conj",
            Formula::And(Box::new(Formula::True), Box::new(Formula::True)),
        )
        .expect("prop");
    let proof = c.theory.start_proof(&prop).expect("start");
    let root = c.theory.proof(&proof).expect("proof").root.clone();
    c.theory
        .apply_tactic(&proof, &root, Tactic::Split)
        .expect("split");
    let json = serde_json::to_string(&c.theory).expect("serialize");
    let back: Theory = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(c.theory, back);
}
