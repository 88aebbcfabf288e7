//! Logic engine for the formal-methods workbench.
//!
//! The crate owns the object-language metamodel (sorts, constructors,
//! judgments, rules, recursive functions), answers mechanical queries over
//! it (matching, termination, evaluation, syntax-directedness, backward
//! derivation search), and drives the tactic-based proof assistant over
//! first-order formulas. Everything is deterministic: same snapshot, same
//! inputs, same outputs, including the order of produced subgoals.

pub mod ast;
pub mod derivation;
pub mod error;
pub mod formula;
pub mod func;
pub mod pattern;
pub mod proof;
pub mod tactic;
pub mod term;
pub mod theory;

pub use ast::*;
pub use derivation::{
    analyze_syntax_directed, derive, derive_bounded, enumerate_examples, render_derivation,
    Derivation, ExampleTable, RuleOverlap, SyntaxAnalysis, EXAMPLE_TERM_DEPTH,
    MAX_DERIVATION_DEPTH,
};
pub use error::{Error, Result, TerminationDetails};
pub use formula::{
    can_prove_geq, can_prove_gt, render_expr, render_formula, simplify_expr, simplify_formula,
    subst_expr, subst_formula, unfold_func_app, ArithOp, Formula, FormulaExpr,
};
pub use func::{check_termination, evaluate, render_func_expr, render_func_predicate};
pub use pattern::{
    is_pattern_complete, is_rule_complete, match_pattern, substitute_pattern, Bindings,
};
pub use proof::{
    ContextVariable, Hypothesis, Proof, ProofGoal, ProofStatus, ProofStep, Side, Tactic,
};
pub use tactic::is_goal_trivial;
pub use term::{
    enumerate_terms, free_atoms, render_judgment_terms, render_term, to_subscript,
    MAX_TERMS_PER_SORT,
};
pub use theory::{CtorArgSpec, Theory};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_terminality_is_derived() {
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
        assert!(theory.ctor(&zero).expect("Z").is_terminal());
        assert!(!theory.ctor(&succ).expect("S").is_terminal());
    }

    #[test]
    fn match_then_substitute_recovers_the_term() {
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
        let mv = theory.create_metavar("n", &nat).expect("metavar");
        let pat = Pattern::Ctor {
            ctor: succ.clone(),
            args: vec![Pattern::MetaVar(mv)],
        };
        for term in theory.enumerate_terms(&nat, 3).expect("enumerate") {
            match match_pattern(&term, &pat) {
                Some(bindings) => {
                    let rebuilt = substitute_pattern(&pat, &bindings).expect("substitute");
                    assert_eq!(rebuilt, term);
                }
                None => {
                    // Only Z fails to match S(n).
                    assert_eq!(term, Term::ctor(&zero, vec![]));
                }
            }
        }
    }

    #[test]
    fn proof_status_tracks_the_open_frontier() {
        let mut theory = Theory::new();
        let prop = theory
            .create_property(
                "truth",
                Formula::And(Box::new(Formula::True), Box::new(Formula::True)),
            )
            .expect("property");
        let proof_id = theory.start_proof(&prop).expect("start");
        let root = theory.proof(&proof_id).expect("proof").root.clone();
        let produced = theory
            .apply_tactic(&proof_id, &root, Tactic::Split)
            .expect("split");
        assert_eq!(produced.len(), 2);
        let proof = theory.proof(&proof_id).expect("proof");
        assert_eq!(proof.status, ProofStatus::Incomplete);
        assert!(!proof.is_open(&root));
        assert!(produced.iter().all(|g| proof.is_open(g)));
        for goal in produced {
            theory
                .apply_tactic(&proof_id, &goal, Tactic::Trivial)
                .expect("trivial");
        }
        let proof = theory.proof(&proof_id).expect("proof");
        assert_eq!(proof.status, ProofStatus::Complete);
        assert!(proof.open_goals.is_empty());
        assert_eq!(proof.steps.len(), 3);
    }

    #[test]
    fn failed_tactics_do_not_touch_the_proof() {
        let mut theory = Theory::new();
        let prop = theory.create_property("truth", Formula::True).expect("p");
        let proof_id = theory.start_proof(&prop).expect("start");
        let root = theory.proof(&proof_id).expect("proof").root.clone();
        let before = theory.proof(&proof_id).expect("proof").clone();
        let err = theory
            .apply_tactic(&proof_id, &root, Tactic::Split)
            .expect_err("⊤ is not a conjunction");
        assert!(matches!(err, Error::TacticMismatch { .. }));
        assert_eq!(theory.proof(&proof_id).expect("proof"), &before);
    }
}
