//! Rules engine: syntax-directedness analysis, bounded backward search
//! for derivations, and example enumeration.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::ast::{FuncValue, JudgmentId, Pattern, RuleId, SideCondition, SideTest, Term};
use crate::error::{Error, Result};
use crate::func;
use crate::pattern::{is_rule_complete, match_into, substitute_pattern, Bindings};
use crate::term::{enumerate_terms, render_term};
use crate::theory::Theory;

/// Default backward-search depth bound.
pub const MAX_DERIVATION_DEPTH: usize = 10;

/// Constructor depth for enumerated example terms.
pub const EXAMPLE_TERM_DEPTH: usize = 3;

/// At most this many candidate terms per argument position.
const TERMS_PER_POSITION: usize = 20;

/// At most this many examples of each class.
const EXAMPLES_PER_CLASS: usize = 4;

/// A proof tree witnessing that a tuple of terms satisfies a judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    pub rule: RuleId,
    pub rule_name: String,
    pub judgment: JudgmentId,
    pub conclusion: Vec<Rc<Term>>,
    pub premises: Vec<Derivation>,
}

/// Search for a derivation with the default depth bound.
pub fn derive(theory: &Theory, judgment: &JudgmentId, terms: &[Rc<Term>]) -> Result<Derivation> {
    derive_bounded(theory, judgment, terms, MAX_DERIVATION_DEPTH)
}

/// Search for a derivation of `judgment(terms)` within `max_depth` levels
/// of rule applications. Rules are tried in registration order; the first
/// rule whose premises all derive (and whose side conditions hold) wins.
pub fn derive_bounded(
    theory: &Theory,
    judgment: &JudgmentId,
    terms: &[Rc<Term>],
    max_depth: usize,
) -> Result<Derivation> {
    let j = theory.judgment(judgment)?;
    if terms.len() != j.arg_sorts.len() {
        return Err(Error::shape(
            "derivation",
            format!("{} arguments to {}", j.arg_sorts.len(), j.name),
            format!("{}", terms.len()),
        ));
    }
    debug!(
        "derive {} over {} terms, depth bound {}",
        j.name,
        terms.len(),
        max_depth
    );
    derive_at(theory, judgment, terms, 0, max_depth)
}

fn derive_at(
    theory: &Theory,
    judgment: &JudgmentId,
    terms: &[Rc<Term>],
    level: usize,
    max_depth: usize,
) -> Result<Derivation> {
    if level >= max_depth {
        return Err(Error::DerivationNotFound { depth: max_depth });
    }
    'rules: for rule in theory.rules_for(judgment) {
        if !is_rule_complete(rule) || rule.conclusion.args.len() != terms.len() {
            continue;
        }
        let mut bindings = Bindings::new();
        let matched = terms
            .iter()
            .zip(&rule.conclusion.args)
            .all(|(t, p)| match_into(t, p, &mut bindings));
        if !matched {
            continue;
        }
        trace!("rule {} matches at level {}", rule.name, level);
        let mut premises = Vec::with_capacity(rule.premises.len());
        for premise in &rule.premises {
            let premise_terms = premise
                .args
                .iter()
                .map(|p| substitute_pattern(p, &bindings))
                .collect::<Result<Vec<_>>>();
            let premise_terms = match premise_terms {
                Ok(ts) => ts,
                Err(_) => continue 'rules,
            };
            match derive_at(theory, &premise.judgment, &premise_terms, level + 1, max_depth) {
                Ok(d) => premises.push(d),
                Err(_) => continue 'rules,
            }
        }
        // Side conditions are checked once the premises stand; a failing
        // or stuck predicate rejects the rule.
        if !rule
            .side_conditions
            .iter()
            .all(|c| side_condition_holds(theory, c, &bindings))
        {
            continue;
        }
        return Ok(Derivation {
            rule: rule.id.clone(),
            rule_name: rule.name.clone(),
            judgment: judgment.clone(),
            conclusion: terms.to_vec(),
            premises,
        });
    }
    Err(Error::DerivationNotFound { depth: max_depth })
}

fn side_condition_holds(theory: &Theory, cond: &SideCondition, bindings: &Bindings) -> bool {
    eval_side_condition(theory, cond, bindings).unwrap_or(false)
}

fn eval_side_condition(
    theory: &Theory,
    cond: &SideCondition,
    bindings: &Bindings,
) -> Result<bool> {
    let arg = substitute_pattern(&cond.arg, bindings)?;
    let value = func::evaluate(theory, &cond.func, &arg, &[])?;
    Ok(match (&value, &cond.test) {
        (FuncValue::Int(v), SideTest::Eq(n)) => v == n,
        (FuncValue::Int(v), SideTest::Neq(n)) => v != n,
        (FuncValue::Int(v), SideTest::Lt(n)) => v < n,
        (FuncValue::Int(v), SideTest::Leq(n)) => v <= n,
        (FuncValue::Int(v), SideTest::Gt(n)) => v > n,
        (FuncValue::Int(v), SideTest::Geq(n)) => v >= n,
        (FuncValue::Set(s), SideTest::IsEmpty) => s.is_empty(),
        (FuncValue::Set(s), SideTest::NotEmpty) => !s.is_empty(),
        (FuncValue::Set(s), SideTest::In(p)) | (FuncValue::Set(s), SideTest::NotIn(p)) => {
            let element = substitute_pattern(p, bindings)?;
            let name = match &*element {
                Term::Atom { name, .. } => name.clone(),
                Term::Ctor { .. } => return Ok(false),
            };
            let contains = s.contains(&name);
            if matches!(cond.test, SideTest::In(_)) {
                contains
            } else {
                !contains
            }
        }
        _ => false,
    })
}

/// Compact rule-tree rendering: `E-Succ(O-Succ(E-Zero))`.
pub fn render_derivation(derivation: &Derivation) -> String {
    if derivation.premises.is_empty() {
        derivation.rule_name.clone()
    } else {
        let inner: Vec<_> = derivation.premises.iter().map(render_derivation).collect();
        format!("{}({})", derivation.rule_name, inner.join(", "))
    }
}

/// Result of the syntax-directedness analysis for one judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxAnalysis {
    pub judgment: JudgmentId,
    pub syntax_directed: bool,
    pub conflicts: Vec<RuleOverlap>,
}

/// Two rules whose conclusions could match the same tuple; `positions`
/// lists every argument position (all of them overlap for a conflict).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOverlap {
    pub first: RuleId,
    pub second: RuleId,
    pub positions: Vec<usize>,
}

/// A judgment is syntax-directed iff every pair of its rules is told apart
/// by some conclusion position with clashing constructors. Meta-variables
/// and holes overlap everything.
pub fn analyze_syntax_directed(theory: &Theory, judgment: &JudgmentId) -> Result<SyntaxAnalysis> {
    let j = theory.judgment(judgment)?;
    let rules = theory.rules_for(judgment);
    let arity = j.arg_sorts.len();
    let mut conflicts = Vec::new();
    for (i, first) in rules.iter().enumerate() {
        for second in &rules[i + 1..] {
            if first.conclusion.args.len() != arity || second.conclusion.args.len() != arity {
                continue;
            }
            let all_overlap = (0..arity).all(|p| {
                patterns_could_overlap(&first.conclusion.args[p], &second.conclusion.args[p])
            });
            if all_overlap {
                conflicts.push(RuleOverlap {
                    first: first.id.clone(),
                    second: second.id.clone(),
                    positions: (0..arity).collect(),
                });
            }
        }
    }
    Ok(SyntaxAnalysis {
        judgment: judgment.clone(),
        syntax_directed: conflicts.is_empty(),
        conflicts,
    })
}

pub(crate) fn patterns_could_overlap(a: &Pattern, b: &Pattern) -> bool {
    match (a, b) {
        (
            Pattern::Ctor { ctor: c1, args: a1 },
            Pattern::Ctor { ctor: c2, args: a2 },
        ) => {
            c1 == c2
                && a1.len() == a2.len()
                && a1.iter().zip(a2).all(|(x, y)| patterns_could_overlap(x, y))
        }
        _ => true,
    }
}

/// Candidate tuples for a judgment, classified by derivability. Tuples are
/// visited breadth-first in combined term size so small witnesses appear
/// first; duplicates (by rendered form) are suppressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleTable {
    pub judgment: JudgmentId,
    pub positive: Vec<Vec<Rc<Term>>>,
    pub negative: Vec<Vec<Rc<Term>>>,
}

pub fn enumerate_examples(theory: &Theory, judgment: &JudgmentId) -> Result<ExampleTable> {
    let j = theory.judgment(judgment)?;
    let mut per_position = Vec::with_capacity(j.arg_sorts.len());
    for arg in &j.arg_sorts {
        let mut terms = enumerate_terms(theory, &arg.sort, EXAMPLE_TERM_DEPTH)?;
        terms.truncate(TERMS_PER_POSITION);
        per_position.push(terms);
    }
    let mut tuples: Vec<Vec<Rc<Term>>> = Vec::new();
    product(&per_position, &mut Vec::new(), &mut tuples);
    tuples.sort_by_cached_key(|ts| {
        (
            ts.iter().map(|t| t.size()).sum::<usize>(),
            render_tuple(theory, ts),
        )
    });
    tuples.dedup_by_key(|ts| render_tuple(theory, ts));

    let mut positive = Vec::new();
    let mut negative = Vec::new();
    for ts in tuples {
        if positive.len() >= EXAMPLES_PER_CLASS && negative.len() >= EXAMPLES_PER_CLASS {
            break;
        }
        match derive(theory, judgment, &ts) {
            Ok(_) => {
                if positive.len() < EXAMPLES_PER_CLASS {
                    positive.push(ts);
                }
            }
            Err(Error::DerivationNotFound { .. }) => {
                if negative.len() < EXAMPLES_PER_CLASS {
                    negative.push(ts);
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok(ExampleTable {
        judgment: judgment.clone(),
        positive,
        negative,
    })
}

fn render_tuple(theory: &Theory, terms: &[Rc<Term>]) -> String {
    let parts: Vec<_> = terms.iter().map(|t| render_term(theory, t)).collect();
    parts.join(", ")
}

fn product(choices: &[Vec<Rc<Term>>], acc: &mut Vec<Rc<Term>>, out: &mut Vec<Vec<Rc<Term>>>) {
    if acc.len() == choices.len() {
        out.push(acc.clone());
        return;
    }
    for t in &choices[acc.len()] {
        acc.push(t.clone());
        product(choices, acc, out);
        acc.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::MetaVarId;

    fn ctor(n: &str, args: Vec<Pattern>) -> Pattern {
        Pattern::Ctor {
            ctor: crate::ast::CtorId(n.to_string()),
            args,
        }
    }

    #[test]
    fn metavars_overlap_everything() {
        let mv = Pattern::MetaVar(MetaVarId("m".to_string()));
        assert!(patterns_could_overlap(&mv, &ctor("zero", vec![])));
        assert!(patterns_could_overlap(&ctor("zero", vec![]), &mv));
        assert!(patterns_could_overlap(&Pattern::Hole, &ctor("zero", vec![])));
    }

    #[test]
    fn distinct_heads_do_not_overlap() {
        assert!(!patterns_could_overlap(
            &ctor("zero", vec![]),
            &ctor("succ", vec![Pattern::Hole])
        ));
        // Same head, clashing children.
        let a = ctor("succ", vec![ctor("zero", vec![])]);
        let b = ctor("succ", vec![ctor("succ", vec![Pattern::Hole])]);
        assert!(!patterns_could_overlap(&a, &b));
        let c = ctor("succ", vec![Pattern::MetaVar(MetaVarId("m".to_string()))]);
        assert!(patterns_could_overlap(&a, &c));
    }
}
