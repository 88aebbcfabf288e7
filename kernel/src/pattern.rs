//! Pattern matching and instantiation.
//!
//! Matching binds meta-variables to subterms; merging two bindings demands
//! structural equality, so nonlinear patterns like `Pair(x, x)` constrain
//! both occurrences to the same term.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::ast::{InferenceRule, MetaVarId, Pattern, Term};
use crate::error::{Error, Result};
use crate::theory::Theory;

/// Meta-variable bindings produced by a successful match. Ordered map so
/// every consumer iterates deterministically.
pub type Bindings = BTreeMap<MetaVarId, Rc<Term>>;

/// Match a term against a pattern. `None` means no match; holes never
/// match anything.
pub fn match_pattern(term: &Rc<Term>, pattern: &Pattern) -> Option<Bindings> {
    let mut bindings = Bindings::new();
    if match_into(term, pattern, &mut bindings) {
        Some(bindings)
    } else {
        None
    }
}

/// Match into an existing binding set, merging as §4.1 requires. Used by
/// the derivation engine to thread bindings across conclusion positions.
pub fn match_into(term: &Rc<Term>, pattern: &Pattern, bindings: &mut Bindings) -> bool {
    match pattern {
        Pattern::Hole => false,
        Pattern::MetaVar(mv) => match bindings.get(mv) {
            Some(prev) => prev == term,
            None => {
                bindings.insert(mv.clone(), term.clone());
                true
            }
        },
        Pattern::Ctor { ctor, args } => match &**term {
            Term::Ctor {
                ctor: term_ctor,
                args: term_args,
            } => {
                ctor == term_ctor
                    && args.len() == term_args.len()
                    && term_args
                        .iter()
                        .zip(args)
                        .all(|(t, p)| match_into(t, p, bindings))
            }
            // Atom occurrences never match constructor patterns.
            Term::Atom { .. } => false,
        },
    }
}

/// Instantiate a pattern under bindings, producing a fresh term.
pub fn substitute_pattern(pattern: &Pattern, bindings: &Bindings) -> Result<Rc<Term>> {
    match pattern {
        Pattern::Hole => Err(Error::IncompletePattern {
            context: "substitution".to_string(),
        }),
        Pattern::MetaVar(mv) => bindings
            .get(mv)
            .cloned()
            .ok_or_else(|| Error::not_found("meta-variable binding", mv)),
        Pattern::Ctor { ctor, args } => {
            let args = args
                .iter()
                .map(|p| substitute_pattern(p, bindings))
                .collect::<Result<Vec<_>>>()?;
            Ok(Term::ctor(ctor, args))
        }
    }
}

/// A pattern is complete iff it contains no hole.
pub fn is_pattern_complete(pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Hole => false,
        Pattern::MetaVar(_) => true,
        Pattern::Ctor { args, .. } => args.iter().all(is_pattern_complete),
    }
}

/// A rule is complete iff every pattern in its conclusion, premises and
/// side conditions is complete.
pub fn is_rule_complete(rule: &InferenceRule) -> bool {
    rule.conclusion.args.iter().all(is_pattern_complete)
        && rule
            .premises
            .iter()
            .all(|p| p.args.iter().all(is_pattern_complete))
        && rule.side_conditions.iter().all(|c| {
            is_pattern_complete(&c.arg)
                && match &c.test {
                    crate::ast::SideTest::In(p) | crate::ast::SideTest::NotIn(p) => {
                        is_pattern_complete(p)
                    }
                    _ => true,
                }
        })
}

/// Collect every meta-variable referenced by a pattern.
pub fn pattern_metavars(pattern: &Pattern, out: &mut BTreeSet<MetaVarId>) {
    match pattern {
        Pattern::Hole => {}
        Pattern::MetaVar(mv) => {
            out.insert(mv.clone());
        }
        Pattern::Ctor { args, .. } => {
            for a in args {
                pattern_metavars(a, out);
            }
        }
    }
}

/// Does the pattern mention this constructor anywhere?
pub fn pattern_mentions_ctor(pattern: &Pattern, ctor: &crate::ast::CtorId) -> bool {
    match pattern {
        Pattern::Hole | Pattern::MetaVar(_) => false,
        Pattern::Ctor { ctor: c, args } => {
            c == ctor || args.iter().any(|a| pattern_mentions_ctor(a, ctor))
        }
    }
}

/// Check a pattern against its expected sort: constructor arities and arg
/// sorts must line up, meta-variables must be declared at the right sort.
/// Holes are accepted; completeness is a separate question.
pub fn validate_pattern(theory: &Theory, expected: &crate::ast::SortId, pattern: &Pattern) -> Result<()> {
    match pattern {
        Pattern::Hole => Ok(()),
        Pattern::MetaVar(mv) => {
            let meta = theory.metavar(mv)?;
            if &meta.sort != expected {
                return Err(Error::shape(
                    "pattern",
                    format!("meta-variable of sort {}", expected),
                    format!("{} of sort {}", meta.name, meta.sort),
                ));
            }
            Ok(())
        }
        Pattern::Ctor { ctor, args } => {
            let c = theory.ctor(ctor)?;
            if &c.sort != expected {
                return Err(Error::shape(
                    "pattern",
                    format!("constructor of sort {}", expected),
                    format!("{} of sort {}", c.name, c.sort),
                ));
            }
            if c.args.len() != args.len() {
                return Err(Error::shape(
                    "pattern",
                    format!("{} arguments to {}", c.args.len(), c.name),
                    format!("{}", args.len()),
                ));
            }
            for (arg, sub) in c.args.iter().zip(args) {
                validate_pattern(theory, &arg.sort, sub)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CtorId, SortId};

    fn mv(n: &str) -> MetaVarId {
        MetaVarId(n.to_string())
    }

    fn ctor_id(n: &str) -> CtorId {
        CtorId(n.to_string())
    }

    #[test]
    fn metavar_binds_unconditionally() {
        let sort = SortId("sort-000001".to_string());
        let t = Term::atom(&sort, "x₁");
        let b = match_pattern(&t, &Pattern::MetaVar(mv("m"))).expect("should match");
        assert_eq!(b.get(&mv("m")), Some(&t));
    }

    #[test]
    fn nonlinear_pattern_requires_equal_terms() {
        let pair = ctor_id("pair");
        let zero = ctor_id("zero");
        let succ = ctor_id("succ");
        let z = Term::ctor(&zero, vec![]);
        let sz = Term::ctor(&succ, vec![z.clone()]);
        let pat = Pattern::Ctor {
            ctor: pair.clone(),
            args: vec![Pattern::MetaVar(mv("x")), Pattern::MetaVar(mv("x"))],
        };
        assert!(match_pattern(&Term::ctor(&pair, vec![z.clone(), sz.clone()]), &pat).is_none());
        let b = match_pattern(&Term::ctor(&pair, vec![z.clone(), z.clone()]), &pat)
            .expect("equal children should match");
        assert_eq!(b.get(&mv("x")), Some(&z));
    }

    #[test]
    fn holes_never_match() {
        let zero = ctor_id("zero");
        let z = Term::ctor(&zero, vec![]);
        assert!(match_pattern(&z, &Pattern::Hole).is_none());
        let pat = Pattern::Ctor {
            ctor: ctor_id("succ"),
            args: vec![Pattern::Hole],
        };
        let s = Term::ctor(&ctor_id("succ"), vec![z]);
        assert!(match_pattern(&s, &pat).is_none());
    }

    #[test]
    fn substitute_round_trips_match() {
        let succ = ctor_id("succ");
        let zero = ctor_id("zero");
        let pat = Pattern::Ctor {
            ctor: succ.clone(),
            args: vec![Pattern::MetaVar(mv("n"))],
        };
        let term = Term::ctor(&succ, vec![Term::ctor(&zero, vec![])]);
        let b = match_pattern(&term, &pat).expect("match");
        let rebuilt = substitute_pattern(&pat, &b).expect("substitute");
        assert_eq!(rebuilt, term);
    }

    #[test]
    fn substitute_fails_on_hole_and_unbound() {
        let b = Bindings::new();
        assert!(matches!(
            substitute_pattern(&Pattern::Hole, &b),
            Err(Error::IncompletePattern { .. })
        ));
        assert!(matches!(
            substitute_pattern(&Pattern::MetaVar(mv("m")), &b),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn completeness_walk() {
        assert!(!is_pattern_complete(&Pattern::Hole));
        assert!(is_pattern_complete(&Pattern::MetaVar(mv("m"))));
        let deep = Pattern::Ctor {
            ctor: ctor_id("succ"),
            args: vec![Pattern::Ctor {
                ctor: ctor_id("succ"),
                args: vec![Pattern::Hole],
            }],
        };
        assert!(!is_pattern_complete(&deep));
    }
}
