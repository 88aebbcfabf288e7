//! Term operations: rendering, free-atom analysis, deterministic
//! enumeration, and seeded random generation.
//!
//! Atom instances are spelled `prefix` + subscript index (`x₁, x₂, …`);
//! the per-sort counters live on the registry so successive generations
//! stay distinct until reset.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::ast::{JudgmentId, SortId, SortKind, Term};
use crate::error::{Error, Result};
use crate::theory::Theory;

/// Cap on enumerated terms per sort (spec §5).
pub const MAX_TERMS_PER_SORT: usize = 30;

/// How many canonical atoms enumeration materializes for an atom sort.
const ENUMERATED_ATOMS: u64 = 3;

/// Render `n` in subscript digits.
pub fn to_subscript(mut n: u64) -> String {
    const DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];
    if n == 0 {
        return DIGITS[0].to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 10) as usize]);
        n /= 10;
    }
    out.iter().rev().collect()
}

/// Render a term: atoms by name, applications as `Name(arg, …)`.
pub fn render_term(theory: &Theory, term: &Term) -> String {
    match term {
        Term::Atom { name, .. } => name.clone(),
        Term::Ctor { ctor, args } => {
            let name = theory
                .ctor(ctor)
                .map(|c| c.name.clone())
                .unwrap_or_else(|_| ctor.to_string());
            if args.is_empty() {
                name
            } else {
                let inner: Vec<_> = args.iter().map(|a| render_term(theory, a)).collect();
                format!("{}({})", name, inner.join(", "))
            }
        }
    }
}

/// Render a judgment over concrete terms by interleaving its separators.
pub fn render_judgment_terms(
    theory: &Theory,
    judgment: &JudgmentId,
    terms: &[Rc<Term>],
) -> Result<String> {
    let j = theory.judgment(judgment)?;
    if terms.len() != j.arg_sorts.len() {
        return Err(Error::shape(
            "judgment rendering",
            format!("{} arguments to {}", j.arg_sorts.len(), j.name),
            format!("{}", terms.len()),
        ));
    }
    let mut out = String::new();
    out.push_str(&j.separators[0]);
    for (i, t) in terms.iter().enumerate() {
        out.push_str(&render_term(theory, t));
        out.push_str(&j.separators[i + 1]);
    }
    Ok(out)
}

/// All atom occurrences in a term, as (sort, name) pairs.
pub fn free_atoms(term: &Term, out: &mut BTreeSet<(SortId, String)>) {
    match term {
        Term::Atom { sort, name } => {
            out.insert((sort.clone(), name.clone()));
        }
        Term::Ctor { args, .. } => {
            for a in args {
                free_atoms(a, out);
            }
        }
    }
}

/// Enumerate terms of a sort up to the given constructor depth, smallest
/// first, capped at [`MAX_TERMS_PER_SORT`]. Deterministic: constructors
/// are visited in registration order and the result is ordered by
/// (size, rendered form).
pub fn enumerate_terms(theory: &Theory, sort: &SortId, max_depth: usize) -> Result<Vec<Rc<Term>>> {
    let s = theory.sort(sort)?;
    if max_depth == 0 {
        return Ok(Vec::new());
    }
    let mut terms = match &s.kind {
        SortKind::Atom { prefix } => (1..=ENUMERATED_ATOMS)
            .map(|i| Term::atom(sort, format!("{}{}", prefix, to_subscript(i))))
            .collect(),
        SortKind::Inductive => {
            let mut candidates = Vec::new();
            for ctor in theory.constructors_of(sort) {
                let mut arg_choices = Vec::with_capacity(ctor.args.len());
                for arg in &ctor.args {
                    let choices = enumerate_terms(theory, &arg.sort, max_depth - 1)?;
                    arg_choices.push(choices);
                }
                cartesian(&ctor.id, &arg_choices, &mut candidates);
                if candidates.len() > 5_000 {
                    break;
                }
            }
            candidates
        }
    };
    terms.sort_by_cached_key(|t| (t.size(), render_term(theory, t)));
    terms.dedup_by_key(|t| render_term(theory, t));
    terms.truncate(MAX_TERMS_PER_SORT);
    Ok(terms)
}

fn cartesian(ctor: &crate::ast::CtorId, choices: &[Vec<Rc<Term>>], out: &mut Vec<Rc<Term>>) {
    fn go(
        ctor: &crate::ast::CtorId,
        choices: &[Vec<Rc<Term>>],
        acc: &mut Vec<Rc<Term>>,
        out: &mut Vec<Rc<Term>>,
    ) {
        if acc.len() == choices.len() {
            out.push(Term::ctor(ctor, acc.clone()));
            return;
        }
        for choice in &choices[acc.len()] {
            acc.push(choice.clone());
            go(ctor, choices, acc, out);
            acc.pop();
        }
    }
    go(ctor, choices, &mut Vec::new(), out);
}

impl Theory {
    /// Next atom instance of an atom sort: `prefix` + subscript counter.
    pub fn fresh_atom(&mut self, sort: &SortId) -> Result<Rc<Term>> {
        let prefix = {
            let s = self.sort(sort)?;
            match s.atom_prefix() {
                Some(p) => p.to_string(),
                None => {
                    return Err(Error::shape(
                        "fresh atom",
                        "an atom sort",
                        format!("inductive sort {}", s.name),
                    ))
                }
            }
        };
        let n = self.bump_atom_counter(sort);
        Ok(Term::atom(sort, format!("{}{}", prefix, to_subscript(n))))
    }

    /// Generate a random term of the sort with an explicit seed.
    pub fn generate_random_term(
        &mut self,
        sort: &SortId,
        max_depth: usize,
        seed: u64,
    ) -> Result<Rc<Term>> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.random_term(sort, max_depth, &mut rng)
    }

    /// Generate a random term using the caller's generator. Atom sorts
    /// draw fresh names from the counter, so successive calls differ.
    pub fn random_term(
        &mut self,
        sort: &SortId,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Result<Rc<Term>> {
        if max_depth == 0 {
            return Err(Error::shape(
                "random term generation",
                "remaining depth",
                "0",
            ));
        }
        if self.sort(sort)?.is_atom() {
            return self.fresh_atom(sort);
        }
        let pool: Vec<(crate::ast::CtorId, Vec<SortId>)> = self
            .constructors_of(sort)
            .into_iter()
            .filter(|c| max_depth > 1 || c.is_terminal())
            .map(|c| (c.id.clone(), c.args.iter().map(|a| a.sort.clone()).collect()))
            .collect();
        if pool.is_empty() {
            return Err(Error::shape(
                "random term generation",
                "a usable constructor",
                "none at this depth",
            ));
        }
        let (ctor, arg_sorts) = pool[rng.gen_range(0..pool.len())].clone();
        let mut args = Vec::with_capacity(arg_sorts.len());
        for arg_sort in &arg_sorts {
            args.push(self.random_term(arg_sort, max_depth - 1, rng)?);
        }
        Ok(Term::ctor(&ctor, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SortKind;
    use crate::theory::{CtorArgSpec, Theory};

    fn nat_theory() -> (Theory, SortId) {
        let mut th = Theory::new();
        let nat = th
            .create_sort("ℕ", SortKind::Inductive, false)
            .expect("sort");
        th.create_constructor(&nat, "Z", vec![]).expect("Z");
        th.create_constructor(
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
        (th, nat)
    }

    #[test]
    fn subscripts() {
        assert_eq!(to_subscript(0), "₀");
        assert_eq!(to_subscript(7), "₇");
        assert_eq!(to_subscript(12), "₁₂");
    }

    #[test]
    fn enumeration_is_smallest_first_and_deduplicated() {
        let (th, nat) = nat_theory();
        let terms = enumerate_terms(&th, &nat, 3).expect("enumerate");
        let rendered: Vec<_> = terms.iter().map(|t| render_term(&th, t)).collect();
        assert_eq!(rendered, vec!["Z", "S(Z)", "S(S(Z))"]);
    }

    #[test]
    fn enumeration_depth_zero_is_empty() {
        let (th, nat) = nat_theory();
        assert!(enumerate_terms(&th, &nat, 0).expect("enumerate").is_empty());
    }

    #[test]
    fn fresh_atoms_are_distinct_until_reset() {
        let mut th = Theory::new();
        let names = th
            .create_sort(
                "Name",
                SortKind::Atom {
                    prefix: "x".to_string(),
                },
                true,
            )
            .expect("sort");
        let a = th.fresh_atom(&names).expect("a");
        let b = th.fresh_atom(&names).expect("b");
        assert_ne!(a, b);
        th.reset_atom_counter(Some(&names));
        let c = th.fresh_atom(&names).expect("c");
        assert_eq!(a, c);
        assert_eq!(render_term(&th, &a), "x₁");
    }

    #[test]
    fn random_generation_is_seed_deterministic() {
        let (mut th, nat) = nat_theory();
        let t1 = th.generate_random_term(&nat, 4, 42).expect("t1");
        let (mut th2, nat2) = nat_theory();
        let t2 = th2.generate_random_term(&nat2, 4, 42).expect("t2");
        assert_eq!(render_term(&th, &t1), render_term(&th2, &t2));
    }
}
