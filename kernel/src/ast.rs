//! The object-language metamodel: sorts, constructors, terms, patterns,
//! judgments, inference rules, and recursive functions.
//!
//! Everything here is a plain value. Entities that live in the registry
//! refer to each other exclusively by identifier; terms are immutable and
//! shared via `Rc`, identity is structural.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Mint the `n`-th identifier of this kind. Zero-padding keeps
            /// lexicographic order equal to creation order.
            pub(crate) fn mint(n: u64) -> Self {
                $name(format!(concat!($prefix, "-{:06}"), n))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id!(SortId, "sort");
define_id!(CtorId, "ctor");
define_id!(ArgId, "arg");
define_id!(JudgmentId, "judg");
define_id!(MetaVarId, "meta");
define_id!(InstanceId, "inst");
define_id!(CondId, "cond");
define_id!(RuleId, "rule");
define_id!(FuncId, "func");
define_id!(PropertyId, "prop");
define_id!(ProofId, "proof");
define_id!(GoalId, "goal");

/// A syntactic category: either inductive (defined by its constructors) or
/// an atom sort, an infinite family of distinct names seeded by a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub id: SortId,
    pub name: String,
    pub kind: SortKind,
    pub is_binder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKind {
    Inductive,
    Atom { prefix: String },
}

impl Sort {
    pub fn is_atom(&self) -> bool {
        matches!(self.kind, SortKind::Atom { .. })
    }

    pub fn atom_prefix(&self) -> Option<&str> {
        match &self.kind {
            SortKind::Atom { prefix } => Some(prefix),
            SortKind::Inductive => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constructor {
    pub id: CtorId,
    pub sort: SortId,
    pub name: String,
    pub args: Vec<ConstructorArg>,
}

impl Constructor {
    /// A constructor is terminal iff no argument recurses into its own
    /// sort. Derived on demand, never stored.
    pub fn is_terminal(&self) -> bool {
        self.args.iter().all(|a| a.sort != self.sort)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorArg {
    pub id: ArgId,
    pub sort: SortId,
    pub label: Option<String>,
    /// Binder mark for the UI; the engine never alpha-converts.
    pub is_binder: bool,
    /// Which sibling arguments the bound atom scopes over.
    pub binds_in: BTreeSet<ArgId>,
}

/// An object-language term: an atom occurrence or a constructor
/// application. Identity is structural.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Atom { sort: SortId, name: String },
    Ctor { ctor: CtorId, args: Vec<Rc<Term>> },
}

impl Term {
    pub fn atom(sort: &SortId, name: impl Into<String>) -> Rc<Term> {
        Rc::new(Term::Atom {
            sort: sort.clone(),
            name: name.into(),
        })
    }

    pub fn ctor(ctor: &CtorId, args: Vec<Rc<Term>>) -> Rc<Term> {
        Rc::new(Term::Ctor {
            ctor: ctor.clone(),
            args,
        })
    }

    /// Number of nodes, atoms included.
    pub fn size(&self) -> usize {
        match self {
            Term::Atom { .. } => 1,
            Term::Ctor { args, .. } => 1 + args.iter().map(|a| a.size()).sum::<usize>(),
        }
    }
}

/// Stands for an arbitrary term of its sort inside a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaVariable {
    pub id: MetaVarId,
    pub name: String,
    pub sort: SortId,
}

/// A partial term shape. Interior nodes are constructor applications with
/// full arity; leaves are meta-variables, nullary constructors, or holes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    MetaVar(MetaVarId),
    Ctor { ctor: CtorId, args: Vec<Pattern> },
    Hole,
}

/// A named relation over sort-typed positions, rendered by interleaving
/// the separator strings with the arguments.
///
/// Invariant: `separators.len() == arg_sorts.len() + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgment {
    pub id: JudgmentId,
    pub name: String,
    pub symbol: String,
    pub arg_sorts: Vec<JudgmentArg>,
    pub separators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentArg {
    pub sort: SortId,
    pub label: Option<String>,
}

/// One use of a judgment inside a rule, with a pattern per position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentInstance {
    pub id: InstanceId,
    pub judgment: JudgmentId,
    pub args: Vec<Pattern>,
}

/// A decidable predicate attached to a rule: a function applied to a
/// pattern, compared against a literal or probed for membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCondition {
    pub id: CondId,
    pub func: FuncId,
    pub arg: Pattern,
    pub test: SideTest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideTest {
    Eq(i64),
    Neq(i64),
    Lt(i64),
    Leq(i64),
    Gt(i64),
    Geq(i64),
    IsEmpty,
    NotEmpty,
    In(Pattern),
    NotIn(Pattern),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRule {
    pub id: RuleId,
    pub name: String,
    pub premises: Vec<JudgmentInstance>,
    pub side_conditions: Vec<SideCondition>,
    pub conclusion: JudgmentInstance,
    /// Canvas placement, preserved for the editor.
    pub position: (f64, f64),
}

/// Comparison operators shared by function predicates, side conditions and
/// formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl CmpOp {
    pub fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Neq => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Leq => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Geq => lhs >= rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Neq => "≠",
            CmpOp::Lt => "<",
            CmpOp::Leq => "≤",
            CmpOp::Gt => ">",
            CmpOp::Geq => "≥",
        }
    }
}

/// A structurally recursive function over one inductive sort, one case per
/// constructor. `terminates` and `termination_error` are derived
/// attributes recomputed by the registry on every change that can affect
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecursiveFunc {
    pub id: FuncId,
    pub name: String,
    pub principal_sort: SortId,
    pub extra_args: Vec<(String, SortId)>,
    pub return_type: FuncReturnType,
    pub cases: Vec<FuncCase>,
    pub terminates: bool,
    pub termination_error: Option<String>,
}

impl RecursiveFunc {
    pub fn case_for(&self, ctor: &CtorId) -> Option<&FuncCase> {
        self.cases.iter().find(|c| &c.ctor == ctor)
    }

    /// Principal argument plus the extras.
    pub fn arity(&self) -> usize {
        1 + self.extra_args.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncReturnType {
    Int,
    Set { element_sort: SortId },
    Inductive { sort: SortId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncCase {
    pub ctor: CtorId,
    /// One name per constructor argument, binding the subterm in the body.
    pub bound_vars: Vec<String>,
    pub body: FuncExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FuncExpr {
    Int(i64),
    EmptySet,
    Var(String),
    Singleton(Box<FuncExpr>),
    Call {
        func: FuncId,
        args: Vec<FuncExpr>,
    },
    Ctor {
        ctor: CtorId,
        args: Vec<FuncExpr>,
    },
    Binop {
        op: FuncBinop,
        lhs: Box<FuncExpr>,
        rhs: Box<FuncExpr>,
    },
    If {
        cond: Box<FuncPredicate>,
        then: Box<FuncExpr>,
        els: Box<FuncExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncBinop {
    Add,
    Sub,
    Mul,
    Max,
    Min,
    Union,
    Intersect,
    Diff,
}

impl FuncBinop {
    pub fn is_arithmetic(self) -> bool {
        !matches!(
            self,
            FuncBinop::Union | FuncBinop::Intersect | FuncBinop::Diff
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            FuncBinop::Add => "+",
            FuncBinop::Sub => "-",
            FuncBinop::Mul => "*",
            FuncBinop::Max => "max",
            FuncBinop::Min => "min",
            FuncBinop::Union => "∪",
            FuncBinop::Intersect => "∩",
            FuncBinop::Diff => "∖",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FuncPredicate {
    Cmp {
        op: CmpOp,
        lhs: FuncExpr,
        rhs: FuncExpr,
    },
    AtomEq(FuncExpr, FuncExpr),
    AtomNeq(FuncExpr, FuncExpr),
    In {
        element: FuncExpr,
        set: FuncExpr,
    },
    IsEmpty(FuncExpr),
    And(Box<FuncPredicate>, Box<FuncPredicate>),
    Or(Box<FuncPredicate>, Box<FuncPredicate>),
    Not(Box<FuncPredicate>),
}

/// Result of evaluating a function body: an integer, a finite set of atom
/// names, or a term. No coercions between the three.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncValue {
    Int(i64),
    Set(BTreeSet<String>),
    Term(Rc<Term>),
}

impl FuncValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FuncValue::Int(_) => "integer",
            FuncValue::Set(_) => "set",
            FuncValue::Term(_) => "term",
        }
    }
}

/// A named first-order theorem statement; at most one proof attaches to a
/// property at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub statement: crate::formula::Formula,
}
