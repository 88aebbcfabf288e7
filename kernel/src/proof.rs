//! Proof state: goals with contexts, the open frontier, and the
//! append-only step log.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ast::{FuncId, GoalId, ProofId, PropertyId, SortId};
use crate::formula::{Formula, FormulaExpr};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextVariable {
    pub name: String,
    pub sort: SortId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub name: String,
    pub formula: Formula,
}

/// One open or closed obligation: a context of variables and hypotheses
/// plus the formula to establish. Names are unique within a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofGoal {
    pub id: GoalId,
    pub variables: Vec<ContextVariable>,
    pub hypotheses: Vec<Hypothesis>,
    pub goal: Formula,
}

impl ProofGoal {
    /// Is `name` already used by a variable or hypothesis?
    pub fn name_taken(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
            || self.hypotheses.iter().any(|h| h.name == name)
    }

    pub fn hypothesis(&self, name: &str) -> Option<&Hypothesis> {
        self.hypotheses.iter().find(|h| h.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofStatus {
    Incomplete,
    Complete,
}

/// One log entry: the goal a tactic consumed and the goals it produced.
/// The log is append-only; steps stay addressable forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofStep {
    pub goal: GoalId,
    pub tactic: Tactic,
    pub produced: Vec<GoalId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    pub id: ProofId,
    pub property: PropertyId,
    pub goals: BTreeMap<GoalId, ProofGoal>,
    pub root: GoalId,
    /// Ordered frontier; `status == Complete` iff this is empty.
    pub open_goals: Vec<GoalId>,
    pub steps: Vec<ProofStep>,
    pub status: ProofStatus,
}

impl Proof {
    pub fn is_open(&self, goal: &GoalId) -> bool {
        self.open_goals.contains(goal)
    }
}

/// Which side of a comparison a tactic operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Every tactic the engine understands. The last five are reserved and
/// uniformly rejected as unsupported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tactic {
    Intro { name: String },
    IntroHyp { name: String },
    ExistsWitness { witness: FormulaExpr },
    Split,
    Left,
    Right,
    Induction { var: String },
    CaseAnalysis { var: String },
    Reflexivity,
    Trivial,
    Exact { hypothesis: String },
    Apply { hypothesis: String },
    Discriminate { hypothesis: String },
    Unfold { func: FuncId, side: Side },
    Simplify,
    Rewrite,
    DerivationInduction,
    ApplyRule,
    Contradiction,
    Compute,
}

impl Tactic {
    pub fn name(&self) -> &'static str {
        match self {
            Tactic::Intro { .. } => "intro",
            Tactic::IntroHyp { .. } => "intro_hyp",
            Tactic::ExistsWitness { .. } => "exists_witness",
            Tactic::Split => "split",
            Tactic::Left => "left",
            Tactic::Right => "right",
            Tactic::Induction { .. } => "induction",
            Tactic::CaseAnalysis { .. } => "case_analysis",
            Tactic::Reflexivity => "reflexivity",
            Tactic::Trivial => "trivial",
            Tactic::Exact { .. } => "exact",
            Tactic::Apply { .. } => "apply",
            Tactic::Discriminate { .. } => "discriminate",
            Tactic::Unfold { .. } => "unfold",
            Tactic::Simplify => "simplify",
            Tactic::Rewrite => "rewrite",
            Tactic::DerivationInduction => "derivation_induction",
            Tactic::ApplyRule => "apply_rule",
            Tactic::Contradiction => "contradiction",
            Tactic::Compute => "compute",
        }
    }
}
