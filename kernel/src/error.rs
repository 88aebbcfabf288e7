//! Kernel error taxonomy.
//!
//! Every engine surfaces failures through this one enum; nothing is thrown
//! past the caller or silently dropped. The variants carry enough structure
//! for a front end to phrase a precise message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Error {
    /// A referenced entity id does not exist in the registry.
    #[error("unknown {kind} {id}")]
    NotFound { kind: String, id: String },

    /// Arity or sort mismatch.
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// The operation needs a complete pattern but a hole remains.
    #[error("incomplete pattern in {context}")]
    IncompletePattern { context: String },

    /// The structural-recursion check rejected a function.
    #[error("termination check failed in case {case}: {details}")]
    TerminationFailure {
        case: String,
        details: TerminationDetails,
    },

    /// The function evaluator reached an undefined state.
    #[error("evaluation stuck: {reason}")]
    EvaluationStuck { reason: String },

    /// A tactic's precondition does not hold on the selected goal.
    #[error("tactic {tactic} not applicable: {reason}")]
    TacticMismatch { tactic: String, reason: String },

    /// Backward search exhausted the depth bound without a witness.
    #[error("no derivation found within depth {depth}")]
    DerivationNotFound { depth: usize },

    /// Reserved but unimplemented tactic or operation.
    #[error("unsupported: {what}")]
    Unsupported { what: String },
}

impl Error {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    pub fn shape(context: &str, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::ShapeMismatch {
            context: context.to_string(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn stuck(reason: impl Into<String>) -> Self {
        Error::EvaluationStuck {
            reason: reason.into(),
        }
    }

    pub fn tactic(tactic: &str, reason: impl Into<String>) -> Self {
        Error::TacticMismatch {
            tactic: tactic.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why the structural-recursion check rejected a case.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TerminationDetails {
    /// A recursive call's principal argument is not one of the case's
    /// structural variables.
    #[error("recursive call on `{argument}`, which is not a structural sub-term")]
    NonStructuralRecursion { argument: String },

    /// The function has no case for a constructor of its principal sort.
    #[error("no case for constructor {constructor}")]
    MissingCase { constructor: String },

    /// A recursive call was made with the wrong number of arguments.
    #[error("recursive call with {found} arguments, expected {expected}")]
    RecursiveArity { expected: usize, found: usize },
}
