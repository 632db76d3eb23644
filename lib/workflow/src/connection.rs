//! Outgoing connections of a step.
//!
//! A step's connections take one of three shapes, chosen by the branch arity
//! of its type:
//! - `Plain`: a single next step, explicitly disconnected, or unset
//! - `Boolean`: independent `true` and `false` targets
//! - `MultiCase`: a target per case label plus an optional default

use crate::contract::BranchArity;
use chatflow_core::StepId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Target of a plain connection.
///
/// `Unset` and `Disconnected` are distinct: an unset step falls through to the
/// next step in insertion order, a disconnected one ends its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "step", rename_all = "snake_case")]
pub enum PlainTarget {
    /// Never wired; sequential fallback applies.
    #[default]
    Unset,
    /// Explicitly wired to nothing.
    Disconnected,
    /// Wired to a step.
    Step(StepId),
}

/// Names one outgoing edge slot of a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "branch", content = "label", rename_all = "snake_case")]
pub enum BranchLabel {
    /// The single edge of a plain step.
    Next,
    /// Taken when a boolean step's result is true.
    True,
    /// Taken when a boolean step's result is false.
    False,
    /// Taken when a multi-case step's result equals the label.
    Case(String),
    /// Taken when a multi-case step's result matches no case.
    Default,
}

impl BranchLabel {
    /// Creates a case label.
    #[must_use]
    pub fn case(label: impl Into<String>) -> Self {
        Self::Case(label.into())
    }

    /// Returns true if this label is legal for the given arity.
    #[must_use]
    pub fn fits(&self, arity: BranchArity) -> bool {
        matches!(
            (arity, self),
            (BranchArity::Plain, Self::Next)
                | (BranchArity::Boolean, Self::True | Self::False)
                | (BranchArity::MultiCase, Self::Case(_) | Self::Default)
        )
    }
}

impl fmt::Display for BranchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => write!(f, "next"),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Case(label) => write!(f, "case:{label}"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// The outgoing connections of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Connections {
    /// One outgoing edge.
    Plain {
        #[serde(default)]
        next: PlainTarget,
    },
    /// Two outgoing edges selected by a boolean result.
    Boolean {
        #[serde(default, rename = "true")]
        on_true: Option<StepId>,
        #[serde(default, rename = "false")]
        on_false: Option<StepId>,
    },
    /// One edge per case label plus an optional default.
    MultiCase {
        #[serde(default)]
        cases: BTreeMap<String, StepId>,
        #[serde(default)]
        default: Option<StepId>,
    },
}

impl Connections {
    /// Returns empty connections of the shape required by `arity`.
    #[must_use]
    pub fn for_arity(arity: BranchArity) -> Self {
        match arity {
            BranchArity::Plain => Self::Plain {
                next: PlainTarget::Unset,
            },
            BranchArity::Boolean => Self::Boolean {
                on_true: None,
                on_false: None,
            },
            BranchArity::MultiCase => Self::MultiCase {
                cases: BTreeMap::new(),
                default: None,
            },
        }
    }

    /// Returns the arity this shape corresponds to.
    #[must_use]
    pub fn arity(&self) -> BranchArity {
        match self {
            Self::Plain { .. } => BranchArity::Plain,
            Self::Boolean { .. } => BranchArity::Boolean,
            Self::MultiCase { .. } => BranchArity::MultiCase,
        }
    }

    /// Returns the step wired to `label`, if any.
    #[must_use]
    pub fn target(&self, label: &BranchLabel) -> Option<StepId> {
        match (self, label) {
            (Self::Plain { next }, BranchLabel::Next) => match next {
                PlainTarget::Step(id) => Some(*id),
                PlainTarget::Unset | PlainTarget::Disconnected => None,
            },
            (Self::Boolean { on_true, .. }, BranchLabel::True) => *on_true,
            (Self::Boolean { on_false, .. }, BranchLabel::False) => *on_false,
            (Self::MultiCase { cases, .. }, BranchLabel::Case(case)) => cases.get(case).copied(),
            (Self::MultiCase { default, .. }, BranchLabel::Default) => *default,
            _ => None,
        }
    }

    /// Returns every wired edge in slot order.
    #[must_use]
    pub fn edges(&self) -> Vec<(BranchLabel, StepId)> {
        match self {
            Self::Plain { next } => match next {
                PlainTarget::Step(id) => vec![(BranchLabel::Next, *id)],
                PlainTarget::Unset | PlainTarget::Disconnected => Vec::new(),
            },
            Self::Boolean { on_true, on_false } => [
                on_true.map(|id| (BranchLabel::True, id)),
                on_false.map(|id| (BranchLabel::False, id)),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Self::MultiCase { cases, default } => cases
                .iter()
                .map(|(label, id)| (BranchLabel::Case(label.clone()), *id))
                .chain(default.map(|id| (BranchLabel::Default, id)))
                .collect(),
        }
    }

    /// Wires `label` to `target`.
    ///
    /// Returns false, leaving the connections untouched, if the label does not
    /// fit this shape.
    pub(crate) fn set(&mut self, label: BranchLabel, target: StepId) -> bool {
        match (self, label) {
            (Self::Plain { next }, BranchLabel::Next) => *next = PlainTarget::Step(target),
            (Self::Boolean { on_true, .. }, BranchLabel::True) => *on_true = Some(target),
            (Self::Boolean { on_false, .. }, BranchLabel::False) => *on_false = Some(target),
            (Self::MultiCase { cases, .. }, BranchLabel::Case(case)) => {
                cases.insert(case, target);
            }
            (Self::MultiCase { default, .. }, BranchLabel::Default) => *default = Some(target),
            _ => return false,
        }
        true
    }

    /// Disconnects `label`, returning the step it pointed at.
    ///
    /// A plain edge becomes `Disconnected` rather than `Unset`, so the
    /// sequential fallback no longer applies. A case label is removed
    /// entirely.
    pub(crate) fn disconnect(&mut self, label: &BranchLabel) -> Option<StepId> {
        match (self, label) {
            (Self::Plain { next }, BranchLabel::Next) => {
                let previous = match *next {
                    PlainTarget::Step(id) => Some(id),
                    PlainTarget::Unset | PlainTarget::Disconnected => None,
                };
                *next = PlainTarget::Disconnected;
                previous
            }
            (Self::Boolean { on_true, .. }, BranchLabel::True) => on_true.take(),
            (Self::Boolean { on_false, .. }, BranchLabel::False) => on_false.take(),
            (Self::MultiCase { cases, .. }, BranchLabel::Case(case)) => cases.remove(case),
            (Self::MultiCase { default, .. }, BranchLabel::Default) => default.take(),
            _ => None,
        }
    }

    /// Returns a plain edge to `Unset`, restoring sequential fallback.
    pub(crate) fn reset(&mut self) -> bool {
        match self {
            Self::Plain { next } => {
                *next = PlainTarget::Unset;
                true
            }
            Self::Boolean { .. } | Self::MultiCase { .. } => false,
        }
    }

    /// Clears every slot pointing at `target`, returning how many were cleared.
    ///
    /// Used when `target` is deleted. Plain edges go back to `Unset`, boolean
    /// branches to `None`, and case entries are dropped.
    pub(crate) fn forget(&mut self, target: StepId) -> usize {
        match self {
            Self::Plain { next } => {
                if *next == PlainTarget::Step(target) {
                    *next = PlainTarget::Unset;
                    1
                } else {
                    0
                }
            }
            Self::Boolean { on_true, on_false } => {
                let mut cleared = 0;
                for slot in [on_true, on_false] {
                    if *slot == Some(target) {
                        *slot = None;
                        cleared += 1;
                    }
                }
                cleared
            }
            Self::MultiCase { cases, default } => {
                let before = cases.len();
                cases.retain(|_, id| *id != target);
                let mut cleared = before - cases.len();
                if *default == Some(target) {
                    *default = None;
                    cleared += 1;
                }
                cleared
            }
        }
    }
}
