use crate::plugin_graph::EdgeKind;
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Cycle diagnostics
// ---------------------------------------------------------------------------

/// One vertex on a detected cycle: the plugin or group name, plus the kind
/// of edge leading to the next vertex on the cycle. The last vertex's edge
/// closes the cycle back to the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleVertex {
    pub name: String,
    pub out_edge: EdgeKind,
}

impl fmt::Display for CycleVertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --[{}]->", self.name, self.out_edge)
    }
}

/// Renders a cycle as `A --[kind]-> B --[kind]-> A`.
pub fn display_cycle(cycle: &[CycleVertex]) -> String {
    let mut out = String::new();
    for vertex in cycle {
        out.push_str(&vertex.name);
        out.push_str(" --[");
        out.push_str(&vertex.out_edge.to_string());
        out.push_str("]-> ");
    }
    if let Some(first) = cycle.first() {
        out.push_str(&first.name);
    }
    out
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during metadata handling and sorting.
///
/// On any error the caller's installed order is untouched; nothing is
/// partially written.
#[derive(Debug, thiserror::Error)]
pub enum SortError {
    /// A required file is missing or unwritable.
    #[error("cannot access {path}: {detail}")]
    FileAccess { path: PathBuf, detail: String },

    /// The caller violated a precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An external oracle rejected its input.
    #[error("failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    /// The condition evaluator rejected a condition string.
    #[error("invalid condition '{condition}': {detail}")]
    ConditionSyntax { condition: String, detail: String },

    /// A group reference names a group that does not exist.
    #[error("group '{0}' is not defined")]
    UndefinedGroup(String),

    /// A cycle was found in the plugin or group graph. Carries the full
    /// cycle so the offending metadata source can be identified.
    #[error("cyclic interaction: {}", display_cycle(.cycle))]
    CyclicInteraction { cycle: Vec<CycleVertex> },
}

impl SortError {
    /// Convenience constructor for file-access failures.
    pub fn file_access(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        SortError::FileAccess {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Convenience constructor for parse failures.
    pub fn parse(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        SortError::Parse {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
