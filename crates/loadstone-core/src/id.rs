use serde::{Deserialize, Serialize};

/// Identifies a plugin vertex in the plugin graph. The index doubles as the
/// plugin's position in the caller-supplied input order, which is what the
/// final tie-break sorts by. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PluginIx(pub u32);

/// Identifies a group vertex in the group graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupIx(pub u32);

impl PluginIx {
    /// The vertex index as a usize, for adjacency-list indexing.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl GroupIx {
    /// The vertex index as a usize, for adjacency-list indexing.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
