//! The plugin graph: installed plugins as vertices, ordering constraints as
//! typed edges, and a deterministic topological linearisation.
//!
//! Edges are inserted in strict priority tiers (hardcoded first, tie-breaks
//! last). After every tier that can introduce a cycle the graph is checked
//! and a cycle aborts the sort with a named diagnostic; group and overlap
//! edges that would close a cycle are instead skipped. The final sort is a
//! stable Kahn's algorithm keyed by input position, so vertices whose order
//! no edge constrains keep their original relative order, so sorting twice on
//! identical inputs yields identical output.

use crate::error::{CycleVertex, SortError, display_cycle};
use crate::group_graph::{GroupGraph, Reachability};
use crate::id::{GroupIx, PluginIx};
use crate::metadata::PluginMetadata;
use crate::plugin::{PluginRecord, normalize_filename};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;

// ---------------------------------------------------------------------------
// Edge kinds
// ---------------------------------------------------------------------------

/// Why one plugin must load before another. Variants are declared in
/// priority order, highest first: when several constraints would justify
/// the same edge, the tier that runs first records its kind, and that is
/// the kind cycle diagnostics report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// Game-imposed ordering, e.g. the game's own master file.
    Hardcoded,
    /// Non-masters load after masters; blueprint masters load last among
    /// masters.
    MasterFlag,
    /// A plugin's declared master precedes it.
    Master,
    MasterlistRequirement,
    MasterlistLoadAfter,
    UserRequirement,
    UserLoadAfter,
    /// Derived from group-graph reachability.
    Group,
    /// Two plugins override common records; the bigger override set loads
    /// later.
    Overlap,
    /// Final determinism edge reproducing the input order.
    TieBreak,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EdgeKind::Hardcoded => "hardcoded",
            EdgeKind::MasterFlag => "master flag",
            EdgeKind::Master => "master",
            EdgeKind::MasterlistRequirement => "masterlist requirement",
            EdgeKind::MasterlistLoadAfter => "masterlist load after",
            EdgeKind::UserRequirement => "user requirement",
            EdgeKind::UserLoadAfter => "user load after",
            EdgeKind::Group => "group",
            EdgeKind::Overlap => "overlap",
            EdgeKind::TieBreak => "tie-break",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Sorting plugin
// ---------------------------------------------------------------------------

/// One plugin prepared for sorting: the oracle's record plus its evaluated
/// masterlist and userlist metadata and its resolved group.
#[derive(Debug, Clone)]
pub struct SortingPlugin {
    pub record: PluginRecord,
    pub masterlist: PluginMetadata,
    pub userlist: PluginMetadata,
    pub group: String,
}

impl SortingPlugin {
    /// A plugin with empty metadata, in the `default` group.
    pub fn bare(record: PluginRecord) -> Self {
        let name = record.name.clone();
        let group = record
            .group
            .clone()
            .unwrap_or_else(|| crate::metadata::Group::DEFAULT_NAME.to_string());
        Self {
            record,
            masterlist: PluginMetadata::new(name.clone()),
            userlist: PluginMetadata::new(name),
            group,
        }
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Adjacency-list digraph over the installed plugins. Vertex index equals
/// input position; at most one edge is stored per ordered vertex pair.
#[derive(Debug)]
pub struct PluginGraph {
    plugins: Vec<SortingPlugin>,
    index: HashMap<String, PluginIx>,
    out_edges: Vec<Vec<(PluginIx, EdgeKind)>>,
    edge_pairs: HashSet<(u32, u32)>,
    /// Positive reachability cache. Edges are only ever added, so a cached
    /// "reachable" answer never goes stale.
    paths_cache: HashSet<(u32, u32)>,
}

impl PluginGraph {
    /// Builds a graph with one vertex per plugin, in the given order.
    /// Fails with `InvalidArgument` on a duplicate filename.
    pub fn new(plugins: Vec<SortingPlugin>) -> Result<Self, SortError> {
        let mut index = HashMap::with_capacity(plugins.len());
        for (position, plugin) in plugins.iter().enumerate() {
            let key = plugin.record.name_key();
            if index.insert(key, PluginIx(position as u32)).is_some() {
                return Err(SortError::InvalidArgument(format!(
                    "duplicate plugin '{}'",
                    plugin.record.name
                )));
            }
        }
        Ok(Self {
            out_edges: vec![Vec::new(); plugins.len()],
            edge_pairs: HashSet::new(),
            paths_cache: HashSet::new(),
            plugins,
            index,
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn plugin(&self, ix: PluginIx) -> &SortingPlugin {
        &self.plugins[ix.index()]
    }

    /// Case-insensitive vertex lookup.
    pub fn index_of(&self, name: &str) -> Option<PluginIx> {
        self.index.get(&normalize_filename(name)).copied()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_pairs.len()
    }

    /// Snapshot of every edge as `(from, to, kind)`.
    pub fn edges(&self) -> Vec<(PluginIx, PluginIx, EdgeKind)> {
        let mut out = Vec::with_capacity(self.edge_pairs.len());
        for (from, edges) in self.out_edges.iter().enumerate() {
            for &(to, kind) in edges {
                out.push((PluginIx(from as u32), to, kind));
            }
        }
        out
    }

    /// Adds an edge unless it is a self-loop or the ordered pair already
    /// has one. Returns whether an edge was added.
    pub fn add_edge(&mut self, from: PluginIx, to: PluginIx, kind: EdgeKind) -> bool {
        if from == to {
            return false;
        }
        if !self.edge_pairs.insert((from.0, to.0)) {
            return false;
        }
        self.out_edges[from.index()].push((to, kind));
        true
    }

    // -----------------------------------------------------------------------
    // Tier 1: hardcoded
    // -----------------------------------------------------------------------

    /// Adds the game's hardcoded ordering: earlier hardcoded plugins before
    /// later ones, and every installed hardcoded plugin before every other
    /// plugin.
    pub fn add_hardcoded_edges(&mut self, hardcoded: &[String]) {
        let installed: Vec<PluginIx> = hardcoded
            .iter()
            .filter_map(|name| self.index_of(name))
            .collect();

        for (i, &earlier) in installed.iter().enumerate() {
            for &later in &installed[i + 1..] {
                self.add_edge(earlier, later, EdgeKind::Hardcoded);
            }
        }

        let hardcoded_set: HashSet<PluginIx> = installed.iter().copied().collect();
        for &h in &installed {
            for position in 0..self.plugins.len() {
                let v = PluginIx(position as u32);
                if !hardcoded_set.contains(&v) {
                    self.add_edge(h, v, EdgeKind::Hardcoded);
                }
            }
        }
        log::debug!("added hardcoded edges for {} plugins", installed.len());
    }

    // -----------------------------------------------------------------------
    // Tier 2: master flags
    // -----------------------------------------------------------------------

    /// Non-masters load after all masters; blueprint masters load after
    /// non-blueprint masters.
    pub fn add_master_flag_edges(&mut self) {
        let mut masters = Vec::new();
        let mut blueprints = Vec::new();
        let mut non_masters = Vec::new();
        for position in 0..self.plugins.len() {
            let record = &self.plugins[position].record;
            let v = PluginIx(position as u32);
            if record.is_blueprint() {
                blueprints.push(v);
            } else if record.is_master {
                masters.push(v);
            } else {
                non_masters.push(v);
            }
        }

        for &m in masters.iter().chain(blueprints.iter()) {
            for &v in &non_masters {
                self.add_edge(m, v, EdgeKind::MasterFlag);
            }
        }
        for &m in &masters {
            for &b in &blueprints {
                self.add_edge(m, b, EdgeKind::MasterFlag);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tier 3: declared masters
    // -----------------------------------------------------------------------

    /// Each installed declared master precedes the plugin declaring it.
    pub fn add_master_edges(&mut self) {
        let mut pending = Vec::new();
        for (position, plugin) in self.plugins.iter().enumerate() {
            for master in &plugin.record.masters {
                if let Some(m) = self.index_of(master) {
                    pending.push((m, PluginIx(position as u32)));
                }
            }
        }
        for (m, v) in pending {
            self.add_edge(m, v, EdgeKind::Master);
        }
    }

    // -----------------------------------------------------------------------
    // Tiers 4 and 5: metadata requirements and load-after
    // -----------------------------------------------------------------------

    /// Masterlist requirements and load-after files precede their plugin.
    pub fn add_masterlist_metadata_edges(&mut self) {
        self.add_file_list_edges(
            false,
            EdgeKind::MasterlistRequirement,
            EdgeKind::MasterlistLoadAfter,
        );
    }

    /// Userlist requirements and load-after files precede their plugin.
    pub fn add_user_metadata_edges(&mut self) {
        self.add_file_list_edges(true, EdgeKind::UserRequirement, EdgeKind::UserLoadAfter);
    }

    fn add_file_list_edges(&mut self, user: bool, requirement_kind: EdgeKind, after_kind: EdgeKind) {
        let mut pending = Vec::new();
        for (position, plugin) in self.plugins.iter().enumerate() {
            let v = PluginIx(position as u32);
            let metadata = if user {
                &plugin.userlist
            } else {
                &plugin.masterlist
            };
            for file in &metadata.requirements {
                if let Some(f) = self.index_of(&file.name) {
                    pending.push((f, v, requirement_kind));
                }
            }
            for file in &metadata.after {
                if let Some(f) = self.index_of(&file.name) {
                    pending.push((f, v, after_kind));
                }
            }
        }
        for (f, v, kind) in pending {
            self.add_edge(f, v, kind);
        }
    }

    // -----------------------------------------------------------------------
    // Tier 6: groups
    // -----------------------------------------------------------------------

    /// For every ordered plugin pair whose groups are connected in the
    /// group graph, adds an edge, unless that edge would close a cycle
    /// against the already-added harder constraints, in which case it is
    /// skipped with a warning. An unknown group name is fatal.
    pub fn add_group_edges(&mut self, groups: &GroupGraph) -> Result<(), SortError> {
        let mut group_of = Vec::with_capacity(self.plugins.len());
        for plugin in &self.plugins {
            let ix = groups
                .group_ix(&plugin.group)
                .ok_or_else(|| SortError::UndefinedGroup(plugin.group.clone()))?;
            group_of.push(ix);
        }

        let mut reach: HashMap<GroupIx, Reachability> = HashMap::new();
        let mut candidates = Vec::new();
        for a in 0..self.plugins.len() {
            for b in 0..self.plugins.len() {
                if a == b || group_of[a] == group_of[b] {
                    continue;
                }
                let reachability = reach
                    .entry(group_of[a])
                    .or_insert_with(|| groups.reachability(group_of[a]));
                if reachability.reaches(group_of[b]) {
                    candidates.push((PluginIx(a as u32), PluginIx(b as u32)));
                }
            }
        }

        for (a, b) in candidates {
            if self.path_exists(b, a) {
                let cycle = self.describe_blocked_edge(b, a, EdgeKind::Group);
                log::warn!(
                    "skipping group edge from {} to {}: it would complete the cycle {}",
                    self.plugins[a.index()].record.name,
                    self.plugins[b.index()].record.name,
                    cycle,
                );
            } else {
                self.add_edge(a, b, EdgeKind::Group);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tier 7: overlap
    // -----------------------------------------------------------------------

    /// For every pair overriding common records or providing common assets,
    /// the plugin with more overrides loads later; ties fall through to
    /// asset count, CRC, then input position. Edges that would close a
    /// cycle are skipped.
    pub fn add_overlap_edges(&mut self) {
        let mut candidates = Vec::new();
        for i in 0..self.plugins.len() {
            for j in i + 1..self.plugins.len() {
                let a = &self.plugins[i].record;
                let b = &self.plugins[j].record;
                if !a.overlaps_records(b) && !a.overlaps_assets(b) {
                    continue;
                }

                let ordering = a
                    .override_records
                    .len()
                    .cmp(&b.override_records.len())
                    .then(a.assets.len().cmp(&b.assets.len()))
                    .then(a.crc.unwrap_or(0).cmp(&b.crc.unwrap_or(0)))
                    .then(i.cmp(&j));
                // The greater side loads later.
                let (first, later) = match ordering {
                    Ordering::Greater => (j, i),
                    _ => (i, j),
                };
                candidates.push((PluginIx(first as u32), PluginIx(later as u32)));
            }
        }

        for (first, later) in candidates {
            if self.path_exists(later, first) {
                log::debug!(
                    "skipping overlap edge from {} to {}: it would close a cycle",
                    self.plugins[first.index()].record.name,
                    self.plugins[later.index()].record.name,
                );
            } else {
                self.add_edge(first, later, EdgeKind::Overlap);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tier 8: tie-breaks
    // -----------------------------------------------------------------------

    /// Pins the input order along a chain of tie-break edges. Together with
    /// the position-keyed linearisation this reproduces the input order for
    /// every pair no other edge constrains.
    pub fn add_tie_break_edges(&mut self) {
        if self.plugins.len() < 2 {
            return;
        }
        let mut tail = PluginIx(0);
        for position in 1..self.plugins.len() {
            let v = PluginIx(position as u32);
            if self.path_exists(v, tail) {
                // v is already constrained before the chain tail.
                continue;
            }
            self.add_edge(tail, v, EdgeKind::TieBreak);
            tail = v;
        }
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    /// Whether `to` is reachable from `from`. Positive answers are cached;
    /// edges are only added, never removed, so the cache stays valid.
    pub fn path_exists(&mut self, from: PluginIx, to: PluginIx) -> bool {
        if from == to {
            return true;
        }
        if self.paths_cache.contains(&(from.0, to.0)) {
            return true;
        }

        let mut found = false;
        let mut visited = vec![false; self.plugins.len()];
        let mut stack = vec![from.index()];
        visited[from.index()] = true;
        'search: while let Some(v) = stack.pop() {
            for &(next, _) in &self.out_edges[v] {
                if next == to {
                    found = true;
                    break 'search;
                }
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    stack.push(next.index());
                }
            }
        }

        if found {
            self.paths_cache.insert((from.0, to.0));
        }
        found
    }

    /// Shortest path from `from` to `to`, endpoints inclusive.
    fn find_path(&self, from: PluginIx, to: PluginIx) -> Option<Vec<PluginIx>> {
        let mut predecessor: Vec<Option<PluginIx>> = vec![None; self.plugins.len()];
        let mut queue = VecDeque::new();
        queue.push_back(from);

        'search: while let Some(v) = queue.pop_front() {
            for &(next, _) in &self.out_edges[v.index()] {
                if next != from && predecessor[next.index()].is_none() {
                    predecessor[next.index()] = Some(v);
                    if next == to {
                        break 'search;
                    }
                    queue.push_back(next);
                }
            }
        }

        predecessor[to.index()]?;
        let mut path = vec![to];
        let mut cursor = to;
        while let Some(prev) = predecessor[cursor.index()] {
            path.push(prev);
            cursor = prev;
            if cursor == from {
                break;
            }
        }
        path.reverse();
        Some(path)
    }

    /// Renders the cycle that adding `closing_kind` from the last to the
    /// first vertex of `path_from -> path_to` would create.
    fn describe_blocked_edge(
        &self,
        path_from: PluginIx,
        path_to: PluginIx,
        closing_kind: EdgeKind,
    ) -> String {
        let Some(path) = self.find_path(path_from, path_to) else {
            return String::new();
        };
        let mut cycle = Vec::with_capacity(path.len());
        for (i, &v) in path.iter().enumerate() {
            let out_edge = match path.get(i + 1) {
                Some(&next) => self
                    .edge_kind_between(v, next)
                    .unwrap_or(closing_kind),
                None => closing_kind,
            };
            cycle.push(CycleVertex {
                name: self.plugins[v.index()].record.name.clone(),
                out_edge,
            });
        }
        display_cycle(&cycle)
    }

    fn edge_kind_between(&self, from: PluginIx, to: PluginIx) -> Option<EdgeKind> {
        self.out_edges[from.index()]
            .iter()
            .find(|&&(next, _)| next == to)
            .map(|&(_, kind)| kind)
    }

    // -----------------------------------------------------------------------
    // Cycle detection
    // -----------------------------------------------------------------------

    /// Depth-first search with an explicit recursion stack. On a back edge
    /// the cycle is the stack slice from the hit vertex to the current one,
    /// extended by the closing edge, and each vertex is reported with its
    /// filename and the kind of edge leading onward.
    pub fn check_for_cycles(&self) -> Result<(), SortError> {
        const WHITE: u8 = 0;
        const GREY: u8 = 1;
        const BLACK: u8 = 2;

        let n = self.plugins.len();
        let mut color = vec![WHITE; n];

        for root in 0..n {
            if color[root] != WHITE {
                continue;
            }
            // Stack frames: (vertex, next-edge cursor, incoming edge kind).
            let mut path: Vec<(usize, usize, Option<EdgeKind>)> = vec![(root, 0, None)];
            color[root] = GREY;

            while let Some(&(v, cursor, _)) = path.last() {
                if cursor >= self.out_edges[v].len() {
                    color[v] = BLACK;
                    path.pop();
                    continue;
                }
                if let Some(frame) = path.last_mut() {
                    frame.1 += 1;
                }
                let (to, kind) = self.out_edges[v][cursor];
                let t = to.index();
                match color[t] {
                    GREY => {
                        let Some(pos) = path.iter().position(|f| f.0 == t) else {
                            continue;
                        };
                        let slice = &path[pos..];
                        let mut cycle = Vec::with_capacity(slice.len());
                        for (i, &(vertex, _, _)) in slice.iter().enumerate() {
                            let out_edge = match slice.get(i + 1) {
                                Some(&(_, _, Some(incoming))) => incoming,
                                _ => kind,
                            };
                            cycle.push(CycleVertex {
                                name: self.plugins[vertex].record.name.clone(),
                                out_edge,
                            });
                        }
                        return Err(SortError::CyclicInteraction { cycle });
                    }
                    WHITE => {
                        color[t] = GREY;
                        path.push((t, 0, Some(kind)));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Linearisation
    // -----------------------------------------------------------------------

    /// Stable topological sort: ready vertices are drawn lowest input
    /// position first, so unconstrained plugins keep their original
    /// relative order.
    pub fn topological_sort(&self) -> Result<Vec<String>, SortError> {
        let n = self.plugins.len();
        let mut in_degree = vec![0usize; n];
        for edges in &self.out_edges {
            for &(to, _) in edges {
                in_degree[to.index()] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = BinaryHeap::new();
        for (v, &degree) in in_degree.iter().enumerate() {
            if degree == 0 {
                ready.push(Reverse(v));
            }
        }

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(v)) = ready.pop() {
            order.push(v);
            for &(to, _) in &self.out_edges[v] {
                let t = to.index();
                in_degree[t] -= 1;
                if in_degree[t] == 0 {
                    ready.push(Reverse(t));
                }
            }
        }

        if order.len() != n {
            // Leftover in-degree means a cycle; the DFS names it.
            self.check_for_cycles()?;
            return Err(SortError::CyclicInteraction { cycle: Vec::new() });
        }

        Ok(order
            .into_iter()
            .map(|v| self.plugins[v].record.name.clone())
            .collect())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
