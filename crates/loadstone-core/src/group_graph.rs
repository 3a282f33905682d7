//! The group graph: group "load after" declarations as a directed graph,
//! with reachability queries used to derive plugin ordering.
//!
//! An edge runs from each of a group's after-groups to the group itself,
//! so an edge `X -> Y` means "X's plugins load before Y's". Every edge
//! records whether it originated in the userlist. Cycles made purely of
//! masterlist edges are tolerated (a known data-quality hazard accepted
//! for expressive modelling); any cycle touching a user edge is an error.

use crate::error::{CycleVertex, SortError};
use crate::id::GroupIx;
use crate::metadata::{Group, merge_groups};
use crate::plugin_graph::EdgeKind;
use std::collections::{HashMap, VecDeque};

/// Which document an after-group edge originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEdgeSource {
    Masterlist,
    User,
}

impl GroupEdgeSource {
    pub fn is_user(self) -> bool {
        matches!(self, GroupEdgeSource::User)
    }

    /// The edge kind this source maps to in cycle diagnostics.
    fn edge_kind(self) -> EdgeKind {
        match self {
            GroupEdgeSource::Masterlist => EdgeKind::MasterlistLoadAfter,
            GroupEdgeSource::User => EdgeKind::UserLoadAfter,
        }
    }
}

/// One vertex on a group path: the group's name and the source of the edge
/// leading to the next vertex (`None` on the final vertex).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPathNode {
    pub group_name: String,
    pub out_edge: Option<GroupEdgeSource>,
}

/// Directed graph over group names.
#[derive(Debug)]
pub struct GroupGraph {
    names: Vec<String>,
    index: HashMap<String, GroupIx>,
    adjacency: Vec<Vec<(GroupIx, GroupEdgeSource)>>,
}

impl GroupGraph {
    /// Builds the graph from the two documents' group lists. Vertices are
    /// the merged group set (`default` always present); masterlist edges
    /// are added before user edges, and a user edge is dropped when the
    /// same ordered pair already has one. Fails with `UndefinedGroup` when
    /// an after-group names no known group, and with `CyclicInteraction`
    /// when a cycle includes a user edge.
    pub fn build(masterlist_groups: &[Group], user_groups: &[Group]) -> Result<Self, SortError> {
        let merged = merge_groups(masterlist_groups, user_groups);

        let mut names = Vec::with_capacity(merged.len());
        let mut index = HashMap::with_capacity(merged.len());
        for group in &merged {
            if !index.contains_key(&group.name) {
                index.insert(group.name.clone(), GroupIx(names.len() as u32));
                names.push(group.name.clone());
            }
        }

        let mut graph = Self {
            adjacency: vec![Vec::new(); names.len()],
            names,
            index,
        };

        for group in masterlist_groups {
            graph.add_after_edges(group, GroupEdgeSource::Masterlist)?;
        }
        for group in user_groups {
            graph.add_after_edges(group, GroupEdgeSource::User)?;
        }

        graph.check_user_cycles()?;
        Ok(graph)
    }

    fn add_after_edges(&mut self, group: &Group, source: GroupEdgeSource) -> Result<(), SortError> {
        let Some(&to) = self.index.get(&group.name) else {
            return Err(SortError::UndefinedGroup(group.name.clone()));
        };
        for after in &group.after {
            let Some(&from) = self.index.get(after) else {
                return Err(SortError::UndefinedGroup(after.clone()));
            };
            let exists = self.adjacency[from.index()]
                .iter()
                .any(|&(next, _)| next == to);
            if !exists {
                self.adjacency[from.index()].push((to, source));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn group_ix(&self, name: &str) -> Option<GroupIx> {
        self.index.get(name).copied()
    }

    pub fn name(&self, ix: GroupIx) -> &str {
        &self.names[ix.index()]
    }

    /// Breadth-first reachability from one group. Strict: the start group
    /// is only reported as reachable when a cycle leads back to it.
    pub fn reachability(&self, from: GroupIx) -> Reachability {
        let mut reached = vec![false; self.names.len()];
        let mut predecessor = vec![None; self.names.len()];
        let mut queue = VecDeque::new();
        queue.push_back(from);

        while let Some(v) = queue.pop_front() {
            for &(next, _) in &self.adjacency[v.index()] {
                if !reached[next.index()] {
                    reached[next.index()] = true;
                    predecessor[next.index()] = Some(v);
                    queue.push_back(next);
                }
            }
        }

        Reachability {
            from,
            reached,
            predecessor,
        }
    }

    /// The shortest path between two groups as name/edge-source entries,
    /// empty when no path exists. Unknown names fail with
    /// `UndefinedGroup`. Used for diagnostic output only.
    pub fn shortest_path(&self, from: &str, to: &str) -> Result<Vec<GroupPathNode>, SortError> {
        let from_ix = self
            .group_ix(from)
            .ok_or_else(|| SortError::UndefinedGroup(from.to_string()))?;
        let to_ix = self
            .group_ix(to)
            .ok_or_else(|| SortError::UndefinedGroup(to.to_string()))?;

        if from_ix == to_ix {
            return Ok(vec![GroupPathNode {
                group_name: self.name(to_ix).to_string(),
                out_edge: None,
            }]);
        }

        // Predecessor BFS, remembering the edge source that discovered
        // each vertex.
        let mut discovered: Vec<Option<(GroupIx, GroupEdgeSource)>> =
            vec![None; self.names.len()];
        let mut queue = VecDeque::new();
        queue.push_back(from_ix);

        'search: while let Some(v) = queue.pop_front() {
            for &(next, source) in &self.adjacency[v.index()] {
                if next != from_ix && discovered[next.index()].is_none() {
                    discovered[next.index()] = Some((v, source));
                    if next == to_ix {
                        break 'search;
                    }
                    queue.push_back(next);
                }
            }
        }

        if discovered[to_ix.index()].is_none() {
            return Ok(Vec::new());
        }

        // Walk the predecessor chain backwards.
        let mut path = vec![GroupPathNode {
            group_name: self.name(to_ix).to_string(),
            out_edge: None,
        }];
        let mut cursor = to_ix;
        while let Some((prev, source)) = discovered[cursor.index()] {
            path.push(GroupPathNode {
                group_name: self.name(prev).to_string(),
                out_edge: Some(source),
            });
            cursor = prev;
            if cursor == from_ix {
                break;
            }
        }
        path.reverse();
        Ok(path)
    }

    // -----------------------------------------------------------------------
    // Cycle policy
    // -----------------------------------------------------------------------

    /// Depth-first search for cycles. A cycle is reconstructed from the
    /// recursion stack and rejected only when at least one of its edges is
    /// user-defined.
    fn check_user_cycles(&self) -> Result<(), SortError> {
        const WHITE: u8 = 0;
        const GREY: u8 = 1;
        const BLACK: u8 = 2;

        let n = self.names.len();
        let mut color = vec![WHITE; n];

        for root in 0..n {
            if color[root] != WHITE {
                continue;
            }
            // Stack frames: (vertex, next-edge cursor, incoming edge source).
            let mut path: Vec<(usize, usize, Option<GroupEdgeSource>)> = vec![(root, 0, None)];
            color[root] = GREY;

            while let Some(&(v, cursor, _)) = path.last() {
                if cursor >= self.adjacency[v].len() {
                    color[v] = BLACK;
                    path.pop();
                    continue;
                }
                if let Some(frame) = path.last_mut() {
                    frame.1 += 1;
                }
                let (to, source) = self.adjacency[v][cursor];
                let t = to.index();
                match color[t] {
                    GREY => {
                        let Some(pos) = path.iter().position(|f| f.0 == t) else {
                            continue;
                        };
                        let cycle = self.cycle_from_path(&path[pos..], source);
                        let has_user_edge = cycle
                            .iter()
                            .any(|vertex| vertex.out_edge == EdgeKind::UserLoadAfter);
                        if has_user_edge {
                            return Err(SortError::CyclicInteraction { cycle });
                        }
                        // Masterlist-only cycles are tolerated.
                    }
                    WHITE => {
                        color[t] = GREY;
                        path.push((t, 0, Some(source)));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Turns a recursion-stack slice plus the closing edge into cycle
    /// diagnostics: each vertex is paired with the edge leading to the next.
    fn cycle_from_path(
        &self,
        slice: &[(usize, usize, Option<GroupEdgeSource>)],
        closing: GroupEdgeSource,
    ) -> Vec<CycleVertex> {
        let mut cycle = Vec::with_capacity(slice.len());
        for (i, &(vertex, _, _)) in slice.iter().enumerate() {
            let out = match slice.get(i + 1) {
                Some(&(_, _, Some(incoming))) => incoming,
                _ => closing,
            };
            cycle.push(CycleVertex {
                name: self.names[vertex].clone(),
                out_edge: out.edge_kind(),
            });
        }
        cycle
    }
}

/// Result of a breadth-first sweep from one group.
#[derive(Debug)]
pub struct Reachability {
    from: GroupIx,
    reached: Vec<bool>,
    predecessor: Vec<Option<GroupIx>>,
}

impl Reachability {
    /// The group the sweep started from.
    pub fn start(&self) -> GroupIx {
        self.from
    }

    /// Whether `to` is reachable from the start group along at least one
    /// edge.
    pub fn reaches(&self, to: GroupIx) -> bool {
        self.reached[to.index()]
    }

    /// A representative path from the start group to `to`, inclusive of
    /// both endpoints. `None` when unreachable.
    pub fn path_to(&self, to: GroupIx) -> Option<Vec<GroupIx>> {
        if !self.reaches(to) {
            return None;
        }
        let mut path = vec![to];
        let mut cursor = to;
        while cursor != self.from {
            cursor = self.predecessor[cursor.index()]?;
            path.push(cursor);
            if cursor == self.from {
                break;
            }
        }
        path.reverse();
        Some(path)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn build(masterlist: &[Group], user: &[Group]) -> GroupGraph {
        GroupGraph::build(masterlist, user).unwrap()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------
    #[test]
    fn default_group_always_exists() {
        let graph = build(&[], &[]);
        assert!(graph.group_ix(Group::DEFAULT_NAME).is_some());
    }

    #[test]
    fn undefined_after_group_fails() {
        let result = GroupGraph::build(&[Group::with_after("late", &["missing"])], &[]);
        assert!(matches!(result, Err(SortError::UndefinedGroup(name)) if name == "missing"));
    }

    #[test]
    fn user_groups_may_reference_masterlist_groups() {
        let graph = build(
            &[Group::with_after("late", &["default"])],
            &[Group::with_after("user late", &["late"])],
        );
        assert!(graph.group_ix("user late").is_some());
    }

    // -----------------------------------------------------------------------
    // Reachability
    // -----------------------------------------------------------------------
    #[test]
    fn reachability_follows_after_edges_transitively() {
        // default -> middle -> late
        let graph = build(
            &[
                Group::with_after("middle", &["default"]),
                Group::with_after("late", &["middle"]),
            ],
            &[],
        );
        let default = graph.group_ix("default").unwrap();
        let middle = graph.group_ix("middle").unwrap();
        let late = graph.group_ix("late").unwrap();

        let reach = graph.reachability(default);
        assert!(reach.reaches(middle));
        assert!(reach.reaches(late));
        assert!(!reach.reaches(default));

        let reach = graph.reachability(late);
        assert!(!reach.reaches(default));
        assert!(!reach.reaches(middle));
    }

    #[test]
    fn representative_path_runs_from_start_to_target() {
        let graph = build(
            &[
                Group::with_after("middle", &["default"]),
                Group::with_after("late", &["middle"]),
            ],
            &[],
        );
        let default = graph.group_ix("default").unwrap();
        let late = graph.group_ix("late").unwrap();

        let reach = graph.reachability(default);
        let path = reach.path_to(late).unwrap();
        let names: Vec<&str> = path.iter().map(|&ix| graph.name(ix)).collect();
        assert_eq!(names, vec!["default", "middle", "late"]);
    }

    // -----------------------------------------------------------------------
    // Shortest path
    // -----------------------------------------------------------------------
    #[test]
    fn shortest_path_reports_edge_sources() {
        let graph = build(
            &[Group::with_after("middle", &["default"])],
            &[Group::with_after("late", &["middle"])],
        );

        let path = graph.shortest_path("default", "late").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0].group_name, "default");
        assert_eq!(path[0].out_edge, Some(GroupEdgeSource::Masterlist));
        assert_eq!(path[1].group_name, "middle");
        assert_eq!(path[1].out_edge, Some(GroupEdgeSource::User));
        assert_eq!(path[2].group_name, "late");
        assert_eq!(path[2].out_edge, None);
    }

    #[test]
    fn shortest_path_is_empty_when_unconnected() {
        let graph = build(&[Group::new("island")], &[]);
        let path = graph.shortest_path("island", "default").unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn shortest_path_rejects_unknown_groups() {
        let graph = build(&[], &[]);
        let result = graph.shortest_path("default", "missing");
        assert!(matches!(result, Err(SortError::UndefinedGroup(_))));
    }

    // -----------------------------------------------------------------------
    // Cycle policy
    // -----------------------------------------------------------------------
    #[test]
    fn masterlist_only_cycles_are_tolerated() {
        // a -> b -> a, both masterlist edges.
        let result = GroupGraph::build(
            &[
                Group::with_after("a", &["b"]),
                Group::with_after("b", &["a"]),
            ],
            &[],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn cycles_with_a_user_edge_fail() {
        // Masterlist: a -> b -> c; user closes c -> a.
        let result = GroupGraph::build(
            &[
                Group::with_after("b", &["a"]),
                Group::with_after("c", &["b"]),
                Group::new("a"),
            ],
            &[Group::with_after("a", &["c"])],
        );
        let Err(SortError::CyclicInteraction { cycle }) = result else {
            panic!("expected a cyclic interaction error");
        };
        assert_eq!(cycle.len(), 3);
        assert!(
            cycle
                .iter()
                .any(|v| v.out_edge == EdgeKind::UserLoadAfter)
        );
    }

    #[test]
    fn reachability_terminates_on_tolerated_cycles() {
        let graph = build(
            &[
                Group::with_after("a", &["b"]),
                Group::with_after("b", &["a"]),
            ],
            &[],
        );
        let a = graph.group_ix("a").unwrap();
        let b = graph.group_ix("b").unwrap();
        let reach = graph.reachability(a);
        assert!(reach.reaches(b));
        // The cycle leads back to the start.
        assert!(reach.reaches(a));
    }
}
