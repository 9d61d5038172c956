//! Explaining why a [`crate::Request`] was unsolvable: [`conflict_map`], [`ProblemsGraph`], and
//! its compressed rendering [`CompressedProblemsGraph`].
//!
//! Grounded in libmamba's `solver::problems_graph` module: a small `DiGraph` over
//! `{Root, Package, UnresolvedDependency, Constraint}` nodes, edges labeled with the `MatchSpec`
//! that induced them, plus a symmetric relation of node pairs that cannot coexist.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::Direction;
use rattler_conda_types::{MatchSpec, RepoDataRecord};

/// A symmetric relation over `T`: if `x` conflicts with `y`, `y` conflicts with `x`. `add(x, x)` is
/// allowed (a package can conflict with itself, e.g. "forbid multiple instances").
#[derive(Debug, Clone, Default)]
pub struct ConflictMap<T> {
    edges: HashMap<T, HashSet<T>>,
}

impl<T: Clone + Eq + Ord + std::hash::Hash> ConflictMap<T> {
    /// An empty relation.
    pub fn new() -> Self {
        Self {
            edges: HashMap::new(),
        }
    }

    /// The number of distinct conflicting pairs (each unordered pair, including `(x, x)`, counted
    /// once).
    pub fn size(&self) -> usize {
        let mut pairs = HashSet::new();
        for (x, ys) in &self.edges {
            for y in ys {
                let pair = if x <= y {
                    (x.clone(), y.clone())
                } else {
                    (y.clone(), x.clone())
                };
                pairs.insert(pair);
            }
        }
        pairs.len()
    }

    /// Records that `x` and `y` conflict. Returns `true` if this is a new fact.
    pub fn add(&mut self, x: T, y: T) -> bool {
        let inserted_xy = self.edges.entry(x.clone()).or_default().insert(y.clone());
        self.edges.entry(y).or_default().insert(x);
        inserted_xy
    }

    /// Whether `x` conflicts with anything.
    pub fn has_conflict(&self, x: &T) -> bool {
        self.edges.get(x).is_some_and(|ys| !ys.is_empty())
    }

    /// Whether `x` and `y` conflict with each other.
    pub fn in_conflict(&self, x: &T, y: &T) -> bool {
        self.edges.get(x).is_some_and(|ys| ys.contains(y))
    }

    /// Removes the conflict between `x` and `y`. Returns `true` if it existed.
    pub fn remove(&mut self, x: &T, y: &T) -> bool {
        let removed = self.edges.get_mut(x).is_some_and(|ys| ys.remove(y));
        if x != y {
            self.edges.get_mut(y).map(|xs| xs.remove(x));
        }
        removed
    }

    /// Removes every conflict involving `x`. Returns `true` if any existed.
    pub fn remove_all(&mut self, x: &T) -> bool {
        let Some(ys) = self.edges.remove(x) else {
            return false;
        };
        for y in &ys {
            if y != x {
                self.edges.get_mut(y).map(|xs| xs.remove(x));
            }
        }
        true
    }

    /// Iterates over every node that has at least one conflict.
    pub fn iter(&self) -> impl Iterator<Item = (&T, &HashSet<T>)> {
        self.edges.iter().filter(|(_, ys)| !ys.is_empty())
    }
}

/// A node in a [`ProblemsGraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemNode {
    /// The synthetic root every top-level job hangs off of.
    Root,
    /// A candidate package considered while resolving the request.
    Package(RepoDataRecord),
    /// A dependency that has no candidate satisfying it anywhere in the database.
    UnresolvedDependency(MatchSpec),
    /// A `constrains`-only entry that rules out otherwise-available candidates.
    Constraint(MatchSpec),
}

/// Why two [`ProblemNode`]s cannot coexist in a solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictCause {
    /// Both are installed/locked records of the same package name.
    Locked,
    /// Only one instance of this package name may be selected.
    ForbidMultipleInstances,
    /// A `constrains` entry on one rules out the other.
    Constrains(MatchSpec),
}

/// The un-merged conflict graph built directly from a failed solve attempt.
#[derive(Debug)]
pub struct ProblemsGraph {
    graph: DiGraph<ProblemNode, MatchSpec>,
    root: NodeIndex,
    conflicts: ConflictMap<NodeIndex>,
}

impl ProblemsGraph {
    /// Starts a new graph with just the root node.
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(ProblemNode::Root);
        Self {
            graph,
            root,
            conflicts: ConflictMap::new(),
        }
    }

    /// The root node's index.
    pub fn root_node(&self) -> NodeIndex {
        self.root
    }

    /// The underlying graph.
    pub fn graph(&self) -> &DiGraph<ProblemNode, MatchSpec> {
        &self.graph
    }

    /// The node-pair conflict relation.
    pub fn conflicts(&self) -> &ConflictMap<NodeIndex> {
        &self.conflicts
    }

    /// Adds a node (idempotent per caller-tracked index) and returns its index.
    pub fn add_node(&mut self, node: ProblemNode) -> NodeIndex {
        self.graph.add_node(node)
    }

    /// Adds a `from --spec--> to` edge, meaning `from` requires something matching `spec`, which
    /// is satisfied by (or unresolved/constrained as) `to`.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, spec: MatchSpec) {
        self.graph.add_edge(from, to, spec);
    }

    /// Records that `a` and `b` cannot coexist in any solution, for the given reason.
    ///
    /// The `cause` is currently only used for diagnostics at the call site (§4.7 does not require
    /// it to be retrievable from the graph afterward); the conflict itself is what the compressed
    /// rendering consumes.
    pub fn add_conflict(&mut self, a: NodeIndex, b: NodeIndex, _cause: ConflictCause) {
        self.conflicts.add(a, b);
    }

    /// Removes every node unreachable from the root, keeping the conflict-graph invariant that
    /// every surviving node is reachable from root (§4.7b).
    pub fn prune_unreachable(&mut self) {
        let mut reachable = HashSet::new();
        let mut bfs = Bfs::new(&self.graph, self.root);
        while let Some(n) = bfs.next(&self.graph) {
            reachable.insert(n);
        }
        self.graph.retain_nodes(|_, n| reachable.contains(&n));
    }
}

impl Default for ProblemsGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// A node in a [`CompressedProblemsGraph`]: like [`ProblemNode`] but siblings sharing a name are
/// merged into a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressedNode {
    /// See [`ProblemNode::Root`].
    Root,
    /// Every [`RepoDataRecord`] of a single package name that occupies the same graph position.
    PackageList(Vec<RepoDataRecord>),
    /// Every [`MatchSpec`] of a single package name that has no candidate, at the same position.
    UnresolvedDependencyList(Vec<MatchSpec>),
    /// Every constraining [`MatchSpec`] of a single package name at the same position.
    ConstraintList(Vec<MatchSpec>),
}

impl CompressedNode {
    /// The shared package name this node represents, or `None` for [`CompressedNode::Root`].
    pub fn name(&self) -> Option<&str> {
        match self {
            CompressedNode::Root => None,
            CompressedNode::PackageList(records) => {
                records.first().map(|r| r.package_record.name.as_normalized())
            }
            CompressedNode::UnresolvedDependencyList(specs)
            | CompressedNode::ConstraintList(specs) => specs
                .first()
                .and_then(|s| s.name.as_exact())
                .map(rattler_conda_types::PackageName::as_normalized),
        }
    }
}

/// The compressed rendering of a [`ProblemsGraph`]: sibling nodes sharing both a parent and a
/// name are merged into a single list node, and unreachable nodes are pruned.
///
/// The compression guarantees (a) exactly one root, (b) every conflict endpoint survives, (c)
/// every surviving node is reachable from the root — the same three invariants §4.7 requires.
///
/// This is a simplified merge relative to the grounding source's isomorphic-subtree compression:
/// nodes are merged only when they share both a parent node and a package name, not when they
/// additionally share an entire matching subtree below them. This keeps the implementation within
/// scope for a reference backend while still collapsing the common case (many versions of the
/// same package failing for the same reason).
#[derive(Debug)]
pub struct CompressedProblemsGraph {
    graph: DiGraph<CompressedNode, MatchSpec>,
    root: NodeIndex,
    conflicts: ConflictMap<NodeIndex>,
}

impl CompressedProblemsGraph {
    /// Compresses a [`ProblemsGraph`], merging sibling nodes of the same kind and name.
    pub fn from_problems_graph(problems: &ProblemsGraph) -> Self {
        let source = problems.graph();
        let mut compressed = DiGraph::<CompressedNode, MatchSpec>::new();
        let root = compressed.add_node(CompressedNode::Root);

        // Group every non-root source node by (parent, name, kind).
        let mut groups: HashMap<(NodeIndex, String, u8), NodeIndex> = HashMap::new();
        let mut source_to_compressed: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        source_to_compressed.insert(problems.root_node(), root);

        // Visit in breadth-first order so a node's parent is always assigned before the node
        // itself, which a pure name/kind grouping key requires.
        let mut bfs = Bfs::new(source, problems.root_node());
        while let Some(node_idx) = bfs.next(source) {
            if node_idx == problems.root_node() {
                continue;
            }
            let node = &source[node_idx];
            let (name, kind): (String, u8) = match node {
                ProblemNode::Root => continue,
                ProblemNode::Package(record) => {
                    (record.package_record.name.as_normalized().to_string(), 0)
                }
                ProblemNode::UnresolvedDependency(spec) => (spec.conda_build_form(), 1),
                ProblemNode::Constraint(spec) => (spec.conda_build_form(), 2),
            };

            // Parent is whichever already-visited incoming edge source maps to a compressed node;
            // for a DAG built by BFS from root this is well-defined for every reachable node.
            let Some(parent_edge) = source.edges_directed(node_idx, Direction::Incoming).next()
            else {
                continue;
            };
            let Some(&parent_compressed) = source_to_compressed.get(&parent_edge.source()) else {
                continue;
            };

            let key = (parent_compressed, name, kind);
            let compressed_idx = *groups.entry(key).or_insert_with(|| {
                let placeholder = match kind {
                    0 => CompressedNode::PackageList(Vec::new()),
                    1 => CompressedNode::UnresolvedDependencyList(Vec::new()),
                    _ => CompressedNode::ConstraintList(Vec::new()),
                };
                let idx = compressed.add_node(placeholder);
                compressed.add_edge(parent_compressed, idx, parent_edge.weight().clone());
                idx
            });

            match (&mut compressed[compressed_idx], node) {
                (CompressedNode::PackageList(records), ProblemNode::Package(record)) => {
                    records.push(record.clone());
                }
                (
                    CompressedNode::UnresolvedDependencyList(specs),
                    ProblemNode::UnresolvedDependency(spec),
                ) => {
                    specs.push(spec.clone());
                }
                (CompressedNode::ConstraintList(specs), ProblemNode::Constraint(spec)) => {
                    specs.push(spec.clone());
                }
                _ => unreachable!("kind key determines variant"),
            }

            source_to_compressed.insert(node_idx, compressed_idx);
        }

        let mut conflicts = ConflictMap::new();
        for (a, bs) in problems.conflicts().iter() {
            for b in bs {
                if let (Some(&ca), Some(&cb)) =
                    (source_to_compressed.get(a), source_to_compressed.get(b))
                {
                    conflicts.add(ca, cb);
                }
            }
        }

        Self {
            graph: compressed,
            root,
            conflicts,
        }
    }

    /// The root node's index.
    pub fn root_node(&self) -> NodeIndex {
        self.root
    }

    /// The underlying compressed graph.
    pub fn graph(&self) -> &DiGraph<CompressedNode, MatchSpec> {
        &self.graph
    }

    /// The node-pair conflict relation, in terms of compressed node indices.
    pub fn conflicts(&self) -> &ConflictMap<NodeIndex> {
        &self.conflicts
    }

    /// Renders the graph to a human message via a depth-first walk: "requested X which requires
    /// Y, but Y is not available in versions matching Z".
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        let mut visited = HashSet::new();
        self.render_from(self.root, &mut lines, &mut visited);
        lines.join("\n")
    }

    fn render_from(&self, node: NodeIndex, lines: &mut Vec<String>, visited: &mut HashSet<NodeIndex>) {
        if !visited.insert(node) {
            return;
        }
        for edge in self.graph.edges_directed(node, Direction::Outgoing) {
            let target = &self.graph[edge.target()];
            let spec = edge.weight();
            let line = match target {
                CompressedNode::Root => continue,
                CompressedNode::PackageList(records) => {
                    let versions = records
                        .iter()
                        .map(|r| r.package_record.version.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("requires {spec}, available in versions {versions}")
                }
                CompressedNode::UnresolvedDependencyList(_) => {
                    format!("requires {spec}, but it is not available in any channel")
                }
                CompressedNode::ConstraintList(_) => {
                    format!("requires {spec}, but no candidate satisfies this constraint")
                }
            };
            lines.push(line);
            self.render_from(edge.target(), lines, visited);
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use rattler_conda_types::MatchSpec;

    use super::{CompressedProblemsGraph, ConflictMap, ProblemNode, ProblemsGraph};

    #[test]
    fn renders_an_unresolved_dependency_off_the_root() {
        let mut graph = ProblemsGraph::new();
        let root = graph.root_node();
        let spec = MatchSpec::from_str("missing").unwrap();
        let unresolved = graph.add_node(ProblemNode::UnresolvedDependency(spec.clone()));
        graph.add_edge(root, unresolved, spec);

        let compressed = CompressedProblemsGraph::from_problems_graph(&graph);
        insta::assert_snapshot!(compressed.render(), @"requires missing, but it is not available in any channel");
    }

    #[test]
    fn conflict_map_is_symmetric() {
        let mut c: ConflictMap<usize> = ConflictMap::new();
        assert_eq!(c.size(), 0);
        assert!(!c.has_conflict(&0));
        assert!(!c.in_conflict(&0, &1));

        assert!(c.add(0, 1));
        assert!(c.add(1, 2));
        assert!(!c.add(1, 2));

        assert!(c.has_conflict(&0));
        assert!(c.in_conflict(&0, &1));
        assert!(c.in_conflict(&1, &2));
        assert!(c.has_conflict(&2));
        assert!(!c.in_conflict(&0, &2));

        assert!(c.add(5, 5));
        assert!(c.has_conflict(&5));
        assert!(c.in_conflict(&5, &5));
    }

    #[test]
    fn conflict_map_remove() {
        let mut c = ConflictMap::new();
        c.add(1, 1);
        c.add(1, 2);
        c.add(1, 3);
        c.add(2, 4);
        assert_eq!(c.size(), 4);

        assert!(c.in_conflict(&2, &4));
        assert!(c.in_conflict(&4, &2));
        assert!(c.remove(&2, &4));
        assert!(!c.in_conflict(&4, &2));
        assert!(!c.in_conflict(&2, &4));
        assert!(c.has_conflict(&2));
        assert!(!c.has_conflict(&4));

        assert!(!c.remove(&2, &4));

        assert!(c.remove_all(&1));
        assert!(!c.has_conflict(&1));
        assert!(!c.in_conflict(&1, &2));
        assert!(!c.in_conflict(&3, &1));
    }
}
