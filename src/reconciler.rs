//! The reconciliation engine (§4.3): the core of this crate.
//!
//! Diffs a pre-edit id→path map against a post-edit id→path map, classifies
//! each id as unchanged / renamed / deleted, collapses duplicate rename
//! targets, breaks cycles in the rename graph by stashing one edge per
//! cycle, and executes the resulting step sequence without ever letting one
//! failed step abort its independent neighbors.

use crate::error::ReconcileError;
use petgraph::algo::toposort;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::Directed;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub type PreMap = HashMap<u32, PathBuf>;
pub type PostMap = HashMap<u32, PathBuf>;

/// An opaque handle correlating a `Stash` step with its paired `Unstash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StashHandle(pub PathBuf);

/// One filesystem mutation, per the data model in spec §3.
#[derive(Debug, Clone)]
pub enum PlanStep {
    Rename { from: PathBuf, to: PathBuf },
    Delete { path: PathBuf },
    Stash { path: PathBuf, handle: StashHandle },
    Unstash { handle: StashHandle, to: PathBuf },
}

/// Tags a `PlanStep` with the rename-graph component it was broken out of.
/// A failure partway through a component's steps (e.g. a stash that never
/// landed) must not let the executor continue on to that component's
/// dependent steps — see `execute`. Each deletion gets its own id, since
/// deletions are independent of everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(u64);

/// The output of planning: a human-readable summary of what will happen,
/// and the concrete step sequence the executor will run.
pub struct ReconcilePlan {
    display_renames: Vec<(u32, PathBuf, PathBuf)>,
    display_deletions: Vec<PathBuf>,
    steps: Vec<(ComponentId, PlanStep)>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.display_renames.is_empty() && self.display_deletions.is_empty()
    }

    /// A human readable representation of what this plan will do, for the
    /// confirmation prompt. Deliberately hides the stash/unstash choreography
    /// used to break cycles — the user asked for a rename, not a stash.
    pub fn human_readable(&self) -> String {
        let mut lines = Vec::with_capacity(self.display_renames.len() + self.display_deletions.len());
        for path in &self.display_deletions {
            lines.push(format!("delete {}", path.to_string_lossy()));
        }
        for (_, from, to) in &self.display_renames {
            lines.push(format!("{} -> {}", from.to_string_lossy(), to.to_string_lossy()));
        }
        lines.join("\n")
    }

    pub fn steps(&self) -> &[(ComponentId, PlanStep)] {
        &self.steps
    }

    pub fn display_renames(&self) -> &[(u32, PathBuf, PathBuf)] {
        &self.display_renames
    }

    pub fn display_deletions(&self) -> &[PathBuf] {
        &self.display_deletions
    }
}

/// Step 1 (§4.3): classify each pre-edit id as unchanged, renamed, or
/// deleted. An id in `pre` but absent from `post` denotes deletion, per the
/// pre/post subset invariant.
fn classify(pre: &PreMap, post: &PostMap) -> (Vec<PathBuf>, Vec<(u32, PathBuf, PathBuf)>) {
    let mut ids: Vec<&u32> = pre.keys().collect();
    ids.sort();

    let mut deletions = Vec::new();
    let mut renames = Vec::new();
    for &id in ids {
        let original = &pre[id];
        match post.get(id) {
            None => deletions.push(original.clone()),
            Some(edited) if edited == original => {}
            Some(edited) => renames.push((id, original.clone(), edited.clone())),
        }
    }
    (deletions, renames)
}

/// Step 2 (§4.3): group rename intents by destination. The highest-id
/// intent in a group wins the clean destination; earlier intents divert to
/// `~`, `~1`, `~2`, … avoiding both disk collisions and other pending
/// targets. Do not change the diversion scheme: it is user-visible and
/// intentional (§9).
fn collapse_duplicate_targets(renames: Vec<(u32, PathBuf, PathBuf)>) -> Vec<(u32, PathBuf, PathBuf)> {
    let mut by_dest: HashMap<PathBuf, Vec<(u32, PathBuf, PathBuf)>> = HashMap::new();
    for rename in renames {
        by_dest.entry(rename.2.clone()).or_default().push(rename);
    }

    let mut reserved: HashSet<PathBuf> = by_dest.keys().cloned().collect();

    let mut out = Vec::new();
    for (_, mut group) in by_dest {
        group.sort_by_key(|(id, _, _)| *id);
        if group.len() == 1 {
            out.push(group.pop().expect("group has one element"));
            continue;
        }
        let winner = group.pop().expect("group has at least two elements");
        for (id, from, to) in group {
            let diverted = next_diversion(&to, &reserved);
            reserved.insert(diverted.clone());
            log::info!(
                "duplicate rename target {}: diverting {} to {}",
                to.to_string_lossy(),
                from.to_string_lossy(),
                diverted.to_string_lossy()
            );
            out.push((id, from, diverted));
        }
        out.push(winner);
    }
    out
}

fn next_diversion(target: &Path, reserved: &HashSet<PathBuf>) -> PathBuf {
    let base = target.to_string_lossy().into_owned();
    let bare = PathBuf::from(format!("{base}~"));
    if !bare.exists() && !reserved.contains(&bare) {
        return bare;
    }
    let mut suffix = 1u32;
    loop {
        let candidate = PathBuf::from(format!("{base}~{suffix}"));
        if !candidate.exists() && !reserved.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Step 3 (§4.3): build the rename graph and break any cycles by stashing
/// one edge's source to a temporary name, deferring the matching unstash to
/// the end of its component's step list. Direct generalization of the
/// teacher's `break_cycles_and_fix_ordering`, labeling the stash edge with
/// explicit `Stash`/`Unstash` plan steps instead of folding it into a plain
/// rename.
///
/// Every step is tagged with the id of its rename-graph component (`next_id`
/// hands out fresh ids as components are discovered) so `execute` can stop
/// at the first failure within a component without touching unrelated ones
/// (§7 StashError: "the affected cycle is skipped ... processing continues
/// with other components").
fn break_cycles(
    renames: Vec<(u32, PathBuf, PathBuf)>,
    next_id: &mut u64,
) -> Vec<(ComponentId, PlanStep)> {
    let mut graph: Graph<PathBuf, (), Directed> = Graph::new();
    let mut nodes: HashMap<PathBuf, NodeIndex> = HashMap::new();

    for (_, from, to) in &renames {
        let nf = *nodes
            .entry(from.clone())
            .or_insert_with(|| graph.add_node(from.clone()));
        let nt = *nodes
            .entry(to.clone())
            .or_insert_with(|| graph.add_node(to.clone()));
        graph.add_edge(nf, nt, ());
    }

    let mut stash_paths: HashSet<PathBuf> = HashSet::new();
    // NodeIndex of each stash node, so its component id can be looked up
    // once the graph is final.
    let mut deferred_unstashes: Vec<(NodeIndex, PlanStep)> = Vec::new();
    let mut counter: u64 = 0;
    let pid = std::process::id();

    while let Err(cycle) = toposort(&graph, None) {
        let node_idx = cycle.node_id();
        let source_path = graph[node_idx].clone();
        let stash_path = unique_stash_path(&source_path, pid, &mut counter);

        let edge = graph
            .edges(node_idx)
            .next()
            .expect("a node in a cycle has an outgoing edge");
        let edge_id = edge.id();
        let target_path = graph[edge.target()].clone();

        log::info!(
            "breaking rename cycle: stashing {} to {}, restoring to {} once the cycle drains",
            source_path.to_string_lossy(),
            stash_path.to_string_lossy(),
            target_path.to_string_lossy()
        );

        graph.remove_edge(edge_id);
        let stash_node = graph.add_node(stash_path.clone());
        graph.add_edge(node_idx, stash_node, ());
        stash_paths.insert(stash_path.clone());

        deferred_unstashes.push((
            stash_node,
            PlanStep::Unstash {
                handle: StashHandle(stash_path),
                to: target_path,
            },
        ));
    }

    let sorted =
        toposort(&graph, None).expect("graph must be acyclic once every cycle has been broken");

    // Destination-first order: the reversed topological order renames
    // leaves (nothing still depends on their destination) before their
    // sources are touched.
    let mut steps: Vec<(NodeIndex, PlanStep)> = sorted
        .into_iter()
        .filter_map(|idx| {
            let edge = graph.edges(idx).next()?;
            let from = graph[idx].clone();
            let to = graph[edge.target()].clone();
            let step = if stash_paths.contains(&to) {
                PlanStep::Stash {
                    path: from,
                    handle: StashHandle(to),
                }
            } else {
                PlanStep::Rename { from, to }
            };
            Some((idx, step))
        })
        .collect();
    steps.reverse();
    steps.extend(deferred_unstashes);

    let component_of = weak_component_ids(&graph, next_id);
    steps
        .into_iter()
        .map(|(idx, step)| (component_of[&idx], step))
        .collect()
}

/// Assigns a `ComponentId` to every node reachable from every other node in
/// the same weakly-connected subgraph (ignoring edge direction), via a
/// plain union-find. A stash node shares its component with the source node
/// it was split off from, so a whole swap/cycle — rename, stash, unstash —
/// always carries one id.
fn weak_component_ids(
    graph: &Graph<PathBuf, (), Directed>,
    next_id: &mut u64,
) -> HashMap<NodeIndex, ComponentId> {
    let mut parent: Vec<usize> = (0..graph.node_count()).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }

    for edge in graph.edge_indices() {
        let (a, b) = graph.edge_endpoints(edge).expect("edge_indices yields valid edges");
        let (ra, rb) = (find(&mut parent, a.index()), find(&mut parent, b.index()));
        if ra != rb {
            parent[ra] = rb;
        }
    }

    let mut ids: HashMap<usize, ComponentId> = HashMap::new();
    let mut out = HashMap::new();
    for idx in graph.node_indices() {
        let root = find(&mut parent, idx.index());
        let id = *ids.entry(root).or_insert_with(|| {
            let id = ComponentId(*next_id);
            *next_id += 1;
            id
        });
        out.insert(idx, id);
    }
    out
}

/// Upper bound on same-directory collisions before giving up on the
/// preferred directory and falling back to the system temp directory (§6).
const MAX_SAME_DIR_STASH_ATTEMPTS: u64 = 64;

/// Stash name per §6: `<dir>/<basename>.vidir-stash-<pid>-<counter>`,
/// incrementing the counter until the name is free. Falls back to the
/// system temp directory either when the source has no parent directory to
/// stash alongside (e.g. a bare relative name resolved at the filesystem
/// root), or when the same-directory choice keeps colliding.
fn unique_stash_path(source: &Path, pid: u32, counter: &mut u64) -> PathBuf {
    let basename = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("entry");
    let dir = match source.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => return std::env::temp_dir().join(format!("{basename}.vidir-stash-{pid}-0")),
    };
    let start = *counter;
    while *counter - start < MAX_SAME_DIR_STASH_ATTEMPTS {
        let candidate = dir.join(format!("{basename}.vidir-stash-{pid}-{counter}"));
        *counter += 1;
        if !candidate.exists() {
            return candidate;
        }
    }
    loop {
        let candidate = std::env::temp_dir().join(format!("{basename}.vidir-stash-{pid}-{counter}"));
        *counter += 1;
        if !candidate.exists() {
            return candidate;
        }
    }
}

/// Builds the full plan: deletions first (so a delete whose path is also a
/// rename target always clears the way before that rename runs, per §5's
/// ordering guarantee), then the cycle-broken rename/stash/unstash sequence.
pub fn plan(pre: &PreMap, post: &PostMap) -> ReconcilePlan {
    let (deletions, renames) = classify(pre, post);
    let collapsed = collapse_duplicate_targets(renames);

    let mut next_id = 0u64;
    let mut steps: Vec<(ComponentId, PlanStep)> = deletions
        .iter()
        .cloned()
        .map(|path| {
            let id = ComponentId(next_id);
            next_id += 1;
            (id, PlanStep::Delete { path })
        })
        .collect();
    steps.extend(break_cycles(collapsed.clone(), &mut next_id));

    ReconcilePlan {
        display_renames: collapsed,
        display_deletions: deletions,
        steps,
    }
}

/// Step 5 (§4.3): execute every step exactly once. A failing step is
/// recorded and reported; steps in unrelated components still run.
///
/// Steps share a `ComponentId` only when they came out of the same
/// rename-graph component (one cycle's stash/rename/unstash sequence, or a
/// plain rename chain). Once a step in a component fails, the remaining
/// steps in that same component are skipped rather than attempted against a
/// filesystem state the earlier failure left half-finished — e.g. a failed
/// `Stash` must not be followed by the `Rename` that depended on it vacating
/// the destination, nor by the `Unstash` of a file that was never stashed.
pub fn execute(plan: &ReconcilePlan) -> Vec<ReconcileError> {
    let mut errors = Vec::new();
    let mut failed_components: HashSet<ComponentId> = HashSet::new();
    for (component, step) in &plan.steps {
        if failed_components.contains(component) {
            log::warn!("skipping step in a component with an earlier failure: {step:?}");
            continue;
        }
        if let Err(err) = execute_step(step) {
            errors.push(err);
            failed_components.insert(*component);
        }
    }
    errors
}

fn execute_step(step: &PlanStep) -> Result<(), ReconcileError> {
    match step {
        PlanStep::Delete { path } => delete_path(path),
        PlanStep::Rename { from, to } => do_rename(from, to),
        PlanStep::Stash { path, handle } => do_stash(path, handle),
        PlanStep::Unstash { handle, to } => do_unstash(handle, to),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), ReconcileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| ReconcileError::Mkdir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}

/// §4.3 deletion semantics: a regular file uses file removal; a directory
/// uses non-recursive directory removal, so the reconciler only ever
/// deletes what the user actually saw in the listing.
fn delete_path(path: &Path) -> Result<(), ReconcileError> {
    let result = if path.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|source| ReconcileError::Delete {
        path: path.to_path_buf(),
        source,
    })
}

fn do_rename(from: &Path, to: &Path) -> Result<(), ReconcileError> {
    ensure_parent_dir(to)?;
    if to.exists() {
        return Err(ReconcileError::DestinationExists { to: to.to_path_buf() });
    }
    fs::rename(from, to).map_err(|source| ReconcileError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

fn do_stash(path: &Path, handle: &StashHandle) -> Result<(), ReconcileError> {
    ensure_parent_dir(&handle.0)?;
    fs::rename(path, &handle.0).map_err(|source| ReconcileError::Stash {
        path: path.to_path_buf(),
        stash_path: handle.0.clone(),
        source,
    })
}

fn do_unstash(handle: &StashHandle, to: &Path) -> Result<(), ReconcileError> {
    ensure_parent_dir(to)?;
    fs::rename(&handle.0, to).map_err(|source| ReconcileError::Unstash {
        stash_path: handle.0.clone(),
        to: to.to_path_buf(),
        source,
    })
}
