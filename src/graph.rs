//! Dependency graph views over the task set.
//!
//! Task ids are interned to `u32` indices at build time; all traversals use
//! direct array indexing. Reverse edges (dependents) are derived from the
//! forward `depends_on` edges, never stored on tasks.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::{DagrError, Result};
use crate::models::{id_suffix, Task};

/// Interned task index (u32 for compact storage and fast hashing).
pub type TaskId = u32;

/// Maps task id strings to dense integer indices and back.
///
/// Indices are assigned in ascending numeric-suffix order so that index
/// order doubles as the deterministic tie-break order everywhere.
#[derive(Debug, Clone)]
pub struct TaskIndex {
    to_id: FxHashMap<String, TaskId>,
    names: Vec<String>,
}

impl TaskIndex {
    fn new(sorted_ids: Vec<String>) -> Self {
        let mut to_id =
            FxHashMap::with_capacity_and_hasher(sorted_ids.len(), Default::default());
        for (i, id) in sorted_ids.iter().enumerate() {
            to_id.insert(id.clone(), i as TaskId);
        }
        Self {
            to_id,
            names: sorted_ids,
        }
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<TaskId> {
        self.to_id.get(id).copied()
    }

    #[inline]
    pub fn resolve(&self, id: TaskId) -> &str {
        &self.names[id as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The dependency relation as ordered, validated views.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    pub index: TaskIndex,
    deps: Vec<Vec<TaskId>>,
    dependents: Vec<Vec<TaskId>>,
    topo: Vec<TaskId>,
}

impl TaskGraph {
    /// Build and validate the graph. Fails with `UnknownDependency` when a
    /// `depends_on` entry references a missing task and `CycleDetected`
    /// (with a witness path) when the relation is not acyclic.
    pub fn build(tasks: &FxHashMap<String, Task>) -> Result<Self> {
        let mut sorted_ids: Vec<String> = tasks.keys().cloned().collect();
        sorted_ids.sort_by_key(|id| (id_suffix(id).unwrap_or(u64::MAX), id.clone()));
        let index = TaskIndex::new(sorted_ids);

        let n = index.len();
        let mut deps: Vec<Vec<TaskId>> = vec![Vec::new(); n];
        let mut dependents: Vec<Vec<TaskId>> = vec![Vec::new(); n];

        for (task_id, task) in tasks {
            let id = index.get(task_id).expect("task id was just interned");
            for dep in &task.depends_on {
                let dep_id = index.get(dep).ok_or_else(|| DagrError::UnknownDependency {
                    task: task_id.clone(),
                    dependency: dep.clone(),
                })?;
                deps[id as usize].push(dep_id);
                dependents[dep_id as usize].push(id);
            }
        }
        for list in deps.iter_mut().chain(dependents.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }

        let topo = kahn_order(&deps, &dependents);
        if topo.len() != n {
            return Err(DagrError::CycleDetected(extract_cycle(&index, &deps, &topo)));
        }

        Ok(Self {
            index,
            deps,
            dependents,
            topo,
        })
    }

    /// Every task, dependencies before dependents; ties broken by ascending
    /// numeric id suffix.
    pub fn topological_order(&self) -> &[TaskId] {
        &self.topo
    }

    /// The reverse of `topological_order`, for the backward pass.
    pub fn reverse_topological_order(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.topo.iter().rev().copied()
    }

    pub fn dependencies_of(&self, id: TaskId) -> &[TaskId] {
        &self.deps[id as usize]
    }

    pub fn dependents_of(&self, id: TaskId) -> &[TaskId] {
        &self.dependents[id as usize]
    }

    /// All tasks reachable by following dependencies upstream.
    pub fn reachable_ancestors(&self, id: TaskId) -> FxHashSet<TaskId> {
        self.reachable(id, &self.deps)
    }

    /// All tasks reachable by following dependents downstream.
    pub fn reachable_descendants(&self, id: TaskId) -> FxHashSet<TaskId> {
        self.reachable(id, &self.dependents)
    }

    fn reachable(&self, id: TaskId, edges: &[Vec<TaskId>]) -> FxHashSet<TaskId> {
        let mut seen: FxHashSet<TaskId> = FxHashSet::default();
        let mut stack: Vec<TaskId> = edges[id as usize].to_vec();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(edges[next as usize].iter().copied());
            }
        }
        seen
    }
}

/// Kahn's algorithm with a min-heap so equal-depth tasks come out in
/// ascending index (= id suffix) order. Nodes inside a cycle are absent
/// from the returned order.
fn kahn_order(deps: &[Vec<TaskId>], dependents: &[Vec<TaskId>]) -> Vec<TaskId> {
    let n = deps.len();
    let mut in_degree: Vec<usize> = deps.iter().map(Vec::len).collect();

    let mut heap: BinaryHeap<Reverse<TaskId>> = BinaryHeap::with_capacity(n);
    for (i, &degree) in in_degree.iter().enumerate() {
        if degree == 0 {
            heap.push(Reverse(i as TaskId));
        }
    }

    let mut order: Vec<TaskId> = Vec::with_capacity(n);
    while let Some(Reverse(id)) = heap.pop() {
        order.push(id);
        for &dependent in &dependents[id as usize] {
            let degree = &mut in_degree[dependent as usize];
            *degree -= 1;
            if *degree == 0 {
                heap.push(Reverse(dependent));
            }
        }
    }
    order
}

/// Walk dependency edges among the nodes Kahn could not order until a node
/// repeats, producing a witness path like `[a, b, c, a]`.
fn extract_cycle(index: &TaskIndex, deps: &[Vec<TaskId>], topo: &[TaskId]) -> Vec<String> {
    let ordered: FxHashSet<TaskId> = topo.iter().copied().collect();
    let start = (0..deps.len() as TaskId)
        .find(|id| !ordered.contains(id))
        .unwrap_or(0);

    let mut path: Vec<TaskId> = Vec::new();
    let mut seen_at: FxHashMap<TaskId, usize> = FxHashMap::default();
    let mut current = start;
    loop {
        if let Some(&pos) = seen_at.get(&current) {
            let mut cycle: Vec<String> = path[pos..]
                .iter()
                .map(|&id| index.resolve(id).to_string())
                .collect();
            cycle.push(index.resolve(current).to_string());
            return cycle;
        }
        seen_at.insert(current, path.len());
        path.push(current);
        // Stay inside the unordered (cyclic) region
        current = match deps[current as usize]
            .iter()
            .copied()
            .find(|dep| !ordered.contains(dep))
        {
            Some(dep) => dep,
            None => break,
        };
    }
    path.iter().map(|&id| index.resolve(id).to_string()).collect()
}
