//! Task DAG for dependency ordering.
//!
//! Edges are derived from declared paths: a task depends on every task that
//! declares one of its inputs as output. The graph provides topological
//! order, parallel waves for planning, and dependency queries for the
//! scheduler.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::GraphError;
use super::task::{Task, TaskId};

pub struct TaskGraph {
  graph: DiGraph<TaskId, ()>,
  nodes: HashMap<TaskId, NodeIndex>,
  tasks: BTreeMap<TaskId, Task>,
}

impl TaskGraph {
  /// Build a graph from tasks.
  ///
  /// # Errors
  ///
  /// - `DuplicateTask` if two tasks share an id
  /// - `DuplicateOutput` if two tasks declare the same output path
  /// - `CycleDetected` if the declared paths form a cycle
  pub fn from_tasks(tasks: Vec<Task>) -> Result<Self, GraphError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();
    let mut producers: HashMap<PathBuf, TaskId> = HashMap::new();

    // First pass: one node per task, one producer per output
    for task in &tasks {
      if nodes.contains_key(&task.id) {
        return Err(GraphError::DuplicateTask(task.id));
      }
      if let Some(first) = producers.insert(task.output.clone(), task.id) {
        return Err(GraphError::DuplicateOutput {
          path: task.output.clone(),
          first,
          second: task.id,
        });
      }
      nodes.insert(task.id, graph.add_node(task.id));
    }

    // Second pass: edge from producer to consumer for every matched input
    for task in &tasks {
      let dependent = nodes[&task.id];
      for input in &task.inputs {
        // Inputs nobody produces are external (e.g. the interface file)
        if let Some(producer) = producers.get(input) {
          graph.update_edge(nodes[producer], dependent, ());
        }
      }
    }

    let dag = Self {
      graph,
      nodes,
      tasks: tasks.into_iter().map(|t| (t.id, t)).collect(),
    };

    dag.verify_acyclic()?;

    Ok(dag)
  }

  fn verify_acyclic(&self) -> Result<(), GraphError> {
    toposort(&self.graph, None).map_err(|_| GraphError::CycleDetected)?;
    Ok(())
  }

  pub fn task(&self, id: &TaskId) -> Option<&Task> {
    self.tasks.get(id)
  }

  /// All tasks, ordered by id.
  pub fn tasks(&self) -> impl Iterator<Item = &Task> {
    self.tasks.values()
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  /// Direct prerequisites of a task, sorted.
  pub fn dependencies(&self, id: &TaskId) -> Vec<TaskId> {
    self.neighbors(id, Direction::Incoming)
  }

  /// Tasks that directly consume a task's output, sorted.
  pub fn dependents(&self, id: &TaskId) -> Vec<TaskId> {
    self.neighbors(id, Direction::Outgoing)
  }

  fn neighbors(&self, id: &TaskId, direction: Direction) -> Vec<TaskId> {
    let Some(&idx) = self.nodes.get(id) else {
      return Vec::new();
    };
    let mut ids: Vec<TaskId> = self
      .graph
      .neighbors_directed(idx, direction)
      .map(|n| self.graph[n])
      .collect();
    ids.sort();
    ids
  }

  /// Tasks in an order where every task follows its prerequisites.
  pub fn topological(&self) -> Result<Vec<TaskId>, GraphError> {
    let sorted = toposort(&self.graph, None).map_err(|_| GraphError::CycleDetected)?;
    Ok(sorted.into_iter().map(|idx| self.graph[idx]).collect())
  }

  /// Tasks grouped into waves: every task's prerequisites are in earlier waves.
  pub fn waves(&self) -> Result<Vec<Vec<TaskId>>, GraphError> {
    // Kahn's algorithm, one level at a time
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();

    let mut ready: Vec<NodeIndex> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(i, _)| *i).collect();
    let mut waves = Vec::new();
    let mut placed = 0;

    while !ready.is_empty() {
      let mut next = Vec::new();
      for &idx in &ready {
        for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&neighbor) {
            *deg -= 1;
            if *deg == 0 {
              next.push(neighbor);
            }
          }
        }
      }
      placed += ready.len();
      let mut wave: Vec<TaskId> = ready.iter().map(|idx| self.graph[*idx]).collect();
      wave.sort();
      waves.push(wave);
      ready = next;
    }

    if placed != self.graph.node_count() {
      return Err(GraphError::CycleDetected);
    }

    Ok(waves)
  }
}
