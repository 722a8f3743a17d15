//! Expression registry: records, node graphs and the outstanding-task index.
//!
//! The registry is plain data; the orchestrator guards it with one lock so
//! every read-modify-write (eligibility check + task creation, or result
//! recording + root detection) is serialized.

use std::collections::HashMap;

use crate::config::OperationTimes;
use crate::core::dag::{ExpressionDag, NodeId};
use crate::core::task::{Task, TaskId, TaskOutcome, TaskResult};
use crate::error::{Error, FailureKind, Result};

use super::expression::{Expression, ExpressionId, ExpressionStatus};

struct ExpressionEntry {
    record: Expression,
    /// Set once decomposition succeeds.
    dag: Option<ExpressionDag>,
    tasks_issued: usize,
}

/// What a single ingested result changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingestion {
    pub expression_id: ExpressionId,
    /// The expression's status after the result was applied.
    pub status: ExpressionStatus,
    /// Newly eligible tasks, to be enqueued in this order.
    pub tasks: Vec<Task>,
}

pub struct ExpressionRegistry {
    entries: HashMap<ExpressionId, ExpressionEntry>,
    /// Outstanding task -> the node waiting on it.
    tasks: HashMap<TaskId, (ExpressionId, NodeId)>,
    timings: OperationTimes,
}

impl ExpressionRegistry {
    pub fn new(timings: OperationTimes) -> Self {
        Self {
            entries: HashMap::new(),
            tasks: HashMap::new(),
            timings,
        }
    }

    /// Record a new `pending` expression.
    pub fn insert(&mut self, text: &str) -> ExpressionId {
        let record = Expression::new(text);
        let id = record.id;
        self.entries.insert(
            id,
            ExpressionEntry {
                record,
                dag: None,
                tasks_issued: 0,
            },
        );
        id
    }

    pub fn get(&self, id: &ExpressionId) -> Option<&Expression> {
        self.entries.get(id).map(|entry| &entry.record)
    }

    /// All expressions, oldest first.
    pub fn list(&self) -> Vec<Expression> {
        let mut list: Vec<Expression> = self
            .entries
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        list.sort_by_key(|expr| expr.created_at);
        list
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tasks ever issued for an expression.
    pub fn tasks_issued(&self, id: &ExpressionId) -> Option<usize> {
        self.entries.get(id).map(|entry| entry.tasks_issued)
    }

    pub fn is_outstanding(&self, task_id: &TaskId) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn outstanding_count(&self) -> usize {
        self.tasks.len()
    }

    fn entry_mut(&mut self, id: &ExpressionId) -> Result<&mut ExpressionEntry> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| Error::ExpressionNotFound(id.to_string()))
    }

    /// Move an expression to `running` as decomposition begins.
    pub fn start(&mut self, id: &ExpressionId) -> Result<()> {
        self.entry_mut(id)?.record.start()
    }

    /// Install a decomposed graph and issue tasks for its leaves.
    ///
    /// A bare literal completes the expression immediately.
    pub fn attach(&mut self, id: &ExpressionId, dag: ExpressionDag) -> Result<Vec<Task>> {
        let timings = self.timings;
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::ExpressionNotFound(id.to_string()))?;

        if let Some(value) = dag.root_value() {
            entry.record.complete(value)?;
            return Ok(Vec::new());
        }

        let ready = dag.ready_nodes();
        entry.dag = Some(dag);
        issue(entry, &mut self.tasks, &timings, ready)
    }

    /// Mark an expression failed and drop its outstanding tasks.
    pub fn fail(&mut self, id: &ExpressionId, kind: FailureKind) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::ExpressionNotFound(id.to_string()))?;
        fail_entry(entry, &mut self.tasks, kind)
    }

    /// Apply a worker's result to the node waiting on it.
    ///
    /// # Errors
    /// - `MalformedResult` if the result carries neither or both of a value
    ///   and an error.
    /// - `UnknownTask` if the task was never issued or was already consumed
    ///   (duplicate delivery, or its expression already failed). Such
    ///   results change nothing.
    pub fn ingest(&mut self, result: &TaskResult) -> Result<Ingestion> {
        let outcome = result.outcome()?;
        let (expression_id, node_id) = self
            .tasks
            .remove(&result.task_id)
            .ok_or(Error::UnknownTask(result.task_id))?;

        let timings = self.timings;
        let entry = self
            .entries
            .get_mut(&expression_id)
            .ok_or_else(|| Error::ExpressionNotFound(expression_id.to_string()))?;

        let tasks = match outcome {
            TaskOutcome::Fault(fault) => {
                fail_entry(entry, &mut self.tasks, fault.into())?;
                Vec::new()
            }
            TaskOutcome::Value(value) => {
                let dag = entry.dag.as_mut().ok_or_else(|| {
                    Error::Graph(format!("expression {} has no graph", expression_id))
                })?;
                let ready = dag.resolve(node_id, value)?;
                match dag.root_value() {
                    Some(root) => {
                        entry.record.complete(root)?;
                        Vec::new()
                    }
                    None => issue(entry, &mut self.tasks, &timings, ready)?,
                }
            }
        };

        Ok(Ingestion {
            expression_id,
            status: entry.record.status,
            tasks,
        })
    }
}

/// Turn eligible nodes into tasks and index them.
fn issue(
    entry: &mut ExpressionEntry,
    index: &mut HashMap<TaskId, (ExpressionId, NodeId)>,
    timings: &OperationTimes,
    ready: Vec<NodeId>,
) -> Result<Vec<Task>> {
    let expression_id = entry.record.id;
    let dag = entry
        .dag
        .as_mut()
        .ok_or_else(|| Error::Graph(format!("expression {} has no graph", expression_id)))?;

    let mut tasks = Vec::with_capacity(ready.len());
    for node_id in ready {
        let node = dag
            .node(node_id)
            .ok_or_else(|| Error::Graph(format!("node {} not found", node_id)))?;
        let operator = node.operator;
        let (arg1, arg2) = dag
            .operand_values(node_id)
            .ok_or_else(|| Error::Graph(format!("node {} has unresolved operands", node_id)))?;

        let task = Task::new(operator, arg1, arg2, timings.for_operator(operator));
        dag.mark_dispatched(node_id, task.id)?;
        index.insert(task.id, (expression_id, node_id));
        entry.tasks_issued += 1;
        tasks.push(task);
    }
    Ok(tasks)
}

fn fail_entry(
    entry: &mut ExpressionEntry,
    index: &mut HashMap<TaskId, (ExpressionId, NodeId)>,
    kind: FailureKind,
) -> Result<()> {
    entry.record.fail(kind)?;
    if let Some(dag) = &entry.dag {
        for task_id in dag.outstanding_tasks() {
            index.remove(&task_id);
        }
    }
    Ok(())
}
