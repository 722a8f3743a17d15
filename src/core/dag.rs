//! Operation-node DAG for one expression.
//!
//! Decomposition replays the postfix sequence with a value stack, but each
//! operator creates a node instead of computing a number. Operands are typed:
//! a literal, or the output of an earlier node. Edges point from a node to
//! the node that consumes its output, so a node's incoming edges are its
//! dependencies.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::core::task::TaskId;
use crate::core::token::{self, Operator, RpnItem};
use crate::error::{Error, Result};

/// Identifier of a node, unique within its expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Id for the node added to a graph that already holds `count` nodes.
    ///
    /// `u32::MAX` is reserved by petgraph as the end-of-graph index.
    fn for_count(count: usize) -> Result<Self> {
        u32::try_from(count)
            .ok()
            .filter(|&raw| raw != u32::MAX)
            .map(Self)
            .ok_or_else(|| Error::Graph(format!("too many operations ({})", count)))
    }

    fn index(self) -> NodeIndex {
        NodeIndex::new(self.0 as usize)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One side of a binary operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Literal(f64),
    /// The not-yet-known output of another node.
    Node(NodeId),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::Node(id) => write!(f, "{}", id),
        }
    }
}

/// Which operand slot an edge feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeState {
    /// At least one operand unresolved, or eligible but not yet dispatched.
    Waiting,
    /// A task is outstanding for this node.
    Dispatched { task_id: TaskId },
    Resolved { value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationNode {
    pub id: NodeId,
    pub operator: Operator,
    pub left: Operand,
    pub right: Operand,
    pub state: NodeState,
}

impl OperationNode {
    pub fn resolved_value(&self) -> Option<f64> {
        match self.state {
            NodeState::Resolved { value } => Some(value),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {} {} {}", self.id, self.left, self.operator, self.right)
    }
}

/// The dependency graph of one expression.
pub struct ExpressionDag {
    graph: DiGraph<OperationNode, Side>,
    /// The expression's final value: a bare literal or the root node.
    root: Operand,
}

impl ExpressionDag {
    /// Decompose expression text.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_rpn(&token::parse(text)?)
    }

    /// Build the graph from a postfix sequence.
    ///
    /// # Errors
    /// `InvalidExpression` if an operator finds fewer than two values on the
    /// stack, or if the stack does not hold exactly one value at the end.
    pub fn from_rpn(rpn: &[RpnItem]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut stack: Vec<Operand> = Vec::new();

        for item in rpn {
            match *item {
                RpnItem::Number(n) => stack.push(Operand::Literal(n)),
                RpnItem::Op(operator) => {
                    let (right, left) = match (stack.pop(), stack.pop()) {
                        (Some(right), Some(left)) => (right, left),
                        _ => {
                            return Err(Error::InvalidExpression(format!(
                                "operator '{}' is missing an operand",
                                operator
                            )))
                        }
                    };

                    let id = NodeId::for_count(graph.node_count())?;
                    let index = graph.add_node(OperationNode {
                        id,
                        operator,
                        left,
                        right,
                        state: NodeState::Waiting,
                    });
                    for (operand, side) in [(left, Side::Left), (right, Side::Right)] {
                        if let Operand::Node(dep) = operand {
                            graph.add_edge(dep.index(), index, side);
                        }
                    }
                    stack.push(Operand::Node(id));
                }
            }
        }

        match stack.as_slice() {
            [root] => Ok(Self { graph, root: *root }),
            [] => Err(Error::InvalidExpression("no operands".to_string())),
            _ => Err(Error::InvalidExpression(format!(
                "{} values left without an operator",
                stack.len()
            ))),
        }
    }

    pub fn root(&self) -> Operand {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn node(&self, id: NodeId) -> Option<&OperationNode> {
        self.graph.node_weight(id.index())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &OperationNode> {
        self.graph.node_weights()
    }

    fn operand_value(&self, operand: Operand) -> Option<f64> {
        match operand {
            Operand::Literal(v) => Some(v),
            Operand::Node(id) => self.node(id)?.resolved_value(),
        }
    }

    /// Both operand values of a node, if both are known.
    pub fn operand_values(&self, id: NodeId) -> Option<(f64, f64)> {
        let node = self.node(id)?;
        Some((self.operand_value(node.left)?, self.operand_value(node.right)?))
    }

    fn is_eligible(&self, id: NodeId) -> bool {
        matches!(self.node(id), Some(node) if node.state == NodeState::Waiting)
            && self.operand_values(id).is_some()
    }

    /// Nodes that may be turned into tasks right now.
    pub fn ready_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_weights()
            .map(|node| node.id)
            .filter(|&id| self.is_eligible(id))
            .collect()
    }

    /// Record that a task was issued for an eligible node.
    pub fn mark_dispatched(&mut self, id: NodeId, task_id: TaskId) -> Result<()> {
        if !self.is_eligible(id) {
            return Err(Error::Graph(format!("node {} is not eligible for dispatch", id)));
        }
        if let Some(node) = self.graph.node_weight_mut(id.index()) {
            node.state = NodeState::Dispatched { task_id };
        }
        Ok(())
    }

    /// Store a node's output and return the dependents that became eligible.
    ///
    /// # Errors
    /// Fails if the node does not exist or has no outstanding task, so a
    /// node's value is assigned at most once.
    pub fn resolve(&mut self, id: NodeId, value: f64) -> Result<Vec<NodeId>> {
        let node = self
            .graph
            .node_weight_mut(id.index())
            .ok_or_else(|| Error::Graph(format!("node {} not found", id)))?;
        if !matches!(node.state, NodeState::Dispatched { .. }) {
            return Err(Error::Graph(format!("node {} has no outstanding task", id)));
        }
        node.state = NodeState::Resolved { value };

        let mut ready: Vec<NodeId> = self
            .dependents(id)
            .into_iter()
            .filter(|&dep| self.is_eligible(dep))
            .collect();
        ready.dedup();
        Ok(ready)
    }

    /// Nodes consuming this node's output.
    pub fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Nodes whose output this node consumes.
    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: NodeId, direction: Direction) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .graph
            .neighbors_directed(id.index(), direction)
            .map(|index| self.graph[index].id)
            .collect();
        ids.sort();
        ids
    }

    /// The final value, once the root is known.
    pub fn root_value(&self) -> Option<f64> {
        self.operand_value(self.root)
    }

    /// Tasks issued but not yet resolved.
    pub fn outstanding_tasks(&self) -> Vec<TaskId> {
        self.nodes()
            .filter_map(|node| match node.state {
                NodeState::Dispatched { task_id } => Some(task_id),
                _ => None,
            })
            .collect()
    }

    /// Nodes ordered so each comes after all of its dependencies.
    pub fn topological_order(&self) -> Result<Vec<&OperationNode>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            Error::Graph(format!(
                "cycle detected at node {}",
                self.graph[cycle.node_id()].id
            ))
        })?;

        Ok(sorted
            .into_iter()
            .filter_map(|index| self.graph.node_weight(index))
            .collect())
    }
}

impl std::fmt::Debug for ExpressionDag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionDag")
            .field("nodes", &self.node_count())
            .field("root", &self.root)
            .finish()
    }
}
