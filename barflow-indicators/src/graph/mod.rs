//! Calculator dependency graph.
//!
//! Nodes are registered with a [`GraphBuilder`] together with the nodes they
//! read from. [`GraphBuilder::build`] sorts them topologically with
//! [petgraph](https://docs.rs/petgraph/) and rejects cycles, so every step
//! evaluates a node only after all of its dependencies produced their value
//! for the same bar.
//!
//! Changing a node's parameter marks that node and everything downstream of
//! it dirty. On the next step only dirty nodes are rewound and replayed from
//! bar 0, reading the candle history from the host and the untouched
//! outputs of clean dependencies.

pub mod catalog;
pub mod node;

use std::collections::{HashMap, VecDeque};

use barflow_core::{Candle, CandleSource};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::core::{IndicatorError, IndicatorResult, ParamValue, Parameter, Parameterized};
use crate::recompute::RecomputeState;
use crate::series::Series;

pub use catalog::{build_graph, build_node, NodeSpec, KINDS};
pub use node::{CalcNode, CandleNode, Combine, CombineOp, Feed, FromCandle, MultiOutput, Selected};

/// A calculator that can live inside a [`CalculatorGraph`].
pub trait GraphNode: Parameterized + Send {
    /// Compute this node's value for `inputs.bar()`.
    fn step(&mut self, bar: usize, inputs: &NodeInputs<'_>) -> IndicatorResult<Decimal>;

    /// Discard all rolling state so the next step must be bar 0.
    fn reset(&mut self);
}

/// Everything a node may read while computing one bar.
#[derive(Debug, Clone, Copy)]
pub struct NodeInputs<'a> {
    node: &'a str,
    bar: usize,
    candle: &'a Candle,
    new_session: bool,
    dependencies: &'a [&'a Series],
}

impl<'a> NodeInputs<'a> {
    /// Bundle the inputs for `node` at `bar`.
    pub fn new(
        node: &'a str,
        bar: usize,
        candle: &'a Candle,
        new_session: bool,
        dependencies: &'a [&'a Series],
    ) -> Self {
        Self {
            node,
            bar,
            candle,
            new_session,
            dependencies,
        }
    }

    /// Id of the node being evaluated.
    pub fn node(&self) -> &str {
        self.node
    }

    /// Bar being evaluated.
    pub fn bar(&self) -> usize {
        self.bar
    }

    /// Host candle at this bar.
    pub fn candle(&self) -> &Candle {
        self.candle
    }

    /// Whether the host flags this bar as the start of a session.
    pub fn is_new_session(&self) -> bool {
        self.new_session
    }

    /// Number of wired dependencies.
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Value of dependency `index` at the current bar.
    pub fn dependency(&self, index: usize) -> IndicatorResult<Decimal> {
        self.dependency_at(index, self.bar)
    }

    /// Value of dependency `index` at an earlier (or the current) bar.
    pub fn dependency_at(&self, index: usize, bar: usize) -> IndicatorResult<Decimal> {
        let series = self
            .dependencies
            .get(index)
            .ok_or_else(|| IndicatorError::MissingDependency {
                node: self.node.to_string(),
                index,
            })?;
        series.get(bar)
    }
}

/// Collects nodes and dependency edges before the graph is sorted.
#[derive(Default)]
pub struct GraphBuilder {
    ids: Vec<String>,
    nodes: Vec<Box<dyn GraphNode>>,
    dependencies: Vec<Vec<usize>>,
    index: HashMap<String, usize>,
}

impl GraphBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node` under `id`.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        node: impl GraphNode + 'static,
    ) -> IndicatorResult<()> {
        self.add_boxed(id, Box::new(node))
    }

    /// Register an already boxed node under `id`.
    pub fn add_boxed(
        &mut self,
        id: impl Into<String>,
        node: Box<dyn GraphNode>,
    ) -> IndicatorResult<()> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(IndicatorError::DuplicateNode(id));
        }
        self.index.insert(id.clone(), self.ids.len());
        self.ids.push(id);
        self.nodes.push(node);
        self.dependencies.push(Vec::new());
        Ok(())
    }

    /// Make `node` read from `dependency`. Dependencies are numbered in the
    /// order they are added.
    pub fn add_dependency(&mut self, node: &str, dependency: &str) -> IndicatorResult<()> {
        let node_index = self.lookup(node)?;
        let dependency_index = self.lookup(dependency)?;
        self.dependencies[node_index].push(dependency_index);
        Ok(())
    }

    fn lookup(&self, id: &str) -> IndicatorResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| IndicatorError::UnknownNode(id.to_string()))
    }

    /// Sort the nodes so dependencies come first.
    pub fn build(self) -> IndicatorResult<CalculatorGraph> {
        let mut graph = DiGraph::<usize, ()>::with_capacity(self.ids.len(), 0);
        let handles: Vec<_> = (0..self.ids.len()).map(|i| graph.add_node(i)).collect();
        for (node, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                graph.add_edge(handles[dep], handles[node], ());
            }
        }

        let order: Vec<usize> = match toposort(&graph, None) {
            Ok(sorted) => sorted.into_iter().map(|handle| graph[handle]).collect(),
            Err(cycle) => {
                return Err(IndicatorError::CyclicDependency {
                    node: self.ids[graph[cycle.node_id()]].clone(),
                })
            }
        };

        let mut dependents = vec![Vec::new(); self.ids.len()];
        for (node, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                if !dependents[dep].contains(&node) {
                    dependents[dep].push(node);
                }
            }
        }

        let count = self.ids.len();
        Ok(CalculatorGraph {
            ids: self.ids,
            nodes: self.nodes,
            dependencies: self.dependencies,
            dependents,
            index: self.index,
            order,
            outputs: vec![Series::new(); count],
            dirty: vec![false; count],
            state: RecomputeState::Clean,
            last_bar: None,
        })
    }
}

/// A sorted set of calculator nodes driven bar by bar from a [`CandleSource`].
pub struct CalculatorGraph {
    ids: Vec<String>,
    nodes: Vec<Box<dyn GraphNode>>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    index: HashMap<String, usize>,
    order: Vec<usize>,
    outputs: Vec<Series>,
    dirty: Vec<bool>,
    state: RecomputeState,
    last_bar: Option<usize>,
}

impl CalculatorGraph {
    /// Start building a graph.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Node ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.ids.iter().map(String::as_str)
    }

    /// Node ids in evaluation order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.ids[i].as_str()).collect()
    }

    /// Last bar delivered to [`CalculatorGraph::step`].
    pub fn last_bar(&self) -> Option<usize> {
        self.last_bar
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecomputeState {
        self.state
    }

    /// Whether `id` is waiting to be replayed.
    pub fn is_dirty(&self, id: &str) -> IndicatorResult<bool> {
        Ok(self.dirty[self.lookup(id)?])
    }

    /// Output series of node `id`.
    pub fn output(&self, id: &str) -> IndicatorResult<&Series> {
        Ok(&self.outputs[self.lookup(id)?])
    }

    /// Output of node `id` at `bar`.
    pub fn value(&self, id: &str, bar: usize) -> IndicatorResult<Decimal> {
        self.output(id)?.get(bar)
    }

    /// Current parameters of node `id`.
    pub fn parameters(&self, id: &str) -> IndicatorResult<Vec<Parameter>> {
        Ok(self.nodes[self.lookup(id)?].parameters())
    }

    /// Change a parameter of node `id` and mark it and its dependents dirty.
    ///
    /// A rejected value leaves the graph untouched.
    pub fn set_parameter(&mut self, id: &str, name: &str, value: ParamValue) -> IndicatorResult<()> {
        let index = self.lookup(id)?;
        self.nodes[index].set_parameter(name, value)?;
        self.mark_dirty(index);
        Ok(())
    }

    /// Evaluate every node for `bar`.
    ///
    /// Bars must start at 0 and then repeat (revising the open bar) or
    /// advance by one. Bar 0 after later bars starts a fresh pass.
    pub fn step<S>(&mut self, bar: usize, source: &S) -> IndicatorResult<()>
    where
        S: CandleSource + ?Sized,
    {
        match self.last_bar {
            Some(last) if bar == 0 && last > 0 => {
                trace!(bars = last + 1, "bar 0 delivered again, starting a fresh pass");
                self.restart();
            }
            None if bar != 0 => {
                return Err(IndicatorError::NonSequentialWrite {
                    expected: 0,
                    got: bar,
                })
            }
            Some(last) if bar != last && bar != last + 1 => {
                return Err(IndicatorError::NonSequentialWrite {
                    expected: last + 1,
                    got: bar,
                })
            }
            _ => {}
        }

        if self.state != RecomputeState::Clean {
            self.replay(bar, source)?;
        }
        let candle = fetch(source, bar)?;
        let new_session = source.is_new_session(bar);
        for position in 0..self.order.len() {
            let index = self.order[position];
            self.evaluate(index, bar, candle, new_session)?;
        }
        self.last_bar = Some(bar);
        Ok(())
    }

    /// Replay history through the last delivered bar.
    ///
    /// Replays dirty nodes, or every node when none is dirty.
    pub fn recalculate<S>(&mut self, source: &S) -> IndicatorResult<()>
    where
        S: CandleSource + ?Sized,
    {
        let Some(last) = self.last_bar else {
            return Ok(());
        };
        if self.state == RecomputeState::Clean {
            self.dirty.iter_mut().for_each(|flag| *flag = true);
            self.state = RecomputeState::Dirty;
        }
        self.replay(last + 1, source)
    }

    /// Rewind every node and drop all outputs.
    pub fn restart(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
        for series in &mut self.outputs {
            series.clear();
        }
        self.dirty.iter_mut().for_each(|flag| *flag = false);
        self.state = RecomputeState::Clean;
        self.last_bar = None;
    }

    fn lookup(&self, id: &str) -> IndicatorResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| IndicatorError::UnknownNode(id.to_string()))
    }

    fn mark_dirty(&mut self, start: usize) {
        let mut queue = VecDeque::from([start]);
        while let Some(index) = queue.pop_front() {
            if self.dirty[index] {
                continue;
            }
            self.dirty[index] = true;
            trace!(node = %self.ids[index], "marked dirty");
            queue.extend(self.dependents[index].iter().copied());
        }
        self.state = RecomputeState::Dirty;
    }

    /// Rewind dirty nodes and recompute them for bars `0..end`.
    fn replay<S>(&mut self, end: usize, source: &S) -> IndicatorResult<()>
    where
        S: CandleSource + ?Sized,
    {
        self.state = RecomputeState::Replaying;
        let dirty: Vec<usize> = self
            .order
            .iter()
            .copied()
            .filter(|&index| self.dirty[index])
            .collect();
        debug!(nodes = dirty.len(), bars = end, "replaying dirty nodes");

        for &index in &dirty {
            self.nodes[index].reset();
            self.outputs[index].clear();
        }
        for bar in 0..end {
            let replayed = fetch(source, bar).and_then(|candle| {
                let new_session = source.is_new_session(bar);
                dirty
                    .iter()
                    .try_for_each(|&index| self.evaluate(index, bar, candle, new_session))
            });
            if let Err(err) = replayed {
                self.state = RecomputeState::Dirty;
                return Err(err);
            }
        }

        self.dirty.iter_mut().for_each(|flag| *flag = false);
        self.state = RecomputeState::Clean;
        debug!(nodes = dirty.len(), bars = end, "replay finished");
        Ok(())
    }

    fn evaluate(
        &mut self,
        index: usize,
        bar: usize,
        candle: &Candle,
        new_session: bool,
    ) -> IndicatorResult<()> {
        let Self {
            ids,
            nodes,
            dependencies,
            outputs,
            ..
        } = self;
        let value = {
            let series: Vec<&Series> = dependencies[index].iter().map(|&d| &outputs[d]).collect();
            let inputs = NodeInputs::new(&ids[index], bar, candle, new_session, &series);
            nodes[index].step(bar, &inputs)?
        };
        outputs[index].set(bar, value)
    }
}

fn fetch<S>(source: &S, bar: usize) -> IndicatorResult<&Candle>
where
    S: CandleSource + ?Sized,
{
    source.candle(bar).ok_or(IndicatorError::OutOfRange {
        bar,
        len: source.len(),
    })
}
