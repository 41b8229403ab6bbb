//! In-memory causal graph over the supply topology.
//!
//! Edges point in the direction disruption propagates: a location hosts
//! a supplier, the supplier feeds the company, an event hits a location.
//! Traversal therefore answers "which companies does this event reach"
//! with a plain forward walk, and "what feeds this company" with the
//! reverse one. The edge set is mirrored into the store so the graph
//! survives restarts. Events are referenced by label only, never by
//! stored event id.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use petgraph::Direction;
use tracing::debug;

use chainwatch_common::{Company, GraphEdgeRow, Severity};
use chainwatch_store::EventStore;

const DEFAULT_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Company,
    Supplier,
    Location,
    Event,
}

#[derive(Debug, Clone)]
struct Node {
    label: String,
    kind: NodeKind,
    /// Event category, set on event nodes only.
    category: Option<String>,
    /// Latest assessed severity, set on event nodes only.
    severity: Option<Severity>,
}

#[derive(Debug, Default)]
pub struct CausalGraph {
    graph: DiGraph<Node, String>,
    index: HashMap<String, NodeIndex>,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node handle for a label, creating it on first sight. A label
    /// identifies one node regardless of how many companies mention it.
    fn ensure_node(&mut self, label: &str, kind: NodeKind) -> NodeIndex {
        if let Some(&idx) = self.index.get(label) {
            return idx;
        }
        let idx = self.graph.add_node(Node {
            label: label.to_string(),
            kind,
            category: None,
            severity: None,
        });
        self.index.insert(label.to_string(), idx);
        idx
    }

    /// Add an edge unless an identical relation already connects the pair.
    fn ensure_edge(&mut self, from: NodeIndex, to: NodeIndex, relation: &str) {
        let exists = self
            .graph
            .edges_connecting(from, to)
            .any(|e| e.weight().as_str() == relation);
        if !exists {
            self.graph.add_edge(from, to, relation.to_string());
        }
    }

    /// Load a company's declared topology: each supply node's location
    /// manufactures for the supplier entity, and the entity feeds the
    /// company. Calling this twice changes nothing.
    pub fn add_static_topology(&mut self, company: &Company) {
        let company_idx = self.ensure_node(&company.name, NodeKind::Company);
        for node in &company.nodes {
            let location_idx = self.ensure_node(&node.location, NodeKind::Location);
            let supplier_idx = self.ensure_node(&node.entity, NodeKind::Supplier);
            self.ensure_edge(location_idx, supplier_idx, "manufactures_at");
            self.ensure_edge(supplier_idx, company_idx, "supplies");
        }
        debug!(company = %company.name, nodes = company.nodes.len(), "topology loaded");
    }

    /// Attach a risk event to the location it affects. Re-adding the
    /// same label refreshes the category and severity attributes.
    pub fn add_event(&mut self, label: &str, location: &str, kind: &str, severity: Severity) {
        let event_idx = self.ensure_node(label, NodeKind::Event);
        self.graph[event_idx].category = Some(kind.to_string());
        self.graph[event_idx].severity = Some(severity);
        let location_idx = self.ensure_node(location, NodeKind::Location);
        self.ensure_edge(event_idx, location_idx, "affects");
    }

    /// Companies downstream of a node: everything a disruption at
    /// `label` can propagate to. Empty when the label is unknown.
    pub fn reachable_companies_from(&self, label: &str) -> Vec<String> {
        let Some(&start) = self.index.get(label) else {
            return Vec::new();
        };
        let mut companies = Vec::new();
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            let node = &self.graph[idx];
            if node.kind == NodeKind::Company {
                companies.push(node.label.clone());
            }
        }
        companies.sort();
        companies
    }

    /// Suppliers and locations upstream of a company.
    pub fn upstream_of(&self, company: &str) -> Vec<String> {
        let Some(&start) = self.index.get(company) else {
            return Vec::new();
        };
        let reversed = Reversed(&self.graph);
        let mut upstream = Vec::new();
        let mut dfs = Dfs::new(reversed, start);
        while let Some(idx) = dfs.next(reversed) {
            if idx != start {
                upstream.push(self.graph[idx].label.clone());
            }
        }
        upstream.sort();
        upstream
    }

    /// Events currently attached to a location.
    pub fn events_at(&self, location: &str) -> Vec<String> {
        let Some(&idx) = self.index.get(location) else {
            return Vec::new();
        };
        let mut events: Vec<String> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .filter(|&n| self.graph[n].kind == NodeKind::Event)
            .map(|n| self.graph[n].label.clone())
            .collect();
        events.sort();
        events
    }

    /// Severity attribute of an event node, if the label is one.
    pub fn event_severity(&self, label: &str) -> Option<Severity> {
        let idx = self.index.get(label)?;
        self.graph[*idx].severity
    }

    /// Category attribute of an event node, if the label is one.
    pub fn event_category(&self, label: &str) -> Option<&str> {
        let idx = self.index.get(label)?;
        self.graph[*idx].category.as_deref()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Mirror the company's own slice of the graph into the store:
    /// only edges whose endpoints both sit in the company's upstream
    /// closure (suppliers, locations, events hitting them). Edges of
    /// other companies sharing this graph are left to their own scope.
    /// Returns how many rows were actually new.
    pub async fn persist(
        &self,
        store: &EventStore,
        company: &str,
    ) -> chainwatch_store::Result<usize> {
        let Some(&start) = self.index.get(company) else {
            return Ok(0);
        };
        let reversed = Reversed(&self.graph);
        let mut scope = HashSet::new();
        let mut dfs = Dfs::new(reversed, start);
        while let Some(idx) = dfs.next(reversed) {
            scope.insert(idx);
        }

        let mut written = 0;
        for edge in self.graph.edge_indices() {
            let Some((from, to)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            if !scope.contains(&from) || !scope.contains(&to) {
                continue;
            }
            let row = GraphEdgeRow {
                source: self.graph[from].label.clone(),
                target: self.graph[to].label.clone(),
                relation: self.graph[edge].clone(),
                company: company.to_string(),
                confidence: DEFAULT_CONFIDENCE,
            };
            if store.upsert_edge(&row).await? {
                written += 1;
            }
        }
        debug!(company, written, "graph edges persisted");
        Ok(written)
    }
}
