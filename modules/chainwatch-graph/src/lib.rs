pub mod graph;

pub use graph::{CausalGraph, NodeKind};
