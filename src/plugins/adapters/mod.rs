// Source adapter implementations
pub mod open_graph;

pub use open_graph::OpenGraphAdapter;
