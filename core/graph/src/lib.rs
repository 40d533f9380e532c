pub mod layout;

pub use layout::{
    edges, node_at, ForceLayout, GraphEdge, GraphNode, LayoutConfig, MAX_CLUSTER_STRENGTH,
    MIN_CLUSTER_STRENGTH,
};
