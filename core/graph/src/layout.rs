use devmem_schemas::{Memory, MemoryId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Bounds of the interactive clustering control.
pub const MIN_CLUSTER_STRENGTH: f32 = 0.1;
pub const MAX_CLUSTER_STRENGTH: f32 = 3.0;

const MIN_NODE_RADIUS: f32 = 12.0;
const RADIUS_PER_STRENGTH: f32 = 30.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    /// Nodes start at least this far inside the canvas edges.
    pub margin: f32,
    pub iterations: usize,
    pub repulsion_radius: f32,
    pub repulsion_factor: f32,
    pub attraction_factor: f32,
    pub damping: f32,
    /// Fixed seed for reproducible placement.
    pub seed: Option<u64>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            margin: 50.0,
            iterations: 100,
            repulsion_radius: 100.0,
            repulsion_factor: 0.005,
            attraction_factor: 0.0008,
            damping: 0.9,
            seed: None,
        }
    }
}

/// A memory placed on the canvas for one layout pass.
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub memory: Memory,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
}

impl GraphNode {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.distance_to(x, y) <= self.radius
    }

    fn distance_to(&self, x: f32, y: f32) -> f32 {
        let dx = x - self.x;
        let dy = y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One declared connection between two placed nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: MemoryId,
    pub target: MemoryId,
}

/// Radius derived from a memory's strength.
pub fn node_radius(strength: f32) -> f32 {
    (strength * RADIUS_PER_STRENGTH).max(MIN_NODE_RADIUS)
}

/// Force-directed placement of memories.
#[derive(Debug, Clone, Default)]
pub struct ForceLayout {
    config: LayoutConfig,
}

impl ForceLayout {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Seed positions and run the relaxation for exactly `memories`.
    pub fn layout(&self, memories: &[Memory], cluster_strength: f32) -> Vec<GraphNode> {
        let mut nodes = match self.config.seed {
            Some(seed) => self.seed(memories, &mut StdRng::seed_from_u64(seed)),
            None => self.seed(memories, &mut rand::rng()),
        };
        self.relax(&mut nodes, cluster_strength);
        nodes
    }

    /// Place every memory at a random position inside the margins, at rest.
    pub fn seed<R: Rng + ?Sized>(&self, memories: &[Memory], rng: &mut R) -> Vec<GraphNode> {
        let c = &self.config;
        memories
            .iter()
            .map(|memory| GraphNode {
                memory: memory.clone(),
                x: sample(rng, c.margin, c.width - c.margin),
                y: sample(rng, c.margin, c.height - c.margin),
                vx: 0.0,
                vy: 0.0,
                radius: node_radius(memory.strength),
            })
            .collect()
    }

    /// Run the fixed number of relaxation iterations in place.
    ///
    /// Nodes are updated one at a time, so later nodes in an iteration see
    /// the already moved positions of earlier ones.
    pub fn relax(&self, nodes: &mut [GraphNode], cluster_strength: f32) {
        let c = &self.config;
        let cluster = clamp_cluster_strength(cluster_strength);

        // First node wins on duplicate ids
        let mut index: HashMap<MemoryId, usize> = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.memory.id.clone()).or_insert(i);
        }

        for _ in 0..c.iterations {
            for i in 0..nodes.len() {
                let (x, y) = (nodes[i].x, nodes[i].y);
                let mut fx = 0.0;
                let mut fy = 0.0;

                for (j, other) in nodes.iter().enumerate() {
                    if j == i {
                        continue;
                    }
                    let dx = x - other.x;
                    let dy = y - other.y;
                    let distance = (dx * dx + dy * dy).sqrt();
                    // Coincident nodes have no direction to push along
                    if distance > 0.0 && distance < c.repulsion_radius {
                        let force = (c.repulsion_radius - distance) * c.repulsion_factor;
                        fx += dx / distance * force;
                        fy += dy / distance * force;
                    }
                }

                for target in &nodes[i].memory.connections {
                    let Some(&j) = index.get(target) else {
                        continue;
                    };
                    if j == i {
                        continue;
                    }
                    let dx = nodes[j].x - x;
                    let dy = nodes[j].y - y;
                    let distance = (dx * dx + dy * dy).sqrt();
                    if distance > 0.0 {
                        let force = distance * c.attraction_factor * cluster;
                        fx += dx / distance * force;
                        fy += dy / distance * force;
                    }
                }

                let node = &mut nodes[i];
                node.vx += fx;
                node.vy += fy;
                node.x += node.vx;
                node.y += node.vy;
                node.vx *= c.damping;
                node.vy *= c.damping;
                node.x = node.x.min(c.width - node.radius).max(node.radius);
                node.y = node.y.min(c.height - node.radius).max(node.radius);
            }
        }

        debug!(
            "Relaxed {} nodes over {} iterations (cluster strength {})",
            nodes.len(),
            c.iterations,
            cluster
        );
    }
}

/// Every declared connection whose target is on the canvas, once per listing.
pub fn edges(nodes: &[GraphNode]) -> Vec<GraphEdge> {
    let present: HashSet<&MemoryId> = nodes.iter().map(|n| &n.memory.id).collect();
    let present = &present;

    nodes
        .iter()
        .flat_map(|node| {
            node.memory
                .connections
                .iter()
                .filter(move |target| present.contains(target))
                .map(move |target| GraphEdge {
                    source: node.memory.id.clone(),
                    target: target.clone(),
                })
        })
        .collect()
}

/// The memory under the pointer: the nearest node whose circle contains the point.
pub fn node_at(nodes: &[GraphNode], x: f32, y: f32) -> Option<&Memory> {
    nodes
        .iter()
        .filter(|node| node.contains(x, y))
        .min_by(|a, b| a.distance_to(x, y).total_cmp(&b.distance_to(x, y)))
        .map(|node| &node.memory)
}

fn clamp_cluster_strength(value: f32) -> f32 {
    if value.is_nan() {
        MIN_CLUSTER_STRENGTH
    } else {
        value.clamp(MIN_CLUSTER_STRENGTH, MAX_CLUSTER_STRENGTH)
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, low: f32, high: f32) -> f32 {
    if low < high {
        rng.random_range(low..high)
    } else {
        (low + high) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmem_schemas::SourceDescriptor;

    fn memory(id: &str, strength: f32, connections: &[&str]) -> Memory {
        Memory {
            id: MemoryId::from(id),
            title: format!("Memory {}", id),
            content: "content".to_string(),
            description: String::new(),
            kind: Default::default(),
            tags: vec!["graph".to_string()],
            source: SourceDescriptor::default(),
            project: "Test".to_string(),
            created_at: "2025-06-01T00:00:00Z".to_string(),
            connections: connections.iter().map(|c| MemoryId::from(*c)).collect(),
            strength,
            links: Vec::new(),
        }
    }

    fn placed(memory: Memory, x: f32, y: f32) -> GraphNode {
        GraphNode {
            radius: node_radius(memory.strength),
            memory,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
        }
    }

    fn separation(a: &GraphNode, b: &GraphNode) -> f32 {
        a.distance_to(b.x, b.y)
    }

    #[test]
    fn test_radius_from_strength() {
        assert_eq!(node_radius(0.2), 12.0);
        assert_eq!(node_radius(0.5), 15.0);
        assert_eq!(node_radius(1.0), 30.0);
    }

    #[test]
    fn test_connected_nodes_converge_at_zero_cluster_strength() {
        let layout = ForceLayout::default();
        let mut nodes = vec![
            placed(memory("mem_a", 0.5, &["mem_b"]), 60.0, 300.0),
            placed(memory("mem_b", 0.5, &[]), 740.0, 300.0),
        ];
        let before = separation(&nodes[0], &nodes[1]);

        layout.relax(&mut nodes, 0.0);

        assert!(separation(&nodes[0], &nodes[1]) < before);
    }

    #[test]
    fn test_mutual_connections_pull_both_nodes() {
        let layout = ForceLayout::default();
        let mut one_way = vec![
            placed(memory("mem_a", 0.5, &["mem_b"]), 100.0, 300.0),
            placed(memory("mem_b", 0.5, &[]), 700.0, 300.0),
        ];
        let mut both_ways = vec![
            placed(memory("mem_a", 0.5, &["mem_b"]), 100.0, 300.0),
            placed(memory("mem_b", 0.5, &["mem_a"]), 700.0, 300.0),
        ];

        layout.relax(&mut one_way, 1.0);
        layout.relax(&mut both_ways, 1.0);

        assert_eq!(one_way[1].x, 700.0);
        assert!(both_ways[1].x < 700.0);
        assert!(separation(&both_ways[0], &both_ways[1]) < separation(&one_way[0], &one_way[1]));
    }

    #[test]
    fn test_nodes_stay_in_bounds() {
        let config = LayoutConfig {
            seed: Some(7),
            ..Default::default()
        };
        let layout = ForceLayout::new(config.clone());

        let memories: Vec<Memory> = (0..40)
            .map(|i| {
                let next = format!("mem_{}", (i + 1) % 40);
                memory(&format!("mem_{}", i), (i as f32) / 40.0, &[next.as_str()])
            })
            .collect();

        let nodes = layout.layout(&memories, MAX_CLUSTER_STRENGTH);
        assert_eq!(nodes.len(), memories.len());
        for node in &nodes {
            assert!(node.x >= node.radius && node.x <= config.width - node.radius);
            assert!(node.y >= node.radius && node.y <= config.height - node.radius);
        }
    }

    #[test]
    fn test_seeded_layout_is_reproducible() {
        let layout = ForceLayout::new(LayoutConfig {
            seed: Some(42),
            ..Default::default()
        });
        let memories = vec![memory("mem_a", 0.9, &["mem_b"]), memory("mem_b", 0.3, &[])];

        let first = layout.layout(&memories, 1.0);
        let second = layout.layout(&memories, 1.0);
        let positions = |nodes: &[GraphNode]| nodes.iter().map(|n| (n.x, n.y)).collect::<Vec<_>>();
        assert_eq!(positions(&first), positions(&second));
    }

    #[test]
    fn test_seed_respects_margin() {
        let layout = ForceLayout::default();
        let memories: Vec<Memory> = (0..50).map(|i| memory(&format!("mem_{}", i), 0.5, &[])).collect();

        let nodes = layout.seed(&memories, &mut StdRng::seed_from_u64(1));
        for node in &nodes {
            assert!(node.x >= 50.0 && node.x < 750.0);
            assert!(node.y >= 50.0 && node.y < 550.0);
            assert_eq!((node.vx, node.vy), (0.0, 0.0));
        }
    }

    #[test]
    fn test_coincident_nodes_do_not_produce_nan() {
        let layout = ForceLayout::default();
        let mut nodes = vec![
            placed(memory("mem_a", 0.5, &["mem_b"]), 400.0, 300.0),
            placed(memory("mem_b", 0.5, &["mem_a"]), 400.0, 300.0),
        ];

        layout.relax(&mut nodes, 1.0);
        assert!(nodes.iter().all(|n| n.x.is_finite() && n.y.is_finite()));
    }

    #[test]
    fn test_edges_skip_missing_targets() {
        let nodes = vec![
            placed(memory("mem_a", 0.5, &["mem_b", "mem_gone"]), 100.0, 100.0),
            placed(memory("mem_b", 0.5, &["mem_a"]), 200.0, 200.0),
        ];

        let edges = edges(&nodes);
        assert_eq!(
            edges,
            vec![
                GraphEdge {
                    source: MemoryId::from("mem_a"),
                    target: MemoryId::from("mem_b"),
                },
                GraphEdge {
                    source: MemoryId::from("mem_b"),
                    target: MemoryId::from("mem_a"),
                },
            ]
        );
    }

    #[test]
    fn test_node_at_prefers_nearest_containing_node() {
        let nodes = vec![
            placed(memory("mem_big", 1.0, &[]), 100.0, 100.0),
            placed(memory("mem_small", 0.1, &[]), 120.0, 100.0),
        ];

        assert_eq!(node_at(&nodes, 118.0, 100.0).map(|m| m.id.0.as_str()), Some("mem_small"));
        assert_eq!(node_at(&nodes, 85.0, 100.0).map(|m| m.id.0.as_str()), Some("mem_big"));
        assert!(node_at(&nodes, 400.0, 400.0).is_none());
    }

    #[test]
    fn test_graph_node_serializes_with_memory() {
        let node = placed(memory("mem_a", 0.5, &[]), 10.0, 20.0);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["memory"]["id"], "mem_a");
        assert_eq!(json["radius"], 15.0);
    }
}
