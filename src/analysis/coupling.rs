use crate::analysis::churn::{CommitTouch, FileMetrics};
use crate::engine::settings::CouplingConfig;
use crate::models::coupling::{CouplingCluster, CouplingHub, CouplingPair};
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{NodeIndex, UnGraph};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

const CHUNK_SIZE: usize = 256;

/// Canonical order: a < b
pub type PairKey = (String, String);

#[derive(Debug, Clone, Default)]
pub struct CouplingOutcome {
    pub pairs: Vec<CouplingPair>,
    pub clusters: Vec<CouplingCluster>,
    pub hubs: Vec<CouplingHub>,
    /// Commits left out of pairing for touching too many files.
    pub skipped_commits: usize,
}

/// `co_changes / min(changes_a, changes_b)`, symmetric in its two files.
pub fn coupling_strength(co_changes: usize, changes_a: usize, changes_b: usize) -> f64 {
    let min_changes = changes_a.min(changes_b).max(1) as f64;
    (co_changes as f64 / min_changes).min(1.0)
}

/// Count how often each pair of files changes in the same commit.
///
/// Commits touching more than `max_files_per_commit` files are skipped:
/// mechanical sweeps would otherwise flood the pair space.
pub fn count_co_changes(touches: &[CommitTouch], max_files_per_commit: usize) -> HashMap<PairKey, usize> {
    touches
        .par_chunks(CHUNK_SIZE)
        .map(|chunk| {
            let mut local: HashMap<PairKey, usize> = HashMap::new();
            for touch in chunk {
                if touch.paths.len() > max_files_per_commit {
                    continue;
                }
                let files: Vec<&String> = touch.paths.iter().collect();
                for i in 0..files.len() {
                    for j in (i + 1)..files.len() {
                        // BTreeSet iteration is sorted, so files[i] < files[j]
                        let key = (files[i].clone(), files[j].clone());
                        *local.entry(key).or_insert(0) += 1;
                    }
                }
            }
            local
        })
        .reduce(HashMap::new, |mut merged, part| {
            for (key, count) in part {
                *merged.entry(key).or_insert(0) += count;
            }
            merged
        })
}

pub fn detect_coupling(metrics: &FileMetrics, config: &CouplingConfig) -> CouplingOutcome {
    let skipped_commits = metrics
        .touches
        .iter()
        .filter(|t| t.paths.len() > config.max_files_per_commit)
        .count();
    let counts = count_co_changes(&metrics.touches, config.max_files_per_commit);

    let changes_of = |path: &str| {
        metrics
            .files
            .get(path)
            .map(|f| f.commit_count())
            .unwrap_or(0)
    };

    let mut pairs: Vec<CouplingPair> = counts
        .into_iter()
        .filter(|(_, co)| *co >= config.minimum_threshold)
        .map(|((file_a, file_b), co_change_count)| {
            let changes_a = changes_of(&file_a);
            let changes_b = changes_of(&file_b);
            CouplingPair {
                strength: coupling_strength(co_change_count, changes_a, changes_b),
                file_a,
                file_b,
                co_change_count,
                changes_a,
                changes_b,
            }
        })
        .collect();

    pairs.sort_by(|a, b| {
        b.strength
            .partial_cmp(&a.strength)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.co_change_count.cmp(&a.co_change_count))
            .then_with(|| a.file_a.cmp(&b.file_a))
            .then_with(|| a.file_b.cmp(&b.file_b))
    });

    let clusters = coupling_clusters(&pairs, config.cluster_strength);
    let hubs = coupling_hubs(&pairs, config.cluster_strength, config.hub_min_degree);

    log::debug!(
        "coupling: {} pairs, {} clusters, {} hubs ({} oversized commits skipped)",
        pairs.len(),
        clusters.len(),
        hubs.len(),
        skipped_commits
    );

    CouplingOutcome {
        pairs,
        clusters,
        hubs,
        skipped_commits,
    }
}

struct StrongGraph {
    graph: UnGraph<String, f64>,
}

impl StrongGraph {
    // Nodes are added in sorted path order so indices never depend on input order.
    fn build(pairs: &[CouplingPair], min_strength: f64) -> Self {
        let strong: Vec<&CouplingPair> = pairs.iter().filter(|p| p.strength >= min_strength).collect();
        let paths: BTreeSet<&str> = strong
            .iter()
            .flat_map(|p| [p.file_a.as_str(), p.file_b.as_str()])
            .collect();

        let mut graph = UnGraph::new_undirected();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for path in paths {
            index.insert(path, graph.add_node(path.to_string()));
        }
        for pair in strong {
            graph.add_edge(index[pair.file_a.as_str()], index[pair.file_b.as_str()], pair.strength);
        }
        Self { graph }
    }
}

/// Connected components of the pair graph thresholded at `min_strength`.
pub fn coupling_clusters(pairs: &[CouplingPair], min_strength: f64) -> Vec<CouplingCluster> {
    let strong = StrongGraph::build(pairs, min_strength);
    let graph = &strong.graph;

    let mut clusters: Vec<CouplingCluster> = kosaraju_scc(graph)
        .into_iter()
        .filter(|component| component.len() >= 2)
        .map(|component| {
            let nodes: BTreeSet<NodeIndex> = component.iter().copied().collect();
            let strengths: Vec<f64> = graph
                .edge_indices()
                .filter_map(|edge| {
                    let (a, b) = graph.edge_endpoints(edge)?;
                    (nodes.contains(&a) && nodes.contains(&b)).then(|| graph[edge])
                })
                .collect();

            let mut members: Vec<String> = component.iter().map(|n| graph[*n].clone()).collect();
            members.sort();

            CouplingCluster {
                members,
                edge_count: strengths.len(),
                mean_strength: if strengths.is_empty() {
                    0.0
                } else {
                    strengths.iter().sum::<f64>() / strengths.len() as f64
                },
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        b.members
            .len()
            .cmp(&a.members.len())
            .then_with(|| a.members.cmp(&b.members))
    });
    clusters
}

/// Files whose degree in the strong coupling graph reaches `min_degree`.
pub fn coupling_hubs(pairs: &[CouplingPair], min_strength: f64, min_degree: usize) -> Vec<CouplingHub> {
    let strong = StrongGraph::build(pairs, min_strength);
    let graph = &strong.graph;

    let mut hubs: Vec<CouplingHub> = graph
        .node_indices()
        .map(|node| CouplingHub {
            path: graph[node].clone(),
            degree: graph.neighbors(node).count(),
        })
        .filter(|hub| hub.degree >= min_degree)
        .collect();

    hubs.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.path.cmp(&b.path)));
    hubs
}
