//! In-process knowledge graph loaded from a JSON snapshot.
//!
//! Used when no graph database is configured, and by tests. Holds the same
//! `Source → Main → Section → SubSection` hierarchy as the hosted store and
//! answers the same two queries. Cosine scoring runs on the [`BlockingPool`]
//! so large snapshots do not stall the async workers.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use hsxassist_core::error::KnowledgeError;
use hsxassist_core::knowledge::{
    KnowledgeGraph, MatchedNode, NodeKind, Page, SectionEntry, SubsectionEntry,
};
use hsxassist_core::runtime::BlockingPool;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Snapshot file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub sources: Vec<SourceDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDoc {
    pub url: String,
    #[serde(default)]
    pub mains: Vec<MainDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainDoc {
    pub title: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub sections: Vec<SectionDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDoc {
    pub title: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub subsections: Vec<SubsectionDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsectionDoc {
    pub title: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Position of a node in the snapshot; doubles as its element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodePath {
    source: usize,
    main: usize,
    section: Option<usize>,
    subsection: Option<usize>,
}

impl NodePath {
    fn kind(&self) -> NodeKind {
        match (self.section, self.subsection) {
            (None, _) => NodeKind::Main,
            (Some(_), None) => NodeKind::Section,
            (Some(_), Some(_)) => NodeKind::SubSection,
        }
    }

    fn element_id(&self) -> String {
        let mut id = format!("mem:{}:{}", self.source, self.main);
        if let Some(s) = self.section {
            id.push_str(&format!(":{s}"));
        }
        if let Some(ss) = self.subsection {
            id.push_str(&format!(":{ss}"));
        }
        id
    }

    fn parse(element_id: &str) -> Option<Self> {
        let rest = element_id.strip_prefix("mem:")?;
        let parts: Vec<usize> = rest
            .split(':')
            .map(str::parse)
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [source, main] => Some(Self {
                source: *source,
                main: *main,
                section: None,
                subsection: None,
            }),
            [source, main, section] => Some(Self {
                source: *source,
                main: *main,
                section: Some(*section),
                subsection: None,
            }),
            [source, main, section, sub] => Some(Self {
                source: *source,
                main: *main,
                section: Some(*section),
                subsection: Some(*sub),
            }),
            _ => None,
        }
    }
}

/// Knowledge graph held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryGraph {
    snapshot: Arc<Snapshot>,
    pool: BlockingPool,
}

impl InMemoryGraph {
    pub fn new(snapshot: Snapshot, pool: BlockingPool) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            pool,
        }
    }

    /// A graph with no nodes; every ranking comes back empty.
    pub fn empty(pool: BlockingPool) -> Self {
        Self::new(Snapshot::default(), pool)
    }

    pub fn from_json(json: &str, pool: BlockingPool) -> Result<Self, KnowledgeError> {
        let snapshot: Snapshot = serde_json::from_str(json)
            .map_err(|e| KnowledgeError::Decode(format!("knowledge snapshot: {e}")))?;
        Ok(Self::new(snapshot, pool))
    }

    pub fn load(path: &Path, pool: BlockingPool) -> Result<Self, KnowledgeError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            KnowledgeError::Decode(format!("cannot read {}: {e}", path.display()))
        })?;
        let graph = Self::from_json(&json, pool)?;
        debug!(path = %path.display(), nodes = graph.node_count(), "Loaded knowledge snapshot");
        Ok(graph)
    }

    /// Number of embedded content nodes (Main, Section, SubSection).
    pub fn node_count(&self) -> usize {
        collect_nodes(&self.snapshot).len()
    }
}

/// Every content node with its embedding, Mains first, then Sections, then
/// SubSections.
fn collect_nodes(snapshot: &Snapshot) -> Vec<(NodePath, &[f32])> {
    let mut mains = Vec::new();
    let mut sections = Vec::new();
    let mut subsections = Vec::new();

    for (si, source) in snapshot.sources.iter().enumerate() {
        for (mi, main) in source.mains.iter().enumerate() {
            let base = NodePath {
                source: si,
                main: mi,
                section: None,
                subsection: None,
            };
            mains.push((base, main.embedding.as_slice()));
            for (ci, section) in main.sections.iter().enumerate() {
                let sec_path = NodePath {
                    section: Some(ci),
                    ..base
                };
                sections.push((sec_path, section.embedding.as_slice()));
                for (ki, sub) in section.subsections.iter().enumerate() {
                    let sub_path = NodePath {
                        subsection: Some(ki),
                        ..sec_path
                    };
                    subsections.push((sub_path, sub.embedding.as_slice()));
                }
            }
        }
    }

    mains.extend(sections);
    mains.extend(subsections);
    mains
}

/// Cosine similarity, accumulated in f64. `None` when the vectors cannot be
/// compared (length mismatch, empty, zero norm).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return None;
    }

    let score = (dot / denom) as f32;
    score.is_finite().then_some(score)
}

fn rank_snapshot(snapshot: &Snapshot, query: &[f32], top_k: usize) -> Vec<MatchedNode> {
    let mut scored: Vec<MatchedNode> = collect_nodes(snapshot)
        .into_iter()
        .filter_map(|(path, embedding)| {
            cosine_similarity(embedding, query).map(|score| MatchedNode {
                kind: path.kind(),
                element_id: path.element_id(),
                score,
            })
        })
        .collect();

    // Stable: ties keep Main-before-Section-before-SubSection order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    scored
}

fn page_for(snapshot: &Snapshot, path: NodePath) -> Option<Page> {
    let source = snapshot.sources.get(path.source)?;
    let main = source.mains.get(path.main)?;

    if let Some(ci) = path.section {
        let section = main.sections.get(ci)?;
        if let Some(ki) = path.subsection {
            section.subsections.get(ki)?;
        }
    }

    Some(Page {
        source_url: Some(source.url.clone()),
        main_title: main.title.clone(),
        main_text: main.text.clone(),
        sections: main
            .sections
            .iter()
            .map(|s| SectionEntry {
                section_title: s.title.clone(),
                section_text: s.text.clone(),
                subsections: s
                    .subsections
                    .iter()
                    .map(|sub| SubsectionEntry {
                        title: sub.title.clone(),
                        text: sub.text.clone(),
                    })
                    .collect(),
            })
            .collect(),
    })
}

#[async_trait]
impl KnowledgeGraph for InMemoryGraph {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn rank(&self, embedding: &[f32], top_k: usize) -> Result<Vec<MatchedNode>, KnowledgeError> {
        let snapshot = Arc::clone(&self.snapshot);
        let query = embedding.to_vec();
        self.pool
            .run(move || rank_snapshot(&snapshot, &query, top_k))
            .await
            .map_err(|e| KnowledgeError::Worker(e.to_string()))
    }

    async fn expand(&self, node: &MatchedNode) -> Result<Option<Page>, KnowledgeError> {
        let Some(path) = NodePath::parse(&node.element_id) else {
            debug!(element_id = %node.element_id, "Unknown element id");
            return Ok(None);
        };
        if path.kind() != node.kind {
            return Ok(None);
        }
        Ok(page_for(&self.snapshot, path))
    }
}
