#![allow(dead_code)]

//! Catalog Loader — flattens job nodes of the attributed catalog graph into `JobRecord`s.
//!
//! The graph arrives as node-link JSON (`{"nodes": [...], "links": [...]}`).
//! Malformed job nodes degrade to empty-string fields instead of failing the load.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::matching::error::CatalogError;
use crate::matching::normalize::split_skills;

// ────────────────────────────────────────────────────────────────────────────
// Graph input
// ────────────────────────────────────────────────────────────────────────────

/// Attributed catalog graph in node-link form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default, alias = "edges")]
    pub links: Vec<GraphLink>,
}

/// A graph node: an id plus free-form attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(default)]
    pub id: Value,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

/// A directed edge between two node ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: Value,
    pub target: Value,
}

impl GraphNode {
    pub fn id_string(&self) -> String {
        value_to_string(&self.id)
    }

    /// Attribute as a trimmed string; missing or null yields "".
    pub fn attr(&self, key: &str) -> String {
        self.attrs
            .get(key)
            .map(value_to_string)
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    /// First non-empty attribute among `keys`.
    fn first_attr(&self, keys: &[&str]) -> String {
        keys.iter()
            .map(|k| self.attr(k))
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    }

    fn is_type(&self, node_type: &str) -> bool {
        self.attr("type").eq_ignore_ascii_case(node_type)
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Job records
// ────────────────────────────────────────────────────────────────────────────

/// One job posting. Immutable once loaded; identity is the graph node id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub skills_raw: String,
    pub job_type: String,
    pub level: String,
    pub first_seen: String,
    pub link: String,
    #[serde(skip)]
    skills: OnceLock<Vec<String>>,
}

impl JobRecord {
    /// Normalized, ordered-unique skills parsed from `skills_raw`. Computed once.
    pub fn skills(&self) -> &[String] {
        self.skills.get_or_init(|| split_skills(&self.skills_raw))
    }
}

/// Extracts every job node of `graph` in node order. Never fails.
pub fn load_catalog(graph: &CatalogGraph) -> Vec<JobRecord> {
    let nodes_by_id: HashMap<String, &GraphNode> = graph
        .nodes
        .iter()
        .map(|n| (n.id_string(), n))
        .collect();

    let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();
    for link in &graph.links {
        outgoing
            .entry(value_to_string(&link.source))
            .or_default()
            .push(value_to_string(&link.target));
    }

    graph
        .nodes
        .iter()
        .filter(|node| node.is_type("job"))
        .map(|node| {
            let id = node.id_string();
            let mut skills_raw = node.first_attr(&["skills_raw", "skills"]);
            if skills_raw.is_empty() {
                skills_raw = linked_skills(&id, &outgoing, &nodes_by_id);
            }
            JobRecord {
                title: node.first_attr(&["job_title", "title", "label"]),
                company: node.attr("company"),
                location: job_location(node),
                skills_raw,
                job_type: node.attr("job_type"),
                level: node.first_attr(&["job_level", "level"]),
                first_seen: node.first_attr(&["first_seen", "date"]),
                link: node.first_attr(&["job_link", "link"]),
                id,
                skills: OnceLock::new(),
            }
        })
        .collect()
}

fn job_location(node: &GraphNode) -> String {
    let direct = node.first_attr(&["job_location", "location"]);
    if !direct.is_empty() {
        return direct;
    }
    [node.attr("search_city"), node.attr("search_country")]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Comma-joined labels of skill nodes linked from `job_id`, in link order.
fn linked_skills(
    job_id: &str,
    outgoing: &HashMap<String, Vec<String>>,
    nodes_by_id: &HashMap<String, &GraphNode>,
) -> String {
    let Some(targets) = outgoing.get(job_id) else {
        return String::new();
    };
    targets
        .iter()
        .filter_map(|t| nodes_by_id.get(t))
        .filter(|n| n.is_type("skill"))
        .map(|n| {
            let label = n.attr("label");
            if label.is_empty() {
                n.id_string()
            } else {
                label
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// ────────────────────────────────────────────────────────────────────────────
// Catalog
// ────────────────────────────────────────────────────────────────────────────

/// The job catalog for one process lifetime.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    jobs: Vec<JobRecord>,
}

impl Catalog {
    /// Reads a node-link JSON graph from disk.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let graph: CatalogGraph = serde_json::from_str(&raw)?;
        let catalog = Self::from_graph(&graph)?;
        info!(
            "Catalog loaded from {} ({} nodes, {} links, {} jobs)",
            path.display(),
            graph.nodes.len(),
            graph.links.len(),
            catalog.len()
        );
        Ok(catalog)
    }

    pub fn from_graph(graph: &CatalogGraph) -> Result<Self, CatalogError> {
        let jobs = load_catalog(graph);
        if jobs.is_empty() {
            return Err(CatalogError::NoJobNodes);
        }
        Ok(Self { jobs })
    }

    pub fn jobs(&self) -> &[JobRecord] {
        &self.jobs
    }

    pub fn get(&self, id: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
impl JobRecord {
    /// Minimal record for tests: id, title, comma-joined skills, location.
    pub fn fixture(id: &str, title: &str, skills_raw: &str, location: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            skills_raw: skills_raw.to_string(),
            location: location.to_string(),
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }
}

#[cfg(test)]
impl Catalog {
    pub fn from_jobs(jobs: Vec<JobRecord>) -> Self {
        Self { jobs }
    }
}
