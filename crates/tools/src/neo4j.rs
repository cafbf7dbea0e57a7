//! Neo4j knowledge graph over the HTTP transactional endpoint.
//!
//! Every query is a single auto-commit transaction:
//! `POST {base}/db/{database}/tx/commit` with basic auth and a body of
//! `{"statements": [{"statement": ..., "parameters": {...}}]}`. Rows come
//! back positionally under `results[0].data[*].row`.

use async_trait::async_trait;
use hsxassist_core::error::KnowledgeError;
use hsxassist_core::knowledge::{
    KnowledgeGraph, MatchedNode, NodeKind, Page, SectionEntry, SubsectionEntry,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Joint ranking across the three content kinds. Main nodes come first in
/// the collected list, then Sections, then SubSections; equal scores keep
/// whatever order the database returns.
const RANK_QUERY: &str = "
MATCH (m:Main)
WITH collect({type:'Main', element_id: elementId(m), score: gds.similarity.cosine(m.embedding, $vec)}) AS main_nodes
MATCH (s:Section)
WITH main_nodes, collect({type:'Section', element_id: elementId(s), score: gds.similarity.cosine(s.embedding, $vec)}) AS section_nodes
WITH main_nodes + section_nodes AS combined_nodes
MATCH (ss:SubSection)
WITH combined_nodes, collect({type:'SubSection', element_id: elementId(ss), score: gds.similarity.cosine(ss.embedding, $vec)}) AS sub_nodes
WITH combined_nodes + sub_nodes AS all_nodes
UNWIND all_nodes AS n
WITH n WHERE n.score IS NOT NULL
RETURN n.type AS type, n.element_id AS element_id, n.score AS score
ORDER BY n.score DESC
LIMIT $top_k
";

const EXPAND_FROM_MAIN: &str = "
MATCH (src:Source)-[:HAS_MAIN]->(m:Main)
WHERE elementId(m) = $element_id
OPTIONAL MATCH (m)-[:HAS_SECTION]->(sec:Section)
OPTIONAL MATCH (sec)-[:HAS_SUBSECTION]->(sub:SubSection)
WITH src, m, sec, collect(DISTINCT {title: sub.title, text: sub.text}) AS subsections
RETURN src.url AS source_url,
       m.title AS main_title,
       m.text AS main_text,
       collect(DISTINCT {section_title: sec.title, section_text: sec.text, subsections: subsections}) AS sections
";

const EXPAND_FROM_SECTION: &str = "
MATCH (m:Main)-[:HAS_SECTION]->(sec:Section)
WHERE elementId(sec) = $element_id
MATCH (src:Source)-[:HAS_MAIN]->(m)
OPTIONAL MATCH (m)-[:HAS_SECTION]->(s:Section)
OPTIONAL MATCH (s)-[:HAS_SUBSECTION]->(sub:SubSection)
WITH src, m, s, collect(DISTINCT {title: sub.title, text: sub.text}) AS subsections
RETURN src.url AS source_url,
       m.title AS main_title,
       m.text AS main_text,
       collect(DISTINCT {section_title: s.title, section_text: s.text, subsections: subsections}) AS sections
";

const EXPAND_FROM_SUBSECTION: &str = "
MATCH (m:Main)-[:HAS_SECTION]->(s:Section)-[:HAS_SUBSECTION]->(sub:SubSection)
WHERE elementId(sub) = $element_id
MATCH (src:Source)-[:HAS_MAIN]->(m)
OPTIONAL MATCH (m)-[:HAS_SECTION]->(sec:Section)
OPTIONAL MATCH (sec)-[:HAS_SUBSECTION]->(ss:SubSection)
WITH src, m, sec, collect(DISTINCT {title: ss.title, text: ss.text}) AS subsections
RETURN src.url AS source_url,
       m.title AS main_title,
       m.text AS main_text,
       collect(DISTINCT {section_title: sec.title, section_text: sec.text, subsections: subsections}) AS sections
";

fn expand_query(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Main => EXPAND_FROM_MAIN,
        NodeKind::Section => EXPAND_FROM_SECTION,
        NodeKind::SubSection => EXPAND_FROM_SUBSECTION,
    }
}

/// A Neo4j database reached over HTTP.
pub struct Neo4jGraph {
    commit_url: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for Neo4jGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jGraph")
            .field("commit_url", &self.commit_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Neo4jGraph {
    pub fn new(
        uri: &str,
        database: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, KnowledgeError> {
        let base = http_base(uri)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| KnowledgeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            commit_url: format!("{base}/db/{database}/tx/commit"),
            username,
            password,
            client,
        })
    }

    pub fn commit_url(&self) -> &str {
        &self.commit_url
    }

    /// Run one statement and return its rows.
    async fn run(&self, statement: &str, parameters: Value) -> Result<Vec<Vec<Value>>, KnowledgeError> {
        let body = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });

        let mut request = self
            .client
            .post(&self.commit_url)
            .header("Accept", "application/json;charset=UTF-8")
            .json(&body);
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| KnowledgeError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Neo4j returned error");
            return Err(KnowledgeError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let tx: TxResponse = response
            .json()
            .await
            .map_err(|e| KnowledgeError::Decode(format!("transaction response: {e}")))?;

        tx.into_rows()
    }
}

#[async_trait]
impl KnowledgeGraph for Neo4jGraph {
    fn name(&self) -> &str {
        "neo4j"
    }

    async fn rank(&self, embedding: &[f32], top_k: usize) -> Result<Vec<MatchedNode>, KnowledgeError> {
        let rows = self
            .run(RANK_QUERY, json!({ "vec": embedding, "top_k": top_k }))
            .await?;
        debug!(rows = rows.len(), top_k, "Ranked knowledge nodes");

        let mut matched = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(node) = matched_from_row(&row)? {
                matched.push(node);
            }
        }
        Ok(matched)
    }

    async fn expand(&self, node: &MatchedNode) -> Result<Option<Page>, KnowledgeError> {
        let rows = self
            .run(expand_query(node.kind), json!({ "element_id": node.element_id }))
            .await?;

        match rows.into_iter().next() {
            Some(row) => page_from_row(row).map(Some),
            None => Ok(None),
        }
    }
}

/// Translate a driver-style URI into the HTTP API base.
///
/// `neo4j+s://` and `neo4j+ssc://` become `https://`; `neo4j://` and
/// `bolt://` become `http://`, with the default Bolt port 7687 swapped for
/// the HTTP port 7474.
pub fn http_base(uri: &str) -> Result<String, KnowledgeError> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| KnowledgeError::Network(format!("graph uri has no scheme: {uri}")))?;
    let rest = rest.trim_end_matches('/');

    let http_scheme = match scheme {
        "http" | "https" => return Ok(format!("{scheme}://{rest}")),
        "neo4j+s" | "neo4j+ssc" | "bolt+s" | "bolt+ssc" => "https",
        "neo4j" | "bolt" => "http",
        other => {
            return Err(KnowledgeError::Network(format!(
                "unsupported graph uri scheme: {other}"
            )));
        }
    };

    let host = match rest.strip_suffix(":7687") {
        Some(host) if http_scheme == "http" => format!("{host}:7474"),
        Some(host) => host.to_string(),
        None => rest.to_string(),
    };
    Ok(format!("{http_scheme}://{host}"))
}

// --- Transactional API types ---

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

impl TxResponse {
    fn into_rows(self) -> Result<Vec<Vec<Value>>, KnowledgeError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(KnowledgeError::Query {
                code: err.code,
                message: err.message,
            });
        }
        Ok(self
            .results
            .into_iter()
            .next()
            .map(|r| r.data.into_iter().map(|d| d.row).collect())
            .unwrap_or_default())
    }
}

/// `[type, element_id, score]`. Rows with a null score (node without an
/// embedding) are dropped.
fn matched_from_row(row: &[Value]) -> Result<Option<MatchedNode>, KnowledgeError> {
    let [kind, element_id, score] = row else {
        return Err(KnowledgeError::Decode(format!(
            "ranking row has {} columns, expected 3",
            row.len()
        )));
    };

    let kind = kind
        .as_str()
        .and_then(NodeKind::parse)
        .ok_or_else(|| KnowledgeError::Decode(format!("unknown node type {kind}")))?;
    let element_id = element_id
        .as_str()
        .ok_or_else(|| KnowledgeError::Decode("element_id is not a string".into()))?
        .to_string();

    let Some(score) = score.as_f64() else {
        debug!(%element_id, "Skipping node without a similarity score");
        return Ok(None);
    };

    Ok(Some(MatchedNode {
        kind,
        element_id,
        score: score as f32,
    }))
}

#[derive(Debug, Deserialize)]
struct RawSection {
    section_title: Option<String>,
    section_text: Option<String>,
    #[serde(default)]
    subsections: Vec<SubsectionEntry>,
}

/// `[source_url, main_title, main_text, sections]`.
///
/// OPTIONAL MATCH misses surface as all-null maps; those are removed so a
/// Main with no sections yields `sections: []`.
fn page_from_row(row: Vec<Value>) -> Result<Page, KnowledgeError> {
    let [source_url, main_title, main_text, sections]: [Value; 4] =
        row.try_into().map_err(|row: Vec<Value>| {
            KnowledgeError::Decode(format!("page row has {} columns, expected 4", row.len()))
        })?;

    let text = |v: Value| -> Option<String> { v.as_str().map(str::to_string) };
    let sections: Vec<RawSection> = serde_json::from_value(sections)
        .map_err(|e| KnowledgeError::Decode(format!("sections: {e}")))?;

    let sections = sections
        .into_iter()
        .map(|s| SectionEntry {
            section_title: s.section_title,
            section_text: s.section_text,
            subsections: s
                .subsections
                .into_iter()
                .filter(|sub| sub.title.is_some() || sub.text.is_some())
                .collect(),
        })
        .filter(|s| s.section_title.is_some() || s.section_text.is_some() || !s.subsections.is_empty())
        .collect();

    Ok(Page {
        source_url: text(source_url),
        main_title: text(main_title),
        main_text: text(main_text),
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aura_uri_maps_to_https() {
        assert_eq!(
            http_base("neo4j+s://abcd1234.databases.neo4j.io").unwrap(),
            "https://abcd1234.databases.neo4j.io"
        );
    }

    #[test]
    fn bolt_port_maps_to_http_port() {
        assert_eq!(http_base("bolt://localhost:7687").unwrap(), "http://localhost:7474");
        assert_eq!(http_base("neo4j://db.internal:7474/").unwrap(), "http://db.internal:7474");
        assert_eq!(http_base("http://localhost:7474").unwrap(), "http://localhost:7474");
    }

    #[test]
    fn unknown_scheme_rejected() {
        assert!(http_base("ftp://example.com").is_err());
        assert!(http_base("localhost:7474").is_err());
    }

    #[test]
    fn commit_url_includes_database() {
        let graph = Neo4jGraph::new("neo4j+s://x.databases.neo4j.io", "neo4j", None, None).unwrap();
        assert_eq!(graph.commit_url(), "https://x.databases.neo4j.io/db/neo4j/tx/commit");
    }

    #[test]
    fn every_kind_has_an_expand_query() {
        assert!(expand_query(NodeKind::Main).contains("elementId(m) = $element_id"));
        assert!(expand_query(NodeKind::Section).contains("elementId(sec) = $element_id"));
        assert!(expand_query(NodeKind::SubSection).contains("elementId(sub) = $element_id"));
        assert!(RANK_QUERY.contains("LIMIT $top_k"));
    }

    #[test]
    fn unembedded_nodes_do_not_take_ranking_slots() {
        // Cypher sorts null first under DESC, so nulls must go before the LIMIT
        let filter = RANK_QUERY.find("n.score IS NOT NULL").unwrap();
        assert!(filter < RANK_QUERY.find("ORDER BY").unwrap());
        assert!(filter < RANK_QUERY.find("LIMIT").unwrap());
    }

    #[test]
    fn tx_errors_become_query_errors() {
        let body = r#"{"results":[],"errors":[{"code":"Neo.ClientError.Procedure.ProcedureNotFound","message":"Unknown function 'gds.similarity.cosine'"}]}"#;
        let tx: TxResponse = serde_json::from_str(body).unwrap();
        match tx.into_rows() {
            Err(KnowledgeError::Query { code, .. }) => assert!(code.contains("ProcedureNotFound")),
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[test]
    fn ranking_rows_decode() {
        let body = r#"{"results":[{"columns":["type","element_id","score"],"data":[
            {"row":["SubSection","4:abc:17",0.91],"meta":[]},
            {"row":["Main","4:abc:2",0.88],"meta":[]},
            {"row":["Section","4:abc:9",null],"meta":[]}
        ]}],"errors":[]}"#;
        let rows = serde_json::from_str::<TxResponse>(body).unwrap().into_rows().unwrap();
        let matched: Vec<MatchedNode> = rows
            .iter()
            .filter_map(|r| matched_from_row(r).unwrap())
            .collect();
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].kind, NodeKind::SubSection);
        assert_eq!(matched[0].element_id, "4:abc:17");
        assert!((matched[1].score - 0.88).abs() < 1e-6);
    }

    #[test]
    fn malformed_ranking_row_is_decode_error() {
        let row = vec![json!("Main"), json!("4:abc:2")];
        assert!(matches!(matched_from_row(&row), Err(KnowledgeError::Decode(_))));
        let row = vec![json!("Chapter"), json!("4:abc:2"), json!(0.5)];
        assert!(matched_from_row(&row).is_err());
    }

    #[test]
    fn page_row_drops_optional_match_nulls() {
        let row = vec![
            json!("https://www.odoo.com/documentation/17.0/applications/finance/accounting.html"),
            json!("Accounting"),
            json!("Odoo Accounting overview"),
            json!([
                {
                    "section_title": "Taxes",
                    "section_text": "Tax configuration",
                    "subsections": [
                        {"title": "Withholding tax", "text": "WHT is deducted at source"},
                        {"title": null, "text": null}
                    ]
                },
                {
                    "section_title": null,
                    "section_text": null,
                    "subsections": [{"title": null, "text": null}]
                }
            ]),
        ];

        let page = page_from_row(row).unwrap();
        assert_eq!(page.main_title.as_deref(), Some("Accounting"));
        assert_eq!(page.sections.len(), 1);
        assert_eq!(page.sections[0].subsections.len(), 1);
        assert_eq!(page.sections[0].subsections[0].title.as_deref(), Some("Withholding tax"));
    }

    #[test]
    fn main_without_sections_has_empty_list() {
        let row = vec![
            json!("https://hsxtech.net/services"),
            json!("Services"),
            json!(null),
            json!([{"section_title": null, "section_text": null, "subsections": [{"title": null, "text": null}]}]),
        ];
        let page = page_from_row(row).unwrap();
        assert!(page.sections.is_empty());
        assert!(page.main_text.is_none());
    }
}
