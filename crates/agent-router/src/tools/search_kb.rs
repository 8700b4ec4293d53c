use std::sync::Arc;

use agent_router_core::tool::{Error as ToolError, Tool, ToolName, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::spawn_blocking;

use crate::kb::{ScoredEntry, SearchFilter, SearchIndex};

/// Number of results returned unless the model asks for another amount.
pub const DEFAULT_TOP_K: u32 = 5;

/// Upper bound on the number of results.
pub const MAX_TOP_K: u32 = 10;

/// Length of the content preview in each result.
pub const SNIPPET_CHARS: usize = 150;

#[derive(Clone, Copy, Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Customer,
    Internal,
}

impl Audience {
    fn as_str(self) -> &'static str {
        match self {
            Audience::Customer => "customer",
            Audience::Internal => "internal",
        }
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SearchKbFilters {
    #[schemars(
        description = "Only return entries with at least one of these tags, e.g. [\"pricing\"]."
    )]
    #[serde(default)]
    tags: Vec<String>,
    #[schemars(description = "Only return entries for this audience.")]
    audience: Option<Audience>,
}

impl From<SearchKbFilters> for SearchFilter {
    fn from(filters: SearchKbFilters) -> Self {
        SearchFilter {
            tags: filters.tags,
            audience: filters.audience.map(|a| a.as_str().to_owned()),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchKbParameters {
    #[schemars(description = "Keywords or a question to search for.")]
    query: String,
    #[schemars(description = "Maximum number of results to return.")]
    #[schemars(range(min = 1, max = 10))]
    #[serde(default = "default_top_k")]
    top_k: u32,
    #[schemars(description = "Optional filters applied before ranking.")]
    filters: Option<SearchKbFilters>,
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

#[derive(Debug, Serialize)]
struct SearchResult {
    id: String,
    title: String,
    score: f64,
    snippet: String,
    tags: Vec<String>,
}

impl From<ScoredEntry> for SearchResult {
    fn from(hit: ScoredEntry) -> Self {
        let snippet = snippet(&hit.entry.content);
        SearchResult {
            id: hit.entry.id,
            title: hit.entry.title,
            score: hit.score,
            snippet,
            tags: hit.entry.tags,
        }
    }
}

/// A tool for looking things up in the knowledge base.
pub struct SearchKbTool {
    index: Arc<dyn SearchIndex>,
    parameter_schema: Value,
}

impl SearchKbTool {
    /// Creates a new search tool over `index`.
    #[inline]
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        SearchKbTool {
            index,
            parameter_schema: schema_for!(SearchKbParameters).to_value(),
        }
    }
}

impl Tool for SearchKbTool {
    type Input = SearchKbParameters;

    fn name(&self) -> ToolName {
        ToolName::SearchKb
    }

    fn description(&self) -> &str {
        r#"
Searches the knowledge base for articles about products, pricing, policies and technical topics.
Returns the most relevant entries with a relevance score and a short snippet of their content."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: SearchKbParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let index = Arc::clone(&self.index);
        async move {
            let query = input.query.trim().to_owned();
            if query.is_empty() {
                return Err(ToolError::validation()
                    .with_reason("`query` must not be empty")
                    .with_field("query"));
            }
            let top_k = input.top_k.clamp(1, MAX_TOP_K) as usize;
            let filter: SearchFilter =
                input.filters.map(Into::into).unwrap_or_default();

            let hits = spawn_blocking(move || index.search(&query, &filter))
                .await
                .map_err(|_| {
                    ToolError::execution().with_reason("search crashed")
                })?
                .map_err(|err| {
                    error!("knowledge base search failed: {err}");
                    ToolError::execution().with_reason(err.to_string())
                })?;

            debug!("{} hit(s), keeping {top_k}", hits.len());
            let results: Vec<_> = hits
                .into_iter()
                .take(top_k)
                .map(SearchResult::from)
                .collect();
            Ok(json!({ "results": results }))
        }
    }
}

fn snippet(content: &str) -> String {
    match content.char_indices().nth(SNIPPET_CHARS) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::{KbEntry, KbError, rank};

    struct StaticIndex(Vec<KbEntry>);

    impl SearchIndex for StaticIndex {
        fn search(
            &self,
            query: &str,
            filter: &SearchFilter,
        ) -> Result<Vec<ScoredEntry>, KbError> {
            Ok(rank(&self.0, query, filter))
        }
    }

    fn tool() -> SearchKbTool {
        let entries = (1..=12)
            .map(|n| KbEntry {
                id: format!("kb-{n:03}"),
                title: format!("Pricing note {n}"),
                content: "x".repeat(200),
                tags: vec!["pricing".to_owned()],
                audience: Some(
                    if n % 2 == 0 { "internal" } else { "customer" }.to_owned(),
                ),
            })
            .collect();
        SearchKbTool::new(Arc::new(StaticIndex(entries)))
    }

    fn input(value: Value) -> SearchKbParameters {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_search() {
        let result = tool()
            .execute(input(json!({ "query": "pricing" })))
            .await
            .unwrap();
        let results = result["results"].as_array().unwrap();
        assert_eq!(results.len(), DEFAULT_TOP_K as usize);
        assert_eq!(results[0]["id"], "kb-001");
        assert_eq!(results[0]["tags"], json!(["pricing"]));

        let snippet = results[0]["snippet"].as_str().unwrap();
        assert_eq!(snippet.len(), SNIPPET_CHARS + 3);
        assert!(snippet.ends_with("..."));
    }

    #[tokio::test]
    async fn test_top_k_and_filters() {
        let result = tool()
            .execute(input(json!({
                "query": "pricing",
                "top_k": 10,
                "filters": { "audience": "internal" },
            })))
            .await
            .unwrap();
        let results = result["results"].as_array().unwrap();
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r["id"] != "kb-001"));
    }

    #[tokio::test]
    async fn test_blank_query() {
        let err = tool()
            .execute(input(json!({ "query": "   " })))
            .await
            .unwrap_err();
        assert_eq!(err.fields(), ["query"]);
    }

    #[test]
    fn test_schema() {
        let tool = tool();
        let schema = tool.parameter_schema();
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(
            schema["properties"]["top_k"]["maximum"].as_f64(),
            Some(10.0)
        );
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("short"), "short");
        let long = "é".repeat(SNIPPET_CHARS + 1);
        let cut = snippet(&long);
        assert_eq!(cut.chars().count(), SNIPPET_CHARS + 3);
    }
}
