//! Tavily web-search client.
//!
//! Tavily wants the API key inside the JSON body rather than a header.
//! Searches are scoped to pharma-relevant domains and the query is
//! suffixed with domain terms to keep results on topic.

use serde::{Deserialize, Serialize};

use crate::{LlmError, Result};

const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Domains worth searching for pharma intelligence.
const PHARMA_DOMAINS: &[&str] = &[
    "fda.gov",
    "clinicaltrials.gov",
    "ema.europa.eu",
    "fiercepharma.com",
    "pharmaceutical-technology.com",
    "drugs.com",
    "biopharmadive.com",
];

/// Appended to every search to bias results toward drug development.
const QUERY_SUFFIX: &str = "pharmaceutical drug development clinical trial";

/// One search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// Tavily API client.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl TavilyClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Search the web. `Ok(None)` when no API key is configured.
    pub async fn search(&self, query: &str) -> Result<Option<Vec<WebResult>>> {
        #[derive(Serialize)]
        struct SearchRequest<'a> {
            api_key: &'a str,
            query: String,
            search_depth: &'a str,
            max_results: u32,
            include_domains: &'a [&'a str],
        }

        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            results: Vec<WebResult>,
        }

        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(None);
        };

        let response = self
            .http
            .post(TAVILY_URL)
            .json(&SearchRequest {
                api_key,
                query: enhance_query(query),
                search_depth: "advanced",
                max_results: 5,
                include_domains: PHARMA_DOMAINS,
            })
            .send()
            .await?
            .error_for_status()
            .map_err(LlmError::Http)?
            .json::<SearchResponse>()
            .await?;

        Ok(Some(response.results))
    }
}

/// Bias a raw query toward pharma results.
fn enhance_query(query: &str) -> String {
    let lower = query.to_lowercase();
    if lower.contains("pharmaceutical") || lower.contains("clinical trial") {
        query.to_string()
    } else {
        format!("{query} {QUERY_SUFFIX}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_without_key_is_none() {
        let client = TavilyClient::new(None);
        let results = client.search("metformin oncology").await.unwrap();
        assert!(results.is_none());
    }

    #[test]
    fn enhance_appends_domain_terms_once() {
        let enhanced = enhance_query("metformin repurposing");
        assert!(enhanced.ends_with(QUERY_SUFFIX));

        let already = enhance_query("metformin clinical trial updates");
        assert_eq!(already, "metformin clinical trial updates");
    }
}
