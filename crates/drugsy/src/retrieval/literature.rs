use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::errors::{ToolError, ToolResult};

/// One candidate article from the literature index.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// PubMed identifier
    pub id: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    /// PubMed Central identifier, when full text is available there
    pub pmc_id: Option<String>,
}

/// External literature index contract.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Search for up to `max` candidate articles. A completely unreachable
    /// index is a `ToolError::Retrieval`; an empty result list is not.
    async fn search(&self, query: &str, max: usize) -> ToolResult<Vec<Article>>;

    /// Try to resolve the article's full text. `Ok(None)` means the article
    /// only has its abstract — the caller falls back accordingly.
    async fn full_text(&self, article: &Article) -> ToolResult<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct PubMedConfig {
    pub host: String,
    /// Identifies this client to NCBI, per their usage policy
    pub tool: String,
    pub email: Option<String>,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        PubMedConfig {
            host: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            tool: "drugsy".to_string(),
            email: None,
        }
    }
}

/// NCBI E-utilities client: esearch for ids, esummary for metadata, efetch
/// for abstracts and PMC full text.
pub struct PubMedClient {
    client: Client,
    config: PubMedConfig,
}

impl PubMedClient {
    pub fn new(config: PubMedConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, config })
    }

    fn base_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("tool".to_string(), self.config.tool.clone())];
        if let Some(email) = &self.config.email {
            params.push(("email".to_string(), email.clone()));
        }
        params
    }

    async fn get_json(&self, endpoint: &str, params: &[(String, String)]) -> ToolResult<Value> {
        let url = format!("{}/{}", self.config.host.trim_end_matches('/'), endpoint);
        let response = self
            .client
            .get(&url)
            .query(&self.base_params())
            .query(params)
            .send()
            .await
            .map_err(|e| ToolError::Retrieval(format!("PubMed unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(ToolError::Retrieval(format!(
                "PubMed returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ToolError::Retrieval(format!("PubMed response unreadable: {}", e)))
    }

    async fn get_text(&self, endpoint: &str, params: &[(String, String)]) -> ToolResult<String> {
        let url = format!("{}/{}", self.config.host.trim_end_matches('/'), endpoint);
        let response = self
            .client
            .get(&url)
            .query(&self.base_params())
            .query(params)
            .send()
            .await
            .map_err(|e| ToolError::Retrieval(format!("PubMed unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(ToolError::Retrieval(format!(
                "PubMed returned {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| ToolError::Retrieval(format!("PubMed response unreadable: {}", e)))
    }

    /// Pull the per-article abstracts out of a combined efetch XML payload.
    fn abstracts_by_pmid(xml: &str) -> Vec<(String, String)> {
        let article_re =
            Regex::new(r"(?s)<PubmedArticle>.*?</PubmedArticle>").expect("static regex");
        let pmid_re = Regex::new(r"<PMID[^>]*>(\d+)</PMID>").expect("static regex");
        let abstract_re =
            Regex::new(r"(?s)<AbstractText[^>]*>(.*?)</AbstractText>").expect("static regex");

        let mut result = Vec::new();
        for block in article_re.find_iter(xml) {
            let block = block.as_str();
            let Some(pmid) = pmid_re
                .captures(block)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
            else {
                continue;
            };
            let sections: Vec<String> = abstract_re
                .captures_iter(block)
                .filter_map(|c| c.get(1))
                .map(|m| strip_tags(m.as_str()))
                .collect();
            if !sections.is_empty() {
                result.push((pmid, sections.join(" ")));
            }
        }
        result
    }
}

/// Remove XML markup and collapse the whitespace it leaves behind.
fn strip_tags(xml: &str) -> String {
    let tag_re = Regex::new(r"<[^>]+>").expect("static regex");
    let cleaned = tag_re.replace_all(xml, " ");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_year(pubdate: &str) -> Option<i32> {
    let year_re = Regex::new(r"\b(\d{4})\b").expect("static regex");
    year_re
        .captures(pubdate)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[async_trait]
impl LiteratureSource for PubMedClient {
    async fn search(&self, query: &str, max: usize) -> ToolResult<Vec<Article>> {
        let search = self
            .get_json(
                "esearch.fcgi",
                &[
                    ("db".to_string(), "pubmed".to_string()),
                    ("term".to_string(), query.to_string()),
                    ("retmode".to_string(), "json".to_string()),
                    ("retmax".to_string(), max.to_string()),
                ],
            )
            .await?;

        let id_list: Vec<String> = search["esearchresult"]["idlist"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        if id_list.is_empty() {
            return Ok(Vec::new());
        }
        let joined_ids = id_list.join(",");

        // Metadata and abstracts degrade per-article: a failed lookup loses
        // detail for those articles, not the whole search.
        let summaries = match self
            .get_json(
                "esummary.fcgi",
                &[
                    ("db".to_string(), "pubmed".to_string()),
                    ("id".to_string(), joined_ids.clone()),
                    ("retmode".to_string(), "json".to_string()),
                ],
            )
            .await
        {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "PubMed summary lookup failed");
                Value::Null
            }
        };

        let abstracts = match self
            .get_text(
                "efetch.fcgi",
                &[
                    ("db".to_string(), "pubmed".to_string()),
                    ("id".to_string(), joined_ids),
                    ("retmode".to_string(), "xml".to_string()),
                    ("rettype".to_string(), "abstract".to_string()),
                ],
            )
            .await
        {
            Ok(xml) => Self::abstracts_by_pmid(&xml),
            Err(e) => {
                tracing::warn!(error = %e, "PubMed abstract fetch failed");
                Vec::new()
            }
        };

        let articles = id_list
            .into_iter()
            .map(|id| {
                let summary = &summaries["result"][&id];
                let title = summary["title"]
                    .as_str()
                    .unwrap_or("No title available")
                    .to_string();
                let year = summary["pubdate"].as_str().and_then(parse_year);
                let venue = summary["fulljournalname"].as_str().map(String::from);
                let pmc_id = summary["articleids"].as_array().and_then(|ids| {
                    ids.iter()
                        .find(|entry| entry["idtype"] == "pmc")
                        .and_then(|entry| entry["value"].as_str())
                        .map(String::from)
                });
                let abstract_text = abstracts
                    .iter()
                    .find(|(pmid, _)| *pmid == id)
                    .map(|(_, text)| text.clone());
                Article {
                    id,
                    title,
                    abstract_text,
                    year,
                    venue,
                    pmc_id,
                }
            })
            .collect();

        Ok(articles)
    }

    async fn full_text(&self, article: &Article) -> ToolResult<Option<String>> {
        let Some(pmc_id) = &article.pmc_id else {
            return Ok(None);
        };

        let xml = match self
            .get_text(
                "efetch.fcgi",
                &[
                    ("db".to_string(), "pmc".to_string()),
                    ("id".to_string(), pmc_id.clone()),
                    ("retmode".to_string(), "xml".to_string()),
                ],
            )
            .await
        {
            Ok(xml) => xml,
            Err(e) => {
                tracing::warn!(article = %article.id, error = %e, "full text resolution failed");
                return Ok(None);
            }
        };

        let text = strip_tags(&xml);
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}
