use serde::{Deserialize, Serialize};

use super::literature::Article;

/// Whether a chunk came from a fully resolved article or only its abstract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    FullText,
    AbstractOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_title: String,
    pub source_year: Option<i32>,
    pub provenance: Provenance,
}

/// One overlapping segment of an article, the unit stored in the per-query
/// vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub source_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Window size in whitespace tokens
    pub chunk_tokens: usize,
    /// Tokens shared between consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            chunk_tokens: 500,
            chunk_overlap: 50,
        }
    }
}

/// Split an article into overlapping windows.
///
/// The chunked body is title + venue + year + abstract (+ full text). An
/// article with neither abstract nor full text yields no chunks and is
/// thereby dropped from the pipeline.
pub fn chunk_document(
    article: &Article,
    full_text: Option<&str>,
    config: &ChunkConfig,
) -> Vec<DocumentChunk> {
    if article.abstract_text.is_none() && full_text.is_none() {
        return Vec::new();
    }

    let mut body = article.title.clone();
    if let Some(venue) = &article.venue {
        body.push_str(&format!(" {}.", venue));
    }
    if let Some(year) = article.year {
        body.push_str(&format!(" {}.", year));
    }
    if let Some(abstract_text) = &article.abstract_text {
        body.push(' ');
        body.push_str(abstract_text);
    }
    if let Some(full) = full_text {
        body.push(' ');
        body.push_str(full);
    }

    let metadata = ChunkMetadata {
        source_title: article.title.clone(),
        source_year: article.year,
        provenance: if full_text.is_some() {
            Provenance::FullText
        } else {
            Provenance::AbstractOnly
        },
    };

    let tokens: Vec<&str> = body.split_whitespace().collect();
    // An overlap >= window would never advance
    let step = config.chunk_tokens.saturating_sub(config.chunk_overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + config.chunk_tokens).min(tokens.len());
        chunks.push(DocumentChunk {
            id: format!("{}#{}", article.id, chunks.len()),
            source_id: article.id.clone(),
            text: tokens[start..end].join(" "),
            metadata: metadata.clone(),
        });
        if end == tokens.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(abstract_text: Option<&str>) -> Article {
        Article {
            id: "111".into(),
            title: "Ibuprofen and food".into(),
            abstract_text: abstract_text.map(String::from),
            year: Some(2019),
            venue: Some("J Clin Pharm".into()),
            pmc_id: None,
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn drops_articles_with_no_text_at_all() {
        let chunks = chunk_document(&article(None), None, &ChunkConfig::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_article_is_a_single_chunk() {
        let chunks = chunk_document(
            &article(Some("Food delays absorption.")),
            None,
            &ChunkConfig::default(),
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "111#0");
        assert_eq!(chunks[0].source_id, "111");
        assert!(chunks[0].text.contains("Ibuprofen and food"));
        assert!(chunks[0].text.contains("2019"));
        assert_eq!(chunks[0].metadata.provenance, Provenance::AbstractOnly);
    }

    #[test]
    fn long_body_produces_overlapping_windows() {
        let config = ChunkConfig {
            chunk_tokens: 100,
            chunk_overlap: 20,
        };
        let body = words(250);
        let chunks = chunk_document(&article(Some(&body)), None, &config);

        // 257 tokens total (title/venue/year prefix included), step 80
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.text.split_whitespace().count() <= 100);
        }
        // Consecutive windows share their boundary tokens
        let first: Vec<&str> = chunks[0].text.split_whitespace().collect();
        let second: Vec<&str> = chunks[1].text.split_whitespace().collect();
        assert_eq!(&first[80..100], &second[0..20]);
    }

    #[test]
    fn full_text_marks_provenance() {
        let chunks = chunk_document(
            &article(Some("abstract")),
            Some("the full study body"),
            &ChunkConfig::default(),
        );
        assert_eq!(chunks[0].metadata.provenance, Provenance::FullText);
        assert!(chunks[0].text.contains("the full study body"));
    }

    #[test]
    fn pathological_overlap_still_terminates() {
        let config = ChunkConfig {
            chunk_tokens: 10,
            chunk_overlap: 10,
        };
        let body = words(50);
        let chunks = chunk_document(&article(Some(&body)), None, &config);
        assert!(!chunks.is_empty());
        assert!(chunks.len() <= 60);
    }
}
