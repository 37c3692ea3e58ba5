//! Query-time retrieval aggregation.
//!
//! Every live collection is searched for the top-K chunks most similar
//! to the query; results are merged in fixed collection order with no
//! cross-collection reranking, capped, and assembled into one context
//! block for the generation step. Zero hits across all collections
//! yields [`ContextBlock::Empty`], never an empty string — the caller
//! must answer with the contact-channel fallback instead of forwarding
//! nothing to the model.

use anyhow::Result;

use crate::collections::{spec_for, Category};
use crate::embedding::embed_query;
use crate::knowledge::KnowledgeBase;
use crate::models::SearchHit;

/// Assembled retrieval context, or the explicit absence of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextBlock {
    Found(String),
    Empty,
}

/// Search every live collection and assemble the context block.
pub async fn build_context(kb: &KnowledgeBase, query: &str) -> Result<ContextBlock> {
    let live = kb.live_categories();
    if live.is_empty() {
        return Ok(ContextBlock::Empty);
    }

    let query_vec = embed_query(kb.embedder(), query).await?;
    let k = kb.config().retrieval.per_collection_k;

    let mut merged: Vec<(Category, SearchHit)> = Vec::new();
    for category in Category::ALL {
        if !live.contains(&category) {
            continue;
        }
        let hits = kb
            .store()
            .similarity_search(spec_for(category).store_name, &query_vec, k)
            .await?;
        merged.extend(hits.into_iter().map(|hit| (category, hit)));
    }

    Ok(assemble(
        merged,
        kb.config().retrieval.merged_limit,
        &kb.config().knowledge.separator,
    ))
}

/// Cap the merged results and join them into one block, each chunk
/// prefixed with its collection key.
fn assemble(
    mut results: Vec<(Category, SearchHit)>,
    limit: usize,
    separator: &str,
) -> ContextBlock {
    if results.is_empty() {
        return ContextBlock::Empty;
    }
    results.truncate(limit);

    let parts: Vec<String> = results
        .iter()
        .map(|(category, hit)| {
            format!("[{}]\n{}", category.as_str().to_uppercase(), hit.text)
        })
        .collect();

    ContextBlock::Found(parts.join(separator))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str) -> SearchHit {
        SearchHit {
            text: text.to_string(),
            source: "test.txt".to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn zero_hits_yield_the_empty_sentinel() {
        assert_eq!(assemble(Vec::new(), 10, "\n\n---\n\n"), ContextBlock::Empty);
    }

    #[test]
    fn results_are_prefixed_and_joined() {
        let block = assemble(
            vec![
                (Category::Yatras, hit("Dates: 17th April")),
                (Category::Policies, hit("Refunds depend on vendors.")),
            ],
            10,
            "\n\n---\n\n",
        );
        let ContextBlock::Found(text) = block else {
            panic!("expected context");
        };
        assert!(text.starts_with("[YATRAS]\nDates: 17th April"));
        assert!(text.contains("\n\n---\n\n[POLICIES]\nRefunds depend on vendors."));
    }

    #[test]
    fn merged_results_are_capped() {
        let results: Vec<(Category, SearchHit)> = (0..15)
            .map(|i| (Category::Faqs, hit(&format!("chunk {}", i))))
            .collect();
        let ContextBlock::Found(text) = assemble(results, 10, "|") else {
            panic!("expected context");
        };
        assert_eq!(text.matches("[FAQS]").count(), 10);
        // The cap keeps the head of the merged list.
        assert!(text.contains("chunk 0"));
        assert!(!text.contains("chunk 10"));
    }
}
