//! Filename-to-collection routing.
//!
//! Every knowledge document is classified into exactly one collection by
//! an ordered list of rules, each of which may decline:
//!
//! 1. **Manual mapping** — a JSON file (`filename -> collection key`)
//!    maintained by operators; always wins when it names the file.
//! 2. **Keyword match** — collection keywords matched as substrings of
//!    the lowercased filename, in collection table order.
//! 3. **Default** — the policies collection claims everything else.
//!
//! The trailing default makes classification total: it always succeeds,
//! and with an unchanged mapping file it is deterministic.

use std::collections::HashMap;
use std::path::Path;

use crate::collections::{Category, COLLECTIONS};

/// A single classification rule. Returns `None` to pass the filename on
/// to the next rule.
pub trait ClassifyRule: Send + Sync {
    fn try_classify(&self, filename: &str) -> Option<Category>;
}

/// Rule backed by the operator-maintained mapping file.
pub struct ManualMapping {
    mappings: HashMap<String, Category>,
}

impl ManualMapping {
    /// Load mappings from a JSON object of `filename -> collection key`.
    /// A missing or unreadable file yields an empty mapping; entries with
    /// unknown collection keys are dropped.
    pub fn load(path: &Path) -> Self {
        let mut mappings = HashMap::new();

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self { mappings },
        };

        let parsed: HashMap<String, String> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Ignoring malformed mapping file {}: {}", path.display(), e);
                return Self { mappings };
            }
        };

        for (filename, key) in parsed {
            match Category::parse(&key) {
                Some(category) => {
                    mappings.insert(filename, category);
                }
                None => {
                    tracing::warn!("Mapping for '{}' names unknown collection '{}'", filename, key);
                }
            }
        }

        Self { mappings }
    }

    #[cfg(test)]
    pub fn from_entries(entries: &[(&str, Category)]) -> Self {
        Self {
            mappings: entries
                .iter()
                .map(|(name, cat)| (name.to_string(), *cat))
                .collect(),
        }
    }
}

impl ClassifyRule for ManualMapping {
    fn try_classify(&self, filename: &str) -> Option<Category> {
        self.mappings.get(filename).copied()
    }
}

/// Rule matching collection keywords against the lowercased filename.
/// First matching collection wins, in table order.
pub struct KeywordMatch;

impl ClassifyRule for KeywordMatch {
    fn try_classify(&self, filename: &str) -> Option<Category> {
        let lower = filename.to_lowercase();
        for spec in &COLLECTIONS {
            if spec.keywords.iter().any(|kw| lower.contains(kw)) {
                return Some(spec.category);
            }
        }
        None
    }
}

/// Terminal rule; always yields its category.
pub struct DefaultCategory(pub Category);

impl ClassifyRule for DefaultCategory {
    fn try_classify(&self, _filename: &str) -> Option<Category> {
        Some(self.0)
    }
}

/// Ordered rule chain. Rules are evaluated front to back; the first
/// non-`None` answer is the classification.
pub struct Router {
    rules: Vec<Box<dyn ClassifyRule>>,
}

impl Router {
    pub fn new(mapping_file: &Path) -> Self {
        Self::with_rules(vec![
            Box::new(ManualMapping::load(mapping_file)),
            Box::new(KeywordMatch),
            Box::new(DefaultCategory(Category::DEFAULT)),
        ])
    }

    pub fn with_rules(rules: Vec<Box<dyn ClassifyRule>>) -> Self {
        Self { rules }
    }

    pub fn classify(&self, filename: &str) -> Category {
        self.rules
            .iter()
            .find_map(|rule| rule.try_classify(filename))
            .unwrap_or(Category::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword_router() -> Router {
        Router::with_rules(vec![
            Box::new(KeywordMatch),
            Box::new(DefaultCategory(Category::DEFAULT)),
        ])
    }

    #[test]
    fn keywords_route_to_expected_collections() {
        let router = keyword_router();
        assert_eq!(router.classify("yatra_schedule.txt"), Category::Yatras);
        assert_eq!(router.classify("Kedarnath_Yatra_2026.md"), Category::Yatras);
        assert_eq!(router.classify("faq_payments.txt"), Category::Faqs);
        assert_eq!(router.classify("refund_policy.md"), Category::Policies);
        assert_eq!(router.classify("company_info.txt"), Category::Policies);
    }

    #[test]
    fn unmatched_filename_falls_back_to_default() {
        let router = keyword_router();
        assert_eq!(router.classify("random_notes.txt"), Category::DEFAULT);
        assert_eq!(router.classify(""), Category::DEFAULT);
    }

    #[test]
    fn manual_mapping_wins_over_keywords() {
        let router = Router::with_rules(vec![
            Box::new(ManualMapping::from_entries(&[(
                "yatra_schedule.txt",
                Category::Faqs,
            )])),
            Box::new(KeywordMatch),
            Box::new(DefaultCategory(Category::DEFAULT)),
        ]);
        // The keyword rule would say yatras; the mapping overrides it.
        assert_eq!(router.classify("yatra_schedule.txt"), Category::Faqs);
        // Files absent from the mapping still flow through the keywords.
        assert_eq!(router.classify("summer_yatra.txt"), Category::Yatras);
    }

    #[test]
    fn classification_is_deterministic() {
        let router = keyword_router();
        for _ in 0..3 {
            assert_eq!(router.classify("dham_faq.md"), Category::Faqs);
        }
    }

    #[test]
    fn missing_mapping_file_is_empty() {
        let mapping = ManualMapping::load(Path::new("/nonexistent/mappings.json"));
        assert_eq!(mapping.try_classify("anything.txt"), None);
    }
}
