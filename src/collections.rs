//! Fixed collection identities.
//!
//! The knowledge base is partitioned into a small, fixed set of named
//! collections known at compile time. Every ingested chunk belongs to
//! exactly one collection. The table below is ordered so that more
//! specific filename keywords are tried before general ones.

use serde::{Deserialize, Serialize};

/// Collection key for a logical partition of the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Yatras,
    Faqs,
    Policies,
}

impl Category {
    /// All collections, in the fixed iteration order used for routing
    /// and retrieval.
    pub const ALL: [Category; 3] = [Category::Yatras, Category::Faqs, Category::Policies];

    /// Fallback collection for files no rule claims.
    pub const DEFAULT: Category = Category::Policies;

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Yatras => "yatras",
            Category::Faqs => "faqs",
            Category::Policies => "policies",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        match s {
            "yatras" => Some(Category::Yatras),
            "faqs" => Some(Category::Faqs),
            "policies" => Some(Category::Policies),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static identity of a collection: its key, the name of the backing
/// index, the filename keywords that route documents into it, and a
/// human-readable description.
#[derive(Debug, Clone, Copy)]
pub struct CollectionSpec {
    pub category: Category,
    pub store_name: &'static str,
    pub keywords: &'static [&'static str],
    pub description: &'static str,
}

pub const COLLECTIONS: [CollectionSpec; 3] = [
    CollectionSpec {
        category: Category::Yatras,
        store_name: "tirtha_yatras",
        keywords: &["yatra_schedule.txt", "yatra"],
        description: "Yatra schedules, destinations, and travel information",
    },
    CollectionSpec {
        category: Category::Faqs,
        store_name: "tirtha_faqs",
        keywords: &["faq", "functional_requirements.txt"],
        description: "Frequently asked questions and answers",
    },
    CollectionSpec {
        category: Category::Policies,
        store_name: "tirtha_policies",
        keywords: &["policy", "policies", "additional_points.txt", "company_info.txt"],
        description: "Policies, terms, and company information",
    },
];

pub fn spec_for(category: Category) -> &'static CollectionSpec {
    COLLECTIONS
        .iter()
        .find(|spec| spec.category == category)
        .expect("every category has a collection spec")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_a_spec() {
        for category in Category::ALL {
            assert_eq!(spec_for(category).category, category);
        }
    }

    #[test]
    fn parse_roundtrip() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("bookings"), None);
    }

    #[test]
    fn spec_order_matches_category_order() {
        let order: Vec<Category> = COLLECTIONS.iter().map(|s| s.category).collect();
        assert_eq!(order, Category::ALL.to_vec());
    }
}
