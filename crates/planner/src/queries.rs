use extract::Domain;
use tracing::debug;

use crate::terms::SearchTermSet;
use crate::OrderedSet;

pub type Query = String;

pub const DEFAULT_QUERY_BUDGET: usize = 25;

fn modifiers(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::LocalService => &["companies prices reviews", "top rated services"],
        Domain::Course => &[
            "course curriculum price",
            "training reviews ratings",
            "certification learning platform",
        ],
        Domain::Product => &[
            "product specifications features",
            "price comparison reviews",
            "availability retailers",
        ],
        Domain::Generic => &[
            "provider details pricing",
            "reviews ratings feedback",
            "market analysis comparison",
        ],
    }
}

/// The two unmodified "who offers this" queries per term.
fn entity_suffixes(domain: Domain) -> [&'static str; 2] {
    match domain {
        Domain::LocalService => ["companies", "services"],
        Domain::Course => ["providers", "platforms"],
        Domain::Product | Domain::Generic => ["providers", "companies"],
    }
}

/// Expands the topic and planned terms into a bounded list of unique queries.
pub struct QueryGenerator {
    budget: usize,
}

impl QueryGenerator {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    /// Crosses the topic, main terms and related terms (in that order) with
    /// the domain modifiers and entity suffixes. Queries are emitted pattern
    /// by pattern across all bases, so truncation to `budget` still gives
    /// every base a query before any base gets a second one.
    pub fn generate(&self, topic: &str, terms: &SearchTermSet) -> Vec<Query> {
        let domain = Domain::classify(topic);

        let bases = std::iter::once(topic)
            .chain(terms.main_terms.iter().map(String::as_str))
            .chain(terms.related_terms.iter().map(String::as_str))
            .collect::<OrderedSet>()
            .into_vec();
        let patterns = modifiers(domain)
            .iter()
            .copied()
            .chain(entity_suffixes(domain));

        let mut queries = OrderedSet::new();
        'patterns: for pattern in patterns {
            for base in &bases {
                if queries.len() >= self.budget {
                    break 'patterns;
                }
                queries.insert(&format!("{} {}", base, pattern));
            }
        }

        let queries = queries.into_vec();
        debug!(?domain, count = queries.len(), budget = self.budget, "Queries generated");
        queries
    }
}

impl Default for QueryGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_BUDGET)
    }
}
