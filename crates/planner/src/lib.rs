pub mod llm;
pub mod prompt;
pub mod queries;
pub mod terms;

pub use llm::LlmTermGenerator;
pub use queries::{Query, QueryGenerator, DEFAULT_QUERY_BUDGET};
pub use terms::{PlanError, SearchTermSet, TermGenerator, TermGroups, TermPlanner};

use indexmap::IndexMap;

/// Insertion-ordered set of strings, de-duplicated on a case and whitespace
/// insensitive key. The first spelling seen is kept.
#[derive(Debug, Default, Clone)]
pub struct OrderedSet {
    items: IndexMap<String, String>,
}

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the value is blank or already present.
    pub fn insert(&mut self, value: &str) -> bool {
        let display = value.split_whitespace().collect::<Vec<_>>().join(" ");
        if display.is_empty() {
            return false;
        }
        let key = display.to_lowercase();
        if self.items.contains_key(&key) {
            return false;
        }
        self.items.insert(key, display);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.items.into_values().collect()
    }
}

impl<'a> FromIterator<&'a str> for OrderedSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_set_keeps_first_seen() {
        let set: OrderedSet = ["Maid  Service", "cleaning", "maid service", " ", "Cleaning"]
            .into_iter()
            .collect();

        assert_eq!(set.into_vec(), vec!["Maid Service", "cleaning"]);
    }
}
