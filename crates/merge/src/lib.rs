pub mod policy;

use extract::{EntityRecord, ExtractionRecord};
use indexmap::IndexMap;
use tracing::debug;

/// Canonical entities keyed by exact name, in first-seen order.
pub type EntityMap = IndexMap<String, EntityRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Returns `existing` with `incoming` folded in.
pub fn merge(existing: EntityMap, incoming: ExtractionRecord) -> EntityMap {
    let mut entities = existing;
    absorb(&mut entities, incoming);
    entities
}

/// In-place form of [`merge`].
pub fn absorb(entities: &mut EntityMap, incoming: ExtractionRecord) -> MergeOutcome {
    let mut incoming = EntityRecord::from(incoming);

    match entities.get_mut(&incoming.name) {
        None => {
            policy::tidy(&mut incoming);
            entities.insert(incoming.name.clone(), incoming);
            MergeOutcome::Inserted
        }
        Some(current) => {
            let before = current.clone();
            policy::reconcile(current, incoming);
            if *current == before {
                MergeOutcome::Unchanged
            } else {
                MergeOutcome::Updated
            }
        }
    }
}

/// Single writer over the run's entity map.
#[derive(Debug, Default)]
pub struct EntityMerger {
    entities: EntityMap,
    inserted: usize,
    updated: usize,
}

impl EntityMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, record: ExtractionRecord) -> MergeOutcome {
        let name = record.name.clone();
        let outcome = absorb(&mut self.entities, record);
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Unchanged => {}
        }
        debug!(entity = %name, ?outcome, "Record merged");
        outcome
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn updated(&self) -> usize {
        self.updated
    }

    /// Entities in first-seen order.
    pub fn into_entities(self) -> Vec<EntityRecord> {
        self.entities.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{EntityDetails, ReviewMetadata};

    fn record(name: &str) -> ExtractionRecord {
        ExtractionRecord {
            name: name.to_string(),
            services: Vec::new(),
            pricing: IndexMap::new(),
            contact: "Not available".to_string(),
            website: "Not available".to_string(),
            rating: "Not found".to_string(),
            reviews: ReviewMetadata {
                total_reviews: "Not found".to_string(),
                highlights: Vec::new(),
                concerns: Vec::new(),
            },
            details: EntityDetails::default(),
        }
    }

    fn acme_with_rating() -> ExtractionRecord {
        let mut r = record("Acme Cleaning");
        r.rating = "4.5".to_string();
        r.services = vec!["Standard Clean".to_string()];
        r.reviews.highlights = vec!["Punctual".to_string()];
        r
    }

    fn acme_with_contact() -> ExtractionRecord {
        let mut r = record("Acme Cleaning");
        r.contact = "555-0100".to_string();
        r.services = vec!["Deep Clean".to_string(), "Standard Clean".to_string()];
        r.pricing.insert("Deep Clean".to_string(), "$250".to_string());
        r.reviews.highlights = vec!["Thorough".to_string()];
        r
    }

    fn sample_maps() -> Vec<EntityMap> {
        vec![
            EntityMap::new(),
            merge(EntityMap::new(), acme_with_rating()),
            merge(merge(EntityMap::new(), record("Sparkle Maids")), acme_with_contact()),
        ]
    }

    #[test]
    fn test_partial_records_combine() {
        let entities = merge(merge(EntityMap::new(), acme_with_rating()), acme_with_contact());
        let acme = &entities["Acme Cleaning"];

        assert_eq!(acme.rating, "4.5");
        assert_eq!(acme.contact, "555-0100");
        assert_eq!(acme.services, vec!["Standard Clean", "Deep Clean"]);
        assert_eq!(acme.pricing["Deep Clean"], "$250");
        assert_eq!(acme.reviews.highlights, vec!["Punctual", "Thorough"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        for map in sample_maps() {
            for incoming in [acme_with_rating(), acme_with_contact(), record("Sparkle Maids")] {
                let once = merge(map.clone(), incoming.clone());
                let twice = merge(once.clone(), incoming);
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn test_placeholder_never_overwrites() {
        let base = merge(EntityMap::new(), acme_with_contact());
        let merged = merge(base, record("Acme Cleaning"));
        let acme = &merged["Acme Cleaning"];

        assert_eq!(acme.contact, "555-0100");
        assert_eq!(acme.pricing["Deep Clean"], "$250");
    }

    #[test]
    fn test_disjoint_batches_commute() {
        let batch_a = vec![acme_with_rating(), acme_with_contact()];
        let mut sparkle = record("Sparkle Maids");
        sparkle.website = "https://sparkle.example".to_string();
        let batch_b = vec![sparkle, record("Tidy Co")];

        let fold = |start: EntityMap, batch: &[ExtractionRecord]| {
            batch.iter().cloned().fold(start, merge)
        };

        let ab = fold(fold(EntityMap::new(), &batch_a), &batch_b);
        let ba = fold(fold(EntityMap::new(), &batch_b), &batch_a);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_names_are_exact_match() {
        let entities = merge(merge(EntityMap::new(), record("Acme Cleaning")), record("Acme Cleaning LLC"));
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn test_default_entries_give_way_to_real_data() {
        let mut defaulted = record("Acme Cleaning");
        defaulted.services = vec!["General Cleaning".to_string()];
        defaulted
            .pricing
            .insert("General Service".to_string(), "Contact for pricing".to_string());

        let entities = merge(merge(EntityMap::new(), defaulted), acme_with_contact());
        let acme = &entities["Acme Cleaning"];

        assert_eq!(acme.services, vec!["Deep Clean", "Standard Clean"]);
        assert_eq!(acme.pricing.len(), 1);
        for key in acme.pricing.keys() {
            assert!(acme.services.contains(key));
        }
    }

    #[test]
    fn test_merger_counts_outcomes() {
        let mut merger = EntityMerger::new();
        assert_eq!(merger.absorb(acme_with_rating()), MergeOutcome::Inserted);
        assert_eq!(merger.absorb(acme_with_contact()), MergeOutcome::Updated);
        assert_eq!(merger.absorb(acme_with_contact()), MergeOutcome::Unchanged);

        assert_eq!(merger.inserted(), 1);
        assert_eq!(merger.updated(), 1);
        assert_eq!(merger.into_entities()[0].name, "Acme Cleaning");
    }
}
