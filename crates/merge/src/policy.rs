//! Field-level precedence rules for reconciling two records with the same name.

use extract::{is_placeholder, EntityDetails, EntityRecord, ReviewMetadata};
use indexmap::IndexMap;

/// First non-placeholder value wins. A placeholder never replaces real data.
pub fn pick_scalar(current: &mut String, incoming: String) {
    if is_placeholder(current) && !is_placeholder(&incoming) {
        *current = incoming;
    }
}

/// Union by value in first-seen order.
pub fn union_list(current: &mut Vec<String>, incoming: Vec<String>) {
    for item in incoming {
        if !current.contains(&item) {
            current.push(item);
        }
    }
}

/// Union by key; colliding prices follow the scalar rule.
pub fn union_map(current: &mut IndexMap<String, String>, incoming: IndexMap<String, String>) {
    for (key, value) in incoming {
        match current.get_mut(&key) {
            Some(existing) => pick_scalar(existing, value),
            None => {
                current.insert(key, value);
            }
        }
    }
}

fn union_list_map(current: &mut IndexMap<String, Vec<String>>, incoming: IndexMap<String, Vec<String>>) {
    for (key, values) in incoming {
        union_list(current.entry(key).or_default(), values);
    }
}

fn drop_placeholders_if_real(list: &mut Vec<String>) {
    if list.iter().any(|item| !is_placeholder(item)) {
        list.retain(|item| !is_placeholder(item));
    }
}

/// Folds `incoming` into `current`. `current.name` is left untouched.
pub fn reconcile(current: &mut EntityRecord, incoming: EntityRecord) {
    let EntityRecord {
        name: _,
        services,
        pricing,
        contact,
        website,
        rating,
        reviews,
        details,
    } = incoming;

    union_list(&mut current.services, services);
    union_map(&mut current.pricing, pricing);
    pick_scalar(&mut current.contact, contact);
    pick_scalar(&mut current.website, website);
    pick_scalar(&mut current.rating, rating);
    reconcile_reviews(&mut current.reviews, reviews);
    reconcile_details(&mut current.details, details);

    tidy(current);
}

fn reconcile_reviews(current: &mut ReviewMetadata, incoming: ReviewMetadata) {
    pick_scalar(&mut current.total_reviews, incoming.total_reviews);
    union_list(&mut current.highlights, incoming.highlights);
    union_list(&mut current.concerns, incoming.concerns);
}

fn reconcile_details(current: &mut EntityDetails, incoming: EntityDetails) {
    union_list_map(&mut current.features, incoming.features);
    pick_scalar(&mut current.target_segment, incoming.target_segment);
    union_list(&mut current.key_competitors, incoming.key_competitors);
    pick_scalar(&mut current.sentiment, incoming.sentiment);
}

/// Once real data is present, default entries such as "General Cleaning" or a
/// "Contact for pricing" line are dropped. Priced services always stay listed.
pub fn tidy(entity: &mut EntityRecord) {
    if entity.pricing.keys().any(|key| !is_placeholder(key)) {
        entity
            .pricing
            .retain(|key, value| !(is_placeholder(key) && is_placeholder(value)));
    }

    if entity.services.iter().any(|service| !is_placeholder(service)) {
        let pricing = &entity.pricing;
        entity
            .services
            .retain(|service| !is_placeholder(service) || pricing.contains_key(service));
    }

    drop_placeholders_if_real(&mut entity.reviews.highlights);
    drop_placeholders_if_real(&mut entity.reviews.concerns);
    drop_placeholders_if_real(&mut entity.details.key_competitors);

    entity.enforce_pricing_invariant();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_scalar() {
        let mut value = "Not available".to_string();
        pick_scalar(&mut value, "555-0100".to_string());
        assert_eq!(value, "555-0100");

        pick_scalar(&mut value, "555-9999".to_string());
        assert_eq!(value, "555-0100");

        pick_scalar(&mut value, "Not found".to_string());
        assert_eq!(value, "555-0100");
    }

    #[test]
    fn test_union_list_keeps_first_seen_order() {
        let mut list = vec!["b".to_string(), "a".to_string()];
        union_list(&mut list, vec!["c".to_string(), "a".to_string(), "d".to_string()]);
        assert_eq!(list, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_union_map_collision_uses_scalar_rule() {
        let mut current = IndexMap::from([
            ("Deep Clean".to_string(), "Contact for pricing".to_string()),
            ("Standard".to_string(), "$120".to_string()),
        ]);
        let incoming = IndexMap::from([
            ("Deep Clean".to_string(), "$250".to_string()),
            ("Standard".to_string(), "$99".to_string()),
            ("Move Out".to_string(), "$300".to_string()),
        ]);

        union_map(&mut current, incoming);
        assert_eq!(current["Deep Clean"], "$250");
        assert_eq!(current["Standard"], "$120");
        assert_eq!(current["Move Out"], "$300");
    }
}
