use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const NOT_FOUND: &str = "Not found";
pub const NOT_AVAILABLE: &str = "Not available";
pub const CONTACT_FOR_PRICING: &str = "Contact for pricing";

/// Values that mean "nothing was found" rather than real data.
const PLACEHOLDERS: &[&str] = &[
    "not found",
    "not available",
    "n/a",
    "na",
    "none",
    "none reported",
    "null",
    "unknown",
    "not specified",
    "not analyzed",
    "not listed",
    "contact for pricing",
    "no courses listed",
    "general cleaning",
    "general service",
    "unknown company",
    "unknown provider",
];

/// True for empty strings and sentinel values such as `"Not found"`.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    PLACEHOLDERS.contains(&lowered.as_str())
}

/// Topic class used to pick query modifiers and extraction defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    LocalService,
    Course,
    Product,
    Generic,
}

const LOCAL_SERVICE_KEYWORDS: &[&str] = &[
    "cleaning",
    "maid",
    "janitorial",
    "plumbing",
    "plumber",
    "landscaping",
    "lawn",
    "pest control",
    "movers",
    "handyman",
    "electrician",
];

const COURSE_KEYWORDS: &[&str] = &["course", "training", "bootcamp", "certification", "tutorial"];

const PRODUCT_KEYWORDS: &[&str] = &["product", "device", "gadget"];

impl Domain {
    /// Keyword heuristics over the lowercased topic. Local services win over
    /// courses, courses over products.
    pub fn classify(topic: &str) -> Self {
        let topic = topic.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| topic.contains(w));

        if has_any(LOCAL_SERVICE_KEYWORDS) {
            Domain::LocalService
        } else if has_any(COURSE_KEYWORDS) {
            Domain::Course
        } else if has_any(PRODUCT_KEYWORDS) {
            Domain::Product
        } else {
            Domain::Generic
        }
    }

    pub fn default_services(&self) -> Vec<String> {
        match self {
            Domain::LocalService => vec!["General Cleaning".to_string()],
            Domain::Course => vec!["No courses listed".to_string()],
            Domain::Product | Domain::Generic => Vec::new(),
        }
    }

    pub fn default_pricing(&self) -> IndexMap<String, String> {
        let mut pricing = IndexMap::new();
        if *self == Domain::LocalService {
            pricing.insert("General Service".to_string(), CONTACT_FOR_PRICING.to_string());
        }
        pricing
    }

    /// Key the extraction collaborator is asked to put the offering list under.
    pub fn list_key(&self) -> &'static str {
        match self {
            Domain::LocalService | Domain::Generic => "services",
            Domain::Course => "courses",
            Domain::Product => "products",
        }
    }

    pub fn entity_label(&self) -> &'static str {
        match self {
            Domain::LocalService => "company",
            Domain::Course => "course provider",
            Domain::Product => "product company",
            Domain::Generic => "provider",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewMetadata {
    pub total_reviews: String,
    pub highlights: Vec<String>,
    pub concerns: Vec<String>,
}

/// Per-domain extension fields. Everything here is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDetails {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub features: IndexMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_segment: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_competitors: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sentiment: String,
}

impl EntityDetails {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
            && self.target_segment.is_empty()
            && self.key_competitors.is_empty()
            && self.sentiment.is_empty()
    }
}

/// Candidate entity produced from one raw search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub name: String,
    pub services: Vec<String>,
    pub pricing: IndexMap<String, String>,
    pub contact: String,
    pub website: String,
    pub rating: String,
    pub reviews: ReviewMetadata,
    pub details: EntityDetails,
}

/// Canonical, merged entity handed to the export sink.
///
/// Every key of `pricing` also appears in `services`, and `rating` is either a
/// one-decimal number or `"Not found"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub services: Vec<String>,
    pub pricing: IndexMap<String, String>,
    pub contact: String,
    pub website: String,
    pub rating: String,
    pub reviews: ReviewMetadata,
    #[serde(default, skip_serializing_if = "EntityDetails::is_empty")]
    pub details: EntityDetails,
}

impl EntityRecord {
    /// Append any priced service missing from `services`.
    pub fn enforce_pricing_invariant(&mut self) {
        for key in self.pricing.keys() {
            if !self.services.iter().any(|s| s == key) {
                self.services.push(key.clone());
            }
        }
    }
}

impl From<ExtractionRecord> for EntityRecord {
    fn from(record: ExtractionRecord) -> Self {
        let mut entity = Self {
            name: record.name,
            services: record.services,
            pricing: record.pricing,
            contact: record.contact,
            website: record.website,
            rating: crate::normalizer::normalize_rating_str(&record.rating),
            reviews: record.reviews,
            details: record.details,
        };
        entity.enforce_pricing_invariant();
        entity
    }
}

/// Target schema sent to the extraction collaborator for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSchema {
    pub domain: Domain,
    pub template: String,
}

impl TargetSchema {
    pub fn for_domain(domain: Domain) -> Self {
        Self {
            domain,
            template: crate::prompt::schema_template(domain),
        }
    }
}
