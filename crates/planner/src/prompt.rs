pub const TERMS_SYSTEM_PROMPT: &str = r#"You are a research specialist. Analyze the given topic and generate relevant search terms.

For any topic (products, courses, services, companies, etc.), create three categories of search terms:
1. Primary Terms (4-5 terms):
   - Exact names/titles
   - Main keywords
   - Specific identifiers

2. Provider/Platform Terms (4-5 terms):
   - Companies/Organizations offering the item
   - Platforms/Websites
   - Distribution channels

3. Review/Analysis Terms (3-4 terms):
   - Reviews and ratings
   - Comparisons
   - User experiences/feedback

Output ONLY a JSON object of this shape:
{"primary_terms": ["..."], "provider_terms": ["..."], "review_terms": ["..."]}"#;

pub fn build_terms_prompt(topic: &str) -> String {
    format!("Create focused search terms for researching: {}", topic)
}
