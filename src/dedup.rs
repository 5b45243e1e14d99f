//! Title-based deduplication of freshly scraped articles.

use crate::models::ArticleRecord;
use itertools::Itertools;
use std::collections::HashSet;

/// Keep the candidates whose title is not already stored.
///
/// Titles are compared verbatim; they are normalized and upper-cased by the
/// scraper before they get here. When the same title shows up twice in one
/// batch only the first occurrence survives, so a run never inserts a title
/// twice either.
///
/// # Arguments
///
/// * `candidates` - Scraped articles in listing order, sentinel rows included
/// * `existing_titles` - Every title already in the warehouse
///
/// # Returns
///
/// The candidates with unseen titles, in their original order.
///
/// # Examples
///
/// ```ignore
/// let existing = HashSet::from(["A".to_string()]);
/// let new_rows = filter_new(vec![a, b, b_again], &existing);
/// // only `b` is left
/// ```
pub fn filter_new(
    candidates: Vec<ArticleRecord>,
    existing_titles: &HashSet<String>,
) -> Vec<ArticleRecord> {
    candidates
        .into_iter()
        .filter(|article| !existing_titles.contains(&article.title))
        .unique_by(|article| article.title.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn article(title: &str) -> ArticleRecord {
        ArticleRecord::scraped(
            title.to_string(),
            "Body".to_string(),
            format!("https://medium.com/snowflake/{}", title.to_lowercase()),
            String::new(),
            DateTime::parse_from_rfc3339("2025-05-06T10:00:00+05:30").unwrap(),
        )
    }

    fn titles(articles: &[ArticleRecord]) -> Vec<&str> {
        articles.iter().map(|a| a.title.as_str()).collect()
    }

    #[test]
    fn test_existing_titles_are_dropped() {
        let existing = HashSet::from(["A".to_string()]);
        let result = filter_new(vec![article("A"), article("B")], &existing);
        assert_eq!(titles(&result), vec!["B"]);
    }

    #[test]
    fn test_nothing_existing_keeps_everything_in_order() {
        let result = filter_new(vec![article("C"), article("A"), article("B")], &HashSet::new());
        assert_eq!(titles(&result), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_filter_is_idempotent_when_all_exist() {
        let candidates = vec![article("A"), article("B")];
        let existing = HashSet::from(["A".to_string(), "B".to_string()]);

        assert!(filter_new(candidates.clone(), &existing).is_empty());
        assert!(filter_new(candidates, &existing).is_empty());
    }

    #[test]
    fn test_exact_match_only() {
        let existing = HashSet::from(["SNOWPARK".to_string()]);
        let result = filter_new(vec![article("SNOWPARK "), article("Snowpark")], &existing);
        assert_eq!(titles(&result), vec!["SNOWPARK ", "Snowpark"]);
    }

    #[test]
    fn test_duplicate_titles_within_batch_collapse() {
        let mut second = article("A");
        second.url = "https://medium.com/snowflake/other".to_string();
        let result = filter_new(vec![article("A"), second, article("B")], &HashSet::new());
        assert_eq!(titles(&result), vec!["A", "B"]);
        assert_eq!(result[0].url, "https://medium.com/snowflake/a");
    }
}
