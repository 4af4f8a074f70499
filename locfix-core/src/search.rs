//! Fuzzy matching of case file names.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

/// Case files that fuzzily match `query`, best match first.
///
/// Search is case-insensitive. At most `limit` names are returned.
pub fn suggest_files(query: &str, files: &[String], limit: usize) -> Vec<String> {
    let matcher = SkimMatcherV2::default().ignore_case();
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(i64, &String)> = files
        .iter()
        .filter_map(|file| matcher.fuzzy_match(file, query).map(|score| (score, file)))
        .collect();

    // Sort by score descending, then by name for stable output
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

    scored
        .into_iter()
        .take(limit)
        .map(|(_, file)| file.clone())
        .collect()
}
