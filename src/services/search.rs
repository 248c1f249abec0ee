use crate::types::{Example, Page, Platform};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Filter `pages` to `platforms` and rank them: exact name matches first,
/// then name/description substring matches. Catalog order is kept within a
/// tier. An empty platform filter matches nothing. The query is matched
/// as given, whitespace included.
pub fn search_pages(pages: &[Arc<Page>], query: &str, platforms: &[Platform]) -> Vec<Arc<Page>> {
    let query = query.to_lowercase();
    let mut exact = Vec::new();
    let mut partial = Vec::new();

    for page in pages {
        if !platforms.contains(&page.platform) {
            continue;
        }
        let name = page.name.to_lowercase();
        if name == query {
            exact.push(Arc::clone(page));
        } else if name.contains(&query) || page.description.to_lowercase().contains(&query) {
            partial.push(Arc::clone(page));
        }
    }

    exact.extend(partial);
    exact
}

/// Names containing `query`, prefix matches first, then alphabetical.
pub fn suggest_names(pages: &[Arc<Page>], query: &str, limit: usize) -> Vec<String> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    let names: BTreeSet<&str> = pages
        .iter()
        .map(|page| page.name.as_str())
        .filter(|name| name.to_lowercase().contains(&query))
        .collect();

    let mut ranked: Vec<&str> = names.into_iter().collect();
    ranked.sort_by_key(|name| (!name.to_lowercase().starts_with(&query), name.to_lowercase()));
    ranked.into_iter().take(limit).map(str::to_string).collect()
}

impl Page {
    /// First example whose description mentions `query`, else the first
    /// example. `None` only when the page has no examples at all.
    pub fn find_best_example(&self, query: &str) -> Option<&Example> {
        let query = query.to_lowercase();
        self.examples
            .iter()
            .find(|example| example.description.to_lowercase().contains(&query))
            .or_else(|| self.examples.first())
    }
}
