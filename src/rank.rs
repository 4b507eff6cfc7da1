use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::stats::{AggregationStore, PageStats};

/// Number of entries in each report.
pub const DEFAULT_TOP: usize = 10;

/// Almost every visitor loads the root page, so it never counts as a top page.
pub const ROOT_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopPage {
    pub path: String,
    pub visitors: u64,
}

impl TopPage {
    /// Placeholder for locations without any non-root page.
    pub fn none() -> Self {
        Self {
            path: "none".to_string(),
            visitors: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedLocation {
    pub location: String,
    pub visitors: u64,
    pub top_page: TopPage,
}

/// Returns at most `n` locations, most visitors first. Ties are ordered by
/// name, case-insensitively.
pub fn top_locations(store: &AggregationStore, n: usize) -> Vec<RankedLocation> {
    let mut locations: Vec<_> = store.iter().collect();
    locations.sort_by_cached_key(|(name, stats)| {
        (Reverse(stats.visitors), name.to_lowercase(), name.to_string())
    });

    locations
        .into_iter()
        .take(n)
        .map(|(name, stats)| RankedLocation {
            location: name.clone(),
            visitors: stats.visitors,
            top_page: top_page(&stats.pages),
        })
        .collect()
}

/// Most visited page other than the root. Ties go to the lexically smallest
/// path.
pub fn top_page(pages: &HashMap<String, PageStats>) -> TopPage {
    pages
        .iter()
        .filter(|(path, _)| path.as_str() != ROOT_PATH)
        .min_by(|(a_path, a), (b_path, b)| {
            b.visitors
                .cmp(&a.visitors)
                .then_with(|| a_path.cmp(b_path))
        })
        .map(|(path, page)| TopPage {
            path: path.clone(),
            visitors: page.visitors,
        })
        .unwrap_or_else(TopPage::none)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store_from(visits: &[(&str, &str, u64)]) -> AggregationStore {
        let mut store = AggregationStore::new();
        for (location, path, count) in visits {
            for _ in 0..*count {
                store.record(location, path);
            }
        }
        store
    }

    #[test]
    fn orders_by_visitors_descending() {
        let store = store_from(&[("Chile", "/a", 1), ("France", "/a", 5), ("Japan", "/a", 3)]);
        let names: Vec<_> = top_locations(&store, DEFAULT_TOP)
            .into_iter()
            .map(|r| r.location)
            .collect();
        assert_eq!(names, ["France", "Japan", "Chile"]);
    }

    #[test]
    fn ties_break_on_case_insensitive_name() {
        let store = store_from(&[("beta", "/a", 2), ("Alpha", "/a", 2), ("Gamma", "/a", 2), ("delta", "/a", 9)]);
        let names: Vec<_> = top_locations(&store, DEFAULT_TOP)
            .into_iter()
            .map(|r| r.location)
            .collect();
        assert_eq!(names, ["delta", "Alpha", "beta", "Gamma"]);
    }

    #[test]
    fn truncates_to_n() {
        let visits: Vec<(String, u64)> = (0..15).map(|i| (format!("L{i:02}"), i + 1)).collect();
        let mut store = AggregationStore::new();
        for (name, count) in &visits {
            for _ in 0..*count {
                store.record(name, "/p");
            }
        }
        let ranked = top_locations(&store, DEFAULT_TOP);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].location, "L14");
        assert_eq!(ranked[9].location, "L05");
    }

    #[test]
    fn empty_store_yields_empty_ranking() {
        assert!(top_locations(&AggregationStore::new(), DEFAULT_TOP).is_empty());
    }

    #[test]
    fn top_page_skips_root() {
        let store = store_from(&[("France", "/", 10), ("France", "/menu", 3), ("France", "/about", 1)]);
        let ranked = top_locations(&store, 1);
        assert_eq!(
            ranked[0].top_page,
            TopPage {
                path: "/menu".to_string(),
                visitors: 3
            }
        );
    }

    #[test]
    fn top_page_ties_break_on_path() {
        let store = store_from(&[("France", "/zeta", 2), ("France", "/alpha", 2), ("France", "/Beta", 2)]);
        let ranked = top_locations(&store, 1);
        assert_eq!(ranked[0].top_page.path, "/Beta");
    }

    #[test]
    fn root_only_location_has_no_top_page() {
        let store = store_from(&[("France", "/", 4)]);
        let ranked = top_locations(&store, 1);
        assert_eq!(ranked[0].visitors, 4);
        assert_eq!(ranked[0].top_page, TopPage::none());
    }

    fn arb_visits() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec(
            (
                prop::sample::select(vec!["a", "A", "b", "Brazil", "chile", "Chile", "d", "e", "f", "g", "h", "i", "j", "k"]),
                prop::sample::select(vec!["/", "/x", "/y", "/z"]),
            )
                .prop_map(|(l, p)| (l.to_string(), p.to_string())),
            0..200,
        )
    }

    proptest! {
        #[test]
        fn ranking_is_ordered_and_bounded(visits in arb_visits(), n in 0usize..15) {
            let mut store = AggregationStore::new();
            for (location, path) in &visits {
                store.record(location, path);
            }
            let ranked = top_locations(&store, n);

            prop_assert!(ranked.len() <= n);
            prop_assert_eq!(ranked.len(), n.min(store.len()));
            for pair in ranked.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.visitors >= b.visitors);
                if a.visitors == b.visitors {
                    prop_assert!(a.location.to_lowercase() <= b.location.to_lowercase());
                }
            }
            for entry in &ranked {
                let stats = store.get(&entry.location).unwrap();
                let has_other_page = stats.pages.keys().any(|p| p != ROOT_PATH);
                if has_other_page {
                    prop_assert_ne!(entry.top_page.path.as_str(), ROOT_PATH);
                    prop_assert!(entry.top_page.visitors <= entry.visitors);
                } else {
                    prop_assert_eq!(&entry.top_page, &TopPage::none());
                }
            }
        }
    }
}
