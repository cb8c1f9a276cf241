//! Curated linking of freshly fetched publications to freshly fetched datasets
//!
//! Runs on the in-memory batch before anything is stored. Links are dataset
//! batch indices, turned into link rows by the store at insert time.

use aicat_common::config::LinkRules;
use aicat_common::db::{NewDataset, NewPublication};
use std::collections::HashSet;

/// Assign `datasets` on every publication a rule matches
///
/// Assignment replaces any prior links of that publication. Publications no
/// rule matches are left untouched.
pub fn link(
    datasets: Vec<NewDataset>,
    mut publications: Vec<NewPublication>,
    rules: &LinkRules,
) -> (Vec<NewDataset>, Vec<NewPublication>) {
    let benchmark_ids: HashSet<i64> = rules.benchmark_identifiers.iter().copied().collect();
    let benchmark: Vec<usize> = datasets
        .iter()
        .enumerate()
        .filter(|(_, d)| is_benchmark_member(d, &rules.benchmark_node, &benchmark_ids))
        .map(|(i, _)| i)
        .collect();

    for publication in publications.iter_mut() {
        for companion in &rules.companions {
            if publication.title == companion.title {
                publication.datasets = datasets
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| d.node == companion.node && d.name == companion.dataset_name)
                    .map(|(i, _)| i)
                    .collect();
            }
        }

        if publication.title == rules.benchmark_title {
            publication.datasets = benchmark.clone();
        }
    }

    (datasets, publications)
}

/// Non-integer identifiers never match
fn is_benchmark_member(dataset: &NewDataset, node: &str, ids: &HashSet<i64>) -> bool {
    dataset.node == node
        && dataset
            .node_specific_identifier
            .parse::<i64>()
            .map(|id| ids.contains(&id))
            .unwrap_or(false)
}
