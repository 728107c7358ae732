//! Cascading Segment → Category → Product Name filter.
//!
//! A `None` selection means the full domain; an empty set means nothing
//! passes. Product candidates are always taken from the rows that survive the
//! Segment and Category predicates, never from the whole dataset.

use crate::record::{Dataset, SalesRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub segments: Option<BTreeSet<String>>,
    pub categories: Option<BTreeSet<String>>,
    pub products: Option<BTreeSet<String>>,
}

impl FilterSelection {
    /// Every label of every column passes
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.segments = Some(segments.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_products<I, S>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.products = Some(products.into_iter().map(Into::into).collect());
        self
    }
}

/// The concrete label lists a selection expands to for one dataset
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSelection {
    pub segments: Vec<String>,
    pub categories: Vec<String>,
    pub products: Vec<String>,
}

fn allows(set: &Option<BTreeSet<String>>, label: &str) -> bool {
    match set {
        Some(set) => set.contains(label),
        None => true,
    }
}

fn unique_in_order<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .filter(|label| seen.insert(*label))
        .map(str::to_string)
        .collect()
}

/// Segment labels in order of first appearance
pub fn segment_options(dataset: &Dataset) -> Vec<String> {
    unique_in_order(dataset.records.iter().map(|r| r.segment.as_str()))
}

/// Category labels in order of first appearance
pub fn category_options(dataset: &Dataset) -> Vec<String> {
    unique_in_order(dataset.records.iter().map(|r| r.category.as_str()))
}

/// Sorted product names present among rows passing the Segment and Category
/// predicates
pub fn product_options(
    dataset: &Dataset,
    segments: &Option<BTreeSet<String>>,
    categories: &Option<BTreeSet<String>>,
) -> Vec<String> {
    dataset
        .records
        .iter()
        .filter(|r| allows(segments, &r.segment) && allows(categories, &r.category))
        .map(|r| r.product_name.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Expand defaults and drop products that the cascade no longer offers
pub fn resolve(dataset: &Dataset, selection: &FilterSelection) -> ResolvedSelection {
    let keep = |options: Vec<String>, set: &Option<BTreeSet<String>>| -> Vec<String> {
        options.into_iter().filter(|o| allows(set, o)).collect()
    };

    ResolvedSelection {
        segments: keep(segment_options(dataset), &selection.segments),
        categories: keep(category_options(dataset), &selection.categories),
        products: keep(
            product_options(dataset, &selection.segments, &selection.categories),
            &selection.products,
        ),
    }
}

/// Rows satisfying all three membership predicates, in dataset order
pub fn apply<'a>(dataset: &'a Dataset, selection: &FilterSelection) -> Vec<&'a SalesRecord> {
    dataset
        .records
        .iter()
        .filter(|r| {
            allows(&selection.segments, &r.segment)
                && allows(&selection.categories, &r.category)
                && allows(&selection.products, &r.product_name)
        })
        .collect()
}
