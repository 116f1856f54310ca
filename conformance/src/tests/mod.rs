//! Built-in test catalog.
//!
//! Each module holds the PDU tables for one profile and submits its cases
//! via inventory.


use crate::CatalogCase;

/// All catalog cases as `(name, profile)`, sorted by name.
pub fn list_all() -> Vec<(&'static str, &'static str)> {
    let mut cases: Vec<_> = inventory::iter::<CatalogCase>
        .into_iter()
        .map(|case| (case.name, case.profile))
        .collect();
    cases.sort();
    cases
}

/// Catalog cases for one profile (e.g. "hog").
pub fn list_profile(profile: &str) -> Vec<(&'static str, &'static str)> {
    list_all()
        .into_iter()
        .filter(|(_, p)| *p == profile)
        .collect()
}
