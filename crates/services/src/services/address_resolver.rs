//! Maps free-text addresses onto canonical province and district names.
//!
//! Matching is case-sensitive substring search and the first hit in scan
//! order wins. A shorter name contained in a longer one (`Quận 1` inside
//! `Quận 10`) shadows it when it is scanned first.

use std::sync::Arc;

use moka::sync::Cache;
use serde::Serialize;
use ts_rs::TS;

use super::{
    location_directory::Directory,
    province::{PROVINCE_ALIASES, Province},
};

/// Official district-level prefixes and the abbreviations written in their place.
const DISTRICT_PREFIXES: &[(&str, &str)] = &[
    ("Quận ", "Q"),
    ("Huyện ", "H"),
    ("Thành phố ", "TP"),
    ("Thị xã ", "TX"),
];

const ALIAS_CACHE_CAPACITY: u64 = 128;

/// Province and district found in a free-text address. Either may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
pub struct ResolvedAddress {
    pub address: String,
    #[ts(type = "string | null")]
    pub province: Option<Province>,
    pub district: Option<String>,
}

/// Alias forms of `district`, most specific first. Returns nothing for names
/// without a known prefix.
pub fn district_aliases(district: &str) -> Vec<String> {
    DISTRICT_PREFIXES
        .iter()
        .find_map(|(prefix, abbreviation)| {
            let rest = district.strip_prefix(prefix)?.trim();
            if rest.is_empty() {
                return None;
            }
            Some(vec![
                format!("{abbreviation}.{rest}"),
                format!("{abbreviation}. {rest}"),
                format!("{abbreviation}{rest}"),
                format!("{abbreviation} {rest}"),
                rest.to_string(),
            ])
        })
        .unwrap_or_default()
}

/// Ordered `(alias, district)` pairs for a district list. The first
/// occurrence of an alias keeps its target.
fn derive_alias_table(districts: &[String]) -> Vec<(String, String)> {
    let mut table: Vec<(String, String)> = Vec::new();
    for district in districts {
        for alias in district_aliases(district) {
            if !table.iter().any(|(existing, _)| *existing == alias) {
                table.push((alias, district.clone()));
            }
        }
    }
    table
}

/// Substring matcher over a [`Directory`].
/// Clones share the alias cache.
#[derive(Clone)]
pub struct AddressResolver {
    /// Keyed by province and the directory timestamp the aliases came from.
    alias_tables: Cache<(Province, i64), Arc<Vec<(String, String)>>>,
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressResolver {
    pub fn new() -> Self {
        Self {
            alias_tables: Cache::builder().max_capacity(ALIAS_CACHE_CAPACITY).build(),
        }
    }

    /// Canonical names in enumeration order, then the alias table in order.
    pub fn match_province(&self, address: &str) -> Option<Province> {
        Province::all()
            .find(|province| address.contains(province.canonical_name()))
            .or_else(|| {
                PROVINCE_ALIASES
                    .iter()
                    .find(|(alias, _)| address.contains(alias.as_str()))
                    .map(|(_, province)| *province)
            })
    }

    /// District names of `province` first, then their derived aliases.
    pub fn match_district(
        &self,
        address: &str,
        province: Province,
        directory: &Directory,
    ) -> Option<String> {
        let districts = directory.get_districts(province.canonical_name());

        if let Some(district) = districts.iter().find(|d| address.contains(d.as_str())) {
            return Some(district.clone());
        }

        let aliases = self
            .alias_tables
            .get_with((province, directory.timestamp()), || {
                Arc::new(derive_alias_table(&districts))
            });
        aliases
            .iter()
            .find(|(alias, _)| address.contains(alias.as_str()))
            .map(|(_, district)| district.clone())
    }

    pub fn resolve(&self, address: &str, directory: &Directory) -> ResolvedAddress {
        let province = self.match_province(address);
        let district =
            province.and_then(|province| self.match_district(address, province, directory));

        ResolvedAddress {
            address: address.to_string(),
            province,
            district,
        }
    }

    /// Number of memoized alias tables.
    pub fn cached_alias_tables(&self) -> u64 {
        self.alias_tables.run_pending_tasks();
        self.alias_tables.entry_count()
    }
}
