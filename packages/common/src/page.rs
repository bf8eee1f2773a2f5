use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How many evidence files a page accepts per slot (entry, kind, month, group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceMode {
    /// A new upload replaces the file already in the slot.
    SinglePerSlot,
    Multiple,
}

/// Where a page's monthly figures come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageMode {
    /// The client sends one quantity per month.
    Monthly,
    /// The client sends dated line records; empty monthly input is derived from them.
    LineRecords,
}

/// Per-page settings for the shared submission pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub page_key: String,
    pub category: String,
    pub default_unit: String,
    pub evidence_mode: EvidenceMode,
    pub usage_mode: UsageMode,
}

impl PageConfig {
    pub fn new(
        page_key: &str,
        category: &str,
        default_unit: &str,
        evidence_mode: EvidenceMode,
        usage_mode: UsageMode,
    ) -> Self {
        Self {
            page_key: page_key.to_string(),
            category: category.to_string(),
            default_unit: default_unit.to_string(),
            evidence_mode,
            usage_mode,
        }
    }
}

/// Lookup table from page key to [`PageConfig`].
#[derive(Debug, Clone, Default)]
pub struct PageRegistry {
    pages: HashMap<String, PageConfig>,
}

impl PageRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The commodity pages the application ships with.
    pub fn builtin() -> Self {
        use EvidenceMode::{Multiple, SinglePerSlot};
        use UsageMode::{LineRecords, Monthly};

        let pages = [
            PageConfig::new("wd40", "WD-40", "ML", SinglePerSlot, Monthly),
            PageConfig::new("acetylene", "Acetylene", "kg", SinglePerSlot, Monthly),
            PageConfig::new("refrigerant", "Refrigerant", "kg", Multiple, LineRecords),
            PageConfig::new("septic_tank", "Septic tank", "person-hours", SinglePerSlot, Monthly),
            PageConfig::new("natural_gas", "Natural gas", "m3", SinglePerSlot, Monthly),
            PageConfig::new("urea", "Urea", "L", SinglePerSlot, Monthly),
            PageConfig::new("diesel_generator", "Diesel (stationary)", "L", Multiple, LineRecords),
            PageConfig::new("diesel", "Diesel (mobile)", "L", Multiple, LineRecords),
            PageConfig::new("gasoline", "Gasoline", "L", Multiple, LineRecords),
            PageConfig::new("sf6", "SF6", "kg", Multiple, LineRecords),
            PageConfig::new("generator_test", "Generator test", "hours", SinglePerSlot, Monthly),
            PageConfig::new("lpg", "LPG", "kg", SinglePerSlot, Monthly),
            PageConfig::new("fire_extinguisher", "Fire extinguisher", "kg", Multiple, LineRecords),
            PageConfig::new("welding_rod", "Welding rod", "kg", SinglePerSlot, Monthly),
            PageConfig::new("electricity", "Purchased electricity", "kWh", Multiple, LineRecords),
            PageConfig::new("employee_commute", "Employee commute", "person-km", SinglePerSlot, Monthly),
        ];

        let mut registry = Self::empty();
        for page in pages {
            registry.register(page);
        }
        registry
    }

    pub fn register(&mut self, page: PageConfig) {
        self.pages.insert(page.page_key.clone(), page);
    }

    pub fn get(&self, page_key: &str) -> Option<&PageConfig> {
        self.pages.get(page_key)
    }

    /// Resolves a page key, failing with a validation error for unknown keys.
    pub fn resolve(&self, page_key: &str) -> Result<&PageConfig, CoreError> {
        self.get(page_key)
            .ok_or_else(|| CoreError::validation(format!("unknown page key '{page_key}'")))
    }

    pub fn page_keys(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }
}
