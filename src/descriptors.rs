use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::models::ItemDescriptor;

/// Total lookup from item id to display metadata.
///
/// Implementations must never fail: unknown ids resolve to a placeholder so a
/// single missing entry cannot blank a report.
pub trait DescriptorLookup {
    fn describe(&self, item_id: &str) -> ItemDescriptor;
}

impl<F> DescriptorLookup for F
where
    F: Fn(&str) -> ItemDescriptor,
{
    fn describe(&self, item_id: &str) -> ItemDescriptor {
        self(item_id)
    }
}

pub const PLACEHOLDER_CATEGORY: &str = "Uncategorized";
pub const PLACEHOLDER_KIND: &str = "unknown";

/// Descriptor used for ids the catalog does not know: the id doubles as the name.
pub fn placeholder(item_id: &str) -> ItemDescriptor {
    ItemDescriptor {
        name: item_id.to_string(),
        category: PLACEHOLDER_CATEGORY.to_string(),
        kind: PLACEHOLDER_KIND.to_string(),
        discount_percent: 0,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, ItemDescriptor>,
}

#[derive(Deserialize)]
struct CatalogEntry {
    id: String,
    #[serde(flatten)]
    descriptor: ItemDescriptor,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item_id: impl Into<String>, descriptor: ItemDescriptor) {
        self.entries.insert(item_id.into(), descriptor);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let rows: Vec<CatalogEntry> =
            serde_json::from_str(json).context("catalog must be a JSON array of items")?;
        let mut catalog = Self::new();
        for row in rows {
            catalog.insert(row.id, row.descriptor);
        }
        Ok(catalog)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let catalog = Self::from_json_str(&json)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?;
        tracing::info!(items = catalog.len(), path = %path.display(), "descriptor catalog loaded");
        Ok(catalog)
    }
}

impl DescriptorLookup for Catalog {
    fn describe(&self, item_id: &str) -> ItemDescriptor {
        match self.entries.get(item_id) {
            Some(descriptor) => descriptor.clone(),
            None => {
                tracing::debug!(item_id, "no descriptor for item; using placeholder");
                placeholder(item_id)
            }
        }
    }
}
