//! Product catalog tools.
//!
//! Loads a JSON array of products from `tools.catalog_path` and exposes
//! `get_product_info` and `check_inventory` to the model.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{GatewayError, Result};

use super::ToolRegistry;

/// Maximum number of matches `check_inventory` returns.
pub const MAX_INVENTORY_RESULTS: usize = 5;

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Product {
    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self.labels.iter().any(|l| l.to_lowercase().contains(needle))
    }
}

/// In-memory product catalog.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: Vec<Product>,
}

impl ProductCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Load a catalog file (a JSON array of products).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        let products: Vec<Product> = serde_json::from_str(&content).map_err(|e| {
            GatewayError::Config(format!("invalid catalog {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), products = products.len(), "Loaded product catalog");
        Ok(Self { products })
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Look up an active product by id.
    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.products
            .iter()
            .find(|p| p.active && p.id == product_id.trim())
    }

    /// Case-insensitive search over name, description and labels.
    ///
    /// An empty query lists the first active products.
    pub fn search(&self, query: &str) -> Vec<&Product> {
        let needle = query.trim().to_lowercase();
        self.products
            .iter()
            .filter(|p| p.active)
            .filter(|p| needle.is_empty() || p.matches(&needle))
            .take(MAX_INVENTORY_RESULTS)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ProductInfoArgs {
    product_id: String,
}

#[derive(Debug, Deserialize)]
struct InventoryArgs {
    #[serde(default)]
    query: String,
}

/// Register the catalog tools on a registry.
pub fn register_catalog_tools(registry: &mut ToolRegistry, catalog: Arc<ProductCatalog>) {
    let lookup = Arc::clone(&catalog);
    registry.register_fn::<ProductInfoArgs, _, _>(
        "get_product_info",
        "Get name, price, labels and description of a product by its id.",
        json!({
            "type": "object",
            "properties": {
                "product_id": {"type": "string", "description": "Catalog product id"}
            },
            "required": ["product_id"]
        }),
        move |args| {
            let catalog = Arc::clone(&lookup);
            async move {
                let product = catalog.get(&args.product_id).ok_or_else(|| {
                    GatewayError::ToolExecution(format!("no product with id {}", args.product_id))
                })?;
                Ok(serde_json::to_value(product)?)
            }
        },
    );

    registry.register_fn::<InventoryArgs, _, _>(
        "check_inventory",
        "Search the inventory for products matching the query. Returns up to 5 products.",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Words to match against product names, descriptions and labels"}
            }
        }),
        move |args| {
            let catalog = Arc::clone(&catalog);
            async move {
                let found: Vec<Value> = catalog
                    .search(&args.query)
                    .into_iter()
                    .map(|p| {
                        json!({
                            "id": p.id,
                            "name": p.name,
                            "price": p.price,
                            "labels": p.labels,
                            "description": p.description,
                        })
                    })
                    .collect();
                Ok(Value::Array(found))
            }
        },
    );
}
