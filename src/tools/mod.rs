//! Tools module - local functions the model can call
//!
//! # Overview
//!
//! - `Tool` trait: The interface that all tools must implement
//! - `ToolContext`: Execution context (customer, conversation)
//! - `ToolRegistry`: Static name → tool map built once at startup
//! - `catalog`: product lookup tools backed by a JSON catalog file
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use wagate::tools::catalog::{register_catalog_tools, Product, ProductCatalog};
//! use wagate::tools::{ToolContext, ToolRegistry};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let catalog = ProductCatalog::new(vec![Product {
//!     id: "42".into(),
//!     name: "Jollof Rice".into(),
//!     price: Some(2500.0),
//!     description: String::new(),
//!     labels: vec![],
//!     image: None,
//!     active: true,
//! }]);
//! let mut registry = ToolRegistry::new();
//! register_catalog_tools(&mut registry, Arc::new(catalog));
//!
//! let result = registry
//!     .execute("get_product_info", json!({"product_id": "42"}), &ToolContext::new())
//!     .await
//!     .unwrap();
//! assert_eq!(result["name"], "Jollof Rice");
//! assert_eq!(registry.definitions().len(), 2);
//! # });
//! ```

pub mod catalog;
mod registry;
mod types;

pub use registry::ToolRegistry;
pub use types::{Tool, ToolContext};
