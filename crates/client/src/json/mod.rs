//! Backend over a directory of JSON files.
//!
//! Layout under the content root:
//!
//! ```text
//! models/metadata.json            list of model descriptors
//! models/<model>.json             field descriptors of one model
//! content/<model>/<locale>.json   records of a localized model
//! content/<model>/<model>.json    records of a non-localized model
//! ```

pub mod content;
pub mod executor;
pub mod reader;
pub mod relation;

pub use content::JsonContentManager;
pub use executor::JsonQueryExecutor;
pub use reader::{ContentReader, FsReader};
pub use relation::JsonRelationManager;
