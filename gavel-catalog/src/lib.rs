//! gavel-catalog: numbered pieces of evidence ("truth bullets") per guild.
//!
//! Each guild's catalog lives in its own JSON file under a data directory:
//!
//! ```json
//! { "bullets": { "1": { "id": 1, "name": "...", "description": "...", "image_url": null } },
//!   "next_id": 2 }
//! ```
//!
//! Ids are assigned monotonically and never reused, even after removal.

mod store;

pub use store::{Catalog, CatalogError, TruthBullet};
