/// Data layer: plate coordinates, canonical tables, loading and writing.
///
/// Architecture:
/// ```text
///  <barcode>_results.txt
///        │
///        ▼
///   ┌──────────┐
///   │  shape    │  locate OD / reporter blocks → ShapeLayout
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse rows → PlateData (two CanonicalTables)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  semicolon CSV (decimal comma) / Parquet
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  drop excluded columns, axis first, sort the rest
///   └──────────┘
/// ```

pub mod filter;
pub mod grammar;
pub mod loader;
pub mod model;
pub mod shape;
pub mod well;
pub mod writer;

pub use model::{CanonicalTable, DataTable, PlateData};
pub use well::{ColumnKey, Well};
