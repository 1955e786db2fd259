/// Data layer: schema, loading, caching, filtering and aggregation.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → rename columns → typed Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  store    │  read once, share Arc<Dataset>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterSpec → FilteredView (record indices)
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ aggregate  │  CategoryCount per field, CoordinateExtract
///   └───────────┘
/// ```

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod loader;
pub mod model;
pub mod store;
