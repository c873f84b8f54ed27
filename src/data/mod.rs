/// Data layer: core types, joins, filters and column statistics.
///
/// Architecture:
/// ```text
///  .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset (outside the pure core)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐      ┌──────────┐
///   │   join    │ ───▶ │ validate  │  key types, select-key ownership
///   └──────────┘      └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  typed predicates, and/or, limit → new Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐      ┌──────────┐
///   │  extrema  │ ───▶ │ ranking   │  normalization, top percentage
///   └──────────┘      └──────────┘
///
///   reshape: columns ↔ rows for per-entity views
/// ```

pub mod extrema;
pub mod filter;
pub mod join;
pub mod loader;
pub mod model;
pub mod ranking;
pub mod reshape;
pub mod validate;
