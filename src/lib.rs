//! In-memory dataset algebra: schema-checked joins, typed predicate filters
//! and per-column extrema over small named tables.
//!
//! Every operation borrows its inputs and returns freshly built values; the
//! crate keeps no state between calls.

pub mod data;

pub use data::extrema::{
    Extrema, ExtremaMap, NormalizedRecord, calc_extrema, metric_extrema, normalize_records,
};
pub use data::filter::{
    DatasetFilter, FilterLogic, FilterOp, FilterState, Operand, filter_dataset, matching_indices,
    parse_operand,
};
pub use data::join::{JoinChainError, JoinParams, find_joinable, join, join_joinable, try_join};
pub use data::model::{
    BetterWhen, ColumnMetadata, ColumnType, Dataset, DatasetSchemaOnly, JoinableDataset, Metadata,
    Record, Schema, SchemaViolation, Source, Value,
};
pub use data::ranking::{MetricRank, closest_records, rank_metrics, top_percentage};
pub use data::reshape::{FIELD_NAME_COLUMN, transpose};
pub use data::validate::{JoinIssue, JoinRejected, JoinSide, can_join, check_join};
