use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use dataset_algebra::data::loader::load_file;
use dataset_algebra::{
    Dataset, DatasetFilter, DatasetSchemaOnly, FilterLogic, FilterOp, FilterState, JoinParams,
    calc_extrema, filter_dataset, find_joinable, metric_extrema, transpose, try_join,
};

#[derive(Parser)]
#[command(name = "dataset-algebra")]
#[command(about = "Join, filter and summarize tabular datasets (.json / .csv)")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Join two datasets on shared key columns
    Join {
        first: PathBuf,
        second: PathBuf,

        /// Join key column (repeatable)
        #[arg(long = "on", required = true)]
        join_keys: Vec<String>,

        /// Columns taken from the first dataset (default: all)
        #[arg(long)]
        select_first: Vec<String>,

        /// Columns taken from the second dataset (default: all)
        #[arg(long)]
        select_second: Vec<String>,

        /// Drop rows without a match on both sides
        #[arg(long)]
        inner: bool,

        /// Name of the joined dataset (default: "<first> / <second>")
        #[arg(long)]
        name: Option<String>,
    },

    /// Keep the rows matching typed predicates
    Filter {
        dataset: PathBuf,

        /// Predicate as FIELD:OP:VALUE, e.g. "Score:gt:5" or "Score:range:1,9"
        #[arg(short = 'w', long = "where")]
        predicates: Vec<String>,

        /// Combine predicates with OR instead of AND
        #[arg(long)]
        any: bool,

        /// Keep at most this many rows
        #[arg(long)]
        limit: Option<usize>,

        /// Read the whole filter state from a JSON file instead
        #[arg(long, conflicts_with_all = ["predicates", "any", "limit"])]
        state: Option<PathBuf>,
    },

    /// Min/max of numeric columns (`null` for a column without numbers)
    Extrema {
        dataset: PathBuf,

        /// Column to measure (default: every numeric column)
        #[arg(long = "field")]
        fields: Vec<String>,
    },

    /// List the candidates that share same-typed columns with a target
    Joinable {
        target: PathBuf,
        candidates: Vec<PathBuf>,
    },

    /// One row per column, one column per entity
    Transpose {
        dataset: PathBuf,

        /// Column naming each entity
        #[arg(long, default_value = "Country")]
        identity: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Args::parse().command {
        Command::Join {
            first,
            second,
            join_keys,
            select_first,
            select_second,
            inner,
            name,
        } => {
            let first = load_file(&first)?;
            let second = load_file(&second)?;
            let params = JoinParams {
                name: name.unwrap_or_else(|| format!("{} / {}", first.name, second.name)),
                first_select_keys: or_all_columns(select_first, &first),
                second_select_keys: or_all_columns(select_second, &second),
                first_dataset: &first,
                second_dataset: &second,
                join_keys,
                include_missing_keys: !inner,
            };
            print_json(&try_join(&params)?)
        }
        Command::Filter {
            dataset,
            predicates,
            any,
            limit,
            state,
        } => {
            let dataset = load_file(&dataset)?;
            let state = match state {
                Some(path) => read_state(&path)?,
                None => FilterState {
                    filters: predicates
                        .iter()
                        .map(|p| parse_predicate(p, &dataset))
                        .collect::<Result<_>>()?,
                    logic: if any { FilterLogic::Or } else { FilterLogic::And },
                    limit,
                },
            };
            print_json(&filter_dataset(&dataset, &state))
        }
        Command::Extrema { dataset, fields } => {
            let dataset = load_file(&dataset)?;
            if fields.is_empty() {
                print_json(&metric_extrema(&dataset))
            } else {
                print_json(&calc_extrema(&dataset.data, &fields))
            }
        }
        Command::Joinable { target, candidates } => {
            let target = load_file(&target)?;
            let listings = candidates
                .iter()
                .map(|path| load_file(path).map(|ds| ds.schema_only()))
                .collect::<Result<Vec<DatasetSchemaOnly>>>()?;
            print_json(&find_joinable(&target, &listings))
        }
        Command::Transpose { dataset, identity } => {
            let dataset = load_file(&dataset)?;
            if !dataset.schema.contains_key(&identity) {
                bail!("'{}' has no column '{identity}'", dataset.name);
            }
            print_json(&transpose(&dataset, &identity))
        }
    }
}

fn or_all_columns(keys: Vec<String>, dataset: &Dataset) -> Vec<String> {
    if keys.is_empty() {
        dataset.column_names()
    } else {
        keys
    }
}

fn read_state(path: &Path) -> Result<FilterState> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).context("parsing filter state")
}

/// `FIELD:OP:VALUE` → filter, checking the operator against the column type.
fn parse_predicate(text: &str, dataset: &Dataset) -> Result<DatasetFilter> {
    let mut parts = text.splitn(3, ':');
    let (Some(field), Some(op)) = (parts.next(), parts.next()) else {
        bail!("predicate '{text}' is not FIELD:OP:VALUE");
    };
    let raw = parts.next().unwrap_or("");
    let op: FilterOp = op.parse()?;
    let column_type = *dataset
        .schema
        .get(field)
        .with_context(|| format!("'{}' has no column '{field}'", dataset.name))?;
    if !FilterOp::for_type(column_type).contains(&op) {
        bail!("operator '{op}' does not apply to {column_type} column '{field}'");
    }
    Ok(DatasetFilter::from_text(op, field, column_type, raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
