//! Tabular input: feature matrices with a trailing confound block

mod loader;
mod table;

pub use loader::{
    columns_to_array2, load_feature_table, numeric_column_names, read_csv, table_from_frame,
    TableSpec,
};
pub use table::FeatureTable;
