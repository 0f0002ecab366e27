//! Column operations on property tables.
//!
//! A property table is an arrow [`RecordBatch`] built with an explicit row
//! count, so a table without columns still knows how many rows it covers.
//! Every helper here returns a new batch and leaves its input untouched.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, RecordBatchOptions};
use arrow::datatypes::{FieldRef, Schema, SchemaRef};
use arrow::error::ArrowError;

use crate::error::{GraphError, Result};

/// Builds a table from parallel fields and columns, all `num_rows` long.
pub fn assemble(
    fields: Vec<FieldRef>,
    columns: Vec<ArrayRef>,
    num_rows: usize,
) -> std::result::Result<RecordBatch, ArrowError> {
    let schema = Arc::new(Schema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    RecordBatch::try_new_with_options(schema, columns, &options)
}

/// A table with no columns covering `num_rows` rows.
pub fn empty_table(num_rows: usize) -> Result<RecordBatch> {
    Ok(assemble(Vec::new(), Vec::new(), num_rows)?)
}

/// Position of the single column called `name`.
pub fn column_index(schema: &Schema, name: &str) -> Result<usize> {
    let mut matches = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.name() == name)
        .map(|(i, _)| i);
    match (matches.next(), matches.next()) {
        (Some(i), None) => Ok(i),
        (None, _) => Err(GraphError::invalid_argument(format!(
            "property {name} not found"
        ))),
        (Some(_), Some(_)) => Err(GraphError::invalid_argument(format!(
            "property name {name} is ambiguous"
        ))),
    }
}

/// First column name that appears more than once, if any.
pub fn duplicate_name(schema: &SchemaRef) -> Option<String> {
    let mut seen = HashSet::new();
    schema
        .fields()
        .iter()
        .find(|f| !seen.insert(f.name().as_str()))
        .map(|f| f.name().clone())
}

/// Appends the columns of `table` to `current`.
///
/// `table` must have exactly `expected_rows` rows and introduce only new names.
pub fn append_columns(
    current: &RecordBatch,
    table: &RecordBatch,
    expected_rows: usize,
) -> Result<RecordBatch> {
    if table.num_rows() != expected_rows {
        return Err(GraphError::invalid_argument(format!(
            "table has {} rows, expected {}",
            table.num_rows(),
            expected_rows
        )));
    }
    if current.num_columns() > 0 && current.num_rows() != expected_rows {
        return Err(GraphError::invalid_argument(format!(
            "existing properties have {} rows but the topology expects {}",
            current.num_rows(),
            expected_rows
        )));
    }

    let current_schema = current.schema();
    let table_schema = table.schema();
    let mut names: HashSet<&str> = current_schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();
    for field in table_schema.fields() {
        if !names.insert(field.name().as_str()) {
            return Err(GraphError::invalid_argument(format!(
                "property {} already exists",
                field.name()
            )));
        }
    }

    let fields: Vec<FieldRef> = current_schema
        .fields()
        .iter()
        .chain(table_schema.fields().iter())
        .cloned()
        .collect();
    let columns: Vec<ArrayRef> = current
        .columns()
        .iter()
        .chain(table.columns())
        .cloned()
        .collect();

    assemble(fields, columns, expected_rows)
        .map_err(|e| GraphError::invalid_argument(format!("cannot append properties: {e}")))
}

/// Drops the column at `index`; later columns move down by one.
pub fn remove_column(current: &RecordBatch, index: usize) -> Result<RecordBatch> {
    if index >= current.num_columns() {
        return Err(GraphError::OutOfRange {
            index,
            len: current.num_columns(),
        });
    }
    let mut next = current.clone();
    next.remove_column(index);
    Ok(next)
}
