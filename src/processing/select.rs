//! Column projection.

use crate::error::SkipReason;
use crate::types::DataSet;

use super::SkipSink;

/// Keep only the columns named in `fields`, in the requested order.
///
/// Unknown names are dropped silently and repeated names are kept once. When `fields` is absent
/// or empty, or none of the names exist, the dataset is returned unchanged so that a malformed
/// rule cannot collapse a table to zero columns.
pub fn select_fields(dataset: &DataSet, fields: Option<&[String]>) -> DataSet {
    select_fields_observed(dataset, fields, &mut |_| {})
}

pub(crate) fn select_fields_observed(
    dataset: &DataSet,
    fields: Option<&[String]>,
    on_skip: SkipSink<'_>,
) -> DataSet {
    let Some(fields) = fields.filter(|f| !f.is_empty()) else {
        return dataset.clone();
    };

    let mut indices: Vec<usize> = Vec::with_capacity(fields.len());
    for name in fields {
        match dataset.schema.index_of(name) {
            Some(idx) if !indices.contains(&idx) => indices.push(idx),
            Some(_) => {}
            None => on_skip(SkipReason::UnknownField {
                field: name.clone(),
            }),
        }
    }

    if indices.is_empty() {
        return dataset.clone();
    }
    dataset.project(&indices)
}
