//! Synthetic datasets by resampling.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::DataSet;

/// `{rows?, shuffle = true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Output row count; defaults to the input row count.
    pub rows: Option<usize>,
    /// Shuffle each column independently, breaking the link between values of one record.
    pub shuffle: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            rows: None,
            shuffle: true,
        }
    }
}

/// Build a synthetic dataset with the same schema as `dataset`.
///
/// Rows are drawn with replacement; with `shuffle` every column is then permuted on its own, so
/// output rows keep each column's value distribution but not the original records. The result is
/// repeated or truncated to the requested row count.
pub fn generate_synthetic<R: Rng + ?Sized>(
    dataset: &DataSet,
    config: &SyntheticConfig,
    rng: &mut R,
) -> DataSet {
    let n = dataset.row_count();
    let target = config.rows.unwrap_or(n);
    if n == 0 || target == 0 {
        return DataSet::new(dataset.schema.clone(), Vec::new());
    }

    let mut sample: Vec<Vec<_>> = (0..n)
        .map(|_| dataset.rows[rng.gen_range(0..n)].clone())
        .collect();

    if config.shuffle {
        for col in 0..dataset.schema.fields.len() {
            let mut values: Vec<_> = sample.iter().map(|row| row[col].clone()).collect();
            values.shuffle(rng);
            for (row, v) in sample.iter_mut().zip(values) {
                row[col] = v;
            }
        }
    }

    let rows = sample.iter().cycle().take(target).cloned().collect();
    DataSet::new(dataset.schema.clone(), rows)
}
