//! Dense to compressed sparse row (CSR) conversion for 2-D tensors.

use ndarray::{Array2, ArrayViewD, Ix2};
use thiserror::Error;

/// Errors from CSR conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SparseError {
    #[error("CSR conversion needs a 2-D tensor, got {0} dimensions")]
    Rank(usize),

    #[error("{values} values but {col_indices} column indices")]
    IndexLength { values: usize, col_indices: usize },

    #[error("Row offsets must have {expected} entries, got {given}")]
    OffsetLength { expected: usize, given: usize },

    #[error("Invalid row offsets: {0}")]
    Offsets(String),

    #[error("Column index {index} out of range for {cols} columns")]
    ColumnIndex { index: i64, cols: usize },
}

/// A 2-D matrix in compressed sparse row form.
///
/// Row `r` holds `values[row_offsets[r]..row_offsets[r + 1]]`, with the
/// matching column of each value in `col_indices`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T> {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<T>,
    pub col_indices: Vec<i64>,
    pub row_offsets: Vec<i64>,
}

impl<T> CsrMatrix<T> {
    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// Compress a 2-D dense tensor. `T::default()` is the zero element.
pub fn dense_to_csr<T>(dense: ArrayViewD<'_, T>) -> Result<CsrMatrix<T>, SparseError>
where
    T: Copy + Default + PartialEq,
{
    let rank = dense.ndim();
    let dense = dense
        .into_dimensionality::<Ix2>()
        .map_err(|_| SparseError::Rank(rank))?;
    let (rows, cols) = dense.dim();
    let zero = T::default();

    let mut values = Vec::new();
    let mut col_indices = Vec::new();
    let mut row_offsets = Vec::with_capacity(rows + 1);
    row_offsets.push(0);
    for row in dense.rows() {
        for (col, value) in row.iter().enumerate() {
            if *value != zero {
                values.push(*value);
                col_indices.push(col as i64);
            }
        }
        row_offsets.push(values.len() as i64);
    }

    Ok(CsrMatrix {
        rows,
        cols,
        values,
        col_indices,
        row_offsets,
    })
}

/// Expand a CSR matrix back to a dense row-major array.
pub fn csr_to_dense<T>(csr: &CsrMatrix<T>) -> Result<Array2<T>, SparseError>
where
    T: Copy + Default,
{
    if csr.col_indices.len() != csr.values.len() {
        return Err(SparseError::IndexLength {
            values: csr.values.len(),
            col_indices: csr.col_indices.len(),
        });
    }
    if csr.row_offsets.len() != csr.rows + 1 {
        return Err(SparseError::OffsetLength {
            expected: csr.rows + 1,
            given: csr.row_offsets.len(),
        });
    }
    if csr.row_offsets.first() != Some(&0) {
        return Err(SparseError::Offsets("first offset must be 0".to_string()));
    }
    if csr.row_offsets.last() != Some(&(csr.values.len() as i64)) {
        return Err(SparseError::Offsets(format!(
            "last offset must equal the {} stored values",
            csr.values.len()
        )));
    }
    if csr.row_offsets.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(SparseError::Offsets("offsets must not decrease".to_string()));
    }

    let mut dense = Array2::from_elem((csr.rows, csr.cols), T::default());
    for row in 0..csr.rows {
        let start = csr.row_offsets[row] as usize;
        let end = csr.row_offsets[row + 1] as usize;
        for (value, &col) in csr.values[start..end]
            .iter()
            .zip(&csr.col_indices[start..end])
        {
            if col < 0 || col as usize >= csr.cols {
                return Err(SparseError::ColumnIndex {
                    index: col,
                    cols: csr.cols,
                });
            }
            dense[[row, col as usize]] = *value;
        }
    }
    Ok(dense)
}
