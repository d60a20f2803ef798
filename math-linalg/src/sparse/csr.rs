//! Compressed Sparse Row (CSR) matrix format
//!
//! CSR format stores:
//! - `values`: Non-zero entries in row-major order
//! - `col_indices`: Column index for each value
//! - `row_ptrs`: Index into values/col_indices where each row starts
//!
//! Besides matrix-vector products the multigrid engine needs sparse
//! products: `transpose`, `matmul` and the triple products [`CsrMatrix::rap`]
//! and [`CsrMatrix::ptap`]. Coarse-grid operators are formed in two phases,
//! [`CsrMatrix::product_pattern`] once and [`CsrMatrix::product_values_into`]
//! on every setup, so a fixed pattern keeps its storage.

use crate::traits::ComplexField;
use ndarray::{Array1, Array2};
use num_traits::Zero;
use std::ops::Range;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Row count above which matrix-vector products go parallel
#[cfg(feature = "rayon")]
const PARALLEL_ROW_THRESHOLD: usize = 2048;

/// Compressed Sparse Row (CSR) matrix format
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T: ComplexField> {
    /// Number of rows
    pub num_rows: usize,
    /// Number of columns
    pub num_cols: usize,
    /// Non-zero values in row-major order
    pub values: Vec<T>,
    /// Column indices for each value
    pub col_indices: Vec<usize>,
    /// Row pointers: row_ptrs[i] is the start index in values/col_indices for row i
    /// row_ptrs[num_rows] = nnz (total number of non-zeros)
    pub row_ptrs: Vec<usize>,
}

/// Left factor of a sparse product, read either as stored or transposed
///
/// `Transposed(m)` stands for `mᵀ` without materializing it.
#[derive(Debug, Clone, Copy)]
pub enum LeftFactor<'a, T: ComplexField> {
    /// The matrix itself
    Rows(&'a CsrMatrix<T>),
    /// The transpose of the stored matrix
    Transposed(&'a CsrMatrix<T>),
}

impl<T: ComplexField> LeftFactor<'_, T> {
    /// Rows of the factor as used in the product
    pub fn num_rows(&self) -> usize {
        match self {
            LeftFactor::Rows(m) => m.num_rows,
            LeftFactor::Transposed(m) => m.num_cols,
        }
    }

    fn inner_dim(&self) -> usize {
        match self {
            LeftFactor::Rows(m) => m.num_cols,
            LeftFactor::Transposed(m) => m.num_rows,
        }
    }
}

impl<T: ComplexField> CsrMatrix<T> {
    /// Create a new empty CSR matrix
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            values: Vec::new(),
            col_indices: Vec::new(),
            row_ptrs: vec![0; num_rows + 1],
        }
    }

    /// Create a CSR matrix from a dense matrix
    ///
    /// Only stores entries with magnitude > threshold
    pub fn from_dense(dense: &Array2<T>, threshold: T::Real) -> Self {
        let mut builder = CsrBuilder::new(dense.nrows(), dense.ncols());
        for row in dense.rows() {
            builder.add_row_entries(
                row.iter()
                    .copied()
                    .enumerate()
                    .filter(|(_, v)| v.norm() > threshold),
            );
        }
        builder.finish()
    }

    /// Create a CSR matrix from COO (Coordinate) format triplets
    ///
    /// Triplets are (row, col, value). Duplicate entries are summed; explicit
    /// zeros are kept so that the sparsity pattern only depends on structure.
    pub fn from_triplets(
        num_rows: usize,
        num_cols: usize,
        mut triplets: Vec<(usize, usize, T)>,
    ) -> Self {
        triplets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut values: Vec<T> = Vec::with_capacity(triplets.len());
        let mut col_indices: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut row_counts = vec![0usize; num_rows];
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            debug_assert!(row < num_rows && col < num_cols);
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += val;
                }
                continue;
            }
            values.push(val);
            col_indices.push(col);
            row_counts[row] += 1;
            last = Some((row, col));
        }

        let mut row_ptrs = Vec::with_capacity(num_rows + 1);
        row_ptrs.push(0);
        let mut acc = 0;
        for count in row_counts {
            acc += count;
            row_ptrs.push(acc);
        }

        Self {
            num_rows,
            num_cols,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Number of non-zero entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Get the range of indices in values/col_indices for a given row
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.row_ptrs[row]..self.row_ptrs[row + 1]
    }

    /// Get the (col, value) pairs for a row
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let range = self.row_range(row);
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// True when both matrices have the same shape and sparsity pattern
    pub fn same_pattern(&self, other: &CsrMatrix<T>) -> bool {
        self.num_rows == other.num_rows
            && self.num_cols == other.num_cols
            && self.row_ptrs == other.row_ptrs
            && self.col_indices == other.col_indices
    }

    /// Matrix-vector product: y = A * x
    pub fn matvec(&self, x: &Array1<T>) -> Array1<T> {
        let mut y = Array1::from_elem(self.num_rows, T::zero());
        self.matvec_into(x, &mut y);
        y
    }

    /// Matrix-vector product into an existing vector: y = A * x
    ///
    /// Uses rayon when the `rayon` feature is enabled and the matrix is large
    /// enough to benefit from it.
    pub fn matvec_into(&self, x: &Array1<T>, y: &mut Array1<T>) {
        assert_eq!(x.len(), self.num_cols, "Input vector size mismatch");
        assert_eq!(y.len(), self.num_rows, "Output vector size mismatch");

        #[cfg(feature = "rayon")]
        {
            if self.num_rows >= PARALLEL_ROW_THRESHOLD {
                if let Some(out) = y.as_slice_mut() {
                    out.par_iter_mut()
                        .enumerate()
                        .for_each(|(i, yi)| *yi = self.row_dot(i, x));
                    return;
                }
            }
        }

        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.row_dot(i, x);
        }
    }

    #[inline]
    fn row_dot(&self, row: usize, x: &Array1<T>) -> T {
        let mut sum = T::zero();
        for idx in self.row_range(row) {
            sum += self.values[idx] * x[self.col_indices[idx]];
        }
        sum
    }

    /// Matrix-vector product with accumulation: y += A * x
    pub fn matvec_add(&self, x: &Array1<T>, y: &mut Array1<T>) {
        assert_eq!(x.len(), self.num_cols, "Input vector size mismatch");
        assert_eq!(y.len(), self.num_rows, "Output vector size mismatch");

        for (i, yi) in y.iter_mut().enumerate() {
            *yi += self.row_dot(i, x);
        }
    }

    /// Transpose matrix-vector product: y = A^T * x
    pub fn matvec_transpose(&self, x: &Array1<T>) -> Array1<T> {
        let mut y = Array1::from_elem(self.num_cols, T::zero());
        self.matvec_transpose_add(x, &mut y);
        y
    }

    /// Transpose matrix-vector product into an existing vector: y = A^T * x
    pub fn matvec_transpose_into(&self, x: &Array1<T>, y: &mut Array1<T>) {
        y.fill(T::zero());
        self.matvec_transpose_add(x, y);
    }

    /// Transpose matrix-vector product with accumulation: y += A^T * x
    pub fn matvec_transpose_add(&self, x: &Array1<T>, y: &mut Array1<T>) {
        assert_eq!(x.len(), self.num_rows, "Input vector size mismatch");
        assert_eq!(y.len(), self.num_cols, "Output vector size mismatch");

        for i in 0..self.num_rows {
            let xi = x[i];
            for idx in self.row_range(i) {
                y[self.col_indices[idx]] += self.values[idx] * xi;
            }
        }
    }

    /// Residual `r = b - A x` without allocating
    pub fn residual_into(&self, b: &Array1<T>, x: &Array1<T>, r: &mut Array1<T>) {
        self.matvec_into(x, r);
        r.zip_mut_with(b, |ri, &bi| *ri = bi - *ri);
    }

    /// Get element at (i, j), returns 0 if not stored
    pub fn get(&self, i: usize, j: usize) -> T {
        self.row_entries(i)
            .find(|&(col, _)| col == j)
            .map_or_else(T::zero, |(_, v)| v)
    }

    /// Extract diagonal elements
    pub fn diagonal(&self) -> Array1<T> {
        let n = self.num_rows.min(self.num_cols);
        Array1::from_iter((0..n).map(|i| self.get(i, i)))
    }

    /// Scale all values by a scalar
    pub fn scale(&mut self, scalar: T) {
        for val in &mut self.values {
            *val *= scalar;
        }
    }

    /// Scale row `i` by `weights[i]`
    pub fn scale_rows(&mut self, weights: &Array1<T>) {
        assert_eq!(weights.len(), self.num_rows, "Row weight size mismatch");
        for i in 0..self.num_rows {
            let w = weights[i];
            for idx in self.row_range(i) {
                self.values[idx] *= w;
            }
        }
    }

    /// Create identity matrix in CSR format
    pub fn identity(n: usize) -> Self {
        Self {
            num_rows: n,
            num_cols: n,
            values: vec![T::one(); n],
            col_indices: (0..n).collect(),
            row_ptrs: (0..=n).collect(),
        }
    }

    /// Convert to dense matrix (for debugging/small matrices)
    pub fn to_dense(&self) -> Array2<T> {
        let mut dense = Array2::from_elem((self.num_rows, self.num_cols), T::zero());

        for i in 0..self.num_rows {
            for (j, v) in self.row_entries(i) {
                dense[[i, j]] = v;
            }
        }

        dense
    }

    /// Explicit transpose, rows sorted by column
    pub fn transpose(&self) -> CsrMatrix<T> {
        let mut counts = vec![0usize; self.num_cols + 1];
        for &j in &self.col_indices {
            counts[j + 1] += 1;
        }
        for j in 0..self.num_cols {
            counts[j + 1] += counts[j];
        }
        let row_ptrs = counts.clone();
        let mut next = counts;

        let mut col_indices = vec![0usize; self.nnz()];
        let mut values = vec![T::zero(); self.nnz()];
        for i in 0..self.num_rows {
            for idx in self.row_range(i) {
                let j = self.col_indices[idx];
                let dst = next[j];
                col_indices[dst] = i;
                values[dst] = self.values[idx];
                next[j] += 1;
            }
        }

        CsrMatrix {
            num_rows: self.num_cols,
            num_cols: self.num_rows,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Sparse product C = A * B
    ///
    /// Row-wise sorted accumulation. Structural entries are kept even when
    /// they cancel to zero, so repeated products over a fixed pattern return
    /// a fixed pattern.
    pub fn matmul(&self, other: &CsrMatrix<T>) -> CsrMatrix<T> {
        assert_eq!(
            self.num_cols, other.num_rows,
            "Matrix dimension mismatch: A.cols ({}) != B.rows ({})",
            self.num_cols, other.num_rows
        );

        let m = self.num_rows;
        let n = other.num_cols;

        let mut values = Vec::with_capacity(self.nnz() + other.nnz());
        let mut col_indices = Vec::with_capacity(self.nnz() + other.nnz());
        let mut row_ptrs = Vec::with_capacity(m + 1);
        row_ptrs.push(0);

        let mut row_data: Vec<(usize, T)> = Vec::new();
        for i in 0..m {
            row_data.clear();
            for (k, a_ik) in self.row_entries(i) {
                for (j, b_kj) in other.row_entries(k) {
                    row_data.push((j, a_ik * b_kj));
                }
            }
            // stable sort keeps the summation order fixed per column
            row_data.sort_by_key(|&(j, _)| j);

            let mut iter = row_data.iter().copied();
            if let Some((first_j, first_v)) = iter.next() {
                let mut current_j = first_j;
                let mut current_val = first_v;
                for (j, val) in iter {
                    if j == current_j {
                        current_val += val;
                    } else {
                        col_indices.push(current_j);
                        values.push(current_val);
                        current_j = j;
                        current_val = val;
                    }
                }
                col_indices.push(current_j);
                values.push(current_val);
            }
            row_ptrs.push(values.len());
        }

        CsrMatrix {
            num_rows: m,
            num_cols: n,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Triple product `R * A * P`
    pub fn rap(r: &CsrMatrix<T>, a: &CsrMatrix<T>, p: &CsrMatrix<T>) -> CsrMatrix<T> {
        let ap = a.matmul(p);
        r.matmul(&ap)
    }

    /// Triple product `Pᵀ * A * P`
    pub fn ptap(a: &CsrMatrix<T>, p: &CsrMatrix<T>) -> CsrMatrix<T> {
        let ap = a.matmul(p);
        p.transpose().matmul(&ap)
    }

    /// Position of entry `(i, j)` in `values`, if it is structurally present
    pub fn position(&self, i: usize, j: usize) -> Option<usize> {
        let range = self.row_range(i);
        self.col_indices[range.clone()]
            .binary_search(&j)
            .ok()
            .map(|offset| range.start + offset)
    }

    /// Sparsity pattern of `L * B`, with every value zero
    ///
    /// Columns are sorted within each row. Fill it with
    /// [`CsrMatrix::product_values_into`].
    pub fn product_pattern(left: LeftFactor<'_, T>, b: &CsrMatrix<T>) -> CsrMatrix<T> {
        assert_eq!(
            left.inner_dim(),
            b.num_rows,
            "Matrix dimension mismatch: L.cols ({}) != B.rows ({})",
            left.inner_dim(),
            b.num_rows
        );

        let mut rows: Vec<Vec<usize>> = vec![Vec::new(); left.num_rows()];
        match left {
            LeftFactor::Rows(l) => {
                for (i, cols) in rows.iter_mut().enumerate() {
                    for k in l.col_indices[l.row_range(i)].iter() {
                        cols.extend_from_slice(&b.col_indices[b.row_range(*k)]);
                    }
                }
            }
            LeftFactor::Transposed(m) => {
                for k in 0..m.num_rows {
                    let reached = &b.col_indices[b.row_range(k)];
                    for i in m.col_indices[m.row_range(k)].iter() {
                        rows[*i].extend_from_slice(reached);
                    }
                }
            }
        }

        let nnz_estimate = rows.iter().map(Vec::len).sum();
        let mut builder = CsrBuilder::with_capacity(rows.len(), b.num_cols, nnz_estimate);
        for cols in rows.iter_mut() {
            cols.sort_unstable();
            cols.dedup();
            builder.add_row_entries(cols.iter().map(|&j| (j, T::zero())));
        }
        builder.finish()
    }

    /// Numeric phase of `self = diag(w) * L * B` over the existing pattern
    ///
    /// No allocation takes place. Returns `false` when the shape differs or
    /// the product reaches an entry outside the pattern; `values` are then
    /// partially overwritten and must be rebuilt.
    pub fn product_values_into(
        &mut self,
        left: LeftFactor<'_, T>,
        row_weights: Option<&Array1<T>>,
        b: &CsrMatrix<T>,
    ) -> bool {
        if self.num_rows != left.num_rows() || self.num_cols != b.num_cols || left.inner_dim() != b.num_rows {
            return false;
        }
        if let Some(w) = row_weights {
            assert_eq!(w.len(), self.num_rows, "Row weight size mismatch");
        }

        self.values.fill(T::zero());
        match left {
            LeftFactor::Rows(l) => {
                for i in 0..l.num_rows {
                    for (k, l_ik) in l.row_entries(i) {
                        let c = row_weights.map_or(l_ik, |w| w[i] * l_ik);
                        if !self.accumulate_row(i, c, b, k) {
                            return false;
                        }
                    }
                }
            }
            LeftFactor::Transposed(m) => {
                for k in 0..m.num_rows {
                    for (i, m_ki) in m.row_entries(k) {
                        let c = row_weights.map_or(m_ki, |w| w[i] * m_ki);
                        if !self.accumulate_row(i, c, b, k) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// `self[i, :] += c * b[k, :]` within the pattern
    fn accumulate_row(&mut self, i: usize, c: T, b: &CsrMatrix<T>, k: usize) -> bool {
        for (j, b_kj) in b.row_entries(k) {
            match self.position(i, j) {
                Some(pos) => self.values[pos] += c * b_kj,
                None => return false,
            }
        }
        true
    }

    /// Max absolute row sum
    pub fn norm_inf(&self) -> T::Real {
        (0..self.num_rows)
            .map(|i| {
                self.row_entries(i)
                    .fold(T::Real::zero(), |acc, (_, v)| acc + v.norm())
            })
            .fold(T::Real::zero(), |acc, s| if s > acc { s } else { acc })
    }
}

/// Builder for constructing CSR matrices row by row
pub struct CsrBuilder<T: ComplexField> {
    num_rows: usize,
    num_cols: usize,
    values: Vec<T>,
    col_indices: Vec<usize>,
    row_ptrs: Vec<usize>,
}

impl<T: ComplexField> CsrBuilder<T> {
    /// Create a new CSR builder
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self::with_capacity(num_rows, num_cols, 0)
    }

    /// Create a new CSR builder with estimated non-zeros
    pub fn with_capacity(num_rows: usize, num_cols: usize, nnz_estimate: usize) -> Self {
        let mut row_ptrs = Vec::with_capacity(num_rows + 1);
        row_ptrs.push(0);
        Self {
            num_rows,
            num_cols,
            values: Vec::with_capacity(nnz_estimate),
            col_indices: Vec::with_capacity(nnz_estimate),
            row_ptrs,
        }
    }

    /// Add entries for the next row (must be added in column order)
    pub fn add_row_entries(&mut self, entries: impl Iterator<Item = (usize, T)>) {
        for (col, val) in entries {
            debug_assert!(col < self.num_cols);
            self.values.push(val);
            self.col_indices.push(col);
        }
        self.row_ptrs.push(self.values.len());
    }

    /// Finish building and return the CSR matrix
    pub fn finish(mut self) -> CsrMatrix<T> {
        while self.row_ptrs.len() < self.num_rows + 1 {
            self.row_ptrs.push(self.values.len());
        }

        CsrMatrix {
            num_rows: self.num_rows,
            num_cols: self.num_cols,
            values: self.values,
            col_indices: self.col_indices,
            row_ptrs: self.row_ptrs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use num_complex::Complex64;

    fn nonsymmetric() -> CsrMatrix<f64> {
        let dense = array![[4.0, -1.0, 0.0], [-2.0, 4.0, -1.0], [0.5, -3.0, 4.0]];
        CsrMatrix::from_dense(&dense, 0.0)
    }

    #[test]
    fn test_csr_from_dense() {
        let dense = array![
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(2.0, 1.0), Complex64::new(3.0, 0.0)],
        ];
        let csr = CsrMatrix::from_dense(&dense, 1e-15);

        assert_eq!(csr.nnz(), 3);
        assert_eq!(csr.row_ptrs, vec![0, 1, 3]);
        assert_eq!(csr.col_indices, vec![0, 0, 1]);
    }

    #[test]
    fn test_csr_matvec() {
        let a = nonsymmetric();
        let x = array![1.0, 2.0, 3.0];
        let y = a.matvec(&x);

        assert_relative_eq!(y[0], 2.0);
        assert_relative_eq!(y[1], 3.0);
        assert_relative_eq!(y[2], 6.5);
    }

    #[test]
    fn test_csr_from_triplets_sums_duplicates() {
        let csr = CsrMatrix::from_triplets(
            2,
            3,
            vec![(1, 2, 1.0), (0, 0, 2.0), (1, 2, 4.0), (1, 0, 0.0)],
        );
        assert_eq!(csr.row_ptrs, vec![0, 1, 3]);
        assert_eq!(csr.col_indices, vec![0, 0, 2]);
        assert_relative_eq!(csr.get(1, 2), 5.0);
        assert_relative_eq!(csr.get(0, 1), 0.0);
    }

    #[test]
    fn test_transpose_matches_dense() {
        let a = nonsymmetric();
        let at = a.transpose();
        let dense = a.to_dense();
        let dense_t = at.to_dense();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(dense[[i, j]], dense_t[[j, i]]);
            }
        }
    }

    #[test]
    fn test_matvec_transpose_consistent() {
        let a = nonsymmetric();
        let x = array![0.5, -1.0, 2.0];
        let y1 = a.matvec_transpose(&x);
        let y2 = a.transpose().matvec(&x);
        for i in 0..3 {
            assert_relative_eq!(y1[i], y2[i], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_matmul_matches_dense() {
        let a = nonsymmetric();
        let b = CsrMatrix::from_triplets(3, 2, vec![(0, 0, 1.0), (1, 0, 0.5), (1, 1, 0.5), (2, 1, 1.0)]);
        let c = a.matmul(&b).to_dense();
        let expected = a.to_dense().dot(&b.to_dense());
        for i in 0..3 {
            for j in 0..2 {
                assert_relative_eq!(c[[i, j]], expected[[i, j]], epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_ptap_equals_rap_with_explicit_transpose() {
        let a = nonsymmetric();
        let p = CsrMatrix::from_triplets(3, 2, vec![(0, 0, 1.0), (1, 0, 0.5), (1, 1, 0.5), (2, 1, 1.0)]);
        let ptap = CsrMatrix::ptap(&a, &p);
        let rap = CsrMatrix::rap(&p.transpose(), &a, &p);
        assert!(ptap.same_pattern(&rap));
        for (x, y) in ptap.values.iter().zip(&rap.values) {
            assert_relative_eq!(*x, *y, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_two_phase_product_matches_rap() {
        let a = nonsymmetric();
        let p = CsrMatrix::from_triplets(3, 2, vec![(0, 0, 1.0), (1, 0, 0.5), (1, 1, 0.5), (2, 1, 1.0)]);
        let ap = a.matmul(&p);
        let pt = p.transpose();
        let expected = CsrMatrix::rap(&pt, &a, &p);

        for left in [LeftFactor::Transposed(&p), LeftFactor::Rows(&pt)] {
            let mut c = CsrMatrix::product_pattern(left, &ap);
            assert!(c.same_pattern(&expected));
            assert!(c.values.iter().all(|v| *v == 0.0));
            assert!(c.product_values_into(left, None, &ap));
            for (x, y) in c.values.iter().zip(&expected.values) {
                assert_relative_eq!(*x, *y, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_product_values_into_keeps_storage() {
        let a = nonsymmetric();
        let p = CsrMatrix::from_triplets(3, 2, vec![(0, 0, 1.0), (1, 0, 0.5), (1, 1, 0.5), (2, 1, 1.0)]);
        let left = LeftFactor::Transposed(&p);
        let ap = a.matmul(&p);
        let mut c = CsrMatrix::product_pattern(left, &ap);
        assert!(c.product_values_into(left, None, &ap));
        let before = c.clone();
        let storage = c.values.as_ptr();

        let weights = array![2.0, -1.0];
        assert!(c.product_values_into(left, Some(&weights), &ap));
        assert_eq!(c.values.as_ptr(), storage);
        assert_relative_eq!(c.get(0, 0), 2.0 * before.get(0, 0), epsilon = 1e-14);
        assert_relative_eq!(c.get(1, 0), -before.get(1, 0), epsilon = 1e-14);

        // entries outside the pattern are refused
        let mut diagonal = CsrMatrix::identity(2);
        assert!(!diagonal.product_values_into(left, None, &ap));
        assert_eq!(diagonal.position(0, 1), None);
        assert_eq!(diagonal.position(1, 1), Some(1));
    }

    #[test]
    fn test_residual_into() {
        let a = nonsymmetric();
        let x = array![1.0, 2.0, 3.0];
        let b = array![2.0, 3.0, 7.0];
        let mut r = Array1::zeros(3);
        a.residual_into(&b, &x, &mut r);
        assert_relative_eq!(r[0], 0.0);
        assert_relative_eq!(r[1], 0.0);
        assert_relative_eq!(r[2], 0.5);
    }

    #[test]
    fn test_builder_fills_missing_rows() {
        let mut builder = CsrBuilder::new(3, 3);
        builder.add_row_entries([(0, 1.0), (2, 2.0)].into_iter());
        let csr = builder.finish();
        assert_eq!(csr.row_ptrs, vec![0, 2, 2, 2]);
        assert_relative_eq!(csr.norm_inf(), 3.0);
    }
}
