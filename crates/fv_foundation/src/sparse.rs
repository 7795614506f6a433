// crates/fv_foundation/src/sparse.rs

//! 压缩稀疏行（CSR）矩阵格式
//!
//! 用于网格离散算子：
//! - 质量矩阵（对角）及其逆
//! - 协变梯度算子（边 × 节点，复数值）
//!
//! 标量类型只要求 `Copy + Zero + Mul + Add`，因此 `f64` 与
//! `num_complex::Complex64` 均可使用。
//!
//! # 格式说明
//!
//! - `row_ptr`: 行指针，长度 n_rows + 1
//! - `col_idx`: 列索引，每行内升序
//! - `values`: 非零元值
//!
//! # 使用示例
//!
//! ```
//! use fv_foundation::sparse::CsrMatrix;
//!
//! let m = CsrMatrix::from_triplets(2, 3, vec![(0, 0, 1.0), (0, 2, 2.0), (1, 1, 3.0)]).unwrap();
//! let y = m.apply(&[1.0, 1.0, 1.0]).unwrap();
//! assert_eq!(y, vec![3.0, 3.0]);
//! ```

use crate::error::{FvError, FvResult};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, Mul};

/// CSR 矩阵标量约束
pub trait SparseScalar: Copy + Zero + Mul<Output = Self> + Add<Output = Self> + Send + Sync {}

impl<T> SparseScalar for T where T: Copy + Zero + Mul<Output = T> + Add<Output = T> + Send + Sync {}

/// CSR 格式稀疏矩阵
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix<T> {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<T>,
}

impl<T: SparseScalar> CsrMatrix<T> {
    /// 从原始 CSR 数组创建矩阵（带完整性校验）
    pub fn from_raw(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> FvResult<Self> {
        crate::ensure!(
            row_ptr.len() == n_rows + 1,
            FvError::size_mismatch("row_ptr", n_rows + 1, row_ptr.len())
        );
        crate::ensure!(
            col_idx.len() == values.len(),
            FvError::size_mismatch("values", col_idx.len(), values.len())
        );
        crate::ensure!(
            row_ptr[0] == 0 && row_ptr[n_rows] == col_idx.len(),
            FvError::invalid_input("row_ptr 首元素必须为 0 且末元素等于 nnz")
        );
        for r in 0..n_rows {
            if row_ptr[r] > row_ptr[r + 1] {
                return Err(FvError::invalid_input(format!("row_ptr 在第 {} 行非单调", r)));
            }
            let cols = &col_idx[row_ptr[r]..row_ptr[r + 1]];
            if let Some(&c) = cols.iter().find(|&&c| c >= n_cols) {
                return Err(FvError::index_out_of_bounds("column", c, n_cols));
            }
            if cols.windows(2).any(|w| w[0] >= w[1]) {
                return Err(FvError::invalid_input(format!("第 {} 行列索引未严格升序", r)));
            }
        }
        Ok(Self {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// 从 (row, col, value) 三元组创建，重复位置累加
    pub fn from_triplets<I>(n_rows: usize, n_cols: usize, triplets: I) -> FvResult<Self>
    where
        I: IntoIterator<Item = (usize, usize, T)>,
    {
        let mut rows: Vec<BTreeMap<usize, T>> = vec![BTreeMap::new(); n_rows];
        for (r, c, v) in triplets {
            if r >= n_rows {
                return Err(FvError::index_out_of_bounds("row", r, n_rows));
            }
            if c >= n_cols {
                return Err(FvError::index_out_of_bounds("column", c, n_cols));
            }
            let entry = rows[r].entry(c).or_insert_with(T::zero);
            *entry = *entry + v;
        }

        let mut row_ptr = Vec::with_capacity(n_rows + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for row in rows {
            for (c, v) in row {
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }

        Ok(Self {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// 创建对角矩阵
    pub fn from_diagonal(diag: &[T]) -> Self {
        let n = diag.len();
        Self {
            n_rows: n,
            n_cols: n,
            row_ptr: (0..=n).collect(),
            col_idx: (0..n).collect(),
            values: diag.to_vec(),
        }
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 行指针
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// 列索引
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// 非零元值
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// 第 row 行的 (列索引, 值)
    #[inline]
    pub fn row(&self, row: usize) -> (&[usize], &[T]) {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// 获取 (row, col) 元素，不存在时返回 None
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.n_rows {
            return None;
        }
        let (cols, vals) = self.row(row);
        cols.binary_search(&col).ok().map(|k| vals[k])
    }

    /// 是否为对角矩阵
    pub fn is_diagonal(&self) -> bool {
        self.n_rows == self.n_cols
            && (0..self.n_rows).all(|r| self.row(r).0.iter().all(|&c| c == r))
    }

    /// 提取对角线（缺失元素为零）
    pub fn diagonal(&self) -> Vec<T> {
        let n = self.n_rows.min(self.n_cols);
        (0..n)
            .map(|i| self.get(i, i).unwrap_or_else(T::zero))
            .collect()
    }

    /// y = A·x
    pub fn mul_vec(&self, x: &[T], y: &mut [T]) -> FvResult<()> {
        if x.len() != self.n_cols {
            return Err(FvError::size_mismatch("x", self.n_cols, x.len()));
        }
        if y.len() != self.n_rows {
            return Err(FvError::size_mismatch("y", self.n_rows, y.len()));
        }
        for (r, out) in y.iter_mut().enumerate() {
            let (cols, vals) = self.row(r);
            let mut acc = T::zero();
            for (&c, &v) in cols.iter().zip(vals) {
                acc = acc + v * x[c];
            }
            *out = acc;
        }
        Ok(())
    }

    /// 返回新分配的 A·x
    pub fn apply(&self, x: &[T]) -> FvResult<Vec<T>> {
        let mut y = vec![T::zero(); self.n_rows];
        self.mul_vec(x, &mut y)?;
        Ok(y)
    }
}

impl CsrMatrix<f64> {
    /// 对角矩阵求逆
    ///
    /// 仅适用于对角矩阵，对角元为零时返回错误。
    pub fn inverse_diagonal(&self) -> FvResult<Self> {
        if !self.is_diagonal() {
            return Err(FvError::invalid_input("仅支持对角矩阵求逆"));
        }
        let diag = self.diagonal();
        if let Some(i) = diag.iter().position(|&d| d == 0.0 || !d.is_finite()) {
            return Err(FvError::numerical(format!("对角元 {} 为零或非有限值", i)));
        }
        let inv: Vec<f64> = diag.iter().map(|d| 1.0 / d).collect();
        Ok(Self::from_diagonal(&inv))
    }
}
