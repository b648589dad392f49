//! Per-interval control matrix

use nalgebra::DMatrix;

use crate::error::{MapError, Shape};
use crate::symbolic::Expr;

/// `nk x nu` control matrix stored row-major, one row per interval
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMatrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T> ControlMatrix<T> {
    /// Wrap row-major `data` of shape `rows x cols`
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, MapError> {
        if data.len() != rows * cols {
            return Err(MapError::ShapeMismatch {
                what: "control matrix data".to_string(),
                expected: Shape::vector(rows * cols),
                got: Shape::vector(data.len()),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Stack rows that must all have `cols` entries
    pub fn from_rows(cols: usize, rows: Vec<Vec<T>>) -> Result<Self, MapError> {
        let nrows = rows.len();
        let mut data = Vec::with_capacity(nrows * cols);
        for row in rows {
            if row.len() != cols {
                return Err(MapError::ShapeMismatch {
                    what: "control row".to_string(),
                    expected: Shape::vector(cols),
                    got: Shape::vector(row.len()),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            rows: nrows,
            cols,
            data,
        })
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> Shape {
        Shape::matrix(self.rows, self.cols)
    }

    /// Controls of interval `k`
    pub fn row(&self, k: usize) -> Option<&[T]> {
        (k < self.rows).then(|| &self.data[k * self.cols..(k + 1) * self.cols])
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// Row-major flat data
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Fail unless the matrix is `rows x cols`
    pub fn check_shape(&self, rows: usize, cols: usize) -> Result<(), MapError> {
        if self.rows != rows || self.cols != cols {
            return Err(MapError::ShapeMismatch {
                what: "control matrix".to_string(),
                expected: Shape::matrix(rows, cols),
                got: self.shape(),
            });
        }
        Ok(())
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> ControlMatrix<U> {
        ControlMatrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl ControlMatrix<Expr> {
    /// Fresh control symbols `prefix_0 ..` for `rows` intervals
    pub fn symbolic(prefix: &str, rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: Expr::symbols(prefix, rows * cols),
        }
    }
}

impl ControlMatrix<f64> {
    pub fn from_dmatrix(m: &DMatrix<f64>) -> Self {
        // nalgebra is column-major, the transpose's storage is our row-major order
        Self {
            rows: m.nrows(),
            cols: m.ncols(),
            data: m.transpose().as_slice().to_vec(),
        }
    }

    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.rows, self.cols, &self.data)
    }

    /// Constant expressions with the same values
    pub fn to_constants(&self) -> ControlMatrix<Expr> {
        self.map(|v| Expr::constant(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dmatrix_round_trip_is_row_major() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let c = ControlMatrix::from_dmatrix(&m);
        assert_eq!(c.row(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(c.get(0, 2), Some(&3.0));
        assert_eq!(c.to_dmatrix(), m);
    }

    #[test]
    fn test_shape_checks() {
        assert!(ControlMatrix::new(2, 2, vec![0.0; 3]).is_err());
        assert!(ControlMatrix::from_rows(2, vec![vec![1.0, 2.0], vec![3.0]]).is_err());

        let c = ControlMatrix::from_rows(1, vec![vec![1.0], vec![2.0]]).unwrap();
        assert!(c.check_shape(2, 1).is_ok());
        assert!(matches!(
            c.check_shape(3, 1),
            Err(MapError::ShapeMismatch { .. })
        ));
        assert_eq!(c.row(2), None);
    }

    #[test]
    fn test_empty_rows_when_no_controls() {
        let c: ControlMatrix<Expr> = ControlMatrix::symbolic("u", 3, 0);
        assert_eq!(c.row(2).map(<[Expr]>::len), Some(0));
    }
}
