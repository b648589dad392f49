//! Real-time iteration solver wrapper
//!
//! An exported real-time solver keeps its trajectories in global C arrays
//! and exposes them through a flat get/set ABI. [`OcpRt`] mirrors those
//! arrays as `nalgebra` matrices, checks the shape of every assignment and
//! pushes/pulls the whole state around each solver step:
//!
//! ```text
//! set_all() -> step -> get_all()
//! ```
//!
//! Step statuses are handed back to the caller as-is; only the control loop
//! knows whether a failed step is fatal.

use std::fmt;

use nalgebra::DMatrix;
use thiserror::Error;
use tracing::{debug, info, warn};

use rawe_core::Shape;

#[derive(Debug, Error)]
pub enum RtError {
    #[error("{field} has dimension {expected} but you tried to assign it something with dimension {got}")]
    ShapeMismatch {
        field: RtField,
        expected: Shape,
        got: Shape,
    },
    #[error("dimension mismatch exchanging {field} (status {status})")]
    Exchange { field: RtField, status: i32 },
    #[error("unrecognized weighting matrices type {0}")]
    UnsupportedWeightingType(i32),
    #[error("solver was exported without a fixed initial state")]
    InitialStateNotFixed,
}

/// Arrays shared with the exported solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtField {
    /// State trajectory, `N+1 × NX`
    X,
    /// Control trajectory, `N × NU`
    U,
    /// Reference trajectory, `N × NY`
    Y,
    /// Terminal reference, `NYN × 1`
    YN,
    /// Stage weighting matrix
    S,
    /// Terminal weighting matrix, `NYN × NYN`
    SN,
    /// Fixed initial state, `NX × 1`
    X0,
}

impl RtField {
    pub fn name(self) -> &'static str {
        match self {
            RtField::X => "x",
            RtField::U => "u",
            RtField::Y => "y",
            RtField::YN => "yN",
            RtField::S => "S",
            RtField::SN => "SN",
            RtField::X0 => "x0",
        }
    }
}

impl fmt::Display for RtField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Copy into the solver
    Set,
    /// Copy out of the solver
    Get,
}

/// Flat array exchange contract of an exported real-time solver
///
/// Dimensions are compiled into the solver. `exchange` copies a row-major
/// `rows × cols` buffer in or out of `field` and returns nonzero when the
/// dimensions disagree with the compiled ones.
pub trait RtBackend {
    /// Horizon length
    fn n(&self) -> usize;
    fn nx(&self) -> usize;
    fn nu(&self) -> usize;
    fn ny(&self) -> usize;
    fn nyn(&self) -> usize;
    /// 1: one stage weighting matrix, 2: one per stage stacked vertically
    fn weighting_matrices_type(&self) -> i32;
    fn initial_state_fixed(&self) -> bool;

    fn initialize(&mut self) -> i32;
    fn exchange(
        &mut self,
        field: RtField,
        direction: Direction,
        data: &mut [f64],
        rows: usize,
        cols: usize,
    ) -> i32;

    fn preparation_step(&mut self) -> i32;
    fn feedback_step(&mut self) -> i32;
    fn initialize_nodes_by_forward_simulation(&mut self) -> i32;
    fn kkt(&mut self) -> f64;
    fn objective(&mut self) -> f64;
}

fn shape_of(m: &DMatrix<f64>) -> Shape {
    Shape::matrix(m.nrows(), m.ncols())
}

/// Copy `mat` through the backend in row-major order
fn exchange_matrix<B: RtBackend + ?Sized>(
    backend: &mut B,
    field: RtField,
    direction: Direction,
    mat: &mut DMatrix<f64>,
) -> Result<(), RtError> {
    let (rows, cols) = mat.shape();
    let mut buf: Vec<f64> = mat.transpose().as_slice().to_vec();
    let status = backend.exchange(field, direction, &mut buf, rows, cols);
    if status != 0 {
        return Err(RtError::Exchange { field, status });
    }
    if direction == Direction::Get {
        *mat = DMatrix::from_row_slice(rows, cols, &buf);
    }
    Ok(())
}

/// Owned mirror of an exported solver's arrays
pub struct OcpRt<B> {
    backend: B,
    x: DMatrix<f64>,
    u: DMatrix<f64>,
    y: DMatrix<f64>,
    y_n: DMatrix<f64>,
    s: DMatrix<f64>,
    s_n: DMatrix<f64>,
    x0: Option<DMatrix<f64>>,
}

impl<B: RtBackend> OcpRt<B> {
    /// Initialize the solver and pull its initial arrays
    pub fn new(mut backend: B) -> Result<Self, RtError> {
        info!("initializing solver");
        let status = backend.initialize();
        if status != 0 {
            warn!(status, "solver initialization returned nonzero status");
        }

        let (n, nx, nu, ny, nyn) = (
            backend.n(),
            backend.nx(),
            backend.nu(),
            backend.ny(),
            backend.nyn(),
        );
        let s = match backend.weighting_matrices_type() {
            1 => DMatrix::zeros(ny, ny),
            2 => DMatrix::zeros(n * ny, ny),
            other => return Err(RtError::UnsupportedWeightingType(other)),
        };
        let x0 = backend.initial_state_fixed().then(|| DMatrix::zeros(nx, 1));

        let mut rt = Self {
            backend,
            x: DMatrix::zeros(n + 1, nx),
            u: DMatrix::zeros(n, nu),
            y: DMatrix::zeros(n, ny),
            y_n: DMatrix::zeros(nyn, 1),
            s,
            s_n: DMatrix::zeros(nyn, nyn),
            x0,
        };

        rt.backend.initialize();
        rt.get_all()?;
        debug!(n, nx, nu, ny, nyn, "real-time solver ready");
        Ok(rt)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn x(&self) -> &DMatrix<f64> {
        &self.x
    }

    pub fn u(&self) -> &DMatrix<f64> {
        &self.u
    }

    pub fn y(&self) -> &DMatrix<f64> {
        &self.y
    }

    pub fn y_n(&self) -> &DMatrix<f64> {
        &self.y_n
    }

    pub fn s(&self) -> &DMatrix<f64> {
        &self.s
    }

    pub fn s_n(&self) -> &DMatrix<f64> {
        &self.s_n
    }

    /// `None` unless the solver was exported with a fixed initial state
    pub fn x0(&self) -> Option<&DMatrix<f64>> {
        self.x0.as_ref()
    }

    fn assign(field: RtField, slot: &mut DMatrix<f64>, value: DMatrix<f64>) -> Result<(), RtError> {
        if value.shape() != slot.shape() {
            return Err(RtError::ShapeMismatch {
                field,
                expected: shape_of(slot),
                got: shape_of(&value),
            });
        }
        *slot = value;
        Ok(())
    }

    pub fn set_x(&mut self, value: DMatrix<f64>) -> Result<(), RtError> {
        Self::assign(RtField::X, &mut self.x, value)
    }

    pub fn set_u(&mut self, value: DMatrix<f64>) -> Result<(), RtError> {
        Self::assign(RtField::U, &mut self.u, value)
    }

    pub fn set_y(&mut self, value: DMatrix<f64>) -> Result<(), RtError> {
        Self::assign(RtField::Y, &mut self.y, value)
    }

    pub fn set_y_n(&mut self, value: DMatrix<f64>) -> Result<(), RtError> {
        Self::assign(RtField::YN, &mut self.y_n, value)
    }

    pub fn set_s(&mut self, value: DMatrix<f64>) -> Result<(), RtError> {
        Self::assign(RtField::S, &mut self.s, value)
    }

    pub fn set_s_n(&mut self, value: DMatrix<f64>) -> Result<(), RtError> {
        Self::assign(RtField::SN, &mut self.s_n, value)
    }

    pub fn set_x0(&mut self, value: DMatrix<f64>) -> Result<(), RtError> {
        let slot = self.x0.as_mut().ok_or(RtError::InitialStateNotFixed)?;
        Self::assign(RtField::X0, slot, value)
    }

    /// Push every array into the solver
    pub fn set_all(&mut self) -> Result<(), RtError> {
        self.exchange_all(Direction::Set)
    }

    /// Pull every array out of the solver
    pub fn get_all(&mut self) -> Result<(), RtError> {
        self.exchange_all(Direction::Get)
    }

    fn exchange_all(&mut self, direction: Direction) -> Result<(), RtError> {
        let backend = &mut self.backend;
        exchange_matrix(backend, RtField::X, direction, &mut self.x)?;
        exchange_matrix(backend, RtField::U, direction, &mut self.u)?;
        exchange_matrix(backend, RtField::Y, direction, &mut self.y)?;
        exchange_matrix(backend, RtField::YN, direction, &mut self.y_n)?;
        exchange_matrix(backend, RtField::S, direction, &mut self.s)?;
        exchange_matrix(backend, RtField::SN, direction, &mut self.s_n)?;
        if let Some(x0) = self.x0.as_mut() {
            exchange_matrix(backend, RtField::X0, direction, x0)?;
        }
        Ok(())
    }

    fn step(&mut self, f: impl FnOnce(&mut B) -> i32) -> Result<i32, RtError> {
        self.set_all()?;
        let status = f(&mut self.backend);
        self.get_all()?;
        Ok(status)
    }

    pub fn preparation_step(&mut self) -> Result<i32, RtError> {
        self.step(|b| b.preparation_step())
    }

    pub fn feedback_step(&mut self) -> Result<i32, RtError> {
        self.step(|b| b.feedback_step())
    }

    pub fn initialize_nodes_by_forward_simulation(&mut self) -> Result<i32, RtError> {
        self.step(|b| b.initialize_nodes_by_forward_simulation())
    }

    /// KKT tolerance of the current arrays
    pub fn kkt(&mut self) -> Result<f64, RtError> {
        self.set_all()?;
        Ok(self.backend.kkt())
    }

    pub fn objective(&mut self) -> Result<f64, RtError> {
        self.set_all()?;
        Ok(self.backend.objective())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend storing each field in a flat row-major buffer
    struct Echo {
        wmt: i32,
        store: std::collections::HashMap<RtField, Vec<f64>>,
    }

    impl RtBackend for Echo {
        fn n(&self) -> usize {
            2
        }
        fn nx(&self) -> usize {
            2
        }
        fn nu(&self) -> usize {
            1
        }
        fn ny(&self) -> usize {
            3
        }
        fn nyn(&self) -> usize {
            2
        }
        fn weighting_matrices_type(&self) -> i32 {
            self.wmt
        }
        fn initial_state_fixed(&self) -> bool {
            false
        }
        fn initialize(&mut self) -> i32 {
            0
        }
        fn exchange(
            &mut self,
            field: RtField,
            direction: Direction,
            data: &mut [f64],
            _rows: usize,
            _cols: usize,
        ) -> i32 {
            let stored = self.store.entry(field).or_insert_with(|| vec![0.0; data.len()]);
            match direction {
                Direction::Set => stored.copy_from_slice(data),
                Direction::Get => data.copy_from_slice(stored),
            }
            0
        }
        fn preparation_step(&mut self) -> i32 {
            0
        }
        fn feedback_step(&mut self) -> i32 {
            0
        }
        fn initialize_nodes_by_forward_simulation(&mut self) -> i32 {
            0
        }
        fn kkt(&mut self) -> f64 {
            0.0
        }
        fn objective(&mut self) -> f64 {
            0.0
        }
    }

    fn echo(wmt: i32) -> Echo {
        Echo {
            wmt,
            store: Default::default(),
        }
    }

    #[test]
    fn test_exchange_is_row_major() {
        let mut rt = OcpRt::new(echo(1)).unwrap();
        rt.set_x(DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
            .unwrap();
        rt.set_all().unwrap();
        assert_eq!(rt.backend().store[&RtField::X], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_stacked_weighting_matrices() {
        let rt = OcpRt::new(echo(2)).unwrap();
        assert_eq!(rt.s().shape(), (6, 3));
        assert_eq!(rt.s_n().shape(), (2, 2));
    }

    #[test]
    fn test_initial_state_absent() {
        let mut rt = OcpRt::new(echo(1)).unwrap();
        assert!(rt.x0().is_none());
        assert!(matches!(
            rt.set_x0(DMatrix::zeros(2, 1)),
            Err(RtError::InitialStateNotFixed)
        ));
    }
}
