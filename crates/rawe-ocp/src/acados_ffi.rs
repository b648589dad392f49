//! FFI bindings for an exported real-time iteration solver
//!
//! The exported C code keeps a single solver instance in global memory, so
//! at most one [`ExportedSolver`] handle may exist per process.

#![allow(non_snake_case)]

use std::os::raw::{c_double, c_int, c_void};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::ocprt::{Direction, RtBackend, RtField};

extern "C" {
    fn py_initialize() -> c_int;

    fn py_get_ACADO_N() -> c_int;
    fn py_get_ACADO_NX() -> c_int;
    fn py_get_ACADO_NU() -> c_int;
    fn py_get_ACADO_NY() -> c_int;
    fn py_get_ACADO_NYN() -> c_int;
    fn py_get_ACADO_WEIGHTING_MATRICES_TYPE() -> c_int;
    fn py_get_ACADO_INITIAL_STATE_FIXED() -> c_int;

    fn py_set_x(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_set_u(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_set_y(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_set_yN(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_set_S(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_set_SN(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_set_x0(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;

    fn py_get_x(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_get_u(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_get_y(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_get_yN(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_get_S(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_get_SN(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;
    fn py_get_x0(data: *mut c_void, rows: c_int, cols: c_int) -> c_int;

    fn preparationStep() -> c_int;
    fn feedbackStep() -> c_int;
    fn initializeNodesByForwardSimulation();
    fn getKKT() -> c_double;
    fn getObjective() -> c_double;
}

type ExchangeFn = unsafe extern "C" fn(*mut c_void, c_int, c_int) -> c_int;

static IN_USE: AtomicBool = AtomicBool::new(false);

/// Handle to the linked solver
pub struct ExportedSolver {
    _private: (),
}

impl ExportedSolver {
    /// `None` while another handle is alive
    pub fn acquire() -> Option<Self> {
        if IN_USE.swap(true, Ordering::AcqRel) {
            return None;
        }
        info!("loading exported real-time solver");
        Some(Self { _private: () })
    }

    fn exchange_fn(field: RtField, direction: Direction) -> ExchangeFn {
        match (direction, field) {
            (Direction::Set, RtField::X) => py_set_x,
            (Direction::Set, RtField::U) => py_set_u,
            (Direction::Set, RtField::Y) => py_set_y,
            (Direction::Set, RtField::YN) => py_set_yN,
            (Direction::Set, RtField::S) => py_set_S,
            (Direction::Set, RtField::SN) => py_set_SN,
            (Direction::Set, RtField::X0) => py_set_x0,
            (Direction::Get, RtField::X) => py_get_x,
            (Direction::Get, RtField::U) => py_get_u,
            (Direction::Get, RtField::Y) => py_get_y,
            (Direction::Get, RtField::YN) => py_get_yN,
            (Direction::Get, RtField::S) => py_get_S,
            (Direction::Get, RtField::SN) => py_get_SN,
            (Direction::Get, RtField::X0) => py_get_x0,
        }
    }
}

fn dim(value: c_int) -> usize {
    usize::try_from(value).unwrap_or(0)
}

impl RtBackend for ExportedSolver {
    fn n(&self) -> usize {
        dim(unsafe { py_get_ACADO_N() })
    }

    fn nx(&self) -> usize {
        dim(unsafe { py_get_ACADO_NX() })
    }

    fn nu(&self) -> usize {
        dim(unsafe { py_get_ACADO_NU() })
    }

    fn ny(&self) -> usize {
        dim(unsafe { py_get_ACADO_NY() })
    }

    fn nyn(&self) -> usize {
        dim(unsafe { py_get_ACADO_NYN() })
    }

    fn weighting_matrices_type(&self) -> i32 {
        unsafe { py_get_ACADO_WEIGHTING_MATRICES_TYPE() }
    }

    fn initial_state_fixed(&self) -> bool {
        unsafe { py_get_ACADO_INITIAL_STATE_FIXED() != 0 }
    }

    fn initialize(&mut self) -> i32 {
        unsafe { py_initialize() }
    }

    fn exchange(
        &mut self,
        field: RtField,
        direction: Direction,
        data: &mut [f64],
        rows: usize,
        cols: usize,
    ) -> i32 {
        if data.len() != rows * cols {
            return -1;
        }
        let (Ok(r), Ok(c)) = (c_int::try_from(rows), c_int::try_from(cols)) else {
            return -1;
        };
        let f = Self::exchange_fn(field, direction);
        // the C side reads or writes exactly rows*cols doubles after checking
        // them against its compiled dimensions
        unsafe { f(data.as_mut_ptr() as *mut c_void, r, c) }
    }

    fn preparation_step(&mut self) -> i32 {
        unsafe { preparationStep() }
    }

    fn feedback_step(&mut self) -> i32 {
        unsafe { feedbackStep() }
    }

    fn initialize_nodes_by_forward_simulation(&mut self) -> i32 {
        unsafe { initializeNodesByForwardSimulation() };
        0
    }

    fn kkt(&mut self) -> f64 {
        unsafe { getKKT() }
    }

    fn objective(&mut self) -> f64 {
        unsafe { getObjective() }
    }
}

impl Drop for ExportedSolver {
    fn drop(&mut self) {
        IN_USE.store(false, Ordering::Release);
    }
}

// Safety: the solver state is only touched through the single live handle
unsafe impl Send for ExportedSolver {}
