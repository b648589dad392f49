//! Optimization scenarios
//!
//! - Periodic power-generating crosswind orbit of the tethered kite
//! - Fuel-optimal rocket ascent to a target altitude

use std::f64::consts::PI;

use nalgebra::DMatrix;
use tracing::info;

use rawe_core::{Dae, Expr};

use crate::config::OcpConfig;
use crate::ocp::{Comparison, MultipleShootingOcp, OcpError};

/// Minimum airspeed along the orbit [m/s]
pub const MIN_AIRSPEED: f64 = 10.0;
/// Maximum angle between tether and lift direction [rad]
pub const MAX_LINE_ANGLE: f64 = 80.0 * PI / 180.0;

/// Crosswind power orbit
///
/// Consistent tether invariants at node 0, airspeed and line angle limits
/// per interval, no winch energy at node 0, periodic orbit, and mean winch
/// power as objective with a small control regularization.
pub fn crosswind_ocp(dae: &Dae, config: &OcpConfig) -> Result<MultipleShootingOcp, OcpError> {
    let nk = config.horizon.num_intervals;
    info!(nk, "setting up crosswind ocp");
    let mut ocp = MultipleShootingOcp::new(dae, nk)?;

    // invariants
    let c0 = ocp.lookup("c", Some(0))?;
    let cdot0 = ocp.lookup("cdot", Some(0))?;
    ocp.constrain(c0, Comparison::Eq, Expr::zero());
    ocp.constrain(cdot0, Comparison::Eq, Expr::zero());

    for k in 0..nk {
        let airspeed = ocp.lookup("airspeed", Some(k))?;
        ocp.constrain(airspeed, Comparison::Ge, Expr::constant(MIN_AIRSPEED));
        let line_cos = ocp.lookup("line cos angle", Some(k))?;
        ocp.constrain(line_cos, Comparison::Ge, Expr::constant(MAX_LINE_ANGLE.cos()));
    }

    // bounds
    ocp.bound("x", (-200.0, 200.0), None)?;
    ocp.bound("y", (-200.0, 200.0), None)?;
    ocp.bound("z", (0.5, 200.0), None)?;
    for d in ["dx", "dy", "dz"] {
        ocp.bound(d, (-70.0, 70.0), None)?;
    }
    ocp.bound("r", (1.0, 300.0), None)?;
    ocp.bound("dr", (-10.0, 10.0), None)?;
    ocp.bound("ddr", (-2.5, 2.5), None)?;
    ocp.bound("cL", (-0.2, 1.5), None)?;
    ocp.bound("roll", (-PI / 4.0, PI / 4.0), None)?;
    ocp.bound("endTime", (0.5, 30.0), None)?;
    ocp.bound("w0", (10.0, 10.0), None)?;
    ocp.bound("winch_energy", (-1e6, 1e6), None)?;

    // boundary conditions
    ocp.bound("winch_energy", (0.0, 0.0), Some(0))?;

    // x and dx are left free so the orbit can drift downwind
    for name in ["y", "z", "dy", "dz", "r", "dr"] {
        ocp.constrain_periodic(name)?;
    }

    let mut regularization = Vec::with_capacity(nk);
    for k in 0..nk {
        let ddr = ocp.lookup("ddr", Some(k))?;
        let roll = ocp.lookup("roll", Some(k))?;
        regularization.push(ddr.squared() / 25.0 + roll.squared() / 0.01);
    }
    let energy = ocp.lookup("winch_energy", Some(nk))?;
    let end_time = ocp.lookup("endTime", None)?;
    ocp.set_objective(Expr::sum(regularization) * 1e-8 + energy / &end_time);

    ocp.guess("endTime", 5.4, None)?;
    ocp.guess("w0", 10.0, None)?;

    ocp.setup_dynamics(end_time, config.horizon.integrator_steps)?;
    Ok(ocp)
}

/// Circular orbit used as an initial guess for [`crosswind_ocp`]
#[derive(Debug, Clone)]
pub struct CircleGuess {
    /// Distance from the anchor to the orbit center [m]
    pub distance: f64,
    /// Orbit radius [m]
    pub radius: f64,
    /// Elevation of the orbit center [rad]
    pub elevation: f64,
    /// Orbit period [s]
    pub period: f64,
    pub lift_coefficient: f64,
}

impl Default for CircleGuess {
    fn default() -> Self {
        Self {
            distance: 50.0,
            radius: 10.0,
            elevation: 30.0 * PI / 180.0,
            period: 5.4,
            lift_coefficient: 0.8,
        }
    }
}

impl CircleGuess {
    /// One row per node: the nine kite states followed by the three controls
    pub fn trajectory(&self, nk: usize) -> DMatrix<f64> {
        let (se, ce) = self.elevation.sin_cos();
        let center = [self.distance * ce, 0.0, self.distance * se];
        let e1 = [-se, 0.0, ce];
        let e2 = [0.0, 1.0, 0.0];
        let omega = 2.0 * PI / self.period;
        let r = self.distance.hypot(self.radius);

        let mut rows = DMatrix::zeros(nk + 1, 12);
        for k in 0..=nk {
            let theta = if nk == 0 { 0.0 } else { 2.0 * PI * k as f64 / nk as f64 };
            let (s, c) = theta.sin_cos();
            for i in 0..3 {
                rows[(k, i)] = center[i] + self.radius * (c * e1[i] + s * e2[i]);
                rows[(k, 3 + i)] = self.radius * omega * (-s * e1[i] + c * e2[i]);
            }
            rows[(k, 6)] = r;
            rows[(k, 10)] = self.lift_coefficient;
        }
        rows
    }

    /// Guess every state and control of `ocp`
    pub fn apply(&self, ocp: &mut MultipleShootingOcp) -> Result<(), OcpError> {
        ocp.guess_trajectory(&self.trajectory(ocp.nk()))?;
        ocp.guess("endTime", self.period, None)
    }
}

/// Rocket ascent targets
#[derive(Debug, Clone)]
pub struct AscentTarget {
    /// Altitude to reach at the final node [m]
    pub altitude: f64,
    /// Initial mass [kg]
    pub initial_mass: f64,
    /// Dry mass [kg]
    pub dry_mass: f64,
    /// Maximum thrust [N]
    pub max_thrust: f64,
    /// Maximum dynamic pressure [Pa]
    pub max_dynamic_pressure: f64,
}

impl Default for AscentTarget {
    fn default() -> Self {
        Self {
            altitude: 10_000.0,
            initial_mass: 1000.0,
            dry_mass: 300.0,
            max_thrust: 30_000.0,
            max_dynamic_pressure: 40_000.0,
        }
    }
}

/// Maximize final mass while climbing to `target.altitude` from rest
pub fn rocket_ascent_ocp(
    dae: &Dae,
    nk: usize,
    target: &AscentTarget,
) -> Result<MultipleShootingOcp, OcpError> {
    info!(nk, altitude = target.altitude, "setting up rocket ascent ocp");
    let mut ocp = MultipleShootingOcp::new(dae, nk)?;

    ocp.bound("x", (-1e5, 1e5), None)?;
    ocp.bound("z", (0.0, 1e5), None)?;
    ocp.bound("vx", (-2000.0, 2000.0), None)?;
    ocp.bound("vz", (-2000.0, 2000.0), None)?;
    ocp.bound("mass", (target.dry_mass, target.initial_mass), None)?;
    ocp.bound("thrust", (0.0, target.max_thrust), None)?;
    ocp.bound("pitch", (0.0, PI / 2.0), None)?;
    ocp.bound("endTime", (5.0, 300.0), None)?;

    for name in ["x", "z", "vx", "vz"] {
        ocp.bound(name, (0.0, 0.0), Some(0))?;
    }
    ocp.bound("mass", (target.initial_mass, target.initial_mass), Some(0))?;

    let z_final = ocp.lookup("z", Some(nk))?;
    ocp.constrain(z_final, Comparison::Ge, Expr::constant(target.altitude));
    for k in 0..nk {
        let q = ocp.lookup("dynamic pressure", Some(k))?;
        ocp.constrain_bounds(q, (0.0, target.max_dynamic_pressure))?;
    }

    let final_mass = ocp.lookup("mass", Some(nk))?;
    ocp.set_objective(-final_mass);

    let end_time = ocp.lookup("endTime", None)?;
    ocp.setup_dynamics(end_time, 1)?;
    Ok(ocp)
}

/// Straight vertical climb at constant acceleration reaching the target
/// altitude after `duration` seconds
pub fn rocket_vertical_guess(
    ocp: &mut MultipleShootingOcp,
    target: &AscentTarget,
    duration: f64,
) -> Result<(), OcpError> {
    let nk = ocp.nk();
    let accel = 2.0 * target.altitude / (duration * duration);
    let burn = (target.initial_mass - target.dry_mass) / duration;

    for k in 0..=nk {
        let t = duration * k as f64 / nk.max(1) as f64;
        let mass = target.initial_mass - burn * t;
        ocp.guess_x(&[0.0, 0.5 * accel * t * t, 0.0, accel * t, mass], k)?;
        if k < nk {
            ocp.guess_u(&[mass * (accel + 9.81), PI / 2.0], k)?;
        }
    }
    ocp.guess("endTime", duration, None)
}
