//! Tethered point-mass crosswind kite
//!
//! The kite flies on a tether of length `r` anchored at the origin, in a
//! uniform wind of speed `w0` along +x. z points up.
//!
//! ```text
//! m * a = L * e_lift + D * e_drag - m * g * e_z - lambda * p
//! ```
//!
//! The tether force multiplier `lambda` is chosen so that the holonomic
//! constraint `c = (|p|^2 - r^2) / 2` has zero second derivative. `c` and
//! `cdot` are exposed as outputs so the problem can pin them at node 0.

use serde::{Deserialize, Serialize};

use rawe_core::{Dae, Expr, MapError};

use crate::config::CarouselConfig;

/// Physical parameters of the kite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KiteParams {
    /// Mass [kg]
    pub mass: f64,
    /// Wing area [m²]
    pub area: f64,
    /// Air density [kg/m³]
    pub rho: f64,
    /// Zero-lift drag coefficient
    pub cd0: f64,
    /// Aspect ratio
    pub aspect_ratio: f64,
    /// Oswald efficiency
    pub oswald: f64,
    /// Tether drag contribution per meter of line
    pub line_drag_per_meter: f64,
    /// Gravity [m/s²]
    pub gravity: f64,
}

impl Default for KiteParams {
    fn default() -> Self {
        Self {
            mass: 4.0,
            area: 0.5,
            rho: 1.23,
            cd0: 0.02,
            aspect_ratio: 9.0,
            oswald: 0.9,
            line_drag_per_meter: 1e-4,
            gravity: 9.81,
        }
    }
}

/// Names of the crosswind kite states in model order
pub const STATES: [&str; 9] = ["x", "y", "z", "dx", "dy", "dz", "r", "dr", "winch_energy"];
pub const CONTROLS: [&str; 3] = ["ddr", "cL", "roll"];
pub const PARAMETERS: [&str; 2] = ["w0", "endTime"];

fn dot3(a: &[Expr; 3], b: &[Expr; 3]) -> Expr {
    Expr::dot(a, b)
}

fn cross3(a: &[Expr; 3], b: &[Expr; 3]) -> [Expr; 3] {
    [
        &a[1] * &b[2] - &a[2] * &b[1],
        &a[2] * &b[0] - &a[0] * &b[2],
        &a[0] * &b[1] - &a[1] * &b[0],
    ]
}

fn scale3(a: &[Expr; 3], s: &Expr) -> [Expr; 3] {
    [&a[0] * s, &a[1] * s, &a[2] * s]
}

fn normalize3(a: &[Expr; 3]) -> [Expr; 3] {
    let inv = 1.0 / dot3(a, a).sqrt();
    scale3(a, &inv)
}

/// Build the crosswind kite model
///
/// `carousel.zt` offsets the tether attachment point along the lift
/// direction; `carousel.r_arm` is only used by the visualizer.
pub fn crosswind_dae(params: &KiteParams, carousel: &CarouselConfig) -> Result<Dae, MapError> {
    let mut dae = Dae::new();
    let s: Vec<Expr> = STATES
        .iter()
        .map(|name| dae.add_x(name))
        .collect::<Result<_, _>>()?;
    let ddr = dae.add_u("ddr")?;
    let cl = dae.add_u("cL")?;
    let roll = dae.add_u("roll")?;
    let w0 = dae.add_p("w0")?;
    dae.add_p("endTime")?;

    let p = [s[0].clone(), s[1].clone(), s[2].clone()];
    let v = [s[3].clone(), s[4].clone(), s[5].clone()];
    let (r, dr) = (&s[6], &s[7]);

    // apparent wind
    let va = [&v[0] - &w0, v[1].clone(), v[2].clone()];
    let airspeed = dot3(&va, &va).sqrt();
    let e_va = scale3(&va, &(1.0 / &airspeed));
    let e_drag = scale3(&e_va, &Expr::constant(-1.0));

    // lift is perpendicular to the airflow, in the plane of airflow and
    // tether, rolled about the airflow
    let e_t = normalize3(&p);
    let along = dot3(&e_t, &e_va);
    let e_l0 = normalize3(&[
        &e_t[0] - &along * &e_va[0],
        &e_t[1] - &along * &e_va[1],
        &e_t[2] - &along * &e_va[2],
    ]);
    let e_side = cross3(&e_va, &e_l0);
    let (cr, sr) = (roll.cos(), roll.sin());
    let e_lift = [
        &cr * &e_l0[0] + &sr * &e_side[0],
        &cr * &e_l0[1] + &sr * &e_side[1],
        &cr * &e_l0[2] + &sr * &e_side[2],
    ];

    let induced = 1.0 / (std::f64::consts::PI * params.aspect_ratio * params.oswald);
    let cd = params.cd0 + induced * cl.squared() + params.line_drag_per_meter * r;
    let q = 0.5 * params.rho * params.area * airspeed.squared();
    let lift = &q * &cl;
    let drag = &q * &cd;

    let weight = params.mass * params.gravity;
    let force = [
        &lift * &e_lift[0] + &drag * &e_drag[0],
        &lift * &e_lift[1] + &drag * &e_drag[1],
        &lift * &e_lift[2] + &drag * &e_drag[2] - weight,
    ];

    // cddot = p.a + |v|^2 - dr^2 - r*ddr = 0 with a = (F - lambda p) / m
    let p2 = dot3(&p, &p);
    let lambda = (dot3(&p, &force)
        + params.mass * (dot3(&v, &v) - dr.squared() - r * &ddr))
        / &p2;
    let tension = &lambda * p2.sqrt();

    let accel: Vec<Expr> = (0..3)
        .map(|i| (&force[i] - &lambda * &p[i]) / params.mass)
        .collect();

    // positive while the winch reels out under load
    let winch_power = &tension * dr;

    for (i, name) in ["x", "y", "z"].iter().enumerate() {
        dae.set_ode(name, v[i].clone())?;
    }
    for (i, name) in ["dx", "dy", "dz"].iter().enumerate() {
        dae.set_ode(name, accel[i].clone())?;
    }
    dae.set_ode("r", dr.clone())?;
    dae.set_ode("dr", ddr.clone())?;
    dae.set_ode("winch_energy", -winch_power.clone())?;

    // tether attachment offset along the lift direction
    let bridle = carousel.zt;
    let attach = [
        &p[0] + bridle * &e_lift[0],
        &p[1] + bridle * &e_lift[1],
        &p[2] + bridle * &e_lift[2],
    ];
    let line_cos = dot3(&normalize3(&attach), &e_lift);

    dae.set_output("airspeed", airspeed)?;
    dae.set_output("tension", tension)?;
    dae.set_output("winch power", winch_power)?;
    dae.set_output("cD", cd.clone())?;
    dae.set_output("L/D", &cl / &cd)?;
    dae.set_output("c", 0.5 * (&p2 - r.squared()))?;
    dae.set_output("cdot", dot3(&p, &v) - r * dr)?;
    dae.set_output("line cos angle", line_cos)?;

    let acc_norm = Expr::sum(
        ["dx", "dy", "dz"]
            .iter()
            .map(|name| dae.ddt(name).map(|a| a.squared()))
            .collect::<Result<Vec<_>, _>>()?,
    )
    .sqrt();
    dae.set_output("load factor", acc_norm / params.gravity)?;

    Ok(dae)
}
