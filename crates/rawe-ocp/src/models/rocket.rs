//! Planar point-mass rocket

use serde::{Deserialize, Serialize};

use rawe_core::{Dae, MapError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocketParams {
    /// Specific impulse [s]
    pub isp: f64,
    /// Sea-level air density [kg/m³]
    pub rho0: f64,
    /// Density scale height [m]
    pub scale_height: f64,
    /// Gravity [m/s²]
    pub gravity: f64,
}

impl Default for RocketParams {
    fn default() -> Self {
        Self {
            isp: 300.0,
            rho0: 1.225,
            scale_height: 8500.0,
            gravity: 9.81,
        }
    }
}

/// States `x z vx vz mass`, controls `thrust pitch`, parameter `endTime`
pub fn rocket_dae(params: &RocketParams) -> Result<Dae, MapError> {
    let mut dae = Dae::new();
    dae.add_x("x")?;
    let z = dae.add_x("z")?;
    let vx = dae.add_x("vx")?;
    let vz = dae.add_x("vz")?;
    let mass = dae.add_x("mass")?;
    let thrust = dae.add_u("thrust")?;
    let pitch = dae.add_u("pitch")?;
    dae.add_p("endTime")?;

    dae.set_ode("x", vx.clone())?;
    dae.set_ode("z", vz.clone())?;
    dae.set_ode("vx", &thrust * pitch.cos() / &mass)?;
    dae.set_ode("vz", &thrust * pitch.sin() / &mass - params.gravity)?;
    dae.set_ode("mass", -(&thrust / (params.isp * params.gravity)))?;

    let speed2 = vx.squared() + vz.squared();
    let rho = params.rho0 * (-(&z / params.scale_height)).exp();
    dae.set_output("speed", speed2.sqrt())?;
    dae.set_output("dynamic pressure", 0.5 * rho * speed2)?;

    let acceleration = (dae.ddt("vx")?.squared() + dae.ddt("vz")?.squared()).sqrt();
    dae.set_output("acceleration", acceleration)?;
    Ok(dae)
}
