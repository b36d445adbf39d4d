//! Control laws and the closed-loop activation controller.

pub mod controller;

use serde::{Deserialize, Serialize};

pub use controller::{ControlError, FeedbackController};

/// Maps a setpoint and a measurement to an actuation value.
///
/// Laws may keep internal state (integrators, previous error); the controller
/// calls [`ControlLaw::compute`] exactly once per tick.
pub trait ControlLaw: Send {
    /// Actuation for one tick of length `dt_s` seconds.
    fn compute(&mut self, setpoint: f64, measured: f64, dt_s: f64) -> f64;
}

/// `bias + gain·(setpoint − measured)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proportional {
    pub gain: f64,
    pub bias: f64,
}

impl Proportional {
    pub fn new(gain: f64) -> Self {
        Self { gain, bias: 0.0 }
    }

    pub fn with_bias(gain: f64, bias: f64) -> Self {
        Self { gain, bias }
    }
}

impl ControlLaw for Proportional {
    fn compute(&mut self, setpoint: f64, measured: f64, _dt_s: f64) -> f64 {
        self.bias + self.gain * (setpoint - measured)
    }
}

/// Discrete PID with a clamped integral term.
#[derive(Debug, Clone, PartialEq)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,
    integral_limit: f64,
    integral: f64,
    prev_error: Option<f64>,
}

impl Pid {
    /// # Arguments
    /// * `kp`, `ki`, `kd` - Proportional, integral and derivative gains
    /// * `integral_limit` - Bound on the magnitude of the accumulated
    ///   error·seconds; infinity disables the bound
    pub fn new(kp: f64, ki: f64, kd: f64, integral_limit: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral_limit: if integral_limit.is_nan() {
                f64::INFINITY
            } else {
                integral_limit.abs()
            },
            integral: 0.0,
            prev_error: None,
        }
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}

impl ControlLaw for Pid {
    fn compute(&mut self, setpoint: f64, measured: f64, dt_s: f64) -> f64 {
        let error = setpoint - measured;

        self.integral = (self.integral + error * dt_s)
            .clamp(-self.integral_limit, self.integral_limit);

        // No derivative kick on the first tick
        let derivative = match self.prev_error {
            Some(prev) if dt_s > 0.0 => (error - prev) / dt_s,
            _ => 0.0,
        };
        self.prev_error = Some(error);

        self.kp * error + self.ki * self.integral + self.kd * derivative
    }
}

/// Serializable choice of control law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlLawConfig {
    Proportional {
        gain: f64,
        #[serde(default)]
        bias: f64,
    },
    Pid {
        kp: f64,
        #[serde(default)]
        ki: f64,
        #[serde(default)]
        kd: f64,
        /// Absent means unbounded
        #[serde(default, skip_serializing_if = "Option::is_none")]
        integral_limit: Option<f64>,
    },
}

impl Default for ControlLawConfig {
    fn default() -> Self {
        ControlLawConfig::Proportional {
            gain: 0.01,
            bias: 0.0,
        }
    }
}

impl ControlLawConfig {
    /// Check that every gain is finite and the integral bound is non-negative.
    pub fn validate(&self) -> Result<(), ControlError> {
        let gains = match *self {
            ControlLawConfig::Proportional { gain, bias } => vec![("gain", gain), ("bias", bias)],
            ControlLawConfig::Pid { kp, ki, kd, .. } => vec![("kp", kp), ("ki", ki), ("kd", kd)],
        };
        if let Some((name, value)) = gains.into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ControlError::InvalidGain { name, value });
        }
        if let ControlLawConfig::Pid {
            integral_limit: Some(limit),
            ..
        } = *self
        {
            if limit.is_nan() || limit < 0.0 {
                return Err(ControlError::InvalidGain {
                    name: "integral_limit",
                    value: limit,
                });
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Box<dyn ControlLaw>, ControlError> {
        self.validate()?;
        Ok(match *self {
            ControlLawConfig::Proportional { gain, bias } => {
                Box::new(Proportional::with_bias(gain, bias))
            }
            ControlLawConfig::Pid {
                kp,
                ki,
                kd,
                integral_limit,
            } => Box::new(Pid::new(
                kp,
                ki,
                kd,
                integral_limit.unwrap_or(f64::INFINITY),
            )),
        })
    }
}
