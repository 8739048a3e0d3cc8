use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

#[enum_dispatch]
pub trait TransportModel {
    fn name(&self) -> &'static str;
    /// dynamic viscosity, kg/(m s)
    fn mu(&self, t: f64) -> f64;
    /// thermal diffusivity for enthalpy `kappa/cp = mu/Pr`, kg/(m s)
    fn alpha(&self, t: f64) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstTransport {
    pub mu: f64,
    pub pr: f64,
}

impl TransportModel for ConstTransport {
    fn name(&self) -> &'static str {
        "const"
    }

    fn mu(&self, _t: f64) -> f64 {
        self.mu
    }

    fn alpha(&self, t: f64) -> f64 {
        self.mu(t) / self.pr
    }
}

/// `mu = As sqrt(T) / (1 + Ts/T)`
#[derive(Debug, Clone, PartialEq)]
pub struct SutherlandTransport {
    pub a_s: f64,
    pub t_s: f64,
    pub pr: f64,
}

impl TransportModel for SutherlandTransport {
    fn name(&self) -> &'static str {
        "sutherland"
    }

    fn mu(&self, t: f64) -> f64 {
        self.a_s * t.sqrt() / (1.0 + self.t_s / t)
    }

    fn alpha(&self, t: f64) -> f64 {
        self.mu(t) / self.pr
    }
}

#[derive(Debug, Clone, PartialEq)]
#[enum_dispatch(TransportModel)]
pub enum TransportEnum {
    Const(ConstTransport),
    Sutherland(SutherlandTransport),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportSettings {
    Const { mu: f64, pr: f64 },
    Sutherland { a_s: f64, t_s: f64, pr: f64 },
}

impl Default for TransportSettings {
    fn default() -> Self {
        TransportSettings::Const { mu: 1.8e-5, pr: 0.7 }
    }
}

pub fn create_transport(settings: &TransportSettings) -> TransportEnum {
    match *settings {
        TransportSettings::Const { mu, pr } => TransportEnum::Const(ConstTransport { mu, pr }),
        TransportSettings::Sutherland { a_s, t_s, pr } => {
            TransportEnum::Sutherland(SutherlandTransport { a_s, t_s, pr })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sutherland_air_viscosity() {
        let transport = create_transport(&TransportSettings::Sutherland {
            a_s: 1.458e-6,
            t_s: 110.4,
            pr: 0.7,
        });
        assert_relative_eq!(transport.mu(300.0), 1.846e-5, epsilon = 1e-7);
        assert_relative_eq!(transport.alpha(300.0), transport.mu(300.0) / 0.7);
    }

    #[test]
    fn settings_from_json() {
        let settings: TransportSettings =
            serde_json::from_str(r#"{"type": "const", "mu": 2e-5, "pr": 1.0}"#).unwrap();
        let transport = create_transport(&settings);
        assert_eq!(transport.name(), "const");
        assert_eq!(transport.alpha(1000.0), 2e-5);
    }
}
