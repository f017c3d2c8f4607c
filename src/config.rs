// src/config.rs
use anyhow::{Context, ensure};
use bevy_color::Srgba;
use serde::{Deserialize, Serialize};

/// Environment variable naming a JSON file with a [`FieldConfig`].
pub const CONFIG_ENV_VAR: &str = "NEURONFIELD_CONFIG";

/// Colors of the field. Channels are sRGB bytes, alphas are in [0, 1].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Palette {
    /// Page background, also the color of the per-frame fade fill.
    pub background: [u8; 3],
    pub fade_alpha: f32,
    /// Shared by nodes and links.
    pub accent: [u8; 3],
    pub node_alpha: f32,
    /// Link alpha and width at full signal strength.
    pub link_alpha: f32,
    pub link_width: f32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: [20, 20, 20],
            fade_alpha: 0.1,
            accent: [205, 164, 94],
            node_alpha: 0.6,
            link_alpha: 0.15,
            link_width: 0.8,
        }
    }
}

impl Palette {
    pub fn background(&self) -> Srgba {
        rgb(self.background, 1.0)
    }

    pub fn fade(&self) -> Srgba {
        rgb(self.background, self.fade_alpha)
    }

    pub fn node(&self) -> Srgba {
        rgb(self.accent, self.node_alpha)
    }

    /// Link color for a signal strength in [0, 1].
    pub fn link(&self, signal: f32) -> Srgba {
        rgb(self.accent, self.link_alpha * signal)
    }
}

fn rgb([r, g, b]: [u8; 3], alpha: f32) -> Srgba {
    Srgba {
        alpha,
        ..Srgba::rgb_u8(r, g, b)
    }
}

/// Tunables of the neuron field. Defaults reproduce the stock effect.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FieldConfig {
    pub node_count: usize,
    pub max_neighbors: usize,
    /// Velocity components are drawn from [-max_speed, max_speed).
    pub max_speed: f32,
    pub radius_min: f32,
    pub radius_max: f32,
    /// Phase advance per frame, in radians.
    pub phase_step: f32,
    /// Links at or beyond this distance are not drawn.
    pub link_range: f32,
    /// Distance over which the signal phase shifts by one radian.
    pub signal_wavelength: f32,
    /// Fixed RNG seed. `None` seeds from the OS.
    pub seed: Option<u64>,
    pub palette: Palette,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            node_count: 30,
            max_neighbors: 3,
            max_speed: 0.5,
            radius_min: 2.0,
            radius_max: 5.0,
            phase_step: 0.02,
            link_range: 200.0,
            signal_wavelength: 50.0,
            seed: None,
            palette: Palette::default(),
        }
    }
}

impl FieldConfig {
    /// Parses and validates a JSON document. Missing keys take their defaults.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: FieldConfig =
            serde_json::from_str(json).context("Failed to parse field config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named by `NEURONFIELD_CONFIG`, or the defaults if it is unset.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> anyhow::Result<Self> {
        let Some(path) = std::env::var_os(CONFIG_ENV_VAR) else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read field config {}", path.to_string_lossy()))?;
        log::info!("Loaded field config from {}", path.to_string_lossy());
        Self::from_json(&json)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.node_count > 0, "node_count must be at least 1");
        ensure!(
            self.max_speed.is_finite() && self.max_speed >= 0.0,
            "max_speed must be finite and non-negative, got {}",
            self.max_speed
        );
        ensure!(
            self.radius_min.is_finite() && self.radius_min > 0.0,
            "radius_min must be positive, got {}",
            self.radius_min
        );
        ensure!(
            self.radius_max.is_finite() && self.radius_max >= self.radius_min,
            "radius_max ({}) must not be below radius_min ({})",
            self.radius_max,
            self.radius_min
        );
        ensure!(self.phase_step.is_finite(), "phase_step must be finite");
        ensure!(
            self.link_range.is_finite() && self.link_range > 0.0,
            "link_range must be positive, got {}",
            self.link_range
        );
        ensure!(
            self.signal_wavelength.is_finite() && self.signal_wavelength > 0.0,
            "signal_wavelength must be positive, got {}",
            self.signal_wavelength
        );

        let palette = &self.palette;
        for (name, alpha) in [
            ("fade_alpha", palette.fade_alpha),
            ("node_alpha", palette.node_alpha),
            ("link_alpha", palette.link_alpha),
        ] {
            ensure!((0.0..=1.0).contains(&alpha), "{name} must be within [0, 1], got {alpha}");
        }
        ensure!(
            palette.link_width.is_finite() && palette.link_width >= 0.0,
            "link_width must be non-negative, got {}",
            palette.link_width
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FieldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.node_count, 30);
        assert_eq!(config.max_neighbors, 3);
        assert_eq!(config.link_range, 200.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = FieldConfig::from_json(r#"{ "seed": 42, "palette": { "node_alpha": 0.3 } }"#)
            .unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.palette.node_alpha, 0.3);
        assert_eq!(config.palette.accent, [205, 164, 94]);
        assert_eq!(config.phase_step, 0.02);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(FieldConfig::from_json("{ node_count: }").is_err());
    }

    #[test]
    fn rejects_inverted_radius_range() {
        let err = FieldConfig::from_json(r#"{ "radius_min": 6.0, "radius_max": 5.0 }"#).unwrap_err();
        assert!(err.to_string().contains("radius_max"));
    }

    #[test]
    fn rejects_alpha_out_of_range() {
        assert!(FieldConfig::from_json(r#"{ "palette": { "fade_alpha": 1.5 } }"#).is_err());
    }

    #[test]
    fn link_color_scales_alpha_with_signal() {
        let palette = Palette::default();
        let link = palette.link(0.5);
        assert!((link.alpha - 0.075).abs() < 1e-6);
        assert_eq!(link.red, palette.node().red);
    }
}
