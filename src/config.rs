use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use roboseed_control::{ChassisConfig, RotationalGains, SeekLimits, TranslationalGains};
use roboseed_kinematics::angle::degrees;
use roboseed_kinematics::{FieldPose, Vec2};
use serde::Deserialize;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "ROBOSEED";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub chassis: ChassisSettings,
    pub plant: PlantSettings,
    #[serde(default)]
    pub route: Vec<RouteStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSettings {
    pub control_period_ms: u64,
    pub plant_period_ms: u64,
    pub watchdog_timeout_ms: u64,
    pub telemetry_capacity: usize,
    #[serde(default)]
    pub abort_on_stuck: bool,
}

impl RuntimeSettings {
    pub fn control_period(&self) -> Duration {
        Duration::from_millis(self.control_period_ms)
    }

    pub fn plant_period(&self) -> Duration {
        Duration::from_millis(self.plant_period_ms)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }
}

/// Rotational gains with the threshold in degrees.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RotationSettings {
    pub lookahead: f64,
    pub max_power: f64,
    pub deceleration_threshold: f64,
    #[serde(default)]
    pub integral_ratio: f64,
}

impl From<RotationSettings> for RotationalGains {
    fn from(s: RotationSettings) -> Self {
        RotationalGains {
            lookahead: s.lookahead,
            max_power: s.max_power,
            deceleration_threshold: degrees(s.deceleration_threshold),
            integral_ratio: s.integral_ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TranslationSettings {
    pub lookahead: f64,
    pub max_power: f64,
    pub deceleration_threshold: f64,
    #[serde(default)]
    pub integral_ratio: f64,
}

impl From<TranslationSettings> for TranslationalGains {
    fn from(s: TranslationSettings) -> Self {
        TranslationalGains {
            lookahead: s.lookahead,
            max_power: s.max_power,
            deceleration_threshold: s.deceleration_threshold,
            integral_ratio: s.integral_ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SeekSettings {
    pub position_tolerance: f64,
    pub min_linear_speed: f64,
    pub rotation_tolerance_deg: f64,
    pub min_angular_speed_deg: f64,
    pub stuck_timeout_ms: u64,
}

impl From<SeekSettings> for SeekLimits {
    fn from(s: SeekSettings) -> Self {
        SeekLimits {
            position_tolerance: s.position_tolerance,
            min_linear_speed: s.min_linear_speed,
            rotation_tolerance: degrees(s.rotation_tolerance_deg),
            min_angular_speed: degrees(s.min_angular_speed_deg),
            stuck_timeout: Duration::from_millis(s.stuck_timeout_ms),
        }
    }
}

/// Chassis tuning as written in the config file. Missing sections keep the
/// controller defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChassisSettings {
    pub auto_mode: bool,
    pub normalize_wheel_powers: bool,
    pub rotation_integral_window_deg: Option<f64>,
    pub stationary_rotation: Option<RotationSettings>,
    pub moving_rotation: Option<RotationSettings>,
    pub teleop_translation: Option<TranslationSettings>,
    pub autonomous_translation: Option<TranslationSettings>,
    pub seek: Option<SeekSettings>,
}

impl ChassisSettings {
    pub fn to_chassis_config(&self) -> ChassisConfig {
        let defaults = ChassisConfig::default();
        ChassisConfig {
            stationary_rotation: self
                .stationary_rotation
                .map(Into::into)
                .unwrap_or(defaults.stationary_rotation),
            moving_rotation: self
                .moving_rotation
                .map(Into::into)
                .unwrap_or(defaults.moving_rotation),
            rotation_integral_window: self
                .rotation_integral_window_deg
                .map(degrees)
                .unwrap_or(defaults.rotation_integral_window),
            teleop_translation: self
                .teleop_translation
                .map(Into::into)
                .unwrap_or(defaults.teleop_translation),
            autonomous_translation: self
                .autonomous_translation
                .map(Into::into)
                .unwrap_or(defaults.autonomous_translation),
            seek: self.seek.map(Into::into).unwrap_or(defaults.seek),
            normalize_wheel_powers: self.normalize_wheel_powers,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StartPose {
    pub x: f64,
    pub y: f64,
    pub heading_deg: f64,
}

impl From<StartPose> for FieldPose {
    fn from(s: StartPose) -> Self {
        FieldPose::new(s.x, s.y, degrees(s.heading_deg))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlantSettings {
    /// Body speed at full power, units/s.
    pub top_speed: f64,
    /// Yaw rate at full rotation power, deg/s.
    pub top_yaw_rate_deg: f64,
    /// First-order lag between commanded and achieved velocity, s.
    pub velocity_time_constant: f64,
    pub position_noise: f64,
    pub heading_noise_deg: f64,
    pub velocity_noise: f64,
    /// Weight of the newest sample in the filtered velocity, in (0, 1].
    pub velocity_filter: f64,
    /// Minimum spacing of regular estimator refreshes.
    pub sample_period_ms: u64,
    pub seed: Option<u64>,
    pub wall_y: Option<f64>,
    pub start: StartPose,
}

/// One leg of the autonomous route.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteStep {
    Position { target: Vec2 },
    Rotation { degrees: f64 },
    /// Field-relative manual drive for a fixed time.
    Drive { x: f64, y: f64, rotation: f64, ms: u64 },
    /// Hold position and heading.
    Pause { ms: u64 },
}

/// Loads `config/default.toml`, then `override_path` if given, then
/// `ROBOSEED__SECTION__KEY` environment variables.
pub fn load_config(override_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let mut builder = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(true));
    if let Some(path) = override_path {
        info!("Layering configuration overrides from {}", path);
        builder = builder.add_source(File::new(path, FileFormat::Toml).required(true));
    }
    let settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|settings| settings.try_deserialize::<AppConfig>());

    match settings {
        Ok(config) => {
            info!(route_steps = config.route.len(), auto_mode = config.chassis.auto_mode, "Successfully loaded configuration");
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_TOML: &str = include_str!("../config/default.toml");
    const EPSILON: f64 = 1e-9;

    fn parse(toml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_file_parses() {
        let config = parse(DEFAULT_TOML);
        assert_eq!(config.runtime.control_period(), Duration::from_millis(20));
        assert!(config.chassis.auto_mode);
        assert_eq!(config.plant.wall_y, Some(2600.0));
        assert_eq!(
            config.route.first(),
            Some(&RouteStep::Position { target: Vec2::new(0.0, 1500.0) })
        );
        assert!(config.route.contains(&RouteStep::Rotation { degrees: 90.0 }));
        assert!(config.route.contains(&RouteStep::Pause { ms: 250 }));
    }

    #[test]
    fn test_default_file_matches_controller_defaults() {
        let config = parse(DEFAULT_TOML).chassis.to_chassis_config();
        let defaults = ChassisConfig::default();

        let close = |a: f64, b: f64| (a - b).abs() < EPSILON;
        assert!(close(
            config.stationary_rotation.deceleration_threshold,
            defaults.stationary_rotation.deceleration_threshold
        ));
        assert!(close(config.moving_rotation.max_power, defaults.moving_rotation.max_power));
        assert!(close(
            config.autonomous_translation.deceleration_threshold,
            2400.0
        ));
        assert!(close(config.seek.rotation_tolerance, defaults.seek.rotation_tolerance));
        assert_eq!(config.seek.stuck_timeout, defaults.seek.stuck_timeout);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_chassis_section_uses_defaults() {
        let toml = r#"
            [runtime]
            control_period_ms = 10
            plant_period_ms = 5
            watchdog_timeout_ms = 100
            telemetry_capacity = 8

            [plant]
            top_speed = 2000.0
            top_yaw_rate_deg = 200.0
            velocity_time_constant = 0.0
            position_noise = 0.0
            heading_noise_deg = 0.0
            velocity_noise = 0.0
            velocity_filter = 1.0
            sample_period_ms = 0

            [plant.start]
            x = 10.0
            y = 20.0
            heading_deg = 90.0
        "#;
        let config = parse(toml);
        assert!(config.route.is_empty());
        assert!(!config.runtime.abort_on_stuck);
        assert_eq!(config.chassis.to_chassis_config(), ChassisConfig::default());

        let start: FieldPose = config.plant.start.into();
        assert!((start.heading - degrees(90.0)).abs() < EPSILON);
    }

    #[test]
    fn test_drive_step() {
        let toml = r#"
            kind = "drive"
            x = 0.5
            y = -0.25
            rotation = 0.1
            ms = 300
        "#;
        let step: RouteStep = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(
            step,
            RouteStep::Drive { x: 0.5, y: -0.25, rotation: 0.1, ms: 300 }
        );
    }
}
