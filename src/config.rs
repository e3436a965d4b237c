//! TOML server configuration and preset definitions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::auth::{UserAccount, UserType};
use crate::game::{
    BuildingType, CoefficientTable, GameplayRound, GridCatalog, Period, PowerRange, Round,
    Scenario, ScenarioLibrary, ScoreTable, SourceType, WeatherCondition,
};

/// Top-level configuration parsed from TOML.
///
/// Every section has defaults. Load from TOML with
/// [`GameConfig::from_toml_file`] or use [`GameConfig::demo`] for the
/// built-in classroom setup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameConfig {
    /// Listener and logging.
    #[serde(default)]
    pub server: ServerConfig,
    /// Telemetry retention and liveness.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Score table used by scenarios that do not define their own.
    #[serde(default)]
    pub scoring: ScoreTable,
    /// Output band per source type (mW).
    #[serde(default)]
    pub source_ranges: BTreeMap<SourceType, PowerRange>,
    /// Initial base consumption per building type (mW).
    #[serde(default)]
    pub building_consumption: BTreeMap<BuildingType, i32>,
    #[serde(default)]
    pub plants: Vec<PlantConfig>,
    #[serde(default)]
    pub consumers: Vec<ConsumerConfig>,
    /// Accounts served by the built-in static auth gateway.
    #[serde(default)]
    pub users: Vec<UserAccount>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind, e.g. `"127.0.0.1"`.
    pub bind: String,
    pub port: u16,
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub log_level: String,
    /// Seconds between liveness sweeps (must be > 0).
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            sweep_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Samples kept per board and direction (must be > 0).
    pub history_capacity: usize,
    /// A board silent for longer than this is disconnected (must be > 0).
    pub liveness_ttl_secs: u64,
    /// Largest accepted distance between device and server clocks.
    pub max_clock_skew_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            liveness_ttl_secs: 30,
            max_clock_skew_secs: 300,
        }
    }
}

/// A power plant boards can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlantConfig {
    pub id: u32,
    pub source: SourceType,
}

/// A consumer building boards can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsumerConfig {
    pub id: u32,
    pub building: BuildingType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    /// Overrides the top-level `[scoring]` table.
    #[serde(default)]
    pub scoring: Option<ScoreTable>,
    #[serde(default)]
    pub rounds: Vec<RoundConfig>,
}

/// One `[[scenarios.rounds]]` entry, discriminated by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundConfig {
    Day(GameplayRoundConfig),
    Night(GameplayRoundConfig),
    Slide {
        file: String,
        #[serde(default)]
        comment: String,
    },
    SlideRange {
        files: Vec<String>,
        #[serde(default)]
        comment: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameplayRoundConfig {
    pub weather: Vec<WeatherCondition>,
    pub production_coefficients: BTreeMap<SourceType, f64>,
    pub consumption_modifiers: BTreeMap<BuildingType, f64>,
    pub comment: String,
}

impl RoundConfig {
    fn to_round(&self) -> Round {
        match self {
            RoundConfig::Day(g) => Round::Gameplay(g.to_round(Period::Day)),
            RoundConfig::Night(g) => Round::Gameplay(g.to_round(Period::Night)),
            RoundConfig::Slide { file, comment } => Round::Slide {
                file: file.clone(),
                comment: comment.clone(),
            },
            RoundConfig::SlideRange { files, comment } => Round::SlideRange {
                files: files.clone(),
                comment: comment.clone(),
            },
        }
    }
}

impl GameplayRoundConfig {
    fn to_round(&self, period: Period) -> GameplayRound {
        GameplayRound {
            period,
            weather: self.weather.clone(),
            production_coefficients: CoefficientTable::new(self.production_coefficients.clone()),
            consumption_modifiers: CoefficientTable::new(self.consumption_modifiers.clone()),
            comment: self.comment.clone(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"telemetry.history_capacity"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

fn err(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError {
        field: field.into(),
        message: message.into(),
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn gameplay(
    weather: &[WeatherCondition],
    production: &[(SourceType, f64)],
    consumption: &[(BuildingType, f64)],
    comment: &str,
) -> GameplayRoundConfig {
    GameplayRoundConfig {
        weather: weather.to_vec(),
        production_coefficients: production.iter().copied().collect(),
        consumption_modifiers: consumption.iter().copied().collect(),
        comment: comment.to_string(),
    }
}

fn user(username: &str, password: &str, user_type: UserType, display_name: &str) -> UserAccount {
    UserAccount {
        username: username.to_string(),
        password: password.to_string(),
        user_type,
        group_id: "group1".to_string(),
        display_name: Some(display_name.to_string()),
    }
}

impl GameConfig {
    /// Classroom setup: a small grid, one lecturer, three boards and a short
    /// day/night scenario with weather.
    pub fn demo() -> Self {
        use BuildingType as B;
        use SourceType as S;
        use WeatherCondition as W;

        let plants = [
            (1, S::Photovoltaic),
            (2, S::Photovoltaic),
            (3, S::Wind),
            (4, S::Coal),
            (5, S::Gas),
            (6, S::Nuclear),
            (7, S::Hydro),
            (8, S::HydroStorage),
            (9, S::Battery),
        ]
        .into_iter()
        .map(|(id, source)| PlantConfig { id, source })
        .collect();

        let consumers = [
            (101, B::Residential),
            (102, B::Residential),
            (103, B::Commercial),
            (104, B::Industrial),
            (105, B::Hospital),
            (106, B::School),
            (107, B::DataCenter),
            (108, B::Farm),
            (109, B::Stadium),
        ]
        .into_iter()
        .map(|(id, building)| ConsumerConfig { id, building })
        .collect();

        let all_sources = [
            (S::Photovoltaic, 1.0),
            (S::Wind, 0.6),
            (S::Coal, 1.0),
            (S::Gas, 1.0),
            (S::Nuclear, 1.0),
        ];

        let rounds = vec![
            RoundConfig::Slide {
                file: "intro.pdf".to_string(),
                comment: "Welcome".to_string(),
            },
            RoundConfig::Day(gameplay(
                &[W::Sunny, W::Calm],
                &[
                    (S::Photovoltaic, 1.0),
                    (S::Wind, 0.0),
                    (S::Coal, 1.0),
                    (S::Gas, 1.0),
                    (S::Nuclear, 1.0),
                ],
                &[(B::Commercial, 1.2), (B::School, 1.0)],
                "Sunny morning",
            )),
            RoundConfig::Night(gameplay(
                &[W::Windy],
                &[
                    (S::Photovoltaic, 0.0),
                    (S::Wind, 1.0),
                    (S::Coal, 1.0),
                    (S::Gas, 1.0),
                    (S::Nuclear, 1.0),
                ],
                &[(B::Residential, 1.4), (B::Commercial, 0.3), (B::School, 0.0)],
                "Windy night",
            )),
            RoundConfig::SlideRange {
                files: vec!["storage_1.png".to_string(), "storage_2.png".to_string()],
                comment: "Storage".to_string(),
            },
            RoundConfig::Day(gameplay(
                &[W::Cloudy],
                &all_sources,
                &[(B::Industrial, 1.3), (B::Stadium, 2.0)],
                "Cloudy match day",
            )),
        ];

        Self {
            server: ServerConfig::default(),
            telemetry: TelemetryConfig::default(),
            scoring: ScoreTable::default(),
            source_ranges: BTreeMap::from([
                (S::Photovoltaic, PowerRange { min: 0, max: 3_000 }),
                (S::Wind, PowerRange { min: 0, max: 2_500 }),
                (S::Coal, PowerRange { min: 500, max: 5_000 }),
                (S::Gas, PowerRange { min: 0, max: 4_000 }),
                (S::Nuclear, PowerRange { min: 3_000, max: 8_000 }),
                (S::Hydro, PowerRange { min: 0, max: 2_000 }),
                (S::HydroStorage, PowerRange { min: -2_000, max: 2_000 }),
                (S::Battery, PowerRange { min: -1_500, max: 1_500 }),
            ]),
            building_consumption: BTreeMap::from([
                (B::Residential, 800),
                (B::Commercial, 1_200),
                (B::Industrial, 3_000),
                (B::Hospital, 1_500),
                (B::School, 700),
                (B::DataCenter, 2_500),
                (B::Farm, 400),
                (B::Stadium, 1_800),
            ]),
            plants,
            consumers,
            users: vec![
                user("lecturer", "lecturer", UserType::Lecturer, "Lecturer"),
                user("board1", "board1", UserType::Board, "Team 1"),
                user("board2", "board2", UserType::Board, "Team 2"),
                user("board3", "board3", UserType::Board, "Team 3"),
            ],
            scenarios: vec![ScenarioConfig {
                id: "demo".to_string(),
                name: Some("Demo day".to_string()),
                scoring: None,
                rounds,
            }],
        }
    }

    /// One lecturer, one board and a single day round. No plant or consumer
    /// catalog, so boards are scored on the values they report.
    pub fn minimal() -> Self {
        Self {
            users: vec![
                user("lecturer", "lecturer", UserType::Lecturer, "Lecturer"),
                user("board1", "board1", UserType::Board, "Team 1"),
            ],
            scenarios: vec![ScenarioConfig {
                id: "minimal".to_string(),
                name: None,
                scoring: None,
                rounds: vec![RoundConfig::Day(GameplayRoundConfig::default())],
            }],
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["demo", "minimal"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "demo" => Ok(Self::demo()),
            "minimal" => Ok(Self::minimal()),
            _ => Err(err(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| err("config", format!("cannot read \"{}\": {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| err("toml", e.to_string()))
    }

    /// Address the HTTP server binds to.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `server.bind` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind
            .parse()
            .map_err(|_| err("server.bind", format!("not an IP address: \"{}\"", self.server.bind)))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    pub fn catalog(&self) -> GridCatalog {
        GridCatalog {
            plants: self.plants.iter().map(|p| (p.id, p.source)).collect(),
            consumers: self.consumers.iter().map(|c| (c.id, c.building)).collect(),
            source_ranges: self.source_ranges.clone(),
        }
    }

    pub fn scenario_library(&self) -> ScenarioLibrary {
        ScenarioLibrary::new(self.scenarios.iter().map(|s| Scenario {
            id: s.id.clone(),
            name: s.name.clone().unwrap_or_else(|| s.id.clone()),
            rounds: s.rounds.iter().map(RoundConfig::to_round).collect(),
            scoring: s.scoring.unwrap_or(self.scoring),
        }))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.server;
        if s.bind.parse::<IpAddr>().is_err() {
            errors.push(err("server.bind", format!("not an IP address: \"{}\"", s.bind)));
        }
        if !LOG_LEVELS.contains(&s.log_level.as_str()) {
            errors.push(err(
                "server.log_level",
                format!("must be one of {}, got \"{}\"", LOG_LEVELS.join(", "), s.log_level),
            ));
        }
        if s.sweep_interval_secs == 0 {
            errors.push(err("server.sweep_interval_secs", "must be > 0"));
        }

        let t = &self.telemetry;
        if t.history_capacity == 0 {
            errors.push(err("telemetry.history_capacity", "must be > 0"));
        }
        if t.liveness_ttl_secs == 0 {
            errors.push(err("telemetry.liveness_ttl_secs", "must be > 0"));
        }

        validate_score_table(&self.scoring, "scoring", &mut errors);

        for (source, range) in &self.source_ranges {
            if range.min > range.max {
                errors.push(err(
                    format!("source_ranges.{}", key_name(source)),
                    "min must be <= max",
                ));
            }
        }
        for (building, value) in &self.building_consumption {
            if *value < 0 {
                errors.push(err(
                    format!("building_consumption.{}", key_name(building)),
                    "must be >= 0",
                ));
            }
        }

        let mut seen = BTreeSet::new();
        for (i, p) in self.plants.iter().enumerate() {
            if !seen.insert(p.id) {
                errors.push(err(format!("plants[{i}].id"), format!("duplicate plant id {}", p.id)));
            }
        }
        let mut seen = BTreeSet::new();
        for (i, c) in self.consumers.iter().enumerate() {
            if !seen.insert(c.id) {
                errors.push(err(
                    format!("consumers[{i}].id"),
                    format!("duplicate consumer id {}", c.id),
                ));
            }
        }

        let mut seen = BTreeSet::new();
        for (i, u) in self.users.iter().enumerate() {
            if u.username.is_empty() {
                errors.push(err(format!("users[{i}].username"), "must not be empty"));
            } else if !seen.insert(u.username.as_str()) {
                errors.push(err(
                    format!("users[{i}].username"),
                    format!("duplicate username \"{}\"", u.username),
                ));
            }
            if u.group_id.is_empty() {
                errors.push(err(format!("users[{i}].group_id"), "must not be empty"));
            }
        }

        let mut seen = BTreeSet::new();
        for (i, sc) in self.scenarios.iter().enumerate() {
            let path = format!("scenarios[{i}]");
            if sc.id.is_empty() {
                errors.push(err(format!("{path}.id"), "must not be empty"));
            } else if !seen.insert(sc.id.as_str()) {
                errors.push(err(format!("{path}.id"), format!("duplicate scenario id \"{}\"", sc.id)));
            }
            if sc.rounds.is_empty() {
                errors.push(err(format!("{path}.rounds"), "must contain at least one round"));
            }
            if let Some(table) = &sc.scoring {
                validate_score_table(table, &format!("{path}.scoring"), &mut errors);
            }
            for (j, round) in sc.rounds.iter().enumerate() {
                validate_round(round, &format!("{path}.rounds[{j}]"), &mut errors);
            }
        }

        errors
    }
}

/// Name of an enum key as it is written in the TOML file.
fn key_name<T: Serialize>(key: &T) -> String {
    serde_json::to_value(key)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

fn validate_score_table(table: &ScoreTable, path: &str, errors: &mut Vec<ConfigError>) {
    if table.best_within < 0 {
        errors.push(err(format!("{path}.best_within"), "must be >= 0"));
    }
    if table.middle_within < table.best_within {
        errors.push(err(format!("{path}.middle_within"), format!("must be >= {path}.best_within")));
    }
}

fn validate_round(round: &RoundConfig, path: &str, errors: &mut Vec<ConfigError>) {
    match round {
        RoundConfig::Day(g) | RoundConfig::Night(g) => {
            for (source, c) in &g.production_coefficients {
                if !c.is_finite() || *c < 0.0 {
                    errors.push(err(
                        format!("{path}.production_coefficients.{}", key_name(source)),
                        "must be a finite number >= 0",
                    ));
                }
            }
            for (building, m) in &g.consumption_modifiers {
                if !m.is_finite() || *m < 0.0 {
                    errors.push(err(
                        format!("{path}.consumption_modifiers.{}", key_name(building)),
                        "must be a finite number >= 0",
                    ));
                }
            }
        }
        RoundConfig::Slide { file, .. } => {
            if file.is_empty() {
                errors.push(err(format!("{path}.file"), "must not be empty"));
            }
        }
        RoundConfig::SlideRange { files, .. } => {
            if files.is_empty() {
                errors.push(err(format!("{path}.files"), "must contain at least one file"));
            }
        }
    }
}
