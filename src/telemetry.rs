//! Validation and commit of board telemetry.
//!
//! Every submission is checked completely before anything is written, so a
//! rejected submission never leaves a board half-updated.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::board::{BoardId, BoardRegistry};
use crate::error::{GridError, GridResult};
use crate::protocol::{ABSENT, PlantSetPoint, PowerData, ProtocolError, TimedPowerData};

/// A reading as submitted, before validation.
///
/// Values are widened to `i64` so JSON input outside the wire range can be
/// rejected instead of silently truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetrySubmission {
    pub production: Option<i64>,
    pub consumption: Option<i64>,
    /// Device clock, when the device sends one.
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<PowerData> for TelemetrySubmission {
    fn from(p: PowerData) -> Self {
        Self {
            production: p.production().map(i64::from),
            consumption: p.consumption().map(i64::from),
            timestamp: None,
        }
    }
}

impl TryFrom<TimedPowerData> for TelemetrySubmission {
    type Error = GridError;

    fn try_from(p: TimedPowerData) -> Result<Self, Self::Error> {
        let secs = i64::try_from(p.timestamp).map_err(|_| GridError::Time { skew_secs: i64::MAX })?;
        let timestamp =
            DateTime::from_timestamp(secs, 0).ok_or(GridError::Time { skew_secs: i64::MAX })?;
        Ok(Self {
            timestamp: Some(timestamp),
            ..Self::from(p.power)
        })
    }
}

/// Connection report; `None` on a side leaves that side's snapshot as is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionReport {
    pub production: Option<Vec<PlantSetPoint>>,
    pub consumption: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Copy)]
pub struct TelemetryIngestor {
    max_clock_skew: Duration,
}

impl TelemetryIngestor {
    pub fn new(max_clock_skew: Duration) -> Self {
        Self { max_clock_skew }
    }

    /// Validates a reading and stores it on the board.
    ///
    /// # Errors
    ///
    /// - [`GridError::Protocol`] if a value does not fit the wire range.
    /// - [`GridError::Time`] if the device clock is too far from `now`.
    /// - [`GridError::BoardNotFound`] if the board never registered.
    pub fn ingest(
        &self,
        registry: &BoardRegistry,
        board_id: &BoardId,
        submission: TelemetrySubmission,
        now: DateTime<Utc>,
    ) -> GridResult<()> {
        let checked = self.validate(&submission, now);
        let (production, consumption) = match checked {
            Ok(values) => values,
            Err(err) => {
                warn!(board = %board_id, error = %err, "telemetry rejected");
                return Err(err);
            }
        };
        registry.record_telemetry(board_id, production, consumption, now)?;
        debug!(board = %board_id, ?production, ?consumption, "telemetry stored");
        Ok(())
    }

    /// Validates a connection report and replaces the board's snapshot.
    ///
    /// # Errors
    ///
    /// - [`GridError::Protocol`] if an id appears twice on one side.
    /// - [`GridError::BoardNotFound`] if the board never registered.
    pub fn ingest_connections(
        &self,
        registry: &BoardRegistry,
        board_id: &BoardId,
        report: ConnectionReport,
        now: DateTime<Utc>,
    ) -> GridResult<()> {
        let production = report.production.map(production_snapshot).transpose();
        let consumption = report.consumption.map(consumption_snapshot).transpose();
        let (production, consumption) = match (production, consumption) {
            (Ok(p), Ok(c)) => (p, c),
            (Err(err), _) | (_, Err(err)) => {
                warn!(board = %board_id, error = %err, "connection report rejected");
                return Err(err.into());
            }
        };
        debug!(
            board = %board_id,
            plants = production.as_ref().map(BTreeMap::len),
            consumers = consumption.as_ref().map(BTreeSet::len),
            "connections stored"
        );
        registry.record_connections(board_id, production, consumption, now)
    }

    fn validate(
        &self,
        submission: &TelemetrySubmission,
        now: DateTime<Utc>,
    ) -> GridResult<(Option<i32>, Option<i32>)> {
        if let Some(ts) = submission.timestamp {
            let skew = ts - now;
            if skew.abs() > self.max_clock_skew {
                return Err(GridError::Time {
                    skew_secs: skew.num_seconds(),
                });
            }
        }
        let production = wire_value(submission.production, "production")?;
        let consumption = wire_value(submission.consumption, "consumption")?;
        Ok((production, consumption))
    }
}

fn wire_value(value: Option<i64>, field: &'static str) -> Result<Option<i32>, ProtocolError> {
    match value {
        None => Ok(None),
        Some(v) if v == i64::from(ABSENT) => Ok(None),
        Some(v) => i32::try_from(v).map(Some).map_err(|_| ProtocolError::InvalidField {
            packet: "PowerData",
            field,
        }),
    }
}

fn production_snapshot(plants: Vec<PlantSetPoint>) -> Result<BTreeMap<u32, i32>, ProtocolError> {
    let mut out = BTreeMap::new();
    for p in plants {
        if out.insert(p.plant_id, p.set_power).is_some() {
            return Err(ProtocolError::InvalidField {
                packet: "ConnectedProduction",
                field: "plant_id",
            });
        }
    }
    Ok(out)
}

fn consumption_snapshot(ids: Vec<u32>) -> Result<BTreeSet<u32>, ProtocolError> {
    let mut out = BTreeSet::new();
    for id in ids {
        if !out.insert(id) {
            return Err(ProtocolError::InvalidField {
                packet: "ConnectedConsumption",
                field: "consumer_id",
            });
        }
    }
    Ok(out)
}
