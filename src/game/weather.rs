//! Weather conditions and the per-source outlook shown to players.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::round::{CoefficientTable, Period, SourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Windy,
    Calm,
}

/// What a source is expected to do this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOutlook {
    FullOutput,
    Reduced,
    NotProducing,
}

impl WeatherCondition {
    /// Effects this condition has on individual sources.
    pub fn effects(self) -> &'static [(SourceType, SourceOutlook)] {
        match self {
            WeatherCondition::Sunny => &[(SourceType::Photovoltaic, SourceOutlook::FullOutput)],
            WeatherCondition::Cloudy => &[(SourceType::Photovoltaic, SourceOutlook::Reduced)],
            WeatherCondition::Windy => &[(SourceType::Wind, SourceOutlook::FullOutput)],
            WeatherCondition::Calm => &[(SourceType::Wind, SourceOutlook::NotProducing)],
        }
    }
}

fn period_effects(period: Period) -> &'static [(SourceType, SourceOutlook)] {
    match period {
        Period::Day => &[],
        Period::Night => &[(SourceType::Photovoltaic, SourceOutlook::NotProducing)],
    }
}

/// Derives the outlook for every source the round enables.
///
/// Period effects apply first, then each weather condition in order; a later
/// effect on the same source replaces an earlier one. Sources that are not in
/// `coefficients` are not part of the round and are left out.
pub fn outlook(
    period: Period,
    weather: &[WeatherCondition],
    coefficients: &CoefficientTable<SourceType>,
) -> BTreeMap<SourceType, SourceOutlook> {
    let mut out = BTreeMap::new();
    let effects = period_effects(period)
        .iter()
        .chain(weather.iter().flat_map(|w| w.effects().iter()));
    for &(source, effect) in effects {
        if coefficients.contains(source) {
            out.insert(source, effect);
        }
    }
    out
}
