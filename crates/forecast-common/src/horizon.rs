//! Forecast horizons (hours ahead of the model run).

use crate::{ForecastError, ForecastResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hours ahead of the run that a forecast layer shows.
///
/// Only the published steps are representable: 6, 12, 18, … 72.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ForecastHorizon(u32);

impl ForecastHorizon {
    pub const STEP_HOURS: u32 = 6;
    pub const FIRST_HOURS: u32 = 6;
    pub const LAST_HOURS: u32 = 72;

    /// The horizon shown when the map first finishes loading.
    pub const INITIAL: ForecastHorizon = ForecastHorizon(Self::FIRST_HOURS);

    pub fn new(hours: u32) -> ForecastResult<Self> {
        if (Self::FIRST_HOURS..=Self::LAST_HOURS).contains(&hours) && hours % Self::STEP_HOURS == 0
        {
            Ok(Self(hours))
        } else {
            Err(ForecastError::InvalidHorizon(hours))
        }
    }

    /// Every published horizon in ascending order.
    pub fn all() -> impl Iterator<Item = ForecastHorizon> {
        (Self::FIRST_HOURS..=Self::LAST_HOURS)
            .step_by(Self::STEP_HOURS as usize)
            .map(ForecastHorizon)
    }

    pub fn hours(&self) -> u32 {
        self.0
    }

    /// Three-digit form used in remote file names (`006`, `072`).
    pub fn zero_padded(&self) -> String {
        format!("{:03}", self.0)
    }
}

impl TryFrom<u32> for ForecastHorizon {
    type Error = ForecastError;

    fn try_from(hours: u32) -> Result<Self, Self::Error> {
        Self::new(hours)
    }
}

impl From<ForecastHorizon> for u32 {
    fn from(horizon: ForecastHorizon) -> Self {
        horizon.0
    }
}

impl fmt::Display for ForecastHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_horizons() {
        let hours: Vec<u32> = ForecastHorizon::all().map(|h| h.hours()).collect();
        assert_eq!(hours, vec![6, 12, 18, 24, 30, 36, 42, 48, 54, 60, 66, 72]);
    }

    #[test]
    fn test_rejects_off_step_values() {
        for hours in [0, 3, 7, 78, 999] {
            assert_eq!(
                ForecastHorizon::new(hours),
                Err(ForecastError::InvalidHorizon(hours))
            );
        }
    }

    #[test]
    fn test_zero_padded() {
        assert_eq!(ForecastHorizon::new(6).unwrap().zero_padded(), "006");
        assert_eq!(ForecastHorizon::new(72).unwrap().zero_padded(), "072");
    }

    #[test]
    fn test_serde_validates() {
        let horizon: ForecastHorizon = serde_json::from_str("18").unwrap();
        assert_eq!(horizon.hours(), 18);
        assert!(serde_json::from_str::<ForecastHorizon>("19").is_err());
        assert_eq!(serde_json::to_string(&horizon).unwrap(), "18");
    }
}
