//! Where forecast rasters live.

use chrono::NaiveDate;
use forecast_common::time::run_path_component;
use forecast_common::ForecastHorizon;

/// Public bucket holding accumulated precipitation (APCP) forecasts.
pub const DEFAULT_BASE_URL: &str =
    "https://mapion-vt-public-stg.s3.ap-northeast-1.amazonaws.com/lab/noaa/apcp";

/// Model cycle (UTC hour) the rasters are published for.
pub const DEFAULT_CYCLE_HOUR: u32 = 18;

/// One model run's set of forecast rasters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastDataset {
    base_url: String,
    run_date: NaiveDate,
    cycle_hour: u32,
}

impl ForecastDataset {
    pub fn new(base_url: impl Into<String>, run_date: NaiveDate) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            run_date,
            cycle_hour: DEFAULT_CYCLE_HOUR,
        }
    }

    pub fn with_cycle_hour(mut self, cycle_hour: u32) -> Self {
        self.cycle_hour = cycle_hour;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    pub fn cycle_hour(&self) -> u32 {
        self.cycle_hour
    }

    /// `<base>/<YYYYMMDD>/<cycle>/<NNN>.tif`
    pub fn source_url(&self, horizon: ForecastHorizon) -> String {
        format!(
            "{}/{}/{:02}/{}.tif",
            self.base_url,
            run_path_component(self.run_date),
            self.cycle_hour,
            horizon.zero_padded()
        )
    }
}
