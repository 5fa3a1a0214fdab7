use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use shared::domain::{GeoPoint, IncidentStatus};

/// Mock geocoding: hospitals are placed at a fixed offset from the incident origin.
pub const DEFAULT_HOSPITAL_OFFSET: GeoPoint = GeoPoint {
    latitude: 0.01,
    longitude: 0.01,
};
pub const DEFAULT_SIMULATED_LATENCY: Duration = Duration::from_millis(1000);
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any status may follow any other; used for administrative corrections.
    Lenient,
    /// Only strictly later statuses are accepted. Skipping ahead is allowed.
    #[default]
    ForwardOnly,
}

impl TransitionPolicy {
    pub fn allows(self, from: IncidentStatus, to: IncidentStatus) -> bool {
        match self {
            TransitionPolicy::Lenient => true,
            TransitionPolicy::ForwardOnly => from.is_forward_to(to),
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "lenient" => Ok(TransitionPolicy::Lenient),
            "forward_only" => Ok(TransitionPolicy::ForwardOnly),
            other => Err(format!("unknown transition policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub transition_policy: TransitionPolicy,
    pub simulated_latency: Duration,
    pub hospital_offset: GeoPoint,
    pub event_capacity: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            transition_policy: TransitionPolicy::default(),
            simulated_latency: DEFAULT_SIMULATED_LATENCY,
            hospital_offset: DEFAULT_HOSPITAL_OFFSET,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
