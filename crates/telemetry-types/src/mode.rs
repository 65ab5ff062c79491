use serde::{Deserialize, Serialize};
use std::fmt;

/// Generation mode of the device feedback controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerMode {
    /// No remediation received yet.
    #[default]
    Neutral,
    Warming,
    Cooling,
}

impl fmt::Display for ControllerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerMode::Neutral => "neutral",
            ControllerMode::Warming => "warming",
            ControllerMode::Cooling => "cooling",
        };
        f.write_str(name)
    }
}
