/// Topic names for one building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    building: String,
}

impl Topics {
    pub fn new(building: impl Into<String>) -> Self {
        Self {
            building: building.into(),
        }
    }

    /// Topic devices publish monitoring events on.
    pub fn telemetry(&self) -> String {
        format!("telemetry/{}", self.building)
    }

    /// Topic remediation commands are published on.
    pub fn remediation(&self) -> String {
        format!("remediation/{}", self.building)
    }
}
