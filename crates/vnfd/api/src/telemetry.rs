use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    entity::{expect_str, put, put_extras, Entity, RawMapping},
    error::{Error, Result},
};

/// Closed set of monitorable metrics.
#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    EnumIter,
    EnumString,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    CpuUtilization,
    AverageMemoryUtilization,
    DiskReadOps,
    DiskWriteOps,
    DiskReadBytes,
    DiskWriteBytes,
    PacketsReceived,
    PacketsSent,
}

impl TelemetryKind {
    /// Parse a metric name, rejecting anything outside the closed set.
    pub fn parse(metric: &str) -> Result<Self> {
        metric
            .parse()
            .map_err(|_| Error::Validation(format!("the metric {metric:?} is not available")))
    }
}

/// One telemetry binding on a unit.
#[derive(Clone, Debug)]
pub struct MonitoringParameter {
    id: String,
    name: String,
    metric: TelemetryKind,
    extra: RawMapping,
    configured: bool,
}

impl Default for MonitoringParameter {
    fn default() -> Self {
        Self {
            id: String::default(),
            name: String::default(),
            metric: TelemetryKind::CpuUtilization,
            extra: RawMapping::default(),
            configured: false,
        }
    }
}

impl MonitoringParameter {
    pub fn configure(&mut self, id: &str, metric: TelemetryKind, name: Option<&str>) -> Result<()> {
        self.guard_unconfigured()?;

        self.id = id.into();
        self.metric = metric;
        self.name = name.unwrap_or(id).into();
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn metric(&self) -> TelemetryKind {
        self.metric
    }
}

impl Entity for MonitoringParameter {
    const KIND: &'static str = "monitoring parameter";

    fn key(&self) -> &str {
        &self.id
    }

    fn configured(&self) -> bool {
        self.configured
    }

    fn load(&mut self, raw: &RawMapping) -> Result<()> {
        self.guard_unconfigured()?;

        for (key, value) in raw {
            match key.as_str() {
                Some("id") => self.id = expect_str("id", value)?,
                Some("name") => self.name = expect_str("name", value)?,
                Some("performance-metric") => {
                    self.metric = TelemetryKind::parse(&expect_str("performance-metric", value)?)?;
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation(
                "the monitoring parameter id must not be empty".into(),
            ));
        }
        if self.name.is_empty() {
            self.name = self.id.clone();
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "id", self.id.as_str());
        put(&mut map, "name", self.name.as_str());
        put(&mut map, "performance-metric", self.metric.to_string());
        put_extras(&mut map, &self.extra);
        map
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn metric_names_match_the_published_set() {
        let names: Vec<_> = TelemetryKind::iter().map(|kind| kind.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "cpu_utilization",
                "average_memory_utilization",
                "disk_read_ops",
                "disk_write_ops",
                "disk_read_bytes",
                "disk_write_bytes",
                "packets_received",
                "packets_sent",
            ],
        );
    }

    #[test]
    fn unknown_metric_is_rejected() {
        assert!(matches!(
            TelemetryKind::parse("bogus_metric"),
            Err(Error::Validation(_)),
        ));
    }

    #[test]
    fn round_trip() {
        let mut param = MonitoringParameter::default();
        param
            .configure("web_cpu_utilization", TelemetryKind::CpuUtilization, None)
            .unwrap();

        let exported = param.to_mapping();
        let mut reloaded = MonitoringParameter::default();
        reloaded.load(&exported).unwrap();
        assert_eq!(reloaded.to_mapping(), exported);
        assert_eq!(reloaded.metric(), TelemetryKind::CpuUtilization);
    }
}
