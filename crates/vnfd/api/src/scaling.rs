use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use strum::{Display, EnumString};

use crate::{
    entity::{
        expect_i64, expect_item_map, expect_map, expect_seq, expect_str, expect_u64, put,
        put_extras, Entity, RawMapping,
    },
    error::{Error, Result},
};

const DEFAULT_SCALING_TYPE: &str = "automatic";

#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    EnumString,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum RelationalOperation {
    #[strum(serialize = "LT")]
    #[serde(rename = "LT")]
    Lt,
    #[strum(serialize = "GT")]
    #[serde(rename = "GT")]
    Gt,
}

impl RelationalOperation {
    fn parse(op: &str) -> Result<Self> {
        op.parse().map_err(|_| {
            Error::Validation(format!("the relational operation {op:?} is not available"))
        })
    }
}

/// Threshold rule over one monitoring parameter.
#[derive(Clone, Debug, Default)]
pub struct ScalingCriteria {
    name: String,
    monitoring_param: String,
    scale_in_op: Option<RelationalOperation>,
    scale_in_threshold: Option<i64>,
    scale_out_op: Option<RelationalOperation>,
    scale_out_threshold: Option<i64>,
    extra: RawMapping,
    configured: bool,
}

impl ScalingCriteria {
    pub fn configure(
        &mut self,
        name: &str,
        monitoring_param: &str,
        scale_in_threshold: Option<i64>,
        scale_out_threshold: Option<i64>,
    ) -> Result<()> {
        self.guard_unconfigured()?;
        if let (Some(scale_in), Some(scale_out)) = (scale_in_threshold, scale_out_threshold) {
            if scale_in >= scale_out {
                return Err(Error::Validation(format!(
                    "the scale-in threshold {scale_in} must be strictly less than the scale-out threshold {scale_out}"
                )));
            }
        }

        self.name = name.into();
        self.monitoring_param = monitoring_param.into();
        if let Some(scale_in) = scale_in_threshold {
            self.scale_in_op = Some(RelationalOperation::Lt);
            self.scale_in_threshold = Some(scale_in);
        }
        if let Some(scale_out) = scale_out_threshold {
            self.scale_out_op = Some(RelationalOperation::Gt);
            self.scale_out_threshold = Some(scale_out);
        }
        self.configured = true;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn monitoring_param(&self) -> &str {
        &self.monitoring_param
    }

    pub const fn scale_in_threshold(&self) -> Option<i64> {
        self.scale_in_threshold
    }

    pub const fn scale_out_threshold(&self) -> Option<i64> {
        self.scale_out_threshold
    }
}

impl Entity for ScalingCriteria {
    const KIND: &'static str = "scaling criteria";

    fn key(&self) -> &str {
        &self.name
    }

    fn configured(&self) -> bool {
        self.configured
    }

    fn load(&mut self, raw: &RawMapping) -> Result<()> {
        self.guard_unconfigured()?;

        for (key, value) in raw {
            match key.as_str() {
                Some("name") => self.name = expect_str("name", value)?,
                Some("scale-in-relational-operation") => {
                    self.scale_in_op = Some(RelationalOperation::parse(&expect_str(
                        "scale-in-relational-operation",
                        value,
                    )?)?);
                }
                Some("scale-in-threshold") => {
                    self.scale_in_threshold = Some(expect_i64("scale-in-threshold", value)?);
                }
                Some("scale-out-relational-operation") => {
                    self.scale_out_op = Some(RelationalOperation::parse(&expect_str(
                        "scale-out-relational-operation",
                        value,
                    )?)?);
                }
                Some("scale-out-threshold") => {
                    self.scale_out_threshold = Some(expect_i64("scale-out-threshold", value)?);
                }
                Some("vnf-monitoring-param-ref") => {
                    self.monitoring_param = expect_str("vnf-monitoring-param-ref", value)?;
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.name.is_empty() {
            return Err(Error::Validation(
                "the scaling criteria name must not be empty".into(),
            ));
        }
        if let (Some(scale_in), Some(scale_out)) = (self.scale_in_threshold, self.scale_out_threshold)
        {
            if scale_in >= scale_out {
                return Err(Error::Validation(format!(
                    "the scale-in threshold {scale_in} must be strictly less than the scale-out threshold {scale_out}"
                )));
            }
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "name", self.name.as_str());
        if let (Some(op), Some(threshold)) = (self.scale_in_op, self.scale_in_threshold) {
            put(&mut map, "scale-in-relational-operation", op.to_string());
            put(&mut map, "scale-in-threshold", threshold);
        }
        if let (Some(op), Some(threshold)) = (self.scale_out_op, self.scale_out_threshold) {
            put(&mut map, "scale-out-relational-operation", op.to_string());
            put(&mut map, "scale-out-threshold", threshold);
        }
        put(&mut map, "vnf-monitoring-param-ref", self.monitoring_param.as_str());
        put_extras(&mut map, &self.extra);
        map
    }
}

/// Named bundle of criteria with the trigger timing.
#[derive(Clone, Debug, Default)]
pub struct ScalingPolicy {
    name: String,
    cooldown_time: u64,
    threshold_time: u64,
    scaling_type: String,
    criteria: Vec<ScalingCriteria>,
    extra: RawMapping,
    configured: bool,
}

impl ScalingPolicy {
    pub fn configure(
        &mut self,
        name: &str,
        cooldown_time: u64,
        threshold_time: u64,
        criteria: Vec<ScalingCriteria>,
    ) -> Result<()> {
        self.guard_unconfigured()?;

        self.name = name.into();
        self.cooldown_time = cooldown_time;
        self.threshold_time = threshold_time;
        self.scaling_type = DEFAULT_SCALING_TYPE.into();
        self.criteria = criteria;
        self.configured = true;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn cooldown_time(&self) -> u64 {
        self.cooldown_time
    }

    pub const fn threshold_time(&self) -> u64 {
        self.threshold_time
    }

    pub fn scaling_type(&self) -> &str {
        &self.scaling_type
    }

    pub fn criteria(&self) -> &[ScalingCriteria] {
        &self.criteria
    }
}

impl Entity for ScalingPolicy {
    const KIND: &'static str = "scaling policy";

    fn key(&self) -> &str {
        &self.name
    }

    fn configured(&self) -> bool {
        self.configured
    }

    fn load(&mut self, raw: &RawMapping) -> Result<()> {
        self.guard_unconfigured()?;

        for (key, value) in raw {
            match key.as_str() {
                Some("name") => self.name = expect_str("name", value)?,
                Some("cooldown-time") => self.cooldown_time = expect_u64("cooldown-time", value)?,
                Some("threshold-time") => {
                    self.threshold_time = expect_u64("threshold-time", value)?;
                }
                Some("scaling-type") => self.scaling_type = expect_str("scaling-type", value)?,
                Some("scaling-criteria") => {
                    for raw in expect_seq("scaling-criteria", value)? {
                        let mut criteria = ScalingCriteria::default();
                        criteria.load(expect_item_map("scaling-criteria", raw)?)?;
                        self.criteria.push(criteria);
                    }
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.name.is_empty() {
            return Err(Error::Validation(
                "the scaling policy name must not be empty".into(),
            ));
        }
        if self.scaling_type.is_empty() {
            self.scaling_type = DEFAULT_SCALING_TYPE.into();
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "cooldown-time", self.cooldown_time);
        put(&mut map, "name", self.name.as_str());
        put(&mut map, "scaling-type", self.scaling_type.as_str());
        put(&mut map, "threshold-time", self.threshold_time);
        put(
            &mut map,
            "scaling-criteria",
            Value::Sequence(
                self.criteria
                    .iter()
                    .map(|criteria| Value::Mapping(criteria.to_mapping()))
                    .collect(),
            ),
        );
        put_extras(&mut map, &self.extra);
        map
    }
}

/// One unit-id → instance-count delta.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitDelta {
    pub unit: String,
    pub instances: u64,
}

/// Instance-count deltas applied by one scale step.
#[derive(Clone, Debug, Default)]
pub struct Deltas {
    id: String,
    unit_deltas: Vec<UnitDelta>,
    extra: RawMapping,
    configured: bool,
}

impl Deltas {
    pub fn configure(&mut self, id: &str, unit_deltas: Vec<UnitDelta>) -> Result<()> {
        self.guard_unconfigured()?;

        self.id = id.into();
        self.unit_deltas = unit_deltas;
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn unit_deltas(&self) -> &[UnitDelta] {
        &self.unit_deltas
    }
}

impl Entity for Deltas {
    const KIND: &'static str = "aspect deltas";

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
                Some("vdu-delta") => {
                    for raw in expect_seq("vdu-delta", value)? {
                        let map = expect_item_map("vdu-delta", raw)?;
                        let mut unit = None;
                        let mut instances = None;
                        for (key, value) in map {
                            match key.as_str() {
                                Some("id") => unit = Some(expect_str("id", value)?),
                                Some("number-of-instances") => {
                                    instances = Some(expect_u64("number-of-instances", value)?);
                                }
                                _ => continue,
                            }
                        }
                        self.unit_deltas.push(UnitDelta {
                            unit: unit.ok_or_else(|| {
                                Error::Validation("the vdu-delta names no unit id".into())
                            })?,
                            instances: instances.ok_or_else(|| {
                                Error::Validation(
                                    "the vdu-delta declares no number of instances".into(),
                                )
                            })?,
                        });
                    }
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation(
                "the aspect deltas id must not be empty".into(),
            ));
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "id", self.id.as_str());
        put(
            &mut map,
            "vdu-delta",
            Value::Sequence(
                self.unit_deltas
                    .iter()
                    .map(|delta| {
                        let mut map = RawMapping::new();
                        put(&mut map, "id", delta.unit.as_str());
                        put(&mut map, "number-of-instances", delta.instances);
                        Value::Mapping(map)
                    })
                    .collect(),
            ),
        );
        put_extras(&mut map, &self.extra);
        map
    }
}

/// Named autoscaling rule set: deltas plus trigger policies.
#[derive(Clone, Debug, Default)]
pub struct ScalingAspect {
    id: String,
    name: String,
    max_scale_level: u64,
    deltas: Vec<Deltas>,
    policies: Vec<ScalingPolicy>,
    extra: RawMapping,
    configured: bool,
}

impl ScalingAspect {
    pub fn configure(
        &mut self,
        id: &str,
        max_scale_level: u64,
        deltas: Vec<Deltas>,
        policies: Vec<ScalingPolicy>,
        name: Option<&str>,
    ) -> Result<()> {
        self.guard_unconfigured()?;

        self.id = id.into();
        self.name = name.unwrap_or(id).into();
        self.max_scale_level = max_scale_level;
        self.deltas = deltas;
        self.policies = policies;
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn max_scale_level(&self) -> u64 {
        self.max_scale_level
    }

    pub fn deltas(&self) -> &[Deltas] {
        &self.deltas
    }

    pub fn policies(&self) -> &[ScalingPolicy] {
        &self.policies
    }

    /// Every unit id referenced by the deltas.
    pub fn unit_ids(&self) -> impl Iterator<Item = &str> {
        self.deltas
            .iter()
            .flat_map(|deltas| deltas.unit_deltas())
            .map(|delta| delta.unit.as_str())
    }

    /// Every monitoring parameter id referenced by the criteria.
    pub fn telemetry_refs(&self) -> impl Iterator<Item = &str> {
        self.policies
            .iter()
            .flat_map(|policy| policy.criteria())
            .map(ScalingCriteria::monitoring_param)
    }
}

impl Entity for ScalingAspect {
    const KIND: &'static str = "scaling aspect";

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
                Some("max-scale-level") => {
                    self.max_scale_level = expect_u64("max-scale-level", value)?;
                }
                Some("aspect-delta-details") => {
                    let details = expect_map("aspect-delta-details", value)?;
                    for (key, value) in details {
                        if key.as_str() != Some("deltas") {
                            continue;
                        }
                        for raw in expect_seq("deltas", value)? {
                            let mut deltas = Deltas::default();
                            deltas.load(expect_item_map("deltas", raw)?)?;
                            self.deltas.push(deltas);
                        }
                    }
                }
                Some("scaling-policy") => {
                    for raw in expect_seq("scaling-policy", value)? {
                        let mut policy = ScalingPolicy::default();
                        policy.load(expect_item_map("scaling-policy", raw)?)?;
                        self.policies.push(policy);
                    }
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation(
                "the scaling aspect id must not be empty".into(),
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
        put(&mut map, "max-scale-level", self.max_scale_level);

        let mut details = RawMapping::new();
        put(
            &mut details,
            "deltas",
            Value::Sequence(
                self.deltas
                    .iter()
                    .map(|deltas| Value::Mapping(deltas.to_mapping()))
                    .collect(),
            ),
        );
        put(&mut map, "aspect-delta-details", details);

        put(
            &mut map,
            "scaling-policy",
            Value::Sequence(
                self.policies
                    .iter()
                    .map(|policy| Value::Mapping(policy.to_mapping()))
                    .collect(),
            ),
        );
        put_extras(&mut map, &self.extra);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_aspect() -> ScalingAspect {
        let mut criteria = ScalingCriteria::default();
        criteria
            .configure("storage_disk_read_bytes", "storage_disk_read_bytes", Some(100), Some(300))
            .unwrap();

        let mut policy = ScalingPolicy::default();
        policy.configure("storage-scale", 120, 10, vec![criteria]).unwrap();

        let mut deltas = Deltas::default();
        deltas
            .configure(
                "storage-scale",
                vec![UnitDelta {
                    unit: "storage".into(),
                    instances: 1,
                }],
            )
            .unwrap();

        let mut aspect = ScalingAspect::default();
        aspect
            .configure("storage-scale", 1, vec![deltas], vec![policy], None)
            .unwrap();
        aspect
    }

    #[test]
    fn threshold_ordering_is_enforced() {
        let mut criteria = ScalingCriteria::default();
        assert!(matches!(
            criteria.configure("cpu", "web_cpu_utilization", Some(80), Some(80)),
            Err(Error::Validation(_)),
        ));
        assert!(!criteria.configured());
    }

    #[test]
    fn one_sided_criteria_is_accepted() {
        let mut criteria = ScalingCriteria::default();
        criteria
            .configure("cpu", "web_cpu_utilization", None, Some(80))
            .unwrap();

        let exported = criteria.to_mapping();
        let mut reloaded = ScalingCriteria::default();
        reloaded.load(&exported).unwrap();
        assert_eq!(reloaded.to_mapping(), exported);
        assert_eq!(reloaded.scale_in_threshold(), None);
    }

    #[test]
    fn aspect_round_trip() {
        let aspect = storage_aspect();
        let exported = aspect.to_mapping();

        let mut reloaded = ScalingAspect::default();
        reloaded.load(&exported).unwrap();
        assert_eq!(reloaded.to_mapping(), exported);

        let units: Vec<_> = reloaded.unit_ids().collect();
        assert_eq!(units, vec!["storage"]);
        let refs: Vec<_> = reloaded.telemetry_refs().collect();
        assert_eq!(refs, vec!["storage_disk_read_bytes"]);
    }

    #[test]
    fn aspect_name_defaults_to_id() {
        let aspect = storage_aspect();
        assert_eq!(aspect.name(), "storage-scale");
    }
}
