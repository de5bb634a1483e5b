use serde_yaml::Value;

use crate::{
    entity::{
        expect_item_map, expect_seq, expect_str, expect_u64, put, put_extras, Entity, RawMapping,
    },
    error::{Error, Result},
    link::VirtualLinkProfile,
    scaling::ScalingAspect,
};

const DEFAULT_INSTANTIATION_LEVEL: &str = "default-instantiation-level";

/// Instance-count bounds for one unit within a deployment flavor.
#[derive(Clone, Debug, Default)]
pub struct UnitProfile {
    id: String,
    min_instances: u64,
    max_instances: Option<u64>,
    extra: RawMapping,
    configured: bool,
}

impl UnitProfile {
    pub fn configure(&mut self, id: &str, min_instances: u64, max_instances: Option<u64>) -> Result<()> {
        self.guard_unconfigured()?;
        if let Some(max_instances) = max_instances {
            if max_instances < min_instances {
                return Err(Error::Validation(format!(
                    "the maximum instance count {max_instances} must not be below the minimum {min_instances}"
                )));
            }
        }

        self.id = id.into();
        self.min_instances = min_instances;
        self.max_instances = max_instances;
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn min_instances(&self) -> u64 {
        self.min_instances
    }

    pub const fn max_instances(&self) -> Option<u64> {
        self.max_instances
    }
}

impl Entity for UnitProfile {
    const KIND: &'static str = "unit profile";

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
                Some("min-number-of-instances") => {
                    self.min_instances = expect_u64("min-number-of-instances", value)?;
                }
                Some("max-number-of-instances") => {
                    self.max_instances = Some(expect_u64("max-number-of-instances", value)?);
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation(
                "the unit profile id must not be empty".into(),
            ));
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "id", self.id.as_str());
        put(&mut map, "min-number-of-instances", self.min_instances);
        if let Some(max_instances) = self.max_instances {
            put(&mut map, "max-number-of-instances", max_instances);
        }
        put_extras(&mut map, &self.extra);
        map
    }
}

/// One deployment flavor: unit profiles, autoscaling aspects and the
/// internal virtual link profiles. The instantiation level block is
/// derived from the unit profiles at export time.
#[derive(Clone, Debug, Default)]
pub struct Df {
    id: String,
    unit_profiles: Vec<UnitProfile>,
    scaling_aspects: Vec<ScalingAspect>,
    virtual_link_profiles: Vec<VirtualLinkProfile>,
    extra: RawMapping,
    configured: bool,
}

impl Df {
    pub fn configure(&mut self, id: &str) -> Result<()> {
        self.guard_unconfigured()?;

        self.id = id.into();
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn unit_profiles(&self) -> &[UnitProfile] {
        &self.unit_profiles
    }

    pub fn unit_profile(&self, id: &str) -> Option<&UnitProfile> {
        self.unit_profiles.iter().find(|profile| profile.id() == id)
    }

    pub fn scaling_aspects(&self) -> &[ScalingAspect] {
        &self.scaling_aspects
    }

    pub fn scaling_aspect(&self, id: &str) -> Option<&ScalingAspect> {
        self.scaling_aspects.iter().find(|aspect| aspect.id() == id)
    }

    pub fn virtual_link_profiles(&self) -> &[VirtualLinkProfile] {
        &self.virtual_link_profiles
    }

    pub fn virtual_link_profile(&self, id: &str) -> Option<&VirtualLinkProfile> {
        self.virtual_link_profiles
            .iter()
            .find(|profile| profile.id() == id)
    }

    pub(crate) fn add_unit_profile(&mut self, profile: UnitProfile) -> Result<()> {
        if self.unit_profile(profile.id()).is_some() {
            return Err(Error::AlreadyExists {
                kind: UnitProfile::KIND,
                id: profile.id().into(),
            });
        }

        self.unit_profiles.push(profile);
        Ok(())
    }

    pub(crate) fn remove_unit_profile(&mut self, id: &str) {
        self.unit_profiles.retain(|profile| profile.id() != id);
    }

    /// Append scaling aspects, all or nothing. Every unit referenced by
    /// every delta must already carry a unit profile; the first miss fails
    /// the whole batch with no aspect appended.
    pub(crate) fn add_scaling_aspects(&mut self, aspects: Vec<ScalingAspect>) -> Result<()> {
        for aspect in &aspects {
            if self.scaling_aspect(aspect.id()).is_some() {
                return Err(Error::AlreadyExists {
                    kind: ScalingAspect::KIND,
                    id: aspect.id().into(),
                });
            }
            for unit in aspect.unit_ids() {
                if self.unit_profile(unit).is_none() {
                    return Err(Error::NotFound {
                        kind: UnitProfile::KIND,
                        id: unit.into(),
                    });
                }
            }
        }

        self.scaling_aspects.extend(aspects);
        Ok(())
    }

    pub(crate) fn remove_scaling_aspect(&mut self, id: &str) -> Result<()> {
        let index = self
            .scaling_aspects
            .iter()
            .position(|aspect| aspect.id() == id)
            .ok_or_else(|| Error::NotFound {
                kind: ScalingAspect::KIND,
                id: id.into(),
            })?;
        self.scaling_aspects.remove(index);
        Ok(())
    }

    /// Drop every scaling aspect whose unit or telemetry references are no
    /// longer satisfiable.
    pub(crate) fn sweep_scaling_aspects(&mut self, telemetry_ids: &[String]) {
        let unit_ids: Vec<String> = self
            .unit_profiles
            .iter()
            .map(|profile| profile.id().into())
            .collect();
        self.scaling_aspects.retain(|aspect| {
            aspect.unit_ids().all(|unit| unit_ids.iter().any(|id| id == unit))
                && aspect
                    .telemetry_refs()
                    .all(|param| telemetry_ids.iter().any(|id| id == param))
        });
    }

    pub(crate) fn add_virtual_link_profile(&mut self, profile: VirtualLinkProfile) -> Result<()> {
        if self.virtual_link_profile(profile.id()).is_some() {
            return Err(Error::AlreadyExists {
                kind: VirtualLinkProfile::KIND,
                id: profile.id().into(),
            });
        }

        self.virtual_link_profiles.push(profile);
        Ok(())
    }

    pub(crate) fn remove_virtual_link_profile(&mut self, id: &str) {
        self.virtual_link_profiles.retain(|profile| profile.id() != id);
    }

    fn instantiation_level(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "id", DEFAULT_INSTANTIATION_LEVEL);
        put(
            &mut map,
            "vdu-level",
            Value::Sequence(
                self.unit_profiles
                    .iter()
                    .map(|profile| {
                        let mut level = RawMapping::new();
                        put(&mut level, "number-of-instances", profile.min_instances());
                        put(&mut level, "vdu-id", profile.id());
                        Value::Mapping(level)
                    })
                    .collect(),
            ),
        );
        map
    }
}

impl Entity for Df {
    const KIND: &'static str = "deployment flavor";

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
                // recomputed from the unit profiles at export time
                Some("instantiation-level") => continue,
                Some("vdu-profile") => {
                    for raw in expect_seq("vdu-profile", value)? {
                        let mut profile = UnitProfile::default();
                        profile.load(expect_item_map("vdu-profile", raw)?)?;
                        self.unit_profiles.push(profile);
                    }
                }
                Some("scaling-aspect") => {
                    for raw in expect_seq("scaling-aspect", value)? {
                        let mut aspect = ScalingAspect::default();
                        aspect.load(expect_item_map("scaling-aspect", raw)?)?;
                        self.scaling_aspects.push(aspect);
                    }
                }
                Some("virtual-link-profile") => {
                    for raw in expect_seq("virtual-link-profile", value)? {
                        let mut profile = VirtualLinkProfile::default();
                        profile.load(expect_item_map("virtual-link-profile", raw)?)?;
                        self.virtual_link_profiles.push(profile);
                    }
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation(
                "the deployment flavor id must not be empty".into(),
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
            "instantiation-level",
            Value::Sequence(vec![Value::Mapping(self.instantiation_level())]),
        );
        if !self.scaling_aspects.is_empty() {
            put(
                &mut map,
                "scaling-aspect",
                Value::Sequence(
                    self.scaling_aspects
                        .iter()
                        .map(|aspect| Value::Mapping(aspect.to_mapping()))
                        .collect(),
                ),
            );
        }
        put(
            &mut map,
            "vdu-profile",
            Value::Sequence(
                self.unit_profiles
                    .iter()
                    .map(|profile| Value::Mapping(profile.to_mapping()))
                    .collect(),
            ),
        );
        if !self.virtual_link_profiles.is_empty() {
            put(
                &mut map,
                "virtual-link-profile",
                Value::Sequence(
                    self.virtual_link_profiles
                        .iter()
                        .map(|profile| Value::Mapping(profile.to_mapping()))
                        .collect(),
                ),
            );
        }
        put_extras(&mut map, &self.extra);
        map
    }
}

#[cfg(test)]
mod tests {
    use crate::scaling::{Deltas, ScalingCriteria, ScalingPolicy, UnitDelta};

    use super::*;

    fn default_df() -> Df {
        let mut df = Df::default();
        df.configure("default-df").unwrap();

        let mut profile = UnitProfile::default();
        profile.configure("web", 1, Some(4)).unwrap();
        df.add_unit_profile(profile).unwrap();
        df
    }

    fn web_aspect(id: &str, unit: &str) -> ScalingAspect {
        let mut criteria = ScalingCriteria::default();
        criteria
            .configure(id, "web_cpu_utilization", Some(20), Some(80))
            .unwrap();
        let mut policy = ScalingPolicy::default();
        policy.configure(id, 120, 10, vec![criteria]).unwrap();
        let mut deltas = Deltas::default();
        deltas
            .configure(
                id,
                vec![UnitDelta {
                    unit: unit.into(),
                    instances: 1,
                }],
            )
            .unwrap();

        let mut aspect = ScalingAspect::default();
        aspect
            .configure(id, 3, vec![deltas], vec![policy], None)
            .unwrap();
        aspect
    }

    #[test]
    fn instantiation_level_tracks_unit_profiles() {
        let df = default_df();
        let exported = df.to_mapping();

        let levels = exported
            .get(Value::from("instantiation-level"))
            .and_then(Value::as_sequence)
            .unwrap();
        assert_eq!(levels.len(), 1);
        let level = levels[0].as_mapping().unwrap();
        assert_eq!(
            level.get(Value::from("id")).and_then(Value::as_str),
            Some("default-instantiation-level"),
        );
        let vdu_levels = level
            .get(Value::from("vdu-level"))
            .and_then(Value::as_sequence)
            .unwrap();
        assert_eq!(vdu_levels.len(), 1);
    }

    #[test]
    fn aspect_batch_is_all_or_nothing() {
        let mut df = default_df();
        let aspects = vec![web_aspect("web-scale", "web"), web_aspect("db-scale", "db")];

        assert!(matches!(
            df.add_scaling_aspects(aspects),
            Err(Error::NotFound { .. }),
        ));
        assert!(df.scaling_aspects().is_empty());
    }

    #[test]
    fn round_trip_drops_nothing() {
        let mut df = default_df();
        df.add_scaling_aspects(vec![web_aspect("web-scale", "web")])
            .unwrap();

        let mut link = VirtualLinkProfile::default();
        link.configure("backbone", "10.0.0.0/24".parse().unwrap(), None, true, None, None)
            .unwrap();
        df.add_virtual_link_profile(link).unwrap();

        let exported = df.to_mapping();
        let mut reloaded = Df::default();
        reloaded.load(&exported).unwrap();
        assert_eq!(reloaded.to_mapping(), exported);
        assert_eq!(reloaded.unit_profiles().len(), 1);
        assert_eq!(reloaded.scaling_aspects().len(), 1);
        assert_eq!(reloaded.virtual_link_profiles().len(), 1);
    }

    #[test]
    fn sweep_drops_aspects_with_dangling_refs() {
        let mut df = default_df();
        df.add_scaling_aspects(vec![web_aspect("web-scale", "web")])
            .unwrap();

        df.sweep_scaling_aspects(&[]);
        assert!(df.scaling_aspects().is_empty());
    }

    #[test]
    fn inverted_instance_bounds_are_rejected() {
        let mut profile = UnitProfile::default();
        assert!(matches!(
            profile.configure("web", 4, Some(1)),
            Err(Error::Validation(_)),
        ));
    }
}
