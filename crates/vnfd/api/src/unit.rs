use std::net::Ipv4Addr;

use serde_yaml::Value;

use crate::{
    entity::{expect_item_map, expect_seq, expect_str, put, put_extras, Entity, RawMapping},
    error::{Error, Result},
    interface::{Interface, InterfaceKind},
    telemetry::{MonitoringParameter, TelemetryKind},
};

/// One deployable compute instance definition. Profile and image members
/// are stored as ids and resolved through the owning descriptor.
#[derive(Clone, Debug, Default)]
pub struct Unit {
    id: String,
    name: Option<String>,
    images: Vec<String>,
    boot_script: Option<String>,
    compute_profile: String,
    storage_profiles: Vec<String>,
    interfaces: Vec<Interface>,
    telemetries: Vec<MonitoringParameter>,
    // interface positions are never reused, even across removals
    next_position: u64,
    extra: RawMapping,
    configured: bool,
}

impl Unit {
    pub fn configure(
        &mut self,
        id: &str,
        images: Vec<String>,
        compute_profile: &str,
        storage_profiles: Vec<String>,
        name: Option<&str>,
        boot_script: Option<&str>,
    ) -> Result<()> {
        self.guard_unconfigured()?;
        if images.is_empty() {
            return Err(Error::Validation(format!(
                "the unit {id:?} declares no image"
            )));
        }

        self.id = id.into();
        self.images = images;
        self.compute_profile = compute_profile.into();
        self.storage_profiles = storage_profiles;
        self.name = name.map(Into::into);
        self.boot_script = boot_script.map(Into::into);
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn boot_script(&self) -> Option<&str> {
        self.boot_script.as_deref()
    }

    pub fn compute_profile(&self) -> &str {
        &self.compute_profile
    }

    pub fn storage_profiles(&self) -> &[String] {
        &self.storage_profiles
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface(&self, id: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|interface| interface.id() == id)
    }

    pub(crate) fn interface_mut(&mut self, id: &str) -> Option<&mut Interface> {
        self.interfaces
            .iter_mut()
            .find(|interface| interface.id() == id)
    }

    pub fn telemetries(&self) -> &[MonitoringParameter] {
        &self.telemetries
    }

    pub fn telemetry_ids(&self) -> Vec<String> {
        self.telemetries
            .iter()
            .map(|telemetry| telemetry.id().into())
            .collect()
    }

    /// Append a new interface at the next free position. The position
    /// counter is monotonic: removing an interface never renumbers the
    /// survivors nor recycles its position.
    pub fn add_interface(
        &mut self,
        id: Option<&str>,
        internal_link: Option<&str>,
        kind: InterfaceKind,
        address: Option<Ipv4Addr>,
        name: Option<&str>,
    ) -> Result<&Interface> {
        let position = self.next_position;
        let id = match id {
            Some(id) => id.into(),
            None => format!("{}_int_{position}", self.id),
        };
        if self.interface(&id).is_some() {
            return Err(Error::AlreadyExists {
                kind: Interface::KIND,
                id,
            });
        }

        let mut interface = Interface::default();
        interface.configure(&id, position, kind, address, name, internal_link)?;
        self.next_position += 1;
        self.interfaces.push(interface);
        Ok(self.interfaces.last().expect("the interface was just appended"))
    }

    pub fn remove_interface(&mut self, id: &str) -> Result<()> {
        let index = self
            .interfaces
            .iter()
            .position(|interface| interface.id() == id)
            .ok_or_else(|| Error::NotFound {
                kind: Interface::KIND,
                id: id.into(),
            })?;
        self.interfaces.remove(index);
        Ok(())
    }

    pub(crate) fn remove_interfaces_on_link(&mut self, internal_link: &str) {
        self.interfaces
            .retain(|interface| interface.internal_link() != Some(internal_link));
    }

    /// Bind one telemetry metric, with the derived id `{unit}_{metric}`.
    pub fn add_telemetry(&mut self, metric: TelemetryKind) -> Result<&MonitoringParameter> {
        let id = format!("{}_{metric}", self.id);
        if self.telemetries.iter().any(|telemetry| telemetry.id() == id) {
            return Err(Error::AlreadyExists {
                kind: MonitoringParameter::KIND,
                id,
            });
        }

        let mut telemetry = MonitoringParameter::default();
        telemetry.configure(&id, metric, None)?;
        self.telemetries.push(telemetry);
        Ok(self.telemetries.last().expect("the telemetry was just appended"))
    }

    pub fn remove_telemetry(&mut self, metric: TelemetryKind) -> Result<()> {
        let index = self
            .telemetries
            .iter()
            .position(|telemetry| telemetry.metric() == metric)
            .ok_or_else(|| Error::NotFound {
                kind: MonitoringParameter::KIND,
                id: format!("{}_{metric}", self.id),
            })?;
        self.telemetries.remove(index);
        Ok(())
    }

    pub(crate) fn has_telemetry(&self, metric: TelemetryKind) -> bool {
        self.telemetries.iter().any(|telemetry| telemetry.metric() == metric)
    }
}

impl Entity for Unit {
    const KIND: &'static str = "unit";

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
                Some("name") => self.name = Some(expect_str("name", value)?),
                Some("cloud-init-file") => {
                    self.boot_script = Some(expect_str("cloud-init-file", value)?);
                }
                Some("sw-image-desc") => {
                    self.images.insert(0, expect_str("sw-image-desc", value)?);
                }
                Some("alternative-sw-image-desc") => {
                    for image in expect_seq("alternative-sw-image-desc", value)? {
                        self.images.push(expect_str("alternative-sw-image-desc", image)?);
                    }
                }
                Some("virtual-compute-desc") => {
                    self.compute_profile = expect_str("virtual-compute-desc", value)?;
                }
                Some("virtual-storage-desc") => {
                    for profile in expect_seq("virtual-storage-desc", value)? {
                        self.storage_profiles
                            .push(expect_str("virtual-storage-desc", profile)?);
                    }
                }
                Some("int-cpd") => {
                    for raw in expect_seq("int-cpd", value)? {
                        let mut interface = Interface::default();
                        interface.load(expect_item_map("int-cpd", raw)?)?;
                        self.interfaces.push(interface);
                    }
                }
                Some("monitoring-parameter") => {
                    for raw in expect_seq("monitoring-parameter", value)? {
                        let mut telemetry = MonitoringParameter::default();
                        telemetry.load(expect_item_map("monitoring-parameter", raw)?)?;
                        self.telemetries.push(telemetry);
                    }
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation("the unit id must not be empty".into()));
        }
        if self.images.is_empty() {
            return Err(Error::Validation(format!(
                "the unit {:?} declares no image",
                self.id,
            )));
        }
        self.next_position = self
            .interfaces
            .iter()
            .map(|interface| interface.position() + 1)
            .max()
            .unwrap_or_default();
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "id", self.id.as_str());
        if let Some(name) = &self.name {
            put(&mut map, "name", name.as_str());
        }
        if let Some(boot_script) = &self.boot_script {
            put(&mut map, "cloud-init-file", boot_script.as_str());
        }
        put(&mut map, "sw-image-desc", self.images[0].as_str());
        if self.images.len() > 1 {
            put(
                &mut map,
                "alternative-sw-image-desc",
                Value::Sequence(self.images[1..].iter().map(|image| Value::from(image.as_str())).collect()),
            );
        }
        put(
            &mut map,
            "int-cpd",
            Value::Sequence(
                self.interfaces
                    .iter()
                    .map(|interface| Value::Mapping(interface.to_mapping()))
                    .collect(),
            ),
        );
        put(&mut map, "virtual-compute-desc", self.compute_profile.as_str());
        put(
            &mut map,
            "virtual-storage-desc",
            Value::Sequence(
                self.storage_profiles
                    .iter()
                    .map(|profile| Value::from(profile.as_str()))
                    .collect(),
            ),
        );
        if !self.telemetries.is_empty() {
            put(
                &mut map,
                "monitoring-parameter",
                Value::Sequence(
                    self.telemetries
                        .iter()
                        .map(|telemetry| Value::Mapping(telemetry.to_mapping()))
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
    use super::*;

    fn web_unit() -> Unit {
        let mut unit = Unit::default();
        unit.configure(
            "web",
            vec!["ubuntu20.04".into(), "ubuntu22.04".into()],
            "web-compute",
            vec!["web-storage".into()],
            None,
            Some("web-init"),
        )
        .unwrap();
        unit
    }

    #[test]
    fn positions_survive_remove_and_re_add() {
        let mut unit = web_unit();
        unit.add_interface(None, None, InterfaceKind::Paravirt, None, None)
            .unwrap();
        unit.add_interface(None, None, InterfaceKind::Paravirt, None, None)
            .unwrap();

        unit.remove_interface("web_int_0").unwrap();
        let added = unit
            .add_interface(None, None, InterfaceKind::Paravirt, None, None)
            .unwrap();

        assert_eq!(added.id(), "web_int_2");
        assert_eq!(added.position(), 2);
        let positions: Vec<_> = unit.interfaces().iter().map(Interface::position).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn round_trip_keeps_all_alternative_images() {
        let mut unit = web_unit();
        unit.add_interface(None, Some("backbone"), InterfaceKind::Paravirt, None, None)
            .unwrap();
        unit.add_telemetry(TelemetryKind::DiskReadBytes).unwrap();

        let exported = unit.to_mapping();
        let mut reloaded = Unit::default();
        reloaded.load(&exported).unwrap();

        assert_eq!(reloaded.to_mapping(), exported);
        assert_eq!(reloaded.images(), ["ubuntu20.04", "ubuntu22.04"]);
        assert_eq!(reloaded.telemetry_ids(), vec!["web_disk_read_bytes"]);
    }

    #[test]
    fn duplicate_telemetry_is_rejected() {
        let mut unit = web_unit();
        unit.add_telemetry(TelemetryKind::CpuUtilization).unwrap();

        assert!(matches!(
            unit.add_telemetry(TelemetryKind::CpuUtilization),
            Err(Error::AlreadyExists { .. }),
        ));
        assert_eq!(unit.telemetries().len(), 1);
    }

    #[test]
    fn configure_without_image_fails() {
        let mut unit = Unit::default();
        assert!(matches!(
            unit.configure("web", vec![], "web-compute", vec![], None, None),
            Err(Error::Validation(_)),
        ));
    }
}
