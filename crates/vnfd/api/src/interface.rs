use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use strum::{Display, EnumString};

use crate::{
    entity::{expect_item_map, expect_seq, expect_str, expect_u64, put, put_extras, Entity, RawMapping},
    error::{Error, Result},
};

/// Virtual interface implementations accepted by the schema.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
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
pub enum InterfaceKind {
    #[default]
    #[strum(serialize = "PARAVIRT")]
    #[serde(rename = "PARAVIRT")]
    Paravirt,
    #[strum(serialize = "PCI-PASSTHROUGH")]
    #[serde(rename = "PCI-PASSTHROUGH")]
    PciPassthrough,
    #[strum(serialize = "SR-IOV")]
    #[serde(rename = "SR-IOV")]
    SrIov,
    #[strum(serialize = "E1000")]
    #[serde(rename = "E1000")]
    E1000,
    #[strum(serialize = "RTL8139")]
    #[serde(rename = "RTL8139")]
    Rtl8139,
    #[strum(serialize = "PCNET")]
    #[serde(rename = "PCNET")]
    Pcnet,
}

impl InterfaceKind {
    fn parse(kind: &str) -> Result<Self> {
        kind.parse()
            .map_err(|_| Error::Validation(format!("the interface type {kind:?} is not available")))
    }
}

/// Per-unit network attachment point. The internal link, when present, is
/// a stored id resolved through the owning descriptor.
#[derive(Clone, Debug, Default)]
pub struct Interface {
    id: String,
    name: String,
    position: u64,
    kind: InterfaceKind,
    address: Option<Ipv4Addr>,
    internal_link: Option<String>,
    extra: RawMapping,
    configured: bool,
}

impl Interface {
    pub fn configure(
        &mut self,
        id: &str,
        position: u64,
        kind: InterfaceKind,
        address: Option<Ipv4Addr>,
        name: Option<&str>,
        internal_link: Option<&str>,
    ) -> Result<()> {
        self.guard_unconfigured()?;

        self.id = id.into();
        self.position = position;
        self.kind = kind;
        self.address = address;
        self.name = name.unwrap_or(id).into();
        self.internal_link = internal_link.map(Into::into);
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn position(&self) -> u64 {
        self.position
    }

    pub const fn kind(&self) -> InterfaceKind {
        self.kind
    }

    pub const fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }

    pub fn internal_link(&self) -> Option<&str> {
        self.internal_link.as_deref()
    }

    pub(crate) fn assign_address(&mut self, address: Ipv4Addr) {
        self.address = Some(address);
    }

    pub(crate) fn unassign_address(&mut self) {
        self.address = None;
    }
}

impl Entity for Interface {
    const KIND: &'static str = "unit interface";

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
                Some("int-virtual-link-desc") => {
                    self.internal_link = Some(expect_str("int-virtual-link-desc", value)?);
                }
                Some("virtual-network-interface-requirement") => {
                    let seq = expect_seq("virtual-network-interface-requirement", value)?;
                    let requirement = seq.first().ok_or_else(|| {
                        Error::Validation(
                            "the virtual network interface requirement must not be empty".into(),
                        )
                    })?;
                    let requirement =
                        expect_item_map("virtual-network-interface-requirement", requirement)?;
                    for (key, value) in requirement {
                        match key.as_str() {
                            Some("name") => self.name = expect_str("name", value)?,
                            Some("position") => self.position = expect_u64("position", value)?,
                            Some("ip-address") => {
                                let address = expect_str("ip-address", value)?;
                                self.address = Some(address.parse().map_err(|_| {
                                    Error::Validation(format!(
                                        "the ip address {address:?} is not a valid IPv4 address"
                                    ))
                                })?);
                            }
                            Some("virtual-interface") => {
                                let map = expect_item_map("virtual-interface", value)?;
                                for (key, value) in map {
                                    if key.as_str() == Some("type") {
                                        self.kind = InterfaceKind::parse(&expect_str("type", value)?)?;
                                    }
                                }
                            }
                            _ => continue,
                        }
                    }
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation(
                "the unit interface id must not be empty".into(),
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
        if let Some(internal_link) = &self.internal_link {
            put(&mut map, "int-virtual-link-desc", internal_link.as_str());
        }

        let mut requirement = RawMapping::new();
        put(&mut requirement, "name", self.name.as_str());
        put(&mut requirement, "position", self.position);
        let mut virtual_interface = RawMapping::new();
        put(&mut virtual_interface, "type", self.kind.to_string());
        put(&mut requirement, "virtual-interface", virtual_interface);
        if let Some(address) = self.address {
            put(&mut requirement, "ip-address", address.to_string());
        }

        put(
            &mut map,
            "virtual-network-interface-requirement",
            Value::Sequence(vec![Value::Mapping(requirement)]),
        );
        put_extras(&mut map, &self.extra);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_address_and_link() {
        let mut interface = Interface::default();
        interface
            .configure(
                "web_int_0",
                0,
                InterfaceKind::SrIov,
                Some("10.0.0.5".parse().unwrap()),
                None,
                Some("backbone"),
            )
            .unwrap();

        let exported = interface.to_mapping();
        let mut reloaded = Interface::default();
        reloaded.load(&exported).unwrap();

        assert_eq!(reloaded.to_mapping(), exported);
        assert_eq!(reloaded.internal_link(), Some("backbone"));
        assert_eq!(reloaded.kind(), InterfaceKind::SrIov);
        assert_eq!(reloaded.position(), 0);
    }

    #[test]
    fn load_twice_fails() {
        let mut interface = Interface::default();
        interface
            .configure("web_int_0", 0, InterfaceKind::Paravirt, None, None, None)
            .unwrap();

        let raw = interface.to_mapping();
        assert!(matches!(
            interface.load(&raw),
            Err(Error::AlreadyConfigured { .. }),
        ));
    }

    #[test]
    fn interface_type_names_match_the_schema() {
        assert_eq!(InterfaceKind::Paravirt.to_string(), "PARAVIRT");
        assert_eq!(InterfaceKind::PciPassthrough.to_string(), "PCI-PASSTHROUGH");
        assert_eq!(InterfaceKind::SrIov.to_string(), "SR-IOV");
        assert!(InterfaceKind::parse("VIRTIO").is_err());
    }
}
