use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::{
    entity::{expect_bool, expect_map, expect_str, put, put_extras, Entity, RawMapping},
    error::{Error, Result},
};

const DEFAULT_DESCRIPTION: &str = "Internal Virtual Links";
const DEFAULT_IP_VERSION: &str = "ipv4";

/// Subnet definition backing one internal connection point (1:1 by id).
#[derive(Clone, Debug)]
pub struct VirtualLinkProfile {
    id: String,
    name: String,
    description: String,
    subnet: Ipv4Net,
    gateway: Ipv4Addr,
    dhcp_enabled: bool,
    ip_version: String,
    extra: RawMapping,
    configured: bool,
}

impl Default for VirtualLinkProfile {
    fn default() -> Self {
        Self {
            id: String::default(),
            name: String::default(),
            description: String::default(),
            subnet: Ipv4Net::default(),
            gateway: Ipv4Addr::UNSPECIFIED,
            dhcp_enabled: false,
            ip_version: DEFAULT_IP_VERSION.into(),
            extra: RawMapping::default(),
            configured: false,
        }
    }
}

impl VirtualLinkProfile {
    pub fn configure(
        &mut self,
        id: &str,
        subnet: Ipv4Net,
        gateway: Option<Ipv4Addr>,
        dhcp_enabled: bool,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        self.guard_unconfigured()?;

        let gateway = match gateway {
            Some(gateway) => {
                if !subnet.contains(&gateway) {
                    return Err(Error::Validation(format!(
                        "the gateway address {gateway} is not within {subnet}"
                    )));
                }
                gateway
            }
            None => subnet.hosts().next().ok_or_else(|| {
                Error::Validation(format!("the subnet {subnet} has no usable host address"))
            })?,
        };

        self.id = id.into();
        self.subnet = subnet;
        self.gateway = gateway;
        self.dhcp_enabled = dhcp_enabled;
        self.name = name.unwrap_or(id).into();
        self.description = description.unwrap_or(DEFAULT_DESCRIPTION).into();
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub const fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    pub const fn gateway(&self) -> Ipv4Addr {
        self.gateway
    }

    pub const fn dhcp_enabled(&self) -> bool {
        self.dhcp_enabled
    }

    pub fn ip_version(&self) -> &str {
        &self.ip_version
    }
}

impl Entity for VirtualLinkProfile {
    const KIND: &'static str = "virtual link profile";

    fn key(&self) -> &str {
        &self.id
    }

    fn configured(&self) -> bool {
        self.configured
    }

    fn load(&mut self, raw: &RawMapping) -> Result<()> {
        self.guard_unconfigured()?;

        let mut subnet = None;
        for (key, value) in raw {
            match key.as_str() {
                Some("flavour") => {
                    let flavour = expect_map("flavour", value)?;
                    for (key, value) in flavour {
                        match key.as_str() {
                            Some("id") => self.id = expect_str("id", value)?,
                            Some("virtual-link-protocol-data") => {
                                let protocol = expect_map("virtual-link-protocol-data", value)?;
                                for (key, value) in protocol {
                                    if key.as_str() != Some("l3-protocol-data") {
                                        continue;
                                    }
                                    let l3 = expect_map("l3-protocol-data", value)?;
                                    for (key, value) in l3 {
                                        match key.as_str() {
                                            Some("cidr") => {
                                                let cidr = expect_str("cidr", value)?;
                                                subnet =
                                                    Some(cidr.parse().map_err(|_| {
                                                        Error::Validation(format!(
                                                            "the cidr {cidr:?} is not a valid IPv4 network"
                                                        ))
                                                    })?);
                                            }
                                            Some("dhcp-enabled") => {
                                                self.dhcp_enabled =
                                                    expect_bool("dhcp-enabled", value)?;
                                            }
                                            Some("gateway-ip") => {
                                                let gateway = expect_str("gateway-ip", value)?;
                                                self.gateway =
                                                    gateway.parse().map_err(|_| {
                                                        Error::Validation(format!(
                                                            "the gateway address {gateway:?} is not a valid IPv4 address"
                                                        ))
                                                    })?;
                                            }
                                            Some("ip-version") => {
                                                self.ip_version = expect_str("ip-version", value)?;
                                            }
                                            Some("name") => {
                                                self.name = expect_str("name", value)?;
                                            }
                                            Some("description") => {
                                                self.description =
                                                    expect_str("description", value)?;
                                            }
                                            _ => continue,
                                        }
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
                "the virtual link profile id must not be empty".into(),
            ));
        }
        self.subnet = subnet.ok_or_else(|| {
            Error::Validation(format!(
                "the virtual link profile {:?} declares no cidr",
                self.id,
            ))
        })?;
        if self.name.is_empty() {
            self.name = self.id.clone();
        }
        if self.description.is_empty() {
            self.description = DEFAULT_DESCRIPTION.into();
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut l3 = RawMapping::new();
        put(&mut l3, "cidr", self.subnet.to_string());
        put(&mut l3, "dhcp-enabled", self.dhcp_enabled);
        put(&mut l3, "gateway-ip", self.gateway.to_string());
        put(&mut l3, "ip-version", self.ip_version.as_str());
        put(&mut l3, "name", self.name.as_str());
        put(&mut l3, "description", self.description.as_str());

        let mut protocol = RawMapping::new();
        put(&mut protocol, "l3-protocol-data", l3);

        let mut flavour = RawMapping::new();
        put(&mut flavour, "id", self.id.as_str());
        put(&mut flavour, "virtual-link-protocol-data", protocol);

        let mut map = RawMapping::new();
        put(&mut map, "flavour", flavour);
        put_extras(&mut map, &self.extra);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_defaults_to_first_usable_host() {
        let mut profile = VirtualLinkProfile::default();
        profile
            .configure("backbone", "10.0.0.0/24".parse().unwrap(), None, true, None, None)
            .unwrap();

        assert_eq!(profile.gateway(), "10.0.0.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(profile.description(), "Internal Virtual Links");
        assert_eq!(profile.ip_version(), "ipv4");
    }

    #[test]
    fn gateway_outside_subnet_is_rejected() {
        let mut profile = VirtualLinkProfile::default();
        assert!(matches!(
            profile.configure(
                "backbone",
                "10.0.0.0/24".parse().unwrap(),
                Some("10.1.0.1".parse().unwrap()),
                true,
                None,
                None,
            ),
            Err(Error::Validation(_)),
        ));
    }

    #[test]
    fn round_trip() {
        let mut profile = VirtualLinkProfile::default();
        profile
            .configure(
                "backbone",
                "192.168.0.0/16".parse().unwrap(),
                Some("192.168.0.254".parse().unwrap()),
                false,
                Some("backbone-net"),
                None,
            )
            .unwrap();

        let exported = profile.to_mapping();
        let mut reloaded = VirtualLinkProfile::default();
        reloaded.load(&exported).unwrap();
        assert_eq!(reloaded.to_mapping(), exported);
        assert_eq!(reloaded.subnet(), "192.168.0.0/16".parse().unwrap());
    }
}
