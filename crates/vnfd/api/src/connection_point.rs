use crate::{
    entity::{expect_map, expect_str, put, put_extras, Entity, RawMapping},
    error::{Error, Result},
};

/// Endpoint exposed outside the function's boundary, optionally bound to
/// exactly one (unit, unit interface) pair.
#[derive(Clone, Debug, Default)]
pub struct ExternalConnectionPoint {
    id: String,
    unit: Option<String>,
    interface: Option<String>,
    extra: RawMapping,
    configured: bool,
}

impl ExternalConnectionPoint {
    pub fn configure(&mut self, id: &str, unit: Option<&str>, interface: Option<&str>) -> Result<()> {
        self.guard_unconfigured()?;
        if unit.is_some() != interface.is_some() {
            return Err(Error::Validation(
                "the unit id and the unit interface id must be given together".into(),
            ));
        }

        self.id = id.into();
        self.unit = unit.map(Into::into);
        self.interface = interface.map(Into::into);
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub const fn is_bound(&self) -> bool {
        self.unit.is_some()
    }

    /// Claim a unit interface. Each external connection point owns at most
    /// one interface, exclusively.
    pub(crate) fn bind(&mut self, unit: &str, interface: &str) -> Result<()> {
        if let (Some(bound_unit), Some(bound_interface)) = (&self.unit, &self.interface) {
            return Err(Error::AlreadyBound {
                unit: bound_unit.clone(),
                interface: bound_interface.clone(),
                cp: self.id.clone(),
            });
        }

        self.unit = Some(unit.into());
        self.interface = Some(interface.into());
        Ok(())
    }

    pub(crate) fn unbind(&mut self) {
        self.unit = None;
        self.interface = None;
    }
}

impl Entity for ExternalConnectionPoint {
    const KIND: &'static str = "external connection point";

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
                Some("int-cpd") => {
                    let map = expect_map("int-cpd", value)?;
                    for (key, value) in map {
                        match key.as_str() {
                            Some("cpd") => self.interface = Some(expect_str("cpd", value)?),
                            Some("vdu-id") => self.unit = Some(expect_str("vdu-id", value)?),
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
                "the external connection point id must not be empty".into(),
            ));
        }
        if self.unit.is_some() != self.interface.is_some() {
            return Err(Error::Validation(format!(
                "the external connection point {:?} names only one side of its (unit, interface) binding",
                self.id,
            )));
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "id", self.id.as_str());
        if let (Some(unit), Some(interface)) = (&self.unit, &self.interface) {
            let mut binding = RawMapping::new();
            put(&mut binding, "cpd", interface.as_str());
            put(&mut binding, "vdu-id", unit.as_str());
            put(&mut map, "int-cpd", binding);
        }
        put_extras(&mut map, &self.extra);
        map
    }
}

/// Attachment point inside the function's boundary; its subnet, when
/// declared, lives in the deployment flavor's matching virtual link
/// profile (1:1 by id).
#[derive(Clone, Debug, Default)]
pub struct InternalConnectionPoint {
    id: String,
    extra: RawMapping,
    configured: bool,
}

impl InternalConnectionPoint {
    pub fn configure(&mut self, id: &str) -> Result<()> {
        self.guard_unconfigured()?;

        self.id = id.into();
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for InternalConnectionPoint {
    const KIND: &'static str = "internal connection point";

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
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation(
                "the internal connection point id must not be empty".into(),
            ));
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "id", self.id.as_str());
        put_extras(&mut map, &self.extra);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_bound_pair_is_rejected() {
        let mut cp = ExternalConnectionPoint::default();
        assert!(matches!(
            cp.configure("ext_0", Some("web"), None),
            Err(Error::Validation(_)),
        ));
        assert!(!cp.configured());
    }

    #[test]
    fn bind_is_exclusive() {
        let mut cp = ExternalConnectionPoint::default();
        cp.configure("ext_0", None, None).unwrap();
        cp.bind("web", "web_int_0").unwrap();

        assert!(matches!(
            cp.bind("db", "db_int_0"),
            Err(Error::AlreadyBound { .. }),
        ));
        assert_eq!(cp.unit(), Some("web"));
    }

    #[test]
    fn bound_round_trip() {
        let mut cp = ExternalConnectionPoint::default();
        cp.configure("ext_0", Some("web"), Some("web_int_0")).unwrap();

        let exported = cp.to_mapping();
        let mut reloaded = ExternalConnectionPoint::default();
        reloaded.load(&exported).unwrap();
        assert_eq!(reloaded.to_mapping(), exported);
        assert_eq!(reloaded.interface(), Some("web_int_0"));
    }

    #[test]
    fn standalone_round_trip_omits_binding() {
        let mut cp = ExternalConnectionPoint::default();
        cp.configure("mgmt", None, None).unwrap();

        let exported = cp.to_mapping();
        assert_eq!(exported.len(), 1);

        let mut reloaded = ExternalConnectionPoint::default();
        reloaded.load(&exported).unwrap();
        assert_eq!(reloaded.to_mapping(), exported);
    }
}
