use crate::{
    entity::{expect_f64, expect_map, expect_str, expect_u64, put, put_extras, Entity, RawMapping},
    error::{Error, Result},
};

/// Virtual compute profile of one unit: vCPU count and memory size (GiB).
#[derive(Clone, Debug, Default)]
pub struct ComputeProfile {
    id: String,
    num_virtual_cpu: u64,
    memory_size_gib: f64,
    extra: RawMapping,
    configured: bool,
}

impl ComputeProfile {
    pub fn configure(&mut self, id: &str, num_virtual_cpu: u64, memory_size_gib: f64) -> Result<()> {
        self.guard_unconfigured()?;

        self.id = id.into();
        self.num_virtual_cpu = num_virtual_cpu;
        self.memory_size_gib = memory_size_gib;
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn num_virtual_cpu(&self) -> u64 {
        self.num_virtual_cpu
    }

    pub const fn memory_size_gib(&self) -> f64 {
        self.memory_size_gib
    }
}

impl Entity for ComputeProfile {
    const KIND: &'static str = "compute profile";

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
                Some("virtual-cpu") => {
                    let map = expect_map("virtual-cpu", value)?;
                    for (key, value) in map {
                        if key.as_str() == Some("num-virtual-cpu") {
                            self.num_virtual_cpu = expect_u64("num-virtual-cpu", value)?;
                        }
                    }
                }
                Some("virtual-memory") => {
                    let map = expect_map("virtual-memory", value)?;
                    for (key, value) in map {
                        if key.as_str() == Some("size") {
                            self.memory_size_gib = expect_f64("size", value)?;
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
                "the compute profile id must not be empty".into(),
            ));
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "id", self.id.as_str());

        let mut cpu = RawMapping::new();
        put(&mut cpu, "num-virtual-cpu", self.num_virtual_cpu);
        put(&mut map, "virtual-cpu", cpu);

        let mut memory = RawMapping::new();
        put(&mut memory, "size", self.memory_size_gib);
        put(&mut map, "virtual-memory", memory);

        put_extras(&mut map, &self.extra);
        map
    }
}

/// Virtual storage profile of one unit: disk size (GiB).
#[derive(Clone, Debug, Default)]
pub struct StorageProfile {
    id: String,
    size_gib: f64,
    extra: RawMapping,
    configured: bool,
}

impl StorageProfile {
    pub fn configure(&mut self, id: &str, size_gib: f64) -> Result<()> {
        self.guard_unconfigured()?;

        self.id = id.into();
        self.size_gib = size_gib;
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn size_gib(&self) -> f64 {
        self.size_gib
    }
}

impl Entity for StorageProfile {
    const KIND: &'static str = "storage profile";

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
                Some("size-of-storage") => self.size_gib = expect_f64("size-of-storage", value)?,
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation(
                "the storage profile id must not be empty".into(),
            ));
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "id", self.id.as_str());
        put(&mut map, "size-of-storage", self.size_gib);
        put_extras(&mut map, &self.extra);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_profile_round_trip() {
        let mut profile = ComputeProfile::default();
        profile.configure("web-compute", 4, 8.0).unwrap();

        let exported = profile.to_mapping();
        let mut reloaded = ComputeProfile::default();
        reloaded.load(&exported).unwrap();

        assert_eq!(reloaded.to_mapping(), exported);
        assert_eq!(reloaded.num_virtual_cpu(), 4);
        assert_eq!(reloaded.memory_size_gib(), 8.0);
    }

    #[test]
    fn configure_twice_fails() {
        let mut profile = StorageProfile::default();
        profile.configure("web-storage", 64.0).unwrap();

        assert!(matches!(
            profile.configure("web-storage", 32.0),
            Err(Error::AlreadyConfigured { .. }),
        ));
        assert!(matches!(
            profile.load(&RawMapping::new()),
            Err(Error::AlreadyConfigured { .. }),
        ));
        assert_eq!(profile.size_gib(), 64.0);
    }

    #[test]
    fn unknown_keys_survive_round_trip() {
        let mut raw = RawMapping::new();
        put(&mut raw, "id", "web-storage");
        put(&mut raw, "size-of-storage", 64.0);
        put(&mut raw, "vendor-hint", "ssd");

        let mut profile = StorageProfile::default();
        profile.load(&raw).unwrap();
        assert_eq!(profile.to_mapping(), raw);
    }
}
