use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde_yaml::Value;

use crate::{
    compute::{ComputeProfile, StorageProfile},
    connection_point::{ExternalConnectionPoint, InternalConnectionPoint},
    entity::{
        expect_item_map, expect_scalar_string, expect_seq, expect_str, put, put_extras, Entity,
        RawMapping,
    },
    error::{Error, Result},
    flavor::{Df, UnitProfile},
    image::ImageDescriptor,
    interface::{Interface, InterfaceKind},
    link::VirtualLinkProfile,
    scaling::{Deltas, ScalingAspect, ScalingCriteria, ScalingPolicy, UnitDelta},
    telemetry::{MonitoringParameter, TelemetryKind},
    unit::Unit,
};

const DOCUMENT_ROOT: &str = "vnfd";
const DEFAULT_VERSION: &str = "1.0";
const DEFAULT_MGMT_CP: &str = "mgmt";
const DEFAULT_DF: &str = "default-df";

/// Typed arguments of [`Descriptor::add_unit`].
#[derive(Clone, Debug, Default)]
pub struct UnitSpec {
    pub id: String,
    pub num_virtual_cpu: u64,
    pub memory_size_gib: f64,
    pub storage_sizes_gib: Vec<f64>,
    pub images: Vec<String>,
    pub ext_cp_ids: Vec<String>,
    pub int_cp_ids: Vec<String>,
    pub name: Option<String>,
    pub max_instances: Option<u64>,
    pub boot_script: Option<String>,
}

/// Typed arguments of [`Descriptor::add_scaling_aspect`].
#[derive(Clone, Debug)]
pub struct ScalingAspectSpec {
    pub id: String,
    pub max_scale_level: u64,
    pub unit: String,
    pub telemetry: String,
    pub scale_in_threshold: i64,
    pub scale_out_threshold: i64,
    pub cooldown_time: u64,
    pub threshold_time: u64,
    pub scale_delta: u64,
}

/// The whole network function descriptor. Owns every sub-entity and is the
/// only place cross-entity references are created or checked; every
/// mutator validates fully before its first write.
#[derive(Clone, Debug, Default)]
pub struct Descriptor {
    id: String,
    product_name: String,
    version: String,
    description: Option<String>,
    mgmt_cp: String,
    df: Df,
    ext_cps: Vec<ExternalConnectionPoint>,
    int_cps: Vec<InternalConnectionPoint>,
    units: Vec<Unit>,
    images: Vec<ImageDescriptor>,
    compute_profiles: Vec<ComputeProfile>,
    storage_profiles: Vec<StorageProfile>,
    extra: RawMapping,
    configured: bool,
}

impl Descriptor {
    /// Seed a new descriptor with its management external connection point
    /// and the sole deployment flavor.
    pub fn create(
        id: &str,
        product_name: Option<&str>,
        version: Option<&str>,
        mgmt_id: Option<&str>,
    ) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::Validation(
                "the descriptor id must not be empty".into(),
            ));
        }

        let mgmt_cp = mgmt_id.unwrap_or(DEFAULT_MGMT_CP);
        let mut mgmt = ExternalConnectionPoint::default();
        mgmt.configure(mgmt_cp, None, None)?;

        let mut df = Df::default();
        df.configure(DEFAULT_DF)?;

        Ok(Self {
            id: id.into(),
            product_name: product_name.unwrap_or(id).into(),
            version: version.unwrap_or(DEFAULT_VERSION).into(),
            description: None,
            mgmt_cp: mgmt_cp.into(),
            df,
            ext_cps: vec![mgmt],
            int_cps: Vec::default(),
            units: Vec::default(),
            images: Vec::default(),
            compute_profiles: Vec::default(),
            storage_profiles: Vec::default(),
            extra: RawMapping::default(),
            configured: true,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<&str>) {
        self.description = description.map(Into::into);
    }

    pub fn mgmt_cp(&self) -> &str {
        &self.mgmt_cp
    }

    pub const fn df(&self) -> &Df {
        &self.df
    }

    pub fn external_connection_points(&self) -> &[ExternalConnectionPoint] {
        &self.ext_cps
    }

    pub fn external_connection_point(&self, id: &str) -> Option<&ExternalConnectionPoint> {
        self.ext_cps.iter().find(|cp| cp.id() == id)
    }

    pub fn internal_connection_points(&self) -> &[InternalConnectionPoint] {
        &self.int_cps
    }

    pub fn internal_connection_point(&self, id: &str) -> Option<&InternalConnectionPoint> {
        self.int_cps.iter().find(|cp| cp.id() == id)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.id() == id)
    }

    fn unit_mut(&mut self, id: &str) -> Result<&mut Unit> {
        self.units
            .iter_mut()
            .find(|unit| unit.id() == id)
            .ok_or_else(|| Error::NotFound {
                kind: Unit::KIND,
                id: id.into(),
            })
    }

    pub fn images(&self) -> &[ImageDescriptor] {
        &self.images
    }

    pub fn image(&self, id: &str) -> Option<&ImageDescriptor> {
        self.images.iter().find(|image| image.id() == id)
    }

    pub fn compute_profiles(&self) -> &[ComputeProfile] {
        &self.compute_profiles
    }

    pub fn storage_profiles(&self) -> &[StorageProfile] {
        &self.storage_profiles
    }

    pub fn add_image(
        &mut self,
        id: &str,
        image: &str,
        name: Option<&str>,
        vim_type: Option<&str>,
    ) -> Result<()> {
        if self.image(id).is_some() {
            return Err(Error::AlreadyExists {
                kind: ImageDescriptor::KIND,
                id: id.into(),
            });
        }

        let mut descriptor = ImageDescriptor::default();
        descriptor.configure(id, image, name, vim_type)?;
        self.images.push(descriptor);
        Ok(())
    }

    /// Remove an image descriptor. An image still referenced by any unit
    /// cannot be removed.
    pub fn remove_image(&mut self, id: &str) -> Result<()> {
        let index = self
            .images
            .iter()
            .position(|image| image.id() == id)
            .ok_or_else(|| Error::NotFound {
                kind: ImageDescriptor::KIND,
                id: id.into(),
            })?;
        if let Some(unit) = self
            .units
            .iter()
            .find(|unit| unit.images().iter().any(|image| image == id))
        {
            return Err(Error::Validation(format!(
                "the image {id:?} is still referenced by the unit {:?}",
                unit.id(),
            )));
        }

        self.images.remove(index);
        Ok(())
    }

    pub fn add_external_connection_point(
        &mut self,
        id: Option<&str>,
        unit: Option<&str>,
        unit_interface: Option<&str>,
    ) -> Result<&ExternalConnectionPoint> {
        if unit.is_some() != unit_interface.is_some() {
            return Err(Error::Validation(
                "the unit id and the unit interface id must be given together".into(),
            ));
        }

        let id = match id {
            Some(id) => id.to_string(),
            None => format!("ext_{}", self.ext_cps.len()),
        };
        if self.external_connection_point(&id).is_some() {
            return Err(Error::AlreadyExists {
                kind: ExternalConnectionPoint::KIND,
                id,
            });
        }
        if let (Some(unit), Some(interface)) = (unit, unit_interface) {
            let owner = self.unit(unit).ok_or_else(|| Error::NotFound {
                kind: Unit::KIND,
                id: unit.into(),
            })?;
            if owner.interface(interface).is_none() {
                return Err(Error::NotFound {
                    kind: Interface::KIND,
                    id: interface.into(),
                });
            }
            if let Some(claimed) = self
                .ext_cps
                .iter()
                .find(|cp| cp.unit() == Some(unit) && cp.interface() == Some(interface))
            {
                return Err(Error::AlreadyBound {
                    unit: unit.into(),
                    interface: interface.into(),
                    cp: claimed.id().into(),
                });
            }
        }

        let mut cp = ExternalConnectionPoint::default();
        cp.configure(&id, unit, unit_interface)?;
        self.ext_cps.push(cp);
        Ok(self.ext_cps.last().expect("the connection point was just appended"))
    }

    /// Remove an external connection point and, when bound, the unit
    /// interface it claims. Scaling aspects left with dangling references
    /// are swept.
    pub fn remove_external_connection_point(&mut self, id: &str) -> Result<()> {
        if id == self.mgmt_cp {
            return Err(Error::Validation(format!(
                "the management connection point {id:?} cannot be removed"
            )));
        }
        let index = self
            .ext_cps
            .iter()
            .position(|cp| cp.id() == id)
            .ok_or_else(|| Error::NotFound {
                kind: ExternalConnectionPoint::KIND,
                id: id.into(),
            })?;

        let cp = self.ext_cps.remove(index);
        if let (Some(unit), Some(interface)) = (cp.unit(), cp.interface()) {
            if let Ok(unit) = self.unit_mut(unit) {
                let _ = unit.remove_interface(interface);
            }
        }
        self.sweep();
        Ok(())
    }

    /// Declare an internal attachment point. With a network, a matching
    /// virtual link profile (same id) is appended to the deployment
    /// flavor.
    pub fn add_internal_connection_point(
        &mut self,
        id: Option<&str>,
        gateway_ip: Option<Ipv4Addr>,
        network: Option<Ipv4Net>,
        dhcp_enabled: bool,
    ) -> Result<&InternalConnectionPoint> {
        if gateway_ip.is_some() != network.is_some() {
            return Err(Error::Validation(
                "the gateway address and the network must be given together".into(),
            ));
        }

        let id = match id {
            Some(id) => id.to_string(),
            None => format!("int_{}", self.int_cps.len()),
        };
        if self.internal_connection_point(&id).is_some() {
            return Err(Error::AlreadyExists {
                kind: InternalConnectionPoint::KIND,
                id,
            });
        }

        if let Some(network) = network {
            let mut profile = VirtualLinkProfile::default();
            profile.configure(&id, network, gateway_ip, dhcp_enabled, None, None)?;
            self.df.add_virtual_link_profile(profile)?;
        }

        let mut cp = InternalConnectionPoint::default();
        cp.configure(&id)?;
        self.int_cps.push(cp);
        Ok(self.int_cps.last().expect("the connection point was just appended"))
    }

    /// Remove an internal connection point. Cascades into the deployment
    /// flavor's matching virtual link profile, every unit interface on the
    /// link, and any scaling aspect left dangling.
    pub fn remove_internal_connection_point(&mut self, id: &str) -> Result<()> {
        let index = self
            .int_cps
            .iter()
            .position(|cp| cp.id() == id)
            .ok_or_else(|| Error::NotFound {
                kind: InternalConnectionPoint::KIND,
                id: id.into(),
            })?;

        self.int_cps.remove(index);
        self.df.remove_virtual_link_profile(id);
        for unit in &mut self.units {
            unit.remove_interfaces_on_link(id);
        }
        self.sweep();
        Ok(())
    }

    /// Add a compute unit with its derived compute/storage profiles, one
    /// interface per requested connection point, and its unit profile.
    /// Every referenced connection point is checked before the first
    /// write.
    pub fn add_unit(&mut self, spec: UnitSpec) -> Result<()> {
        if spec.ext_cp_ids.is_empty() && spec.int_cp_ids.is_empty() {
            return Err(Error::Validation(format!(
                "the unit {:?} attaches to no connection point",
                spec.id,
            )));
        }
        if spec.images.is_empty() {
            return Err(Error::Validation(format!(
                "the unit {:?} declares no image",
                spec.id,
            )));
        }
        if self.unit(&spec.id).is_some() {
            return Err(Error::AlreadyExists {
                kind: Unit::KIND,
                id: spec.id,
            });
        }
        for (index, id) in spec.ext_cp_ids.iter().enumerate() {
            if spec.ext_cp_ids[..index].contains(id) {
                return Err(Error::Validation(format!(
                    "the unit {:?} attaches to the connection point {id:?} twice",
                    spec.id,
                )));
            }
            let cp = self
                .external_connection_point(id)
                .ok_or_else(|| Error::NotFound {
                    kind: ExternalConnectionPoint::KIND,
                    id: id.into(),
                })?;
            if let (Some(unit), Some(interface)) = (cp.unit(), cp.interface()) {
                return Err(Error::AlreadyBound {
                    unit: unit.into(),
                    interface: interface.into(),
                    cp: id.into(),
                });
            }
        }
        for (index, id) in spec.int_cp_ids.iter().enumerate() {
            if spec.int_cp_ids[..index].contains(id) {
                return Err(Error::Validation(format!(
                    "the unit {:?} attaches to the connection point {id:?} twice",
                    spec.id,
                )));
            }
            if self.internal_connection_point(id).is_none() {
                return Err(Error::NotFound {
                    kind: InternalConnectionPoint::KIND,
                    id: id.into(),
                });
            }
        }

        let compute_id = format!("{}-compute", spec.id);
        let mut compute = ComputeProfile::default();
        compute.configure(&compute_id, spec.num_virtual_cpu, spec.memory_size_gib)?;

        let mut storages = Vec::with_capacity(spec.storage_sizes_gib.len());
        for (index, size_gib) in spec.storage_sizes_gib.iter().enumerate() {
            let id = match index {
                0 => format!("{}-storage", spec.id),
                _ => format!("{}-storage-{index}", spec.id),
            };
            let mut storage = StorageProfile::default();
            storage.configure(&id, *size_gib)?;
            storages.push(storage);
        }

        let mut unit = Unit::default();
        unit.configure(
            &spec.id,
            spec.images,
            &compute_id,
            storages.iter().map(|storage| storage.id().into()).collect(),
            spec.name.as_deref(),
            spec.boot_script.as_deref(),
        )?;

        let mut bindings = Vec::with_capacity(spec.ext_cp_ids.len());
        for id in &spec.ext_cp_ids {
            let interface =
                unit.add_interface(None, None, InterfaceKind::default(), None, None)?;
            bindings.push((id.clone(), interface.id().to_string()));
        }
        for id in &spec.int_cp_ids {
            unit.add_interface(None, Some(id.as_str()), InterfaceKind::default(), None, None)?;
        }

        let mut profile = UnitProfile::default();
        profile.configure(&spec.id, 1, spec.max_instances)?;

        self.compute_profiles.push(compute);
        self.storage_profiles.extend(storages);
        for (cp, interface) in bindings {
            if let Some(cp) = self.ext_cps.iter_mut().find(|candidate| candidate.id() == cp) {
                cp.bind(unit.id(), &interface)?;
            }
        }
        self.df.add_unit_profile(profile)?;
        self.units.push(unit);
        Ok(())
    }

    /// Remove a unit. Cascades into its unit profile, the bindings of the
    /// external connection points pointing at it, its compute and storage
    /// profiles, and any scaling aspect left dangling.
    pub fn remove_unit(&mut self, id: &str) -> Result<()> {
        let index = self
            .units
            .iter()
            .position(|unit| unit.id() == id)
            .ok_or_else(|| Error::NotFound {
                kind: Unit::KIND,
                id: id.into(),
            })?;

        let unit = self.units.remove(index);
        self.df.remove_unit_profile(id);
        self.compute_profiles
            .retain(|profile| profile.id() != unit.compute_profile());
        self.storage_profiles
            .retain(|profile| !unit.storage_profiles().iter().any(|id| id == profile.id()));
        for cp in &mut self.ext_cps {
            if cp.unit() == Some(id) {
                cp.unbind();
            }
        }
        self.sweep();
        Ok(())
    }

    /// Assign a static address to a unit interface. On an internal link
    /// with a declared subnet, the address must lie within it.
    pub fn assign_interface_address(
        &mut self,
        unit: &str,
        interface: &str,
        address: Ipv4Addr,
    ) -> Result<()> {
        let owner = self.unit(unit).ok_or_else(|| Error::NotFound {
            kind: Unit::KIND,
            id: unit.into(),
        })?;
        let target = owner.interface(interface).ok_or_else(|| Error::NotFound {
            kind: Interface::KIND,
            id: interface.into(),
        })?;
        if let Some(link) = target.internal_link() {
            if let Some(profile) = self.df.virtual_link_profile(link) {
                let subnet = profile.subnet();
                if !subnet.contains(&address) {
                    return Err(Error::Validation(format!(
                        "the address {address} is not within the subnet {subnet}"
                    )));
                }
            }
        }

        if let Some(target) = self.unit_mut(unit)?.interface_mut(interface) {
            target.assign_address(address);
        }
        Ok(())
    }

    pub fn unassign_interface_address(&mut self, unit: &str, interface: &str) -> Result<()> {
        self.unit_mut(unit)?
            .interface_mut(interface)
            .ok_or_else(|| Error::NotFound {
                kind: Interface::KIND,
                id: interface.into(),
            })?
            .unassign_address();
        Ok(())
    }

    /// Bind telemetry metrics on a unit, all before any: a duplicate in
    /// the batch fails the whole call with nothing added.
    pub fn add_unit_telemetry(&mut self, unit: &str, metrics: &[TelemetryKind]) -> Result<()> {
        let owner = self.unit(unit).ok_or_else(|| Error::NotFound {
            kind: Unit::KIND,
            id: unit.into(),
        })?;
        for (index, metric) in metrics.iter().enumerate() {
            if owner.has_telemetry(*metric) || metrics[..index].contains(metric) {
                return Err(Error::AlreadyExists {
                    kind: MonitoringParameter::KIND,
                    id: format!("{unit}_{metric}"),
                });
            }
        }

        let owner = self.unit_mut(unit)?;
        for metric in metrics {
            owner.add_telemetry(*metric)?;
        }
        Ok(())
    }

    /// Unbind telemetry metrics, all before any. Scaling aspects left with
    /// dangling criteria references are swept.
    pub fn remove_unit_telemetry(&mut self, unit: &str, metrics: &[TelemetryKind]) -> Result<()> {
        let owner = self.unit(unit).ok_or_else(|| Error::NotFound {
            kind: Unit::KIND,
            id: unit.into(),
        })?;
        for metric in metrics {
            if !owner.has_telemetry(*metric) {
                return Err(Error::NotFound {
                    kind: MonitoringParameter::KIND,
                    id: format!("{unit}_{metric}"),
                });
            }
        }

        let owner = self.unit_mut(unit)?;
        for metric in metrics {
            owner.remove_telemetry(*metric)?;
        }
        self.sweep();
        Ok(())
    }

    /// Build a single-criteria autoscaling aspect and append it through
    /// the deployment flavor's reference-checked path.
    pub fn add_scaling_aspect(&mut self, spec: ScalingAspectSpec) -> Result<()> {
        if self.df.scaling_aspect(&spec.id).is_some() {
            return Err(Error::AlreadyExists {
                kind: ScalingAspect::KIND,
                id: spec.id,
            });
        }
        if !self
            .units
            .iter()
            .flat_map(|unit| unit.telemetry_ids())
            .any(|id| id == spec.telemetry)
        {
            return Err(Error::NotFound {
                kind: MonitoringParameter::KIND,
                id: spec.telemetry,
            });
        }

        let mut criteria = ScalingCriteria::default();
        criteria.configure(
            &spec.id,
            &spec.telemetry,
            Some(spec.scale_in_threshold),
            Some(spec.scale_out_threshold),
        )?;

        let mut policy = ScalingPolicy::default();
        policy.configure(&spec.id, spec.cooldown_time, spec.threshold_time, vec![criteria])?;

        let mut deltas = Deltas::default();
        deltas.configure(
            &spec.id,
            vec![UnitDelta {
                unit: spec.unit,
                instances: spec.scale_delta,
            }],
        )?;

        let mut aspect = ScalingAspect::default();
        aspect.configure(&spec.id, spec.max_scale_level, vec![deltas], vec![policy], None)?;
        self.df.add_scaling_aspects(vec![aspect])
    }

    pub fn remove_scaling_aspect(&mut self, id: &str) -> Result<()> {
        self.df.remove_scaling_aspect(id)
    }

    /// Drop every scaling aspect whose unit or telemetry references no
    /// longer resolve. Invoked by every structural removal.
    fn sweep(&mut self) {
        let telemetry_ids: Vec<String> = self
            .units
            .iter()
            .flat_map(|unit| unit.telemetry_ids())
            .collect();
        self.df.sweep_scaling_aspects(&telemetry_ids);
    }

    /// Check id uniqueness, exclusive interface claims, and every stored
    /// cross-reference. Run after loading a document; the mutators keep a
    /// created descriptor valid by construction.
    pub fn validate(&self) -> Result<()> {
        if self.external_connection_point(&self.mgmt_cp).is_none() {
            return Err(Error::NotFound {
                kind: ExternalConnectionPoint::KIND,
                id: self.mgmt_cp.clone(),
            });
        }
        for (index, unit) in self.units.iter().enumerate() {
            if self.units[..index].iter().any(|other| other.id() == unit.id()) {
                return Err(Error::AlreadyExists {
                    kind: Unit::KIND,
                    id: unit.id().into(),
                });
            }
        }
        for (index, cp) in self.ext_cps.iter().enumerate() {
            if self.ext_cps[..index].iter().any(|other| other.id() == cp.id()) {
                return Err(Error::AlreadyExists {
                    kind: ExternalConnectionPoint::KIND,
                    id: cp.id().into(),
                });
            }
        }
        for (index, cp) in self.int_cps.iter().enumerate() {
            if self.int_cps[..index].iter().any(|other| other.id() == cp.id()) {
                return Err(Error::AlreadyExists {
                    kind: InternalConnectionPoint::KIND,
                    id: cp.id().into(),
                });
            }
        }
        for unit in &self.units {
            if !self
                .compute_profiles
                .iter()
                .any(|profile| profile.id() == unit.compute_profile())
            {
                return Err(Error::NotFound {
                    kind: ComputeProfile::KIND,
                    id: unit.compute_profile().into(),
                });
            }
            for id in unit.storage_profiles() {
                if !self.storage_profiles.iter().any(|profile| profile.id() == id) {
                    return Err(Error::NotFound {
                        kind: StorageProfile::KIND,
                        id: id.clone(),
                    });
                }
            }
            for interface in unit.interfaces() {
                if let Some(link) = interface.internal_link() {
                    if self.internal_connection_point(link).is_none() {
                        return Err(Error::NotFound {
                            kind: InternalConnectionPoint::KIND,
                            id: link.into(),
                        });
                    }
                }
            }
            if self.df.unit_profile(unit.id()).is_none() {
                return Err(Error::NotFound {
                    kind: UnitProfile::KIND,
                    id: unit.id().into(),
                });
            }
        }
        for (index, cp) in self.ext_cps.iter().enumerate() {
            if let (Some(unit), Some(interface)) = (cp.unit(), cp.interface()) {
                if self.ext_cps[..index].iter().any(|other| {
                    other.unit() == Some(unit) && other.interface() == Some(interface)
                }) {
                    return Err(Error::AlreadyBound {
                        unit: unit.into(),
                        interface: interface.into(),
                        cp: cp.id().into(),
                    });
                }
                let owner = self.unit(unit).ok_or_else(|| Error::NotFound {
                    kind: Unit::KIND,
                    id: unit.into(),
                })?;
                if owner.interface(interface).is_none() {
                    return Err(Error::NotFound {
                        kind: Interface::KIND,
                        id: interface.into(),
                    });
                }
            }
        }
        for profile in self.df.virtual_link_profiles() {
            if self.internal_connection_point(profile.id()).is_none() {
                return Err(Error::NotFound {
                    kind: InternalConnectionPoint::KIND,
                    id: profile.id().into(),
                });
            }
        }
        let telemetry_ids: Vec<String> = self
            .units
            .iter()
            .flat_map(|unit| unit.telemetry_ids())
            .collect();
        for aspect in self.df.scaling_aspects() {
            for unit in aspect.unit_ids() {
                if self.df.unit_profile(unit).is_none() {
                    return Err(Error::NotFound {
                        kind: UnitProfile::KIND,
                        id: unit.into(),
                    });
                }
            }
            for param in aspect.telemetry_refs() {
                if !telemetry_ids.iter().any(|id| id == param) {
                    return Err(Error::NotFound {
                        kind: MonitoringParameter::KIND,
                        id: param.into(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Load a whole document, unwrapping the `vnfd` root key and checking
    /// every cross-reference.
    pub fn from_document(raw: &RawMapping) -> Result<Self> {
        let inner = raw
            .get(Value::from(DOCUMENT_ROOT))
            .and_then(Value::as_mapping)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "the document declares no {DOCUMENT_ROOT:?} root mapping"
                ))
            })?;

        let mut descriptor = Self::default();
        descriptor.load(inner)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Ordered export under the `vnfd` root key.
    pub fn to_document(&self) -> RawMapping {
        let mut document = RawMapping::new();
        put(&mut document, DOCUMENT_ROOT, self.to_mapping());
        document
    }

    /// Ordered export of the mapping under the root key.
    fn inner_mapping(&self) -> RawMapping {
        let mut inner = RawMapping::new();
        put(&mut inner, "id", self.id.as_str());
        put(&mut inner, "mgmt-cp", self.mgmt_cp.as_str());
        put(&mut inner, "product-name", self.product_name.as_str());
        put(&mut inner, "version", self.version.as_str());
        if let Some(description) = &self.description {
            put(&mut inner, "description", description.as_str());
        }
        put(
            &mut inner,
            "df",
            Value::Sequence(vec![Value::Mapping(self.df.to_mapping())]),
        );
        put(
            &mut inner,
            "ext-cpd",
            Value::Sequence(
                self.ext_cps
                    .iter()
                    .map(|cp| Value::Mapping(cp.to_mapping()))
                    .collect(),
            ),
        );
        if !self.int_cps.is_empty() {
            put(
                &mut inner,
                "int-virtual-link-desc",
                Value::Sequence(
                    self.int_cps
                        .iter()
                        .map(|cp| Value::Mapping(cp.to_mapping()))
                        .collect(),
                ),
            );
        }
        put(
            &mut inner,
            "sw-image-desc",
            Value::Sequence(
                self.images
                    .iter()
                    .map(|image| Value::Mapping(image.to_mapping()))
                    .collect(),
            ),
        );
        put(
            &mut inner,
            "vdu",
            Value::Sequence(
                self.units
                    .iter()
                    .map(|unit| Value::Mapping(unit.to_mapping()))
                    .collect(),
            ),
        );
        put(
            &mut inner,
            "virtual-compute-desc",
            Value::Sequence(
                self.compute_profiles
                    .iter()
                    .map(|profile| Value::Mapping(profile.to_mapping()))
                    .collect(),
            ),
        );
        put(
            &mut inner,
            "virtual-storage-desc",
            Value::Sequence(
                self.storage_profiles
                    .iter()
                    .map(|profile| Value::Mapping(profile.to_mapping()))
                    .collect(),
            ),
        );
        put_extras(&mut inner, &self.extra);
        inner
    }
}

impl Entity for Descriptor {
    const KIND: &'static str = "descriptor";

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
                Some("mgmt-cp") => self.mgmt_cp = expect_str("mgmt-cp", value)?,
                Some("product-name") => self.product_name = expect_str("product-name", value)?,
                Some("version") => self.version = expect_scalar_string("version", value)?,
                Some("description") => self.description = Some(expect_str("description", value)?),
                Some("df") => {
                    let flavors = expect_seq("df", value)?;
                    if flavors.len() != 1 {
                        return Err(Error::Validation(format!(
                            "the document declares {} deployment flavors, expected exactly one",
                            flavors.len(),
                        )));
                    }
                    let mut df = Df::default();
                    df.load(expect_item_map("df", &flavors[0])?)?;
                    self.df = df;
                }
                Some("ext-cpd") => {
                    for raw in expect_seq("ext-cpd", value)? {
                        let mut cp = ExternalConnectionPoint::default();
                        cp.load(expect_item_map("ext-cpd", raw)?)?;
                        self.ext_cps.push(cp);
                    }
                }
                Some("int-virtual-link-desc") => {
                    for raw in expect_seq("int-virtual-link-desc", value)? {
                        let mut cp = InternalConnectionPoint::default();
                        cp.load(expect_item_map("int-virtual-link-desc", raw)?)?;
                        self.int_cps.push(cp);
                    }
                }
                Some("sw-image-desc") => {
                    for raw in expect_seq("sw-image-desc", value)? {
                        let mut image = ImageDescriptor::default();
                        image.load(expect_item_map("sw-image-desc", raw)?)?;
                        self.images.push(image);
                    }
                }
                Some("vdu") => {
                    for raw in expect_seq("vdu", value)? {
                        let mut unit = Unit::default();
                        unit.load(expect_item_map("vdu", raw)?)?;
                        self.units.push(unit);
                    }
                }
                Some("virtual-compute-desc") => {
                    for raw in expect_seq("virtual-compute-desc", value)? {
                        let mut profile = ComputeProfile::default();
                        profile.load(expect_item_map("virtual-compute-desc", raw)?)?;
                        self.compute_profiles.push(profile);
                    }
                }
                Some("virtual-storage-desc") => {
                    for raw in expect_seq("virtual-storage-desc", value)? {
                        let mut profile = StorageProfile::default();
                        profile.load(expect_item_map("virtual-storage-desc", raw)?)?;
                        self.storage_profiles.push(profile);
                    }
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation(
                "the descriptor id must not be empty".into(),
            ));
        }
        if !self.df.configured() {
            return Err(Error::Validation(
                "the document declares no deployment flavor".into(),
            ));
        }
        if self.product_name.is_empty() {
            self.product_name = self.id.clone();
        }
        if self.version.is_empty() {
            self.version = DEFAULT_VERSION.into();
        }
        if self.mgmt_cp.is_empty() {
            self.mgmt_cp = DEFAULT_MGMT_CP.into();
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        self.inner_mapping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_descriptor() -> Descriptor {
        let mut descriptor = Descriptor::create("hackfest", None, Some("1.0"), None).unwrap();
        descriptor
            .add_image("ubuntu20.04", "./iso/ubuntu20.04", None, None)
            .unwrap();
        descriptor
            .add_internal_connection_point(
                Some("net1"),
                Some("10.0.0.1".parse().unwrap()),
                Some("10.0.0.0/24".parse().unwrap()),
                true,
            )
            .unwrap();
        descriptor
            .add_unit(UnitSpec {
                id: "u1".into(),
                num_virtual_cpu: 2,
                memory_size_gib: 4.0,
                storage_sizes_gib: vec![16.0],
                images: vec!["ubuntu20.04".into()],
                ext_cp_ids: vec!["mgmt".into()],
                int_cp_ids: vec!["net1".into()],
                ..Default::default()
            })
            .unwrap();
        descriptor
    }

    #[test]
    fn create_seeds_mgmt_cp_and_flavor() {
        let descriptor = Descriptor::create("hackfest", Some("Hackfest VNF"), None, None).unwrap();
        assert_eq!(descriptor.mgmt_cp(), "mgmt");
        assert_eq!(descriptor.version(), "1.0");
        assert_eq!(descriptor.product_name(), "Hackfest VNF");
        assert!(descriptor.external_connection_point("mgmt").is_some());
        assert_eq!(descriptor.df().id(), "default-df");

        assert!(matches!(
            Descriptor::create("", None, None, None),
            Err(Error::Validation(_)),
        ));
    }

    #[test]
    fn add_unit_wires_everything_up() {
        let descriptor = simple_descriptor();
        let unit = descriptor.unit("u1").unwrap();
        assert_eq!(unit.compute_profile(), "u1-compute");
        assert_eq!(unit.storage_profiles(), ["u1-storage"]);
        assert_eq!(unit.interfaces().len(), 2);
        assert_eq!(unit.interfaces()[0].id(), "u1_int_0");
        assert_eq!(unit.interfaces()[1].internal_link(), Some("net1"));

        let mgmt = descriptor.external_connection_point("mgmt").unwrap();
        assert_eq!(mgmt.unit(), Some("u1"));
        assert_eq!(mgmt.interface(), Some("u1_int_0"));
        assert_eq!(descriptor.df().unit_profile("u1").unwrap().min_instances(), 1);
        descriptor.validate().unwrap();
    }

    #[test]
    fn add_unit_is_all_or_nothing() {
        let mut descriptor = simple_descriptor();
        let before = descriptor.to_document();

        let outcome = descriptor.add_unit(UnitSpec {
            id: "u2".into(),
            num_virtual_cpu: 1,
            memory_size_gib: 1.0,
            storage_sizes_gib: vec![8.0],
            images: vec!["ubuntu20.04".into()],
            ext_cp_ids: vec!["no-such-cp".into()],
            ..Default::default()
        });

        assert!(matches!(outcome, Err(Error::NotFound { .. })));
        assert_eq!(descriptor.to_document(), before);
    }

    #[test]
    fn claimed_connection_point_is_exclusive() {
        let mut descriptor = simple_descriptor();

        let outcome = descriptor.add_unit(UnitSpec {
            id: "u2".into(),
            num_virtual_cpu: 1,
            memory_size_gib: 1.0,
            storage_sizes_gib: vec![8.0],
            images: vec!["ubuntu20.04".into()],
            ext_cp_ids: vec!["mgmt".into()],
            ..Default::default()
        });

        match outcome {
            Err(Error::AlreadyBound { unit, cp, .. }) => {
                assert_eq!(unit, "u1");
                assert_eq!(cp, "mgmt");
            }
            outcome => panic!("expected an exclusive-claim failure, got {outcome:?}"),
        }
        assert!(descriptor.unit("u2").is_none());
    }

    #[test]
    fn interface_address_must_match_the_link_subnet() {
        let mut descriptor = simple_descriptor();

        descriptor
            .assign_interface_address("u1", "u1_int_1", "10.0.0.50".parse().unwrap())
            .unwrap();
        assert_eq!(
            descriptor.unit("u1").unwrap().interface("u1_int_1").unwrap().address(),
            Some("10.0.0.50".parse().unwrap()),
        );

        match descriptor.assign_interface_address("u1", "u1_int_1", "10.1.0.50".parse().unwrap()) {
            Err(Error::Validation(reason)) => assert!(reason.contains("10.0.0.0/24")),
            outcome => panic!("expected a subnet violation, got {outcome:?}"),
        }

        descriptor.unassign_interface_address("u1", "u1_int_1").unwrap();
        assert_eq!(
            descriptor.unit("u1").unwrap().interface("u1_int_1").unwrap().address(),
            None,
        );
    }

    #[test]
    fn telemetry_batch_is_all_or_nothing() {
        let mut descriptor = simple_descriptor();

        assert!(matches!(
            descriptor.add_unit_telemetry(
                "u1",
                &[TelemetryKind::CpuUtilization, TelemetryKind::CpuUtilization],
            ),
            Err(Error::AlreadyExists { .. }),
        ));
        assert!(descriptor.unit("u1").unwrap().telemetries().is_empty());

        descriptor
            .add_unit_telemetry(
                "u1",
                &[TelemetryKind::CpuUtilization, TelemetryKind::PacketsSent],
            )
            .unwrap();
        assert_eq!(
            descriptor.unit("u1").unwrap().telemetry_ids(),
            vec!["u1_cpu_utilization", "u1_packets_sent"],
        );
    }

    #[test]
    fn removing_a_unit_sweeps_its_scaling_aspects() {
        let mut descriptor = simple_descriptor();
        descriptor
            .add_unit_telemetry("u1", &[TelemetryKind::CpuUtilization])
            .unwrap();
        descriptor
            .add_scaling_aspect(ScalingAspectSpec {
                id: "u1-scale".into(),
                max_scale_level: 3,
                unit: "u1".into(),
                telemetry: "u1_cpu_utilization".into(),
                scale_in_threshold: 20,
                scale_out_threshold: 80,
                cooldown_time: 120,
                threshold_time: 10,
                scale_delta: 1,
            })
            .unwrap();
        assert_eq!(descriptor.df().scaling_aspects().len(), 1);

        descriptor.remove_unit("u1").unwrap();
        assert!(descriptor.unit("u1").is_none());
        assert!(descriptor.df().unit_profile("u1").is_none());
        assert!(descriptor.df().scaling_aspects().is_empty());
        assert!(descriptor.compute_profiles().is_empty());
        assert!(descriptor.storage_profiles().is_empty());
        assert!(!descriptor.external_connection_point("mgmt").unwrap().is_bound());
    }

    #[test]
    fn removing_telemetry_sweeps_dependent_aspects() {
        let mut descriptor = simple_descriptor();
        descriptor
            .add_unit_telemetry("u1", &[TelemetryKind::CpuUtilization])
            .unwrap();
        descriptor
            .add_scaling_aspect(ScalingAspectSpec {
                id: "u1-scale".into(),
                max_scale_level: 3,
                unit: "u1".into(),
                telemetry: "u1_cpu_utilization".into(),
                scale_in_threshold: 20,
                scale_out_threshold: 80,
                cooldown_time: 120,
                threshold_time: 10,
                scale_delta: 1,
            })
            .unwrap();

        descriptor
            .remove_unit_telemetry("u1", &[TelemetryKind::CpuUtilization])
            .unwrap();
        assert!(descriptor.df().scaling_aspects().is_empty());
    }

    #[test]
    fn scaling_aspect_requires_a_known_telemetry() {
        let mut descriptor = simple_descriptor();

        assert!(matches!(
            descriptor.add_scaling_aspect(ScalingAspectSpec {
                id: "u1-scale".into(),
                max_scale_level: 3,
                unit: "u1".into(),
                telemetry: "u1_cpu_utilization".into(),
                scale_in_threshold: 20,
                scale_out_threshold: 80,
                cooldown_time: 120,
                threshold_time: 10,
                scale_delta: 1,
            }),
            Err(Error::NotFound { .. }),
        ));
    }

    #[test]
    fn referenced_image_cannot_be_removed() {
        let mut descriptor = simple_descriptor();

        assert!(matches!(
            descriptor.remove_image("ubuntu20.04"),
            Err(Error::Validation(_)),
        ));
        assert!(matches!(
            descriptor.remove_image("no-such-image"),
            Err(Error::NotFound { .. }),
        ));

        descriptor.add_image("fedora39", "./iso/fedora39", None, None).unwrap();
        descriptor.remove_image("fedora39").unwrap();
        assert!(descriptor.image("fedora39").is_none());
    }

    #[test]
    fn removing_an_internal_connection_point_cascades() {
        let mut descriptor = simple_descriptor();

        descriptor.remove_internal_connection_point("net1").unwrap();
        assert!(descriptor.internal_connection_point("net1").is_none());
        assert!(descriptor.df().virtual_link_profile("net1").is_none());
        assert_eq!(descriptor.unit("u1").unwrap().interfaces().len(), 1);
    }

    #[test]
    fn document_round_trip_is_a_fixed_point() {
        let mut descriptor = simple_descriptor();
        descriptor.set_description(Some("Round trip fixture"));
        descriptor
            .add_unit_telemetry("u1", &[TelemetryKind::CpuUtilization])
            .unwrap();
        descriptor
            .add_scaling_aspect(ScalingAspectSpec {
                id: "u1-scale".into(),
                max_scale_level: 3,
                unit: "u1".into(),
                telemetry: "u1_cpu_utilization".into(),
                scale_in_threshold: 20,
                scale_out_threshold: 80,
                cooldown_time: 120,
                threshold_time: 10,
                scale_delta: 1,
            })
            .unwrap();

        let document = descriptor.to_document();
        let reloaded = Descriptor::from_document(&document).unwrap();
        assert_eq!(reloaded.to_document(), document);
    }

    #[test]
    fn unknown_document_keys_survive_a_round_trip() {
        let descriptor = simple_descriptor();
        let mut document = descriptor.to_document();
        if let Some(Value::Mapping(inner)) = document.get_mut(Value::from("vnfd")) {
            put(inner, "provider", "nfstudio");
        }

        let reloaded = Descriptor::from_document(&document).unwrap();
        assert_eq!(reloaded.to_document(), document);
    }

    #[test]
    fn loading_twice_is_rejected() {
        let descriptor = simple_descriptor();
        let document = descriptor.to_document();
        let mut reloaded = Descriptor::from_document(&document).unwrap();

        let inner = document
            .get(Value::from("vnfd"))
            .and_then(Value::as_mapping)
            .unwrap();
        assert!(matches!(
            reloaded.load(inner),
            Err(Error::AlreadyConfigured { .. }),
        ));
    }

    #[test]
    fn auto_ids_count_up() {
        let mut descriptor = Descriptor::create("hackfest", None, None, None).unwrap();
        let id = descriptor
            .add_external_connection_point(None, None, None)
            .unwrap()
            .id()
            .to_string();
        assert_eq!(id, "ext_1");

        let id = descriptor
            .add_internal_connection_point(None, None, None, true)
            .unwrap()
            .id()
            .to_string();
        assert_eq!(id, "int_0");

        assert!(matches!(
            descriptor.add_external_connection_point(Some("mgmt"), None, None),
            Err(Error::AlreadyExists { .. }),
        ));
    }

    #[test]
    fn gateway_and_network_are_given_together() {
        let mut descriptor = Descriptor::create("hackfest", None, None, None).unwrap();
        assert!(matches!(
            descriptor.add_internal_connection_point(
                Some("net1"),
                Some("10.0.0.1".parse().unwrap()),
                None,
                true,
            ),
            Err(Error::Validation(_)),
        ));
        assert!(matches!(
            descriptor.add_internal_connection_point(
                Some("net1"),
                None,
                Some("10.0.0.0/24".parse().unwrap()),
                true,
            ),
            Err(Error::Validation(_)),
        ));
        assert!(descriptor.internal_connection_point("net1").is_none());
    }

    #[test]
    fn duplicate_connection_point_in_a_unit_spec_is_rejected() {
        let mut descriptor = simple_descriptor();
        descriptor.add_external_connection_point(Some("ext1"), None, None).unwrap();
        let before = descriptor.to_document();

        let outcome = descriptor.add_unit(UnitSpec {
            id: "u2".into(),
            num_virtual_cpu: 1,
            memory_size_gib: 1.0,
            storage_sizes_gib: vec![8.0],
            images: vec!["ubuntu20.04".into()],
            ext_cp_ids: vec!["ext1".into(), "ext1".into()],
            ..Default::default()
        });
        assert!(matches!(outcome, Err(Error::Validation(_))));

        let outcome = descriptor.add_unit(UnitSpec {
            id: "u2".into(),
            num_virtual_cpu: 1,
            memory_size_gib: 1.0,
            storage_sizes_gib: vec![8.0],
            images: vec!["ubuntu20.04".into()],
            int_cp_ids: vec!["net1".into(), "net1".into()],
            ..Default::default()
        });
        assert!(matches!(outcome, Err(Error::Validation(_))));

        assert_eq!(descriptor.to_document(), before);
        assert!(!descriptor.external_connection_point("ext1").unwrap().is_bound());
        descriptor.validate().unwrap();
    }

    #[test]
    fn duplicate_unit_ids_fail_document_validation() {
        let mut document = simple_descriptor().to_document();
        let units = document
            .get_mut(Value::from("vnfd"))
            .and_then(Value::as_mapping_mut)
            .and_then(|inner| inner.get_mut(Value::from("vdu")))
            .and_then(Value::as_sequence_mut)
            .unwrap();
        units.push(units[0].clone());

        assert!(matches!(
            Descriptor::from_document(&document),
            Err(Error::AlreadyExists { .. }),
        ));
    }

    #[test]
    fn double_claimed_interface_fails_document_validation() {
        let mut document = simple_descriptor().to_document();
        let cps = document
            .get_mut(Value::from("vnfd"))
            .and_then(Value::as_mapping_mut)
            .and_then(|inner| inner.get_mut(Value::from("ext-cpd")))
            .and_then(Value::as_sequence_mut)
            .unwrap();
        let mut rival = cps[0].as_mapping().unwrap().clone();
        rival.insert(Value::from("id"), Value::from("ext2"));
        cps.push(Value::Mapping(rival));

        assert!(matches!(
            Descriptor::from_document(&document),
            Err(Error::AlreadyBound { .. }),
        ));
    }
}
