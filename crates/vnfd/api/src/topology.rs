use serde::{Deserialize, Serialize};
use strum::Display;

use crate::descriptor::Descriptor;

/// Hierarchy levels of the rendered graph, outermost first.
const LEVEL_EXTERNAL: i8 = -1;
const LEVEL_LINK: i8 = 0;
const LEVEL_INTERFACE: i8 = 1;
const LEVEL_UNIT: i8 = 2;

#[derive(
    Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    ExternalConnectionPoint,
    InternalLink,
    Interface,
    Unit,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub level: i8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// The descriptor flattened into the node/edge list an external graph
/// renderer consumes. Interfaces are namespaced by their owning unit so
/// ids stay unique across units.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Topology {
    pub fn of(descriptor: &Descriptor) -> Self {
        let mut nodes = Vec::default();
        let mut edges = Vec::default();

        for cp in descriptor.external_connection_points() {
            nodes.push(Node {
                id: cp.id().into(),
                kind: NodeKind::ExternalConnectionPoint,
                label: cp.id().into(),
                level: LEVEL_EXTERNAL,
                group: None,
            });
        }

        for cp in descriptor.internal_connection_points() {
            let label = match descriptor.df().virtual_link_profile(cp.id()) {
                Some(profile) => format!(
                    "{}\n{} via {}{}",
                    cp.id(),
                    profile.subnet(),
                    profile.gateway(),
                    if profile.dhcp_enabled() { ", dhcp" } else { "" },
                ),
                None => cp.id().into(),
            };
            nodes.push(Node {
                id: cp.id().into(),
                kind: NodeKind::InternalLink,
                label,
                level: LEVEL_LINK,
                group: None,
            });
        }

        for unit in descriptor.units() {
            let telemetry_ids = unit.telemetry_ids();
            let label = if telemetry_ids.is_empty() {
                unit.id().into()
            } else {
                format!("{}\n{}", unit.id(), telemetry_ids.join("\n"))
            };
            nodes.push(Node {
                id: unit.id().into(),
                kind: NodeKind::Unit,
                label,
                level: LEVEL_UNIT,
                group: Some(unit.id().into()),
            });

            for interface in unit.interfaces() {
                let id = format!("{}:{}", unit.id(), interface.id());
                let label = match interface.address() {
                    Some(address) => format!("{}\n{address}", interface.name()),
                    None => format!("{}\nDHCP", interface.name()),
                };
                nodes.push(Node {
                    id: id.clone(),
                    kind: NodeKind::Interface,
                    label,
                    level: LEVEL_INTERFACE,
                    group: Some(unit.id().into()),
                });
                edges.push(Edge {
                    from: id.clone(),
                    to: unit.id().into(),
                });
                if let Some(link) = interface.internal_link() {
                    edges.push(Edge {
                        from: id.clone(),
                        to: link.into(),
                    });
                }
            }
        }

        for cp in descriptor.external_connection_points() {
            if let (Some(unit), Some(interface)) = (cp.unit(), cp.interface()) {
                edges.push(Edge {
                    from: cp.id().into(),
                    to: format!("{unit}:{interface}"),
                });
            }
        }

        Self { nodes, edges }
    }
}
