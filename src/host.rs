//! Host entity and pool.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::element::Element;
use crate::error::{ClientError, Result};
use crate::pool::{Pool, PoolEntity};
use crate::schema::{CoercionPolicy, FieldDef, FieldSchema};
use crate::transport::{parse_allocated_id, CallArg, Transport};
use crate::xml::XmlNode;

static HOST_SCHEMA: FieldSchema = FieldSchema {
    kind: "HOST",
    policy: CoercionPolicy::Eager,
    fields: &[
        FieldDef::int("id", "ID"),
        FieldDef::string("name", "NAME"),
        FieldDef::int("state", "STATE"),
        FieldDef::string("im_mad", "IM_MAD"),
        FieldDef::string("vm_mad", "VM_MAD"),
        FieldDef::string("tm_mad", "TM_MAD"),
        FieldDef::int("last_mon_time", "LAST_MON_TIME"),
        FieldDef::string("cluster", "CLUSTER"),
        FieldDef::raw("host_share", "HOST_SHARE"),
        FieldDef::raw("template", "TEMPLATE"),
    ],
};

/// Monitoring state of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostState {
    Init,
    Monitoring,
    Monitored,
    Error,
    Disabled,
}

impl HostState {
    /// Decode a state ordinal as reported by the control plane.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(HostState::Init),
            1 => Ok(HostState::Monitoring),
            2 => Ok(HostState::Monitored),
            3 => Ok(HostState::Error),
            4 => Ok(HostState::Disabled),
            _ => Err(ClientError::Decode {
                table: "HOST_STATES",
                code,
                len: 5,
            }),
        }
    }

    /// Symbolic name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Init => "INIT",
            HostState::Monitoring => "MONITORING",
            HostState::Monitored => "MONITORED",
            HostState::Error => "ERROR",
            HostState::Disabled => "DISABLED",
        }
    }

    /// Short display code.
    pub fn short(&self) -> &'static str {
        match self {
            HostState::Init | HostState::Monitoring | HostState::Monitored => "on",
            HostState::Error => "err",
            HostState::Disabled => "off",
        }
    }
}

/// One hypervisor host known to the control plane.
#[derive(Debug)]
pub struct Host {
    element: Element,
}

impl Host {
    pub const INFO_METHOD: &'static str = "host.info";
    pub const ALLOCATE_METHOD: &'static str = "host.allocate";
    pub const DELETE_METHOD: &'static str = "host.delete";
    pub const ENABLE_METHOD: &'static str = "host.enable";

    /// Register a new host and return its assigned ID.
    ///
    /// The returned ID identifies the remote record only; fetch or
    /// refresh to obtain a populated element.
    pub async fn allocate(
        client: &Arc<dyn Transport>,
        hostname: &str,
        im_mad: &str,
        vm_mad: &str,
        tm_mad: &str,
    ) -> Result<i64> {
        debug!(hostname, "allocating host");
        let payload = client
            .call(
                Self::ALLOCATE_METHOD,
                &[
                    hostname.into(),
                    im_mad.into(),
                    vm_mad.into(),
                    tm_mad.into(),
                ],
            )
            .await?;
        parse_allocated_id(&payload)
    }

    /// Fetch one host by ID via `host.info`.
    pub async fn fetch(client: Arc<dyn Transport>, id: i64) -> Result<Self> {
        let payload = client.call(Self::INFO_METHOD, &[CallArg::Int(id)]).await?;
        let root = XmlNode::parse(&payload)?;
        Ok(Self {
            element: Element::new(root, &HOST_SCHEMA, client)?,
        })
    }

    /// Re-fetch this host's record from the control plane.
    pub async fn refresh(&mut self) -> Result<()> {
        self.element.refresh_via(Self::INFO_METHOD).await
    }

    /// Enable the host for monitoring and scheduling.
    pub async fn enable(&self) -> Result<()> {
        self.element
            .lifecycle_call(Self::ENABLE_METHOD, &[CallArg::Bool(true)])
            .await
    }

    /// Disable the host.
    pub async fn disable(&self) -> Result<()> {
        self.element
            .lifecycle_call(Self::ENABLE_METHOD, &[CallArg::Bool(false)])
            .await
    }

    /// Remove the host from the control plane.
    pub async fn delete(&self) -> Result<()> {
        self.element.lifecycle_call(Self::DELETE_METHOD, &[]).await
    }

    /// Decoded monitoring state.
    pub fn state(&self) -> Result<HostState> {
        let code = self
            .element
            .int_field("state")?
            .ok_or(ClientError::FieldNotSet("state"))?;
        HostState::from_code(code)
    }

    /// Short display code of the current state.
    pub fn short_state(&self) -> Result<&'static str> {
        Ok(self.state()?.short())
    }

    pub fn id(&self) -> Option<i64> {
        self.element.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.element.name()
    }

    /// The generic element backing this host.
    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Host({})", self.name().unwrap_or("?"))
    }
}

impl PoolEntity for Host {
    const ELEMENT_TAG: &'static str = "HOST";
    const POOL_TAG: &'static str = "HOST_POOL";
    const POOL_INFO_METHOD: &'static str = "hostpool.info";

    fn schema() -> &'static FieldSchema {
        &HOST_SCHEMA
    }

    fn from_node(node: XmlNode, client: Arc<dyn Transport>) -> Result<Self> {
        Ok(Self {
            element: Element::new(node, &HOST_SCHEMA, client)?,
        })
    }

    fn element(&self) -> &Element {
        &self.element
    }
}

/// Pool of all hosts.
pub type HostPool = Pool<Host>;

impl Pool<Host> {
    /// Register a new host; the local snapshot is unchanged until the
    /// next refresh.
    pub async fn allocate(
        &self,
        hostname: &str,
        im_mad: &str,
        vm_mad: &str,
        tm_mad: &str,
    ) -> Result<i64> {
        Host::allocate(self.client(), hostname, im_mad, vm_mad, tm_mad).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_table_decodes_by_ordinal() {
        let expected = ["INIT", "MONITORING", "MONITORED", "ERROR", "DISABLED"];
        for (code, name) in expected.iter().enumerate() {
            assert_eq!(HostState::from_code(code as i64).unwrap().as_str(), *name);
        }
    }

    #[test]
    fn test_out_of_range_state_is_decode_error() {
        let err = HostState::from_code(5).unwrap_err();
        match err {
            ClientError::Decode { table, code, len } => {
                assert_eq!(table, "HOST_STATES");
                assert_eq!(code, 5);
                assert_eq!(len, 5);
            }
            other => panic!("expected Decode, got {other:?}"),
        }
        assert!(HostState::from_code(-1).is_err());
    }

    #[test]
    fn test_host_schema_is_eager() {
        assert_eq!(Host::schema().policy, CoercionPolicy::Eager);
        assert_eq!(Host::schema().kind, "HOST");
    }

    #[test]
    fn test_short_codes() {
        assert_eq!(HostState::Init.short(), "on");
        assert_eq!(HostState::Monitoring.short(), "on");
        assert_eq!(HostState::Monitored.short(), "on");
        assert_eq!(HostState::Error.short(), "err");
        assert_eq!(HostState::Disabled.short(), "off");
    }
}
