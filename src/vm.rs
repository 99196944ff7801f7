//! Virtual machine entity and pool.
//!
//! VMs carry two state fields: the primary `STATE` and, while the VM is
//! `ACTIVE`, the finer-grained `LCM_STATE` tracked by the life-cycle
//! manager. Both decode through fixed ordinal tables, as does the
//! migration reason the scheduler records on reschedules.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::element::Element;
use crate::error::{ClientError, Result};
use crate::pool::{Pool, PoolEntity};
use crate::schema::{CoercionPolicy, FieldDef, FieldSchema};
use crate::transport::{parse_allocated_id, CallArg, Transport};
use crate::xml::XmlNode;

static VM_SCHEMA: FieldSchema = FieldSchema {
    kind: "VM",
    policy: CoercionPolicy::Eager,
    fields: &[
        FieldDef::int("id", "ID"),
        FieldDef::int("uid", "UID"),
        FieldDef::string("name", "NAME"),
        FieldDef::int("last_poll", "LAST_POLL"),
        FieldDef::int("state", "STATE"),
        FieldDef::int("lcm_state", "LCM_STATE"),
        FieldDef::int("stime", "STIME"),
        FieldDef::int("etime", "ETIME"),
        FieldDef::string("deploy_id", "DEPLOY_ID"),
        FieldDef::int("memory", "MEMORY"),
        FieldDef::int("cpu", "CPU"),
        FieldDef::int("net_tx", "NET_TX"),
        FieldDef::int("net_rx", "NET_RX"),
        FieldDef::int("last_seq", "LAST_SEQ"),
        FieldDef::raw("template", "TEMPLATE"),
    ],
};

// =============================================================================
// STATE DECODERS
// =============================================================================

/// Primary VM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmState {
    Init,
    Pending,
    Hold,
    Active,
    Stopped,
    Suspended,
    Done,
    Failed,
}

impl VmState {
    /// Decode a state ordinal as reported by the control plane.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(VmState::Init),
            1 => Ok(VmState::Pending),
            2 => Ok(VmState::Hold),
            3 => Ok(VmState::Active),
            4 => Ok(VmState::Stopped),
            5 => Ok(VmState::Suspended),
            6 => Ok(VmState::Done),
            7 => Ok(VmState::Failed),
            _ => Err(ClientError::Decode {
                table: "VM_STATE",
                code,
                len: 8,
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VmState::Init => "INIT",
            VmState::Pending => "PENDING",
            VmState::Hold => "HOLD",
            VmState::Active => "ACTIVE",
            VmState::Stopped => "STOPPED",
            VmState::Suspended => "SUSPENDED",
            VmState::Done => "DONE",
            VmState::Failed => "FAILED",
        }
    }

    pub fn short(&self) -> &'static str {
        match self {
            VmState::Init => "init",
            VmState::Pending => "pend",
            VmState::Hold => "hold",
            VmState::Active => "actv",
            VmState::Stopped => "stop",
            VmState::Suspended => "susp",
            VmState::Done => "done",
            VmState::Failed => "fail",
        }
    }
}

/// Life-cycle manager sub-state of an `ACTIVE` VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LcmState {
    LcmInit,
    Prolog,
    Boot,
    Running,
    Migrate,
    SaveStop,
    SaveSuspend,
    SaveMigrate,
    PrologMigrate,
    PrologResume,
    EpilogStop,
    Epilog,
    Shutdown,
    Cancel,
    Failure,
    Delete,
    Unknown,
}

impl LcmState {
    /// Decode an LCM state ordinal as reported by the control plane.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(LcmState::LcmInit),
            1 => Ok(LcmState::Prolog),
            2 => Ok(LcmState::Boot),
            3 => Ok(LcmState::Running),
            4 => Ok(LcmState::Migrate),
            5 => Ok(LcmState::SaveStop),
            6 => Ok(LcmState::SaveSuspend),
            7 => Ok(LcmState::SaveMigrate),
            8 => Ok(LcmState::PrologMigrate),
            9 => Ok(LcmState::PrologResume),
            10 => Ok(LcmState::EpilogStop),
            11 => Ok(LcmState::Epilog),
            12 => Ok(LcmState::Shutdown),
            13 => Ok(LcmState::Cancel),
            14 => Ok(LcmState::Failure),
            15 => Ok(LcmState::Delete),
            16 => Ok(LcmState::Unknown),
            _ => Err(ClientError::Decode {
                table: "LCM_STATE",
                code,
                len: 17,
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LcmState::LcmInit => "LCM_INIT",
            LcmState::Prolog => "PROLOG",
            LcmState::Boot => "BOOT",
            LcmState::Running => "RUNNING",
            LcmState::Migrate => "MIGRATE",
            LcmState::SaveStop => "SAVE_STOP",
            LcmState::SaveSuspend => "SAVE_SUSPEND",
            LcmState::SaveMigrate => "SAVE_MIGRATE",
            LcmState::PrologMigrate => "PROLOG_MIGRATE",
            LcmState::PrologResume => "PROLOG_RESUME",
            LcmState::EpilogStop => "EPILOG_STOP",
            LcmState::Epilog => "EPILOG",
            LcmState::Shutdown => "SHUTDOWN",
            LcmState::Cancel => "CANCEL",
            LcmState::Failure => "FAILURE",
            LcmState::Delete => "DELETE",
            LcmState::Unknown => "UNKNOWN",
        }
    }

    pub fn short(&self) -> &'static str {
        match self {
            LcmState::LcmInit => "init",
            LcmState::Prolog | LcmState::PrologResume => "prol",
            LcmState::Boot => "boot",
            LcmState::Running => "runn",
            LcmState::Migrate | LcmState::PrologMigrate => "migr",
            LcmState::SaveStop | LcmState::SaveSuspend | LcmState::SaveMigrate => "save",
            LcmState::EpilogStop | LcmState::Epilog => "epil",
            LcmState::Shutdown | LcmState::Cancel => "shut",
            LcmState::Failure => "fail",
            LcmState::Delete => "dele",
            LcmState::Unknown => "unkn",
        }
    }
}

/// Why the scheduler last moved a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrateReason {
    None,
    Error,
    StopResume,
    User,
    Cancel,
}

impl MigrateReason {
    /// Decode a migration-reason ordinal.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(MigrateReason::None),
            1 => Ok(MigrateReason::Error),
            2 => Ok(MigrateReason::StopResume),
            3 => Ok(MigrateReason::User),
            4 => Ok(MigrateReason::Cancel),
            _ => Err(ClientError::Decode {
                table: "MIGRATE_REASON",
                code,
                len: 5,
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrateReason::None => "NONE",
            MigrateReason::Error => "ERROR",
            MigrateReason::StopResume => "STOP_RESUME",
            MigrateReason::User => "USER",
            MigrateReason::Cancel => "CANCEL",
        }
    }

    pub fn short(&self) -> &'static str {
        match self {
            MigrateReason::None => "none",
            MigrateReason::Error => "erro",
            MigrateReason::StopResume => "stop",
            MigrateReason::User => "user",
            MigrateReason::Cancel => "canc",
        }
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// One virtual machine known to the control plane.
#[derive(Debug)]
pub struct VirtualMachine {
    element: Element,
}

impl VirtualMachine {
    pub const INFO_METHOD: &'static str = "vm.info";
    pub const ALLOCATE_METHOD: &'static str = "vm.allocate";
    pub const ACTION_METHOD: &'static str = "vm.action";
    pub const MIGRATE_METHOD: &'static str = "vm.migrate";
    pub const DEPLOY_METHOD: &'static str = "vm.deploy";
    pub const SAVEDISK_METHOD: &'static str = "vm.savedisk";
    pub const DELETE_METHOD: &'static str = "vm.delete";

    /// Submit a VM template and return the assigned ID.
    pub async fn allocate(client: &Arc<dyn Transport>, template: &str) -> Result<i64> {
        debug!("allocating vm");
        let payload = client
            .call(Self::ALLOCATE_METHOD, &[template.into()])
            .await?;
        parse_allocated_id(&payload)
    }

    /// Fetch one VM by ID via `vm.info`.
    pub async fn fetch(client: Arc<dyn Transport>, id: i64) -> Result<Self> {
        let payload = client.call(Self::INFO_METHOD, &[CallArg::Int(id)]).await?;
        let root = XmlNode::parse(&payload)?;
        Ok(Self {
            element: Element::new(root, &VM_SCHEMA, client)?,
        })
    }

    /// Re-fetch this VM's record from the control plane.
    pub async fn refresh(&mut self) -> Result<()> {
        self.element.refresh_via(Self::INFO_METHOD).await
    }

    /// Deploy a pending VM onto a host.
    pub async fn deploy(&self, host_id: i64) -> Result<()> {
        self.element
            .lifecycle_call(Self::DEPLOY_METHOD, &[CallArg::Int(host_id)])
            .await
    }

    /// Migrate to another host, saving and restoring the VM.
    pub async fn migrate(&self, host_id: i64) -> Result<()> {
        self.element
            .lifecycle_call(
                Self::MIGRATE_METHOD,
                &[CallArg::Int(host_id), CallArg::Bool(false)],
            )
            .await
    }

    /// Migrate to another host while the VM keeps running.
    pub async fn live_migrate(&self, host_id: i64) -> Result<()> {
        self.element
            .lifecycle_call(
                Self::MIGRATE_METHOD,
                &[CallArg::Int(host_id), CallArg::Bool(true)],
            )
            .await
    }

    /// Save a disk as a new image.
    pub async fn save_disk(&self, disk_id: i64, image_name: &str) -> Result<()> {
        self.element
            .lifecycle_call(
                Self::SAVEDISK_METHOD,
                &[CallArg::Int(disk_id), image_name.into()],
            )
            .await
    }

    /// Remove the VM record from the control plane.
    pub async fn delete(&self) -> Result<()> {
        self.element.lifecycle_call(Self::DELETE_METHOD, &[]).await
    }

    /// Shut down an already deployed VM.
    pub async fn shutdown(&self) -> Result<()> {
        self.action("shutdown").await
    }

    /// Cancel a running VM.
    pub async fn cancel(&self) -> Result<()> {
        self.action("cancel").await
    }

    /// Hold the VM so the scheduler will not deploy it.
    pub async fn hold(&self) -> Result<()> {
        self.action("hold").await
    }

    /// Release the VM from hold.
    pub async fn release(&self) -> Result<()> {
        self.action("release").await
    }

    /// Stop a running VM.
    pub async fn stop(&self) -> Result<()> {
        self.action("stop").await
    }

    /// Save a running VM and suspend it.
    pub async fn suspend(&self) -> Result<()> {
        self.action("suspend").await
    }

    /// Resume a saved VM.
    pub async fn resume(&self) -> Result<()> {
        self.action("resume").await
    }

    /// Delete the VM from pool and database.
    pub async fn finalize(&self) -> Result<()> {
        self.action("finalize").await
    }

    /// Resubmit the VM after a failure.
    pub async fn restart(&self) -> Result<()> {
        self.action("restart").await
    }

    /// Dispatch one generic action. The wire order is
    /// `(action, id)` — the action name comes first.
    async fn action(&self, action: &str) -> Result<()> {
        let id = self.element.require_id()?;
        debug!(action, id, "issuing vm action");
        self.element
            .client()
            .call(Self::ACTION_METHOD, &[action.into(), CallArg::Int(id)])
            .await?;
        Ok(())
    }

    /// Decoded primary state.
    pub fn state(&self) -> Result<VmState> {
        let code = self
            .element
            .int_field("state")?
            .ok_or(ClientError::FieldNotSet("state"))?;
        VmState::from_code(code)
    }

    /// Decoded life-cycle state.
    pub fn lcm_state(&self) -> Result<LcmState> {
        let code = self
            .element
            .int_field("lcm_state")?
            .ok_or(ClientError::FieldNotSet("lcm_state"))?;
        LcmState::from_code(code)
    }

    /// Short display code of the primary state.
    pub fn short_state(&self) -> Result<&'static str> {
        Ok(self.state()?.short())
    }

    /// Short display code of the life-cycle state.
    pub fn short_lcm_state(&self) -> Result<&'static str> {
        Ok(self.lcm_state()?.short())
    }

    pub fn id(&self) -> Option<i64> {
        self.element.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.element.name()
    }

    /// The generic element backing this VM.
    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl std::fmt::Display for VirtualMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VirtualMachine({})", self.name().unwrap_or("?"))
    }
}

impl PoolEntity for VirtualMachine {
    const ELEMENT_TAG: &'static str = "VM";
    const POOL_TAG: &'static str = "VM_POOL";
    const POOL_INFO_METHOD: &'static str = "vmpool.info";

    fn schema() -> &'static FieldSchema {
        &VM_SCHEMA
    }

    fn from_node(node: XmlNode, client: Arc<dyn Transport>) -> Result<Self> {
        Ok(Self {
            element: Element::new(node, &VM_SCHEMA, client)?,
        })
    }

    fn element(&self) -> &Element {
        &self.element
    }
}

/// Pool of all virtual machines.
pub type VirtualMachinePool = Pool<VirtualMachine>;

impl Pool<VirtualMachine> {
    /// Submit a VM template; the local snapshot is unchanged until the
    /// next refresh.
    pub async fn allocate(&self, template: &str) -> Result<i64> {
        VirtualMachine::allocate(self.client(), template).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_state_table_decodes_by_ordinal() {
        let expected = [
            "INIT",
            "PENDING",
            "HOLD",
            "ACTIVE",
            "STOPPED",
            "SUSPENDED",
            "DONE",
            "FAILED",
        ];
        for (code, name) in expected.iter().enumerate() {
            assert_eq!(VmState::from_code(code as i64).unwrap().as_str(), *name);
        }
        assert!(matches!(
            VmState::from_code(8),
            Err(ClientError::Decode { len: 8, .. })
        ));
    }

    #[test]
    fn test_lcm_state_table_decodes_by_ordinal() {
        let expected = [
            "LCM_INIT",
            "PROLOG",
            "BOOT",
            "RUNNING",
            "MIGRATE",
            "SAVE_STOP",
            "SAVE_SUSPEND",
            "SAVE_MIGRATE",
            "PROLOG_MIGRATE",
            "PROLOG_RESUME",
            "EPILOG_STOP",
            "EPILOG",
            "SHUTDOWN",
            "CANCEL",
            "FAILURE",
            "DELETE",
            "UNKNOWN",
        ];
        for (code, name) in expected.iter().enumerate() {
            assert_eq!(LcmState::from_code(code as i64).unwrap().as_str(), *name);
        }
        assert!(matches!(
            LcmState::from_code(17),
            Err(ClientError::Decode { len: 17, .. })
        ));
    }

    #[test]
    fn test_lcm_short_codes_collapse_related_states() {
        assert_eq!(LcmState::SaveStop.short(), "save");
        assert_eq!(LcmState::SaveSuspend.short(), "save");
        assert_eq!(LcmState::SaveMigrate.short(), "save");
        assert_eq!(LcmState::Shutdown.short(), "shut");
        assert_eq!(LcmState::Cancel.short(), "shut");
        assert_eq!(LcmState::Running.short(), "runn");
    }

    #[test]
    fn test_migrate_reason_table() {
        let expected = ["NONE", "ERROR", "STOP_RESUME", "USER", "CANCEL"];
        let shorts = ["none", "erro", "stop", "user", "canc"];
        for (code, (name, short)) in expected.iter().zip(shorts.iter()).enumerate() {
            let reason = MigrateReason::from_code(code as i64).unwrap();
            assert_eq!(reason.as_str(), *name);
            assert_eq!(reason.short(), *short);
        }
        assert!(MigrateReason::from_code(5).is_err());
    }

    #[test]
    fn test_states_serialize_to_symbolic_names() {
        assert_eq!(serde_json::to_string(&VmState::Active).unwrap(), "\"ACTIVE\"");
        assert_eq!(
            serde_json::to_string(&LcmState::SaveMigrate).unwrap(),
            "\"SAVE_MIGRATE\""
        );
        assert_eq!(
            serde_json::to_string(&MigrateReason::StopResume).unwrap(),
            "\"STOP_RESUME\""
        );
    }
}
