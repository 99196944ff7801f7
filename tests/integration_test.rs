//! End-to-end tests driving pools and entities against the mock
//! transport, asserting on the exact wire traffic.

use std::sync::Arc;

use cumulix_client::{
    CallArg, ClientError, DatastorePool, HostPool, MockTransport, Transport, VirtualMachine,
    VirtualMachinePool,
};

fn mock() -> (Arc<MockTransport>, Arc<dyn Transport>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("cumulix_client=debug")
        .try_init();
    let mock = Arc::new(MockTransport::new());
    let client: Arc<dyn Transport> = mock.clone();
    (mock, client)
}

const HOST_POOL_XML: &str = "<HOST_POOL>\
    <HOST><ID>0</ID><NAME>alpha</NAME><STATE>0</STATE><IM_MAD>kvm</IM_MAD></HOST>\
    <HOST><ID>1</ID><NAME>beta</NAME><STATE>2</STATE><IM_MAD>kvm</IM_MAD></HOST>\
    <HOST><ID>2</ID><NAME>gamma</NAME><STATE>3</STATE><IM_MAD>kvm</IM_MAD></HOST>\
</HOST_POOL>";

#[tokio::test]
async fn host_pool_refresh_decodes_states() {
    let (mock, client) = mock();
    mock.respond("hostpool.info", HOST_POOL_XML);

    let mut hosts = HostPool::new(client);
    hosts.refresh().await.unwrap();

    assert_eq!(hosts.len(), 3);
    let states: Vec<_> = hosts.iter().map(|h| h.state().unwrap().as_str()).collect();
    assert_eq!(states, vec!["INIT", "MONITORED", "ERROR"]);
    let shorts: Vec<_> = hosts.iter().map(|h| h.short_state().unwrap()).collect();
    assert_eq!(shorts, vec!["on", "on", "err"]);
}

#[tokio::test]
async fn vm_decodes_primary_and_lcm_state() {
    let (mock, client) = mock();
    mock.respond(
        "vm.info",
        "<VM><ID>42</ID><NAME>web-1</NAME><STATE>3</STATE><LCM_STATE>3</LCM_STATE></VM>",
    );

    let vm = VirtualMachine::fetch(client, 42).await.unwrap();
    assert_eq!(vm.state().unwrap().as_str(), "ACTIVE");
    assert_eq!(vm.short_state().unwrap(), "actv");
    assert_eq!(vm.lcm_state().unwrap().as_str(), "RUNNING");
    assert_eq!(vm.short_lcm_state().unwrap(), "runn");

    let calls = mock.calls_for("vm.info");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec![CallArg::Int(42)]);
}

#[tokio::test]
async fn delete_issues_one_call_and_leaves_fields_alone() {
    let (mock, client) = mock();
    mock.respond("hostpool.info", HOST_POOL_XML);
    mock.respond("host.delete", "");

    let mut hosts = HostPool::new(client);
    hosts.refresh().await.unwrap();

    let host = hosts.get(1).unwrap();
    let before = host.element().coerce().unwrap().clone();
    host.delete().await.unwrap();
    let after = host.element().coerce().unwrap().clone();

    assert_eq!(before, after);
    let calls = mock.calls_for("host.delete");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec![CallArg::Int(1)]);
}

#[tokio::test]
async fn datastore_pool_collects_image_ids() {
    let (mock, client) = mock();
    mock.respond(
        "datastorepool.info",
        "<DATASTORE_POOL><DATASTORE><ID>100</ID><NAME>default</NAME>\
         <IMAGES><IMAGE_ID>5</IMAGE_ID><IMAGE_ID>9</IMAGE_ID></IMAGES>\
         </DATASTORE></DATASTORE_POOL>",
    );

    let mut datastores = DatastorePool::new(client);
    datastores.refresh().await.unwrap();

    let ds = datastores.get(100).unwrap();
    assert_eq!(ds.image_ids().unwrap(), vec![5, 9]);
}

#[tokio::test]
async fn refresh_wholly_replaces_the_snapshot() {
    let (mock, client) = mock();
    mock.respond(
        "hostpool.info",
        "<HOST_POOL><HOST><ID>0</ID><NAME>old</NAME><STATE>2</STATE></HOST></HOST_POOL>",
    );
    mock.respond(
        "hostpool.info",
        "<HOST_POOL><HOST><ID>7</ID><NAME>new</NAME><STATE>2</STATE></HOST></HOST_POOL>",
    );

    let mut hosts = HostPool::new(client);
    hosts.refresh().await.unwrap();
    assert!(hosts.get(0).is_some());

    hosts.refresh().await.unwrap();
    assert_eq!(hosts.len(), 1);
    assert!(hosts.get(0).is_none());
    assert_eq!(hosts.get(7).unwrap().name(), Some("new"));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let (mock, client) = mock();
    mock.respond("hostpool.info", HOST_POOL_XML);
    mock.fail("hostpool.info", 0x1000, "authority unavailable");

    let mut hosts = HostPool::new(client);
    hosts.refresh().await.unwrap();

    let err = hosts.refresh().await.unwrap_err();
    match err {
        ClientError::Remote { code, message } => {
            assert_eq!(code, 0x1000);
            assert_eq!(message, "authority unavailable");
        }
        other => panic!("expected Remote, got {other:?}"),
    }
    assert_eq!(hosts.len(), 3);
}

#[tokio::test]
async fn allocate_returns_id_without_touching_snapshot() {
    let (mock, client) = mock();
    mock.respond("vm.allocate", "77");

    let vms = VirtualMachinePool::new(client);
    let id = vms.allocate("NAME = web-2\nCPU = 1").await.unwrap();

    assert_eq!(id, 77);
    assert!(vms.is_empty());
    let calls = mock.calls_for("vm.allocate");
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].args,
        vec![CallArg::Str("NAME = web-2\nCPU = 1".to_string())]
    );
}

#[tokio::test]
async fn allocate_with_non_numeric_reply_is_type_mismatch() {
    let (mock, client) = mock();
    mock.respond("host.allocate", "<ERROR/>");

    let hosts = HostPool::new(client);
    let err = hosts
        .allocate("delta", "kvm", "kvm", "shared")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::TypeMismatch { .. }));
}

#[tokio::test]
async fn name_lookup_takes_first_match() {
    let (mock, client) = mock();
    mock.respond(
        "hostpool.info",
        "<HOST_POOL>\
         <HOST><ID>3</ID><NAME>dup</NAME><STATE>2</STATE></HOST>\
         <HOST><ID>4</ID><NAME>dup</NAME><STATE>3</STATE></HOST>\
         </HOST_POOL>",
    );

    let mut hosts = HostPool::new(client);
    hosts.refresh().await.unwrap();

    assert_eq!(hosts.get_by_name("dup").unwrap().id(), Some(3));
    assert!(hosts.get_by_name("absent").is_none());
    assert!(hosts.get(99).is_none());
}

#[tokio::test]
async fn vm_actions_put_the_action_name_first() {
    let (mock, client) = mock();
    mock.respond(
        "vm.info",
        "<VM><ID>9</ID><NAME>db</NAME><STATE>2</STATE><LCM_STATE>0</LCM_STATE></VM>",
    );
    mock.respond("vm.action", "");
    mock.respond("vm.action", "");

    let vm = VirtualMachine::fetch(client, 9).await.unwrap();
    vm.hold().await.unwrap();
    vm.release().await.unwrap();

    let calls = mock.calls_for("vm.action");
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0].args,
        vec![CallArg::Str("hold".to_string()), CallArg::Int(9)]
    );
    assert_eq!(
        calls[1].args,
        vec![CallArg::Str("release".to_string()), CallArg::Int(9)]
    );
}

#[tokio::test]
async fn migrate_carries_the_live_flag() {
    let (mock, client) = mock();
    mock.respond(
        "vm.info",
        "<VM><ID>5</ID><STATE>3</STATE><LCM_STATE>3</LCM_STATE></VM>",
    );
    mock.respond("vm.migrate", "");
    mock.respond("vm.migrate", "");

    let vm = VirtualMachine::fetch(client, 5).await.unwrap();
    vm.migrate(2).await.unwrap();
    vm.live_migrate(3).await.unwrap();

    let calls = mock.calls_for("vm.migrate");
    assert_eq!(
        calls[0].args,
        vec![CallArg::Int(5), CallArg::Int(2), CallArg::Bool(false)]
    );
    assert_eq!(
        calls[1].args,
        vec![CallArg::Int(5), CallArg::Int(3), CallArg::Bool(true)]
    );
}

#[tokio::test]
async fn host_enable_and_disable_flag_the_call() {
    let (mock, client) = mock();
    mock.respond("hostpool.info", HOST_POOL_XML);
    mock.respond("host.enable", "");
    mock.respond("host.enable", "");

    let mut hosts = HostPool::new(client);
    hosts.refresh().await.unwrap();

    let host = hosts.get(2).unwrap();
    host.enable().await.unwrap();
    host.disable().await.unwrap();

    let calls = mock.calls_for("host.enable");
    assert_eq!(calls[0].args, vec![CallArg::Int(2), CallArg::Bool(true)]);
    assert_eq!(calls[1].args, vec![CallArg::Int(2), CallArg::Bool(false)]);
}

#[tokio::test]
async fn element_refresh_rederives_fields_from_new_tree() {
    let (mock, client) = mock();
    mock.respond(
        "vm.info",
        "<VM><ID>8</ID><NAME>a</NAME><STATE>1</STATE><LCM_STATE>0</LCM_STATE></VM>",
    );
    mock.respond(
        "vm.info",
        "<VM><ID>8</ID><NAME>a</NAME><STATE>3</STATE><LCM_STATE>3</LCM_STATE></VM>",
    );

    let mut vm = VirtualMachine::fetch(client, 8).await.unwrap();
    assert_eq!(vm.state().unwrap().as_str(), "PENDING");

    vm.refresh().await.unwrap();
    assert_eq!(vm.state().unwrap().as_str(), "ACTIVE");
    assert_eq!(vm.lcm_state().unwrap().as_str(), "RUNNING");
}

#[tokio::test]
async fn save_disk_sends_disk_and_image_name() {
    let (mock, client) = mock();
    mock.respond(
        "vm.info",
        "<VM><ID>11</ID><STATE>3</STATE><LCM_STATE>3</LCM_STATE></VM>",
    );
    mock.respond("vm.savedisk", "");

    let vm = VirtualMachine::fetch(client, 11).await.unwrap();
    vm.save_disk(0, "golden-image").await.unwrap();

    let calls = mock.calls_for("vm.savedisk");
    assert_eq!(
        calls[0].args,
        vec![
            CallArg::Int(11),
            CallArg::Int(0),
            CallArg::Str("golden-image".to_string())
        ]
    );
}
