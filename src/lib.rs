//! # Cumulix Client
//!
//! Client-side object model for the Cumulix control plane.
//!
//! Remote resources — hosts, virtual machines, datastores — are exposed
//! as typed, attribute-addressable objects backed by an RPC transport
//! that returns XML payloads. One declarative field schema per entity
//! kind drives a single schema-agnostic coercion engine; fixed ordinal
//! tables decode the state codes the control plane reports.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │      Pool<T>  (refresh / get / iterate)     │
//! │  Host · VirtualMachine · Datastore          │
//! └───────────────┬─────────────────────────────┘
//!                 │ Element + FieldSchema
//!                 ▼
//! ┌───────────────────────┐   ┌─────────────────┐
//! │    Coercion engine    │   │ Transport trait │
//! │  (XmlNode → fields)   │   │  (remote calls) │
//! └───────────────────────┘   └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cumulix_client::{HostPool, MockTransport, Transport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client: Arc<dyn Transport> = Arc::new(MockTransport::new());
//!
//!     let mut hosts = HostPool::new(Arc::clone(&client));
//!     hosts.refresh().await.unwrap();
//!
//!     for host in &hosts {
//!         println!("{} {}", host.name().unwrap_or("?"), host.short_state().unwrap());
//!     }
//! }
//! ```
//!
//! Every operation is a single call-and-wait round trip to the control
//! plane, which owns the real state: lifecycle calls never update local
//! fields, and a pool is a snapshot of its last successful refresh.

pub mod datastore;
pub mod element;
pub mod error;
pub mod host;
pub mod mock;
pub mod pool;
pub mod schema;
pub mod transport;
pub mod vm;
mod xml;

pub use datastore::{Datastore, DatastorePool};
pub use element::Element;
pub use error::{ClientError, Result};
pub use host::{Host, HostPool, HostState};
pub use mock::{MockTransport, RecordedCall};
pub use pool::{Pool, PoolEntity};
pub use schema::{
    CoercionPolicy, FieldDef, FieldMap, FieldRule, FieldSchema, FieldValue, Template,
};
pub use transport::{CallArg, Transport};
pub use vm::{LcmState, MigrateReason, VirtualMachine, VirtualMachinePool, VmState};
pub use xml::XmlNode;
