//! Datastore entity and pool.
//!
//! Datastores have no single-entity info call on the wire; a pool
//! refresh is the only way to materialize one. Their schema is lazy:
//! fields coerce on first access rather than at construction.

use std::sync::Arc;

use tracing::debug;

use crate::element::Element;
use crate::error::Result;
use crate::pool::{Pool, PoolEntity};
use crate::schema::{CoercionPolicy, FieldDef, FieldSchema, FieldValue, Template};
use crate::transport::{parse_allocated_id, Transport};
use crate::xml::XmlNode;

static DATASTORE_SCHEMA: FieldSchema = FieldSchema {
    kind: "DATASTORE",
    policy: CoercionPolicy::Lazy,
    fields: &[
        FieldDef::int("id", "ID"),
        FieldDef::string("name", "NAME"),
        FieldDef::int("uid", "UID"),
        FieldDef::int("gid", "GID"),
        FieldDef::string("uname", "UNAME"),
        FieldDef::string("gname", "GNAME"),
        FieldDef::string("ds_mad", "DS_MAD"),
        FieldDef::string("tm_mad", "TM_MAD"),
        FieldDef::string("base_path", "BASE_PATH"),
        FieldDef::int("type", "TYPE"),
        FieldDef::int("disk_type", "DISK_TYPE"),
        FieldDef::int("cluster_id", "CLUSTER_ID"),
        FieldDef::string("cluster", "CLUSTER"),
        FieldDef::int("total_mb", "TOTAL_MB"),
        FieldDef::int("free_mb", "FREE_MB"),
        FieldDef::int("used_mb", "USED_MB"),
        FieldDef::int_list("image_ids", "IMAGES"),
        FieldDef::subtree("template", "TEMPLATE"),
    ],
};

/// One datastore known to the control plane.
#[derive(Debug)]
pub struct Datastore {
    element: Element,
}

impl Datastore {
    pub const ALLOCATE_METHOD: &'static str = "datastore.allocate";
    pub const DELETE_METHOD: &'static str = "datastore.delete";

    /// Register a new datastore from a template and return its
    /// assigned ID.
    pub async fn allocate(client: &Arc<dyn Transport>, template: &str) -> Result<i64> {
        debug!("allocating datastore");
        let payload = client
            .call(Self::ALLOCATE_METHOD, &[template.into()])
            .await?;
        parse_allocated_id(&payload)
    }

    /// Remove the datastore from the control plane.
    pub async fn delete(&self) -> Result<()> {
        self.element.lifecycle_call(Self::DELETE_METHOD, &[]).await
    }

    /// IDs of the images stored here, in document order. Empty when
    /// the record carries no `<IMAGES>` node.
    pub fn image_ids(&self) -> Result<Vec<i64>> {
        Ok(self
            .element
            .get("image_ids")?
            .and_then(FieldValue::as_int_list)
            .map(<[i64]>::to_vec)
            .unwrap_or_default())
    }

    /// The datastore's template structure, if present.
    pub fn template(&self) -> Result<Option<Template>> {
        Ok(match self.element.get("template")? {
            Some(FieldValue::Template(t)) => Some(t.clone()),
            _ => None,
        })
    }

    pub fn id(&self) -> Option<i64> {
        self.element.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.element.name()
    }

    /// The generic element backing this datastore.
    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl std::fmt::Display for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Datastore({})", self.name().unwrap_or("?"))
    }
}

impl PoolEntity for Datastore {
    const ELEMENT_TAG: &'static str = "DATASTORE";
    const POOL_TAG: &'static str = "DATASTORE_POOL";
    const POOL_INFO_METHOD: &'static str = "datastorepool.info";

    fn schema() -> &'static FieldSchema {
        &DATASTORE_SCHEMA
    }

    fn from_node(node: XmlNode, client: Arc<dyn Transport>) -> Result<Self> {
        Ok(Self {
            element: Element::new(node, &DATASTORE_SCHEMA, client)?,
        })
    }

    fn element(&self) -> &Element {
        &self.element
    }
}

/// Pool of all datastores.
pub type DatastorePool = Pool<Datastore>;

impl Pool<Datastore> {
    /// Register a new datastore; the local snapshot is unchanged until
    /// the next refresh.
    pub async fn allocate(&self, template: &str) -> Result<i64> {
        Datastore::allocate(self.client(), template).await
    }
}
