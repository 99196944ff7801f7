//! Generic resource pool: a homogeneous snapshot of one entity kind.

use std::sync::Arc;

use tracing::debug;

use crate::element::Element;
use crate::error::{ClientError, Result};
use crate::schema::FieldSchema;
use crate::transport::Transport;
use crate::xml::XmlNode;

/// An entity kind that can live in a [`Pool`].
///
/// Implementations supply the wire-exact tag and method names plus the
/// per-child factory; the pool itself is schema-agnostic.
pub trait PoolEntity: Sized + Send + Sync {
    /// Root tag of one entity tree (e.g. `HOST`).
    const ELEMENT_TAG: &'static str;
    /// Root tag of the pool-info response (e.g. `HOST_POOL`).
    const POOL_TAG: &'static str;
    /// Remote method listing the pool (e.g. `hostpool.info`).
    const POOL_INFO_METHOD: &'static str;

    /// The kind's field schema.
    fn schema() -> &'static FieldSchema;

    /// Construct one entity from a pool-info child tree.
    fn from_node(node: XmlNode, client: Arc<dyn Transport>) -> Result<Self>;

    /// The generic element backing this entity.
    fn element(&self) -> &Element;
}

/// Client-side snapshot of all entities of one kind.
///
/// `refresh` wholly replaces the contents — the pool is a snapshot of
/// the last successful listing, not an incrementally updated cache. A
/// pool instance is not synchronized; sharing one across concurrent
/// callers needs external coordination.
pub struct Pool<T: PoolEntity> {
    client: Arc<dyn Transport>,
    elements: Vec<T>,
}

impl<T: PoolEntity> Pool<T> {
    /// Create an empty pool bound to a transport.
    pub fn new(client: Arc<dyn Transport>) -> Self {
        Self {
            client,
            elements: Vec::new(),
        }
    }

    pub(crate) fn client(&self) -> &Arc<dyn Transport> {
        &self.client
    }

    /// Fetch the pool listing and replace the snapshot.
    ///
    /// The new collection is fully constructed before it is published;
    /// on any error the previous snapshot is left in place.
    pub async fn refresh(&mut self) -> Result<()> {
        let payload = self.client.call(T::POOL_INFO_METHOD, &[]).await?;
        let root = XmlNode::parse(&payload)?;
        if root.tag() != T::POOL_TAG {
            return Err(ClientError::Xml(format!(
                "expected <{}> element, got <{}>",
                T::POOL_TAG,
                root.tag()
            )));
        }

        let mut next = Vec::new();
        for child in root.find_all(T::ELEMENT_TAG) {
            next.push(T::from_node(child.clone(), Arc::clone(&self.client))?);
        }

        debug!(
            method = T::POOL_INFO_METHOD,
            count = next.len(),
            "pool refreshed"
        );
        self.elements = next;
        Ok(())
    }

    /// Look up an entity by its integer ID.
    pub fn get(&self, id: i64) -> Option<&T> {
        self.elements.iter().find(|e| e.element().id() == Some(id))
    }

    /// Look up an entity by name.
    ///
    /// Names are not guaranteed unique; the first match in snapshot
    /// order wins. Callers needing disambiguation must use IDs.
    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.elements
            .iter()
            .find(|e| e.element().name() == Some(name))
    }

    /// Iterate the current snapshot in the order the control plane
    /// returned it.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    /// Number of entities in the current snapshot.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the current snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<'a, T: PoolEntity> IntoIterator for &'a Pool<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
