//! Generic resource element: one addressable entity instance.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::schema::{coerce_fields, CoercionPolicy, FieldMap, FieldSchema, FieldValue};
use crate::transport::{CallArg, Transport};
use crate::xml::XmlNode;

/// One entity instance: an exclusively-owned parsed tree, the kind's
/// field schema, and a shared transport handle for lifecycle calls.
///
/// The tree is the source of truth. Fields are materialized from it
/// according to the schema's [`CoercionPolicy`] — at construction for
/// eager kinds, on first access for lazy ones — and the materialized
/// map is discarded whenever the tree is replaced by a refresh, so it
/// can never go stale or merge with previous values.
pub struct Element {
    root: XmlNode,
    schema: &'static FieldSchema,
    client: Arc<dyn Transport>,
    values: OnceCell<FieldMap>,
}

impl Element {
    /// Wrap a parsed entity tree.
    ///
    /// Fails if the root tag is not the schema's kind, or (for eager
    /// schemas) if coercion fails.
    pub fn new(
        root: XmlNode,
        schema: &'static FieldSchema,
        client: Arc<dyn Transport>,
    ) -> Result<Self> {
        if root.tag() != schema.kind {
            return Err(ClientError::Xml(format!(
                "expected <{}> element, got <{}>",
                schema.kind,
                root.tag()
            )));
        }

        let element = Self {
            root,
            schema,
            client,
            values: OnceCell::new(),
        };
        if element.schema.policy == CoercionPolicy::Eager {
            element.coerce()?;
        }
        Ok(element)
    }

    /// Integer identity from the `ID` child, if assigned yet.
    pub fn id(&self) -> Option<i64> {
        self.root.text_of("ID").and_then(|t| t.trim().parse().ok())
    }

    /// Entity name from the `NAME` child, if present.
    pub fn name(&self) -> Option<&str> {
        self.root.text_of("NAME")
    }

    /// The underlying parsed tree.
    pub fn root(&self) -> &XmlNode {
        &self.root
    }

    /// The kind's field schema.
    pub fn schema(&self) -> &'static FieldSchema {
        self.schema
    }

    pub(crate) fn client(&self) -> &Arc<dyn Transport> {
        &self.client
    }

    /// Materialize the field map from the currently held tree.
    ///
    /// Idempotent: repeated calls against an unchanged tree return the
    /// same mapping. Replacing the tree resets the map, so the next
    /// call re-derives from scratch.
    pub fn coerce(&self) -> Result<&FieldMap> {
        self.values
            .get_or_try_init(|| coerce_fields(&self.root, self.schema))
    }

    /// Read a declared field.
    ///
    /// Returns `Ok(None)` for a declared field the tree does not carry;
    /// requesting an undeclared name is a programmer error.
    pub fn get(&self, name: &str) -> Result<Option<&FieldValue>> {
        if !self.schema.declares(name) {
            return Err(ClientError::UnknownField(name.to_string()));
        }
        Ok(self.coerce()?.get(name))
    }

    /// Integer value of a declared field, if set.
    pub fn int_field(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.get(name)?.and_then(FieldValue::as_int))
    }

    /// String value of a declared field, if set.
    pub fn str_field(&self, name: &str) -> Result<Option<&str>> {
        Ok(self.get(name)?.and_then(FieldValue::as_str))
    }

    /// The element's ID, or the error every lifecycle call raises when
    /// allocation has not completed yet.
    pub(crate) fn require_id(&self) -> Result<i64> {
        self.id().ok_or(ClientError::FieldNotSet("ID"))
    }

    /// Issue one lifecycle call carrying this element's ID plus any
    /// operation-specific arguments. The materialized fields are left
    /// untouched; callers refresh explicitly to observe the effect.
    pub(crate) async fn lifecycle_call(&self, method: &str, extra: &[CallArg]) -> Result<()> {
        let id = self.require_id()?;
        let mut args = Vec::with_capacity(extra.len() + 1);
        args.push(CallArg::Int(id));
        args.extend_from_slice(extra);
        debug!(method, id, "issuing lifecycle call");
        self.client.call(method, &args).await?;
        Ok(())
    }

    /// Re-fetch this entity via its single-entity info call, replacing
    /// the held tree and re-deriving fields per the schema policy.
    pub(crate) async fn refresh_via(&mut self, method: &str) -> Result<()> {
        let id = self.require_id()?;
        debug!(method, id, "refreshing element");
        let payload = self.client.call(method, &[CallArg::Int(id)]).await?;
        let root = XmlNode::parse(&payload)?;
        if root.tag() != self.schema.kind {
            return Err(ClientError::Xml(format!(
                "expected <{}> element, got <{}>",
                self.schema.kind,
                root.tag()
            )));
        }
        self.root = root;
        self.values = OnceCell::new();
        if self.schema.policy == CoercionPolicy::Eager {
            self.coerce()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("kind", &self.schema.kind)
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
