//! Object write handle.

use std::sync::Arc;

use super::archive::SharedSession;
use super::property::OCompoundProperty;
use super::session::ObjectId;
use crate::core::MetaData;
use crate::util::{Error, Result};

/// Handle to an object being written. Cheap to clone.
#[derive(Clone)]
pub struct OObject {
    session: SharedSession,
    id: ObjectId,
}

impl OObject {
    pub(crate) fn new(session: SharedSession, id: ObjectId) -> Self {
        Self { session, id }
    }

    /// Object name.
    pub fn name(&self) -> String {
        self.session.lock().objects[self.id].name.clone()
    }

    /// Full path of the object.
    pub fn full_name(&self) -> String {
        self.session.lock().objects[self.id].full_name.clone()
    }

    /// Metadata the object was created with.
    pub fn meta_data(&self) -> MetaData {
        self.session.lock().objects[self.id].meta.clone()
    }

    /// Parent object; `None` for the top.
    pub fn parent(&self) -> Option<OObject> {
        let parent = self.session.lock().objects[self.id].parent?;
        Some(Self::new(Arc::clone(&self.session), parent))
    }

    /// Children added so far.
    pub fn num_children(&self) -> usize {
        self.session.lock().objects[self.id].children.len()
    }

    /// True for handles returned by `add_child_instance`.
    pub fn is_instance_root(&self) -> bool {
        self.session.lock().objects[self.id].instance_of.is_some()
    }

    /// Create a child. Sibling names must be unique.
    pub fn add_child(&self, name: &str, meta: MetaData) -> Result<OObject> {
        let id = self.session.lock().add_object(self.id, name, meta)?;
        Ok(Self::new(Arc::clone(&self.session), id))
    }

    /// Create a child that aliases `source`'s subtree. No storage is
    /// duplicated; the instance root records the source path only.
    pub fn add_child_instance(&self, source: &OObject, name: &str) -> Result<OObject> {
        if !Arc::ptr_eq(&self.session, &source.session) {
            return Err(Error::invalid_state("instance source belongs to another archive"));
        }
        let id = self.session.lock().add_instance(self.id, source.id, name)?;
        Ok(Self::new(Arc::clone(&self.session), id))
    }

    /// The object's top-level compound property.
    pub fn properties(&self) -> OCompoundProperty {
        let props = self.session.lock().objects[self.id].properties;
        OCompoundProperty::new(Arc::clone(&self.session), props)
    }
}

impl std::fmt::Debug for OObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OObject").field(&self.full_name()).finish()
    }
}
