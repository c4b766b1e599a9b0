//! Property write handles.

use std::sync::Arc;

use super::archive::SharedSession;
use super::session::{PropBody, PropId};
use crate::core::{MetaData, PropertyHeader, Sample};
use crate::util::{DataType, PodElement, Result};

/// Handle to a compound property being written.
#[derive(Clone)]
pub struct OCompoundProperty {
    session: SharedSession,
    id: PropId,
}

impl OCompoundProperty {
    pub(crate) fn new(session: SharedSession, id: PropId) -> Self {
        Self { session, id }
    }

    /// Property name.
    pub fn name(&self) -> String {
        self.session.lock().props[self.id].header.name.clone()
    }

    /// Children added so far.
    pub fn num_properties(&self) -> usize {
        match &self.session.lock().props[self.id].body {
            PropBody::Compound(children) => children.len(),
            PropBody::Leaf(_) => 0,
        }
    }

    fn add(&self, header: PropertyHeader) -> Result<PropId> {
        self.session.lock().add_property(self.id, header)
    }

    /// Add a child compound.
    pub fn add_compound(&self, name: &str, meta: MetaData) -> Result<OCompoundProperty> {
        let id = self.add(PropertyHeader::compound(name, meta))?;
        Ok(Self::new(Arc::clone(&self.session), id))
    }

    /// Add a child scalar property on sampling `time_sampling`.
    pub fn add_scalar(&self, name: &str, data_type: DataType, time_sampling: u32, meta: MetaData) -> Result<OScalarProperty> {
        let id = self.add(PropertyHeader::scalar(name, data_type, time_sampling, meta))?;
        Ok(OScalarProperty {
            session: Arc::clone(&self.session),
            id,
        })
    }

    /// Add a child array property on sampling `time_sampling`.
    pub fn add_array(&self, name: &str, data_type: DataType, time_sampling: u32, meta: MetaData) -> Result<OArrayProperty> {
        let id = self.add(PropertyHeader::array(name, data_type, time_sampling, meta))?;
        Ok(OArrayProperty {
            session: Arc::clone(&self.session),
            id,
        })
    }
}

/// Handle to a scalar property being written.
#[derive(Clone)]
pub struct OScalarProperty {
    session: SharedSession,
    id: PropId,
}

impl OScalarProperty {
    /// Header as it will be stored.
    pub fn header(&self) -> PropertyHeader {
        self.session.lock().props[self.id].header.clone()
    }

    /// Samples appended so far.
    pub fn num_samples(&self) -> usize {
        num_samples(&self.session, self.id)
    }

    /// Append the next sample; it must hold exactly one element.
    pub fn set_sample(&self, sample: &Sample) -> Result<()> {
        self.session.lock().append_sample(self.id, sample)
    }

    /// Append a typed value.
    pub fn set_value<T: PodElement>(&self, value: &T) -> Result<()> {
        self.set_sample(&Sample::from_elements(std::slice::from_ref(value))?)
    }

    /// Append a string value.
    pub fn set_string(&self, value: &str) -> Result<()> {
        self.set_sample(&Sample::from_strings(&[value]))
    }

    /// Append a wide string value.
    pub fn set_wstring(&self, value: &str) -> Result<()> {
        self.set_sample(&Sample::from_wstrings(&[value]))
    }
}

/// Handle to an array property being written.
#[derive(Clone)]
pub struct OArrayProperty {
    session: SharedSession,
    id: PropId,
}

impl OArrayProperty {
    /// Header as it will be stored.
    pub fn header(&self) -> PropertyHeader {
        self.session.lock().props[self.id].header.clone()
    }

    /// Samples appended so far.
    pub fn num_samples(&self) -> usize {
        num_samples(&self.session, self.id)
    }

    /// Append the next sample; element counts may vary between samples.
    pub fn set_sample(&self, sample: &Sample) -> Result<()> {
        self.session.lock().append_sample(self.id, sample)
    }

    /// Append typed values.
    pub fn set_values<T: PodElement>(&self, values: &[T]) -> Result<()> {
        self.set_sample(&Sample::from_elements(values)?)
    }

    /// Append string values.
    pub fn set_strings<S: AsRef<str>>(&self, values: &[S]) -> Result<()> {
        self.set_sample(&Sample::from_strings(values))
    }
}

fn num_samples(session: &SharedSession, id: PropId) -> usize {
    match &session.lock().props[id].body {
        PropBody::Leaf(leaf) => leaf.num_samples() as usize,
        PropBody::Compound(_) => 0,
    }
}
