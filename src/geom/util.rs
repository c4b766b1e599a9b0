//! Shared plumbing for schema writers and readers.

use super::geom_param::OGeomParam;
use super::SchemaView;
use crate::abc::{IArrayProperty, ICompoundProperty, IObject, IScalarProperty};
use crate::core::{MetaData, Sample};
use crate::ogawa::{OArrayProperty, OCompoundProperty, OObject, OScalarProperty};
use crate::util::{DataType, Error, PodElement, Result};

/// Compound of arbitrary geometry parameters.
pub const ARB_GEOM_PARAMS: &str = ".arbGeomParams";
/// Compound of user properties.
pub const USER_PROPERTIES: &str = ".userProperties";

/// An object tagged with a schema plus its schema compound.
pub(crate) struct SchemaWriter {
    pub object: OObject,
    pub schema: OCompoundProperty,
    pub time_sampling: u32,
    /// Samples written so far.
    pub num_samples: usize,
    arb_geom_params: Option<OCompoundProperty>,
    user_properties: Option<OCompoundProperty>,
}

impl SchemaWriter {
    /// Add the object and its schema compound.
    pub fn new(parent: &OObject, name: &str, view: SchemaView, time_sampling: u32) -> Result<Self> {
        let object = parent.add_child(name, view.object_meta())?;
        let schema = object.properties().add_compound(view.compound(), view.compound_meta())?;
        Ok(Self {
            object,
            schema,
            time_sampling,
            num_samples: 0,
            arb_geom_params: None,
            user_properties: None,
        })
    }

    /// `.arbGeomParams`, created on first use.
    pub fn arb_geom_params(&mut self) -> Result<&OCompoundProperty> {
        lazy_compound(&self.schema, &mut self.arb_geom_params, ARB_GEOM_PARAMS)
    }

    /// `.userProperties`, created on first use.
    pub fn user_properties(&mut self) -> Result<&OCompoundProperty> {
        lazy_compound(&self.schema, &mut self.user_properties, USER_PROPERTIES)
    }

    /// A scalar in the schema compound on the schema sampling.
    pub fn scalar(&self, name: &str, data_type: DataType, meta: MetaData) -> Result<OScalarProperty> {
        self.schema.add_scalar(name, data_type, self.time_sampling, meta)
    }

    /// An array in the schema compound on the schema sampling.
    pub fn array(&self, name: &str, data_type: DataType, meta: MetaData) -> Result<OArrayProperty> {
        self.schema.add_array(name, data_type, self.time_sampling, meta)
    }

    /// An optional array, created the first time a sample sets it. Earlier
    /// samples read back as empty.
    pub fn optional_array<'a>(
        &self,
        slot: &'a mut Option<OArrayProperty>,
        name: &str,
        data_type: DataType,
        meta: MetaData,
    ) -> Result<&'a OArrayProperty> {
        if slot.is_none() {
            let prop = self.array(name, data_type, meta)?;
            let empty = Sample::decode(data_type, &[])?;
            for _ in 0..self.num_samples {
                prop.set_sample(&empty)?;
            }
            *slot = Some(prop);
        }
        slot.as_ref().ok_or_else(|| Error::invalid_state(format!("{name} was not created")))
    }

    /// An optional geometry parameter built by `create`, back-filled the
    /// same way as [`optional_array`](Self::optional_array).
    pub fn optional_param<'a, T, F>(&self, slot: &'a mut Option<OGeomParam<T>>, create: F) -> Result<&'a OGeomParam<T>>
    where
        T: PodElement,
        F: FnOnce(&OCompoundProperty, u32) -> Result<OGeomParam<T>>,
    {
        if slot.is_none() {
            let param = create(&self.schema, self.time_sampling)?;
            param.fill_empty(self.num_samples)?;
            *slot = Some(param);
        }
        slot.as_ref().ok_or_else(|| Error::invalid_state("geometry parameter was not created"))
    }
}

fn lazy_compound<'a>(
    schema: &OCompoundProperty,
    slot: &'a mut Option<OCompoundProperty>,
    name: &str,
) -> Result<&'a OCompoundProperty> {
    if slot.is_none() {
        *slot = Some(schema.add_compound(name, MetaData::new())?);
    }
    slot.as_ref().ok_or_else(|| Error::invalid_state(format!("{name} was not created")))
}

/// Standard metadata of bounds properties.
pub(crate) fn bounds_meta() -> MetaData {
    MetaData::new().with(MetaData::INTERPRETATION, "box")
}

/// An object checked against a schema, plus its schema compound.
#[derive(Clone)]
pub(crate) struct SchemaReader {
    pub object: IObject,
    pub schema: ICompoundProperty,
}

impl SchemaReader {
    /// Check `object` against `view` and open its schema compound.
    pub fn open(object: &IObject, view: SchemaView) -> Result<Self> {
        if SchemaView::of(object) != Some(view) {
            return Err(Error::type_mismatch(view.tag(), object.schema().unwrap_or("no schema")));
        }
        let schema = object.properties()?.compound(view.compound())?;
        Ok(Self {
            object: object.clone(),
            schema,
        })
    }

    pub fn array(&self, name: &str) -> Result<IArrayProperty> {
        self.schema.array(name)
    }

    pub fn scalar(&self, name: &str) -> Result<IScalarProperty> {
        self.schema.scalar(name)
    }

    /// Array `name`, if present.
    pub fn opt_array(&self, name: &str) -> Result<Option<IArrayProperty>> {
        self.schema.find(name)?.map(|p| p.into_array()).transpose()
    }

    /// Scalar `name`, if present.
    pub fn opt_scalar(&self, name: &str) -> Result<Option<IScalarProperty>> {
        self.schema.find(name)?.map(|p| p.into_scalar()).transpose()
    }

    /// Compound `name`, if present.
    pub fn compound(&self, name: &str) -> Result<Option<ICompoundProperty>> {
        self.schema.find(name)?.map(|p| p.into_compound()).transpose()
    }

    pub fn arb_geom_params(&self) -> Result<Option<ICompoundProperty>> {
        self.compound(ARB_GEOM_PARAMS)
    }

    pub fn user_properties(&self) -> Result<Option<ICompoundProperty>> {
        self.compound(USER_PROPERTIES)
    }
}

/// Values of an optional array at `index`, empty arrays reading as absent.
pub(crate) fn read_optional<T: PodElement>(
    prop: &Option<IArrayProperty>,
    index: usize,
) -> Result<Option<Vec<T>>> {
    match prop {
        Some(p) if p.num_samples() > 0 => {
            let values = p.values::<T>(index)?;
            Ok((!values.is_empty()).then_some(values))
        }
        _ => Ok(None),
    }
}
