//! Material schema and material assignment.
//!
//! A material object holds `.material/.shaderNames`, a string array of
//! `target.shaderType`, `shaderName` pairs, plus one compound of shader
//! parameters per shader named `target.shaderType.params`.
//!
//! Any object (a mesh, a face set) is bound to a material by a
//! `.material.assign` string scalar holding the material's path.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::util::{SchemaReader, SchemaWriter};
use super::SchemaView;
use crate::abc::{IObject, IProperty};
use crate::core::{MetaData, Sample};
use crate::ogawa::{OCompoundProperty, OObject};
use crate::util::{DataType, Error, Result};

/// Name of the assignment property.
pub const MATERIAL_ASSIGN: &str = ".material.assign";

const SHADER_NAMES: &str = ".shaderNames";
const PARAMS_SUFFIX: &str = ".params";

fn shader_key(target: &str, shader_type: &str) -> String {
    format!("{target}.{shader_type}")
}

/// Bind `object` to the material at `material_path`.
pub fn assign_material(object: &OObject, material_path: &str) -> Result<()> {
    if !material_path.starts_with('/') {
        return Err(Error::invalid_state(format!(
            "material path {material_path} is not absolute"
        )));
    }
    object
        .properties()
        .add_scalar(MATERIAL_ASSIGN, DataType::STRING, 0, MetaData::new())?
        .set_string(material_path)
}

/// Path of the material bound to `object`, if any.
pub fn material_assignment(object: &IObject) -> Result<Option<String>> {
    let Some(prop) = object.properties()?.find(MATERIAL_ASSIGN)? else {
        return Ok(None);
    };
    let scalar = prop.into_scalar()?;
    if scalar.num_samples() == 0 {
        return Ok(None);
    }
    scalar.string(0).map(Some)
}

/// Material writer.
///
/// Shader names are gathered in memory and written by
/// [`finish`](Self::finish).
pub struct OMaterial {
    base: SchemaWriter,
    shaders: BTreeMap<String, String>,
    params: BTreeMap<String, OCompoundProperty>,
}

impl OMaterial {
    /// Add a material object under `parent`.
    pub fn new(parent: &OObject, name: &str) -> Result<Self> {
        Ok(Self {
            base: SchemaWriter::new(parent, name, SchemaView::Material, 0)?,
            shaders: BTreeMap::new(),
            params: BTreeMap::new(),
        })
    }

    /// The underlying object.
    pub fn object(&self) -> &OObject {
        &self.base.object
    }

    /// Name the shader used for `shader_type` (e.g. `surface`) by
    /// `target` (a renderer).
    pub fn set_shader(&mut self, target: &str, shader_type: &str, shader_name: &str) {
        self.shaders.insert(shader_key(target, shader_type), shader_name.to_string());
    }

    /// Store a constant shader parameter. Single values become scalar
    /// properties, anything longer an array.
    pub fn set_param(&mut self, target: &str, shader_type: &str, name: &str, value: &Sample) -> Result<()> {
        let key = shader_key(target, shader_type) + PARAMS_SUFFIX;
        let compound = match self.params.get(&key) {
            Some(c) => c.clone(),
            None => {
                let c = self.base.schema.add_compound(&key, MetaData::new())?;
                self.params.insert(key, c.clone());
                c
            }
        };
        if value.num_elements() == 1 {
            compound
                .add_scalar(name, value.data_type(), 0, MetaData::new())?
                .set_sample(value)
        } else {
            compound
                .add_array(name, value.data_type(), 0, MetaData::new())?
                .set_sample(value)
        }
    }

    /// Write the shader table.
    pub fn finish(self) -> Result<OObject> {
        let flat: Vec<&str> = self
            .shaders
            .iter()
            .flat_map(|(key, name)| [key.as_str(), name.as_str()])
            .collect();
        self.base
            .schema
            .add_array(SHADER_NAMES, DataType::STRING, 0, MetaData::new())?
            .set_strings(&flat)?;
        Ok(self.base.object)
    }
}

/// Material reader.
#[derive(Clone)]
pub struct IMaterial {
    base: SchemaReader,
    shaders: BTreeMap<String, String>,
}

impl IMaterial {
    /// View `object` through this schema; `TypeMismatch` for any other.
    pub fn new(object: &IObject) -> Result<Self> {
        let base = SchemaReader::open(object, SchemaView::Material)?;
        let mut shaders = BTreeMap::new();
        if let Some(names) = base.opt_array(SHADER_NAMES)? {
            if names.num_samples() > 0 {
                let flat = names.strings(0)?;
                if flat.len() % 2 != 0 {
                    return Err(Error::malformed(format!(
                        "odd shader name table in {}",
                        object.full_name()
                    )));
                }
                for pair in flat.chunks_exact(2) {
                    shaders.insert(pair[0].clone(), pair[1].clone());
                }
            }
        }
        Ok(Self { base, shaders })
    }

    /// The underlying object.
    pub fn object(&self) -> &IObject {
        &self.base.object
    }

    /// Renderer targets with at least one shader, sorted.
    pub fn targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self
            .shaders
            .keys()
            .filter_map(|k| k.split_once('.').map(|(t, _)| t))
            .collect();
        targets.dedup();
        targets
    }

    /// Shader types `target` assigns, sorted.
    pub fn shader_types(&self, target: &str) -> Vec<&str> {
        self.shaders
            .keys()
            .filter_map(|k| k.split_once('.'))
            .filter(|(t, _)| *t == target)
            .map(|(_, ty)| ty)
            .collect()
    }

    /// Shader name for `shader_type` under `target`.
    pub fn shader(&self, target: &str, shader_type: &str) -> Option<&str> {
        self.shaders.get(&shader_key(target, shader_type)).map(String::as_str)
    }

    /// Parameters of one shader by name, empty when it has none.
    pub fn params(&self, target: &str, shader_type: &str) -> Result<BTreeMap<String, Arc<Sample>>> {
        let key = shader_key(target, shader_type) + PARAMS_SUFFIX;
        let Some(compound) = self.base.compound(&key)? else {
            return Ok(BTreeMap::new());
        };
        let mut params = BTreeMap::new();
        for prop in compound.properties()? {
            let name = prop.name().to_string();
            let value = match prop {
                IProperty::Scalar(p) => p.sample(0)?,
                IProperty::Array(p) => p.sample(0)?,
                IProperty::Compound(_) => continue,
            };
            params.insert(name, value);
        }
        Ok(params)
    }
}
