//! Serialisable schema definition (TOML/YAML) and its conversion into an `AnalysisSchema`.
//!
//! ```toml
//! top_level = "Project"
//!
//! [[types]]
//! name = "Project"
//! properties = [{ name = "version", type = "String", default = true }]
//! functions = [{ name = "library", kind = "configure", type = "Library" }]
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::{AnalysisSchema, DataParameter, SchemaBuilder, TypeId, ValueType};
use crate::core::DclError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub top_level: String,
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default)]
    pub supertypes: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
    #[serde(default)]
    pub functions: Vec<FunctionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Configure,
    Add,
    Factory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub kind: FunctionKind,
    /// Configured/added type for `configure`/`add`, returned type for `factory`
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    #[serde(default = "default_true")]
    pub accepts_block: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
}

fn default_true() -> bool {
    true
}

impl SchemaDefinition {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::config::load_structured(path.as_ref(), "schema definition")
    }

    /// Two passes: declare every type, then attach members and supertypes.
    pub fn to_schema(&self) -> Result<AnalysisSchema, DclError> {
        let mut seen = HashSet::new();
        for t in &self.types {
            if !seen.insert(t.name.as_str()) {
                return Err(DclError::InvalidSchema(format!("type '{}' is declared twice", t.name)));
            }
        }

        let mut builder = SchemaBuilder::new(self.top_level.clone());
        for t in &self.types {
            builder.data_type(t.name.clone());
        }
        if !seen.contains(self.top_level.as_str()) {
            return Err(DclError::InvalidSchema(format!(
                "top-level type '{}' has no declaration",
                self.top_level
            )));
        }

        for t in &self.types {
            let owner = lookup_type(&builder, &t.name)?;
            for sup in &t.supertypes {
                let sup_id = lookup_type(&builder, sup)?;
                builder.supertype(owner, sup_id);
            }
            for p in &t.properties {
                let vt = parse_value_type(&builder, &p.value_type)?;
                if p.default {
                    builder.property_with_default(owner, p.name.clone(), vt);
                } else {
                    builder.property(owner, p.name.clone(), vt);
                }
            }
            for f in &t.functions {
                let parameters = f
                    .parameters
                    .iter()
                    .map(|p| parse_value_type(&builder, &p.value_type).map(|vt| DataParameter::new(p.name.clone(), vt)))
                    .collect::<Result<Vec<_>, DclError>>()?;
                match f.kind {
                    FunctionKind::Configure => {
                        if !parameters.is_empty() {
                            return Err(DclError::InvalidSchema(format!(
                                "configuring function '{}.{}' cannot take parameters",
                                t.name, f.name
                            )));
                        }
                        let configured = lookup_type(&builder, &f.value_type)?;
                        builder.configuring_function(owner, f.name.clone(), configured);
                    }
                    FunctionKind::Add => {
                        let added = lookup_type(&builder, &f.value_type)?;
                        builder.adding_function(owner, f.name.clone(), parameters, added, f.accepts_block);
                    }
                    FunctionKind::Factory => {
                        let returned = parse_value_type(&builder, &f.value_type)?;
                        builder.value_factory(owner, f.name.clone(), parameters, returned);
                    }
                }
            }
        }
        Ok(builder.build())
    }
}

fn lookup_type(builder: &SchemaBuilder, name: &str) -> Result<TypeId, DclError> {
    builder.type_id(name).ok_or_else(|| DclError::UnknownType(name.to_string()))
}

fn parse_value_type(builder: &SchemaBuilder, name: &str) -> Result<ValueType, DclError> {
    Ok(match name {
        "String" => ValueType::String,
        "Int" => ValueType::Int,
        "Long" => ValueType::Long,
        "Boolean" => ValueType::Boolean,
        "Unit" => ValueType::Unit,
        other => ValueType::Data(lookup_type(builder, other)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FunctionSemantics;
    use std::io::Write;

    const SCHEMA: &str = r#"
top_level = "Project"

[[types]]
name = "Project"
properties = [{ name = "version", type = "String", default = true }]
functions = [
    { name = "library", kind = "configure", type = "Library" },
    { name = "dependency", kind = "add", type = "Dependency", parameters = [{ name = "id", type = "String" }] },
]

[[types]]
name = "Library"
supertypes = ["Component"]
functions = [{ name = "coords", kind = "factory", type = "Coordinates", parameters = [{ name = "g", type = "String" }] }]

[[types]]
name = "Component"
properties = [{ name = "name", type = "String" }]

[[types]]
name = "Dependency"

[[types]]
name = "Coordinates"
"#;

    #[test]
    fn toml_definition_builds_schema() {
        let def: SchemaDefinition = toml::from_str(SCHEMA).unwrap();
        let schema = def.to_schema().unwrap();
        let top = schema.top_level_type();
        assert_eq!(schema.type_name(top), "Project");
        let lib = schema.type_by_name("Library").unwrap();
        let component = schema.type_by_name("Component").unwrap();
        assert!(schema.is_subtype_of(lib, component));
        assert!(schema.find_property(lib, "name").is_some());

        let add = schema.find_function(top, "dependency", 1).unwrap();
        assert!(matches!(schema.function(add).semantics, FunctionSemantics::AddAndConfigure { accepts_block: true, .. }));
        let version = schema.find_property(top, "version").unwrap();
        assert!(schema.property(version).has_default_value);
    }

    #[test]
    fn unknown_types_are_reported() {
        let def: SchemaDefinition = toml::from_str(
            "top_level = \"P\"\n[[types]]\nname = \"P\"\nproperties = [{ name = \"x\", type = \"Missing\" }]",
        )
        .unwrap();
        assert_eq!(def.to_schema().unwrap_err(), DclError::UnknownType("Missing".into()));
    }

    #[test]
    fn undeclared_top_level_is_invalid() {
        let def: SchemaDefinition = toml::from_str("top_level = \"P\"\n[[types]]\nname = \"Q\"").unwrap();
        assert!(matches!(def.to_schema(), Err(DclError::InvalidSchema(_))));
    }

    #[test]
    fn yaml_definition_loads_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(
            file,
            "top_level: Project\ntypes:\n  - name: Project\n    properties:\n      - {{ name: flag, type: Boolean }}"
        )
        .unwrap();
        let schema = SchemaDefinition::load_from_file(file.path()).unwrap().to_schema().unwrap();
        assert!(schema.find_property(schema.top_level_type(), "flag").is_some());
    }
}
