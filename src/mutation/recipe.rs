/*!
# Mutation recipes

Declarative `MutationDefinition`s read from TOML or YAML:

```toml
[[recipes]]
id = "set-library-version"
name = "Set library version"
parameters = [{ name = "version", kind = "string" }]

[[recipes.steps]]
location = [{ step = "configured_by", function = "library" }]
mutation = { kind = "set", property = "version", value = "${version}" }
```

Location steps: `any`, `of_type` (`type`), `configured_by` (`function`). Mutations: `set`,
`unset`, `add_element` (a statement snippet), `add_block_if_absent`. Names are resolved relative to
the type reached by the preceding location steps; after an `any` step every type is searched.
Values and snippets may reference parameters as `${name}`; a value that is exactly `${name}` takes
the argument's typed literal.
*/

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::arguments::{MutationArgumentContainer, MutationParameter, NodeProvider, Provider, ValueProvider};
use super::definition::{MutationDefinition, MutationDefinitionCatalog};
use super::model::{IfNotFoundBehavior, ModelMutation, ModelMutationRequest};
use super::scope::ScopeLocation;
use crate::config::load_structured;
use crate::core::DclError;
use crate::dom::new_nodes::NewNode;
use crate::schema::{AnalysisSchema, FunctionId, FunctionSemantics, PropertyId, TypeId};
use crate::syntax::{parse_nodes, parse_value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeFile {
    #[serde(default)]
    pub recipes: Vec<MutationRecipe>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationRecipe {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<MutationParameter>,
    pub steps: Vec<StepRecipe>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecipe {
    #[serde(default)]
    pub location: Vec<LocationStep>,
    pub mutation: MutationStep,
    #[serde(default)]
    pub if_not_found: NotFoundPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum LocationStep {
    Any,
    OfType {
        #[serde(rename = "type")]
        type_name: String,
    },
    ConfiguredBy {
        function: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationStep {
    Set { property: String, value: String },
    Unset { property: String },
    AddElement { element: String },
    AddBlockIfAbsent { function: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotFoundPolicy {
    #[default]
    Fail,
    Ignore,
}

/// A recipe bound as a `MutationDefinition`.
#[derive(Debug, Clone)]
pub struct RecipeDefinition {
    recipe: MutationRecipe,
}

impl RecipeDefinition {
    pub fn new(recipe: MutationRecipe) -> Self {
        Self { recipe }
    }

    pub fn recipe(&self) -> &MutationRecipe {
        &self.recipe
    }

    /// Resolve every step against the schema.
    pub fn compile(&self, schema: &AnalysisSchema) -> Result<Vec<ModelMutationRequest>, DclError> {
        self.recipe.steps.iter().map(|step| self.compile_step(schema, step)).collect()
    }

    fn compile_step(&self, schema: &AnalysisSchema, step: &StepRecipe) -> Result<ModelMutationRequest, DclError> {
        let (location, end_type) = compile_location(schema, &step.location)?;
        let mutation = match &step.mutation {
            MutationStep::Set { property, value } => ModelMutation::SetPropertyValue {
                property: resolve_property(schema, end_type, property)?,
                value: self.value_provider(value)?,
            },
            MutationStep::Unset { property } => {
                ModelMutation::UnsetProperty { property: resolve_property(schema, end_type, property)? }
            }
            MutationStep::AddElement { element } => ModelMutation::AddNewElement { element: self.node_provider(element)? },
            MutationStep::AddBlockIfAbsent { function } => ModelMutation::AddConfiguringBlockIfAbsent {
                function: resolve_function(schema, end_type, function, |f| {
                    matches!(f, FunctionSemantics::AccessAndConfigure { .. })
                })?,
            },
        };
        let if_not_found = match step.if_not_found {
            NotFoundPolicy::Fail => IfNotFoundBehavior::FailAndReport,
            NotFoundPolicy::Ignore => IfNotFoundBehavior::Ignore,
        };
        Ok(ModelMutationRequest { location, mutation, if_not_found })
    }

    fn parameter(&self, name: &str) -> Result<MutationParameter, DclError> {
        self.recipe
            .parameters
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| DclError::UnresolvedName(format!("${{{}}}", name)))
    }

    fn template_parameters(&self, template: &str) -> Result<Vec<MutationParameter>, DclError> {
        placeholders(template).into_iter().map(|name| self.parameter(name)).collect()
    }

    fn value_provider(&self, text: &str) -> Result<ValueProvider, DclError> {
        let trimmed = text.trim();
        if let [whole] = placeholders(trimmed).as_slice() {
            if trimmed == format!("${{{}}}", whole) {
                let parameter = self.parameter(whole)?;
                return Ok(Provider::argument_based(move |args| Ok(args.require(&parameter)?.to_new_value())));
            }
        }
        let parameters = self.template_parameters(text)?;
        if parameters.is_empty() {
            return Ok(Provider::Constant(parse_value(text)?));
        }
        let template = text.to_string();
        Ok(Provider::argument_based(move |args| parse_value(&substitute(&template, &parameters, args)?)))
    }

    fn node_provider(&self, text: &str) -> Result<NodeProvider, DclError> {
        let parameters = self.template_parameters(text)?;
        if parameters.is_empty() {
            return Ok(Provider::Constant(single_node(text)?));
        }
        let template = text.to_string();
        Ok(Provider::argument_based(move |args| single_node(&substitute(&template, &parameters, args)?)))
    }
}

impl MutationDefinition for RecipeDefinition {
    fn id(&self) -> &str {
        &self.recipe.id
    }

    fn name(&self) -> &str {
        if self.recipe.name.is_empty() { &self.recipe.id } else { &self.recipe.name }
    }

    fn description(&self) -> &str {
        &self.recipe.description
    }

    fn parameters(&self) -> Vec<MutationParameter> {
        self.recipe.parameters.clone()
    }

    fn is_compatible_with_schema(&self, schema: &AnalysisSchema) -> bool {
        self.compile(schema).is_ok()
    }

    fn define_model_mutation_sequence(&self, schema: &AnalysisSchema) -> Vec<ModelMutationRequest> {
        match self.compile(schema) {
            Ok(requests) => requests,
            Err(error) => {
                warn!(id = %self.recipe.id, %error, "recipe does not compile against the schema");
                Vec::new()
            }
        }
    }
}

/// Load every recipe of a `.toml`, `.yaml` or `.yml` file.
pub fn load_recipes<P: AsRef<Path>>(path: P) -> Result<Vec<RecipeDefinition>> {
    let file: RecipeFile = load_structured(path.as_ref(), "mutation recipes")?;
    info!(count = file.recipes.len(), path = %path.as_ref().display(), "mutation recipes loaded");
    Ok(file.recipes.into_iter().map(RecipeDefinition::new).collect())
}

/// Catalog with every recipe of the file registered.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<MutationDefinitionCatalog> {
    let mut catalog = MutationDefinitionCatalog::new();
    for recipe in load_recipes(path)? {
        catalog.register(Arc::new(recipe))?;
    }
    Ok(catalog)
}

fn compile_location(schema: &AnalysisSchema, steps: &[LocationStep]) -> Result<(ScopeLocation, Option<TypeId>), DclError> {
    let mut location = ScopeLocation::from_top_level();
    let mut current = Some(schema.top_level_type());
    for step in steps {
        match step {
            LocationStep::Any => {
                location = location.any_nested();
                current = None;
            }
            LocationStep::OfType { type_name } => {
                let t = schema.type_by_name(type_name).ok_or_else(|| DclError::UnresolvedName(type_name.clone()))?;
                location = location.in_objects_of_type(t);
                current = Some(t);
            }
            LocationStep::ConfiguredBy { function } => {
                let f = resolve_function(schema, current, function, |s| !matches!(s, FunctionSemantics::Pure { .. }))?;
                location = location.in_objects_configured_by(f);
                current = schema.function(f).configured_type();
            }
        }
    }
    Ok((location, current))
}

/// Types searched for a name: the known receiver type, or every type after an `any` step.
fn candidate_types(schema: &AnalysisSchema, receiver: Option<TypeId>) -> Vec<TypeId> {
    match receiver {
        Some(t) => vec![t],
        None => schema.types().map(|(id, _)| id).collect(),
    }
}

fn resolve_property(schema: &AnalysisSchema, receiver: Option<TypeId>, name: &str) -> Result<PropertyId, DclError> {
    candidate_types(schema, receiver)
        .into_iter()
        .find_map(|t| schema.find_property(t, name))
        .ok_or_else(|| DclError::UnresolvedName(name.to_string()))
}

fn resolve_function(
    schema: &AnalysisSchema,
    receiver: Option<TypeId>,
    name: &str,
    accept: impl Fn(FunctionSemantics) -> bool,
) -> Result<FunctionId, DclError> {
    candidate_types(schema, receiver)
        .into_iter()
        .flat_map(|t| schema.functions_named(t, name))
        .find(|f| accept(schema.function(*f).semantics))
        .ok_or_else(|| DclError::UnresolvedName(name.to_string()))
}

/// Parameter names referenced as `${name}`, in order of appearance.
fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        names.push(&after[..end]);
        rest = &after[end + 1..];
    }
    names
}

fn substitute(template: &str, parameters: &[MutationParameter], args: &MutationArgumentContainer) -> Result<String, DclError> {
    let mut text = template.to_string();
    for parameter in parameters {
        let value = args.require(parameter)?;
        text = text.replace(&format!("${{{}}}", parameter.name), &value.raw_text());
    }
    Ok(text)
}

fn single_node(text: &str) -> Result<NewNode, DclError> {
    let mut nodes = parse_nodes(text)?;
    match nodes.len() {
        1 => Ok(nodes.remove(0)),
        n => Err(DclError::InvalidSnippet(format!("expected one statement in '{}', found {}", text, n))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::new_nodes::NewValue;
    use crate::mutation::arguments::ArgumentValue;
    use crate::schema::{DataParameter, SchemaBuilder, ValueType};
    use std::io::Write;
    use tempfile::Builder;

    const RECIPES: &str = r#"
[[recipes]]
id = "set-version"
name = "Set library version"
parameters = [{ name = "version", kind = "string" }]

[[recipes.steps]]
location = [{ step = "configured_by", function = "library" }]
mutation = { kind = "set", property = "version", value = "${version}" }

[[recipes]]
id = "add-dependency"
parameters = [{ name = "id", kind = "string", description = "coordinates" }]

[[recipes.steps]]
mutation = { kind = "add_block_if_absent", function = "library" }

[[recipes.steps]]
location = [{ step = "of_type", type = "Library" }]
mutation = { kind = "add_element", element = "dependency(\"${id}\")" }
if_not_found = "ignore"

[[recipes]]
id = "broken"

[[recipes.steps]]
location = [{ step = "any" }]
mutation = { kind = "unset", property = "nonexistent" }
"#;

    fn schema() -> AnalysisSchema {
        let mut b = SchemaBuilder::new("Project");
        let top = b.top_level();
        let library = b.data_type("Library");
        let dep = b.data_type("Dependency");
        b.configuring_function(top, "library", library);
        b.property(library, "version", ValueType::String);
        b.adding_function(library, "dependency", vec![DataParameter::new("id", ValueType::String)], dep, true);
        b.build()
    }

    fn recipes() -> Vec<RecipeDefinition> {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(RECIPES.as_bytes()).unwrap();
        load_recipes(file.path()).unwrap()
    }

    #[test]
    fn loads_and_compiles_recipes() {
        let schema = schema();
        let recipes = recipes();
        assert_eq!(recipes.len(), 3);
        assert_eq!(recipes[0].name(), "Set library version");
        assert_eq!(recipes[1].name(), "add-dependency");

        assert!(recipes[0].is_compatible_with_schema(&schema));
        assert!(recipes[1].is_compatible_with_schema(&schema));
        assert!(!recipes[2].is_compatible_with_schema(&schema));
        assert!(recipes[2].define_model_mutation_sequence(&schema).is_empty());

        let steps = recipes[1].compile(&schema).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].if_not_found, IfNotFoundBehavior::Ignore);
        assert_eq!(steps[0].location, ScopeLocation::from_top_level());
    }

    #[test]
    fn parameters_feed_value_and_element_providers() {
        let schema = schema();
        let recipes = recipes();
        let args = MutationArgumentContainer::new()
            .with("version", ArgumentValue::String("2.0".into()))
            .with("id", ArgumentValue::String("org:lib".into()));

        let set = recipes[0].compile(&schema).unwrap();
        match &set[0].mutation {
            ModelMutation::SetPropertyValue { value, .. } => {
                assert_eq!(value.evaluate(&args).unwrap(), NewValue::string("2.0"));
                assert!(value.evaluate(&MutationArgumentContainer::new()).is_err());
            }
            other => panic!("unexpected mutation {:?}", other),
        }

        let add = recipes[1].compile(&schema).unwrap();
        match &add[1].mutation {
            ModelMutation::AddNewElement { element } => {
                assert_eq!(element.evaluate(&args).unwrap(), NewNode::call("dependency", vec![NewValue::string("org:lib")]));
            }
            other => panic!("unexpected mutation {:?}", other),
        }
    }

    #[test]
    fn undeclared_placeholders_and_bad_snippets_are_rejected() {
        let schema = schema();
        let recipe = |mutation: MutationStep| {
            RecipeDefinition::new(MutationRecipe {
                id: "r".into(),
                name: String::new(),
                description: String::new(),
                parameters: Vec::new(),
                steps: vec![StepRecipe { location: Vec::new(), mutation, if_not_found: NotFoundPolicy::Fail }],
            })
        };
        let undeclared = recipe(MutationStep::AddElement { element: "x = ${missing}".into() });
        assert_eq!(undeclared.compile(&schema).unwrap_err(), DclError::UnresolvedName("${missing}".into()));
        let two = recipe(MutationStep::AddElement { element: "a = 1\nb = 2".into() });
        assert!(matches!(two.compile(&schema), Err(DclError::InvalidSnippet(_))));
        assert_eq!(placeholders("a${x}b${y}"), vec!["x", "y"]);
    }

    #[test]
    fn duplicate_ids_fail_catalog_loading() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        let yaml = "recipes:\n  - id: a\n    steps: []\n  - id: a\n    steps: []\n";
        file.write_all(yaml.as_bytes()).unwrap();
        let error = load_catalog(file.path()).unwrap_err();
        assert!(error.to_string().contains("already registered"));
    }
}
