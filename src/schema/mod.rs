/*!
# Analysis schema

Opaque description of the types, properties and functions a document may use. The query and
mutation core only compares identities (`TypeId`, `PropertyId`, `FunctionId`) and asks for subtype
relations; names are used by the reference resolver and by recipe files.

Иерархия типов хранится в `petgraph::DiGraph` (ребро супертип -> подтип).
*/

pub mod definition;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

/// Type of a property value or function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Int,
    Long,
    Boolean,
    Unit,
    Data(TypeId),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "String"),
            ValueType::Int => write!(f, "Int"),
            ValueType::Long => write!(f, "Long"),
            ValueType::Boolean => write!(f, "Boolean"),
            ValueType::Unit => write!(f, "Unit"),
            ValueType::Data(t) => write!(f, "Data#{}", t.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataType {
    pub name: String,
    pub supertypes: Vec<TypeId>,
    pub properties: Vec<PropertyId>,
    pub functions: Vec<FunctionId>,
}

#[derive(Debug, Clone)]
pub struct DataProperty {
    pub name: String,
    pub owner: TypeId,
    pub value_type: ValueType,
    /// Свойство имеет значение по умолчанию (в этом случае отсутствие присваивания не ошибка).
    pub has_default_value: bool,
}

#[derive(Debug, Clone)]
pub struct DataParameter {
    pub name: String,
    pub value_type: ValueType,
}

impl DataParameter {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self { name: name.into(), value_type }
    }
}

/// What a call of a function does to its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionSemantics {
    /// `name { ... }` configures an existing nested object of `configured_type`.
    AccessAndConfigure { configured_type: TypeId },
    /// `name(args) { ... }` adds a new object of `added_type` to the receiver.
    AddAndConfigure { added_type: TypeId, accepts_block: bool },
    /// Value factory `name(args)` usable on the right-hand side of assignments.
    Pure { returned: ValueType },
}

#[derive(Debug, Clone)]
pub struct DataFunction {
    pub name: String,
    pub receiver: TypeId,
    pub parameters: Vec<DataParameter>,
    pub semantics: FunctionSemantics,
}

impl DataFunction {
    /// Type of the object a block of this function configures, if any.
    pub fn configured_type(&self) -> Option<TypeId> {
        match self.semantics {
            FunctionSemantics::AccessAndConfigure { configured_type } => Some(configured_type),
            FunctionSemantics::AddAndConfigure { added_type, .. } => Some(added_type),
            FunctionSemantics::Pure { .. } => None,
        }
    }

    pub fn is_value_factory(&self) -> bool {
        matches!(self.semantics, FunctionSemantics::Pure { .. })
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisSchema {
    top_level_type: TypeId,
    types: Vec<DataType>,
    properties: Vec<DataProperty>,
    functions: Vec<DataFunction>,
    type_names: HashMap<String, TypeId>,
    hierarchy: DiGraph<TypeId, ()>,
}

impl AnalysisSchema {
    pub fn top_level_type(&self) -> TypeId { self.top_level_type }
    pub fn data_type(&self, id: TypeId) -> &DataType { &self.types[id.0 as usize] }
    pub fn property(&self, id: PropertyId) -> &DataProperty { &self.properties[id.0 as usize] }
    pub fn function(&self, id: FunctionId) -> &DataFunction { &self.functions[id.0 as usize] }
    pub fn type_name(&self, id: TypeId) -> &str { &self.data_type(id).name }
    pub fn type_by_name(&self, name: &str) -> Option<TypeId> { self.type_names.get(name).copied() }
    pub fn types(&self) -> impl Iterator<Item = (TypeId, &DataType)> {
        self.types.iter().enumerate().map(|(i, t)| (TypeId(i as u32), t))
    }

    /// `sub` is `sup` or (transitively) declares it as a supertype.
    pub fn is_subtype_of(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        has_path_connecting(
            &self.hierarchy,
            NodeIndex::new(sup.0 as usize),
            NodeIndex::new(sub.0 as usize),
            None,
        )
    }

    /// The type itself followed by its supertypes in breadth-first declaration order.
    pub fn type_and_supertypes(&self, id: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(t) = queue.pop_front() {
            if !seen.insert(t) {
                continue;
            }
            out.push(t);
            queue.extend(self.data_type(t).supertypes.iter().copied());
        }
        out
    }

    /// Property declared on the type or inherited from a supertype.
    pub fn find_property(&self, receiver: TypeId, name: &str) -> Option<PropertyId> {
        self.type_and_supertypes(receiver).into_iter().find_map(|t| {
            self.data_type(t).properties.iter().copied().find(|p| self.property(*p).name == name)
        })
    }

    /// Function with the given name and arity, searched along the supertype chain.
    pub fn find_function(&self, receiver: TypeId, name: &str, arity: usize) -> Option<FunctionId> {
        self.functions_named(receiver, name).into_iter().find(|f| self.function(*f).parameters.len() == arity)
    }

    pub fn functions_named(&self, receiver: TypeId, name: &str) -> Vec<FunctionId> {
        self.type_and_supertypes(receiver)
            .into_iter()
            .flat_map(|t| self.data_type(t).functions.iter().copied())
            .filter(|f| self.function(*f).name == name)
            .collect()
    }
}

/// Построитель схемы. Идентификаторы выдаются по порядку добавления.
pub struct SchemaBuilder {
    top_level_type: TypeId,
    types: Vec<DataType>,
    properties: Vec<DataProperty>,
    functions: Vec<DataFunction>,
    type_names: HashMap<String, TypeId>,
}

impl SchemaBuilder {
    pub fn new(top_level_name: impl Into<String>) -> Self {
        let mut builder = Self {
            top_level_type: TypeId(0),
            types: Vec::new(),
            properties: Vec::new(),
            functions: Vec::new(),
            type_names: HashMap::new(),
        };
        builder.top_level_type = builder.data_type(top_level_name);
        builder
    }

    pub fn top_level(&self) -> TypeId { self.top_level_type }
    pub fn type_id(&self, name: &str) -> Option<TypeId> { self.type_names.get(name).copied() }

    /// Returns the existing id when a type with this name was already declared.
    pub fn data_type(&mut self, name: impl Into<String>) -> TypeId {
        let name = name.into();
        if let Some(id) = self.type_names.get(&name) {
            return *id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(DataType { name: name.clone(), supertypes: Vec::new(), properties: Vec::new(), functions: Vec::new() });
        self.type_names.insert(name, id);
        id
    }

    pub fn supertype(&mut self, ty: TypeId, supertype: TypeId) -> &mut Self {
        let supers = &mut self.types[ty.0 as usize].supertypes;
        if ty != supertype && !supers.contains(&supertype) {
            supers.push(supertype);
        }
        self
    }

    pub fn property(&mut self, owner: TypeId, name: impl Into<String>, value_type: ValueType) -> PropertyId {
        self.add_property(owner, name.into(), value_type, false)
    }

    pub fn property_with_default(&mut self, owner: TypeId, name: impl Into<String>, value_type: ValueType) -> PropertyId {
        self.add_property(owner, name.into(), value_type, true)
    }

    fn add_property(&mut self, owner: TypeId, name: String, value_type: ValueType, has_default_value: bool) -> PropertyId {
        let id = PropertyId(self.properties.len() as u32);
        self.properties.push(DataProperty { name, owner, value_type, has_default_value });
        self.types[owner.0 as usize].properties.push(id);
        id
    }

    pub fn configuring_function(&mut self, receiver: TypeId, name: impl Into<String>, configured_type: TypeId) -> FunctionId {
        self.add_function(receiver, name.into(), Vec::new(), FunctionSemantics::AccessAndConfigure { configured_type })
    }

    pub fn adding_function(
        &mut self,
        receiver: TypeId,
        name: impl Into<String>,
        parameters: Vec<DataParameter>,
        added_type: TypeId,
        accepts_block: bool,
    ) -> FunctionId {
        self.add_function(receiver, name.into(), parameters, FunctionSemantics::AddAndConfigure { added_type, accepts_block })
    }

    pub fn value_factory(
        &mut self,
        receiver: TypeId,
        name: impl Into<String>,
        parameters: Vec<DataParameter>,
        returned: ValueType,
    ) -> FunctionId {
        self.add_function(receiver, name.into(), parameters, FunctionSemantics::Pure { returned })
    }

    fn add_function(&mut self, receiver: TypeId, name: String, parameters: Vec<DataParameter>, semantics: FunctionSemantics) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(DataFunction { name, receiver, parameters, semantics });
        self.types[receiver.0 as usize].functions.push(id);
        id
    }

    pub fn build(self) -> AnalysisSchema {
        let mut hierarchy = DiGraph::new();
        for i in 0..self.types.len() {
            hierarchy.add_node(TypeId(i as u32));
        }
        for (i, t) in self.types.iter().enumerate() {
            for sup in &t.supertypes {
                hierarchy.add_edge(NodeIndex::new(sup.0 as usize), NodeIndex::new(i), ());
            }
        }
        tracing::debug!(
            types = self.types.len(),
            properties = self.properties.len(),
            functions = self.functions.len(),
            "schema built"
        );
        AnalysisSchema {
            top_level_type: self.top_level_type,
            types: self.types,
            properties: self.properties,
            functions: self.functions,
            type_names: self.type_names,
            hierarchy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (AnalysisSchema, TypeId, TypeId, TypeId) {
        let mut b = SchemaBuilder::new("Project");
        let base = b.data_type("Named");
        let lib = b.data_type("Library");
        let app = b.data_type("Application");
        b.supertype(lib, base);
        b.supertype(app, lib);
        b.property(base, "name", ValueType::String);
        b.property_with_default(lib, "version", ValueType::String);
        (b.build(), base, lib, app)
    }

    #[test]
    fn subtype_relation_is_transitive_and_reflexive() {
        let (schema, base, lib, app) = sample();
        assert!(schema.is_subtype_of(app, base));
        assert!(schema.is_subtype_of(app, lib));
        assert!(schema.is_subtype_of(lib, lib));
        assert!(!schema.is_subtype_of(base, app));
    }

    #[test]
    fn properties_are_inherited() {
        let (schema, base, _, app) = sample();
        let name = schema.find_property(app, "name").unwrap();
        assert_eq!(schema.property(name).owner, base);
        assert!(schema.find_property(base, "version").is_none());
        assert!(schema.property(schema.find_property(app, "version").unwrap()).has_default_value);
    }

    #[test]
    fn functions_match_by_arity() {
        let mut b = SchemaBuilder::new("Project");
        let top = b.top_level();
        let dep = b.data_type("Dependency");
        let one = b.adding_function(top, "dep", vec![DataParameter::new("id", ValueType::String)], dep, true);
        let two = b.adding_function(
            top,
            "dep",
            vec![DataParameter::new("group", ValueType::String), DataParameter::new("id", ValueType::String)],
            dep,
            true,
        );
        let schema = b.build();
        assert_eq!(schema.find_function(top, "dep", 1), Some(one));
        assert_eq!(schema.find_function(top, "dep", 2), Some(two));
        assert_eq!(schema.find_function(top, "dep", 0), None);
        assert_eq!(schema.function(one).configured_type(), Some(dep));
    }

    #[test]
    fn data_type_is_get_or_create() {
        let mut b = SchemaBuilder::new("Project");
        let a = b.data_type("A");
        assert_eq!(b.data_type("A"), a);
        let schema = b.build();
        assert_eq!(schema.type_by_name("A"), Some(a));
        assert_eq!(schema.type_name(schema.top_level_type()), "Project");
    }
}
