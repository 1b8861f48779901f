/*!
# Object origin graph

Describes how every value came to exist: constants, property references, function invocations,
configured receivers. Origins are interned, so structurally identical origins share one `OriginId`;
use sites are part of the structure, which makes each syntactic use its own identity.

An origin can only reference ids allocated before it, so the graph is a DAG by construction.
*/

use std::collections::HashMap;

use crate::dom::{LiteralValue, NodeId, ValueId};
use crate::schema::{AnalysisSchema, FunctionId, PropertyId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OriginId(pub u32);

/// Document location an origin was produced at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    Node(NodeId),
    Value(ValueId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectOrigin {
    TopLevelReceiver,
    Constant { literal: LiteralValue, site: Site },
    PropertyReference { receiver: OriginId, property: PropertyId, site: Site },
    /// Synthetic value of a property that declares a default and was never assigned.
    PropertyDefaultValue { receiver: OriginId, property: PropertyId },
    FunctionInvocation { function: FunctionId, receiver: Option<OriginId>, arguments: Vec<OriginId>, site: Site },
    ConfiguringLambdaReceiver { function: FunctionId, receiver: OriginId },
    AddAndConfigureReceiver { added: OriginId },
}

#[derive(Debug, Clone)]
pub struct OriginGraph {
    origins: Vec<ObjectOrigin>,
    index: HashMap<ObjectOrigin, OriginId>,
}

impl Default for OriginGraph {
    fn default() -> Self { Self::new() }
}

impl OriginGraph {
    pub fn new() -> Self {
        let mut graph = Self { origins: Vec::new(), index: HashMap::new() };
        graph.add(ObjectOrigin::TopLevelReceiver);
        graph
    }

    /// Intern an origin; returns the existing id for a structurally identical one.
    pub fn add(&mut self, origin: ObjectOrigin) -> OriginId {
        if let Some(id) = self.index.get(&origin) {
            return *id;
        }
        let id = OriginId(self.origins.len() as u32);
        self.origins.push(origin.clone());
        self.index.insert(origin, id);
        id
    }

    pub fn get(&self, id: OriginId) -> &ObjectOrigin { &self.origins[id.0 as usize] }
    pub fn top_level(&self) -> OriginId { OriginId(0) }
    pub fn len(&self) -> usize { self.origins.len() }
    pub fn is_empty(&self) -> bool { self.origins.is_empty() }

    /// Direct dependencies in a fixed order (receiver first, then arguments).
    pub fn dependencies(&self, id: OriginId) -> Vec<OriginId> {
        match self.get(id) {
            ObjectOrigin::TopLevelReceiver | ObjectOrigin::Constant { .. } => Vec::new(),
            ObjectOrigin::PropertyReference { receiver, .. }
            | ObjectOrigin::PropertyDefaultValue { receiver, .. }
            | ObjectOrigin::ConfiguringLambdaReceiver { receiver, .. } => vec![*receiver],
            ObjectOrigin::FunctionInvocation { receiver, arguments, .. } => {
                receiver.iter().chain(arguments.iter()).copied().collect()
            }
            ObjectOrigin::AddAndConfigureReceiver { added } => vec![*added],
        }
    }

    /// Same origin with its dependencies replaced (in `dependencies` order).
    pub fn with_dependencies(&mut self, id: OriginId, deps: &[OriginId]) -> OriginId {
        if self.dependencies(id) == deps {
            return id;
        }
        let rebuilt = match self.get(id).clone() {
            ObjectOrigin::PropertyReference { property, site, .. } => {
                ObjectOrigin::PropertyReference { receiver: deps[0], property, site }
            }
            ObjectOrigin::PropertyDefaultValue { property, .. } => {
                ObjectOrigin::PropertyDefaultValue { receiver: deps[0], property }
            }
            ObjectOrigin::ConfiguringLambdaReceiver { function, .. } => {
                ObjectOrigin::ConfiguringLambdaReceiver { function, receiver: deps[0] }
            }
            ObjectOrigin::FunctionInvocation { function, receiver, site, .. } => {
                let skip = usize::from(receiver.is_some());
                ObjectOrigin::FunctionInvocation {
                    function,
                    receiver: receiver.map(|_| deps[0]),
                    arguments: deps[skip..].to_vec(),
                    site,
                }
            }
            ObjectOrigin::AddAndConfigureReceiver { .. } => ObjectOrigin::AddAndConfigureReceiver { added: deps[0] },
            leaf @ (ObjectOrigin::TopLevelReceiver | ObjectOrigin::Constant { .. }) => leaf,
        };
        self.add(rebuilt)
    }

    /// Post-order fold over the DAG below `root` with an explicit frame stack.
    ///
    /// `memo` is shared with the caller: ids already present are not revisited, and every computed
    /// value is inserted exactly once.
    pub fn fold_post_order<T, F>(&mut self, root: OriginId, memo: &mut HashMap<OriginId, T>, mut combine: F) -> Option<T>
    where
        T: Clone,
        F: FnMut(&mut OriginGraph, OriginId, Vec<T>) -> T,
    {
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if memo.contains_key(&id) {
                continue;
            }
            let deps = self.dependencies(id);
            if !expanded {
                stack.push((id, true));
                stack.extend(deps.iter().rev().filter(|d| !memo.contains_key(*d)).map(|d| (*d, false)));
            } else {
                let values: Vec<T> = deps.iter().filter_map(|d| memo.get(d).cloned()).collect();
                let value = combine(self, id, values);
                memo.insert(id, value);
            }
        }
        memo.get(&root).cloned()
    }

    /// Human-readable name of an origin, e.g. `library.version` or `"1.0"`.
    pub fn describe(&self, schema: &AnalysisSchema, id: OriginId) -> String {
        match self.get(id) {
            ObjectOrigin::TopLevelReceiver => "top-level".to_string(),
            ObjectOrigin::Constant { literal, .. } => literal.to_string(),
            ObjectOrigin::PropertyReference { receiver, property, .. } => {
                self.qualified(schema, *receiver, &schema.property(*property).name)
            }
            ObjectOrigin::PropertyDefaultValue { receiver, property } => {
                format!("default of {}", self.qualified(schema, *receiver, &schema.property(*property).name))
            }
            ObjectOrigin::FunctionInvocation { function, .. } => format!("{}(...)", schema.function(*function).name),
            ObjectOrigin::ConfiguringLambdaReceiver { .. } | ObjectOrigin::AddAndConfigureReceiver { .. } => {
                self.receiver_path(schema, id).join(".")
            }
        }
    }

    /// `receiver.property` path for messages.
    pub fn describe_property(&self, schema: &AnalysisSchema, receiver: OriginId, property: PropertyId) -> String {
        self.qualified(schema, receiver, &schema.property(property).name)
    }

    fn qualified(&self, schema: &AnalysisSchema, receiver: OriginId, name: &str) -> String {
        let mut path = self.receiver_path(schema, receiver);
        path.push(name.to_string());
        path.join(".")
    }

    /// Function names from the top level down to `id`.
    fn receiver_path(&self, schema: &AnalysisSchema, id: OriginId) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            current = match self.get(c) {
                ObjectOrigin::ConfiguringLambdaReceiver { function, receiver } => {
                    names.push(schema.function(*function).name.clone());
                    Some(*receiver)
                }
                ObjectOrigin::AddAndConfigureReceiver { added } => Some(*added),
                ObjectOrigin::FunctionInvocation { function, receiver, .. } => {
                    names.push(format!("{}(...)", schema.function(*function).name));
                    *receiver
                }
                ObjectOrigin::TopLevelReceiver => None,
                _ => {
                    names.push("?".to_string());
                    None
                }
            };
        }
        names.reverse();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaBuilder, ValueType};

    #[test]
    fn interning_shares_identical_origins() {
        let mut g = OriginGraph::new();
        let a = g.add(ObjectOrigin::ConfiguringLambdaReceiver { function: FunctionId(0), receiver: g.top_level() });
        let b = g.add(ObjectOrigin::ConfiguringLambdaReceiver { function: FunctionId(0), receiver: g.top_level() });
        assert_eq!(a, b);
        let c1 = g.add(ObjectOrigin::Constant { literal: LiteralValue::Int(1), site: Site::Value(ValueId(0)) });
        let c2 = g.add(ObjectOrigin::Constant { literal: LiteralValue::Int(1), site: Site::Value(ValueId(1)) });
        assert_ne!(c1, c2);
    }

    #[test]
    fn fold_visits_dependencies_first_and_once() {
        let mut g = OriginGraph::new();
        let top = g.top_level();
        let arg = g.add(ObjectOrigin::Constant { literal: LiteralValue::Int(1), site: Site::Value(ValueId(0)) });
        let call = g.add(ObjectOrigin::FunctionInvocation {
            function: FunctionId(0),
            receiver: Some(top),
            arguments: vec![arg, arg],
            site: Site::Value(ValueId(1)),
        });
        let mut order = Vec::new();
        let mut memo = HashMap::new();
        let total = g.fold_post_order(call, &mut memo, |_, id, deps: Vec<u32>| {
            order.push(id);
            1 + deps.iter().sum::<u32>()
        });
        assert_eq!(total, Some(4));
        assert_eq!(order, vec![top, arg, call]);
    }

    #[test]
    fn deep_chains_do_not_recurse() {
        let mut g = OriginGraph::new();
        let mut current = g.top_level();
        for i in 0..100_000u32 {
            current = g.add(ObjectOrigin::ConfiguringLambdaReceiver { function: FunctionId(i), receiver: current });
        }
        let mut memo = HashMap::new();
        let depth = g.fold_post_order(current, &mut memo, |_, _, deps: Vec<usize>| deps.first().map_or(0, |d| d + 1));
        assert_eq!(depth, Some(100_000));
    }

    #[test]
    fn with_dependencies_rebuilds_invocations() {
        let mut g = OriginGraph::new();
        let top = g.top_level();
        let one = g.add(ObjectOrigin::Constant { literal: LiteralValue::Int(1), site: Site::Value(ValueId(0)) });
        let two = g.add(ObjectOrigin::Constant { literal: LiteralValue::Int(2), site: Site::Value(ValueId(1)) });
        let call = g.add(ObjectOrigin::FunctionInvocation {
            function: FunctionId(3),
            receiver: Some(top),
            arguments: vec![one],
            site: Site::Node(NodeId(0)),
        });
        assert_eq!(g.with_dependencies(call, &[top, one]), call);
        let rebuilt = g.with_dependencies(call, &[top, two]);
        assert_eq!(g.dependencies(rebuilt), vec![top, two]);
    }

    #[test]
    fn describe_uses_receiver_path() {
        let mut b = SchemaBuilder::new("Project");
        let top = b.top_level();
        let lib = b.data_type("Library");
        let f = b.configuring_function(top, "library", lib);
        let p = b.property(lib, "version", ValueType::String);
        let schema = b.build();

        let mut g = OriginGraph::new();
        let receiver = g.add(ObjectOrigin::ConfiguringLambdaReceiver { function: f, receiver: g.top_level() });
        let reference = g.add(ObjectOrigin::PropertyReference { receiver, property: p, site: Site::Node(NodeId(1)) });
        assert_eq!(g.describe(&schema, reference), "library.version");
        let default = g.add(ObjectOrigin::PropertyDefaultValue { receiver, property: p });
        assert_eq!(g.describe(&schema, default), "default of library.version");
    }
}
