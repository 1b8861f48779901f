/*!
# DCL Analyzer

Query and mutation engine for declarative build configuration documents. A document is parsed into
an arena DOM, resolved against a typed schema, and then queried (scopes, property assignments,
diagnostics) or edited through schema-aware mutations that keep every untouched byte of the source.

## Architecture

```text
DCL Analyzer
├── Core        - errors, spans, line index
├── Schema      - data types, properties, functions, subtype graph (TOML/YAML definitions)
├── Syntax      - logos lexer and recovering parser
├── Dom         - arena document, resolution overlay, detached new nodes
├── Analysis    - origins, effect log, assignment resolver and tracer, diagnostics
├── Mutation    - scope matching, model/document/text planners, catalog, recipes, runner
└── Config      - mutation settings
```

## Usage

```rust
use dcl_analyzer::analysis::{DocumentAnalyzer, ReferenceAnalyzer};
use dcl_analyzer::schema::{SchemaBuilder, ValueType};

let mut builder = SchemaBuilder::new("Project");
let top = builder.top_level();
builder.property(top, "name", ValueType::String);
let schema = builder.build();

let document = ReferenceAnalyzer::default().analyze(&schema, "name = \"demo\"\n").unwrap();
assert_eq!(document.document.content().len(), 1);
```
*/

pub mod analysis;
pub mod cli_common;
pub mod config;
pub mod core;
pub mod dom;
pub mod mutation;
pub mod schema;
pub mod syntax;

pub use analysis::{collect_diagnostics, Diagnostic, DiagnosticSeverity, DocumentAnalyzer, ReferenceAnalyzer};
pub use config::MutationSettings;
pub use core::{DclError, DclResult};
pub use dom::resolution::DocumentWithResolution;
pub use dom::{Document, NodeId, ValueId};
pub use mutation::{
    MutationDefinition, MutationDefinitionCatalog, MutationRunner, RecipeDefinition, Scope, ScopeLocation,
};
pub use schema::{definition::SchemaDefinition, AnalysisSchema};

use anyhow::Result;
use std::path::Path;

/// Load a schema definition file and build the schema.
pub fn load_schema<P: AsRef<Path>>(path: P) -> Result<AnalysisSchema> {
    let definition = SchemaDefinition::load_from_file(path)?;
    Ok(definition.to_schema()?)
}

/// Diagnostics for one source file.
pub fn check_file<P: AsRef<Path>>(schema: &AnalysisSchema, file_path: P) -> Result<Vec<Diagnostic>> {
    let path = file_path.as_ref();
    let content = std::fs::read_to_string(path)?;
    check_text(schema, &path.display().to_string(), &content)
}

/// Diagnostics for source text; `file` only labels locations.
pub fn check_text(schema: &AnalysisSchema, file: &str, text: &str) -> Result<Vec<Diagnostic>> {
    let (document, mut resolved) = ReferenceAnalyzer::default().analyze_full(schema, text);
    let trace = analysis::AssignmentTracer::new(schema).trace(&mut resolved.origins, &resolved.effects)?;
    Ok(collect_diagnostics(file, schema, &document.document, &document.resolution, &resolved.origins, &trace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaBuilder, ValueType};

    #[test]
    fn check_text_reports_unknown_property() {
        let mut b = SchemaBuilder::new("Project");
        let top = b.top_level();
        b.property(top, "name", ValueType::String);
        let schema = b.build();

        assert!(check_text(&schema, "a.dcl", "name = \"x\"\n").unwrap().is_empty());
        let diagnostics = check_text(&schema, "a.dcl", "other = 1\n").unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);
        assert_eq!(diagnostics[0].location.file, "a.dcl");
    }
}
