/*!
# Analysis

Semantic side of a document:

- `origin` - interning graph of object origins
- `effects` - chronological effect log
- `assignment_resolver` / `tracer` - property-link resolution over the effect log
- `document_resolver` - reference resolution of a parsed document against a schema
- `diagnostics` - user-facing findings over a resolved document and its trace

`DocumentAnalyzer` is the seam used by the mutation runner to turn regenerated text back into a
resolved document.
*/

pub mod assignment_resolver;
pub mod diagnostics;
pub mod document_resolver;
pub mod effects;
pub mod origin;
pub mod tracer;

use anyhow::Result;

use crate::config::MutationSettings;
use crate::dom::resolution::DocumentWithResolution;
use crate::schema::AnalysisSchema;
use crate::syntax;
use document_resolver::SchemaDocumentResolver;

pub use assignment_resolver::{AssignmentAdditionResult, AssignmentResolutionResult, AssignmentResolver, ResolutionResult};
pub use diagnostics::{collect_diagnostics, Diagnostic, DiagnosticSeverity};
pub use document_resolver::ResolvedDocument;
pub use effects::{EffectLog, GenerationId, OperationId};
pub use origin::{ObjectOrigin, OriginGraph, OriginId};
pub use tracer::{AssignmentTrace, AssignmentTracer};

/// Parses and resolves source text into a document with its resolution overlay.
pub trait DocumentAnalyzer {
    fn analyze(&self, schema: &AnalysisSchema, text: &str) -> Result<DocumentWithResolution>;
}

/// `syntax::parse` followed by `SchemaDocumentResolver`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceAnalyzer {
    resolver: SchemaDocumentResolver,
}

impl ReferenceAnalyzer {
    pub fn new(settings: &MutationSettings) -> Self {
        Self { resolver: SchemaDocumentResolver::new(settings.generation_id()) }
    }

    /// Full analysis including origins and the effect log.
    pub fn analyze_full(&self, schema: &AnalysisSchema, text: &str) -> (DocumentWithResolution, ResolvedDocument) {
        let document = syntax::parse(text);
        let resolved = self.resolver.resolve(schema, &document);
        (DocumentWithResolution::new(document, resolved.resolution.clone()), resolved)
    }
}

impl DocumentAnalyzer for ReferenceAnalyzer {
    fn analyze(&self, schema: &AnalysisSchema, text: &str) -> Result<DocumentWithResolution> {
        let document = syntax::parse(text);
        let resolved = self.resolver.resolve(schema, &document);
        Ok(DocumentWithResolution::new(document, resolved.resolution))
    }
}
