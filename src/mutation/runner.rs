/*!
# Mutation runner

Applies a multi-step `MutationDefinition` to a document. Each step is planned against the current
document; a step whose model plan has failures is recorded as `ModelMutationFailed` and the run
stops there. Otherwise the new text is re-analyzed and becomes the current document for the next
step.
*/

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::arguments::MutationArgumentContainer;
use super::definition::MutationDefinition;
use super::document_mutation::UnsuccessfulDocumentMutation;
use super::model::UnsuccessfulModelMutation;
use super::model_planner::ModelToDocumentMutationPlanner;
use super::text_planner::DocumentTextMutationPlanner;
use crate::analysis::DocumentAnalyzer;
use crate::config::MutationSettings;
use crate::dom::resolution::DocumentWithResolution;
use crate::schema::AnalysisSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationRunIssue {
    /// The definition does not fit the schema; no step was run.
    IncompatibleMutation,
    HasStepFailure,
}

#[derive(Debug, Clone)]
pub enum MutationStepResult {
    ModelMutationStepApplied {
        step: usize,
        new_text: String,
        /// Document mutations the text planner could not apply.
        unsuccessful: Vec<UnsuccessfulDocumentMutation>,
    },
    ModelMutationFailed {
        step: usize,
        unsuccessful: Vec<UnsuccessfulModelMutation>,
    },
}

#[derive(Debug, Clone)]
pub struct MutationRunResult {
    pub steps: Vec<MutationStepResult>,
    pub issues: Vec<MutationRunIssue>,
    /// Document after the last applied step.
    pub document: DocumentWithResolution,
}

impl MutationRunResult {
    pub fn final_text(&self) -> &str {
        self.document.document.source()
    }

    pub fn is_successful(&self) -> bool {
        self.issues.is_empty()
    }
}

pub struct MutationRunner<'a, A: DocumentAnalyzer> {
    analyzer: &'a A,
    settings: MutationSettings,
}

impl<'a, A: DocumentAnalyzer> MutationRunner<'a, A> {
    pub fn new(analyzer: &'a A, settings: MutationSettings) -> Self {
        Self { analyzer, settings }
    }

    pub fn run(
        &self,
        schema: &AnalysisSchema,
        definition: &dyn MutationDefinition,
        document: DocumentWithResolution,
        arguments: &MutationArgumentContainer,
    ) -> Result<MutationRunResult> {
        if !definition.is_compatible_with_schema(schema) {
            warn!(id = definition.id(), "mutation is incompatible with the schema");
            return Ok(MutationRunResult {
                steps: Vec::new(),
                issues: vec![MutationRunIssue::IncompatibleMutation],
                document,
            });
        }

        let model_planner = ModelToDocumentMutationPlanner::new();
        let text_planner = DocumentTextMutationPlanner::new(self.settings.clone());
        let mut current = document;
        let mut steps = Vec::new();
        let mut issues = Vec::new();

        for (step, request) in definition.define_model_mutation_sequence(schema).iter().enumerate() {
            let plan = model_planner.plan_model_mutation(schema, &current, request);
            if !plan.is_successful() {
                warn!(id = definition.id(), step, failures = plan.unsuccessful.len(), "mutation step failed");
                steps.push(MutationStepResult::ModelMutationFailed { step, unsuccessful: plan.unsuccessful });
                issues.push(MutationRunIssue::HasStepFailure);
                break;
            }

            let text = text_planner.plan_document_mutations(&current.document, &plan.document_mutations, arguments);
            if !text.unsuccessful.is_empty() && !issues.contains(&MutationRunIssue::HasStepFailure) {
                issues.push(MutationRunIssue::HasStepFailure);
            }
            current = self
                .analyzer
                .analyze(schema, &text.new_text)
                .with_context(|| format!("failed to re-analyze the result of step {} of '{}'", step, definition.id()))?;
            info!(id = definition.id(), step, mutations = plan.document_mutations.len(), "mutation step applied");
            steps.push(MutationStepResult::ModelMutationStepApplied {
                step,
                new_text: text.new_text,
                unsuccessful: text.unsuccessful,
            });
        }

        Ok(MutationRunResult { steps, issues, document: current })
    }
}
