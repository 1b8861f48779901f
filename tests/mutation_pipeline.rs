/*!
# Mutation pipeline tests

Model mutations planned against analyzed documents, rendered to text and run step by step.
*/

use dcl_analyzer::analysis::origin::ObjectOrigin;
use dcl_analyzer::analysis::{AssignmentResolutionResult, AssignmentTracer, DocumentAnalyzer, ReferenceAnalyzer};
use dcl_analyzer::config::MutationSettings;
use dcl_analyzer::dom::new_nodes::{NewNode, NewValue};
use dcl_analyzer::dom::{preorder, LiteralValue};
use dcl_analyzer::mutation::{
    ArgumentValue, DocumentMutation, DocumentTextMutationPlanner, ModelMutation, ModelMutationFailureReason, ModelMutationRequest,
    ModelToDocumentMutationPlanner, MutationArgumentContainer, MutationDefinition, MutationParameter, MutationRunIssue,
    MutationRunner, MutationStepResult, ParameterKind, Provider, ScopeLocation,
};
use dcl_analyzer::schema::{AnalysisSchema, SchemaBuilder, ValueType};
use dcl_analyzer::syntax::parse;
use pretty_assertions::assert_eq;

fn schema() -> AnalysisSchema {
    let mut b = SchemaBuilder::new("Project");
    let top = b.top_level();
    let foo = b.data_type("Foo");
    b.configuring_function(top, "foo", foo);
    b.property(top, "a", ValueType::String);
    b.property(top, "b", ValueType::String);
    b.property(top, "c", ValueType::String);
    b.property(foo, "bar", ValueType::Int);
    b.property(foo, "baz", ValueType::Int);
    b.build()
}

fn in_foo(schema: &AnalysisSchema) -> ScopeLocation {
    ScopeLocation::from_top_level().in_objects_of_type(schema.type_by_name("Foo").unwrap())
}

fn set(schema: &AnalysisSchema, property: &str, value: i32) -> ModelMutationRequest {
    let property = schema.find_property(schema.type_by_name("Foo").unwrap(), property).unwrap();
    ModelMutationRequest::new(
        in_foo(schema),
        ModelMutation::SetPropertyValue { property, value: Provider::Constant(NewValue::int(value)) },
    )
}

/// Definition built from a plain function of the schema.
struct Steps(fn(&AnalysisSchema) -> Vec<ModelMutationRequest>);

impl MutationDefinition for Steps {
    fn id(&self) -> &str {
        "steps"
    }
    fn name(&self) -> &str {
        "Steps"
    }
    fn description(&self) -> &str {
        ""
    }
    fn is_compatible_with_schema(&self, schema: &AnalysisSchema) -> bool {
        schema.type_by_name("Foo").is_some()
    }
    fn define_model_mutation_sequence(&self, schema: &AnalysisSchema) -> Vec<ModelMutationRequest> {
        (self.0)(schema)
    }
}

fn plan_and_render(schema: &AnalysisSchema, text: &str, request: &ModelMutationRequest, args: &MutationArgumentContainer) -> String {
    let document = ReferenceAnalyzer::default().analyze(schema, text).unwrap();
    let plan = ModelToDocumentMutationPlanner::new().plan_model_mutation(schema, &document, request);
    assert!(plan.is_successful());
    DocumentTextMutationPlanner::default()
        .plan_document_mutations(&document.document, &plan.document_mutations, args)
        .new_text
}

#[test]
fn targeted_value_replacement_keeps_formatting() {
    let schema = schema();
    let text = plan_and_render(&schema, "foo { bar = 1 }", &set(&schema, "bar", 2), &MutationArgumentContainer::new());
    assert_eq!(text, "foo { bar = 2 }");

    let multiline = "// header\nfoo {\n    bar = 1 // keep\n    baz = 3\n}\n";
    let text = plan_and_render(&schema, multiline, &set(&schema, "bar", 42), &MutationArgumentContainer::new());
    assert_eq!(text, "// header\nfoo {\n    bar = 42 // keep\n    baz = 3\n}\n");
}

#[test]
fn empty_plan_reproduces_source_exactly() {
    let schema = schema();
    let source = "a = \"x\"\n\n\nfoo   {\n  bar=1\n\tbaz = 2 }\n// trailing";
    let document = ReferenceAnalyzer::default().analyze(&schema, source).unwrap();
    let plan = DocumentTextMutationPlanner::default().plan_document_mutations(&document.document, &[], &MutationArgumentContainer::new());
    assert_eq!(plan.new_text, source);
    assert!(plan.unsuccessful.is_empty());
}

#[test]
fn deeply_nested_document_is_edited_without_recursion() {
    let depth = 20_000;
    let source = format!("{}x = 1\n{}", "a {\n".repeat(depth), "}\n".repeat(depth));
    let document = parse(&source);
    let planner = DocumentTextMutationPlanner::default();
    let args = MutationArgumentContainer::new();

    let plan = planner.plan_document_mutations(&document, &[], &args);
    assert_eq!(plan.new_text, source);

    let innermost = preorder(&document).into_iter().find_map(|id| document.property(id)).unwrap();
    let edit = DocumentMutation::ReplaceValue { target: innermost.value, value: Provider::Constant(NewValue::int(2)) };
    let plan = planner.plan_document_mutations(&document, &[edit], &args);
    assert!(plan.unsuccessful.is_empty());
    assert_eq!(plan.new_text, source.replace("x = 1", "x = 2"));
}

#[test]
fn argument_based_values_are_evaluated_at_render_time() {
    let schema = schema();
    let bar = schema.find_property(schema.type_by_name("Foo").unwrap(), "bar").unwrap();
    let parameter = MutationParameter::new("bar", "new value", ParameterKind::Int);
    let request = ModelMutationRequest::new(
        in_foo(&schema),
        ModelMutation::SetPropertyValue {
            property: bar,
            value: Provider::argument_based(move |args| Ok(args.require(&parameter)?.to_new_value())),
        },
    );
    let args = MutationArgumentContainer::new().with("bar", ArgumentValue::Int(7));
    assert_eq!(plan_and_render(&schema, "foo { bar = 1 }", &request, &args), "foo { bar = 7 }");
}

#[test]
fn missing_scope_fails_unless_ignored() {
    let schema = schema();
    let document = ReferenceAnalyzer::default().analyze(&schema, "a = \"x\"\n").unwrap();
    let planner = ModelToDocumentMutationPlanner::new();

    let request = set(&schema, "bar", 2);
    let plan = planner.plan_model_mutation(&schema, &document, &request);
    assert!(plan.document_mutations.is_empty());
    assert_eq!(plan.unsuccessful.len(), 1);
    assert_eq!(plan.unsuccessful[0].reason, ModelMutationFailureReason::ScopeLocationNotMatched);

    let plan = planner.plan_model_mutation(&schema, &document, &request.ignoring_missing());
    assert!(plan.is_successful());
    assert!(plan.document_mutations.is_empty());
}

#[test]
fn top_level_scope_is_not_an_element_target() {
    let schema = schema();
    let document = ReferenceAnalyzer::default().analyze(&schema, "a = \"x\"\n").unwrap();
    let planner = ModelToDocumentMutationPlanner::new();

    let add = ModelMutationRequest::new(
        ScopeLocation::from_top_level(),
        ModelMutation::AddNewElement { element: Provider::Constant(NewNode::property("c", NewValue::string("z"))) },
    );
    let plan = planner.plan_model_mutation(&schema, &document, &add);
    assert!(plan.document_mutations.is_empty());
    let text = DocumentTextMutationPlanner::default()
        .plan_document_mutations(&document.document, &plan.document_mutations, &MutationArgumentContainer::new())
        .new_text;
    assert_eq!(text, "a = \"x\"\n");

    let a = schema.find_property(schema.top_level_type(), "a").unwrap();
    let set = ModelMutationRequest::new(
        ScopeLocation::from_top_level(),
        ModelMutation::SetPropertyValue { property: a, value: Provider::Constant(NewValue::string("y")) },
    );
    let plan = planner.plan_model_mutation(&schema, &document, &set);
    assert!(plan.document_mutations.is_empty());
    assert_eq!(plan.unsuccessful[0].reason, ModelMutationFailureReason::TargetPropertyNotFound);
}

#[test]
fn runner_applies_steps_in_sequence() {
    let schema = schema();
    let analyzer = ReferenceAnalyzer::default();
    let document = analyzer.analyze(&schema, "foo { bar = 1 }").unwrap();
    let definition = Steps(|schema| vec![set(schema, "bar", 2), set(schema, "bar", 3)]);

    let result = MutationRunner::new(&analyzer, MutationSettings::default())
        .run(&schema, &definition, document, &MutationArgumentContainer::new())
        .unwrap();
    assert!(result.is_successful());
    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.final_text(), "foo { bar = 3 }");
}

#[test]
fn runner_halts_after_failed_step() {
    let schema = schema();
    let analyzer = ReferenceAnalyzer::default();
    let document = analyzer.analyze(&schema, "foo { bar = 1 }").unwrap();
    // baz is declared but never written, so the second step finds nothing to set
    let definition = Steps(|schema| vec![set(schema, "bar", 2), set(schema, "baz", 5), set(schema, "bar", 9)]);

    let result = MutationRunner::new(&analyzer, MutationSettings::default())
        .run(&schema, &definition, document, &MutationArgumentContainer::new())
        .unwrap();

    assert_eq!(result.steps.len(), 2);
    match &result.steps[0] {
        MutationStepResult::ModelMutationStepApplied { step, new_text, unsuccessful } => {
            assert_eq!(*step, 0);
            assert_eq!(new_text, "foo { bar = 2 }");
            assert!(unsuccessful.is_empty());
        }
        other => panic!("unexpected step result {:?}", other),
    }
    match &result.steps[1] {
        MutationStepResult::ModelMutationFailed { step, unsuccessful } => {
            assert_eq!(*step, 1);
            assert_eq!(unsuccessful[0].reason, ModelMutationFailureReason::TargetPropertyNotFound);
        }
        other => panic!("unexpected step result {:?}", other),
    }
    assert_eq!(result.issues, vec![MutationRunIssue::HasStepFailure]);
    assert_eq!(result.final_text(), "foo { bar = 2 }");
}

#[test]
fn incompatible_definition_runs_nothing() {
    let mut b = SchemaBuilder::new("Other");
    let top = b.top_level();
    b.property(top, "x", ValueType::Int);
    let other = b.build();
    let analyzer = ReferenceAnalyzer::default();
    let document = analyzer.analyze(&other, "x = 1").unwrap();

    let result = MutationRunner::new(&analyzer, MutationSettings::default())
        .run(&other, &Steps(|_| Vec::new()), document, &MutationArgumentContainer::new())
        .unwrap();
    assert!(result.steps.is_empty());
    assert_eq!(result.issues, vec![MutationRunIssue::IncompatibleMutation]);
    assert_eq!(result.final_text(), "x = 1");
}

#[test]
fn property_chain_converges_to_constant() {
    let schema = schema();
    let (_, mut resolved) = ReferenceAnalyzer::default().analyze_full(&schema, "a = b\nb = c\nc = \"x\"\n");
    let trace = AssignmentTracer::new(&schema).trace(&mut resolved.origins, &resolved.effects).unwrap();
    assert_eq!(trace.failures().count(), 0);
    assert_eq!(trace.final_assignments.len(), 3);

    for (_, result) in &trace.final_assignments {
        match result {
            AssignmentResolutionResult::Assigned { value, .. } => match resolved.origins.get(*value) {
                ObjectOrigin::Constant { literal, .. } => assert_eq!(literal, &LiteralValue::String("x".into())),
                other => panic!("unexpected origin {:?}", other),
            },
            other => panic!("unexpected result {:?}", other),
        }
    }
}
