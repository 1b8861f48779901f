//! Структуры для диагностических сообщений

use serde::{Deserialize, Serialize};

use super::assignment_resolver::AssignmentResolutionResult;
use super::effects::AssignmentRecord;
use super::origin::{OriginGraph, Site};
use super::tracer::{AssignmentTrace, TraceElement, TraceFailure, TraceOutcome};
use crate::core::position::{LineIndex, PackedSpan};
use crate::dom::resolution::{DocumentResolution, NodeResolution, ValueResolution};
use crate::dom::{preorder, Document, DocumentNode, ValueId, ValueNode};
use crate::schema::AnalysisSchema;

/// Уровень серьезности диагностики
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// Местоположение в исходном коде
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
}

impl Location {
    pub fn new(file: String, line: usize, column: usize, offset: usize, length: usize) -> Self {
        Self { file, line, column, offset, length }
    }

    /// Location of a span; line and column are 1-based.
    pub fn from_span(file: &str, index: &LineIndex, span: PackedSpan) -> Self {
        let position = index.to_position(span.start);
        Self::new(file.to_string(), position.line + 1, position.column + 1, span.start as usize, span.len as usize)
    }
}

/// Детали диагностики
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticDetails {
    /// Найденное значение
    pub found: Option<String>,
    /// Ожидаемое значение
    pub expected: Option<String>,
    /// Дополнительная информация
    pub info: Option<String>,
}

/// Диагностическое сообщение
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub location: Location,
    pub code: String,
    pub message: String,
    pub details: DiagnosticDetails,
}

impl Diagnostic {
    /// Создает новую диагностику
    pub fn new(severity: DiagnosticSeverity, location: Location, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity, location, code: code.into(), message: message.into(), details: DiagnosticDetails::default() }
    }

    /// Добавляет информацию о найденном значении
    pub fn with_found(mut self, found: impl Into<String>) -> Self {
        self.details.found = Some(found.into());
        self
    }

    /// Добавляет информацию об ожидаемом значении
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.details.expected = Some(expected.into());
        self
    }

    /// Добавляет дополнительную информацию
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.details.info = Some(info.into());
        self
    }
}

/// Коды диагностик
pub mod codes {
    /// Синтаксическая ошибка
    pub const SYNTAX_ERROR: &str = "DCL001";
    /// Неизвестный элемент (нет подходящей функции)
    pub const UNRESOLVED_ELEMENT: &str = "DCL002";
    /// Неизвестное свойство
    pub const UNRESOLVED_PROPERTY: &str = "DCL003";
    /// Неразрешённое значение (фабрика или ссылка)
    pub const UNRESOLVED_VALUE: &str = "DCL004";
    /// Повторное присваивание в одном поколении
    pub const REASSIGNMENT: &str = "DCL005";
    /// Использование свойства без значения
    pub const UNRESOLVED_VALUE_USAGE: &str = "DCL006";
    /// Свойство ссылается на никогда не присвоенное свойство
    pub const UNASSIGNED_PROPERTY: &str = "DCL007";
}

/// Диагностики по разрешённому документу и трассе присваиваний.
pub fn collect_diagnostics(
    file: &str,
    schema: &AnalysisSchema,
    document: &Document,
    resolution: &DocumentResolution,
    origins: &OriginGraph,
    trace: &AssignmentTrace,
) -> Vec<Diagnostic> {
    let index = document.line_index();
    let at = |span: PackedSpan| Location::from_span(file, &index, span);
    let mut out = Vec::new();

    for id in preorder(document) {
        let source = document.node_source(id);
        match (document.node(id), resolution.node(id)) {
            (DocumentNode::Error(e), _) => out.push(
                Diagnostic::new(DiagnosticSeverity::Error, at(source.span), codes::SYNTAX_ERROR, e.message.clone())
                    .with_found(document.node_text(id)),
            ),
            (DocumentNode::Element(e), NodeResolution::NotResolved) => out.push(
                Diagnostic::new(
                    DiagnosticSeverity::Error,
                    at(source.name_span),
                    codes::UNRESOLVED_ELEMENT,
                    format!("unresolved element '{}' with {} argument(s)", e.name, e.arguments.len()),
                )
                .with_found(e.name.clone()),
            ),
            (DocumentNode::Property(p), NodeResolution::NotResolved) => out.push(
                Diagnostic::new(
                    DiagnosticSeverity::Error,
                    at(source.name_span),
                    codes::UNRESOLVED_PROPERTY,
                    format!("unresolved property '{}'", p.name),
                )
                .with_found(p.name.clone()),
            ),
            (DocumentNode::Property(p), _) => unresolved_values(document, resolution, p.value, &mut |value, name| {
                out.push(
                    Diagnostic::new(
                        DiagnosticSeverity::Error,
                        at(document.value_source(value).name_span),
                        codes::UNRESOLVED_VALUE,
                        format!("unresolved reference '{}'", name),
                    )
                    .with_found(name.to_string()),
                )
            }),
            _ => {}
        }
    }

    let node_location = |record: &AssignmentRecord| match record.site {
        Site::Node(node) => at(document.node_source(node).span),
        Site::Value(value) => at(document.value_source(value).span),
    };
    for element in &trace.elements {
        let TraceElement::Assignment(TraceOutcome::Failed { record, failure }) = element else {
            continue;
        };
        let property = origins.describe_property(schema, record.lhs.receiver, record.lhs.property);
        let diagnostic = match failure {
            TraceFailure::Reassignment => Diagnostic::new(
                DiagnosticSeverity::Warning,
                node_location(record),
                codes::REASSIGNMENT,
                format!("'{}' is already assigned; this assignment has no effect", property),
            ),
            TraceFailure::UnresolvedValueUsedInLhs(o) | TraceFailure::UnresolvedValueUsedInRhs(o) => Diagnostic::new(
                DiagnosticSeverity::Error,
                node_location(record),
                codes::UNRESOLVED_VALUE_USAGE,
                format!("value of '{}' is used before it is assigned", origins.describe(schema, *o)),
            )
            .with_info(format!("in assignment to '{}'", property)),
        };
        out.push(diagnostic);
    }

    for (lhs, result) in &trace.final_assignments {
        if let AssignmentResolutionResult::Unassigned { property } = result {
            let site = trace
                .resolved_log
                .assignments
                .iter()
                .find(|a| a.lhs == *lhs)
                .map(node_location)
                .unwrap_or_else(|| Location::new(file.to_string(), 1, 1, 0, 0));
            out.push(
                Diagnostic::new(
                    DiagnosticSeverity::Warning,
                    site,
                    codes::UNASSIGNED_PROPERTY,
                    format!(
                        "'{}' refers to '{}', which is never assigned",
                        origins.describe_property(schema, lhs.receiver, lhs.property),
                        origins.describe_property(schema, property.receiver, property.property)
                    ),
                )
                .with_expected("an assignment or a schema default"),
            );
        }
    }

    out.sort_by_key(|d| d.location.offset);
    out
}

/// Unresolved factories and references inside a value tree.
fn unresolved_values(document: &Document, resolution: &DocumentResolution, root: ValueId, report: &mut dyn FnMut(ValueId, &str)) {
    let mut stack = vec![root];
    while let Some(value) = stack.pop() {
        match document.value(value) {
            ValueNode::ValueFactory { factory_name, values } => {
                if resolution.value(value) == ValueResolution::NotResolved {
                    report(value, factory_name);
                }
                stack.extend(values.iter().rev().copied());
            }
            ValueNode::NamedReference { name } if resolution.value(value) == ValueResolution::NotResolved => report(value, name),
            _ => {}
        }
    }
}
