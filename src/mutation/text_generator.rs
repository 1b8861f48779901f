/*!
# Mutated document text generator

Walks a `TextPreservingTree` and copies the source, asking `TextMutationHooks` at every renamable
name, every value and every statement whether it should change. Layout rules for changed text:

- a removed statement that is alone on its line takes the whole line with it;
- inserted nodes take the indentation of the neighbouring statement, or of the enclosing element
  plus one indentation unit when the block is empty;
- multi-line nodes inserted at the top level are separated by a blank line when
  `MutationSettings::blank_line_around_top_level_blocks` is set;
- inserted line breaks follow the document, `\r\n` or `\n`.
*/

use super::text_tree::{ChildTag, TextPreservingTree, TextTreeNode};
use crate::config::MutationSettings;
use crate::dom::new_nodes::{NewNode, NewValue};
use crate::dom::{Document, NodeId, ValueId};

/// Decisions taken while text is generated. Defaults keep everything as it is.
pub trait TextMutationHooks {
    fn map_name(&mut self, _tag: ChildTag, _name: &str) -> Option<String> {
        None
    }
    fn replace_value(&mut self, _value: ValueId) -> Option<NewValue> {
        None
    }
    /// Whether the statement is dropped; `replacement_nodes` is asked only for dropped statements.
    fn remove_node(&mut self, _node: NodeId) -> bool {
        false
    }
    fn replacement_nodes(&mut self, _node: NodeId) -> Vec<NewNode> {
        Vec::new()
    }
    fn insert_before(&mut self, _node: NodeId) -> Vec<NewNode> {
        Vec::new()
    }
    fn insert_after(&mut self, _node: NodeId) -> Vec<NewNode> {
        Vec::new()
    }
    /// Nodes appended to an element's block, or to the document for `None`.
    fn append_to_block(&mut self, _owner: Option<NodeId>) -> Vec<NewNode> {
        Vec::new()
    }
}

/// Hooks that leave the document untouched.
pub struct NoMutations;

impl TextMutationHooks for NoMutations {}

pub struct MutatedDocumentTextGenerator<'a> {
    document: &'a Document,
    settings: &'a MutationSettings,
    /// `\r\n` when the source uses it; every inserted line break follows the document.
    line_ending: &'static str,
}

/// Tree node being copied. Children are visited through `next`; `pending` holds a statement whose
/// original text is being emitted by the frame above.
struct Frame<'t> {
    node: &'t TextTreeNode,
    cursor: usize,
    next: usize,
    pending: Option<StatementTail>,
    /// Whether the last statement written at this level spans several lines.
    last_written: Option<bool>,
}

impl<'t> Frame<'t> {
    fn new(node: &'t TextTreeNode) -> Self {
        Self { node, cursor: node.range.start, next: 0, pending: None, last_written: None }
    }

    fn note(&mut self, written: Option<bool>) {
        if written.is_some() {
            self.last_written = written;
        }
    }
}

/// Separator state between the pieces of one statement.
#[derive(Debug, Clone, Copy)]
struct Layout {
    blank_lines: bool,
    last: Option<bool>,
}

/// What remains of a kept statement once its original text is out.
struct StatementTail {
    anchor: usize,
    floor: usize,
    after: Vec<NewNode>,
    layout: Layout,
}

enum Statement {
    Written { end: usize, last: Option<bool> },
    Original(StatementTail),
}

impl<'a> MutatedDocumentTextGenerator<'a> {
    pub fn new(document: &'a Document, settings: &'a MutationSettings) -> Self {
        let line_ending = if document.source().contains("\r\n") { "\r\n" } else { "\n" };
        Self { document, settings, line_ending }
    }

    /// Copies the tree depth first with an explicit frame stack.
    pub fn generate_text(&self, tree: &TextPreservingTree, hooks: &mut dyn TextMutationHooks) -> String {
        let mut out = String::with_capacity(self.document.source().len());
        let mut stack = vec![Frame::new(&tree.root)];
        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            if let Some(child) = node.children.get(frame.next) {
                frame.next += 1;
                if self.enter(&mut out, frame, child, hooks) {
                    stack.push(Frame::new(child));
                }
                continue;
            }
            let end = self.leave(&mut out, frame, hooks);
            stack.pop();
            if let Some(parent) = stack.last_mut() {
                self.resume(&mut out, parent, end);
            }
        }
        out
    }

    /// Emits what can be written without descending; `true` when `child` needs its own frame.
    fn enter(&self, out: &mut String, frame: &mut Frame<'_>, child: &TextTreeNode, hooks: &mut dyn TextMutationHooks) -> bool {
        if let ChildTag::BlockElement(id) = child.tag {
            let top_level = frame.node.tag == ChildTag::Root;
            return match self.begin_statement(out, frame.cursor, child, id, top_level, hooks) {
                Statement::Written { end, last } => {
                    frame.cursor = end;
                    frame.note(last);
                    false
                }
                Statement::Original(tail) => {
                    frame.pending = Some(tail);
                    true
                }
            };
        }

        let src = self.document.source();
        out.push_str(slice(src, frame.cursor, child.range.start));
        match child.tag {
            ChildTag::Value(value) => match hooks.replace_value(value) {
                Some(new) => {
                    out.push_str(&new.to_string());
                    frame.cursor = frame.cursor.max(child.range.end);
                    false
                }
                None => true,
            },
            ChildTag::CallName(_) | ChildTag::PropertyName(_) | ChildTag::ValueFactoryName(_) => {
                let name = slice(src, child.range.start, child.range.end);
                match hooks.map_name(child.tag, name) {
                    Some(new_name) => out.push_str(&new_name),
                    None => out.push_str(name),
                }
                frame.cursor = frame.cursor.max(child.range.end);
                false
            }
            ChildTag::Root | ChildTag::BlockElement(_) => true,
        }
    }

    /// Finishes a frame whose children are all out and returns the source offset consumed.
    fn leave(&self, out: &mut String, frame: &Frame<'_>, hooks: &mut dyn TextMutationHooks) -> usize {
        let src = self.document.source();
        let node = frame.node;
        let mut cursor = frame.cursor;
        match node.tag {
            ChildTag::Root => {
                out.push_str(slice(src, cursor, node.range.end));
                cursor = cursor.max(node.range.end);
                self.append_to_document(out, frame.last_written.unwrap_or(false), hooks);
            }
            ChildTag::BlockElement(id) if self.document.element(id).is_some() => {
                cursor = self.append_to_element(out, cursor, node, id, hooks);
            }
            _ => {}
        }
        out.push_str(slice(src, cursor, node.range.end));
        cursor.max(node.range.end)
    }

    /// Continues the parent once a child frame has consumed the source up to `end`.
    fn resume(&self, out: &mut String, frame: &mut Frame<'_>, end: usize) {
        let Some(tail) = frame.pending.take() else {
            frame.cursor = frame.cursor.max(end);
            return;
        };
        let indent = line_indent(self.document.source(), tail.anchor);
        let mut layout = tail.layout;
        for node in &tail.after {
            self.push_statement(out, &mut layout, indent, node);
        }
        frame.cursor = end.max(tail.floor);
        frame.note(layout.last);
    }

    fn begin_statement(
        &self,
        out: &mut String,
        cursor: usize,
        child: &TextTreeNode,
        id: NodeId,
        top_level: bool,
        hooks: &mut dyn TextMutationHooks,
    ) -> Statement {
        let src = self.document.source();
        let gap = slice(src, cursor, child.range.start);
        let before = hooks.insert_before(id);
        let removed = hooks.remove_node(id);
        let replacement = if removed { hooks.replacement_nodes(id) } else { Vec::new() };
        let after = hooks.insert_after(id);

        if removed && before.is_empty() && replacement.is_empty() && after.is_empty() {
            if let Some(next_line) = whole_line(src, child.range.start, child.range.end) {
                let indent_len = child.range.start - line_start(src, child.range.start);
                out.push_str(&gap[..gap.len().saturating_sub(indent_len)]);
                return Statement::Written { end: next_line.max(cursor), last: None };
            }
            out.push_str(gap);
            return Statement::Written { end: child.range.end.max(cursor), last: None };
        }

        out.push_str(gap);
        let indent = line_indent(src, child.range.start);
        let mut layout = Layout { blank_lines: top_level && self.settings.blank_line_around_top_level_blocks, last: None };
        for node in &before {
            self.push_statement(out, &mut layout, indent, node);
        }
        if removed {
            for node in replacement.iter().chain(&after) {
                self.push_statement(out, &mut layout, indent, node);
            }
            return Statement::Written { end: child.range.end.max(cursor), last: layout.last };
        }
        self.separate(out, &mut layout, indent, self.document.node_source(id).block.is_some());
        Statement::Original(StatementTail { anchor: child.range.start, floor: cursor, after, layout })
    }

    fn separate(&self, out: &mut String, layout: &mut Layout, indent: &str, multiline: bool) {
        if let Some(previous) = layout.last {
            out.push_str(self.line_ending);
            if layout.blank_lines && (multiline || previous) {
                out.push_str(self.line_ending);
            }
            out.push_str(indent);
        }
        layout.last = Some(multiline);
    }

    fn push_statement(&self, out: &mut String, layout: &mut Layout, indent: &str, node: &NewNode) {
        self.separate(out, layout, indent, node.is_multiline());
        out.push_str(&self.render(node, indent));
    }

    fn render(&self, node: &NewNode, indent: &str) -> String {
        let text = node.render(indent, &self.settings.indent_unit);
        if self.line_ending == "\n" {
            text
        } else {
            text.replace('\n', self.line_ending)
        }
    }

    fn append_to_element(
        &self,
        out: &mut String,
        cursor: usize,
        node: &TextTreeNode,
        id: NodeId,
        hooks: &mut dyn TextMutationHooks,
    ) -> usize {
        let nodes = hooks.append_to_block(Some(id));
        if nodes.is_empty() {
            return cursor;
        }
        let src = self.document.source();
        let unit = &self.settings.indent_unit;
        let outer = line_indent(src, node.range.start);
        let nested = format!("{}{}", outer, unit);

        let Some(block) = self.document.node_source(id).block else {
            // `name(args)` получает блок
            out.push_str(slice(src, cursor, node.range.end));
            out.push_str(" {");
            self.push_lines(out, &nodes, &nested);
            out.push_str(self.line_ending);
            out.push_str(outer);
            out.push('}');
            return cursor.max(node.range.end);
        };

        let open = block.open.start as usize;
        let close = (block.close.start as usize).max(cursor);
        let last_statement = node.children.iter().rev().find(|c| matches!(c.tag, ChildTag::BlockElement(_)));
        let inner = match last_statement {
            Some(last) if line_start(src, last.range.start) > open => line_indent(src, last.range.start).to_string(),
            _ => nested,
        };
        let gap = slice(src, cursor, close);
        match gap.find('\n') {
            Some(newline) if last_statement.is_some() => {
                let line_end = if gap[..newline].ends_with('\r') { newline - 1 } else { newline };
                out.push_str(&gap[..line_end]);
                self.push_lines(out, &nodes, &inner);
                cursor + line_end
            }
            _ => {
                out.push_str(gap.trim_end());
                self.push_lines(out, &nodes, &inner);
                out.push_str(self.line_ending);
                out.push_str(outer);
                close
            }
        }
    }

    fn push_lines(&self, out: &mut String, nodes: &[NewNode], indent: &str) {
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 || !out.ends_with('\n') {
                out.push_str(self.line_ending);
            }
            out.push_str(indent);
            out.push_str(&self.render(node, indent));
        }
    }

    /// `previous_multiline` describes the last top-level statement that stayed in the output.
    fn append_to_document(&self, out: &mut String, mut previous_multiline: bool, hooks: &mut dyn TextMutationHooks) {
        let nodes = hooks.append_to_block(None);
        if nodes.is_empty() {
            return;
        }
        let src = self.document.source();
        let blank_line = self.line_ending.repeat(2);
        for node in nodes {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push_str(self.line_ending);
            }
            let multiline = node.is_multiline();
            if self.settings.blank_line_around_top_level_blocks
                && (multiline || previous_multiline)
                && !out.is_empty()
                && !out.ends_with(&blank_line)
            {
                out.push_str(self.line_ending);
            }
            out.push_str(&self.render(&node, ""));
            out.push_str(self.line_ending);
            previous_multiline = multiline;
        }
        if !src.is_empty() && !src.ends_with('\n') {
            out.truncate(out.len() - self.line_ending.len());
        }
    }
}

fn slice(src: &str, from: usize, to: usize) -> &str {
    if from < to && to <= src.len() {
        &src[from..to]
    } else {
        ""
    }
}

fn line_start(src: &str, pos: usize) -> usize {
    src[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Leading spaces and tabs of the line containing `pos`.
fn line_indent(src: &str, pos: usize) -> &str {
    let start = line_start(src, pos);
    let line = &src[start..pos];
    let len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..len]
}

/// Start of the next line if `start..end` is the only content of its line.
fn whole_line(src: &str, start: usize, end: usize) -> Option<usize> {
    if end > src.len() || start > end {
        return None;
    }
    let blank = |s: &str| s.chars().all(|c| c == ' ' || c == '\t' || c == '\r');
    if !blank(&src[line_start(src, start)..start]) {
        return None;
    }
    let line_end = src[end..].find('\n').map(|i| end + i);
    if !blank(&src[end..line_end.unwrap_or(src.len())]) {
        return None;
    }
    Some(line_end.map(|i| i + 1).unwrap_or(src.len()))
}
