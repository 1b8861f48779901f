/*!
# Reference parser

Parser building a `Document` from the token stream. Values are parsed by recursive descent; blocks
are not: an opened block stays on the builder's element stack until its `}` arrives, so nesting
depth never grows the call stack. Statements:

- `name = value`
- `name(args)` and `name(args) { ... }`
- `name { ... }`

Values are literals, value factories `f(args)` and named references. Malformed statements become
`ErrorNode`s spanning the offending text; parsing itself never fails.
*/

use tracing::debug;

use super::lexer::{tokenize, unescape_string, Token, TokenKind};
use crate::core::{DclError, PackedSpan};
use crate::dom::new_nodes::{NewNode, NewValue};
use crate::dom::{Document, DocumentBuilder, LiteralValue, ValueId};

/// Value parsed but not yet allocated in the arena.
#[derive(Debug)]
enum ParsedValue {
    Literal(LiteralValue, PackedSpan),
    Factory { name: String, name_span: PackedSpan, arguments: Vec<ParsedValue>, span: PackedSpan },
    Reference(String, PackedSpan),
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    builder: DocumentBuilder,
    /// Elements whose block is open; the builder holds them on its stack.
    open_blocks: usize,
    errors: usize,
}

/// Parse source text into a document.
pub fn parse(text: &str) -> Document {
    let mut parser =
        Parser { text, tokens: tokenize(text), pos: 0, builder: DocumentBuilder::new(), open_blocks: 0, errors: 0 };
    parser.statements();
    debug!(tokens = parser.tokens.len(), errors = parser.errors, "document parsed");
    parser.builder.build(text)
}

/// Parse a snippet of statements into owned nodes.
pub fn parse_nodes(text: &str) -> Result<Vec<NewNode>, DclError> {
    let doc = parse(text);
    doc.content()
        .iter()
        .map(|id| {
            NewNode::from_document(&doc, *id).ok_or_else(|| DclError::InvalidSnippet(format!("cannot parse '{}'", doc.node_text(*id))))
        })
        .collect()
}

/// Parse a single value expression such as `"1.0"` or `coords("g", "a")`.
pub fn parse_value(text: &str) -> Result<NewValue, DclError> {
    let wrapped = format!("v = {}", text);
    let doc = parse(&wrapped);
    match doc.content() {
        [single] => doc
            .property(*single)
            .map(|p| NewValue::from_document(&doc, p.value))
            .ok_or_else(|| DclError::InvalidSnippet(format!("'{}' is not a value", text))),
        _ => Err(DclError::InvalidSnippet(format!("'{}' is not a single value", text))),
    }
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<TokenKind> { self.tokens.get(self.pos).map(|t| t.kind) }
    fn span_at(&self, index: usize) -> PackedSpan {
        match self.tokens.get(index) {
            Some(t) => PackedSpan::from(t.span.clone()),
            None => PackedSpan::new(self.text.len() as u32, 0),
        }
    }
    fn current_span(&self) -> PackedSpan { self.span_at(self.pos) }
    fn previous_end(&self) -> usize {
        if self.pos == 0 { 0 } else { self.tokens[self.pos - 1].span.end }
    }
    fn slice(&self, span: PackedSpan) -> &'a str { &self.text[span.range()] }

    fn error_node(&mut self, message: String, start: usize, end: usize) {
        self.errors += 1;
        self.builder.error(message, PackedSpan::between(start, end));
    }

    /// All statements of the input. `}` closes the innermost open block.
    fn statements(&mut self) {
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Semicolon => self.pos += 1,
                TokenKind::RightBrace if self.open_blocks > 0 => {
                    self.builder.close_block(self.current_span());
                    self.pos += 1;
                    self.close_element();
                }
                TokenKind::Identifier => self.statement(),
                other => {
                    let span = self.current_span();
                    self.pos += 1;
                    self.error_node(format!("unexpected {}", other), span.start as usize, span.end() as usize);
                }
            }
        }
        // незакрытые блоки: фиксируем ошибку в конце текста, начиная с самого вложенного
        while self.open_blocks > 0 {
            let end = self.text.len();
            self.error_node("unclosed block".to_string(), end, end);
            self.builder.close_block(PackedSpan::new(end as u32, 0));
            self.close_element();
        }
    }

    fn close_element(&mut self) {
        self.open_blocks -= 1;
        self.builder.finish_element(self.previous_end());
    }

    fn statement(&mut self) {
        let name_span = self.current_span();
        let name = self.slice(name_span).to_string();
        let start = name_span.start as usize;
        self.pos += 1;
        match self.peek() {
            Some(TokenKind::Assign) => {
                self.pos += 1;
                match self.value() {
                    Ok(parsed) => {
                        let value = self.allocate(parsed);
                        let span = PackedSpan::between(start, self.previous_end());
                        self.builder.property(name, name_span, value, span);
                    }
                    Err(message) => {
                        let end = self.previous_end();
                        self.error_node(message, start, end);
                    }
                }
            }
            Some(TokenKind::LeftParen) => match self.arguments() {
                Ok(arguments) => self.element(name, name_span, arguments),
                Err(message) => {
                    let end = self.previous_end();
                    self.error_node(message, start, end);
                }
            },
            Some(TokenKind::LeftBrace) => self.element(name, name_span, Vec::new()),
            _ => self.error_node(format!("expected '=', '(' or '{{' after '{}'", name), start, name_span.end() as usize),
        }
    }

    fn element(&mut self, name: String, name_span: PackedSpan, arguments: Vec<ParsedValue>) {
        self.builder.start_element(name, name_span);
        for parsed in arguments {
            let value = self.allocate(parsed);
            self.builder.element_argument(value);
        }
        if self.peek() == Some(TokenKind::LeftBrace) {
            // элемент закрывается в `statements` на своей `}`
            self.builder.open_block(self.current_span());
            self.pos += 1;
            self.open_blocks += 1;
            return;
        }
        self.builder.finish_element(self.previous_end());
    }

    /// `( value, ... )` starting at the opening parenthesis.
    fn arguments(&mut self) -> Result<Vec<ParsedValue>, String> {
        self.pos += 1;
        let mut values = Vec::new();
        if self.peek() == Some(TokenKind::RightParen) {
            self.pos += 1;
            return Ok(values);
        }
        loop {
            values.push(self.value()?);
            match self.peek() {
                Some(TokenKind::Comma) => self.pos += 1,
                Some(TokenKind::RightParen) => {
                    self.pos += 1;
                    return Ok(values);
                }
                Some(other) => return Err(format!("expected ',' or ')', found {}", other)),
                None => return Err("unexpected end of input in argument list".to_string()),
            }
        }
    }

    fn value(&mut self) -> Result<ParsedValue, String> {
        let span = self.current_span();
        let kind = self.peek().ok_or_else(|| "expected a value, found end of input".to_string())?;
        let text = self.slice(span);
        let literal = match kind {
            TokenKind::StringLiteral => Some(LiteralValue::String(unescape_string(text))),
            TokenKind::IntLiteral => Some(LiteralValue::Int(
                text.parse().map_err(|_| format!("int literal {} is out of range", text))?,
            )),
            TokenKind::LongLiteral => Some(LiteralValue::Long(
                text.trim_end_matches('L').parse().map_err(|_| format!("long literal {} is out of range", text))?,
            )),
            TokenKind::True => Some(LiteralValue::Boolean(true)),
            TokenKind::False => Some(LiteralValue::Boolean(false)),
            TokenKind::Identifier => None,
            other => return Err(format!("expected a value, found {}", other)),
        };
        if let Some(literal) = literal {
            self.pos += 1;
            return Ok(ParsedValue::Literal(literal, span));
        }

        self.pos += 1;
        if self.peek() == Some(TokenKind::LeftParen) {
            let arguments = self.arguments()?;
            let full = PackedSpan::between(span.start as usize, self.previous_end());
            return Ok(ParsedValue::Factory { name: text.to_string(), name_span: span, arguments, span: full });
        }
        Ok(ParsedValue::Reference(text.to_string(), span))
    }

    fn allocate(&mut self, parsed: ParsedValue) -> ValueId {
        match parsed {
            ParsedValue::Literal(literal, span) => self.builder.literal(literal, span),
            ParsedValue::Reference(name, span) => self.builder.named_reference(name, span),
            ParsedValue::Factory { name, name_span, arguments, span } => {
                let values = arguments.into_iter().map(|a| self.allocate(a)).collect();
                self.builder.value_factory(name, name_span, values, span)
            }
        }
    }
}
