//! Protocol Buffers engine
//!
//! Parses `.proto` sources (proto2 and proto3) into a flat model of messages and
//! enums, then applies wire-level evolution rules: field numbers identify fields,
//! types may only change within a wire-compatible group, removed numbers must be
//! reserved.

use std::collections::{BTreeMap, BTreeSet};

use super::{CheckerEngine, References};
use crate::error::Result;
use crate::level::{Direction, ValidityLevel};
use crate::schema::FormatId;
use crate::verdict::Violation;

/// Largest legal field number
pub const MAX_FIELD_NUMBER: i64 = 536_870_911;

/// Field numbers reserved for the protobuf implementation
pub const IMPLEMENTATION_RESERVED: std::ops::RangeInclusive<i64> = 19_000..=19_999;

/// Deepest message nesting the parser accepts
pub const MAX_NESTING_DEPTH: usize = 100;

const SCALAR_TYPES: [&str; 15] = [
    "double", "float", "int32", "int64", "uint32", "uint64", "sint32", "sint64", "fixed32",
    "fixed64", "sfixed32", "sfixed64", "bool", "string", "bytes",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// No label, or proto3 `optional`
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub number: i64,
    pub type_name: String,
    pub label: Label,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reserved {
    pub ranges: Vec<(i64, i64)>,
    pub names: Vec<String>,
}

impl Reserved {
    pub fn contains_number(&self, number: i64) -> bool {
        self.ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&number))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDef {
    /// Name qualified by enclosing messages (e.g. `Order.Line`), without package
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub reserved: Reserved,
}

impl MessageDef {
    fn field_by_number(&self, number: i64) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.number == number)
    }

    fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<(String, i64)>,
    pub reserved: Reserved,
}

/// A parsed `.proto` file; nested declarations are flattened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoFile {
    pub syntax: Option<String>,
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub messages: Vec<MessageDef>,
    pub enums: Vec<EnumDef>,
}

impl ProtoFile {
    pub fn parse(source: &str) -> std::result::Result<Self, String> {
        let tokens = tokenize(source)?;
        Parser { tokens, pos: 0 }.parse_file()
    }

    pub fn message(&self, name: &str) -> Option<&MessageDef> {
        self.messages.iter().find(|m| m.name == name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    fn is_proto3(&self) -> bool {
        self.syntax.as_deref() == Some("proto3")
    }

    /// Declared type names, both bare and package-qualified
    fn declared_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for name in self.messages.iter().map(|m| &m.name).chain(self.enums.iter().map(|e| &e.name)) {
            names.insert(name.clone());
            if let Some(package) = &self.package {
                names.insert(format!("{}.{}", package, name));
            }
        }
        names
    }

    fn is_enum_type(&self, type_name: &str) -> bool {
        let simple = simple_name(type_name);
        self.enums.iter().any(|e| simple_name(&e.name) == simple)
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(String),
    Str(String),
    Symbol(char),
}

#[derive(Debug, Clone)]
struct Lexed {
    token: Token,
    line: usize,
}

fn tokenize(source: &str) -> std::result::Result<Vec<Lexed>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => return Err(format!("line {}: unterminated block comment", start)),
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => {
                            line += 1;
                            i += 1;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None | Some('\n') => return Err(format!("line {}: unterminated string", line)),
                        Some('\\') => {
                            if let Some(escaped) = chars.get(i + 1) {
                                value.push(*escaped);
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Lexed { token: Token::Str(value), line });
            }
            c if c.is_ascii_alphabetic() || c == '_' || (c == '.' && chars.get(i + 1).map_or(false, |n| n.is_ascii_alphabetic())) => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Lexed { token: Token::Ident(chars[start..i].iter().collect()), line });
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Lexed { token: Token::Int(chars[start..i].iter().collect()), line });
            }
            _ => {
                tokens.push(Lexed { token: Token::Symbol(c), line });
                i += 1;
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Lexed>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        self.pos += 1;
        token
    }

    fn error(&self, expected: &str) -> String {
        match self.peek() {
            Some(found) => format!("line {}: expected {}, found {}", self.line(), expected, describe(found)),
            None => format!("line {}: expected {}, found end of input", self.line(), expected),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(id)) if id == keyword)
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if self.peek() == Some(&Token::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> std::result::Result<(), String> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.error(&format!("'{}'", symbol)))
        }
    }

    fn expect_ident(&mut self) -> std::result::Result<String, String> {
        match self.peek() {
            Some(Token::Ident(id)) => {
                let id = id.clone();
                self.pos += 1;
                Ok(id)
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn expect_str(&mut self) -> std::result::Result<String, String> {
        match self.peek() {
            Some(Token::Str(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.error("string literal")),
        }
    }

    fn expect_int(&mut self) -> std::result::Result<i64, String> {
        let negative = self.eat_symbol('-');
        let value = match self.peek() {
            Some(Token::Int(raw)) => parse_int(raw).ok_or_else(|| self.error("integer"))?,
            _ => return Err(self.error("integer")),
        };
        self.pos += 1;
        Ok(if negative { -value } else { value })
    }

    /// Skip to the end of the current statement, stepping over aggregate values
    fn skip_statement(&mut self) -> std::result::Result<(), String> {
        let mut depth = 0usize;
        loop {
            match self.next() {
                None => return Err(format!("line {}: unterminated statement", self.line())),
                Some(Token::Symbol('{')) => depth += 1,
                Some(Token::Symbol('}')) => depth = depth.saturating_sub(1),
                Some(Token::Symbol(';')) if depth == 0 => return Ok(()),
                Some(_) => {}
            }
        }
    }

    /// Skip a `{ ... }` block, starting before its opening brace
    fn skip_block(&mut self) -> std::result::Result<(), String> {
        while !self.eat_symbol('{') {
            if self.next().is_none() {
                return Err(format!("line {}: expected '{{'", self.line()));
            }
        }
        let mut depth = 1usize;
        while depth > 0 {
            match self.next() {
                None => return Err(format!("line {}: unterminated block", self.line())),
                Some(Token::Symbol('{')) => depth += 1,
                Some(Token::Symbol('}')) => depth -= 1,
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn skip_field_options(&mut self) -> std::result::Result<(), String> {
        if !self.eat_symbol('[') {
            return Ok(());
        }
        let mut depth = 1usize;
        while depth > 0 {
            match self.next() {
                None => return Err(format!("line {}: unterminated field options", self.line())),
                Some(Token::Symbol('[')) => depth += 1,
                Some(Token::Symbol(']')) => depth -= 1,
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn parse_file(mut self) -> std::result::Result<ProtoFile, String> {
        let mut file = ProtoFile::default();

        while let Some(token) = self.peek().cloned() {
            match token {
                Token::Ident(ref kw) if kw == "syntax" || kw == "edition" => {
                    self.pos += 1;
                    self.expect_symbol('=')?;
                    file.syntax = Some(self.expect_str()?);
                    self.expect_symbol(';')?;
                }
                Token::Ident(ref kw) if kw == "package" => {
                    self.pos += 1;
                    file.package = Some(self.expect_ident()?);
                    self.expect_symbol(';')?;
                }
                Token::Ident(ref kw) if kw == "import" => {
                    self.pos += 1;
                    if self.is_keyword("public") || self.is_keyword("weak") {
                        self.pos += 1;
                    }
                    file.imports.push(self.expect_str()?);
                    self.expect_symbol(';')?;
                }
                Token::Ident(ref kw) if kw == "option" => self.skip_statement()?,
                Token::Ident(ref kw) if kw == "message" => {
                    self.pos += 1;
                    self.parse_message("", 1, &mut file)?;
                }
                Token::Ident(ref kw) if kw == "enum" => {
                    self.pos += 1;
                    self.parse_enum("", &mut file)?;
                }
                Token::Ident(ref kw) if kw == "service" || kw == "extend" => self.skip_block()?,
                Token::Symbol(';') => self.pos += 1,
                _ => return Err(self.error("top-level declaration")),
            }
        }

        Ok(file)
    }

    fn parse_message(&mut self, scope: &str, depth: usize, file: &mut ProtoFile) -> std::result::Result<(), String> {
        if depth > MAX_NESTING_DEPTH {
            return Err(format!(
                "line {}: messages nested deeper than {}",
                self.line(),
                MAX_NESTING_DEPTH
            ));
        }
        let name = qualify(scope, &self.expect_ident()?);
        self.expect_symbol('{')?;

        let mut message = MessageDef {
            name: name.clone(),
            fields: Vec::new(),
            reserved: Reserved::default(),
        };

        loop {
            match self.peek().cloned() {
                None => return Err(self.error("'}'")),
                Some(Token::Symbol('}')) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Symbol(';')) => self.pos += 1,
                Some(Token::Ident(kw)) => match kw.as_str() {
                    "message" => {
                        self.pos += 1;
                        self.parse_message(&name, depth + 1, file)?;
                    }
                    "enum" => {
                        self.pos += 1;
                        self.parse_enum(&name, file)?;
                    }
                    "option" | "extensions" => self.skip_statement()?,
                    "extend" => self.skip_block()?,
                    "reserved" => {
                        self.pos += 1;
                        self.parse_reserved(&mut message.reserved)?;
                    }
                    "oneof" => {
                        self.pos += 1;
                        self.expect_ident()?;
                        self.expect_symbol('{')?;
                        loop {
                            if self.eat_symbol('}') {
                                break;
                            }
                            if self.eat_symbol(';') {
                                continue;
                            }
                            if self.is_keyword("option") {
                                self.skip_statement()?;
                                continue;
                            }
                            let field = self.parse_field()?;
                            message.fields.push(field);
                        }
                    }
                    _ => {
                        let field = self.parse_field()?;
                        message.fields.push(field);
                    }
                },
                Some(_) => return Err(self.error("field or declaration")),
            }
        }

        file.messages.push(message);
        Ok(())
    }

    fn parse_field(&mut self) -> std::result::Result<FieldDef, String> {
        let line = self.line();
        let mut label = Label::Optional;
        if self.is_keyword("optional") {
            self.pos += 1;
        } else if self.is_keyword("required") {
            label = Label::Required;
            self.pos += 1;
        } else if self.is_keyword("repeated") {
            label = Label::Repeated;
            self.pos += 1;
        }

        let type_name = if self.is_keyword("map") && self.peek_at(1) == Some(&Token::Symbol('<')) {
            self.pos += 2;
            let key = self.expect_ident()?;
            self.expect_symbol(',')?;
            let value = self.expect_ident()?;
            self.expect_symbol('>')?;
            label = Label::Repeated;
            format!("map<{},{}>", key, value)
        } else {
            let type_name = self.expect_ident()?;
            if type_name == "group" {
                return Err(format!("line {}: groups are not supported", line));
            }
            type_name
        };

        let name = self.expect_ident()?;
        self.expect_symbol('=')?;
        let number = self.expect_int()?;
        self.skip_field_options()?;
        self.expect_symbol(';')?;

        Ok(FieldDef {
            name,
            number,
            type_name,
            label,
            line,
        })
    }

    fn parse_enum(&mut self, scope: &str, file: &mut ProtoFile) -> std::result::Result<(), String> {
        let name = qualify(scope, &self.expect_ident()?);
        self.expect_symbol('{')?;

        let mut def = EnumDef {
            name,
            values: Vec::new(),
            reserved: Reserved::default(),
        };

        loop {
            match self.peek().cloned() {
                None => return Err(self.error("'}'")),
                Some(Token::Symbol('}')) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Symbol(';')) => self.pos += 1,
                Some(Token::Ident(kw)) if kw == "option" => self.skip_statement()?,
                Some(Token::Ident(kw)) if kw == "reserved" => {
                    self.pos += 1;
                    self.parse_reserved(&mut def.reserved)?;
                }
                Some(Token::Ident(value_name)) => {
                    self.pos += 1;
                    self.expect_symbol('=')?;
                    let number = self.expect_int()?;
                    self.skip_field_options()?;
                    self.expect_symbol(';')?;
                    def.values.push((value_name, number));
                }
                Some(_) => return Err(self.error("enum value")),
            }
        }

        file.enums.push(def);
        Ok(())
    }

    fn parse_reserved(&mut self, reserved: &mut Reserved) -> std::result::Result<(), String> {
        loop {
            match self.peek().cloned() {
                Some(Token::Str(name)) | Some(Token::Ident(name)) => {
                    self.pos += 1;
                    reserved.names.push(name);
                }
                _ => {
                    let start = self.expect_int()?;
                    let end = if self.is_keyword("to") {
                        self.pos += 1;
                        if self.is_keyword("max") {
                            self.pos += 1;
                            MAX_FIELD_NUMBER
                        } else {
                            self.expect_int()?
                        }
                    } else {
                        start
                    };
                    reserved.ranges.push((start, end));
                }
            }

            if self.eat_symbol(';') {
                return Ok(());
            }
            self.expect_symbol(',')?;
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(id) => format!("'{}'", id),
        Token::Int(n) => n.clone(),
        Token::Str(s) => format!("\"{}\"", s),
        Token::Symbol(c) => format!("'{}'", c),
    }
}

fn parse_int(raw: &str) -> Option<i64> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if raw.len() > 1 && raw.starts_with('0') {
        i64::from_str_radix(&raw[1..], 8).ok()
    } else {
        raw.parse().ok()
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

fn simple_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

// ---------------------------------------------------------------------------
// Wire compatibility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum WireClass {
    Varint,
    ZigZag,
    Fixed32,
    Fixed64,
    Float,
    Double,
    LengthDelimited,
    Enum,
    Message(String),
    Map(String),
}

fn wire_class(type_name: &str, file: &ProtoFile) -> WireClass {
    match type_name {
        "int32" | "int64" | "uint32" | "uint64" | "bool" => WireClass::Varint,
        "sint32" | "sint64" => WireClass::ZigZag,
        "fixed32" | "sfixed32" => WireClass::Fixed32,
        "fixed64" | "sfixed64" => WireClass::Fixed64,
        "float" => WireClass::Float,
        "double" => WireClass::Double,
        "string" | "bytes" => WireClass::LengthDelimited,
        t if t.starts_with("map<") => WireClass::Map(t.to_string()),
        t if file.is_enum_type(t) => WireClass::Enum,
        t => WireClass::Message(simple_name(t).to_string()),
    }
}

fn wire_compatible(writer: &WireClass, reader: &WireClass) -> bool {
    writer == reader
        || matches!(
            (writer, reader),
            (WireClass::Enum, WireClass::Varint) | (WireClass::Varint, WireClass::Enum)
        )
}

/// Reasons `reader` cannot decode data produced with `writer`
fn compare(reader: &ProtoFile, writer: &ProtoFile, direction: Direction) -> Vec<Violation> {
    let mut violations = Vec::new();

    for writer_message in &writer.messages {
        let Some(reader_message) = reader.message(&writer_message.name) else {
            if direction == Direction::Backward {
                violations.push(Violation::at(
                    format!("message '{}' was removed", writer_message.name),
                    writer_message.name.clone(),
                ));
            }
            continue;
        };
        let context = &writer_message.name;

        for writer_field in &writer_message.fields {
            match reader_message.field_by_number(writer_field.number) {
                Some(reader_field) => {
                    let writer_class = wire_class(&writer_field.type_name, writer);
                    let reader_class = wire_class(&reader_field.type_name, reader);
                    if !wire_compatible(&writer_class, &reader_class) {
                        violations.push(Violation::at(
                            format!(
                                "field '{}' ({}) type changed from {} to {}",
                                reader_field.name, writer_field.number, writer_field.type_name, reader_field.type_name
                            ),
                            context.clone(),
                        ));
                    }
                    if (writer_field.label == Label::Repeated) != (reader_field.label == Label::Repeated) {
                        violations.push(Violation::at(
                            format!(
                                "field '{}' ({}) changed between repeated and singular",
                                reader_field.name, writer_field.number
                            ),
                            context.clone(),
                        ));
                    }
                }
                None if direction == Direction::Backward => {
                    if let Some(renumbered) = reader_message.field_by_name(&writer_field.name) {
                        violations.push(Violation::at(
                            format!(
                                "field '{}' number changed from {} to {}",
                                writer_field.name, writer_field.number, renumbered.number
                            ),
                            context.clone(),
                        ));
                    } else if !reader_message.reserved.contains_number(writer_field.number) {
                        violations.push(Violation::at(
                            format!(
                                "field '{}' ({}) was removed without reserving its number",
                                writer_field.name, writer_field.number
                            ),
                            context.clone(),
                        ));
                    }
                }
                None => {
                    if reader_message.reserved.contains_number(writer_field.number)
                        || reader_message.reserved.contains_name(&writer_field.name)
                    {
                        violations.push(Violation::at(
                            format!(
                                "field '{}' ({}) reuses a reserved number or name",
                                writer_field.name, writer_field.number
                            ),
                            context.clone(),
                        ));
                    }
                }
            }
        }

        for reader_field in &reader_message.fields {
            if direction == Direction::Backward
                && writer_message.field_by_number(reader_field.number).is_none()
                && (writer_message.reserved.contains_number(reader_field.number)
                    || writer_message.reserved.contains_name(&reader_field.name))
            {
                violations.push(Violation::at(
                    format!(
                        "field '{}' ({}) reuses a reserved number or name",
                        reader_field.name, reader_field.number
                    ),
                    context.clone(),
                ));
            }

            if reader_field.label == Label::Required {
                let writer_required = writer_message
                    .field_by_number(reader_field.number)
                    .map_or(false, |f| f.label == Label::Required);
                if !writer_required {
                    violations.push(Violation::at(
                        format!(
                            "field '{}' ({}) is required by the reader but may be absent from written data",
                            reader_field.name, reader_field.number
                        ),
                        context.clone(),
                    ));
                }
            }
        }
    }

    if direction == Direction::Backward {
        for writer_enum in &writer.enums {
            let Some(reader_enum) = reader.enum_def(&writer_enum.name) else {
                violations.push(Violation::at(
                    format!("enum '{}' was removed", writer_enum.name),
                    writer_enum.name.clone(),
                ));
                continue;
            };
            for (value_name, number) in &writer_enum.values {
                if !reader_enum.values.iter().any(|(_, n)| n == number) {
                    violations.push(Violation::at(
                        format!("enum value '{}' ({}) was removed", value_name, number),
                        writer_enum.name.clone(),
                    ));
                }
            }
        }
    }

    violations
}

// ---------------------------------------------------------------------------
// Semantic validation
// ---------------------------------------------------------------------------

fn semantic_violations(file: &ProtoFile, references: &References) -> Vec<Violation> {
    let mut violations = Vec::new();

    let mut declared = file.declared_names();
    let mut resolved_imports = BTreeSet::new();
    for (name, content) in references {
        match ProtoFile::parse(content) {
            Ok(referenced) => {
                declared.extend(referenced.declared_names());
                resolved_imports.insert(name.as_str());
            }
            Err(reason) => violations.push(Violation::at(
                format!("referenced schema cannot be parsed: {}", reason),
                name.clone(),
            )),
        }
    }
    for import in &file.imports {
        if !import.starts_with("google/protobuf/") && !resolved_imports.contains(import.as_str()) {
            violations.push(Violation::new(format!("import '{}' is not resolved", import)));
        }
    }
    let imports_well_known = file.imports.iter().any(|i| i.starts_with("google/protobuf/"));

    for message in &file.messages {
        let mut numbers: BTreeMap<i64, &str> = BTreeMap::new();
        let mut names = BTreeSet::new();

        for field in &message.fields {
            let context = format!("{}.{} (line {})", message.name, field.name, field.line);

            if let Some(previous) = numbers.insert(field.number, &field.name) {
                violations.push(Violation::at(
                    format!("field number {} is already used by '{}'", field.number, previous),
                    context.clone(),
                ));
            }
            if !names.insert(field.name.as_str()) {
                violations.push(Violation::at(
                    format!("field name '{}' is declared twice", field.name),
                    context.clone(),
                ));
            }
            if field.number < 1 || field.number > MAX_FIELD_NUMBER {
                violations.push(Violation::at(
                    format!("field number {} is out of range", field.number),
                    context.clone(),
                ));
            } else if IMPLEMENTATION_RESERVED.contains(&field.number) {
                violations.push(Violation::at(
                    format!("field number {} is reserved for the protobuf implementation", field.number),
                    context.clone(),
                ));
            }
            if message.reserved.contains_number(field.number) || message.reserved.contains_name(&field.name) {
                violations.push(Violation::at(
                    format!("field '{}' ({}) uses a reserved number or name", field.name, field.number),
                    context.clone(),
                ));
            }
            if field.label == Label::Required && file.is_proto3() {
                violations.push(Violation::at("required fields are not allowed in proto3", context.clone()));
            }

            let mut referenced_types = Vec::new();
            if let Some(inner) = field.type_name.strip_prefix("map<").and_then(|t| t.strip_suffix('>')) {
                if let Some((key, value)) = inner.split_once(',') {
                    if !matches!(key, "int32" | "int64" | "uint32" | "uint64" | "sint32" | "sint64"
                        | "fixed32" | "fixed64" | "sfixed32" | "sfixed64" | "bool" | "string")
                    {
                        violations.push(Violation::at(format!("invalid map key type '{}'", key), context.clone()));
                    }
                    referenced_types.push(value);
                }
            } else {
                referenced_types.push(field.type_name.as_str());
            }

            for type_name in referenced_types {
                if SCALAR_TYPES.contains(&type_name) {
                    continue;
                }
                let bare = type_name.trim_start_matches('.');
                if imports_well_known && bare.starts_with("google.protobuf.") {
                    continue;
                }
                if !resolves(bare, &message.name, &declared) {
                    violations.push(Violation::at(format!("unknown type '{}'", type_name), context.clone()));
                }
            }
        }
    }

    for def in &file.enums {
        let mut names = BTreeSet::new();
        if file.is_proto3() && def.values.first().map_or(false, |(_, n)| *n != 0) {
            violations.push(Violation::at("first enum value must be zero in proto3", def.name.clone()));
        }
        for (value_name, number) in &def.values {
            if !names.insert(value_name.as_str()) {
                violations.push(Violation::at(
                    format!("enum value '{}' is declared twice", value_name),
                    def.name.clone(),
                ));
            }
            if def.reserved.contains_number(*number) || def.reserved.contains_name(value_name) {
                violations.push(Violation::at(
                    format!("enum value '{}' ({}) uses a reserved number or name", value_name, number),
                    def.name.clone(),
                ));
            }
        }
    }

    violations
}

/// Resolve a type reference the way protoc searches scopes: innermost first
fn resolves(type_name: &str, scope: &str, declared: &BTreeSet<String>) -> bool {
    let mut scope = scope.to_string();
    loop {
        if declared.contains(&qualify(&scope, type_name)) {
            return true;
        }
        match scope.rfind('.') {
            Some(idx) => scope.truncate(idx),
            None if !scope.is_empty() => scope.clear(),
            None => return false,
        }
    }
}

/// Engine for Protocol Buffers schemas
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufEngine;

impl CheckerEngine for ProtobufEngine {
    type Parsed = ProtoFile;

    fn format(&self) -> FormatId {
        FormatId::Protobuf
    }

    fn parse(&self, content: &str) -> std::result::Result<ProtoFile, String> {
        ProtoFile::parse(content)
    }

    fn check_pair(&self, direction: Direction, existing: &ProtoFile, candidate: &ProtoFile) -> Vec<Violation> {
        match direction {
            Direction::Backward => compare(candidate, existing, direction),
            Direction::Forward => compare(existing, candidate, direction),
        }
    }

    fn validate(&self, level: ValidityLevel, schema: &str, references: &References) -> Result<Vec<Violation>> {
        if level == ValidityLevel::None {
            return Ok(Vec::new());
        }

        let file = match ProtoFile::parse(schema) {
            Ok(file) => file,
            Err(reason) => return Ok(vec![Violation::new(format!("invalid protobuf syntax: {}", reason))]),
        };

        Ok(match level {
            ValidityLevel::Full => semantic_violations(&file, references),
            _ => Vec::new(),
        })
    }
}
