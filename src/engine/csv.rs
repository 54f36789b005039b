//! CSV Schema engine
//!
//! Supports the CSV Schema 1.x prolog (`version`, `@totalColumns`, `@noHeader`,
//! `@ignoreColumnNameCase`, `@separator`) and a practical subset of column rules.
//! Data rows are read with the `csv` crate and checked cell by cell.
//!
//! CSV Schema defines no evolution rules, so the compatibility rules in
//! `compare` are local policy: layout changes (separator, header, column count,
//! column names) break both directions, and a reader column must not demand
//! anything the writer's column did not already guarantee.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;

use super::{CheckerEngine, References};
use crate::error::{CheckError, Result};
use crate::level::{Direction, ValidityLevel};
use crate::schema::FormatId;
use crate::verdict::Violation;

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    NotEmpty,
    Empty,
    Is(String),
    Not(String),
    Starts(String),
    Ends(String),
    Regex(String),
    Any(Vec<String>),
    Range(Option<f64>, Option<f64>),
    Length(Option<usize>, Option<usize>),
    PositiveInteger,
    Uuid4,
    Or(Box<Rule>, Box<Rule>),
}

fn bound<T: fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map_or_else(|| "*".to_string(), ToString::to_string)
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::NotEmpty => f.write_str("notEmpty"),
            Rule::Empty => f.write_str("empty"),
            Rule::Is(s) => write!(f, "is(\"{}\")", s),
            Rule::Not(s) => write!(f, "not(\"{}\")", s),
            Rule::Starts(s) => write!(f, "starts(\"{}\")", s),
            Rule::Ends(s) => write!(f, "ends(\"{}\")", s),
            Rule::Regex(s) => write!(f, "regex(\"{}\")", s),
            Rule::Any(values) => {
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{}\"", v)).collect();
                write!(f, "any({})", quoted.join(","))
            }
            Rule::Range(lo, hi) => write!(f, "range({},{})", bound(lo), bound(hi)),
            Rule::Length(lo, hi) if lo == hi => write!(f, "length({})", bound(lo)),
            Rule::Length(lo, hi) => write!(f, "length({},{})", bound(lo), bound(hi)),
            Rule::PositiveInteger => f.write_str("positiveInteger"),
            Rule::Uuid4 => f.write_str("uuid4"),
            Rule::Or(a, b) => write!(f, "{} or {}", a, b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub rules: Vec<Rule>,
    pub optional: bool,
    pub ignore_case: bool,
    pub line: usize,
}

/// A parsed CSV Schema
#[derive(Debug, Clone, PartialEq)]
pub struct CsvSchema {
    pub version: String,
    pub total_columns: Option<usize>,
    pub no_header: bool,
    pub ignore_column_name_case: bool,
    pub separator: char,
    pub columns: Vec<ColumnDef>,
}

impl Default for CsvSchema {
    fn default() -> Self {
        Self {
            version: String::new(),
            total_columns: None,
            no_header: false,
            ignore_column_name_case: false,
            separator: ',',
            columns: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Str(String),
    Num(String),
    Directive(String),
    Open,
    Close,
    Comma,
    Star,
}

fn lex(text: &str) -> std::result::Result<Vec<Tok>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Tok::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::Close);
                i += 1;
            }
            ',' => {
                tokens.push(Tok::Comma);
                i += 1;
            }
            '*' => {
                tokens.push(Tok::Star);
                i += 1;
            }
            '"' => {
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\\') if chars.get(i + 1) == Some(&'"') => {
                            value.push('"');
                            i += 2;
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Tok::Str(value));
            }
            '@' => {
                let start = i + 1;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                tokens.push(Tok::Directive(chars[start..i].iter().collect()));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Tok::Num(chars[start..i].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Tok::Word(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Num(String),
    Star,
}

struct Tokens {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Tokens {
    fn next(&mut self) -> Option<Tok> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn args(&mut self, rule: &str) -> std::result::Result<Vec<Arg>, String> {
        if self.next() != Some(Tok::Open) {
            return Err(format!("{} expects arguments", rule));
        }
        let mut args = Vec::new();
        loop {
            match self.next() {
                Some(Tok::Close) if args.is_empty() => return Ok(args),
                Some(Tok::Str(s)) => args.push(Arg::Str(s)),
                Some(Tok::Num(n)) => args.push(Arg::Num(n)),
                Some(Tok::Star) => args.push(Arg::Star),
                _ => return Err(format!("malformed arguments to {}", rule)),
            }
            match self.next() {
                Some(Tok::Comma) => continue,
                Some(Tok::Close) => return Ok(args),
                _ => return Err(format!("malformed arguments to {}", rule)),
            }
        }
    }
}

fn single_string(rule: &str, args: Vec<Arg>) -> std::result::Result<String, String> {
    match args.as_slice() {
        [Arg::Str(s)] => Ok(s.clone()),
        _ => Err(format!("{} expects one string argument", rule)),
    }
}

fn number_bound(rule: &str, arg: &Arg) -> std::result::Result<Option<f64>, String> {
    match arg {
        Arg::Star => Ok(None),
        Arg::Num(n) => n
            .parse()
            .map(Some)
            .map_err(|_| format!("{} bound '{}' is not a number", rule, n)),
        Arg::Str(_) => Err(format!("{} expects numeric bounds", rule)),
    }
}

fn length_bound(arg: &Arg) -> std::result::Result<Option<usize>, String> {
    match arg {
        Arg::Star => Ok(None),
        Arg::Num(n) => n
            .parse()
            .map(Some)
            .map_err(|_| format!("length bound '{}' is not a non-negative integer", n)),
        Arg::Str(_) => Err("length expects numeric bounds".to_string()),
    }
}

fn parse_rule(name: &str, tokens: &mut Tokens) -> std::result::Result<Rule, String> {
    Ok(match name {
        "notEmpty" => Rule::NotEmpty,
        "empty" => Rule::Empty,
        "positiveInteger" => Rule::PositiveInteger,
        "uuid4" => Rule::Uuid4,
        "is" => Rule::Is(single_string(name, tokens.args(name)?)?),
        "not" => Rule::Not(single_string(name, tokens.args(name)?)?),
        "starts" => Rule::Starts(single_string(name, tokens.args(name)?)?),
        "ends" => Rule::Ends(single_string(name, tokens.args(name)?)?),
        "regex" => Rule::Regex(single_string(name, tokens.args(name)?)?),
        "any" => {
            let values = tokens
                .args(name)?
                .into_iter()
                .map(|arg| match arg {
                    Arg::Str(s) | Arg::Num(s) => Ok(s),
                    Arg::Star => Err("any expects string values".to_string()),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Rule::Any(values)
        }
        "range" => match tokens.args(name)?.as_slice() {
            [lo, hi] => Rule::Range(number_bound(name, lo)?, number_bound(name, hi)?),
            _ => return Err("range expects two bounds".to_string()),
        },
        "length" => match tokens.args(name)?.as_slice() {
            [exact] => {
                let exact = length_bound(exact)?;
                Rule::Length(exact, exact)
            }
            [lo, hi] => Rule::Length(length_bound(lo)?, length_bound(hi)?),
            _ => return Err("length expects one or two bounds".to_string()),
        },
        other => return Err(format!("unknown rule '{}'", other)),
    })
}

fn parse_column_body(body: &str, column: &mut ColumnDef) -> std::result::Result<(), String> {
    let mut tokens = Tokens { tokens: lex(body)?, pos: 0 };
    let mut pending_or = false;

    while let Some(token) = tokens.next() {
        match token {
            Tok::Directive(d) => match d.as_str() {
                "optional" => column.optional = true,
                "ignoreCase" => column.ignore_case = true,
                other => return Err(format!("unknown column directive '@{}'", other)),
            },
            Tok::Word(w) if w == "or" => {
                if column.rules.is_empty() || pending_or {
                    return Err("'or' must join two rules".to_string());
                }
                pending_or = true;
            }
            Tok::Word(w) => {
                let rule = parse_rule(&w, &mut tokens)?;
                if pending_or {
                    let left = column.rules.pop().ok_or("'or' must join two rules")?;
                    column.rules.push(Rule::Or(Box::new(left), Box::new(rule)));
                    pending_or = false;
                } else {
                    column.rules.push(rule);
                }
            }
            other => return Err(format!("unexpected {:?} in column rules", other)),
        }
    }

    if pending_or {
        return Err("'or' must join two rules".to_string());
    }
    Ok(())
}

fn parse_global_directives(text: &str, schema: &mut CsvSchema) -> std::result::Result<(), String> {
    let mut tokens = Tokens { tokens: lex(text)?, pos: 0 };
    while let Some(token) = tokens.next() {
        let directive = match token {
            Tok::Directive(directive) => directive,
            other => return Err(format!("expected a directive, found {:?}", other)),
        };
        match directive.as_str() {
            "totalColumns" => match tokens.next() {
                Some(Tok::Num(n)) => {
                    schema.total_columns =
                        Some(n.parse().map_err(|_| format!("@totalColumns '{}' is not a count", n))?)
                }
                _ => return Err("@totalColumns expects a number".to_string()),
            },
            "noHeader" => schema.no_header = true,
            "ignoreColumnNameCase" => schema.ignore_column_name_case = true,
            "separator" => {
                schema.separator = match tokens.next() {
                    Some(Tok::Word(w)) if w == "TAB" => '\t',
                    Some(Tok::Str(s)) if s == "\\t" => '\t',
                    Some(Tok::Str(s)) if s.chars().count() == 1 => s.chars().next().unwrap_or(','),
                    _ => return Err("@separator expects a single character or TAB".to_string()),
                }
            }
            "quoted" | "permitEmpty" => {}
            other => return Err(format!("unknown directive '@{}'", other)),
        }
        while matches!(tokens.peek(), Some(Tok::Comma)) {
            tokens.next();
        }
    }
    Ok(())
}

/// Split `name: rules` at the first colon outside quotes
fn split_column(line: &str) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    for (idx, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => return Some((&line[..idx], &line[idx + 1..])),
            _ => {}
        }
    }
    None
}

impl CsvSchema {
    pub fn parse(source: &str) -> std::result::Result<Self, String> {
        let mut schema = CsvSchema::default();
        let mut seen_version = false;

        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let at = |e: String| format!("line {}: {}", line_no, e);

            if !seen_version {
                let rest = line
                    .strip_prefix("version")
                    .filter(|r| r.starts_with(char::is_whitespace))
                    .ok_or_else(|| at("schema must start with a version declaration".to_string()))?
                    .trim_start();
                let (version, directives) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if !matches!(version, "1.0" | "1.1") {
                    return Err(at(format!("unsupported version '{}'", version)));
                }
                schema.version = version.to_string();
                parse_global_directives(directives, &mut schema).map_err(at)?;
                seen_version = true;
                continue;
            }

            if line.starts_with('@') && schema.columns.is_empty() {
                parse_global_directives(line, &mut schema).map_err(at)?;
                continue;
            }

            let (name, body) = split_column(line).ok_or_else(|| at("expected a column definition".to_string()))?;
            let name = name.trim();
            let name = name
                .strip_prefix('"')
                .and_then(|n| n.strip_suffix('"'))
                .unwrap_or(name);
            if name.is_empty() {
                return Err(at("column name is empty".to_string()));
            }

            let mut column = ColumnDef {
                name: name.to_string(),
                rules: Vec::new(),
                optional: false,
                ignore_case: false,
                line: line_no,
            };
            parse_column_body(body, &mut column).map_err(at)?;
            schema.columns.push(column);
        }

        if !seen_version {
            return Err("schema is empty".to_string());
        }
        Ok(schema)
    }

    fn names_match(&self, a: &str, b: &str) -> bool {
        if self.ignore_column_name_case {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }
}

// ---------------------------------------------------------------------------
// Rule evaluation
// ---------------------------------------------------------------------------

fn is_uuid4(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == 5
        && groups
            .iter()
            .zip(lengths)
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
        && groups[2].starts_with('4')
        && groups[3].starts_with(|c: char| matches!(c.to_ascii_lowercase(), '8' | '9' | 'a' | 'b'))
}

fn collect_patterns<'a>(rule: &'a Rule, out: &mut Vec<&'a str>) {
    match rule {
        Rule::Regex(pattern) => out.push(pattern),
        Rule::Or(a, b) => {
            collect_patterns(a, out);
            collect_patterns(b, out);
        }
        _ => {}
    }
}

/// Compile every regex used by `schema`, anchored to the whole cell
fn compile_patterns(schema: &CsvSchema) -> std::result::Result<BTreeMap<String, Regex>, (String, regex::Error)> {
    let mut compiled = BTreeMap::new();
    for column in &schema.columns {
        let mut patterns = Vec::new();
        for rule in &column.rules {
            collect_patterns(rule, &mut patterns);
        }
        for pattern in patterns {
            if !compiled.contains_key(pattern) {
                let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| (pattern.to_string(), e))?;
                compiled.insert(pattern.to_string(), regex);
            }
        }
    }
    Ok(compiled)
}

fn evaluate(rule: &Rule, value: &str, ignore_case: bool, patterns: &BTreeMap<String, Regex>) -> bool {
    let eq = |a: &str, b: &str| if ignore_case { a.to_lowercase() == b.to_lowercase() } else { a == b };
    let folded = |s: &str| if ignore_case { s.to_lowercase() } else { s.to_string() };

    match rule {
        Rule::NotEmpty => !value.is_empty(),
        Rule::Empty => value.is_empty(),
        Rule::Is(expected) => eq(value, expected.as_str()),
        Rule::Not(unexpected) => !eq(value, unexpected.as_str()),
        Rule::Starts(prefix) => folded(value).starts_with(&folded(prefix.as_str())),
        Rule::Ends(suffix) => folded(value).ends_with(&folded(suffix.as_str())),
        Rule::Regex(pattern) => patterns.get(pattern).map_or(false, |re| re.is_match(value)),
        Rule::Any(values) => values.iter().any(|v| eq(value, v.as_str())),
        Rule::Range(lo, hi) => value.trim().parse::<f64>().map_or(false, |n| {
            lo.map_or(true, |lo| n >= lo) && hi.map_or(true, |hi| n <= hi)
        }),
        Rule::Length(lo, hi) => {
            let len = value.chars().count();
            lo.map_or(true, |lo| len >= lo) && hi.map_or(true, |hi| len <= hi)
        }
        Rule::PositiveInteger => !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()),
        Rule::Uuid4 => is_uuid4(value),
        Rule::Or(a, b) => evaluate(a, value, ignore_case, patterns) || evaluate(b, value, ignore_case, patterns),
    }
}

// ---------------------------------------------------------------------------
// Compatibility and validation
// ---------------------------------------------------------------------------

fn compare(reader: &CsvSchema, writer: &CsvSchema) -> Vec<Violation> {
    let mut violations = Vec::new();

    if reader.separator != writer.separator {
        violations.push(Violation::new(format!(
            "separator changed from {:?} to {:?}",
            writer.separator, reader.separator
        )));
    }
    if reader.no_header != writer.no_header {
        violations.push(Violation::new(if reader.no_header {
            "header row is no longer expected"
        } else {
            "header row is now expected"
        }));
    }
    if reader.columns.len() != writer.columns.len() {
        violations.push(Violation::new(format!(
            "column count changed from {} to {}",
            writer.columns.len(),
            reader.columns.len()
        )));
    }

    for (position, (reader_col, writer_col)) in reader.columns.iter().zip(&writer.columns).enumerate() {
        let context = format!("column '{}'", reader_col.name);

        if !reader.no_header && !writer.no_header && !reader.names_match(&reader_col.name, &writer_col.name) {
            violations.push(Violation::at(
                format!(
                    "column {} renamed from '{}' to '{}'",
                    position + 1,
                    writer_col.name,
                    reader_col.name
                ),
                context.clone(),
            ));
        }
        if writer_col.optional && !reader_col.optional {
            violations.push(Violation::at("column is no longer optional", context.clone()));
        }
        if writer_col.ignore_case && !reader_col.ignore_case {
            violations.push(Violation::at("column no longer ignores case", context.clone()));
        }

        let writer_rules: BTreeSet<String> = writer_col.rules.iter().map(ToString::to_string).collect();
        for rule in &reader_col.rules {
            let rendered = rule.to_string();
            if !writer_rules.contains(&rendered) {
                violations.push(Violation::at(
                    format!("rule {} is not guaranteed by the previous definition", rendered),
                    context.clone(),
                ));
            }
        }
    }

    violations
}

fn semantic_violations(schema: &CsvSchema) -> Vec<Violation> {
    let mut violations = Vec::new();

    if schema.columns.is_empty() {
        violations.push(Violation::new("no columns are defined"));
    }
    if let Some(total) = schema.total_columns {
        if total != schema.columns.len() {
            violations.push(Violation::new(format!(
                "@totalColumns is {} but {} columns are defined",
                total,
                schema.columns.len()
            )));
        }
    }

    let mut names = BTreeSet::new();
    for column in &schema.columns {
        let context = format!("column '{}' (line {})", column.name, column.line);
        let key = if schema.ignore_column_name_case {
            column.name.to_lowercase()
        } else {
            column.name.clone()
        };
        if !schema.no_header && !names.insert(key) {
            violations.push(Violation::at("column is defined more than once", context.clone()));
        }

        let mut stack: Vec<&Rule> = column.rules.iter().collect();
        while let Some(rule) = stack.pop() {
            match rule {
                Rule::Regex(pattern) => {
                    if let Err(e) = Regex::new(pattern) {
                        violations.push(Violation::at(format!("invalid regex '{}': {}", pattern, e), context.clone()));
                    }
                }
                Rule::Range(Some(lo), Some(hi)) if lo > hi => {
                    violations.push(Violation::at("range lower bound exceeds upper bound", context.clone()));
                }
                Rule::Length(Some(lo), Some(hi)) if lo > hi => {
                    violations.push(Violation::at("length lower bound exceeds upper bound", context.clone()));
                }
                Rule::Any(values) if values.is_empty() => {
                    violations.push(Violation::at("any() needs at least one value", context.clone()));
                }
                Rule::Or(a, b) => {
                    stack.push(b);
                    stack.push(a);
                }
                _ => {}
            }
        }
    }

    violations
}

/// Engine for CSV Schema definitions and CSV data
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvEngine;

impl CheckerEngine for CsvEngine {
    type Parsed = CsvSchema;

    fn format(&self) -> FormatId {
        FormatId::Csv
    }

    fn parse(&self, content: &str) -> std::result::Result<CsvSchema, String> {
        CsvSchema::parse(content)
    }

    fn check_pair(&self, direction: Direction, existing: &CsvSchema, candidate: &CsvSchema) -> Vec<Violation> {
        match direction {
            Direction::Backward => compare(candidate, existing),
            Direction::Forward => compare(existing, candidate),
        }
    }

    fn validate(&self, level: ValidityLevel, schema: &str, _references: &References) -> Result<Vec<Violation>> {
        if level == ValidityLevel::None {
            return Ok(Vec::new());
        }

        let parsed = match CsvSchema::parse(schema) {
            Ok(parsed) => parsed,
            Err(reason) => return Ok(vec![Violation::new(format!("invalid CSV schema: {}", reason))]),
        };

        Ok(match level {
            ValidityLevel::Full => semantic_violations(&parsed),
            _ => Vec::new(),
        })
    }

    fn validate_message(&self, data: &str, schema: &str) -> Result<Vec<Violation>> {
        let schema = CsvSchema::parse(schema).map_err(|reason| CheckError::parse("csv", "schema", reason))?;
        let patterns = compile_patterns(&schema)
            .map_err(|(pattern, e)| CheckError::parse("csv", "schema", format!("invalid regex '{}': {}", pattern, e)))?;

        let delimiter = u8::try_from(schema.separator)
            .map_err(|_| CheckError::parse("csv", "schema", "separator must be a single-byte character"))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(data.as_bytes());

        let mut violations = Vec::new();
        let expected = schema.columns.len();
        let mut row_number = 0usize;

        for (index, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    violations.push(Violation::new(format!("malformed CSV: {}", e)));
                    break;
                }
            };

            if index == 0 && !schema.no_header {
                if record.len() != expected {
                    violations.push(Violation::at(
                        format!("expected {} columns, found {}", expected, record.len()),
                        "header",
                    ));
                    continue;
                }
                for (position, (found, column)) in record.iter().zip(&schema.columns).enumerate() {
                    if !schema.names_match(found.trim(), &column.name) {
                        violations.push(Violation::at(
                            format!("header '{}' does not match column '{}'", found, column.name),
                            format!("header, column {}", position + 1),
                        ));
                    }
                }
                continue;
            }

            row_number += 1;
            if record.len() != expected {
                violations.push(Violation::at(
                    format!("expected {} columns, found {}", expected, record.len()),
                    format!("row {}", row_number),
                ));
                continue;
            }

            for (value, column) in record.iter().zip(&schema.columns) {
                if value.is_empty() && column.optional {
                    continue;
                }
                for rule in &column.rules {
                    if !evaluate(rule, value, column.ignore_case, &patterns) {
                        violations.push(Violation::at(
                            format!("value '{}' does not satisfy {}", value, rule),
                            format!("row {}, column '{}'", row_number, column.name),
                        ));
                    }
                }
            }
        }

        Ok(violations)
    }
}
