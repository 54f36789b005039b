//! XML Schema engine
//!
//! Schemas are read with `roxmltree` into an owned element model. Compatibility
//! compares element trees: a reader must accept every element, attribute and
//! occurrence the writer can produce.
//!
//! XML Schema defines no evolution rules, so this comparison is local policy
//! and not a port of an existing checker.

use std::collections::{BTreeMap, BTreeSet};

use roxmltree::{Document, Node};

use super::{CheckerEngine, References};
use crate::error::{CheckError, Result};
use crate::level::{Direction, ValidityLevel};
use crate::schema::FormatId;
use crate::verdict::Violation;

pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

const BUILTIN_TYPES: &[&str] = &[
    "anyType", "anySimpleType", "string", "normalizedString", "token", "language", "Name",
    "NCName", "ID", "IDREF", "IDREFS", "ENTITY", "ENTITIES", "NMTOKEN", "NMTOKENS", "QName",
    "NOTATION", "anyURI", "boolean", "base64Binary", "hexBinary", "decimal", "integer", "long",
    "int", "short", "byte", "nonNegativeInteger", "positiveInteger", "nonPositiveInteger",
    "negativeInteger", "unsignedLong", "unsignedInt", "unsignedShort", "unsignedByte", "float",
    "double", "duration", "dateTime", "dateTimeStamp", "time", "date", "gYearMonth", "gYear",
    "gMonthDay", "gDay", "gMonth",
];

/// Integer types ordered by value space
const NUMERIC_WIDENING: [&str; 6] = ["byte", "short", "int", "long", "integer", "decimal"];

const MAX_DEPTH: usize = 64;

/// Deepest element nesting accepted in schemas and payloads
pub const MAX_DOCUMENT_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Builtin(String),
    Named(String),
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Builtin(name) => write!(f, "xs:{}", name),
            TypeRef::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: String,
    pub type_ref: Option<TypeRef>,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    pub base: Option<TypeRef>,
    pub children: Vec<ElementDecl>,
    pub attributes: Vec<AttributeDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleType {
    pub base: Option<TypeRef>,
    pub enumeration: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDecl {
    /// Local name, or the referenced element's name for `ref` declarations
    pub name: String,
    pub reference: bool,
    pub type_ref: Option<TypeRef>,
    pub min_occurs: u64,
    /// `None` is unbounded
    pub max_occurs: Option<u64>,
    pub content: Option<Content>,
    pub simple: Option<SimpleType>,
}

/// Owned model of an XML Schema document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XsdSchema {
    pub target_namespace: Option<String>,
    pub elements: BTreeMap<String, ElementDecl>,
    pub complex_types: BTreeMap<String, Content>,
    pub simple_types: BTreeMap<String, SimpleType>,
}

struct ResolvedContent<'a> {
    children: Vec<&'a ElementDecl>,
    attributes: Vec<&'a AttributeDecl>,
}

impl XsdSchema {
    pub fn parse(source: &str) -> std::result::Result<Self, String> {
        let doc = parse_document(source)?;
        let root = doc.root_element();
        if !is_xsd(root, "schema") {
            return Err(format!(
                "root element '{}' is not xs:schema",
                root.tag_name().name()
            ));
        }

        let mut schema = XsdSchema {
            target_namespace: root.attribute("targetNamespace").map(str::to_string),
            ..Default::default()
        };

        for child in root.children().filter(|n| n.is_element()) {
            let name = child.attribute("name").map(str::to_string);
            match (child.tag_name().name(), name) {
                ("element", Some(name)) => {
                    schema.elements.insert(name, parse_element(child, false));
                }
                ("complexType", Some(name)) => {
                    schema.complex_types.insert(name, parse_content(child));
                }
                ("simpleType", Some(name)) => {
                    schema.simple_types.insert(name, parse_simple(child));
                }
                _ => {}
            }
        }

        Ok(schema)
    }

    /// Follow an element `ref` to its top-level declaration
    fn resolve<'a>(&'a self, decl: &'a ElementDecl) -> &'a ElementDecl {
        if decl.reference {
            self.elements.get(&decl.name).unwrap_or(decl)
        } else {
            decl
        }
    }

    /// Complex content of an element, including inherited base content.
    /// `None` means the element has simple content.
    fn content_of<'a>(&'a self, decl: &'a ElementDecl) -> Option<ResolvedContent<'a>> {
        if let Some(content) = &decl.content {
            return Some(self.flatten(content, 0));
        }
        match &decl.type_ref {
            Some(TypeRef::Named(name)) => self.complex_types.get(name).map(|c| self.flatten(c, 0)),
            Some(TypeRef::Builtin(name)) if name == "anyType" => Some(ResolvedContent {
                children: Vec::new(),
                attributes: Vec::new(),
            }),
            _ => None,
        }
    }

    fn flatten<'a>(&'a self, content: &'a Content, depth: usize) -> ResolvedContent<'a> {
        let mut resolved = match &content.base {
            Some(TypeRef::Named(base)) if depth < MAX_DEPTH => match self.complex_types.get(base) {
                Some(base) => self.flatten(base, depth + 1),
                None => ResolvedContent {
                    children: Vec::new(),
                    attributes: Vec::new(),
                },
            },
            _ => ResolvedContent {
                children: Vec::new(),
                attributes: Vec::new(),
            },
        };
        resolved.children.extend(content.children.iter());
        resolved.attributes.extend(content.attributes.iter());
        resolved
    }

    /// Simple type facets for an element or attribute type
    fn simple_type<'a>(&'a self, decl_simple: Option<&'a SimpleType>, type_ref: Option<&'a TypeRef>) -> Option<&'a SimpleType> {
        decl_simple.or_else(|| match type_ref {
            Some(TypeRef::Named(name)) => self.simple_types.get(name),
            _ => None,
        })
    }

    /// Builtin type an element's value is ultimately checked against
    fn builtin_base<'a>(&'a self, type_ref: Option<&'a TypeRef>, simple: Option<&'a SimpleType>) -> Option<&'a str> {
        let mut current = match simple {
            Some(simple) => simple.base.as_ref(),
            None => type_ref,
        };
        for _ in 0..MAX_DEPTH {
            match current {
                Some(TypeRef::Builtin(name)) => return Some(name.as_str()),
                Some(TypeRef::Named(name)) => current = self.simple_types.get(name)?.base.as_ref(),
                None => return None,
            }
        }
        None
    }
}

fn is_xsd(node: Node, local: &str) -> bool {
    node.is_element() && node.tag_name().namespace() == Some(XSD_NAMESPACE) && node.tag_name().name() == local
}

fn type_ref(node: Node, qname: &str) -> TypeRef {
    let (prefix, local) = match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    };
    if node.lookup_namespace_uri(prefix) == Some(XSD_NAMESPACE) {
        TypeRef::Builtin(local.to_string())
    } else {
        TypeRef::Named(local.to_string())
    }
}

fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

fn parse_occurs(value: Option<&str>) -> Option<u64> {
    match value {
        None => Some(1),
        Some("unbounded") => None,
        Some(n) => Some(n.trim().parse().unwrap_or(1)),
    }
}

fn parse_element(node: Node, optional: bool) -> ElementDecl {
    let (name, reference) = match (node.attribute("name"), node.attribute("ref")) {
        (Some(name), _) => (name.to_string(), false),
        (None, Some(reference)) => (local_name(reference).to_string(), true),
        (None, None) => (String::new(), false),
    };

    let mut decl = ElementDecl {
        name,
        reference,
        type_ref: node.attribute("type").map(|t| type_ref(node, t)),
        min_occurs: if optional {
            0
        } else {
            node.attribute("minOccurs")
                .and_then(|n| n.trim().parse().ok())
                .unwrap_or(1)
        },
        max_occurs: parse_occurs(node.attribute("maxOccurs")),
        content: None,
        simple: None,
    };

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "complexType" => decl.content = Some(parse_content(child)),
            "simpleType" => decl.simple = Some(parse_simple(child)),
            _ => {}
        }
    }

    decl
}

fn parse_content(node: Node) -> Content {
    let mut content = Content::default();
    collect_content(node, false, &mut content);
    content
}

fn collect_content(node: Node, optional: bool, content: &mut Content) {
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "sequence" | "all" => {
                let nested_optional = optional || child.attribute("minOccurs") == Some("0");
                collect_content(child, nested_optional, content);
            }
            "choice" => collect_content(child, true, content),
            "complexContent" | "simpleContent" => collect_content(child, optional, content),
            "extension" | "restriction" => {
                content.base = child.attribute("base").map(|b| type_ref(child, b));
                collect_content(child, optional, content);
            }
            "element" => content.children.push(parse_element(child, optional)),
            "attribute" => {
                let name = child
                    .attribute("name")
                    .or_else(|| child.attribute("ref").map(local_name))
                    .unwrap_or_default();
                content.attributes.push(AttributeDecl {
                    name: name.to_string(),
                    type_ref: child.attribute("type").map(|t| type_ref(child, t)),
                    required: child.attribute("use") == Some("required"),
                });
            }
            _ => {}
        }
    }
}

fn parse_simple(node: Node) -> SimpleType {
    let mut simple = SimpleType::default();
    if let Some(restriction) = node.children().find(|n| is_xsd(*n, "restriction")) {
        simple.base = restriction.attribute("base").map(|b| type_ref(restriction, b));
        simple.enumeration = restriction
            .children()
            .filter(|n| is_xsd(*n, "enumeration"))
            .filter_map(|n| n.attribute("value").map(str::to_string))
            .collect();
    }
    simple
}

fn builtin_accepts(reader: &str, writer: &str) -> bool {
    if reader == writer || matches!(reader, "string" | "anySimpleType" | "anyType") {
        return true;
    }
    if writer == "float" && reader == "double" {
        return true;
    }
    match (
        NUMERIC_WIDENING.iter().position(|t| *t == writer),
        NUMERIC_WIDENING.iter().position(|t| *t == reader),
    ) {
        (Some(w), Some(r)) => w <= r,
        _ => false,
    }
}

fn occurs(max: Option<u64>) -> String {
    max.map_or_else(|| "unbounded".to_string(), |m| m.to_string())
}

// ---------------------------------------------------------------------------
// Compatibility
// ---------------------------------------------------------------------------

struct Comparison<'a> {
    reader: &'a XsdSchema,
    writer: &'a XsdSchema,
    visited: BTreeSet<String>,
    out: Vec<Violation>,
}

impl<'a> Comparison<'a> {
    fn guard_key(decl: &ElementDecl) -> Option<String> {
        if decl.reference {
            return Some(format!("element:{}", decl.name));
        }
        match &decl.type_ref {
            Some(TypeRef::Named(name)) => Some(format!("type:{}", name)),
            _ => None,
        }
    }

    fn compare_elements(&mut self, reader: &'a ElementDecl, writer: &'a ElementDecl, path: &str) {
        if let (Some(r), Some(w)) = (Self::guard_key(reader), Self::guard_key(writer)) {
            if !self.visited.insert(format!("{}|{}", r, w)) {
                return;
            }
        }

        let reader_el = self.reader.resolve(reader);
        let writer_el = self.writer.resolve(writer);

        match (self.reader.content_of(reader_el), self.writer.content_of(writer_el)) {
            (Some(reader_content), Some(writer_content)) => {
                self.compare_content(reader_content, writer_content, path)
            }
            (None, None) => self.compare_simple(reader_el, writer_el, path),
            _ => self.out.push(Violation::at(
                format!("element '{}' changed between simple and complex content", writer_el.name),
                path,
            )),
        }
    }

    fn compare_simple(&mut self, reader: &'a ElementDecl, writer: &'a ElementDecl, path: &str) {
        let reader_simple = self.reader.simple_type(reader.simple.as_ref(), reader.type_ref.as_ref());
        let writer_simple = self.writer.simple_type(writer.simple.as_ref(), writer.type_ref.as_ref());
        let reader_base = self.reader.builtin_base(reader.type_ref.as_ref(), reader_simple);
        let writer_base = self.writer.builtin_base(writer.type_ref.as_ref(), writer_simple);

        if let (Some(r), Some(w)) = (reader_base, writer_base) {
            if !builtin_accepts(r, w) {
                self.out.push(Violation::at(
                    format!("element '{}' type xs:{} is not accepted as xs:{}", writer.name, w, r),
                    path,
                ));
            }
        }

        let reader_values = reader_simple.map(|s| s.enumeration.as_slice()).unwrap_or_default();
        let writer_values = writer_simple.map(|s| s.enumeration.as_slice()).unwrap_or_default();
        if reader_values.is_empty() {
            return;
        }
        if writer_values.is_empty() {
            self.out.push(Violation::at(
                format!("element '{}' gained an enumeration constraint", writer.name),
                path,
            ));
            return;
        }
        for value in writer_values {
            if !reader_values.contains(value) {
                self.out.push(Violation::at(
                    format!("value '{}' of element '{}' is not allowed by the reader", value, writer.name),
                    path,
                ));
            }
        }
    }

    fn compare_content(&mut self, reader: ResolvedContent<'a>, writer: ResolvedContent<'a>, path: &str) {
        for &writer_child in &writer.children {
            let Some(reader_child) = reader.children.iter().copied().find(|c| c.name == writer_child.name) else {
                self.out.push(Violation::at(
                    format!("element '{}' is not allowed by the reader", writer_child.name),
                    path,
                ));
                continue;
            };

            if reader_child.min_occurs > writer_child.min_occurs {
                self.out.push(Violation::at(
                    format!(
                        "element '{}' minOccurs raised from {} to {}",
                        writer_child.name, writer_child.min_occurs, reader_child.min_occurs
                    ),
                    path,
                ));
            }
            let max_lowered = match (reader_child.max_occurs, writer_child.max_occurs) {
                (Some(r), Some(w)) => r < w,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if max_lowered {
                self.out.push(Violation::at(
                    format!(
                        "element '{}' maxOccurs lowered from {} to {}",
                        writer_child.name,
                        occurs(writer_child.max_occurs),
                        occurs(reader_child.max_occurs)
                    ),
                    path,
                ));
            }

            let child_path = format!("{}/{}", path, writer_child.name);
            self.compare_elements(reader_child, writer_child, &child_path);
        }

        for reader_child in &reader.children {
            if reader_child.min_occurs > 0 && !writer.children.iter().any(|c| c.name == reader_child.name) {
                self.out.push(Violation::at(
                    format!("element '{}' became required", reader_child.name),
                    path,
                ));
            }
        }

        for writer_attr in &writer.attributes {
            match reader.attributes.iter().find(|a| a.name == writer_attr.name) {
                None => self.out.push(Violation::at(
                    format!("attribute '{}' is not allowed by the reader", writer_attr.name),
                    path,
                )),
                Some(reader_attr) => {
                    if let (Some(TypeRef::Builtin(r)), Some(TypeRef::Builtin(w))) =
                        (&reader_attr.type_ref, &writer_attr.type_ref)
                    {
                        if !builtin_accepts(r, w) {
                            self.out.push(Violation::at(
                                format!("attribute '{}' type xs:{} is not accepted as xs:{}", writer_attr.name, w, r),
                                path,
                            ));
                        }
                    }
                }
            }
        }

        for reader_attr in reader.attributes.iter().filter(|a| a.required) {
            let writer_required = writer
                .attributes
                .iter()
                .any(|a| a.name == reader_attr.name && a.required);
            if !writer_required {
                self.out.push(Violation::at(
                    format!("attribute '{}' became required", reader_attr.name),
                    path,
                ));
            }
        }
    }
}

fn compare(reader: &XsdSchema, writer: &XsdSchema, direction: Direction) -> Vec<Violation> {
    let mut comparison = Comparison {
        reader,
        writer,
        visited: BTreeSet::new(),
        out: Vec::new(),
    };

    for (name, writer_el) in &writer.elements {
        let path = format!("/{}", name);
        match reader.elements.get(name) {
            Some(reader_el) => comparison.compare_elements(reader_el, writer_el, &path),
            None if direction == Direction::Backward => comparison
                .out
                .push(Violation::at(format!("element '{}' was removed", name), path)),
            None => {}
        }
    }

    comparison.out
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn line_of(doc: &Document, node: Node) -> String {
    format!("line {}", doc.text_pos_at(node.range().start).row)
}

fn semantic_violations(doc: &Document, references: &References) -> Vec<Violation> {
    let mut violations = Vec::new();
    let root = doc.root_element();
    if !is_xsd(root, "schema") {
        violations.push(Violation::at(
            format!("root element '{}' is not xs:schema", root.tag_name().name()),
            line_of(doc, root),
        ));
        return violations;
    }

    let mut element_names = BTreeSet::new();
    let mut type_names = BTreeSet::new();
    for child in root.children().filter(|n| n.is_element()) {
        let Some(name) = child.attribute("name") else {
            continue;
        };
        let fresh = match child.tag_name().name() {
            "element" => element_names.insert(name.to_string()),
            "complexType" | "simpleType" => type_names.insert(name.to_string()),
            _ => true,
        };
        if !fresh {
            violations.push(Violation::at(
                format!("'{}' is declared more than once", name),
                line_of(doc, child),
            ));
        }
    }

    for (location, content) in references {
        match XsdSchema::parse(content) {
            Ok(referenced) => {
                element_names.extend(referenced.elements.into_keys());
                type_names.extend(referenced.complex_types.into_keys());
                type_names.extend(referenced.simple_types.into_keys());
            }
            Err(reason) => violations.push(Violation::at(
                format!("referenced schema cannot be parsed: {}", reason),
                location.clone(),
            )),
        }
    }

    for node in root.descendants().filter(|n| n.is_element() && n.tag_name().namespace() == Some(XSD_NAMESPACE)) {
        let context = line_of(doc, node);
        match node.tag_name().name() {
            "element" | "attribute" => {
                let kind = node.tag_name().name();
                if node.attribute("name").is_none() && node.attribute("ref").is_none() {
                    violations.push(Violation::at(format!("{} declaration has neither name nor ref", kind), context.clone()));
                }
                if let Some(t) = node.attribute("type") {
                    check_type(node, t, &type_names, &context, &mut violations);
                }
                if let (Some(r), "element") = (node.attribute("ref"), kind) {
                    if !element_names.contains(local_name(r)) {
                        violations.push(Violation::at(format!("unknown element '{}'", r), context.clone()));
                    }
                }
                check_occurs(node, &context, &mut violations);
            }
            "extension" | "restriction" => {
                if let Some(base) = node.attribute("base") {
                    check_type(node, base, &type_names, &context, &mut violations);
                }
            }
            "import" | "include" | "redefine" => {
                if let Some(location) = node.attribute("schemaLocation") {
                    if !references.contains_key(location) {
                        violations.push(Violation::at(
                            format!("schema location '{}' is not resolved", location),
                            context,
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    violations
}

fn check_type(node: Node, qname: &str, declared: &BTreeSet<String>, context: &str, out: &mut Vec<Violation>) {
    match type_ref(node, qname) {
        TypeRef::Builtin(name) if !BUILTIN_TYPES.contains(&name.as_str()) => {
            out.push(Violation::at(format!("unknown built-in type '{}'", qname), context))
        }
        TypeRef::Named(name) if !declared.contains(&name) => {
            out.push(Violation::at(format!("unknown type '{}'", qname), context))
        }
        _ => {}
    }
}

fn check_occurs(node: Node, context: &str, out: &mut Vec<Violation>) {
    let min = match node.attribute("minOccurs").map(|m| m.trim().parse::<u64>()) {
        None => 1,
        Some(Ok(min)) => min,
        Some(Err(_)) => {
            out.push(Violation::at("minOccurs is not a non-negative integer", context));
            return;
        }
    };
    let max = match node.attribute("maxOccurs") {
        None => Some(1),
        Some("unbounded") => None,
        Some(max) => match max.trim().parse::<u64>() {
            Ok(max) => Some(max),
            Err(_) => {
                out.push(Violation::at("maxOccurs is not a non-negative integer or 'unbounded'", context));
                return;
            }
        },
    };
    if let Some(max) = max {
        if min > max {
            out.push(Violation::at(format!("minOccurs {} exceeds maxOccurs {}", min, max), context));
        }
    }
}

// ---------------------------------------------------------------------------
// Message validation
// ---------------------------------------------------------------------------

fn check_builtin_value(builtin: &str, value: &str) -> bool {
    let value = value.trim();
    match builtin {
        "boolean" => matches!(value, "true" | "false" | "1" | "0"),
        "byte" => value.parse::<i8>().is_ok(),
        "short" => value.parse::<i16>().is_ok(),
        "int" => value.parse::<i32>().is_ok(),
        "long" => value.parse::<i64>().is_ok(),
        "integer" => value.parse::<i128>().is_ok(),
        "unsignedByte" => value.parse::<u8>().is_ok(),
        "unsignedShort" => value.parse::<u16>().is_ok(),
        "unsignedInt" => value.parse::<u32>().is_ok(),
        "unsignedLong" | "nonNegativeInteger" => value.parse::<u128>().is_ok(),
        "positiveInteger" => value.parse::<u128>().map_or(false, |n| n > 0),
        "negativeInteger" => value.parse::<i128>().map_or(false, |n| n < 0),
        "nonPositiveInteger" => value.parse::<i128>().map_or(false, |n| n <= 0),
        "decimal" | "float" | "double" => value.parse::<f64>().is_ok(),
        _ => true,
    }
}

/// Parse XML after bounding its element depth; the tree walks here recurse
fn parse_document(source: &str) -> std::result::Result<Document<'_>, String> {
    let depth = nesting_depth(source);
    if depth > MAX_DOCUMENT_DEPTH {
        return Err(format!("elements nested deeper than {}", MAX_DOCUMENT_DEPTH));
    }
    Document::parse(source).map_err(|e| e.to_string())
}

/// Upper bound on element nesting from a scan of the tag markup
fn nesting_depth(source: &str) -> usize {
    let bytes = source.as_bytes();
    let (mut depth, mut max, mut i) = (0usize, 0usize, 0usize);

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let closing = bytes.get(i + 1) == Some(&b'/');
        let markup = matches!(bytes.get(i + 1), Some(b'!') | Some(b'?'));

        let mut quote = None;
        let mut j = i + 1;
        while j < bytes.len() {
            match (quote, bytes[j]) {
                (Some(q), b) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"') | (None, b'\'') if !markup => quote = Some(bytes[j]),
                (None, b'>') => break,
                _ => {}
            }
            j += 1;
        }

        if closing {
            depth = depth.saturating_sub(1);
        } else if !markup {
            max = max.max(depth + 1);
            if bytes.get(j - 1) != Some(&b'/') {
                depth += 1;
            }
        }
        i = j + 1;
    }

    max
}

struct MessageCheck<'a> {
    schema: &'a XsdSchema,
    out: Vec<Violation>,
}

impl<'a> MessageCheck<'a> {
    fn element(&mut self, node: Node, decl: &'a ElementDecl, path: &str) {
        let decl = self.schema.resolve(decl);
        match self.schema.content_of(decl) {
            Some(content) => self.complex(node, content, path),
            None => self.simple(node, decl, path),
        }
    }

    fn complex(&mut self, node: Node, content: ResolvedContent<'a>, path: &str) {
        for attr in &content.attributes {
            if attr.required && node.attribute(attr.name.as_str()).is_none() {
                self.out.push(Violation::at(format!("attribute '{}' is missing", attr.name), path));
            }
        }
        for attr in node.attributes().filter(|a| a.namespace().is_none()) {
            if !content.attributes.iter().any(|a| a.name == attr.name()) {
                self.out.push(Violation::at(format!("attribute '{}' is not declared", attr.name()), path));
            }
        }

        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for child in node.children().filter(|n| n.is_element()) {
            let name = child.tag_name().name();
            let child_path = format!("{}/{}", path, name);
            match content.children.iter().copied().find(|c| c.name == name) {
                Some(decl) => {
                    *counts.entry(name).or_default() += 1;
                    self.element(child, decl, &child_path);
                }
                None => self.out.push(Violation::at(format!("element '{}' is not allowed", name), path)),
            }
        }

        for decl in &content.children {
            let count = counts.get(decl.name.as_str()).copied().unwrap_or(0);
            if count < decl.min_occurs {
                self.out.push(Violation::at(
                    format!("element '{}' occurs {} times, expected at least {}", decl.name, count, decl.min_occurs),
                    path,
                ));
            }
            if let Some(max) = decl.max_occurs {
                if count > max {
                    self.out.push(Violation::at(
                        format!("element '{}' occurs {} times, expected at most {}", decl.name, count, max),
                        path,
                    ));
                }
            }
        }
    }

    fn simple(&mut self, node: Node, decl: &'a ElementDecl, path: &str) {
        if node.children().any(|n| n.is_element()) {
            self.out.push(Violation::at(
                format!("element '{}' must not contain child elements", decl.name),
                path,
            ));
            return;
        }

        let text = node.text().unwrap_or_default();
        let simple = self.schema.simple_type(decl.simple.as_ref(), decl.type_ref.as_ref());
        if let Some(simple) = simple {
            if !simple.enumeration.is_empty() && !simple.enumeration.iter().any(|v| v == text.trim()) {
                self.out.push(Violation::at(format!("value '{}' is not in the enumeration", text.trim()), path));
                return;
            }
        }
        if let Some(builtin) = self.schema.builtin_base(decl.type_ref.as_ref(), simple) {
            if !check_builtin_value(builtin, text) {
                self.out.push(Violation::at(format!("value '{}' is not a valid xs:{}", text.trim(), builtin), path));
            }
        }
    }
}

/// Engine for XML Schema (XSD) documents
#[derive(Debug, Clone, Copy, Default)]
pub struct XsdEngine;

impl CheckerEngine for XsdEngine {
    type Parsed = XsdSchema;

    fn format(&self) -> FormatId {
        FormatId::Xml
    }

    fn parse(&self, content: &str) -> std::result::Result<XsdSchema, String> {
        XsdSchema::parse(content)
    }

    fn check_pair(&self, direction: Direction, existing: &XsdSchema, candidate: &XsdSchema) -> Vec<Violation> {
        match direction {
            Direction::Backward => compare(candidate, existing, direction),
            Direction::Forward => compare(existing, candidate, direction),
        }
    }

    fn validate(&self, level: ValidityLevel, schema: &str, references: &References) -> Result<Vec<Violation>> {
        if level == ValidityLevel::None {
            return Ok(Vec::new());
        }

        let doc = match parse_document(schema) {
            Ok(doc) => doc,
            Err(e) => return Ok(vec![Violation::new(format!("malformed XML: {}", e))]),
        };

        Ok(match level {
            ValidityLevel::Full => semantic_violations(&doc, references),
            _ => Vec::new(),
        })
    }

    fn validate_message(&self, data: &str, schema: &str) -> Result<Vec<Violation>> {
        let model = XsdSchema::parse(schema).map_err(|reason| CheckError::parse("xml", "schema", reason))?;
        let doc = match parse_document(data) {
            Ok(doc) => doc,
            Err(e) => return Ok(vec![Violation::new(format!("malformed XML: {}", e))]),
        };

        let root = doc.root_element();
        let name = root.tag_name().name();
        let path = format!("/{}", name);
        let Some(decl) = model.elements.get(name) else {
            return Ok(vec![Violation::at(format!("root element '{}' is not declared", name), path)]);
        };

        let mut check = MessageCheck {
            schema: &model,
            out: Vec::new(),
        };
        check.element(root, decl, &path);
        Ok(check.out)
    }
}
