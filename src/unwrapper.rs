// =============================================================================
// UNWRAPPER MODULE
// =============================================================================
// Recovers the stock records from the ERP's SOAP response.
//
// The payload is nested several layers deep:
//
//   SOAP Envelope
//     └─ Body                (soapenv:Body | soap:Body | Body)
//         └─ runResponse     (wss:runResponse | runResponse)
//             └─ runReturn
//                 └─ resultXml   string, text object, or xsi:type'd object
//                     └─ CDATA
//                         └─ JSON { "DETAILS": [...] }
//
// The ERP is not consistent about namespace prefixes or about how it types
// the result node, so each layer is matched tolerantly.
//
// TREE CONVENTION
// ---------------
// The XML is first parsed into a `serde_json::Value` tree:
// - the root element itself is dropped; the tree is the root's content
// - an element with neither attributes nor child elements becomes a String
//   holding its trimmed text (CDATA content included, markers removed)
// - any other element becomes an Object: attributes and child elements are
//   keys under their qualified names (`soapenv:Body`, `xsi:type`), and
//   non-empty text goes under the `_` key
// - a name seen once maps to a single value; a name seen more than once maps
//   to an Array in document order. Navigation takes the first entry of an
//   Array, so both shapes read the same.
// =============================================================================

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::ResultPayload;

// =============================================================================
// PATH TO THE RESULT NODE
// =============================================================================
// Each step lists the names a node is known to appear under, in priority
// order. Supporting a new alias means adding it here.

/// Key used for element text when the element also has attributes or children
pub const TEXT_KEY: &str = "_";

/// Envelope body
pub const BODY_ALIASES: &[&str] = &["soapenv:Body", "soap:Body", "Body"];

/// Operation result inside the body
pub const RUN_RESPONSE_ALIASES: &[&str] = &["wss:runResponse", "runResponse"];

const RESULT_PATH: &[&[&str]] = &[BODY_ALIASES, RUN_RESPONSE_ALIASES, &["runReturn"], &["resultXml"]];

const TYPE_ATTRIBUTE: &str = "xsi:type";

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

// =============================================================================
// ERRORS
// =============================================================================
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnwrapError {
    /// The body is not well-formed XML
    #[error("malformed upstream xml: {0}")]
    MalformedXml(String),

    /// The path to resultXml is broken, or resultXml has no usable text
    #[error("result node not found")]
    ResultNodeNotFound,

    /// resultXml text is not JSON
    #[error("invalid embedded json: {0}")]
    InvalidEmbeddedJson(String),
}

// =============================================================================
// RESULT NODE
// =============================================================================
/// The shapes `resultXml` has been seen in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultNode {
    /// `<resultXml>...</resultXml>`
    Bare(String),

    /// An element with attributes other than a type tag; text under `_`
    Text(String),

    /// `<resultXml xsi:type="xsd:string">...</resultXml>`, any type name
    Typed { type_name: String, text: String },
}

impl ResultNode {
    /// Classify a node from the parsed tree.
    ///
    /// An object is accepted whenever it carries text under `_`; the type
    /// tag, if any, is recorded but not checked. Objects without text and
    /// non-scalar values give `None`.
    pub fn from_value(node: &Value) -> Option<Self> {
        match node {
            Value::String(text) => Some(ResultNode::Bare(text.clone())),
            Value::Object(map) => {
                let Some(Value::String(text)) = map.get(TEXT_KEY) else {
                    return None;
                };

                match map.get(TYPE_ATTRIBUTE).and_then(Value::as_str) {
                    Some(type_name) => Some(ResultNode::Typed {
                        type_name: type_name.to_string(),
                        text: text.clone(),
                    }),
                    None => Some(ResultNode::Text(text.clone())),
                }
            }
            _ => None,
        }
    }

    /// Collapse any shape to its text
    pub fn into_text(self) -> String {
        match self {
            ResultNode::Bare(text) | ResultNode::Text(text) => text,
            ResultNode::Typed { text, .. } => text,
        }
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Extract the stock payload from a raw SOAP response body.
pub fn unwrap(raw_body: &str) -> Result<ResultPayload, UnwrapError> {
    let tree = parse_tree(raw_body)?;

    let node = locate(&tree, RESULT_PATH).ok_or(UnwrapError::ResultNodeNotFound)?;

    let node = ResultNode::from_value(node).ok_or(UnwrapError::ResultNodeNotFound)?;
    if let ResultNode::Typed { type_name, .. } = &node {
        tracing::trace!(%type_name, "Typed result node");
    }

    let text = node.into_text();
    if text.is_empty() {
        return Err(UnwrapError::ResultNodeNotFound);
    }

    let json = strip_cdata(&text);

    let parsed: Value = serde_json::from_str(json)
        .map_err(|e| UnwrapError::InvalidEmbeddedJson(e.to_string()))?;

    Ok(payload_from_json(parsed))
}

/// Remove one leading `<![CDATA[` and one trailing `]]>` if the text carries
/// a CDATA marker. Whitespace is left alone.
pub fn strip_cdata(text: &str) -> &str {
    if !text.contains(CDATA_OPEN) {
        return text;
    }

    let text = text.strip_prefix(CDATA_OPEN).unwrap_or(text);
    text.strip_suffix(CDATA_CLOSE).unwrap_or(text)
}

/// Walk `path` from `tree`, trying each step's aliases in order.
pub fn locate<'a>(tree: &'a Value, path: &[&[&str]]) -> Option<&'a Value> {
    path.iter().try_fold(tree, |node, aliases| first_present(node, aliases))
}

/// First alias present on `node`. Arrays resolve to their first entry.
fn first_present<'a>(node: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    let map = node.as_object()?;
    let found = aliases.iter().find_map(|alias| map.get(*alias))?;

    match found {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn payload_from_json(parsed: Value) -> ResultPayload {
    let Value::Object(mut map) = parsed else {
        return ResultPayload::default();
    };

    let details = match map.remove("DETAILS") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        // A lone record, same convention as the XML tree
        Some(single) => vec![single],
    };

    ResultPayload {
        details,
        header: map.remove("HEADER"),
    }
}

// =============================================================================
// XML TREE
// =============================================================================

/// An element still open while reading
struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, UnwrapError> {
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(malformed)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(malformed)?.into_owned();
            insert_merged(&mut fields, key, Value::String(value));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            fields,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let text = self.text.trim();
        let value = if self.fields.is_empty() {
            Value::String(text.to_string())
        } else {
            let mut fields = self.fields;
            if !text.is_empty() {
                fields.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
            }
            Value::Object(fields)
        };
        (self.name, value)
    }
}

/// Parse `xml` into the tree described at the top of this module.
pub fn parse_tree(xml: &str) -> Result<Value, UnwrapError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let frame = Frame::open(&start)?;
                attach(&mut stack, &mut root, frame)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| UnwrapError::MalformedXml("unexpected closing tag".into()))?;
                attach(&mut stack, &mut root, frame)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(malformed)?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(cdata) => {
                let bytes = cdata.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&bytes))?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctypes
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(UnwrapError::MalformedXml(format!("unclosed element <{}>", open.name)));
    }

    root.ok_or_else(|| UnwrapError::MalformedXml("no root element".into()))
}

fn attach(stack: &mut [Frame], root: &mut Option<Value>, frame: Frame) -> Result<(), UnwrapError> {
    let (name, value) = frame.close();

    match stack.last_mut() {
        Some(parent) => {
            insert_merged(&mut parent.fields, name, value);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(value);
            Ok(())
        }
        None => Err(UnwrapError::MalformedXml("more than one root element".into())),
    }
}

fn push_text(stack: &mut [Frame], text: &str) -> Result<(), UnwrapError> {
    match stack.last_mut() {
        Some(frame) => {
            frame.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(UnwrapError::MalformedXml("text outside of root element".into())),
    }
}

/// Insert `value` under `key`, turning repeated keys into an Array
fn insert_merged(fields: &mut Map<String, Value>, key: String, value: Value) {
    match fields.get_mut(&key) {
        None => {
            fields.insert(key, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

fn malformed(err: impl std::fmt::Display) -> UnwrapError {
    UnwrapError::MalformedXml(err.to_string())
}
