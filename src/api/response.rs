/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */
use crate::api::errors::{FlickrError, ParseError};
use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::BuildHasher;

/// Key under which the text content of an element is stored
pub const TEXT_CONTENT_KEY: &str = "_text";

/// Ordered key/value map used for every element of a response
pub type ValueMap = IndexMap<String, Value>;

/// Generic node of a decoded response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Map(ValueMap),
    List(Vec<Value>),
}

impl Value {
    /// Text of this node, either a plain string or the `_text` entry of an element
    pub fn text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Map(m) => m.get(TEXT_CONTENT_KEY).and_then(Value::text),
            Value::List(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Elements that may appear once or many times come back as a single map or a list.
    /// This gives a slice view in both cases.
    pub fn as_slice(&self) -> &[Value] {
        match self {
            Value::List(v) => v,
            other => std::slice::from_ref(other),
        }
    }
}

/// The `rsp` element of a successful call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResponseEnvelope {
    map: ValueMap,
}

impl ResponseEnvelope {
    pub fn new(map: ValueMap) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(Value::text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn into_inner(self) -> ValueMap {
        self.map
    }

    /// Deserializes the envelope into a caller provided type
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, FlickrError> {
        serde_json::to_value(self)
            .and_then(serde_json::from_value)
            .map_err(|err| FlickrError::malformed(err.to_string()))
    }
}

/// Access to string fields of a photo, frob or similar descriptor
pub trait Fields {
    fn field(&self, key: &str) -> Option<&str>;
}

impl Fields for Value {
    fn field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::text)
    }
}

impl Fields for ValueMap {
    fn field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::text)
    }
}

impl Fields for ResponseEnvelope {
    fn field(&self, key: &str) -> Option<&str> {
        self.text(key)
    }
}

impl<S: BuildHasher> Fields for HashMap<String, String, S> {
    fn field(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl Fields for IndexMap<String, String> {
    fn field(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl Fields for [(&str, &str)] {
    fn field(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

impl<const N: usize> Fields for [(&str, &str); N] {
    fn field(&self, key: &str) -> Option<&str> {
        self.as_slice().field(key)
    }
}

/// Turns a raw response body into a tree of [`Value`]s.
///
/// The returned map is keyed by the document's root element name.
pub trait ResponseParser: Debug + Send + Sync + 'static {
    fn parse(&self, body: &[u8]) -> Result<ValueMap, ParseError>;
}

/// Maps an XML document onto nested maps.
///
/// - attributes become entries of the element's map
/// - text content is stored under [`TEXT_CONTENT_KEY`]
/// - a child element seen more than once becomes a [`Value::List`]
/// - a child element named like an attribute of its parent joins that attribute in a
///   [`Value::List`], attribute first, so neither value is lost
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlMapper;

impl XmlMapper {
    fn element_map(start: &BytesStart<'_>) -> Result<ValueMap, ParseError> {
        let mut map = ValueMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::Xml(e.to_string()))?
                .into_owned();
            map.insert(key, Value::Text(value));
        }
        Ok(map)
    }

    fn insert_child(parent: &mut ValueMap, name: String, child: Value) {
        match parent.get_mut(&name) {
            Some(Value::List(list)) => list.push(child),
            Some(existing) => {
                let first = std::mem::replace(existing, Value::List(Vec::new()));
                *existing = Value::List(vec![first, child]);
            }
            None => {
                parent.insert(name, child);
            }
        }
    }

    fn append_text(map: &mut ValueMap, text: &str) {
        if text.is_empty() {
            return;
        }
        match map.get_mut(TEXT_CONTENT_KEY) {
            Some(Value::Text(existing)) => existing.push_str(text),
            _ => {
                map.insert(TEXT_CONTENT_KEY.to_string(), Value::Text(text.to_string()));
            }
        }
    }
}

impl ResponseParser for XmlMapper {
    fn parse(&self, body: &[u8]) -> Result<ValueMap, ParseError> {
        let mut reader = Reader::from_reader(body);
        reader.config_mut().trim_text(true);

        // The bottom entry collects the root element
        let mut stack: Vec<(String, ValueMap)> = vec![(String::new(), ValueMap::new())];
        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    stack.push((name, Self::element_map(&e)?));
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let map = Self::element_map(&e)?;
                    if let Some((_, parent)) = stack.last_mut() {
                        Self::insert_child(parent, name, Value::Map(map));
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                    if let Some((_, current)) = stack.last_mut() {
                        Self::append_text(current, &text);
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    if let Some((_, current)) = stack.last_mut() {
                        Self::append_text(current, &text);
                    }
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if stack.len() < 2 {
                        return Err(ParseError::Unbalanced(name));
                    }
                    let (open, map) = stack.pop().ok_or_else(|| ParseError::Unbalanced(name.clone()))?;
                    if open != name {
                        return Err(ParseError::Unbalanced(name));
                    }
                    if let Some((_, parent)) = stack.last_mut() {
                        Self::insert_child(parent, open, Value::Map(map));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if stack.len() != 1 {
            let open = stack.pop().map(|(name, _)| name).unwrap_or_default();
            return Err(ParseError::Unbalanced(open));
        }
        let root = stack.pop().map(|(_, map)| map).unwrap_or_default();
        // Text outside of any element is noise
        let root: ValueMap = root
            .into_iter()
            .filter(|(k, _)| k != TEXT_CONTENT_KEY)
            .collect();
        if root.is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(root)
    }
}
