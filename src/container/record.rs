//! Container: a named, uid-tagged, insertion-ordered attribute list

use super::codec;
use super::errors::{ContainerError, ContainerResult};
use super::value::{AttributeValue, ValueType};

/// One named attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A searchable record.
///
/// Attribute names may repeat; getters resolve to the first match.
/// The uid is 0 until assigned and never changes afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    uid: u32,
    name: String,
    attributes: Vec<Attribute>,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uid: 0,
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_uid(uid: u32, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub(crate) fn from_parts(uid: u32, name: String, attributes: Vec<Attribute>) -> Self {
        Self {
            uid,
            name,
            attributes,
        }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Assign the uid. Only a zero uid may be changed.
    pub fn set_uid(&mut self, uid: u32) -> ContainerResult<()> {
        if self.uid != 0 && self.uid != uid {
            return Err(ContainerError::uid_immutable(self.uid, uid));
        }
        self.uid = uid;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ------------------------------------------------------------------
    // Appending puts
    // ------------------------------------------------------------------

    /// Append an attribute; an existing attribute with the same name is kept
    pub fn put(&mut self, name: &str, value: impl Into<AttributeValue>) -> ContainerResult<()> {
        if name.is_empty() {
            return Err(ContainerError::invalid_arguments("empty attribute name"));
        }
        self.attributes.push(Attribute::new(name, value));
        Ok(())
    }

    pub fn put_bool(&mut self, name: &str, value: bool) -> ContainerResult<()> {
        self.put(name, value)
    }

    pub fn put_int(&mut self, name: &str, value: i64) -> ContainerResult<()> {
        self.put(name, value)
    }

    pub fn put_double(&mut self, name: &str, value: f64) -> ContainerResult<()> {
        self.put(name, value)
    }

    pub fn put_string(&mut self, name: &str, value: &str) -> ContainerResult<()> {
        self.put(name, value)
    }

    // ------------------------------------------------------------------
    // Replacing sets
    // ------------------------------------------------------------------

    /// Replace the first attribute named `name`, or append one
    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) -> ContainerResult<()> {
        if name.is_empty() {
            return Err(ContainerError::invalid_arguments("empty attribute name"));
        }
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
        Ok(())
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> ContainerResult<()> {
        self.set(name, value)
    }

    pub fn set_int(&mut self, name: &str, value: i64) -> ContainerResult<()> {
        self.set(name, value)
    }

    pub fn set_double(&mut self, name: &str, value: f64) -> ContainerResult<()> {
        self.set(name, value)
    }

    pub fn set_string(&mut self, name: &str, value: &str) -> ContainerResult<()> {
        self.set(name, value)
    }

    // ------------------------------------------------------------------
    // Coercing gets
    // ------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(AttributeValue::as_bool)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).map(AttributeValue::as_int)
    }

    pub fn get_double(&self, name: &str) -> Option<f64> {
        self.get(name).map(AttributeValue::as_double)
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).map(AttributeValue::as_string)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    pub fn value_type(&self, name: &str) -> Option<ValueType> {
        self.get(name).map(AttributeValue::value_type)
    }

    /// Remove every attribute named `name`; returns how many were removed
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.attributes.len();
        self.attributes.retain(|a| a.name != name);
        before - self.attributes.len()
    }

    /// Attributes in insertion order
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Vec<Attribute> {
        &mut self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Size estimate used for cache accounting: the encoded length
    pub fn memory_length(&self) -> usize {
        codec::encoded_len(self)
    }
}
