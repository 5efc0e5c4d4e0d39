//! Lossy JSON projection of containers

use serde_json::{Map, Number, Value};

use super::errors::{ContainerError, ContainerResult};
use super::record::Container;
use super::value::AttributeValue;

/// Render `{"uid":…, "name":…, "attributes":{name: value}}`.
///
/// Repeated attribute names collapse; the later value wins. Non-finite
/// doubles render as null.
pub fn to_json(container: &Container) -> Value {
    let mut attributes = Map::new();
    for attribute in container.attributes() {
        let value = match &attribute.value {
            AttributeValue::Boolean(b) => Value::Bool(*b),
            AttributeValue::Integer(i) => Value::Number(Number::from(*i)),
            AttributeValue::Double(d) => Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttributeValue::String(s) => Value::String(s.clone()),
        };
        attributes.insert(attribute.name.clone(), value);
    }

    let mut object = Map::new();
    object.insert("uid".to_string(), Value::Number(Number::from(container.uid())));
    object.insert("name".to_string(), Value::String(container.name().to_string()));
    object.insert("attributes".to_string(), Value::Object(attributes));
    Value::Object(object)
}

/// Build a container from a JSON object.
///
/// Two shapes are accepted: the `to_json` envelope, or a flat object whose
/// scalar fields all become attributes. Nested arrays, objects and nulls
/// are skipped.
pub fn from_json(value: &Value) -> ContainerResult<Container> {
    let object = value
        .as_object()
        .ok_or_else(|| ContainerError::invalid_json("expected a JSON object"))?;

    match object.get("attributes").and_then(Value::as_object) {
        Some(attributes) => {
            let uid = object
                .get("uid")
                .and_then(Value::as_u64)
                .and_then(|u| u32::try_from(u).ok())
                .unwrap_or(0);
            let name = object.get("name").and_then(Value::as_str).unwrap_or("");
            let mut container = Container::with_uid(uid, name);
            put_scalars(&mut container, attributes)?;
            Ok(container)
        }
        None => {
            let mut container = Container::new("");
            put_scalars(&mut container, object)?;
            Ok(container)
        }
    }
}

/// Parse JSON text into a container
pub fn from_json_str(text: &str) -> ContainerResult<Container> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ContainerError::invalid_json(e.to_string()))?;
    from_json(&value)
}

fn put_scalars(container: &mut Container, fields: &Map<String, Value>) -> ContainerResult<()> {
    for (name, value) in fields {
        if name.is_empty() {
            continue;
        }
        let attribute = match value {
            Value::Bool(b) => AttributeValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Integer(i),
                None => AttributeValue::Double(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => AttributeValue::String(s.clone()),
            Value::Null | Value::Array(_) | Value::Object(_) => continue,
        };
        container.put(name, attribute)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_json_shape() {
        let mut c = Container::with_uid(3, "doc");
        c.put_string("title", "hello").unwrap();
        c.put_int("count", 2).unwrap();
        c.put_int("count", 5).unwrap();

        let json = to_json(&c);
        assert_eq!(json["uid"], 3);
        assert_eq!(json["name"], "doc");
        assert_eq!(json["attributes"]["title"], "hello");
        assert_eq!(json["attributes"]["count"], 5);
    }

    #[test]
    fn test_from_envelope() {
        let c = from_json_str(r#"{"uid":9,"name":"n","attributes":{"a":1,"b":2.5,"c":true,"d":"x"}}"#)
            .unwrap();
        assert_eq!(c.uid(), 9);
        assert_eq!(c.name(), "n");
        assert_eq!(c.get_int("a"), Some(1));
        assert_eq!(c.get_double("b"), Some(2.5));
        assert_eq!(c.get_bool("c"), Some(true));
        assert_eq!(c.get_string("d").as_deref(), Some("x"));
    }

    #[test]
    fn test_flat_object_skips_nested() {
        let c = from_json_str(r#"{"title":"t","tags":["a"],"meta":{"k":1},"none":null}"#).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.get_string("title").as_deref(), Some("t"));
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(from_json_str("[1,2]").is_err());
        assert!(from_json_str("not json").is_err());
    }
}
