//! Binary container encoding
//!
//! ```text
//! +------------------+
//! | Format Version   | (u8, currently 1)
//! +------------------+
//! | Uid              | (u32 LE)
//! +------------------+
//! | Name             | (length-prefixed string)
//! +------------------+
//! | Attribute Count  | (u32 LE)
//! +------------------+
//! | Attributes       | per attribute: tag (u8), name (length-prefixed),
//! |                  | value (u8 bool | i64 LE | f64 LE bits | length-prefixed string)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 of every preceding byte)
//! +------------------+
//! ```
//!
//! Decoding verifies the checksum before reading any field and never
//! returns a partially decoded container.

use crate::checksum::{compute_checksum, verify_checksum};

use super::errors::{ContainerError, ContainerResult};
use super::record::{Attribute, Container};
use super::value::{AttributeValue, ValueType};

const FORMAT_VERSION: u8 = 1;

/// version + uid + name length + attribute count + checksum
const MIN_ENCODED_LEN: usize = 1 + 4 + 4 + 4 + 4;

/// Smallest possible attribute: tag + empty name + bool
const MIN_ATTRIBUTE_LEN: usize = 1 + 4 + 1;

/// Exact length `serialize` will produce
pub fn encoded_len(container: &Container) -> usize {
    let attributes: usize = container
        .attributes()
        .iter()
        .map(|a| 1 + 4 + a.name.len() + a.value.encoded_len())
        .sum();
    MIN_ENCODED_LEN + container.name().len() + attributes
}

/// Encode a container
pub fn serialize(container: &Container) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(container));

    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&container.uid().to_le_bytes());
    put_bytes(&mut buf, container.name().as_bytes());
    buf.extend_from_slice(&(container.len() as u32).to_le_bytes());

    for attribute in container.attributes() {
        buf.push(attribute.value.value_type().tag());
        put_bytes(&mut buf, attribute.name.as_bytes());
        match &attribute.value {
            AttributeValue::Boolean(b) => buf.push(u8::from(*b)),
            AttributeValue::Integer(i) => buf.extend_from_slice(&i.to_le_bytes()),
            AttributeValue::Double(d) => buf.extend_from_slice(&d.to_bits().to_le_bytes()),
            AttributeValue::String(s) => put_bytes(&mut buf, s.as_bytes()),
        }
    }

    let checksum = compute_checksum(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

/// Decode a container, verifying its checksum
pub fn deserialize(data: &[u8]) -> ContainerResult<Container> {
    if data.len() < MIN_ENCODED_LEN {
        return Err(ContainerError::truncated(MIN_ENCODED_LEN, data.len()));
    }

    let (body, trailer) = data.split_at(data.len() - 4);
    let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if !verify_checksum(body, expected) {
        return Err(ContainerError::corrupt("checksum mismatch"));
    }

    let mut reader = Reader::new(body);

    let version = reader.u8()?;
    if version != FORMAT_VERSION {
        return Err(ContainerError::corrupt_at_offset(
            0,
            format!("unsupported format version {}", version),
        ));
    }

    let uid = reader.u32()?;
    let name = reader.string()?;
    let count = reader.u32()? as usize;

    let mut attributes = Vec::with_capacity(count.min(reader.remaining() / MIN_ATTRIBUTE_LEN));
    for _ in 0..count {
        let offset = reader.position();
        let tag = reader.u8()?;
        let value_type = ValueType::from_tag(tag).ok_or_else(|| {
            ContainerError::corrupt_at_offset(offset, format!("unknown attribute tag {}", tag))
        })?;
        let attr_name = reader.string()?;
        if attr_name.is_empty() {
            return Err(ContainerError::corrupt_at_offset(offset, "empty attribute name"));
        }
        let value = match value_type {
            ValueType::Boolean => match reader.u8()? {
                0 => AttributeValue::Boolean(false),
                1 => AttributeValue::Boolean(true),
                other => {
                    return Err(ContainerError::corrupt_at_offset(
                        offset,
                        format!("invalid boolean byte {}", other),
                    ))
                }
            },
            ValueType::Integer => AttributeValue::Integer(i64::from_le_bytes(reader.array()?)),
            ValueType::Double => {
                AttributeValue::Double(f64::from_bits(u64::from_le_bytes(reader.array()?)))
            }
            ValueType::String => AttributeValue::String(reader.string()?),
        };
        attributes.push(Attribute {
            name: attr_name,
            value,
        });
    }

    if reader.remaining() != 0 {
        return Err(ContainerError::corrupt_at_offset(
            reader.position(),
            "trailing bytes after attributes",
        ));
    }

    Ok(Container::from_parts(uid, name, attributes))
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Bounds-checked little-endian reader
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> ContainerResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(ContainerError::truncated(len, self.remaining()));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> ContainerResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> ContainerResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> ContainerResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> ContainerResult<String> {
        let offset = self.pos;
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ContainerError::corrupt_at_offset(offset, "invalid utf-8"))
    }
}
