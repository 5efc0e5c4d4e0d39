//! Merging an overlay container into a base container

use super::errors::{ContainerError, ContainerResult};
use super::record::Container;

/// How overlay attributes are merged into the base
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinePolicy {
    /// Overwrite existing attributes; every overlay attribute must exist in the base
    Update,
    /// Add every overlay attribute, allowing duplicate names
    Append,
    /// Overwrite when present, otherwise append
    Uppend,
    /// Keep only the overlay's attributes
    Replace,
}

impl CombinePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombinePolicy::Update => "update",
            CombinePolicy::Append => "append",
            CombinePolicy::Uppend => "uppend",
            CombinePolicy::Replace => "replace",
        }
    }
}

/// Merge `overlay` into a copy of `base`.
///
/// The result takes the overlay's uid and name, falling back to the base's
/// when the overlay leaves them unset. Attribute order is base order, then
/// any overlay attributes that were appended.
///
/// Overlay attributes with a repeated name pair up with the base's
/// same-named attributes in order: the second overlay `tag` overwrites the
/// second base `tag`.
pub fn combine(
    base: &Container,
    overlay: &Container,
    policy: CombinePolicy,
) -> ContainerResult<Container> {
    let uid = if overlay.uid() != 0 {
        overlay.uid()
    } else {
        base.uid()
    };
    let name = if overlay.name().is_empty() {
        base.name()
    } else {
        overlay.name()
    };
    let mut result = Container::with_uid(uid, name);

    match policy {
        CombinePolicy::Replace => {
            result.attributes_mut().extend(overlay.attributes().iter().cloned());
        }
        CombinePolicy::Append => {
            let attributes = result.attributes_mut();
            attributes.extend(base.attributes().iter().cloned());
            attributes.extend(overlay.attributes().iter().cloned());
        }
        CombinePolicy::Update | CombinePolicy::Uppend => {
            let attributes = result.attributes_mut();
            attributes.extend(base.attributes().iter().cloned());
            let base_len = attributes.len();
            let mut overwritten = vec![false; base_len];

            for incoming in overlay.attributes() {
                let slot = attributes[..base_len]
                    .iter()
                    .enumerate()
                    .position(|(i, a)| !overwritten[i] && a.name == incoming.name);
                match slot {
                    Some(i) => {
                        attributes[i].value = incoming.value.clone();
                        overwritten[i] = true;
                    }
                    None if policy == CombinePolicy::Update => {
                        return Err(ContainerError::missing_attribute(&incoming.name));
                    }
                    None => attributes.push(incoming.clone()),
                }
            }
        }
    }

    Ok(result)
}
