use crate::error::{validation, StoreResult};
use crate::value::DocValue;

/// Atomic server-side operation used in place of a literal field write.
///
/// Transforms are immutable values holding only their kind and validated
/// payload; the field path they apply to is paired with them by the encoder
/// (see [`FieldTransform`]) rather than stored on the transform itself, so one
/// transform value can safely appear in any number of encode passes.
#[derive(Clone, Debug, PartialEq)]
pub enum Transform {
    /// Replaced by the server with the time the request was processed.
    ServerTimestamp,
    /// Increments the targeted numeric field by the given amount.
    Increment(f64),
    /// Sets the field to the minimum of its current value and the given value.
    Min(f64),
    /// Sets the field to the maximum of its current value and the given value.
    Max(f64),
    /// Appends the given elements, in order, if not already present. A missing
    /// or non-array field is first treated as the empty array.
    AppendToArray(Vec<DocValue>),
    /// Removes all occurrences of the given elements from the array field.
    RemoveFromArray(Vec<DocValue>),
}

impl Transform {
    pub fn server_timestamp() -> Self {
        Transform::ServerTimestamp
    }

    pub fn increment(amount: f64) -> StoreResult<Self> {
        require_finite("increment", amount)?;
        Ok(Transform::Increment(amount))
    }

    pub fn min(value: f64) -> StoreResult<Self> {
        require_finite("min", value)?;
        Ok(Transform::Min(value))
    }

    pub fn max(value: f64) -> StoreResult<Self> {
        require_finite("max", value)?;
        Ok(Transform::Max(value))
    }

    pub fn append_to_array(values: Vec<DocValue>) -> Self {
        Transform::AppendToArray(values)
    }

    pub fn remove_from_array(values: Vec<DocValue>) -> Self {
        Transform::RemoveFromArray(values)
    }

    /// Name of the field-transform operation in the wire protocol.
    pub fn wire_op(&self) -> &'static str {
        match self {
            Transform::ServerTimestamp => "setToServerValue",
            Transform::Increment(_) => "increment",
            Transform::Min(_) => "minimum",
            Transform::Max(_) => "maximum",
            Transform::AppendToArray(_) => "appendMissingElements",
            Transform::RemoveFromArray(_) => "removeAllFromArray",
        }
    }
}

fn require_finite(name: &str, value: f64) -> StoreResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(validation(format!(
            "The value for the \"{name}\" transform must be a finite number"
        )))
    }
}

/// A [`Transform`] paired with the dotted path of the field it applies to.
///
/// Produced by the field encoder while walking a document; the path is the
/// position the transform occupied in the document being encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldTransform {
    field_path: String,
    transform: Transform,
}

impl FieldTransform {
    pub fn new(field_path: impl Into<String>, transform: Transform) -> Self {
        Self {
            field_path: field_path.into(),
            transform,
        }
    }

    pub fn field_path(&self) -> &str {
        &self.field_path
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}
