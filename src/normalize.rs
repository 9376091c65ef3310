//! The value normalizer — write-path validation/rewriting and read-path
//! filtering for values crossing the dictionary boundary, plus key
//! validation shared by insert and erase.

use crate::error::{DictError, Result};
use crate::resolver::ObjectResolver;
use crate::value::{Key, KeyType, TypedLink, Value, ValueType};

/// Checks a key's runtime shape against the declared key type. Applied on
/// every operation that derives a slot, read or write alike.
pub fn validate_key_type(key_type: KeyType, key: &Key) -> Result<()> {
    if key_type.accepts(key) {
        Ok(())
    } else {
        Err(DictError::CollectionTypeMismatch)
    }
}

/// The reserved-namespace checks: string keys may not start with `$` or
/// contain `.`. Applied at insert and erase only.
pub fn validate_key_shape(key: &Key) -> Result<()> {
    if let Key::Str(s) = key {
        if s.starts_with('$') || s.contains('.') {
            return Err(DictError::InvalidKey(s.clone()));
        }
    }
    Ok(())
}

/// Full key validation used on the write path (insert/erase): type match
/// followed by the reserved-namespace shape check.
pub fn validate_key(key_type: KeyType, key: &Key) -> Result<()> {
    validate_key_type(key_type, key)?;
    validate_key_shape(key)
}

/// Write-path normalization. `opposite_table` must be `Some` when
/// `value_type` is [`ValueType::Link`].
pub fn normalize_write<R: ObjectResolver>(
    value_type: ValueType,
    nullable: bool,
    opposite_table: Option<&crate::value::TableKey>,
    resolver: &R,
    value: Value,
) -> Result<Value> {
    if value.is_null() {
        return if nullable {
            Ok(Value::Null)
        } else {
            Err(DictError::TypeMismatch { expected: value_type, found: value.kind() })
        };
    }

    match value_type {
        ValueType::Link => {
            let Some(opposite) = opposite_table else {
                return Err(DictError::CollectionTypeMismatch);
            };
            match value {
                Value::Link(ref typed) => {
                    if &typed.table != opposite {
                        return Err(DictError::WrongObjectType {
                            expected: opposite.0.clone(),
                            found: typed.table.0.clone(),
                        });
                    }
                    Ok(value)
                }
                Value::UntypedLink(object) => {
                    if !resolver.is_unresolved(opposite, object) && !resolver.is_valid(opposite, object) {
                        return Err(DictError::TargetOutOfRange);
                    }
                    Ok(Value::Link(TypedLink { table: opposite.clone(), object }))
                }
                other => Err(DictError::TypeMismatch { expected: value_type, found: other.kind() }),
            }
        }
        ValueType::Mixed => {
            if let Value::Link(ref typed) = value {
                if !resolver.is_unresolved(&typed.table, typed.object)
                    && !resolver.is_valid(&typed.table, typed.object)
                {
                    return Err(DictError::TargetOutOfRange);
                }
            }
            Ok(value)
        }
        scalar => {
            if scalar.matches_scalar_kind(value.kind()) {
                Ok(value)
            } else {
                Err(DictError::TypeMismatch { expected: value_type, found: value.kind() })
            }
        }
    }
}

/// Read-path filtering: unresolved typed-links become null; a `Link`-typed
/// column hands back just the object-key component.
pub fn normalize_read<R: ObjectResolver>(value_type: ValueType, resolver: &R, value: Value) -> Value {
    match value {
        Value::Link(typed) => {
            if resolver.is_unresolved(&typed.table, typed.object) {
                Value::Null
            } else if value_type == ValueType::Link {
                Value::UntypedLink(typed.object)
            } else {
                Value::Link(typed)
            }
        }
        other => other,
    }
}
