//! The "mixed" value type: a tagged union over every scalar and link kind a
//! dictionary value may hold, plus the declared key/value type enums used to
//! validate entries crossing the dictionary boundary.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Key of the table a link points into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableKey(pub String);

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of an object within some table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey(pub i64);

/// A 12-byte MongoDB-style object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub [u8; 12]);

/// A 16-byte UUID, stored verbatim (no version/variant validation here; that
/// belongs to whatever layer first parses one from text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uuid(pub [u8; 16]);

/// A base-10 floating point value, stored as `mantissa * 10^exponent`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decimal128 {
    pub mantissa: i128,
    pub exponent: i32,
}

impl Decimal128 {
    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 * 10f64.powi(self.exponent)
    }
}

/// A reference to another object, fully qualified by its target table. Named
/// explicitly to keep it unambiguous next to [`Value::UntypedLink`], which
/// carries no table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedLink {
    pub table: TableKey,
    pub object: ObjectKey,
}

/// A fieldless tag identifying which [`Value`] variant is in play, used for
/// error messages and for dispatching declared-type checks without cloning
/// the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Double,
    Str,
    Binary,
    Timestamp,
    Decimal,
    ObjectId,
    Uuid,
    Link,
    UntypedLink,
}

/// The dictionary's polymorphic value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Binary(Vec<u8>),
    /// Nanoseconds since the Unix epoch.
    Timestamp(i64),
    Decimal(Decimal128),
    ObjectId(ObjectId),
    Uuid(Uuid),
    /// A link whose target table is explicit.
    Link(TypedLink),
    /// A link whose target table is implicit (only legal under a `Link`-typed
    /// column); normalized away to `Link` before it ever reaches storage.
    UntypedLink(ObjectKey),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Str(_) => ValueKind::Str,
            Value::Binary(_) => ValueKind::Binary,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::ObjectId(_) => ValueKind::ObjectId,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Link(_) => ValueKind::Link,
            Value::UntypedLink(_) => ValueKind::UntypedLink,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// View this value as an `f64` if it is one of the numeric kinds.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }

    pub fn as_typed_link(&self) -> Option<&TypedLink> {
        match self {
            Value::Link(l) => Some(l),
            _ => None,
        }
    }

    /// Rank used to establish the total order across variants described in
    /// the design notes: null < bool < numbers < string < binary < timestamp
    /// < object-id < uuid < link.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) | Value::Double(_) | Value::Decimal(_) => 2,
            Value::Str(_) => 3,
            Value::Binary(_) => 4,
            Value::Timestamp(_) => 5,
            Value::ObjectId(_) => 6,
            Value::Uuid(_) => 7,
            Value::Link(_) | Value::UntypedLink(_) => 8,
        }
    }
}

/// Total order over [`Value`] used by `sort`/`min`/`max`. Values of
/// incomparable numeric kinds (e.g. NaN) are pushed after every other value
/// of the same rank so the comparator remains a total order even though
/// `f64::partial_cmp` is not.
pub fn cmp_mixed(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (a.type_rank(), b.type_rank());
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Binary(x), Value::Binary(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::ObjectId(x), Value::ObjectId(y)) => x.cmp(y),
        (Value::Uuid(x), Value::Uuid(y)) => x.cmp(y),
        (Value::Link(x), Value::Link(y)) => (&x.table, x.object).cmp(&(&y.table, y.object)),
        (Value::UntypedLink(x), Value::UntypedLink(y)) => x.cmp(y),
        (Value::Link(_), Value::UntypedLink(_)) => Ordering::Less,
        (Value::UntypedLink(_), Value::Link(_)) => Ordering::Greater,
        _ => {
            // Both numeric (rank 2): compare by promoted f64, NaN sorts last.
            let (na, nb) = (a.as_numeric().unwrap(), b.as_numeric().unwrap());
            match (na.is_nan(), nb.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => na.partial_cmp(&nb).unwrap_or(Ordering::Equal),
            }
        }
    }
}

/// The application key stored alongside each entry. Keys are always one of
/// these two scalar shapes; see [`crate::error::DictError::NotImplemented`]
/// for any other runtime key type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl Key {
    /// Canonical byte representation fed to the slot deriver: little-endian
    /// two's-complement for integers, raw UTF-8 bytes for strings.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Key::Int(v) => v.to_le_bytes().to_vec(),
            Key::Str(v) => v.as_bytes().to_vec(),
        }
    }
}

/// The declared key type of a dictionary column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    Int,
    Str,
    /// Accepts either runtime key shape.
    Mixed,
}

impl KeyType {
    pub fn accepts(&self, key: &Key) -> bool {
        match (self, key) {
            (KeyType::Mixed, _) => true,
            (KeyType::Int, Key::Int(_)) => true,
            (KeyType::Str, Key::Str(_)) => true,
            _ => false,
        }
    }
}

/// The declared value type of a dictionary column. `Link` carries no
/// opposite-table here; that lives on the owning [`crate::dictionary::DictionaryHandle`]
/// since it is a property of the column, not of any one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Double,
    Str,
    Binary,
    Timestamp,
    Decimal,
    ObjectId,
    Uuid,
    Link,
    Mixed,
}

impl ValueType {
    /// Whether a non-link, non-null value of `kind` satisfies this declared
    /// type directly (case 4 of the write-path normalization).
    pub fn matches_scalar_kind(&self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (ValueType::Bool, ValueKind::Bool)
                | (ValueType::Int, ValueKind::Int)
                | (ValueType::Float, ValueKind::Float)
                | (ValueType::Double, ValueKind::Double)
                | (ValueType::Str, ValueKind::Str)
                | (ValueType::Binary, ValueKind::Binary)
                | (ValueType::Timestamp, ValueKind::Timestamp)
                | (ValueType::Decimal, ValueKind::Decimal)
                | (ValueType::ObjectId, ValueKind::ObjectId)
                | (ValueType::Uuid, ValueKind::Uuid)
        )
    }
}
