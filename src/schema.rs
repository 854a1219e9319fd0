//! Declaration side: how an options struct describes its fields.
//!
//! Each options struct implements [`Options`] and returns a [`Schema`] listing
//! its fields in declaration order. Field names are the Rust field names (and
//! therefore the serde names: renaming attributes on options structs are not
//! supported). Leaves are declared with [`Schema::field`], whose type
//! parameter picks the built-in handling through [`FieldType`]; nested option
//! structs are declared with [`Schema::nested`].

use std::any::TypeId;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::BoxError;
use crate::hooks::Hooks;
use crate::tag::TagInput;
use crate::types::LogLevel;

/// Width and signedness of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntKind {
    pub signed: bool,
    pub bits: u8,
}

impl IntKind {
    pub const fn signed(bits: u8) -> Self {
        Self { signed: true, bits }
    }

    pub const fn unsigned(bits: u8) -> Self {
        Self {
            signed: false,
            bits,
        }
    }

    pub fn min(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.bits - 1))
        } else {
            0
        }
    }

    pub fn max(&self) -> i128 {
        if self.signed {
            (1i128 << (self.bits - 1)) - 1
        } else {
            (1i128 << self.bits) - 1
        }
    }
}

/// Element type of a list field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Elem {
    Bool,
    Int(IntKind),
    Float,
    Text,
}

/// Built-in handling class of a leaf field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int(IntKind),
    Float,
    Text,
    Duration,
    LogLevel,
    List(Elem),
    /// No built-in handling; only usable with `flagcustom:"true"`.
    Opaque,
}

impl Kind {
    pub fn is_int(&self) -> bool {
        matches!(self, Kind::Int(_))
    }
}

/// A type usable as a leaf field.
///
/// Implemented for the scalars, `String`, `PathBuf`, `Duration`, [`LogLevel`],
/// `Vec` of scalars, and `Option` of any of those. Other types opt in with an
/// empty impl and must then be marked `flagcustom:"true"`:
///
/// ```ignore
/// impl FieldType for Mode {}
/// ```
pub trait FieldType: 'static {
    const KIND: Kind = Kind::Opaque;
    const OPTIONAL: bool = false;

    /// Identity of the value a decode hook must produce for this field.
    fn value_type() -> (TypeId, &'static str) {
        (TypeId::of::<Self>(), std::any::type_name::<Self>())
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const KIND: Kind = T::KIND;
    const OPTIONAL: bool = true;

    fn value_type() -> (TypeId, &'static str) {
        T::value_type()
    }
}

/// Element types allowed inside a list field.
pub trait ListElem: 'static {
    const ELEM: Elem;
}

impl<T: ListElem> FieldType for Vec<T> {
    const KIND: Kind = Kind::List(T::ELEM);
}

macro_rules! scalar {
    ($($ty:ty => $kind:expr, $elem:expr;)*) => {
        $(
            impl FieldType for $ty {
                const KIND: Kind = $kind;
            }
            impl ListElem for $ty {
                const ELEM: Elem = $elem;
            }
        )*
    };
}

scalar! {
    bool => Kind::Bool, Elem::Bool;
    i8 => Kind::Int(IntKind::signed(8)), Elem::Int(IntKind::signed(8));
    i16 => Kind::Int(IntKind::signed(16)), Elem::Int(IntKind::signed(16));
    i32 => Kind::Int(IntKind::signed(32)), Elem::Int(IntKind::signed(32));
    i64 => Kind::Int(IntKind::signed(64)), Elem::Int(IntKind::signed(64));
    isize => Kind::Int(IntKind::signed(usize::BITS as u8)), Elem::Int(IntKind::signed(usize::BITS as u8));
    u8 => Kind::Int(IntKind::unsigned(8)), Elem::Int(IntKind::unsigned(8));
    u16 => Kind::Int(IntKind::unsigned(16)), Elem::Int(IntKind::unsigned(16));
    u32 => Kind::Int(IntKind::unsigned(32)), Elem::Int(IntKind::unsigned(32));
    u64 => Kind::Int(IntKind::unsigned(64)), Elem::Int(IntKind::unsigned(64));
    usize => Kind::Int(IntKind::unsigned(usize::BITS as u8)), Elem::Int(IntKind::unsigned(usize::BITS as u8));
    f32 => Kind::Float, Elem::Float;
    f64 => Kind::Float, Elem::Float;
    String => Kind::Text, Elem::Text;
    PathBuf => Kind::Text, Elem::Text;
}

impl FieldType for Duration {
    const KIND: Kind = Kind::Duration;
}

impl FieldType for LogLevel {
    const KIND: Kind = Kind::LogLevel;
}

pub(crate) type ZeroFn = fn() -> Result<serde_json::Value, serde_json::Error>;

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Leaf {
        kind: Kind,
        optional: bool,
        value_type: TypeId,
        type_name: &'static str,
    },
    Nested {
        schema: fn() -> Schema,
        hooks: fn(&mut Hooks),
        zero: ZeroFn,
        type_name: &'static str,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub name: &'static str,
    pub tags: TagInput,
    pub node: Node,
}

/// Ordered field declarations of one options struct.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub(crate) entries: Vec<Entry>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a leaf field.
    pub fn field<F: FieldType>(mut self, name: &'static str, tags: impl Into<TagInput>) -> Self {
        let (value_type, type_name) = F::value_type();
        self.entries.push(Entry {
            name,
            tags: tags.into(),
            node: Node::Leaf {
                kind: F::KIND,
                optional: F::OPTIONAL,
                value_type,
                type_name,
            },
        });
        self
    }

    /// Declare a nested options struct. Works for both `C` and `Option<C>`
    /// fields; a `None` is replaced by `C::default()` before a child is set.
    pub fn nested<C: Options>(mut self, name: &'static str, tags: impl Into<TagInput>) -> Self {
        self.entries.push(Entry {
            name,
            tags: tags.into(),
            node: Node::Nested {
                schema: C::schema,
                hooks: C::hooks,
                zero: zero_value::<C>,
                type_name: std::any::type_name::<C>(),
            },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }
}

fn zero_value<C: Options>() -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(C::default())
}

/// Pass-through `validate` or `mod` directives, keyed by dotted field path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    entries: Vec<(String, String)>,
}

impl Directives {
    pub(crate) fn push(&mut self, path: String, directive: String) {
        self.entries.push((path, directive));
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, d)| d.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An options struct: the target of flag definition and unmarshalling.
///
/// ```ignore
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct ServeOptions {
///     port: u16,
///     database: DatabaseOptions,
/// }
///
/// impl Options for ServeOptions {
///     fn schema() -> Schema {
///         Schema::new()
///             .field::<u16>("port", r#"flagshort:"p" flagdefault:"8080" flagenv:"true""#)
///             .nested::<DatabaseOptions>("database", r#"flaggroup:"Database""#)
///     }
/// }
/// ```
pub trait Options: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Insert the populated value into the [`Context`](crate::Context) after
    /// a successful unmarshal.
    const PROPAGATE: bool = false;

    fn schema() -> Schema;

    /// Register define/decode hooks for this struct's `flagcustom` fields.
    fn hooks(_hooks: &mut Hooks) {}

    /// Runs after all fields are set and before [`validate`](Self::validate).
    /// `directives` holds every `mod` tag, keyed by dotted path.
    fn transform(&mut self, _directives: &Directives) -> Result<(), BoxError> {
        Ok(())
    }

    /// Report every violation; an empty list means valid.
    /// `directives` holds every `validate` tag, keyed by dotted path.
    fn validate(&self, _directives: &Directives) -> Vec<BoxError> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_kind_ranges() {
        assert_eq!(IntKind::signed(8).min(), -128);
        assert_eq!(IntKind::signed(8).max(), 127);
        assert_eq!(IntKind::unsigned(16).max(), 65535);
        assert_eq!(IntKind::unsigned(64).max(), u64::MAX as i128);
        assert_eq!(IntKind::signed(64).min(), i64::MIN as i128);
    }

    #[test]
    fn option_forwards_kind_and_value_type() {
        assert_eq!(<Option<u16> as FieldType>::KIND, <u16 as FieldType>::KIND);
        assert!(<Option<u16> as FieldType>::OPTIONAL);
        assert_eq!(
            <Option<String> as FieldType>::value_type().0,
            TypeId::of::<String>()
        );
    }

    #[test]
    fn vec_kind_carries_element() {
        assert_eq!(<Vec<String> as FieldType>::KIND, Kind::List(Elem::Text));
        assert_eq!(
            <Vec<u32> as FieldType>::KIND,
            Kind::List(Elem::Int(IntKind::unsigned(32)))
        );
    }

    #[test]
    fn opaque_by_default() {
        struct Mode;
        impl FieldType for Mode {}
        assert_eq!(<Mode as FieldType>::KIND, Kind::Opaque);
        assert!(<Mode as FieldType>::value_type().1.ends_with("Mode"));
    }

    #[test]
    fn schema_keeps_declaration_order() {
        let schema = Schema::new()
            .field::<String>("host", "")
            .field::<u16>("port", "")
            .field::<bool>("debug", "");
        assert_eq!(schema.field_names().collect::<Vec<_>>(), ["host", "port", "debug"]);
    }

    #[test]
    fn directives_lookup() {
        let mut d = Directives::default();
        d.push("port".into(), "min=1".into());
        assert_eq!(d.get("port"), Some("min=1"));
        assert_eq!(d.get("host"), None);
    }
}
