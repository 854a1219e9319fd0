//! Built-in decoders and value rendering.
//!
//! Every leaf gets a [`Decoder`]: a custom hook, one of the built-in hooks
//! selected by the field's [`Kind`], or native scalar decoding. Decoders turn
//! a [`RawValue`] into the JSON form serde expects for the field, so the
//! result can be written into the options tree and deserialized in one go.

use std::fmt;
use std::time::Duration;

use serde_json::{Number, Value};

use crate::hooks::{DecodeHook, RawValue};
use crate::schema::{Elem, IntKind, Kind};
use crate::tag::parse_bool;
use crate::types::LogLevel;

/// Built-in decode hooks, keyed by static kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Duration,
    LogLevel,
    StringSlice,
    IntSlice(IntKind),
    UintSlice(IntKind),
    FloatSlice,
    BoolSlice,
}

impl Builtin {
    pub fn for_kind(kind: Kind) -> Option<Builtin> {
        match kind {
            Kind::Duration => Some(Builtin::Duration),
            Kind::LogLevel => Some(Builtin::LogLevel),
            Kind::List(Elem::Text) => Some(Builtin::StringSlice),
            Kind::List(Elem::Int(k)) if k.signed => Some(Builtin::IntSlice(k)),
            Kind::List(Elem::Int(k)) => Some(Builtin::UintSlice(k)),
            Kind::List(Elem::Float) => Some(Builtin::FloatSlice),
            Kind::List(Elem::Bool) => Some(Builtin::BoolSlice),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Builtin::Duration => "duration",
            Builtin::LogLevel => "log-level",
            Builtin::StringSlice => "string-slice",
            Builtin::IntSlice(_) => "int-slice",
            Builtin::UintSlice(_) => "uint-slice",
            Builtin::FloatSlice => "float-slice",
            Builtin::BoolSlice => "bool-slice",
        }
    }

    fn elem(&self) -> Option<Elem> {
        match self {
            Builtin::StringSlice => Some(Elem::Text),
            Builtin::IntSlice(k) | Builtin::UintSlice(k) => Some(Elem::Int(*k)),
            Builtin::FloatSlice => Some(Elem::Float),
            Builtin::BoolSlice => Some(Elem::Bool),
            Builtin::Duration | Builtin::LogLevel => None,
        }
    }
}

/// How one field turns raw input into a value.
#[derive(Debug, Clone)]
pub enum Decoder {
    Native(Kind),
    Builtin(Builtin),
    Custom(DecodeHook),
}

impl Decoder {
    pub fn for_kind(kind: Kind) -> Self {
        match Builtin::for_kind(kind) {
            Some(builtin) => Decoder::Builtin(builtin),
            None => Decoder::Native(kind),
        }
    }

    /// Identifier recorded as the decode-hook annotation.
    pub fn hook_id(&self) -> Option<&'static str> {
        match self {
            Decoder::Native(_) => None,
            Decoder::Builtin(b) => Some(b.id()),
            Decoder::Custom(_) => Some("custom"),
        }
    }

    /// Human name of the target type, for error messages.
    pub fn expected(&self) -> String {
        match self {
            Decoder::Native(kind) => kind_name(*kind).to_string(),
            Decoder::Builtin(b) => match b {
                Builtin::Duration => "duration".to_string(),
                Builtin::LogLevel => "log level".to_string(),
                other => format!("list of {}", elem_name(other.elem().unwrap_or(Elem::Text))),
            },
            Decoder::Custom(hook) => hook.output_name().to_string(),
        }
    }

    pub fn decode(&self, raw: &RawValue) -> Result<Value, String> {
        match self {
            Decoder::Native(kind) => decode_native(*kind, raw),
            Decoder::Builtin(Builtin::Duration) => decode_duration(raw),
            Decoder::Builtin(Builtin::LogLevel) => decode_log_level(raw),
            Decoder::Builtin(b) => decode_list(b.elem().unwrap_or(Elem::Text), raw),
            Decoder::Custom(hook) => hook.call(raw).map_err(|e| e.to_string()),
        }
    }
}

fn kind_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Bool => "bool",
        Kind::Int(k) if k.signed => "integer",
        Kind::Int(_) => "unsigned integer",
        Kind::Float => "float",
        Kind::Text => "string",
        Kind::Duration => "duration",
        Kind::LogLevel => "log level",
        Kind::List(_) => "list",
        Kind::Opaque => "value",
    }
}

fn elem_name(elem: Elem) -> &'static str {
    match elem {
        Elem::Bool => "bool",
        Elem::Int(k) if k.signed => "integers",
        Elem::Int(_) => "unsigned integers",
        Elem::Float => "floats",
        Elem::Text => "strings",
    }
}

fn decode_native(kind: Kind, raw: &RawValue) -> Result<Value, String> {
    match kind {
        Kind::Bool => decode_bool(raw),
        Kind::Int(k) => decode_int(k, raw),
        Kind::Float => decode_float(raw),
        Kind::Text => decode_text(raw),
        Kind::Duration => decode_duration(raw),
        Kind::LogLevel => decode_log_level(raw),
        Kind::List(elem) => decode_list(elem, raw),
        Kind::Opaque => Err("no decoder for this field".to_string()),
    }
}

fn single<'a>(raw: &'a RawValue) -> Result<&'a str, String> {
    match raw {
        RawValue::Text(s) => Ok(s),
        RawValue::List(items) => match items.as_slice() {
            [one] => Ok(one),
            _ => Err(format!("expected one value, got {}", items.len())),
        },
        RawValue::Config(toml::Value::String(s)) => Ok(s),
        RawValue::Config(other) => Err(format!("unexpected {} in config", other.type_str())),
        RawValue::Count(_) => Err("unexpected count".to_string()),
    }
}

fn decode_bool(raw: &RawValue) -> Result<Value, String> {
    if let RawValue::Config(toml::Value::Boolean(b)) = raw {
        return Ok(Value::Bool(*b));
    }
    let s = single(raw)?;
    parse_bool(s)
        .map(Value::Bool)
        .ok_or_else(|| format!("{s:?} is not a boolean"))
}

fn int_value(kind: IntKind, n: i128) -> Result<Value, String> {
    if n < kind.min() || n > kind.max() {
        return Err(format!(
            "{n} is out of range [{}, {}]",
            kind.min(),
            kind.max()
        ));
    }
    if n < 0 {
        i64::try_from(n)
            .map(|v| Value::Number(v.into()))
            .map_err(|e| e.to_string())
    } else {
        u64::try_from(n)
            .map(|v| Value::Number(v.into()))
            .map_err(|e| e.to_string())
    }
}

fn parse_int(kind: IntKind, s: &str) -> Result<Value, String> {
    let n: i128 = s
        .parse()
        .map_err(|e: std::num::ParseIntError| format!("{s:?} is not an integer: {e}"))?;
    int_value(kind, n)
}

fn decode_int(kind: IntKind, raw: &RawValue) -> Result<Value, String> {
    match raw {
        RawValue::Count(n) => int_value(kind, i128::from(*n)),
        RawValue::Config(toml::Value::Integer(n)) => int_value(kind, i128::from(*n)),
        other => parse_int(kind, single(other)?),
    }
}

fn float_value(f: f64) -> Result<Value, String> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("{f} is not a finite number"))
}

fn parse_float(s: &str) -> Result<Value, String> {
    let f: f64 = s
        .parse()
        .map_err(|e: std::num::ParseFloatError| format!("{s:?} is not a number: {e}"))?;
    float_value(f)
}

fn decode_float(raw: &RawValue) -> Result<Value, String> {
    match raw {
        RawValue::Config(toml::Value::Float(f)) => float_value(*f),
        RawValue::Config(toml::Value::Integer(n)) => float_value(*n as f64),
        other => parse_float(single(other)?),
    }
}

fn decode_text(raw: &RawValue) -> Result<Value, String> {
    match raw {
        RawValue::Config(toml::Value::Integer(n)) => Ok(Value::String(n.to_string())),
        RawValue::Config(toml::Value::Float(f)) => Ok(Value::String(f.to_string())),
        RawValue::Config(toml::Value::Boolean(b)) => Ok(Value::String(b.to_string())),
        other => single(other).map(|s| Value::String(s.to_string())),
    }
}

fn duration_value(d: Duration) -> Result<Value, String> {
    serde_json::to_value(d).map_err(|e| e.to_string())
}

fn decode_duration(raw: &RawValue) -> Result<Value, String> {
    match raw {
        RawValue::Config(toml::Value::Integer(secs)) => {
            let secs = u64::try_from(*secs).map_err(|_| format!("negative duration {secs}"))?;
            duration_value(Duration::from_secs(secs))
        }
        RawValue::Config(toml::Value::Float(secs)) => Duration::try_from_secs_f64(*secs)
            .map_err(|e| format!("invalid duration {secs}: {e}"))
            .and_then(duration_value),
        other => {
            let s = single(other)?;
            parse_duration(s)
                .map_err(|e| format!("{s:?}: {e}"))
                .and_then(duration_value)
        }
    }
}

fn decode_log_level(raw: &RawValue) -> Result<Value, String> {
    let s = single(raw)?;
    let level: LogLevel = s.parse().map_err(|e| format!("{e}"))?;
    Ok(Value::String(level.as_str().to_string()))
}

fn decode_elem(elem: Elem, s: &str) -> Result<Value, String> {
    match elem {
        Elem::Bool => parse_bool(s)
            .map(Value::Bool)
            .ok_or_else(|| format!("{s:?} is not a boolean")),
        Elem::Int(k) => parse_int(k, s),
        Elem::Float => parse_float(s),
        Elem::Text => Ok(Value::String(s.to_string())),
    }
}

fn decode_config_elem(elem: Elem, value: &toml::Value) -> Result<Value, String> {
    match (elem, value) {
        (_, toml::Value::String(s)) => decode_elem(elem, s),
        (Elem::Bool, toml::Value::Boolean(b)) => Ok(Value::Bool(*b)),
        (Elem::Int(k), toml::Value::Integer(n)) => int_value(k, i128::from(*n)),
        (Elem::Float, toml::Value::Float(f)) => float_value(*f),
        (Elem::Float, toml::Value::Integer(n)) => float_value(*n as f64),
        (Elem::Text, toml::Value::Integer(n)) => Ok(Value::String(n.to_string())),
        (Elem::Text, toml::Value::Float(f)) => Ok(Value::String(f.to_string())),
        (Elem::Text, toml::Value::Boolean(b)) => Ok(Value::String(b.to_string())),
        (_, other) => Err(format!("unexpected {} in list", other.type_str())),
    }
}

fn decode_list(elem: Elem, raw: &RawValue) -> Result<Value, String> {
    let items = match raw {
        RawValue::List(items) => items
            .iter()
            .map(|s| decode_elem(elem, s))
            .collect::<Result<Vec<_>, _>>()?,
        RawValue::Text(s) if s.is_empty() => Vec::new(),
        RawValue::Text(s) => s
            .split(',')
            .map(|s| decode_elem(elem, s))
            .collect::<Result<Vec<_>, _>>()?,
        RawValue::Config(toml::Value::Array(values)) => values
            .iter()
            .map(|v| decode_config_elem(elem, v))
            .collect::<Result<Vec<_>, _>>()?,
        RawValue::Config(toml::Value::String(s)) if s.is_empty() => Vec::new(),
        RawValue::Config(toml::Value::String(s)) => s
            .split(',')
            .map(|s| decode_elem(elem, s))
            .collect::<Result<Vec<_>, _>>()?,
        RawValue::Config(other) => vec![decode_config_elem(elem, other)?],
        RawValue::Count(_) => return Err("unexpected count".to_string()),
    };
    Ok(Value::Array(items))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationError(String);

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DurationError {}

const NANOS_PER_UNIT: [(&str, u128); 9] = [
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60_000_000_000),
    ("h", 3_600_000_000_000),
    ("d", 86_400_000_000_000),
];

/// Parse a duration such as `300ms`, `1.5s` or `1h30m`.
///
/// A sequence of decimal numbers, each with an optional fraction and a unit
/// suffix (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`, `d`). A bare `0` is accepted.
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    if s.is_empty() {
        return Err(DurationError("empty duration".to_string()));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err(DurationError("negative durations are not supported".to_string()));
    }
    let s = s.strip_prefix('+').unwrap_or(s);

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_dot.len());
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(DurationError(format!("invalid duration {s:?}")));
        }

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];
        if unit.is_empty() {
            return Err(DurationError(format!("missing unit in duration {s:?}")));
        }
        let Some(&(_, scale)) = NANOS_PER_UNIT.iter().find(|(name, _)| *name == unit) else {
            return Err(DurationError(format!("unknown unit {unit:?} in duration {s:?}")));
        };

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| DurationError(format!("invalid duration {s:?}")))?
        };
        let mut nanos = whole
            .checked_mul(scale)
            .ok_or_else(|| DurationError(format!("duration {s:?} overflows")))?;

        // Digits beyond nanosecond precision are dropped.
        let mut place = scale;
        for digit in frac_part.bytes() {
            place /= 10;
            if place == 0 {
                break;
            }
            nanos += u128::from(digit - b'0') * place;
        }

        total = total
            .checked_add(nanos)
            .ok_or_else(|| DurationError(format!("duration {s:?} overflows")))?;
    }

    let secs = u64::try_from(total / 1_000_000_000)
        .map_err(|_| DurationError(format!("duration {s:?} overflows")))?;
    Ok(Duration::new(secs, (total % 1_000_000_000) as u32))
}

fn trim_fraction(whole: u128, frac: u128, width: usize) -> String {
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Render a duration in the form accepted by [`parse_duration`]:
/// `0s`, `250ms`, `1.5s`, `1h30m0s`.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", trim_fraction(nanos / 1_000, nanos % 1_000, 3));
    }
    if nanos < 1_000_000_000 {
        return format!(
            "{}ms",
            trim_fraction(nanos / 1_000_000, nanos % 1_000_000, 6)
        );
    }

    let total_secs = nanos / 1_000_000_000;
    let sub = nanos % 1_000_000_000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = trim_fraction(total_secs % 60, sub, 9);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{secs}s"));
    out
}

/// Render a field value the way it would be typed on the command line.
///
/// `None` for null values, empty lists and values of custom types.
pub fn render(kind: Kind, value: &Value) -> Option<String> {
    match (kind, value) {
        (_, Value::Null) => None,
        (Kind::Duration, v) => serde_json::from_value::<Duration>(v.clone())
            .ok()
            .map(format_duration),
        (Kind::List(_), Value::Array(items)) if items.is_empty() => None,
        (Kind::List(_), Value::Array(items)) => Some(
            items
                .iter()
                .map(render_scalar)
                .collect::<Vec<_>>()
                .join(","),
        ),
        (Kind::Opaque, _) => None,
        (_, v) => Some(render_scalar(v)),
    }
}

/// Like [`render`], but falls back to compact JSON for custom values.
pub fn display(kind: Kind, value: &Value) -> String {
    match (kind, value) {
        (_, Value::Null) => "<none>".to_string(),
        (Kind::List(_), Value::Array(items)) if items.is_empty() => "[]".to_string(),
        (Kind::Opaque, Value::String(s)) => s.clone(),
        (Kind::Opaque, v) => v.to_string(),
        (kind, v) => render(kind, v).unwrap_or_else(|| v.to_string()),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
