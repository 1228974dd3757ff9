use crate::Result;
use crate::error::TplError;
use crate::helper::{Args, BlockRenderer, Helper, HelperRegistry};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::Write;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_TRUNCATE_SUFFIX: &str = "...";
const DEFAULT_PROGRESS_WIDTH: usize = 20;
const MAX_DECIMALS: usize = 20;
const MAX_JSON_INDENT: usize = 16;
const MAX_PROGRESS_WIDTH: usize = 1000;

pub(crate) fn register_builtins(registry: &HelperRegistry) {
    // control
    registry.register("if", Helper::block(if_helper));
    registry.register("unless", Helper::block(unless_helper));
    registry.register("each", Helper::block(each_helper));
    registry.register("with", Helper::block(with_helper));

    // comparison
    registry.register("eq", compare(values_equal));
    registry.register("ne", compare(|a, b| !values_equal(a, b)));
    registry.register("lt", compare(|a, b| compare_values(a, b) == Some(Ordering::Less)));
    registry.register("le", compare(|a, b| {
        matches!(compare_values(a, b), Some(Ordering::Less | Ordering::Equal))
    }));
    registry.register("gt", compare(|a, b| compare_values(a, b) == Some(Ordering::Greater)));
    registry.register("ge", compare(|a, b| {
        matches!(compare_values(a, b), Some(Ordering::Greater | Ordering::Equal))
    }));

    // string
    registry.register("uppercase", string_helper(|s| s.to_uppercase()));
    registry.register("lowercase", string_helper(|s| s.to_lowercase()));
    registry.register("capitalize", string_helper(capitalize));
    registry.register("truncate", Helper::inline(truncate));

    // formatting
    registry.register("json", Helper::inline(json));
    registry.register("formatNumber", Helper::inline(format_number));
    registry.register("formatDate", Helper::inline(format_date));

    // array
    registry.register("length", Helper::inline(length));
    registry.register("first", Helper::inline(|args| Ok(list_end(args.get(0), true))));
    registry.register("last", Helper::inline(|args| Ok(list_end(args.get(0), false))));
    registry.register("join", Helper::inline(join));

    // arithmetic
    registry.register("add", arithmetic("add", |a, b| Ok(a + b)));
    registry.register("subtract", arithmetic("subtract", |a, b| Ok(a - b)));
    registry.register("multiply", arithmetic("multiply", |a, b| Ok(a * b)));
    registry.register("divide", arithmetic("divide", |a, b| {
        if b == 0.0 {
            Err(TplError::helper("division by zero"))
        } else {
            Ok(a / b)
        }
    }));
    registry.register("modulo", arithmetic("modulo", |a, b| {
        if b == 0.0 {
            Err(TplError::helper("division by zero"))
        } else {
            Ok(a % b)
        }
    }));

    registry.register("default", Helper::inline(default_helper));

    // cli
    registry.register("colorize", Helper::inline(colorize));
    registry.register("progress", Helper::inline(progress));
}

/* ------------------------------- control -------------------------------- */

fn branch(cond: bool, block: &dyn BlockRenderer, ctx: &Value) -> Result<Value> {
    let out = if cond {
        block.render_children(ctx)?
    } else {
        block.render_inverse(ctx)?
    };
    Ok(Value::Str(out))
}

fn if_helper(args: &Args, block: &dyn BlockRenderer) -> Result<Value> {
    branch(args.get(0).is_truthy(), block, block.context())
}

fn unless_helper(args: &Args, block: &dyn BlockRenderer) -> Result<Value> {
    branch(!args.get(0).is_truthy(), block, block.context())
}

fn with_helper(args: &Args, block: &dyn BlockRenderer) -> Result<Value> {
    let target = args.get(0);
    if target.is_truthy() {
        branch(true, block, target)
    } else {
        branch(false, block, block.context())
    }
}

/// Lists expose `@index`, `@first` and `@last`; maps additionally expose `@key`
/// and are walked in key order.
fn each_helper(args: &Args, block: &dyn BlockRenderer) -> Result<Value> {
    let mut out = String::new();
    match args.get(0) {
        Value::List(items) if !items.is_empty() => {
            let last = items.len() - 1;
            for (i, item) in items.iter().enumerate() {
                let data = [
                    ("@index", Value::I64(i as i64)),
                    ("@first", Value::Bool(i == 0)),
                    ("@last", Value::Bool(i == last)),
                ];
                out.push_str(&block.render_children_with(item, &data)?);
            }
        }
        Value::Map(map) if !map.is_empty() => {
            let last = map.len() - 1;
            for (i, (key, item)) in map.iter().enumerate() {
                let data = [
                    ("@key", Value::Str(key.clone())),
                    ("@index", Value::I64(i as i64)),
                    ("@first", Value::Bool(i == 0)),
                    ("@last", Value::Bool(i == last)),
                ];
                out.push_str(&block.render_children_with(item, &data)?);
            }
        }
        _ => return branch(false, block, block.context()),
    }
    Ok(Value::Str(out))
}

/* ------------------------------ comparison ------------------------------ */

fn compare<F>(test: F) -> Helper
where
    F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
{
    Helper::block(move |args, block| {
        let result = test(args.get(0), args.get(1));
        if block.is_block() {
            branch(result, block, block.context())
        } else {
            Ok(Value::Bool(result))
        }
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::I64(_) | Value::F64(_), Value::I64(_) | Value::F64(_)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::I64(_) | Value::F64(_), Value::I64(_) | Value::F64(_)) => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Reads a size-like argument, clamping negatives to zero and rejecting
/// values above `max`.
fn bounded_arg(args: &Args, idx: usize, helper: &str, what: &str, max: usize) -> Result<Option<usize>> {
    let Some(n) = args.number(idx) else {
        return Ok(None);
    };
    let n = n.max(0.0);
    if n > max as f64 {
        return Err(TplError::helper(format!(
            "{} {} must be at most {}, got {}",
            helper, what, max, n
        )));
    }
    Ok(Some(n as usize))
}

/* -------------------------------- string -------------------------------- */

fn string_helper<F>(f: F) -> Helper
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    Helper::inline(move |args| Ok(Value::Str(f(&args.get(0).to_string()))))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `truncate text len [suffix]`; counts characters, not bytes.
fn truncate(args: &Args) -> Result<Value> {
    let text = args.get(0).to_string();
    let Some(len) = args.number(1) else {
        return Err(TplError::helper("truncate expects a length"));
    };
    let len = len.max(0.0) as usize;
    if text.chars().count() <= len {
        return Ok(Value::Str(text));
    }
    let suffix = args
        .text(2)
        .unwrap_or_else(|| DEFAULT_TRUNCATE_SUFFIX.to_string());
    let mut out: String = text.chars().take(len).collect();
    out.push_str(&suffix);
    Ok(Value::Str(out))
}

/* ------------------------------ formatting ------------------------------ */

/// `json value [indent]`
fn json(args: &Args) -> Result<Value> {
    let value = args.get(0);
    let indent = bounded_arg(args, 1, "json", "indent", MAX_JSON_INDENT)?.unwrap_or(0);
    let out = if indent == 0 {
        serde_json::to_string(value).map_err(|e| TplError::helper(e.to_string()))?
    } else {
        let indent = " ".repeat(indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value
            .serialize(&mut ser)
            .map_err(|e| TplError::helper(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TplError::helper(e.to_string()))?
    };
    Ok(Value::Str(out))
}

/// `formatNumber value [decimals]`: fixed decimals and `,` thousands separators.
fn format_number(args: &Args) -> Result<Value> {
    let value = args.get(0);
    if value.is_null() {
        return Ok(Value::Str(String::new()));
    }
    let Some(n) = value.as_f64() else {
        return Err(TplError::helper(format!(
            "formatNumber expects a number, got {}",
            value.type_name()
        )));
    };
    let formatted = match bounded_arg(args, 1, "formatNumber", "decimals", MAX_DECIMALS)? {
        Some(decimals) => format!("{:.*}", decimals, n),
        None => Value::number(n).to_string(),
    };
    Ok(Value::Str(group_thousands(&formatted)))
}

fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    if !int_part.chars().all(|c| c.is_ascii_digit()) {
        return formatted.to_string();
    }

    let mut grouped = String::with_capacity(formatted.len() + int_part.len() / 3);
    grouped.push_str(sign);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

/// `formatDate value [format]`; accepts datetimes, RFC 3339 / `YYYY-MM-DD[ HH:MM:SS]`
/// strings and millisecond timestamps.
fn format_date(args: &Args) -> Result<Value> {
    let value = args.get(0);
    if value.is_null() {
        return Ok(Value::Str(String::new()));
    }
    let dt = to_datetime(value).ok_or_else(|| {
        TplError::helper(format!("formatDate cannot read a date from '{}'", value))
    })?;
    let format = args
        .text(1)
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());

    let mut out = String::new();
    write!(out, "{}", dt.format(&format))
        .map_err(|_| TplError::helper(format!("invalid date format '{}'", format)))?;
    Ok(Value::Str(out))
}

fn to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::I64(ms) => DateTime::from_timestamp_millis(*ms),
        Value::F64(ms) => DateTime::from_timestamp_millis(*ms as i64),
        Value::Str(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        }
        _ => None,
    }
}

/* -------------------------------- array --------------------------------- */

fn length(args: &Args) -> Result<Value> {
    let len = match args.get(0) {
        Value::List(l) => l.len(),
        Value::Map(m) => m.len(),
        Value::Str(s) => s.chars().count(),
        _ => 0,
    };
    Ok(Value::I64(len as i64))
}

fn list_end(value: &Value, first: bool) -> Value {
    let item = match value {
        Value::List(l) if first => l.first(),
        Value::List(l) => l.last(),
        _ => None,
    };
    item.cloned().unwrap_or(Value::Null)
}

/// `join list [separator]`; the separator defaults to `,`.
fn join(args: &Args) -> Result<Value> {
    let Value::List(items) = args.get(0) else {
        return Ok(Value::Str(args.get(0).to_string()));
    };
    let separator = args.text(1).unwrap_or_else(|| ",".to_string());
    let joined = items
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::Str(joined))
}

/* ------------------------------ arithmetic ------------------------------ */

fn arithmetic<F>(name: &'static str, op: F) -> Helper
where
    F: Fn(f64, f64) -> Result<f64> + Send + Sync + 'static,
{
    Helper::inline(move |args| {
        let (Some(a), Some(b)) = (args.number(0), args.number(1)) else {
            return Err(TplError::helper(format!("{} expects two numbers", name)));
        };
        Ok(Value::number(op(a, b)?))
    })
}

/// `default value fallback`: the fallback replaces null and empty strings.
fn default_helper(args: &Args) -> Result<Value> {
    let value = args.get(0);
    let missing = match value {
        Value::Null => true,
        Value::Str(s) => s.is_empty(),
        _ => false,
    };
    if missing {
        Ok(args.value_or_raw(1).unwrap_or(Value::Null))
    } else {
        Ok(value.clone())
    }
}

/* --------------------------------- cli ---------------------------------- */

fn ansi_code(color: &str) -> Option<&'static str> {
    let code = match color.to_ascii_lowercase().as_str() {
        "black" => "30",
        "red" => "31",
        "green" => "32",
        "yellow" => "33",
        "blue" => "34",
        "magenta" => "35",
        "cyan" => "36",
        "white" => "37",
        "gray" | "grey" => "90",
        "bold" => "1",
        "dim" => "2",
        "italic" => "3",
        "underline" => "4",
        _ => return None,
    };
    Some(code)
}

/// `colorize text color`; unknown colors leave the text untouched.
fn colorize(args: &Args) -> Result<Value> {
    let text = args.get(0).to_string();
    let color = args.text(1).unwrap_or_default();
    match ansi_code(&color) {
        Some(code) => Ok(Value::Str(format!("\x1b[{}m{}\x1b[0m", code, text))),
        None => Ok(Value::Str(text)),
    }
}

/// `progress current total [width]` -> `██████░░░░ 60%`
fn progress(args: &Args) -> Result<Value> {
    let current = args.number(0).unwrap_or(0.0);
    let total = args.number(1).unwrap_or(0.0);
    let width = bounded_arg(args, 2, "progress", "width", MAX_PROGRESS_WIDTH)?
        .unwrap_or(DEFAULT_PROGRESS_WIDTH);

    let ratio = if total > 0.0 {
        (current / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = ((ratio * width as f64).round() as usize).min(width);
    let bar = format!(
        "{}{} {}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        (ratio * 100.0).round() as i64
    );
    Ok(Value::Str(bar))
}
