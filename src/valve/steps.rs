//! Built-in chain steps
//!
//! Each method appends one step. Checks pass the value through or fail with a
//! fixed message; conversions rewrite the value and carry no help text.

use std::cmp::Ordering;
use std::net::IpAddr;
use std::sync::Arc;

use futures_util::future::{try_join_all, FutureExt};
use indexmap::IndexMap;
use regex::RegexBuilder;
use serde_json::{Map, Number, Value};
use validator::{ValidateEmail, ValidateUrl};

use super::chain::{Baton, Chain, Step, StepFn};
use super::errors::{ChainError, ChainResult};
use super::ip;

/// Text form of a scalar; `None` for null, arrays and maps.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Value as shown inside messages: strings unquoted.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    a == b || matches!((text_of(a), text_of(b)), (Some(x), Some(y)) if x == y)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_int_text(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    digits == "0" || (is_digits(digits) && !digits.starts_with('0'))
}

fn is_numeric_text(s: &str) -> bool {
    is_digits(s.strip_prefix('-').unwrap_or(s))
}

fn is_decimal_text(s: &str) -> bool {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let whole_ok = whole.is_empty() || is_int_text(whole);
    let fraction_ok = fraction.map_or(true, |f| f.bytes().all(|b| b.is_ascii_digit()));
    let has_digit = unsigned.bytes().any(|b| b.is_ascii_digit());
    whole_ok && fraction_ok && has_digit
}

/// Leading integer of `s`, like `parseInt`: "1.23" -> 1, "12px" -> 12.
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn check(
    ok: impl Fn(&Value) -> bool + Send + Sync + 'static,
    message: &'static str,
) -> impl Fn(Value, &Baton) -> Result<Value, String> + Send + Sync + 'static {
    move |value, _| {
        if ok(&value) {
            Ok(value)
        } else {
            Err(message.to_string())
        }
    }
}

fn text_check(
    ok: impl Fn(&str) -> bool + Send + Sync + 'static,
    message: &'static str,
) -> impl Fn(Value, &Baton) -> Result<Value, String> + Send + Sync + 'static {
    check(move |value| text_of(value).map_or(false, |s| ok(&s)), message)
}

fn help(text: &str) -> Option<String> {
    Some(text.to_string())
}

impl Chain {
    // ---------------------------------------------------------------------
    // Format checks
    // ---------------------------------------------------------------------

    pub fn is_email(self) -> Self {
        self.sync_step(
            "is_email",
            help("Email address"),
            check(
                |v| matches!(v, Value::String(s) if s.validate_email()),
                "Invalid email",
            ),
        )
    }

    pub fn is_url(self) -> Self {
        self.sync_step(
            "is_url",
            help("URL"),
            check(|v| matches!(v, Value::String(s) if s.validate_url()), "Invalid URL"),
        )
    }

    /// IPv4 or IPv6 address; IPv6 is rewritten to its expanded form.
    pub fn is_ip(self) -> Self {
        self.sync_step("is_ip", help("IP address"), |value, _| {
            value
                .as_str()
                .and_then(ip::normalize_ip)
                .map(Value::String)
                .ok_or_else(|| "Invalid IP".to_string())
        })
    }

    pub fn is_ipv4(self) -> Self {
        self.sync_step("is_ipv4", help("IPv4 address"), |value, _| {
            value
                .as_str()
                .and_then(ip::normalize_ipv4)
                .map(Value::String)
                .ok_or_else(|| "Invalid IPv4".to_string())
        })
    }

    pub fn is_ipv6(self) -> Self {
        self.sync_step("is_ipv6", help("IPv6 address"), |value, _| {
            value
                .as_str()
                .and_then(ip::normalize_ipv6)
                .map(Value::String)
                .ok_or_else(|| "Invalid IPv6".to_string())
        })
    }

    /// `addr/len` subnet; the address part is canonicalized.
    pub fn is_cidr(self) -> Self {
        self.sync_step(
            "is_cidr",
            help("IPv4 or IPv6 subnet (CIDR notation)"),
            |value, _| {
                let text = value
                    .as_str()
                    .ok_or_else(|| ip::CidrError::Notation.message().to_string())?;
                ip::normalize_cidr(text)
                    .map(Value::String)
                    .map_err(|e| e.message().to_string())
            },
        )
    }

    /// Rejects private, loopback and multicast addresses.
    pub fn not_ip_blacklisted(self) -> Self {
        self.sync_step(
            "not_ip_blacklisted",
            help("IP address (not blacklisted)"),
            |value, _| {
                let addr: IpAddr = value
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| "Invalid IP".to_string())?;
                if ip::is_blacklisted(&addr) {
                    return Err("IP is blacklisted".to_string());
                }
                let canonical = match addr {
                    IpAddr::V4(v4) => v4.to_string(),
                    IpAddr::V6(v6) => ip::expand_ipv6(&v6),
                };
                Ok(Value::String(canonical))
            },
        )
    }

    pub fn is_alpha(self) -> Self {
        self.sync_step(
            "is_alpha",
            help("Alphabetical string"),
            text_check(
                |s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()),
                "Invalid characters",
            ),
        )
    }

    pub fn is_alphanumeric(self) -> Self {
        self.sync_step(
            "is_alphanumeric",
            help("Alphanumeric string"),
            text_check(
                |s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()),
                "Invalid characters",
            ),
        )
    }

    /// Digits with an optional sign; leading zeros allowed.
    pub fn is_numeric(self) -> Self {
        self.sync_step(
            "is_numeric",
            help("Whole number (may be zero padded)"),
            text_check(is_numeric_text, "Invalid number"),
        )
    }

    pub fn is_int(self) -> Self {
        self.sync_step(
            "is_int",
            help("Integer"),
            check(
                |v| match v {
                    Value::Number(n) => {
                        n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
                    }
                    Value::String(s) => is_int_text(s),
                    _ => false,
                },
                "Invalid integer",
            ),
        )
    }

    pub fn is_decimal(self) -> Self {
        self.sync_step(
            "is_decimal",
            help("Fractional number"),
            check(
                |v| match v {
                    Value::Number(_) => true,
                    Value::String(s) => is_decimal_text(s),
                    _ => false,
                },
                "Invalid decimal",
            ),
        )
    }

    /// Same acceptance as `is_decimal`.
    pub fn is_float(self) -> Self {
        self.sync_step(
            "is_float",
            help("Fractional number"),
            check(
                |v| match v {
                    Value::Number(_) => true,
                    Value::String(s) => is_decimal_text(s),
                    _ => false,
                },
                "Invalid decimal",
            ),
        )
    }

    pub fn is_lowercase(self) -> Self {
        self.sync_step(
            "is_lowercase",
            help("Lowercase string"),
            text_check(|s| s == s.to_lowercase(), "Invalid characters"),
        )
    }

    pub fn is_uppercase(self) -> Self {
        self.sync_step(
            "is_uppercase",
            help("Uppercase string"),
            text_check(|s| s == s.to_uppercase(), "Invalid characters"),
        )
    }

    pub fn not_null(self) -> Self {
        self.sync_step(
            "not_null",
            help("Non-null value"),
            check(
                |v| !matches!(v, Value::Null) && v.as_str() != Some(""),
                "Invalid characters",
            ),
        )
    }

    pub fn is_null(self) -> Self {
        self.sync_step(
            "is_null",
            help("Null value or empty string"),
            check(
                |v| matches!(v, Value::Null) || v.as_str() == Some(""),
                "Invalid characters",
            ),
        )
    }

    /// Fails on null and on strings that are empty or all whitespace.
    pub fn not_empty(self) -> Self {
        self.sync_step(
            "not_empty",
            help("Non-empty string"),
            check(
                |v| match v {
                    Value::Null => false,
                    Value::String(s) => !s.trim().is_empty(),
                    _ => true,
                },
                "String is empty",
            ),
        )
    }

    /// Loose equality: `123` equals `"123"`.
    pub fn equals(self, expected: impl Into<Value>) -> Self {
        let expected = expected.into();
        let text = format!("String equal to '{}'", display_value(&expected));
        self.sync_step(
            "equals",
            Some(text),
            check(move |v| loosely_equal(v, &expected), "Not equal"),
        )
    }

    pub fn contains(self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        let text = format!("String containing the substring '{}'", needle);
        self.sync_step(
            "contains",
            Some(text),
            text_check(move |s| s.contains(needle.as_str()), "Invalid characters"),
        )
    }

    pub fn not_contains(self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        let text = format!("String not containing the substring '{}'", needle);
        self.sync_step(
            "not_contains",
            Some(text),
            check(
                move |v| !text_of(v).map_or(false, |s| s.contains(needle.as_str())),
                "Invalid characters",
            ),
        )
    }

    /// Match against `pattern`. `modifiers` may hold `i`, `m` and `s`.
    pub fn regex(self, pattern: &str, modifiers: &str) -> ChainResult<Self> {
        let re = compile(pattern, modifiers)?;
        let text = format!("String matching the regex /{}/{}", pattern, modifiers);
        Ok(self.sync_step(
            "regex",
            Some(text),
            text_check(move |s| re.is_match(s), "Invalid characters"),
        ))
    }

    pub fn not_regex(self, pattern: &str, modifiers: &str) -> ChainResult<Self> {
        let re = compile(pattern, modifiers)?;
        let text = format!("String not matching the regex /{}/{}", pattern, modifiers);
        Ok(self.sync_step(
            "not_regex",
            Some(text),
            check(
                move |v| !text_of(v).map_or(false, |s| re.is_match(&s)),
                "Invalid characters",
            ),
        ))
    }

    /// Character length bounds. Without `max` only the minimum applies.
    pub fn len(self, min: usize, max: Option<usize>) -> Self {
        let text = match max {
            Some(max) => format!("String between {} and {} characters long", min, max),
            None => format!("String at least {} characters long", min),
        };
        self.sync_step("len", Some(text), move |value, _| {
            let count = text_of(&value).map_or(0, |s| s.chars().count());
            if count < min {
                return Err("String is too small".to_string());
            }
            if max.map_or(false, |max| count > max) {
                return Err("String is too large".to_string());
            }
            Ok(value)
        })
    }

    /// Inclusive bounds. Numbers compare numerically, strings lexically.
    pub fn range(self, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        let (min, max) = (min.into(), max.into());
        let bounds = format!("{}..{}", display_value(&min), display_value(&max));
        let message = format!("Value out of range ({})", bounds);
        self.sync_step("range", Some(format!("Value ({})", bounds)), move |value, _| {
            let above_min = matches!(compare(&value, &min), Some(Ordering::Greater | Ordering::Equal));
            let below_max = matches!(compare(&value, &max), Some(Ordering::Less | Ordering::Equal));
            if above_min && below_max {
                Ok(value)
            } else {
                Err(message.clone())
            }
        })
    }

    /// TCP/UDP port, converted to an integer.
    pub fn is_port(self) -> Self {
        self.sync_step("is_port", help("Port (1..65535)"), |value, _| {
            let port = match &value {
                Value::Number(n) => n.as_f64().map(|f| f.trunc() as i64),
                Value::String(s) => leading_int(s),
                _ => None,
            };
            match port {
                Some(port) if (1..=65535).contains(&port) => Ok(Value::from(port)),
                _ => Err("Value out of range [1,65535]".to_string()),
            }
        })
    }

    pub fn is_string(self) -> Self {
        self.sync_step(
            "is_string",
            help("String"),
            check(Value::is_string, "Not a string"),
        )
    }

    /// Accepts `0`, `1`, `true`, `false` (any case) and yields a boolean.
    pub fn is_boolean(self) -> Self {
        self.sync_step("is_boolean", help("Boolean"), |value, _| {
            let parsed = match &value {
                Value::Bool(b) => Some(*b),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f == 0.0 => Some(false),
                    Some(f) if f == 1.0 => Some(true),
                    _ => None,
                },
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => None,
                },
                _ => None,
            };
            parsed
                .map(Value::Bool)
                .ok_or_else(|| "Not a boolean".to_string())
        })
    }

    // ---------------------------------------------------------------------
    // Conversions
    // ---------------------------------------------------------------------

    /// Leading integer; unparseable input becomes null.
    pub fn to_int(self) -> Self {
        self.sync_step("to_int", None, |value, _| {
            Ok(match &value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Value::from(i),
                    None => n.as_f64().map_or(Value::Null, |f| number_value(f.trunc())),
                },
                Value::String(s) => leading_int(s).map_or(Value::Null, Value::from),
                _ => Value::Null,
            })
        })
    }

    /// Unparseable input becomes null.
    pub fn to_float(self) -> Self {
        self.sync_step("to_float", None, |value, _| {
            Ok(match &value {
                Value::Number(_) => value,
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number),
                _ => Value::Null,
            })
        })
    }

    /// False only for `0`, `"0"`, `false`, `"false"`, `""` and null.
    pub fn to_boolean(self) -> Self {
        self.sync_step("to_boolean", None, |value, _| {
            let falsy = match &value {
                Value::Null => true,
                Value::Bool(b) => !b,
                Value::Number(n) => n.as_f64() == Some(0.0),
                Value::String(s) => matches!(s.as_str(), "" | "0" | "false"),
                _ => false,
            };
            Ok(Value::Bool(!falsy))
        })
    }

    /// True only for `1`, `"1"`, `true` and `"true"`.
    pub fn to_boolean_strict(self) -> Self {
        self.sync_step("to_boolean_strict", None, |value, _| {
            let truthy = match &value {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64() == Some(1.0),
                Value::String(s) => matches!(s.as_str(), "1" | "true"),
                _ => false,
            };
            Ok(Value::Bool(truthy))
        })
    }

    pub fn entity_decode(self) -> Self {
        self.sync_step("entity_decode", None, |value, _| {
            Ok(match value {
                Value::String(s) => Value::String(html_escape::decode_html_entities(&s).into_owned()),
                other => other,
            })
        })
    }

    pub fn entity_encode(self) -> Self {
        self.sync_step("entity_encode", None, |value, _| {
            Ok(match value {
                Value::String(s) => Value::String(html_escape::encode_text(&s).into_owned()),
                other => other,
            })
        })
    }

    /// Remove script-bearing markup (script tags, event handler attributes,
    /// `javascript:` links) while keeping harmless formatting tags.
    pub fn xss(self) -> Self {
        self.sync_step("xss", None, |value, _| {
            Ok(match value {
                Value::String(s) => Value::String(ammonia::clean(&s)),
                other => other,
            })
        })
    }

    /// Strip whitespace, or the characters in `chars`, from both ends.
    pub fn trim(self, chars: Option<&str>) -> Self {
        let set: Option<Vec<char>> = chars.map(|c| c.chars().collect());
        self.sync_step("trim", None, move |value, _| {
            Ok(match value {
                Value::String(s) => Value::String(match &set {
                    Some(set) => s.trim_matches(set.as_slice()).to_string(),
                    None => s.trim().to_string(),
                }),
                other => other,
            })
        })
    }

    pub fn ltrim(self, chars: Option<&str>) -> Self {
        let set: Option<Vec<char>> = chars.map(|c| c.chars().collect());
        self.sync_step("ltrim", None, move |value, _| {
            Ok(match value {
                Value::String(s) => Value::String(match &set {
                    Some(set) => s.trim_start_matches(set.as_slice()).to_string(),
                    None => s.trim_start().to_string(),
                }),
                other => other,
            })
        })
    }

    pub fn rtrim(self, chars: Option<&str>) -> Self {
        let set: Option<Vec<char>> = chars.map(|c| c.chars().collect());
        self.sync_step("rtrim", None, move |value, _| {
            Ok(match value {
                Value::String(s) => Value::String(match &set {
                    Some(set) => s.trim_end_matches(set.as_slice()).to_string(),
                    None => s.trim_end().to_string(),
                }),
                other => other,
            })
        })
    }

    /// Replace null or `""` with `default`.
    pub fn if_null(self, default: impl Into<Value>) -> Self {
        let default = default.into();
        self.sync_step("if_null", None, move |value, _| {
            if value.is_null() || value.as_str() == Some("") {
                Ok(default.clone())
            } else {
                Ok(value)
            }
        })
    }

    /// Translate a wire label to its internal value.
    pub fn enumerated<I, K, V>(self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let map: IndexMap<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.enumerated_map(map)
    }

    pub fn enumerated_map(self, map: IndexMap<String, Value>) -> Self {
        let labels: Vec<&str> = map.keys().map(String::as_str).collect();
        let text = format!("One of ({})", labels.join(", "));
        self.sync_step("enumerated", Some(text), move |value, _| {
            text_of(&value)
                .and_then(|label| map.get(&label).cloned())
                .ok_or_else(|| format!("Invalid value '{}'", display_value(&value)))
        })
    }

    /// Membership in `allowed`, compared loosely.
    pub fn in_array<I, V>(self, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let allowed: Vec<Value> = allowed.into_iter().map(Into::into).collect();
        let listed = allowed
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!("One of [{}]", listed);
        self.sync_step("in_array", Some(text), move |value, _| {
            if allowed.iter().any(|a| loosely_equal(a, &value)) {
                Ok(value)
            } else {
                Err(format!(
                    "Invalid value '{}'. Should be one of ({})",
                    display_value(&value),
                    listed
                ))
            }
        })
    }

    // ---------------------------------------------------------------------
    // Structural recursion
    // ---------------------------------------------------------------------

    /// Every element must pass `inner`. Elements are checked concurrently;
    /// the first failure fails the array.
    pub fn is_array(self, inner: Chain) -> Self {
        let text = format!("Array [{}]", inner.help().join(", "));
        let inner = Arc::new(inner);
        let func: StepFn = Arc::new(move |value: Value, baton: Baton| {
            let inner = inner.clone();
            async move {
                let items = match value {
                    Value::Array(items) => items,
                    _ => return Err("Not an array".to_string()),
                };
                let cleaned =
                    try_join_all(items.into_iter().map(|item| inner.run(item, &baton))).await?;
                Ok(Value::Array(cleaned))
            }
            .boxed()
        });
        self.push(Step::new("is_array", Some(text), func))
    }

    /// A map whose keys pass `key_chain` and values pass `value_chain`.
    pub fn is_hash(self, key_chain: Chain, value_chain: Chain) -> Self {
        let text = format!(
            "Hash [{}:{}]",
            key_chain.help().join(", "),
            value_chain.help().join(", ")
        );
        let chains = Arc::new((key_chain, value_chain));
        let func: StepFn = Arc::new(move |value: Value, baton: Baton| {
            let chains = chains.clone();
            async move {
                let entries = match value {
                    Value::Object(entries) => entries,
                    _ => return Err("Not a hash".to_string()),
                };
                let (key_chain, value_chain) = &*chains;
                let mut cleaned = Map::new();
                for (key, item) in entries {
                    let new_key = key_chain
                        .run(Value::String(key.clone()), &baton)
                        .await
                        .map_err(|e| format!("Key {}: {}", key, e))?;
                    let new_value = value_chain
                        .run(item, &baton)
                        .await
                        .map_err(|e| format!("Value for key '{}': {}", key, e))?;
                    cleaned.insert(display_value(&new_key), new_value);
                }
                Ok(Value::Object(cleaned))
            }
            .boxed()
        });
        self.push(Step::new("is_hash", Some(text), func))
    }
}

fn compile(pattern: &str, modifiers: &str) -> ChainResult<regex::Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(modifiers.contains('i'))
        .multi_line(modifiers.contains('m'))
        .dot_matches_new_line(modifiers.contains('s'))
        .build()
        .map_err(|e| ChainError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}
