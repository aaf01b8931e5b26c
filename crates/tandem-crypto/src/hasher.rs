use serde_json::{Map, Number, Value};
use sha2::{Digest as _, Sha256};
use tandem_types::Digest;

/// SHA-256 content hasher.
///
/// Values are first reduced to their canonical JSON text and the UTF-8 bytes
/// of that text are hashed. There is no domain tag: the digest of a value
/// must match what any other client computes over the same text.
///
/// The canonical text is the compact form a JavaScript client produces with
/// `JSON.stringify`:
/// - object keys that are array indices (`"0"`, `"17"`, below 2^32 - 1)
///   come first in ascending numeric order, then the rest in insertion
///   order;
/// - integral numbers below 1e21 carry no fraction (`2`, not `2.0`);
/// - exponents are signed (`1e+21`) and magnitudes from 1e-6 up to 1e-5 are
///   written out in decimal (`0.0000015`).
pub struct ContentHasher;

impl ContentHasher {
    /// Hash an already-encoded string.
    pub fn digest_str(encoded: &str) -> Digest {
        Self::digest_bytes(encoded.as_bytes())
    }

    /// Hash raw bytes.
    pub fn digest_bytes(data: &[u8]) -> Digest {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&Sha256::digest(data));
        Digest::from_hash(hash)
    }

    /// Canonical text encoding of a value.
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, HasherError> {
        let value = serde_json::to_value(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        let mut out = String::new();
        write_value(&mut out, &value)?;
        Ok(out)
    }

    /// Hash a serializable value through its canonical encoding.
    pub fn digest_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Digest, HasherError> {
        Ok(Self::digest_str(&Self::encode(value)?))
    }

    /// Verify that a value produces the expected digest.
    pub fn verify<T: serde::Serialize + ?Sized>(
        value: &T,
        expected: &Digest,
    ) -> Result<bool, HasherError> {
        Ok(Self::digest_json(value)? == *expected)
    }
}

fn write_value(out: &mut String, value: &Value) -> Result<(), HasherError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&number_text(n)),
        Value::String(s) => write_str(out, s)?,
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Object(fields) => write_object(out, fields)?,
    }
    Ok(())
}

fn write_object(out: &mut String, fields: &Map<String, Value>) -> Result<(), HasherError> {
    let mut indexed: Vec<(u32, &String, &Value)> = Vec::new();
    let mut named: Vec<(&String, &Value)> = Vec::new();
    for (key, value) in fields {
        match array_index(key) {
            Some(index) => indexed.push((index, key, value)),
            None => named.push((key, value)),
        }
    }
    indexed.sort_by_key(|(index, _, _)| *index);

    out.push('{');
    let ordered = indexed.into_iter().map(|(_, k, v)| (k, v)).chain(named);
    for (i, (key, value)) in ordered.enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_str(out, key)?;
        out.push(':');
        write_value(out, value)?;
    }
    out.push('}');
    Ok(())
}

fn write_str(out: &mut String, s: &str) -> Result<(), HasherError> {
    let quoted = serde_json::to_string(s).map_err(|e| HasherError::Serialization(e.to_string()))?;
    out.push_str(&quoted);
    Ok(())
}

/// The key as an array index: canonical decimal, at most 2^32 - 2.
fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|&index| index != u32::MAX)
}

fn number_text(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(_) => float_text(&n.to_string()).unwrap_or_else(|| n.to_string()),
        None => n.to_string(),
    }
}

/// Re-lay the shortest round-trip digits of a float the way JavaScript's
/// number-to-string does.
fn float_text(shortest: &str) -> Option<String> {
    let (sign, unsigned) = match shortest.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", shortest),
    };
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i32>().ok()?),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    // value = digits * 10^scale
    let mut scale = exponent - i32::try_from(frac_part.len()).ok()?;
    let joined = format!("{int_part}{frac_part}");
    let trimmed = joined.trim_start_matches('0');
    let digits = trimmed.trim_end_matches('0');
    scale += i32::try_from(trimmed.len() - digits.len()).ok()?;
    if digits.is_empty() {
        return Some("0".to_string());
    }

    let k = i32::try_from(digits.len()).ok()?;
    let n = scale + k;
    let body = if k <= n && n <= 21 {
        format!("{digits}{}", "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (whole, frac) = digits.split_at(n as usize);
        format!("{whole}.{frac}")
    } else if -6 < n && n <= 0 {
        format!("0.{}{digits}", "0".repeat((-n) as usize))
    } else {
        let e = n - 1;
        let e_sign = if e < 0 { '-' } else { '+' };
        let (lead, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{lead}e{e_sign}{}", e.abs())
        } else {
            format!("{lead}.{rest}e{e_sign}{}", e.abs())
        }
    };
    Some(format!("{sign}{body}"))
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
