//! Value Objects for the retailer portal

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Authenticated retailer identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetailerId(String);

impl RetailerId {
    pub fn new(value: impl Into<String>) -> Result<Self, RetailerIdError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(RetailerIdError::Empty); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }

    /// Storage-safe key for the retailer's durable cart record.
    pub fn storage_key(&self) -> String { URL_SAFE_NO_PAD.encode(self.0.as_bytes()) }
}

impl fmt::Display for RetailerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum RetailerIdError { Empty }
impl std::error::Error for RetailerIdError {}
impl fmt::Display for RetailerIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "retailer id empty") }
}

/// Variant barcode; the cart key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Barcode(String);

impl Barcode {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into().trim().to_string()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl From<&str> for Barcode {
    fn from(value: &str) -> Self { Self::new(value) }
}

/// Colour code plus the display name it was first seen with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorRef {
    pub code: String,
    pub name: String,
}

impl ColorRef {
    /// Codes are compared upper-cased; an empty name falls back to the code.
    pub fn new(code: &str, name: &str) -> Self {
        let code = code.trim().to_uppercase();
        let name = name.trim();
        let name = if name.is_empty() { code.clone() } else { name.to_string() };
        Self { code, name }
    }
}

/// Parses an MRP string such as `"1,234.50"`.
///
/// Thousands separators and surrounding whitespace are stripped. Anything that
/// still fails to parse, and negative amounts, come back as zero.
pub fn parse_mrp(raw: &str) -> Decimal {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    match Decimal::from_str(&cleaned) {
        Ok(value) if value.is_sign_negative() => Decimal::ZERO,
        Ok(value) => value,
        Err(_) => Decimal::ZERO,
    }
}

/// Numeric-aware ordering for size labels, so `"9" < "10"` and `"32B" < "34A"`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks { rest: a };
    let mut right = Chunks { rest: b };
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
                    (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
                    (Chunk::Text(x), Chunk::Text(y)) => x.to_uppercase().cmp(&y.to_uppercase()),
                };
                if ord != Ordering::Equal { return ord; }
            }
        }
    }
}

// Compares digit runs by value without parsing, so long runs cannot overflow.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

enum Chunk<'a> { Digits(&'a str), Text(&'a str) }

struct Chunks<'a> { rest: &'a str }

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let digits = self.rest.chars().next()?.is_ascii_digit();
        let end = self.rest.find(|c: char| c.is_ascii_digit() != digits).unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(if digits { Chunk::Digits(head) } else { Chunk::Text(head) })
    }
}

/// Advisory stock band shown next to a variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "remaining", rename_all = "snake_case")]
pub enum StockLevel { Available, Low(u32), OutOfStock }

impl StockLevel {
    pub const LOW_THRESHOLD: u32 = 10;

    pub fn from_stock(stock: u32) -> Self {
        match stock {
            0 => Self::OutOfStock,
            n if n <= Self::LOW_THRESHOLD => Self::Low(n),
            _ => Self::Available,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Available => "Available".to_string(),
            Self::Low(n) => format!("Only {n} left"),
            Self::OutOfStock => "Out of stock".to_string(),
        }
    }
}
