//! Arbitrary-precision decimal numbers.
//!
//! `Decimal` lives in the `decimal` module of the captured program, so its
//! type support only activates once that module shows up in the
//! [`ModuleTable`](super::ModuleTable).

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::{PostmortemError, Result};
use crate::value::NativeValue;

use super::Object;

/// Decimal number kept in its exact textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal
{
    text: String,
}

impl Decimal
{
    /// Parse a decimal literal such as `3.14`, `-1e-7`, `NaN` or `Infinity`.
    ///
    /// ## Errors
    ///
    /// Returns [`PostmortemError::InvalidArgument`] if `text` is not a
    /// decimal literal.
    pub fn parse(text: &str) -> Result<Self>
    {
        let text = text.trim();
        if is_decimal_literal(text) {
            Ok(Self { text: text.to_string() })
        } else {
            Err(PostmortemError::InvalidArgument(format!("invalid decimal literal: {text:?}")))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str
    {
        &self.text
    }
}

fn is_decimal_literal(text: &str) -> bool
{
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let lower = unsigned.to_ascii_lowercase();
    if matches!(lower.as_str(), "nan" | "snan" | "inf" | "infinity") {
        return true;
    }

    let (mantissa, exponent) = match lower.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, Some(exponent)),
        None => (lower.as_str(), None),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits_ok = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if int_part.is_empty() && frac_part.is_empty() {
        return false;
    }
    if !digits_ok(int_part) || !digits_ok(frac_part) {
        return false;
    }
    match exponent {
        Some(exponent) => {
            let exponent = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
            !exponent.is_empty() && digits_ok(exponent)
        }
        None => true,
    }
}

impl FromStr for Decimal
{
    type Err = PostmortemError;

    fn from_str(s: &str) -> Result<Self>
    {
        Self::parse(s)
    }
}

impl fmt::Display for Decimal
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.text)
    }
}

impl Object for Decimal
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("decimal.Decimal")
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

impl NativeValue for Decimal
{
    fn type_name(&self) -> &str
    {
        "decimal.Decimal"
    }

    fn repr(&self) -> String
    {
        format!("Decimal('{}')", self.text)
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}
