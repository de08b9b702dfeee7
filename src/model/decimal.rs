//! Arbitrary-precision xsd:decimal representation.
//!
//! Stored in a normalized form so that comparison and equality are exact,
//! without rounding through floating point.

use std::cmp::Ordering;
use std::fmt;

/// A normalized decimal number: sign, integer digits and fractional digits
/// with no superfluous zeros. Zero is represented with empty digit strings
/// and a non-negative sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdDecimal {
    negative: bool,
    /// Integer part digits, no leading zeros ("" for 0)
    int_digits: String,
    /// Fractional part digits, no trailing zeros ("" for none)
    frac_digits: String,
}

impl XsdDecimal {
    /// Parse an xsd:decimal lexical form: optional sign, digits, optional
    /// fraction. Returns `None` when the form is not a valid decimal.
    pub fn parse(lexical: &str) -> Option<Self> {
        let s = lexical.trim();
        let (negative, rest) = match s.as_bytes().first()? {
            b'+' => (false, &s[1..]),
            b'-' => (true, &s[1..]),
            _ => (false, s),
        };
        let (int_part, frac_part) = match rest.find('.') {
            Some(dot) => (&rest[..dot], &rest[dot + 1..]),
            None => (rest, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let int_digits = int_part.trim_start_matches('0').to_string();
        let frac_digits = frac_part.trim_end_matches('0').to_string();
        let is_zero = int_digits.is_empty() && frac_digits.is_empty();
        Some(XsdDecimal {
            negative: negative && !is_zero,
            int_digits,
            frac_digits,
        })
    }

    /// Build a decimal from a 64-bit integer.
    pub fn from_integer(value: i64) -> Self {
        let negative = value < 0;
        let digits = value.unsigned_abs().to_string();
        XsdDecimal {
            negative: negative && value != 0,
            int_digits: digits.trim_start_matches('0').to_string(),
            frac_digits: String::new(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.int_digits.is_empty() && self.frac_digits.is_empty()
    }

    /// Approximate as a binary double, for mixed float/decimal comparisons.
    pub fn to_f64(&self) -> f64 {
        let mut s = String::new();
        if self.negative {
            s.push('-');
        }
        s.push_str(if self.int_digits.is_empty() {
            "0"
        } else {
            &self.int_digits
        });
        if !self.frac_digits.is_empty() {
            s.push('.');
            s.push_str(&self.frac_digits);
        }
        s.parse().unwrap_or(0.0)
    }
}

impl Ord for XsdDecimal {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => return Ordering::Greater,
            (true, false) => return Ordering::Less,
            _ => {}
        }
        let mag = magnitude_cmp(self, other);
        if self.negative {
            mag.reverse()
        } else {
            mag
        }
    }
}

impl PartialOrd for XsdDecimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare absolute values.
fn magnitude_cmp(a: &XsdDecimal, b: &XsdDecimal) -> Ordering {
    // longer integer part means larger magnitude
    match a.int_digits.len().cmp(&b.int_digits.len()) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match a.int_digits.cmp(&b.int_digits) {
        Ordering::Equal => {}
        ord => return ord,
    }
    // integer parts equal: compare fractions digit by digit, missing
    // digits count as zero
    let fa = a.frac_digits.as_bytes();
    let fb = b.frac_digits.as_bytes();
    let n = fa.len().max(fb.len());
    for i in 0..n {
        let da = fa.get(i).copied().unwrap_or(b'0');
        let db = fb.get(i).copied().unwrap_or(b'0');
        match da.cmp(&db) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    Ordering::Equal
}

impl fmt::Display for XsdDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(
            f,
            "{}",
            if self.int_digits.is_empty() {
                "0"
            } else {
                &self.int_digits
            }
        )?;
        if !self.frac_digits.is_empty() {
            write!(f, ".{}", self.frac_digits)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes() {
        assert_eq!(XsdDecimal::parse("1.50").unwrap().to_string(), "1.5");
        assert_eq!(XsdDecimal::parse("007").unwrap().to_string(), "7");
        assert_eq!(XsdDecimal::parse("-0.0").unwrap().to_string(), "0");
        assert_eq!(XsdDecimal::parse("+.5").unwrap().to_string(), "0.5");
        assert!(XsdDecimal::parse("1e5").is_none());
        assert!(XsdDecimal::parse(".").is_none());
        assert!(XsdDecimal::parse("abc").is_none());
    }

    #[test]
    fn equal_after_normalization() {
        assert_eq!(
            XsdDecimal::parse("1.0").unwrap(),
            XsdDecimal::parse("01").unwrap()
        );
        assert_eq!(
            XsdDecimal::parse("1.0").unwrap().cmp(&XsdDecimal::from_integer(1)),
            Ordering::Equal
        );
    }

    #[test]
    fn ordering() {
        let d = |s: &str| XsdDecimal::parse(s).unwrap();
        assert!(d("-2") < d("-1.5"));
        assert!(d("-1.5") < d("0"));
        assert!(d("0") < d("0.3"));
        assert!(d("0.3") < d("0.30000001"));
        assert!(d("2") < d("10"));
        assert!(d("9.999") < d("10"));
    }

    #[test]
    fn float_approximation() {
        assert_eq!(XsdDecimal::parse("2.5").unwrap().to_f64(), 2.5);
        assert_eq!(XsdDecimal::from_integer(-3).to_f64(), -3.0);
    }
}
