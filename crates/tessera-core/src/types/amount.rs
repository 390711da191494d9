use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed-point asset quantity: `value / 10^precision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub value: u128,
    pub precision: u8,
}

impl Amount {
    pub fn new(value: u128, precision: u8) -> Self {
        Amount { value, precision }
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount '{0}'")]
pub struct ParseAmountError(pub String);

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseAmountError(s.to_string());
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty()
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }
        let precision = u8::try_from(frac_part.len()).map_err(|_| err())?;
        let value = format!("{int_part}{frac_part}")
            .parse::<u128>()
            .map_err(|_| err())?;
        Ok(Amount { value, precision })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.precision == 0 {
            return write!(f, "{}", self.value);
        }
        let digits = format!("{:0>width$}", self.value, width = self.precision as usize + 1);
        let split = digits.len() - self.precision as usize;
        write!(f, "{}.{}", &digits[..split], &digits[split..])
    }
}
