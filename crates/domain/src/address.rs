//! Three-level KNX group addresses (`main/middle/sub`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MAX_MAIN: u32 = 31;
const MAX_MIDDLE: u32 = 7;
const MAX_SUB: u32 = 255;

/// A group address in three-level notation.
///
/// Ordering is numeric on `(main, middle, sub)`, so `1/0/10` sorts after
/// `1/0/9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupAddress {
    main: u8,
    middle: u8,
    sub: u8,
}

impl GroupAddress {
    /// Build an address from its components.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AddressOutOfRange`] when a component exceeds
    /// its bound (main 31, middle 7, sub 255).
    pub fn new(main: u32, middle: u32, sub: u32) -> Result<Self, ValidationError> {
        check("main", main, MAX_MAIN)?;
        check("middle", middle, MAX_MIDDLE)?;
        check("sub", sub, MAX_SUB)?;
        Ok(Self {
            main: narrow(main),
            middle: narrow(middle),
            sub: narrow(sub),
        })
    }

    /// Decode the packed 16-bit wire form (`main:5 | middle:3 | sub:8`).
    #[must_use]
    pub fn from_packed(raw: u16) -> Self {
        Self {
            main: ((raw >> 11) & 0x1F) as u8,
            middle: ((raw >> 8) & 0x07) as u8,
            sub: (raw & 0xFF) as u8,
        }
    }

    /// Encode into the packed 16-bit wire form.
    #[must_use]
    pub fn to_packed(self) -> u16 {
        (u16::from(self.main) << 11) | (u16::from(self.middle) << 8) | u16::from(self.sub)
    }

    #[must_use]
    pub fn main(self) -> u8 {
        self.main
    }

    #[must_use]
    pub fn middle(self) -> u8 {
        self.middle
    }

    #[must_use]
    pub fn sub(self) -> u8 {
        self.sub
    }
}

// Callers check bounds first.
fn narrow(value: u32) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

fn check(component: &'static str, value: u32, max: u32) -> Result<(), ValidationError> {
    if value > max {
        return Err(ValidationError::AddressOutOfRange {
            component,
            value,
            max,
        });
    }
    Ok(())
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.main, self.middle, self.sub)
    }
}

impl FromStr for GroupAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::MalformedAddress(s.to_string());
        let mut parts = s.trim().split('/');
        let mut next = || -> Result<u32, ValidationError> {
            parts
                .next()
                .and_then(|part| part.trim().parse::<u32>().ok())
                .ok_or_else(malformed)
        };
        let (main, middle, sub) = (next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(malformed());
        }
        Self::new(main, middle, sub)
    }
}

impl TryFrom<String> for GroupAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupAddress> for String {
    fn from(value: GroupAddress) -> Self {
        value.to_string()
    }
}
