use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// LicenseClass
// ---------------------------------------------------------------------------

/// Certification tier shared by drones (`class_type`) and operators
/// (`drone_license`).
///
/// Ordered `One < Two`: a class-two license covers both drone classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseClass {
    One,
    Two,
}

impl LicenseClass {
    pub fn all() -> &'static [LicenseClass] {
        &[LicenseClass::One, LicenseClass::Two]
    }

    /// Integer stored in the `class_type` / `drone_license` columns.
    pub fn code(self) -> i64 {
        match self {
            LicenseClass::One => 1,
            LicenseClass::Two => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<LicenseClass> {
        match code {
            1 => Some(LicenseClass::One),
            2 => Some(LicenseClass::Two),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LicenseClass::One => "one",
            LicenseClass::Two => "two",
        }
    }

    /// True if a holder of `self` may operate a drone of class `drone`.
    pub fn permits(self, drone: LicenseClass) -> bool {
        self >= drone
    }
}

impl fmt::Display for LicenseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LicenseClass {
    type Err = crate::error::DalsysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "one" => Ok(LicenseClass::One),
            "2" | "two" => Ok(LicenseClass::Two),
            _ => Err(crate::error::DalsysError::InvalidClass(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Mission
// ---------------------------------------------------------------------------

/// The kind of operation an allocation is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mission {
    #[default]
    Standard,
    Rescue,
}

impl Mission {
    pub fn is_rescue(self) -> bool {
        matches!(self, Mission::Rescue)
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mission::Standard => "standard",
            Mission::Rescue => "rescue",
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
