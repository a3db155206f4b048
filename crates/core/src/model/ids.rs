use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Sentinel used by the catalog for material that does not belong to a numbered week.
pub const MISC_WEEK: &str = "misc";

/// Identifier of an authenticated user (opaque, issued by the auth provider).
///
/// It names a single document in the user's progress collection, so it may not
/// contain `/` or be a `.`/`..` path segment.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Creates a new `UserId`.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the identifier is blank, contains `/`, or is
    /// `.` or `..`.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
        let id = id.into();
        if id.trim().is_empty() || id.contains('/') || id == "." || id == ".." {
            return Err(ParseIdError::new("UserId"));
        }
        Ok(Self(id))
    }

    /// Returns the underlying string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// Identifier of a material within its week.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(u64);

impl MaterialId {
    /// Creates a new `MaterialId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Identifier of a course week: a week number or the `"misc"` sentinel.
///
/// Serialized as a bare integer or the string `"misc"`, matching the catalog format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WeekId {
    Number(u32),
    Misc,
}

impl WeekId {
    #[must_use]
    pub fn number(n: u32) -> Self {
        Self::Number(n)
    }

    #[must_use]
    pub fn is_misc(&self) -> bool {
        matches!(self, Self::Misc)
    }
}

/// Composite progress key, rendered as `"{week}-{material}"`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgressKey {
    week: WeekId,
    material: MaterialId,
}

impl ProgressKey {
    #[must_use]
    pub fn new(week: WeekId, material: MaterialId) -> Self {
        Self { week, material }
    }

    #[must_use]
    pub fn week(&self) -> WeekId {
        self.week
    }

    #[must_use]
    pub fn material(&self) -> MaterialId {
        self.material
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Debug for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaterialId({})", self.0)
    }
}

impl fmt::Debug for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeekId({self})")
    }
}

impl fmt::Debug for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgressKey({self})")
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekId::Number(n) => write!(f, "{n}"),
            WeekId::Misc => f.write_str(MISC_WEEK),
        }
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.week, self.material)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl ParseIdError {
    fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
        }
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for MaterialId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(MaterialId::new)
            .map_err(|_| ParseIdError::new("MaterialId"))
    }
}

impl FromStr for WeekId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == MISC_WEEK {
            return Ok(WeekId::Misc);
        }
        s.parse::<u32>()
            .map(WeekId::Number)
            .map_err(|_| ParseIdError::new("WeekId"))
    }
}

impl FromStr for ProgressKey {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Week ids never contain '-', material ids are numeric: split on the last one.
        let (week, material) = s
            .rsplit_once('-')
            .ok_or_else(|| ParseIdError::new("ProgressKey"))?;
        Ok(Self::new(week.parse()?, material.parse()?))
    }
}

// ─── Serde ─────────────────────────────────────────────────────────────────────

impl Serialize for WeekId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WeekId::Number(n) => serializer.serialize_u32(*n),
            WeekId::Misc => serializer.serialize_str(MISC_WEEK),
        }
    }
}

impl<'de> Deserialize<'de> for WeekId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WeekIdVisitor;

        impl Visitor<'_> for WeekIdVisitor {
            type Value = WeekId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a week number or \"misc\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<WeekId, E> {
                u32::try_from(v)
                    .map(WeekId::Number)
                    .map_err(|_| E::custom(format!("week number out of range: {v}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<WeekId, E> {
                u32::try_from(v)
                    .map(WeekId::Number)
                    .map_err(|_| E::custom(format!("week number out of range: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<WeekId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(WeekIdVisitor)
    }
}

impl Serialize for ProgressKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProgressKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
