use std::sync::atomic::{AtomicU64, Ordering};

use compact_str::{CompactString, ToCompactString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Continuation token handed out by the server in `x-polling-index`
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash)]
pub struct PollIndex {
    value: CompactString,
}

/// Identifies one poller instance in logs
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct PollerId {
    value: u64,
}

impl PollIndex {
    pub fn new<S: Into<CompactString>>(index: S) -> Self {
        Self { value: index.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl PollerId {
    /// Allocate the next process-unique poller id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self { value: NEXT.fetch_add(1, Ordering::Relaxed) }
    }
}

impl<'de> Deserialize<'de> for PollIndex {
    fn deserialize<D>(deserializer: D) -> Result<PollIndex, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        use std::fmt;

        struct PollIndexVisitor;

        impl<'de> Visitor<'de> for PollIndexVisitor {
            type Value = PollIndex;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer representing a polling index")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(PollIndex::new(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(PollIndex::new(value.to_compact_string()))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(PollIndex::new(value.to_compact_string()))
            }
        }

        deserializer.deserialize_any(PollIndexVisitor)
    }
}

impl Serialize for PollIndex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.value)
    }
}

impl From<&str> for PollIndex {
    fn from(value: &str) -> Self {
        PollIndex::new(value)
    }
}

impl std::fmt::Display for PollIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl std::fmt::Display for PollerId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}
