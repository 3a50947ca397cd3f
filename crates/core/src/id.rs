// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions
//!
//! Two families of identifiers live here. Random IDs (`ses-…`, `prt-…`)
//! are a 4-char type prefix plus a 19-char nanoid. The worktree ID is
//! different: it is *derived* from `(project_id, path)` with SHA-256 and
//! formatted like a UUID, so the same worktree always maps to the same ID
//! across process restarts.

use sha2::{Digest, Sha256};

/// Maximum byte length for an inline ID.
///
/// Random IDs are exactly 23 bytes (4-char prefix + 19-char nanoid);
/// derived worktree IDs are 36 bytes (UUID shape). `from_string` accepts
/// shorter IDs but debug-asserts they fit.
pub const ID_MAX_LEN: usize = 36;

/// Fixed-size inline ID buffer. Always ≤ 36 ASCII bytes, `Copy`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IdBuf {
    len: u8,
    buf: [u8; ID_MAX_LEN],
}

impl std::hash::Hash for IdBuf {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Hash only the active bytes so it matches str::hash,
        // which is required for Borrow<str> HashMap lookups.
        self.as_str().hash(state);
    }
}

impl IdBuf {
    pub const fn empty() -> Self {
        Self { len: 0, buf: [0; ID_MAX_LEN] }
    }

    pub fn new(s: &str) -> Self {
        debug_assert!(
            s.len() <= ID_MAX_LEN,
            "ID exceeds {} bytes ({} bytes): {:?}",
            ID_MAX_LEN,
            s.len(),
            s,
        );
        let len = s.len().min(ID_MAX_LEN);
        let mut buf = [0u8; ID_MAX_LEN];
        buf[..len].copy_from_slice(&s.as_bytes()[..len]);
        Self { len: len as u8, buf }
    }

    pub fn as_str(&self) -> &str {
        // Invariant: only constructed from &str, always valid UTF-8.
        match std::str::from_utf8(&self.buf[..self.len as usize]) {
            Ok(s) => s,
            Err(_) => unreachable!("IdBuf constructed from non-UTF-8"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::borrow::Borrow<str> for IdBuf {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Debug for IdBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for IdBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl serde::Serialize for IdBuf {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for IdBuf {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.len() > ID_MAX_LEN {
            return Err(serde::de::Error::custom(format!(
                "ID exceeds {} bytes: {:?}",
                ID_MAX_LEN, s
            )));
        }
        Ok(IdBuf::new(&s))
    }
}

/// Define a newtype ID wrapper around [`IdBuf`] with a type prefix.
///
/// Generates `new()` for random ID generation, `from_string()` for parsing,
/// `as_str()`, `Display`, `From<String>`, `From<&str>`, `PartialEq<str>`,
/// `Borrow<str>`, and `Deref` implementations.
///
/// The ID format is `{prefix}{nanoid}` where:
/// - `prefix`: 4 character type indicator (e.g., "ses-", "prt-")
/// - `nanoid`: 19 character random ID
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $crate::id::IdBuf);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new random ID with the type prefix
            pub fn new() -> Self {
                Self($crate::id::IdBuf::new(&format!(
                    "{}{}",
                    Self::PREFIX,
                    nanoid::nanoid!(19)
                )))
            }

            /// Create ID from existing string (for parsing/deserialization)
            pub fn from_string(id: impl AsRef<str>) -> Self {
                Self($crate::id::IdBuf::new(id.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// Returns true if the ID is an empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0.as_str() == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                self.0.as_str()
            }
        }
    };
}

define_id! {
    /// Registered project identity.
    pub struct ProjectId("prj-");
}

define_id! {
    /// Terminal session owned by the daemon; doubles as the persisted
    /// agent-session primary key.
    pub struct SessionId("ses-");
}

define_id! {
    /// One-shot print-mode agent invocation.
    pub struct PrintSessionId("prt-");
}

define_id! {
    /// Chat message between the user and the orchestrator.
    pub struct MessageId("msg-");
}

define_id! {
    /// Detected terminal-output pattern.
    pub struct PatternId("pat-");
}

/// Deterministic worktree identity.
///
/// `hex(sha256(project_id ":" path))` truncated to 32 hex chars and
/// formatted `8-4-4-4-12`. The same `(project_id, path)` pair always
/// produces the same ID, which is what lets persisted references survive
/// process restarts without re-wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct WorktreeId(pub IdBuf);

impl WorktreeId {
    /// Derive the worktree ID from its project and path.
    pub fn derive(project_id: &ProjectId, path: &std::path::Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(project_id.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(path.display().to_string().as_bytes());
        let digest = hasher.finalize();

        let mut hex = String::with_capacity(32);
        for byte in digest.iter().take(16) {
            use std::fmt::Write;
            let _ = write!(hex, "{:02x}", byte);
        }
        Self(IdBuf::new(&format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32],
        )))
    }

    pub fn from_string(id: impl AsRef<str>) -> Self {
        Self(IdBuf::new(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for WorktreeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

impl From<&str> for WorktreeId {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for WorktreeId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl AsRef<str> for WorktreeId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq<str> for WorktreeId {
    fn eq(&self, other: &str) -> bool {
        self.0.as_str() == other
    }
}

impl PartialEq<&str> for WorktreeId {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_str() == *other
    }
}

impl std::borrow::Borrow<str> for WorktreeId {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
