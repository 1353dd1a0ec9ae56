//! Token registry for the Sceneforge target schema
//!
//! Every record the converter emits is referenced by an opaque token. The
//! registry owns the `name → token` namespace:
//! - `get` is idempotent: the first call for a name allocates a fresh token,
//!   every later call returns the same one.
//! - Candidate tokens are checked against the reverse map before acceptance,
//!   so two distinct names can never share a token, however unlikely a
//!   128-bit collision is.
//! - The full map can be persisted to JSON and reloaded, so a second pass
//!   over the same source reproduces identical tokens.
//!
//! Names are never ad hoc strings. Callers build a [`TokenKey`] (entity kind
//! + scene number + frame/track index) and the registry renders the one
//! canonical string form. Scene-qualified keys are what let independently
//! processed scenes merge into one namespace without a remap step.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// An opaque 32-char lowercase-hex identifier.
pub type Token = String;

/// The empty link value used by `prev`/`next` fields at chain ends.
pub const NO_TOKEN: &str = "";

// ============================================================================
// Composite keys
// ============================================================================

/// Typed composite name for a token.
///
/// Per-scene entities embed the scene number in the key; that is the whole
/// collision-avoidance story for the merge step. Global lookup tables
/// (sensors, categories, attributes, visibility, maps) are keyed without a
/// scene so all scenes share one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKey {
    Sensor { channel: String },
    CalibratedSensor { scene: u32, channel: String },
    Log { scene: u32 },
    Scene { scene: u32 },
    Sample { scene: u32, frame: u32 },
    SampleData { scene: u32, channel: String, frame: u32 },
    EgoPose { scene: u32, frame: u32 },
    Category { name: String },
    Attribute { name: String },
    Visibility { level: u8 },
    Instance { scene: u32, track: String },
    Annotation { scene: u32, index: u32 },
    Map { name: String },
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKey::Sensor { channel } => write!(f, "sensor_{channel}"),
            TokenKey::CalibratedSensor { scene, channel } => {
                write!(f, "calib_{channel}_scene_{scene}")
            }
            TokenKey::Log { scene } => write!(f, "log_{scene}"),
            TokenKey::Scene { scene } => write!(f, "scene_{scene}"),
            TokenKey::Sample { scene, frame } => write!(f, "sample_{frame}_scene_{scene}"),
            TokenKey::SampleData {
                scene,
                channel,
                frame,
            } => write!(f, "sd_{channel}_{frame}_scene_{scene}"),
            TokenKey::EgoPose { scene, frame } => write!(f, "ego_pose_{frame}_scene_{scene}"),
            TokenKey::Category { name } => write!(f, "category_{name}"),
            TokenKey::Attribute { name } => write!(f, "attribute_{name}"),
            TokenKey::Visibility { level } => write!(f, "visibility_{level}"),
            TokenKey::Instance { scene, track } => write!(f, "instance_{track}_scene_{scene}"),
            TokenKey::Annotation { scene, index } => {
                write!(f, "annotation_{index}_scene_{scene}")
            }
            TokenKey::Map { name } => write!(f, "map_{name}"),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed token map: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token {token} is claimed by both {first:?} and {second:?}")]
    DuplicateToken {
        token: Token,
        first: String,
        second: String,
    },
}

// ============================================================================
// Registry
// ============================================================================

/// Idempotent name→token allocator with a reverse map for uniqueness.
///
/// The registry is an explicit value passed by reference to every generator;
/// there is deliberately no global instance, so parallel per-scene workers
/// can each own a private registry and still merge cleanly (scene-qualified
/// keys keep the namespaces disjoint).
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    /// BTreeMap so persisted output is deterministically ordered.
    tokens: BTreeMap<String, Token>,
    reverse: HashMap<Token, String>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a key to its token, allocating on first use.
    pub fn get(&mut self, key: &TokenKey) -> Token {
        self.get_named(&key.to_string())
    }

    /// Resolve a key only if it was already allocated.
    pub fn lookup(&self, key: &TokenKey) -> Option<&str> {
        self.tokens.get(&key.to_string()).map(String::as_str)
    }

    /// Reverse lookup: which name owns this token?
    pub fn name_of(&self, token: &str) -> Option<&str> {
        self.reverse.get(token).map(String::as_str)
    }

    /// Register a fixed, externally dictated token for a key.
    ///
    /// If the key already resolved to something else, the existing token
    /// wins. If another key owns the requested token, a fresh one is
    /// allocated instead. Either way the uniqueness invariant holds.
    pub fn ensure_consistent(&mut self, key: &TokenKey, token: &str) -> Token {
        let name = key.to_string();
        if let Some(existing) = self.tokens.get(&name) {
            return existing.clone();
        }
        let token = match self.reverse.get(token) {
            Some(owner) if owner != &name => self.fresh_token(),
            _ => token.to_string(),
        };
        self.insert(name, token.clone());
        token
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The full name→token map, for auditing and `tokens_map.json`.
    pub fn as_map(&self) -> &BTreeMap<String, Token> {
        &self.tokens
    }

    fn get_named(&mut self, name: &str) -> Token {
        if let Some(token) = self.tokens.get(name) {
            return token.clone();
        }
        let token = self.fresh_token();
        self.insert(name.to_string(), token.clone());
        token
    }

    /// Generate a candidate and retry until it is unused. One iteration in
    /// practice; the loop is the contract, not an expectation.
    fn fresh_token(&self) -> Token {
        loop {
            let candidate = Uuid::new_v4().simple().to_string();
            if !self.reverse.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn insert(&mut self, name: String, token: Token) {
        self.reverse.insert(token.clone(), name.clone());
        self.tokens.insert(name, token);
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serialize the full name→token map as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let json = serde_json::to_string_pretty(&self.tokens)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reload a persisted map, reconstructing the reverse index.
    ///
    /// A map claiming the same token for two names is corrupt and refused;
    /// it could only come from hand editing.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path)?;
        let tokens: BTreeMap<String, Token> = serde_json::from_str(&text)?;
        let mut reverse = HashMap::with_capacity(tokens.len());
        for (name, token) in &tokens {
            if let Some(first) = reverse.insert(token.clone(), name.clone()) {
                return Err(RegistryError::DuplicateToken {
                    token: token.clone(),
                    first,
                    second: name.clone(),
                });
            }
        }
        Ok(Self { tokens, reverse })
    }
}
