use serde::{Deserialize, Serialize};

/// Privilege tier of the caller. Determines which tool registry and
/// data visibility apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Access limited to the caller's own data.
    Standard,
    /// Cross-principal read/write access.
    Admin,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Standard => write!(f, "standard"),
            Scope::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Scope::Standard),
            "admin" => Ok(Scope::Admin),
            other => Err(format!("unknown scope '{other}'")),
        }
    }
}

/// The authenticated caller, passed explicitly into every tool
/// executor. Never resolved from ambient/global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub scope: Scope,
}

impl Principal {
    pub fn standard(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope: Scope::Standard,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope: Scope::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.scope == Scope::Admin
    }
}
