use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

/// Claims carried by tokens from the authentication service. Older tokens
/// put the subject in `id` (or `_id`) rather than `sub`.
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(alias = "id", alias = "_id")]
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    /// Numeric role codes issued by the legacy authentication service.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Role::Admin),
            2 => Some(Role::Doctor),
            3 => Some(Role::Patient),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Role::from_code(code).ok_or_else(|| format!("unknown role code {}", code));
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "patient" | "user" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role {:?}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawRole {
            Code(i64),
            Name(String),
        }

        match RawRole::deserialize(deserializer)? {
            RawRole::Code(code) => Role::from_code(code)
                .ok_or_else(|| de::Error::custom(format!("unknown role code {}", code))),
            RawRole::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

/// Verified subject attached to every authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_accepts_legacy_numeric_codes() {
        let role: Role = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(role, Role::Doctor);
        let role: Role = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(role, Role::Patient);
        assert!(serde_json::from_value::<Role>(json!(0)).is_err());
    }

    #[test]
    fn role_names_are_case_insensitive() {
        let role: Role = serde_json::from_value(json!("Admin")).unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!("DOCTOR".parse::<Role>().unwrap(), Role::Doctor);
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn claims_read_subject_from_legacy_id_field() {
        let claims: JwtClaims = serde_json::from_value(json!({
            "id": "65f1c0ffee",
            "email": "doc@example.com",
            "role": 2
        }))
        .unwrap();

        assert_eq!(claims.sub, "65f1c0ffee");
        assert_eq!(claims.role, Some(Role::Doctor));
    }
}
