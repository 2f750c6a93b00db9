use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Canonical public identity of a sender, as forwarded to staff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Identity {
    /// Normalizes raw display fields from the platform: whitespace is
    /// trimmed, a single leading `@` is stripped from the username, and
    /// blank strings collapse to `None`.
    pub fn normalized(
        user_id: UserId,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Self {
        Self {
            user_id,
            username: clean(username).and_then(|name| {
                let stripped = name.strip_prefix('@').unwrap_or(&name);
                clean(Some(stripped))
            }),
            first_name: clean(first_name),
            last_name: clean(last_name),
        }
    }
}

fn clean(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
}
