//! Name translation from the store namespace into Zenoh key expressions.

use serde::{Deserialize, Serialize};

/// Default key expression prefix for all mirrored channels.
pub const KEY_PREFIX: &str = "statemirror";

/// Hierarchy separator used inside store value names.
pub const STORE_SEPARATOR: char = '.';

/// Hierarchy separator of Zenoh key expressions.
pub const TARGET_SEPARATOR: char = '/';

/// Placeholder for characters and chunks Zenoh rejects in a key expression.
const PLACEHOLDER: char = '_';

/// A channel name derived from an entry path.
///
/// Always a valid, wildcard-free Zenoh key expression relative to the
/// channel prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SanitizedName(String);

impl SanitizedName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for SanitizedName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SanitizedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SanitizedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Translate an entry path into a channel name.
///
/// Owner and value are joined with `/`, every `.` becomes `/`, characters
/// Zenoh reserves (`*`, `$`, `?`, `#`) become `_`, empty chunks become `_`
/// and a leading `@` becomes `_`, keeping entries off the `@` admin keys.
/// Total and deterministic.
///
/// # Example
/// ```
/// use statemirror_common::keyexpr::sanitize;
///
/// assert_eq!(sanitize("b", "x.y").as_str(), "b/x/y");
/// assert_eq!(sanitize("arm", ".joint..1").as_str(), "arm/_/joint/_/1");
/// ```
pub fn sanitize(owner: &str, value: &str) -> SanitizedName {
    let joined: String = owner
        .chars()
        .chain(std::iter::once(TARGET_SEPARATOR))
        .chain(value.chars())
        .map(|c| match c {
            STORE_SEPARATOR => TARGET_SEPARATOR,
            '*' | '$' | '?' | '#' => PLACEHOLDER,
            c => c,
        })
        .collect();

    let name = joined
        .split(TARGET_SEPARATOR)
        .map(|chunk| match chunk.strip_prefix('@') {
            _ if chunk.is_empty() => "_".to_string(),
            Some(rest) => format!("{}{}", PLACEHOLDER, rest),
            None => chunk.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/");

    SanitizedName(name)
}

/// Build the full key expression of a channel.
///
/// # Example
/// ```
/// use statemirror_common::keyexpr::{build_key, sanitize};
///
/// assert_eq!(build_key("statemirror", &sanitize("b", "x.y")), "statemirror/b/x/y");
/// ```
pub fn build_key(prefix: &str, name: &SanitizedName) -> String {
    if prefix.is_empty() {
        name.as_str().to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Key expression of the bridge status message.
///
/// # Example
/// ```
/// use statemirror_common::keyexpr::status_key;
///
/// assert_eq!(status_key("statemirror"), "statemirror/@/status");
/// ```
pub fn status_key(prefix: &str) -> String {
    format!("{}/@/status", prefix)
}

/// Key expression of the bridge liveliness token.
///
/// # Example
/// ```
/// use statemirror_common::keyexpr::alive_key;
///
/// assert_eq!(alive_key("statemirror"), "statemirror/@/alive");
/// ```
pub fn alive_key(prefix: &str) -> String {
    format!("{}/@/alive", prefix)
}

/// Wildcard matching every channel under a prefix.
///
/// # Example
/// ```
/// use statemirror_common::keyexpr::mirror_wildcard;
///
/// assert_eq!(mirror_wildcard("statemirror"), "statemirror/**");
/// ```
pub fn mirror_wildcard(prefix: &str) -> String {
    format!("{}/**", prefix)
}

/// Split a key published by a remote store into `(owner, value)`.
///
/// `store_prefix/<owner>/<a>/<b>` maps to `("<owner>", "<a>.<b>")`.
/// Returns `None` for keys outside the prefix, admin keys (`@`) and keys
/// without a value part.
pub fn parse_store_key(store_prefix: &str, key: &str) -> Option<(String, String)> {
    let rest = key.strip_prefix(store_prefix)?.strip_prefix(TARGET_SEPARATOR)?;
    let mut chunks = rest.split(TARGET_SEPARATOR);

    let owner = chunks.next().filter(|c| !c.is_empty() && *c != "@")?;
    let value: Vec<&str> = chunks.collect();
    if value.is_empty() || value.iter().any(|c| c.is_empty()) {
        return None;
    }

    let mut joined = String::new();
    for (i, chunk) in value.iter().enumerate() {
        if i > 0 {
            joined.push(STORE_SEPARATOR);
        }
        joined.push_str(chunk);
    }

    Some((owner.to_string(), joined))
}
