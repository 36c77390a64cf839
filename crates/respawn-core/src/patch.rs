//! Idempotent startup-hook patching for devcontainer documents.
//!
//! The startup-hook field may be absent, a single command string, or an
//! ordered list of commands. `apply_startup_hook` merges a hook command in
//! without disturbing existing entries, and applying it twice yields the
//! same document as applying it once.

use serde_json::{Map, Value};

/// Field in the configuration document holding the startup hook.
pub const STARTUP_HOOK_FIELD: &str = "postStartCommand";

/// Chaining convention used when appending to an existing command string.
const CHAIN_SEPARATOR: &str = " && ";

/// Merge `hook` into the startup-hook field of `doc`.
///
/// - absent field: set to `hook`
/// - string field: append with ` && ` unless `hook` is already one of the
///   chained commands
/// - list field: append `hook` unless already an element; order preserved
/// - a non-object document (unparseable remote content degraded upstream):
///   replaced by a fresh document holding only the hook
///
/// A field of any other shape is left untouched — the document is outside
/// the contract and rewriting it risks destroying user configuration.
pub fn apply_startup_hook(doc: &Value, hook: &str) -> Value {
    let mut root = match doc.as_object() {
        Some(map) => map.clone(),
        None => Map::new(),
    };

    let updated = match root.get(STARTUP_HOOK_FIELD) {
        None | Some(Value::Null) => Some(Value::String(hook.to_string())),
        Some(Value::String(existing)) => {
            if contains_command(existing, hook) {
                None
            } else {
                Some(Value::String(format!("{existing}{CHAIN_SEPARATOR}{hook}")))
            }
        }
        Some(Value::Array(items)) => {
            if items.iter().any(|item| item.as_str() == Some(hook)) {
                None
            } else {
                let mut items = items.clone();
                items.push(Value::String(hook.to_string()));
                Some(Value::Array(items))
            }
        }
        Some(_) => None,
    };
    if let Some(value) = updated {
        root.insert(STARTUP_HOOK_FIELD.to_string(), value);
    }

    Value::Object(root)
}

/// Whether `hook` already appears in `chain` as a complete chained command.
///
/// Commands are split on `&&` and `;` and compared trimmed, so a hook of
/// `bash up.sh` does not falsely match a chain containing `bash startup.sh`.
fn contains_command(chain: &str, hook: &str) -> bool {
    chain
        .split("&&")
        .flat_map(|segment| segment.split(';'))
        .any(|segment| segment.trim() == hook.trim())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
