//! Redaction of secrets and environment values during capture

mod common;

use std::sync::Arc;

use postmortem_core::object::{self, ObjRef};
use postmortem_core::prelude::*;
use postmortem_core::redaction::REDACTED;

fn captured_str(registry: &Arc<TypeRegistry>, value: &str) -> String
{
    let root: ObjRef = object::string(value);
    let restored = common::round_trip(registry, &[root.clone()], None);
    restored
        .get_object(&ObjectId::of(&root))
        .as_str()
        .map(str::to_string)
        .unwrap_or_default()
}

#[test]
fn test_secret_pattern_redacts_tokens()
{
    let registry = common::registry();
    let token = "sk0123456789abcdefABCDEF0123456789";
    assert_eq!(captured_str(&registry, token), REDACTED);
    assert_eq!(captured_str(&registry, "short-and-harmless"), "short-and-harmless");
    // the match must start at the beginning of the string
    let sentence = format!("token: {token}");
    assert_eq!(captured_str(&registry, &sentence), sentence);
}

#[test]
fn test_secret_toggle_is_read_per_capture()
{
    let policy = common::policy();
    let registry = Arc::new(TypeRegistry::with_builtins(Arc::clone(&policy)));
    let token = "A".repeat(48);

    policy.set_hide_secret(false);
    assert_eq!(captured_str(&registry, &token), token);
    policy.set_hide_secret(true);
    assert_eq!(captured_str(&registry, &token), REDACTED);
}

#[test]
fn test_custom_patterns_replace_defaults()
{
    let policy = common::policy();
    policy.set_patterns(["^password="]).unwrap();
    let registry = Arc::new(TypeRegistry::with_builtins(Arc::clone(&policy)));

    assert_eq!(captured_str(&registry, "password=hunter2"), REDACTED);
    assert_eq!(captured_str(&registry, &"A".repeat(48)), "A".repeat(48));
}

#[test]
fn test_invalid_pattern_keeps_previous_patterns()
{
    let policy = common::policy();
    let before = policy.patterns();
    assert!(matches!(policy.set_patterns(["(unclosed"]), Err(PostmortemError::InvalidPattern(_))));
    assert_eq!(policy.patterns(), before);
}

#[test]
fn test_environment_values_are_redacted()
{
    let policy = common::policy();
    policy.set_environ_source(|| vec!["db-password-1".to_string(), "short".to_string()]);
    let registry = Arc::new(TypeRegistry::with_builtins(Arc::clone(&policy)));

    assert_eq!(captured_str(&registry, "db-password-1"), REDACTED);
    assert_eq!(captured_str(&registry, "short"), "short");
    // the snapshot only lives for the capture
    assert_eq!(policy.environ_len(), 0);

    policy.set_hide_environ(false);
    assert_eq!(captured_str(&registry, "db-password-1"), "db-password-1");
}

#[test]
fn test_disabled_policy_keeps_everything()
{
    let registry = Arc::new(TypeRegistry::with_builtins(Arc::new(RedactionPolicy::disabled())));
    let token = "z".repeat(64);
    assert_eq!(captured_str(&registry, &token), token);
}
