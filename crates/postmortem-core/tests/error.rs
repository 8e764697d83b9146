//! Tests for error handling

use std::io;
use std::path::PathBuf;

use postmortem_core::error::{PostmortemError, Result};

#[test]
fn test_attribute_not_found_display()
{
    let error = PostmortemError::AttributeNotFound {
        type_name: "User".to_string(),
        attr: "email".to_string(),
    };
    assert_eq!(error.to_string(), "'User' object has no attribute 'email'");
}

#[test]
fn test_graph_not_linked_display()
{
    let error = PostmortemError::GraphNotLinked("User".to_string());
    assert!(error.to_string().contains("User"));
    assert!(error.to_string().contains("not linked"));
}

#[test]
fn test_json_error_becomes_malformed_snapshot()
{
    let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let error: PostmortemError = source.into();
    match error {
        PostmortemError::MalformedSnapshot { path, .. } => assert_eq!(path, None::<PathBuf>),
        other => panic!("Expected MalformedSnapshot, got {other:?}"),
    }
}

#[test]
fn test_io_error_conversion()
{
    let io_err = io::Error::new(io::ErrorKind::NotFound, "snapshot.dump");
    let error: PostmortemError = io_err.into();
    assert!(matches!(error, PostmortemError::Io(_)));
    assert!(error.to_string().contains("snapshot.dump"));
}

#[test]
fn test_result_type_alias()
{
    fn load() -> Result<u32>
    {
        Ok(42)
    }

    fn fail() -> Result<u32>
    {
        Err(PostmortemError::InvalidArgument("depth".to_string()))
    }

    assert_eq!(load().unwrap(), 42);
    assert!(fail().is_err());
}
