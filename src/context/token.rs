//! Correlation id generation.

use std::fmt;
use uuid::Uuid;

/// Source of globally unique opaque tokens.
pub trait TokenGenerator: Send + Sync + fmt::Debug {
    fn generate(&self) -> String;
}

/// Default generator: hyphenated UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidTokens;

impl TokenGenerator for UuidTokens {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Build a correlation id, formatted `<prefix>-<token>` when a non-empty
/// prefix is given.
pub fn correlation_id(tokens: &dyn TokenGenerator, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}-{}", prefix, tokens.generate()),
        _ => tokens.generate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed;

    impl TokenGenerator for Fixed {
        fn generate(&self) -> String {
            "tok".to_string()
        }
    }

    #[test]
    fn test_prefix_formatting() {
        assert_eq!(correlation_id(&Fixed, Some("svc")), "svc-tok");
        assert_eq!(correlation_id(&Fixed, Some("")), "tok");
        assert_eq!(correlation_id(&Fixed, None), "tok");
    }

    #[test]
    fn test_uuid_tokens_are_distinct() {
        let a = UuidTokens.generate();
        let b = UuidTokens.generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
