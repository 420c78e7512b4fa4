use crate::error::ExtractError;

/// Whether an extractor failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Permanent,
    Transient,
}

/// Classifies extractor failures against a list of known-permanent signatures.
///
/// Matching is a case-insensitive substring test on the error text. Filter
/// rejections are always permanent.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    patterns: Vec<String>,
}

impl ErrorClassifier {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, err: &ExtractError) -> ErrorClass {
        if matches!(err, ExtractError::Rejected(_)) {
            return ErrorClass::Permanent;
        }
        let text = err.to_string().to_lowercase();
        if self.patterns.iter().any(|p| text.contains(p.as_str())) {
            ErrorClass::Permanent
        } else {
            ErrorClass::Transient
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidrelay_core::config::PERMANENT_ERROR_SIGNATURES;

    fn classifier() -> ErrorClassifier {
        ErrorClassifier::new(PERMANENT_ERROR_SIGNATURES)
    }

    #[test]
    fn known_signatures_are_permanent() {
        let c = classifier();
        for msg in [
            "ERROR: [youtube] abc: Private video. Sign in if you've been granted access",
            "ERROR: [youtube] abc: Sign in to confirm your age. This video may be inappropriate",
            "ERROR: [youtube] abc: Video unavailable",
            "This video has been removed for violating YouTube's Terms of Service",
        ] {
            assert_eq!(c.classify(&ExtractError::Failed(msg.to_string())), ErrorClass::Permanent, "{msg}");
        }
    }

    #[test]
    fn matching_ignores_case() {
        let c = classifier();
        let err = ExtractError::Failed("video UNAVAILABLE in your country".to_string());
        assert_eq!(c.classify(&err), ErrorClass::Permanent);
    }

    #[test]
    fn unknown_errors_are_transient() {
        let c = classifier();
        let err = ExtractError::Failed("HTTP Error 503: Service Unavailable".to_string());
        assert_eq!(c.classify(&err), ErrorClass::Transient);
        let io = ExtractError::Io(std::io::Error::other("connection reset"));
        assert_eq!(c.classify(&io), ErrorClass::Transient);
    }

    #[test]
    fn filter_rejection_is_permanent_without_patterns() {
        let c = ErrorClassifier::new(Vec::<String>::new());
        let err = ExtractError::Rejected("live stream".to_string());
        assert_eq!(c.classify(&err), ErrorClass::Permanent);
    }
}
