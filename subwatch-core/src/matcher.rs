use crate::error::ConfigError;

/// Case-insensitive substring matcher over a fixed keyword set.
///
/// Keywords are lowercased once at construction; titles are lowercased
/// per call. An empty keyword list is a configuration error, rejected
/// here rather than silently matching nothing at runtime.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
    pub fn new(keywords: &[String]) -> Result<Self, ConfigError> {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return Err(ConfigError::EmptyKeywordList);
        }

        Ok(Self { keywords })
    }

    pub fn matches(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(keywords: &[&str]) -> KeywordMatcher {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
        KeywordMatcher::new(&keywords).unwrap()
    }

    #[test]
    fn test_empty_keyword_list_rejected() {
        let result = KeywordMatcher::new(&[]);
        assert!(matches!(result, Err(ConfigError::EmptyKeywordList)));

        // Whitespace-only keywords count as empty too
        let result = KeywordMatcher::new(&["   ".to_string()]);
        assert!(matches!(result, Err(ConfigError::EmptyKeywordList)));
    }

    #[test]
    fn test_case_insensitive_match() {
        let m = matcher(&["[H]"]);
        assert!(m.matches("[H] Selling widget"));
        assert!(m.matches("[h] selling widget"));
        assert!(m.matches("selling [H] widget"));
        assert!(!m.matches("Selling widget"));
    }

    #[test]
    fn test_any_keyword_matches() {
        let m = matcher(&["gpu", "CPU"]);
        assert!(m.matches("Used GPU for sale"));
        assert!(m.matches("old cpu, cheap"));
        assert!(!m.matches("motherboard only"));
    }

    #[test]
    fn test_keywords_normalized_at_construction() {
        let m = matcher(&["  WTB  "]);
        assert_eq!(m.keywords(), &["wtb".to_string()]);
        assert!(m.matches("wtb ram"));
    }
}
