// Weight text formatting options.
// Origin: lib/weight.cc:1-31
//
// These knobs are passed explicitly into text I/O routines; nothing in the
// workspace reads them from process-global state.

use crate::FstError;

/// Options controlling how weights are printed and parsed as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightConfig {
    /// Separator between the components of a composite weight.
    pub separator: char,
    /// Optional open/close characters enclosing a composite weight, so that
    /// nested composites can be read back unambiguously.
    pub parentheses: Option<(char, char)>,
    /// Digits after the decimal point for floating-point weights.
    pub precision: usize,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            separator: ',',
            parentheses: None,
            precision: 6,
        }
    }
}

impl WeightConfig {
    /// Checks that the knobs describe an unambiguous text format.
    pub fn validate(&self) -> Result<(), FstError> {
        if self.separator.is_whitespace() {
            return Err(FstError::InvalidWeight(
                "weight separator must not be whitespace".to_string(),
            ));
        }
        if let Some((open, close)) = self.parentheses {
            if open == close {
                return Err(FstError::InvalidWeight(
                    "weight parentheses must be two distinct characters".to_string(),
                ));
            }
            if open == self.separator || close == self.separator {
                return Err(FstError::InvalidWeight(
                    "weight parentheses must differ from the separator".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Joins already-formatted component weights into one composite string.
    pub fn join_composite<S: AsRef<str>>(&self, parts: &[S]) -> String {
        let mut out = String::new();
        if let Some((open, _)) = self.parentheses {
            out.push(open);
        }
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                out.push(self.separator);
            }
            out.push_str(part.as_ref());
        }
        if let Some((_, close)) = self.parentheses {
            out.push(close);
        }
        out
    }

    /// Splits a composite weight string into its top-level components.
    ///
    /// Separators nested inside parentheses are not split on.
    pub fn split_composite<'a>(&self, text: &'a str) -> Result<Vec<&'a str>, FstError> {
        let mut body = text.trim();
        if let Some((open, close)) = self.parentheses {
            body = body
                .strip_prefix(open)
                .and_then(|b| b.strip_suffix(close))
                .ok_or_else(|| {
                    FstError::InvalidWeight(format!("missing parentheses in {text:?}"))
                })?;
        }

        let mut parts = Vec::new();
        let mut depth: usize = 0;
        let mut start = 0;
        for (i, ch) in body.char_indices() {
            match self.parentheses {
                Some((open, _)) if ch == open => depth += 1,
                Some((_, close)) if ch == close => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        FstError::InvalidWeight(format!("unbalanced parentheses in {text:?}"))
                    })?;
                }
                _ if ch == self.separator && depth == 0 => {
                    parts.push(&body[start..i]);
                    start = i + ch.len_utf8();
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(FstError::InvalidWeight(format!(
                "unbalanced parentheses in {text:?}"
            )));
        }
        parts.push(&body[start..]);
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(WeightConfig::default().validate().is_ok());
    }

    #[test]
    fn reject_whitespace_separator() {
        let config = WeightConfig {
            separator: ' ',
            ..WeightConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_same_parentheses() {
        let config = WeightConfig {
            parentheses: Some(('|', '|')),
            ..WeightConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn join_and_split_flat() {
        let config = WeightConfig::default();
        let text = config.join_composite(&["1.5", "2"]);
        assert_eq!(text, "1.5,2");
        assert_eq!(config.split_composite(&text).unwrap(), vec!["1.5", "2"]);
    }

    #[test]
    fn split_respects_nesting() {
        let config = WeightConfig {
            parentheses: Some(('(', ')')),
            ..WeightConfig::default()
        };
        let inner = config.join_composite(&["1", "2"]);
        let outer = config.join_composite(&[inner.as_str(), "3"]);
        assert_eq!(outer, "((1,2),3)");
        assert_eq!(config.split_composite(&outer).unwrap(), vec!["(1,2)", "3"]);
    }

    #[test]
    fn split_rejects_unbalanced() {
        let config = WeightConfig {
            parentheses: Some(('(', ')')),
            ..WeightConfig::default()
        };
        assert!(config.split_composite("((1,2,3)").is_err());
        assert!(config.split_composite("1,2").is_err());
    }
}
