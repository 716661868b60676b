//! Request template parsing

use std::collections::BTreeSet;

/// One piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Text copied verbatim
    Literal(String),
    /// Replaced by the named parameter's rendered value
    Placeholder(String),
}

/// A template parsed into literal segments and named placeholders
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestTemplate {
    source: String,
    segments: Vec<Segment>,
}

/// Why a template failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    /// Byte offset of the problem
    pub position: usize,
    /// What is wrong
    pub reason: String,
}

impl RequestTemplate {
    /// Parse a template
    ///
    /// `{name}` marks a placeholder; whitespace inside the braces is ignored
    /// and names are made of letters, digits and underscores. `{{` and `}}`
    /// produce literal braces.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(TemplateError {
                            position: pos,
                            reason: "unclosed placeholder".to_string(),
                        });
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(TemplateError {
                            position: pos,
                            reason: "empty placeholder".to_string(),
                        });
                    }
                    if !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
                        return Err(TemplateError {
                            position: pos,
                            reason: format!("invalid placeholder name {:?}", name),
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.to_string()));
                }
                '}' => {
                    return Err(TemplateError {
                        position: pos,
                        reason: "unmatched '}'".to_string(),
                    });
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The template as declared
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Segments in template order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in order of occurrence, duplicates included
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Distinct placeholder names
    pub fn placeholder_names(&self) -> BTreeSet<&str> {
        self.placeholders().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_placeholders() {
        let template = RequestTemplate::parse("Hello, {name}! You are {age} years old.").unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("Hello, ".to_string()),
                Segment::Placeholder("name".to_string()),
                Segment::Literal("! You are ".to_string()),
                Segment::Placeholder("age".to_string()),
                Segment::Literal(" years old.".to_string()),
            ]
        );
        assert_eq!(template.source(), "Hello, {name}! You are {age} years old.");
    }

    #[test]
    fn test_duplicates_and_order() {
        let template = RequestTemplate::parse("{b} and {a} and {b}").unwrap();
        let order: Vec<&str> = template.placeholders().collect();
        assert_eq!(order, vec!["b", "a", "b"]);
        assert_eq!(template.placeholder_names().len(), 2);
    }

    #[test]
    fn test_whitespace_inside_braces() {
        let template = RequestTemplate::parse("{ text }").unwrap();
        assert_eq!(template.placeholders().collect::<Vec<_>>(), vec!["text"]);
    }

    #[test]
    fn test_escaped_braces() {
        let template = RequestTemplate::parse("Reply as {{\"tag\": {tag}}}").unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("Reply as {\"tag\": ".to_string()),
                Segment::Placeholder("tag".to_string()),
                Segment::Literal("}".to_string()),
            ]
        );
    }

    #[test]
    fn test_no_placeholders() {
        let template = RequestTemplate::parse("Tell me a joke.").unwrap();
        assert_eq!(template.placeholders().count(), 0);
        let empty = RequestTemplate::parse("").unwrap();
        assert!(empty.segments().is_empty());
    }

    #[test]
    fn test_malformed_templates() {
        let err = RequestTemplate::parse("Hello {name").unwrap_err();
        assert_eq!(err.position, 6);
        assert_eq!(err.reason, "unclosed placeholder");

        let err = RequestTemplate::parse("Hello {}").unwrap_err();
        assert_eq!(err.reason, "empty placeholder");

        let err = RequestTemplate::parse("Hello {first name}").unwrap_err();
        assert!(err.reason.contains("invalid placeholder name"));

        let err = RequestTemplate::parse("oops }").unwrap_err();
        assert_eq!(err.position, 5);
    }
}
