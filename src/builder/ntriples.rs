//! Minimal N-Triples reader.
//!
//! RDF parsing proper is a collaborator concern; this reader covers the
//! line-based N-Triples syntax so the build CLI is self-contained. One
//! triple per line, `#` comments, `\uXXXX`/`\UXXXXXXXX` and the usual
//! single-character escapes in literals.

use std::io::BufRead;

use crate::error::{Error, Result};
use crate::model::Value;

/// Parse an N-Triples document, invoking `sink` for every triple.
pub fn parse<R: BufRead>(reader: R, mut sink: impl FnMut(Value, Value, Value) -> Result<()>) -> Result<()> {
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (s, p, o) = parse_line(trimmed)
            .map_err(|e| Error::parse(format!("line {}: {}", lineno + 1, e)))?;
        sink(s, p, o)?;
    }
    Ok(())
}

fn parse_line(line: &str) -> std::result::Result<(Value, Value, Value), String> {
    let mut rest = line;
    let s = parse_term(&mut rest)?;
    let p = parse_term(&mut rest)?;
    let o = parse_term(&mut rest)?;
    let rest = rest.trim_start();
    if rest != "." {
        return Err("expected '.' after object".into());
    }
    Ok((s, p, o))
}

/// Parse a single term at the head of `rest`, advancing it. Shared with the
/// query CLI, whose pattern syntax uses the same term grammar.
pub fn parse_term(rest: &mut &str) -> std::result::Result<Value, String> {
    *rest = rest.trim_start();
    let bytes = rest.as_bytes();
    match bytes.first() {
        Some(b'<') => {
            let end = rest.find('>').ok_or("unterminated IRI")?;
            let iri = unescape(&rest[1..end])?;
            *rest = &rest[end + 1..];
            Ok(Value::iri(iri))
        }
        Some(b'_') => {
            if !rest.starts_with("_:") {
                return Err("expected blank node label".into());
            }
            let body = &rest[2..];
            let end = body
                .find(|c: char| c.is_whitespace())
                .unwrap_or(body.len());
            let label = &body[..end];
            if label.is_empty() {
                return Err("empty blank node label".into());
            }
            *rest = &body[end..];
            Ok(Value::blank(label))
        }
        Some(b'"') => {
            let end = find_closing_quote(&rest[1..]).ok_or("unterminated literal")?;
            let lexical = unescape(&rest[1..1 + end])?;
            *rest = &rest[end + 2..];
            if let Some(stripped) = rest.strip_prefix('@') {
                let end = stripped
                    .find(|c: char| c.is_whitespace())
                    .unwrap_or(stripped.len());
                let tag = &stripped[..end];
                if tag.is_empty() {
                    return Err("empty language tag".into());
                }
                *rest = &stripped[end..];
                Ok(Value::plain_lang(lexical, tag))
            } else if let Some(stripped) = rest.strip_prefix("^^<") {
                let end = stripped.find('>').ok_or("unterminated datatype IRI")?;
                let datatype = unescape(&stripped[..end])?;
                *rest = &stripped[end + 1..];
                Ok(Value::typed(lexical, datatype))
            } else {
                Ok(Value::plain(lexical))
            }
        }
        _ => Err("expected IRI, blank node or literal".into()),
    }
}

/// Index of the closing unescaped quote in `s`.
fn find_closing_quote(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn unescape(s: &str) -> std::result::Result<String, String> {
    if !s.contains('\\') {
        return Ok(s.to_string());
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('u') => out.push(unescape_codepoint(&mut chars, 4)?),
            Some('U') => out.push(unescape_codepoint(&mut chars, 8)?),
            other => return Err(format!("invalid escape \\{}", other.unwrap_or(' '))),
        }
    }
    Ok(out)
}

fn unescape_codepoint(
    chars: &mut std::str::Chars<'_>,
    len: usize,
) -> std::result::Result<char, String> {
    let hex: String = chars.take(len).collect();
    if hex.len() != len {
        return Err("truncated unicode escape".into());
    }
    let code = u32::from_str_radix(&hex, 16).map_err(|_| "invalid unicode escape")?;
    char::from_u32(code).ok_or_else(|| "invalid code point".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn one(line: &str) -> (Value, Value, Value) {
        let mut result = None;
        parse(line.as_bytes(), |s, p, o| {
            result = Some((s, p, o));
            Ok(())
        })
        .unwrap();
        result.unwrap()
    }

    #[test]
    fn iri_triple() {
        let (s, p, o) = one("<http://a> <http://p> <http://b> .");
        assert_eq!(s.category, Category::Iri);
        assert_eq!(s.lexical, "http://a");
        assert_eq!(p.lexical, "http://p");
        assert_eq!(o.lexical, "http://b");
    }

    #[test]
    fn literals() {
        let (_, _, o) = one("<http://a> <http://p> \"hi there\" .");
        assert_eq!(o.category, Category::PlainString);
        assert_eq!(o.lexical, "hi there");

        let (_, _, o) = one("<http://a> <http://p> \"bonjour\"@fr .");
        assert_eq!(o.category, Category::PlainLanguage);
        assert_eq!(o.language, "fr");

        let (_, _, o) = one(
            "<http://a> <http://p> \"4\"^^<http://www.w3.org/2001/XMLSchema#integer> .",
        );
        assert_eq!(o.category, Category::Numeric);
    }

    #[test]
    fn blank_nodes_and_escapes() {
        let (s, _, o) = one("_:b0 <http://p> \"a\\\"b\\nc\" .");
        assert_eq!(s.category, Category::Blank);
        assert_eq!(s.lexical, "b0");
        assert_eq!(o.lexical, "a\"b\nc");
    }

    #[test]
    fn comments_and_blank_lines() {
        let mut count = 0;
        parse(
            "# header\n\n<http://a> <http://p> <http://b> .\n".as_bytes(),
            |_, _, _| {
                count += 1;
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn reports_line_numbers() {
        let err = parse("<http://a> <http://p> .\n".as_bytes(), |_, _, _| Ok(()))
            .unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
