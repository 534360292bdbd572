use super::{InterpolationError, MalformedKind};
use crate::language::span::Span;
use nom::{
    bytes::complete::{tag, take_until},
    IResult,
};

/// One `${..}` occurrence inside a literal's value. Offsets index the
/// value text; `text` is the fragment between the markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterpolationSpan<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

pub fn scan(text: &str) -> Spans<'_> {
    Spans {
        text,
        offset: 0,
        done: false,
    }
}

pub struct Spans<'a> {
    text: &'a str,
    offset: usize,
    done: bool,
}

fn until_marker(input: &str) -> IResult<&str, &str> {
    take_until("${")(input)
}

fn marker_open(input: &str) -> IResult<&str, &str> {
    tag("${")(input)
}

impl<'a> Iterator for Spans<'a> {
    type Item = Result<InterpolationSpan<'a>, InterpolationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let rest = &self.text[self.offset..];
        let (at_marker, skipped) = match until_marker(rest) {
            Ok(parts) => parts,
            Err(_) => {
                self.done = true;
                return None;
            }
        };
        let start = self.offset + skipped.len();
        let (body, _) = match marker_open(at_marker) {
            Ok(parts) => parts,
            Err(_) => {
                self.done = true;
                return None;
            }
        };
        match fragment_body(body) {
            Ok(len) => {
                let text = &body[..len];
                let end = start + 2 + len + 1;
                if text.trim().is_empty() {
                    self.done = true;
                    return Some(Err(InterpolationError::Malformed {
                        kind: MalformedKind::EmptyFragment,
                        span: Span::new(start, end),
                    }));
                }
                self.offset = end;
                Some(Ok(InterpolationSpan { start, end, text }))
            }
            Err(BodyError::Unterminated) => {
                self.done = true;
                Some(Err(InterpolationError::Malformed {
                    kind: MalformedKind::Unterminated,
                    span: Span::new(start, self.text.len()),
                }))
            }
            Err(BodyError::Nested(at)) => {
                self.done = true;
                let abs = start + 2 + at;
                Some(Err(InterpolationError::Malformed {
                    kind: MalformedKind::NestedMarker,
                    span: Span::new(abs, abs + 2),
                }))
            }
        }
    }
}

enum BodyError {
    Unterminated,
    Nested(usize),
}

/// Scans to the marker's closing brace. Brace depth and double-quoted
/// string state are tracked so `{`, `}` and `"` belonging to the
/// fragment's own sub-expressions never end the marker early.
fn fragment_body(input: &str) -> Result<usize, BodyError> {
    let mut depth = 1usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut prev_dollar = false;
    for (idx, ch) in input.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            prev_dollar = false;
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' if prev_dollar => return Err(BodyError::Nested(idx - 1)),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(idx);
                }
            }
            _ => {}
        }
        prev_dollar = ch == '$';
    }
    Err(BodyError::Unterminated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans_of(text: &str) -> Vec<InterpolationSpan<'_>> {
        scan(text).collect::<Result<Vec<_>, _>>().expect("scan")
    }

    #[test]
    fn marker_free_text_yields_nothing() {
        assert!(spans_of("plain text, even with $ and } and {").is_empty());
    }

    #[test]
    fn single_marker_offsets() {
        let spans = spans_of("Hello, ${name}!");
        assert_eq!(
            spans,
            vec![InterpolationSpan {
                start: 7,
                end: 14,
                text: "name",
            }]
        );
    }

    #[test]
    fn spans_are_ordered_and_non_overlapping() {
        let spans = spans_of("${a} then ${b} then ${c}");
        assert_eq!(spans.len(), 3);
        assert!(spans.windows(2).all(|w| w[0].end <= w[1].start));
        assert_eq!(spans[1].text, "b");
    }

    #[test]
    fn adjacent_markers() {
        let spans = spans_of("${a}${b}");
        assert_eq!(spans[0].end, spans[1].start);
    }

    #[test]
    fn brackets_inside_fragment_do_not_split_it() {
        let spans = spans_of("price: ${items[0].price}");
        assert_eq!(spans[0].text, "items[0].price");
    }

    #[test]
    fn braces_inside_fragment_balance() {
        let spans = spans_of("${lookup({key: 1})} end");
        assert_eq!(spans[0].text, "lookup({key: 1})");
    }

    #[test]
    fn quoted_braces_inside_fragment_are_shielded() {
        let spans = spans_of("${cond ? \"{\" : \"}\"}");
        assert_eq!(spans[0].text, "cond ? \"{\" : \"}\"");
    }

    #[test]
    fn quoted_marker_inside_fragment_is_shielded() {
        let spans = spans_of("${prefix(\"${\")}");
        assert_eq!(spans[0].text, "prefix(\"${\")");
    }

    #[test]
    fn unterminated_marker_is_malformed() {
        let err = scan("oops ${name").last().expect("item").expect_err("should fail");
        assert!(matches!(
            err,
            InterpolationError::Malformed {
                kind: MalformedKind::Unterminated,
                ..
            }
        ));
        assert_eq!(err.span(), Span::new(5, 11));
    }

    #[test]
    fn empty_fragment_is_malformed() {
        let err = scan("${  }").last().expect("item").expect_err("should fail");
        assert!(matches!(
            err,
            InterpolationError::Malformed {
                kind: MalformedKind::EmptyFragment,
                ..
            }
        ));
    }

    #[test]
    fn nested_marker_is_malformed() {
        let err = scan("${outer ${inner}}")
            .next()
            .expect("item")
            .expect_err("should fail");
        assert!(matches!(
            err,
            InterpolationError::Malformed {
                kind: MalformedKind::NestedMarker,
                ..
            }
        ));
        assert_eq!(err.span(), Span::new(8, 10));
    }

    #[test]
    fn dollar_without_brace_is_plain_text() {
        let spans = spans_of("$100 and ${amount}");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "amount");
    }

    #[test]
    fn rescanning_is_deterministic() {
        let text = "a ${x} b ${y}";
        let first: Vec<_> = scan(text).collect::<Result<_, _>>().expect("scan");
        let second: Vec<_> = scan(text).collect::<Result<_, _>>().expect("scan");
        assert_eq!(first, second);
    }
}
