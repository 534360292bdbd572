use super::{InterpolationError, MalformedKind};
use crate::language::{ast::*, parser, span::Span};

/// Parses one fragment with the host expression grammar. `base` is the
/// source offset of the fragment's first byte; every span in the
/// returned tree is absolute, so diagnostics point into the original
/// literal rather than at offset 0.
pub fn parse_fragment(text: &str, base: usize) -> Result<Expr, InterpolationError> {
    let mut expr = match parser::parse_expression_source(text) {
        Ok(expr) => expr,
        Err(err) => {
            return Err(InterpolationError::FragmentSyntax {
                message: err.message,
                span: err.span.shift(base),
            });
        }
    };
    shift_expr(&mut expr, base);
    if let Some(span) = marker_in_string_literal(&expr) {
        return Err(InterpolationError::Malformed {
            kind: MalformedKind::NestedMarker,
            span,
        });
    }
    Ok(expr)
}

fn shift_expr(expr: &mut Expr, by: usize) {
    match expr {
        Expr::Identifier(ident) => ident.span = ident.span.shift(by),
        Expr::Literal(lit) => shift_literal(lit, by),
        Expr::Binary {
            left, right, span, ..
        } => {
            *span = span.shift(by);
            shift_expr(left, by);
            shift_expr(right, by);
        }
        Expr::Unary { expr, span, .. } => {
            *span = span.shift(by);
            shift_expr(expr, by);
        }
        Expr::Ternary {
            condition,
            then_value,
            else_value,
            span,
        } => {
            *span = span.shift(by);
            shift_expr(condition, by);
            shift_expr(then_value, by);
            shift_expr(else_value, by);
        }
        Expr::Call { callee, args, span } => {
            *span = span.shift(by);
            shift_expr(callee, by);
            for arg in args {
                shift_expr(arg, by);
            }
        }
        Expr::FieldAccess { base, span, .. } => {
            *span = span.shift(by);
            shift_expr(base, by);
        }
        Expr::Index { base, index, span } => {
            *span = span.shift(by);
            shift_expr(base, by);
            shift_expr(index, by);
        }
    }
}

fn shift_literal(lit: &mut Literal, by: usize) {
    match lit {
        Literal::Int(_, span)
        | Literal::Float(_, span)
        | Literal::Bool(_, span)
        | Literal::Str(_, span) => *span = span.shift(by),
    }
}

// Nested interpolation is unsupported; a fragment-internal string
// literal carrying a marker would otherwise survive into the rewrite
// and be picked up again on the next pass.
fn marker_in_string_literal(expr: &Expr) -> Option<Span> {
    match expr {
        Expr::Literal(Literal::Str(value, span)) => {
            value.contains("${").then_some(*span)
        }
        Expr::Literal(_) | Expr::Identifier(_) => None,
        Expr::Binary { left, right, .. } => {
            marker_in_string_literal(left).or_else(|| marker_in_string_literal(right))
        }
        Expr::Unary { expr, .. } => marker_in_string_literal(expr),
        Expr::Ternary {
            condition,
            then_value,
            else_value,
            ..
        } => marker_in_string_literal(condition)
            .or_else(|| marker_in_string_literal(then_value))
            .or_else(|| marker_in_string_literal(else_value)),
        Expr::Call { callee, args, .. } => marker_in_string_literal(callee)
            .or_else(|| args.iter().find_map(marker_in_string_literal)),
        Expr::FieldAccess { base, .. } => marker_in_string_literal(base),
        Expr::Index { base, index, .. } => {
            marker_in_string_literal(base).or_else(|| marker_in_string_literal(index))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identifier_fragment() {
        let expr = parse_fragment("name", 0).expect("parse");
        assert!(matches!(expr, Expr::Identifier(_)));
    }

    #[test]
    fn parses_member_and_index_chain_as_one_expression() {
        let expr = parse_fragment("items[0].price", 0).expect("parse");
        assert!(matches!(expr, Expr::FieldAccess { .. }));
    }

    #[test]
    fn remaps_spans_to_the_literal_offset() {
        let expr = parse_fragment("age", 10).expect("parse");
        assert_eq!(expr.span(), Span::new(10, 13));
    }

    #[test]
    fn remaps_nested_spans_too() {
        let expr = parse_fragment("a + b", 20).expect("parse");
        let Expr::Binary { left, right, span, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(span, Span::new(20, 25));
        assert_eq!(left.span(), Span::new(20, 21));
        assert_eq!(right.span(), Span::new(24, 25));
    }

    #[test]
    fn syntax_error_offset_is_absolute() {
        let err = parse_fragment("a +", 30).expect_err("should fail");
        match err {
            InterpolationError::FragmentSyntax { span, .. } => {
                assert!(span.start >= 30);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn statements_are_rejected() {
        assert!(parse_fragment("let x = 1;", 0).is_err());
        assert!(parse_fragment("a; b", 0).is_err());
    }

    #[test]
    fn interpolation_free_string_literal_is_accepted() {
        let expr = parse_fragment("flag ? \"yes\" : \"no\"", 0).expect("parse");
        assert!(matches!(expr, Expr::Ternary { .. }));
    }

    #[test]
    fn marker_inside_nested_string_literal_is_malformed() {
        let err = parse_fragment("prefix(\"${inner}\")", 0).expect_err("should fail");
        assert!(matches!(
            err,
            InterpolationError::Malformed {
                kind: MalformedKind::NestedMarker,
                ..
            }
        ));
    }
}
