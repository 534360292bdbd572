use super::scope::ValueKind;
use crate::language::{ast::*, span::Span};

/// A fragment ready for splicing: its parsed expression, shallow value
/// kind, and the `${..}` extent inside the literal value.
#[derive(Clone, Debug)]
pub struct ResolvedFragment {
    pub expr: Expr,
    pub kind: ValueKind,
    pub start: usize,
    pub end: usize,
}

/// Interleaves literal segments and fragments into a left-associative
/// `+` chain. `base` is the source offset of the value's first byte;
/// the aggregate expression takes the literal's exact span so nothing
/// downstream of the rewrite sees a shifted range.
pub fn build(
    value: &str,
    literal_span: Span,
    base: usize,
    fragments: Vec<ResolvedFragment>,
) -> Expr {
    let mut parts: Vec<Expr> = Vec::new();
    let mut cursor = 0usize;
    for fragment in fragments {
        if fragment.start > cursor {
            parts.push(segment(&value[cursor..fragment.start], base + cursor));
        }
        cursor = fragment.end;
        parts.push(convert(fragment));
    }
    if cursor < value.len() {
        parts.push(segment(&value[cursor..], base + cursor));
    }

    let mut parts = parts.into_iter();
    let mut expr = parts
        .next()
        .expect("builder requires at least one interpolation span");
    for part in parts {
        let span = expr.span().union(part.span());
        expr = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(expr),
            right: Box::new(part),
            span,
        };
    }
    with_span(expr, literal_span)
}

fn segment(text: &str, base: usize) -> Expr {
    Expr::Literal(Literal::Str(
        text.to_string(),
        Span::new(base, base + text.len()),
    ))
}

/// Fragments already of text type are spliced bare; everything else
/// goes through the host's standard conversion call.
fn convert(fragment: ResolvedFragment) -> Expr {
    if fragment.kind == ValueKind::Known(TypeExpr::Text) {
        return fragment.expr;
    }
    let span = fragment.expr.span();
    Expr::Call {
        callee: Box::new(Expr::Identifier(Identifier {
            name: "str".to_string(),
            span,
        })),
        args: vec![fragment.expr],
        span,
    }
}

fn with_span(mut expr: Expr, span: Span) -> Expr {
    match &mut expr {
        Expr::Identifier(ident) => ident.span = span,
        Expr::Literal(
            Literal::Int(_, s) | Literal::Float(_, s) | Literal::Bool(_, s) | Literal::Str(_, s),
        ) => *s = span,
        Expr::Binary { span: s, .. }
        | Expr::Unary { span: s, .. }
        | Expr::Ternary { span: s, .. }
        | Expr::Call { span: s, .. }
        | Expr::FieldAccess { span: s, .. }
        | Expr::Index { span: s, .. } => *s = span,
    }
    expr
}
