//! Renders a unit back to braid source. The driver prints rewritten
//! units with this, and tests use it to compare tree shapes.

use crate::language::ast::*;

pub fn render_unit(unit: &Unit) -> String {
    let mut out = String::new();
    for (i, decl) in unit.decls.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_decl(decl, 0, &mut out);
    }
    out
}

pub fn render_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(expr, &mut out);
    out
}

fn indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str("    ");
    }
}

fn render_decl(decl: &Decl, level: usize, out: &mut String) {
    match decl {
        Decl::Class(class) => render_class(class, level, out),
        Decl::Enum(def) => render_enum(def, level, out),
    }
}

fn render_class(class: &ClassDef, level: usize, out: &mut String) {
    indent(level, out);
    out.push_str("class ");
    out.push_str(&class.name);
    if let Some(superclass) = &class.superclass {
        out.push_str(" : ");
        out.push_str(&superclass.name);
    }
    out.push_str(" {\n");
    for field in &class.fields {
        indent(level + 1, out);
        out.push_str(&field.name);
        out.push_str(": ");
        write_type(&field.ty, out);
        out.push_str(";\n");
    }
    for method in &class.methods {
        out.push('\n');
        render_method(method, level + 1, out);
    }
    for nested in &class.nested {
        out.push('\n');
        render_decl(nested, level + 1, out);
    }
    indent(level, out);
    out.push_str("}\n");
}

fn render_enum(def: &EnumDef, level: usize, out: &mut String) {
    indent(level, out);
    out.push_str("enum ");
    out.push_str(&def.name);
    out.push_str(" {\n");
    for (i, variant) in def.variants.iter().enumerate() {
        indent(level + 1, out);
        out.push_str(&variant.name);
        if i + 1 < def.variants.len() {
            out.push(',');
        } else if !def.methods.is_empty() {
            out.push(';');
        }
        out.push('\n');
    }
    for method in &def.methods {
        out.push('\n');
        render_method(method, level + 1, out);
    }
    indent(level, out);
    out.push_str("}\n");
}

fn render_method(method: &MethodDef, level: usize, out: &mut String) {
    indent(level, out);
    out.push_str("fn ");
    out.push_str(&method.name);
    out.push('(');
    for (i, param) in method.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&param.name);
        out.push_str(": ");
        write_type(&param.ty, out);
    }
    out.push(')');
    if let Some(returns) = &method.returns {
        out.push_str(" -> ");
        write_type(returns, out);
    }
    out.push(' ');
    render_block(&method.body, level, out);
    out.push('\n');
}

fn render_block(block: &Block, level: usize, out: &mut String) {
    out.push_str("{\n");
    for stmt in &block.statements {
        render_stmt(stmt, level + 1, out);
    }
    indent(level, out);
    out.push('}');
}

fn render_stmt(stmt: &Statement, level: usize, out: &mut String) {
    match stmt {
        Statement::Let(stmt) => {
            indent(level, out);
            out.push_str("let ");
            out.push_str(&stmt.name);
            if let Some(ty) = &stmt.ty {
                out.push_str(": ");
                write_type(ty, out);
            }
            if let Some(value) = &stmt.value {
                out.push_str(" = ");
                write_expr(value, out);
            }
            out.push_str(";\n");
        }
        Statement::Assign(stmt) => {
            indent(level, out);
            write_expr(&stmt.target, out);
            out.push_str(" = ");
            write_expr(&stmt.value, out);
            out.push_str(";\n");
        }
        Statement::Expr(stmt) => {
            indent(level, out);
            write_expr(&stmt.expr, out);
            out.push_str(";\n");
        }
        Statement::Return(stmt) => {
            indent(level, out);
            out.push_str("return");
            if let Some(value) = &stmt.value {
                out.push(' ');
                write_expr(value, out);
            }
            out.push_str(";\n");
        }
        Statement::If(stmt) => {
            indent(level, out);
            render_if(stmt, level, out);
            out.push('\n');
        }
        Statement::While(stmt) => {
            indent(level, out);
            out.push_str("while ");
            write_expr(&stmt.condition, out);
            out.push(' ');
            render_block(&stmt.body, level, out);
            out.push('\n');
        }
        Statement::Block(block) => {
            indent(level, out);
            render_block(block, level, out);
            out.push('\n');
        }
    }
}

fn render_if(stmt: &IfStmt, level: usize, out: &mut String) {
    out.push_str("if ");
    write_expr(&stmt.condition, out);
    out.push(' ');
    render_block(&stmt.then_branch, level, out);
    match &stmt.else_branch {
        Some(ElseBranch::Block(block)) => {
            out.push_str(" else ");
            render_block(block, level, out);
        }
        Some(ElseBranch::ElseIf(nested)) => {
            out.push_str(" else ");
            render_if(nested, level, out);
        }
        None => {}
    }
}

fn write_type(ty: &TypeExpr, out: &mut String) {
    match ty {
        TypeExpr::Text => out.push_str("text"),
        TypeExpr::Int => out.push_str("int"),
        TypeExpr::Float => out.push_str("float"),
        TypeExpr::Bool => out.push_str("bool"),
        TypeExpr::Named(name) => out.push_str(name),
        TypeExpr::List(elem) => {
            out.push_str("[]");
            write_type(elem, out);
        }
    }
}

fn write_expr(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Identifier(ident) => out.push_str(&ident.name),
        Expr::Literal(lit) => write_literal(lit, out),
        Expr::Binary {
            op, left, right, ..
        } => {
            let prec = binary_prec(*op);
            write_operand(left, prec, false, out);
            out.push(' ');
            out.push_str(binary_symbol(*op));
            out.push(' ');
            write_operand(right, prec, true, out);
        }
        Expr::Unary { op, expr, .. } => {
            out.push_str(match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            });
            write_operand(expr, UNARY_PREC, true, out);
        }
        Expr::Ternary {
            condition,
            then_value,
            else_value,
            ..
        } => {
            write_operand(condition, TERNARY_PREC, true, out);
            out.push_str(" ? ");
            write_expr(then_value, out);
            out.push_str(" : ");
            write_expr(else_value, out);
        }
        Expr::Call { callee, args, .. } => {
            write_operand(callee, POSTFIX_PREC, false, out);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(arg, out);
            }
            out.push(')');
        }
        Expr::FieldAccess { base, field, .. } => {
            write_operand(base, POSTFIX_PREC, false, out);
            out.push('.');
            out.push_str(field);
        }
        Expr::Index { base, index, .. } => {
            write_operand(base, POSTFIX_PREC, false, out);
            out.push('[');
            write_expr(index, out);
            out.push(']');
        }
    }
}

const TERNARY_PREC: u8 = 1;
const UNARY_PREC: u8 = 30;
const POSTFIX_PREC: u8 = 40;

fn expr_prec(expr: &Expr) -> u8 {
    match expr {
        Expr::Ternary { .. } => TERNARY_PREC,
        Expr::Binary { op, .. } => binary_prec(*op),
        Expr::Unary { .. } => UNARY_PREC,
        Expr::Identifier(_)
        | Expr::Literal(_)
        | Expr::Call { .. }
        | Expr::FieldAccess { .. }
        | Expr::Index { .. } => POSTFIX_PREC,
    }
}

// An operand needs parentheses when its precedence is lower than its
// context's, or equal on the right of a left-associative operator.
fn write_operand(expr: &Expr, parent_prec: u8, is_right: bool, out: &mut String) {
    let prec = expr_prec(expr);
    let parens = prec < parent_prec || (prec == parent_prec && is_right);
    if parens {
        out.push('(');
    }
    write_expr(expr, out);
    if parens {
        out.push(')');
    }
}

fn binary_prec(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 3,
        BinaryOp::And => 4,
        BinaryOp::Eq | BinaryOp::NotEq => 5,
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 9,
        BinaryOp::Add | BinaryOp::Sub => 10,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 20,
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
    }
}

fn write_literal(lit: &Literal, out: &mut String) {
    match lit {
        Literal::Int(value, _) => out.push_str(&value.to_string()),
        Literal::Float(value, _) => out.push_str(&format!("{:?}", value)),
        Literal::Bool(value, _) => out.push_str(if *value { "true" } else { "false" }),
        Literal::Str(value, _) => {
            out.push('"');
            for ch in value.chars() {
                match ch {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    other => out.push(other),
                }
            }
            out.push('"');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::{parse_expression_source, parse_unit};

    #[test]
    fn renders_concatenation_without_extra_parens() {
        let expr = parse_expression_source(r#""a" + name + "b""#).expect("parse");
        assert_eq!(render_expr(&expr), r#""a" + name + "b""#);
    }

    #[test]
    fn parenthesizes_lower_precedence_operands() {
        let expr = parse_expression_source("(a + b) * c").expect("parse");
        assert_eq!(render_expr(&expr), "(a + b) * c");
    }

    #[test]
    fn renders_ternary_and_escapes() {
        let expr = parse_expression_source("flag ? \"y\\n\" : str(n)").expect("parse");
        assert_eq!(render_expr(&expr), "flag ? \"y\\n\" : str(n)");
    }

    #[test]
    fn unit_round_trips_through_the_parser() {
        let source = "class Customer {\n    name: text;\n\n    fn greeting() -> text {\n        return \"hi\";\n    }\n}\n";
        let unit = parse_unit(source).expect("parse");
        let rendered = render_unit(&unit);
        let reparsed = parse_unit(&rendered).expect("reparse");
        assert_eq!(render_unit(&reparsed), rendered);
    }
}
