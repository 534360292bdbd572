use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
};
use std::ops::Range;

pub fn parse_unit(source: &str) -> Result<Unit, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(tokens).parse(source.len())
}

/// Parses a standalone expression. The whole input must be consumed;
/// trailing tokens are an error, which keeps statements and
/// declarations out of expression-only callers.
pub fn parse_expression_source(source: &str) -> Result<Expr, SyntaxError> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(mut errors) => {
            let err = errors.remove(0);
            return Err(SyntaxError::new(err.message, err.span));
        }
    };
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    if !parser.is_eof() {
        return Err(parser.error_here("Expected end of expression"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
    last_span: Option<Range<usize>>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            last_span: None,
        }
    }

    fn parse(mut self, source_len: usize) -> Result<Unit, SyntaxErrors> {
        let mut decls = Vec::new();

        while !self.is_eof() {
            if self.matches(TokenKind::Semi) {
                continue;
            }
            match self.parse_decl() {
                Ok(decl) => decls.push(decl),
                Err(err) => {
                    self.report(err);
                    self.synchronize_decl();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(Unit {
                decls,
                span: Span::new(0, source_len),
            })
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    fn parse_decl(&mut self) -> Result<Decl, SyntaxError> {
        if self.matches(TokenKind::Class) {
            return self.parse_class().map(Decl::Class);
        }
        if self.matches(TokenKind::Enum) {
            return self.parse_enum().map(Decl::Enum);
        }
        Err(self
            .error_here("Expected 'class' or 'enum' declaration")
            .with_help("Top-level declarations look like `class Name { .. }` or `enum Name { .. }`"))
    }

    fn parse_class(&mut self) -> Result<ClassDef, SyntaxError> {
        let name = self.expect_identifier("Expected class name")?;
        let start = name.span.start;
        let superclass = if self.matches(TokenKind::Colon) {
            Some(self.expect_identifier("Expected superclass name after ':'")?)
        } else {
            None
        };
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut nested = Vec::new();

        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            if self.matches(TokenKind::Semi) {
                continue;
            }
            if self.matches(TokenKind::Fn) {
                match self.parse_method() {
                    Ok(method) => methods.push(method),
                    Err(err) => {
                        self.report(err);
                        self.synchronize_member();
                    }
                }
                continue;
            }
            if self.matches(TokenKind::Class) {
                match self.parse_class() {
                    Ok(def) => nested.push(Decl::Class(def)),
                    Err(err) => {
                        self.report(err);
                        self.synchronize_member();
                    }
                }
                continue;
            }
            if self.matches(TokenKind::Enum) {
                match self.parse_enum() {
                    Ok(def) => nested.push(Decl::Enum(def)),
                    Err(err) => {
                        self.report(err);
                        self.synchronize_member();
                    }
                }
                continue;
            }
            match self.parse_field() {
                Ok(field) => fields.push(field),
                Err(err) => {
                    self.report(err);
                    self.synchronize_member();
                }
            }
        }

        let end = self.expect(TokenKind::RBrace)?.span.end;
        Ok(ClassDef {
            name: name.name,
            superclass,
            fields,
            methods,
            nested,
            span: Span::new(start, end),
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDef, SyntaxError> {
        let name = self.expect_identifier("Expected enum name")?;
        let start = name.span.start;
        self.expect(TokenKind::LBrace)?;

        let mut variants = Vec::new();
        let mut methods = Vec::new();

        while !self.check(TokenKind::RBrace)
            && !self.check(TokenKind::Semi)
            && !self.is_eof()
        {
            let variant = self.expect_identifier("Expected enum variant name")?;
            variants.push(EnumVariant {
                name: variant.name,
                span: variant.span,
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }

        if self.matches(TokenKind::Semi) {
            while !self.check(TokenKind::RBrace) && !self.is_eof() {
                if self.matches(TokenKind::Semi) {
                    continue;
                }
                self.expect(TokenKind::Fn)?;
                match self.parse_method() {
                    Ok(method) => methods.push(method),
                    Err(err) => {
                        self.report(err);
                        self.synchronize_member();
                    }
                }
            }
        }

        let end = self.expect(TokenKind::RBrace)?.span.end;
        Ok(EnumDef {
            name: name.name,
            variants,
            methods,
            span: Span::new(start, end),
        })
    }

    fn parse_field(&mut self) -> Result<FieldDef, SyntaxError> {
        let name = self.expect_identifier("Expected field name")?;
        let start = name.span.start;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type_expr()?;
        let end = self.expect(TokenKind::Semi)?.span.end;
        Ok(FieldDef {
            name: name.name,
            ty,
            span: Span::new(start, end),
        })
    }

    fn parse_method(&mut self) -> Result<MethodDef, SyntaxError> {
        let name = self.expect_identifier("Expected method name")?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if self.matches(TokenKind::Comma) {
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let returns = if self.matches(TokenKind::Arrow) {
            Some(self.parse_type_expr()?)
        } else {
            None
        };

        let body = self.parse_block()?;
        let span = Span::new(name.span.start, body.span.end);
        Ok(MethodDef {
            name: name.name,
            params,
            returns,
            body,
            span,
        })
    }

    fn parse_param(&mut self) -> Result<ParamDef, SyntaxError> {
        let name = self.expect_identifier("Expected parameter name")?;
        let start = name.span.start;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type_expr()?;
        let end = self.last_span_end(start);
        Ok(ParamDef {
            name: name.name,
            ty,
            span: Span::new(start, end),
        })
    }

    fn parse_type_expr(&mut self) -> Result<TypeExpr, SyntaxError> {
        if self.matches(TokenKind::LBracket) {
            self.expect(TokenKind::RBracket)?;
            let elem = self.parse_type_expr()?;
            return Ok(TypeExpr::List(Box::new(elem)));
        }
        let ident = self.expect_identifier("Expected type name")?;
        Ok(TypeExpr::named(ident.name))
    }

    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        let start = self.expect(TokenKind::LBrace)?.span.start;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            if self.matches(TokenKind::Semi) {
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.synchronize_statement();
                }
            }
        }
        let end = self.expect(TokenKind::RBrace)?.span.end;
        Ok(Block {
            statements,
            span: Span::new(start, end),
        })
    }

    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        if self.matches(TokenKind::Let) {
            let start = self
                .previous_span()
                .map(|s| s.start)
                .unwrap_or_else(|| self.current_span_start());
            return self.parse_let(start).map(Statement::Let);
        }
        if self.matches(TokenKind::Return) {
            let start = self
                .previous_span()
                .map(|s| s.start)
                .unwrap_or_else(|| self.current_span_start());
            if self.matches(TokenKind::Semi) {
                return Ok(Statement::Return(ReturnStmt {
                    value: None,
                    span: Span::new(start, self.last_span_end(start)),
                }));
            }
            let value = self.parse_expression()?;
            let end = self.expect(TokenKind::Semi)?.span.end;
            return Ok(Statement::Return(ReturnStmt {
                value: Some(value),
                span: Span::new(start, end),
            }));
        }
        if self.matches(TokenKind::If) {
            return self.parse_if().map(Statement::If);
        }
        if self.matches(TokenKind::While) {
            let start = self
                .previous_span()
                .map(|s| s.start)
                .unwrap_or_else(|| self.current_span_start());
            let condition = self.parse_expression()?;
            let body = self.parse_block()?;
            let span = Span::new(start, body.span.end);
            return Ok(Statement::While(WhileStmt {
                condition,
                body,
                span,
            }));
        }
        if self.check(TokenKind::LBrace) {
            let block = self.parse_block()?;
            return Ok(Statement::Block(Box::new(block)));
        }

        let expr = self.parse_expression()?;
        if self.matches(TokenKind::Eq) {
            let value = self.parse_expression()?;
            let end = self.expect(TokenKind::Semi)?.span.end;
            let span = Span::new(expr.span().start, end);
            return Ok(Statement::Assign(AssignStmt {
                target: expr,
                value,
                span,
            }));
        }
        let end = self.expect(TokenKind::Semi)?.span.end;
        let span = Span::new(expr.span().start, end);
        Ok(Statement::Expr(ExprStmt { expr, span }))
    }

    fn parse_let(&mut self, start: usize) -> Result<LetStmt, SyntaxError> {
        let name = self.expect_identifier("Expected binding name")?;
        let ty = if self.matches(TokenKind::Colon) {
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let value = if self.matches(TokenKind::Eq) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let end = self.expect(TokenKind::Semi)?.span.end;
        Ok(LetStmt {
            name: name.name,
            ty,
            value,
            span: Span::new(start, end),
        })
    }

    fn parse_if(&mut self) -> Result<IfStmt, SyntaxError> {
        let start = self
            .previous_span()
            .map(|s| s.start)
            .unwrap_or_else(|| self.current_span_start());
        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.matches(TokenKind::Else) {
            if self.matches(TokenKind::If) {
                Some(ElseBranch::ElseIf(Box::new(self.parse_if()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        let end = match &else_branch {
            Some(ElseBranch::Block(block)) => block.span.end,
            Some(ElseBranch::ElseIf(nested)) => nested.span.end,
            None => then_branch.span.end,
        };
        Ok(IfStmt {
            condition,
            then_branch,
            else_branch,
            span: Span::new(start, end),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        let condition = self.parse_binary(0)?;
        if self.matches(TokenKind::Question) {
            let then_value = self.parse_expression()?;
            self.expect(TokenKind::Colon)?;
            let else_value = self.parse_expression()?;
            let span = condition.span().union(else_value.span());
            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
                span,
            });
        }
        Ok(condition)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;

        loop {
            let (op, prec) = match self.current_binary_op() {
                Some(info) => info,
                None => break,
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            let span = left.span().union(right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        if self.matches(TokenKind::Minus) {
            let start = self
                .previous_span()
                .map(|s| s.start)
                .unwrap_or_else(|| self.current_span_start());
            let expr = self.parse_unary()?;
            let span = Span::new(start, expr.span().end);
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
                span,
            });
        }
        if self.matches(TokenKind::Bang) {
            let start = self
                .previous_span()
                .map(|s| s.start)
                .unwrap_or_else(|| self.current_span_start());
            let expr = self.parse_unary()?;
            let span = Span::new(start, expr.span().end);
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LParen) {
                let span_start = expr.span().start;
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if self.matches(TokenKind::Comma) {
                            continue;
                        }
                        break;
                    }
                }
                let end = self.expect(TokenKind::RParen)?.span.end;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span: Span::new(span_start, end),
                };
                continue;
            }
            if self.matches(TokenKind::Dot) {
                let field = self.expect_identifier("Expected member name after '.'")?;
                let span = expr.span().union(field.span);
                expr = Expr::FieldAccess {
                    base: Box::new(expr),
                    field: field.name,
                    span,
                };
                continue;
            }
            if self.matches(TokenKind::LBracket) {
                let span_start = expr.span().start;
                let index = self.parse_expression()?;
                let end = self.expect(TokenKind::RBracket)?.span.end;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                    span: Span::new(span_start, end),
                };
                continue;
            }
            break;
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(_)) => {
                let ident = self.expect_identifier("Expected identifier")?;
                Ok(Expr::Identifier(ident))
            }
            Some(TokenKind::Integer(value)) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Int(value, span)))
            }
            Some(TokenKind::Float(value)) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Float(value, span)))
            }
            Some(TokenKind::Str(value)) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Str(value, span)))
            }
            Some(TokenKind::True) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Bool(true, span)))
            }
            Some(TokenKind::False) => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Bool(false, span)))
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.error_here("Unexpected token in expression")),
        }
    }

    fn current_binary_op(&self) -> Option<(BinaryOp, u8)> {
        match self.peek_kind() {
            Some(TokenKind::PipePipe) => Some((BinaryOp::Or, 3)),
            Some(TokenKind::AmpersandAmpersand) => Some((BinaryOp::And, 4)),
            Some(TokenKind::EqEq) => Some((BinaryOp::Eq, 5)),
            Some(TokenKind::BangEq) => Some((BinaryOp::NotEq, 5)),
            Some(TokenKind::Lt) => Some((BinaryOp::Lt, 9)),
            Some(TokenKind::LtEq) => Some((BinaryOp::LtEq, 9)),
            Some(TokenKind::Gt) => Some((BinaryOp::Gt, 9)),
            Some(TokenKind::GtEq) => Some((BinaryOp::GtEq, 9)),
            Some(TokenKind::Plus) => Some((BinaryOp::Add, 10)),
            Some(TokenKind::Minus) => Some((BinaryOp::Sub, 10)),
            Some(TokenKind::Star) => Some((BinaryOp::Mul, 20)),
            Some(TokenKind::Slash) => Some((BinaryOp::Div, 20)),
            Some(TokenKind::Percent) => Some((BinaryOp::Rem, 20)),
            _ => None,
        }
    }

    fn expect_identifier(&mut self, msg: &str) -> Result<Identifier, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => {
                let span = self.advance().span;
                Ok(Identifier { name, span })
            }
            _ => Err(self.error_here(msg)),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, SyntaxError> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!("Expected {:?}", kind)))
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind.clone()) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        matches!(self.peek_kind(), Some(tk) if tk == kind)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind.clone())
    }

    fn advance(&mut self) -> &Token {
        let token = self
            .tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().unwrap());
        self.pos = (self.pos + 1).min(self.tokens.len());
        self.last_span = Some(token.span.start..token.span.end);
        token
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn current_span_start(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.start)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.span.end).unwrap_or(0))
    }

    fn last_span_end(&self, fallback: usize) -> usize {
        self.last_span
            .as_ref()
            .map(|span| span.end)
            .or_else(|| {
                self.tokens
                    .get(self.pos.saturating_sub(1))
                    .map(|t| t.span.end)
            })
            .unwrap_or(fallback)
    }

    fn previous_span(&self) -> Option<Span> {
        if self.pos == 0 {
            None
        } else {
            Some(self.tokens[self.pos - 1].span)
        }
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        let span = self
            .tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or_else(|| {
                self.tokens
                    .last()
                    .map(|t| t.span)
                    .unwrap_or_else(|| Span::new(0, 0))
            });
        SyntaxError::new(message.to_string(), span)
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    fn synchronize_decl(&mut self) {
        while !self.is_eof() {
            match self.peek_kind() {
                Some(TokenKind::Class | TokenKind::Enum) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn synchronize_member(&mut self) {
        while !self.is_eof() {
            match self.peek_kind() {
                Some(TokenKind::Fn | TokenKind::Class | TokenKind::Enum | TokenKind::RBrace) => {
                    return;
                }
                Some(TokenKind::Semi) => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn synchronize_statement(&mut self) {
        while !self.is_eof() {
            match self.peek_kind() {
                Some(TokenKind::Semi) => {
                    self.advance();
                    return;
                }
                Some(TokenKind::RBrace | TokenKind::Let | TokenKind::Return | TokenKind::If
                    | TokenKind::While) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}
