pub mod builder;
pub mod fragment;
pub mod scanner;
pub mod scope;
pub mod splice;

use crate::diagnostics::{DiagnosticsSink, Severity};
use crate::language::{ast::*, span::Span};
use builder::ResolvedFragment;
use scope::{Binding, ClassFacts, ScopeContext, ScopeProvider, ValueKind};
use splice::{InPlace, Splice};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Everything that can go wrong while rewriting one literal. All of
/// these are reported to the diagnostics sink; none abort the pass.
#[derive(Clone, Debug, Error)]
pub enum InterpolationError {
    #[error("malformed interpolation: {kind}")]
    Malformed { kind: MalformedKind, span: Span },
    #[error("fragment is not a valid expression: {message}")]
    FragmentSyntax { message: String, span: Span },
    #[error("cannot resolve `{name}` in this scope")]
    UnresolvedReference { name: String, span: Span },
    #[error("result of `{name}` cannot be converted to text")]
    InvalidType { name: String, span: Span },
}

impl InterpolationError {
    pub fn span(&self) -> Span {
        match self {
            InterpolationError::Malformed { span, .. }
            | InterpolationError::FragmentSyntax { span, .. }
            | InterpolationError::UnresolvedReference { span, .. }
            | InterpolationError::InvalidType { span, .. } => *span,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MalformedKind {
    Unterminated,
    EmptyFragment,
    NestedMarker,
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedKind::Unterminated => write!(f, "marker `${{` is never closed"),
            MalformedKind::EmptyFragment => write!(f, "fragment between markers is empty"),
            MalformedKind::NestedMarker => {
                write!(f, "nested interpolation markers are not supported")
            }
        }
    }
}

/// Rewrites every interpolated string literal of the unit in place.
/// Failures are reported through the sink; the affected literal stays
/// as it was and the rest of the unit is still processed.
pub fn rewrite_unit(unit: &mut Unit, scopes: &dyn ScopeProvider, sink: &mut dyn DiagnosticsSink) {
    let mut splicer = InPlace;
    rewrite_unit_with(unit, scopes, sink, &mut splicer);
}

/// Same pass with the splice backend chosen by the caller.
pub fn rewrite_unit_with(
    unit: &mut Unit,
    scopes: &dyn ScopeProvider,
    sink: &mut dyn DiagnosticsSink,
    splicer: &mut dyn Splice,
) {
    let mut rewriter = Rewriter {
        scopes,
        sink,
        splicer,
    };
    let mut ctx = ScopeContext::new();
    let names: Vec<String> = unit.decls.iter().map(|d| d.name().to_string()).collect();
    for name in &names {
        ctx.declare(name, Binding::Type);
    }
    for decl in &mut unit.decls {
        rewriter.rewrite_decl(decl, &mut ctx);
    }
}

/// For callers holding an immutable tree: clones, rewrites the clone,
/// returns it.
pub fn rewritten_unit(
    unit: &Unit,
    scopes: &dyn ScopeProvider,
    sink: &mut dyn DiagnosticsSink,
) -> Unit {
    let mut copy = unit.clone();
    rewrite_unit(&mut copy, scopes, sink);
    copy
}

struct Rewriter<'a> {
    scopes: &'a dyn ScopeProvider,
    sink: &'a mut dyn DiagnosticsSink,
    splicer: &'a mut dyn Splice,
}

impl Rewriter<'_> {
    fn rewrite_decl(&mut self, decl: &mut Decl, ctx: &mut ScopeContext) {
        match decl {
            Decl::Class(class) => self.rewrite_class(class, ctx),
            Decl::Enum(def) => self.rewrite_enum(def, ctx),
        }
    }

    fn rewrite_class(&mut self, class: &mut ClassDef, ctx: &mut ScopeContext) {
        ctx.push_scope();
        // Inherited members go in first so the class's own declarations
        // shadow them, farthest ancestor first.
        let chain = self.superclass_chain(class);
        for facts in chain.iter().rev() {
            for (name, ty) in &facts.fields {
                ctx.declare(name, Binding::Field { ty: ty.clone() });
            }
            for (name, returns) in &facts.methods {
                ctx.declare(
                    name,
                    Binding::Method {
                        returns: returns.clone(),
                    },
                );
            }
        }
        for field in &class.fields {
            ctx.declare(&field.name, Binding::Field {
                ty: field.ty.clone(),
            });
        }
        for method in &class.methods {
            ctx.declare(&method.name, Binding::Method {
                returns: method.returns.clone(),
            });
        }
        for nested in &class.nested {
            ctx.declare(nested.name(), Binding::Type);
        }

        for method in &mut class.methods {
            self.rewrite_method(method, ctx);
        }
        for nested in &mut class.nested {
            self.rewrite_decl(nested, ctx);
        }
        ctx.pop_scope();
    }

    fn rewrite_enum(&mut self, def: &mut EnumDef, ctx: &mut ScopeContext) {
        ctx.push_scope();
        for variant in &def.variants {
            ctx.declare(&variant.name, Binding::Variant {
                enum_name: def.name.clone(),
            });
        }
        for method in &def.methods {
            ctx.declare(&method.name, Binding::Method {
                returns: method.returns.clone(),
            });
        }
        for method in &mut def.methods {
            self.rewrite_method(method, ctx);
        }
        ctx.pop_scope();
    }

    fn superclass_chain(&self, class: &ClassDef) -> Vec<ClassFacts> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(class.name.clone());
        let mut current = class.superclass.as_ref().map(|s| s.name.clone());
        while let Some(name) = current {
            if !visited.insert(name.clone()) {
                break;
            }
            let Some(facts) = self.scopes.class(&name) else {
                break;
            };
            current = facts.superclass.clone();
            chain.push(facts);
        }
        chain
    }

    fn rewrite_method(&mut self, method: &mut MethodDef, ctx: &mut ScopeContext) {
        ctx.push_scope();
        for param in &method.params {
            ctx.declare(&param.name, Binding::Param {
                ty: param.ty.clone(),
            });
        }
        self.rewrite_block(&mut method.body, ctx);
        ctx.pop_scope();
    }

    fn rewrite_block(&mut self, block: &mut Block, ctx: &mut ScopeContext) {
        ctx.push_scope();
        for stmt in &mut block.statements {
            match stmt {
                Statement::Let(stmt) => {
                    // The binding is not visible inside its own
                    // initializer; declare after rewriting it.
                    if let Some(value) = &mut stmt.value {
                        self.rewrite_expr(value, ctx);
                    }
                    ctx.declare(&stmt.name, Binding::Local {
                        ty: stmt.ty.clone(),
                    });
                }
                Statement::Assign(stmt) => {
                    self.rewrite_expr(&mut stmt.target, ctx);
                    self.rewrite_expr(&mut stmt.value, ctx);
                }
                Statement::Expr(stmt) => self.rewrite_expr(&mut stmt.expr, ctx),
                Statement::Return(stmt) => {
                    if let Some(value) = &mut stmt.value {
                        self.rewrite_expr(value, ctx);
                    }
                }
                Statement::If(stmt) => self.rewrite_if(stmt, ctx),
                Statement::While(stmt) => {
                    self.rewrite_expr(&mut stmt.condition, ctx);
                    self.rewrite_block(&mut stmt.body, ctx);
                }
                Statement::Block(block) => self.rewrite_block(block, ctx),
            }
        }
        ctx.pop_scope();
    }

    fn rewrite_if(&mut self, stmt: &mut IfStmt, ctx: &mut ScopeContext) {
        self.rewrite_expr(&mut stmt.condition, ctx);
        self.rewrite_block(&mut stmt.then_branch, ctx);
        match &mut stmt.else_branch {
            Some(ElseBranch::Block(block)) => self.rewrite_block(block, ctx),
            Some(ElseBranch::ElseIf(nested)) => self.rewrite_if(nested, ctx),
            None => {}
        }
    }

    fn rewrite_expr(&mut self, expr: &mut Expr, ctx: &ScopeContext) {
        if let Expr::Literal(Literal::Str(value, span)) = expr {
            let value = value.clone();
            let span = *span;
            if let Some(rewrite) = self.rewrite_literal(&value, span, ctx) {
                self.splicer.splice(expr, rewrite);
            }
            return;
        }
        match expr {
            Expr::Binary { left, right, .. } => {
                self.rewrite_expr(left, ctx);
                self.rewrite_expr(right, ctx);
            }
            Expr::Unary { expr, .. } => self.rewrite_expr(expr, ctx),
            Expr::Ternary {
                condition,
                then_value,
                else_value,
                ..
            } => {
                self.rewrite_expr(condition, ctx);
                self.rewrite_expr(then_value, ctx);
                self.rewrite_expr(else_value, ctx);
            }
            Expr::Call { callee, args, .. } => {
                self.rewrite_expr(callee, ctx);
                for arg in args {
                    self.rewrite_expr(arg, ctx);
                }
            }
            Expr::FieldAccess { base, .. } => self.rewrite_expr(base, ctx),
            Expr::Index { base, index, .. } => {
                self.rewrite_expr(base, ctx);
                self.rewrite_expr(index, ctx);
            }
            Expr::Identifier(_) | Expr::Literal(_) => {}
        }
    }

    /// One literal through the whole pipeline. `None` means the literal
    /// stays as it is, either because it has no markers or because some
    /// stage failed (every failure already reported).
    fn rewrite_literal(&mut self, value: &str, span: Span, ctx: &ScopeContext) -> Option<Expr> {
        // Offset of the value's first byte: just past the opening quote.
        let base = span.start + 1;

        let mut spans = Vec::new();
        for item in scanner::scan(value) {
            match item {
                Ok(s) => spans.push(s),
                Err(InterpolationError::Malformed { kind, span }) => {
                    self.report(InterpolationError::Malformed {
                        kind,
                        span: span.shift(base),
                    });
                    return None;
                }
                Err(other) => {
                    self.report(other);
                    return None;
                }
            }
        }
        if spans.is_empty() {
            return None;
        }

        let mut errors = Vec::new();
        let mut fragments = Vec::new();
        for s in &spans {
            // +2 skips the `${` so fragment offsets are absolute.
            match fragment::parse_fragment(s.text, base + s.start + 2) {
                Ok(expr) => {
                    let kind = scope::resolve_fragment(&expr, ctx, &mut errors);
                    if kind == ValueKind::NoValue {
                        errors.push(InterpolationError::InvalidType {
                            name: describe(&expr),
                            span: expr.span(),
                        });
                    }
                    fragments.push(ResolvedFragment {
                        expr,
                        kind,
                        start: s.start,
                        end: s.end,
                    });
                }
                Err(err) => errors.push(err),
            }
        }
        if !errors.is_empty() {
            for err in errors {
                self.report(err);
            }
            return None;
        }

        Some(builder::build(value, span, base, fragments))
    }

    fn report(&mut self, err: InterpolationError) {
        self.sink.report(Severity::Error, err.to_string(), err.span());
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Call { callee, .. } => match &**callee {
            Expr::Identifier(ident) => format!("{}()", ident.name),
            _ => "the call".to_string(),
        },
        _ => "the fragment".to_string(),
    }
}
