use super::InterpolationError;
use crate::language::ast::*;
use std::collections::HashMap;

/// What a name in scope refers to.
#[derive(Clone, Debug)]
pub enum Binding {
    Local { ty: Option<TypeExpr> },
    Param { ty: TypeExpr },
    Field { ty: TypeExpr },
    Variant { enum_name: String },
    Method { returns: Option<TypeExpr> },
    Type,
}

impl Binding {
    fn value_kind(&self) -> ValueKind {
        match self {
            Binding::Local { ty: Some(ty) } => ValueKind::Known(ty.clone()),
            Binding::Local { ty: None } => ValueKind::Unknown,
            Binding::Param { ty } => ValueKind::Known(ty.clone()),
            Binding::Field { ty } => ValueKind::Known(ty.clone()),
            Binding::Variant { enum_name } => {
                ValueKind::Known(TypeExpr::Named(enum_name.clone()))
            }
            Binding::Method { .. } | Binding::Type => ValueKind::Unknown,
        }
    }
}

/// Shallow result type of a fragment, used only to decide whether the
/// rewrite needs a `str(..)` conversion. Not a type checker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Known(TypeExpr),
    NoValue,
    Unknown,
}

/// Stack of binding maps, innermost last. Lookup walks outward; the
/// innermost binding shadows the rest of the chain.
#[derive(Debug)]
pub struct ScopeContext {
    scopes: Vec<HashMap<String, Binding>>,
}

impl ScopeContext {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        if self.scopes.is_empty() {
            self.scopes.push(HashMap::new());
        }
    }

    pub fn declare(&mut self, name: &str, binding: Binding) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), binding);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.get(name) {
                return Some(binding);
            }
        }
        None
    }
}

/// Declared surface of one class, as the engine needs it for inherited
/// member lookup. Owned so a provider never borrows the tree being
/// rewritten.
#[derive(Clone, Debug, Default)]
pub struct ClassFacts {
    pub superclass: Option<String>,
    pub fields: Vec<(String, TypeExpr)>,
    pub methods: Vec<(String, Option<TypeExpr>)>,
}

impl ClassFacts {
    pub fn of(def: &ClassDef) -> Self {
        Self {
            superclass: def.superclass.as_ref().map(|s| s.name.clone()),
            fields: def
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.ty.clone()))
                .collect(),
            methods: def
                .methods
                .iter()
                .map(|m| (m.name.clone(), m.returns.clone()))
                .collect(),
        }
    }
}

/// Answers class lookups for inherited member resolution. Passed into
/// the engine explicitly; there is no ambient registry.
pub trait ScopeProvider {
    fn class(&self, name: &str) -> Option<ClassFacts>;
}

/// Provider indexing every class of one unit, nested classes included.
#[derive(Debug, Default)]
pub struct UnitScopes {
    classes: HashMap<String, ClassFacts>,
}

impl UnitScopes {
    pub fn of(unit: &Unit) -> Self {
        let mut classes = HashMap::new();
        collect_classes(&unit.decls, &mut classes);
        Self { classes }
    }
}

fn collect_classes(decls: &[Decl], classes: &mut HashMap<String, ClassFacts>) {
    for decl in decls {
        if let Decl::Class(def) = decl {
            classes
                .entry(def.name.clone())
                .or_insert_with(|| ClassFacts::of(def));
            collect_classes(&def.nested, classes);
        }
    }
}

impl ScopeProvider for UnitScopes {
    fn class(&self, name: &str) -> Option<ClassFacts> {
        self.classes.get(name).cloned()
    }
}

/// Provider that knows nothing; superclass names resolve to no members.
pub struct EmptyScopes;

impl ScopeProvider for EmptyScopes {
    fn class(&self, _name: &str) -> Option<ClassFacts> {
        None
    }
}

/// Checks every free name in the fragment against the scope chain and
/// returns the fragment's shallow value kind. Unresolved names are all
/// collected; resolution never stops at the first failure.
pub fn resolve_fragment(
    expr: &Expr,
    ctx: &ScopeContext,
    errors: &mut Vec<InterpolationError>,
) -> ValueKind {
    match expr {
        Expr::Identifier(ident) => match ctx.lookup(&ident.name) {
            Some(binding) => binding.value_kind(),
            None => {
                errors.push(InterpolationError::UnresolvedReference {
                    name: ident.name.clone(),
                    span: ident.span,
                });
                ValueKind::Unknown
            }
        },
        Expr::Literal(lit) => ValueKind::Known(match lit {
            Literal::Int(..) => TypeExpr::Int,
            Literal::Float(..) => TypeExpr::Float,
            Literal::Bool(..) => TypeExpr::Bool,
            Literal::Str(..) => TypeExpr::Text,
        }),
        Expr::Unary { op, expr, .. } => {
            let inner = resolve_fragment(expr, ctx, errors);
            match op {
                UnaryOp::Not => ValueKind::Known(TypeExpr::Bool),
                UnaryOp::Neg => inner,
            }
        }
        Expr::Binary {
            op, left, right, ..
        } => {
            let l = resolve_fragment(left, ctx, errors);
            let r = resolve_fragment(right, ctx, errors);
            match op {
                BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::And
                | BinaryOp::Or => ValueKind::Known(TypeExpr::Bool),
                _ if l == r => l,
                _ => ValueKind::Unknown,
            }
        }
        Expr::Ternary {
            condition,
            then_value,
            else_value,
            ..
        } => {
            resolve_fragment(condition, ctx, errors);
            let t = resolve_fragment(then_value, ctx, errors);
            let e = resolve_fragment(else_value, ctx, errors);
            if t == e {
                t
            } else {
                ValueKind::Unknown
            }
        }
        Expr::Call { callee, args, .. } => {
            for arg in args {
                resolve_fragment(arg, ctx, errors);
            }
            match &**callee {
                Expr::Identifier(ident) => {
                    if ident.name == "str" {
                        return ValueKind::Known(TypeExpr::Text);
                    }
                    match ctx.lookup(&ident.name) {
                        Some(Binding::Method { returns }) => match returns {
                            Some(ty) => ValueKind::Known(ty.clone()),
                            None => ValueKind::NoValue,
                        },
                        Some(_) => ValueKind::Unknown,
                        None => {
                            errors.push(InterpolationError::UnresolvedReference {
                                name: ident.name.clone(),
                                span: ident.span,
                            });
                            ValueKind::Unknown
                        }
                    }
                }
                other => {
                    resolve_fragment(other, ctx, errors);
                    ValueKind::Unknown
                }
            }
        }
        Expr::FieldAccess { base, .. } => {
            resolve_fragment(base, ctx, errors);
            ValueKind::Unknown
        }
        Expr::Index { base, index, .. } => {
            let b = resolve_fragment(base, ctx, errors);
            resolve_fragment(index, ctx, errors);
            match b {
                ValueKind::Known(TypeExpr::List(elem)) => ValueKind::Known(*elem),
                _ => ValueKind::Unknown,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_expression_source;

    fn ctx_with(bindings: &[(&str, Binding)]) -> ScopeContext {
        let mut ctx = ScopeContext::new();
        for (name, binding) in bindings {
            ctx.declare(name, binding.clone());
        }
        ctx
    }

    #[test]
    fn innermost_binding_shadows_outer() {
        let mut ctx = ScopeContext::new();
        ctx.declare("x", Binding::Field { ty: TypeExpr::Int });
        ctx.push_scope();
        ctx.declare("x", Binding::Local {
            ty: Some(TypeExpr::Text),
        });
        assert!(matches!(
            ctx.lookup("x"),
            Some(Binding::Local {
                ty: Some(TypeExpr::Text)
            })
        ));
        ctx.pop_scope();
        assert!(matches!(ctx.lookup("x"), Some(Binding::Field { .. })));
    }

    #[test]
    fn unresolved_name_is_collected_with_its_span() {
        let ctx = ScopeContext::new();
        let expr = parse_expression_source("unknown").expect("parse");
        let mut errors = Vec::new();
        resolve_fragment(&expr, &ctx, &mut errors);
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            InterpolationError::UnresolvedReference { name, span } => {
                assert_eq!(name, "unknown");
                assert_eq!(span.start, 0);
                assert_eq!(span.end, 7);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn every_free_name_in_a_fragment_is_checked() {
        let ctx = ctx_with(&[("b", Binding::Field { ty: TypeExpr::Int })]);
        let expr = parse_expression_source("a + b + c").expect("parse");
        let mut errors = Vec::new();
        resolve_fragment(&expr, &ctx, &mut errors);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn member_names_are_not_free_names() {
        let ctx = ctx_with(&[(
            "items",
            Binding::Field {
                ty: TypeExpr::List(Box::new(TypeExpr::Named("Item".into()))),
            },
        )]);
        let expr = parse_expression_source("items[0].price").expect("parse");
        let mut errors = Vec::new();
        resolve_fragment(&expr, &ctx, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn list_indexing_narrows_to_the_element_type() {
        let ctx = ctx_with(&[(
            "names",
            Binding::Field {
                ty: TypeExpr::List(Box::new(TypeExpr::Text)),
            },
        )]);
        let expr = parse_expression_source("names[0]").expect("parse");
        let mut errors = Vec::new();
        let kind = resolve_fragment(&expr, &ctx, &mut errors);
        assert_eq!(kind, ValueKind::Known(TypeExpr::Text));
    }

    #[test]
    fn call_to_method_without_return_type_has_no_value() {
        let ctx = ctx_with(&[("log", Binding::Method { returns: None })]);
        let expr = parse_expression_source("log()").expect("parse");
        let mut errors = Vec::new();
        let kind = resolve_fragment(&expr, &ctx, &mut errors);
        assert_eq!(kind, ValueKind::NoValue);
        assert!(errors.is_empty());
    }

    #[test]
    fn builtin_str_is_always_in_scope() {
        let ctx = ctx_with(&[("age", Binding::Field { ty: TypeExpr::Int })]);
        let expr = parse_expression_source("str(age)").expect("parse");
        let mut errors = Vec::new();
        let kind = resolve_fragment(&expr, &ctx, &mut errors);
        assert_eq!(kind, ValueKind::Known(TypeExpr::Text));
        assert!(errors.is_empty());
    }

    #[test]
    fn ternary_joins_matching_branch_kinds() {
        let ctx = ctx_with(&[("age", Binding::Field { ty: TypeExpr::Int })]);
        let expr = parse_expression_source("age > 17 ? \"adult\" : \"minor\"").expect("parse");
        let mut errors = Vec::new();
        let kind = resolve_fragment(&expr, &ctx, &mut errors);
        assert_eq!(kind, ValueKind::Known(TypeExpr::Text));
    }

    #[test]
    fn unit_scopes_index_nested_classes() {
        let unit = crate::language::parser::parse_unit(
            "class Outer { class Inner { tag: text; } }",
        )
        .expect("parse");
        let scopes = UnitScopes::of(&unit);
        assert!(scopes.class("Inner").is_some());
        assert!(scopes.class("Outer").is_some());
        assert!(scopes.class("Missing").is_none());
    }
}
