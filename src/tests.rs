use crate::diagnostics::CollectedDiagnostics;
use crate::language::ast::Unit;
use crate::language::interpolate::{
    self,
    scope::{EmptyScopes, UnitScopes},
    splice::Deferred,
};
use crate::language::parser::parse_unit;
use crate::tools::printer::{render_expr, render_unit};

fn rewrite(source: &str) -> (Unit, CollectedDiagnostics) {
    let mut unit = parse_unit(source).expect("parse");
    let scopes = UnitScopes::of(&unit);
    let mut sink = CollectedDiagnostics::new();
    interpolate::rewrite_unit(&mut unit, &scopes, &mut sink);
    (unit, sink)
}

#[test]
fn marker_free_unit_is_untouched() {
    let source = "class Banner {\n    title: text;\n\n    fn plain() -> text {\n        return \"no markers here, just $ and } noise\";\n    }\n}\n";
    let before = render_unit(&parse_unit(source).expect("parse"));
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty());
    assert_eq!(render_unit(&unit), before);
}

#[test]
fn greeting_literal_rewrites_to_ordered_concatenation() {
    let source = "class Customer {\n    name: text;\n    age: int;\n\n    fn greeting() -> text {\n        return \"Hello, ${name}! You are ${age} years old.\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty(), "unexpected: {:?}", sink.entries);
    let rendered = render_unit(&unit);
    assert!(
        rendered.contains(
            r#"return "Hello, " + name + "! You are " + str(age) + " years old.";"#
        ),
        "got:\n{}",
        rendered
    );
}

#[test]
fn adjacent_fragments_concatenate_without_empty_segments() {
    let source = "class Pair {\n    a: text;\n    b: text;\n\n    fn joined() -> text {\n        return \"${a}${b}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty());
    assert!(render_unit(&unit).contains("return a + b;"));
}

#[test]
fn member_index_chain_is_one_fragment() {
    let source = "class Cart {\n    items: []Item;\n\n    fn first_price() -> text {\n        return \"price: ${items[0].price}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty(), "unexpected: {:?}", sink.entries);
    assert!(render_unit(&unit).contains(r#"return "price: " + str(items[0].price);"#));
}

#[test]
fn unresolved_reference_reports_once_and_leaves_literal() {
    let source = "class A {\n    fn f() -> text {\n        return \"${unknown}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert_eq!(sink.entries.len(), 1);
    assert!(sink.entries[0].message.contains("unknown"));
    assert!(render_unit(&unit).contains("${unknown}"));
}

#[test]
fn diagnostics_point_at_the_name_inside_the_literal() {
    let source = "class A { fn f() -> text { return \"${unknown}\"; } }";
    let (_, sink) = rewrite(source);
    let expected = source.find("unknown").expect("marker in source");
    assert_eq!(sink.entries[0].span.start, expected);
    assert_eq!(sink.entries[0].span.end, expected + "unknown".len());
}

#[test]
fn one_bad_literal_does_not_block_the_next() {
    let source = "class A {\n    name: text;\n\n    fn bad() -> text {\n        return \"${missing}\";\n    }\n\n    fn also_bad() -> text {\n        return \"${gone}\";\n    }\n\n    fn good() -> text {\n        return \"hi ${name}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert_eq!(sink.entries.len(), 2);
    let rendered = render_unit(&unit);
    assert!(rendered.contains("${missing}"));
    assert!(rendered.contains("${gone}"));
    assert!(rendered.contains(r#"return "hi " + name;"#));
}

#[test]
fn malformed_literal_is_reported_and_others_still_rewrite() {
    let source = "class A {\n    name: text;\n\n    fn bad() -> text {\n        return \"oops ${name\";\n    }\n\n    fn good() -> text {\n        return \"ok ${name}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert_eq!(sink.entries.len(), 1);
    assert!(sink.entries[0].message.contains("never closed"));
    let rendered = render_unit(&unit);
    assert!(rendered.contains("${name\""));
    assert!(rendered.contains(r#"return "ok " + name;"#));
}

#[test]
fn locals_enter_scope_after_their_own_initializer() {
    let source = "class A {\n    fn f() -> text {\n        let msg: text = \"v=${msg}\";\n        return msg;\n    }\n}\n";
    let (_, sink) = rewrite(source);
    assert_eq!(sink.entries.len(), 1);
    assert!(sink.entries[0].message.contains("msg"));
}

#[test]
fn params_and_later_locals_resolve() {
    let source = "class Greeter {\n    name: text;\n\n    fn hello(name: text) -> text {\n        let count: int = 2;\n        return \"Hi ${name} x${count}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty(), "unexpected: {:?}", sink.entries);
    assert!(render_unit(&unit).contains(r#"return "Hi " + name + " x" + str(count);"#));
}

#[test]
fn inherited_fields_resolve_through_the_provider() {
    let source = "class Person {\n    name: text;\n}\n\nclass Admin : Person {\n    fn tag() -> text {\n        return \"admin ${name}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty(), "unexpected: {:?}", sink.entries);
    assert!(render_unit(&unit).contains(r#"return "admin " + name;"#));
}

#[test]
fn unknown_superclass_contributes_nothing() {
    let mut unit = parse_unit(
        "class Admin : Person {\n    fn tag() -> text {\n        return \"admin ${name}\";\n    }\n}\n",
    )
    .expect("parse");
    let mut sink = CollectedDiagnostics::new();
    interpolate::rewrite_unit(&mut unit, &EmptyScopes, &mut sink);
    assert_eq!(sink.entries.len(), 1);
    assert!(sink.entries[0].message.contains("name"));
}

#[test]
fn enclosing_class_fields_are_visible_in_nested_classes() {
    let source = "class Outer {\n    label: text;\n\n    class Inner {\n        fn show() -> text {\n            return \"(${label})\";\n        }\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty(), "unexpected: {:?}", sink.entries);
    assert!(render_unit(&unit).contains(r#"return "(" + label + ")";"#));
}

#[test]
fn enum_variants_resolve_inside_enum_methods() {
    let source = "enum Color {\n    Red,\n    Green;\n\n    fn describe() -> text {\n        return \"primary: ${Red}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty(), "unexpected: {:?}", sink.entries);
    assert!(render_unit(&unit).contains(r#"return "primary: " + str(Red);"#));
}

#[test]
fn call_to_method_without_return_type_is_invalid() {
    let source = "class Logger {\n    fn log() {\n    }\n\n    fn show() -> text {\n        return \"out ${log()}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert_eq!(sink.entries.len(), 1);
    assert!(sink.entries[0].message.contains("log()"));
    assert!(render_unit(&unit).contains("${log()}"));
}

#[test]
fn method_calls_with_return_types_convert() {
    let source = "class Clock {\n    fn hour() -> int {\n        return 7;\n    }\n\n    fn stamp() -> text {\n        return \"at ${hour()}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty(), "unexpected: {:?}", sink.entries);
    assert!(render_unit(&unit).contains(r#"return "at " + str(hour());"#));
}

#[test]
fn ternary_fragment_stays_one_expression() {
    let source = "class A {\n    age: int;\n\n    fn group() -> text {\n        return \"${age > 17 ? \\\"adult\\\" : \\\"minor\\\"}\";\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty(), "unexpected: {:?}", sink.entries);
    assert!(render_unit(&unit).contains(r#"return age > 17 ? "adult" : "minor";"#));
}

#[test]
fn rewriting_twice_changes_nothing() {
    let source = "class Customer {\n    name: text;\n    age: int;\n\n    fn greeting() -> text {\n        return \"Hello, ${name}! You are ${age} years old.\";\n    }\n}\n";
    let (mut unit, _) = rewrite(source);
    let once = render_unit(&unit);

    let scopes = UnitScopes::of(&unit);
    let mut sink = CollectedDiagnostics::new();
    interpolate::rewrite_unit(&mut unit, &scopes, &mut sink);
    assert!(sink.entries.is_empty());
    assert_eq!(render_unit(&unit), once);

    let mut deferred = Deferred::new();
    let mut sink = CollectedDiagnostics::new();
    interpolate::rewrite_unit_with(&mut unit, &scopes, &mut sink, &mut deferred);
    assert!(deferred.replacements.is_empty());
}

#[test]
fn deferred_backend_records_without_mutating() {
    let source = "class A {\n    name: text;\n\n    fn f() -> text {\n        return \"hi ${name}\";\n    }\n}\n";
    let mut unit = parse_unit(source).expect("parse");
    let before = render_unit(&unit);
    let scopes = UnitScopes::of(&unit);
    let mut sink = CollectedDiagnostics::new();
    let mut deferred = Deferred::new();
    interpolate::rewrite_unit_with(&mut unit, &scopes, &mut sink, &mut deferred);

    assert_eq!(render_unit(&unit), before);
    assert_eq!(deferred.replacements.len(), 1);
    let (span, rewrite) = &deferred.replacements[0];
    let literal_start = source.find("\"hi").expect("literal in source");
    assert_eq!(span.start, literal_start);
    assert_eq!(render_expr(rewrite), r#""hi " + name"#);
}

#[test]
fn rewritten_unit_leaves_the_original_alone() {
    let source = "class A {\n    name: text;\n\n    fn f() -> text {\n        return \"hi ${name}\";\n    }\n}\n";
    let unit = parse_unit(source).expect("parse");
    let scopes = UnitScopes::of(&unit);
    let mut sink = CollectedDiagnostics::new();
    let rewritten = interpolate::rewritten_unit(&unit, &scopes, &mut sink);

    assert!(render_unit(&unit).contains("${name}"));
    assert!(render_unit(&rewritten).contains(r#"return "hi " + name;"#));
}

#[test]
fn rewrite_reaches_literals_in_every_statement_position() {
    let source = "class A {\n    name: text;\n    flag: bool;\n\n    fn f() -> text {\n        let greeting: text = \"hey ${name}\";\n        if flag {\n            greeting = \"yo ${name}\";\n        } else {\n            greeting = \"hello ${name}\";\n        }\n        while flag {\n            check(\"loop ${name}\");\n        }\n        return greeting;\n    }\n\n    fn check(message: text) {\n    }\n}\n";
    let (unit, sink) = rewrite(source);
    assert!(sink.entries.is_empty(), "unexpected: {:?}", sink.entries);
    let rendered = render_unit(&unit);
    assert!(rendered.contains(r#""hey " + name"#));
    assert!(rendered.contains(r#""yo " + name"#));
    assert!(rendered.contains(r#""hello " + name"#));
    assert!(rendered.contains(r#"check("loop " + name);"#));
}

#[test]
fn aggregate_span_matches_the_original_literal() {
    let source = "class A {\n    name: text;\n\n    fn f() -> text {\n        return \"hi ${name}\";\n    }\n}\n";
    let mut unit = parse_unit(source).expect("parse");
    let scopes = UnitScopes::of(&unit);
    let mut sink = CollectedDiagnostics::new();
    let mut deferred = Deferred::new();
    interpolate::rewrite_unit_with(&mut unit, &scopes, &mut sink, &mut deferred);

    let (span, rewrite) = &deferred.replacements[0];
    assert_eq!(rewrite.span(), *span);
}
