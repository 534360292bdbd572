use braid_lang::diagnostics::{self, CollectedDiagnostics};
use braid_lang::language::interpolate::{self, scope::UnitScopes};
use braid_lang::language::parser::parse_unit;
use braid_lang::tools::printer;
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 3 {
        eprintln!("Usage: braid-lang [check|rewrite] <filename.braid>");
        process::exit(1);
    }

    let command = &args[1];
    let filename = &args[2];

    if !filename.ends_with(".braid") {
        eprintln!("Invalid file extension. Only .braid files are allowed.");
        process::exit(1);
    }

    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(err) => {
            diagnostics::report_io_error(Path::new(filename), &err);
            process::exit(1);
        }
    };

    let mut unit = match parse_unit(&source) {
        Ok(unit) => unit,
        Err(errors) => {
            diagnostics::emit_syntax_errors(filename, &source, &errors);
            process::exit(1);
        }
    };

    let scopes = UnitScopes::of(&unit);
    let mut sink = CollectedDiagnostics::new();
    interpolate::rewrite_unit(&mut unit, &scopes, &mut sink);
    diagnostics::emit(filename, &source, &sink.entries);

    match command.as_str() {
        "check" => {
            if sink.has_errors() {
                process::exit(1);
            }
        }
        "rewrite" => {
            if sink.has_errors() {
                process::exit(1);
            }
            print!("{}", printer::render_unit(&unit));
        }
        _ => {
            eprintln!("Invalid command. Usage: braid-lang [check|rewrite] <filename.braid>");
            process::exit(1);
        }
    }
}
