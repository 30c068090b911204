//! Renders a template file against a JSON view file and prints the result.

use late_template::Value;
use std::fs;
use std::process::ExitCode;

const HELP: &str = "\
late-template-render

USAGE:
    late-template-render --template <FILE> --view <FILE> [--name <NAME>]

OPTIONS:
    --template <FILE>  Template source to parse
    --view <FILE>      JSON document to render the template against
    --name <NAME>      Name to register the template under [default: template]
    -h, --help         Print this message
";

fn main() -> ExitCode {
    env_logger::init();
    let mut args = pico_args::Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        print!("{HELP}");
        return ExitCode::SUCCESS;
    }

    let template_path: String = match args.value_from_str("--template") {
        Ok(path) => path,
        Err(err) => {
            eprintln!("error: {err}\n\n{HELP}");
            return ExitCode::FAILURE;
        }
    };
    let view_path: String = match args.value_from_str("--view") {
        Ok(path) => path,
        Err(err) => {
            eprintln!("error: {err}\n\n{HELP}");
            return ExitCode::FAILURE;
        }
    };
    let name: String = args
        .opt_value_from_str("--name")
        .unwrap_or(None)
        .unwrap_or_else(|| "template".to_string());

    let source = match fs::read_to_string(&template_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: reading '{template_path}': {err}");
            return ExitCode::FAILURE;
        }
    };
    let view_json = match fs::read_to_string(&view_path) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!("error: reading '{view_path}': {err}");
            return ExitCode::FAILURE;
        }
    };
    let view: serde_json::Value = match serde_json::from_str(&view_json) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("error: parsing '{view_path}' as JSON: {err}");
            return ExitCode::FAILURE;
        }
    };

    late_template::facade::parse(&name, &source);
    match late_template::facade::render(&name, Value::from(view)) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
