//! Table-driven end-to-end scenarios, one entry per case.

use indexmap::IndexMap;
use late_template::{facade, HostEnv, Value};

fn object(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = IndexMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}

struct Scenario {
    name: &'static str,
    template: &'static str,
    view: fn() -> Value,
    expected: &'static str,
}

fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "plain-interpolation",
            template: "Hello, {{name}}!",
            view: || object(vec![("name", Value::from("World"))]),
            expected: "Hello, World!",
        },
        Scenario {
            name: "if-true-branch",
            template: "{{if x === 1}}A{{else}}B{{/if}}",
            view: || object(vec![("x", Value::from(1i64))]),
            expected: "A",
        },
        Scenario {
            name: "if-false-branch",
            template: "{{if x === 1}}A{{else}}B{{/if}}",
            view: || object(vec![("x", Value::from(2i64))]),
            expected: "B",
        },
        Scenario {
            name: "each-over-array",
            template: "{{each xs}}[{{$index}}:{{$value}}]{{/each}}",
            view: || object(vec![("xs", Value::from(vec![10i64, 20]))]),
            expected: "[0:10][1:20]",
        },
        Scenario {
            name: "each-over-array-of-objects",
            template: "{{each xs}}{{name}}-{{$index}};{{/each}}",
            view: || {
                object(vec![(
                    "xs",
                    Value::Array(vec![
                        object(vec![("name", Value::from("a"))]),
                        object(vec![("name", Value::from("b"))]),
                    ]),
                )])
            },
            expected: "a-0;b-1;",
        },
        Scenario {
            name: "get-section",
            template: "{{get obj}}{{a}}/{{b}}{{/get}}",
            view: || {
                object(vec![(
                    "obj",
                    object(vec![("a", Value::from(1i64)), ("b", Value::from(2i64))]),
                )])
            },
            expected: "1/2",
        },
        Scenario {
            name: "host-global-function-call",
            template: "{{>>String(n)}}",
            view: || object(vec![("n", Value::from(5i64))]),
            expected: "5",
        },
        Scenario {
            name: "logical-and-with-falsy-operand",
            template: "{{if a && b}}y{{/if}}",
            view: || object(vec![("a", Value::Bool(true)), ("b", Value::Bool(false))]),
            expected: "",
        },
    ]
}

#[test]
fn runs_every_scenario() {
    let mut globals = IndexMap::new();
    globals.insert(
        "String".to_string(),
        Value::Function(std::rc::Rc::new(|_this: Option<&Value>, args: &[Value]| {
            args.first().cloned().unwrap_or(Value::Null)
        })),
    );
    facade::set_host_env(HostEnv::new(Value::Object(globals)));

    for scenario in scenarios() {
        facade::parse(scenario.name, scenario.template);
        assert!(facade::exists(scenario.name));
        let rendered = facade::render(scenario.name, (scenario.view)())
            .unwrap_or_else(|err| panic!("scenario '{}' failed: {err}", scenario.name));
        assert_eq!(rendered, scenario.expected, "scenario '{}'", scenario.name);
    }
}
