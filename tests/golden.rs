//! Golden-file snapshot of a representative multi-feature template.

use goldenfile::Mint;
use indexmap::IndexMap;
use late_template::{Value, Writer};
use std::io::Write;

#[test]
fn multi_feature_template_matches_golden_output() {
    let writer = Writer::new();
    writer.parse(
        "profile",
        "{{if user.active}}\
         Hello, {{user.name}}!\
         {{each user.tags}} #{{$value}}{{/each}}\
         {{else}}\
         {{user.name}} is inactive.\
         {{/if}}",
    );

    let mut user = IndexMap::new();
    user.insert("name".to_string(), Value::from("Ari"));
    user.insert("active".to_string(), Value::Bool(true));
    user.insert("tags".to_string(), Value::from(vec!["rust", "templates"]));
    let mut view = IndexMap::new();
    view.insert("user".to_string(), Value::Object(user));

    let output = writer.render("profile", Value::Object(view)).unwrap();

    let mut mint = Mint::new("tests/goldenfiles");
    let mut golden = mint.new_goldenfile("profile.txt").unwrap();
    writeln!(golden, "{output}").unwrap();
}
