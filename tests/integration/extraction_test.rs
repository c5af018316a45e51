// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{context_for, fields, offline_session, BASE_URL};
use scraperule::domain::models::document::Document;
use scraperule::domain::models::source::Source;
use scraperule::domain::rules::selector::CompiledRule;

#[test]
fn test_selector_properties() {
    let session = offline_session(Source::new("s", BASE_URL));
    let service = session.service();
    let ctx = context_for(&session);

    let title = Document::detect(r#"<div id="title">Hello</div>"#);
    assert_eq!(service.extract_field(&title, "id.title", &ctx), "Hello");

    let link = Document::detect(r#"<a href="/x">t</a>"#);
    assert_eq!(service.extract_field(&link, "a@href", &ctx), "https://example.com/x");

    let price = Document::detect(r#"<span class="price">¥12.50</span>"#);
    assert_eq!(service.extract_field(&price, r".price##\d+", &ctx), "12");

    let alt = Document::detect(r#"<b class="y">Z</b>"#);
    assert_eq!(service.extract_field(&alt, "class.x||class.y", &ctx), "Z");

    assert_eq!(service.extract_field(&title, "id.title@@text", &ctx), "Hello");
    assert_eq!(service.extract_field(&title, "@@", &ctx), "");
}

#[test]
fn test_url_normalization_leaves_absolute_and_non_url_values() {
    let session = offline_session(Source::new("s", BASE_URL));
    let service = session.service();
    let ctx = context_for(&session);
    let doc = Document::detect(
        r#"<a id="abs" href="http://other.com/a" title="/not-a-url">x</a>
           <img id="data" src="data:image/png;base64,AAAA">
           <img id="proto" src="//cdn.example.com/i.png">"#,
    );
    assert_eq!(service.extract_field(&doc, "id.abs@href", &ctx), "http://other.com/a");
    assert_eq!(service.extract_field(&doc, "id.abs@title", &ctx), "/not-a-url");
    assert_eq!(
        service.extract_field(&doc, "id.data@src", &ctx),
        "data:image/png;base64,AAAA"
    );
    assert_eq!(
        service.extract_field(&doc, "id.proto@src", &ctx),
        "//cdn.example.com/i.png"
    );
}

#[test]
fn test_compilation_is_pure() {
    let rule = "class.list@tag.li.-1@a@href##(\\d+)";
    assert_eq!(CompiledRule::compile(rule), CompiledRule::compile(rule));
}

#[test]
fn test_json_list_example() {
    let session = offline_session(Source::new("s", BASE_URL));
    let doc = Document::detect(r#"{"data":{"list":[{"name":"A"},{"name":"B"}]}}"#);
    let records = session.service().extract_list(
        &doc,
        "$.data.list",
        &fields(&[("name", "$.name")]),
        &context_for(&session),
    );
    let names: Vec<&str> = records.iter().map(|r| r.get("name")).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn test_throwing_item_is_isolated_across_fifty_items() {
    let session = offline_session(Source::new("s", BASE_URL));
    let items: Vec<serde_json::Value> = (1..=50)
        .map(|i| serde_json::json!({"n": i, "name": format!("item-{}", i)}))
        .collect();
    let doc = Document::Json(serde_json::Value::Array(items));
    let rules = fields(&[
        ("name", "$.name"),
        (
            "tag",
            "$.n<js>if (result == '7') { throw new Error('bad item'); } 'tag-' + result</js>",
        ),
    ]);

    let records = session
        .service()
        .extract_list(&doc, "", &rules, &context_for(&session));
    assert_eq!(records.len(), 50);
    for (index, record) in records.iter().enumerate() {
        let n = index + 1;
        assert_eq!(record.get("name"), format!("item-{}", n));
        if n == 7 {
            assert_eq!(record.get("tag"), "");
        } else {
            assert_eq!(record.get("tag"), format!("tag-{}", n));
        }
    }
}

#[test]
fn test_library_helpers_and_templates() {
    let mut source = Source::new("s", BASE_URL);
    source.script_library = Some(
        "function host() { return 'https://m.example.com'; }\nfunction decrypt(v) { return v.split('').reverse().join(''); }"
            .to_string(),
    );
    let session = offline_session(source);
    let service = session.service();
    let ctx = context_for(&session).with_key("k");

    assert_eq!(
        service.resolve_template("{{host()}}/s/{{key}}/{{page}}", &ctx),
        "https://m.example.com/s/k/1"
    );
    let doc = Document::detect(r#"<p id="secret">cba</p>"#);
    assert_eq!(
        service.extract_field(&doc, "id.secret<js>decrypt(result)</js>", &ctx),
        "abc"
    );
}
