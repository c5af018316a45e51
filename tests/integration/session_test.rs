// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{context_for, offline_session, source_from, BASE_URL};
use scraperule::domain::models::document::Document;
use scraperule::domain::models::source::Source;
use serde_json::json;

#[test]
fn test_concurrent_sessions_do_not_share_variables() {
    let a = offline_session(Source::new("a", BASE_URL));
    let b = offline_session(Source::new("b", BASE_URL));
    let doc = Document::detect("<p>x</p>");

    std::thread::scope(|scope| {
        let left = scope.spawn(|| {
            let ctx = context_for(&a);
            for i in 0..5 {
                a.service()
                    .extract_field(&doc, &format!("<js>java.put('token', 'a-{}')</js>", i), &ctx);
            }
            a.service().extract_field(&doc, "<js>java.get('token')</js>", &ctx)
        });
        let right = scope.spawn(|| {
            let ctx = context_for(&b);
            b.service().extract_field(&doc, "<js>java.put('other', 'b')</js>", &ctx);
            b.service().extract_field(&doc, "<js>java.get('token')</js>", &ctx)
        });

        assert_eq!(left.join().expect("session a thread"), "a-4");
        assert_eq!(right.join().expect("session b thread"), "");
    });

    assert_eq!(a.variables().get("token").as_deref(), Some("a-4"));
    assert!(!a.variables().contains("other"));
    assert_eq!(b.variables().get("other").as_deref(), Some("b"));
    assert!(!b.variables().contains("token"));
}

#[test]
fn test_close_and_drop_clear_variables() {
    let session = offline_session(Source::new("s", BASE_URL));
    let store = session.variables().clone();
    store.put("bookId", "42");
    session.close();
    assert!(store.is_empty());

    let dropped = offline_session(Source::new("s", BASE_URL));
    let store = dropped.variables().clone();
    store.put("bookId", "42");
    drop(dropped);
    assert!(store.is_empty());
}

#[test]
fn test_full_flow_over_markup_source() {
    let session = offline_session(source_from(json!({
        "id": "demo",
        "name": "Demo",
        "baseUrl": BASE_URL,
        "rules": {
            "search": {
                "url": "/search?q={{key}}&p={{page}}",
                "list": "class.result",
                "fields": {"name": "tag.a", "bookUrl": "tag.a@href"}
            },
            "bookInfo": {
                "fields": {"name": "id.name", "tocUrl": "id.toc@href"}
            },
            "toc": {
                "list": "id.chapters@tag.li",
                "fields": {"title": "tag.a", "url": "tag.a@href"}
            },
            "content": {
                "fields": {"content": "id.content@html"}
            }
        }
    })));

    assert_eq!(
        session.search_url("rust", 2).expect("search url"),
        "https://example.com/search?q=rust&p=2"
    );

    let results = session
        .parse_search(
            r#"<div class="result"><a href="/b/1">One</a></div><div class="result"><a href="/b/2">Two</a></div>"#,
            "rust",
        )
        .expect("search results");
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].get("bookUrl"), "https://example.com/b/2");

    let info = session
        .parse_book_info(
            r#"<h1 id="name">One</h1><a id="toc" href="toc.html">TOC</a>"#,
            "https://example.com/b/1/",
        )
        .expect("book info");
    assert_eq!(info.get("name"), "One");
    assert_eq!(info.get("tocUrl"), "https://example.com/b/1/toc.html");

    let chapters = session
        .parse_toc(
            r#"<ul id="chapters"><li><a href="c1">Ch 1</a></li><li><a href="c2">Ch 2</a></li></ul>"#,
            "https://example.com/b/1/",
        )
        .expect("toc");
    let titles: Vec<&str> = chapters.iter().map(|c| c.get("title")).collect();
    assert_eq!(titles, vec!["Ch 1", "Ch 2"]);
    assert_eq!(chapters[0].get("url"), "https://example.com/b/1/c1");
}
