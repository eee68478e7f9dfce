//! Integration tests for query evaluation and the search daemon's
//! request handling.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::Mutex;
use url::Url;

use gemplex::config::Config;
use gemplex::index::load_initial;
use gemplex::parse::Page;
use gemplex::rank::run_rank_pass;
use gemplex::search::{respond, search_pages, PAGE_SIZE};
use gemplex::storage::{ImageRecord, Store, SuccessfulVisit};
use gemplex::Engine;

fn test_engine(dir: &TempDir) -> Arc<Engine> {
    let mut config = Config::default();
    config.db.path = dir.path().join("gemplex.db").to_string_lossy().into_owned();
    config.index.path = dir.path().join("index").to_string_lossy().into_owned();
    std::fs::create_dir_all(&config.index.path).unwrap();
    Engine::shared(config)
}

fn record_page(store: &mut Store, url: &str, title: &str, text: &str, kind: &str) {
    store.seed_url(&Url::parse(url).unwrap()).unwrap();
    store
        .record_successful_visit(&SuccessfulVisit {
            url: url.to_string(),
            status_code: 20,
            page: Page {
                text: text.to_string(),
                title: title.to_string(),
                kind: kind.to_string(),
                ..Page::default()
            },
            contents: format!("{}|{}", url, text).into_bytes(),
            content_type: "text/gemini".to_string(),
            content_type_args: String::new(),
            visited_at: Store::now(),
        })
        .unwrap();
}

fn set_ranks(store: &mut Store, ranks: &[(&str, f64)]) {
    let id_ranks: Vec<(i64, f64)> = ranks
        .iter()
        .map(|(url, rank)| (store.get_url(url).unwrap().unwrap().id, *rank))
        .collect();
    store.write_url_ranks(&id_ranks).unwrap();

    let mut hosts: Vec<(String, f64)> = ranks
        .iter()
        .map(|(url, _)| {
            (
                Url::parse(url).unwrap().host_str().unwrap().to_string(),
                1.0,
            )
        })
        .collect();
    hosts.dedup();
    store.write_host_ranks(&hosts).unwrap();
}

#[test]
fn equal_relevance_orders_by_url_rank() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let mut store = Store::open(Path::new(&engine.config.db.path)).unwrap();

    // identical content, so raw relevance matches; ranks differ
    record_page(
        &mut store,
        "gemini://low.example/",
        "first page",
        "shared words sit here",
        "",
    );
    record_page(
        &mut store,
        "gemini://high.example/",
        "second page",
        "shared words sit here",
        "",
    );
    set_ranks(
        &mut store,
        &[("gemini://low.example/", 0.1), ("gemini://high.example/", 0.9)],
    );

    load_initial(&engine, &store).unwrap();
    let live = engine.alias.current().unwrap();

    let response = search_pages(&live, "shared", 1, "gem").unwrap();
    assert_eq!(response.total_results, 2);
    assert_eq!(response.results[0].url, "gemini://high.example/");
    assert_eq!(response.results[1].url, "gemini://low.example/");
    assert!(response.results[0].url_rank > response.results[1].url_rank);
}

#[test]
fn title_hit_outranks_content_hit() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let mut store = Store::open(Path::new(&engine.config.db.path)).unwrap();

    record_page(
        &mut store,
        "gemini://title.example/",
        "orchid cultivation",
        "a page about flowers",
        "",
    );
    record_page(
        &mut store,
        "gemini://content.example/",
        "some other page",
        "a page mentioning orchid once",
        "",
    );
    set_ranks(
        &mut store,
        &[
            ("gemini://title.example/", 0.5),
            ("gemini://content.example/", 0.5),
        ],
    );

    load_initial(&engine, &store).unwrap();
    let live = engine.alias.current().unwrap();

    let response = search_pages(&live, "orchid", 1, "gem").unwrap();
    assert_eq!(response.total_results, 2);
    assert_eq!(response.results[0].url, "gemini://title.example/");
}

#[test]
fn excluded_kinds_never_match() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let mut store = Store::open(Path::new(&engine.config.db.path)).unwrap();

    record_page(
        &mut store,
        "gemini://page.example/",
        "a gemlog post",
        "tulip gardening notes",
        "",
    );
    record_page(
        &mut store,
        "gemini://list.example/mail/1",
        "tulip thread",
        "tulip mailing list message",
        "email",
    );
    record_page(
        &mut store,
        "gemini://rfc.example/rfc/1",
        "RFC 1 - tulips",
        "tulip request for comments",
        "rfc",
    );
    set_ranks(
        &mut store,
        &[
            ("gemini://page.example/", 0.5),
            ("gemini://list.example/mail/1", 0.5),
            ("gemini://rfc.example/rfc/1", 0.5),
        ],
    );

    load_initial(&engine, &store).unwrap();
    let live = engine.alias.current().unwrap();

    let response = search_pages(&live, "tulip", 1, "gem").unwrap();
    assert_eq!(response.total_results, 1);
    assert_eq!(response.results[0].url, "gemini://page.example/");
}

#[test]
fn snippets_use_gem_highlighting() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let mut store = Store::open(Path::new(&engine.config.db.path)).unwrap();

    record_page(
        &mut store,
        "gemini://page.example/",
        "a page",
        "nothing to see but a peculiar word here",
        "",
    );
    set_ranks(&mut store, &[("gemini://page.example/", 0.5)]);

    load_initial(&engine, &store).unwrap();
    let live = engine.alias.current().unwrap();

    let response = search_pages(&live, "peculiar", 1, "gem").unwrap();
    assert_eq!(response.total_results, 1);
    assert!(response.results[0].snippet.contains("[[peculiar]]"));
}

#[test]
fn page_zero_is_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let mut store = Store::open(Path::new(&engine.config.db.path)).unwrap();
    record_page(&mut store, "gemini://page.example/", "t", "text", "");
    set_ranks(&mut store, &[("gemini://page.example/", 0.5)]);
    load_initial(&engine, &store).unwrap();
    let live = engine.alias.current().unwrap();

    assert!(search_pages(&live, "text", 0, "gem").is_err());
}

#[test]
fn result_pages_are_capped() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let mut store = Store::open(Path::new(&engine.config.db.path)).unwrap();

    let urls: Vec<String> = (0..20)
        .map(|i| format!("gemini://cap.example/p{}", i))
        .collect();
    for url in &urls {
        record_page(&mut store, url, "common title", "common text body", "");
    }
    let ranks: Vec<(&str, f64)> = urls.iter().map(|u| (u.as_str(), 0.5)).collect();
    set_ranks(&mut store, &ranks);

    load_initial(&engine, &store).unwrap();
    let live = engine.alias.current().unwrap();

    let first = search_pages(&live, "common", 1, "gem").unwrap();
    assert_eq!(first.total_results, 20);
    assert_eq!(first.results.len(), PAGE_SIZE);

    let second = search_pages(&live, "common", 2, "gem").unwrap();
    assert_eq!(second.results.len(), 20 - PAGE_SIZE);
}

#[tokio::test]
async fn daemon_rejects_malformed_requests() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let store = Mutex::new(Store::open(Path::new(&engine.config.db.path)).unwrap());

    let reply = respond(&engine, &store, "this is not json").await;
    assert_eq!(reply, r#"{"err":"bad request"}"#);
}

#[tokio::test]
async fn daemon_rejects_empty_query() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let store = Mutex::new(Store::open(Path::new(&engine.config.db.path)).unwrap());

    let reply = respond(&engine, &store, r#"{"t":"search","q":""}"#).await;
    assert_eq!(reply, r#"{"err":"no query"}"#);
}

#[tokio::test]
async fn daemon_rejects_page_zero() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let mut store = Store::open(Path::new(&engine.config.db.path)).unwrap();
    record_page(&mut store, "gemini://page.example/", "t", "text", "");
    set_ranks(&mut store, &[("gemini://page.example/", 0.5)]);
    load_initial(&engine, &store).unwrap();

    let store = Mutex::new(store);
    let reply = respond(&engine, &store, r#"{"q":"text","page":0}"#).await;
    assert!(reply.contains("\"err\""));
    assert!(reply.contains("page number"));
}

#[tokio::test]
async fn daemon_answers_well_formed_search() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let mut store = Store::open(Path::new(&engine.config.db.path)).unwrap();
    record_page(
        &mut store,
        "gemini://page.example/",
        "greetings",
        "Hello out there",
        "",
    );
    set_ranks(&mut store, &[("gemini://page.example/", 0.5)]);
    load_initial(&engine, &store).unwrap();

    let store = Mutex::new(store);
    let reply = respond(&engine, &store, r#"{"t":"search","q":"Hello"}"#).await;
    let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(parsed["n"], 1);
    assert_eq!(parsed["results"][0]["url"], "gemini://page.example/");
    assert!(parsed.get("err").is_none());
}

#[tokio::test]
async fn daemon_serves_images_from_the_store() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let mut store = Store::open(Path::new(&engine.config.db.path)).unwrap();
    store
        .insert_image(
            &ImageRecord {
                image_hash: "hash-1".to_string(),
                image: "encoded-bytes".to_string(),
                alt: "an etching of a fox".to_string(),
                fetch_time: Store::now(),
                url: "gemini://img.example/fox".to_string(),
            },
            "content-hash",
        )
        .unwrap();

    let store = Mutex::new(store);

    let reply = respond(&engine, &store, r#"{"t":"randimg"}"#).await;
    let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(parsed["image_id"], "hash-1");

    let reply = respond(&engine, &store, r#"{"t":"getimg","id":"hash-1"}"#).await;
    let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(parsed["alt"], "an etching of a fox");

    let reply = respond(&engine, &store, r#"{"t":"getimg","id":"nope"}"#).await;
    assert!(reply.contains("\"err\""));
}

#[tokio::test]
async fn daemon_rejects_unknown_request_type() {
    let dir = TempDir::new().unwrap();
    let engine = test_engine(&dir);
    let store = Mutex::new(Store::open(Path::new(&engine.config.db.path)).unwrap());

    let reply = respond(&engine, &store, r#"{"t":"frobnicate"}"#).await;
    assert!(reply.contains("unknown request type"));
}
