//! End-to-end runs against mock servers.

use atomizer::config::Settings;
use atomizer::extract::{Fox6, Npr, SelectorExtractor};
use atomizer::feed::{FeedDocument, FetchError, HttpSettings};
use atomizer::pipeline::{self, PipelineError};
use pretty_assertions::assert_eq;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings() -> Settings {
    Settings {
        http: HttpSettings {
            timeout: Duration::from_secs(5),
            feed_retries: 0,
            ..HttpSettings::default()
        },
        ..Settings::default()
    }
}

fn rss(base: &str, stories: &[(&str, &str)]) -> String {
    let items: String = stories
        .iter()
        .map(|(slug, date)| {
            format!(
                "<item><title>Story {slug}</title><guid>{slug}</guid>\
                 <link>{base}/story/{slug}</link><pubDate>{date}</pubDate>\
                 <description>&lt;p&gt;Teaser {slug}&lt;/p&gt;</description></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
<title>Mock News</title><description>Everything</description>
<lastBuildDate>Wed, 03 Jan 2024 12:00:00 GMT</lastBuildDate>
{items}
</channel></rss>"#
    )
}

async fn mount_feed(server: &MockServer, feed_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(feed_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_story(server: &MockServer, slug: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/story/{slug}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

fn entry_ids(xml: &str) -> Vec<String> {
    FeedDocument::parse(xml)
        .unwrap()
        .entries()
        .filter_map(|e| e.child_text("id"))
        .collect()
}

#[tokio::test]
async fn test_npr_drops_entry_whose_story_fails() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/feed.xml",
        rss(
            &base,
            &[
                ("one", "Mon, 01 Jan 2024 08:00:00 GMT"),
                ("two", "Mon, 01 Jan 2024 09:00:00 GMT"),
                ("three", "Mon, 01 Jan 2024 10:00:00 GMT"),
            ],
        ),
    )
    .await;
    mount_story(&server, "one", r#"<a class="audio-module-listen" href="/audio/one.mp3?t=1">Listen</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/story/two"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_story(&server, "three", r#"<a class="audio-module-listen" href="/audio/three.mp3">Listen</a>"#).await;

    let settings = settings();
    let client = pipeline::client_for(&settings, Some("https://www.npr.org")).unwrap();
    let xml = pipeline::run_provider(&client, &[format!("{base}/feed.xml")], &Npr, &settings)
        .await
        .unwrap();

    assert_eq!(entry_ids(&xml), vec!["one", "three"]);

    let doc = FeedDocument::parse(&xml).unwrap();
    assert_eq!(doc.root().attr("xmlns"), Some("http://www.w3.org/2005/Atom"));
    assert_eq!(doc.root().child_text("title").as_deref(), Some("Mock News"));
    for entry in doc.entries() {
        let id = entry.child_text("id").unwrap();
        let enclosure = entry
            .children_named("link")
            .find(|l| l.attr("rel") == Some("enclosure"))
            .unwrap();
        assert_eq!(enclosure.attr("type"), Some("audio/mpeg"));
        assert_eq!(
            enclosure.attr("href").map(str::to_string),
            Some(format!("{base}/audio/{id}.mp3"))
        );
        assert_eq!(entry.child("summary").unwrap().attr("type"), Some("html"));
    }
}

#[tokio::test]
async fn test_npr_story_without_audio_is_dropped() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/feed.xml",
        rss(&base, &[("quiet", "Mon, 01 Jan 2024 08:00:00 GMT")]),
    )
    .await;
    mount_story(&server, "quiet", "<p>Transcript only</p>").await;

    let settings = settings();
    let client = pipeline::client_for(&settings, None).unwrap();
    let xml = pipeline::run_provider(&client, &[format!("{base}/feed.xml")], &Npr, &settings)
        .await
        .unwrap();

    assert!(entry_ids(&xml).is_empty());
    // Still a complete feed document
    assert_eq!(FeedDocument::parse(&xml).unwrap().root().name, "feed");
}

#[tokio::test]
async fn test_merged_sources_ordered_by_updated() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/a.xml",
        rss(&base, &[("a3", "Wed, 03 Jan 2024 00:00:00 GMT")]),
    )
    .await;
    mount_feed(
        &server,
        "/b.xml",
        rss(
            &base,
            &[
                ("b1", "Mon, 01 Jan 2024 00:00:00 GMT"),
                ("b2", "Tue, 02 Jan 2024 00:00:00 GMT"),
            ],
        ),
    )
    .await;
    for slug in ["a3", "b1", "b2"] {
        mount_story(&server, slug, "<article><p>Body</p></article>").await;
    }

    let settings = settings();
    let client = pipeline::client_for(&settings, None).unwrap();
    let extractor = SelectorExtractor::new("article").unwrap();
    let urls = vec![format!("{base}/a.xml"), format!("{base}/b.xml")];
    let xml = pipeline::run_provider(&client, &urls, &extractor, &settings)
        .await
        .unwrap();

    assert_eq!(entry_ids(&xml), vec!["b1", "b2", "a3"]);
    let doc = FeedDocument::parse(&xml).unwrap();
    for entry in doc.entries() {
        let content = entry.child("content").unwrap();
        assert_eq!(content.attr("type"), Some("xhtml"));
        assert!(content.child("div").unwrap().child("article").is_some());
    }
}

#[tokio::test]
async fn test_fox6_body_and_video_entries() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/rss",
        rss(
            &base,
            &[
                ("text", "Mon, 01 Jan 2024 08:00:00 GMT"),
                ("video", "Mon, 01 Jan 2024 09:00:00 GMT"),
                ("gallery", "Mon, 01 Jan 2024 10:00:00 GMT"),
            ],
        ),
    )
    .await;
    mount_story(
        &server,
        "text",
        r#"<div class="article-content"><p>Words</p><script>ad()</script></div>"#,
    )
    .await;
    mount_story(
        &server,
        "video",
        r#"<script type="application/ld+json">{"video": {"contentUrl": "https://video.example/v.m3u8"}}</script>"#,
    )
    .await;
    mount_story(&server, "gallery", "<div class='gallery'></div>").await;

    let settings = settings();
    let client = pipeline::client_for(&settings, None).unwrap();
    let xml = pipeline::run_provider(&client, &[format!("{base}/rss")], &Fox6, &settings)
        .await
        .unwrap();

    assert_eq!(entry_ids(&xml), vec!["text", "video"]);
    assert!(!xml.contains("ad()"));
    assert!(xml.contains(r#"type="application/x-mpegURL""#));
    assert!(xml.contains("https://video.example/v.m3u8"));
}

#[tokio::test]
async fn test_unreachable_primary_feed_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let settings = settings();
    let client = pipeline::client_for(&settings, None).unwrap();
    let err = pipeline::run_provider(
        &client,
        &[format!("{}/missing.xml", server.uri())],
        &Npr,
        &settings,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Fetch {
            source: FetchError::HttpStatus(404),
            ..
        }
    ));
}

#[tokio::test]
async fn test_feed_without_channel_is_fatal() {
    let server = MockServer::start().await;
    mount_feed(&server, "/bad.xml", r#"<rss version="2.0"></rss>"#.to_string()).await;

    let settings = settings();
    let client = pipeline::client_for(&settings, None).unwrap();
    let err = pipeline::build_feed(&client, &[format!("{}/bad.xml", server.uri())])
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Convert { .. }));
}

#[tokio::test]
async fn test_broken_secondary_feed_is_fatal() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(&server, "/good.xml", rss(&base, &[("g1", "Mon, 01 Jan 2024 00:00:00 GMT")])).await;
    mount_feed(&server, "/page.html", "<html><body/></html>".to_string()).await;

    let settings = settings();
    let client = pipeline::client_for(&settings, None).unwrap();
    let urls = vec![format!("{base}/good.xml"), format!("{base}/page.html")];
    let err = pipeline::build_feed(&client, &urls).await.unwrap_err();
    match err {
        PipelineError::Convert { origin, .. } => assert_eq!(origin, format!("{base}/page.html")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_max_age_drops_old_entries_before_fetching() {
    let server = MockServer::start().await;
    let base = server.uri();
    let recent = chrono::Utc::now().to_rfc2822();
    mount_feed(
        &server,
        "/feed.xml",
        rss(
            &base,
            &[("old", "Mon, 01 Jan 2001 00:00:00 GMT"), ("new", recent.as_str())],
        ),
    )
    .await;
    mount_story(&server, "new", "<article>fresh</article>").await;
    // Never requested: the entry is removed before enrichment
    Mock::given(method("GET"))
        .and(path("/story/old"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<article>stale</article>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut settings = settings();
    settings.max_age_days = 7;
    let client = pipeline::client_for(&settings, None).unwrap();
    let extractor = SelectorExtractor::new("article").unwrap();
    let xml = pipeline::run_provider(&client, &[format!("{base}/feed.xml")], &extractor, &settings)
        .await
        .unwrap();

    assert_eq!(entry_ids(&xml), vec!["new"]);
}
