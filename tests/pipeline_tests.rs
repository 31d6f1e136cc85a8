//! End-to-end tests: mail file on disk → decoded → filtered → posted to a mock webhook.

use std::path::{Path, PathBuf};

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lookout::config::Config;
use lookout::notify::{EmbedBuilder, WebhookClient};
use lookout::parser::stamps::StampFilter;
use lookout::pipeline::{Outcome, Pipeline};

const WEBHOOK_PATH: &str = "/api/webhooks/1234/secret";

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn pipeline(server: &MockServer, filters: &str) -> Pipeline {
    let client = WebhookClient::new(format!("{}{WEBHOOK_PATH}", server.uri()));
    let builder = EmbedBuilder::new("https://phabricator.wikimedia.org").unwrap();
    Pipeline::new(StampFilter::parse(filters), builder, client)
}

#[tokio::test]
async fn test_task_mail_is_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .and(query_param("wait", "true"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "embeds": [{
                "title": "[Created] T350001: Klaxon fires twice on ack",
                "description": "Klaxon fires twice when the page is acknowledged.\n\nSteps to reproduce are in the linked paste.",
                "url": "https://phabricator.wikimedia.org/T350001",
                "timestamp": "2023-11-14T17:03:12.000Z",
                "color": 0xe67e22,
                "author": {
                    "name": "@rzl",
                    "url": "https://phabricator.wikimedia.org/p/rzl"
                },
                "fields": [
                    {"name": "Status", "value": "Open", "inline": true},
                    {"name": "Assignee", "value": "[@lmata](https://phabricator.wikimedia.org/p/lmata)", "inline": true},
                    {"name": "Tag", "value": "[#ultraviolet](https://phabricator.wikimedia.org/p/ultraviolet)", "inline": true}
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1173982215234510848",
            "channel_id": "42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = pipeline(&server, "tag(#ultraviolet)")
        .handle_create(&fixture("task_created.eml"))
        .await;
    assert_eq!(outcome, Outcome::Delivered("1173982215234510848".to_string()));
}

#[tokio::test]
async fn test_non_matching_filter_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = pipeline(&server, "tag(#infrared), tag(#xray)")
        .handle_create(&fixture("task_created.eml"))
        .await;
    assert_eq!(outcome, Outcome::Ignored);
}

#[tokio::test]
async fn test_other_application_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // Matches the tag filter but is a Differential mail.
    let outcome = pipeline(&server, "tag(#ultraviolet)")
        .handle_create(&fixture("other_application.eml"))
        .await;
    assert_eq!(outcome, Outcome::Ignored);
}

#[tokio::test]
async fn test_empty_filter_forwards_every_task_mail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "7"})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = pipeline(&server, "")
        .handle_create(&fixture("task_created.eml"))
        .await;
    assert_eq!(outcome, Outcome::Delivered("7".to_string()));
}

#[tokio::test]
async fn test_bad_status_drops_the_mail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = pipeline(&server, "")
        .handle_create(&fixture("task_created.eml"))
        .await;
    assert_eq!(outcome, Outcome::Dropped);
}

#[tokio::test]
async fn test_missing_file_is_dropped_without_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = pipeline(&server, "")
        .handle_create(&fixture("does_not_exist.eml"))
        .await;
    assert_eq!(outcome, Outcome::Dropped);
}

#[tokio::test]
async fn test_undecodable_file_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("garbage.eml");
    std::fs::write(&file, "Subject: no content type\r\n\r\nbody\r\n").unwrap();

    let outcome = pipeline(&server, "").handle_create(&file).await;
    assert_eq!(outcome, Outcome::Dropped);
}

#[tokio::test]
async fn test_pipeline_from_config_applies_overrides() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "username": "lookout",
            "avatar_url": "https://example.org/owl.png"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "99"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.webhook.url = Some(format!("{}{WEBHOOK_PATH}", server.uri()));
    config.webhook.username = Some("lookout".to_string());
    config.webhook.avatar_url = Some("https://example.org/owl.png".to_string());
    config.filter.stamps = vec!["tag(#ultraviolet)".to_string()];

    let pipeline = Pipeline::from_config(&config).unwrap();
    let outcome = pipeline.handle_create(&fixture("task_created.eml")).await;
    assert_eq!(outcome, Outcome::Delivered("99".to_string()));
}

#[test]
fn test_pipeline_from_config_requires_webhook() {
    let config = Config::default();
    let err = Pipeline::from_config(&config).unwrap_err();
    assert_eq!(err.tag(), "invalid_config");
}
