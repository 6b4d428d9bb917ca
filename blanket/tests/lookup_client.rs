//! Contract tests for the counterparty lookup client against a mock registry.

use std::time::Duration;

use blanket::services::lookup_client::{
    lookup_or_warn, CounterpartyLookup, HttpLookupClient, LookupError,
};
use blanket::services::resolver::LookupRequest;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(url: &str) -> LookupRequest {
    LookupRequest {
        role: "afsender".to_string(),
        seq: 1,
        url: url.to_string(),
        filter: vec![
            ("kladde".to_string(), "false".to_string()),
            ("navn".to_string(), "Nuuk".to_string()),
        ],
    }
}

fn client(server: &MockServer) -> HttpLookupClient {
    HttpLookupClient::new(server.uri(), Duration::from_secs(5))
}

#[tokio::test]
async fn lookup_sends_filter_and_decodes_candidates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/afsender"))
        .and(query_param("kladde", "false"))
        .and(query_param("navn", "Nuuk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "items": [
                {"id": 1, "navn": "Nuuk Import", "adresse": "Aqqusinersuaq 1", "postnummer": 3900, "by": "Nuuk"},
                {"id": 2, "navn": "Nuuk Export", "adresse": null}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server).lookup(&request("/api/afsender")).await.unwrap();

    assert_eq!(response.count, 2);
    assert_eq!(response.items[0].display_label(), "Nuuk Import, Aqqusinersuaq 1, 3900 Nuuk");
    assert_eq!(response.items[1].attribute("adresse"), "");
}

#[tokio::test]
async fn server_error_is_reported_as_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/modtager"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client(&server)
        .lookup(&request("/api/modtager"))
        .await
        .unwrap_err();

    assert!(matches!(err, LookupError::Status { status: 500, .. }));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/afsender"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server)
        .lookup(&request("/api/afsender"))
        .await
        .unwrap_err();

    assert!(matches!(err, LookupError::Decode { .. }));
}

#[tokio::test]
async fn failures_are_swallowed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(lookup_or_warn(&client, &request("/api/afsender")).await.is_none());
}

#[tokio::test]
async fn form_folds_lookup_result_into_role_fields() {
    use std::sync::Arc;

    use blanket::models::PageData;
    use blanket::services::form::{DeclarationForm, FormEvent, FormLayout};
    use blanket::services::tariff::TariffEngine;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/afsender"))
        .and(query_param("cvr", "12345678"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "items": [{"id": 5, "navn": "Nuuk Import", "adresse": "Aqqusinersuaq 1", "cvr": 12345678}]
        })))
        .mount(&server)
        .await;

    let page = PageData::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/page_data.json")).unwrap();
    let engine = Arc::new(TariffEngine::from_page(&page, 3));
    let mut form = DeclarationForm::new(engine, &page, FormLayout::default());

    let transition = form
        .apply(FormEvent::FieldChanged {
            name: "afsender_cvr".to_string(),
            value: "12345678".to_string(),
        })
        .unwrap();
    assert_eq!(transition.requests.len(), 1);

    let effects = form.complete_lookups(&client(&server), transition.requests).await;

    assert!(!effects.is_empty());
    assert_eq!(form.value("afsender_navn"), Some("Nuuk Import"));
    assert_eq!(form.value("afsender_adresse"), Some("Aqqusinersuaq 1"));
    assert_eq!(form.value("afsender_cvr"), Some("12345678"));
}
