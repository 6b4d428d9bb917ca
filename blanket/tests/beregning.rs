mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn calculates_lines_and_totals() {
    let (status, body) = common::post_json(
        "/api/beregning",
        json!({
            "varelinjer": [
                {"vareafgiftssats": 1, "mængde": "2"},
                {"vareafgiftssats": 2, "antal": "100"}
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["varelinjer"][0]["varekode"], "007");
    assert_eq!(body["varelinjer"][0]["afgiftssats"], "250,00 kr. pr. liter");
    assert_eq!(body["varelinjer"][0]["afgiftsbeløb"], "500,00");
    assert_eq!(body["varelinjer"][1]["afgiftsbeløb"], "150,00");
    assert_eq!(body["summer"]["sum-afgiftsbeløb"], "650,00");
    assert_eq!(body["summer"]["sum-tillægsafgift"], "500,00");
    assert_eq!(body["summer"]["ekspeditionsgebyr"], "250,00");
    assert_eq!(body["summer"]["sum-total"], "1.400,00");
    assert_eq!(body["fejl"], json!([]));
}

#[tokio::test]
async fn composite_rate_sums_segments() {
    let (status, body) = common::post_json(
        "/api/beregning",
        json!({
            "indførselstilladelse": "IT-42",
            "varelinjer": [{"vareafgiftssats": 3, "fakturabeløb": "80000"}]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // 60 % of the first 50.000 plus 100 % of the remaining 30.000
    assert_eq!(body["varelinjer"][0]["afgiftsbeløb"], "60.000,00");
    assert_eq!(body["varelinjer"][0]["visning"], json!({"mængde": true, "antal": true}));
    assert_eq!(body["fejl"], json!([]));
}

#[tokio::test]
async fn date_moves_lines_to_new_table() {
    let (status, body) = common::post_json(
        "/api/beregning",
        json!({
            "indleveringsdato": "2025-03-01",
            "varelinjer": [
                {"vareafgiftssats": 1, "mængde": "2"},
                {"vareafgiftssats": 6, "mængde": "10"}
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["afgiftstabel"], 2);
    assert_eq!(body["varelinjer"][0]["vareafgiftssats"], 11);
    assert_eq!(body["varelinjer"][0]["afgiftsbeløb"], "550,00");
    assert_eq!(body["varelinjer"][1]["vareafgiftssats"], -1);
    assert_eq!(body["varelinjer"][1]["afgiftsbeløb"], "");
    assert_eq!(body["fejl"][0]["field"], "vareafgiftssats");
    assert_eq!(body["fejl"][0]["line"], 1);
}

#[tokio::test]
async fn reports_missing_inputs_and_import_permit() {
    let (status, body) = common::post_json(
        "/api/beregning",
        json!({
            "varelinjer": [
                {"vareafgiftssats": 1},
                {"vareafgiftssats": 3, "fakturabeløb": "1000"}
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["varelinjer"][0]["afgiftsbeløb"], "");
    let errors = body["fejl"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["field"], "mængde");
    assert_eq!(errors[1]["field"], "indførselstilladelse");
    assert!(errors[1].get("line").is_none());
}

#[tokio::test]
async fn unknown_date_is_unprocessable() {
    let (status, body) = common::post_json(
        "/api/beregning",
        json!({
            "indleveringsdato": "2020-01-01",
            "varelinjer": [{"vareafgiftssats": 1, "mængde": "1"}]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "No tariff table covers 2020-01-01");
}

#[tokio::test]
async fn empty_declaration_is_rejected() {
    let (status, body) = common::post_json("/api/beregning", json!({"varelinjer": []})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Validation error");
}
