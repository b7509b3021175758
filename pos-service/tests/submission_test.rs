mod common;

use common::TestApp;
use pos_service::fiscal::SuccessRule;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn seed_submittable_invoice(app: &TestApp) -> (i64, String) {
    let product_id = app.seed_product("Nshima", 9.0, "A").await;
    let order_id = app.seed_order(&[(product_id, 2, 9.0)], 18.0, 2.48, 0.0).await;
    app.seed_invoice(order_id).await
}

#[tokio::test]
async fn accepted_submission_yields_success_and_log_entry() {
    let authority = MockServer::start().await;
    let app = TestApp::spawn(&authority.uri()).await;

    Mock::given(method("POST"))
        .and(path("/trnsSales/saveSales"))
        .and(header("TPIN", "1000000000"))
        .and(header("BhfId", "000"))
        .and(header("DeviceSerialNo", "TEST-DEV-001"))
        .and(header("x-api-key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultCd": "0000",
            "resultMsg": "Invoice submitted successfully to Tax Authority.",
            "authorityReferenceId": "TA_REF_123456"
        })))
        .expect(1)
        .mount(&authority)
        .await;

    let (invoice_id, invoice_number) = seed_submittable_invoice(&app).await;

    let response = app
        .client
        .post(format!("{}/invoices/{}/submit", app.address, invoice_id))
        .send()
        .await
        .expect("submit request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("submit body");
    assert_eq!(body["status"], "SUCCESS");
    assert_eq!(body["authority_reference"], "TA_REF_123456");

    let log = app
        .client
        .get(format!("{}/submissions/{}", app.address, invoice_number))
        .send()
        .await
        .expect("log request");
    assert_eq!(log.status(), 200);
    let log_body: serde_json::Value = log.json().await.expect("log body");
    assert_eq!(log_body["status"], "SUCCESS");
    assert_eq!(log_body["response"]["resultCd"], "0000");

    app.cleanup().await;
}

#[tokio::test]
async fn rejected_submission_is_error_with_no_retry() {
    let authority = MockServer::start().await;
    let app = TestApp::spawn(&authority.uri()).await;

    Mock::given(method("POST"))
        .and(path("/trnsSales/saveSales"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"detail": "Rejected by mock authority"})),
        )
        .expect(1)
        .mount(&authority)
        .await;

    let (invoice_id, invoice_number) = seed_submittable_invoice(&app).await;

    let response = app
        .client
        .post(format!("{}/invoices/{}/submit", app.address, invoice_id))
        .send()
        .await
        .expect("submit request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("submit body");
    assert_eq!(body["status"], "ERROR");
    assert!(body["message"]
        .as_str()
        .expect("message")
        .contains("HTTP 400"));

    let log: serde_json::Value = app
        .client
        .get(format!("{}/submissions/{}", app.address, invoice_number))
        .send()
        .await
        .expect("log request")
        .json()
        .await
        .expect("log body");
    assert_eq!(log["status"], "ERROR");

    app.cleanup().await;
}

#[tokio::test]
async fn unavailable_authority_attempts_three_times_then_errors() {
    let authority = MockServer::start().await;
    let app = TestApp::spawn(&authority.uri()).await;

    Mock::given(method("POST"))
        .and(path("/trnsSales/saveSales"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&authority)
        .await;

    let (invoice_id, _) = seed_submittable_invoice(&app).await;

    let response = app
        .client
        .post(format!("{}/invoices/{}/submit", app.address, invoice_id))
        .send()
        .await
        .expect("submit request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("submit body");
    assert_eq!(body["status"], "ERROR");
    assert!(body["message"]
        .as_str()
        .expect("message")
        .contains("retries exhausted"));

    app.cleanup().await;
}

#[tokio::test]
async fn resubmission_overwrites_previous_outcome() {
    let authority = MockServer::start().await;
    let app = TestApp::spawn(&authority.uri()).await;

    // First submission is rejected; once the rejection mock is spent, the
    // acceptance mock below answers.
    Mock::given(method("POST"))
        .and(path("/trnsSales/saveSales"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "bad invoice"})))
        .up_to_n_times(1)
        .mount(&authority)
        .await;
    Mock::given(method("POST"))
        .and(path("/trnsSales/saveSales"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resultCd": "0000"})))
        .mount(&authority)
        .await;

    let (invoice_id, invoice_number) = seed_submittable_invoice(&app).await;
    let submit_url = format!("{}/invoices/{}/submit", app.address, invoice_id);

    let first: serde_json::Value = app
        .client
        .post(&submit_url)
        .send()
        .await
        .expect("first submit")
        .json()
        .await
        .expect("first body");
    assert_eq!(first["status"], "ERROR");

    let second: serde_json::Value = app
        .client
        .post(&submit_url)
        .send()
        .await
        .expect("second submit")
        .json()
        .await
        .expect("second body");
    assert_eq!(second["status"], "SUCCESS");

    // Lookup resolves to the latest outcome.
    let log: serde_json::Value = app
        .client
        .get(format!("{}/submissions/{}", app.address, invoice_number))
        .send()
        .await
        .expect("log request")
        .json()
        .await
        .expect("log body");
    assert_eq!(log["status"], "SUCCESS");

    app.cleanup().await;
}

#[tokio::test]
async fn unparseable_success_body_is_still_success() {
    let authority = MockServer::start().await;
    let app = TestApp::spawn(&authority.uri()).await;

    Mock::given(method("POST"))
        .and(path("/trnsSales/saveSales"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&authority)
        .await;

    let (invoice_id, invoice_number) = seed_submittable_invoice(&app).await;

    let body: serde_json::Value = app
        .client
        .post(format!("{}/invoices/{}/submit", app.address, invoice_id))
        .send()
        .await
        .expect("submit request")
        .json()
        .await
        .expect("submit body");
    assert_eq!(body["status"], "SUCCESS");

    let log: serde_json::Value = app
        .client
        .get(format!("{}/submissions/{}", app.address, invoice_number))
        .send()
        .await
        .expect("log request")
        .json()
        .await
        .expect("log body");
    assert_eq!(log["status"], "SUCCESS");
    assert_eq!(log["response"], "OK");

    app.cleanup().await;
}

#[tokio::test]
async fn body_result_code_rejection_is_reported_as_error() {
    let authority = MockServer::start().await;
    let app = TestApp::spawn(&authority.uri()).await;

    Mock::given(method("POST"))
        .and(path("/trnsSales/saveSales"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultCd": "9999",
            "resultMsg": "invalid device"
        })))
        .expect(1)
        .mount(&authority)
        .await;

    let (invoice_id, _) = seed_submittable_invoice(&app).await;

    let body: serde_json::Value = app
        .client
        .post(format!("{}/invoices/{}/submit", app.address, invoice_id))
        .send()
        .await
        .expect("submit request")
        .json()
        .await
        .expect("submit body");
    assert_eq!(body["status"], "ERROR");
    assert!(body["message"]
        .as_str()
        .expect("message")
        .contains("resultCd 9999"));

    app.cleanup().await;
}

#[tokio::test]
async fn http_status_rule_accepts_any_2xx_body() {
    let authority = MockServer::start().await;
    let app = TestApp::spawn_with_rule(&authority.uri(), SuccessRule::HttpStatus).await;

    Mock::given(method("POST"))
        .and(path("/trnsSales/saveSales"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resultCd": "9999"})))
        .expect(1)
        .mount(&authority)
        .await;

    let (invoice_id, _) = seed_submittable_invoice(&app).await;

    let body: serde_json::Value = app
        .client
        .post(format!("{}/invoices/{}/submit", app.address, invoice_id))
        .send()
        .await
        .expect("submit request")
        .json()
        .await
        .expect("submit body");
    assert_eq!(body["status"], "SUCCESS");

    app.cleanup().await;
}

#[tokio::test]
async fn submitting_unknown_invoice_is_not_found() {
    let authority = MockServer::start().await;
    let app = TestApp::spawn(&authority.uri()).await;

    let response = app
        .client
        .post(format!("{}/invoices/999999/submit", app.address))
        .send()
        .await
        .expect("submit request");
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn mock_authority_mode_accepts_without_network() {
    let app = TestApp::spawn_mock_authority().await;

    let (invoice_id, invoice_number) = seed_submittable_invoice(&app).await;

    let body: serde_json::Value = app
        .client
        .post(format!("{}/invoices/{}/submit", app.address, invoice_id))
        .send()
        .await
        .expect("submit request")
        .json()
        .await
        .expect("submit body");
    assert_eq!(body["status"], "SUCCESS");
    assert!(body["authority_reference"]
        .as_str()
        .expect("reference")
        .starts_with("MOCK-"));

    let log = app
        .client
        .get(format!("{}/submissions/{}", app.address, invoice_number))
        .send()
        .await
        .expect("log request");
    assert_eq!(log.status(), 200);

    app.cleanup().await;
}
