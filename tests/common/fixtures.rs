//! Fixtures: store URLs, view listings and mock store endpoints

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Database name used by every mock store
pub const DB: &str = "gpii";

/// Path of the authorization listing view on the mock store
pub const VIEW_PATH: &str = "/gpii/_design/views/_view/findAuthorizationByAccessToken";

/// Path of the bulk documents endpoint on the mock store
pub const BULK_DOCS_PATH: &str = "/gpii/_bulk_docs";

/// Store URL for a mock server, optionally with credentials
pub fn store_url(server: &MockServer, credentials: Option<(&str, &str)>) -> String {
    let uri = server.uri();
    match credentials {
        Some((user, password)) => {
            let rest = uri.trim_start_matches("http://");
            format!("http://{user}:{password}@{rest}/{DB}")
        }
        None => format!("{uri}/{DB}"),
    }
}

/// One authorization document as the issuing system stores it
pub fn authorization(id: &str, expires: &str) -> Value {
    json!({
        "_id": id,
        "_rev": "1-0f4a",
        "type": "gpiiAppInstallationAuthorization",
        "clientId": "client-1",
        "gpiiKey": "alice",
        "accessToken": format!("{id}-token"),
        "revoked": false,
        "timestampCreated": "2019-01-01T00:00:00.000Z",
        "timestampExpires": expires
    })
}

/// View listing wrapping each authorization under `value.authorization`
pub fn listing(authorizations: &[Value]) -> Value {
    let rows: Vec<Value> = authorizations
        .iter()
        .map(|a| {
            json!({
                "id": a["_id"],
                "key": a["accessToken"],
                "value": {"authorization": a, "gpiiKey": a["gpiiKey"]}
            })
        })
        .collect();
    json!({"total_rows": rows.len(), "offset": 0, "rows": rows})
}

/// Serve `body` with `status` from the listing view, expecting exactly one read
pub async fn mount_listing(server: &MockServer, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(VIEW_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

/// Accept bulk writes, answering with one `ok` result per submitted document
pub async fn mount_bulk_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(BULK_DOCS_PATH))
        .respond_with(|request: &Request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
            let results: Vec<Value> = body["docs"]
                .as_array()
                .map(|docs| {
                    docs.iter()
                        .map(|d| json!({"ok": true, "id": d["_id"], "rev": "2-dead"}))
                        .collect()
                })
                .unwrap_or_default();
            ResponseTemplate::new(201).set_body_json(results)
        })
        .mount(server)
        .await;
}

/// Bulk write requests received by `server`
pub async fn bulk_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == BULK_DOCS_PATH)
        .collect()
}

/// Documents submitted in each bulk write received by `server`
pub async fn written_docs(server: &MockServer) -> Vec<Vec<Value>> {
    bulk_requests(server)
        .await
        .into_iter()
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap_or(Value::Null);
            body["docs"].as_array().cloned().unwrap_or_default()
        })
        .collect()
}
