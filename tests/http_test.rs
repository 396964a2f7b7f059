//! Router integration tests, driven without a socket.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use specdiff::{router, Disabled, Handler, OpenApiComparator};

const BOUNDARY: &str = "specdiff-boundary";

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), name);
    fs::read_to_string(path).unwrap()
}

fn app_with_docs(docs_dir: PathBuf) -> Router {
    let handler = Handler::new(Arc::new(OpenApiComparator), Arc::new(Disabled));
    router(Arc::new(handler), docs_dir)
}

fn app() -> Router {
    app_with_docs(PathBuf::from("/nonexistent-docs"))
}

fn multipart(base: &str, revision: &str) -> Body {
    let mut body = String::new();
    for (name, content) in [("base", base), ("revision", revision)] {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}.yaml\"\r\n\
             Content-Type: application/yaml\r\n\r\n{}\r\n",
            BOUNDARY, name, name, content
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
    Body::from(body)
}

fn form_encode<V: serde::Serialize>(fields: &[(&str, V)]) -> String {
    serde_urlencoded::to_string(fields).unwrap()
}

fn upload(route: &str, base: &str, revision: &str, accept: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/tenants/acme/{}", route))
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(ACCEPT, accept)
        .body(multipart(base, revision))
        .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

mod upload {
    use super::*;

    #[tokio::test]
    async fn removed_path_is_breaking() {
        let response = app()
            .oneshot(upload(
                "breaking-changes",
                &fixture("pets-base.yaml"),
                &fixture("pets-removed.yaml"),
                "application/json",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let changes = json["breaking-changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["id"], "api-path-removed-without-deprecation");
        assert_eq!(changes[0]["path"], "/pets");
        assert_eq!(changes[0]["operation"], "GET");
        assert_eq!(changes[0]["level"], "error");
    }

    #[tokio::test]
    async fn changelog_includes_the_breaking_change() {
        let response = app()
            .oneshot(upload(
                "changelog",
                &fixture("pets-base.yaml"),
                &fixture("pets-removed.yaml"),
                "application/json",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let changes = json["changelog"].as_array().unwrap();
        assert!(changes
            .iter()
            .any(|c| c["id"] == "api-path-removed-without-deprecation" && c["path"] == "/pets"));
    }

    #[tokio::test]
    async fn diff_shows_deleted_path() {
        let response = app()
            .oneshot(upload(
                "diff",
                &fixture("pets-base.yaml"),
                &fixture("pets-removed.yaml"),
                "application/json",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let deleted = json["paths"]["deleted"].as_object().unwrap();
        assert_eq!(deleted.keys().collect::<Vec<_>>(), vec!["/pets"]);
        assert!(json.get("endpoints").is_none());
    }

    #[tokio::test]
    async fn optional_parameter_is_not_breaking() {
        let response = app()
            .oneshot(upload(
                "breaking-changes",
                &fixture("pets-base.yaml"),
                &fixture("pets-optional-param.yaml"),
                "application/yaml",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/yaml");
        assert_eq!(body_text(response).await.trim(), "breaking-changes: []");
    }

    #[tokio::test]
    async fn url_encoded_fields_are_accepted() {
        let body = form_encode(&[
            ("base", &fixture("pets-base.yaml")),
            ("revision", &fixture("pets-required-param.yaml")),
        ]);
        let request = Request::builder()
            .method("POST")
            .uri("/tenants/acme/breaking-changes")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "text/plain")
            .body(Body::from(body))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        let text = body_text(response).await;
        assert!(text.contains("new-required-request-parameter"));
        assert!(text.contains("owner"));
    }

    #[tokio::test]
    async fn accept_language_selects_messages() {
        let request = Request::builder()
            .method("POST")
            .uri("/tenants/acme/breaking-changes")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(ACCEPT, "text/plain")
            .header(ACCEPT_LANGUAGE, "es-ES,es;q=0.9")
            .body(multipart(
                &fixture("pets-base.yaml"),
                &fixture("pets-optional-param.yaml"),
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(body_text(response).await.contains("Sin cambios"));
    }

    #[tokio::test]
    async fn rendering_is_deterministic() {
        let mut bodies = Vec::new();
        for _ in 0..2 {
            let response = app()
                .oneshot(upload(
                    "changelog",
                    &fixture("pets-base.yaml"),
                    &fixture("pets-required-param.yaml"),
                    "text/html",
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
            bodies.push(body_text(response).await);
        }
        assert_eq!(bodies[0], bodies[1]);
    }

    #[tokio::test]
    async fn missing_field_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/tenants/acme/changelog")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form_encode(&[(
                "base",
                &fixture("pets-base.yaml"),
            )])))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn unsupported_content_type_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/tenants/acme/diff")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from("base"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_document_is_bad_request() {
        let response = app()
            .oneshot(upload(
                "diff",
                &fixture("invalid.yaml"),
                &fixture("pets-base.yaml"),
                "application/json",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn uploads_cannot_reference_other_documents() {
        let revision = fixture("pets-base.yaml").replace(
            "$ref: '#/components/schemas/Pet'",
            "$ref: 'common.yaml#/components/schemas/Pet'",
        );
        let response = app()
            .oneshot(upload(
                "changelog",
                &fixture("pets-base.yaml"),
                &revision,
                "application/json",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod reference {
    use super::*;

    #[tokio::test]
    async fn fetches_both_documents() {
        let mut server = mockito::Server::new_async().await;
        let base = server
            .mock("GET", "/base.yaml")
            .with_body(fixture("pets-base.yaml"))
            .create_async()
            .await;
        let revision = server
            .mock("GET", "/revision.yaml")
            .with_body(fixture("pets-removed.yaml"))
            .create_async()
            .await;

        let uri = format!(
            "/tenants/acme/breaking-changes?{}",
            form_encode(&[
                ("base", &format!("{}/base.yaml", server.url())),
                ("revision", &format!("{}/revision.yaml", server.url())),
            ])
        );
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header(ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["breaking-changes"].as_array().unwrap().len(), 1);

        base.assert_async().await;
        revision.assert_async().await;
    }

    #[tokio::test]
    async fn missing_reference_is_bad_request() {
        let request = Request::builder()
            .method("GET")
            .uri("/tenants/acme/changelog?base=https%3A%2F%2Fexample.com%2Fa.yaml")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn unreachable_reference_is_bad_request() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/base.yaml")
            .with_status(404)
            .create_async()
            .await;

        let missing = format!("{}/base.yaml", server.url());
        let uri = format!(
            "/tenants/acme/diff?{}",
            form_encode(&[("base", &missing), ("revision", &missing)])
        );
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod routes {
    use super::*;

    #[tokio::test]
    async fn preflight() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/tenants/acme/breaking-changes")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "POST,GET");
        assert_eq!(headers["access-control-allow-headers"], "*");
        assert_eq!(headers["access-control-max-age"], "3600");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let request = Request::builder()
            .method("POST")
            .uri("/tenants/acme/lint")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn docs_are_served_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("docs.html"), "<html>docs</html>").unwrap();

        let request = Request::builder()
            .uri("/tenants/acme/docs.html")
            .body(Body::empty())
            .unwrap();
        let response = app_with_docs(dir.path().to_path_buf())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html");
        assert_eq!(body_text(response).await, "<html>docs</html>");

        let request = Request::builder()
            .uri("/tenants/acme/openapi.yaml")
            .body(Body::empty())
            .unwrap();
        let response = app_with_docs(dir.path().to_path_buf())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
