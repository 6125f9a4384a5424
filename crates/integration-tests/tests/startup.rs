use indoc::indoc;
use integration_tests::TestServer;

#[tokio::test]
async fn user_class_without_limit_is_fatal() {
    let config = indoc! {r#"
        [[server.auth.users]]
        id = "1"
        username = "carol"
        password = "secret"
        class = "enterprise"
    "#};

    let error = TestServer::try_start(config).await.err().unwrap();

    assert!(error.to_string().contains("'enterprise'"), "{error}");
}

#[tokio::test]
async fn users_file_class_without_limit_is_fatal() {
    let users = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        users.path(),
        r#"[{ "id": "1", "username": "carol", "password": "secret", "type": "enterprise" }]"#,
    )
    .unwrap();

    let config = format!("[server.auth]\nusers_file = \"{}\"\n", users.path().display());
    let error = TestServer::try_start(&config).await.err().unwrap();

    assert!(error.to_string().contains("'enterprise'"), "{error}");
}

#[tokio::test]
async fn missing_users_file_is_fatal() {
    let config = indoc! {r#"
        [server.auth]
        users_file = "/nonexistent/users.json"
    "#};

    let error = TestServer::try_start(config).await.err().unwrap();

    assert!(error.to_string().contains("Failed to read users file"), "{error}");
}

#[tokio::test]
async fn starts_without_downstream_credentials() {
    let server = TestServer::start("").await;

    let (status, _) = server.client.status(None).await;

    assert_eq!(status, 200);
}
