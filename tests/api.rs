mod harness;

use ghauth::api::{AuthorizationStore, TwoFactorMethod};
use ghauth::{authenticated_client, ApiClient, ApiError, Credentials};
use harness::{MockService, Reply, OCTOCAT_BASIC};

fn octocat(otp: Option<&str>) -> Credentials {
    Credentials {
        login: "octocat".into(),
        password: "hunter2".into(),
        otp: otp.map(String::from),
    }
}

/// Three pages; the `mytool` authorization sits on the last one.
fn paginated(base: &str, url: &str) -> Reply {
    match url {
        "/authorizations" => Reply::json(200, r#"[{"id": 1, "token": "a", "note": "one"}]"#)
            .with_header(
                "Link",
                format!(
                    r#"<{base}/authorizations?page=2>; rel="next", <{base}/authorizations?page=3>; rel="last""#
                ),
            ),
        // relative link on purpose
        "/authorizations?page=2" => {
            Reply::json(200, r#"[{"id": 2, "token": "b", "note": "two"}]"#)
                .with_header("Link", r#"</authorizations?page=3>; rel="next""#)
        }
        "/authorizations?page=3" => Reply::json(
            200,
            r#"[{"id": 3, "token": "c", "note": null, "app": {"name": "mytool (API)"}}]"#,
        ),
        _ => Reply::json(404, r#"{"message": "Not Found"}"#),
    }
}

#[test]
fn lists_every_page_including_the_last() {
    let mock = MockService::start(|base, req| paginated(base, &req.url));
    let client = ApiClient::new(&mock.base_url, octocat(None)).unwrap();

    let all = client.list_authorizations().unwrap();

    let ids: Vec<u64> = all.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    let requests = mock.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests
        .iter()
        .all(|r| r.authorization.as_deref() == Some(OCTOCAT_BASIC) && r.otp.is_none()));
}

#[test]
fn find_matches_generated_app_name_on_a_later_page() {
    let mock = MockService::start(|base, req| paginated(base, &req.url));
    let client = ApiClient::new(&mock.base_url, octocat(None)).unwrap();

    let found = client.find_authorization("mytool").unwrap().unwrap();
    assert_eq!(found.token, "c");
    assert!(client.find_authorization("absent").unwrap().is_none());
}

#[test]
fn find_stops_paging_at_first_match() {
    let mock = MockService::start(|base, req| paginated(base, &req.url));
    let client = ApiClient::new(&mock.base_url, octocat(None)).unwrap();

    let found = client.find_authorization("one").unwrap().unwrap();
    assert_eq!(found.id, 1);
    assert_eq!(mock.requests().len(), 1);
}

#[test]
fn pagination_stops_at_the_page_cap() {
    let mock = MockService::start(|_, _| {
        Reply::json(200, r#"[{"id": 1, "token": "a", "note": "loop"}]"#)
            .with_header("Link", r#"</authorizations?page=2>; rel="next""#)
    });
    let client = ApiClient::new(&mock.base_url, octocat(None)).unwrap();

    let err = client.list_authorizations().unwrap_err();

    assert!(matches!(err, ApiError::TooManyPages(100)));
    assert_eq!(mock.requests().len(), 100);
}

#[test]
fn otp_challenge_is_reported_then_satisfied() {
    let mock = MockService::start(|_, req| match req.otp.as_deref() {
        Some("123456") => Reply::json(200, r#"[{"id": 9, "token": "t", "note": "mytool"}]"#),
        _ => {
            Reply::json(401, r#"{"message": "Must specify two-factor authentication OTP code."}"#)
                .with_header("X-GitHub-OTP", "required; sms")
        }
    });
    let mut client = ApiClient::new(&mock.base_url, octocat(None)).unwrap();

    let err = client.find_authorization("mytool").unwrap_err();
    assert!(matches!(err, ApiError::OtpRequired(TwoFactorMethod::Sms)));

    client.set_otp(Some("123456".into()));
    let found = client.find_authorization("mytool").unwrap().unwrap();
    assert_eq!(found.id, 9);
    assert_eq!(mock.requests()[1].otp.as_deref(), Some("123456"));
}

#[test]
fn bad_credentials_are_not_a_two_factor_challenge() {
    let mock = MockService::start(|_, _| Reply::json(401, r#"{"message": "Bad credentials"}"#));
    let client = ApiClient::new(&mock.base_url, octocat(None)).unwrap();

    let err = client.find_authorization("mytool").unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Bad credentials"));
}

#[test]
fn create_posts_scopes_and_note() {
    let mock = MockService::start(|_, req| {
        assert_eq!(req.method, "POST");
        Reply::json(201, r#"{"id": 42, "token": "fresh", "note": "mytool", "scopes": ["repo"]}"#)
    });
    let client = ApiClient::new(&mock.base_url, octocat(Some("654321"))).unwrap();

    let created = client
        .create_authorization("mytool", &["repo".to_string(), "gist".to_string()])
        .unwrap();

    assert_eq!(created.token, "fresh");
    let requests = mock.requests();
    let request = &requests[0];
    assert_eq!(request.url, "/authorizations");
    assert_eq!(request.otp.as_deref(), Some("654321"));
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"scopes": ["repo", "gist"], "note": "mytool"})
    );
}

#[test]
fn create_failure_carries_service_errors() {
    let mock = MockService::start(|_, _| {
        Reply::json(
            422,
            r#"{"message": "Validation Failed", "errors": [{"resource": "OauthAccess", "code": "already_exists", "field": "description"}]}"#,
        )
    });
    let client = ApiClient::new(&mock.base_url, octocat(None)).unwrap();

    let err = client.create_authorization("mytool", &[]).unwrap_err();
    let ApiError::Status { status, message, errors } = &err else {
        panic!("expected Status, got {:?}", err);
    };
    assert_eq!(*status, 422);
    assert_eq!(message, "Validation Failed");
    assert_eq!(errors[0].code, "already_exists");
}

#[test]
fn sms_challenge_ignores_the_expected_401() {
    let mock = MockService::start(|_, _| {
        Reply::json(401, r#"{"message": "Must specify two-factor authentication OTP code."}"#)
            .with_header("X-GitHub-OTP", "required; sms")
    });
    let client = ApiClient::new(&mock.base_url, octocat(Some("stale"))).unwrap();

    client.request_sms_challenge().unwrap();

    let requests = mock.requests();
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert!(request.otp.is_none());
    assert!(request.body.is_empty());
}

#[test]
fn authenticated_client_sends_token_header() {
    let mock = MockService::start(|_, _| Reply::json(200, r#"{"login": "octocat"}"#));
    let client = authenticated_client("abc123").unwrap();

    let res = client.get(format!("{}/user", mock.base_url)).send().unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(
        mock.requests()[0].authorization.as_deref(),
        Some("token abc123")
    );
}
