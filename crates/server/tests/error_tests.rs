use embed_token_broker::error::{
    AuthError, EmbedError, NotFoundError, RemoteApiError, ReportingError, TransportError,
};
use hyper::StatusCode;
use std::error::Error;
use std::time::Duration;

#[test]
fn test_transport_error_display() {
    let timeout_err = TransportError::Timeout(Duration::from_secs(5));
    assert_eq!(timeout_err.to_string(), "Network timeout after 5s");

    let json_err = TransportError::Json("expected value at line 1".to_string());
    assert!(json_err.to_string().contains("JSON parse error"));
}

#[test]
fn test_token_endpoint_error_prefers_description() {
    let err = AuthError::TokenEndpoint {
        status: StatusCode::BAD_REQUEST,
        code: Some("invalid_grant".into()),
        description: Some("AADSTS50126: Invalid username or password.".into()),
    };
    assert_eq!(
        err.to_string(),
        "Token endpoint returned HTTP 400 Bad Request: AADSTS50126: Invalid username or password."
    );
    assert_eq!(err.oauth_code(), Some("invalid_grant"));
    assert!(!err.requires_interaction());

    let bare = AuthError::TokenEndpoint {
        status: StatusCode::UNAUTHORIZED,
        code: Some("invalid_client".into()),
        description: None,
    };
    assert!(bare.to_string().ends_with(": invalid_client"));
}

#[test]
fn test_silent_failures_allow_interactive_fallback() {
    assert!(AuthError::FailedToAcquireTokenSilently("alice".into()).requires_interaction());
    assert!(AuthError::UserInteractionRequired("alice".into()).requires_interaction());
    assert!(!AuthError::MissingPrincipalName.requires_interaction());
    assert!(
        !AuthError::Transport(TransportError::Timeout(Duration::from_secs(1)))
            .requires_interaction()
    );
}

#[test]
fn test_remote_api_error_format() {
    let err = RemoteApiError {
        status: StatusCode::UNAUTHORIZED,
        body: "{\"error\":\"TokenExpired\"}".into(),
        request_id: Some("abc-123".into()),
    };
    assert_eq!(
        err.to_string(),
        "Status: Unauthorized (401)\nResponse: {\"error\":\"TokenExpired\"}\nRequestId: abc-123"
    );

    let no_id = RemoteApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: String::new(),
        request_id: None,
    };
    assert!(no_id.to_string().ends_with("RequestId: "));
}

#[test]
fn test_embed_error_messages() {
    assert_eq!(
        EmbedError::from(NotFoundError::NoReports).to_string(),
        "No reports were found in the workspace"
    );
    assert_eq!(
        EmbedError::from(NotFoundError::ReportNotFound).to_string(),
        "No report with the given ID was found in the workspace. Make sure ReportId is valid."
    );
    assert_eq!(
        EmbedError::MissingDataset("P1".into()).to_string(),
        "Report P1 is not backed by a dataset, so no effective identity can be applied"
    );
    assert_eq!(
        EmbedError::Integrity.to_string(),
        "Failed to generate embed token."
    );

    let service = EmbedError::ServiceToken(AuthError::InvalidTokenResponse("x".into()));
    assert_eq!(service.to_string(), "Could not acquire Super User Access Token");
    assert!(service.source().is_some());

    let auth = EmbedError::Auth(AuthError::MissingBootstrapToken);
    assert_eq!(
        auth.to_string(),
        "Could not acquire downstream access token: Signed-in user has no bootstrap token to exchange"
    );
}

#[test]
fn test_reporting_error_conversion() {
    let remote: EmbedError = ReportingError::from(RemoteApiError {
        status: StatusCode::FORBIDDEN,
        body: "denied".into(),
        request_id: None,
    })
    .into();
    assert!(matches!(remote, EmbedError::RemoteApi(_)));
    assert!(remote.to_string().starts_with("Status: Forbidden (403)"));

    let transport: EmbedError =
        ReportingError::from(TransportError::Network("connection reset".into())).into();
    assert!(matches!(transport, EmbedError::Transport(_)));
    assert_eq!(transport.to_string(), "Network error: connection reset");
}
