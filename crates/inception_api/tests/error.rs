use inception_api::InceptionApiError;
use reqwest::StatusCode;

#[test]
fn error_display_is_stable_for_user_surfaces() {
    assert_eq!(
        InceptionApiError::MissingApiKey.to_string(),
        "API key is required"
    );
    assert_eq!(
        InceptionApiError::Cancelled.to_string(),
        "request was cancelled"
    );
    assert_eq!(
        InceptionApiError::StreamFailed {
            message: "boom".to_string(),
        }
        .to_string(),
        "stream failed: boom"
    );
    assert_eq!(
        InceptionApiError::Status(StatusCode::UNAUTHORIZED, "bad key".to_string()).to_string(),
        "HTTP 401 Unauthorized bad key"
    );
}

#[test]
fn cancelled_is_distinguished_from_errors() {
    assert!(InceptionApiError::Cancelled.is_cancelled());
    assert!(!InceptionApiError::Unknown("x".to_string()).is_cancelled());
}
