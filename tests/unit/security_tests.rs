// Expiry and signature behaviour through the full handler

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, TimeZone, Utc};
use rstest::rstest;
use std::sync::Arc;

use image_handler::config::Config;
use image_handler::request::security::{format_expires, parse_expires, sign_path, string_to_sign};
use image_handler::secrets::StaticSecretProvider;
use image_handler::{ErrorKind, ImageHandlerEvent, ImageRequestHandler};

const SECRET_NAME: &str = "image-handler-secret";
const SECRET: &str = "very-secret-key";

fn valid_path() -> String {
    format!(
        "/{}",
        STANDARD.encode(r#"{"bucket":"validBucket","key":"validKey"}"#)
    )
}

fn handler(enable_signature: bool) -> ImageRequestHandler {
    let config = Config {
        source_buckets: vec!["validBucket".to_string()],
        enable_signature,
        secrets_manager: Some(SECRET_NAME.to_string()),
        ..Default::default()
    };
    let secrets = StaticSecretProvider::new().with_secret(SECRET_NAME, SECRET);
    ImageRequestHandler::new(Arc::new(config), Arc::new(secrets))
}

#[rstest]
#[case::past("19700101T000000Z", ErrorKind::ImageRequestExpired)]
#[case::invalid_month_and_day("19700001T000000Z", ErrorKind::ImageRequestExpiryFormat)]
#[case::wrong_separator("19700101S000000Z", ErrorKind::ImageRequestExpiryFormat)]
#[case::missing_zone("19700101T000000", ErrorKind::ImageRequestExpiryFormat)]
#[case::invalid_day("20300231T000000Z", ErrorKind::ImageRequestExpiryFormat)]
#[case::invalid_hour("20300101T250000Z", ErrorKind::ImageRequestExpiryFormat)]
#[case::extended_format("2030-01-01T00:00:00Z", ErrorKind::ImageRequestExpiryFormat)]
#[tokio::test]
async fn test_expiry_failures(#[case] expires: &str, #[case] kind: ErrorKind) {
    let event = ImageHandlerEvent::new(valid_path()).with_query("expires", expires);
    let err = handler(false).resolve(&event).await.unwrap_err();
    assert_eq!(err.kind(), kind);
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_no_expires_passes_through() {
    let resolved = handler(false)
        .resolve(&ImageHandlerEvent::new(valid_path()))
        .await
        .unwrap();
    assert_eq!(resolved.info.bucket, "validBucket");
    assert_eq!(resolved.info.key, "validKey");
    assert!(resolved.info.expires.is_none());
}

#[tokio::test]
async fn test_future_expiry_matches_no_expiry() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let handler = handler(false);

    let plain = handler
        .resolve_at(&ImageHandlerEvent::new(valid_path()), now)
        .await
        .unwrap();
    let event = ImageHandlerEvent::new(valid_path()).with_query("expires", "20240601T130000Z");
    let expiring = handler.resolve_at(&event, now).await.unwrap();

    assert_eq!(expiring.info.bucket, plain.info.bucket);
    assert_eq!(expiring.info.key, plain.info.key);
    assert_eq!(expiring.info.edits, plain.info.edits);
    assert_eq!(expiring.info.expires, Some(parse_expires("20240601T130000Z").unwrap()));
    assert_eq!(expiring.info.cache_control, plain.info.cache_control);
    assert_eq!(expiring.info.cache_control_at(now), "max-age=3600,public");
}

#[tokio::test]
async fn test_expiry_equal_to_now_is_expired() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let event = ImageHandlerEvent::new(valid_path()).with_query("expires", format_expires(now));
    let err = handler(false).resolve_at(&event, now).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImageRequestExpired);
}

#[tokio::test]
async fn test_signed_request_resolves() {
    let path = valid_path();
    let signature = sign_path(SECRET.as_bytes(), &path).unwrap();
    let event = ImageHandlerEvent::new(path.clone()).with_query("signature", signature);
    let resolved = handler(true).resolve(&event).await.unwrap();
    assert_eq!(resolved.info.key, "validKey");
    assert_eq!(resolved.status_code, 200);
}

#[tokio::test]
async fn test_signed_request_with_expiry() {
    let path = valid_path();
    let expires = format_expires(Utc::now() + Duration::minutes(5));
    let signature = sign_path(SECRET.as_bytes(), &string_to_sign(&path, Some(&expires))).unwrap();
    let event = ImageHandlerEvent::new(path)
        .with_query("signature", signature)
        .with_query("expires", expires);
    assert!(handler(true).resolve(&event).await.is_ok());
}

#[tokio::test]
async fn test_expiry_added_to_signed_path_is_rejected() {
    let path = valid_path();
    let event = ImageHandlerEvent::new(path.clone())
        .with_query("signature", sign_path(SECRET.as_bytes(), &path).unwrap())
        .with_query("expires", "20991231T235959Z");
    let err = handler(true).resolve(&event).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
}

#[tokio::test]
async fn test_extended_expiry_is_rejected() {
    let path = valid_path();
    let signed = format_expires(Utc::now() + Duration::minutes(5));
    let signature = sign_path(SECRET.as_bytes(), &string_to_sign(&path, Some(&signed))).unwrap();
    let event = ImageHandlerEvent::new(path)
        .with_query("signature", signature)
        .with_query("expires", format_expires(Utc::now() + Duration::days(365)));
    let err = handler(true).resolve(&event).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
}

#[tokio::test]
async fn test_signature_for_other_path_is_rejected() {
    let signature = sign_path(SECRET.as_bytes(), "/some/other/path.jpg").unwrap();
    let event = ImageHandlerEvent::new(valid_path()).with_query("signature", signature);
    let err = handler(true).resolve(&event).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_signature_with_wrong_secret_is_rejected() {
    let path = valid_path();
    let signature = sign_path(b"another-secret", &path).unwrap();
    let event = ImageHandlerEvent::new(path).with_query("signature", signature);
    let err = handler(true).resolve(&event).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
}

#[tokio::test]
async fn test_missing_signature_when_required() {
    let err = handler(true)
        .resolve(&ImageHandlerEvent::new(valid_path()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureMissing);
}

#[tokio::test]
async fn test_json_secret_field() {
    let config = Config {
        source_buckets: vec!["validBucket".to_string()],
        enable_signature: true,
        secrets_manager: Some(SECRET_NAME.to_string()),
        secret_key: Some("signatureKey".to_string()),
        ..Default::default()
    };
    let secrets = StaticSecretProvider::new()
        .with_secret(SECRET_NAME, format!(r#"{{"signatureKey":"{}"}}"#, SECRET));
    let handler = ImageRequestHandler::new(Arc::new(config), Arc::new(secrets));

    let path = valid_path();
    let event = ImageHandlerEvent::new(path.clone())
        .with_query("signature", sign_path(SECRET.as_bytes(), &path).unwrap());
    assert!(handler.resolve(&event).await.is_ok());
}
