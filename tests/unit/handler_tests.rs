// End-to-end handler behaviour: fallback, negotiation, idempotence

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use image_handler::config::{Config, FallbackConfig};
use image_handler::edits::{Edit, OutputFormat};
use image_handler::secrets::{SecretError, SecretProvider, StaticSecretProvider};
use image_handler::{ErrorKind, ImageHandlerEvent, ImageRequestHandler, RequestType};

const ACCEPT_WEBP: &str = "image/avif,image/webp,*/*";

fn base_config() -> Config {
    Config {
        source_buckets: vec!["images".to_string(), "fallbacks".to_string()],
        ..Default::default()
    }
}

fn fallback_config() -> Config {
    Config {
        fallback: FallbackConfig {
            enabled: true,
            bucket: Some("fallbacks".to_string()),
            key: Some("not-found.png".to_string()),
            status_code: Some(404),
            ..Default::default()
        },
        ..base_config()
    }
}

fn handler(config: Config) -> ImageRequestHandler {
    ImageRequestHandler::new(Arc::new(config), Arc::new(StaticSecretProvider::new()))
}

fn default_path(json: &str) -> String {
    format!("/{}", STANDARD.encode(json))
}

#[tokio::test]
async fn test_default_request_end_to_end() {
    let event = ImageHandlerEvent::new(default_path(
        r#"{"bucket":"images","key":"cat.jpg","edits":{"resize":{"width":200},"grayscale":true,"png":{"quality":90}}}"#,
    ));
    let resolved = handler(base_config()).resolve(&event).await.unwrap();
    let info = resolved.info;
    assert_eq!(info.request_type, RequestType::Default);
    assert_eq!(info.edits.names(), vec!["resize", "grayscale", "quality", "format"]);
    assert_eq!(info.output_format, Some(OutputFormat::Png));
    assert_eq!(info.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn test_fallback_replaces_any_failure() {
    let handler = handler(fallback_config());
    let failing = [
        ImageHandlerEvent::default(),
        ImageHandlerEvent::new("/someNonBase64EncodedContentHere"),
        ImageHandlerEvent::new("/images/cat.jpg").with_query("expires", "19700101T000000Z"),
        ImageHandlerEvent::new("/resize(wide)/images/cat.jpg"),
    ];

    for event in &failing {
        let resolved = handler.resolve(event).await.unwrap();
        assert!(resolved.is_fallback(), "expected fallback for {:?}", event.path);
        assert_eq!(resolved.status_code, 404);
        assert_eq!(resolved.info.bucket, "fallbacks");
        assert_eq!(resolved.info.key, "not-found.png");
        assert_eq!(resolved.info.cache_control, "no-store");
    }
}

#[tokio::test]
async fn test_fallback_keeps_absorbed_error() {
    let event = ImageHandlerEvent::new("/images/cat.jpg").with_query("expires", "19700101T000000");
    let resolved = handler(fallback_config()).resolve(&event).await.unwrap();
    let absorbed = resolved.fallback.expect("fallback error is recorded");
    assert_eq!(absorbed.kind(), ErrorKind::ImageRequestExpiryFormat);
}

#[tokio::test]
async fn test_fallback_not_used_on_success() {
    let resolved = handler(fallback_config())
        .resolve(&ImageHandlerEvent::new("/images/cat.jpg"))
        .await
        .unwrap();
    assert!(!resolved.is_fallback());
    assert_eq!(resolved.status_code, 200);
    assert_eq!(resolved.info.key, "cat.jpg");
}

#[tokio::test]
async fn test_error_response_when_fallback_disabled() {
    let err = handler(base_config())
        .resolve(&ImageHandlerEvent::new("/someNonBase64EncodedContentHere"))
        .await
        .unwrap_err();
    let body = err.to_response();
    assert_eq!(body.status_code, 400);
    assert_eq!(body.code, "CannotDecodeRequest");
}

#[tokio::test]
async fn test_auto_webp_negotiation() {
    let config = Config {
        auto_webp: true,
        ..base_config()
    };
    let handler = handler(config);

    let event = ImageHandlerEvent::new("/fit-in/100x100/images/cat.jpg").with_header("accept", ACCEPT_WEBP);
    let resolved = handler.resolve(&event).await.unwrap();
    assert_eq!(resolved.info.output_format, Some(OutputFormat::WebP));

    let explicit = ImageHandlerEvent::new("/filters:format(png)/images/cat.jpg")
        .with_header("Accept", ACCEPT_WEBP);
    let resolved = handler.resolve(&explicit).await.unwrap();
    assert_eq!(resolved.info.output_format, Some(OutputFormat::Png));

    let no_accept = ImageHandlerEvent::new("/images/cat.jpg");
    let resolved = handler.resolve(&no_accept).await.unwrap();
    assert_eq!(resolved.info.output_format, None);
    assert_eq!(resolved.info.content_type, None);
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let handler = handler(base_config());
    let events = [
        ImageHandlerEvent::new(default_path(
            r#"{"bucket":"images","key":"cat.jpg","edits":{"rotate":null,"blur":3}}"#,
        )),
        ImageHandlerEvent::new("/fit-in/300x200/filters:quality(75)/images/cat.jpg"),
        ImageHandlerEvent::new("/resize(300,200)/rotate(45)/images/cat.jpg"),
    ];
    for event in &events {
        let first = handler.resolve(event).await.unwrap();
        let second = handler.resolve(event).await.unwrap();
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn test_resolution_with_expiry_is_idempotent() {
    let handler = handler(base_config());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let event = ImageHandlerEvent::new("/fit-in/300x200/images/cat.jpg")
        .with_query("expires", "20240601T130000Z");

    let first = handler.resolve_at(&event, now).await.unwrap();
    let second = handler
        .resolve_at(&event, now + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.info.cache_control_at(now), "max-age=3600,public");
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let handler = handler(base_config());
    let mut tasks = Vec::new();
    for i in 1..=16u32 {
        let handler = handler.clone();
        tasks.push(tokio::spawn(async move {
            let event = ImageHandlerEvent::new(format!("/resize({},{})/images/cat.jpg", i, i));
            (i, handler.resolve(&event).await)
        }));
    }
    for task in tasks {
        let (i, result) = task.await.unwrap();
        let resolved = result.unwrap();
        assert_eq!(
            resolved.info.edits.as_slice()[0],
            Edit::Resize {
                width: Some(i),
                height: Some(i),
                fit: Default::default()
            }
        );
    }
}

#[tokio::test]
async fn test_bucket_outside_allow_list() {
    let event = ImageHandlerEvent::new(default_path(r#"{"bucket":"private","key":"a.jpg"}"#));
    let err = handler(base_config()).resolve(&event).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CannotAccessBucket);
    assert_eq!(err.status_code(), 403);
}

struct HangingSecretProvider;

#[async_trait]
impl SecretProvider for HangingSecretProvider {
    async fn get_secret(&self, _name: &str) -> Result<String, SecretError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("never".to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn test_secret_timeout_is_server_error() {
    let config = Config {
        enable_signature: true,
        secrets_manager: Some("slow".to_string()),
        secret_timeout_ms: 50,
        ..base_config()
    };
    let handler = ImageRequestHandler::new(Arc::new(config), Arc::new(HangingSecretProvider));
    let event = ImageHandlerEvent::new("/images/cat.jpg").with_query("signature", "00");
    let err = handler.resolve(&event).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecretUnavailable);
    assert_eq!(err.status_code(), 500);
}
