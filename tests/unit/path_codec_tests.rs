// Path decoding tests: the three request shapes and their edge cases

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rstest::rstest;

use image_handler::config::Config;
use image_handler::edits::{self, Edit, FitMode};
use image_handler::request::path::decode;
use image_handler::request::RawEdits;
use image_handler::{ErrorKind, ImageHandlerEvent, RequestType};

fn config_with(buckets: &[&str]) -> Config {
    Config {
        source_buckets: buckets.iter().map(|b| b.to_string()).collect(),
        ..Default::default()
    }
}

fn encode_default(json: &str) -> String {
    format!("/{}", STANDARD.encode(json))
}

#[rstest]
#[case("bucket-name-here", "key-name-here")]
#[case("validBucket", "validKey")]
#[case("my.bucket", "nested/dir/photo with spaces.jpg")]
#[case("b", "ключ/画像.png")]
fn test_default_round_trip(#[case] bucket: &str, #[case] key: &str) {
    let json = serde_json::json!({"bucket": bucket, "key": key}).to_string();
    let raw = decode(&ImageHandlerEvent::new(encode_default(&json)), &config_with(&[bucket]))
        .unwrap();
    assert_eq!(raw.bucket, bucket);
    assert_eq!(raw.key, key);
    assert_eq!(raw.request_type(), RequestType::Default);
    assert_eq!(raw.raw_edits, RawEdits::Default(serde_json::Map::new()));
}

#[test]
fn test_literal_default_path() {
    let event =
        ImageHandlerEvent::new("/eyJidWNrZXQiOiJidWNrZXQtbmFtZS1oZXJlIiwia2V5Ijoia2V5LW5hbWUtaGVyZSJ9");
    let raw = decode(&event, &config_with(&["bucket-name-here"])).unwrap();
    assert_eq!(raw.bucket, "bucket-name-here");
    assert_eq!(raw.key, "key-name-here");
}

#[test]
fn test_literal_non_base64_path() {
    let event = ImageHandlerEvent::new("/someNonBase64EncodedContentHere");
    let err = decode(&event, &config_with(&["bucket-name-here"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CannotDecodeRequest);
}

#[test]
fn test_literal_missing_path() {
    let event: ImageHandlerEvent = serde_json::from_str("{}").unwrap();
    let err = decode(&event, &config_with(&["bucket-name-here"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CannotReadPath);
}

#[rstest]
#[case::base64_without_key(r#"{"bucket":"images"}"#)]
#[case::base64_non_object(r#"["images","key"]"#)]
#[case::base64_empty_key(r#"{"bucket":"images","key":""}"#)]
fn test_incomplete_default_json_is_not_decodable(#[case] json: &str) {
    let event = ImageHandlerEvent::new(encode_default(json));
    let err = decode(&event, &config_with(&["images"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CannotDecodeRequest);
}

#[test]
fn test_default_edits_must_be_object() {
    let event = ImageHandlerEvent::new(encode_default(
        r#"{"bucket":"images","key":"a.jpg","edits":[1,2]}"#,
    ));
    let err = decode(&event, &config_with(&["images"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CannotDecodeRequest);
}

#[test]
fn test_default_unknown_output_format() {
    let event = ImageHandlerEvent::new(encode_default(
        r#"{"bucket":"images","key":"a.jpg","outputFormat":"bmp"}"#,
    ));
    let err = decode(&event, &config_with(&["images"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEditParameter);
}

#[rstest]
#[case("/fit-in/300x300/images/photo.jpg", RequestType::Thumbor, "images", "photo.jpg")]
#[case("/300x300/filters:quality(80)/photo.jpg", RequestType::Thumbor, "images", "photo.jpg")]
#[case("/resize(100,100)/images/a/b/c.png", RequestType::Custom, "images", "a/b/c.png")]
#[case("/filters:grayscale()/other/photo.jpg", RequestType::Custom, "images", "other/photo.jpg")]
#[case("/images/photo.webp", RequestType::Thumbor, "images", "photo.webp")]
#[case("/photo.webp", RequestType::Thumbor, "images", "photo.webp")]
fn test_segmented_classification(
    #[case] path: &str,
    #[case] request_type: RequestType,
    #[case] bucket: &str,
    #[case] key: &str,
) {
    let raw = decode(&ImageHandlerEvent::new(path), &config_with(&["images", "assets"])).unwrap();
    assert_eq!(raw.request_type(), request_type);
    assert_eq!(raw.bucket, bucket);
    assert_eq!(raw.key, key);
}

#[test]
fn test_thumbor_tokens_keep_path_order() {
    let config = config_with(&["images"]);
    let event = ImageHandlerEvent::new(
        "/10x10:110x60/fit-in/-50x40/filters:rotate(90):grayscale()/images/photo.jpg",
    );
    let raw = decode(&event, &config).unwrap();
    let edits = edits::normalize(&raw, &config).unwrap();
    assert_eq!(
        edits.names(),
        vec!["crop", "resize", "flop", "rotate", "grayscale"]
    );
    assert_eq!(
        edits.as_slice()[1],
        Edit::Resize {
            width: Some(50),
            height: Some(40),
            fit: FitMode::Inside
        }
    );
}

#[test]
fn test_custom_calls_keep_path_order() {
    let config = config_with(&["images"]);
    let event = ImageHandlerEvent::new("/blur(2)/resize(300,200)/flip()/images/photo.jpg");
    let raw = decode(&event, &config).unwrap();
    let edits = edits::normalize(&raw, &config).unwrap();
    assert_eq!(edits.names(), vec!["blur", "resize", "flip"]);

    let reversed = ImageHandlerEvent::new("/flip()/resize(300,200)/blur(2)/images/photo.jpg");
    let raw = decode(&reversed, &config).unwrap();
    let edits = edits::normalize(&raw, &config).unwrap();
    assert_eq!(edits.names(), vec!["flip", "resize", "blur"]);
}

#[test]
fn test_thumbor_unknown_filters_are_dropped() {
    let config = config_with(&["images"]);
    let event =
        ImageHandlerEvent::new("/fit-in/100x100/filters:sepia():grayscale()/images/photo.jpg");
    let raw = decode(&event, &config).unwrap();
    let edits = edits::normalize(&raw, &config).unwrap();
    assert_eq!(edits.names(), vec!["resize", "grayscale"]);
}

#[test]
fn test_custom_unknown_call_fails() {
    let config = config_with(&["images"]);
    let raw = decode(&ImageHandlerEvent::new("/sepia()/images/photo.jpg"), &config).unwrap();
    let err = edits::normalize(&raw, &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownEditOperation);
}

#[test]
fn test_thumbor_watermark_key_with_folder() {
    let config = config_with(&["images", "marks"]);
    let event = ImageHandlerEvent::new(
        "/fit-in/100x100/filters:watermark(marks,logos/brand.png,0,0)/images/cat.jpg",
    );
    let raw = decode(&event, &config).unwrap();
    assert_eq!(raw.request_type(), RequestType::Thumbor);
    assert_eq!(raw.bucket, "images");
    assert_eq!(raw.key, "cat.jpg");

    let edits = edits::normalize(&raw, &config).unwrap();
    assert_eq!(edits.names(), vec!["resize", "overlay"]);
    match &edits.as_slice()[1] {
        Edit::Overlay(overlay) => {
            assert_eq!(overlay.bucket, "marks");
            assert_eq!(overlay.key, "logos/brand.png");
        }
        other => panic!("unexpected edit {:?}", other),
    }
}

#[test]
fn test_custom_watermark_key_with_folder() {
    let config = config_with(&["images", "marks"]);
    let event =
        ImageHandlerEvent::new("/watermark(marks,logos/2024/brand.png,50)/images/a/cat.jpg");
    let raw = decode(&event, &config).unwrap();
    assert_eq!(raw.request_type(), RequestType::Custom);
    assert_eq!((raw.bucket.as_str(), raw.key.as_str()), ("images", "a/cat.jpg"));

    let edits = edits::normalize(&raw, &config).unwrap();
    assert_eq!(edits.names(), vec!["overlay"]);
}
