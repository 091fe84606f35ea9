#![cfg(feature = "http")]

use display64_hardware::{AsyncDevice, Error, Frame, HttpDisplay, Rgba};
use wiremock::{
    matchers::{header_regex, method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn posts_frame_as_multipart_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/use"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let frame = Frame::filled(Rgba([10, 20, 30, 255])).unwrap();
    let mut display = HttpDisplay::new(&format!("{}/", server.uri())).unwrap();
    assert_eq!(display.endpoint(), format!("{}/use", server.uri()));

    display.draw(&frame).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body = &requests[0].body;
    let text = String::from_utf8_lossy(body);
    assert!(text.contains("name=\"file\""));
    assert!(text.contains("filename=\"image.png\""));
    assert!(body
        .windows(frame.len())
        .any(|window| window == frame.as_bytes()));
}

#[tokio::test]
async fn non_ok_status_is_rejected_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/use"))
        .respond_with(ResponseTemplate::new(500).set_body_string("matrix offline"))
        .mount(&server)
        .await;

    let mut display = HttpDisplay::new(&server.uri()).unwrap();
    let err = display.draw(&Frame::blank().unwrap()).await.unwrap_err();

    match err {
        Error::Rejected { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "matrix offline");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn created_is_not_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let mut display = HttpDisplay::new(&server.uri()).unwrap();
    let err = display.draw(&Frame::blank().unwrap()).await.unwrap_err();
    assert!(matches!(err, Error::Rejected { status: 201, .. }));
}
