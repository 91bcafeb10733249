//! 任务/结果JSON结构测试

use common::{PassThrough, TaskRequest, TaskResponse};
use serde_json::json;

#[test]
fn request_without_pass_through_fields() {
    let request: TaskRequest =
        serde_json::from_value(json!({"token": "good", "url": "https://example.com/"})).unwrap();
    assert_eq!(request.token, "good");
    assert_eq!(request.url, "https://example.com/");
    assert_eq!(request.extra, PassThrough::default());
}

#[test]
fn request_with_pass_through_fields() {
    let request: TaskRequest = serde_json::from_value(json!({
        "token": "good",
        "url": "https://example.com/shop",
        "tag": "shop-1",
        "billing_type": "page",
        "crawl_num": 42,
        "req_method": "GET",
        "extra_header": "X-Debug: 1"
    }))
    .unwrap();

    assert_eq!(request.extra.tag, Some(json!("shop-1")));
    assert_eq!(request.extra.billing_type, Some(json!("page")));
    assert_eq!(request.extra.crawl_num, Some(json!(42)));
    assert_eq!(request.extra.req_method, Some(json!("GET")));
    assert_eq!(request.extra.extra_header, Some(json!("X-Debug: 1")));
}

#[test]
fn pass_through_values_keep_their_json_type() {
    let request: TaskRequest = serde_json::from_value(json!({
        "token": "good",
        "url": "https://example.com/shop",
        "crawl_num": "5",
        "billing_type": 3,
        "extra_header": {"X-Debug": "1", "Cookie": ["a=1", "b=2"]}
    }))
    .unwrap();

    let response = TaskResponse::failed(request, 0, "2024-01-02 03:04:05".to_string());
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["crawl_num"], json!("5"));
    assert_eq!(value["billing_type"], json!(3));
    assert_eq!(
        value["extra_header"],
        json!({"X-Debug": "1", "Cookie": ["a=1", "b=2"]})
    );
    assert!(value.get("tag").is_none());
}

#[test]
fn request_missing_url_is_rejected() {
    let result = serde_json::from_value::<TaskRequest>(json!({"token": "good"}));
    assert!(result.is_err());
}

#[test]
fn completed_response_carries_webdata_and_echoes_fields() {
    let mut request = TaskRequest::new("good", "https://example.com/");
    request.extra.tag = Some(json!("shop-1"));
    request.extra.crawl_num = Some(json!(7));

    let response = TaskResponse::completed(
        request,
        "<html></html>".to_string(),
        3,
        "2024-01-02 03:04:05".to_string(),
    );
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(
        value,
        json!({
            "token": "good",
            "url": "https://example.com/",
            "success": true,
            "runtime": 3,
            "start_time": "2024-01-02 03:04:05",
            "webdata": "<html></html>",
            "tag": "shop-1",
            "crawl_num": 7
        })
    );
}

#[test]
fn failed_response_omits_webdata() {
    let mut request = TaskRequest::new("good", "https://example.com/");
    request.extra.req_method = Some(json!("GET"));

    let response = TaskResponse::failed(request, 10, "2024-01-02 03:04:05".to_string());
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["success"], json!(false));
    assert_eq!(value["runtime"], json!(10));
    assert_eq!(value["req_method"], json!("GET"));
    assert!(value.get("webdata").is_none());
}

#[test]
fn empty_body_is_not_serialized() {
    let request = TaskRequest::new("good", "https://example.com/");
    let response = TaskResponse::completed(request, String::new(), 0, "x".to_string());
    assert!(response.success);
    assert!(response.webdata.is_none());
}

#[test]
fn response_roundtrips_through_json() {
    let request = TaskRequest::new("good", "https://example.com/");
    let response = TaskResponse::completed(request, "body".to_string(), 1, "t".to_string());
    let text = serde_json::to_string(&response).unwrap();
    let decoded: TaskResponse = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded, response);
}
