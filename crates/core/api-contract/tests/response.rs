use api_contract::ApiResponse;
use serde_json::Value;

#[test]
fn success_envelope_wraps_data() {
    let response = ApiResponse::success(vec!["S1#10".to_string()]);
    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value.get("success"), Some(&Value::Bool(true)));
    assert_eq!(value["data"][0], Value::from("S1#10"));
    assert!(value.get("error").map(Value::is_null).unwrap_or(false));
}

#[test]
fn error_envelope_has_code_and_message() {
    let response = ApiResponse::<()>::error("RULE.INVALID", "between 1 and 8 actuators");
    assert!(!response.success);
    assert!(response.data.is_none());
    let error = response.error.expect("error");
    assert_eq!(error.code, "RULE.INVALID");
    assert_eq!(error.message, "between 1 and 8 actuators");
}
