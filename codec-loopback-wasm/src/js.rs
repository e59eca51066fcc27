use anyhow::{Result, anyhow};
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};

pub fn to_js_error<E: std::fmt::Display>(err: E) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Converts a rejected promise or thrown value into an `anyhow::Error`.
pub fn js_error(value: JsValue) -> anyhow::Error {
    anyhow!(error_message(&value))
}

pub fn error_message(value: &JsValue) -> String {
    if let Some(message) = value.as_string() {
        return message;
    }
    match js_sys::Reflect::get(value, &JsValue::from_str("message")) {
        Ok(message) if message.is_string() => message.as_string().unwrap_or_default(),
        _ => format!("{:?}", value),
    }
}

pub fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| anyhow!("{}", e))
}

/// Serializes `value` into a plain object and views it as the WebIDL
/// dictionary type `D`.
pub fn to_dictionary<T: Serialize, D: JsCast>(value: &T) -> Result<D> {
    Ok(to_js_value(value)?.unchecked_into())
}
