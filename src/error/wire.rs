//! 错误的跨进程传输格式
//!
//! 序列化为 JSON 对象 `{"scope": string, "code": integer, "message": string}`。
//! 反序列化失败（字段缺失、类型不符、格式错误、code 为 0）时返回 `None`，
//! 表示"不是结构化错误"，而不是报错。

use super::FlareError;
use serde::Deserialize;

#[derive(Deserialize)]
struct WireError {
    scope: String,
    code: i32,
    message: String,
}

/// 序列化为传输格式
pub fn serialize_error(err: &FlareError) -> Vec<u8> {
    err.to_json().into_bytes()
}

/// 从传输格式还原错误
pub fn deserialize_error(data: &[u8]) -> Option<FlareError> {
    let wire: WireError = serde_json::from_slice(data).ok()?;
    if wire.code == 0 {
        return None;
    }
    Some(FlareError::new(wire.code, wire.scope, wire.message))
}

impl FlareError {
    /// 转换为 JSON 字符串
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "scope": self.scope(),
            "code": self.code(),
            "message": self.message(),
        })
        .to_string()
    }

    /// 从 JSON 数据解析错误
    pub fn from_json(data: &[u8]) -> Option<Self> {
        deserialize_error(data)
    }
}
