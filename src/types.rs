use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{FlareError, Result, scope};

/// 服务协议
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// TLS 证书文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// 服务实例的身份与配置
///
/// 进程启动时从配置构建一次，之后只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scheme: Scheme,
    pub port: u16,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub tag: String,
    /// 开发模式：暴露 API 定义并打开访问日志
    #[serde(default)]
    pub dev_mode: bool,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            description: String::new(),
            scheme: Scheme::Http,
            port,
            tls: None,
            tag: String::new(),
            dev_mode: false,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.scheme = Scheme::Https;
        self.tls = Some(tls);
        self
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// 校验配置
    ///
    /// - name 非空
    /// - port 在 1..=65535
    /// - 当且仅当 scheme 为 https 时提供 TLS 证书
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FlareError::configuration(scope::CONFIG, "service name is empty"));
        }
        if self.port == 0 {
            return Err(FlareError::configuration(
                scope::CONFIG,
                format!("service '{}' has no server port", self.name),
            ));
        }
        match (self.scheme, &self.tls) {
            (Scheme::Https, None) => Err(FlareError::configuration(
                scope::CONFIG,
                "scheme https requires tls cert_file and key_file",
            )),
            (Scheme::Http, Some(_)) => Err(FlareError::configuration(
                scope::CONFIG,
                "tls material configured but scheme is http",
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_bad_info() {
        assert!(ServiceInfo::new("", 8080).validate().is_err());
        assert!(ServiceInfo::new("user", 0).validate().is_err());

        let mut https = ServiceInfo::new("user", 8443);
        https.scheme = Scheme::Https;
        assert!(https.validate().is_err());

        let mut http_with_tls = ServiceInfo::new("user", 8080);
        http_with_tls.tls = Some(TlsConfig {
            cert_file: "cert.pem".into(),
            key_file: "key.pem".into(),
        });
        assert!(http_with_tls.validate().is_err());
    }

    #[test]
    fn validate_accepts_good_info() {
        assert!(ServiceInfo::new("user", 8080).validate().is_ok());
        let tls = TlsConfig {
            cert_file: "cert.pem".into(),
            key_file: "key.pem".into(),
        };
        assert!(ServiceInfo::new("user", 8443).with_tls(tls).validate().is_ok());
    }
}
