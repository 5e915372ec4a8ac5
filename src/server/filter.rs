//! 内置过滤器和处理函数

use axum::http::header;
use axum::response::IntoResponse;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::{Filter, Handler, filter_fn, handler_fn};

/// 访问日志过滤器：记录方法、路径、状态码和耗时
pub fn access_log_filter() -> Filter {
    filter_fn(|req, next| async move {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let start = Instant::now();

        let response = next.run(req).await;

        info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "access"
        );
        response
    })
}

/// 返回固定纯文本的处理函数
pub fn text_handler(body: impl Into<String>) -> Handler {
    let body: Arc<str> = Arc::from(body.into());
    handler_fn(move |_| {
        let body = body.clone();
        async move {
            (
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                body.to_string(),
            )
                .into_response()
        }
    })
}
