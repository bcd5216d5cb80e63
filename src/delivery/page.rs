//! HTML error pages

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Server name shown in error page footers
pub const SERVER_NAME: &str = concat!("oneanime/", env!("CARGO_PKG_VERSION"));

/// Minimal error page naming the status, e.g. `404 Not Found`
pub fn error_page(status: StatusCode) -> String {
    let title = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );

    format!(
        "<html><head>\n<title>{title}</title>\n</head>\n<body bgcolor=\"white\">\n\
         <center><h1>{title}</h1></center>\n<hr><center>{SERVER_NAME}</center>\n\
         </body></html>"
    )
}

/// Error page response with the matching status code
pub fn error_response(status: StatusCode) -> Response {
    (status, Html(error_page(status))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_page() {
        let page = error_page(StatusCode::NOT_FOUND);

        assert!(page.contains("<title>404 Not Found</title>"));
        assert!(page.contains("<h1>404 Not Found</h1>"));
        assert!(page.contains(SERVER_NAME));
    }

    #[test]
    fn test_internal_error_page() {
        let page = error_page(StatusCode::INTERNAL_SERVER_ERROR);

        assert!(page.contains("500 Internal Server Error"));
    }

    #[test]
    fn test_error_response_status() {
        let response = error_response(StatusCode::NOT_FOUND);

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
    }
}
