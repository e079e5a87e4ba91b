pub(super) fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

pub(super) fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_header_keeps_explicit_port() {
        let parsed = url::Url::parse("http://127.0.0.1:8080/api/v3/ocr/jobs")
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(host_header_value(&parsed).as_deref(), Some("127.0.0.1:8080"));
    }

    #[test]
    fn host_header_omits_default_port() {
        let parsed =
            url::Url::parse("http://ocr.internal/ocr/sync").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(host_header_value(&parsed).as_deref(), Some("ocr.internal"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        assert!(has_header(&headers, "content-type"));
        assert!(!has_header(&headers, "content-length"));
    }
}
