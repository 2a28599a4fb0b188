use crate::domain::{IdType, RequestOptions};

use super::super::ApiError;
use super::ApiRequest;

/// Parse the options shared by every v2 request
pub fn parse_request_options(request: &ApiRequest) -> Result<RequestOptions, ApiError> {
    let mut options = RequestOptions::default();

    if let Some(id_type) = request.param("type").filter(|s| !s.is_empty()) {
        options.id_type = id_type.parse::<IdType>().map_err(ApiError::InvalidOption)?;
    }

    if let Some(count) = request.param("count").filter(|s| !s.is_empty()) {
        let n: i64 = count
            .parse()
            .map_err(|_| ApiError::InvalidOption(format!("failed to parse 'count' option: {}", count)))?;
        if n < -1 {
            return Err(ApiError::InvalidOption(format!(
                "invalid 'count' option: only -1 and larger values allowed, not {}",
                n
            )));
        }
        options.count = n;
    }

    options.recursive = request.param("recursive") == Some("true");

    if let Some(max_age) = request.param("max_age").filter(|s| !s.is_empty()) {
        let max_age = humantime::parse_duration(max_age).map_err(|e| {
            ApiError::InvalidOption(format!("failed to parse 'max_age' option: {}", e))
        })?;
        options.max_age = Some(max_age);
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(query: &[(&str, &str)]) -> ApiRequest {
        ApiRequest::new(
            query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            bytes::Bytes::new(),
        )
    }

    #[test]
    fn test_defaults() {
        let options = parse_request_options(&request(&[])).unwrap();
        assert_eq!(options, RequestOptions::default());
        assert_eq!(options.count, 64);
        assert_eq!(options.max_age, None);
    }

    #[test]
    fn test_count_bounds() {
        assert_eq!(parse_request_options(&request(&[("count", "-1")])).unwrap().count, -1);
        assert_eq!(parse_request_options(&request(&[("count", "0")])).unwrap().count, 0);
        assert!(parse_request_options(&request(&[("count", "-2")])).is_err());
        assert!(parse_request_options(&request(&[("count", "ten")])).is_err());
        assert_eq!(
            parse_request_options(&request(&[("count", "3000000000")])).unwrap().count,
            3_000_000_000
        );
    }

    #[test]
    fn test_type() {
        let docker = parse_request_options(&request(&[("type", "docker")])).unwrap();
        assert_eq!(docker.id_type, IdType::Docker);
        let err = parse_request_options(&request(&[("type", "bogus")])).unwrap_err();
        assert_eq!(err.to_string(), "unknown 'type' \"bogus\"");
    }

    #[test]
    fn test_recursive_needs_exact_literal() {
        assert!(parse_request_options(&request(&[("recursive", "true")])).unwrap().recursive);
        for value in ["True", "1", "yes", ""] {
            assert!(!parse_request_options(&request(&[("recursive", value)])).unwrap().recursive);
        }
    }

    #[test]
    fn test_max_age() {
        let options = parse_request_options(&request(&[("max_age", "1m30s")])).unwrap();
        assert_eq!(options.max_age, Some(Duration::from_secs(90)));
        let options = parse_request_options(&request(&[("max_age", "250ms")])).unwrap();
        assert_eq!(options.max_age, Some(Duration::from_millis(250)));
        assert!(parse_request_options(&request(&[("max_age", "soon")])).is_err());
    }
}
