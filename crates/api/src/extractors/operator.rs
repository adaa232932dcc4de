//! Operator identity extractor.
//!
//! Authentication itself happens upstream; the gateway injects the operator's
//! identity as headers on every request it forwards. This extractor reads
//! those headers and rejects requests that arrive without them.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// Header carrying the operator's numeric id. Required on operator routes.
pub const OPERATOR_ID_HEADER: &str = "x-operator-id";

/// Header carrying the operator's designated default campaign. Optional;
/// used by the accept path when the request body names no campaign.
pub const DEFAULT_CAMPAIGN_HEADER: &str = "x-default-campaign";

/// Identity of the operator a request acts on behalf of.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    /// Owner id scoping every lead and export job touched by the request.
    pub operator_id: i64,
    /// Default campaign, if the operator has designated one.
    pub default_campaign: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for OperatorContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = parts
            .headers
            .get(OPERATOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::Unauthorized("Missing x-operator-id header".to_string())
            })?;

        let operator_id = raw_id.trim().parse::<i64>().map_err(|_| {
            ApiError::Unauthorized("Invalid x-operator-id header".to_string())
        })?;

        let default_campaign = parts
            .headers
            .get(DEFAULT_CAMPAIGN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        Ok(OperatorContext {
            operator_id,
            default_campaign,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<OperatorContext, ApiError> {
        let (mut parts, _) = request.into_parts();
        OperatorContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_operator_id() {
        let request = Request::builder()
            .header(OPERATOR_ID_HEADER, "42")
            .body(())
            .unwrap();

        let ctx = extract(request).await.unwrap();
        assert_eq!(ctx.operator_id, 42);
        assert!(ctx.default_campaign.is_none());
    }

    #[tokio::test]
    async fn test_extracts_default_campaign() {
        let request = Request::builder()
            .header(OPERATOR_ID_HEADER, "7")
            .header(DEFAULT_CAMPAIGN_HEADER, "camp-oct")
            .body(())
            .unwrap();

        let ctx = extract(request).await.unwrap();
        assert_eq!(ctx.operator_id, 7);
        assert_eq!(ctx.default_campaign.as_deref(), Some("camp-oct"));
    }

    #[tokio::test]
    async fn test_blank_default_campaign_is_none() {
        let request = Request::builder()
            .header(OPERATOR_ID_HEADER, "7")
            .header(DEFAULT_CAMPAIGN_HEADER, "   ")
            .body(())
            .unwrap();

        let ctx = extract(request).await.unwrap();
        assert!(ctx.default_campaign.is_none());
    }

    #[tokio::test]
    async fn test_missing_operator_id_rejected() {
        let request = Request::builder().body(()).unwrap();

        let err = extract(request).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_non_numeric_operator_id_rejected() {
        let request = Request::builder()
            .header(OPERATOR_ID_HEADER, "not-a-number")
            .body(())
            .unwrap();

        let err = extract(request).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_operator_id_with_whitespace() {
        let request = Request::builder()
            .header(OPERATOR_ID_HEADER, " 13 ")
            .body(())
            .unwrap();

        let ctx = extract(request).await.unwrap();
        assert_eq!(ctx.operator_id, 13);
    }
}
