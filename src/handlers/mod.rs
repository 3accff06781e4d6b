use axum::http::HeaderMap;
use uuid::Uuid;

use crate::errors::ServiceError;

pub mod ddts;
pub mod inventory;
pub mod materials;
pub mod site_materials;
pub mod stock_movements;

/// The caller's identity travels as an opaque `X-Actor-Id` header; every
/// mutating endpoint stamps it onto the rows it writes.
pub(crate) fn actor_id(headers: &HeaderMap) -> Result<Uuid, ServiceError> {
    let value = headers
        .get("x-actor-id")
        .ok_or_else(|| ServiceError::ValidationError("missing X-Actor-Id header".into()))?;
    let raw = value
        .to_str()
        .map_err(|_| ServiceError::ValidationError("X-Actor-Id is not valid UTF-8".into()))?;
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::ValidationError("X-Actor-Id must be a UUID".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn actor_id_parses_uuid_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-actor-id",
            HeaderValue::from_static("7f1c6b1e-54d3-4f7e-9d41-0a2b9f6c1de2"),
        );
        assert!(actor_id(&headers).is_ok());
    }

    #[test]
    fn actor_id_rejects_missing_and_garbage() {
        let headers = HeaderMap::new();
        assert!(matches!(
            actor_id(&headers),
            Err(ServiceError::ValidationError(_))
        ));

        let mut headers = HeaderMap::new();
        headers.insert("x-actor-id", HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            actor_id(&headers),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
