//! Query endpoints
//!
//! Maps URL paths and query strings to bot commands and hands them to the
//! dispatcher. The endpoint name is the command verb (`GET /dni?dni=...`
//! becomes `/dni ...`); prefixed chains strip their prefix from the verb
//! (`GET /azura_dni?...` sends `/dni ...` to the azura chain). Two dedicated
//! endpoints assemble the piped name-search commands.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use std::collections::HashMap;

use crate::classify::QueryMode;
use crate::dispatch::AggregatedResult;
use crate::error::AppError;
use crate::handlers::AppState;
use crate::middleware::RequestId;

/// Accepted query-string keys, in lookup order
///
/// The first present, non-empty key supplies the command parameter.
const ACCEPTED_PARAMS: &[&str] = &[
    "dni",
    "query",
    "pasaporte",
    "cedula",
    "direccion",
    "carnet_extranjeria",
    "cedula_identidad",
    "placa",
    "serie_armamento",
    "clave_denuncia",
    "param",
];

fn extract_param(params: &HashMap<String, String>) -> Option<&str> {
    ACCEPTED_PARAMS
        .iter()
        .filter_map(|key| params.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

/// Minimum input constraints shared by every command parameter
fn validate_param(value: &str) -> Result<(), AppError> {
    if value.chars().count() < 2 {
        return Err(AppError::Validation(
            "El parámetro debe tener al menos 2 caracteres".to_string(),
        ));
    }
    if value.contains('|') {
        return Err(AppError::Validation(
            "El parámetro no puede contener '|'".to_string(),
        ));
    }
    Ok(())
}

/// GET /{endpoint} handler
///
/// Universal detail/listing entry point: resolves the chain from the
/// endpoint name, builds the command and runs the dispatcher. Backend
/// failures come back as HTTP 200 with `status = "error"`; only caller
/// mistakes produce 4xx.
pub async fn universal(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(endpoint): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<AggregatedResult>, AppError> {
    let Some(value) = extract_param(&params) else {
        return Err(AppError::Validation("Parámetro faltante".to_string()));
    };
    validate_param(value)?;

    let (chain, verb) = state.config().route(&endpoint);
    let mode = if state.config().engine.is_name_search(verb) {
        QueryMode::NameSearch
    } else {
        QueryMode::Detail
    };
    // Name searches take names; a purely numeric value is a mixed-up command
    if mode == QueryMode::NameSearch && value.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "La búsqueda por nombres no acepta valores numéricos".to_string(),
        ));
    }
    let command = format!("/{verb} {value}");

    let result = state
        .dispatcher()
        .run(chain, mode, &command, request_id)
        .await;
    Ok(Json(result))
}

/// GET /dni_nombres handler
///
/// Name search by surname pair: `nombres` (optional) plus `apepaterno` and
/// `apematerno` (both required), assembled into the piped `/nm` command.
/// Spaces inside a part are folded into the separator the bots expect.
pub async fn dni_nombres(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<AggregatedResult>, AppError> {
    let part = |key: &str| params.get(key).map(|v| v.trim()).unwrap_or_default();
    let nombres = part("nombres").replace(' ', ",");
    let paterno = part("apepaterno").replace(' ', "+");
    let materno = part("apematerno").replace(' ', "+");

    if paterno.is_empty() || materno.is_empty() {
        return Err(AppError::Validation("Faltan apellidos".to_string()));
    }

    let command = format!("/nm {nombres}|{paterno}|{materno}");
    let chain = state.config().default_chain();
    let result = state
        .dispatcher()
        .run(chain, QueryMode::NameSearch, &command, request_id)
        .await;
    Ok(Json(result))
}

/// GET /venezolanos_nombres handler
pub async fn venezolanos_nombres(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<AggregatedResult>, AppError> {
    let query = params.get("query").map(|v| v.trim()).unwrap_or_default();
    if query.is_empty() {
        return Err(AppError::Validation("Query faltante".to_string()));
    }

    let command = format!("/nmv {query}");
    let chain = state.config().default_chain();
    let result = state
        .dispatcher()
        .run(chain, QueryMode::NameSearch, &command, request_id)
        .await;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_extract_param_follows_lookup_order() {
        let map = params(&[("placa", "ABC123"), ("dni", "12345678")]);
        assert_eq!(extract_param(&map), Some("12345678"));
    }

    #[test]
    fn test_extract_param_skips_empty_values() {
        let map = params(&[("dni", "  "), ("query", "PEREZ")]);
        assert_eq!(extract_param(&map), Some("PEREZ"));
    }

    #[test]
    fn test_extract_param_ignores_unknown_keys() {
        let map = params(&[("foo", "bar")]);
        assert_eq!(extract_param(&map), None);
    }

    #[test]
    fn test_validate_param_rejects_short_values() {
        assert!(validate_param("1").is_err());
        assert!(validate_param("12").is_ok());
    }

    #[test]
    fn test_validate_param_rejects_separator() {
        assert!(validate_param("a|b").is_err());
    }
}
