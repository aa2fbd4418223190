//! Record endpoints, generic over the [`RecordStore`] behind them.
//!
//! All of them sit behind the auth gate; the principal is only used for logs.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::auth::Principal;
use crate::{
    api::envelope::Envelope,
    records::{PageParams, RecordError, RecordStore},
};

fn malformed_body() -> Response {
    RecordError::Validation("missing or malformed JSON body".to_string()).into_response()
}

pub async fn create<S: RecordStore>(
    store: Extension<Arc<S>>,
    principal: Extension<Principal>,
    payload: Option<Json<S::Input>>,
) -> Response {
    let Some(Json(input)) = payload else {
        return malformed_body();
    };
    debug!(user_id = principal.user.id, "create record");

    match store.create(input).await {
        Ok(record) => (StatusCode::CREATED, Json(Envelope::data(record))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn list<S: RecordStore>(
    store: Extension<Arc<S>>,
    principal: Extension<Principal>,
    params: Option<Query<PageParams>>,
) -> Response {
    let Some(Query(params)) = params else {
        return RecordError::Validation("invalid pagination parameters".to_string())
            .into_response();
    };
    let page = match params.resolve() {
        Ok(page) => page,
        Err(err) => return err.into_response(),
    };
    debug!(user_id = principal.user.id, ?page, "list records");

    match store.list(page).await {
        Ok((records, pagination)) => {
            (StatusCode::OK, Json(Envelope::page(records, pagination))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub async fn update<S: RecordStore>(
    store: Extension<Arc<S>>,
    principal: Extension<Principal>,
    id: Option<Path<i64>>,
    payload: Option<Json<S::Patch>>,
) -> Response {
    let Some(Path(id)) = id else {
        return RecordError::Validation("invalid id".to_string()).into_response();
    };
    let Some(Json(patch)) = payload else {
        return malformed_body();
    };
    debug!(user_id = principal.user.id, id, "update record");

    match store.update(id, patch).await {
        Ok(record) => (StatusCode::CREATED, Json(Envelope::data(record))).into_response(),
        Err(err) => err.into_response(),
    }
}
