use std::fmt;
use std::ops::Deref;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, web};
use futures::future::{LocalBoxFuture, Ready, ready};
use serde::de::DeserializeOwned;

use crate::error::{AppError, NON_FIELD_ERRORS};

/// Files a decode failure under the field that caused it, or under
/// `non_field_errors` when the document itself is malformed.
fn field_error<E: fmt::Display>(err: serde_path_to_error::Error<E>) -> AppError {
    let path = err.path().to_string();
    let field = if path == "." { NON_FIELD_ERRORS } else { path.as_str() };
    AppError::invalid(field, err.inner().to_string())
}

pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut de).map_err(field_error)?;
    de.end()
        .map_err(|e| AppError::invalid(NON_FIELD_ERRORS, e.to_string()))?;
    Ok(value)
}

pub fn decode_query<T: DeserializeOwned>(query: &str) -> Result<T, AppError> {
    let de = serde_urlencoded::Deserializer::new(url::form_urlencoded::parse(query.as_bytes()));
    serde_path_to_error::deserialize(de).map_err(field_error)
}

/// JSON body whose decode errors name the offending field.
#[derive(Debug)]
pub struct FieldJson<T>(pub T);

impl<T> FieldJson<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for FieldJson<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned + 'static> FromRequest for FieldJson<T> {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let body = web::Bytes::from_request(req, payload);
        Box::pin(async move {
            let bytes = body.await?;
            Ok(FieldJson(decode_json(&bytes)?))
        })
    }
}

/// Query string whose decode errors name the offending parameter.
#[derive(Debug)]
pub struct FieldQuery<T>(pub T);

impl<T> Deref for FieldQuery<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned> FromRequest for FieldQuery<T> {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(decode_query(req.query_string()).map(FieldQuery))
    }
}
