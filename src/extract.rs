use axum::extract::FromRequest;
use axum::extract::FromRequestParts;

use crate::error::AppError;

/// `Json` whose rejection renders as an [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Path` whose rejection renders as an [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);
