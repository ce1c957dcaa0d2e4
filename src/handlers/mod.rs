// Route handlers, one module per resource.
//
// Handlers receive already-authenticated principals (see
// `middleware::auth`) and return `ApiResult`; failures flow to the global
// error handler as `ApiError`.
pub mod auth;
pub mod guides;
pub mod health;
pub mod tours;
pub mod users;
