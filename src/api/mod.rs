pub mod handlers;
pub mod handlers_predict;
pub mod routes;
