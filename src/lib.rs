// DeriveActiveEnum de `StudentLevel` génère des identifiants à partir des
// valeurs "kıdemli" et "çözmez", proches des variantes Kidemli et Cozmez.
#![allow(confusable_idents)]

pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod responses;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_support;
