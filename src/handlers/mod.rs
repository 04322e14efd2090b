// handlers/mod.rs - HTTP handlers grouped by framework
//
// system:    /, /health, /api/v1/status, /api/v1/docs and the 404 fallback
// hrms:      /api/v1/hrms/*      (AI-HRMS framework)
// nose:      /api/v1/nose/*      (NOSE framework)
// webhunter: /api/v1/webhunter/* (Web-Hunter framework)
//
// Handlers validate, load documents through the `DocumentStore` in
// `AppState`, delegate math to `analytics`, and answer with `ApiResponse`.

pub mod hrms;
pub mod nose;
pub mod system;
pub mod utils;
pub mod webhunter;
