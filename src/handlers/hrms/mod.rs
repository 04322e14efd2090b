// handlers/hrms/mod.rs - AI-HRMS framework handlers
//
// employees: CRUD and status changes on the `employees` collection
// search:    /search/employees and /export/employees
// analytics: /analytics/* reports

pub mod analytics;
pub mod employees;
pub mod search;

pub const EMPLOYEES: &str = "employees";
