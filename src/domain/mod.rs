//! Domain layer: entities, value objects and storage ports for the credit
//! workflow.

pub mod course_key;
pub mod models;
pub mod ports;
pub mod request;
pub mod requirement;
