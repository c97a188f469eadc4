//! `AgroSmart` HTTP service.
//!
//! Sensor nodes `POST` readings and receive a pump decision; dashboards poll
//! `GET /zones` and request manual watering.

pub mod error;
pub mod routes;
