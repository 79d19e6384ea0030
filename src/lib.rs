//! realpick · "spot the real interpretation" quiz backend
//!
//! An uploader sends a photo and their own reading of it; a generator writes a
//! competing reading; players see both in random order and guess which one is
//! the uploader's.
//!
//! Layers, leaf first: `validator`, `storage`, `metadata`, `generator`,
//! `service`; `routes` + `protocol` + `state` are the HTTP surface.

pub mod config;
pub mod domain;
pub mod error;
pub mod generator;
pub mod metadata;
pub mod protocol;
pub mod routes;
pub mod service;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod util;
pub mod validator;

pub use domain::{Quiz, QuizCollection};
pub use error::QuizError;
pub use service::{QuizService, ServiceSettings};
