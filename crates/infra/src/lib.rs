//! Infrastructure layer: event store, command dispatch, read models, services and
//! process wiring.

pub mod bootstrap;
pub mod clock;
pub mod command_dispatcher;
pub mod config;
pub mod confirmation;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod repository;
pub mod services;
pub mod streams;

mod integration_tests;
