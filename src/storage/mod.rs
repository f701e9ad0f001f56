//! Storage layer
//!
//! SeaORM-backed persistence for the tracking schema. Entities themselves
//! live in the `migration` crate so the schema and its access types stay in
//! one place.

pub mod backend;

pub use backend::{
    SeaOrmStorage, connect_generic, connect_sqlite, infer_backend_from_url,
    normalize_backend_name, run_migrations,
};
