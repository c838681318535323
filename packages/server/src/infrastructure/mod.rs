//! Infrastructure layer: concrete connections, in-memory collaborators and DTOs.

pub mod connection;
pub mod dto;
pub mod repository;
