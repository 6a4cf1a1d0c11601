// src/handlers/mod.rs

pub mod admin;
pub mod collaborators;
pub mod survey;
