// src/models/mod.rs

pub mod access_key;
pub mod collaborator;
pub mod question;
pub mod response;
pub mod survey;
