// src/utils/mod.rs

pub mod guard;
pub mod html;
