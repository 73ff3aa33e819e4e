// src/normalize/providers/mod.rs
pub mod amazon;
pub mod spotify;
