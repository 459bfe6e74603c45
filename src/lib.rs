//! Markut: a stack-based DSL for slicing, concatenating and annotating stream VODs.

pub mod chat;
pub mod chunk;
pub mod config;
pub mod dsl;
pub mod render;
pub mod report;
