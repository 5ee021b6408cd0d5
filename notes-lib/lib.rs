use smartstring::{LazyCompact, SmartString};

pub mod attributes;
pub mod config;
pub mod delta;
pub mod document;
pub mod editor;
pub mod focus;
pub mod history;
pub mod node;
pub mod path;
pub mod platform;
pub mod position;
pub mod render;
pub mod selection;
pub mod transaction;

pub type Tendril = SmartString<LazyCompact>;
