//! Routeline - live navigation routes drawn over a map.
//!
//! Routes are owned by a [`route::manager::RouteManager`], mutated through
//! identifiers, and published to the renderer as immutable snapshots on
//! [`route::manager::RouteManager::finalize`]. The [`render`] module turns
//! snapshots into meshes and gradients for a [`render::backend::RenderBackend`],
//! along with the vanishing line, dot and puck overlays.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod geometry;
pub mod render;
pub mod route;
pub mod sources;
