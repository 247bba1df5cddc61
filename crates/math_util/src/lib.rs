#![forbid(unsafe_code)]

pub mod frustum;

pub use frustum::{Aabb, Frustum, Plane};
