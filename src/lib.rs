//! cadmon: container monitoring daemon.
//!
//! Containers are discovered from the cgroup hierarchy and from container
//! engines, claimed by the first matching factory in a [`FactoryRegistry`],
//! sampled on a housekeeping loop, and served over a versioned HTTP API.
//!
//! [`FactoryRegistry`]: application::FactoryRegistry

pub mod adapters;
pub mod application;
pub mod client;
pub mod config;
pub mod domain;
pub mod interface;
pub mod ports;
