//! # Meteor Core
//!
//! Core contracts for the Meteor metadata collection agent.
//!
//! This crate defines everything a plugin author needs and nothing the
//! runtime keeps to itself:
//!
//! - **Asset model**: typed metadata records with ownership, labels,
//!   attributes, and lineage ([`Asset`], [`AssetData`])
//! - **Record envelope**: the immutable unit carried between pipeline
//!   stages ([`Record`])
//! - **Plugin contracts**: the three capabilities and their shared
//!   lifecycle ([`Extractor`], [`Processor`], [`Sink`])
//! - **Error taxonomy**: semantic error kinds the agent routes on
//!   ([`PluginError`])
//!
//! The execution runtime (registry, agent, retry, metrics) lives in
//! `meteor-runtime`; reference plugins live in `meteor-plugins`.

pub mod asset;
pub mod error;
pub mod plugin;
pub mod record;

pub use asset::{
    ApplicationData, Asset, AssetData, AssetType, Blob, BucketData, Chart, Column, DashboardData,
    Feature, FeatureTableData, GroupData, JobData, Lineage, LineageRef, ModelData, Owner,
    TableData, TopicData, UserData,
};
pub use error::{PluginError, PluginKind, Position};
pub use plugin::{Config, Emitter, Extractor, Plugin, PluginContext, PluginInfo, Processor, Sink};
pub use record::Record;
