pub mod artifact;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod jobs;
pub mod naming;
pub mod output;
pub mod resolve;
pub mod sheet;
pub mod synth;
