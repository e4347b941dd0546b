//! Core building blocks: the message model and the QoS dispatch pipeline.

pub mod egress;
pub mod error;
pub mod message;
pub mod qos;
