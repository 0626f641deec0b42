//! Gateway and RPC API request handlers

pub mod gateway;
pub mod rpc;

pub use gateway::*;
pub use rpc::*;
