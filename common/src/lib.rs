pub mod proto {
    tonic::include_proto!("connect_four");
}

pub mod config;
pub mod games;
pub mod id_generator;
pub mod identifiers;
pub mod logger;

pub use identifiers::*;
pub use proto::*;
