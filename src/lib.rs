pub mod batch;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod keys;
pub mod parser;
pub mod projection;
pub mod records;
pub mod storage;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
