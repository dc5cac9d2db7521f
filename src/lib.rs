//! routemap scans a Go repository, matches route-registration indicators
//! (net/http, gorilla/mux, gin, echo, chi, gRPC) and maps every match back
//! to the program entry points that can reach it, annotating each step with
//! panic-recovery coverage.

pub mod cli;
pub mod config;
pub mod graph;
pub mod indicator;
pub mod mapper;
pub mod model;
pub mod recover;
pub mod reporter;
pub mod resolver;
pub mod scanner;
pub mod util;
