//! Integration test suite.

mod http_sources;
mod pipeline;
