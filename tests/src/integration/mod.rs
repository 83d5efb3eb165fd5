//! End-to-end notarisation scenarios.

mod support;

mod byzantine;
mod concurrency;
mod node;
mod notarisation;
