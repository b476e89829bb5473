//! Integration tests for treeorder

mod order_properties;
mod order_store;
mod support;
