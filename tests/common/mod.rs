pub use dataflow_transfer_test_utils::init_tracing;
