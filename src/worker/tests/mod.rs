//! Test modules for workers and node assembly

mod end_to_end;
