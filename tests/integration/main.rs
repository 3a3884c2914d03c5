//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the meter pipeline
//! against simulated lines and meters.  All tests run on the host with no
//! real hardware required.

mod mock_line;
mod pipeline_tests;
