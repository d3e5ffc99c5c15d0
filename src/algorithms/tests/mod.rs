// src/algorithms/tests/mod.rs

/// Tests for the sliding window algorithm
mod sliding_window_tests;
