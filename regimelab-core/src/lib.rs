//! RegimeLab Core: adaptive filter, indicators, HMM regime engine, strategy bank.
//!
//! This crate is the pure numeric half of the pipeline:
//! - Domain types (bars, instruments, price series)
//! - Streaming adaptive filter with shape and trading-signal classification
//! - Technical indicators with look-ahead-safe alignment
//! - Feature extraction and quantile discretization
//! - Seeded LCG random source for reproducible training
//! - Discrete HMM: forward/backward, Baum-Welch, Viterbi, prediction
//! - Ten regime-aware strategies behind one trait
//!
//! Nothing here performs I/O.

pub mod domain;
pub mod features;
pub mod filter;
pub mod hmm;
pub mod indicators;
pub mod rng;
pub mod strategy;
