//! Paraeq core: filter design, filter chain, spectrum estimation and the
//! parameter model shared by the audio and display contexts.

pub mod domain;
