//! Cross-crate integration tests for the equalizer

#[cfg(test)]
mod equalizer_integration;
