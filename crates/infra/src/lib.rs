//! Paraeq infrastructure: the real-time engine, the audio-to-display FIFO
//! and the display-side consumers.

pub mod audio;
