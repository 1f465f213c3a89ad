pub mod cleanup;
pub mod transcoder;
