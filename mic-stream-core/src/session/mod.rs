pub mod byte_stream;
pub mod capture_session;
pub mod negotiator;
