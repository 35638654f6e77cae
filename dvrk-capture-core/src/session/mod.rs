pub mod capture_loop;
pub mod controller;
pub mod handshake;

#[cfg(test)]
pub(crate) mod test_support;
