pub mod client;
pub mod presence;

#[cfg(test)]
pub mod fake;
