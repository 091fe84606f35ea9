pub(crate) mod pipeline;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod testing;
