pub mod domain;
pub mod port;
pub mod use_case;

#[cfg(test)]
pub(crate) mod testing;
