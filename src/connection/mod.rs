//! Connections tie a datagram source to the display store

pub mod live;
pub mod replay;

#[cfg(test)]
mod tests;
