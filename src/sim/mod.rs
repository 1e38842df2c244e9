pub mod client;

pub use client::SimClient;
