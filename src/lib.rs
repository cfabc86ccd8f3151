pub mod cli;
pub mod crc;
pub mod tvm;
pub mod utils;
