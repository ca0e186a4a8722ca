pub mod cli;
pub mod interrupt;
pub mod output;
pub mod parser;
pub mod rules;
pub mod runner;
