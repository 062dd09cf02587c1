pub mod preview;
pub mod run;
