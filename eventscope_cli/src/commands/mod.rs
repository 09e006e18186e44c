pub mod highlight;
pub mod serve;
pub mod watch;
