mod refresh_record;
mod subject;

pub use refresh_record::*;
pub use subject::*;
