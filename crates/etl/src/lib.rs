pub mod error;
pub mod pipeline;
pub mod session;
pub mod tables;

pub use error::EtlError;
pub use pipeline::{
    process_logs, process_songs, run, RunReport, Source, StageReport, LOG_DATA_TABLE,
    SONG_DATA_TABLE,
};
pub use session::Session;
pub use tables::{write_star_table, StarTable};
