// Stream resolvers
//
// The pipeline only talks to the `StreamResolver` trait; this module holds
// the yt-dlp implementation used by the binary.

mod cli;

pub use cli::YtDlpResolver;
